use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::location::Path;

pub type Attrs = BTreeMap<String, Value>;

pub const ATTR_ALIGN: &str = "align";
pub const ATTR_CHECKED: &str = "checked";
pub const ATTR_URL: &str = "url";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Document {
    #[serde(default)]
    pub children: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum Node {
    Element(ElementNode),
    Text(TextNode),
    Void(VoidNode),
}

impl Node {
    pub fn text(text: impl Into<String>) -> Self {
        Node::Text(TextNode::new(text))
    }

    pub fn element(kind: ElementKind, children: Vec<Node>) -> Self {
        Node::Element(ElementNode::new(kind, children))
    }

    pub fn paragraph(text: impl Into<String>) -> Self {
        Self::element(ElementKind::Paragraph, vec![Node::text(text)])
    }

    pub fn list_item(text: impl Into<String>) -> Self {
        Self::element(ElementKind::ListItem, vec![Node::text(text)])
    }

    pub fn check_list_item(text: impl Into<String>, checked: bool) -> Self {
        let mut item = ElementNode::new(ElementKind::CheckListItem, vec![Node::text(text)]);
        item.attrs
            .insert(ATTR_CHECKED.to_string(), Value::Bool(checked));
        Node::Element(item)
    }

    pub fn link(url: impl Into<String>, text: impl Into<String>) -> Self {
        let mut link = ElementNode::new(ElementKind::Link, vec![Node::text(text)]);
        link.attrs
            .insert(ATTR_URL.to_string(), Value::String(url.into()));
        Node::Element(link)
    }

    pub fn image(url: impl Into<String>) -> Self {
        let mut attrs = Attrs::default();
        attrs.insert(ATTR_URL.to_string(), Value::String(url.into()));
        Node::Void(VoidNode {
            kind: VoidKind::Image,
            attrs,
        })
    }

    pub fn as_element(&self) -> Option<&ElementNode> {
        match self {
            Node::Element(el) => Some(el),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&TextNode> {
        match self {
            Node::Text(t) => Some(t),
            _ => None,
        }
    }

    pub fn children(&self) -> &[Node] {
        match self {
            Node::Element(el) => &el.children,
            Node::Text(_) | Node::Void(_) => &[],
        }
    }

    pub fn is_element_kind(&self, kind: ElementKind) -> bool {
        matches!(self, Node::Element(el) if el.kind == kind)
    }

    pub fn text_content(&self) -> String {
        match self {
            Node::Text(t) => t.text.clone(),
            Node::Element(el) => el.children.iter().map(Node::text_content).collect(),
            Node::Void(_) => String::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ElementKind {
    Paragraph,
    HeadingOne,
    HeadingTwo,
    HeadingThree,
    BlockQuote,
    CodeBlock,
    BulletedList,
    NumberedList,
    ListItem,
    CheckList,
    CheckListItem,
    Link,
}

impl ElementKind {
    pub const ALL: [ElementKind; 12] = [
        ElementKind::Paragraph,
        ElementKind::HeadingOne,
        ElementKind::HeadingTwo,
        ElementKind::HeadingThree,
        ElementKind::BlockQuote,
        ElementKind::CodeBlock,
        ElementKind::BulletedList,
        ElementKind::NumberedList,
        ElementKind::ListItem,
        ElementKind::CheckList,
        ElementKind::CheckListItem,
        ElementKind::Link,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ElementKind::Paragraph => "paragraph",
            ElementKind::HeadingOne => "heading-one",
            ElementKind::HeadingTwo => "heading-two",
            ElementKind::HeadingThree => "heading-three",
            ElementKind::BlockQuote => "block-quote",
            ElementKind::CodeBlock => "code-block",
            ElementKind::BulletedList => "bulleted-list",
            ElementKind::NumberedList => "numbered-list",
            ElementKind::ListItem => "list-item",
            ElementKind::CheckList => "check-list",
            ElementKind::CheckListItem => "check-list-item",
            ElementKind::Link => "link",
        }
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ElementKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unordered-list" => return Ok(ElementKind::BulletedList),
            "ordered-list" => return Ok(ElementKind::NumberedList),
            _ => {}
        }
        ElementKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| format!("Unknown element kind: {s}"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VoidKind {
    Image,
}

impl VoidKind {
    pub fn as_str(self) -> &'static str {
        match self {
            VoidKind::Image => "image",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementNode {
    pub kind: ElementKind,
    #[serde(default)]
    pub attrs: Attrs,
    #[serde(default)]
    pub children: Vec<Node>,
}

impl ElementNode {
    pub fn new(kind: ElementKind, children: Vec<Node>) -> Self {
        Self {
            kind,
            attrs: Attrs::default(),
            children,
        }
    }

    pub fn with_attr(mut self, key: impl Into<String>, value: Value) -> Self {
        self.attrs.insert(key.into(), value);
        self
    }

    pub fn align(&self) -> Option<Align> {
        self.attrs
            .get(ATTR_ALIGN)
            .and_then(|v| v.as_str())
            .and_then(|s| s.parse().ok())
    }

    pub fn checked(&self) -> Option<bool> {
        self.attrs.get(ATTR_CHECKED).and_then(|v| v.as_bool())
    }

    pub fn url(&self) -> Option<&str> {
        self.attrs.get(ATTR_URL).and_then(|v| v.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoidNode {
    pub kind: VoidKind,
    #[serde(default)]
    pub attrs: Attrs,
}

impl VoidNode {
    pub fn url(&self) -> Option<&str> {
        self.attrs.get(ATTR_URL).and_then(|v| v.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextNode {
    pub text: String,
    #[serde(default)]
    pub marks: Marks,
}

impl TextNode {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            marks: Marks::default(),
        }
    }

    pub fn with_marks(text: impl Into<String>, marks: Marks) -> Self {
        Self {
            text: text.into(),
            marks,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mark {
    Bold,
    Italic,
    Underline,
    Strikethrough,
    Code,
}

impl Mark {
    pub const ALL: [Mark; 5] = [
        Mark::Bold,
        Mark::Italic,
        Mark::Underline,
        Mark::Strikethrough,
        Mark::Code,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Mark::Bold => "bold",
            Mark::Italic => "italic",
            Mark::Underline => "underline",
            Mark::Strikethrough => "strikethrough",
            Mark::Code => "code",
        }
    }
}

impl FromStr for Mark {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Mark::ALL
            .into_iter()
            .find(|mark| mark.as_str() == s)
            .ok_or_else(|| format!("Unknown mark: {s}"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct Marks {
    #[serde(default)]
    pub bold: bool,
    #[serde(default)]
    pub italic: bool,
    #[serde(default)]
    pub underline: bool,
    #[serde(default)]
    pub strikethrough: bool,
    #[serde(default)]
    pub code: bool,
}

impl Marks {
    pub fn get(&self, mark: Mark) -> bool {
        match mark {
            Mark::Bold => self.bold,
            Mark::Italic => self.italic,
            Mark::Underline => self.underline,
            Mark::Strikethrough => self.strikethrough,
            Mark::Code => self.code,
        }
    }

    pub fn set(&mut self, mark: Mark, value: bool) {
        let slot = match mark {
            Mark::Bold => &mut self.bold,
            Mark::Italic => &mut self.italic,
            Mark::Underline => &mut self.underline,
            Mark::Strikethrough => &mut self.strikethrough,
            Mark::Code => &mut self.code,
        };
        *slot = value;
    }

    pub fn with(mut self, mark: Mark) -> Self {
        self.set(mark, true);
        self
    }

    pub fn is_empty(&self) -> bool {
        *self == Marks::default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Align {
    Left,
    Center,
    Right,
    Justify,
}

impl Align {
    pub const ALL: [Align; 4] = [Align::Left, Align::Center, Align::Right, Align::Justify];

    pub fn as_str(self) -> &'static str {
        match self {
            Align::Left => "left",
            Align::Center => "center",
            Align::Right => "right",
            Align::Justify => "justify",
        }
    }
}

impl FromStr for Align {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Align::ALL
            .into_iter()
            .find(|align| align.as_str() == s)
            .ok_or_else(|| format!("Unknown align value: {s}"))
    }
}

impl Document {
    pub fn new(children: Vec<Node>) -> Self {
        Self { children }
    }

    pub fn node(&self, path: &[usize]) -> Option<&Node> {
        let (first, rest) = path.split_first()?;
        let mut node = self.children.get(*first)?;
        for &ix in rest {
            node = match node {
                Node::Element(el) => el.children.get(ix)?,
                Node::Void(_) | Node::Text(_) => return None,
            };
        }
        Some(node)
    }

    pub fn node_mut(&mut self, path: &[usize]) -> Option<&mut Node> {
        let (first, rest) = path.split_first()?;
        let mut node = self.children.get_mut(*first)?;
        for &ix in rest {
            node = match node {
                Node::Element(el) => el.children.get_mut(ix)?,
                Node::Void(_) | Node::Text(_) => return None,
            };
        }
        Some(node)
    }

    pub fn children_at(&self, path: &[usize]) -> Option<&[Node]> {
        if path.is_empty() {
            return Some(&self.children);
        }
        match self.node(path)? {
            Node::Element(el) => Some(&el.children),
            Node::Text(_) | Node::Void(_) => None,
        }
    }

    pub fn children_at_mut(&mut self, path: &[usize]) -> Option<&mut Vec<Node>> {
        if path.is_empty() {
            return Some(&mut self.children);
        }
        match self.node_mut(path)? {
            Node::Element(el) => Some(&mut el.children),
            Node::Text(_) | Node::Void(_) => None,
        }
    }

    pub fn element(&self, path: &[usize]) -> Option<&ElementNode> {
        self.node(path).and_then(Node::as_element)
    }

    pub fn text(&self, path: &[usize]) -> Option<&TextNode> {
        self.node(path).and_then(Node::as_text)
    }

    pub fn descendants(&self) -> Vec<(Path, &Node)> {
        fn walk<'a>(children: &'a [Node], path: &mut Path, out: &mut Vec<(Path, &'a Node)>) {
            for (ix, node) in children.iter().enumerate() {
                path.push(ix);
                out.push((path.clone(), node));
                if let Node::Element(el) = node {
                    walk(&el.children, path, out);
                }
                path.pop();
            }
        }

        let mut out = Vec::new();
        walk(&self.children, &mut Vec::new(), &mut out);
        out
    }

    pub fn texts(&self) -> Vec<(Path, &TextNode)> {
        self.descendants()
            .into_iter()
            .filter_map(|(path, node)| node.as_text().map(|t| (path, t)))
            .collect()
    }
}
