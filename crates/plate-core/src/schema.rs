use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::node::{Align, ElementKind, Mark, Node, VoidKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeRole {
    Block,
    Inline,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChildConstraint {
    None,
    BlockOnly,
    InlineOnly,
    TextOnly,
    Items(ElementKind),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSpec {
    pub role: NodeRole,
    pub is_void: bool,
    pub children: ChildConstraint,
}

impl NodeSpec {
    const fn text_block() -> Self {
        Self {
            role: NodeRole::Block,
            is_void: false,
            children: ChildConstraint::InlineOnly,
        }
    }

    const fn container(item: ElementKind) -> Self {
        Self {
            role: NodeRole::Block,
            is_void: false,
            children: ChildConstraint::Items(item),
        }
    }

    pub fn is_block(&self) -> bool {
        self.role == NodeRole::Block
    }

    pub fn is_inline(&self) -> bool {
        self.role == NodeRole::Inline
    }

    pub fn is_text_block(&self) -> bool {
        self.role == NodeRole::Block && self.children == ChildConstraint::InlineOnly
    }

    pub fn item_kind(&self) -> Option<ElementKind> {
        match self.children {
            ChildConstraint::Items(kind) => Some(kind),
            _ => None,
        }
    }
}

impl ElementKind {
    pub fn spec(self) -> NodeSpec {
        match self {
            ElementKind::Paragraph
            | ElementKind::HeadingOne
            | ElementKind::HeadingTwo
            | ElementKind::HeadingThree
            | ElementKind::BlockQuote
            | ElementKind::CodeBlock
            | ElementKind::ListItem
            | ElementKind::CheckListItem => NodeSpec::text_block(),
            ElementKind::BulletedList | ElementKind::NumberedList => {
                NodeSpec::container(ElementKind::ListItem)
            }
            ElementKind::CheckList => NodeSpec::container(ElementKind::CheckListItem),
            ElementKind::Link => NodeSpec {
                role: NodeRole::Inline,
                is_void: false,
                children: ChildConstraint::TextOnly,
            },
        }
    }

    pub fn is_text_block(self) -> bool {
        self.spec().is_text_block()
    }

    pub fn is_inline(self) -> bool {
        self.spec().is_inline()
    }

    pub fn is_container(self) -> bool {
        self.spec().item_kind().is_some()
    }
}

impl VoidKind {
    pub fn spec(self) -> NodeSpec {
        match self {
            VoidKind::Image => NodeSpec {
                role: NodeRole::Block,
                is_void: true,
                children: ChildConstraint::None,
            },
        }
    }
}

impl Node {
    pub fn spec(&self) -> Option<NodeSpec> {
        match self {
            Node::Element(el) => Some(el.kind.spec()),
            Node::Void(v) => Some(v.kind.spec()),
            Node::Text(_) => None,
        }
    }

    pub fn is_block(&self) -> bool {
        self.spec().is_some_and(|spec| spec.is_block())
    }

    pub fn is_inline(&self) -> bool {
        match self {
            Node::Text(_) => true,
            _ => self.spec().is_some_and(|spec| spec.is_inline()),
        }
    }

    pub fn is_text_block(&self) -> bool {
        matches!(self, Node::Element(el) if el.kind.is_text_block())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockFormat {
    Align(Align),
    Kind(ElementKind),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatSpec {
    pub format: BlockFormat,
    pub is_list: bool,
    pub is_align: bool,
    pub child_shape: ChildConstraint,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormatConfig {
    pub list_kinds: Vec<ElementKind>,
    pub align_values: Vec<Align>,
    pub hotkeys: BTreeMap<String, Mark>,
}

impl Default for FormatConfig {
    fn default() -> Self {
        let hotkeys = [
            ("mod+b", Mark::Bold),
            ("mod+i", Mark::Italic),
            ("mod+u", Mark::Underline),
            ("mod+`", Mark::Code),
        ]
        .into_iter()
        .map(|(key, mark)| (key.to_string(), mark))
        .collect();

        Self {
            list_kinds: vec![ElementKind::NumberedList, ElementKind::BulletedList],
            align_values: Align::ALL.to_vec(),
            hotkeys,
        }
    }
}

impl FormatConfig {
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn is_list_kind(&self, kind: ElementKind) -> bool {
        self.list_kinds.contains(&kind)
    }

    pub fn is_align_value(&self, align: Align) -> bool {
        self.align_values.contains(&align)
    }

    pub fn classify(&self, format: &str) -> Option<FormatSpec> {
        if let Some(align) = format.parse::<Align>().ok().filter(|a| self.is_align_value(*a)) {
            return Some(FormatSpec {
                format: BlockFormat::Align(align),
                is_list: false,
                is_align: true,
                child_shape: ChildConstraint::InlineOnly,
            });
        }

        let kind: ElementKind = format.parse().ok()?;
        if self.is_list_kind(kind) {
            return Some(FormatSpec {
                format: BlockFormat::Kind(kind),
                is_list: true,
                is_align: false,
                child_shape: ChildConstraint::Items(ElementKind::ListItem),
            });
        }

        let toggleable = kind.is_text_block()
            && !matches!(kind, ElementKind::ListItem | ElementKind::CheckListItem);
        toggleable.then_some(FormatSpec {
            format: BlockFormat::Kind(kind),
            is_list: false,
            is_align: false,
            child_shape: kind.spec().children,
        })
    }

    /// Looks up a hotkey such as `mod+b` or `ctrl+b`. `ctrl`, `cmd` and `meta`
    /// are all read as `mod`.
    pub fn mark_for_hotkey(&self, hotkey: &str) -> Option<Mark> {
        let normalized = hotkey
            .trim()
            .to_ascii_lowercase()
            .split('+')
            .map(|part| match part.trim() {
                "ctrl" | "control" | "cmd" | "command" | "meta" => "mod",
                other => other,
            }
            .to_string())
            .collect::<Vec<_>>()
            .join("+");
        self.hotkeys.get(&normalized).copied()
    }
}
