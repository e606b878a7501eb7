use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::commands::Command;
use crate::core::Editor;
use crate::error::{CommandError, QueryError, RegistryError};
use crate::location::Path;
use crate::node::Mark;
use crate::normalize::{
    EnforceChildConstraints, EnsureNonEmptyDocument, EnsureTextLeaf, EnsureTrailingParagraph,
    MergeAdjacentTextLeaves, NormalizeKindAttrs, NormalizePass, RemoveEmptyElements,
    SurroundInlines,
};
use crate::query::{self, BlockAttr};

type CommandHandler =
    Arc<dyn Fn(&mut Editor, Option<Value>) -> Result<(), CommandError> + Send + Sync>;
type QueryHandler = Arc<dyn Fn(&Editor, Option<Value>) -> Result<Value, QueryError> + Send + Sync>;

#[derive(Clone)]
pub struct CommandSpec {
    pub id: String,
    pub label: String,
    pub description: Option<String>,
    pub keywords: Vec<String>,
    pub args_example: Option<Value>,
    pub handler: CommandHandler,
}

impl CommandSpec {
    pub fn new(
        id: impl Into<String>,
        label: impl Into<String>,
        handler: impl Fn(&mut Editor, Option<Value>) -> Result<(), CommandError>
        + Send
        + Sync
        + 'static,
    ) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            description: None,
            keywords: Vec::new(),
            args_example: None,
            handler: Arc::new(handler),
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keywords = keywords.into_iter().map(Into::into).collect();
        self
    }

    pub fn args_example(mut self, args_example: Value) -> Self {
        self.args_example = Some(args_example);
        self
    }
}

#[derive(Clone)]
pub struct QuerySpec {
    pub id: String,
    pub handler: QueryHandler,
}

impl QuerySpec {
    pub fn new(
        id: impl Into<String>,
        handler: impl Fn(&Editor, Option<Value>) -> Result<Value, QueryError>
        + Send
        + Sync
        + 'static,
    ) -> Self {
        Self {
            id: id.into(),
            handler: Arc::new(handler),
        }
    }
}

pub trait PlatePlugin: Send + Sync {
    fn id(&self) -> &'static str;
    fn normalize_passes(&self) -> Vec<Box<dyn NormalizePass>> {
        Vec::new()
    }
    fn commands(&self) -> Vec<CommandSpec> {
        Vec::new()
    }
    fn queries(&self) -> Vec<QuerySpec> {
        Vec::new()
    }
}

#[derive(Default)]
pub struct PluginRegistry {
    normalize_passes: Vec<Box<dyn NormalizePass>>,
    commands: HashMap<String, CommandSpec>,
    queries: HashMap<String, QuerySpec>,
}

impl PluginRegistry {
    pub fn new(
        plugins: impl IntoIterator<Item = Box<dyn PlatePlugin>>,
    ) -> Result<Self, RegistryError> {
        let mut registry = Self::default();
        for plugin in plugins {
            registry.register_plugin(plugin)?;
        }
        Ok(registry)
    }

    pub fn core() -> Self {
        let plugins: Vec<Box<dyn PlatePlugin>> =
            vec![Box::new(CoreNormalizePlugin), Box::new(TextPlugin)];
        Self::new(plugins).expect("core registry must be valid")
    }

    pub fn richtext() -> Self {
        let plugins: Vec<Box<dyn PlatePlugin>> = vec![
            Box::new(CoreNormalizePlugin),
            Box::new(TextPlugin),
            Box::new(MarksPlugin),
            Box::new(BlockPlugin),
            Box::new(ChecklistPlugin),
            Box::new(LinkPlugin),
            Box::new(ImagePlugin),
            Box::new(EmojiPlugin),
        ];
        Self::new(plugins).expect("richtext registry must be valid")
    }

    pub fn register_plugin(&mut self, plugin: Box<dyn PlatePlugin>) -> Result<(), RegistryError> {
        tracing::trace!(plugin = plugin.id(), "register plugin");
        self.normalize_passes.extend(plugin.normalize_passes());

        for cmd in plugin.commands() {
            if self.commands.contains_key(&cmd.id) {
                return Err(RegistryError::DuplicateCommand(cmd.id));
            }
            self.commands.insert(cmd.id.clone(), cmd);
        }

        for query in plugin.queries() {
            if self.queries.contains_key(&query.id) {
                return Err(RegistryError::DuplicateQuery(query.id));
            }
            self.queries.insert(query.id.clone(), query);
        }

        Ok(())
    }

    pub fn normalize_passes(&self) -> &[Box<dyn NormalizePass>] {
        &self.normalize_passes
    }

    pub fn commands(&self) -> &HashMap<String, CommandSpec> {
        &self.commands
    }

    pub fn command(&self, id: &str) -> Option<CommandSpec> {
        self.commands.get(id).cloned()
    }

    pub fn queries(&self) -> &HashMap<String, QuerySpec> {
        &self.queries
    }

    pub fn query(&self, id: &str) -> Option<QuerySpec> {
        self.queries.get(id).cloned()
    }
}

fn command_str_arg<'a>(
    args: Option<&'a Value>,
    key: &'static str,
) -> Result<&'a str, CommandError> {
    args.and_then(|v| v.get(key))
        .and_then(|v| v.as_str())
        .ok_or(CommandError::MissingArg(key))
}

fn query_str_arg<'a>(args: Option<&'a Value>, key: &'static str) -> Result<&'a str, QueryError> {
    args.and_then(|v| v.get(key))
        .and_then(|v| v.as_str())
        .ok_or(QueryError::MissingArg(key))
}

struct CoreNormalizePlugin;

impl PlatePlugin for CoreNormalizePlugin {
    fn id(&self) -> &'static str {
        "core.normalize"
    }

    fn normalize_passes(&self) -> Vec<Box<dyn NormalizePass>> {
        vec![
            Box::new(EnsureNonEmptyDocument),
            Box::new(EnforceChildConstraints),
            Box::new(RemoveEmptyElements),
            Box::new(EnsureTextLeaf),
            Box::new(SurroundInlines),
            Box::new(MergeAdjacentTextLeaves),
            Box::new(NormalizeKindAttrs),
            Box::new(EnsureTrailingParagraph),
        ]
    }
}

struct TextPlugin;

impl PlatePlugin for TextPlugin {
    fn id(&self) -> &'static str {
        "text"
    }

    fn commands(&self) -> Vec<CommandSpec> {
        vec![
            CommandSpec::new("text.insert", "Insert text", |editor, args| {
                let text = command_str_arg(args.as_ref(), "text")?.to_string();
                editor.execute(&Command::InsertText { text })
            })
            .description("Insert text at the selection, replacing selected content.")
            .keywords(["text", "type", "input"])
            .args_example(serde_json::json!({ "text": "Hello" })),
        ]
    }
}

struct MarksPlugin;

impl PlatePlugin for MarksPlugin {
    fn id(&self) -> &'static str {
        "marks"
    }

    fn commands(&self) -> Vec<CommandSpec> {
        vec![
            CommandSpec::new("marks.toggle", "Toggle mark", |editor, args| {
                let name = command_str_arg(args.as_ref(), "mark")?;
                let mark: Mark = name
                    .parse()
                    .map_err(|_| CommandError::UnknownMark(name.to_string()))?;
                editor.execute(&Command::ToggleMark { mark })
            })
            .description("Toggle a mark on the selection, or on the caret's pending marks.")
            .keywords(["bold", "italic", "underline", "strikethrough", "code", "mark"])
            .args_example(serde_json::json!({ "mark": "bold" })),
            CommandSpec::new("marks.toggle_hotkey", "Toggle mark by hotkey", |editor, args| {
                let hotkey = command_str_arg(args.as_ref(), "hotkey")?;
                editor.handle_hotkey(hotkey).map(|_| ())
            })
            .description("Toggle the mark bound to a hotkey such as mod+b.")
            .keywords(["hotkey", "shortcut", "mark"])
            .args_example(serde_json::json!({ "hotkey": "mod+b" })),
        ]
    }

    fn queries(&self) -> Vec<QuerySpec> {
        vec![
            QuerySpec::new("marks.is_active", |editor, args| {
                let name = query_str_arg(args.as_ref(), "mark")?;
                let mark: Mark = name.parse().map_err(QueryError::InvalidArg)?;
                Ok(Value::Bool(query::is_mark_active(editor.state(), mark)))
            }),
            QuerySpec::new("marks.get_active", |editor, _args| {
                let marks = query::current_marks(editor.state()).unwrap_or_default();
                serde_json::to_value(marks).map_err(|err| QueryError::Encode(err.to_string()))
            }),
        ]
    }
}

struct BlockPlugin;

impl PlatePlugin for BlockPlugin {
    fn id(&self) -> &'static str {
        "block"
    }

    fn commands(&self) -> Vec<CommandSpec> {
        vec![
            CommandSpec::new("block.toggle", "Toggle block", |editor, args| {
                let format = command_str_arg(args.as_ref(), "format")?.to_string();
                editor.execute(&Command::ToggleBlock { format })
            })
            .description("Toggle a block type, list or alignment on the selected blocks.")
            .keywords(["heading", "quote", "code", "list", "align", "block"])
            .args_example(serde_json::json!({ "format": "bulleted-list" })),
        ]
    }

    fn queries(&self) -> Vec<QuerySpec> {
        vec![
            QuerySpec::new("block.is_active", |editor, args| {
                let format = query_str_arg(args.as_ref(), "format")?;
                let key = args
                    .as_ref()
                    .and_then(|v| v.get("key"))
                    .and_then(|v| v.as_str())
                    .unwrap_or("type");
                let attr = BlockAttr::parse(format, key)
                    .ok_or_else(|| QueryError::InvalidArg(format!("{key}={format}")))?;
                Ok(Value::Bool(query::is_block_active(editor.state(), attr)))
            }),
            QuerySpec::new("block.align", |editor, _args| {
                Ok(query::active_align(editor.state())
                    .map(|align| Value::from(align.as_str()))
                    .unwrap_or(Value::Null))
            }),
        ]
    }
}

struct ChecklistPlugin;

impl PlatePlugin for ChecklistPlugin {
    fn id(&self) -> &'static str {
        "checklist"
    }

    fn commands(&self) -> Vec<CommandSpec> {
        vec![
            CommandSpec::new("checklist.toggle", "Toggle checklist", |editor, _args| {
                editor.execute(&Command::ToggleChecklist)
            })
            .description("Turn the selected blocks into check-list items, or back into paragraphs.")
            .keywords(["todo", "task", "checkbox", "checklist"]),
            CommandSpec::new(
                "checklist.toggle_checked",
                "Toggle checklist item checked",
                |editor, args| {
                    let path = match args.as_ref().and_then(|v| v.get("path")) {
                        None | Some(Value::Null) => None,
                        Some(value) => Some(
                            serde_json::from_value::<Path>(value.clone())
                                .map_err(|err| CommandError::InvalidArg(err.to_string()))?,
                        ),
                    };
                    editor.execute(&Command::ToggleChecked { path })
                },
            )
            .description("Flip the checked state of a check-list item.")
            .keywords(["todo", "task", "checkbox", "checked"])
            .args_example(serde_json::json!({ "path": [0, 0] })),
        ]
    }

    fn queries(&self) -> Vec<QuerySpec> {
        vec![
            QuerySpec::new("checklist.is_active", |editor, _args| {
                Ok(Value::Bool(query::is_checklist_active(editor.state())))
            }),
            QuerySpec::new("checklist.is_checked", |editor, _args| {
                Ok(Value::Bool(query::is_checked(editor.state())))
            }),
        ]
    }
}

struct LinkPlugin;

impl PlatePlugin for LinkPlugin {
    fn id(&self) -> &'static str {
        "link"
    }

    fn commands(&self) -> Vec<CommandSpec> {
        vec![
            CommandSpec::new("link.toggle", "Toggle link", |editor, args| {
                let url = command_str_arg(args.as_ref(), "url")?.to_string();
                editor.execute(&Command::ToggleLink { url })
            })
            .description("Insert a link at the caret, or wrap the selection in one.")
            .keywords(["link", "url", "hyperlink"])
            .args_example(serde_json::json!({ "url": "https://example.com" })),
            CommandSpec::new("link.untoggle", "Remove link", |editor, _args| {
                editor.execute(&Command::UnToggleLink)
            })
            .description("Unwrap every link touching the selection.")
            .keywords(["link", "unlink", "url", "hyperlink"]),
        ]
    }

    fn queries(&self) -> Vec<QuerySpec> {
        vec![QuerySpec::new("link.is_active", |editor, _args| {
            Ok(Value::Bool(query::is_link_active(editor.state())))
        })]
    }
}

struct ImagePlugin;

impl PlatePlugin for ImagePlugin {
    fn id(&self) -> &'static str {
        "image"
    }

    fn commands(&self) -> Vec<CommandSpec> {
        vec![
            CommandSpec::new("image.toggle", "Insert image", |editor, args| {
                let url = command_str_arg(args.as_ref(), "url")?.trim().to_string();
                if url.is_empty() {
                    return Err(CommandError::InvalidArg("url must not be empty".into()));
                }
                editor.execute(&Command::ToggleImage { url })
            })
            .description("Insert a block image followed by an empty paragraph.")
            .keywords(["image", "img", "media", "void"])
            .args_example(serde_json::json!({ "url": "https://example.com/image.png" })),
        ]
    }
}

struct EmojiPlugin;

impl PlatePlugin for EmojiPlugin {
    fn id(&self) -> &'static str {
        "emoji"
    }

    fn commands(&self) -> Vec<CommandSpec> {
        vec![
            CommandSpec::new("emoji.toggle", "Insert emoji", |editor, args| {
                let emoji = command_str_arg(args.as_ref(), "emoji")?.to_string();
                editor.execute(&Command::ToggleEmoji { emoji })
            })
            .description("Insert an emoji as text at the selection.")
            .keywords(["emoji", "emote"])
            .args_example(serde_json::json!({ "emoji": "🎉" })),
        ]
    }
}
