use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::commands::{self, Command};
use crate::error::{ApplyError, CommandError, QueryError};
use crate::location::{Point, Selection};
use crate::node::{Document, Marks, Node};
use crate::normalize::normalize_selection;
use crate::ops::{Op, Transaction};
use crate::plugin::PluginRegistry;
use crate::schema::FormatConfig;
use crate::transforms::Draft;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EditorState {
    pub doc: Document,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selection: Option<Selection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub marks: Option<Marks>,
}

impl EditorState {
    pub fn new(doc: Document, selection: Option<Selection>) -> Self {
        Self {
            doc,
            selection,
            marks: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct UndoRecord {
    pub inverse_ops: Vec<Op>,
    pub selection_before: Option<Selection>,
    pub selection_after: Option<Selection>,
}

const DEFAULT_MAX_UNDO: usize = 200;
const DEFAULT_MAX_NORMALIZE_ITERATIONS: usize = 100;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    pub max_undo: usize,
    pub max_normalize_iterations: usize,
    pub formats: FormatConfig,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            max_undo: DEFAULT_MAX_UNDO,
            max_normalize_iterations: DEFAULT_MAX_NORMALIZE_ITERATIONS,
            formats: FormatConfig::default(),
        }
    }
}

impl EditorConfig {
    fn with_defaults(mut self) -> Self {
        if self.max_undo == 0 {
            self.max_undo = DEFAULT_MAX_UNDO;
        }
        if self.max_normalize_iterations == 0 {
            self.max_normalize_iterations = DEFAULT_MAX_NORMALIZE_ITERATIONS;
        }
        self
    }
}

#[derive(Debug, Clone)]
pub struct Commit {
    pub state: EditorState,
    pub ops: Vec<Op>,
    pub inverse_ops: Vec<Op>,
}

pub fn apply_command(
    state: &EditorState,
    registry: &PluginRegistry,
    config: &EditorConfig,
    command: &Command,
) -> Result<Commit, CommandError> {
    let mut draft = Draft::new(state.clone());
    commands::execute(&mut draft, &config.formats, command)?;
    draft.normalize(registry.normalize_passes(), config.max_normalize_iterations)?;
    let (state, ops, inverse_ops) = draft.finish();
    Ok(Commit {
        state,
        ops,
        inverse_ops,
    })
}

pub struct Editor {
    state: EditorState,
    registry: PluginRegistry,
    config: EditorConfig,
    undo_stack: Vec<UndoRecord>,
    redo_stack: Vec<UndoRecord>,
}

impl Editor {
    /// Loads `doc` and normalizes it. Fails when the document cannot be
    /// brought into shape within `max_normalize_iterations`.
    pub fn new(
        doc: Document,
        selection: Option<Selection>,
        registry: PluginRegistry,
    ) -> Result<Self, ApplyError> {
        Self::with_config(doc, selection, registry, EditorConfig::default())
    }

    pub fn with_config(
        doc: Document,
        selection: Option<Selection>,
        registry: PluginRegistry,
        config: EditorConfig,
    ) -> Result<Self, ApplyError> {
        let config = config.with_defaults();
        let mut draft = Draft::new(EditorState::new(doc, selection));
        draft.normalize(registry.normalize_passes(), config.max_normalize_iterations)?;
        Ok(Self {
            state: draft.finish().0,
            registry,
            config,
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
        })
    }

    pub fn with_core_plugins() -> Self {
        Self::empty(PluginRegistry::core())
    }

    pub fn with_richtext_plugins() -> Self {
        Self::empty(PluginRegistry::richtext())
    }

    // An empty paragraph with the caret in it is already normal.
    fn empty(registry: PluginRegistry) -> Self {
        let doc = Document::new(vec![Node::paragraph("")]);
        let selection = Selection::collapsed(Point::new(vec![0, 0], 0));
        Self {
            state: EditorState::new(doc, Some(selection)),
            registry,
            config: EditorConfig::default(),
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
        }
    }

    pub fn doc(&self) -> &Document {
        &self.state.doc
    }

    pub fn selection(&self) -> Option<&Selection> {
        self.state.selection.as_ref()
    }

    pub fn marks(&self) -> Option<Marks> {
        self.state.marks
    }

    pub fn state(&self) -> &EditorState {
        &self.state
    }

    pub fn registry(&self) -> &PluginRegistry {
        &self.registry
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn formats(&self) -> &FormatConfig {
        &self.config.formats
    }

    pub fn set_selection(&mut self, selection: Option<Selection>) {
        self.state.selection = selection.and_then(|sel| normalize_selection(&self.state.doc, &sel));
        self.state.marks = None;
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo(&mut self) -> bool {
        let Some(record) = self.undo_stack.pop() else {
            return false;
        };
        let UndoRecord {
            inverse_ops,
            selection_before,
            selection_after,
        } = record;

        let Some(redo_ops) = self.replay(inverse_ops, selection_before.clone()) else {
            return false;
        };
        self.redo_stack.push(UndoRecord {
            inverse_ops: redo_ops,
            selection_before,
            selection_after,
        });
        true
    }

    pub fn redo(&mut self) -> bool {
        let Some(record) = self.redo_stack.pop() else {
            return false;
        };
        let UndoRecord {
            inverse_ops,
            selection_before,
            selection_after,
        } = record;

        let Some(undo_ops) = self.replay(inverse_ops, selection_after.clone()) else {
            return false;
        };
        self.undo_stack.push(UndoRecord {
            inverse_ops: undo_ops,
            selection_before,
            selection_after,
        });
        true
    }

    fn replay(&mut self, ops: Vec<Op>, selection: Option<Selection>) -> Option<Vec<Op>> {
        let mut draft = Draft::new(self.state.clone());
        for op in ops {
            if let Err(err) = draft.apply(op) {
                tracing::warn!(%err, "history replay failed");
                return None;
            }
        }
        draft.select(selection);
        if let Err(err) = draft.normalize(
            self.registry.normalize_passes(),
            self.config.max_normalize_iterations,
        ) {
            tracing::warn!(%err, "history replay failed");
            return None;
        }
        let (state, _, inverse_ops) = draft.finish();
        self.state = state;
        Some(inverse_ops)
    }

    pub fn apply(&mut self, tx: Transaction) -> Result<(), ApplyError> {
        tracing::debug!(source = ?tx.meta.source, ops = tx.ops.len(), "apply transaction");
        let mut draft = Draft::new(self.state.clone());
        for op in tx.ops {
            draft.apply(op)?;
        }
        if let Some(sel) = tx.selection_after {
            draft.select(Some(sel));
        }
        draft.normalize(
            self.registry.normalize_passes(),
            self.config.max_normalize_iterations,
        )?;
        let (state, ops, inverse_ops) = draft.finish();
        self.commit(Commit {
            state,
            ops,
            inverse_ops,
        });
        Ok(())
    }

    pub fn execute(&mut self, command: &Command) -> Result<(), CommandError> {
        tracing::debug!(command = command.name(), "execute command");
        match apply_command(&self.state, &self.registry, &self.config, command) {
            Ok(commit) => {
                self.commit(commit);
                Ok(())
            }
            Err(err) => {
                tracing::warn!(command = command.name(), %err, "command failed");
                Err(err)
            }
        }
    }

    pub fn handle_hotkey(&mut self, hotkey: &str) -> Result<bool, CommandError> {
        if self.config.formats.mark_for_hotkey(hotkey).is_none() {
            tracing::debug!(hotkey, "unbound hotkey");
            return Ok(false);
        }
        self.execute(&Command::ToggleHotkey {
            hotkey: hotkey.to_string(),
        })?;
        Ok(true)
    }

    fn commit(&mut self, commit: Commit) {
        let Commit {
            state,
            ops,
            inverse_ops,
        } = commit;
        let selection_before = self.state.selection.clone();
        self.state = state;
        if ops.is_empty() {
            return;
        }

        self.undo_stack.push(UndoRecord {
            inverse_ops,
            selection_before,
            selection_after: self.state.selection.clone(),
        });
        self.redo_stack.clear();
        if self.undo_stack.len() > self.config.max_undo {
            self.undo_stack.remove(0);
        }
    }

    pub fn run_command(&mut self, id: &str, args: Option<Value>) -> Result<(), CommandError> {
        let Some(command) = self.registry.command(id) else {
            return Err(CommandError::UnknownCommand(id.to_string()));
        };
        (command.handler)(self, args)
    }

    pub fn run_query_json(&self, id: &str, args: Option<Value>) -> Result<Value, QueryError> {
        let Some(query) = self.registry.query(id) else {
            return Err(QueryError::UnknownQuery(id.to_string()));
        };
        (query.handler)(self, args)
    }

    pub fn run_query<T>(&self, id: &str, args: Option<Value>) -> Result<T, QueryError>
    where
        T: DeserializeOwned,
    {
        let value = self.run_query_json(id, args)?;
        serde_json::from_value(value).map_err(|err| QueryError::Decode(err.to_string()))
    }
}
