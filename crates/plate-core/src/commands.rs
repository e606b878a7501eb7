use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CommandError;
use crate::location::Path;
use crate::node::{ATTR_ALIGN, ATTR_CHECKED, ATTR_URL, ElementKind, ElementNode, Mark, Node};
use crate::ops::{AttrPatch, Op};
use crate::query::{self, BlockAttr};
use crate::schema::{BlockFormat, FormatConfig};
use crate::transforms::{Draft, Edge, Mutation, NodeMatch, PropsPatch, closest_of_kind};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Command {
    ToggleMark { mark: Mark },
    ToggleHotkey { hotkey: String },
    ToggleBlock { format: String },
    ToggleChecklist,
    ToggleChecked {
        #[serde(default)]
        path: Option<Path>,
    },
    ToggleLink { url: String },
    UnToggleLink,
    ToggleImage { url: String },
    ToggleEmoji { emoji: String },
    InsertText { text: String },
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::ToggleMark { .. } => "toggle_mark",
            Command::ToggleHotkey { .. } => "toggle_hotkey",
            Command::ToggleBlock { .. } => "toggle_block",
            Command::ToggleChecklist => "toggle_checklist",
            Command::ToggleChecked { .. } => "toggle_checked",
            Command::ToggleLink { .. } => "toggle_link",
            Command::UnToggleLink => "un_toggle_link",
            Command::ToggleImage { .. } => "toggle_image",
            Command::ToggleEmoji { .. } => "toggle_emoji",
            Command::InsertText { .. } => "insert_text",
        }
    }
}

pub fn execute(
    draft: &mut Draft,
    config: &FormatConfig,
    command: &Command,
) -> Result<(), CommandError> {
    match command {
        Command::ToggleMark { mark } => toggle_mark(draft, *mark),
        Command::ToggleHotkey { hotkey } => toggle_hotkey(draft, config, hotkey).map(|_| ()),
        Command::ToggleBlock { format } => toggle_block(draft, config, format),
        Command::ToggleChecklist => toggle_checklist(draft),
        Command::ToggleChecked { path } => toggle_checked(draft, path.as_deref()),
        Command::ToggleLink { url } => toggle_link(draft, url),
        Command::UnToggleLink => un_toggle_link(draft),
        Command::ToggleImage { url } => toggle_image(draft, url),
        Command::ToggleEmoji { emoji } => toggle_emoji(draft, emoji),
        Command::InsertText { text } => Ok(draft.insert_text(text)?),
    }
}

pub fn toggle_mark(draft: &mut Draft, mark: Mark) -> Result<(), CommandError> {
    if query::is_mark_active(draft.state(), mark) {
        draft.remove_mark(mark)?;
    } else {
        draft.add_mark(mark)?;
    }
    Ok(())
}

pub fn toggle_hotkey(
    draft: &mut Draft,
    config: &FormatConfig,
    hotkey: &str,
) -> Result<bool, CommandError> {
    let Some(mark) = config.mark_for_hotkey(hotkey) else {
        return Ok(false);
    };
    toggle_mark(draft, mark)?;
    Ok(true)
}

pub fn toggle_block(
    draft: &mut Draft,
    config: &FormatConfig,
    format: &str,
) -> Result<(), CommandError> {
    let spec = config
        .classify(format)
        .ok_or_else(|| CommandError::UnknownFormat(format.to_string()))?;

    match spec.format {
        BlockFormat::Align(align) => {
            let active = query::is_block_active(draft.state(), BlockAttr::Align(align));
            let props = if active {
                PropsPatch::default().remove_attr(ATTR_ALIGN)
            } else {
                PropsPatch::default().set_attr(ATTR_ALIGN, Value::from(align.as_str()))
            };
            draft.run(Mutation::set(props))?;
        }
        BlockFormat::Kind(kind) => {
            let active = query::is_block_active(draft.state(), BlockAttr::Type(kind));

            let lists = NodeMatch::AnyKind(config.list_kinds.clone());
            draft.run(Mutation::unwrap(lists).split(true))?;

            let next_kind = if active {
                ElementKind::Paragraph
            } else if spec.is_list {
                ElementKind::ListItem
            } else {
                kind
            };
            draft.run(Mutation::set(PropsPatch::kind(next_kind)))?;

            if !active && spec.is_list {
                draft.run(Mutation::wrap(ElementNode::new(kind, Vec::new())))?;
            }
        }
    }
    Ok(())
}

pub fn toggle_checklist(draft: &mut Draft) -> Result<(), CommandError> {
    let active = query::is_checklist_active(draft.state());

    draft.run(Mutation::unwrap(NodeMatch::Kind(ElementKind::CheckList)).split(true))?;

    if active {
        let props = PropsPatch::kind(ElementKind::Paragraph).remove_attr(ATTR_CHECKED);
        draft.run(Mutation::set(props))?;
    } else {
        let props =
            PropsPatch::kind(ElementKind::CheckListItem).set_attr(ATTR_CHECKED, Value::Bool(false));
        draft.run(Mutation::set(props))?;
        draft.run(Mutation::wrap(ElementNode::new(ElementKind::CheckList, Vec::new())))?;
    }
    Ok(())
}

pub fn toggle_checked(draft: &mut Draft, path: Option<&[usize]>) -> Result<(), CommandError> {
    let at = match path {
        Some(path) => path.to_vec(),
        None => match draft.selection() {
            Some(sel) => sel.focus.path.clone(),
            None => return Ok(()),
        },
    };
    let Some(item_path) = closest_of_kind(draft.doc(), &at, ElementKind::CheckListItem) else {
        return Ok(());
    };
    let checked = draft
        .doc()
        .element(&item_path)
        .and_then(|el| el.checked())
        .unwrap_or(false);
    draft.apply(Op::SetNodeAttrs {
        path: item_path,
        patch: AttrPatch::set(ATTR_CHECKED, Value::Bool(!checked)),
    })?;
    Ok(())
}

pub fn toggle_link(draft: &mut Draft, url: &str) -> Result<(), CommandError> {
    if query::is_link_active(draft.state()) {
        un_toggle_link(draft)?;
    }

    let Some(collapsed) = draft.selection().map(|sel| sel.is_collapsed()) else {
        return Ok(());
    };
    if collapsed {
        draft.insert_nodes(vec![Node::link(url, url)])?;
    } else {
        let link = ElementNode::new(ElementKind::Link, Vec::new())
            .with_attr(ATTR_URL, Value::from(url));
        draft.run(Mutation::wrap(link).split(true))?;
        draft.collapse(Edge::End);
    }
    Ok(())
}

pub fn un_toggle_link(draft: &mut Draft) -> Result<(), CommandError> {
    draft.run(Mutation::unwrap(NodeMatch::Kind(ElementKind::Link)).split(true))?;
    Ok(())
}

pub fn toggle_image(draft: &mut Draft, url: &str) -> Result<(), CommandError> {
    draft.insert_nodes(vec![Node::image(url), Node::paragraph("")])?;
    Ok(())
}

pub fn toggle_emoji(draft: &mut Draft, emoji: &str) -> Result<(), CommandError> {
    draft.insert_text(emoji)?;
    Ok(())
}
