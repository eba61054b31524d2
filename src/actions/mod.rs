//! User-invokable actions and their handlers.
//!
//! Each handler reads the current function from the host, builds a prompt,
//! and dispatches it through the active [`ModelClient`](crate::provider::ModelClient),
//! wiring a callback that applies the completion on the UI thread.

mod explain;
mod rename;
mod rename_all;
mod select_model;

pub use explain::ExplainHandler;
pub use rename::{parse_rename_map, RenameHandler};
pub use rename_all::RenameAllHandler;
pub use select_model::{ModelSwitcher, SelectModelHandler};

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use regex::Regex;
use std::sync::LazyLock;
use tracing::debug;

use crate::constants::NO_FUNCTION_MSG;
use crate::host::{Decompiler, FunctionRef, Host};

/// Kind of widget an action is invoked from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WidgetKind {
    Pseudocode,
    Disassembly,
    Other,
}

/// What the host knows about an invocation.
#[derive(Debug, Clone)]
pub struct ActionContext {
    pub widget: WidgetKind,
}

impl ActionContext {
    pub fn new(widget: WidgetKind) -> Self {
        Self { widget }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionState {
    Enabled,
    Disabled,
}

/// Every action implements this trait.
pub trait ActionHandler: Send + Sync {
    /// Runs the action. Called on the UI thread.
    fn activate(&self, ctx: &ActionContext);

    /// Whether the host should let the user invoke the action.
    fn state(&self, _ctx: &ActionContext) -> ActionState {
        ActionState::Enabled
    }
}

/// An action as registered with the host.
#[derive(Clone)]
pub struct ActionDesc {
    /// Unique internal name, e.g. `gepetto:explain_function`.
    pub name: String,
    /// Text shown in menus.
    pub label: String,
    pub handler: Arc<dyn ActionHandler>,
    pub shortcut: Option<String>,
    pub tooltip: String,
    pub icon: i32,
}

impl ActionDesc {
    pub fn new(name: &str, label: &str, handler: Arc<dyn ActionHandler>) -> Self {
        Self {
            name: name.to_string(),
            label: label.to_string(),
            handler,
            shortcut: None,
            tooltip: String::new(),
            icon: crate::constants::NO_ICON,
        }
    }

    pub fn with_shortcut(mut self, shortcut: &str) -> Self {
        self.shortcut = Some(shortcut.to_string());
        self
    }

    pub fn with_tooltip(mut self, tooltip: impl Into<String>) -> Self {
        self.tooltip = tooltip.into();
        self
    }

    pub fn with_icon(mut self, icon: i32) -> Self {
        self.icon = icon;
        self
    }
}

impl fmt::Debug for ActionDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionDesc")
            .field("name", &self.name)
            .field("label", &self.label)
            .field("shortcut", &self.shortcut)
            .field("tooltip", &self.tooltip)
            .field("icon", &self.icon)
            .finish_non_exhaustive()
    }
}

static IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier pattern is valid"));

/// Whether `name` can be used as a C identifier.
pub(crate) fn is_identifier(name: &str) -> bool {
    IDENTIFIER.is_match(name)
}

/// The current function and its pseudocode, or `None` after telling the user why not.
pub(crate) fn current_pseudocode<H: Host + ?Sized>(host: &H) -> Option<(FunctionRef, String)> {
    let Some(func) = host.current_function() else {
        host.msg(NO_FUNCTION_MSG);
        return None;
    };
    match host.pseudocode(&func) {
        Some(code) => Some((func, code)),
        None => {
            host.msg(&format!("Could not decompile {}.", func.name));
            None
        }
    }
}

/// Applies `mapping` to `func` and returns how many names changed.
///
/// Only parameters and locals the host reports for `func` are renamed, plus
/// the function itself when `include_function` is set. Proposed names that
/// are not identifiers are skipped.
pub(crate) fn apply_renames<D: Decompiler + ?Sized>(
    host: &D,
    func: &FunctionRef,
    mapping: &[(String, String)],
    include_function: bool,
) -> usize {
    let locals: HashSet<String> = host.local_variables(func).into_iter().collect();
    let mut renamed = 0;
    for (old, new) in mapping {
        if old == new {
            continue;
        }
        if !is_identifier(new) {
            debug!(%old, %new, "skipping invalid proposed name");
            continue;
        }
        let applied = if include_function && *old == func.name {
            host.rename_function(func, new)
        } else if locals.contains(old) {
            host.rename_local(func, old, new)
        } else {
            debug!(%old, function = %func.name, "not a local of the function");
            false
        };
        if applied {
            renamed += 1;
        }
    }
    renamed
}
