//! Host integration points.
//!
//! The disassembler/decompiler hosting the plugin is reached only through
//! these traits. A real host adapter forwards them to the host's SDK; the
//! console host in the binary implements them over pseudocode files.
//!
//! All methods take `&self`: hosts keep their state behind interior
//! mutability, and every method that mutates the display is only called from
//! the UI thread (directly from an action handler, or from a task passed to
//! [`UiBridge::execute_sync`]).

use std::sync::Arc;

use crate::actions::{ActionDesc, WidgetKind};

/// A unit of work to run on the host's UI thread.
pub type UiTask = Box<dyn FnOnce() + Send + 'static>;

/// Identifies an installed popup hook so it can be removed again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HookId(pub u64);

/// A decompiled function, identified by its entry address.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FunctionRef {
    pub address: u64,
    pub name: String,
}

impl FunctionRef {
    pub fn new(address: u64, name: impl Into<String>) -> Self {
        Self {
            address,
            name: name.into(),
        }
    }
}

/// Entries collected for one context menu while it is being built.
#[derive(Debug, Default)]
pub struct Popup {
    entries: Vec<PopupEntry>,
}

/// An action attached to a context menu under a submenu path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PopupEntry {
    pub action: String,
    pub path: String,
}

impl Popup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `action` under the submenu `path` (e.g. `"Gepetto/"`).
    pub fn attach(&mut self, action: &str, path: &str) {
        self.entries.push(PopupEntry {
            action: action.to_string(),
            path: path.to_string(),
        });
    }

    pub fn entries(&self) -> &[PopupEntry] {
        &self.entries
    }
}

/// Called by the host each time it finishes building a widget's context menu.
pub trait PopupHook: Send + Sync {
    fn populate(&self, widget: WidgetKind, popup: &mut Popup);
}

/// Registration of user-invokable actions, menu entries and popup hooks.
pub trait ActionRegistry: Send + Sync {
    /// Registers an action. Returns `false` if the name is already taken.
    fn register_action(&self, desc: ActionDesc) -> bool;

    /// Removes an action. Returns `false` if it was not registered.
    fn unregister_action(&self, name: &str) -> bool;

    /// Appends `action` to the menu at `menu_path`.
    fn attach_action_to_menu(&self, menu_path: &str, action: &str) -> bool;

    fn detach_action_from_menu(&self, menu_path: &str, action: &str) -> bool;

    fn hook_popups(&self, hook: Arc<dyn PopupHook>) -> HookId;

    fn unhook_popups(&self, id: HookId) -> bool;
}

/// Read and write access to the decompiler's view of the program.
pub trait Decompiler: Send + Sync {
    /// Whether a decompiler is available at all. Without one the plugin skips loading.
    fn is_available(&self) -> bool;

    /// The function under the cursor, if any.
    fn current_function(&self) -> Option<FunctionRef>;

    /// Decompiled pseudocode of `func`, or `None` if decompilation failed.
    fn pseudocode(&self, func: &FunctionRef) -> Option<String>;

    /// Names of the function's parameters and local variables.
    fn local_variables(&self, func: &FunctionRef) -> Vec<String>;

    /// Functions called directly by `func`.
    fn callees(&self, _func: &FunctionRef) -> Vec<FunctionRef> {
        Vec::new()
    }

    fn rename_local(&self, func: &FunctionRef, old: &str, new: &str) -> bool;

    fn rename_function(&self, func: &FunctionRef, new: &str) -> bool;

    fn set_function_comment(&self, func: &FunctionRef, comment: &str);

    /// Redraws the pseudocode view after a change.
    fn refresh(&self) {}
}

/// The host's UI thread: its execution queue and its message window.
pub trait UiBridge: Send + Sync {
    /// Queues `task` for the UI thread.
    fn execute_sync(&self, task: UiTask);

    /// Prints a line to the host's output window. Safe from any thread.
    fn msg(&self, text: &str);
}

/// Everything the plugin needs from its host.
pub trait Host: ActionRegistry + Decompiler + UiBridge {}

impl<T: ActionRegistry + Decompiler + UiBridge + ?Sized> Host for T {}
