//! A [`Host`](gepetto::host::Host) over pseudocode files.
//!
//! Functions are read from text files once; renames and comments are applied
//! in memory and only reach the disk through [`ConsoleHost::write_back`].
//! The REPL thread plays the role of the UI thread: queued tasks run when it
//! calls [`ConsoleHost::pump`].

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use colored::Colorize;
use regex::Regex;
use tracing::{debug, warn};

use gepetto::actions::{ActionContext, ActionDesc, ActionState, WidgetKind};
use gepetto::constants::{
    DISPLAY_NAME, EXPLAIN_ACTION, RENAME_ACTION, RENAME_ALL_ACTION,
};
use gepetto::host::{
    ActionRegistry, Decompiler, FunctionRef, HookId, Popup, PopupEntry, PopupHook, UiBridge,
    UiTask,
};
use gepetto::provider::ActiveModel;

use super::parse::{address_from_name, called_names, parse_functions, render_comment};

/// Base for addresses given to functions whose name carries none.
const SYNTHETIC_BASE: u64 = 0x1000_0000;

const PUMP_INTERVAL: Duration = Duration::from_millis(50);

struct LoadedFunction {
    func: FunctionRef,
    source: PathBuf,
    code: String,
    locals: Vec<String>,
    callees: Vec<u64>,
    comment: Option<String>,
}

impl LoadedFunction {
    fn render(&self) -> String {
        match &self.comment {
            Some(comment) => format!("{}{}", render_comment(comment), self.code),
            None => self.code.clone(),
        }
    }
}

/// A menu entry as the console shows it.
pub struct MenuLine {
    pub path: String,
    pub label: String,
    pub shortcut: Option<String>,
    pub checked: bool,
    pub enabled: bool,
}

#[derive(Default)]
struct HostState {
    functions: Vec<LoadedFunction>,
    current: Option<usize>,
    actions: BTreeMap<String, ActionDesc>,
    menus: Vec<(String, String)>,
    hooks: Vec<(HookId, Arc<dyn PopupHook>)>,
    next_hook: u64,
}

pub struct ConsoleHost {
    state: Mutex<HostState>,
    queue: Sender<UiTask>,
    tasks: Mutex<Receiver<UiTask>>,
}

impl ConsoleHost {
    /// Loads every function found in `paths`; the first one becomes current.
    pub fn load(paths: &[PathBuf]) -> Result<Arc<Self>> {
        let mut functions = Vec::new();
        for path in paths {
            let source = fs::read_to_string(path)
                .with_context(|| format!("Failed to read pseudocode from {:?}", path))?;
            let parsed = parse_functions(&source);
            if parsed.is_empty() {
                warn!(path = %path.display(), "no functions found");
            }
            for p in parsed {
                let address = address_from_name(&p.name)
                    .unwrap_or(SYNTHETIC_BASE + functions.len() as u64 * 0x100);
                functions.push(LoadedFunction {
                    func: FunctionRef::new(address, p.name),
                    source: path.clone(),
                    code: p.code,
                    locals: p.locals,
                    callees: Vec::new(),
                    comment: p.comment,
                });
            }
        }
        if functions.is_empty() {
            bail!("No functions found in {} file(s)", paths.len());
        }

        let names: Vec<String> = functions.iter().map(|f| f.func.name.clone()).collect();
        let known: Vec<&str> = names.iter().map(String::as_str).collect();
        let callees: Vec<Vec<u64>> = functions
            .iter()
            .map(|f| {
                called_names(&f.code, &f.func.name, &known)
                    .into_iter()
                    .filter_map(|n| functions.iter().find(|g| g.func.name == n))
                    .map(|g| g.func.address)
                    .collect()
            })
            .collect();
        for (f, c) in functions.iter_mut().zip(callees) {
            f.callees = c;
        }
        debug!(count = functions.len(), "pseudocode loaded");

        let (queue, tasks) = mpsc::channel();
        Ok(Arc::new(Self {
            state: Mutex::new(HostState {
                functions,
                current: Some(0),
                ..HostState::default()
            }),
            queue,
            tasks: Mutex::new(tasks),
        }))
    }

    fn lock(&self) -> MutexGuard<'_, HostState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Every loaded function, with a flag for the current one.
    pub fn functions(&self) -> Vec<(FunctionRef, bool)> {
        let state = self.lock();
        state
            .functions
            .iter()
            .enumerate()
            .map(|(i, f)| (f.func.clone(), state.current == Some(i)))
            .collect()
    }

    /// Moves the cursor to the function named `target` (or at address `0x...`).
    pub fn goto(&self, target: &str) -> Result<FunctionRef> {
        let address = target
            .strip_prefix("0x")
            .and_then(|hex| u64::from_str_radix(hex, 16).ok());
        let mut state = self.lock();
        let index = state
            .functions
            .iter()
            .position(|f| f.func.name == target || Some(f.func.address) == address)
            .with_context(|| format!("No function named {target}"))?;
        state.current = Some(index);
        Ok(state.functions[index].func.clone())
    }

    /// The current function as the pseudocode view shows it.
    pub fn render_current(&self) -> Option<(FunctionRef, String)> {
        let state = self.lock();
        let f = state.functions.get(state.current?)?;
        Some((f.func.clone(), f.render()))
    }

    /// Name and rendered text of every function, to diff against later.
    pub fn snapshot(&self) -> Vec<(String, String)> {
        self.lock()
            .functions
            .iter()
            .map(|f| (f.func.name.clone(), f.render()))
            .collect()
    }

    pub fn menu(&self) -> Vec<MenuLine> {
        let state = self.lock();
        let ctx = ActionContext::new(WidgetKind::Pseudocode);
        state
            .menus
            .iter()
            .filter_map(|(path, name)| {
                let desc = state.actions.get(name)?;
                Some(MenuLine {
                    path: path.clone(),
                    label: desc.label.clone(),
                    shortcut: desc.shortcut.clone(),
                    checked: desc.icon == gepetto::constants::CHECK_MARK_ICON,
                    enabled: desc.handler.state(&ctx) == ActionState::Enabled,
                })
            })
            .collect()
    }

    /// Context menu entries the installed hooks add for `widget`.
    pub fn popup(&self, widget: WidgetKind) -> Vec<PopupEntry> {
        let hooks: Vec<Arc<dyn PopupHook>> =
            self.lock().hooks.iter().map(|(_, h)| Arc::clone(h)).collect();
        let mut popup = Popup::new();
        for hook in hooks {
            hook.populate(widget, &mut popup);
        }
        popup.entries().to_vec()
    }

    /// Runs the action named by `key`: an action name, its hotkey, its menu
    /// label, or one of the short aliases `explain`, `rename`, `rename-all`.
    pub fn invoke(&self, key: &str) -> Result<()> {
        let desc = {
            let state = self.lock();
            let alias = match key {
                "explain" => Some(EXPLAIN_ACTION),
                "rename" => Some(RENAME_ACTION),
                "rename-all" | "rename_all" => Some(RENAME_ALL_ACTION),
                _ => None,
            };
            let found = state.actions.values().find(|d| {
                Some(d.name.as_str()) == alias
                    || d.name == key
                    || d.label.eq_ignore_ascii_case(key)
                    || d.shortcut.as_deref().is_some_and(|s| s.eq_ignore_ascii_case(key))
            });
            found.cloned().with_context(|| format!("Unknown action: {key}"))?
        };
        // The registry lock is released: handlers call back into the host.
        let ctx = ActionContext::new(WidgetKind::Pseudocode);
        if desc.handler.state(&ctx) == ActionState::Disabled {
            bail!("{} is disabled", desc.label);
        }
        desc.handler.activate(&ctx);
        Ok(())
    }

    /// Runs UI tasks until `active` has nothing in flight and the queue is empty.
    pub fn pump(&self, active: &ActiveModel) {
        let tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        loop {
            while let Ok(task) = tasks.try_recv() {
                task();
            }
            if active.pending() == 0 {
                // Work that finished after the last drain may have queued more.
                while let Ok(task) = tasks.try_recv() {
                    task();
                }
                return;
            }
            match tasks.recv_timeout(PUMP_INTERVAL) {
                Ok(task) => task(),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => return,
            }
        }
    }

    /// Writes every file back with the current names and comments.
    pub fn write_back(&self) -> Result<Vec<PathBuf>> {
        let state = self.lock();
        let mut files: BTreeMap<&Path, Vec<String>> = BTreeMap::new();
        for f in &state.functions {
            files.entry(f.source.as_path()).or_default().push(f.render());
        }
        let mut written = Vec::new();
        for (path, bodies) in files {
            let mut text = bodies.join("\n\n");
            text.push('\n');
            fs::write(path, text).with_context(|| format!("Failed to write {:?}", path))?;
            written.push(path.to_path_buf());
        }
        Ok(written)
    }

    fn with_function<R>(
        &self,
        address: u64,
        f: impl FnOnce(&mut LoadedFunction) -> R,
    ) -> Option<R> {
        let mut state = self.lock();
        state
            .functions
            .iter_mut()
            .find(|l| l.func.address == address)
            .map(f)
    }
}

fn word(name: &str) -> Option<Regex> {
    Regex::new(&format!(r"\b{}\b", regex::escape(name))).ok()
}

impl ActionRegistry for ConsoleHost {
    fn register_action(&self, desc: ActionDesc) -> bool {
        let mut state = self.lock();
        if state.actions.contains_key(&desc.name) {
            return false;
        }
        state.actions.insert(desc.name.clone(), desc);
        true
    }

    fn unregister_action(&self, name: &str) -> bool {
        self.lock().actions.remove(name).is_some()
    }

    fn attach_action_to_menu(&self, menu_path: &str, action: &str) -> bool {
        let mut state = self.lock();
        if !state.actions.contains_key(action) {
            return false;
        }
        state.menus.push((menu_path.to_string(), action.to_string()));
        true
    }

    fn detach_action_from_menu(&self, menu_path: &str, action: &str) -> bool {
        let mut state = self.lock();
        let before = state.menus.len();
        state.menus.retain(|(p, a)| !(p == menu_path && a == action));
        state.menus.len() != before
    }

    fn hook_popups(&self, hook: Arc<dyn PopupHook>) -> HookId {
        let mut state = self.lock();
        state.next_hook += 1;
        let id = HookId(state.next_hook);
        state.hooks.push((id, hook));
        id
    }

    fn unhook_popups(&self, id: HookId) -> bool {
        let mut state = self.lock();
        let before = state.hooks.len();
        state.hooks.retain(|(h, _)| *h != id);
        state.hooks.len() != before
    }
}

impl Decompiler for ConsoleHost {
    fn is_available(&self) -> bool {
        true
    }

    fn current_function(&self) -> Option<FunctionRef> {
        let state = self.lock();
        state.functions.get(state.current?).map(|f| f.func.clone())
    }

    fn pseudocode(&self, func: &FunctionRef) -> Option<String> {
        self.with_function(func.address, |f| f.code.clone())
    }

    fn local_variables(&self, func: &FunctionRef) -> Vec<String> {
        self.with_function(func.address, |f| f.locals.clone())
            .unwrap_or_default()
    }

    fn callees(&self, func: &FunctionRef) -> Vec<FunctionRef> {
        let state = self.lock();
        let Some(caller) = state.functions.iter().find(|f| f.func.address == func.address) else {
            return Vec::new();
        };
        caller
            .callees
            .iter()
            .filter_map(|a| state.functions.iter().find(|f| f.func.address == *a))
            .map(|f| f.func.clone())
            .collect()
    }

    fn rename_local(&self, func: &FunctionRef, old: &str, new: &str) -> bool {
        let Some(pattern) = word(old) else {
            return false;
        };
        self.with_function(func.address, |f| {
            if !f.locals.iter().any(|l| l == old) || f.locals.iter().any(|l| l == new) {
                debug!(%old, %new, function = %f.func.name, "rename refused");
                return false;
            }
            for local in f.locals.iter_mut().filter(|l| *l == old) {
                *local = new.to_string();
            }
            f.code = pattern.replace_all(&f.code, new).into_owned();
            true
        })
        .unwrap_or(false)
    }

    fn rename_function(&self, func: &FunctionRef, new: &str) -> bool {
        let mut state = self.lock();
        if state.functions.iter().any(|f| f.func.name == new) {
            return false;
        }
        let Some(target) = state
            .functions
            .iter()
            .position(|f| f.func.address == func.address)
        else {
            return false;
        };
        let old = state.functions[target].func.name.clone();
        let Some(pattern) = word(&old) else {
            return false;
        };
        state.functions[target].func.name = new.to_string();
        // Call sites in other functions follow the new name.
        for f in &mut state.functions {
            f.code = pattern.replace_all(&f.code, new).into_owned();
        }
        debug!(%old, %new, "function renamed");
        true
    }

    fn set_function_comment(&self, func: &FunctionRef, comment: &str) {
        self.with_function(func.address, |f| f.comment = Some(comment.to_string()));
    }
}

impl UiBridge for ConsoleHost {
    fn execute_sync(&self, task: UiTask) {
        if self.queue.send(task).is_err() {
            warn!("UI queue closed, dropping task");
        }
    }

    fn msg(&self, text: &str) {
        println!("{} {}", format!("[{DISPLAY_NAME}]").cyan().bold(), text);
    }
}
