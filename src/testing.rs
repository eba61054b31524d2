//! In-memory host and model doubles shared by unit tests.

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

use regex::Regex;

use crate::actions::{ActionContext, ActionDesc, ActionState, WidgetKind};
use crate::error::{ConfigError, QueryError};
use crate::host::{
    ActionRegistry, Decompiler, FunctionRef, HookId, Popup, PopupEntry, PopupHook, UiBridge,
    UiTask,
};
use crate::models::ModelDescriptor;
use crate::provider::{ActiveModel, LanguageModel, ModelFactory, Query};

// --- Models ---

pub type Responder =
    Arc<dyn Fn(&ModelDescriptor, &Query) -> Result<String, QueryError> + Send + Sync>;

/// One call seen by a [`FakeModel`].
#[derive(Debug, Clone)]
pub struct Call {
    pub model: String,
    pub query: Query,
    pub thread: ThreadId,
}

#[derive(Default)]
pub struct CallLog {
    calls: Mutex<Vec<Call>>,
}

impl CallLog {
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }
}

pub struct FakeModel {
    descriptor: ModelDescriptor,
    responder: Responder,
    log: Arc<CallLog>,
}

impl FakeModel {
    pub fn new<F>(name: &str, responder: F) -> (Arc<Self>, Arc<CallLog>)
    where
        F: Fn(&ModelDescriptor, &Query) -> Result<String, QueryError> + Send + Sync + 'static,
    {
        let log = Arc::new(CallLog::default());
        let model = Arc::new(Self {
            descriptor: ModelDescriptor::new(name),
            responder: Arc::new(responder),
            log: Arc::clone(&log),
        });
        (model, log)
    }

    pub fn replying(name: &str, text: &str) -> (Arc<Self>, Arc<CallLog>) {
        let text = text.to_string();
        Self::new(name, move |_, _| Ok(text.clone()))
    }
}

impl LanguageModel for FakeModel {
    fn descriptor(&self) -> &ModelDescriptor {
        &self.descriptor
    }

    fn complete(&self, query: &Query) -> Result<String, QueryError> {
        self.log.calls.lock().unwrap().push(Call {
            model: self.descriptor.name().to_string(),
            query: query.clone(),
            thread: thread::current().id(),
        });
        (self.responder)(&self.descriptor, query)
    }
}

/// Builds [`FakeModel`]s sharing one responder and one call log.
pub struct FakeFactory {
    responder: Responder,
    pub log: Arc<CallLog>,
    rejected: Mutex<Vec<String>>,
}

impl FakeFactory {
    pub fn new<F>(responder: F) -> Arc<Self>
    where
        F: Fn(&ModelDescriptor, &Query) -> Result<String, QueryError> + Send + Sync + 'static,
    {
        Arc::new(Self {
            responder: Arc::new(responder),
            log: Arc::new(CallLog::default()),
            rejected: Mutex::new(Vec::new()),
        })
    }

    pub fn replying(text: &str) -> Arc<Self> {
        let text = text.to_string();
        Self::new(move |_, _| Ok(text.clone()))
    }

    /// Makes `build` fail for `name`.
    pub fn reject(&self, name: &str) {
        self.rejected.lock().unwrap().push(name.to_string());
    }
}

impl ModelFactory for FakeFactory {
    fn build(&self, descriptor: &ModelDescriptor) -> Result<Arc<dyn LanguageModel>, ConfigError> {
        if self.rejected.lock().unwrap().iter().any(|r| r == descriptor.name()) {
            return Err(ConfigError::MissingApiKey);
        }
        Ok(Arc::new(FakeModel {
            descriptor: descriptor.clone(),
            responder: Arc::clone(&self.responder),
            log: Arc::clone(&self.log),
        }))
    }
}

// --- Host ---

#[derive(Debug, Clone)]
pub struct FakeFunction {
    pub func: FunctionRef,
    pub code: String,
    pub locals: Vec<String>,
    pub callees: Vec<u64>,
    pub comment: Option<String>,
    pub decompiles: bool,
}

#[derive(Default)]
struct FakeState {
    actions: BTreeMap<String, ActionDesc>,
    menus: Vec<(String, String)>,
    hooks: Vec<(HookId, Arc<dyn PopupHook>)>,
    next_hook: u64,
    functions: Vec<FakeFunction>,
    current: Option<u64>,
    messages: Vec<String>,
    tasks: VecDeque<UiTask>,
}

/// A host whose UI queue only runs when the test drains it.
pub struct FakeHost {
    available: bool,
    state: Mutex<FakeState>,
    pub refreshes: AtomicUsize,
}

impl FakeHost {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            available: true,
            state: Mutex::new(FakeState::default()),
            refreshes: AtomicUsize::new(0),
        })
    }

    pub fn without_decompiler() -> Arc<Self> {
        Arc::new(Self {
            available: false,
            state: Mutex::new(FakeState::default()),
            refreshes: AtomicUsize::new(0),
        })
    }

    pub fn add_function(
        &self,
        address: u64,
        name: &str,
        code: &str,
        locals: &[&str],
    ) -> FunctionRef {
        let func = FunctionRef::new(address, name);
        let mut state = self.state.lock().unwrap();
        state.functions.push(FakeFunction {
            func: func.clone(),
            code: code.to_string(),
            locals: locals.iter().map(|l| l.to_string()).collect(),
            callees: Vec::new(),
            comment: None,
            decompiles: true,
        });
        if state.current.is_none() {
            state.current = Some(address);
        }
        func
    }

    pub fn add_callee(&self, caller: u64, callee: u64) {
        self.with_function(caller, |f| f.callees.push(callee));
    }

    pub fn break_decompilation(&self, address: u64) {
        self.with_function(address, |f| f.decompiles = false);
    }

    pub fn function(&self, address: u64) -> FakeFunction {
        let state = self.state.lock().unwrap();
        state
            .functions
            .iter()
            .find(|f| f.func.address == address)
            .cloned()
            .unwrap()
    }

    fn with_function<R>(&self, address: u64, f: impl FnOnce(&mut FakeFunction) -> R) -> Option<R> {
        let mut state = self.state.lock().unwrap();
        state
            .functions
            .iter_mut()
            .find(|fun| fun.func.address == address)
            .map(f)
    }

    pub fn messages(&self) -> Vec<String> {
        self.state.lock().unwrap().messages.clone()
    }

    pub fn has_message(&self, needle: &str) -> bool {
        self.messages().iter().any(|m| m.contains(needle))
    }

    pub fn action(&self, name: &str) -> Option<ActionDesc> {
        self.state.lock().unwrap().actions.get(name).cloned()
    }

    pub fn action_names(&self) -> Vec<String> {
        self.state.lock().unwrap().actions.keys().cloned().collect()
    }

    pub fn menu_entries(&self) -> Vec<(String, String)> {
        self.state.lock().unwrap().menus.clone()
    }

    pub fn hook_count(&self) -> usize {
        self.state.lock().unwrap().hooks.len()
    }

    /// Builds a context menu for `widget` the way the host would.
    pub fn popup(&self, widget: WidgetKind) -> Vec<PopupEntry> {
        let hooks: Vec<_> = self
            .state
            .lock()
            .unwrap()
            .hooks
            .iter()
            .map(|(_, h)| Arc::clone(h))
            .collect();
        let mut popup = Popup::new();
        for hook in hooks {
            hook.populate(widget, &mut popup);
        }
        popup.entries().to_vec()
    }

    /// Invokes a registered action from the pseudocode view.
    pub fn activate(&self, name: &str) {
        let desc = self.action(name).unwrap_or_else(|| panic!("no action {name}"));
        let ctx = ActionContext::new(WidgetKind::Pseudocode);
        if desc.handler.state(&ctx) == ActionState::Enabled {
            desc.handler.activate(&ctx);
        }
    }

    /// Runs queued UI tasks on the calling thread; returns how many ran.
    pub fn run_ui_tasks(&self) -> usize {
        let mut ran = 0;
        loop {
            let task = self.state.lock().unwrap().tasks.pop_front();
            match task {
                Some(task) => {
                    task();
                    ran += 1;
                }
                None => return ran,
            }
        }
    }

    /// Pumps the UI queue until `active` has nothing in flight.
    pub fn drain(&self, active: &ActiveModel) {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            let idle = active.pending() == 0;
            self.run_ui_tasks();
            if idle && self.state.lock().unwrap().tasks.is_empty() {
                return;
            }
            assert!(Instant::now() < deadline, "work did not drain in time");
            thread::sleep(Duration::from_millis(2));
        }
    }
}

impl ActionRegistry for FakeHost {
    fn register_action(&self, desc: ActionDesc) -> bool {
        let mut state = self.state.lock().unwrap();
        if state.actions.contains_key(&desc.name) {
            return false;
        }
        state.actions.insert(desc.name.clone(), desc);
        true
    }

    fn unregister_action(&self, name: &str) -> bool {
        self.state.lock().unwrap().actions.remove(name).is_some()
    }

    fn attach_action_to_menu(&self, menu_path: &str, action: &str) -> bool {
        let mut state = self.state.lock().unwrap();
        if !state.actions.contains_key(action) {
            return false;
        }
        state.menus.push((menu_path.to_string(), action.to_string()));
        true
    }

    fn detach_action_from_menu(&self, menu_path: &str, action: &str) -> bool {
        let mut state = self.state.lock().unwrap();
        let before = state.menus.len();
        state.menus.retain(|(p, a)| !(p == menu_path && a == action));
        state.menus.len() != before
    }

    fn hook_popups(&self, hook: Arc<dyn PopupHook>) -> HookId {
        let mut state = self.state.lock().unwrap();
        state.next_hook += 1;
        let id = HookId(state.next_hook);
        state.hooks.push((id, hook));
        id
    }

    fn unhook_popups(&self, id: HookId) -> bool {
        let mut state = self.state.lock().unwrap();
        let before = state.hooks.len();
        state.hooks.retain(|(h, _)| *h != id);
        state.hooks.len() != before
    }
}

impl Decompiler for FakeHost {
    fn is_available(&self) -> bool {
        self.available
    }

    fn current_function(&self) -> Option<FunctionRef> {
        let state = self.state.lock().unwrap();
        let address = state.current?;
        state
            .functions
            .iter()
            .find(|f| f.func.address == address)
            .map(|f| f.func.clone())
    }

    fn pseudocode(&self, func: &FunctionRef) -> Option<String> {
        self.with_function(func.address, |f| f.decompiles.then(|| f.code.clone()))
            .flatten()
    }

    fn local_variables(&self, func: &FunctionRef) -> Vec<String> {
        self.with_function(func.address, |f| f.locals.clone())
            .unwrap_or_default()
    }

    fn callees(&self, func: &FunctionRef) -> Vec<FunctionRef> {
        let state = self.state.lock().unwrap();
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
        self.with_function(func.address, |f| {
            if !f.locals.iter().any(|l| l == old) || f.locals.iter().any(|l| l == new) {
                return false;
            }
            for local in f.locals.iter_mut().filter(|l| *l == old) {
                *local = new.to_string();
            }
            let word = Regex::new(&format!(r"\b{}\b", regex::escape(old))).unwrap();
            f.code = word.replace_all(&f.code, new).into_owned();
            true
        })
        .unwrap_or(false)
    }

    fn rename_function(&self, func: &FunctionRef, new: &str) -> bool {
        self.with_function(func.address, |f| {
            f.func.name = new.to_string();
            true
        })
        .unwrap_or(false)
    }

    fn set_function_comment(&self, func: &FunctionRef, comment: &str) {
        self.with_function(func.address, |f| f.comment = Some(comment.to_string()));
    }

    fn refresh(&self) {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
    }
}

impl UiBridge for FakeHost {
    fn execute_sync(&self, task: UiTask) {
        self.state.lock().unwrap().tasks.push_back(task);
    }

    fn msg(&self, text: &str) {
        self.state.lock().unwrap().messages.push(text.to_string());
    }
}
