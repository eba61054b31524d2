//! Plugin shell: lifecycle, action registration and model selection.
//!
//! [`plugin_entry`] builds the API client from the configuration and returns
//! a [`Plugin`]; the host then calls [`Plugin::init`] once and
//! [`Plugin::term`] on unload. All registration goes through the host's
//! [`ActionRegistry`], and every name registered here is remembered so
//! `term` leaves nothing behind.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError, Weak};

use tracing::{debug, info, warn};

use crate::actions::{
    ActionDesc, ExplainHandler, ModelSwitcher, RenameAllHandler, RenameHandler,
    SelectModelHandler, WidgetKind,
};
use crate::config::Config;
use crate::constants::{
    ACTION_ICON, CHECK_MARK_ICON, DISPLAY_NAME, EXPLAIN_ACTION, EXPLAIN_HOTKEY, EXPLAIN_LABEL,
    MENU_ROOT, NO_API_KEY_MSG, NO_ICON, POPUP_ROOT, RENAME_ACTION, RENAME_ALL_ACTION,
    RENAME_ALL_HOTKEY, RENAME_ALL_LABEL, RENAME_HOTKEY, RENAME_LABEL, SELECT_MODEL_ACTION_PREFIX,
    SELECT_MODEL_LABEL,
};
use crate::error::ConfigError;
use crate::host::{HookId, Host, Popup, PopupHook};
use crate::models::{available_models, ModelDescriptor};
use crate::provider::{resolve_model, ActiveModel, ModelFactory, OpenAiFactory};

/// Answer to the host's load request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PluginStatus {
    /// The host cannot run the plugin (no decompiler).
    Skip,
    /// The plugin is loaded and stays resident.
    Keep,
}

/// Builds the plugin from `config`, reading `OPENAI_API_KEY` from the process
/// environment when the config carries no key.
///
/// `config_path` is where model selections are persisted, if anywhere.
///
/// # Errors
///
/// Fails before any registration or network traffic when no API key is
/// available or the HTTP client cannot be built.
pub fn plugin_entry<H: Host + 'static>(
    host: Arc<H>,
    config: &Config,
    config_path: Option<PathBuf>,
) -> Result<Plugin, ConfigError> {
    plugin_entry_with(host, config, config_path, |var| std::env::var(var).ok())
}

/// Like [`plugin_entry`] with an explicit environment lookup.
pub fn plugin_entry_with<H, F>(
    host: Arc<H>,
    config: &Config,
    config_path: Option<PathBuf>,
    env: F,
) -> Result<Plugin, ConfigError>
where
    H: Host + 'static,
    F: Fn(&str) -> Option<String>,
{
    let settings = config.api_settings_with(env).inspect_err(|e| {
        warn!(error = %e, "cannot build model client");
        if matches!(e, ConfigError::MissingApiKey) {
            host.msg(NO_API_KEY_MSG);
        }
    })?;
    let factory = OpenAiFactory::new(settings)?;
    Plugin::with_factory(host, Arc::new(factory), &resolve_model(None, config), config_path)
}

/// A loaded plugin instance.
pub struct Plugin {
    shell: Arc<Shell>,
}

impl Plugin {
    /// Creates the plugin around an arbitrary model factory.
    pub fn with_factory<H: Host + 'static>(
        host: Arc<H>,
        factory: Arc<dyn ModelFactory>,
        model: &ModelDescriptor,
        config_path: Option<PathBuf>,
    ) -> Result<Self, ConfigError> {
        let active = Arc::new(ActiveModel::new(factory, host.clone(), model)?);
        let shell = Arc::new_cyclic(|this| Shell {
            host,
            active,
            config_path,
            this: this.clone(),
            state: Mutex::new(ShellState::default()),
        });
        Ok(Self { shell })
    }

    /// Registers actions, menus and the popup hook.
    pub fn init(&self) -> PluginStatus {
        self.shell.init()
    }

    /// Removes everything [`Plugin::init`] registered.
    pub fn term(&self) {
        self.shell.term();
    }

    /// One-line description shown in the host's plugin list.
    pub fn comment(&self) -> String {
        format!(
            "Uses {} to enrich the decompiler's output",
            self.shell.active.descriptor()
        )
    }

    pub fn active_model(&self) -> &Arc<ActiveModel> {
        &self.shell.active
    }

    /// Selects `model` as if the user had picked it from the menu.
    pub fn select_model(&self, model: &ModelDescriptor) {
        self.shell.switch_model(model);
    }
}

#[derive(Default)]
struct ShellState {
    actions: Vec<String>,
    menu_entries: Vec<(String, String)>,
    popup_hook: Option<HookId>,
    loaded: bool,
}

struct Shell {
    host: Arc<dyn Host>,
    active: Arc<ActiveModel>,
    config_path: Option<PathBuf>,
    this: Weak<Shell>,
    state: Mutex<ShellState>,
}

impl Shell {
    fn lock(&self) -> std::sync::MutexGuard<'_, ShellState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn init(&self) -> PluginStatus {
        if !self.host.is_available() {
            info!("no decompiler available, skipping");
            return PluginStatus::Skip;
        }
        let mut state = self.lock();
        if state.loaded {
            return PluginStatus::Keep;
        }
        self.register_actions(&mut state);
        state.popup_hook = Some(self.host.hook_popups(Arc::new(PseudocodePopupHook)));
        state.loaded = true;
        info!(model = %self.active.descriptor(), "{DISPLAY_NAME} loaded");
        PluginStatus::Keep
    }

    fn term(&self) {
        let mut state = self.lock();
        self.unregister_actions(&mut state);
        if let Some(id) = state.popup_hook.take() {
            self.host.unhook_popups(id);
        }
        state.loaded = false;
        info!("{DISPLAY_NAME} unloaded");
    }

    fn register_actions(&self, state: &mut ShellState) {
        let model = self.active.descriptor();
        let main = [
            (
                ActionDesc::new(
                    EXPLAIN_ACTION,
                    EXPLAIN_LABEL,
                    Arc::new(ExplainHandler::new(self.host.clone(), self.active.clone())),
                )
                .with_shortcut(EXPLAIN_HOTKEY)
                .with_tooltip(format!("Use {model} to explain the currently selected function")),
                EXPLAIN_LABEL,
            ),
            (
                ActionDesc::new(
                    RENAME_ACTION,
                    RENAME_LABEL,
                    Arc::new(RenameHandler::new(self.host.clone(), self.active.clone())),
                )
                .with_shortcut(RENAME_HOTKEY)
                .with_tooltip(format!("Use {model} to rename this function's variables")),
                RENAME_LABEL,
            ),
            (
                ActionDesc::new(
                    RENAME_ALL_ACTION,
                    RENAME_ALL_LABEL,
                    Arc::new(RenameAllHandler::new(self.host.clone(), self.active.clone())),
                )
                .with_shortcut(RENAME_ALL_HOTKEY)
                .with_tooltip(format!(
                    "Use {model} to rename this function, its variables and its callees"
                )),
                RENAME_ALL_LABEL,
            ),
        ];
        for (desc, label) in main {
            self.register(state, desc.with_icon(ACTION_ICON), format!("{MENU_ROOT}{label}"));
        }
        self.generate_select_menu(state, &model);
    }

    /// One entry per available model; the current one is checked and disabled.
    fn generate_select_menu(&self, state: &mut ShellState, current: &ModelDescriptor) {
        let switcher: Weak<dyn ModelSwitcher> = self.this.clone();
        for model in available_models(current) {
            let icon = if model == *current { CHECK_MARK_ICON } else { NO_ICON };
            let desc = ActionDesc::new(
                &format!("{SELECT_MODEL_ACTION_PREFIX}{model}"),
                model.name(),
                Arc::new(SelectModelHandler::new(switcher.clone(), model.clone())),
            )
            .with_icon(icon);
            self.register(state, desc, format!("{MENU_ROOT}{SELECT_MODEL_LABEL}/{model}"));
        }
    }

    fn register(&self, state: &mut ShellState, desc: ActionDesc, menu_path: String) {
        let name = desc.name.clone();
        if !self.host.register_action(desc) {
            warn!(action = %name, "action name already taken");
            return;
        }
        state.actions.push(name.clone());
        if self.host.attach_action_to_menu(&menu_path, &name) {
            state.menu_entries.push((menu_path, name));
        } else {
            warn!(action = %name, menu = %menu_path, "could not attach to menu");
        }
    }

    fn unregister_actions(&self, state: &mut ShellState) {
        for (path, name) in state.menu_entries.drain(..) {
            self.host.detach_action_from_menu(&path, &name);
        }
        for name in state.actions.drain(..) {
            self.host.unregister_action(&name);
        }
    }
}

impl ModelSwitcher for Shell {
    fn current_model(&self) -> ModelDescriptor {
        self.active.descriptor()
    }

    fn switch_model(&self, model: &ModelDescriptor) {
        if let Err(e) = self.active.select(model) {
            warn!(%model, error = %e, "model switch failed");
            self.host.msg(&format!("Could not switch to {model}: {e}"));
            return;
        }
        if let Some(path) = &self.config_path {
            if let Err(e) = Config::persist_model(path, model.name()) {
                warn!(path = %path.display(), error = %e, "could not save model selection");
                self.host.msg(&format!("Could not save the model selection: {e:#}"));
            }
        }

        // Names are stable, so re-registration refreshes tooltips and check marks.
        let mut state = self.lock();
        if state.loaded {
            self.unregister_actions(&mut state);
            self.register_actions(&mut state);
            debug!(%model, "menus regenerated");
        }
        drop(state);
        self.host.msg(&format!("{model} is now the selected model."));
    }
}

/// Adds the plugin's submenu to pseudocode context menus.
struct PseudocodePopupHook;

impl PopupHook for PseudocodePopupHook {
    fn populate(&self, widget: WidgetKind, popup: &mut Popup) {
        if widget != WidgetKind::Pseudocode {
            return;
        }
        for action in [EXPLAIN_ACTION, RENAME_ACTION, RENAME_ALL_ACTION] {
            popup.attach(action, POPUP_ROOT);
        }
    }
}
