//! Centralized constants for gepetto.
//!
//! Action identifiers, menu paths, hotkeys, prompt templates and the
//! user-facing message texts live here so they can be changed in one place.

use std::time::Duration;

/// Application name used in directory paths and action identifiers.
pub const APP_NAME: &str = "gepetto";

/// Name shown in host menus.
pub const DISPLAY_NAME: &str = "Gepetto";

/// Default LLM model identifier.
pub const DEFAULT_MODEL: &str = "gpt-4-turbo";

/// Configuration filename.
pub const CONFIG_FILENAME: &str = "config.toml";

/// Readline history filename for the console host.
pub const HISTORY_FILENAME: &str = "console_history.txt";

/// Environment variable consulted when the config carries no API key.
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Base URL of the chat-completion API when none is configured.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// How long one chat-completion request may take, including the response body.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(600);

// --- Actions ---

pub const EXPLAIN_ACTION: &str = "gepetto:explain_function";
pub const RENAME_ACTION: &str = "gepetto:rename_variables";
pub const RENAME_ALL_ACTION: &str = "gepetto:rename_all";

/// Prefix for the per-model entries of the "Select model" submenu.
pub const SELECT_MODEL_ACTION_PREFIX: &str = "gepetto:select_model:";

pub const EXPLAIN_LABEL: &str = "Explain function";
pub const RENAME_LABEL: &str = "Rename variables";
pub const RENAME_ALL_LABEL: &str = "Rename all";
pub const SELECT_MODEL_LABEL: &str = "Select model";

pub const EXPLAIN_HOTKEY: &str = "Ctrl+Alt+G";
pub const RENAME_HOTKEY: &str = "Ctrl+Alt+R";
pub const RENAME_ALL_HOTKEY: &str = "Ctrl+Alt+L";

/// Root of the plugin's entries in the host's main menu.
pub const MENU_ROOT: &str = "Edit/Gepetto/";

/// Submenu under which entries are attached in pseudocode context menus.
pub const POPUP_ROOT: &str = "Gepetto/";

/// Icon shown next to the plugin's actions.
pub const ACTION_ICON: i32 = 201;

/// Check-mark icon for the currently selected model.
pub const CHECK_MARK_ICON: i32 = 208;

/// No icon.
pub const NO_ICON: i32 = 0;

/// Upper bound on the functions processed by one rename-all run.
pub const RENAME_ALL_MAX_FUNCTIONS: usize = 16;

/// Column at which explanation comments are wrapped.
pub const COMMENT_WRAP_WIDTH: usize = 80;

// --- Prompts ---

pub const EXPLAIN_PROMPT: &str =
    "Can you explain what the following C function does and suggest a better name for it?\n";

pub const RENAME_PROMPT_HEAD: &str = "Analyze the following C function:\n";

pub const RENAME_PROMPT_TAIL: &str = "\nSuggest better variable names, reply with a JSON dictionary \
where keys are the original names and values are the proposed names. \
Do not explain anything, only print the JSON dictionary.";

pub const RENAME_ALL_PROMPT_TAIL: &str = "\nSuggest better names for the function itself, its \
arguments and its local variables. Reply with a JSON dictionary where keys are the original \
names and values are the proposed names, including an entry for the function name. \
Do not explain anything, only print the JSON dictionary.";

// --- User-facing messages ---

/// Reported when the provider rejects a prompt for exceeding the context window.
pub const FUNCTION_TOO_BIG_MSG: &str =
    "Unfortunately, this function is too big to be analyzed with the model's current API limits.";

pub const NO_FUNCTION_MSG: &str = "No function is selected in the pseudocode view.";

pub const NO_API_KEY_MSG: &str =
    "Please edit the configuration file to insert your OpenAI API key!";
