//! Command handlers for the console session.
//!
//! Returns a [`CommandAction`] so the REPL loop can decide how to proceed.

use anyhow::Result;
use colored::Colorize;

use gepetto::actions::WidgetKind;
use gepetto::models::{available_models, ModelDescriptor};
use gepetto::Plugin;

use super::host::ConsoleHost;
use crate::diff;

/// Action returned by command handling.
pub(crate) enum CommandAction {
    Continue,
    Quit,
    Unknown(String),
}

/// Dispatch and handle one input line.
pub(crate) fn handle_command(
    line: &str,
    host: &ConsoleHost,
    plugin: &Plugin,
) -> Result<CommandAction> {
    let (command, arg) = match line.split_once(char::is_whitespace) {
        Some((c, a)) => (c, a.trim()),
        None => (line, ""),
    };
    match command {
        "functions" | "ls" => {
            for (func, current) in host.functions() {
                let marker = if current { ">".green().bold() } else { " ".normal() };
                println!("{marker} {:#010x}  {}", func.address, func.name);
            }
        }
        "goto" | "g" => {
            let func = host.goto(arg)?;
            println!("{} {}", "at".dimmed(), func.name.yellow());
        }
        "show" => match host.render_current() {
            Some((_, text)) => println!("{text}"),
            None => println!("{}", "No current function.".dimmed()),
        },
        "menu" => {
            for entry in host.menu() {
                let check = if entry.checked { "✓".green().to_string() } else { " ".into() };
                let shortcut = entry.shortcut.map(|s| format!(" ({s})")).unwrap_or_default();
                let label = if entry.enabled {
                    entry.label.normal()
                } else {
                    entry.label.dimmed()
                };
                println!("{check} {}  {label}{}", entry.path.dimmed(), shortcut.cyan());
            }
        }
        "popup" => {
            let widget = match arg {
                "" | "pseudocode" => WidgetKind::Pseudocode,
                "disassembly" => WidgetKind::Disassembly,
                _ => WidgetKind::Other,
            };
            let entries = host.popup(widget);
            if entries.is_empty() {
                println!("{}", "(no entries)".dimmed());
            }
            for entry in entries {
                println!("  {}{}", entry.path.dimmed(), entry.action);
            }
        }
        "run" => {
            if arg.is_empty() {
                anyhow::bail!("Usage: run <action|hotkey|label|explain|rename|rename-all>");
            }
            run_and_show(host, plugin, arg)?;
        }
        "model" => {
            if arg.is_empty() {
                print_models(&plugin.active_model().descriptor());
            } else {
                plugin.select_model(&ModelDescriptor::new(arg));
            }
        }
        "help" => {
            println!("{}", "Commands:".bold());
            println!("  {} - list loaded functions", "functions".cyan());
            println!("  {} - move to a function by name or 0x address", "goto <name>".cyan());
            println!("  {} - print the current function", "show".cyan());
            println!("  {} - list menu entries", "menu".cyan());
            println!("  {} - list context menu entries", "popup [widget]".cyan());
            println!("  {} - invoke an action", "run <action>".cyan());
            println!("  {} - list or select models", "model [name]".cyan());
            println!("  {} - write renamed functions back to their files", "write".cyan());
            println!("  {} - exit", "quit".cyan());
        }
        "write" => {
            for path in host.write_back()? {
                println!("{} {}", "wrote".dimmed(), path.display());
            }
        }
        "quit" | "exit" => return Ok(CommandAction::Quit),
        _ => return Ok(CommandAction::Unknown(command.to_string())),
    }
    Ok(CommandAction::Continue)
}

/// Invokes an action, waits for its results and prints what changed.
pub(crate) fn run_and_show(host: &ConsoleHost, plugin: &Plugin, action: &str) -> Result<()> {
    let before = host.snapshot();
    host.invoke(action)?;
    host.pump(plugin.active_model());
    for change in diff::changed_functions(&before, &host.snapshot()) {
        print!("{change}");
    }
    Ok(())
}

/// Prints the selectable models with the current one marked.
pub(crate) fn print_models(current: &ModelDescriptor) {
    for model in available_models(current) {
        let window = model
            .info()
            .map(|i| format!("{}k context", i.context_window / 1000))
            .unwrap_or_else(|| "custom".into());
        if model == *current {
            println!("{} {} {}", "*".green().bold(), model.name().yellow(), window.dimmed());
        } else {
            println!("  {} {}", model.name(), window.dimmed());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::Arc;

    use gepetto::constants::RENAME_ACTION;
    use gepetto::error::{ConfigError, QueryError};
    use gepetto::provider::{LanguageModel, ModelFactory, Query};

    /// Answers every query with the same text.
    struct Canned {
        descriptor: ModelDescriptor,
        reply: String,
    }

    impl LanguageModel for Canned {
        fn descriptor(&self) -> &ModelDescriptor {
            &self.descriptor
        }

        fn complete(&self, _query: &Query) -> Result<String, QueryError> {
            Ok(self.reply.clone())
        }
    }

    struct CannedFactory(&'static str);

    impl ModelFactory for CannedFactory {
        fn build(
            &self,
            descriptor: &ModelDescriptor,
        ) -> Result<Arc<dyn LanguageModel>, ConfigError> {
            Ok(Arc::new(Canned {
                descriptor: descriptor.clone(),
                reply: self.0.to_string(),
            }))
        }
    }

    const SOURCE: &str = "int sub_1000(int a1)\n{\n  int v2;\n\n  v2 = a1 + 1;\n  return v2;\n}\n";

    fn session(reply: &'static str) -> (tempfile::NamedTempFile, Arc<ConsoleHost>, Plugin) {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SOURCE.as_bytes()).unwrap();
        let host = ConsoleHost::load(&[file.path().to_path_buf()]).unwrap();
        let plugin = Plugin::with_factory(
            host.clone(),
            Arc::new(CannedFactory(reply)),
            &ModelDescriptor::new("gpt-4o"),
            None,
        )
        .unwrap();
        plugin.init();
        (file, host, plugin)
    }

    #[test]
    fn test_run_explain_then_write() {
        let (file, host, plugin) = session("Adds one to { a1 }.");

        assert!(matches!(
            handle_command("run explain", &host, &plugin).unwrap(),
            CommandAction::Continue
        ));
        assert!(matches!(
            handle_command("write", &host, &plugin).unwrap(),
            CommandAction::Continue
        ));

        let text = std::fs::read_to_string(file.path()).unwrap();
        assert!(text.starts_with("/*\n * gpt-4o explanation:\n * Adds one to { a1 }.\n */\n"));
        assert!(text.contains("int sub_1000(int a1)"));
        plugin.term();
    }

    #[test]
    fn test_run_once_rename_writes_file() {
        let (file, host, plugin) = session(r#"{"v2": "next"}"#);

        crate::console::run_once(&host, &plugin, RENAME_ACTION, Some("sub_1000"), true).unwrap();

        let text = std::fs::read_to_string(file.path()).unwrap();
        assert!(text.contains("int next;"));
        assert!(text.contains("next = a1 + 1;"));
        assert!(!text.contains("v2"));
        plugin.term();
    }

    #[test]
    fn test_unknown_and_quit() {
        let (_file, host, plugin) = session("unused");
        assert!(matches!(
            handle_command("frobnicate now", &host, &plugin).unwrap(),
            CommandAction::Unknown(cmd) if cmd == "frobnicate"
        ));
        assert!(handle_command("run", &host, &plugin).is_err());
        assert!(handle_command("run nothing-registered", &host, &plugin).is_err());
        assert!(matches!(
            handle_command("quit", &host, &plugin).unwrap(),
            CommandAction::Quit
        ));
    }
}
