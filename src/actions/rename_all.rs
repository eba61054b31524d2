use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use tracing::{debug, info, warn};

use super::rename::parse_rename_map;
use super::{apply_renames, current_pseudocode, ActionContext, ActionHandler};
use crate::constants::{RENAME_ALL_MAX_FUNCTIONS, RENAME_ALL_PROMPT_TAIL, RENAME_PROMPT_HEAD};
use crate::host::{FunctionRef, Host};
use crate::provider::{general_failure, ActiveModel, Query};

/// Renames the current function, its parameters and locals, then does the
/// same for each function it calls directly.
pub struct RenameAllHandler {
    host: Arc<dyn Host>,
    active: Arc<ActiveModel>,
}

#[derive(Default)]
struct Tally {
    identifiers: AtomicUsize,
    functions: AtomicUsize,
}

impl RenameAllHandler {
    pub fn new(host: Arc<dyn Host>, active: Arc<ActiveModel>) -> Self {
        Self { host, active }
    }

    /// The current function followed by its callees, each with its pseudocode.
    ///
    /// Runs on the UI thread, since pseudocode can only be read there.
    fn snapshot(&self, root: FunctionRef, code: String) -> Vec<(FunctionRef, String)> {
        let mut seen = HashSet::from([root.address]);
        let mut targets = vec![(root.clone(), code)];
        for callee in self.host.callees(&root) {
            if targets.len() >= RENAME_ALL_MAX_FUNCTIONS {
                debug!(limit = RENAME_ALL_MAX_FUNCTIONS, "callee list truncated");
                break;
            }
            if !seen.insert(callee.address) {
                continue;
            }
            match self.host.pseudocode(&callee) {
                Some(code) => targets.push((callee, code)),
                None => debug!(function = %callee.name, "skipping callee that does not decompile"),
            }
        }
        targets
    }
}

impl ActionHandler for RenameAllHandler {
    fn activate(&self, _ctx: &ActionContext) {
        let Some((root, code)) = current_pseudocode(self.host.as_ref()) else {
            return;
        };
        let targets = self.snapshot(root, code);
        let client = self.active.client();
        let model = client.descriptor().clone();
        info!(%model, functions = targets.len(), "starting rename-all");

        let guard = client.track();
        let host = Arc::clone(&self.host);
        let spawned = thread::Builder::new()
            .name("gepetto-rename-all".into())
            .spawn(move || {
                let _guard = guard;
                let tally = Arc::new(Tally::default());
                for (func, code) in targets {
                    let query = Query::new(format!(
                        "{RENAME_PROMPT_HEAD}{code}{RENAME_ALL_PROMPT_TAIL}"
                    ))
                    .json_response();
                    let Some(response) = client.query_sync(&query) else {
                        continue;
                    };
                    let Some(mapping) = parse_rename_map(&response) else {
                        warn!(function = %func.name, "completion is not a JSON object");
                        continue;
                    };
                    let ui_host = Arc::clone(&host);
                    let tally = Arc::clone(&tally);
                    host.execute_sync(Box::new(move || {
                        let renamed = apply_renames(ui_host.as_ref(), &func, &mapping, true);
                        if renamed > 0 {
                            tally.identifiers.fetch_add(renamed, Ordering::SeqCst);
                            tally.functions.fetch_add(1, Ordering::SeqCst);
                        }
                    }));
                }

                let ui_host = Arc::clone(&host);
                host.execute_sync(Box::new(move || {
                    ui_host.refresh();
                    ui_host.msg(&format!(
                        "{model} renamed {} identifier(s) across {} function(s).",
                        tally.identifiers.load(Ordering::SeqCst),
                        tally.functions.load(Ordering::SeqCst),
                    ));
                }));
            });

        if let Err(e) = spawned {
            warn!(error = %e, "failed to spawn rename-all thread");
            self.host.msg(&general_failure(e));
        }
    }
}
