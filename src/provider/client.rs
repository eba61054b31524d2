//! Query dispatch: announcing, running, reporting, and delivering results.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::{debug, warn};

use super::classify::{general_failure, user_message};
use super::{LanguageModel, Query};
use crate::host::UiBridge;
use crate::models::ModelDescriptor;

/// Marks one query or batch as in flight until dropped.
pub struct InFlightGuard {
    counter: Arc<AtomicUsize>,
}

impl InFlightGuard {
    fn new(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self {
            counter: Arc::clone(counter),
        }
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::SeqCst);
    }
}

/// A [`LanguageModel`] bound to the host's UI thread.
///
/// Failures never reach the caller: they are classified, printed through
/// [`UiBridge::msg`], and turned into "no completion".
pub struct ModelClient {
    model: Arc<dyn LanguageModel>,
    ui: Arc<dyn UiBridge>,
    in_flight: Arc<AtomicUsize>,
}

impl ModelClient {
    pub fn new(model: Arc<dyn LanguageModel>, ui: Arc<dyn UiBridge>) -> Self {
        Self::with_counter(model, ui, Arc::new(AtomicUsize::new(0)))
    }

    /// Shares `in_flight` with other clients, so the count survives model switches.
    pub(crate) fn with_counter(
        model: Arc<dyn LanguageModel>,
        ui: Arc<dyn UiBridge>,
        in_flight: Arc<AtomicUsize>,
    ) -> Self {
        Self {
            model,
            ui,
            in_flight,
        }
    }

    pub fn descriptor(&self) -> &ModelDescriptor {
        self.model.descriptor()
    }

    /// Number of queries and tracked batches that have not finished.
    pub fn pending(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Counts the caller's work as in flight until the guard is dropped.
    pub fn track(&self) -> InFlightGuard {
        InFlightGuard::new(&self.in_flight)
    }

    fn announce(&self) {
        self.ui.msg(&format!("Request to {} sent...", self.descriptor()));
    }

    /// Sends `query` and blocks until the completion arrives.
    ///
    /// Returns `None` if the request failed; the failure has already been
    /// reported to the user.
    pub fn query_sync(&self, query: &Query) -> Option<String> {
        let _guard = self.track();
        self.announce();
        run_query(self.model.as_ref(), self.ui.as_ref(), query)
    }

    /// Sends `query` from a new worker thread and hands the completion to
    /// `callback` on the UI thread.
    ///
    /// The callback runs at most once, and only for a successful request.
    /// Returns the worker's handle, or `None` if no thread could be spawned.
    pub fn query_async<F>(&self, query: Query, callback: F) -> Option<JoinHandle<()>>
    where
        F: FnOnce(String) + Send + 'static,
    {
        let guard = self.track();
        self.announce();

        let model = Arc::clone(&self.model);
        let ui = Arc::clone(&self.ui);
        let spawned = thread::Builder::new()
            .name("gepetto-query".into())
            .spawn(move || {
                let _guard = guard;
                if let Some(text) = run_query(model.as_ref(), ui.as_ref(), &query) {
                    ui.execute_sync(Box::new(move || callback(text)));
                }
            });

        match spawned {
            Ok(handle) => Some(handle),
            Err(e) => {
                warn!(error = %e, "failed to spawn query thread");
                self.ui.msg(&general_failure(e));
                None
            }
        }
    }
}

/// Runs one query, reporting any failure (including a panic) to the user.
fn run_query(model: &dyn LanguageModel, ui: &dyn UiBridge, query: &Query) -> Option<String> {
    let descriptor = model.descriptor();
    match panic::catch_unwind(AssertUnwindSafe(|| model.complete(query))) {
        Ok(Ok(text)) => {
            debug!(model = %descriptor, chars = text.len(), "completion received");
            Some(text)
        }
        Ok(Err(err)) => {
            warn!(model = %descriptor, error = %err, "query failed");
            ui.msg(&user_message(&err, descriptor));
            None
        }
        Err(payload) => {
            let detail = panic_detail(payload.as_ref());
            warn!(model = %descriptor, %detail, "query panicked");
            ui.msg(&general_failure(detail));
            None
        }
    }
}

fn panic_detail(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
