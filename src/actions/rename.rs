use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, warn};

use super::{apply_renames, current_pseudocode, ActionContext, ActionHandler};
use crate::constants::{RENAME_PROMPT_HEAD, RENAME_PROMPT_TAIL};
use crate::host::Host;
use crate::provider::{ActiveModel, Query};

/// Asks the model for better local variable names and applies them.
pub struct RenameHandler {
    host: Arc<dyn Host>,
    active: Arc<ActiveModel>,
}

impl RenameHandler {
    pub fn new(host: Arc<dyn Host>, active: Arc<ActiveModel>) -> Self {
        Self { host, active }
    }
}

impl ActionHandler for RenameHandler {
    fn activate(&self, _ctx: &ActionContext) {
        let Some((func, code)) = current_pseudocode(self.host.as_ref()) else {
            return;
        };
        let client = self.active.client();
        let model = client.descriptor().clone();
        debug!(function = %func.name, %model, "renaming variables");

        let host = Arc::clone(&self.host);
        let query =
            Query::new(format!("{RENAME_PROMPT_HEAD}{code}{RENAME_PROMPT_TAIL}")).json_response();
        client.query_async(query, move |response| {
            let Some(mapping) = parse_rename_map(&response) else {
                warn!(%model, "completion is not a JSON object");
                host.msg(&format!("{model} did not return a JSON dictionary of names."));
                return;
            };
            let renamed = apply_renames(host.as_ref(), &func, &mapping, false);
            host.refresh();
            host.msg(&format!("{model} query finished! {renamed} variable(s) renamed."));
        });
    }
}

/// Parses a `{"old": "new"}` mapping out of a completion.
///
/// Models sometimes wrap the object in prose or a code fence, so when the
/// whole text is not JSON the span from the first `{` to the last `}` is
/// tried. Entries whose value is not a string are dropped.
pub fn parse_rename_map(text: &str) -> Option<Vec<(String, String)>> {
    let object = serde_json::from_str::<Map<String, Value>>(text.trim())
        .ok()
        .or_else(|| {
            let start = text.find('{')?;
            let end = text.rfind('}')?;
            (start < end)
                .then(|| serde_json::from_str::<Map<String, Value>>(&text[start..=end]).ok())
                .flatten()
        })?;
    Some(
        object
            .into_iter()
            .filter_map(|(old, new)| match new {
                Value::String(new) => Some((old, new)),
                _ => None,
            })
            .collect(),
    )
}
