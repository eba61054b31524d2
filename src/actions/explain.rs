use std::sync::Arc;

use tracing::debug;

use super::{current_pseudocode, ActionContext, ActionHandler};
use crate::constants::{COMMENT_WRAP_WIDTH, EXPLAIN_PROMPT};
use crate::host::Host;
use crate::models::ModelDescriptor;
use crate::provider::{ActiveModel, Query};

/// Asks the model what the current function does and stores the answer as
/// the function's comment.
pub struct ExplainHandler {
    host: Arc<dyn Host>,
    active: Arc<ActiveModel>,
}

impl ExplainHandler {
    pub fn new(host: Arc<dyn Host>, active: Arc<ActiveModel>) -> Self {
        Self { host, active }
    }
}

impl ActionHandler for ExplainHandler {
    fn activate(&self, _ctx: &ActionContext) {
        let Some((func, code)) = current_pseudocode(self.host.as_ref()) else {
            return;
        };
        let client = self.active.client();
        let model = client.descriptor().clone();
        debug!(function = %func.name, %model, "explaining function");

        let host = Arc::clone(&self.host);
        client.query_async(Query::new(explain_prompt(&code)), move |response| {
            host.set_function_comment(&func, &format_explanation(&model, &response));
            host.refresh();
            host.msg(&format!("{model} query finished!"));
        });
    }
}

fn explain_prompt(code: &str) -> String {
    format!("{EXPLAIN_PROMPT}{code}")
}

/// Comment text: a header naming the model, then the response with each
/// line wrapped at [`COMMENT_WRAP_WIDTH`] columns.
fn format_explanation(model: &ModelDescriptor, response: &str) -> String {
    let mut comment = format!("{model} explanation:\n");
    let body: Vec<String> = response
        .trim()
        .lines()
        .map(|line| textwrap::fill(line, COMMENT_WRAP_WIDTH))
        .collect();
    comment.push_str(&body.join("\n"));
    comment
}
