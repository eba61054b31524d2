use std::sync::Weak;

use super::{ActionContext, ActionHandler, ActionState};
use crate::models::ModelDescriptor;

/// Something that owns the model selection, typically the plugin shell.
pub trait ModelSwitcher: Send + Sync {
    fn current_model(&self) -> ModelDescriptor;

    /// Selects `model`, reporting any failure to the user.
    fn switch_model(&self, model: &ModelDescriptor);
}

/// One entry of the "Select model" submenu.
///
/// Holds the switcher weakly: the switcher registers these handlers, and an
/// entry must not keep it alive after `term`.
pub struct SelectModelHandler {
    switcher: Weak<dyn ModelSwitcher>,
    model: ModelDescriptor,
}

impl SelectModelHandler {
    pub fn new(switcher: Weak<dyn ModelSwitcher>, model: ModelDescriptor) -> Self {
        Self { switcher, model }
    }
}

impl ActionHandler for SelectModelHandler {
    fn activate(&self, _ctx: &ActionContext) {
        if let Some(switcher) = self.switcher.upgrade() {
            if switcher.current_model() != self.model {
                switcher.switch_model(&self.model);
            }
        }
    }

    fn state(&self, _ctx: &ActionContext) -> ActionState {
        match self.switcher.upgrade() {
            Some(switcher) if switcher.current_model() != self.model => ActionState::Enabled,
            _ => ActionState::Disabled,
        }
    }
}
