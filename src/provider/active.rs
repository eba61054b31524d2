//! The currently selected model.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use tracing::info;

use super::client::{InFlightGuard, ModelClient};
use super::ModelFactory;
use crate::error::ConfigError;
use crate::host::UiBridge;
use crate::models::ModelDescriptor;

/// Holds the [`ModelClient`] for the selected model.
///
/// Selecting a model builds a fresh client through the factory and swaps it
/// in; queries already running keep the client they started with, and the
/// next query uses the new one.
pub struct ActiveModel {
    factory: Arc<dyn ModelFactory>,
    ui: Arc<dyn UiBridge>,
    in_flight: Arc<AtomicUsize>,
    current: RwLock<Arc<ModelClient>>,
}

impl ActiveModel {
    pub fn new(
        factory: Arc<dyn ModelFactory>,
        ui: Arc<dyn UiBridge>,
        descriptor: &ModelDescriptor,
    ) -> Result<Self, ConfigError> {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let model = factory.build(descriptor)?;
        let client = ModelClient::with_counter(model, Arc::clone(&ui), Arc::clone(&in_flight));
        Ok(Self {
            factory,
            ui,
            in_flight,
            current: RwLock::new(Arc::new(client)),
        })
    }

    /// Client for the selected model.
    pub fn client(&self) -> Arc<ModelClient> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn descriptor(&self) -> ModelDescriptor {
        self.client().descriptor().clone()
    }

    /// Switches to `descriptor`. On error the previous model stays selected.
    pub fn select(&self, descriptor: &ModelDescriptor) -> Result<(), ConfigError> {
        let model = self.factory.build(descriptor)?;
        let client =
            ModelClient::with_counter(model, Arc::clone(&self.ui), Arc::clone(&self.in_flight));
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(client);
        info!(model = %descriptor, "model selected");
        Ok(())
    }

    /// In-flight queries and batches across every client built here.
    pub fn pending(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn track(&self) -> InFlightGuard {
        self.client().track()
    }
}
