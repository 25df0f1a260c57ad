// SPDX-License-Identifier: MIT OR Apache-2.0

use std::sync::Arc;

use permit_core::{ApplicationType, DefinitionError, WorkflowDefinition, WorkflowRegistry};
use tokio::sync::broadcast;
use tracing::debug;

use crate::config::Config;
use crate::notify::{NoopNotifier, Notifier};
use crate::service::PermitService;

/// Configure and build a `PermitService` on top of a store.
pub struct ServiceBuilder<S> {
    store: S,
    config: Config,
    notifier: Arc<dyn Notifier>,
}

impl<S> ServiceBuilder<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            config: Config::default(),
            notifier: Arc::new(NoopNotifier),
        }
    }

    /// Replace the whole configuration, for example after loading it with `Config::from_json`.
    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    pub fn application_number_prefix(mut self, prefix: &str) -> Self {
        self.config.application_number_prefix = prefix.to_string();
        self
    }

    pub fn max_transition_retries(mut self, retries: u32) -> Self {
        self.config.max_transition_retries = retries;
        self
    }

    pub fn event_channel_capacity(mut self, capacity: usize) -> Self {
        self.config.event_channel_capacity = capacity;
        self
    }

    /// Use a custom workflow graph for one application type.
    pub fn workflow(
        mut self,
        application_type: ApplicationType,
        definition: WorkflowDefinition,
    ) -> Self {
        self.config.workflows.insert(application_type, definition);
        self
    }

    pub fn notifier(mut self, notifier: impl Notifier + 'static) -> Self {
        self.notifier = Arc::new(notifier);
        self
    }

    /// Validate all configured workflow graphs and build the service.
    pub fn build(self) -> Result<PermitService<S>, DefinitionError> {
        let registry = WorkflowRegistry::with_definitions(&self.config.workflows)?;

        // Broadcast channels panic with zero capacity.
        let (events, _) = broadcast::channel(self.config.event_channel_capacity.max(1));

        debug!(
            prefix = %self.config.application_number_prefix,
            custom_workflows = self.config.workflows.len(),
            "built permit service"
        );

        Ok(PermitService::new_inner(
            self.store,
            registry,
            self.config,
            self.notifier,
            events,
        ))
    }
}
