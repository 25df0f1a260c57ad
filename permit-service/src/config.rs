// SPDX-License-Identifier: MIT OR Apache-2.0

use std::collections::HashMap;

use permit_core::{ApplicationType, WorkflowDefinition};
use serde::{Deserialize, Serialize};

/// Prefix of human-readable application numbers, for example `PMDQ-TCP-000042`.
pub const DEFAULT_APPLICATION_NUMBER_PREFIX: &str = "PMDQ";

/// How often a transition is re-validated after losing a race against a concurrent one.
pub const DEFAULT_MAX_TRANSITION_RETRIES: u32 = 3;

/// Number of events buffered for slow subscribers before they start lagging.
pub const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 128;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
    pub application_number_prefix: String,

    pub max_transition_retries: u32,

    /// Capacity of the broadcast channel handed out by `PermitService::subscribe`.
    pub event_channel_capacity: usize,

    /// Workflow graphs overriding the built-in ones.
    ///
    /// Application types without an entry use the standard workflow, or the chainsaw
    /// registration workflow for chainsaw registrations.
    pub workflows: HashMap<ApplicationType, WorkflowDefinition>,
}

impl Config {
    pub fn from_json(value: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(value)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            application_number_prefix: DEFAULT_APPLICATION_NUMBER_PREFIX.to_string(),
            max_transition_retries: DEFAULT_MAX_TRANSITION_RETRIES,
            event_channel_capacity: DEFAULT_EVENT_CHANNEL_CAPACITY,
            workflows: HashMap::new(),
        }
    }
}
