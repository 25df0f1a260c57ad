// SPDX-License-Identifier: MIT OR Apache-2.0

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::application::ApplicationType;
use crate::workflow::{DefinitionError, Transition, Workflow};

/// Serializable list of transitions, used to configure workflows per deployment.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    pub transitions: Vec<Transition>,
}

impl WorkflowDefinition {
    pub fn build(&self) -> Result<Workflow, DefinitionError> {
        Workflow::from_transitions(self.transitions.clone())
    }
}

impl From<&Workflow> for WorkflowDefinition {
    fn from(workflow: &Workflow) -> Self {
        Self {
            transitions: workflow.transitions().into_iter().cloned().collect(),
        }
    }
}

/// Workflows by application type.
///
/// Only chainsaw registrations come with a dedicated built-in workflow, all other types use the
/// standard one unless a deployment configures its own.
#[derive(Clone, Debug)]
pub struct WorkflowRegistry {
    standard: Workflow,
    workflows: HashMap<ApplicationType, Workflow>,
}

impl WorkflowRegistry {
    pub fn new() -> Self {
        Self {
            standard: Workflow::standard(),
            workflows: HashMap::from([(
                ApplicationType::ChainsawRegistration,
                Workflow::chainsaw_registration(),
            )]),
        }
    }

    /// Registry with built-in workflows, overridden by the given definitions.
    pub fn with_definitions(
        definitions: &HashMap<ApplicationType, WorkflowDefinition>,
    ) -> Result<Self, DefinitionError> {
        let mut registry = Self::new();
        for (application_type, definition) in definitions {
            registry.insert(*application_type, definition.build()?);
        }
        Ok(registry)
    }

    pub fn insert(&mut self, application_type: ApplicationType, workflow: Workflow) {
        self.workflows.insert(application_type, workflow);
    }

    pub fn get(&self, application_type: ApplicationType) -> &Workflow {
        self.workflows
            .get(&application_type)
            .unwrap_or(&self.standard)
    }
}

impl Default for WorkflowRegistry {
    fn default() -> Self {
        Self::new()
    }
}
