// SPDX-License-Identifier: MIT OR Apache-2.0

use thiserror::Error;

use crate::identity::Role;
use crate::stage::{Flag, Stage, Status};
use crate::workflow::Action;

/// Violations of workflow rules.
///
/// All variants are meant to be shown to the user who tried to perform the operation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WorkflowError {
    /// No edge leads from the current stage to the requested one.
    #[error("can't move application from {from} to {to}")]
    InvalidTransition { from: Stage, to: Stage },

    /// The requested status does not belong to the transition.
    #[error("transition to {stage} sets status {expected}, not {requested}")]
    StatusMismatch {
        stage: Stage,
        expected: Status,
        requested: Status,
    },

    /// A supplied flag update is not part of the transition.
    #[error("transition from {from} to {to} does not set {flag} to {value}")]
    FlagMismatch {
        from: Stage,
        to: Stage,
        flag: Flag,
        value: bool,
    },

    /// Action is not available from the current stage.
    #[error("{action} is not possible while application is in {stage}")]
    ActionUnavailable { action: Action, stage: Stage },

    /// Action can't be reverted in this workflow.
    #[error("{0} can't be undone")]
    NotUndoable(Action),

    /// Undo was blocked because a later stage already acted on the application.
    #[error("can't undo {action}, application was already processed further ({flag} is set)")]
    AlreadyProgressed { action: Action, flag: Flag },

    /// Order of payment approval can't be reverted once the applicant paid.
    #[error("can't undo approval, proof of payment was already submitted")]
    PaymentSubmitted,

    /// Entity is in a state which doesn't allow the operation.
    #[error("{0}")]
    InvalidState(String),

    /// Required input is missing or malformed.
    #[error("{0}")]
    Validation(String),

    /// Role or owner mismatch.
    #[error("{role} is not allowed to {operation}")]
    Unauthorized { role: Role, operation: String },
}

impl WorkflowError {
    /// Returns `true` for all variants where the requested stage change is not an edge in the
    /// workflow graph.
    pub fn is_invalid_transition(&self) -> bool {
        matches!(
            self,
            WorkflowError::InvalidTransition { .. }
                | WorkflowError::StatusMismatch { .. }
                | WorkflowError::FlagMismatch { .. }
                | WorkflowError::ActionUnavailable { .. }
                | WorkflowError::NotUndoable(_)
        )
    }

    /// Returns `true` if an undo was rejected because the workflow already moved on.
    pub fn is_already_progressed(&self) -> bool {
        matches!(
            self,
            WorkflowError::AlreadyProgressed { .. } | WorkflowError::PaymentSubmitted
        )
    }
}
