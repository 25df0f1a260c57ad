// SPDX-License-Identifier: MIT OR Apache-2.0

use permit_core::{Id, WorkflowError};
use thiserror::Error;

/// Errors returned by `PermitService`, generic over the error type of the store.
#[derive(Debug, Error)]
pub enum ServiceError<E> {
    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: Id },

    /// The operation violates a workflow rule, see `WorkflowError` for details.
    #[error(transparent)]
    Workflow(#[from] WorkflowError),

    /// The record kept changing concurrently and the operation gave up.
    #[error("{0} was changed concurrently, please try again")]
    Conflict(Id),

    #[error("{0}")]
    Store(E),
}

impl<E> ServiceError<E> {
    pub(crate) fn not_found(kind: &'static str, id: &Id) -> Self {
        ServiceError::NotFound { kind, id: *id }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ServiceError::NotFound { .. })
    }

    pub fn is_invalid_transition(&self) -> bool {
        matches!(self, ServiceError::Workflow(err) if err.is_invalid_transition())
    }

    pub fn is_already_progressed(&self) -> bool {
        matches!(self, ServiceError::Workflow(err) if err.is_already_progressed())
    }
}
