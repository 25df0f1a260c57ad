// SPDX-License-Identifier: MIT OR Apache-2.0

//! Records and rules of the permit application workflow.
//!
//! Applications for chainsaw and timber permits move through a graph of stages, each step taken
//! by a specific role. This crate holds the record types, the per-type workflow graphs and the
//! rules for Orders of Payment, certificates and inspections. It does no I/O: every operation
//! takes the acting identity and the current time and mutates the given records in place.
pub mod application;
pub mod certificate;
pub mod error;
pub mod identity;
pub mod inspection;
pub mod payment;
pub mod stage;
#[cfg(any(test, feature = "test_utils"))]
pub mod test_utils;
pub mod view;
pub mod workflow;

pub use application::{Application, ApplicationType, Attachment, HistoryEntry};
pub use certificate::{Certificate, CertificateStatus, ECertificateSnapshot};
pub use error::WorkflowError;
pub use identity::{Actor, Id, IdError, Role, Timestamp, UserId};
pub use inspection::{Inspection, InspectionStatus};
pub use payment::{LineItem, OrderOfPayment, OrderOfPaymentStatus};
pub use stage::{Flag, Flags, Stage, Status};
pub use view::{Predicate, SortOrder, View};
pub use workflow::{
    Action, DefinitionError, StageUpdate, Transition, Workflow, WorkflowDefinition,
    WorkflowRegistry,
};
