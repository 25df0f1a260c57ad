// SPDX-License-Identifier: MIT OR Apache-2.0

//! Permit application workflow service.
//!
//! [`PermitService`] ties the workflow rules of `permit-core` to a store from `permit-store`. It
//! creates applications, moves them along the workflow graph of their type, reverts actions and
//! drives the order of payment, inspection and certificate of each application. Changes which
//! touch more than one record are written in one store transaction.
//!
//! Committed changes are published as [`WorkflowEvent`]s to everyone who called
//! [`PermitService::subscribe`] and, for decisions relevant to applicants and staff, handed to a
//! [`Notifier`].
//!
//! Use [`ServiceBuilder`] to configure the service, for example with custom workflow graphs per
//! application type loaded from a [`Config`].
mod builder;
mod config;
mod error;
mod notify;
mod service;
#[cfg(any(test, feature = "test_utils"))]
pub mod test_utils;

pub use builder::ServiceBuilder;
pub use config::{
    Config, DEFAULT_APPLICATION_NUMBER_PREFIX, DEFAULT_EVENT_CHANNEL_CAPACITY,
    DEFAULT_MAX_TRANSITION_RETRIES,
};
pub use error::ServiceError;
pub use notify::{NoopNotifier, Notifier, WorkflowEvent};
pub use service::{PermitService, PermitStore};
