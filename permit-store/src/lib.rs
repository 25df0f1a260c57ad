// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persistence for permit applications and the records attached to them.
//!
//! Every record kind has its own store trait: [`ApplicationStore`], [`OrderOfPaymentStore`],
//! [`CertificateStore`] and [`InspectionStore`]. Writes which need to happen together, for
//! example approving an Order of Payment and moving the application along, are grouped into one
//! atomic [`Transaction`].
//!
//! Applications are never overwritten blindly. [`ApplicationStore::update_application`] is a
//! compare-and-set on the stage the caller observed when loading the record, a concurrent
//! transition in between makes the update fail instead of silently undoing it.
//!
//! Two implementations are provided: [`memory::MemoryStore`] for tests and development and
//! [`sqlite::SqliteStore`] backed by an SQLite database.
pub mod applications;
pub mod certificates;
pub mod inspections;
#[cfg(feature = "memory")]
pub mod memory;
pub mod orders;
#[cfg(feature = "sqlite")]
pub mod sqlite;
#[cfg(any(test, feature = "test_utils"))]
mod test_utils;
mod traits;

pub use applications::ApplicationStore;
pub use certificates::CertificateStore;
pub use inspections::InspectionStore;
pub use orders::OrderOfPaymentStore;
pub use traits::Transaction;
