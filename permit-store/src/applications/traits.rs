// SPDX-License-Identifier: MIT OR Apache-2.0

use std::error::Error;

use permit_core::{Application, Id, Predicate, Stage};

/// Interface for storing and querying permit applications.
pub trait ApplicationStore {
    type Error: Error;

    /// Insert a new application.
    ///
    /// Returns `false` if an application with the same id or application number already exists,
    /// nothing is written in that case.
    fn insert_application(
        &self,
        application: &Application,
    ) -> impl Future<Output = Result<bool, Self::Error>>;

    /// Get an application by id.
    fn get_application(
        &self,
        id: &Id,
    ) -> impl Future<Output = Result<Option<Application>, Self::Error>>;

    /// Overwrite an application, but only if its stored stage still is `expected_stage`.
    ///
    /// Returns `false` if the application is gone or was moved to another stage in the meantime.
    fn update_application(
        &self,
        application: &Application,
        expected_stage: Stage,
    ) -> impl Future<Output = Result<bool, Self::Error>>;

    /// Delete an application.
    ///
    /// Returns `true` when the removal occurred and `false` when the application was not found.
    fn delete_application(&self, id: &Id) -> impl Future<Output = Result<bool, Self::Error>>;

    /// All applications matching the predicate, in no particular order.
    fn query_applications(
        &self,
        predicate: &Predicate,
    ) -> impl Future<Output = Result<Vec<Application>, Self::Error>>;

    /// Increment and return the counter of the given scope, starting at 1.
    ///
    /// Used to derive human-readable application numbers.
    fn next_sequence_number(&self, scope: &str)
    -> impl Future<Output = Result<u64, Self::Error>>;
}
