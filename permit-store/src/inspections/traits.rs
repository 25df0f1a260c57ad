// SPDX-License-Identifier: MIT OR Apache-2.0

use std::error::Error;

use permit_core::{Id, Inspection};

/// Interface for storing inspections. An application can have any number of them.
pub trait InspectionStore {
    type Error: Error;

    /// Insert an inspection. Returns `false` if it already exists.
    fn insert_inspection(
        &self,
        inspection: &Inspection,
    ) -> impl Future<Output = Result<bool, Self::Error>>;

    fn get_inspection(
        &self,
        id: &Id,
    ) -> impl Future<Output = Result<Option<Inspection>, Self::Error>>;

    /// All inspections of an application, oldest first.
    fn get_inspections_for_application(
        &self,
        permit_id: &Id,
    ) -> impl Future<Output = Result<Vec<Inspection>, Self::Error>>;

    /// Overwrite an existing inspection. Returns `false` if it was not found.
    fn update_inspection(
        &self,
        inspection: &Inspection,
    ) -> impl Future<Output = Result<bool, Self::Error>>;
}
