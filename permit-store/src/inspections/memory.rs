// SPDX-License-Identifier: MIT OR Apache-2.0

use std::convert::Infallible;

use permit_core::{Id, Inspection};

use crate::inspections::InspectionStore;
use crate::memory::MemoryStore;

impl InspectionStore for MemoryStore {
    type Error = Infallible;

    async fn insert_inspection(&self, inspection: &Inspection) -> Result<bool, Self::Error> {
        let mut store = self.write_store().await;
        if store.inspections.contains_key(&inspection.id) {
            return Ok(false);
        }
        store.inspections.insert(inspection.id, inspection.clone());
        Ok(true)
    }

    async fn get_inspection(&self, id: &Id) -> Result<Option<Inspection>, Self::Error> {
        Ok(self.read_store().inspections.get(id).cloned())
    }

    async fn get_inspections_for_application(
        &self,
        permit_id: &Id,
    ) -> Result<Vec<Inspection>, Self::Error> {
        let mut inspections: Vec<Inspection> = self
            .read_store()
            .inspections
            .values()
            .filter(|inspection| &inspection.permit_id == permit_id)
            .cloned()
            .collect();
        inspections.sort_by_key(|inspection| (inspection.created_at, inspection.id));
        Ok(inspections)
    }

    async fn update_inspection(&self, inspection: &Inspection) -> Result<bool, Self::Error> {
        let mut store = self.write_store().await;
        let Some(stored) = store.inspections.get_mut(&inspection.id) else {
            return Ok(false);
        };
        *stored = inspection.clone();
        Ok(true)
    }
}
