// SPDX-License-Identifier: MIT OR Apache-2.0

use std::convert::Infallible;

use permit_core::{Application, Id, Predicate, Stage};

use crate::applications::ApplicationStore;
use crate::memory::MemoryStore;

impl ApplicationStore for MemoryStore {
    type Error = Infallible;

    async fn insert_application(&self, application: &Application) -> Result<bool, Self::Error> {
        let mut store = self.write_store().await;

        let taken = store.applications.values().any(|existing| {
            existing.id == application.id
                || existing.application_number == application.application_number
        });
        if taken {
            return Ok(false);
        }

        store
            .applications
            .insert(application.id, application.clone());
        Ok(true)
    }

    async fn get_application(&self, id: &Id) -> Result<Option<Application>, Self::Error> {
        Ok(self.read_store().applications.get(id).cloned())
    }

    async fn update_application(
        &self,
        application: &Application,
        expected_stage: Stage,
    ) -> Result<bool, Self::Error> {
        let mut store = self.write_store().await;
        match store.applications.get_mut(&application.id) {
            Some(stored) if stored.current_stage == expected_stage => {
                *stored = application.clone();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete_application(&self, id: &Id) -> Result<bool, Self::Error> {
        Ok(self.write_store().await.applications.remove(id).is_some())
    }

    async fn query_applications(
        &self,
        predicate: &Predicate,
    ) -> Result<Vec<Application>, Self::Error> {
        Ok(self
            .read_store()
            .applications
            .values()
            .filter(|application| predicate.matches(application))
            .cloned()
            .collect())
    }

    async fn next_sequence_number(&self, scope: &str) -> Result<u64, Self::Error> {
        let mut store = self.write_store().await;
        let value = store.sequences.entry(scope.to_string()).or_default();
        *value += 1;
        Ok(*value)
    }
}
