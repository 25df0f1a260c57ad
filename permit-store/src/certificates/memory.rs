// SPDX-License-Identifier: MIT OR Apache-2.0

use std::convert::Infallible;

use permit_core::{Certificate, Id};

use crate::certificates::CertificateStore;
use crate::memory::MemoryStore;

impl CertificateStore for MemoryStore {
    type Error = Infallible;

    async fn insert_certificate(&self, certificate: &Certificate) -> Result<bool, Self::Error> {
        let mut store = self.write_store().await;
        let taken = store.certificates.values().any(|existing| {
            existing.id == certificate.id || existing.application_id == certificate.application_id
        });
        if taken {
            return Ok(false);
        }
        store.certificates.insert(certificate.id, certificate.clone());
        Ok(true)
    }

    async fn get_certificate(&self, id: &Id) -> Result<Option<Certificate>, Self::Error> {
        Ok(self.read_store().certificates.get(id).cloned())
    }

    async fn get_certificate_for_application(
        &self,
        application_id: &Id,
    ) -> Result<Option<Certificate>, Self::Error> {
        Ok(self
            .read_store()
            .certificates
            .values()
            .find(|certificate| &certificate.application_id == application_id)
            .cloned())
    }

    async fn update_certificate(&self, certificate: &Certificate) -> Result<bool, Self::Error> {
        let mut store = self.write_store().await;
        let Some(stored) = store.certificates.get_mut(&certificate.id) else {
            return Ok(false);
        };
        *stored = certificate.clone();
        Ok(true)
    }
}
