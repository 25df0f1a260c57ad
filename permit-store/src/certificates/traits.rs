// SPDX-License-Identifier: MIT OR Apache-2.0

use std::error::Error;

use permit_core::{Certificate, Id};

/// Interface for storing certificates, at most one per application.
pub trait CertificateStore {
    type Error: Error;

    /// Insert a certificate.
    ///
    /// Returns `false` when the linked application already has a certificate, nothing is written
    /// in that case.
    fn insert_certificate(
        &self,
        certificate: &Certificate,
    ) -> impl Future<Output = Result<bool, Self::Error>>;

    fn get_certificate(
        &self,
        id: &Id,
    ) -> impl Future<Output = Result<Option<Certificate>, Self::Error>>;

    fn get_certificate_for_application(
        &self,
        application_id: &Id,
    ) -> impl Future<Output = Result<Option<Certificate>, Self::Error>>;

    /// Overwrite an existing certificate. Returns `false` if it was not found.
    fn update_certificate(
        &self,
        certificate: &Certificate,
    ) -> impl Future<Output = Result<bool, Self::Error>>;
}
