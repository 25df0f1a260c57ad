// SPDX-License-Identifier: MIT OR Apache-2.0

//! Certificates issued for paid applications.
//!
//! A certificate is created once the payment of an application was confirmed. It then waits for
//! the signature of the PENR/CENR Officer and is finally released to the applicant.
use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::application::{Application, ApplicationType, Attachment};
use crate::error::WorkflowError;
use crate::identity::{Actor, Id, Role, Timestamp, UserId};
use crate::payment::OrderOfPayment;
use crate::stage::Stage;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CertificateStatus {
    #[serde(rename = "Pending Signature")]
    PendingSignature,
    Signed,
    Released,
}

impl fmt::Display for CertificateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            CertificateStatus::PendingSignature => "Pending Signature",
            CertificateStatus::Signed => "Signed",
            CertificateStatus::Released => "Released",
        };
        f.write_str(value)
    }
}

/// Everything needed to render the electronic certificate, captured when it got signed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ECertificateSnapshot {
    pub certificate_number: String,
    pub application_number: String,
    pub application_type: ApplicationType,
    pub applicant: UserId,
    pub fields: BTreeMap<String, String>,
    pub bill_number: Option<String>,
    pub amount_paid: Option<u64>,
    pub official_receipt: Option<String>,
    pub signed_by: UserId,
    pub signed_at: Timestamp,
    pub expiry_date: Timestamp,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Certificate {
    pub id: Id,
    pub application_id: Id,
    pub certificate_number: String,
    pub status: CertificateStatus,
    pub signature: Option<Attachment>,
    pub expiry_date: Option<Timestamp>,
    pub stamped_document: Option<Attachment>,
    pub e_certificate: Option<ECertificateSnapshot>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Certificate {
    /// Certificate waiting for signature, created after the payment was confirmed.
    pub fn create(
        application: &Application,
        timestamp: Timestamp,
    ) -> Result<Self, WorkflowError> {
        if application.current_stage != Stage::PendingSignatureByPenrCenrOfficer {
            return Err(WorkflowError::InvalidState(format!(
                "certificate can't be created while application is in {}",
                application.current_stage
            )));
        }

        Ok(Self {
            id: Id::random(),
            application_id: application.id,
            certificate_number: format!("{}-CERT", application.application_number),
            status: CertificateStatus::PendingSignature,
            signature: None,
            expiry_date: None,
            stamped_document: None,
            e_certificate: None,
            created_at: timestamp,
            updated_at: timestamp,
        })
    }

    /// Sign the certificate.
    ///
    /// Both the signature image and the expiry date are required. The e-certificate snapshot is
    /// taken from the current state of the application and its order of payment.
    pub fn sign(
        &mut self,
        application: &Application,
        order: Option<&OrderOfPayment>,
        signature: Option<Attachment>,
        expiry_date: Option<Timestamp>,
        actor: &Actor,
        timestamp: Timestamp,
    ) -> Result<(), WorkflowError> {
        actor.ensure_role(Role::PenrCenrOfficer, "sign certificate")?;
        self.expect_status(CertificateStatus::PendingSignature, "signed")?;

        let signature = signature
            .ok_or_else(|| WorkflowError::Validation("signature is required".into()))?;
        signature.validate()?;
        let expiry_date = expiry_date
            .ok_or_else(|| WorkflowError::Validation("expiry date is required".into()))?;
        if expiry_date <= timestamp {
            return Err(WorkflowError::Validation(
                "expiry date needs to be in the future".into(),
            ));
        }

        self.e_certificate = Some(ECertificateSnapshot {
            certificate_number: self.certificate_number.clone(),
            application_number: application.application_number.clone(),
            application_type: application.application_type,
            applicant: application.user_id.clone(),
            fields: application.fields.clone(),
            bill_number: order.and_then(|order| order.bill_number.clone()),
            amount_paid: order.map(|order| order.total),
            official_receipt: order.and_then(|order| order.official_receipt.clone()),
            signed_by: actor.user_id.clone(),
            signed_at: timestamp,
            expiry_date,
        });
        self.signature = Some(signature);
        self.expiry_date = Some(expiry_date);
        self.set_status(CertificateStatus::Signed, timestamp);
        Ok(())
    }

    /// Attach the scanned, stamped paper certificate.
    pub fn upload_stamped(
        &mut self,
        document: Attachment,
        actor: &Actor,
        timestamp: Timestamp,
    ) -> Result<(), WorkflowError> {
        actor.ensure_role(Role::ReceivingClerk, "upload stamped certificate")?;
        self.expect_status(CertificateStatus::Signed, "stamped")?;
        document.validate()?;

        self.stamped_document = Some(document);
        self.updated_at = timestamp;
        Ok(())
    }

    pub fn release(&mut self, actor: &Actor, timestamp: Timestamp) -> Result<(), WorkflowError> {
        actor.ensure_role(Role::ReceivingClerk, "release certificate")?;
        self.expect_status(CertificateStatus::Signed, "released")?;
        self.set_status(CertificateStatus::Released, timestamp);
        Ok(())
    }

    fn expect_status(
        &self,
        expected: CertificateStatus,
        operation: &str,
    ) -> Result<(), WorkflowError> {
        if self.status != expected {
            return Err(WorkflowError::InvalidState(format!(
                "certificate in status {} can't be {operation}",
                self.status
            )));
        }
        Ok(())
    }

    fn set_status(&mut self, status: CertificateStatus, timestamp: Timestamp) {
        debug!(id = %self.id, from = %self.status, to = %status, "certificate status changed");
        self.status = status;
        self.updated_at = timestamp;
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use crate::application::{Application, ApplicationType};
    use crate::error::WorkflowError;
    use crate::stage::Stage;
    use crate::test_utils::{draft, officer, pdf, receiving_clerk, signature_image};

    use super::{Certificate, CertificateStatus};

    const YEAR: u64 = 365 * 24 * 60 * 60;

    fn paid() -> Application {
        let mut application = draft(ApplicationType::ChainsawRegistration);
        application.current_stage = Stage::PendingSignatureByPenrCenrOfficer;
        application
    }

    #[test]
    fn created_only_after_payment() {
        assert_matches!(
            Certificate::create(&draft(ApplicationType::ChainsawRegistration), 10),
            Err(WorkflowError::InvalidState(_))
        );

        let application = paid();
        let certificate = Certificate::create(&application, 10).unwrap();
        assert_eq!(certificate.status, CertificateStatus::PendingSignature);
        assert_eq!(certificate.certificate_number, "TEST-CSAW-000001-CERT");
    }

    #[test]
    fn sign_requires_signature_and_expiry() {
        let application = paid();
        let mut certificate = Certificate::create(&application, 10).unwrap();

        for (signature, expiry_date) in [
            (None, Some(YEAR)),
            (Some(signature_image()), None),
            (Some(pdf("")), Some(YEAR)),
            (Some(signature_image()), Some(5)),
        ] {
            assert_matches!(
                certificate.sign(&application, None, signature, expiry_date, &officer(), 20),
                Err(WorkflowError::Validation(_))
            );
            assert_eq!(certificate.status, CertificateStatus::PendingSignature);
            assert!(certificate.e_certificate.is_none());
        }

        certificate
            .sign(
                &application,
                None,
                Some(signature_image()),
                Some(YEAR),
                &officer(),
                20,
            )
            .unwrap();
        assert_eq!(certificate.status, CertificateStatus::Signed);

        let snapshot = certificate.e_certificate.as_ref().unwrap();
        assert_eq!(snapshot.application_number, application.application_number);
        assert_eq!(snapshot.signed_by, officer().user_id);
        assert_eq!(snapshot.expiry_date, YEAR);
    }

    #[test]
    fn stamp_and_release_after_signing() {
        let application = paid();
        let mut certificate = Certificate::create(&application, 10).unwrap();

        assert_matches!(
            certificate.upload_stamped(pdf("stamped.pdf"), &receiving_clerk(), 11),
            Err(WorkflowError::InvalidState(_))
        );
        assert_matches!(
            certificate.release(&receiving_clerk(), 11),
            Err(WorkflowError::InvalidState(_))
        );

        certificate
            .sign(
                &application,
                None,
                Some(signature_image()),
                Some(YEAR),
                &officer(),
                20,
            )
            .unwrap();
        assert_matches!(
            certificate.release(&officer(), 21),
            Err(WorkflowError::Unauthorized { .. })
        );

        certificate
            .upload_stamped(pdf("stamped.pdf"), &receiving_clerk(), 21)
            .unwrap();
        certificate.release(&receiving_clerk(), 22).unwrap();
        assert_eq!(certificate.status, CertificateStatus::Released);
        assert!(certificate.stamped_document.is_some());
    }
}
