// SPDX-License-Identifier: MIT OR Apache-2.0

use permit_core::test_utils::{draft, officer, signature_image};
use permit_core::{ApplicationType, Certificate, CertificateStatus, Stage};

use crate::assert_all_stores;
use crate::certificates::CertificateStore;

#[tokio::test]
async fn store_and_sign_certificate() {
    assert_all_stores!(|store| async {
        let mut application = draft(ApplicationType::TreeCuttingPermit);
        application.current_stage = Stage::PendingSignatureByPenrCenrOfficer;

        let mut certificate = Certificate::create(&application, 10).unwrap();
        assert!(store.insert_certificate(&certificate).await.unwrap());

        // A second certificate for the same application is refused.
        let duplicate = Certificate::create(&application, 11).unwrap();
        assert!(!store.insert_certificate(&duplicate).await.unwrap());

        certificate
            .sign(
                &application,
                None,
                Some(signature_image()),
                Some(1_000_000),
                &officer(),
                12,
            )
            .unwrap();
        assert!(store.update_certificate(&certificate).await.unwrap());

        let stored = store
            .get_certificate_for_application(&application.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.status, CertificateStatus::Signed);
        assert_eq!(stored.e_certificate, certificate.e_certificate);
        assert_eq!(
            store.get_certificate(&certificate.id).await.unwrap(),
            Some(stored)
        );
    });
}
