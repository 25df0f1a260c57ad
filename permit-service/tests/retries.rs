// SPDX-License-Identifier: MIT OR Apache-2.0

use std::convert::Infallible;
use std::sync::{Arc, Mutex};

use assert_matches::assert_matches;
use permit_core::test_utils::{applicant, receiving_clerk};
use permit_core::{
    Action, Application, ApplicationType, Certificate, Id, Inspection, OrderOfPayment, Predicate,
    Stage,
};
use permit_service::test_utils::{create_draft, setup_logging};
use permit_service::{PermitService, ServiceError};
use permit_store::memory::{MemoryStore, TransactionPermit};
use permit_store::{
    ApplicationStore, CertificateStore, InspectionStore, OrderOfPaymentStore, Transaction,
};

#[derive(Debug, Default)]
struct Contention {
    /// Number of upcoming application updates which lose against another writer.
    conflicts: u32,
    /// Written in place of a losing update, as if another writer got there first.
    concurrent: Option<Application>,
    updates: u32,
}

/// Memory store where application updates can be made to lose their compare-and-set.
#[derive(Clone, Debug, Default)]
struct ContendedStore {
    inner: MemoryStore,
    contention: Arc<Mutex<Contention>>,
}

impl ContendedStore {
    fn conflict(&self, times: u32, concurrent: Option<Application>) {
        let mut contention = self.contention.lock().unwrap();
        contention.conflicts = times;
        contention.concurrent = concurrent;
        contention.updates = 0;
    }

    fn updates(&self) -> u32 {
        self.contention.lock().unwrap().updates
    }
}

impl Transaction for ContendedStore {
    type Error = Infallible;

    type Permit = TransactionPermit;

    async fn begin(&self) -> Result<TransactionPermit, Infallible> {
        self.inner.begin().await
    }

    fn within(&self, permit: &TransactionPermit) -> Self {
        Self {
            inner: self.inner.within(permit),
            contention: self.contention.clone(),
        }
    }

    async fn rollback(&self, permit: TransactionPermit) -> Result<(), Infallible> {
        self.inner.rollback(permit).await
    }

    async fn commit(&self, permit: TransactionPermit) -> Result<(), Infallible> {
        self.inner.commit(permit).await
    }
}

impl ApplicationStore for ContendedStore {
    type Error = Infallible;

    async fn insert_application(&self, application: &Application) -> Result<bool, Infallible> {
        self.inner.insert_application(application).await
    }

    async fn get_application(&self, id: &Id) -> Result<Option<Application>, Infallible> {
        self.inner.get_application(id).await
    }

    async fn update_application(
        &self,
        application: &Application,
        expected_stage: Stage,
    ) -> Result<bool, Infallible> {
        let concurrent = {
            let mut contention = self.contention.lock().unwrap();
            contention.updates += 1;
            if contention.conflicts == 0 {
                None
            } else {
                contention.conflicts -= 1;
                Some(contention.concurrent.take())
            }
        };

        match concurrent {
            None => {
                self.inner
                    .update_application(application, expected_stage)
                    .await
            }
            Some(concurrent) => {
                if let Some(concurrent) = concurrent {
                    self.inner
                        .update_application(&concurrent, expected_stage)
                        .await?;
                }
                Ok(false)
            }
        }
    }

    async fn delete_application(&self, id: &Id) -> Result<bool, Infallible> {
        self.inner.delete_application(id).await
    }

    async fn query_applications(
        &self,
        predicate: &Predicate,
    ) -> Result<Vec<Application>, Infallible> {
        self.inner.query_applications(predicate).await
    }

    async fn next_sequence_number(&self, scope: &str) -> Result<u64, Infallible> {
        self.inner.next_sequence_number(scope).await
    }
}

impl OrderOfPaymentStore for ContendedStore {
    type Error = Infallible;

    async fn insert_order(&self, order: &OrderOfPayment) -> Result<bool, Infallible> {
        self.inner.insert_order(order).await
    }

    async fn get_order(&self, id: &Id) -> Result<Option<OrderOfPayment>, Infallible> {
        self.inner.get_order(id).await
    }

    async fn get_order_for_application(
        &self,
        application_id: &Id,
    ) -> Result<Option<OrderOfPayment>, Infallible> {
        self.inner.get_order_for_application(application_id).await
    }

    async fn update_order(&self, order: &OrderOfPayment) -> Result<bool, Infallible> {
        self.inner.update_order(order).await
    }
}

impl CertificateStore for ContendedStore {
    type Error = Infallible;

    async fn insert_certificate(&self, certificate: &Certificate) -> Result<bool, Infallible> {
        self.inner.insert_certificate(certificate).await
    }

    async fn get_certificate(&self, id: &Id) -> Result<Option<Certificate>, Infallible> {
        self.inner.get_certificate(id).await
    }

    async fn get_certificate_for_application(
        &self,
        application_id: &Id,
    ) -> Result<Option<Certificate>, Infallible> {
        self.inner.get_certificate_for_application(application_id).await
    }

    async fn update_certificate(&self, certificate: &Certificate) -> Result<bool, Infallible> {
        self.inner.update_certificate(certificate).await
    }
}

impl InspectionStore for ContendedStore {
    type Error = Infallible;

    async fn insert_inspection(&self, inspection: &Inspection) -> Result<bool, Infallible> {
        self.inner.insert_inspection(inspection).await
    }

    async fn get_inspection(&self, id: &Id) -> Result<Option<Inspection>, Infallible> {
        self.inner.get_inspection(id).await
    }

    async fn get_inspections_for_application(
        &self,
        permit_id: &Id,
    ) -> Result<Vec<Inspection>, Infallible> {
        self.inner.get_inspections_for_application(permit_id).await
    }

    async fn update_inspection(&self, inspection: &Inspection) -> Result<bool, Infallible> {
        self.inner.update_inspection(inspection).await
    }
}

fn contended_service(max_retries: u32) -> (PermitService<ContendedStore>, ContendedStore) {
    setup_logging();
    let store = ContendedStore::default();
    let service = PermitService::builder(store.clone())
        .max_transition_retries(max_retries)
        .build()
        .unwrap();
    (service, store)
}

#[tokio::test]
async fn lost_updates_are_retried() {
    let (service, store) = contended_service(2);
    let draft = create_draft(&service, ApplicationType::TreeCuttingPermit).await;

    store.conflict(2, None);
    let submitted = service.submit(&draft.id, &applicant()).await.unwrap();

    assert_eq!(store.updates(), 3);
    assert_eq!(submitted.current_stage, Stage::ReceivingClerkReview);
    assert_eq!(
        service.get_application(&draft.id).await.unwrap(),
        submitted
    );
}

#[tokio::test]
async fn conflict_once_retries_are_exhausted() {
    let (service, store) = contended_service(2);
    let draft = create_draft(&service, ApplicationType::TreeCuttingPermit).await;

    store.conflict(3, None);
    let result = service.submit(&draft.id, &applicant()).await;

    assert_matches!(result, Err(ServiceError::Conflict(id)) if id == draft.id);
    assert_eq!(store.updates(), 3);
    assert_eq!(
        service
            .get_application(&draft.id)
            .await
            .unwrap()
            .current_stage,
        Stage::Draft
    );
}

#[tokio::test]
async fn retries_revalidate_against_concurrent_change() {
    let (service, store) = contended_service(2);
    let draft = create_draft(&service, ApplicationType::TreeCuttingPermit).await;
    let submitted = service.submit(&draft.id, &applicant()).await.unwrap();

    // Another clerk returns the application while this one accepts it.
    let mut returned = submitted.clone();
    service
        .workflow(ApplicationType::TreeCuttingPermit)
        .perform(
            &mut returned,
            Action::ReturnByReceivingClerk,
            Some("Missing barangay certification"),
            &receiving_clerk(),
            5_000,
        )
        .unwrap();

    store.conflict(1, Some(returned));
    let error = service
        .accept_by_receiving_clerk(&draft.id, &receiving_clerk())
        .await
        .unwrap_err();

    assert!(error.is_invalid_transition());
    assert_eq!(store.updates(), 1);

    // Nothing of the failed operation was committed.
    assert_eq!(
        service.get_application(&draft.id).await.unwrap(),
        submitted
    );
}
