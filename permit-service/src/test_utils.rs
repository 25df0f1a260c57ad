// SPDX-License-Identifier: MIT OR Apache-2.0

//! Services, notifiers and helpers for tests.
use std::error::Error;
use std::sync::{Arc, Mutex};

use permit_core::test_utils::{
    applicant, chief, complete_fields, officer, pdf, receiving_clerk, signature_image,
    technical_staff,
};
use permit_core::{Application, ApplicationType, Id, LineItem, Stage, Timestamp};
use permit_store::memory::MemoryStore;
use permit_store::sqlite::SqliteStore;

use crate::error::ServiceError;
use crate::notify::{Notifier, WorkflowEvent};
use crate::service::{PermitService, PermitStore};

/// Expiry date far enough in the future for every test run, 2100-01-01.
pub const FAR_FUTURE: Timestamp = 4_102_444_800;

pub fn setup_logging() {
    if std::env::var("RUST_LOG").is_ok() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
    }
}

pub fn memory_service() -> PermitService<MemoryStore> {
    setup_logging();
    PermitService::builder(MemoryStore::default())
        .build()
        .expect("built-in workflows are valid")
}

/// Service on a fresh SQLite database in a temporary directory.
pub async fn sqlite_service() -> PermitService<SqliteStore<'static>> {
    setup_logging();
    PermitService::builder(SqliteStore::temporary().await)
        .build()
        .expect("built-in workflows are valid")
}

/// Macro to run the same test logic against services on all store backends.
///
/// The test body is executed once with a service on a `MemoryStore` and once with a service on a
/// `SqliteStore`.
#[macro_export]
macro_rules! assert_all_services {
    (|$service:ident| $test_body:expr) => {
        {
            let $service = $crate::test_utils::memory_service();
            $test_body.await;
        }

        {
            let $service = $crate::test_utils::sqlite_service().await;
            $test_body.await;
        }
    };
}

/// Notifier keeping all events it was handed, optionally failing every time.
#[derive(Clone, Debug, Default)]
pub struct RecordingNotifier {
    events: Arc<Mutex<Vec<WorkflowEvent>>>,
    failing: bool,
}

impl RecordingNotifier {
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    pub fn events(&self) -> Vec<WorkflowEvent> {
        self.events.lock().expect("lock not poisoned").clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, event: &WorkflowEvent) -> Result<(), Box<dyn Error + Send + Sync>> {
        self.events
            .lock()
            .expect("lock not poisoned")
            .push(event.clone());

        if self.failing {
            return Err("mail server unreachable".into());
        }
        Ok(())
    }
}

pub fn line_items() -> Vec<LineItem> {
    vec![
        LineItem::new("Application fee", 60_000),
        LineItem::new("Inspection fee", 30_000),
    ]
}

/// New draft of the default applicant with all required fields.
pub async fn create_draft<S, E>(
    service: &PermitService<S>,
    application_type: ApplicationType,
) -> Application
where
    S: PermitStore<E>,
    E: Error,
{
    service
        .create_application(
            application_type,
            complete_fields(application_type),
            &applicant(),
        )
        .await
        .expect("create application")
}

/// Create a draft and move it along the regular path of its workflow until it reaches `stage`.
///
/// Inspections, the order of payment and the certificate are handled on the way.
pub async fn advance_to<S, E>(
    service: &PermitService<S>,
    application_type: ApplicationType,
    stage: Stage,
) -> Application
where
    S: PermitStore<E>,
    E: Error,
{
    let mut application = create_draft(service, application_type).await;
    while application.current_stage != stage {
        application = step(service, &application)
            .await
            .unwrap_or_else(|err| panic!("advance from {}: {err}", application.current_stage));
    }
    application
}

async fn step<S, E>(
    service: &PermitService<S>,
    application: &Application,
) -> Result<Application, ServiceError<E>>
where
    S: PermitStore<E>,
    E: Error,
{
    let id = &application.id;
    match application.current_stage {
        Stage::Draft => service.submit(id, &applicant()).await,
        Stage::ReceivingClerkReview => {
            service
                .accept_by_receiving_clerk(id, &receiving_clerk())
                .await
        }
        Stage::TechnicalStaffReview => {
            service
                .accept_by_technical_staff(id, &technical_staff())
                .await
        }
        Stage::ForRecordByReceivingClerk => service.record(id, &receiving_clerk()).await,
        Stage::ChiefRpsReview => service.review_by_chief(id, None, &chief()).await,
        Stage::CenrPenrReview => service.accept_by_officer(id, &officer()).await,
        Stage::ForInspectionByTechnicalStaff => {
            inspect(service, id).await?;
            service.approve_authenticity(id, &technical_staff()).await
        }
        Stage::AuthenticityApprovedByTechnicalStaff => {
            service.create_permit(id, &technical_staff()).await
        }
        Stage::AwaitingOrderOfPayment => {
            let order = service
                .create_order_of_payment(id, line_items(), None, &technical_staff())
                .await?;
            service
                .approve_order_of_payment(&order.id, signature_image(), &technical_staff())
                .await?;
            service.get_application(id).await
        }
        Stage::AwaitingPayment => {
            let order = service
                .order_of_payment_for_application(id)
                .await?
                .expect("order of payment exists");
            service
                .submit_payment_proof(&order.id, pdf("receipt.pdf"), &applicant())
                .await?;
            service
                .confirm_payment(&order.id, "OR-2026-0001", &technical_staff())
                .await?;
            service.get_application(id).await
        }
        Stage::PendingSignatureByPenrCenrOfficer => {
            let certificate = service
                .certificate_for_application(id)
                .await?
                .expect("certificate exists");
            service
                .sign_certificate(
                    &certificate.id,
                    Some(signature_image()),
                    Some(FAR_FUTURE),
                    &officer(),
                )
                .await?;
            service.get_application(id).await
        }
        Stage::PendingRelease => {
            let certificate = service
                .certificate_for_application(id)
                .await?
                .expect("certificate exists");
            service
                .release_certificate(&certificate.id, &receiving_clerk())
                .await?;
            service.get_application(id).await
        }
        stage => panic!("no regular step leaves {stage}"),
    }
}

/// Schedule and complete an inspection of the application.
pub async fn inspect<S, E>(service: &PermitService<S>, id: &Id) -> Result<(), ServiceError<E>>
where
    S: PermitStore<E>,
    E: Error,
{
    let staff = technical_staff();
    let inspection = service
        .schedule_inspection(id, 1_000, "Barangay Lupac, Boac", staff.user_id.clone(), &staff)
        .await?;
    service
        .complete_inspection(&inspection.id, "Trees and documents match", &staff)
        .await?;
    Ok(())
}
