// SPDX-License-Identifier: MIT OR Apache-2.0

use std::collections::BTreeMap;
use std::error::Error;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use permit_core::inspection::ensure_inspected;
use permit_core::view::filter;
use permit_core::{
    Action, Actor, Application, ApplicationType, Attachment, Certificate, Id, Inspection,
    LineItem, OrderOfPayment, Role, SortOrder, StageUpdate, Timestamp, Transition, UserId, View,
    Workflow, WorkflowError, WorkflowRegistry,
};
use permit_store::{
    ApplicationStore, CertificateStore, InspectionStore, OrderOfPaymentStore, Transaction,
};
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::builder::ServiceBuilder;
use crate::config::Config;
use crate::error::ServiceError;
use crate::notify::{Notifier, WorkflowEvent};

/// Store providing every record kind of the permit workflow with one error type.
pub trait PermitStore<E>:
    ApplicationStore<Error = E>
    + OrderOfPaymentStore<Error = E>
    + CertificateStore<Error = E>
    + InspectionStore<Error = E>
    + Transaction<Error = E>
{
}

impl<T, E> PermitStore<E> for T where
    T: ApplicationStore<Error = E>
        + OrderOfPaymentStore<Error = E>
        + CertificateStore<Error = E>
        + InspectionStore<Error = E>
        + Transaction<Error = E>
{
}

/// Entry point for all operations on permit applications and their linked records.
///
/// Every write runs inside one store transaction, including the cascades from orders of payment
/// and certificates into the application workflow. Changes to applications are compare-and-set
/// on the stage which was observed when loading them. Committed changes are published as
/// [`WorkflowEvent`]s.
#[derive(Clone)]
pub struct PermitService<S> {
    store: S,
    registry: Arc<WorkflowRegistry>,
    config: Arc<Config>,
    notifier: Arc<dyn Notifier>,
    events: broadcast::Sender<WorkflowEvent>,
}

impl<S> PermitService<S> {
    pub fn builder(store: S) -> ServiceBuilder<S> {
        ServiceBuilder::new(store)
    }

    pub(crate) fn new_inner(
        store: S,
        registry: WorkflowRegistry,
        config: Config,
        notifier: Arc<dyn Notifier>,
        events: broadcast::Sender<WorkflowEvent>,
    ) -> Self {
        Self {
            store,
            registry: Arc::new(registry),
            config: Arc::new(config),
            notifier,
            events,
        }
    }

    /// Same service on another handle of the store.
    fn with_store(&self, store: S) -> Self {
        Self {
            store,
            registry: self.registry.clone(),
            config: self.config.clone(),
            notifier: self.notifier.clone(),
            events: self.events.clone(),
        }
    }

    /// Subscribe to all changes committed after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<WorkflowEvent> {
        self.events.subscribe()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Workflow graph used for applications of the given type.
    pub fn workflow(&self, application_type: ApplicationType) -> &Workflow {
        self.registry.get(application_type)
    }

    fn publish(&self, events: Vec<WorkflowEvent>) {
        for event in events {
            if event.is_notifiable() {
                if let Err(err) = self.notifier.notify(&event) {
                    warn!(
                        application_id = %event.application_id(),
                        %err,
                        "failed sending notification"
                    );
                }
            }

            // Sending only fails when nobody is subscribed.
            let _ = self.events.send(event);
        }
    }
}

impl<S, E> PermitService<S>
where
    S: ApplicationStore<Error = E>
        + OrderOfPaymentStore<Error = E>
        + CertificateStore<Error = E>
        + InspectionStore<Error = E>
        + Transaction<Error = E>,
    E: Error,
{
    /// Create a new draft owned by the applicant.
    pub async fn create_application(
        &self,
        application_type: ApplicationType,
        fields: BTreeMap<String, String>,
        actor: &Actor,
    ) -> Result<Application, ServiceError<E>> {
        actor.ensure_role(Role::Applicant, "create application")?;

        self.atomic(async move |tx, events| {
            let scope = format!(
                "{}-{}",
                tx.config.application_number_prefix,
                application_type.code()
            );
            let sequence = tx
                .store
                .next_sequence_number(&scope)
                .await
                .map_err(ServiceError::Store)?;

            let application = Application::new(
                format!("{scope}-{sequence:06}"),
                application_type,
                actor.user_id.clone(),
                fields,
                now(),
            );
            if !tx
                .store
                .insert_application(&application)
                .await
                .map_err(ServiceError::Store)?
            {
                return Err(ServiceError::Conflict(application.id));
            }

            info!(
                id = %application.id,
                number = %application.application_number,
                "created application"
            );
            events.push(WorkflowEvent::ApplicationCreated {
                application_id: application.id,
                application_number: application.application_number.clone(),
            });
            Ok(application)
        })
        .await
    }

    pub async fn get_application(&self, id: &Id) -> Result<Application, ServiceError<E>> {
        self.load_application(id).await
    }

    /// Applications shown in a view, ordered by date of submission.
    pub async fn list(
        &self,
        view: View,
        actor: &Actor,
        order: SortOrder,
    ) -> Result<Vec<Application>, ServiceError<E>> {
        actor.ensure_role(view.role(), "list applications")?;

        let predicate = view.predicate(actor);
        let applications = self
            .store
            .query_applications(&predicate)
            .await
            .map_err(ServiceError::Store)?;
        Ok(filter(applications, &predicate, order))
    }

    /// Move an application to the stage named in the update.
    pub async fn transition(
        &self,
        id: &Id,
        update: &StageUpdate,
        actor: &Actor,
    ) -> Result<Application, ServiceError<E>> {
        self.atomic(async |tx, events| {
            let inspections = tx.inspections(id).await?;
            let timestamp = now();
            let (application, transition) = tx
                .advance(id, |workflow, application| {
                    let transition = workflow.apply_update(application, update, actor, timestamp)?;
                    check_direct(&transition, &inspections)?;
                    Ok(transition)
                })
                .await?;

            events.push(stage_changed(&application, &transition));
            Ok(application)
        })
        .await
    }

    /// Perform an action on an application, remarks are written to its history.
    ///
    /// Actions completing an order of payment or certificate step can only be taken through
    /// the operations on these records.
    pub async fn perform(
        &self,
        id: &Id,
        action: Action,
        remarks: Option<&str>,
        actor: &Actor,
    ) -> Result<Application, ServiceError<E>> {
        self.atomic(async |tx, events| {
            let inspections = tx.inspections(id).await?;
            let timestamp = now();
            let (application, transition) = tx
                .advance(id, |workflow, application| {
                    let transition =
                        workflow.perform(application, action, remarks, actor, timestamp)?;
                    check_direct(&transition, &inspections)?;
                    Ok(transition)
                })
                .await?;

            events.push(stage_changed(&application, &transition));
            Ok(application)
        })
        .await
    }

    pub async fn submit(&self, id: &Id, actor: &Actor) -> Result<Application, ServiceError<E>> {
        self.perform(id, Action::Submit, None, actor).await
    }

    pub async fn resubmit(&self, id: &Id, actor: &Actor) -> Result<Application, ServiceError<E>> {
        self.perform(id, Action::Resubmit, None, actor).await
    }

    pub async fn return_by_receiving_clerk(
        &self,
        id: &Id,
        remarks: &str,
        actor: &Actor,
    ) -> Result<Application, ServiceError<E>> {
        self.perform(id, Action::ReturnByReceivingClerk, Some(remarks), actor)
            .await
    }

    pub async fn accept_by_receiving_clerk(
        &self,
        id: &Id,
        actor: &Actor,
    ) -> Result<Application, ServiceError<E>> {
        self.perform(id, Action::AcceptByReceivingClerk, None, actor)
            .await
    }

    pub async fn return_by_technical_staff(
        &self,
        id: &Id,
        remarks: &str,
        actor: &Actor,
    ) -> Result<Application, ServiceError<E>> {
        self.perform(id, Action::ReturnByTechnicalStaff, Some(remarks), actor)
            .await
    }

    pub async fn accept_by_technical_staff(
        &self,
        id: &Id,
        actor: &Actor,
    ) -> Result<Application, ServiceError<E>> {
        self.perform(id, Action::AcceptByTechnicalStaff, None, actor)
            .await
    }

    pub async fn record(&self, id: &Id, actor: &Actor) -> Result<Application, ServiceError<E>> {
        self.perform(id, Action::Record, None, actor).await
    }

    pub async fn review_by_chief(
        &self,
        id: &Id,
        remarks: Option<&str>,
        actor: &Actor,
    ) -> Result<Application, ServiceError<E>> {
        self.perform(id, Action::ReviewByChief, remarks, actor).await
    }

    pub async fn reject_by_chief(
        &self,
        id: &Id,
        remarks: &str,
        actor: &Actor,
    ) -> Result<Application, ServiceError<E>> {
        self.perform(id, Action::RejectByChief, Some(remarks), actor)
            .await
    }

    pub async fn accept_by_officer(
        &self,
        id: &Id,
        actor: &Actor,
    ) -> Result<Application, ServiceError<E>> {
        self.perform(id, Action::AcceptByOfficer, None, actor).await
    }

    pub async fn reject_by_officer(
        &self,
        id: &Id,
        remarks: &str,
        actor: &Actor,
    ) -> Result<Application, ServiceError<E>> {
        self.perform(id, Action::RejectByOfficer, Some(remarks), actor)
            .await
    }

    /// Approve authenticity, needs a completed inspection of the application.
    pub async fn approve_authenticity(
        &self,
        id: &Id,
        actor: &Actor,
    ) -> Result<Application, ServiceError<E>> {
        self.perform(id, Action::ApproveAuthenticity, None, actor)
            .await
    }

    pub async fn create_permit(
        &self,
        id: &Id,
        actor: &Actor,
    ) -> Result<Application, ServiceError<E>> {
        self.perform(id, Action::CreatePermit, None, actor).await
    }

    /// Revert an action as long as no later role acted on the application.
    pub async fn undo(
        &self,
        id: &Id,
        action: Action,
        actor: &Actor,
    ) -> Result<Application, ServiceError<E>> {
        // The order of payment needs to go back to approval together with the application.
        if action == Action::IssueOrderOfPayment {
            return self.undo_technical_staff_oop_approval(id, actor).await;
        }

        self.atomic(async |tx, events| {
            let timestamp = now();
            let (application, _) = tx
                .advance(id, |workflow, application| {
                    workflow.undo(application, action, actor, timestamp)
                })
                .await?;

            events.push(undone(&application, action));
            Ok(application)
        })
        .await
    }

    pub async fn undo_acceptance_receiving_clerk(
        &self,
        id: &Id,
        actor: &Actor,
    ) -> Result<Application, ServiceError<E>> {
        self.undo(id, Action::AcceptByReceivingClerk, actor).await
    }

    pub async fn undo_acceptance_technical_staff(
        &self,
        id: &Id,
        actor: &Actor,
    ) -> Result<Application, ServiceError<E>> {
        self.undo(id, Action::AcceptByTechnicalStaff, actor).await
    }

    pub async fn undo_record_application(
        &self,
        id: &Id,
        actor: &Actor,
    ) -> Result<Application, ServiceError<E>> {
        self.undo(id, Action::Record, actor).await
    }

    pub async fn undo_review_chief(
        &self,
        id: &Id,
        actor: &Actor,
    ) -> Result<Application, ServiceError<E>> {
        self.undo(id, Action::ReviewByChief, actor).await
    }

    pub async fn undo_acceptance_penr_cenr_officer(
        &self,
        id: &Id,
        actor: &Actor,
    ) -> Result<Application, ServiceError<E>> {
        self.undo(id, Action::AcceptByOfficer, actor).await
    }

    pub async fn undo_authenticity_approval(
        &self,
        id: &Id,
        actor: &Actor,
    ) -> Result<Application, ServiceError<E>> {
        self.undo(id, Action::ApproveAuthenticity, actor).await
    }

    /// Send the order of payment of an application back to approval.
    ///
    /// Fails once the applicant submitted a proof of payment.
    pub async fn undo_technical_staff_oop_approval(
        &self,
        id: &Id,
        actor: &Actor,
    ) -> Result<Application, ServiceError<E>> {
        self.atomic(async |tx, events| {
            let mut order = tx
                .store
                .get_order_for_application(id)
                .await
                .map_err(ServiceError::Store)?
                .ok_or(ServiceError::not_found("order of payment for application", id))?;

            let timestamp = now();
            order.undo_approval(actor, timestamp)?;
            let (application, _) = tx
                .advance(id, |workflow, application| {
                    workflow.undo(
                        application,
                        Action::IssueOrderOfPayment,
                        actor,
                        timestamp,
                    )
                })
                .await?;
            tx.save_order(&order).await?;

            events.push(order_changed(&order));
            events.push(undone(&application, Action::IssueOrderOfPayment));
            Ok(application)
        })
        .await
    }

    /// Attach files to a draft or returned application.
    pub async fn attach_files(
        &self,
        id: &Id,
        document_type: &str,
        files: Vec<Attachment>,
        actor: &Actor,
    ) -> Result<Application, ServiceError<E>> {
        self.atomic(async move |tx, events| {
            let mut application = tx.load_application(id).await?;
            application.attach_files(actor, document_type, files, now())?;

            if !tx
                .store
                .update_application(&application, application.current_stage)
                .await
                .map_err(ServiceError::Store)?
            {
                return Err(ServiceError::Conflict(*id));
            }

            events.push(WorkflowEvent::FilesAttached {
                application_id: *id,
                document_type: document_type.to_string(),
            });
            Ok(application)
        })
        .await
    }

    /// Remove a draft for good.
    pub async fn delete_application(&self, id: &Id, actor: &Actor) -> Result<(), ServiceError<E>> {
        self.atomic(async |tx, events| {
            let application = tx.load_application(id).await?;
            application.ensure_deletable(actor)?;

            if !tx
                .store
                .delete_application(id)
                .await
                .map_err(ServiceError::Store)?
            {
                return Err(ServiceError::not_found("application", id));
            }

            info!(%id, number = %application.application_number, "deleted application");
            events.push(WorkflowEvent::ApplicationDeleted { application_id: *id });
            Ok(())
        })
        .await
    }

    /// Assess the fees of an application waiting for its order of payment.
    pub async fn create_order_of_payment(
        &self,
        application_id: &Id,
        items: Vec<LineItem>,
        bill_number: Option<String>,
        actor: &Actor,
    ) -> Result<OrderOfPayment, ServiceError<E>> {
        self.atomic(async move |tx, events| {
            let application = tx.load_application(application_id).await?;
            let order = OrderOfPayment::create(&application, items, bill_number, actor, now())?;

            if !tx
                .store
                .insert_order(&order)
                .await
                .map_err(ServiceError::Store)?
            {
                return Err(WorkflowError::InvalidState(format!(
                    "application {} already has an order of payment",
                    application.application_number
                ))
                .into());
            }

            info!(id = %order.id, %application_id, total = order.total, "created order of payment");
            events.push(order_changed(&order));
            Ok(order)
        })
        .await
    }

    pub async fn get_order_of_payment(&self, id: &Id) -> Result<OrderOfPayment, ServiceError<E>> {
        self.load_order(id).await
    }

    pub async fn order_of_payment_for_application(
        &self,
        application_id: &Id,
    ) -> Result<Option<OrderOfPayment>, ServiceError<E>> {
        self.store
            .get_order_for_application(application_id)
            .await
            .map_err(ServiceError::Store)
    }

    /// Sign the order of payment, the application then waits for payment.
    pub async fn approve_order_of_payment(
        &self,
        id: &Id,
        signature: Attachment,
        actor: &Actor,
    ) -> Result<OrderOfPayment, ServiceError<E>> {
        self.atomic(async move |tx, events| {
            let mut order = tx.load_order(id).await?;
            let timestamp = now();
            order.approve(signature, actor, timestamp)?;

            let (application, transition) = tx
                .advance(&order.application_id, |workflow, application| {
                    workflow.perform(
                        application,
                        Action::IssueOrderOfPayment,
                        None,
                        actor,
                        timestamp,
                    )
                })
                .await?;
            tx.save_order(&order).await?;

            events.push(order_changed(&order));
            events.push(stage_changed(&application, &transition));
            Ok(order)
        })
        .await
    }

    /// Undo the approval of an order of payment, see `undo_technical_staff_oop_approval`.
    pub async fn undo_order_of_payment_approval(
        &self,
        id: &Id,
        actor: &Actor,
    ) -> Result<OrderOfPayment, ServiceError<E>> {
        let order = self.load_order(id).await?;
        self.undo_technical_staff_oop_approval(&order.application_id, actor)
            .await?;
        self.load_order(id).await
    }

    pub async fn submit_payment_proof(
        &self,
        id: &Id,
        proof: Attachment,
        actor: &Actor,
    ) -> Result<OrderOfPayment, ServiceError<E>> {
        self.atomic(async move |tx, events| {
            let mut order = tx.load_order(id).await?;
            let application = tx.load_application(&order.application_id).await?;
            order.submit_payment_proof(&application, proof, actor, now())?;
            tx.save_order(&order).await?;

            events.push(order_changed(&order));
            Ok(order)
        })
        .await
    }

    /// Confirm the payment against the official receipt.
    ///
    /// The application moves on to the PENR/CENR Officer and its certificate is created, waiting
    /// for signature.
    pub async fn confirm_payment(
        &self,
        id: &Id,
        official_receipt: &str,
        actor: &Actor,
    ) -> Result<OrderOfPayment, ServiceError<E>> {
        self.atomic(async |tx, events| {
            let mut order = tx.load_order(id).await?;
            let timestamp = now();
            order.confirm_payment(official_receipt, actor, timestamp)?;

            let (application, transition) = tx
                .advance(&order.application_id, |workflow, application| {
                    workflow.perform(
                        application,
                        Action::ConfirmPayment,
                        None,
                        actor,
                        timestamp,
                    )
                })
                .await?;

            let certificate = Certificate::create(&application, timestamp)?;
            if !tx
                .store
                .insert_certificate(&certificate)
                .await
                .map_err(ServiceError::Store)?
            {
                return Err(WorkflowError::InvalidState(format!(
                    "application {} already has a certificate",
                    application.application_number
                ))
                .into());
            }
            tx.save_order(&order).await?;

            info!(
                id = %certificate.id,
                number = %certificate.certificate_number,
                "created certificate"
            );
            events.push(order_changed(&order));
            events.push(stage_changed(&application, &transition));
            events.push(certificate_changed(&certificate));
            Ok(order)
        })
        .await
    }

    pub async fn get_certificate(&self, id: &Id) -> Result<Certificate, ServiceError<E>> {
        self.load_certificate(id).await
    }

    pub async fn certificate_for_application(
        &self,
        application_id: &Id,
    ) -> Result<Option<Certificate>, ServiceError<E>> {
        self.store
            .get_certificate_for_application(application_id)
            .await
            .map_err(ServiceError::Store)
    }

    /// Sign the certificate, both signature and expiry date are required.
    pub async fn sign_certificate(
        &self,
        id: &Id,
        signature: Option<Attachment>,
        expiry_date: Option<Timestamp>,
        actor: &Actor,
    ) -> Result<Certificate, ServiceError<E>> {
        self.atomic(async move |tx, events| {
            let mut certificate = tx.load_certificate(id).await?;
            let application = tx.load_application(&certificate.application_id).await?;
            let order = tx
                .store
                .get_order_for_application(&application.id)
                .await
                .map_err(ServiceError::Store)?;

            let timestamp = now();
            certificate.sign(
                &application,
                order.as_ref(),
                signature,
                expiry_date,
                actor,
                timestamp,
            )?;

            let (application, transition) = tx
                .advance(&application.id, |workflow, application| {
                    workflow.perform(
                        application,
                        Action::SignCertificate,
                        None,
                        actor,
                        timestamp,
                    )
                })
                .await?;
            tx.save_certificate(&certificate).await?;

            events.push(certificate_changed(&certificate));
            events.push(stage_changed(&application, &transition));
            Ok(certificate)
        })
        .await
    }

    /// Attach the scanned, stamped paper certificate.
    pub async fn upload_stamped_certificate(
        &self,
        id: &Id,
        document: Attachment,
        actor: &Actor,
    ) -> Result<Certificate, ServiceError<E>> {
        self.atomic(async move |tx, events| {
            let mut certificate = tx.load_certificate(id).await?;
            certificate.upload_stamped(document, actor, now())?;
            tx.save_certificate(&certificate).await?;

            events.push(certificate_changed(&certificate));
            Ok(certificate)
        })
        .await
    }

    /// Release the certificate and with it the permit to the applicant.
    pub async fn release_certificate(
        &self,
        id: &Id,
        actor: &Actor,
    ) -> Result<Certificate, ServiceError<E>> {
        self.atomic(async |tx, events| {
            let mut certificate = tx.load_certificate(id).await?;
            let timestamp = now();
            certificate.release(actor, timestamp)?;

            let (application, transition) = tx
                .advance(&certificate.application_id, |workflow, application| {
                    workflow.perform(application, Action::Release, None, actor, timestamp)
                })
                .await?;
            tx.save_certificate(&certificate).await?;

            info!(
                id = %application.id,
                number = %application.application_number,
                certificate = %certificate.certificate_number,
                "released permit"
            );
            events.push(certificate_changed(&certificate));
            events.push(stage_changed(&application, &transition));
            Ok(certificate)
        })
        .await
    }

    pub async fn schedule_inspection(
        &self,
        application_id: &Id,
        scheduled_at: Timestamp,
        location: &str,
        inspector: UserId,
        actor: &Actor,
    ) -> Result<Inspection, ServiceError<E>> {
        self.atomic(async move |tx, events| {
            let application = tx.load_application(application_id).await?;
            let inspection = Inspection::schedule(
                &application,
                scheduled_at,
                location,
                inspector,
                actor,
                now(),
            )?;

            if !tx
                .store
                .insert_inspection(&inspection)
                .await
                .map_err(ServiceError::Store)?
            {
                return Err(ServiceError::Conflict(inspection.id));
            }

            info!(id = %inspection.id, %application_id, scheduled_at, "scheduled inspection");
            events.push(inspection_changed(&inspection));
            Ok(inspection)
        })
        .await
    }

    pub async fn reschedule_inspection(
        &self,
        id: &Id,
        scheduled_at: Timestamp,
        actor: &Actor,
    ) -> Result<Inspection, ServiceError<E>> {
        self.change_inspection(id, |inspection, timestamp| {
            inspection.reschedule(scheduled_at, actor, timestamp)
        })
        .await
    }

    pub async fn complete_inspection(
        &self,
        id: &Id,
        findings: &str,
        actor: &Actor,
    ) -> Result<Inspection, ServiceError<E>> {
        self.change_inspection(id, |inspection, timestamp| {
            inspection.complete(findings, actor, timestamp)
        })
        .await
    }

    pub async fn cancel_inspection(
        &self,
        id: &Id,
        reason: &str,
        actor: &Actor,
    ) -> Result<Inspection, ServiceError<E>> {
        self.change_inspection(id, |inspection, timestamp| {
            inspection.cancel(reason, actor, timestamp)
        })
        .await
    }

    pub async fn get_inspection(&self, id: &Id) -> Result<Inspection, ServiceError<E>> {
        self.store
            .get_inspection(id)
            .await
            .map_err(ServiceError::Store)?
            .ok_or(ServiceError::not_found("inspection", id))
    }

    /// All inspections of an application, oldest first.
    pub async fn inspections(&self, application_id: &Id) -> Result<Vec<Inspection>, ServiceError<E>> {
        self.store
            .get_inspections_for_application(application_id)
            .await
            .map_err(ServiceError::Store)
    }

    /// Run `f` inside a store transaction.
    ///
    /// `f` is handed a service on the transaction's handle of the store, only it sees the
    /// uncommitted changes. All changes are rolled back when `f` fails. Events collected by `f`
    /// are only published after the transaction was committed.
    async fn atomic<R>(
        &self,
        f: impl AsyncFnOnce(&Self, &mut Vec<WorkflowEvent>) -> Result<R, ServiceError<E>>,
    ) -> Result<R, ServiceError<E>> {
        let permit = self.store.begin().await.map_err(ServiceError::Store)?;
        let tx = self.with_store(self.store.within(&permit));

        let mut events = Vec::new();
        match f(&tx, &mut events).await {
            Ok(value) => {
                self.store
                    .commit(permit)
                    .await
                    .map_err(ServiceError::Store)?;
                self.publish(events);
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = self.store.rollback(permit).await {
                    warn!(%rollback_err, "failed rolling back transaction");
                }
                Err(err)
            }
        }
    }

    /// Load an application, apply `step` to it and store it again.
    ///
    /// The write only succeeds if the stored stage still is the one observed while loading. When
    /// another process moved the application in between, it is loaded again and `step` is
    /// re-validated against the new state, up to the configured number of retries.
    async fn advance<F>(
        &self,
        id: &Id,
        mut step: F,
    ) -> Result<(Application, Transition), ServiceError<E>>
    where
        F: FnMut(&Workflow, &mut Application) -> Result<Transition, WorkflowError>,
    {
        let mut retries = 0;
        loop {
            let mut application = self.load_application(id).await?;
            let observed_stage = application.current_stage;
            let workflow = self.registry.get(application.application_type);
            let transition = step(workflow, &mut application)?;

            if self
                .store
                .update_application(&application, observed_stage)
                .await
                .map_err(ServiceError::Store)?
            {
                return Ok((application, transition));
            }

            if retries >= self.config.max_transition_retries {
                return Err(ServiceError::Conflict(*id));
            }
            retries += 1;
            warn!(%id, retries, stage = %observed_stage, "application changed concurrently, retrying");
        }
    }

    async fn change_inspection<F>(&self, id: &Id, f: F) -> Result<Inspection, ServiceError<E>>
    where
        F: FnOnce(&mut Inspection, Timestamp) -> Result<(), WorkflowError>,
    {
        self.atomic(async move |tx, events| {
            let mut inspection = tx.get_inspection(id).await?;
            f(&mut inspection, now())?;

            if !tx
                .store
                .update_inspection(&inspection)
                .await
                .map_err(ServiceError::Store)?
            {
                return Err(ServiceError::not_found("inspection", id));
            }

            events.push(inspection_changed(&inspection));
            Ok(inspection)
        })
        .await
    }

    async fn load_application(&self, id: &Id) -> Result<Application, ServiceError<E>> {
        self.store
            .get_application(id)
            .await
            .map_err(ServiceError::Store)?
            .ok_or(ServiceError::not_found("application", id))
    }

    async fn load_order(&self, id: &Id) -> Result<OrderOfPayment, ServiceError<E>> {
        self.store
            .get_order(id)
            .await
            .map_err(ServiceError::Store)?
            .ok_or(ServiceError::not_found("order of payment", id))
    }

    async fn load_certificate(&self, id: &Id) -> Result<Certificate, ServiceError<E>> {
        self.store
            .get_certificate(id)
            .await
            .map_err(ServiceError::Store)?
            .ok_or(ServiceError::not_found("certificate", id))
    }

    async fn save_order(&self, order: &OrderOfPayment) -> Result<(), ServiceError<E>> {
        if !self
            .store
            .update_order(order)
            .await
            .map_err(ServiceError::Store)?
        {
            return Err(ServiceError::not_found("order of payment", &order.id));
        }
        Ok(())
    }

    async fn save_certificate(&self, certificate: &Certificate) -> Result<(), ServiceError<E>> {
        if !self
            .store
            .update_certificate(certificate)
            .await
            .map_err(ServiceError::Store)?
        {
            return Err(ServiceError::not_found("certificate", &certificate.id));
        }
        Ok(())
    }
}

/// Rejects transitions which need to be driven by an order of payment or certificate.
fn check_direct(transition: &Transition, inspections: &[Inspection]) -> Result<(), WorkflowError> {
    let record = match transition.action {
        Action::ApproveAuthenticity => return ensure_inspected(inspections),
        Action::IssueOrderOfPayment | Action::ConfirmPayment => "order of payment",
        Action::SignCertificate | Action::Release => "certificate",
        _ => return Ok(()),
    };

    Err(WorkflowError::InvalidState(format!(
        "{} is taken through the {record} of the application",
        transition.action
    )))
}

fn stage_changed(application: &Application, transition: &Transition) -> WorkflowEvent {
    WorkflowEvent::StageChanged {
        application_id: application.id,
        action: transition.action,
        from: transition.from,
        to: transition.to,
        status: application.status,
    }
}

fn undone(application: &Application, action: Action) -> WorkflowEvent {
    WorkflowEvent::TransitionUndone {
        application_id: application.id,
        action,
        stage: application.current_stage,
        status: application.status,
    }
}

fn order_changed(order: &OrderOfPayment) -> WorkflowEvent {
    WorkflowEvent::OrderOfPaymentChanged {
        application_id: order.application_id,
        order_id: order.id,
        status: order.status,
    }
}

fn certificate_changed(certificate: &Certificate) -> WorkflowEvent {
    WorkflowEvent::CertificateChanged {
        application_id: certificate.application_id,
        certificate_id: certificate.id,
        status: certificate.status,
    }
}

fn inspection_changed(inspection: &Inspection) -> WorkflowEvent {
    WorkflowEvent::InspectionChanged {
        application_id: inspection.permit_id,
        inspection_id: inspection.id,
        status: inspection.status,
    }
}

fn now() -> Timestamp {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_secs())
        .unwrap_or_default()
}
