// SPDX-License-Identifier: MIT OR Apache-2.0

//! Change events of the permit workflow.
//!
//! Every committed change is published as a [`WorkflowEvent`] on a broadcast channel, see
//! `PermitService::subscribe`. A subset of them is additionally handed to a [`Notifier`], for
//! example to send e-mails to applicants.
use std::error::Error;

use permit_core::{
    Action, CertificateStatus, Id, InspectionStatus, OrderOfPaymentStatus, Stage, Status,
};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum WorkflowEvent {
    #[serde(rename_all = "camelCase")]
    ApplicationCreated {
        application_id: Id,
        application_number: String,
    },

    #[serde(rename_all = "camelCase")]
    ApplicationDeleted { application_id: Id },

    #[serde(rename_all = "camelCase")]
    FilesAttached {
        application_id: Id,
        document_type: String,
    },

    #[serde(rename_all = "camelCase")]
    StageChanged {
        application_id: Id,
        action: Action,
        from: Stage,
        to: Stage,
        status: Status,
    },

    #[serde(rename_all = "camelCase")]
    TransitionUndone {
        application_id: Id,
        action: Action,
        stage: Stage,
        status: Status,
    },

    #[serde(rename_all = "camelCase")]
    OrderOfPaymentChanged {
        application_id: Id,
        order_id: Id,
        status: OrderOfPaymentStatus,
    },

    #[serde(rename_all = "camelCase")]
    CertificateChanged {
        application_id: Id,
        certificate_id: Id,
        status: CertificateStatus,
    },

    #[serde(rename_all = "camelCase")]
    InspectionChanged {
        application_id: Id,
        inspection_id: Id,
        status: InspectionStatus,
    },
}

impl WorkflowEvent {
    /// Application this event is about, subscribers usually filter on it.
    pub fn application_id(&self) -> Id {
        match self {
            WorkflowEvent::ApplicationCreated { application_id, .. }
            | WorkflowEvent::ApplicationDeleted { application_id }
            | WorkflowEvent::FilesAttached { application_id, .. }
            | WorkflowEvent::StageChanged { application_id, .. }
            | WorkflowEvent::TransitionUndone { application_id, .. }
            | WorkflowEvent::OrderOfPaymentChanged { application_id, .. }
            | WorkflowEvent::CertificateChanged { application_id, .. }
            | WorkflowEvent::InspectionChanged { application_id, .. } => *application_id,
        }
    }

    /// Returns `true` if collaborators should be notified about this event.
    ///
    /// These are the decisions of staff roles (returns, acceptances, records, reviews,
    /// rejections and releases) and all changes to orders of payment and certificates.
    pub fn is_notifiable(&self) -> bool {
        match self {
            WorkflowEvent::StageChanged { action, .. } => !matches!(
                action,
                Action::Submit
                    | Action::Resubmit
                    | Action::ApproveAuthenticity
                    | Action::CreatePermit
            ),
            WorkflowEvent::OrderOfPaymentChanged { .. }
            | WorkflowEvent::CertificateChanged { .. } => true,
            _ => false,
        }
    }
}

/// Fire-and-forget sink for notifications.
///
/// Failures never affect the operation which caused the event, they are only logged.
pub trait Notifier: Send + Sync {
    fn notify(&self, event: &WorkflowEvent) -> Result<(), Box<dyn Error + Send + Sync>>;
}

/// Notifier dropping all events.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn notify(&self, _event: &WorkflowEvent) -> Result<(), Box<dyn Error + Send + Sync>> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use permit_core::{Action, Id, OrderOfPaymentStatus, Stage, Status};

    use super::WorkflowEvent;

    #[test]
    fn staff_decisions_are_notifiable() {
        let application_id = Id::random();
        let stage_changed = |action| WorkflowEvent::StageChanged {
            application_id,
            action,
            from: Stage::Draft,
            to: Stage::ReceivingClerkReview,
            status: Status::Submitted,
        };

        assert!(!stage_changed(Action::Submit).is_notifiable());
        assert!(!stage_changed(Action::CreatePermit).is_notifiable());
        assert!(stage_changed(Action::ReturnByReceivingClerk).is_notifiable());
        assert!(stage_changed(Action::Record).is_notifiable());
        assert!(stage_changed(Action::Release).is_notifiable());

        let order_changed = WorkflowEvent::OrderOfPaymentChanged {
            application_id,
            order_id: Id::random(),
            status: OrderOfPaymentStatus::AwaitingPayment,
        };
        assert!(order_changed.is_notifiable());
        assert_eq!(order_changed.application_id(), application_id);

        assert!(!WorkflowEvent::ApplicationDeleted { application_id }.is_notifiable());
    }

    #[test]
    fn events_are_tagged_in_json() {
        let event = WorkflowEvent::ApplicationDeleted {
            application_id: Id::from_bytes([2; 16]),
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "applicationDeleted");
        assert_eq!(value["applicationId"], "02020202020202020202020202020202");
    }
}
