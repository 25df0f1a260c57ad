// SPDX-License-Identifier: MIT OR Apache-2.0

//! Order of Payment, the fee assessment an applicant has to settle before a certificate is issued.
//!
//! ```text
//! For Approval --approve--> Awaiting Payment --proof--> Payment Proof Submitted --confirm--> Completed
//!      ^                          |
//!      +-------undo approval------+
//! ```
//!
//! These functions only cover the order itself. Moving the linked application along
//! (`IssueOrderOfPayment`, `ConfirmPayment`) is up to the caller.
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::application::{Application, Attachment};
use crate::error::WorkflowError;
use crate::identity::{Actor, Id, Role, Timestamp, UserId};
use crate::stage::Stage;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderOfPaymentStatus {
    #[serde(rename = "For Approval")]
    ForApproval,
    #[serde(rename = "Awaiting Payment")]
    AwaitingPayment,
    #[serde(rename = "Payment Proof Submitted")]
    PaymentProofSubmitted,
    Completed,
}

impl fmt::Display for OrderOfPaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            OrderOfPaymentStatus::ForApproval => "For Approval",
            OrderOfPaymentStatus::AwaitingPayment => "Awaiting Payment",
            OrderOfPaymentStatus::PaymentProofSubmitted => "Payment Proof Submitted",
            OrderOfPaymentStatus::Completed => "Completed",
        };
        f.write_str(value)
    }
}

/// Single fee, amounts are in centavos.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub description: String,
    pub amount: u64,
}

impl LineItem {
    pub fn new(description: &str, amount: u64) -> Self {
        Self {
            description: description.to_string(),
            amount,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderOfPayment {
    pub id: Id,
    pub application_id: Id,
    pub bill_number: Option<String>,
    pub status: OrderOfPaymentStatus,
    pub items: Vec<LineItem>,
    pub total: u64,
    pub created_by: UserId,
    pub approved_by: Option<UserId>,
    pub technical_staff_signature: Option<Attachment>,
    pub proof_of_payment: Option<Attachment>,
    pub official_receipt: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl OrderOfPayment {
    /// Assess the fees of an application.
    ///
    /// The application needs to be waiting for its Order of Payment. Checking that no other order
    /// exists for the same application is left to the caller.
    pub fn create(
        application: &Application,
        items: Vec<LineItem>,
        bill_number: Option<String>,
        actor: &Actor,
        timestamp: Timestamp,
    ) -> Result<Self, WorkflowError> {
        actor.ensure_role(Role::TechnicalStaff, "create order of payment")?;

        if application.current_stage != Stage::AwaitingOrderOfPayment {
            return Err(WorkflowError::InvalidState(format!(
                "order of payment can't be created while application is in {}",
                application.current_stage
            )));
        }

        if items.is_empty() {
            return Err(WorkflowError::Validation(
                "order of payment needs at least one line item".into(),
            ));
        }
        for item in &items {
            if item.description.trim().is_empty() {
                return Err(WorkflowError::Validation(
                    "line item is missing a description".into(),
                ));
            }
        }

        let total = items
            .iter()
            .try_fold(0u64, |total, item| total.checked_add(item.amount))
            .ok_or_else(|| WorkflowError::Validation("total amount overflows".into()))?;

        Ok(Self {
            id: Id::random(),
            application_id: application.id,
            bill_number: bill_number.filter(|number| !number.trim().is_empty()),
            status: OrderOfPaymentStatus::ForApproval,
            items,
            total,
            created_by: actor.user_id.clone(),
            approved_by: None,
            technical_staff_signature: None,
            proof_of_payment: None,
            official_receipt: None,
            created_at: timestamp,
            updated_at: timestamp,
        })
    }

    /// Sign the order, after this the applicant can pay.
    pub fn approve(
        &mut self,
        signature: Attachment,
        actor: &Actor,
        timestamp: Timestamp,
    ) -> Result<(), WorkflowError> {
        actor.ensure_role(Role::TechnicalStaff, "approve order of payment")?;
        self.expect_status(OrderOfPaymentStatus::ForApproval, "approved")?;
        signature.validate()?;

        self.technical_staff_signature = Some(signature);
        self.approved_by = Some(actor.user_id.clone());
        self.set_status(OrderOfPaymentStatus::AwaitingPayment, timestamp);
        Ok(())
    }

    /// Revert an approval, possible until the applicant submitted a proof of payment.
    pub fn undo_approval(
        &mut self,
        actor: &Actor,
        timestamp: Timestamp,
    ) -> Result<(), WorkflowError> {
        actor.ensure_role(Role::TechnicalStaff, "undo order of payment approval")?;

        match self.status {
            OrderOfPaymentStatus::AwaitingPayment => (),
            OrderOfPaymentStatus::ForApproval => {
                return Err(WorkflowError::InvalidState(
                    "order of payment was not approved yet".into(),
                ));
            }
            OrderOfPaymentStatus::PaymentProofSubmitted | OrderOfPaymentStatus::Completed => {
                return Err(WorkflowError::PaymentSubmitted);
            }
        }

        self.technical_staff_signature = None;
        self.approved_by = None;
        self.set_status(OrderOfPaymentStatus::ForApproval, timestamp);
        Ok(())
    }

    /// Attach the applicant's proof of payment.
    pub fn submit_payment_proof(
        &mut self,
        application: &Application,
        proof: Attachment,
        actor: &Actor,
        timestamp: Timestamp,
    ) -> Result<(), WorkflowError> {
        if actor.role != Role::Applicant || !application.is_owned_by(actor) {
            return Err(WorkflowError::Unauthorized {
                role: actor.role,
                operation: "submit payment proof".into(),
            });
        }
        self.expect_status(OrderOfPaymentStatus::AwaitingPayment, "paid")?;
        proof.validate()?;

        self.proof_of_payment = Some(proof);
        self.set_status(OrderOfPaymentStatus::PaymentProofSubmitted, timestamp);
        Ok(())
    }

    /// Confirm the submitted payment with the official receipt number.
    pub fn confirm_payment(
        &mut self,
        official_receipt: &str,
        actor: &Actor,
        timestamp: Timestamp,
    ) -> Result<(), WorkflowError> {
        actor.ensure_role(Role::TechnicalStaff, "confirm payment")?;
        self.expect_status(OrderOfPaymentStatus::PaymentProofSubmitted, "confirmed")?;
        if official_receipt.trim().is_empty() {
            return Err(WorkflowError::Validation(
                "official receipt number is required".into(),
            ));
        }

        self.official_receipt = Some(official_receipt.to_string());
        self.set_status(OrderOfPaymentStatus::Completed, timestamp);
        Ok(())
    }

    fn expect_status(
        &self,
        expected: OrderOfPaymentStatus,
        operation: &str,
    ) -> Result<(), WorkflowError> {
        if self.status != expected {
            return Err(WorkflowError::InvalidState(format!(
                "order of payment in status {} can't be {operation}",
                self.status
            )));
        }
        Ok(())
    }

    fn set_status(&mut self, status: OrderOfPaymentStatus, timestamp: Timestamp) {
        debug!(id = %self.id, from = %self.status, to = %status, "order of payment status changed");
        self.status = status;
        self.updated_at = timestamp;
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use crate::application::ApplicationType;
    use crate::error::WorkflowError;
    use crate::stage::Stage;
    use crate::test_utils::{applicant, draft, pdf, signature_image, technical_staff};

    use super::{LineItem, OrderOfPayment, OrderOfPaymentStatus};

    fn awaiting_order() -> crate::application::Application {
        let mut application = draft(ApplicationType::TreeCuttingPermit);
        application.current_stage = Stage::AwaitingOrderOfPayment;
        application
    }

    fn items() -> Vec<LineItem> {
        vec![
            LineItem::new("Permit fee", 36_000),
            LineItem::new("Inspection fee", 50_000),
        ]
    }

    #[test]
    fn create_requires_stage_and_items() {
        let staff = technical_staff();

        let application = draft(ApplicationType::TreeCuttingPermit);
        assert_matches!(
            OrderOfPayment::create(&application, items(), None, &staff, 10),
            Err(WorkflowError::InvalidState(_))
        );

        let application = awaiting_order();
        assert_matches!(
            OrderOfPayment::create(&application, vec![], None, &staff, 10),
            Err(WorkflowError::Validation(_))
        );
        assert_matches!(
            OrderOfPayment::create(&application, items(), None, &applicant(), 10),
            Err(WorkflowError::Unauthorized { .. })
        );

        let order =
            OrderOfPayment::create(&application, items(), Some("B-1".into()), &staff, 10).unwrap();
        assert_eq!(order.status, OrderOfPaymentStatus::ForApproval);
        assert_eq!(order.total, 86_000);
        assert_eq!(order.application_id, application.id);
    }

    #[test]
    fn approve_and_undo() {
        let staff = technical_staff();
        let application = awaiting_order();
        let mut order = OrderOfPayment::create(&application, items(), None, &staff, 10).unwrap();

        order.approve(signature_image(), &staff, 11).unwrap();
        assert_eq!(order.status, OrderOfPaymentStatus::AwaitingPayment);
        assert_eq!(order.approved_by, Some(staff.user_id.clone()));

        assert_matches!(
            order.approve(signature_image(), &staff, 12),
            Err(WorkflowError::InvalidState(_))
        );

        order.undo_approval(&staff, 13).unwrap();
        assert_eq!(order.status, OrderOfPaymentStatus::ForApproval);
        assert!(order.technical_staff_signature.is_none());
        assert_eq!(order.updated_at, 13);
    }

    #[test]
    fn undo_blocked_after_payment_proof() {
        let staff = technical_staff();
        let application = awaiting_order();
        let mut order = OrderOfPayment::create(&application, items(), None, &staff, 10).unwrap();
        order.approve(signature_image(), &staff, 11).unwrap();

        assert_matches!(
            order.submit_payment_proof(&application, pdf(""), &applicant(), 12),
            Err(WorkflowError::Validation(_))
        );
        order
            .submit_payment_proof(&application, pdf("receipt.pdf"), &applicant(), 12)
            .unwrap();
        assert_eq!(order.status, OrderOfPaymentStatus::PaymentProofSubmitted);

        assert_matches!(
            order.undo_approval(&staff, 13),
            Err(WorkflowError::PaymentSubmitted)
        );
        assert_eq!(order.status, OrderOfPaymentStatus::PaymentProofSubmitted);
    }

    #[test]
    fn confirm_payment() {
        let staff = technical_staff();
        let application = awaiting_order();
        let mut order = OrderOfPayment::create(&application, items(), None, &staff, 10).unwrap();

        assert_matches!(
            order.confirm_payment("OR-1", &staff, 11),
            Err(WorkflowError::InvalidState(_))
        );

        order.approve(signature_image(), &staff, 11).unwrap();
        order
            .submit_payment_proof(&application, pdf("receipt.pdf"), &applicant(), 12)
            .unwrap();
        assert_matches!(
            order.confirm_payment(" ", &staff, 13),
            Err(WorkflowError::Validation(_))
        );
        order.confirm_payment("OR-1", &staff, 13).unwrap();
        assert_eq!(order.status, OrderOfPaymentStatus::Completed);
        assert_eq!(order.official_receipt.as_deref(), Some("OR-1"));
    }

    #[test]
    fn status_names() {
        assert_eq!(
            serde_json::to_value(OrderOfPaymentStatus::PaymentProofSubmitted).unwrap(),
            "Payment Proof Submitted"
        );
    }
}
