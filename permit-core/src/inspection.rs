// SPDX-License-Identifier: MIT OR Apache-2.0

//! On-site inspections scheduled by the Technical Staff before approving authenticity.
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::application::Application;
use crate::error::WorkflowError;
use crate::identity::{Actor, Id, Role, Timestamp, UserId};
use crate::stage::Stage;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InspectionStatus {
    Pending,
    Rescheduled,
    Completed,
    Cancelled,
}

impl InspectionStatus {
    /// Returns `true` while the inspection still has to take place.
    pub fn is_open(&self) -> bool {
        matches!(self, InspectionStatus::Pending | InspectionStatus::Rescheduled)
    }
}

impl fmt::Display for InspectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Inspection {
    pub id: Id,
    pub permit_id: Id,
    pub status: InspectionStatus,
    pub scheduled_at: Timestamp,
    pub location: String,
    pub inspector: UserId,
    pub findings: Option<String>,
    pub cancellation_reason: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Inspection {
    pub fn schedule(
        application: &Application,
        scheduled_at: Timestamp,
        location: &str,
        inspector: UserId,
        actor: &Actor,
        timestamp: Timestamp,
    ) -> Result<Self, WorkflowError> {
        actor.ensure_role(Role::TechnicalStaff, "schedule inspection")?;

        if application.current_stage != Stage::ForInspectionByTechnicalStaff {
            return Err(WorkflowError::InvalidState(format!(
                "inspection can't be scheduled while application is in {}",
                application.current_stage
            )));
        }
        if location.trim().is_empty() {
            return Err(WorkflowError::Validation(
                "inspection location is required".into(),
            ));
        }

        Ok(Self {
            id: Id::random(),
            permit_id: application.id,
            status: InspectionStatus::Pending,
            scheduled_at,
            location: location.to_string(),
            inspector,
            findings: None,
            cancellation_reason: None,
            created_at: timestamp,
            updated_at: timestamp,
        })
    }

    pub fn reschedule(
        &mut self,
        scheduled_at: Timestamp,
        actor: &Actor,
        timestamp: Timestamp,
    ) -> Result<(), WorkflowError> {
        actor.ensure_role(Role::TechnicalStaff, "reschedule inspection")?;
        self.expect_open("rescheduled")?;

        self.scheduled_at = scheduled_at;
        self.set_status(InspectionStatus::Rescheduled, timestamp);
        Ok(())
    }

    pub fn complete(
        &mut self,
        findings: &str,
        actor: &Actor,
        timestamp: Timestamp,
    ) -> Result<(), WorkflowError> {
        actor.ensure_role(Role::TechnicalStaff, "complete inspection")?;
        self.expect_open("completed")?;
        if findings.trim().is_empty() {
            return Err(WorkflowError::Validation(
                "findings are required to complete an inspection".into(),
            ));
        }

        self.findings = Some(findings.to_string());
        self.set_status(InspectionStatus::Completed, timestamp);
        Ok(())
    }

    pub fn cancel(
        &mut self,
        reason: &str,
        actor: &Actor,
        timestamp: Timestamp,
    ) -> Result<(), WorkflowError> {
        actor.ensure_role(Role::TechnicalStaff, "cancel inspection")?;
        self.expect_open("cancelled")?;

        self.cancellation_reason = Some(reason.to_string()).filter(|reason| !reason.is_empty());
        self.set_status(InspectionStatus::Cancelled, timestamp);
        Ok(())
    }

    fn expect_open(&self, operation: &str) -> Result<(), WorkflowError> {
        if !self.status.is_open() {
            return Err(WorkflowError::InvalidState(format!(
                "inspection in status {} can't be {operation}",
                self.status
            )));
        }
        Ok(())
    }

    fn set_status(&mut self, status: InspectionStatus, timestamp: Timestamp) {
        debug!(id = %self.id, from = %self.status, to = %status, "inspection status changed");
        self.status = status;
        self.updated_at = timestamp;
    }
}

/// Authenticity can only be approved after an inspection of the application took place.
pub fn ensure_inspected(inspections: &[Inspection]) -> Result<(), WorkflowError> {
    if inspections
        .iter()
        .any(|inspection| inspection.status == InspectionStatus::Completed)
    {
        Ok(())
    } else {
        Err(WorkflowError::InvalidState(
            "application has no completed inspection".into(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use crate::application::{Application, ApplicationType};
    use crate::error::WorkflowError;
    use crate::stage::Stage;
    use crate::test_utils::{draft, receiving_clerk, technical_staff};

    use super::{Inspection, InspectionStatus, ensure_inspected};

    fn for_inspection() -> Application {
        let mut application = draft(ApplicationType::PrivateTreePlantationRegistration);
        application.current_stage = Stage::ForInspectionByTechnicalStaff;
        application
    }

    fn schedule(application: &Application) -> Inspection {
        let staff = technical_staff();
        Inspection::schedule(
            application,
            5_000,
            "Barangay Lupac",
            staff.user_id.clone(),
            &staff,
            100,
        )
        .unwrap()
    }

    #[test]
    fn schedule_only_for_inspection_stage() {
        let staff = technical_staff();
        let application = draft(ApplicationType::PrivateTreePlantationRegistration);
        assert_matches!(
            Inspection::schedule(&application, 5_000, "Boac", staff.user_id.clone(), &staff, 100),
            Err(WorkflowError::InvalidState(_))
        );

        let application = for_inspection();
        assert_matches!(
            Inspection::schedule(
                &application,
                5_000,
                "Boac",
                staff.user_id.clone(),
                &receiving_clerk(),
                100
            ),
            Err(WorkflowError::Unauthorized { .. })
        );

        let inspection = schedule(&application);
        assert_eq!(inspection.status, InspectionStatus::Pending);
        assert_eq!(inspection.permit_id, application.id);
    }

    #[test]
    fn reschedule_then_complete() {
        let staff = technical_staff();
        let mut inspection = schedule(&for_inspection());

        inspection.reschedule(6_000, &staff, 101).unwrap();
        inspection.reschedule(7_000, &staff, 102).unwrap();
        assert_eq!(inspection.status, InspectionStatus::Rescheduled);
        assert_eq!(inspection.scheduled_at, 7_000);

        assert_matches!(
            inspection.complete("", &staff, 103),
            Err(WorkflowError::Validation(_))
        );
        inspection
            .complete("All trees accounted for", &staff, 103)
            .unwrap();
        assert_eq!(inspection.status, InspectionStatus::Completed);

        assert_matches!(
            inspection.reschedule(8_000, &staff, 104),
            Err(WorkflowError::InvalidState(_))
        );
        assert_matches!(
            inspection.cancel("weather", &staff, 104),
            Err(WorkflowError::InvalidState(_))
        );
    }

    #[test]
    fn approval_needs_completed_inspection() {
        let staff = technical_staff();
        let application = for_inspection();

        assert_matches!(ensure_inspected(&[]), Err(WorkflowError::InvalidState(_)));

        let mut cancelled = schedule(&application);
        cancelled.cancel("typhoon", &staff, 101).unwrap();
        assert_eq!(cancelled.cancellation_reason.as_deref(), Some("typhoon"));
        let pending = schedule(&application);
        assert_matches!(
            ensure_inspected(&[cancelled.clone(), pending]),
            Err(WorkflowError::InvalidState(_))
        );

        let mut completed = schedule(&application);
        completed.complete("ok", &staff, 102).unwrap();
        assert!(ensure_inspected(&[cancelled, completed]).is_ok());
    }
}
