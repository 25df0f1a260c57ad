// SPDX-License-Identifier: MIT OR Apache-2.0

//! Role-specific listings of applications.
//!
//! Every tab a role sees in the user interface is a [`View`]. A view maps to exactly one
//! [`Predicate`] over stage, status, flags and owner. Filtering is a linear scan over the given
//! applications.
use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::application::Application;
use crate::identity::{Actor, Role, UserId};
use crate::stage::{Flag, Stage, Status};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum View {
    ApplicantDrafts,
    ApplicantSubmitted,
    ApplicantInProgress,
    ApplicantReturned,
    ApplicantAwaitingPayment,
    ApplicantReleased,
    ApplicantRejected,
    ReceivingClerkForReview,
    ReceivingClerkForRecord,
    ReceivingClerkRecorded,
    ReceivingClerkForRelease,
    TechnicalStaffForReview,
    TechnicalStaffReturned,
    TechnicalStaffAccepted,
    TechnicalStaffForInspection,
    TechnicalStaffAwaitingPermitCreation,
    TechnicalStaffAwaitingOrderOfPayment,
    TechnicalStaffAwaitingPayment,
    ChiefForReview,
    ChiefReviewed,
    OfficerForReview,
    OfficerAccepted,
    OfficerForSignature,
}

impl View {
    pub const ALL: [View; 23] = [
        View::ApplicantDrafts,
        View::ApplicantSubmitted,
        View::ApplicantInProgress,
        View::ApplicantReturned,
        View::ApplicantAwaitingPayment,
        View::ApplicantReleased,
        View::ApplicantRejected,
        View::ReceivingClerkForReview,
        View::ReceivingClerkForRecord,
        View::ReceivingClerkRecorded,
        View::ReceivingClerkForRelease,
        View::TechnicalStaffForReview,
        View::TechnicalStaffReturned,
        View::TechnicalStaffAccepted,
        View::TechnicalStaffForInspection,
        View::TechnicalStaffAwaitingPermitCreation,
        View::TechnicalStaffAwaitingOrderOfPayment,
        View::TechnicalStaffAwaitingPayment,
        View::ChiefForReview,
        View::ChiefReviewed,
        View::OfficerForReview,
        View::OfficerAccepted,
        View::OfficerForSignature,
    ];

    /// Role this tab is shown to.
    pub fn role(&self) -> Role {
        match self {
            View::ApplicantDrafts
            | View::ApplicantSubmitted
            | View::ApplicantInProgress
            | View::ApplicantReturned
            | View::ApplicantAwaitingPayment
            | View::ApplicantReleased
            | View::ApplicantRejected => Role::Applicant,
            View::ReceivingClerkForReview
            | View::ReceivingClerkForRecord
            | View::ReceivingClerkRecorded
            | View::ReceivingClerkForRelease => Role::ReceivingClerk,
            View::TechnicalStaffForReview
            | View::TechnicalStaffReturned
            | View::TechnicalStaffAccepted
            | View::TechnicalStaffForInspection
            | View::TechnicalStaffAwaitingPermitCreation
            | View::TechnicalStaffAwaitingOrderOfPayment
            | View::TechnicalStaffAwaitingPayment => Role::TechnicalStaff,
            View::ChiefForReview | View::ChiefReviewed => Role::ChiefRps,
            View::OfficerForReview | View::OfficerAccepted | View::OfficerForSignature => {
                Role::PenrCenrOfficer
            }
        }
    }

    /// Tabs available to a role.
    pub fn for_role(role: Role) -> Vec<View> {
        View::ALL
            .into_iter()
            .filter(|view| role.may_act_as(view.role()))
            .collect()
    }

    /// Predicate selecting the applications of this tab.
    ///
    /// Applicant tabs only ever list applications owned by the given actor.
    pub fn predicate(&self, actor: &Actor) -> Predicate {
        match self {
            View::ApplicantDrafts => Predicate::status(Status::Draft).owner(actor),
            View::ApplicantSubmitted => Predicate::status(Status::Submitted).owner(actor),
            View::ApplicantInProgress => Predicate::status(Status::InProgress).owner(actor),
            View::ApplicantReturned => Predicate::status(Status::Returned).owner(actor),
            View::ApplicantAwaitingPayment => {
                Predicate::status(Status::AwaitingPayment).owner(actor)
            }
            View::ApplicantReleased => Predicate::status(Status::Released).owner(actor),
            View::ApplicantRejected => Predicate::status(Status::Rejected).owner(actor),
            View::ReceivingClerkForReview => Predicate::stage(Stage::ReceivingClerkReview),
            View::ReceivingClerkForRecord => Predicate::stage(Stage::ForRecordByReceivingClerk)
                .flag(Flag::RecordedByReceivingClerk, false),
            View::ReceivingClerkRecorded => {
                Predicate::default().flag(Flag::RecordedByReceivingClerk, true)
            }
            View::ReceivingClerkForRelease => Predicate::stage(Stage::PendingRelease),
            View::TechnicalStaffForReview => Predicate::stage(Stage::TechnicalStaffReview),
            View::TechnicalStaffReturned => Predicate::stage(Stage::ReturnedByTechnicalStaff),
            View::TechnicalStaffAccepted => {
                Predicate::default().flag(Flag::AcceptedByTechnicalStaff, true)
            }
            View::TechnicalStaffForInspection => {
                Predicate::stage(Stage::ForInspectionByTechnicalStaff)
            }
            View::TechnicalStaffAwaitingPermitCreation => {
                Predicate::stage(Stage::AuthenticityApprovedByTechnicalStaff)
                    .flag(Flag::AwaitingPermitCreation, true)
                    .flag(Flag::PermitCreated, false)
            }
            View::TechnicalStaffAwaitingOrderOfPayment => {
                Predicate::stage(Stage::AwaitingOrderOfPayment)
            }
            View::TechnicalStaffAwaitingPayment => Predicate::stage(Stage::AwaitingPayment),
            View::ChiefForReview => Predicate::stage(Stage::ChiefRpsReview),
            View::ChiefReviewed => Predicate::default().flag(Flag::ReviewedByChief, true),
            View::OfficerForReview => Predicate::stage(Stage::CenrPenrReview),
            View::OfficerAccepted => {
                Predicate::default().flag(Flag::AcceptedByPenrCenrOfficer, true)
            }
            View::OfficerForSignature => {
                Predicate::stage(Stage::PendingSignatureByPenrCenrOfficer)
            }
        }
    }
}

/// Conjunction of conditions on an application. Unset conditions match everything.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Predicate {
    pub status: Option<Status>,
    pub stage: Option<Stage>,
    pub flags: Vec<(Flag, bool)>,
    pub owner: Option<UserId>,
}

impl Predicate {
    pub fn status(status: Status) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    pub fn stage(stage: Stage) -> Self {
        Self {
            stage: Some(stage),
            ..Default::default()
        }
    }

    pub fn flag(mut self, flag: Flag, value: bool) -> Self {
        self.flags.push((flag, value));
        self
    }

    pub fn owner(mut self, actor: &Actor) -> Self {
        self.owner = Some(actor.user_id.clone());
        self
    }

    pub fn matches(&self, application: &Application) -> bool {
        if self
            .status
            .is_some_and(|status| status != application.status)
        {
            return false;
        }

        if self
            .stage
            .is_some_and(|stage| stage != application.current_stage)
        {
            return false;
        }

        if self
            .owner
            .as_ref()
            .is_some_and(|owner| owner != &application.user_id)
        {
            return false;
        }

        self.flags
            .iter()
            .all(|(flag, value)| application.flags.get(*flag) == *value)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

/// Applications matching the predicate, ordered by submission date.
///
/// Applications which were never submitted are ordered by their creation date. Ties are broken by
/// id to keep the order deterministic.
pub fn filter(
    applications: impl IntoIterator<Item = Application>,
    predicate: &Predicate,
    order: SortOrder,
) -> Vec<Application> {
    let mut matches: Vec<Application> = applications
        .into_iter()
        .filter(|application| predicate.matches(application))
        .collect();

    matches.sort_by(|a, b| {
        let ordering = compare(a, b);
        match order {
            SortOrder::Ascending => ordering,
            SortOrder::Descending => ordering.reverse(),
        }
    });

    matches
}

fn compare(a: &Application, b: &Application) -> Ordering {
    let key = |application: &Application| {
        (
            application
                .date_of_submission
                .unwrap_or(application.created_at),
            application.id,
        )
    };
    key(a).cmp(&key(b))
}
