// SPDX-License-Identifier: MIT OR Apache-2.0

//! Stage, status and flag vocabulary shared by the transition engine and the query layer.
use std::fmt;

use serde::{Deserialize, Serialize};

/// Fine-grained step an application is currently in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Stage {
    Draft,
    ReceivingClerkReview,
    ReturnedByReceivingClerk,
    TechnicalStaffReview,
    ReturnedByTechnicalStaff,
    ForRecordByReceivingClerk,
    #[serde(rename = "ChiefRPSReview")]
    ChiefRpsReview,
    #[serde(rename = "CENRPENRReview")]
    CenrPenrReview,
    ForInspectionByTechnicalStaff,
    AuthenticityApprovedByTechnicalStaff,
    AwaitingOrderOfPayment,
    AwaitingPayment,
    #[serde(rename = "PendingSignatureByPENRCENROfficer")]
    PendingSignatureByPenrCenrOfficer,
    PendingRelease,
    Released,
    Rejected,
}

impl Stage {
    pub const ALL: [Stage; 16] = [
        Stage::Draft,
        Stage::ReceivingClerkReview,
        Stage::ReturnedByReceivingClerk,
        Stage::TechnicalStaffReview,
        Stage::ReturnedByTechnicalStaff,
        Stage::ForRecordByReceivingClerk,
        Stage::ChiefRpsReview,
        Stage::CenrPenrReview,
        Stage::ForInspectionByTechnicalStaff,
        Stage::AuthenticityApprovedByTechnicalStaff,
        Stage::AwaitingOrderOfPayment,
        Stage::AwaitingPayment,
        Stage::PendingSignatureByPenrCenrOfficer,
        Stage::PendingRelease,
        Stage::Released,
        Stage::Rejected,
    ];

    /// Name of the stage as it is stored and shown to collaborators.
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Draft => "Draft",
            Stage::ReceivingClerkReview => "ReceivingClerkReview",
            Stage::ReturnedByReceivingClerk => "ReturnedByReceivingClerk",
            Stage::TechnicalStaffReview => "TechnicalStaffReview",
            Stage::ReturnedByTechnicalStaff => "ReturnedByTechnicalStaff",
            Stage::ForRecordByReceivingClerk => "ForRecordByReceivingClerk",
            Stage::ChiefRpsReview => "ChiefRPSReview",
            Stage::CenrPenrReview => "CENRPENRReview",
            Stage::ForInspectionByTechnicalStaff => "ForInspectionByTechnicalStaff",
            Stage::AuthenticityApprovedByTechnicalStaff => "AuthenticityApprovedByTechnicalStaff",
            Stage::AwaitingOrderOfPayment => "AwaitingOrderOfPayment",
            Stage::AwaitingPayment => "AwaitingPayment",
            Stage::PendingSignatureByPenrCenrOfficer => "PendingSignatureByPENRCENROfficer",
            Stage::PendingRelease => "PendingRelease",
            Stage::Released => "Released",
            Stage::Rejected => "Rejected",
        }
    }

    /// Parse a stage from its stored name.
    pub fn from_name(value: &str) -> Option<Stage> {
        Stage::ALL.into_iter().find(|stage| stage.as_str() == value)
    }

    /// Coarse status an application has while sitting in this stage.
    ///
    /// Undo operations roll the status back to the canonical status of the restored stage.
    pub fn canonical_status(&self) -> Status {
        match self {
            Stage::Draft => Status::Draft,
            Stage::ReceivingClerkReview => Status::Submitted,
            Stage::ReturnedByReceivingClerk | Stage::ReturnedByTechnicalStaff => Status::Returned,
            Stage::AwaitingPayment => Status::AwaitingPayment,
            Stage::PendingRelease => Status::Accepted,
            Stage::Released => Status::Released,
            Stage::Rejected => Status::Rejected,
            _ => Status::InProgress,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse application state shown to applicants.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Status {
    Draft,
    Submitted,
    #[serde(rename = "In Progress")]
    InProgress,
    Returned,
    Accepted,
    #[serde(rename = "Awaiting Payment")]
    AwaitingPayment,
    Released,
    Rejected,
}

impl Status {
    pub const ALL: [Status; 8] = [
        Status::Draft,
        Status::Submitted,
        Status::InProgress,
        Status::Returned,
        Status::Accepted,
        Status::AwaitingPayment,
        Status::Released,
        Status::Rejected,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Draft => "Draft",
            Status::Submitted => "Submitted",
            Status::InProgress => "In Progress",
            Status::Returned => "Returned",
            Status::Accepted => "Accepted",
            Status::AwaitingPayment => "Awaiting Payment",
            Status::Released => "Released",
            Status::Rejected => "Rejected",
        }
    }

    pub fn from_name(value: &str) -> Option<Status> {
        Status::ALL.into_iter().find(|status| status.as_str() == value)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Boolean marker recording that a role completed its part of the workflow.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Flag {
    AcceptedByReceivingClerk,
    RecordedByReceivingClerk,
    AcceptedByTechnicalStaff,
    ApprovedByTechnicalStaff,
    AwaitingPermitCreation,
    #[serde(rename = "PermitCreated")]
    PermitCreated,
    HasCertificate,
    #[serde(rename = "acceptedByPENRCENROfficer")]
    AcceptedByPenrCenrOfficer,
    #[serde(rename = "approvedByPENRCENROfficer")]
    ApprovedByPenrCenrOfficer,
    #[serde(rename = "certificateSignedByPENRCENROfficer")]
    CertificateSignedByPenrCenrOfficer,
    ReviewedByChief,
}

impl Flag {
    pub const ALL: [Flag; 11] = [
        Flag::AcceptedByReceivingClerk,
        Flag::RecordedByReceivingClerk,
        Flag::AcceptedByTechnicalStaff,
        Flag::ApprovedByTechnicalStaff,
        Flag::AwaitingPermitCreation,
        Flag::PermitCreated,
        Flag::HasCertificate,
        Flag::AcceptedByPenrCenrOfficer,
        Flag::ApprovedByPenrCenrOfficer,
        Flag::CertificateSignedByPenrCenrOfficer,
        Flag::ReviewedByChief,
    ];
}

impl fmt::Display for Flag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            Flag::AcceptedByReceivingClerk => "acceptedByReceivingClerk",
            Flag::RecordedByReceivingClerk => "recordedByReceivingClerk",
            Flag::AcceptedByTechnicalStaff => "acceptedByTechnicalStaff",
            Flag::ApprovedByTechnicalStaff => "approvedByTechnicalStaff",
            Flag::AwaitingPermitCreation => "awaitingPermitCreation",
            Flag::PermitCreated => "PermitCreated",
            Flag::HasCertificate => "hasCertificate",
            Flag::AcceptedByPenrCenrOfficer => "acceptedByPENRCENROfficer",
            Flag::ApprovedByPenrCenrOfficer => "approvedByPENRCENROfficer",
            Flag::CertificateSignedByPenrCenrOfficer => "certificateSignedByPENRCENROfficer",
            Flag::ReviewedByChief => "reviewedByChief",
        };
        f.write_str(value)
    }
}

/// All role flags of an application.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Flags {
    pub accepted_by_receiving_clerk: bool,
    pub recorded_by_receiving_clerk: bool,
    pub accepted_by_technical_staff: bool,
    pub approved_by_technical_staff: bool,
    pub awaiting_permit_creation: bool,
    #[serde(rename = "PermitCreated")]
    pub permit_created: bool,
    pub has_certificate: bool,
    #[serde(rename = "acceptedByPENRCENROfficer")]
    pub accepted_by_penr_cenr_officer: bool,
    #[serde(rename = "approvedByPENRCENROfficer")]
    pub approved_by_penr_cenr_officer: bool,
    #[serde(rename = "certificateSignedByPENRCENROfficer")]
    pub certificate_signed_by_penr_cenr_officer: bool,
    pub reviewed_by_chief: bool,
}

impl Flags {
    pub fn get(&self, flag: Flag) -> bool {
        *self.field(flag)
    }

    pub fn set(&mut self, flag: Flag, value: bool) {
        *self.field_mut(flag) = value;
    }

    /// Returns all flags which are currently set.
    pub fn set_flags(&self) -> Vec<Flag> {
        Flag::ALL
            .into_iter()
            .filter(|flag| self.get(*flag))
            .collect()
    }

    fn field(&self, flag: Flag) -> &bool {
        match flag {
            Flag::AcceptedByReceivingClerk => &self.accepted_by_receiving_clerk,
            Flag::RecordedByReceivingClerk => &self.recorded_by_receiving_clerk,
            Flag::AcceptedByTechnicalStaff => &self.accepted_by_technical_staff,
            Flag::ApprovedByTechnicalStaff => &self.approved_by_technical_staff,
            Flag::AwaitingPermitCreation => &self.awaiting_permit_creation,
            Flag::PermitCreated => &self.permit_created,
            Flag::HasCertificate => &self.has_certificate,
            Flag::AcceptedByPenrCenrOfficer => &self.accepted_by_penr_cenr_officer,
            Flag::ApprovedByPenrCenrOfficer => &self.approved_by_penr_cenr_officer,
            Flag::CertificateSignedByPenrCenrOfficer => {
                &self.certificate_signed_by_penr_cenr_officer
            }
            Flag::ReviewedByChief => &self.reviewed_by_chief,
        }
    }

    fn field_mut(&mut self, flag: Flag) -> &mut bool {
        match flag {
            Flag::AcceptedByReceivingClerk => &mut self.accepted_by_receiving_clerk,
            Flag::RecordedByReceivingClerk => &mut self.recorded_by_receiving_clerk,
            Flag::AcceptedByTechnicalStaff => &mut self.accepted_by_technical_staff,
            Flag::ApprovedByTechnicalStaff => &mut self.approved_by_technical_staff,
            Flag::AwaitingPermitCreation => &mut self.awaiting_permit_creation,
            Flag::PermitCreated => &mut self.permit_created,
            Flag::HasCertificate => &mut self.has_certificate,
            Flag::AcceptedByPenrCenrOfficer => &mut self.accepted_by_penr_cenr_officer,
            Flag::ApprovedByPenrCenrOfficer => &mut self.approved_by_penr_cenr_officer,
            Flag::CertificateSignedByPenrCenrOfficer => {
                &mut self.certificate_signed_by_penr_cenr_officer
            }
            Flag::ReviewedByChief => &mut self.reviewed_by_chief,
        }
    }
}
