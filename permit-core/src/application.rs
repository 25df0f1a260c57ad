// SPDX-License-Identifier: MIT OR Apache-2.0

//! Permit application record with its payload, workflow state and audit trail.
use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::WorkflowError;
use crate::identity::{Actor, Id, Timestamp, UserId};
use crate::stage::{Flags, Stage, Status};

/// Kinds of permits which can be applied for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ApplicationType {
    #[serde(rename = "Chainsaw Registration")]
    ChainsawRegistration,
    #[serde(rename = "Chainsaw Permit To Purchase")]
    ChainsawPermitToPurchase,
    #[serde(rename = "Chainsaw Permit To Sell")]
    ChainsawPermitToSell,
    #[serde(rename = "Tree Cutting Permit")]
    TreeCuttingPermit,
    #[serde(rename = "Private Tree Plantation Registration")]
    PrivateTreePlantationRegistration,
    #[serde(rename = "Transport Permit")]
    TransportPermit,
    #[serde(rename = "Special Private Land Timber Permit")]
    SpecialPrivateLandTimberPermit,
}

impl ApplicationType {
    pub const ALL: [ApplicationType; 7] = [
        ApplicationType::ChainsawRegistration,
        ApplicationType::ChainsawPermitToPurchase,
        ApplicationType::ChainsawPermitToSell,
        ApplicationType::TreeCuttingPermit,
        ApplicationType::PrivateTreePlantationRegistration,
        ApplicationType::TransportPermit,
        ApplicationType::SpecialPrivateLandTimberPermit,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ApplicationType::ChainsawRegistration => "Chainsaw Registration",
            ApplicationType::ChainsawPermitToPurchase => "Chainsaw Permit To Purchase",
            ApplicationType::ChainsawPermitToSell => "Chainsaw Permit To Sell",
            ApplicationType::TreeCuttingPermit => "Tree Cutting Permit",
            ApplicationType::PrivateTreePlantationRegistration => {
                "Private Tree Plantation Registration"
            }
            ApplicationType::TransportPermit => "Transport Permit",
            ApplicationType::SpecialPrivateLandTimberPermit => "Special Private Land Timber Permit",
        }
    }

    /// Short code used inside human-readable application numbers.
    pub fn code(&self) -> &'static str {
        match self {
            ApplicationType::ChainsawRegistration => "CSAW",
            ApplicationType::ChainsawPermitToPurchase => "CSPP",
            ApplicationType::ChainsawPermitToSell => "CSPS",
            ApplicationType::TreeCuttingPermit => "TCP",
            ApplicationType::PrivateTreePlantationRegistration => "PTPR",
            ApplicationType::TransportPermit => "TP",
            ApplicationType::SpecialPrivateLandTimberPermit => "SPLT",
        }
    }

    /// Payload fields an application of this kind needs before it can be submitted.
    pub fn required_fields(&self) -> &'static [&'static str] {
        match self {
            ApplicationType::ChainsawRegistration => &[
                "registrationType",
                "chainsawBrand",
                "chainsawModel",
                "chainsawSerialNumber",
                "dateOfAcquisition",
                "powerOutput",
                "maxLengthGuidebar",
                "countryOfOrigin",
                "purchasePrice",
            ],
            ApplicationType::ChainsawPermitToPurchase | ApplicationType::ChainsawPermitToSell => {
                &["chainsawBrand", "chainsawModel", "chainsawSerialNumber"]
            }
            ApplicationType::TreeCuttingPermit => &["location", "numberOfTrees", "purpose"],
            ApplicationType::PrivateTreePlantationRegistration => {
                &["landTitle", "location", "numberOfTrees", "treeSpecies", "totalArea"]
            }
            ApplicationType::TransportPermit => &[
                "originLocation",
                "destinationLocation",
                "speciesAndVolume",
                "vehiclePlateNumber",
            ],
            ApplicationType::SpecialPrivateLandTimberPermit => {
                &["landTitle", "location", "numberOfTrees", "volume"]
            }
        }
    }
}

impl fmt::Display for ApplicationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// File attached to a record, stored and returned unchanged.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub filename: String,
    pub content_type: String,
    #[serde(with = "serde_bytes")]
    pub data: Vec<u8>,
}

impl Attachment {
    pub fn new(filename: &str, content_type: &str, data: Vec<u8>) -> Self {
        Self {
            filename: filename.to_string(),
            content_type: content_type.to_string(),
            data,
        }
    }

    pub(crate) fn validate(&self) -> Result<(), WorkflowError> {
        if self.filename.trim().is_empty() {
            return Err(WorkflowError::Validation("attachment without file name".into()));
        }
        if self.data.is_empty() {
            return Err(WorkflowError::Validation(format!(
                "attachment {} is empty",
                self.filename
            )));
        }
        Ok(())
    }
}

impl fmt::Debug for Attachment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Attachment")
            .field("filename", &self.filename)
            .field("content_type", &self.content_type)
            .field("size", &self.data.len())
            .finish()
    }
}

/// Entry of the append-only audit trail.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub notes: String,
    pub timestamp: Timestamp,
    pub actor: Option<UserId>,
}

/// Permit application with its payload and workflow state.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Application {
    pub id: Id,
    pub application_number: String,
    pub application_type: ApplicationType,
    pub user_id: UserId,
    pub status: Status,
    pub current_stage: Stage,
    #[serde(flatten)]
    pub flags: Flags,
    pub fields: BTreeMap<String, String>,
    pub files: BTreeMap<String, Vec<Attachment>>,
    history: Vec<HistoryEntry>,
    pub date_of_submission: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Application {
    /// Create a new application in `Draft`.
    pub fn new(
        application_number: String,
        application_type: ApplicationType,
        user_id: UserId,
        fields: BTreeMap<String, String>,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            id: Id::random(),
            application_number,
            application_type,
            user_id,
            status: Status::Draft,
            current_stage: Stage::Draft,
            flags: Flags::default(),
            fields,
            files: BTreeMap::new(),
            history: Vec::new(),
            date_of_submission: None,
            created_at: timestamp,
            updated_at: timestamp,
        }
    }

    /// Audit trail in the order the entries were appended.
    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    /// Append an entry to the audit trail. Entries can never be removed or changed.
    pub fn push_history(&mut self, notes: &str, actor: Option<&Actor>, timestamp: Timestamp) {
        self.history.push(HistoryEntry {
            notes: notes.to_string(),
            timestamp,
            actor: actor.map(|actor| actor.user_id.clone()),
        });
    }

    pub fn is_owned_by(&self, actor: &Actor) -> bool {
        self.user_id == actor.user_id
    }

    /// Returns the names of required payload fields which are missing or blank.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        self.application_type
            .required_fields()
            .iter()
            .copied()
            .filter(|name| {
                self.fields
                    .get(*name)
                    .is_none_or(|value| value.trim().is_empty())
            })
            .collect()
    }

    /// Attach files under a document type.
    ///
    /// Only the owner can attach files and only while the application is editable, that is in
    /// `Draft` or after it got returned.
    pub fn attach_files(
        &mut self,
        actor: &Actor,
        document_type: &str,
        files: Vec<Attachment>,
        timestamp: Timestamp,
    ) -> Result<(), WorkflowError> {
        if !self.is_owned_by(actor) {
            return Err(WorkflowError::Unauthorized {
                role: actor.role,
                operation: "attach files".into(),
            });
        }
        if !matches!(self.status, Status::Draft | Status::Returned) {
            return Err(WorkflowError::InvalidState(format!(
                "files can't be attached to an application in status {}",
                self.status
            )));
        }
        if document_type.trim().is_empty() {
            return Err(WorkflowError::Validation("missing document type".into()));
        }
        if files.is_empty() {
            return Err(WorkflowError::Validation("no files given".into()));
        }
        for file in &files {
            file.validate()?;
        }

        self.files
            .entry(document_type.to_string())
            .or_default()
            .extend(files);
        self.updated_at = timestamp;
        Ok(())
    }

    /// Check if this application may be physically deleted by the given actor.
    pub fn ensure_deletable(&self, actor: &Actor) -> Result<(), WorkflowError> {
        if !self.is_owned_by(actor) {
            return Err(WorkflowError::Unauthorized {
                role: actor.role,
                operation: "delete application".into(),
            });
        }
        if self.status != Status::Draft {
            return Err(WorkflowError::InvalidState(format!(
                "only draft applications can be deleted, this one is {}",
                self.status
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use assert_matches::assert_matches;

    use crate::error::WorkflowError;
    use crate::identity::{Actor, Role};
    use crate::stage::{Stage, Status};

    use super::{Application, ApplicationType, Attachment};

    fn draft() -> Application {
        Application::new(
            "PMDQ-TCP-000001".into(),
            ApplicationType::TreeCuttingPermit,
            "juan".into(),
            BTreeMap::from([("location".to_string(), "Boac".to_string())]),
            100,
        )
    }

    #[test]
    fn new_application_is_draft() {
        let application = draft();
        assert_eq!(application.status, Status::Draft);
        assert_eq!(application.current_stage, Stage::Draft);
        assert!(application.history().is_empty());
        assert_eq!(application.date_of_submission, None);
        assert_eq!(application.missing_fields(), vec!["numberOfTrees", "purpose"]);
    }

    #[test]
    fn attach_files_only_by_owner_while_editable() {
        let owner = Actor::new("juan", Role::Applicant);
        let stranger = Actor::new("maria", Role::Applicant);
        let mut application = draft();
        let file = Attachment::new("title.pdf", "application/pdf", vec![1, 2, 3]);

        assert_matches!(
            application.attach_files(&stranger, "landTitle", vec![file.clone()], 101),
            Err(WorkflowError::Unauthorized { .. })
        );

        application
            .attach_files(&owner, "landTitle", vec![file.clone()], 101)
            .unwrap();
        assert_eq!(application.files["landTitle"], vec![file.clone()]);
        assert_eq!(application.updated_at, 101);

        assert_matches!(
            application.attach_files(
                &owner,
                "landTitle",
                vec![Attachment::new("empty.pdf", "application/pdf", vec![])],
                102
            ),
            Err(WorkflowError::Validation(_))
        );

        application.status = Status::InProgress;
        assert_matches!(
            application.attach_files(&owner, "landTitle", vec![file], 103),
            Err(WorkflowError::InvalidState(_))
        );
    }

    #[test]
    fn only_drafts_are_deletable() {
        let owner = Actor::new("juan", Role::Applicant);
        let mut application = draft();
        assert!(application.ensure_deletable(&owner).is_ok());

        for status in [Status::Submitted, Status::Returned, Status::Released] {
            application.status = status;
            assert_matches!(
                application.ensure_deletable(&owner),
                Err(WorkflowError::InvalidState(_))
            );
        }
    }

    #[test]
    fn flags_are_flattened_into_record() {
        let application = draft();
        let value = serde_json::to_value(&application).unwrap();
        assert_eq!(value["currentStage"], "Draft");
        assert_eq!(value["applicationType"], "Tree Cutting Permit");
        assert_eq!(value["PermitCreated"], false);
        assert_eq!(value["recordedByReceivingClerk"], false);

        let decoded: Application = serde_json::from_value(value).unwrap();
        assert_eq!(decoded, application);
    }
}
