// SPDX-License-Identifier: MIT OR Apache-2.0

//! Workflow graph of an application type and the rules for moving applications through it.
//!
//! Every application type has a directed graph of [`Stage`]s. Each edge is a [`Transition`]
//! naming the role allowed to take it, the status the application gets and the flags it sets or
//! clears. Applications can only ever move along these edges, either by requesting a target stage
//! directly ([`Workflow::apply_update`]) or by naming an [`Action`] ([`Workflow::perform`]).
//!
//! Some transitions can be reverted with [`Workflow::undo`] as long as no role further down the
//! graph acted on the application yet.
mod engine;
mod graph;
mod registry;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::identity::Role;
use crate::stage::{Flag, Stage, Status};

pub use engine::StageUpdate;
pub use graph::{DefinitionError, Workflow};
pub use registry::{WorkflowDefinition, WorkflowRegistry};

/// Named operations moving an application along an edge of its workflow.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Action {
    Submit,
    Resubmit,
    ReturnByReceivingClerk,
    AcceptByReceivingClerk,
    ReturnByTechnicalStaff,
    AcceptByTechnicalStaff,
    Record,
    ReviewByChief,
    RejectByChief,
    AcceptByOfficer,
    RejectByOfficer,
    ApproveAuthenticity,
    CreatePermit,
    IssueOrderOfPayment,
    ConfirmPayment,
    SignCertificate,
    Release,
}

impl Action {
    /// History note written when the caller didn't give any remarks.
    pub fn default_note(&self) -> &'static str {
        match self {
            Action::Submit => "Application submitted",
            Action::Resubmit => "Application resubmitted",
            Action::ReturnByReceivingClerk => "Application returned by Receiving Clerk",
            Action::AcceptByReceivingClerk => "Application accepted by Receiving Clerk",
            Action::ReturnByTechnicalStaff => "Application returned by Technical Staff",
            Action::AcceptByTechnicalStaff => "Application accepted by Technical Staff",
            Action::Record => "Application recorded by Receiving Clerk",
            Action::ReviewByChief => "Application reviewed by Chief RPS",
            Action::RejectByChief => "Application rejected by Chief RPS",
            Action::AcceptByOfficer => "Application accepted by PENR/CENR Officer",
            Action::RejectByOfficer => "Application rejected by PENR/CENR Officer",
            Action::ApproveAuthenticity => "Authenticity approved by Technical Staff",
            Action::CreatePermit => "Permit created by Technical Staff",
            Action::IssueOrderOfPayment => "Order of Payment approved",
            Action::ConfirmPayment => "Payment confirmed",
            Action::SignCertificate => "Certificate signed by PENR/CENR Officer",
            Action::Release => "Permit released",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Edge of a workflow graph.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    pub action: Action,
    pub role: Role,
    pub from: Stage,
    pub to: Stage,
    pub status: Status,
    #[serde(default)]
    pub sets: Vec<Flag>,
    #[serde(default)]
    pub clears: Vec<Flag>,
    #[serde(default)]
    pub requires_remarks: bool,
    #[serde(default)]
    pub undoable: bool,
}

impl Transition {
    pub fn new(action: Action, role: Role, from: Stage, to: Stage, status: Status) -> Self {
        Self {
            action,
            role,
            from,
            to,
            status,
            sets: Vec::new(),
            clears: Vec::new(),
            requires_remarks: false,
            undoable: false,
        }
    }

    pub fn sets(mut self, flags: &[Flag]) -> Self {
        self.sets.extend_from_slice(flags);
        self
    }

    pub fn clears(mut self, flags: &[Flag]) -> Self {
        self.clears.extend_from_slice(flags);
        self
    }

    pub fn requires_remarks(mut self) -> Self {
        self.requires_remarks = true;
        self
    }

    pub fn undoable(mut self) -> Self {
        self.undoable = true;
        self
    }

    /// Returns `true` if this edge sets `flag` to `value`.
    pub fn touches(&self, flag: Flag, value: bool) -> bool {
        if value {
            self.sets.contains(&flag)
        } else {
            self.clears.contains(&flag)
        }
    }
}
