// SPDX-License-Identifier: MIT OR Apache-2.0

use std::collections::{BTreeSet, HashSet};

use petgraph::graphmap::DiGraphMap;
use petgraph::visit::Dfs;
use thiserror::Error;

use crate::identity::Role;
use crate::stage::{Flag, Stage, Status};
use crate::workflow::{Action, Transition};

/// Directed graph of stages for one application type.
#[derive(Clone, Debug)]
pub struct Workflow {
    graph: DiGraphMap<Stage, Transition>,
}

impl Workflow {
    /// Build a workflow from a list of transitions.
    ///
    /// The list is rejected if two edges connect the same stages, if an action is ambiguous from
    /// one stage, if an undoable action occurs on more than one edge or if any stage can't be
    /// reached from `Draft`.
    pub fn from_transitions(transitions: Vec<Transition>) -> Result<Self, DefinitionError> {
        let mut graph = DiGraphMap::new();
        let mut actions: HashSet<(Action, Stage)> = HashSet::new();

        for transition in transitions.iter() {
            if graph.contains_edge(transition.from, transition.to) {
                return Err(DefinitionError::DuplicateEdge {
                    from: transition.from,
                    to: transition.to,
                });
            }

            if !actions.insert((transition.action, transition.from)) {
                return Err(DefinitionError::AmbiguousAction {
                    action: transition.action,
                    from: transition.from,
                });
            }

            if let Some(flag) = transition
                .sets
                .iter()
                .find(|flag| transition.clears.contains(flag))
            {
                return Err(DefinitionError::ConflictingFlag {
                    action: transition.action,
                    flag: *flag,
                });
            }

            graph.add_edge(transition.from, transition.to, transition.clone());
        }

        for transition in transitions.iter().filter(|transition| transition.undoable) {
            let edges = transitions
                .iter()
                .filter(|other| other.action == transition.action)
                .count();
            if edges > 1 {
                return Err(DefinitionError::AmbiguousUndo(transition.action));
            }
        }

        if !graph.contains_node(Stage::Draft) {
            return Err(DefinitionError::MissingDraft);
        }

        let mut reachable = HashSet::new();
        let mut dfs = Dfs::new(&graph, Stage::Draft);
        while let Some(stage) = dfs.next(&graph) {
            reachable.insert(stage);
        }
        if let Some(stage) = graph.nodes().find(|stage| !reachable.contains(stage)) {
            return Err(DefinitionError::Unreachable(stage));
        }

        Ok(Self { graph })
    }

    /// Workflow used for all application types without a dedicated configuration.
    ///
    /// After being recorded by the Receiving Clerk the application is reviewed by the Chief RPS
    /// before reaching the PENR/CENR Officer.
    pub fn standard() -> Self {
        Self::from_transitions(base_transitions(Stage::ChiefRpsReview, true))
            .expect("built-in standard workflow is valid")
    }

    /// Workflow for chainsaw registrations which skip the Chief RPS review.
    pub fn chainsaw_registration() -> Self {
        Self::from_transitions(base_transitions(Stage::CenrPenrReview, false))
            .expect("built-in chainsaw registration workflow is valid")
    }

    /// Edge between two stages, if any.
    pub fn transition(&self, from: Stage, to: Stage) -> Option<&Transition> {
        self.graph.edge_weight(from, to)
    }

    /// Edge for an action starting at the given stage.
    pub fn transition_for(&self, action: Action, from: Stage) -> Option<&Transition> {
        if !self.graph.contains_node(from) {
            return None;
        }

        self.graph
            .edges(from)
            .map(|(_, _, transition)| transition)
            .find(|transition| transition.action == action)
    }

    /// The edge an undo of `action` reverts.
    pub fn undo_transition(&self, action: Action) -> Option<&Transition> {
        self.graph
            .all_edges()
            .map(|(_, _, transition)| transition)
            .find(|transition| transition.action == action && transition.undoable)
    }

    /// All edges leaving a stage.
    pub fn available(&self, stage: Stage) -> Vec<&Transition> {
        if !self.graph.contains_node(stage) {
            return Vec::new();
        }

        let mut transitions: Vec<&Transition> = self
            .graph
            .edges(stage)
            .map(|(_, _, transition)| transition)
            .collect();
        transitions.sort_by_key(|transition| transition.action);
        transitions
    }

    /// Flags set by any edge reachable from the given stage.
    ///
    /// These are the flags of roles acting "later" than whoever moved the application into this
    /// stage.
    pub fn downstream_flags(&self, stage: Stage) -> BTreeSet<Flag> {
        let mut flags = BTreeSet::new();
        if !self.graph.contains_node(stage) {
            return flags;
        }

        let mut dfs = Dfs::new(&self.graph, stage);
        while let Some(node) = dfs.next(&self.graph) {
            for (_, _, transition) in self.graph.edges(node) {
                flags.extend(transition.sets.iter().copied());
            }
        }
        flags
    }

    pub fn contains_stage(&self, stage: Stage) -> bool {
        self.graph.contains_node(stage)
    }

    /// All edges of this workflow, ordered by source stage and action.
    pub fn transitions(&self) -> Vec<&Transition> {
        let mut transitions: Vec<&Transition> = self
            .graph
            .all_edges()
            .map(|(_, _, transition)| transition)
            .collect();
        transitions.sort_by_key(|transition| (transition.from, transition.action));
        transitions
    }
}

fn base_transitions(after_record: Stage, with_chief_review: bool) -> Vec<Transition> {
    use Action::*;
    use Flag::*;
    use Role::*;

    let mut transitions = vec![
        Transition::new(
            Submit,
            Applicant,
            Stage::Draft,
            Stage::ReceivingClerkReview,
            Status::Submitted,
        ),
        Transition::new(
            ReturnByReceivingClerk,
            ReceivingClerk,
            Stage::ReceivingClerkReview,
            Stage::ReturnedByReceivingClerk,
            Status::Returned,
        )
        .requires_remarks(),
        Transition::new(
            Resubmit,
            Applicant,
            Stage::ReturnedByReceivingClerk,
            Stage::ReceivingClerkReview,
            Status::Submitted,
        ),
        Transition::new(
            AcceptByReceivingClerk,
            ReceivingClerk,
            Stage::ReceivingClerkReview,
            Stage::TechnicalStaffReview,
            Status::InProgress,
        )
        .sets(&[AcceptedByReceivingClerk])
        .undoable(),
        Transition::new(
            ReturnByTechnicalStaff,
            TechnicalStaff,
            Stage::TechnicalStaffReview,
            Stage::ReturnedByTechnicalStaff,
            Status::Returned,
        )
        .requires_remarks(),
        Transition::new(
            Resubmit,
            Applicant,
            Stage::ReturnedByTechnicalStaff,
            Stage::TechnicalStaffReview,
            Status::InProgress,
        ),
        Transition::new(
            AcceptByTechnicalStaff,
            TechnicalStaff,
            Stage::TechnicalStaffReview,
            Stage::ForRecordByReceivingClerk,
            Status::InProgress,
        )
        .sets(&[AcceptedByTechnicalStaff])
        .undoable(),
        Transition::new(
            Record,
            ReceivingClerk,
            Stage::ForRecordByReceivingClerk,
            after_record,
            Status::InProgress,
        )
        .sets(&[RecordedByReceivingClerk])
        .undoable(),
    ];

    if with_chief_review {
        transitions.extend([
            Transition::new(
                ReviewByChief,
                ChiefRps,
                Stage::ChiefRpsReview,
                Stage::CenrPenrReview,
                Status::InProgress,
            )
            .sets(&[ReviewedByChief])
            .undoable(),
            Transition::new(
                RejectByChief,
                ChiefRps,
                Stage::ChiefRpsReview,
                Stage::Rejected,
                Status::Rejected,
            )
            .requires_remarks(),
        ]);
    }

    transitions.extend([
        Transition::new(
            AcceptByOfficer,
            PenrCenrOfficer,
            Stage::CenrPenrReview,
            Stage::ForInspectionByTechnicalStaff,
            Status::InProgress,
        )
        .sets(&[AcceptedByPenrCenrOfficer])
        .undoable(),
        Transition::new(
            RejectByOfficer,
            PenrCenrOfficer,
            Stage::CenrPenrReview,
            Stage::Rejected,
            Status::Rejected,
        )
        .requires_remarks(),
        Transition::new(
            ApproveAuthenticity,
            TechnicalStaff,
            Stage::ForInspectionByTechnicalStaff,
            Stage::AuthenticityApprovedByTechnicalStaff,
            Status::InProgress,
        )
        .sets(&[ApprovedByTechnicalStaff, AwaitingPermitCreation])
        .undoable(),
        Transition::new(
            CreatePermit,
            TechnicalStaff,
            Stage::AuthenticityApprovedByTechnicalStaff,
            Stage::AwaitingOrderOfPayment,
            Status::InProgress,
        )
        .sets(&[PermitCreated])
        .clears(&[AwaitingPermitCreation]),
        Transition::new(
            IssueOrderOfPayment,
            TechnicalStaff,
            Stage::AwaitingOrderOfPayment,
            Stage::AwaitingPayment,
            Status::AwaitingPayment,
        )
        .undoable(),
        Transition::new(
            ConfirmPayment,
            TechnicalStaff,
            Stage::AwaitingPayment,
            Stage::PendingSignatureByPenrCenrOfficer,
            Status::InProgress,
        )
        .sets(&[HasCertificate]),
        Transition::new(
            SignCertificate,
            PenrCenrOfficer,
            Stage::PendingSignatureByPenrCenrOfficer,
            Stage::PendingRelease,
            Status::Accepted,
        )
        .sets(&[ApprovedByPenrCenrOfficer, CertificateSignedByPenrCenrOfficer]),
        Transition::new(
            Release,
            ReceivingClerk,
            Stage::PendingRelease,
            Stage::Released,
            Status::Released,
        ),
    ]);

    transitions
}

/// Reasons a list of transitions doesn't form a usable workflow.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DefinitionError {
    #[error("more than one transition from {from} to {to}")]
    DuplicateEdge { from: Stage, to: Stage },

    #[error("action {action} is defined more than once from {from}")]
    AmbiguousAction { action: Action, from: Stage },

    #[error("action {action} sets and clears {flag}")]
    ConflictingFlag { action: Action, flag: Flag },

    #[error("undoable action {0} occurs on more than one transition")]
    AmbiguousUndo(Action),

    #[error("workflow has no transition leaving Draft")]
    MissingDraft,

    #[error("stage {0} can't be reached from Draft")]
    Unreachable(Stage),
}
