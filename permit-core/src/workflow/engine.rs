// SPDX-License-Identifier: MIT OR Apache-2.0

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::application::Application;
use crate::error::WorkflowError;
use crate::identity::{Actor, Role, Timestamp};
use crate::stage::{Flag, Stage, Status};
use crate::workflow::{Action, Transition, Workflow};

/// Request to move an application to a target stage.
///
/// Flag updates are sparse, flags which are not mentioned keep their value. When given, they
/// need to agree with what the transition into the target stage does.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageUpdate {
    pub current_stage: Stage,
    pub status: Status,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub flags: Vec<(Flag, bool)>,
}

impl StageUpdate {
    pub fn new(current_stage: Stage, status: Status) -> Self {
        Self {
            current_stage,
            status,
            notes: None,
            flags: Vec::new(),
        }
    }

    pub fn notes(mut self, notes: &str) -> Self {
        self.notes = Some(notes.to_string());
        self
    }

    pub fn flag(mut self, flag: Flag, value: bool) -> Self {
        self.flags.push((flag, value));
        self
    }
}

impl Workflow {
    /// Move an application to the stage requested in `update`.
    ///
    /// Fails if there is no edge from the current to the requested stage or if status or flags
    /// don't match that edge. A history entry is only written when notes are given.
    pub fn apply_update(
        &self,
        application: &mut Application,
        update: &StageUpdate,
        actor: &Actor,
        timestamp: Timestamp,
    ) -> Result<Transition, WorkflowError> {
        let from = application.current_stage;
        let transition = self
            .transition(from, update.current_stage)
            .ok_or(WorkflowError::InvalidTransition {
                from,
                to: update.current_stage,
            })?;

        if transition.status != update.status {
            return Err(WorkflowError::StatusMismatch {
                stage: transition.to,
                expected: transition.status,
                requested: update.status,
            });
        }

        for (flag, value) in &update.flags {
            if !transition.touches(*flag, *value) {
                return Err(WorkflowError::FlagMismatch {
                    from,
                    to: transition.to,
                    flag: *flag,
                    value: *value,
                });
            }
        }

        let notes = update
            .notes
            .as_deref()
            .filter(|notes| !notes.trim().is_empty());
        precheck(transition, application, actor, notes)?;
        apply(transition, application, notes, actor, timestamp);

        Ok(transition.clone())
    }

    /// Perform an action on an application.
    ///
    /// Remarks are written to the history, when none are given a default note for the action is
    /// used instead.
    pub fn perform(
        &self,
        application: &mut Application,
        action: Action,
        remarks: Option<&str>,
        actor: &Actor,
        timestamp: Timestamp,
    ) -> Result<Transition, WorkflowError> {
        let transition = self
            .transition_for(action, application.current_stage)
            .ok_or(WorkflowError::ActionUnavailable {
                action,
                stage: application.current_stage,
            })?;

        let remarks = remarks.filter(|remarks| !remarks.trim().is_empty());
        precheck(transition, application, actor, remarks)?;

        let notes = remarks.unwrap_or(action.default_note());
        apply(transition, application, Some(notes), actor, timestamp);

        Ok(transition.clone())
    }

    /// Revert an earlier action.
    ///
    /// Undo is rejected with `AlreadyProgressed` as soon as any role further down the workflow
    /// set its flag, even if the application was moved back in the meantime. Otherwise the flags
    /// of the transition are reverted, the application returns to the stage it came from and a
    /// history entry is written. Flags not touched by the transition keep their value.
    pub fn undo(
        &self,
        application: &mut Application,
        action: Action,
        actor: &Actor,
        timestamp: Timestamp,
    ) -> Result<Transition, WorkflowError> {
        let transition = self
            .undo_transition(action)
            .ok_or(WorkflowError::NotUndoable(action))?;

        authorize(transition, application, actor)?;

        for flag in self.downstream_flags(transition.to) {
            if transition.sets.contains(&flag) {
                continue;
            }

            if application.flags.get(flag) {
                return Err(WorkflowError::AlreadyProgressed { action, flag });
            }
        }

        if application.current_stage != transition.to {
            return Err(WorkflowError::InvalidTransition {
                from: application.current_stage,
                to: transition.from,
            });
        }

        for flag in &transition.sets {
            application.flags.set(*flag, false);
        }
        for flag in &transition.clears {
            application.flags.set(*flag, true);
        }
        application.current_stage = transition.from;
        application.status = transition.from.canonical_status();
        application.updated_at = timestamp;
        application.push_history(&format!("Undo: {}", action.default_note()), Some(actor), timestamp);

        debug!(
            id = %application.id,
            %action,
            stage = %application.current_stage,
            "reverted transition"
        );

        Ok(transition.clone())
    }
}

fn authorize(
    transition: &Transition,
    application: &Application,
    actor: &Actor,
) -> Result<(), WorkflowError> {
    let permitted = if transition.role == Role::Applicant {
        actor.role == Role::Applicant && application.is_owned_by(actor)
    } else {
        actor.role.may_act_as(transition.role)
    };

    if !permitted {
        return Err(WorkflowError::Unauthorized {
            role: actor.role,
            operation: transition.action.to_string(),
        });
    }

    Ok(())
}

fn precheck(
    transition: &Transition,
    application: &Application,
    actor: &Actor,
    notes: Option<&str>,
) -> Result<(), WorkflowError> {
    authorize(transition, application, actor)?;

    if transition.requires_remarks && notes.is_none() {
        return Err(WorkflowError::Validation(format!(
            "remarks are required for {}",
            transition.action
        )));
    }

    if matches!(transition.action, Action::Submit | Action::Resubmit) {
        let missing = application.missing_fields();
        if !missing.is_empty() {
            return Err(WorkflowError::Validation(format!(
                "missing required fields: {}",
                missing.join(", ")
            )));
        }
    }

    Ok(())
}

fn apply(
    transition: &Transition,
    application: &mut Application,
    notes: Option<&str>,
    actor: &Actor,
    timestamp: Timestamp,
) {
    for flag in &transition.sets {
        application.flags.set(*flag, true);
    }
    for flag in &transition.clears {
        application.flags.set(*flag, false);
    }

    application.current_stage = transition.to;
    application.status = transition.status;
    application.updated_at = timestamp;

    if transition.action == Action::Submit && application.date_of_submission.is_none() {
        application.date_of_submission = Some(timestamp);
    }

    if let Some(notes) = notes {
        application.push_history(notes, Some(actor), timestamp);
    }

    debug!(
        id = %application.id,
        action = %transition.action,
        from = %transition.from,
        to = %transition.to,
        "applied transition"
    );
}
