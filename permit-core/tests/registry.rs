// SPDX-License-Identifier: MIT OR Apache-2.0

use std::collections::HashMap;

use assert_matches::assert_matches;
use permit_core::test_utils::{applicant, draft, receiving_clerk, technical_staff};
use permit_core::{
    Action, ApplicationType, DefinitionError, Stage, Workflow, WorkflowDefinition,
    WorkflowError, WorkflowRegistry,
};

#[test]
fn built_in_workflows_per_type() {
    let registry = WorkflowRegistry::default();

    let chainsaw = registry.get(ApplicationType::ChainsawRegistration);
    assert!(!chainsaw.contains_stage(Stage::ChiefRpsReview));

    for application_type in ApplicationType::ALL {
        if application_type == ApplicationType::ChainsawRegistration {
            continue;
        }
        assert!(registry.get(application_type).contains_stage(Stage::ChiefRpsReview));
    }
}

#[test]
fn definitions_from_json_override_built_ins() {
    // Transport permits skip the Chief RPS review in this deployment.
    let definition = WorkflowDefinition::from(&Workflow::chainsaw_registration());
    let json = serde_json::json!({
        "Transport Permit": definition,
    });
    let definitions: HashMap<ApplicationType, WorkflowDefinition> =
        serde_json::from_value(json).unwrap();

    let registry = WorkflowRegistry::with_definitions(&definitions).unwrap();
    let workflow = registry.get(ApplicationType::TransportPermit);

    let mut application = draft(ApplicationType::TransportPermit);
    for (action, actor) in [
        (Action::Submit, applicant()),
        (Action::AcceptByReceivingClerk, receiving_clerk()),
        (Action::AcceptByTechnicalStaff, technical_staff()),
        (Action::Record, receiving_clerk()),
    ] {
        workflow
            .perform(&mut application, action, None, &actor, 10)
            .unwrap();
    }
    assert_eq!(application.current_stage, Stage::CenrPenrReview);

    // Other types keep the standard workflow.
    assert!(
        registry
            .get(ApplicationType::TreeCuttingPermit)
            .contains_stage(Stage::ChiefRpsReview)
    );
}

#[test]
fn broken_definitions_are_rejected() {
    let mut definition = WorkflowDefinition::from(&Workflow::standard());
    definition
        .transitions
        .retain(|transition| transition.action != Action::Submit);

    let definitions = HashMap::from([(ApplicationType::TreeCuttingPermit, definition)]);
    assert_matches!(
        WorkflowRegistry::with_definitions(&definitions),
        Err(DefinitionError::MissingDraft)
    );
}

#[test]
fn transitions_outside_graph_fail() {
    let workflow = Workflow::chainsaw_registration();
    let mut application = draft(ApplicationType::ChainsawRegistration);
    let error = workflow
        .perform(&mut application, Action::Release, None, &receiving_clerk(), 10)
        .unwrap_err();
    assert!(error.is_invalid_transition());
    assert_matches!(error, WorkflowError::ActionUnavailable { .. });
}
