// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fixtures for tests of crates building on the workflow types.
use std::collections::BTreeMap;

use crate::application::{Application, ApplicationType, Attachment};
use crate::identity::{Actor, Role};

pub fn applicant() -> Actor {
    Actor::new("applicant-juan", Role::Applicant)
}

pub fn receiving_clerk() -> Actor {
    Actor::new("clerk-ana", Role::ReceivingClerk)
}

pub fn technical_staff() -> Actor {
    Actor::new("staff-ben", Role::TechnicalStaff)
}

pub fn chief() -> Actor {
    Actor::new("chief-carla", Role::ChiefRps)
}

pub fn officer() -> Actor {
    Actor::new("officer-dario", Role::PenrCenrOfficer)
}

/// Payload with every required field of the given type filled in.
pub fn complete_fields(application_type: ApplicationType) -> BTreeMap<String, String> {
    application_type
        .required_fields()
        .iter()
        .map(|name| (name.to_string(), format!("{name} value")))
        .collect()
}

/// Draft owned by [`applicant`] with all required fields.
pub fn draft(application_type: ApplicationType) -> Application {
    Application::new(
        format!("TEST-{}-000001", application_type.code()),
        application_type,
        applicant().user_id,
        complete_fields(application_type),
        1_000,
    )
}

pub fn pdf(name: &str) -> Attachment {
    Attachment::new(name, "application/pdf", b"%PDF-1.7".to_vec())
}

pub fn signature_image() -> Attachment {
    Attachment::new("signature.png", "image/png", vec![137, 80, 78, 71])
}
