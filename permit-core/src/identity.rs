// SPDX-License-Identifier: MIT OR Apache-2.0

//! Identifiers for workflow records and the identities acting on them.
use std::fmt;
use std::str::FromStr;

use serde::de::Error as SerdeError;
use serde::{Deserialize, Serialize};
use serde_bytes::{ByteBuf as SerdeByteBuf, Bytes as SerdeBytes};
use thiserror::Error;

use crate::error::WorkflowError;

/// Size of record identifiers in bytes.
pub const ID_LEN: usize = 16;

/// Seconds since UNIX epoch.
pub type Timestamp = u64;

/// Random 16-byte identifier of an application, order of payment, certificate or inspection.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Id([u8; ID_LEN]);

impl Id {
    /// Generate a new random identifier.
    pub fn random() -> Self {
        Self(rand::random())
    }

    /// Create an `Id` from its raw bytes representation.
    pub const fn from_bytes(bytes: [u8; ID_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; ID_LEN] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl TryFrom<&[u8]> for Id {
    type Error = IdError;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        let value_len = value.len();

        let checked_value: [u8; ID_LEN] = value
            .try_into()
            .map_err(|_| IdError::InvalidLength(value_len, ID_LEN))?;

        Ok(Self(checked_value))
    }
}

impl FromStr for Id {
    type Err = IdError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::try_from(hex::decode(value)?.as_slice())
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Id").field(&self.to_hex()).finish()
    }
}

impl Serialize for Id {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        // Hex strings for human readable encodings (JSON), raw bytes otherwise (CBOR).
        if serializer.is_human_readable() {
            serializer.serialize_str(&self.to_hex())
        } else {
            SerdeBytes::new(&self.0).serialize(serializer)
        }
    }
}

impl<'de> Deserialize<'de> for Id {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        if deserializer.is_human_readable() {
            let value = String::deserialize(deserializer)?;
            value
                .parse()
                .map_err(|err: IdError| SerdeError::custom(err.to_string()))
        } else {
            let bytes = <SerdeByteBuf>::deserialize(deserializer)?;
            bytes
                .as_slice()
                .try_into()
                .map_err(|err: IdError| SerdeError::custom(err.to_string()))
        }
    }
}

/// Error types for `Id` struct.
#[derive(Debug, Error)]
pub enum IdError {
    #[error("invalid id length {0} bytes, expected {1} bytes")]
    InvalidLength(usize, usize),

    #[error("invalid hex encoding in id string")]
    InvalidHexEncoding(#[from] hex::FromHexError),
}

/// Opaque user identity as handed to us by the authentication layer.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UserId(String);

impl UserId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Roles taking part in the permit workflow.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Role {
    Applicant,
    ReceivingClerk,
    TechnicalStaff,
    ChiefRps,
    PenrCenrOfficer,
    /// May act in place of any staff role, never in place of an applicant.
    Admin,
}

impl Role {
    /// Returns `true` if this role is allowed to perform an action assigned to `required`.
    pub fn may_act_as(&self, required: Role) -> bool {
        match self {
            Role::Admin => required != Role::Applicant,
            role => *role == required,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            Role::Applicant => "Applicant",
            Role::ReceivingClerk => "Receiving Clerk",
            Role::TechnicalStaff => "Technical Staff",
            Role::ChiefRps => "Chief RPS",
            Role::PenrCenrOfficer => "PENR/CENR Officer",
            Role::Admin => "Admin",
        };
        f.write_str(value)
    }
}

/// Authenticated identity performing an operation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: UserId,
    pub role: Role,
}

impl Actor {
    pub fn new(user_id: impl Into<UserId>, role: Role) -> Self {
        Self {
            user_id: user_id.into(),
            role,
        }
    }

    /// Fails with `Unauthorized` unless this actor may act in place of `required`.
    pub fn ensure_role(&self, required: Role, operation: &str) -> Result<(), WorkflowError> {
        if !self.role.may_act_as(required) {
            return Err(WorkflowError::Unauthorized {
                role: self.role,
                operation: operation.to_string(),
            });
        }
        Ok(())
    }
}
