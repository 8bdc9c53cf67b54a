//! # Actors
//!
//! The staff member performing an operation. Authorization happens before a
//! call reaches FixFlow; the role is carried only because some side effects
//! depend on it (the technician repair bonus, customer-care handover mail).

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::identity::UserId;

/// Staff role of an actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActorRole {
    /// Full administrative access.
    Admin,
    /// Front desk: intake and handover.
    CustomerCare,
    /// Bench technician performing diagnosis and repair.
    Technician,
}

impl ActorRole {
    /// The wire name (kebab-case).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::CustomerCare => "customer-care",
            Self::Technician => "technician",
        }
    }
}

impl std::fmt::Display for ActorRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActorRole {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Self::Admin),
            "customer-care" => Ok(Self::CustomerCare),
            "technician" => Ok(Self::Technician),
            other => Err(ValidationError::UnknownRole(other.to_string())),
        }
    }
}

/// An already-authorized staff member performing an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Actor {
    /// Staff account id.
    pub id: UserId,
    /// Role at the time of the operation.
    pub role: ActorRole,
}

impl Actor {
    /// Construct an actor.
    pub fn new(id: UserId, role: ActorRole) -> Self {
        Self { id, role }
    }

    /// Whether the actor is a bench technician.
    pub fn is_technician(&self) -> bool {
        self.role == ActorRole::Technician
    }
}
