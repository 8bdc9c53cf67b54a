//! # Domain Identity Newtypes
//!
//! Newtype wrappers for every identifier in FixFlow. A `CustomerId` cannot
//! be credited as if it were the `UserId` of a technician.
//!
//! All identifiers are UUIDs and serialize as the bare UUID string, which is
//! the shape the persisted records use.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Generate a new random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Access the inner UUID.
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }

        impl FromStr for $name {
            type Err = ValidationError;

            /// Accepts both the bare UUID and the prefixed display form.
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let raw = s.strip_prefix(concat!($prefix, ":")).unwrap_or(s);
                Uuid::parse_str(raw)
                    .map(Self)
                    .map_err(|e| ValidationError::InvalidId {
                        value: s.to_string(),
                        reason: e.to_string(),
                    })
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, concat!($prefix, ":{}"), self.0)
            }
        }
    };
}

uuid_id!(
    /// Unique identifier for a repair job (a device on the bench).
    DeviceId,
    "device"
);

uuid_id!(
    /// Unique identifier for a customer who owns a device.
    CustomerId,
    "customer"
);

uuid_id!(
    /// Unique identifier for a staff account (technician, customer care, admin).
    UserId,
    "user"
);

uuid_id!(
    /// Unique identifier for one recorded status transition.
    TransitionId,
    "transition"
);

uuid_id!(
    /// Unique identifier for a remark attached to a device.
    RemarkId,
    "remark"
);

uuid_id!(
    /// Unique identifier for a notification template.
    TemplateId,
    "template"
);

uuid_id!(
    /// Unique identifier for a notification trigger rule.
    TriggerId,
    "trigger"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_prefixed() {
        let id = DeviceId(Uuid::nil());
        assert_eq!(
            id.to_string(),
            "device:00000000-0000-0000-0000-000000000000"
        );
    }

    #[test]
    fn parse_accepts_bare_and_prefixed() {
        let id = CustomerId::new();
        let bare: CustomerId = id.0.to_string().parse().unwrap();
        let prefixed: CustomerId = id.to_string().parse().unwrap();
        assert_eq!(bare, id);
        assert_eq!(prefixed, id);
    }

    #[test]
    fn parse_rejects_foreign_prefix() {
        let id = UserId::new();
        let foreign = format!("device:{}", id.0);
        assert!(foreign.parse::<UserId>().is_err());
    }

    #[test]
    fn parse_rejects_garbage() {
        let err = "not-a-uuid".parse::<TemplateId>().unwrap_err();
        assert!(matches!(err, ValidationError::InvalidId { .. }));
    }

    #[test]
    fn serializes_as_bare_uuid() {
        let id = TriggerId(Uuid::nil());
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"00000000-0000-0000-0000-000000000000\"");
        let back: TriggerId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn new_ids_are_distinct() {
        assert_ne!(DeviceId::new(), DeviceId::new());
    }
}
