//! # Transition Records
//!
//! One recorded status change. Transitions are append-only: once pushed onto
//! a device's history they are never edited or removed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use fixflow_core::{DeviceId, DeviceStatus, TransitionId, UserId};

/// A captured approval mark (initials, a drawn-signature reference, ...).
///
/// Opaque to FixFlow; it is stored and echoed, never verified.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Signature(String);

impl Signature {
    /// Wrap a captured mark.
    pub fn new(mark: impl Into<String>) -> Self {
        Self(mark.into())
    }

    /// The raw mark.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A single status change in a device's history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transition {
    /// Unique transition id.
    pub id: TransitionId,
    /// Status before the change.
    pub from_status: DeviceStatus,
    /// Status after the change.
    pub to_status: DeviceStatus,
    /// Staff member who performed the change.
    pub performed_by: UserId,
    /// When the change was committed.
    pub timestamp: DateTime<Utc>,
    /// Approval mark captured with the change.
    pub signature: Signature,
}

impl Transition {
    /// Build a new transition record.
    pub fn new(
        from_status: DeviceStatus,
        to_status: DeviceStatus,
        performed_by: UserId,
        signature: Signature,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: TransitionId::new(),
            from_status,
            to_status,
            performed_by,
            timestamp,
            signature,
        }
    }

    /// Whether this is a bootstrap marker (status unchanged).
    pub fn is_bootstrap(&self) -> bool {
        self.from_status == self.to_status
    }

    /// The persisted row shape, keyed by device.
    pub fn to_record(&self, device_id: DeviceId) -> TransitionRecord {
        TransitionRecord {
            id: self.id,
            device_id,
            from_status: self.from_status,
            to_status: self.to_status,
            performed_by: self.performed_by,
            created_at: self.timestamp,
            signature: self.signature.clone(),
        }
    }
}

/// Persisted transition row: `{id, device_id, from_status, to_status,
/// performed_by, created_at, signature}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub id: TransitionId,
    pub device_id: DeviceId,
    pub from_status: DeviceStatus,
    pub to_status: DeviceStatus,
    pub performed_by: UserId,
    pub created_at: DateTime<Utc>,
    pub signature: Signature,
}
