//! # Device Lifecycle
//!
//! A device is one repair job. Its `status` moves only by appending a
//! [`Transition`]; the history is never rewritten.
//!
//! ## Invariants
//!
//! - The history is never empty. Intake writes a bootstrap transition
//!   (`assigned → assigned`) so that every device, including one that never
//!   moved, carries a record of who took it in and when.
//! - `status == transitions.last().to_status`.
//! - A transition's `from_status` is the status its writer saw. Writes are
//!   last-write-wins with no version check, so after two writers raced on a
//!   stale copy a `from_status` can differ from the previous `to_status`.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use fixflow_core::{Actor, CustomerId, DeviceId, DeviceStatus, RemarkId, UserId};

use crate::transition::{Signature, Transition, TransitionRecord};

/// Signature recorded on the bootstrap transition written at intake.
pub const INTAKE_SIGNATURE: &str = "intake";

// ─── Errors ──────────────────────────────────────────────────────────

/// Violations of the append-only history invariants.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HistoryError {
    /// The device has no transitions at all.
    #[error("device {id} has an empty transition history")]
    EmptyHistory {
        /// Offending device.
        id: DeviceId,
    },

    /// The current status disagrees with the last transition.
    #[error("device {id} has status {status} but its last transition ends at {last}")]
    StatusMismatch {
        /// Offending device.
        id: DeviceId,
        /// Stored status.
        status: DeviceStatus,
        /// `to_status` of the last transition.
        last: DeviceStatus,
    },
}

// ─── Records ─────────────────────────────────────────────────────────

/// A free-text note attached to a device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Remark {
    pub id: RemarkId,
    pub content: String,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
}

impl Remark {
    /// Build a remark authored by `created_by`.
    pub fn new(content: impl Into<String>, created_by: UserId, created_at: DateTime<Utc>) -> Self {
        Self {
            id: RemarkId::new(),
            content: content.into(),
            created_by,
            created_at,
        }
    }
}

/// Intake form data for a new device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewDevice {
    pub customer_id: CustomerId,
    pub brand: String,
    pub model: String,
    pub serial_number: String,
    #[serde(default)]
    pub issue_description: String,
    #[serde(default)]
    pub expected_return_date: Option<NaiveDate>,
    #[serde(default)]
    pub assigned_to: Option<UserId>,
}

/// A device under repair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    pub id: DeviceId,
    pub status: DeviceStatus,
    pub customer_id: CustomerId,
    pub assigned_to: Option<UserId>,
    pub brand: String,
    pub model: String,
    pub serial_number: String,
    #[serde(default)]
    pub issue_description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub expected_return_date: Option<NaiveDate>,
    pub transitions: Vec<Transition>,
    #[serde(default)]
    pub remarks: Vec<Remark>,
}

impl Device {
    /// Take a device in: status `assigned` with the bootstrap transition.
    pub fn intake(new: NewDevice, actor: &Actor, now: DateTime<Utc>) -> Self {
        let bootstrap = Transition::new(
            DeviceStatus::Assigned,
            DeviceStatus::Assigned,
            actor.id,
            Signature::new(INTAKE_SIGNATURE),
            now,
        );
        Self {
            id: DeviceId::new(),
            status: DeviceStatus::Assigned,
            customer_id: new.customer_id,
            assigned_to: new.assigned_to,
            brand: new.brand,
            model: new.model,
            serial_number: new.serial_number,
            issue_description: new.issue_description,
            created_at: now,
            updated_at: now,
            expected_return_date: new.expected_return_date,
            transitions: vec![bootstrap],
            remarks: Vec::new(),
        }
    }

    /// Build the transition that would move this device to `to`.
    ///
    /// Does not mutate the device; pair with [`Device::apply`].
    pub fn next_transition(
        &self,
        to: DeviceStatus,
        performed_by: UserId,
        signature: Signature,
        now: DateTime<Utc>,
    ) -> Transition {
        Transition::new(self.status, to, performed_by, signature, now)
    }

    /// Append a transition and move the status to its `to_status`.
    ///
    /// The transition is recorded as given, even when its `from_status` is
    /// not the current status.
    pub fn apply(&mut self, transition: Transition) {
        self.status = transition.to_status;
        self.updated_at = transition.timestamp;
        self.transitions.push(transition);
    }

    /// The most recent transition.
    pub fn last_transition(&self) -> Option<&Transition> {
        self.transitions.last()
    }

    /// Check every history invariant.
    pub fn verify_history(&self) -> Result<(), HistoryError> {
        let last = self
            .transitions
            .last()
            .ok_or(HistoryError::EmptyHistory { id: self.id })?;
        if last.to_status != self.status {
            return Err(HistoryError::StatusMismatch {
                id: self.id,
                status: self.status,
                last: last.to_status,
            });
        }
        Ok(())
    }

    /// Persisted rows for the whole history.
    pub fn transition_records(&self) -> Vec<TransitionRecord> {
        self.transitions.iter().map(|t| t.to_record(self.id)).collect()
    }

    /// Look up a field by template-variable name.
    ///
    /// Accepts snake_case names and the camelCase aliases used by older
    /// templates. Absent optional fields resolve to `None`.
    pub fn field(&self, name: &str) -> Option<String> {
        match name {
            "id" | "device_id" | "deviceId" => Some(self.id.0.to_string()),
            "status" => Some(self.status.to_string()),
            "customer_id" | "customerId" => Some(self.customer_id.0.to_string()),
            "assigned_to" | "assignedTo" => self.assigned_to.map(|u| u.0.to_string()),
            "brand" => Some(self.brand.clone()),
            "model" => Some(self.model.clone()),
            "serial_number" | "serialNumber" => Some(self.serial_number.clone()),
            "issue_description" | "issueDescription" => Some(self.issue_description.clone()),
            "created_at" | "createdAt" => Some(self.created_at.to_rfc3339()),
            "expected_return_date" | "expectedReturnDate" => {
                self.expected_return_date.map(|d| d.to_string())
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use fixflow_core::ActorRole;

    fn desk() -> Actor {
        Actor::new(UserId::new(), ActorRole::CustomerCare)
    }

    fn at(h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, h, 0, 0).unwrap()
    }

    fn new_device() -> NewDevice {
        NewDevice {
            customer_id: CustomerId::new(),
            brand: "Samsung".into(),
            model: "A52".into(),
            serial_number: "SN-001".into(),
            issue_description: "cracked screen".into(),
            expected_return_date: NaiveDate::from_ymd_opt(2024, 1, 3),
            assigned_to: None,
        }
    }

    #[test]
    fn intake_writes_bootstrap_transition() {
        let actor = desk();
        let device = Device::intake(new_device(), &actor, at(8));
        assert_eq!(device.status, DeviceStatus::Assigned);
        assert_eq!(device.transitions.len(), 1);
        let boot = &device.transitions[0];
        assert!(boot.is_bootstrap());
        assert_eq!(boot.performed_by, actor.id);
        assert_eq!(boot.signature.as_str(), INTAKE_SIGNATURE);
        assert!(device.verify_history().is_ok());
    }

    #[test]
    fn apply_moves_status_and_appends() {
        let actor = desk();
        let mut device = Device::intake(new_device(), &actor, at(8));
        let t = device.next_transition(
            DeviceStatus::DiagnosisStarted,
            actor.id,
            Signature::new("JD"),
            at(9),
        );
        device.apply(t);
        assert_eq!(device.status, DeviceStatus::DiagnosisStarted);
        assert_eq!(device.transitions.len(), 2);
        assert_eq!(device.updated_at, at(9));
        assert!(device.verify_history().is_ok());
    }

    #[test]
    fn apply_keeps_the_writers_from_status() {
        let actor = desk();
        let mut device = Device::intake(new_device(), &actor, at(8));
        let stale = Transition::new(
            DeviceStatus::InRepair,
            DeviceStatus::RepairComplete,
            actor.id,
            Signature::default(),
            at(9),
        );
        device.apply(stale);
        assert_eq!(device.status, DeviceStatus::RepairComplete);
        assert_eq!(device.transitions.len(), 2);
        assert_eq!(device.transitions[1].from_status, DeviceStatus::InRepair);
        assert!(device.verify_history().is_ok());
    }

    #[test]
    fn verify_detects_empty_and_mismatch() {
        let actor = desk();
        let mut device = Device::intake(new_device(), &actor, at(8));

        device.status = DeviceStatus::Done;
        assert!(matches!(
            device.verify_history(),
            Err(HistoryError::StatusMismatch { .. })
        ));

        device.transitions.clear();
        assert!(matches!(
            device.verify_history(),
            Err(HistoryError::EmptyHistory { .. })
        ));
    }

    #[test]
    fn field_lookup_accepts_both_spellings() {
        let device = Device::intake(new_device(), &desk(), at(8));
        assert_eq!(device.field("serialNumber").as_deref(), Some("SN-001"));
        assert_eq!(device.field("serial_number").as_deref(), Some("SN-001"));
        assert_eq!(device.field("brand").as_deref(), Some("Samsung"));
        assert_eq!(device.field("status").as_deref(), Some("assigned"));
        assert_eq!(
            device.field("expectedReturnDate").as_deref(),
            Some("2024-01-03")
        );
    }

    #[test]
    fn field_lookup_absent_values() {
        let device = Device::intake(new_device(), &desk(), at(8));
        assert_eq!(device.field("assignedTo"), None);
        assert_eq!(device.field("customer_name"), None);
    }

    #[test]
    fn transition_records_cover_history() {
        let actor = desk();
        let mut device = Device::intake(new_device(), &actor, at(8));
        let t = device.next_transition(DeviceStatus::Failed, actor.id, Signature::default(), at(9));
        device.apply(t);
        let records = device.transition_records();
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.device_id == device.id));
    }

    #[test]
    fn device_json_roundtrip_keeps_history() {
        let device = Device::intake(new_device(), &desk(), at(8));
        let json = serde_json::to_string(&device).unwrap();
        assert!(json.contains("\"serialNumber\""));
        let back: Device = serde_json::from_str(&json).unwrap();
        assert_eq!(back, device);
    }
}
