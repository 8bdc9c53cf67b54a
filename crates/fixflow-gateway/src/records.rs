//! # Collaborator Records
//!
//! Data exchanged with the ports: templates, customers, trigger rules and
//! their log rows, outbound messages, points ledger entries and audit
//! entries.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use fixflow_core::{
    ActorRole, CustomerId, DeviceId, DeviceStatus, TemplateId, TriggerId, UserId,
};
use fixflow_state::{Device, Remark, Signature, Transition};

// ─── Device updates ──────────────────────────────────────────────────

/// A partial update to a stored device.
///
/// Status only moves through `transition`, so a patch cannot desync the
/// status from the history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DevicePatch {
    pub transition: Option<Transition>,
    pub assigned_to: Option<UserId>,
    pub remark: Option<Remark>,
    pub updated_at: DateTime<Utc>,
}

impl DevicePatch {
    /// Append a transition (and move the status).
    pub fn transition(transition: Transition) -> Self {
        Self {
            updated_at: transition.timestamp,
            transition: Some(transition),
            assigned_to: None,
            remark: None,
        }
    }

    /// Set the assigned technician.
    pub fn assign(technician: UserId, at: DateTime<Utc>) -> Self {
        Self {
            transition: None,
            assigned_to: Some(technician),
            remark: None,
            updated_at: at,
        }
    }

    /// Append a remark.
    pub fn remark(remark: Remark) -> Self {
        Self {
            updated_at: remark.created_at,
            transition: None,
            assigned_to: None,
            remark: Some(remark),
        }
    }

    /// Apply to a device in place.
    pub fn apply_to(&self, device: &mut Device) {
        if let Some(transition) = &self.transition {
            device.apply(transition.clone());
        }
        if let Some(technician) = self.assigned_to {
            device.assigned_to = Some(technician);
        }
        if let Some(remark) = &self.remark {
            device.remarks.push(remark.clone());
        }
        device.updated_at = self.updated_at;
    }
}

// ─── Templates and triggers ──────────────────────────────────────────

/// An SMS template with `{variable}` placeholders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Template {
    pub id: TemplateId,
    pub name: String,
    pub content: String,
    /// Variables the template declares; all must resolve before sending.
    #[serde(default)]
    pub variables: Vec<String>,
    pub is_active: bool,
}

/// Extra constraints on a trigger. Present fields are AND-combined.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerCondition {
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub customer_tag: Option<String>,
}

impl TriggerCondition {
    /// Whether a device/customer pair satisfies every present constraint.
    pub fn matches(&self, device_brand: &str, customer_tag: Option<&str>) -> bool {
        if let Some(brand) = &self.brand {
            if brand != device_brand {
                return false;
            }
        }
        if let Some(tag) = &self.customer_tag {
            if customer_tag != Some(tag.as_str()) {
                return false;
            }
        }
        true
    }
}

/// A rule: on entering `trigger_type`, send `template_id` to the customer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationTrigger {
    pub id: TriggerId,
    pub trigger_type: DeviceStatus,
    pub template_id: TemplateId,
    #[serde(default)]
    pub condition: Option<TriggerCondition>,
}

/// Outcome recorded for one trigger firing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerResult {
    Sent,
    Failed,
    Skipped,
}

/// Persisted trigger-log row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerLogRecord {
    pub trigger_id: TriggerId,
    pub device_id: DeviceId,
    pub customer_id: CustomerId,
    pub status: DeviceStatus,
    pub template_id: TemplateId,
    pub recipient: String,
    pub result: TriggerResult,
    pub error: Option<String>,
}

// ─── Customers and staff ─────────────────────────────────────────────

/// A customer who owns devices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub id: CustomerId,
    pub name: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub customer_tag: Option<String>,
    pub loyalty_level: String,
    #[serde(default)]
    pub points: i64,
}

impl Customer {
    /// Look up a field by template-variable name (snake or camel case).
    pub fn field(&self, name: &str) -> Option<String> {
        match name {
            "name" | "customer_name" | "customerName" => Some(self.name.clone()),
            "phone" => self.phone.clone(),
            "email" => self.email.clone(),
            "customer_tag" | "customerTag" => self.customer_tag.clone(),
            "loyalty_level" | "loyaltyLevel" => Some(self.loyalty_level.clone()),
            "points" => Some(self.points.to_string()),
            _ => None,
        }
    }
}

/// A note on a customer's record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerNote {
    pub customer_id: CustomerId,
    pub content: String,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
}

/// A staff account as seen by the notification side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaffMember {
    pub id: UserId,
    pub name: String,
    pub role: ActorRole,
    #[serde(default)]
    pub email: Option<String>,
}

// ─── Messaging ───────────────────────────────────────────────────────

/// Result of a gateway send. A delivered-but-refused message is
/// `success: false` with the provider's error text, not a `GatewayError`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendOutcome {
    pub success: bool,
    pub error: Option<String>,
}

impl SendOutcome {
    pub fn sent() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
        }
    }
}

/// Template variables resolved for a send, keyed by variable name.
pub type TemplateVariables = BTreeMap<String, String>;

/// An outbound email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailMessage {
    pub to: Vec<String>,
    pub subject: String,
    pub body: String,
}

// ─── Points ──────────────────────────────────────────────────────────

/// Why a points balance changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointsTransactionKind {
    RepairCompletion,
}

/// Immutable ledger entry for a staff points change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointsTransaction {
    pub id: Uuid,
    pub user_id: UserId,
    pub points_change: i64,
    #[serde(rename = "transaction_type")]
    pub kind: PointsTransactionKind,
    pub reason: String,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
}

// ─── Audit ───────────────────────────────────────────────────────────

/// One hash-chained audit entry for a committed status change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Position in the chain, starting at 0.
    pub sequence: u64,
    pub device_id: DeviceId,
    pub actor_id: UserId,
    pub actor_role: ActorRole,
    pub from_status: DeviceStatus,
    pub to_status: DeviceStatus,
    pub signature: Signature,
    pub recorded_at: DateTime<Utc>,
    /// Hex SHA-256 of the previous entry, or 64 zeros at genesis.
    pub previous_hash: String,
    /// Hex SHA-256 over `previous_hash` and this entry's fields.
    pub entry_hash: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use fixflow_core::Actor;
    use fixflow_state::NewDevice;

    fn device() -> Device {
        Device::intake(
            NewDevice {
                customer_id: CustomerId::new(),
                brand: "Apple".into(),
                model: "iPhone 12".into(),
                serial_number: "F2L".into(),
                issue_description: String::new(),
                expected_return_date: None,
                assigned_to: None,
            },
            &Actor::new(UserId::new(), ActorRole::CustomerCare),
            Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap(),
        )
    }

    #[test]
    fn condition_is_and_combined() {
        let cond = TriggerCondition {
            brand: Some("Apple".into()),
            customer_tag: Some("vip".into()),
        };
        assert!(cond.matches("Apple", Some("vip")));
        assert!(!cond.matches("Apple", None));
        assert!(!cond.matches("Samsung", Some("vip")));
        assert!(TriggerCondition::default().matches("anything", None));
    }

    #[test]
    fn customer_field_aliases() {
        let c = Customer {
            id: CustomerId::new(),
            name: "Amina".into(),
            phone: Some("+255700000001".into()),
            email: None,
            customer_tag: Some("vip".into()),
            loyalty_level: "gold".into(),
            points: 40,
        };
        assert_eq!(c.field("customerName").as_deref(), Some("Amina"));
        assert_eq!(c.field("customerTag").as_deref(), Some("vip"));
        assert_eq!(c.field("points").as_deref(), Some("40"));
        assert_eq!(c.field("email"), None);
    }

    #[test]
    fn patch_applies_transition_and_remark() {
        let mut d = device();
        let user = UserId::new();
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap();
        let t = d.next_transition(DeviceStatus::InRepair, user, Signature::new("x"), at);
        DevicePatch::transition(t).apply_to(&mut d);
        DevicePatch::remark(Remark::new("waiting on screen", user, at)).apply_to(&mut d);
        DevicePatch::assign(user, at).apply_to(&mut d);
        assert_eq!(d.status, DeviceStatus::InRepair);
        assert_eq!(d.remarks.len(), 1);
        assert_eq!(d.assigned_to, Some(user));
        assert!(d.verify_history().is_ok());
    }

    #[test]
    fn stale_patch_still_lands() {
        let mut d = device();
        let stale = Transition::new(
            DeviceStatus::Done,
            DeviceStatus::Failed,
            UserId::new(),
            Signature::default(),
            Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap(),
        );
        DevicePatch::transition(stale).apply_to(&mut d);
        assert_eq!(d.status, DeviceStatus::Failed);
        assert_eq!(d.transitions.len(), 2);
        assert!(d.verify_history().is_ok());
    }

    #[test]
    fn points_transaction_kind_wire_name() {
        let json = serde_json::to_value(PointsTransactionKind::RepairCompletion).unwrap();
        assert_eq!(json, "repair_completion");
    }

    #[test]
    fn trigger_result_wire_names() {
        assert_eq!(serde_json::to_value(TriggerResult::Skipped).unwrap(), "skipped");
        assert_eq!(serde_json::to_value(TriggerResult::Sent).unwrap(), "sent");
    }
}
