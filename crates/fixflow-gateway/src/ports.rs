//! # Collaborator Ports
//!
//! Every external system FixFlow talks to is reached through one of these
//! traits. Production deployments implement them against the shop's
//! database and messaging provider; tests and the CLI use the adapters in
//! [`crate::memory`].
//!
//! All ports are synchronous and `Send + Sync` so they can be shared behind
//! an `Arc` and called from blocking worker threads. The traits are
//! object-safe to allow runtime adapter selection.

use fixflow_core::{ActorRole, CustomerId, DeviceId, DeviceStatus, TemplateId, UserId};
use fixflow_state::Device;

use crate::error::GatewayError;
use crate::records::{
    AuditEntry, Customer, CustomerNote, DevicePatch, EmailMessage, NotificationTrigger,
    PointsTransaction, SendOutcome, StaffMember, Template, TemplateVariables, TriggerLogRecord,
};

/// Source of truth for devices.
pub trait DeviceRepository: Send + Sync {
    /// Every stored device.
    fn fetch_all(&self) -> Result<Vec<Device>, GatewayError>;

    /// One device, `None` if absent.
    fn fetch(&self, id: DeviceId) -> Result<Option<Device>, GatewayError>;

    /// Store a newly taken-in device.
    fn create(&self, device: Device) -> Result<Device, GatewayError>;

    /// Apply a partial update and return the stored result.
    fn update(&self, id: DeviceId, patch: DevicePatch) -> Result<Device, GatewayError>;

    /// Remove a device.
    fn delete(&self, id: DeviceId) -> Result<(), GatewayError>;
}

/// SMS template lookup.
pub trait TemplateStore: Send + Sync {
    /// The template if it exists and is active.
    fn get_active_template(&self, id: TemplateId) -> Result<Option<Template>, GatewayError>;
}

/// Customer records.
pub trait CustomerStore: Send + Sync {
    fn get_by_id(&self, id: CustomerId) -> Result<Option<Customer>, GatewayError>;

    /// Overwrite the customer's loyalty points total.
    fn update_points(&self, id: CustomerId, new_total: i64) -> Result<(), GatewayError>;

    fn add_note(&self, note: CustomerNote) -> Result<(), GatewayError>;
}

/// SMS provider.
pub trait MessagingGateway: Send + Sync {
    /// Send a stored template with resolved variables.
    fn send(
        &self,
        phone: &str,
        template_id: TemplateId,
        variables: &TemplateVariables,
    ) -> Result<SendOutcome, GatewayError>;

    /// Send a fixed, already-rendered text.
    fn send_text(&self, phone: &str, body: &str) -> Result<SendOutcome, GatewayError>;
}

/// Outbound email.
pub trait EmailSender: Send + Sync {
    fn send_email(&self, message: EmailMessage) -> Result<(), GatewayError>;
}

/// Staff lookup by role.
pub trait StaffDirectory: Send + Sync {
    fn members_with_role(&self, role: ActorRole) -> Result<Vec<StaffMember>, GatewayError>;
}

/// Staff points balances and their immutable transaction log.
pub trait PointsLedger: Send + Sync {
    fn balance(&self, user: UserId) -> Result<i64, GatewayError>;

    fn set_balance(&self, user: UserId, total: i64) -> Result<(), GatewayError>;

    fn append_transaction(&self, transaction: PointsTransaction) -> Result<(), GatewayError>;
}

/// Configured notification triggers.
pub trait TriggerStore: Send + Sync {
    /// Triggers that fire on entering `status`.
    fn triggers_for(&self, status: DeviceStatus) -> Result<Vec<NotificationTrigger>, GatewayError>;
}

/// Trigger-log persistence.
pub trait TriggerLogSink: Send + Sync {
    fn append(&self, record: TriggerLogRecord) -> Result<(), GatewayError>;
}

/// Audit-log persistence.
pub trait AuditSink: Send + Sync {
    fn append(&self, entry: AuditEntry) -> Result<(), GatewayError>;
}
