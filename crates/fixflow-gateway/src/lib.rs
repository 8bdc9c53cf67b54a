//! # fixflow-gateway: Collaborator Ports
//!
//! FixFlow does not own a database or a messaging transport. Everything it
//! reads or writes outside its own process goes through the traits in
//! [`ports`]:
//!
//! | Port | Used by |
//! |---|---|
//! | [`DeviceRepository`] | engine, intake, CLI |
//! | [`TemplateStore`], [`TriggerStore`], [`TriggerLogSink`] | notification dispatch |
//! | [`CustomerStore`] | notification dispatch, intake loyalty points |
//! | [`MessagingGateway`], [`EmailSender`], [`StaffDirectory`] | notification dispatch |
//! | [`PointsLedger`] | technician repair bonus |
//! | [`AuditSink`] | audit recorder |
//!
//! [`memory`] provides in-memory adapters with failure injection.

pub mod error;
pub mod memory;
pub mod ports;
pub mod records;

pub use error::GatewayError;
pub use memory::{
    FailSwitch, MemoryAuditLog, MemoryCustomerStore, MemoryDeviceRepository, MemoryPointsLedger,
    MemoryStaffDirectory, MemoryTemplateStore, MemoryTriggerLog, MemoryTriggerStore,
    RecordingEmailSender, RecordingMessagingGateway, SentMessage,
};
pub use ports::{
    AuditSink, CustomerStore, DeviceRepository, EmailSender, MessagingGateway, PointsLedger,
    StaffDirectory, TemplateStore, TriggerLogSink, TriggerStore,
};
pub use records::{
    AuditEntry, Customer, CustomerNote, DevicePatch, EmailMessage, NotificationTrigger,
    PointsTransaction, PointsTransactionKind, SendOutcome, StaffMember, Template,
    TemplateVariables, TriggerCondition, TriggerLogRecord, TriggerResult,
};
