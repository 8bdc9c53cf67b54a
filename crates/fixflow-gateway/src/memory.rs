//! # In-Memory Adapters
//!
//! `parking_lot`-locked implementations of every port. Used by the CLI, the
//! bootstrap wiring and the test suites. Locks are never held across a call
//! into another adapter.
//!
//! Each adapter that can fail carries a [`FailSwitch`] so tests can make it
//! return [`GatewayError::Unavailable`] on demand.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use parking_lot::RwLock;

use fixflow_core::{ActorRole, CustomerId, DeviceId, DeviceStatus, TemplateId, UserId};
use fixflow_state::Device;

use crate::error::GatewayError;
use crate::ports::{
    AuditSink, CustomerStore, DeviceRepository, EmailSender, MessagingGateway, PointsLedger,
    StaffDirectory, TemplateStore, TriggerLogSink, TriggerStore,
};
use crate::records::{
    AuditEntry, Customer, CustomerNote, DevicePatch, EmailMessage, NotificationTrigger,
    PointsTransaction, SendOutcome, StaffMember, Template, TemplateVariables, TriggerLogRecord,
};

// ─── Failure injection ───────────────────────────────────────────────

/// Makes an adapter fail, either persistently or for the next N calls.
#[derive(Debug, Default)]
pub struct FailSwitch {
    always: AtomicBool,
    next: AtomicU32,
}

impl FailSwitch {
    /// Fail every call while `on`.
    pub fn set(&self, on: bool) {
        self.always.store(on, Ordering::SeqCst);
    }

    /// Fail only the next `n` calls.
    pub fn fail_next(&self, n: u32) {
        self.next.store(n, Ordering::SeqCst);
    }

    fn check(&self, service: &'static str) -> Result<(), GatewayError> {
        if self.always.load(Ordering::SeqCst) {
            return Err(GatewayError::unavailable(service, "injected failure"));
        }
        let took = self
            .next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if took {
            return Err(GatewayError::unavailable(service, "injected transient failure"));
        }
        Ok(())
    }
}

// ─── Devices ─────────────────────────────────────────────────────────

/// Device repository backed by a map.
#[derive(Debug, Default)]
pub struct MemoryDeviceRepository {
    devices: RwLock<HashMap<DeviceId, Device>>,
    pub faults: FailSwitch,
}

impl MemoryDeviceRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the repository, e.g. from a state file.
    pub fn with_devices(devices: impl IntoIterator<Item = Device>) -> Self {
        let repo = Self::new();
        repo.devices
            .write()
            .extend(devices.into_iter().map(|d| (d.id, d)));
        repo
    }

    /// All devices ordered by intake time.
    pub fn snapshot(&self) -> Vec<Device> {
        let mut all: Vec<Device> = self.devices.read().values().cloned().collect();
        all.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        all
    }
}

impl DeviceRepository for MemoryDeviceRepository {
    fn fetch_all(&self) -> Result<Vec<Device>, GatewayError> {
        self.faults.check("device repository")?;
        Ok(self.snapshot())
    }

    fn fetch(&self, id: DeviceId) -> Result<Option<Device>, GatewayError> {
        self.faults.check("device repository")?;
        Ok(self.devices.read().get(&id).cloned())
    }

    fn create(&self, device: Device) -> Result<Device, GatewayError> {
        self.faults.check("device repository")?;
        let mut guard = self.devices.write();
        if guard.values().any(|d| d.serial_number == device.serial_number) {
            return Err(GatewayError::Rejected {
                service: "device repository",
                reason: format!("serial number {} already registered", device.serial_number),
            });
        }
        guard.insert(device.id, device.clone());
        Ok(device)
    }

    fn update(&self, id: DeviceId, patch: DevicePatch) -> Result<Device, GatewayError> {
        self.faults.check("device repository")?;
        let mut guard = self.devices.write();
        let stored = guard
            .get_mut(&id)
            .ok_or_else(|| GatewayError::not_found("device", id))?;
        if let Some(t) = patch.transition.as_ref().filter(|t| t.from_status != stored.status) {
            tracing::warn!(
                device_id = %id,
                stored = %stored.status,
                from = %t.from_status,
                to = %t.to_status,
                "transition written from a stale copy, last write wins"
            );
        }
        patch.apply_to(stored);
        Ok(stored.clone())
    }

    fn delete(&self, id: DeviceId) -> Result<(), GatewayError> {
        self.faults.check("device repository")?;
        self.devices
            .write()
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| GatewayError::not_found("device", id))
    }
}

// ─── Templates ───────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct MemoryTemplateStore {
    templates: RwLock<HashMap<TemplateId, Template>>,
    pub faults: FailSwitch,
}

impl MemoryTemplateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, template: Template) {
        self.templates.write().insert(template.id, template);
    }

    pub fn all(&self) -> Vec<Template> {
        let mut all: Vec<Template> = self.templates.read().values().cloned().collect();
        all.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        all
    }
}

impl TemplateStore for MemoryTemplateStore {
    fn get_active_template(&self, id: TemplateId) -> Result<Option<Template>, GatewayError> {
        self.faults.check("template store")?;
        Ok(self
            .templates
            .read()
            .get(&id)
            .filter(|t| t.is_active)
            .cloned())
    }
}

// ─── Customers ───────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct MemoryCustomerStore {
    customers: RwLock<HashMap<CustomerId, Customer>>,
    notes: RwLock<Vec<CustomerNote>>,
    pub faults: FailSwitch,
}

impl MemoryCustomerStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, customer: Customer) {
        self.customers.write().insert(customer.id, customer);
    }

    /// Current copy of a customer, bypassing failure injection.
    pub fn get(&self, id: CustomerId) -> Option<Customer> {
        self.customers.read().get(&id).cloned()
    }

    pub fn notes(&self) -> Vec<CustomerNote> {
        self.notes.read().clone()
    }

    pub fn all(&self) -> Vec<Customer> {
        let mut all: Vec<Customer> = self.customers.read().values().cloned().collect();
        all.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        all
    }

    /// Reload notes persisted elsewhere.
    pub fn restore_notes(&self, notes: impl IntoIterator<Item = CustomerNote>) {
        self.notes.write().extend(notes);
    }
}

impl CustomerStore for MemoryCustomerStore {
    fn get_by_id(&self, id: CustomerId) -> Result<Option<Customer>, GatewayError> {
        self.faults.check("customer store")?;
        Ok(self.get(id))
    }

    fn update_points(&self, id: CustomerId, new_total: i64) -> Result<(), GatewayError> {
        self.faults.check("customer store")?;
        let mut guard = self.customers.write();
        let customer = guard
            .get_mut(&id)
            .ok_or_else(|| GatewayError::not_found("customer", id))?;
        customer.points = new_total;
        Ok(())
    }

    fn add_note(&self, note: CustomerNote) -> Result<(), GatewayError> {
        self.faults.check("customer store")?;
        self.notes.write().push(note);
        Ok(())
    }
}

// ─── Messaging ───────────────────────────────────────────────────────

/// A message accepted by [`RecordingMessagingGateway`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SentMessage {
    Template {
        phone: String,
        template_id: TemplateId,
        variables: TemplateVariables,
    },
    Text {
        phone: String,
        body: String,
    },
}

impl SentMessage {
    pub fn phone(&self) -> &str {
        match self {
            Self::Template { phone, .. } | Self::Text { phone, .. } => phone,
        }
    }
}

/// SMS gateway that records what it was asked to send.
///
/// [`RecordingMessagingGateway::refuse_with`] makes sends return an
/// unsuccessful [`SendOutcome`] (provider refusal) while `faults` makes them
/// error outright.
#[derive(Debug, Default)]
pub struct RecordingMessagingGateway {
    sent: RwLock<Vec<SentMessage>>,
    refusal: RwLock<Option<String>>,
    pub faults: FailSwitch,
}

impl RecordingMessagingGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn refuse_with(&self, reason: Option<&str>) {
        *self.refusal.write() = reason.map(str::to_string);
    }

    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.read().clone()
    }

    fn deliver(&self, message: SentMessage) -> Result<SendOutcome, GatewayError> {
        self.faults.check("messaging gateway")?;
        if let Some(reason) = self.refusal.read().clone() {
            tracing::debug!(phone = message.phone(), %reason, "message refused");
            return Ok(SendOutcome::failed(reason));
        }
        tracing::debug!(phone = message.phone(), "message accepted");
        self.sent.write().push(message);
        Ok(SendOutcome::sent())
    }
}

impl MessagingGateway for RecordingMessagingGateway {
    fn send(
        &self,
        phone: &str,
        template_id: TemplateId,
        variables: &TemplateVariables,
    ) -> Result<SendOutcome, GatewayError> {
        self.deliver(SentMessage::Template {
            phone: phone.to_string(),
            template_id,
            variables: variables.clone(),
        })
    }

    fn send_text(&self, phone: &str, body: &str) -> Result<SendOutcome, GatewayError> {
        self.deliver(SentMessage::Text {
            phone: phone.to_string(),
            body: body.to_string(),
        })
    }
}

#[derive(Debug, Default)]
pub struct RecordingEmailSender {
    sent: RwLock<Vec<EmailMessage>>,
    pub faults: FailSwitch,
}

impl RecordingEmailSender {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<EmailMessage> {
        self.sent.read().clone()
    }
}

impl EmailSender for RecordingEmailSender {
    fn send_email(&self, message: EmailMessage) -> Result<(), GatewayError> {
        self.faults.check("email sender")?;
        tracing::debug!(to = ?message.to, subject = %message.subject, "email accepted");
        self.sent.write().push(message);
        Ok(())
    }
}

// ─── Staff and points ────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct MemoryStaffDirectory {
    members: RwLock<Vec<StaffMember>>,
}

impl MemoryStaffDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, member: StaffMember) {
        self.members.write().push(member);
    }

    pub fn all(&self) -> Vec<StaffMember> {
        self.members.read().clone()
    }
}

impl StaffDirectory for MemoryStaffDirectory {
    fn members_with_role(&self, role: ActorRole) -> Result<Vec<StaffMember>, GatewayError> {
        Ok(self
            .members
            .read()
            .iter()
            .filter(|m| m.role == role)
            .cloned()
            .collect())
    }
}

/// Points balances keyed by staff id. Unknown users have a zero balance.
#[derive(Debug, Default)]
pub struct MemoryPointsLedger {
    balances: RwLock<HashMap<UserId, i64>>,
    transactions: RwLock<Vec<PointsTransaction>>,
    pub faults: FailSwitch,
}

impl MemoryPointsLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn transactions(&self) -> Vec<PointsTransaction> {
        self.transactions.read().clone()
    }

    pub fn balances(&self) -> HashMap<UserId, i64> {
        self.balances.read().clone()
    }

    /// Reload balances and the transaction log persisted elsewhere.
    pub fn restore(
        &self,
        balances: impl IntoIterator<Item = (UserId, i64)>,
        transactions: impl IntoIterator<Item = PointsTransaction>,
    ) {
        self.balances.write().extend(balances);
        self.transactions.write().extend(transactions);
    }

    /// Balance without failure injection.
    pub fn peek(&self, user: UserId) -> i64 {
        self.balances.read().get(&user).copied().unwrap_or(0)
    }
}

impl PointsLedger for MemoryPointsLedger {
    fn balance(&self, user: UserId) -> Result<i64, GatewayError> {
        self.faults.check("points ledger")?;
        Ok(self.peek(user))
    }

    fn set_balance(&self, user: UserId, total: i64) -> Result<(), GatewayError> {
        self.faults.check("points ledger")?;
        self.balances.write().insert(user, total);
        Ok(())
    }

    fn append_transaction(&self, transaction: PointsTransaction) -> Result<(), GatewayError> {
        self.faults.check("points ledger")?;
        self.transactions.write().push(transaction);
        Ok(())
    }
}

// ─── Triggers and logs ───────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct MemoryTriggerStore {
    triggers: RwLock<Vec<NotificationTrigger>>,
    pub faults: FailSwitch,
}

impl MemoryTriggerStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, trigger: NotificationTrigger) {
        self.triggers.write().push(trigger);
    }

    pub fn all(&self) -> Vec<NotificationTrigger> {
        self.triggers.read().clone()
    }
}

impl TriggerStore for MemoryTriggerStore {
    fn triggers_for(&self, status: DeviceStatus) -> Result<Vec<NotificationTrigger>, GatewayError> {
        self.faults.check("trigger store")?;
        Ok(self
            .triggers
            .read()
            .iter()
            .filter(|t| t.trigger_type == status)
            .cloned()
            .collect())
    }
}

#[derive(Debug, Default)]
pub struct MemoryTriggerLog {
    records: RwLock<Vec<TriggerLogRecord>>,
    pub faults: FailSwitch,
}

impl MemoryTriggerLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<TriggerLogRecord> {
        self.records.read().clone()
    }

    pub fn restore(&self, records: impl IntoIterator<Item = TriggerLogRecord>) {
        self.records.write().extend(records);
    }
}

impl TriggerLogSink for MemoryTriggerLog {
    fn append(&self, record: TriggerLogRecord) -> Result<(), GatewayError> {
        self.faults.check("trigger log")?;
        self.records.write().push(record);
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryAuditLog {
    entries: RwLock<Vec<AuditEntry>>,
    pub faults: FailSwitch,
}

impl MemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries.read().clone()
    }

    pub fn last(&self) -> Option<AuditEntry> {
        self.entries.read().last().cloned()
    }

    pub fn restore(&self, entries: impl IntoIterator<Item = AuditEntry>) {
        self.entries.write().extend(entries);
    }
}

impl AuditSink for MemoryAuditLog {
    fn append(&self, entry: AuditEntry) -> Result<(), GatewayError> {
        self.faults.check("audit sink")?;
        self.entries.write().push(entry);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use fixflow_core::Actor;
    use fixflow_state::{NewDevice, Signature};

    fn device(serial: &str) -> Device {
        Device::intake(
            NewDevice {
                customer_id: CustomerId::new(),
                brand: "Tecno".into(),
                model: "Spark 10".into(),
                serial_number: serial.into(),
                issue_description: "no power".into(),
                expected_return_date: None,
                assigned_to: None,
            },
            &Actor::new(UserId::new(), ActorRole::CustomerCare),
            Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap(),
        )
    }

    #[test]
    fn fail_switch_next_n() {
        let switch = FailSwitch::default();
        switch.fail_next(2);
        assert!(switch.check("x").is_err());
        assert!(switch.check("x").is_err());
        assert!(switch.check("x").is_ok());
        switch.set(true);
        assert!(switch.check("x").is_err());
        switch.set(false);
        assert!(switch.check("x").is_ok());
    }

    #[test]
    fn repository_update_applies_patch() {
        let repo = MemoryDeviceRepository::new();
        let d = repo.create(device("SN-1")).unwrap();
        let t = d.next_transition(
            DeviceStatus::DiagnosisStarted,
            UserId::new(),
            Signature::new("a"),
            Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap(),
        );
        let updated = repo.update(d.id, DevicePatch::transition(t)).unwrap();
        assert_eq!(updated.status, DeviceStatus::DiagnosisStarted);
        assert_eq!(repo.fetch(d.id).unwrap().unwrap(), updated);
    }

    #[test]
    fn repository_update_from_stale_copy_overwrites() {
        let repo = MemoryDeviceRepository::new();
        let stale = repo.create(device("SN-3")).unwrap();
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap();
        let user = UserId::new();

        let first = stale.next_transition(DeviceStatus::InRepair, user, Signature::new("a"), at);
        repo.update(stale.id, DevicePatch::transition(first)).unwrap();
        let second = stale.next_transition(DeviceStatus::Done, user, Signature::new("b"), at);
        let stored = repo.update(stale.id, DevicePatch::transition(second)).unwrap();

        assert_eq!(stored.status, DeviceStatus::Done);
        assert_eq!(stored.transitions.len(), 3);
        assert_eq!(stored.transitions[2].from_status, DeviceStatus::Assigned);
        assert_eq!(repo.fetch(stale.id).unwrap().unwrap(), stored);
    }

    #[test]
    fn repository_rejects_duplicate_serial_and_missing_device() {
        let repo = MemoryDeviceRepository::new();
        repo.create(device("SN-1")).unwrap();
        assert!(matches!(
            repo.create(device("SN-1")),
            Err(GatewayError::Rejected { .. })
        ));
        let missing = DeviceId::new();
        assert!(matches!(
            repo.delete(missing),
            Err(GatewayError::NotFound { .. })
        ));
    }

    #[test]
    fn repository_failure_injection() {
        let repo = MemoryDeviceRepository::new();
        let d = repo.create(device("SN-2")).unwrap();
        repo.faults.set(true);
        let patch = DevicePatch::assign(UserId::new(), d.updated_at);
        assert!(repo.update(d.id, patch).unwrap_err().is_transient());
        repo.faults.set(false);
        assert_eq!(repo.fetch(d.id).unwrap().unwrap().assigned_to, None);
    }

    #[test]
    fn inactive_templates_are_hidden() {
        let store = MemoryTemplateStore::new();
        let id = TemplateId::new();
        store.insert(Template {
            id,
            name: "ready".into(),
            content: "Hi {name}".into(),
            variables: vec!["name".into()],
            is_active: false,
        });
        assert_eq!(store.get_active_template(id).unwrap(), None);
    }

    #[test]
    fn gateway_records_and_refuses() {
        let gw = RecordingMessagingGateway::new();
        assert!(gw.send_text("+255", "hello").unwrap().success);
        gw.refuse_with(Some("insufficient credit"));
        let outcome = gw.send_text("+255", "again").unwrap();
        assert!(!outcome.success);
        assert_eq!(outcome.error.as_deref(), Some("insufficient credit"));
        assert_eq!(gw.sent().len(), 1);
    }

    #[test]
    fn ledger_defaults_to_zero() {
        let ledger = MemoryPointsLedger::new();
        let user = UserId::new();
        assert_eq!(ledger.balance(user).unwrap(), 0);
        ledger.set_balance(user, 20).unwrap();
        assert_eq!(ledger.peek(user), 20);
    }

    #[test]
    fn trigger_store_filters_by_status() {
        let store = MemoryTriggerStore::new();
        store.insert(NotificationTrigger {
            id: fixflow_core::TriggerId::new(),
            trigger_type: DeviceStatus::Done,
            template_id: TemplateId::new(),
            condition: None,
        });
        assert_eq!(store.triggers_for(DeviceStatus::Done).unwrap().len(), 1);
        assert!(store.triggers_for(DeviceStatus::InRepair).unwrap().is_empty());
    }
}
