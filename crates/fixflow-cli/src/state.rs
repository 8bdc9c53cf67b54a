//! # State File
//!
//! Everything the desk knows, as one pretty-printed JSON document. A missing
//! file is an empty desk.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use fixflow_core::{DeviceId, UserId};
use fixflow_engine::{Clock, EngineConfig, MemoryAdapters, RepairDesk};
use fixflow_gateway::{
    AuditEntry, Customer, CustomerNote, DeviceRepository, MemoryAuditLog, MemoryCustomerStore,
    MemoryDeviceRepository, MemoryPointsLedger, MemoryStaffDirectory, MemoryTemplateStore,
    MemoryTriggerLog, MemoryTriggerStore, NotificationTrigger, PointsTransaction, StaffMember,
    Template, TriggerLogRecord,
};
use fixflow_state::Device;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateFile {
    #[serde(default)]
    pub devices: Vec<Device>,
    #[serde(default)]
    pub customers: Vec<Customer>,
    #[serde(default)]
    pub customer_notes: Vec<CustomerNote>,
    #[serde(default)]
    pub staff: Vec<StaffMember>,
    #[serde(default)]
    pub templates: Vec<Template>,
    #[serde(default)]
    pub triggers: Vec<NotificationTrigger>,
    #[serde(default)]
    pub trigger_log: Vec<TriggerLogRecord>,
    #[serde(default)]
    pub points_balances: BTreeMap<UserId, i64>,
    #[serde(default)]
    pub points_transactions: Vec<PointsTransaction>,
    #[serde(default)]
    pub audit_log: Vec<AuditEntry>,
}

impl StateFile {
    /// Read `path`, or an empty state if it does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::info!(path = %path.display(), "state file not found, starting empty");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read state file {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("invalid state file {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
            .with_context(|| format!("failed to write state file {}", path.display()))?;
        tracing::debug!(path = %path.display(), devices = self.devices.len(), "state saved");
        Ok(())
    }

    /// Load every record into fresh in-memory adapters.
    pub fn into_adapters(self) -> MemoryAdapters {
        let customers = MemoryCustomerStore::new();
        for customer in self.customers {
            customers.insert(customer);
        }
        customers.restore_notes(self.customer_notes);

        let staff = MemoryStaffDirectory::new();
        for member in self.staff {
            staff.insert(member);
        }
        let templates = MemoryTemplateStore::new();
        for template in self.templates {
            templates.insert(template);
        }
        let triggers = MemoryTriggerStore::new();
        for trigger in self.triggers {
            triggers.insert(trigger);
        }
        let trigger_log = MemoryTriggerLog::new();
        trigger_log.restore(self.trigger_log);
        let ledger = MemoryPointsLedger::new();
        ledger.restore(self.points_balances, self.points_transactions);
        let audit_log = MemoryAuditLog::new();
        audit_log.restore(self.audit_log);

        MemoryAdapters {
            devices: Arc::new(MemoryDeviceRepository::with_devices(self.devices)),
            templates: Arc::new(templates),
            customers: Arc::new(customers),
            staff: Arc::new(staff),
            ledger: Arc::new(ledger),
            triggers: Arc::new(triggers),
            trigger_log: Arc::new(trigger_log),
            audit_log: Arc::new(audit_log),
            ..MemoryAdapters::default()
        }
    }

    /// Snapshot the adapters back into a state document.
    pub fn capture(adapters: &MemoryAdapters) -> Self {
        Self {
            devices: adapters.devices.snapshot(),
            customers: adapters.customers.all(),
            customer_notes: adapters.customers.notes(),
            staff: adapters.staff.all(),
            templates: adapters.templates.all(),
            triggers: adapters.triggers.all(),
            trigger_log: adapters.trigger_log.records(),
            points_balances: adapters.ledger.balances().into_iter().collect(),
            points_transactions: adapters.ledger.transactions(),
            audit_log: adapters.audit_log.entries(),
        }
    }
}

/// A desk loaded from a state file, saved back on request.
pub struct Workspace {
    pub desk: RepairDesk,
    path: PathBuf,
}

impl Workspace {
    pub fn open(path: &Path, config: &EngineConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        let adapters = StateFile::load(path)?.into_adapters();
        let desk = RepairDesk::inline(adapters, config, clock)?;
        Ok(Self {
            desk,
            path: path.to_path_buf(),
        })
    }

    pub fn save(&self) -> Result<()> {
        StateFile::capture(&self.desk.adapters).save(&self.path)
    }

    /// Look a device up by id.
    pub fn device(&self, id: DeviceId) -> Result<Device> {
        self.desk
            .adapters
            .devices
            .fetch(id)?
            .with_context(|| format!("device not found: {id}"))
    }

    /// Print what the side effects sent during this invocation.
    pub fn print_outbox(&self) {
        for message in self.desk.adapters.messaging.sent() {
            println!("  SMS to {}", message.phone());
        }
        for mail in self.desk.adapters.email.sent() {
            println!("  Email to {}: {}", mail.to.join(", "), mail.subject);
        }
    }
}
