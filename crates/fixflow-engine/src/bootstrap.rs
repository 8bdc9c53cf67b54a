//! # Wiring
//!
//! Builds a working repair desk from in-memory adapters: the engine, the
//! intake service, the SLA clock and the three side-effect handlers. The CLI
//! and the integration tests both start here.
//!
//! The publisher is chosen by the caller. [`RepairDesk::inline`] runs
//! handlers on the caller thread; for the tokio bus, start an
//! [`EffectBus`](fixflow_effects::EffectBus) over
//! [`MemoryAdapters::handlers`] and pass it to [`RepairDesk::new`].

use std::sync::Arc;

use fixflow_effects::{
    AuditRecorder, EffectHandler, EffectPublisher, InlineEffects, LoyaltyPointsAwarder,
    NotificationDispatcher, NotificationPorts,
};
use fixflow_gateway::{
    MemoryAuditLog, MemoryCustomerStore, MemoryDeviceRepository, MemoryPointsLedger,
    MemoryStaffDirectory, MemoryTemplateStore, MemoryTriggerLog, MemoryTriggerStore,
    RecordingEmailSender, RecordingMessagingGateway,
};
use fixflow_state::SlaClock;

use crate::clock::Clock;
use crate::config::{ConfigError, EngineConfig};
use crate::engine::StatusTransitionEngine;
use crate::intake::DeviceIntake;

/// One in-memory adapter per port. Cloning shares the underlying stores.
#[derive(Debug, Clone, Default)]
pub struct MemoryAdapters {
    pub devices: Arc<MemoryDeviceRepository>,
    pub templates: Arc<MemoryTemplateStore>,
    pub customers: Arc<MemoryCustomerStore>,
    pub messaging: Arc<RecordingMessagingGateway>,
    pub email: Arc<RecordingEmailSender>,
    pub staff: Arc<MemoryStaffDirectory>,
    pub ledger: Arc<MemoryPointsLedger>,
    pub triggers: Arc<MemoryTriggerStore>,
    pub trigger_log: Arc<MemoryTriggerLog>,
    pub audit_log: Arc<MemoryAuditLog>,
}

impl MemoryAdapters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Audit, notification and loyalty handlers over these adapters.
    ///
    /// The audit chain resumes from the last entry already in the log.
    pub fn handlers(&self, config: &EngineConfig) -> Vec<Arc<dyn EffectHandler>> {
        let audit = AuditRecorder::resume(self.audit_log.clone(), self.audit_log.last().as_ref());
        let notify = NotificationDispatcher::new(NotificationPorts {
            triggers: self.triggers.clone(),
            templates: self.templates.clone(),
            customers: self.customers.clone(),
            messaging: self.messaging.clone(),
            email: self.email.clone(),
            staff: self.staff.clone(),
            trigger_log: self.trigger_log.clone(),
        })
        .with_handover_status(config.handover_status);
        let loyalty = LoyaltyPointsAwarder::new(self.customers.clone(), self.ledger.clone())
            .with_rules(config.points_rules.clone())
            .with_repair_bonus(config.repair_bonus);

        vec![
            Arc::new(audit) as Arc<dyn EffectHandler>,
            Arc::new(notify),
            Arc::new(loyalty),
        ]
    }
}

/// Services sharing one set of adapters and one publisher.
pub struct RepairDesk {
    pub adapters: MemoryAdapters,
    pub engine: StatusTransitionEngine,
    pub intake: DeviceIntake,
    pub sla: SlaClock,
    pub clock: Arc<dyn Clock>,
}

impl RepairDesk {
    pub fn new(
        adapters: MemoryAdapters,
        config: &EngineConfig,
        clock: Arc<dyn Clock>,
        effects: Arc<dyn EffectPublisher>,
    ) -> Result<Self, ConfigError> {
        let sla = config.sla_clock()?;
        let engine =
            StatusTransitionEngine::new(adapters.devices.clone(), effects.clone(), clock.clone());
        let intake = DeviceIntake::new(adapters.devices.clone(), effects, clock.clone());
        tracing::debug!(
            utc_offset_minutes = config.utc_offset_minutes,
            handover_status = %config.handover_status,
            repair_bonus = config.repair_bonus,
            "repair desk assembled"
        );
        Ok(Self {
            adapters,
            engine,
            intake,
            sla,
            clock,
        })
    }

    /// Desk whose side effects run synchronously inside each call.
    pub fn inline(
        adapters: MemoryAdapters,
        config: &EngineConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ConfigError> {
        let effects =
            InlineEffects::new(adapters.handlers(config)).with_retry(config.effect_retry);
        Self::new(adapters, config, clock, Arc::new(effects))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    use fixflow_core::{Actor, ActorRole, CustomerId, DeviceStatus, UserId};
    use fixflow_effects::{verify_chain, LifecycleEvent, TransitionCommitted};
    use fixflow_gateway::Customer;
    use fixflow_state::{Device, NewDevice, Signature};

    use crate::clock::ManualClock;

    #[test]
    fn inline_desk_runs_every_handler() {
        let adapters = MemoryAdapters::new();
        let customer = Customer {
            id: CustomerId::new(),
            name: "Neema".into(),
            phone: Some("+255700000001".into()),
            email: None,
            customer_tag: None,
            loyalty_level: "bronze".into(),
            points: 0,
        };
        adapters.customers.insert(customer.clone());
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap(),
        ));
        let desk = RepairDesk::inline(adapters, &EngineConfig::default(), clock).unwrap();

        let desk_actor = Actor::new(UserId::new(), ActorRole::CustomerCare);
        let device = desk
            .intake
            .create(
                NewDevice {
                    customer_id: customer.id,
                    brand: "Nokia".into(),
                    model: "G21".into(),
                    serial_number: "NK-9".into(),
                    issue_description: String::new(),
                    expected_return_date: None,
                    assigned_to: None,
                },
                &desk_actor,
            )
            .unwrap();
        desk.engine
            .apply_transition(
                &device,
                DeviceStatus::DiagnosisStarted,
                &desk_actor,
                Signature::new("ok"),
            )
            .unwrap();

        // intake points, intake SMS, one audit entry
        assert_eq!(desk.adapters.customers.get(customer.id).unwrap().points, 10);
        assert_eq!(desk.adapters.messaging.sent().len(), 1);
        let entries = desk.adapters.audit_log.entries();
        assert_eq!(entries.len(), 1);
        assert!(verify_chain(&entries).is_valid());
    }

    #[test]
    fn handlers_resume_an_existing_audit_chain() {
        let adapters = MemoryAdapters::new();
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
        let tech = Actor::new(UserId::new(), ActorRole::Technician);
        let device = Device::intake(
            NewDevice {
                customer_id: CustomerId::new(),
                brand: "Itel".into(),
                model: "A70".into(),
                serial_number: "IT-70".into(),
                issue_description: String::new(),
                expected_return_date: None,
                assigned_to: None,
            },
            &tech,
            at,
        );
        AuditRecorder::new(adapters.audit_log.clone())
            .record(
                device.id,
                tech.id,
                tech.role,
                DeviceStatus::Assigned,
                DeviceStatus::InRepair,
                &Signature::default(),
                at,
            )
            .unwrap();

        let handlers = adapters.handlers(&EngineConfig::default());
        assert_eq!(handlers.len(), 3);
        assert_eq!(handlers[0].name(), "audit");
        handlers[0]
            .handle(&LifecycleEvent::Transitioned(TransitionCommitted {
                device,
                from: DeviceStatus::InRepair,
                to: DeviceStatus::RepairComplete,
                actor: tech,
                signature: Signature::default(),
                at,
            }))
            .unwrap();

        let entries = adapters.audit_log.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].sequence, entries[0].sequence + 1);
        assert!(verify_chain(&entries).is_valid());
    }
}
