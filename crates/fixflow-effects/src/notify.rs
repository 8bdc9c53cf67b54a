//! # Notification Dispatcher
//!
//! Fires the configured SMS triggers for a status a device just entered,
//! plus the fixed notices:
//!
//! - entering the handover status (default `repair-complete`): email every
//!   customer-care staff member;
//! - entering `done`: SMS and email the customer, where contact details
//!   exist;
//! - device intake: "device received" SMS to the customer.
//!
//! Every trigger is handled in isolation. A lookup or gateway error on one
//! trigger is logged with the device and trigger ids and the remaining
//! triggers still run. Nothing here returns an error to the caller.

use std::sync::Arc;

use fixflow_core::{ActorRole, DeviceStatus};
use fixflow_gateway::{
    Customer, CustomerStore, EmailSender, GatewayError, MessagingGateway, NotificationTrigger,
    StaffDirectory, TemplateStore, TriggerLogRecord, TriggerLogSink, TriggerResult, TriggerStore,
};
use fixflow_state::Device;

use crate::error::{DispatchError, EffectError};
use crate::event::LifecycleEvent;
use crate::handler::EffectHandler;
use crate::template;

/// Counts of what one dispatch did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Triggers whose message the gateway accepted.
    pub sent: usize,
    /// Triggers the gateway refused.
    pub failed: usize,
    /// Triggers skipped for missing template variables.
    pub skipped: usize,
    /// Triggers that did not apply (inactive template, no phone, condition
    /// mismatch).
    pub not_applicable: usize,
    /// Triggers aborted by a lookup or transport error.
    pub errored: usize,
    /// Fixed notices delivered.
    pub notices_sent: usize,
    /// Fixed notices that failed.
    pub notices_failed: usize,
}

enum TriggerOutcome {
    Logged(TriggerResult),
    NotApplicable,
}

/// Collaborators the dispatcher needs.
pub struct NotificationPorts {
    pub triggers: Arc<dyn TriggerStore>,
    pub templates: Arc<dyn TemplateStore>,
    pub customers: Arc<dyn CustomerStore>,
    pub messaging: Arc<dyn MessagingGateway>,
    pub email: Arc<dyn EmailSender>,
    pub staff: Arc<dyn StaffDirectory>,
    pub trigger_log: Arc<dyn TriggerLogSink>,
}

pub struct NotificationDispatcher {
    ports: NotificationPorts,
    handover_status: DeviceStatus,
}

impl NotificationDispatcher {
    pub fn new(ports: NotificationPorts) -> Self {
        Self {
            ports,
            handover_status: DeviceStatus::RepairComplete,
        }
    }

    /// Status whose entry emails customer care.
    pub fn with_handover_status(mut self, status: DeviceStatus) -> Self {
        self.handover_status = status;
        self
    }

    /// Run triggers and fixed notices for `device` having entered `new_status`.
    pub fn dispatch(&self, device: &Device, new_status: DeviceStatus) -> DispatchReport {
        let mut report = DispatchReport::default();

        let triggers = match self.ports.triggers.triggers_for(new_status) {
            Ok(triggers) => triggers,
            Err(e) => {
                tracing::warn!(
                    device_id = %device.id,
                    status = %new_status,
                    error = %e,
                    "trigger lookup failed, treating as no triggers"
                );
                Vec::new()
            }
        };

        for trigger in &triggers {
            match self.run_trigger(device, new_status, trigger) {
                Ok(TriggerOutcome::Logged(TriggerResult::Sent)) => report.sent += 1,
                Ok(TriggerOutcome::Logged(TriggerResult::Failed)) => report.failed += 1,
                Ok(TriggerOutcome::Logged(TriggerResult::Skipped)) => report.skipped += 1,
                Ok(TriggerOutcome::NotApplicable) => report.not_applicable += 1,
                Err(e) => {
                    report.errored += 1;
                    tracing::error!(
                        device_id = %device.id,
                        trigger_id = %trigger.id,
                        error = %e,
                        "notification trigger failed"
                    );
                }
            }
        }

        if new_status == self.handover_status {
            self.tally(&mut report, self.notify_handover(device));
        }
        if new_status == DeviceStatus::Done {
            self.notify_done(device, &mut report);
        }

        tracing::info!(
            device_id = %device.id,
            status = %new_status,
            sent = report.sent,
            failed = report.failed,
            skipped = report.skipped,
            not_applicable = report.not_applicable,
            errored = report.errored,
            notices_sent = report.notices_sent,
            "notifications dispatched"
        );
        report
    }

    /// "Device received" SMS for a freshly taken-in device.
    pub fn notify_intake(&self, device: &Device) -> DispatchReport {
        let mut report = DispatchReport::default();
        let customer = match self.customer_for(device) {
            Ok(Some(customer)) => customer,
            Ok(None) => return report,
            Err(e) => {
                self.tally(&mut report, Err(e));
                return report;
            }
        };
        if let Some(phone) = customer.phone.as_deref() {
            let body = template::intake_sms(&customer, device);
            let result = self.send_notice("intake-sms", device, phone, &body);
            self.tally(&mut report, result);
        } else {
            tracing::warn!(device_id = %device.id, "no customer phone, intake SMS not sent");
        }
        report
    }

    fn run_trigger(
        &self,
        device: &Device,
        status: DeviceStatus,
        trigger: &NotificationTrigger,
    ) -> Result<TriggerOutcome, DispatchError> {
        let Some(template) = self
            .ports
            .templates
            .get_active_template(trigger.template_id)
            .map_err(|source| DispatchError::Template {
                trigger: trigger.id,
                source,
            })?
        else {
            tracing::debug!(trigger_id = %trigger.id, "template missing or inactive");
            return Ok(TriggerOutcome::NotApplicable);
        };

        let customer = self
            .ports
            .customers
            .get_by_id(device.customer_id)
            .map_err(|source| DispatchError::Customer {
                trigger: trigger.id,
                source,
            })?;
        let Some((customer, phone)) =
            customer.and_then(|c| c.phone.clone().map(|phone| (c, phone)))
        else {
            tracing::debug!(trigger_id = %trigger.id, "customer or phone missing");
            return Ok(TriggerOutcome::NotApplicable);
        };

        if let Some(condition) = &trigger.condition {
            if !condition.matches(&device.brand, customer.customer_tag.as_deref()) {
                tracing::debug!(trigger_id = %trigger.id, "trigger condition not met");
                return Ok(TriggerOutcome::NotApplicable);
            }
        }

        let mut record = TriggerLogRecord {
            trigger_id: trigger.id,
            device_id: device.id,
            customer_id: device.customer_id,
            status,
            template_id: template.id,
            recipient: phone.clone(),
            result: TriggerResult::Skipped,
            error: None,
        };

        let variables = match template::resolve_variables(&template, device, &customer) {
            Ok(variables) => variables,
            Err(missing) => {
                record.error = Some(format!(
                    "Missing variable(s) for template: {}",
                    missing.join(", ")
                ));
                tracing::info!(
                    device_id = %device.id,
                    trigger_id = %trigger.id,
                    missing = ?missing,
                    "template variables unresolved, send skipped"
                );
                self.write_log(record);
                return Ok(TriggerOutcome::Logged(TriggerResult::Skipped));
            }
        };

        let outcome = self
            .ports
            .messaging
            .send(&phone, template.id, &variables)
            .map_err(|source| DispatchError::Gateway {
                trigger: trigger.id,
                source,
            })?;
        record.result = if outcome.success {
            TriggerResult::Sent
        } else {
            TriggerResult::Failed
        };
        record.error = outcome.error;
        let result = record.result;
        self.write_log(record);
        Ok(TriggerOutcome::Logged(result))
    }

    fn write_log(&self, record: TriggerLogRecord) {
        let (device_id, trigger_id) = (record.device_id, record.trigger_id);
        if let Err(e) = self.ports.trigger_log.append(record) {
            tracing::warn!(
                device_id = %device_id,
                trigger_id = %trigger_id,
                error = %e,
                "trigger log write failed"
            );
        }
    }

    fn notify_handover(&self, device: &Device) -> Result<(), DispatchError> {
        let notice = "handover-email";
        let staff = self
            .ports
            .staff
            .members_with_role(ActorRole::CustomerCare)
            .map_err(|source| DispatchError::Notice { notice, source })?;
        let recipients: Vec<String> = staff.into_iter().filter_map(|m| m.email).collect();
        if recipients.is_empty() {
            tracing::warn!(device_id = %device.id, "no customer-care email on file, handover mail not sent");
            return Ok(());
        }
        self.ports
            .email
            .send_email(template::handover_email(recipients, device))
            .map_err(|source| DispatchError::Notice { notice, source })
    }

    fn notify_done(&self, device: &Device, report: &mut DispatchReport) {
        let customer = match self.customer_for(device) {
            Ok(Some(customer)) => customer,
            Ok(None) => return,
            Err(e) => return self.tally(report, Err(e)),
        };
        if let Some(phone) = customer.phone.as_deref() {
            let body = template::ready_sms(&customer, device);
            let result = self.send_notice("ready-sms", device, phone, &body);
            self.tally(report, result);
        }
        if let Some(email) = customer.email.as_deref() {
            let result = self
                .ports
                .email
                .send_email(template::pickup_email(email, &customer, device))
                .map_err(|source| DispatchError::Notice {
                    notice: "pickup-email",
                    source,
                });
            self.tally(report, result);
        }
    }

    fn customer_for(&self, device: &Device) -> Result<Option<Customer>, DispatchError> {
        let customer = self
            .ports
            .customers
            .get_by_id(device.customer_id)
            .map_err(|source| DispatchError::Notice {
                notice: "customer-lookup",
                source,
            })?;
        if customer.is_none() {
            tracing::warn!(
                device_id = %device.id,
                customer_id = %device.customer_id,
                "customer not found, notice not sent"
            );
        }
        Ok(customer)
    }

    fn send_notice(
        &self,
        notice: &'static str,
        device: &Device,
        phone: &str,
        body: &str,
    ) -> Result<(), DispatchError> {
        let outcome = self
            .ports
            .messaging
            .send_text(phone, body)
            .map_err(|source| DispatchError::Notice { notice, source })?;
        if outcome.success {
            return Ok(());
        }
        tracing::debug!(device_id = %device.id, notice, "notice refused");
        Err(DispatchError::Notice {
            notice,
            source: GatewayError::Rejected {
                service: "messaging gateway",
                reason: outcome.error.unwrap_or_default(),
            },
        })
    }

    fn tally(&self, report: &mut DispatchReport, result: Result<(), DispatchError>) {
        match result {
            Ok(()) => report.notices_sent += 1,
            Err(e) => {
                report.notices_failed += 1;
                tracing::error!(error = %e, "fixed notice failed");
            }
        }
    }
}

impl EffectHandler for NotificationDispatcher {
    fn name(&self) -> &'static str {
        "notifications"
    }

    fn handle(&self, event: &LifecycleEvent) -> Result<(), EffectError> {
        match event {
            LifecycleEvent::Created(created) => {
                self.notify_intake(&created.device);
            }
            LifecycleEvent::Transitioned(committed) => {
                self.dispatch(&committed.device, committed.to);
            }
        }
        Ok(())
    }
}
