//! # Device Intake
//!
//! Creates a device in status `assigned` with its bootstrap transition,
//! persists it, then publishes [`LifecycleEvent::Created`] so the intake SMS
//! and intake points run.

use std::sync::Arc;

use fixflow_core::Actor;
use fixflow_effects::{DeviceCreated, EffectPublisher, LifecycleEvent};
use fixflow_gateway::{DeviceRepository, GatewayError};
use fixflow_state::{Device, NewDevice};

use crate::clock::Clock;

#[derive(Debug, thiserror::Error)]
pub enum IntakeError {
    #[error("intake form is missing {0}")]
    MissingField(&'static str),

    #[error("device not stored: {0}")]
    Persistence(#[from] GatewayError),
}

pub struct DeviceIntake {
    devices: Arc<dyn DeviceRepository>,
    effects: Arc<dyn EffectPublisher>,
    clock: Arc<dyn Clock>,
}

impl DeviceIntake {
    pub fn new(
        devices: Arc<dyn DeviceRepository>,
        effects: Arc<dyn EffectPublisher>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            devices,
            effects,
            clock,
        }
    }

    pub fn create(&self, mut new: NewDevice, actor: &Actor) -> Result<Device, IntakeError> {
        for (field, value) in [
            ("brand", &mut new.brand),
            ("model", &mut new.model),
            ("serial number", &mut new.serial_number),
        ] {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                return Err(IntakeError::MissingField(field));
            }
            *value = trimmed.to_string();
        }

        let device = Device::intake(new, actor, self.clock.now());
        let stored = self.devices.create(device).map_err(|e| {
            tracing::error!(actor = %actor.id, error = %e, "device intake not persisted");
            IntakeError::Persistence(e)
        })?;

        tracing::info!(
            device_id = %stored.id,
            customer_id = %stored.customer_id,
            brand = %stored.brand,
            model = %stored.model,
            actor = %actor.id,
            "device taken in"
        );

        self.effects.publish(LifecycleEvent::Created(DeviceCreated {
            device: stored.clone(),
            actor: *actor,
        }));
        Ok(stored)
    }
}
