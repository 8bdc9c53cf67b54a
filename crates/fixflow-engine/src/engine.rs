//! # Status Transition Engine
//!
//! The only path by which a device changes status. A transition is checked
//! against the [`TransitionTable`], persisted through the
//! [`DeviceRepository`], and only then announced to the side-effect
//! publisher. If persistence fails the transition did not happen and nothing
//! is published.
//!
//! Authorization is the caller's job: the engine assumes the actor has
//! already passed the capability check.

use std::sync::Arc;

use fixflow_core::{Actor, DeviceStatus, TransitionTable, UserId};
use fixflow_effects::{EffectPublisher, LifecycleEvent, TransitionCommitted};
use fixflow_gateway::{DevicePatch, DeviceRepository, GatewayError};
use fixflow_state::{Device, Remark, Signature};

use crate::clock::Clock;

#[derive(Debug, thiserror::Error)]
pub enum TransitionError {
    /// The transition table forbids this move.
    #[error("transition {from} -> {to} is not permitted")]
    NotPermitted { from: DeviceStatus, to: DeviceStatus },

    /// The write did not commit.
    #[error("device update failed: {0}")]
    Persistence(#[from] GatewayError),

    #[error("remark content is empty")]
    EmptyRemark,
}

pub struct StatusTransitionEngine {
    devices: Arc<dyn DeviceRepository>,
    effects: Arc<dyn EffectPublisher>,
    clock: Arc<dyn Clock>,
    table: TransitionTable,
}

impl StatusTransitionEngine {
    /// Engine with the permissive transition table.
    pub fn new(
        devices: Arc<dyn DeviceRepository>,
        effects: Arc<dyn EffectPublisher>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            devices,
            effects,
            clock,
            table: TransitionTable::permissive(),
        }
    }

    pub fn with_table(mut self, table: TransitionTable) -> Self {
        self.table = table;
        self
    }

    pub fn table(&self) -> &TransitionTable {
        &self.table
    }

    /// Move `device` to `new_status` on behalf of `actor`.
    ///
    /// Returns the device as persisted. Side-effect outcomes never change
    /// the result.
    pub fn apply_transition(
        &self,
        device: &Device,
        new_status: DeviceStatus,
        actor: &Actor,
        signature: Signature,
    ) -> Result<Device, TransitionError> {
        if !self.table.permits(device.status, new_status) {
            tracing::warn!(
                device_id = %device.id,
                from = %device.status,
                to = %new_status,
                "transition rejected by table"
            );
            return Err(TransitionError::NotPermitted {
                from: device.status,
                to: new_status,
            });
        }

        let now = self.clock.now();
        let transition = device.next_transition(new_status, actor.id, signature.clone(), now);
        let from = transition.from_status;

        let persisted = self
            .devices
            .update(device.id, DevicePatch::transition(transition))
            .map_err(|e| {
                tracing::error!(
                    device_id = %device.id,
                    from = %from,
                    to = %new_status,
                    error = %e,
                    "transition not persisted"
                );
                TransitionError::Persistence(e)
            })?;

        tracing::info!(
            device_id = %persisted.id,
            from = %from,
            to = %new_status,
            actor = %actor.id,
            role = %actor.role,
            "status transition committed"
        );

        self.effects
            .publish(LifecycleEvent::Transitioned(TransitionCommitted {
                device: persisted.clone(),
                from,
                to: new_status,
                actor: *actor,
                signature,
                at: now,
            }));

        Ok(persisted)
    }

    /// Assign a technician. No status change, no side effects.
    pub fn assign_technician(
        &self,
        device: &Device,
        technician: UserId,
        actor: &Actor,
    ) -> Result<Device, TransitionError> {
        let persisted = self
            .devices
            .update(device.id, DevicePatch::assign(technician, self.clock.now()))?;
        tracing::info!(
            device_id = %device.id,
            technician = %technician,
            actor = %actor.id,
            "technician assigned"
        );
        Ok(persisted)
    }

    /// Append a remark written by `actor`.
    pub fn add_remark(
        &self,
        device: &Device,
        content: &str,
        actor: &Actor,
    ) -> Result<Device, TransitionError> {
        let content = content.trim();
        if content.is_empty() {
            return Err(TransitionError::EmptyRemark);
        }
        let remark = Remark::new(content, actor.id, self.clock.now());
        let persisted = self.devices.update(device.id, DevicePatch::remark(remark))?;
        tracing::debug!(device_id = %device.id, actor = %actor.id, "remark added");
        Ok(persisted)
    }
}
