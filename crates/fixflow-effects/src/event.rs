//! Lifecycle events emitted after a successful commit.

use chrono::{DateTime, Utc};

use fixflow_core::{Actor, DeviceId, DeviceStatus};
use fixflow_state::{Device, Signature};

/// A device was taken in and persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceCreated {
    pub device: Device,
    pub actor: Actor,
}

/// A status transition was persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionCommitted {
    /// The device as stored after the commit.
    pub device: Device,
    pub from: DeviceStatus,
    pub to: DeviceStatus,
    pub actor: Actor,
    pub signature: Signature,
    pub at: DateTime<Utc>,
}

/// Something handlers may react to. Only emitted for committed writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    Created(DeviceCreated),
    Transitioned(TransitionCommitted),
}

impl LifecycleEvent {
    pub fn device(&self) -> &Device {
        match self {
            Self::Created(e) => &e.device,
            Self::Transitioned(e) => &e.device,
        }
    }

    pub fn device_id(&self) -> DeviceId {
        self.device().id
    }

    /// Short name for log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Created(_) => "device-created",
            Self::Transitioned(_) => "transition-committed",
        }
    }
}
