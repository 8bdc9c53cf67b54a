//! # fixflow-engine: Repair Desk Services
//!
//! The write path for devices. [`StatusTransitionEngine`] moves a device
//! through its lifecycle and [`DeviceIntake`] creates new ones. Both persist
//! first and publish a lifecycle event second, so a failed write never
//! triggers a notification, points credit or audit entry.
//!
//! [`EngineConfig`] reads the deployment settings from the environment and
//! [`RepairDesk`] wires the services to in-memory adapters.

pub mod bootstrap;
pub mod clock;
pub mod config;
pub mod engine;
pub mod intake;

pub use bootstrap::{MemoryAdapters, RepairDesk};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{load_points_rules, ConfigError, EngineConfig};
pub use engine::{StatusTransitionEngine, TransitionError};
pub use intake::{DeviceIntake, IntakeError};
