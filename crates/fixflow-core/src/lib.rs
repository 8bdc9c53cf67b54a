//! # fixflow-core: Foundational Types for FixFlow
//!
//! The leaf of the crate DAG. Defines the identifiers, the repair lifecycle
//! status set, and the actor model that every other `fixflow-*` crate
//! builds on. It depends on nothing internal.
//!
//! ## Key Design Principles
//!
//! 1. **Newtype wrappers for identifiers.** `DeviceId`, `CustomerId`,
//!    `UserId`, `TemplateId`, `TriggerId`. You cannot pass a customer id
//!    where a technician id is expected.
//!
//! 2. **Closed status enum.** `DeviceStatus` has exactly thirteen variants;
//!    every `match` is exhaustive, so adding a status forces every consumer
//!    to handle it. Free-form status strings exist only at the serialization
//!    boundary.
//!
//! 3. **Explicit transition table.** Which `(from, to)` pairs are permitted is
//!    data ([`TransitionTable`]), not scattered conditionals.
//!
//! ## Crate Policy
//!
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod error;
pub mod identity;
pub mod role;
pub mod status;

pub use error::ValidationError;
pub use identity::{CustomerId, DeviceId, RemarkId, TemplateId, TransitionId, TriggerId, UserId};
pub use role::{Actor, ActorRole};
pub use status::{DeviceStatus, TransitionTable, DEVICE_STATUS_COUNT};
