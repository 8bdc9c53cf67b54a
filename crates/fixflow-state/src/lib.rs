//! # fixflow-state: Device Repair Lifecycle
//!
//! The records a repair job is made of and the rules that govern them:
//!
//! - [`Device`], [`Remark`] and the intake form [`NewDevice`].
//! - [`Transition`]: append-only history entries, with the persisted
//!   [`TransitionRecord`] row shape.
//! - [`SlaClock`]: the overdue calculator and the due-today / overdue
//!   filters.
//!
//! Nothing here performs I/O. Persistence and side effects live in
//! `fixflow-gateway`, `fixflow-effects` and `fixflow-engine`.

pub mod device;
pub mod sla;
pub mod transition;

pub use device::{Device, HistoryError, NewDevice, Remark, INTAKE_SIGNATURE};
pub use sla::{SlaClock, SlaEvaluation, SlaStatus, DUE_SOON};
pub use transition::{Signature, Transition, TransitionRecord};
