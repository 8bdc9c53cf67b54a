//! # fixflow-effects: Post-Commit Side Effects
//!
//! Once a device write is committed, the engine publishes a
//! [`LifecycleEvent`]. Three independent handlers react to it:
//!
//! - [`AuditRecorder`]: hash-chained audit entry per transition.
//! - [`NotificationDispatcher`]: configured SMS triggers and the fixed
//!   handover / pickup / intake notices.
//! - [`LoyaltyPointsAwarder`]: intake points for the customer, repair bonus
//!   for the technician.
//!
//! Side effects are best-effort. Their failures are logged and never undo
//! or fail the committed write. [`InlineEffects`] runs the handlers on the
//! caller thread; [`EffectBus`] runs them on tokio workers, one queue per
//! handler.

pub mod audit;
pub mod bus;
pub mod error;
pub mod event;
pub mod handler;
pub mod loyalty;
pub mod notify;
pub mod retry;
pub mod template;

pub use audit::{verify_chain, AuditRecorder, ChainIntegrity, GENESIS_HASH};
pub use bus::EffectBus;
pub use error::{DispatchError, EffectError, LoyaltyError};
pub use event::{DeviceCreated, LifecycleEvent, TransitionCommitted};
pub use handler::{EffectHandler, EffectPublisher, InlineEffects, NoEffects};
pub use loyalty::{
    LoyaltyPointsAwarder, NoAwardReason, PointsDecision, PointsRuleTable, DEFAULT_REPAIR_BONUS,
};
pub use notify::{DispatchReport, NotificationDispatcher, NotificationPorts};
pub use retry::RetryPolicy;
