//! # Effect Handlers and Publishers
//!
//! An [`EffectHandler`] reacts to one [`LifecycleEvent`]. An
//! [`EffectPublisher`] hands events to a set of handlers. Publishing never
//! fails from the caller's point of view: handler errors are logged here and
//! go no further.

use std::sync::Arc;

use crate::error::EffectError;
use crate::event::LifecycleEvent;
use crate::retry::RetryPolicy;

/// One independent side effect.
pub trait EffectHandler: Send + Sync {
    /// Stable name used in log fields.
    fn name(&self) -> &'static str;

    fn handle(&self, event: &LifecycleEvent) -> Result<(), EffectError>;
}

/// Fire-and-forget sink for committed lifecycle events.
pub trait EffectPublisher: Send + Sync {
    fn publish(&self, event: LifecycleEvent);
}

/// Publisher that drops every event. For callers that want no side effects.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoEffects;

impl EffectPublisher for NoEffects {
    fn publish(&self, event: LifecycleEvent) {
        tracing::trace!(event = event.kind(), device_id = %event.device_id(), "event dropped");
    }
}

/// Runs every handler on the calling thread, in registration order.
///
/// One handler failing does not stop the others.
pub struct InlineEffects {
    handlers: Vec<Arc<dyn EffectHandler>>,
    retry: RetryPolicy,
}

impl InlineEffects {
    pub fn new(handlers: Vec<Arc<dyn EffectHandler>>) -> Self {
        Self {
            handlers,
            retry: RetryPolicy::none(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

impl EffectPublisher for InlineEffects {
    fn publish(&self, event: LifecycleEvent) {
        for handler in &self.handlers {
            run_handler(handler.as_ref(), &event, &self.retry, std::thread::sleep);
        }
    }
}

/// Run one handler with retries, logging the final failure.
///
/// Returns the number of attempts made.
pub(crate) fn run_handler(
    handler: &dyn EffectHandler,
    event: &LifecycleEvent,
    retry: &RetryPolicy,
    sleep: impl Fn(std::time::Duration),
) -> u32 {
    let mut attempt = 1;
    loop {
        match handler.handle(event) {
            Ok(()) => return attempt,
            Err(e) if e.retryable() && retry.should_retry(attempt) => {
                let delay = retry.delay_after(attempt);
                tracing::warn!(
                    handler = handler.name(),
                    event = event.kind(),
                    device_id = %event.device_id(),
                    attempt,
                    "side effect failed, retrying in {delay:?}: {e}"
                );
                sleep(delay);
                attempt += 1;
            }
            Err(e) => {
                log_failure(handler.name(), event, attempt, &e);
                return attempt;
            }
        }
    }
}

pub(crate) fn log_failure(handler: &str, event: &LifecycleEvent, attempt: u32, error: &EffectError) {
    tracing::error!(
        handler,
        event = event.kind(),
        device_id = %event.device_id(),
        attempt,
        error = %error,
        "side effect failed"
    );
}
