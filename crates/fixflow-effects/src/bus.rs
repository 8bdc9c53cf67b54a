//! # Effect Bus
//!
//! Tokio worker pool for side effects. Each handler gets its own unbounded
//! queue and its own worker task, so a slow or failing handler never delays
//! another one. Within one handler events are processed in publish order;
//! there is no ordering across handlers.
//!
//! Handlers and the ports behind them are synchronous, so every call runs on
//! the blocking pool via `spawn_blocking`.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::event::LifecycleEvent;
use crate::handler::{log_failure, EffectHandler, EffectPublisher};
use crate::retry::RetryPolicy;

type Queue = (&'static str, mpsc::UnboundedSender<LifecycleEvent>);

/// Asynchronous [`EffectPublisher`].
pub struct EffectBus {
    queues: Mutex<Option<Vec<Queue>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl EffectBus {
    /// Spawn one worker per handler. Must be called from within a tokio
    /// runtime.
    pub fn start(handlers: Vec<Arc<dyn EffectHandler>>, retry: RetryPolicy) -> Self {
        let mut queues = Vec::with_capacity(handlers.len());
        let mut workers = Vec::with_capacity(handlers.len());
        for handler in handlers {
            let (tx, rx) = mpsc::unbounded_channel();
            queues.push((handler.name(), tx));
            workers.push(tokio::spawn(run_worker(handler, rx, retry)));
        }
        tracing::info!(workers = workers.len(), "effect bus started");
        Self {
            queues: Mutex::new(Some(queues)),
            workers: Mutex::new(workers),
        }
    }

    /// Stop accepting events and wait until every queued event was handled.
    pub async fn shutdown(&self) {
        drop(self.queues.lock().take());
        let workers = std::mem::take(&mut *self.workers.lock());
        for worker in workers {
            if let Err(e) = worker.await {
                tracing::error!("effect worker ended abnormally: {e}");
            }
        }
        tracing::info!("effect bus drained");
    }
}

impl EffectPublisher for EffectBus {
    fn publish(&self, event: LifecycleEvent) {
        let guard = self.queues.lock();
        let Some(queues) = guard.as_ref() else {
            tracing::warn!(
                event = event.kind(),
                device_id = %event.device_id(),
                "effect bus shut down, event dropped"
            );
            return;
        };
        for (name, tx) in queues {
            if tx.send(event.clone()).is_err() {
                tracing::warn!(handler = *name, event = event.kind(), "effect worker gone, event dropped");
            }
        }
    }
}

async fn run_worker(
    handler: Arc<dyn EffectHandler>,
    mut rx: mpsc::UnboundedReceiver<LifecycleEvent>,
    retry: RetryPolicy,
) {
    while let Some(event) = rx.recv().await {
        let event = Arc::new(event);
        let mut attempt = 1;
        loop {
            let h = Arc::clone(&handler);
            let ev = Arc::clone(&event);
            match tokio::task::spawn_blocking(move || h.handle(&ev)).await {
                Ok(Ok(())) => break,
                Ok(Err(e)) if e.retryable() && retry.should_retry(attempt) => {
                    let delay = retry.delay_after(attempt);
                    tracing::warn!(
                        handler = handler.name(),
                        event = event.kind(),
                        device_id = %event.device_id(),
                        attempt,
                        "side effect failed, retrying in {delay:?}: {e}"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Ok(Err(e)) => {
                    log_failure(handler.name(), &event, attempt, &e);
                    break;
                }
                Err(join) => {
                    tracing::error!(
                        handler = handler.name(),
                        device_id = %event.device_id(),
                        "side effect panicked: {join}"
                    );
                    break;
                }
            }
        }
    }
    tracing::debug!(handler = handler.name(), "effect worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use crate::handler::tests::{created_event, Flaky};

    fn quick_retry() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            backoff: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn shutdown_drains_every_queue() {
        let a = Arc::new(Flaky {
            failures: 0,
            calls: AtomicU32::new(0),
        });
        let b = Arc::new(Flaky {
            failures: 0,
            calls: AtomicU32::new(0),
        });
        let bus = EffectBus::start(
            vec![a.clone() as Arc<dyn EffectHandler>, b.clone()],
            quick_retry(),
        );
        for _ in 0..5 {
            bus.publish(created_event());
        }
        bus.shutdown().await;
        assert_eq!(a.calls.load(Ordering::SeqCst), 5);
        assert_eq!(b.calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn transient_failures_are_retried() {
        let flaky = Arc::new(Flaky {
            failures: 2,
            calls: AtomicU32::new(0),
        });
        let bus = EffectBus::start(vec![flaky.clone() as Arc<dyn EffectHandler>], quick_retry());
        bus.publish(created_event());
        bus.shutdown().await;
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn failing_handler_does_not_starve_others() {
        let broken = Arc::new(Flaky {
            failures: u32::MAX,
            calls: AtomicU32::new(0),
        });
        let healthy = Arc::new(Flaky {
            failures: 0,
            calls: AtomicU32::new(0),
        });
        let bus = EffectBus::start(
            vec![broken.clone() as Arc<dyn EffectHandler>, healthy.clone()],
            quick_retry(),
        );
        bus.publish(created_event());
        bus.publish(created_event());
        bus.shutdown().await;
        assert_eq!(broken.calls.load(Ordering::SeqCst), 6);
        assert_eq!(healthy.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn publish_after_shutdown_is_dropped() {
        let handler = Arc::new(Flaky {
            failures: 0,
            calls: AtomicU32::new(0),
        });
        let bus = EffectBus::start(vec![handler.clone() as Arc<dyn EffectHandler>], quick_retry());
        bus.shutdown().await;
        bus.publish(created_event());
        assert_eq!(handler.calls.load(Ordering::SeqCst), 0);
    }
}
