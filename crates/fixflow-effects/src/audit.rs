//! # Audit Recorder
//!
//! Append-only, tamper-evident log of committed status changes. Every entry
//! carries the SHA-256 of its predecessor, starting from an all-zero hash,
//! so that editing or dropping an entry breaks every later link.
//!
//! The chain head advances only after the sink accepted the entry. A failed
//! append leaves the head where it was and the next entry reuses the same
//! sequence number.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use sha2::{Digest, Sha256};

use fixflow_core::{ActorRole, DeviceId, DeviceStatus, UserId};
use fixflow_gateway::{AuditEntry, AuditSink, GatewayError};
use fixflow_state::Signature;

use crate::error::EffectError;
use crate::event::LifecycleEvent;
use crate::handler::EffectHandler;

/// Hash that precedes the first entry of a chain.
pub const GENESIS_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

#[derive(Debug, Clone)]
struct ChainHead {
    sequence: u64,
    hash: String,
}

/// Writes hash-chained [`AuditEntry`] records to an [`AuditSink`].
pub struct AuditRecorder {
    sink: Arc<dyn AuditSink>,
    head: Mutex<ChainHead>,
}

impl AuditRecorder {
    /// Start a fresh chain.
    pub fn new(sink: Arc<dyn AuditSink>) -> Self {
        Self::resume(sink, None)
    }

    /// Continue an existing chain after `last`.
    pub fn resume(sink: Arc<dyn AuditSink>, last: Option<&AuditEntry>) -> Self {
        let head = match last {
            Some(entry) => ChainHead {
                sequence: entry.sequence + 1,
                hash: entry.entry_hash.clone(),
            },
            None => ChainHead {
                sequence: 0,
                hash: GENESIS_HASH.to_string(),
            },
        };
        Self {
            sink,
            head: Mutex::new(head),
        }
    }

    /// Append one status change.
    ///
    /// The head lock is held across the sink call so concurrent records
    /// cannot fork the chain.
    #[allow(clippy::too_many_arguments)]
    pub fn record(
        &self,
        device_id: DeviceId,
        actor_id: UserId,
        actor_role: ActorRole,
        from_status: DeviceStatus,
        to_status: DeviceStatus,
        signature: &Signature,
        recorded_at: DateTime<Utc>,
    ) -> Result<AuditEntry, GatewayError> {
        let mut head = self.head.lock();
        let mut entry = AuditEntry {
            sequence: head.sequence,
            device_id,
            actor_id,
            actor_role,
            from_status,
            to_status,
            signature: signature.clone(),
            recorded_at,
            previous_hash: head.hash.clone(),
            entry_hash: String::new(),
        };
        entry.entry_hash = entry_hash(&entry);

        self.sink.append(entry.clone())?;

        head.sequence += 1;
        head.hash = entry.entry_hash.clone();
        tracing::debug!(
            device_id = %device_id,
            sequence = entry.sequence,
            "audit entry appended"
        );
        Ok(entry)
    }
}

impl EffectHandler for AuditRecorder {
    fn name(&self) -> &'static str {
        "audit"
    }

    fn handle(&self, event: &LifecycleEvent) -> Result<(), EffectError> {
        let LifecycleEvent::Transitioned(committed) = event else {
            return Ok(());
        };
        self.record(
            committed.device.id,
            committed.actor.id,
            committed.actor.role,
            committed.from,
            committed.to,
            &committed.signature,
            committed.at,
        )
        .map(|_| ())
        .map_err(EffectError::Audit)
    }
}

/// `SHA-256(previous_hash ‖ sequence ‖ device ‖ actor ‖ role ‖ from ‖ to ‖
/// signature ‖ recorded_at)` as lowercase hex.
pub fn entry_hash(entry: &AuditEntry) -> String {
    let input = format!(
        "{}|{}|{}|{}|{}|{}|{}|{}|{}",
        entry.previous_hash,
        entry.sequence,
        entry.device_id.as_uuid(),
        entry.actor_id.as_uuid(),
        entry.actor_role,
        entry.from_status,
        entry.to_status,
        entry.signature,
        entry.recorded_at.to_rfc3339(),
    );
    sha256_hex(&input)
}

fn sha256_hex(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

/// Outcome of [`verify_chain`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainIntegrity {
    pub total_entries: usize,
    /// Sequence numbers of entries whose link or own hash does not check out.
    pub broken: Vec<u64>,
}

impl ChainIntegrity {
    pub fn is_valid(&self) -> bool {
        self.broken.is_empty()
    }
}

/// Check every link of a chain, oldest entry first.
pub fn verify_chain(entries: &[AuditEntry]) -> ChainIntegrity {
    let mut broken = Vec::new();
    let mut expected_prev = GENESIS_HASH;
    for entry in entries {
        if entry.previous_hash != expected_prev || entry_hash(entry) != entry.entry_hash {
            broken.push(entry.sequence);
        }
        expected_prev = entry.entry_hash.as_str();
    }
    ChainIntegrity {
        total_entries: entries.len(),
        broken,
    }
}
