//! # Device Repair Status
//!
//! The closed set of lifecycle statuses a device moves through, from bench
//! assignment to customer handover.
//!
//! ## Lifecycle
//!
//! ```text
//! assigned ─▶ diagnosis-started ─▶ diagnosis-complete ─▶ in-repair ─▶ reassembled-testing
//!                     │                                     ▲                 │
//!                     └─▶ diagnosis-issues ─▶ awaiting-parts┘                 ▼
//!                                                                    repair-complete
//!                                                                            │
//!   done ◀─ awaiting-admin-review ◀─ returned-to-customer-care ◀─ process-payments
//!
//!   failed (terminal, reachable from anywhere)
//! ```
//!
//! The diagram is the typical order only. Which moves are actually allowed is
//! decided by a [`TransitionTable`]; the shop currently runs with
//! [`TransitionTable::permissive`], where every pair is permitted.

use std::collections::BTreeSet;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Number of lifecycle statuses.
pub const DEVICE_STATUS_COUNT: usize = 13;

/// The lifecycle status of a device under repair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeviceStatus {
    /// Device received and assigned to the bench. Initial status.
    Assigned,
    /// A technician has started diagnosis.
    DiagnosisStarted,
    /// Diagnosis finished, repair plan known.
    DiagnosisComplete,
    /// Diagnosis surfaced issues that block the repair plan.
    DiagnosisIssues,
    /// Waiting on spare parts.
    AwaitingParts,
    /// Repair work in progress.
    InRepair,
    /// Reassembled and under test.
    ReassembledTesting,
    /// Repair finished by the technician.
    RepairComplete,
    /// Payment being processed.
    ProcessPayments,
    /// Device handed back to the customer-care desk.
    ReturnedToCustomerCare,
    /// Awaiting final admin sign-off.
    AwaitingAdminReview,
    /// Device handed over to the customer. Terminal.
    Done,
    /// Repair abandoned. Terminal.
    Failed,
}

impl DeviceStatus {
    /// All statuses in lifecycle order.
    pub fn all() -> &'static [DeviceStatus; DEVICE_STATUS_COUNT] {
        &[
            Self::Assigned,
            Self::DiagnosisStarted,
            Self::DiagnosisComplete,
            Self::DiagnosisIssues,
            Self::AwaitingParts,
            Self::InRepair,
            Self::ReassembledTesting,
            Self::RepairComplete,
            Self::ProcessPayments,
            Self::ReturnedToCustomerCare,
            Self::AwaitingAdminReview,
            Self::Done,
            Self::Failed,
        ]
    }

    /// The wire name (kebab-case), identical to the serde representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Assigned => "assigned",
            Self::DiagnosisStarted => "diagnosis-started",
            Self::DiagnosisComplete => "diagnosis-complete",
            Self::DiagnosisIssues => "diagnosis-issues",
            Self::AwaitingParts => "awaiting-parts",
            Self::InRepair => "in-repair",
            Self::ReassembledTesting => "reassembled-testing",
            Self::RepairComplete => "repair-complete",
            Self::ProcessPayments => "process-payments",
            Self::ReturnedToCustomerCare => "returned-to-customer-care",
            Self::AwaitingAdminReview => "awaiting-admin-review",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }

    /// Whether the repair job is finished (handed over or abandoned).
    ///
    /// Finished devices are never overdue.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

impl std::fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeviceStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all()
            .iter()
            .copied()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| ValidationError::UnknownStatus(s.to_string()))
    }
}

// ─── Transition Table ────────────────────────────────────────────────

/// The set of permitted `(from, to)` status moves.
///
/// Kept as explicit data so that tightening the workflow is a configuration
/// change rather than a code change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionTable {
    allowed: BTreeSet<(DeviceStatus, DeviceStatus)>,
}

impl TransitionTable {
    /// Every status may move to every status, including itself.
    pub fn permissive() -> Self {
        let allowed = DeviceStatus::all()
            .iter()
            .flat_map(|&from| DeviceStatus::all().iter().map(move |&to| (from, to)))
            .collect();
        Self { allowed }
    }

    /// A table permitting exactly the given pairs.
    pub fn from_pairs(pairs: impl IntoIterator<Item = (DeviceStatus, DeviceStatus)>) -> Self {
        Self {
            allowed: pairs.into_iter().collect(),
        }
    }

    /// Whether `from → to` is permitted.
    pub fn permits(&self, from: DeviceStatus, to: DeviceStatus) -> bool {
        self.allowed.contains(&(from, to))
    }

    /// Statuses reachable from `from` in one step, in lifecycle order.
    pub fn targets(&self, from: DeviceStatus) -> Vec<DeviceStatus> {
        self.allowed
            .range((from, DeviceStatus::Assigned)..=(from, DeviceStatus::Failed))
            .map(|&(_, to)| to)
            .collect()
    }

    /// Number of permitted pairs.
    pub fn len(&self) -> usize {
        self.allowed.len()
    }

    /// Whether no move is permitted at all.
    pub fn is_empty(&self) -> bool {
        self.allowed.is_empty()
    }
}

impl Default for TransitionTable {
    fn default() -> Self {
        Self::permissive()
    }
}
