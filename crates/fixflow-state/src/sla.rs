//! # SLA Clock
//!
//! Decides whether a device is overdue and renders the short countdown text
//! shown next to it. Evaluation is a pure function of
//! `(now, status, expected_return_date, created_at)` and the clock's static
//! configuration; nothing is cached and nothing reads the wall clock.
//!
//! ## Rules
//!
//! 1. Finished devices (`done`, `failed`) are [`SlaStatus::Completed`].
//! 2. No expected return date: [`SlaStatus::NoDueDate`].
//! 3. Expected date is today: a flat grace window (24h) from intake. Past it
//!    the device is overdue, otherwise due today. This holds whatever day the
//!    device was taken in on.
//! 4. Any other expected date: the nominal due instant is that date at the
//!    intake time-of-day. The deadline is the nominal due instant minus the
//!    lead window (4h), but never earlier than intake plus the grace window.
//!
//! Calendar days are taken in the clock's fixed UTC offset. Instants that
//! would fall outside chrono's range saturate instead of panicking.

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, Offset, Utc};
use serde::{Deserialize, Serialize};

use fixflow_core::DeviceStatus;

use crate::device::Device;

/// Default grace window after intake, in hours.
pub const DEFAULT_GRACE_HOURS: i64 = 24;

/// Default lead time subtracted from the nominal due instant, in hours.
pub const DEFAULT_LEAD_HOURS: i64 = 4;

const MS_PER_HOUR: i64 = 3_600_000;

/// Display text used when less than an hour is left.
pub const DUE_SOON: &str = "Due soon";

/// Where a device stands against its deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SlaStatus {
    Completed,
    NoDueDate,
    DueToday,
    Overdue,
    OnTime,
}

impl SlaStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::NoDueDate => "no-due-date",
            Self::DueToday => "due-today",
            Self::Overdue => "overdue",
            Self::OnTime => "on-time",
        }
    }
}

impl std::fmt::Display for SlaStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of evaluating one device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlaEvaluation {
    pub is_overdue: bool,
    pub display_time: Option<String>,
    pub status: SlaStatus,
}

impl SlaEvaluation {
    fn quiet(status: SlaStatus) -> Self {
        Self {
            is_overdue: false,
            display_time: None,
            status,
        }
    }

    fn overdue(elapsed: Duration) -> Self {
        Self {
            is_overdue: true,
            display_time: Some(format!("{} overdue", span_text(elapsed))),
            status: SlaStatus::Overdue,
        }
    }
}

/// Deadline calculator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlaClock {
    utc_offset: FixedOffset,
    grace_hours: i64,
    lead_hours: i64,
}

impl SlaClock {
    /// A clock reading calendar days in `utc_offset`.
    pub fn new(utc_offset: FixedOffset) -> Self {
        Self {
            utc_offset,
            grace_hours: DEFAULT_GRACE_HOURS,
            lead_hours: DEFAULT_LEAD_HOURS,
        }
    }

    /// A clock on UTC calendar days.
    pub fn utc() -> Self {
        Self::new(Utc.fix())
    }

    /// Override the grace and lead windows.
    pub fn with_windows(mut self, grace_hours: i64, lead_hours: i64) -> Self {
        self.grace_hours = grace_hours;
        self.lead_hours = lead_hours;
        self
    }

    /// The configured offset.
    pub fn utc_offset(&self) -> FixedOffset {
        self.utc_offset
    }

    /// Calendar date of `instant` in the clock's offset.
    pub fn local_date(&self, instant: DateTime<Utc>) -> NaiveDate {
        instant.with_timezone(&self.utc_offset).date_naive()
    }

    /// Evaluate a device at `now`.
    pub fn evaluate(&self, now: DateTime<Utc>, device: &Device) -> SlaEvaluation {
        self.evaluate_parts(
            now,
            device.status,
            device.expected_return_date,
            device.created_at,
        )
    }

    /// Evaluate from the individual inputs.
    pub fn evaluate_parts(
        &self,
        now: DateTime<Utc>,
        status: DeviceStatus,
        expected_return_date: Option<NaiveDate>,
        created_at: DateTime<Utc>,
    ) -> SlaEvaluation {
        if status.is_terminal() {
            return SlaEvaluation::quiet(SlaStatus::Completed);
        }
        let Some(expected) = expected_return_date else {
            return SlaEvaluation::quiet(SlaStatus::NoDueDate);
        };

        let grace_end = add_hours(created_at, self.grace_hours);

        if expected == self.local_date(now) {
            return if now > grace_end {
                SlaEvaluation::overdue(now - grace_end)
            } else {
                SlaEvaluation::quiet(SlaStatus::DueToday)
            };
        }

        let deadline = self.deadline(expected, created_at);
        if now > deadline {
            return SlaEvaluation::overdue(now - deadline);
        }

        let left = deadline - now;
        let display = if left < Duration::hours(1) {
            DUE_SOON.to_string()
        } else {
            format!("{} remaining", span_text(left))
        };
        SlaEvaluation {
            is_overdue: false,
            display_time: Some(display),
            status: SlaStatus::OnTime,
        }
    }

    /// Nominal due instant: `expected` at the local time-of-day of intake.
    pub fn nominal_due(&self, expected: NaiveDate, created_at: DateTime<Utc>) -> DateTime<Utc> {
        let local_time = created_at.with_timezone(&self.utc_offset).time();
        let offset = Duration::seconds(i64::from(self.utc_offset.local_minus_utc()));
        match expected.and_time(local_time).checked_sub_signed(offset) {
            Some(naive) => naive.and_utc(),
            None if offset > Duration::zero() => DateTime::<Utc>::MIN_UTC,
            None => DateTime::<Utc>::MAX_UTC,
        }
    }

    /// Whole hours from intake to the nominal due instant, rounded up.
    pub fn hours_until_due(&self, expected: NaiveDate, created_at: DateTime<Utc>) -> i64 {
        let ms = (self.nominal_due(expected, created_at) - created_at).num_milliseconds();
        ceil_div(ms, MS_PER_HOUR)
    }

    /// Hours after intake at which the device turns overdue.
    pub fn threshold_hours(&self, hours_until_due: i64) -> i64 {
        hours_until_due.saturating_sub(self.lead_hours).max(self.grace_hours)
    }

    /// Instant after which a device not due today is overdue.
    pub fn deadline(&self, expected: NaiveDate, created_at: DateTime<Utc>) -> DateTime<Utc> {
        let threshold = self.threshold_hours(self.hours_until_due(expected, created_at));
        add_hours(created_at, threshold)
    }

    /// Devices whose expected return date is today, regardless of status.
    pub fn due_today<'a>(&self, devices: &'a [Device], now: DateTime<Utc>) -> Vec<&'a Device> {
        let today = self.local_date(now);
        devices
            .iter()
            .filter(|d| d.expected_return_date == Some(today))
            .collect()
    }

    /// Devices evaluated overdue at `now`.
    pub fn overdue<'a>(&self, devices: &'a [Device], now: DateTime<Utc>) -> Vec<&'a Device> {
        devices
            .iter()
            .filter(|d| self.evaluate(now, d).is_overdue)
            .collect()
    }
}

impl Default for SlaClock {
    fn default() -> Self {
        Self::utc()
    }
}

/// `instant + hours`, clamped to the representable range.
fn add_hours(instant: DateTime<Utc>, hours: i64) -> DateTime<Utc> {
    Duration::try_hours(hours)
        .and_then(|span| instant.checked_add_signed(span))
        .unwrap_or(if hours < 0 {
            DateTime::<Utc>::MIN_UTC
        } else {
            DateTime::<Utc>::MAX_UTC
        })
}

fn ceil_div(a: i64, b: i64) -> i64 {
    let q = a.div_euclid(b);
    if a.rem_euclid(b) == 0 {
        q
    } else {
        q + 1
    }
}

/// `"{D}d {H}h"` or `"{H}h"`, whole units, truncated.
fn span_text(span: Duration) -> String {
    let hours = span.num_hours();
    let (days, hours) = (hours / 24, hours % 24);
    if days > 0 {
        format!("{days}d {hours}h")
    } else {
        format!("{hours}h")
    }
}
