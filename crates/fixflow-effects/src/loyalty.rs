//! # Loyalty Points
//!
//! Two independent credits:
//!
//! - **Intake**: the customer earns points for bringing a device in. How
//!   many is decided by a swappable [`PointsRuleTable`], loaded from YAML or
//!   built in.
//! - **Repair bonus**: a technician who moves their assigned device to
//!   `repair-complete` earns a fixed bonus. The immutable
//!   [`PointsTransaction`] is written before the balance, so reconciliation
//!   can always rebuild balances from the transaction log.
//!
//! Neither credit is retried on failure, so a partial failure never credits
//! twice.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use fixflow_core::{Actor, DeviceStatus};
use fixflow_gateway::{
    CustomerNote, CustomerStore, PointsLedger, PointsTransaction, PointsTransactionKind,
};
use fixflow_state::Device;

use crate::error::{EffectError, LoyaltyError};
use crate::event::LifecycleEvent;
use crate::handler::EffectHandler;

/// Default bonus credited to a technician per completed repair.
pub const DEFAULT_REPAIR_BONUS: i64 = 20;

// ─── Rule table ──────────────────────────────────────────────────────

/// A device eligible for intake points. `model: None` matches every model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BonusDevice {
    pub brand: String,
    #[serde(default)]
    pub model: Option<String>,
}

impl BonusDevice {
    fn matches(&self, device: &Device) -> bool {
        self.brand.eq_ignore_ascii_case(&device.brand)
            && self
                .model
                .as_deref()
                .map_or(true, |m| m.eq_ignore_ascii_case(&device.model))
    }
}

/// Intake points rules.
///
/// ```yaml
/// enabled: true
/// base_points: 10
/// bonus_devices:            # empty: every device qualifies
///   - brand: Apple
///   - brand: Samsung
///     model: S23
/// level_percent:            # multiplier per loyalty level, in percent
///   bronze: 100
///   gold: 150
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointsRuleTable {
    pub enabled: bool,
    pub base_points: i64,
    #[serde(default)]
    pub bonus_devices: Vec<BonusDevice>,
    pub level_percent: BTreeMap<String, i64>,
}

/// Why no points were awarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NoAwardReason {
    RulesDisabled,
    NotBonusEligible,
    UnknownLoyaltyLevel,
    /// The rules computed zero points.
    ZeroPoints,
}

impl std::fmt::Display for NoAwardReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::RulesDisabled => "points system is disabled",
            Self::NotBonusEligible => "device brand/model not in bonus list",
            Self::UnknownLoyaltyLevel => "customer loyalty level has no multiplier",
            Self::ZeroPoints => "rules computed zero points",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PointsDecision {
    /// Credit this many points (always positive).
    Award(i64),
    NoAward(NoAwardReason),
}

impl PointsRuleTable {
    /// Parse a YAML rule table.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(yaml)
    }

    /// Decide the intake award for a device and the owner's loyalty level.
    pub fn points_for(&self, device: &Device, loyalty_level: &str) -> PointsDecision {
        if !self.enabled {
            return PointsDecision::NoAward(NoAwardReason::RulesDisabled);
        }
        if !self.bonus_devices.is_empty() && !self.bonus_devices.iter().any(|b| b.matches(device)) {
            return PointsDecision::NoAward(NoAwardReason::NotBonusEligible);
        }
        let Some(percent) = self.level_percent.get(&loyalty_level.trim().to_ascii_lowercase())
        else {
            return PointsDecision::NoAward(NoAwardReason::UnknownLoyaltyLevel);
        };
        match self.base_points.saturating_mul(*percent) / 100 {
            n if n > 0 => PointsDecision::Award(n),
            _ => PointsDecision::NoAward(NoAwardReason::ZeroPoints),
        }
    }
}

impl Default for PointsRuleTable {
    fn default() -> Self {
        Self {
            enabled: true,
            base_points: 10,
            bonus_devices: Vec::new(),
            level_percent: BTreeMap::from([
                ("bronze".to_string(), 100),
                ("silver".to_string(), 125),
                ("gold".to_string(), 150),
                ("platinum".to_string(), 200),
            ]),
        }
    }
}

// ─── Awarder ─────────────────────────────────────────────────────────

pub struct LoyaltyPointsAwarder {
    customers: Arc<dyn CustomerStore>,
    ledger: Arc<dyn PointsLedger>,
    rules: PointsRuleTable,
    repair_bonus: i64,
}

impl LoyaltyPointsAwarder {
    pub fn new(customers: Arc<dyn CustomerStore>, ledger: Arc<dyn PointsLedger>) -> Self {
        Self {
            customers,
            ledger,
            rules: PointsRuleTable::default(),
            repair_bonus: DEFAULT_REPAIR_BONUS,
        }
    }

    pub fn with_rules(mut self, rules: PointsRuleTable) -> Self {
        self.rules = rules;
        self
    }

    pub fn with_repair_bonus(mut self, bonus: i64) -> Self {
        self.repair_bonus = bonus;
        self
    }

    /// Credit the device owner for a new intake.
    pub fn award_intake(&self, device: &Device, actor: &Actor) -> Result<PointsDecision, LoyaltyError> {
        let customer = self
            .customers
            .get_by_id(device.customer_id)
            .map_err(LoyaltyError::Customer)?
            .ok_or(LoyaltyError::CustomerNotFound(device.customer_id))?;

        let decision = self.rules.points_for(device, &customer.loyalty_level);
        let points = match decision {
            PointsDecision::Award(n) => n,
            PointsDecision::NoAward(reason) => {
                tracing::info!(
                    device_id = %device.id,
                    customer_id = %customer.id,
                    %reason,
                    "no intake points awarded"
                );
                return Ok(decision);
            }
        };

        let total = customer.points.saturating_add(points);
        self.customers
            .update_points(customer.id, total)
            .map_err(LoyaltyError::Customer)?;

        let note = CustomerNote {
            customer_id: customer.id,
            content: format!("+{points} points for new device: {} {}", device.brand, device.model),
            created_by: actor.id,
            created_at: device.created_at,
        };
        if let Err(e) = self.customers.add_note(note) {
            tracing::warn!(customer_id = %customer.id, error = %e, "points note not recorded");
        }

        tracing::info!(customer_id = %customer.id, points, total, "intake points credited");
        Ok(decision)
    }

    /// Credit the repair bonus if `actor` is a technician completing an
    /// assigned repair. Returns the transaction when one was written.
    pub fn award_repair_bonus(
        &self,
        device: &Device,
        new_status: DeviceStatus,
        actor: &Actor,
        at: DateTime<Utc>,
    ) -> Result<Option<PointsTransaction>, LoyaltyError> {
        if new_status != DeviceStatus::RepairComplete || !actor.is_technician() {
            return Ok(None);
        }
        let Some(technician) = device.assigned_to else {
            tracing::debug!(device_id = %device.id, "repair complete without assignee, no bonus");
            return Ok(None);
        };

        let transaction = PointsTransaction {
            id: Uuid::new_v4(),
            user_id: technician,
            points_change: self.repair_bonus,
            kind: PointsTransactionKind::RepairCompletion,
            reason: format!("Repair completed for device {} {}", device.brand, device.model),
            created_by: actor.id,
            created_at: at,
        };
        self.ledger
            .append_transaction(transaction.clone())
            .map_err(LoyaltyError::Ledger)?;

        let total = self
            .ledger
            .balance(technician)
            .and_then(|current| {
                let total = current.saturating_add(self.repair_bonus);
                self.ledger.set_balance(technician, total).map(|()| total)
            })
            .map_err(|e| {
                tracing::error!(
                    device_id = %device.id,
                    technician = %technician,
                    transaction_id = %transaction.id,
                    error = %e,
                    "bonus recorded but balance not updated, needs reconciliation"
                );
                LoyaltyError::Ledger(e)
            })?;

        tracing::info!(
            device_id = %device.id,
            technician = %technician,
            bonus = self.repair_bonus,
            total,
            "repair bonus credited"
        );
        Ok(Some(transaction))
    }
}

impl EffectHandler for LoyaltyPointsAwarder {
    fn name(&self) -> &'static str {
        "loyalty"
    }

    fn handle(&self, event: &LifecycleEvent) -> Result<(), EffectError> {
        match event {
            LifecycleEvent::Created(created) => {
                self.award_intake(&created.device, &created.actor)?;
            }
            LifecycleEvent::Transitioned(committed) => {
                self.award_repair_bonus(
                    &committed.device,
                    committed.to,
                    &committed.actor,
                    committed.at,
                )?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use fixflow_core::{ActorRole, CustomerId, UserId};
    use fixflow_gateway::memory::{MemoryCustomerStore, MemoryPointsLedger};
    use fixflow_gateway::Customer;
    use fixflow_state::NewDevice;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap()
    }

    fn device(brand: &str, assigned_to: Option<UserId>) -> Device {
        Device::intake(
            NewDevice {
                customer_id: CustomerId::new(),
                brand: brand.into(),
                model: "X".into(),
                serial_number: "S".into(),
                issue_description: String::new(),
                expected_return_date: None,
                assigned_to,
            },
            &Actor::new(UserId::new(), ActorRole::CustomerCare),
            at(),
        )
    }

    fn setup(
        level: &str,
        points: i64,
        device: &Device,
    ) -> (Arc<MemoryCustomerStore>, Arc<MemoryPointsLedger>, LoyaltyPointsAwarder) {
        let customers = Arc::new(MemoryCustomerStore::new());
        customers.insert(Customer {
            id: device.customer_id,
            name: "Zawadi".into(),
            phone: None,
            email: None,
            customer_tag: None,
            loyalty_level: level.into(),
            points,
        });
        let ledger = Arc::new(MemoryPointsLedger::new());
        let awarder = LoyaltyPointsAwarder::new(customers.clone(), ledger.clone());
        (customers, ledger, awarder)
    }

    #[test]
    fn default_rules_scale_by_level() {
        let rules = PointsRuleTable::default();
        let d = device("Apple", None);
        assert_eq!(rules.points_for(&d, "bronze"), PointsDecision::Award(10));
        assert_eq!(rules.points_for(&d, "Gold"), PointsDecision::Award(15));
        assert_eq!(
            rules.points_for(&d, "diamond"),
            PointsDecision::NoAward(NoAwardReason::UnknownLoyaltyLevel)
        );
    }

    #[test]
    fn yaml_rules_restrict_devices() {
        let rules = PointsRuleTable::from_yaml_str(
            "enabled: true\nbase_points: 8\nbonus_devices:\n  - brand: apple\nlevel_percent:\n  bronze: 100\n",
        )
        .unwrap();
        assert_eq!(rules.points_for(&device("Apple", None), "bronze"), PointsDecision::Award(8));
        assert_eq!(
            rules.points_for(&device("Tecno", None), "bronze"),
            PointsDecision::NoAward(NoAwardReason::NotBonusEligible)
        );
    }

    #[test]
    fn disabled_and_zero_rules() {
        let mut rules = PointsRuleTable::default();
        rules.base_points = 0;
        assert_eq!(
            rules.points_for(&device("Apple", None), "gold"),
            PointsDecision::NoAward(NoAwardReason::ZeroPoints)
        );
        rules.enabled = false;
        assert_eq!(
            rules.points_for(&device("Apple", None), "gold"),
            PointsDecision::NoAward(NoAwardReason::RulesDisabled)
        );
    }

    #[test]
    fn extreme_values_saturate() {
        let rules = PointsRuleTable {
            base_points: i64::MAX,
            ..PointsRuleTable::default()
        };
        let d = device("Apple", None);
        assert_eq!(
            rules.points_for(&d, "platinum"),
            PointsDecision::Award(i64::MAX / 100)
        );

        let (customers, _, awarder) = setup("platinum", i64::MAX - 1, &d);
        let awarder = awarder.with_rules(rules);
        let actor = Actor::new(UserId::new(), ActorRole::CustomerCare);
        assert!(awarder.award_intake(&d, &actor).is_ok());
        assert_eq!(customers.get(d.customer_id).unwrap().points, i64::MAX);

        let tech = UserId::new();
        let assigned = device("Apple", Some(tech));
        let (_, ledger, awarder) = setup("bronze", 0, &assigned);
        ledger.restore([(tech, i64::MAX)], Vec::<PointsTransaction>::new());
        awarder
            .award_repair_bonus(
                &assigned,
                DeviceStatus::RepairComplete,
                &Actor::new(tech, ActorRole::Technician),
                at(),
            )
            .unwrap();
        assert_eq!(ledger.peek(tech), i64::MAX);
    }

    #[test]
    fn intake_credits_customer_and_writes_note() {
        let d = device("Apple", None);
        let (customers, _, awarder) = setup("silver", 5, &d);
        let actor = Actor::new(UserId::new(), ActorRole::CustomerCare);
        assert_eq!(awarder.award_intake(&d, &actor).unwrap(), PointsDecision::Award(12));
        assert_eq!(customers.get(d.customer_id).unwrap().points, 17);
        let notes = customers.notes();
        assert_eq!(notes[0].content, "+12 points for new device: Apple X");
    }

    #[test]
    fn zero_award_writes_nothing() {
        let d = device("Apple", None);
        let (customers, _, awarder) = setup("bronze", 5, &d);
        let awarder = awarder.with_rules(PointsRuleTable {
            enabled: false,
            ..PointsRuleTable::default()
        });
        let actor = Actor::new(UserId::new(), ActorRole::CustomerCare);
        assert!(matches!(awarder.award_intake(&d, &actor), Ok(PointsDecision::NoAward(_))));
        assert_eq!(customers.get(d.customer_id).unwrap().points, 5);
        assert!(customers.notes().is_empty());
    }

    #[test]
    fn repair_bonus_goes_to_assignee() {
        let tech = UserId::new();
        let d = device("Apple", Some(tech));
        let (_, ledger, awarder) = setup("bronze", 0, &d);
        let actor = Actor::new(tech, ActorRole::Technician);
        let tx = awarder
            .award_repair_bonus(&d, DeviceStatus::RepairComplete, &actor, at())
            .unwrap()
            .unwrap();
        assert_eq!(tx.points_change, DEFAULT_REPAIR_BONUS);
        assert_eq!(ledger.peek(tech), 20);
        assert_eq!(ledger.transactions().len(), 1);
    }

    #[test]
    fn no_bonus_for_non_technician_or_unassigned() {
        let tech = UserId::new();
        let d = device("Apple", Some(tech));
        let (_, ledger, awarder) = setup("bronze", 0, &d);
        let admin = Actor::new(UserId::new(), ActorRole::Admin);
        assert_eq!(
            awarder.award_repair_bonus(&d, DeviceStatus::RepairComplete, &admin, at()).unwrap(),
            None
        );
        let unassigned = device("Apple", None);
        let techie = Actor::new(tech, ActorRole::Technician);
        assert_eq!(
            awarder
                .award_repair_bonus(&unassigned, DeviceStatus::RepairComplete, &techie, at())
                .unwrap(),
            None
        );
        assert_eq!(
            awarder.award_repair_bonus(&d, DeviceStatus::Done, &techie, at()).unwrap(),
            None
        );
        assert!(ledger.transactions().is_empty());
    }

    /// Ledger whose balance side is down while the transaction log works.
    struct BalanceDown(MemoryPointsLedger);

    impl PointsLedger for BalanceDown {
        fn balance(&self, _user: UserId) -> Result<i64, fixflow_gateway::GatewayError> {
            Err(fixflow_gateway::GatewayError::unavailable("points ledger", "down"))
        }

        fn set_balance(&self, _user: UserId, _total: i64) -> Result<(), fixflow_gateway::GatewayError> {
            Err(fixflow_gateway::GatewayError::unavailable("points ledger", "down"))
        }

        fn append_transaction(&self, t: PointsTransaction) -> Result<(), fixflow_gateway::GatewayError> {
            self.0.append_transaction(t)
        }
    }

    #[test]
    fn transaction_survives_balance_failure() {
        let tech = UserId::new();
        let d = device("Apple", Some(tech));
        let (customers, _, _) = setup("bronze", 0, &d);
        let ledger = Arc::new(BalanceDown(MemoryPointsLedger::new()));
        let awarder = LoyaltyPointsAwarder::new(customers, ledger.clone()).with_repair_bonus(35);
        let actor = Actor::new(tech, ActorRole::Technician);
        let err = awarder
            .award_repair_bonus(&d, DeviceStatus::RepairComplete, &actor, at())
            .unwrap_err();
        assert!(matches!(err, LoyaltyError::Ledger(_)));
        let txs = ledger.0.transactions();
        assert_eq!(txs.len(), 1);
        assert_eq!(txs[0].points_change, 35);
    }

    #[test]
    fn nothing_written_when_transaction_log_fails() {
        let tech = UserId::new();
        let d = device("Apple", Some(tech));
        let (_, ledger, awarder) = setup("bronze", 0, &d);
        ledger.faults.set(true);
        let actor = Actor::new(tech, ActorRole::Technician);
        assert!(awarder
            .award_repair_bonus(&d, DeviceStatus::RepairComplete, &actor, at())
            .is_err());
        assert!(ledger.transactions().is_empty());
        assert_eq!(ledger.peek(tech), 0);
    }
}
