//! Shared fixtures: a fully wired in-memory shop with one customer, one
//! customer-care mailbox and one technician.

#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};

use fixflow_core::{Actor, ActorRole, CustomerId, UserId};
use fixflow_engine::{EngineConfig, ManualClock, MemoryAdapters, RepairDesk};
use fixflow_gateway::{Customer, StaffMember};
use fixflow_state::{Device, NewDevice};

pub struct Shop {
    pub desk: RepairDesk,
    pub clock: Arc<ManualClock>,
    pub customer: Customer,
    pub front: Actor,
    pub tech: Actor,
}

pub fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn customer() -> Customer {
    Customer {
        id: CustomerId::new(),
        name: "Amina".into(),
        phone: Some("+255712345678".into()),
        email: Some("amina@example.com".into()),
        customer_tag: Some("vip".into()),
        loyalty_level: "silver".into(),
        points: 0,
    }
}

pub fn adapters_for(customer: &Customer) -> MemoryAdapters {
    let adapters = MemoryAdapters::new();
    adapters.customers.insert(customer.clone());
    adapters.staff.insert(StaffMember {
        id: UserId::new(),
        name: "Front Desk".into(),
        role: ActorRole::CustomerCare,
        email: Some("care@shop.example".into()),
    });
    adapters
}

/// Inline shop, clock at 2024-01-01T08:00Z.
pub fn shop() -> Shop {
    shop_with(EngineConfig::default())
}

pub fn shop_with(config: EngineConfig) -> Shop {
    let customer = customer();
    let adapters = adapters_for(&customer);
    let clock = Arc::new(ManualClock::new(at(2024, 1, 1, 8)));
    let desk = RepairDesk::inline(adapters, &config, clock.clone()).unwrap();
    Shop {
        desk,
        clock,
        customer,
        front: Actor::new(UserId::new(), ActorRole::CustomerCare),
        tech: Actor::new(UserId::new(), ActorRole::Technician),
    }
}

impl Shop {
    pub fn intake(&self, serial: &str, due: Option<NaiveDate>) -> Device {
        self.desk
            .intake
            .create(
                NewDevice {
                    customer_id: self.customer.id,
                    brand: "Samsung".into(),
                    model: "Galaxy A14".into(),
                    serial_number: serial.into(),
                    issue_description: "cracked screen".into(),
                    expected_return_date: due,
                    assigned_to: Some(self.tech.id),
                },
                &self.front,
            )
            .unwrap()
    }
}
