//! # Device Subcommand
//!
//! Intake, status transitions, assignment and remarks. Every mutating
//! command runs the side effects inline and saves the state file.

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Args, Subcommand};

use fixflow_core::{Actor, ActorRole, CustomerId, DeviceId, DeviceStatus, UserId};
use fixflow_engine::{Clock, EngineConfig};
use fixflow_gateway::DeviceRepository;
use fixflow_state::{Device, NewDevice, Signature};

use crate::state::Workspace;

/// Arguments for `fixflow device`.
#[derive(Args, Debug)]
pub struct DeviceArgs {
    #[command(subcommand)]
    pub command: DeviceCommand,
}

/// The staff member performing the operation.
#[derive(Args, Debug, Clone)]
pub struct ActorArgs {
    /// Staff user id.
    #[arg(long = "user")]
    pub user: UserId,
    /// Staff role: admin, customer-care or technician.
    #[arg(long = "role")]
    pub role: ActorRole,
}

impl ActorArgs {
    fn actor(&self) -> Actor {
        Actor::new(self.user, self.role)
    }
}

#[derive(Subcommand, Debug)]
pub enum DeviceCommand {
    /// Take a device in (status `assigned`).
    Create {
        #[arg(long)]
        customer: CustomerId,
        #[arg(long)]
        brand: String,
        #[arg(long)]
        model: String,
        #[arg(long)]
        serial: String,
        /// Reported fault.
        #[arg(long, default_value = "")]
        issue: String,
        /// Expected return date (YYYY-MM-DD).
        #[arg(long)]
        due: Option<NaiveDate>,
        /// Technician to assign right away.
        #[arg(long)]
        technician: Option<UserId>,
        #[command(flatten)]
        actor: ActorArgs,
    },

    /// Move a device to a new status.
    Transition {
        #[arg(long)]
        id: DeviceId,
        /// Target status, e.g. `in-repair`.
        #[arg(long)]
        to: DeviceStatus,
        /// Approval mark captured from the operator.
        #[arg(long, default_value = "")]
        signature: String,
        #[command(flatten)]
        actor: ActorArgs,
    },

    /// Assign a technician.
    Assign {
        #[arg(long)]
        id: DeviceId,
        #[arg(long)]
        technician: UserId,
        #[command(flatten)]
        actor: ActorArgs,
    },

    /// Attach a remark.
    Remark {
        #[arg(long)]
        id: DeviceId,
        #[arg(long)]
        text: String,
        #[command(flatten)]
        actor: ActorArgs,
    },

    /// Show one device with its history and SLA standing.
    Show {
        #[arg(long)]
        id: DeviceId,
        /// Evaluate the SLA at this instant instead of now (RFC 3339).
        #[arg(long)]
        at: Option<DateTime<Utc>>,
    },

    /// List every device.
    List,
}

/// Execute the device subcommand.
pub fn run_device(
    args: &DeviceArgs,
    state_file: &Path,
    config: &EngineConfig,
    clock: Arc<dyn Clock>,
) -> Result<u8> {
    let ws = Workspace::open(state_file, config, clock)?;
    match &args.command {
        DeviceCommand::Create {
            customer,
            brand,
            model,
            serial,
            issue,
            due,
            technician,
            actor,
        } => cmd_create(
            &ws,
            NewDevice {
                customer_id: *customer,
                brand: brand.clone(),
                model: model.clone(),
                serial_number: serial.clone(),
                issue_description: issue.clone(),
                expected_return_date: *due,
                assigned_to: *technician,
            },
            &actor.actor(),
        ),
        DeviceCommand::Transition {
            id,
            to,
            signature,
            actor,
        } => cmd_transition(&ws, *id, *to, signature, &actor.actor()),
        DeviceCommand::Assign {
            id,
            technician,
            actor,
        } => cmd_assign(&ws, *id, *technician, &actor.actor()),
        DeviceCommand::Remark { id, text, actor } => cmd_remark(&ws, *id, text, &actor.actor()),
        DeviceCommand::Show { id, at } => cmd_show(&ws, *id, *at),
        DeviceCommand::List => cmd_list(&ws),
    }
}

fn cmd_create(ws: &Workspace, new: NewDevice, actor: &Actor) -> Result<u8> {
    let device = ws.desk.intake.create(new, actor)?;
    ws.save()?;
    println!(
        "OK: received {} {} (SN: {}) as {}",
        device.brand,
        device.model,
        device.serial_number,
        device.id.as_uuid()
    );
    ws.print_outbox();
    Ok(0)
}

fn cmd_transition(
    ws: &Workspace,
    id: DeviceId,
    to: DeviceStatus,
    signature: &str,
    actor: &Actor,
) -> Result<u8> {
    let device = ws.device(id)?;
    let from = device.status;
    let updated = ws
        .desk
        .engine
        .apply_transition(&device, to, actor, Signature::new(signature))?;
    ws.save()?;
    println!("OK: device {} transitioned {from} → {}", id.as_uuid(), updated.status);
    ws.print_outbox();
    Ok(0)
}

fn cmd_assign(ws: &Workspace, id: DeviceId, technician: UserId, actor: &Actor) -> Result<u8> {
    let device = ws.device(id)?;
    ws.desk.engine.assign_technician(&device, technician, actor)?;
    ws.save()?;
    println!("OK: device {} assigned to {}", id.as_uuid(), technician.as_uuid());
    Ok(0)
}

fn cmd_remark(ws: &Workspace, id: DeviceId, text: &str, actor: &Actor) -> Result<u8> {
    let device = ws.device(id)?;
    let updated = ws.desk.engine.add_remark(&device, text, actor)?;
    ws.save()?;
    println!("OK: device {} has {} remark(s)", id.as_uuid(), updated.remarks.len());
    Ok(0)
}

fn cmd_show(ws: &Workspace, id: DeviceId, at: Option<DateTime<Utc>>) -> Result<u8> {
    let device = ws.device(id)?;
    let now = at.unwrap_or_else(|| ws.desk.clock.now());
    print_device(ws, &device, now);
    Ok(0)
}

fn cmd_list(ws: &Workspace) -> Result<u8> {
    let devices = ws.desk.adapters.devices.fetch_all()?;
    if devices.is_empty() {
        println!("No devices.");
        return Ok(0);
    }
    println!("Devices ({}):", devices.len());
    for d in &devices {
        println!(
            "  {}  {:<26} {} {} (SN: {})",
            d.id.as_uuid(),
            d.status.as_str(),
            d.brand,
            d.model,
            d.serial_number
        );
    }
    Ok(0)
}

fn print_device(ws: &Workspace, device: &Device, now: DateTime<Utc>) {
    let sla = ws.desk.sla.evaluate(now, device);
    println!("Device: {}", device.id.as_uuid());
    println!("  Status: {}", device.status);
    println!("  Device: {} {} (SN: {})", device.brand, device.model, device.serial_number);
    println!("  Customer: {}", device.customer_id.as_uuid());
    match device.assigned_to {
        Some(tech) => println!("  Assigned to: {}", tech.as_uuid()),
        None => println!("  Assigned to: -"),
    }
    if !device.issue_description.is_empty() {
        println!("  Issue: {}", device.issue_description);
    }
    match device.expected_return_date {
        Some(date) => println!("  Expected return: {date}"),
        None => println!("  Expected return: -"),
    }
    match &sla.display_time {
        Some(text) => println!("  SLA: {} ({text})", sla.status),
        None => println!("  SLA: {}", sla.status),
    }
    println!("  Created: {}", device.created_at);
    println!("  Updated: {}", device.updated_at);
    println!("  Transitions: {}", device.transitions.len());
    for (i, t) in device.transitions.iter().enumerate() {
        println!(
            "    [{i}] {} → {} at {} by {}",
            t.from_status,
            t.to_status,
            t.timestamp,
            t.performed_by.as_uuid()
        );
    }
    for r in &device.remarks {
        println!("  Remark ({}): {}", r.created_at, r.content);
    }
}
