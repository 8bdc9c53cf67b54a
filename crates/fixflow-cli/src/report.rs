//! # SLA Reports
//!
//! Read-only views over the state file: per-device SLA standing, the overdue
//! list and the due-today list. `--at` pins the evaluation instant.

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use clap::Args;

use fixflow_core::DeviceId;
use fixflow_engine::{Clock, EngineConfig};
use fixflow_gateway::DeviceRepository;
use fixflow_state::Device;

use crate::state::Workspace;

/// Arguments for `fixflow sla`.
#[derive(Args, Debug)]
pub struct SlaArgs {
    /// Only this device.
    #[arg(long)]
    pub id: Option<DeviceId>,
    /// Evaluate at this instant instead of now (RFC 3339).
    #[arg(long)]
    pub at: Option<DateTime<Utc>>,
}

/// Arguments for `fixflow overdue` and `fixflow due-today`.
#[derive(Args, Debug)]
pub struct ListArgs {
    /// Evaluate at this instant instead of now (RFC 3339).
    #[arg(long)]
    pub at: Option<DateTime<Utc>>,
}

pub fn run_sla(
    args: &SlaArgs,
    state_file: &Path,
    config: &EngineConfig,
    clock: Arc<dyn Clock>,
) -> Result<u8> {
    let ws = Workspace::open(state_file, config, clock)?;
    let now = args.at.unwrap_or_else(|| ws.desk.clock.now());
    let devices = match args.id {
        Some(id) => vec![ws.device(id)?],
        None => ws.desk.adapters.devices.fetch_all()?,
    };
    if devices.is_empty() {
        println!("No devices.");
        return Ok(0);
    }
    for device in &devices {
        let sla = ws.desk.sla.evaluate(now, device);
        println!(
            "  {}  {:<12} {}",
            device.id.as_uuid(),
            sla.status.as_str(),
            sla.display_time.as_deref().unwrap_or("-")
        );
    }
    Ok(0)
}

/// Lists overdue devices. Exits 2 when any are found so scripts can alert.
pub fn run_overdue(
    args: &ListArgs,
    state_file: &Path,
    config: &EngineConfig,
    clock: Arc<dyn Clock>,
) -> Result<u8> {
    let ws = Workspace::open(state_file, config, clock)?;
    let now = args.at.unwrap_or_else(|| ws.desk.clock.now());
    let devices = ws.desk.adapters.devices.fetch_all()?;
    let overdue = ws.desk.sla.overdue(&devices, now);
    if overdue.is_empty() {
        println!("No overdue devices.");
        return Ok(0);
    }
    println!("Overdue ({}):", overdue.len());
    for device in overdue {
        let sla = ws.desk.sla.evaluate(now, device);
        print_line(device, sla.display_time.as_deref().unwrap_or("-"));
    }
    Ok(2)
}

pub fn run_due_today(
    args: &ListArgs,
    state_file: &Path,
    config: &EngineConfig,
    clock: Arc<dyn Clock>,
) -> Result<u8> {
    let ws = Workspace::open(state_file, config, clock)?;
    let now = args.at.unwrap_or_else(|| ws.desk.clock.now());
    let devices = ws.desk.adapters.devices.fetch_all()?;
    let due = ws.desk.sla.due_today(&devices, now);
    if due.is_empty() {
        println!("Nothing due today.");
        return Ok(0);
    }
    println!("Due today ({}):", due.len());
    for device in due {
        print_line(device, device.status.as_str());
    }
    Ok(0)
}

fn print_line(device: &Device, detail: &str) {
    println!(
        "  {}  {} {} (SN: {})  {detail}",
        device.id.as_uuid(),
        device.brand,
        device.model,
        device.serial_number
    );
}
