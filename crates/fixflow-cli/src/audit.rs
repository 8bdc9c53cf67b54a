//! # Audit Subcommand
//!
//! Checks the hash chain of the audit log stored in the state file.

use std::path::Path;

use anyhow::Result;
use clap::{Args, Subcommand};

use fixflow_effects::verify_chain;

use crate::state::StateFile;

#[derive(Args, Debug)]
pub struct AuditArgs {
    #[command(subcommand)]
    pub command: AuditCommand,
}

#[derive(Subcommand, Debug)]
pub enum AuditCommand {
    /// Recompute every entry hash and check the links.
    Verify,
}

/// Returns 1 when the chain is broken.
pub fn run_audit(args: &AuditArgs, state_file: &Path) -> Result<u8> {
    match args.command {
        AuditCommand::Verify => cmd_verify(state_file),
    }
}

fn cmd_verify(state_file: &Path) -> Result<u8> {
    let entries = StateFile::load(state_file)?.audit_log;
    let integrity = verify_chain(&entries);
    if integrity.is_valid() {
        println!("OK: {} audit entries, chain intact", integrity.total_entries);
        return Ok(0);
    }
    println!(
        "FAIL: {} of {} audit entries broken: {:?}",
        integrity.broken.len(),
        integrity.total_entries,
        integrity.broken
    );
    Ok(1)
}
