//! # fixflow-cli: FixFlow Front Desk
//!
//! A clap-based CLI over a single JSON state file. Each invocation loads the
//! file into in-memory adapters, runs one command through the engine with
//! inline side effects, and writes the file back.
//!
//! ## Subcommands
//!
//! - `device`: create, transition, assign, remark, show, list
//! - `sla`: SLA evaluation for one device or all of them
//! - `overdue`: devices past their deadline
//! - `due-today`: devices whose expected return date is today
//! - `audit`: verify the audit hash chain
//!
//! Customers, staff, templates and notification triggers are read from the
//! state file; edit the file to change them.

pub mod audit;
pub mod device;
pub mod report;
pub mod state;
