//! Persistence layer for the fraud investigation dashboard.
//!
//! [`db`] holds the backend-agnostic adapter, [`setup`] the migration and
//! fixture orchestration built on it, and [`cli`] the `fwdb` command line.

pub mod cli;
pub mod config;
pub mod db;
pub mod setup;
