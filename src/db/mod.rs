//! Database adapter layer.
//!
//! Callers issue backend-agnostic requests through [`DatabaseAdapter`];
//! which backend answers is fixed when the [`ConnectionManager`] is built.
//!
//! # Architecture
//!
//! - `error`: normalized error taxonomy
//! - `models`: filters, options and result shapes
//! - `filter`: filter validation and rendering per backend
//! - `classify`: raw backend failures to normalized errors
//! - `backend`: the strategy trait, with `sqlite` and `rest` implementations
//! - `connection`: client lifecycle and health checks
//! - `adapter`: the public facade
//! - `probe`: table reachability by probing

mod adapter;
mod backend;
pub mod classify;
mod connection;
mod error;
pub mod filter;
mod models;
mod probe;
pub mod rest;
pub mod sqlite;
pub mod utils;


pub use adapter::DatabaseAdapter;
#[cfg(test)]
pub use backend::MockBackend;
pub use backend::{Backend, FetchedRows};
pub use classify::{RawError, classify};
pub use connection::{ConnectionManager, with_connection};
pub use error::{ConnectError, DbError, DbResult, ErrorKind};
pub use filter::{BackendPredicate, Operator, render};
pub use models::*;
pub use probe::{REQUIRED_TABLES, ReadinessReport, SchemaProbe, TableReport, TableStatus};
pub use rest::SupabaseBackend;
pub use sqlite::SqliteBackend;
