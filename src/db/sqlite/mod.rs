//! SQLite implementation of the [`Backend`](crate::db::Backend) trait.
//!
//! Queries are assembled with sqlx's `QueryBuilder` and bound parameters;
//! rows come back as JSON objects so both backends share one row shape.

mod connection;
mod helpers;


pub use connection::SqliteBackend;
