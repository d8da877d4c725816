//! Remote implementation of the [`Backend`](crate::db::Backend) trait for
//! Supabase-style PostgREST endpoints.

mod client;
mod connection;

#[cfg(test)]
pub(crate) mod fake_server;

#[cfg(test)]
mod connection_test;

pub use client::RestClient;
pub use connection::SupabaseBackend;
