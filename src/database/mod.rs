//! # Database Access
//!
//! Connection management for the Postgres-protocol stores the jobs run
//! against. Query execution itself lives with the models and jobs; this
//! module owns how a pool comes to exist.

pub mod connection;

pub use connection::{ConnectionSettings, DatabaseConnection, DbPlatform};
