//! Authoritative sync backend for Prospect.
//!
//! Exposes the auth endpoints and the `/sync` exchange over axum. The store,
//! policy engine and sync service are public so integration tests can drive
//! full cycles in-process.

pub mod auth;
pub mod config;
pub mod error;
pub mod policy;
pub mod routes;
pub mod store;
pub mod sync;
