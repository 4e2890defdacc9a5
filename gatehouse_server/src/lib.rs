//! HTTP account and session server.
//!
//! Thin binary crate around [`gatehouse`]: wires configuration, storage,
//! mail, and identity verification into the [`api`] router.

pub mod api;
pub mod config;
pub mod logging;
