//! Core domain + application logic for the pushqq relay.
//!
//! This crate is intentionally framework-agnostic. The QQ protocol client and
//! the HTTP surface live behind ports (traits) implemented in adapter crates.

pub mod auth;
pub mod config;
pub mod dump;
pub mod errors;
pub mod gateway;
pub mod logging;
pub mod store;

pub use errors::{Error, Result};
