//! sessionkit - authentication session state and cached resource access
//! for clients of a JSON resource gateway.
//!
//! This library exposes modules for use by front ends and integration tests.

pub mod adapters;
pub mod auth;
pub mod bus;
pub mod cache;
pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod logging;
pub mod retry;
pub mod traits;
