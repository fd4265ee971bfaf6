//! Trait abstractions for dependency injection and testability.
//!
//! # Traits
//!
//! - [`HttpClient`] - HTTP transport (one `send` for every method)
//! - [`Storage`] - Durable named slots for credentials and local collections

pub mod http;
pub mod storage;

pub use http::{Headers, HttpClient, HttpError, Method, Request, Response};
pub use storage::Storage;
