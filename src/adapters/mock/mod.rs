//! Mock implementations for testing.
//!
//! This module provides mock implementations of the trait abstractions,
//! enabling unit testing without network access or the file system.
//!
//! # Available Mocks
//!
//! - [`MockHttpClient`] - HTTP client with scripted responses per route
//! - [`InMemoryStorage`] - In-memory slot storage

pub mod http;
pub mod storage;

pub use http::{MockHttpClient, MockResponse};
pub use storage::InMemoryStorage;
