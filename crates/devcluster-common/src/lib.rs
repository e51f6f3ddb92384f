//! # devcluster common
//!
//! Shared types, constants, and utilities used by the devcluster supervisor.
//!
//! ## Modules
//! - `types` - Node descriptors, port scheme, administrator credentials
//! - `credential` - Deterministic PBKDF2 credential derivation
//! - `error` - Common error types
//! - `constants` - Ports, timings, and protocol constants

pub mod constants;
pub mod credential;
pub mod error;
pub mod types;

pub use error::DevClusterError;
pub use types::*;
