//! threadscope core - shared types for the scoped value carrier
//!
//! This crate defines the pieces the carrier is built from:
//! - Error taxonomy (`CarrierError`, `ConfigError`)
//! - Provide-origin capture (`Origin`, `Frame`)
//! - Carrier configuration (`CarrierConfig`, `CaptureMode`)

pub mod config;
pub mod error;
pub mod origin;

pub use config::*;
pub use error::*;
pub use origin::*;

/// Crate version, shared by every threadscope crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
