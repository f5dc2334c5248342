//! Beacon Shared Library
//!
//! This crate contains the types and building blocks shared by the Beacon
//! collector and CLI.
//!
//! # Modules
//!
//! - [`models`] - The signal-agnostic telemetry record model
//! - [`otlp`] - OTLP protobuf decoding and encoding
//! - [`config`] - Pipeline configuration model and loader
//! - [`export`] - Export sinks and retry policy
//! - [`client`] - Client-facing configuration contract
//!
//! # Example
//!
//! ```
//! use shared::models::{Attributes, Resource};
//!
//! let local = Resource::new(Attributes::new().with("host.name", "node-1"));
//! let caller = Resource::new(Attributes::new().with("service.name", "checkout"));
//!
//! let merged = caller.merged_with(&local);
//! assert_eq!(merged.service_name(), Some("checkout"));
//! assert!(merged.attributes().contains_key("host.name"));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod client;
pub mod config;
pub mod export;
pub mod models;
pub mod otlp;

/// Re-export common dependencies for convenience.
pub use chrono;
pub use serde;
pub use serde_json;
pub use validator;
