//! HTTP route definitions.
//!
//! The OTLP/HTTP receiver and the health listener each get their own router.

mod health;
pub mod otlp;

pub use health::health_routes;
pub use otlp::{otlp_routes, OtlpError};
