//! Core types and service wiring for the smogmap air quality aggregator.

/// Fallback wrapper that turns a failed provider call into a default value.
pub mod fallback;
/// Great-circle distance and bounding box helpers.
pub mod geo;
/// Shared HTTP helpers used by provider adapters.
pub mod http;
/// Normalized sensor readings and provider identifiers.
pub mod model;
/// Registry for plugging provider adapters into the service.
pub mod plugin;
/// Traits describing the provider and error reporting interfaces.
pub mod ports;
/// Error reporters bridging into the tracing pipeline.
pub mod report;
/// High-level aggregation service used by the HTTP surface.
pub mod service;

pub use fallback::*;
pub use geo::*;
pub use model::*;
pub use plugin::*;
pub use ports::*;
pub use report::*;
pub use service::*;
