//! Core types and service wiring for the henteplan waste schedule lookup.

/// In-memory expiring caches.
pub mod cache;
/// Layered configuration and HTTP client factory.
pub mod config;
/// Serde and date helpers for loosely typed upstream payloads.
pub mod decode;
/// Postal code and city based provider detection.
pub mod detection;
/// Fraction label normalization and category colors.
pub mod fractions;
/// National address register search.
pub mod geonorge;
/// Shared HTTP request helpers.
pub mod http;
/// Composite location key codec.
pub mod location;
/// Domain models and identifiers shared by all providers.
pub mod model;
/// Registry and the uniform adapter contract.
pub mod plugin;
/// Traits describing the provider interfaces.
pub mod ports;
/// Schedule synthesis from an anchor date and frequency text.
pub mod recurrence;
/// High-level service facade used by clients.
pub mod service;
/// Token and cookie session helpers.
pub mod session;

pub use cache::*;
pub use detection::*;
pub use model::*;
pub use plugin::*;
pub use ports::*;
pub use service::*;
