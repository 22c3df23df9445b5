//! Core library for the `wunderground` CLI.
//!
//! This crate defines:
//! - The feature catalogue and the de-duplicating feature queue
//! - The request orchestrator that batches queued features into one call
//! - Cache, rate limiter and transport seams, with default implementations
//! - Configuration & credentials handling
//!
//! It is used by `wunderground-cli`, but can also be reused by other binaries or services.

pub mod cache;
pub mod config;
mod error;
pub mod feature;
pub mod limiter;
pub mod orchestrator;
pub mod queue;
pub mod request;
pub mod transport;

pub use cache::{ResponseCache, TtlCache};
pub use config::{CacheConfig, Config, LimitConfig};
pub use error::{Error, Outcome};
pub use feature::Feature;
pub use limiter::{GovernorLimiter, IntervalUnit, TokenLimiter};
pub use orchestrator::{OrchestratorConfig, Wundergrounded};
pub use queue::FeatureQueue;
pub use request::ResolvedRequest;
pub use transport::{HttpTransport, Transport, TransportResponse};
