//! # Utility Modules
//!
//! Supporting utilities shared by the session core and the client binary.
//!
//! ## Components
//! - **Logging**: tracing subscriber configuration
//! - **Metrics**: per-session atomic counters

pub mod logging;
pub mod metrics;

pub use metrics::{Metrics, MetricsSnapshot};
