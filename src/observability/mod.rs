//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events via `tracing`)
//!     → metrics.rs (counters and gauges via the `metrics` facade)
//!
//! Consumers:
//!     → stdout/stderr through tracing-subscriber
//!     → whatever metrics recorder the embedding process installs
//! ```
//!
//! # Design Decisions
//! - Private keys and WIFs never appear in log fields
//! - Metrics are no-ops until a recorder is installed

pub mod logging;
pub mod metrics;
