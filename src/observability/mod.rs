//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! blockchain + registry components produce:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (counters for RPC calls, retries, submissions, confirmations)
//!
//! Consumers:
//!     → stdout log stream
//!     → Metrics endpoint (Prometheus scrape), when enabled
//! ```
//!
//! # Design Decisions
//! - Key material never appears in any event or label
//! - Metric updates are no-ops until an exporter is installed

pub mod logging;
pub mod metrics;
