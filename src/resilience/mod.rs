//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Call to the node:
//!     → blockchain::client (per-request timeout, provider failover)
//!     → On transient failure: retries.rs (retry with jittered exponential backoff)
//!     → Exhausted: caller maps to SubmissionFailed / QueryFailed
//! ```
//!
//! # Design Decisions
//! - Only transport failures are retried; node rejections are returned at once
//! - Jittered backoff prevents thundering herd against the node
//! - Retry count is bounded per call site

pub mod retries;
