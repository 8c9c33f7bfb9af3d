//! Lifecycle management.
//!
//! # Data Flow
//! ```text
//! Caller / Ctrl-C handler
//!     → CancelToken::cancel
//!     → every clone observes `cancelled()` resolving
//!     → confirmation watchers stop polling and report Cancelled
//! ```

pub mod cancel;

pub use cancel::CancelToken;
