//! In-memory bookkeeping shared between handlers and jobs.
//!
//! Nothing here survives a restart.

/// Links waiting for a format choice
pub mod pending;
/// Per-message edit rate limiting
pub mod throttle;

pub use pending::PendingLinks;
pub use throttle::{EditThrottle, MessageKey};
