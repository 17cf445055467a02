//! Telegram bot that turns YouTube links into audio or video files.
//!
//! The crate is split into:
//! - [`media`]: link recognition, the extractor fallback chain and transcoding
//! - [`delivery`]: size-based transport selection and upload progress
//! - [`session`]: short-lived in-memory bookkeeping
//! - [`bot`]: Telegram handlers, keyboards and job orchestration

/// Telegram handlers, views and job orchestration
pub mod bot;
/// Configuration and settings management
pub mod config;
/// Upload transports and route selection
pub mod delivery;
/// Link recognition, extraction and transcoding
pub mod media;
/// Ephemeral session state
pub mod session;
/// Shared helpers
pub mod utils;
