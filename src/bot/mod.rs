/// Inline button payloads
pub mod callbacks;
/// Command, text and button handlers
pub mod handlers;
/// Background download jobs
pub mod jobs;
/// Chat operations seam
pub mod messenger;
/// Telegram calls with retry
pub mod resilient;
/// Keyboards and texts
pub mod views;

pub use jobs::JobRunner;
pub use messenger::{Messenger, TelegramMessenger};
