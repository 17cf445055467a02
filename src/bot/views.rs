//! Keyboards and user-facing texts.

use super::callbacks::CallbackAction;
use crate::media::{JobPhase, MediaKind, Quality};
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};

/// Welcome text for `/start`
pub const WELCOME: &str = "Hi! I convert YouTube videos to audio or video files.\n\n\
     Simply paste a YouTube video link directly into the chat and send it to me.";

/// Text shown by the instructions button and `/help`
pub const LINK_INSTRUCTIONS: &str = "To send a link: Just copy the full YouTube video URL \
     (e.g., from your browser or the YouTube app) and paste it directly into our chat, \
     then send it as a message.";

/// Reply to text without a link
pub const SEND_A_LINK: &str = "Please send a YouTube video link. Tap the button for how-to.";

/// Format prompt shown under a recognized link
pub const CHOOSE_FORMAT: &str = "What should I send you?";

/// Quality prompt
pub const CHOOSE_QUALITY: &str = "Pick the maximum video quality:";

/// Shown when a button refers to a forgotten link
pub const LINK_EXPIRED: &str = "This link has expired. Please send it again.";

/// First status text of a job
pub const PROCESSING: &str = "Processing your request, please wait...";

/// Generic reply when a button press fails
pub const BUTTON_ERROR: &str = "Sorry, there was an error processing that button tap.";

/// Single-button keyboard with the link instructions
#[must_use]
pub fn info_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![InlineKeyboardButton::callback(
        "📝 How to Send a Link",
        CallbackAction::ShowInstructions.encode(),
    )]])
}

/// Audio / video choice for a recognized link
#[must_use]
pub fn format_keyboard(video_id: &str) -> InlineKeyboardMarkup {
    let video_id = video_id.to_string();
    InlineKeyboardMarkup::new(vec![vec![
        InlineKeyboardButton::callback(
            "🎵 Audio (MP3)",
            CallbackAction::Audio {
                video_id: video_id.clone(),
            }
            .encode(),
        ),
        InlineKeyboardButton::callback(
            "🎬 Video (MP4)",
            CallbackAction::ChooseQuality { video_id }.encode(),
        ),
    ]])
}

/// Quality tiers, two per row, plus a back button
#[must_use]
pub fn quality_keyboard(video_id: &str) -> InlineKeyboardMarkup {
    let mut rows: Vec<Vec<InlineKeyboardButton>> = Quality::ALL
        .chunks(2)
        .map(|pair| {
            pair.iter()
                .map(|quality| {
                    InlineKeyboardButton::callback(
                        quality.label(),
                        CallbackAction::Video {
                            video_id: video_id.to_string(),
                            quality: *quality,
                        }
                        .encode(),
                    )
                })
                .collect()
        })
        .collect();
    rows.push(vec![InlineKeyboardButton::callback(
        "⬅️ Back",
        CallbackAction::Back {
            video_id: video_id.to_string(),
        }
        .encode(),
    )]);
    InlineKeyboardMarkup::new(rows)
}

/// Status text while waiting for a free job slot
#[must_use]
pub fn queued_text(kind: MediaKind) -> String {
    format!("Your {} request is queued, please wait...", kind.noun())
}

/// Status text for an orchestrator phase
#[must_use]
pub fn phase_text(phase: &JobPhase) -> String {
    match phase {
        JobPhase::Downloading { attempt, total, .. } if *total > 1 => {
            format!("Downloading... (attempt {attempt}/{total})")
        }
        JobPhase::Downloading { .. } => "Downloading...".to_string(),
        JobPhase::Converting => "Converting...".to_string(),
    }
}

/// Follow-up after a delivery
#[must_use]
pub fn sent_text(kind: MediaKind, large: bool, unconfirmed: bool) -> String {
    let noun = match kind {
        MediaKind::Audio => "Audio",
        MediaKind::Video(_) => "Video",
    };
    let prefix = if large { "Large " } else { "" };
    let noun = if large { kind.noun() } else { noun };
    if unconfirmed {
        format!("{prefix}{noun} sent (timeout confirming). What next?")
    } else {
        format!("{prefix}{noun} sent! What next?")
    }
}
