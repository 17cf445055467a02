//! Inline button payloads.
//!
//! Payloads carry the video id, so a button works as long as the id is
//! still in the pending link map. Telegram caps callback data at 64 bytes.

use crate::media::{MediaKind, Quality};

/// Payload of the instructions button
pub const SHOW_LINK_INSTRUCTIONS: &str = "show_link_instructions";

/// Telegram limit for `callback_data`
pub const CALLBACK_DATA_MAX_BYTES: usize = 64;

/// What a button press asks for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackAction {
    /// Show how to send a link
    ShowInstructions,
    /// Download `video_id` as audio
    Audio {
        /// Pending link key
        video_id: String,
    },
    /// Open the quality menu for `video_id`
    ChooseQuality {
        /// Pending link key
        video_id: String,
    },
    /// Download `video_id` as video at `quality`
    Video {
        /// Pending link key
        video_id: String,
        /// Tier
        quality: Quality,
    },
    /// Back from the quality menu to the format menu
    Back {
        /// Pending link key
        video_id: String,
    },
}

impl CallbackAction {
    /// Parses callback data; `None` for anything unknown or malformed.
    #[must_use]
    pub fn parse(data: &str) -> Option<Self> {
        if data == SHOW_LINK_INSTRUCTIONS {
            return Some(Self::ShowInstructions);
        }

        let mut parts = data.splitn(3, ':');
        let action = match (parts.next(), parts.next(), parts.next()) {
            (Some("fmt"), Some("audio"), Some(id)) => Self::Audio {
                video_id: valid_id(id)?,
            },
            (Some("fmt"), Some("video"), Some(id)) => Self::ChooseQuality {
                video_id: valid_id(id)?,
            },
            (Some("q"), Some(tier), Some(id)) => Self::Video {
                video_id: valid_id(id)?,
                quality: Quality::from_height(tier)?,
            },
            (Some("back"), Some(id), None) => Self::Back {
                video_id: valid_id(id)?,
            },
            _ => return None,
        };
        Some(action)
    }

    /// Encodes the action as callback data
    #[must_use]
    pub fn encode(&self) -> String {
        match self {
            Self::ShowInstructions => SHOW_LINK_INSTRUCTIONS.to_string(),
            Self::Audio { video_id } => format!("fmt:audio:{video_id}"),
            Self::ChooseQuality { video_id } => format!("fmt:video:{video_id}"),
            Self::Video { video_id, quality } => format!("q:{}:{video_id}", quality.height()),
            Self::Back { video_id } => format!("back:{video_id}"),
        }
    }

    /// Requested media kind for download actions
    #[must_use]
    pub fn media_kind(&self) -> Option<MediaKind> {
        match self {
            Self::Audio { .. } => Some(MediaKind::Audio),
            Self::Video { quality, .. } => Some(MediaKind::Video(*quality)),
            _ => None,
        }
    }
}

fn valid_id(id: &str) -> Option<String> {
    let ok = !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    ok.then(|| id.to_string())
}
