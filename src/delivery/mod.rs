//! Delivery of finished artifacts.
//!
//! The file size picks the route: the standard endpoint up to
//! [`PRIMARY_UPLOAD_LIMIT_BYTES`], the self-hosted server up to
//! [`SECONDARY_UPLOAD_LIMIT_BYTES`] when it is configured, a refusal
//! otherwise.

/// Byte-counting reader and status reporter
pub mod progress;
/// Bot API upload transports
pub mod transport;

use crate::media::MediaArtifact;
use crate::session::{EditThrottle, MessageKey};
use crate::utils::{truncate_str, whole_mib};
use progress::{report_progress, upload_progress_text, StatusEditor};
use std::sync::Arc;
use teloxide::types::ChatId;
use thiserror::Error;
use tokio::sync::watch;
use tracing::info;
pub use transport::{build_bot, BotApiClient, BotApiTransport, SendFailure, UploadTransport};

/// Largest file the standard Bot API endpoint accepts (inclusive)
pub const PRIMARY_UPLOAD_LIMIT_BYTES: u64 = 50 * 1024 * 1024;
/// Largest file the self-hosted server accepts (inclusive)
pub const SECONDARY_UPLOAD_LIMIT_BYTES: u64 = 2000 * 1024 * 1024;
/// Telegram caption limit in characters
pub const CAPTION_LIMIT_CHARS: usize = 1024;

/// Where an artifact of a given size goes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Standard endpoint
    Primary,
    /// Self-hosted server
    Secondary,
    /// Needs the self-hosted server, which is not configured
    SecondaryUnavailable,
    /// Over every limit
    TooLarge,
}

/// Picks the route for `size_bytes`.
#[must_use]
pub const fn select_route(size_bytes: u64, secondary_available: bool) -> Route {
    if size_bytes <= PRIMARY_UPLOAD_LIMIT_BYTES {
        Route::Primary
    } else if size_bytes <= SECONDARY_UPLOAD_LIMIT_BYTES {
        if secondary_available {
            Route::Secondary
        } else {
            Route::SecondaryUnavailable
        }
    } else {
        Route::TooLarge
    }
}

/// How an upload ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// Telegram confirmed the message
    Delivered,
    /// The request timed out; the file most likely arrived
    Unconfirmed,
}

/// Delivery failures
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// Over the self-hosted server limit
    #[error("file of {size_bytes} bytes exceeds every upload limit")]
    TooLarge {
        /// Artifact size
        size_bytes: u64,
    },
    /// Over the standard limit with no self-hosted server configured
    #[error("file of {size_bytes} bytes needs the large-file transport, which is not configured")]
    SecondaryUnavailable {
        /// Artifact size
        size_bytes: u64,
    },
    /// The Bot API request failed
    #[error("{transport} upload failed: {source}")]
    Upload {
        /// Transport name
        transport: &'static str,
        /// Underlying error
        #[source]
        source: SendFailure,
    },
    /// The artifact could not be read
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl DeliveryError {
    /// Short message suitable for the status message
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::TooLarge { size_bytes } => format!(
                "The file is too large to send ({} MB, limit {} MB).",
                whole_mib(*size_bytes),
                whole_mib(SECONDARY_UPLOAD_LIMIT_BYTES)
            ),
            Self::SecondaryUnavailable { size_bytes } => format!(
                "The file is {} MB, more than the {} MB Telegram allows bots, and large-file \
                 upload is not configured.",
                whole_mib(*size_bytes),
                whole_mib(PRIMARY_UPLOAD_LIMIT_BYTES)
            ),
            Self::Upload { .. } | Self::Io(_) => {
                "Failed to send the file. Please try again later.".to_string()
            }
        }
    }
}

/// HTML caption: bold title and the source link, within the caption limit.
#[must_use]
pub fn build_caption(title: Option<&str>, source_url: &str) -> String {
    let url = html_escape::encode_text(source_url).to_string();
    let Some(title) = title.map(str::trim).filter(|t| !t.is_empty()) else {
        return truncate_str(url, CAPTION_LIMIT_CHARS);
    };

    // Escaping can grow the title, so trim the raw text until it fits
    let budget = CAPTION_LIMIT_CHARS.saturating_sub(url.chars().count() + "<b></b>\n".len());
    let mut keep = title.chars().count().min(budget);
    loop {
        let escaped = html_escape::encode_text(&truncate_str(title, keep)).to_string();
        let len = escaped.chars().count();
        if len <= budget || keep == 0 {
            if escaped.is_empty() {
                return truncate_str(url, CAPTION_LIMIT_CHARS);
            }
            return format!("<b>{escaped}</b>\n{url}");
        }
        // An escaped char is at most five chars long
        keep = keep.saturating_sub(((len - budget) / 5).max(1));
    }
}

/// Routes artifacts to the right transport
pub struct DeliveryDispatcher {
    primary: Arc<dyn UploadTransport>,
    secondary: Option<Arc<dyn UploadTransport>>,
    throttle: EditThrottle,
}

impl DeliveryDispatcher {
    /// Creates a dispatcher; `secondary` is `None` when large-file upload
    /// is not configured
    #[must_use]
    pub fn new(
        primary: Arc<dyn UploadTransport>,
        secondary: Option<Arc<dyn UploadTransport>>,
        throttle: EditThrottle,
    ) -> Self {
        Self {
            primary,
            secondary,
            throttle,
        }
    }

    /// Sends `artifact` to `chat_id`, reporting through `status`.
    ///
    /// # Errors
    ///
    /// Returns `TooLarge` or `SecondaryUnavailable` without uploading, or
    /// the transport error.
    pub async fn deliver(
        &self,
        chat_id: ChatId,
        artifact: &MediaArtifact,
        source_url: &str,
        status: Arc<dyn StatusEditor>,
        status_key: MessageKey,
    ) -> Result<DeliveryOutcome, DeliveryError> {
        let size_bytes = artifact.size_bytes;
        let route = select_route(size_bytes, self.secondary.is_some());
        info!(
            chat_id = chat_id.0,
            size = size_bytes,
            route = ?route,
            "Selected delivery route"
        );
        let caption = build_caption(artifact.title.as_deref(), source_url);

        match (route, &self.secondary) {
            (Route::Primary, _) => {
                info!(transport = self.primary.name(), chat_id = chat_id.0, "Uploading");
                status
                    .edit(format!("Uploading {}...", artifact.kind.noun()))
                    .await;
                self.primary.upload(chat_id, artifact, &caption, None).await
            }
            (Route::Secondary, Some(secondary)) => {
                info!(transport = secondary.name(), chat_id = chat_id.0, "Uploading with progress");
                status
                    .edit(upload_progress_text(artifact.kind, 0))
                    .await;
                let (tx, rx) = watch::channel(0);
                let reporter = tokio::spawn(report_progress(
                    rx,
                    size_bytes,
                    artifact.kind,
                    status_key,
                    self.throttle.clone(),
                    status,
                ));
                let result = secondary
                    .upload(chat_id, artifact, &caption, Some(tx))
                    .await;
                reporter.abort();
                self.throttle.forget(status_key).await;
                result
            }
            (Route::Secondary | Route::SecondaryUnavailable, _) => {
                Err(DeliveryError::SecondaryUnavailable { size_bytes })
            }
            (Route::TooLarge, _) => Err(DeliveryError::TooLarge { size_bytes }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::progress::MockStatusEditor;
    use super::transport::MockUploadTransport;
    use super::*;
    use crate::media::{MediaKind, Quality};
    use proptest::prelude::*;
    use std::path::PathBuf;
    use std::time::Duration;

    const MIB: u64 = 1024 * 1024;

    fn artifact(size_bytes: u64, kind: MediaKind) -> MediaArtifact {
        MediaArtifact {
            path: PathBuf::from("/tmp/job/song.mp3"),
            size_bytes,
            title: Some("Song <live>".to_string()),
            kind,
            job_dir: PathBuf::from("/tmp/job"),
        }
    }

    fn quiet_status() -> Arc<dyn StatusEditor> {
        let mut status = MockStatusEditor::new();
        status.expect_edit().returning(|_| ());
        Arc::new(status)
    }

    fn throttle() -> EditThrottle {
        EditThrottle::new(Duration::ZERO, Duration::from_secs(60), 10)
    }

    #[test]
    fn routes_at_the_boundaries() {
        assert_eq!(select_route(0, false), Route::Primary);
        assert_eq!(select_route(50 * MIB, false), Route::Primary);
        assert_eq!(select_route(50 * MIB + 1, true), Route::Secondary);
        assert_eq!(select_route(50 * MIB + 1, false), Route::SecondaryUnavailable);
        assert_eq!(select_route(2000 * MIB, true), Route::Secondary);
        assert_eq!(select_route(2000 * MIB + 1, true), Route::TooLarge);
        assert_eq!(select_route(2000 * MIB + 1, false), Route::TooLarge);
    }

    fn rank(route: Route) -> u8 {
        match route {
            Route::Primary => 0,
            Route::Secondary | Route::SecondaryUnavailable => 1,
            Route::TooLarge => 2,
        }
    }

    proptest! {
        #[test]
        fn larger_files_never_take_a_smaller_route(a in 0u64..4_000 * MIB, b in 0u64..4_000 * MIB, secondary: bool) {
            let (small, large) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(rank(select_route(small, secondary)) <= rank(select_route(large, secondary)));
        }
    }

    #[test]
    fn caption_escapes_and_fits() {
        let caption = build_caption(Some("Tom & Jerry <3"), "https://youtu.be/abc");
        assert_eq!(caption, "<b>Tom &amp; Jerry &lt;3</b>\nhttps://youtu.be/abc");

        let long = "&".repeat(2000);
        let caption = build_caption(Some(&long), "https://youtu.be/abc");
        assert!(caption.chars().count() <= CAPTION_LIMIT_CHARS);
        assert!(caption.ends_with("</b>\nhttps://youtu.be/abc"));

        assert_eq!(build_caption(None, "https://youtu.be/abc"), "https://youtu.be/abc");
        assert_eq!(build_caption(Some("  "), "https://youtu.be/abc"), "https://youtu.be/abc");
    }

    #[test]
    fn user_messages_mention_sizes() {
        let err = DeliveryError::SecondaryUnavailable { size_bytes: 60 * MIB };
        assert!(err.user_message().contains("60 MB"));
        let err = DeliveryError::TooLarge { size_bytes: 2500 * MIB };
        assert!(err.user_message().contains("2000 MB"));
    }

    #[tokio::test]
    async fn small_files_use_primary_without_progress() {
        let mut primary = MockUploadTransport::new();
        primary
            .expect_upload()
            .withf(|_, _, caption, progress| caption.contains("&lt;live&gt;") && progress.is_none())
            .times(1)
            .returning(|_, _, _, _| Ok(DeliveryOutcome::Unconfirmed));
        primary.expect_name().return_const("primary");

        let dispatcher = DeliveryDispatcher::new(Arc::new(primary), None, throttle());
        let outcome = dispatcher
            .deliver(
                ChatId(1),
                &artifact(10 * MIB, MediaKind::Audio),
                "https://youtu.be/abc",
                quiet_status(),
                (1, 2),
            )
            .await
            .unwrap();
        assert_eq!(outcome, DeliveryOutcome::Unconfirmed);
    }

    #[tokio::test]
    async fn large_files_without_secondary_are_refused() {
        let mut primary = MockUploadTransport::new();
        primary.expect_upload().never();

        let dispatcher = DeliveryDispatcher::new(Arc::new(primary), None, throttle());
        let result = dispatcher
            .deliver(
                ChatId(1),
                &artifact(51 * MIB, MediaKind::Video(Quality::P1080)),
                "https://youtu.be/abc",
                quiet_status(),
                (1, 2),
            )
            .await;
        assert!(matches!(
            result,
            Err(DeliveryError::SecondaryUnavailable { size_bytes }) if size_bytes == 51 * MIB
        ));
    }

    #[tokio::test]
    async fn large_files_stream_through_secondary_with_progress() {
        let mut primary = MockUploadTransport::new();
        primary.expect_upload().never();
        let mut secondary = MockUploadTransport::new();
        secondary
            .expect_upload()
            .times(1)
            .returning(|_, _, _, progress| {
                if let Some(tx) = progress {
                    tx.send_replace(100 * MIB);
                }
                Ok(DeliveryOutcome::Delivered)
            });
        secondary.expect_name().times(1).return_const("secondary");

        let mut status = MockStatusEditor::new();
        status
            .expect_edit()
            .withf(|text| text.starts_with("Uploading large video: "))
            .returning(|_| ());

        let throttle = throttle();
        let dispatcher = DeliveryDispatcher::new(
            Arc::new(primary),
            Some(Arc::new(secondary)),
            throttle.clone(),
        );
        let outcome = dispatcher
            .deliver(
                ChatId(1),
                &artifact(200 * MIB, MediaKind::Video(Quality::P720)),
                "https://youtu.be/abc",
                Arc::new(status),
                (1, 2),
            )
            .await
            .unwrap();
        assert_eq!(outcome, DeliveryOutcome::Delivered);
        assert!(throttle.try_acquire((1, 2)).await);
    }
}
