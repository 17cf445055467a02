//! Upload transports: the standard Bot API endpoint and the self-hosted
//! server for large files. Both speak the same protocol through a
//! `teloxide::Bot`, only the base URL and timeouts differ.

use super::{DeliveryError, DeliveryOutcome};
use crate::config::TELEGRAM_CONNECT_TIMEOUT_SECS;
use crate::media::{MediaArtifact, MediaKind};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use teloxide::prelude::*;
use teloxide::types::{InputFile, ParseMode};
use teloxide::{ApiError, RequestError};
use thiserror::Error;
use tokio::sync::watch;
use tracing::{info, warn};

use super::progress::ProgressReader;

/// Sends a finished artifact to a chat
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UploadTransport: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Uploads `artifact` with an HTML `caption`.
    ///
    /// When `progress` is given, the transport streams the file and
    /// publishes the number of bytes sent.
    async fn upload(
        &self,
        chat_id: ChatId,
        artifact: &MediaArtifact,
        caption: &str,
        progress: Option<watch::Sender<u64>>,
    ) -> Result<DeliveryOutcome, DeliveryError>;
}

/// Why a single Bot API send failed
#[derive(Debug, Error)]
pub enum SendFailure {
    /// Telegram answered with an error, e.g. a file it cannot treat as media
    #[error("rejected by the Bot API: {0}")]
    Rejected(#[source] ApiError),
    /// No answer within the client timeout
    #[error("request timed out")]
    TimedOut,
    /// Any other transport failure
    #[error(transparent)]
    Failed(RequestError),
}

impl From<RequestError> for SendFailure {
    fn from(e: RequestError) -> Self {
        match e {
            RequestError::Api(api) => Self::Rejected(api),
            RequestError::Network(ref net) if net.is_timeout() => Self::TimedOut,
            other => Self::Failed(other),
        }
    }
}

/// The two Bot API calls an upload needs
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BotApiClient: Send + Sync {
    /// `sendAudio` or `sendVideo` depending on `kind`
    async fn send_media(
        &self,
        chat_id: ChatId,
        kind: MediaKind,
        file: InputFile,
        caption: String,
        title: Option<String>,
    ) -> Result<(), SendFailure>;

    /// `sendDocument`
    async fn send_document(
        &self,
        chat_id: ChatId,
        file: InputFile,
        caption: String,
    ) -> Result<(), SendFailure>;
}

#[async_trait]
impl BotApiClient for Bot {
    async fn send_media(
        &self,
        chat_id: ChatId,
        kind: MediaKind,
        file: InputFile,
        caption: String,
        title: Option<String>,
    ) -> Result<(), SendFailure> {
        match kind {
            MediaKind::Audio => {
                let mut req = self
                    .send_audio(chat_id, file)
                    .caption(caption)
                    .parse_mode(ParseMode::Html);
                if let Some(title) = title {
                    req = req.title(title);
                }
                req.await?;
            }
            MediaKind::Video(_) => {
                self.send_video(chat_id, file)
                    .caption(caption)
                    .parse_mode(ParseMode::Html)
                    .supports_streaming(true)
                    .await?;
            }
        }
        Ok(())
    }

    async fn send_document(
        &self,
        chat_id: ChatId,
        file: InputFile,
        caption: String,
    ) -> Result<(), SendFailure> {
        <Self as Requester>::send_document(self, chat_id, file)
            .caption(caption)
            .parse_mode(ParseMode::Html)
            .await?;
        Ok(())
    }
}

/// Builds a bot client with the given request timeout, optionally pointed
/// at a self-hosted Bot API server.
///
/// # Errors
///
/// Returns an error if the HTTP client cannot be built.
pub fn build_bot(
    token: &str,
    request_timeout: Duration,
    api_url: Option<reqwest::Url>,
) -> Result<Bot, reqwest::Error> {
    let client = teloxide::net::default_reqwest_settings()
        .connect_timeout(Duration::from_secs(TELEGRAM_CONNECT_TIMEOUT_SECS))
        .timeout(request_timeout)
        .build()?;
    let bot = Bot::with_client(token, client);
    Ok(match api_url {
        Some(url) => bot.set_api_url(url),
        None => bot,
    })
}

/// Upload transport backed by a Bot API endpoint
pub struct BotApiTransport {
    client: Arc<dyn BotApiClient>,
    name: &'static str,
    timeout_is_unconfirmed: bool,
}

impl BotApiTransport {
    /// Standard endpoint; a request timeout counts as unconfirmed delivery
    #[must_use]
    pub fn primary(bot: Bot) -> Self {
        Self::new(Arc::new(bot), "primary", true)
    }

    /// Self-hosted endpoint for large files
    #[must_use]
    pub fn secondary(bot: Bot) -> Self {
        Self::new(Arc::new(bot), "secondary", false)
    }

    fn new(client: Arc<dyn BotApiClient>, name: &'static str, timeout_is_unconfirmed: bool) -> Self {
        Self {
            client,
            name,
            timeout_is_unconfirmed,
        }
    }

    async fn input_file(
        artifact: &MediaArtifact,
        progress: Option<watch::Sender<u64>>,
    ) -> Result<InputFile, DeliveryError> {
        let file_name = artifact.file_name();
        Ok(match progress {
            Some(tx) => {
                let file = tokio::fs::File::open(&artifact.path).await?;
                InputFile::read(ProgressReader::new(file, tx)).file_name(file_name)
            }
            None => InputFile::file(artifact.path.clone()).file_name(file_name),
        })
    }
}

#[async_trait]
impl UploadTransport for BotApiTransport {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn upload(
        &self,
        chat_id: ChatId,
        artifact: &MediaArtifact,
        caption: &str,
        progress: Option<watch::Sender<u64>>,
    ) -> Result<DeliveryOutcome, DeliveryError> {
        let file = Self::input_file(artifact, progress).await?;
        let sent = self
            .client
            .send_media(
                chat_id,
                artifact.kind,
                file,
                caption.to_string(),
                artifact.title.clone(),
            )
            .await;
        let result = match sent {
            Err(SendFailure::Rejected(e)) => {
                warn!(
                    transport = self.name,
                    file_name = %artifact.file_name(),
                    error = %e,
                    "Failed to send as native media; falling back to document"
                );
                let file = Self::input_file(artifact, None).await?;
                self.client
                    .send_document(chat_id, file, caption.to_string())
                    .await
            }
            other => other,
        };

        match result {
            Ok(()) => {
                info!(
                    transport = self.name,
                    chat_id = chat_id.0,
                    size = artifact.size_bytes,
                    "Upload completed"
                );
                Ok(DeliveryOutcome::Delivered)
            }
            Err(SendFailure::TimedOut) if self.timeout_is_unconfirmed => {
                warn!(
                    transport = self.name,
                    chat_id = chat_id.0,
                    "Upload timed out; the file usually arrives anyway"
                );
                Ok(DeliveryOutcome::Unconfirmed)
            }
            Err(source) => Err(DeliveryError::Upload {
                transport: self.name,
                source,
            }),
        }
    }
}
