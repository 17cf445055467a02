//! Download jobs: one spawned task per button press, bounded by a
//! semaphore, reporting through a single status message.

use super::messenger::Messenger;
use super::resilient::EditOutcome;
use super::views;
use crate::delivery::progress::StatusEditor;
use crate::delivery::{DeliveryDispatcher, DeliveryOutcome, PRIMARY_UPLOAD_LIMIT_BYTES};
use crate::media::{Downloader, MediaArtifact, MediaError, MediaRequest};
use crate::utils::format_megabytes;
use async_trait::async_trait;
use std::sync::Arc;
use teloxide::types::{ChatId, MessageId};
use tokio::sync::{mpsc, Semaphore, TryAcquireError};
use tracing::{error, info, warn};

/// Status message of one job; edits are dropped when it could not be sent
struct StatusMessage {
    messenger: Arc<dyn Messenger>,
    chat_id: ChatId,
    msg_id: Option<MessageId>,
}

impl StatusMessage {
    fn key(&self) -> (i64, i32) {
        (self.chat_id.0, self.msg_id.map_or(0, |id| id.0))
    }
}

#[async_trait]
impl StatusEditor for StatusMessage {
    async fn edit(&self, text: String) {
        if let Some(msg_id) = self.msg_id {
            self.messenger.edit_status(self.chat_id, msg_id, text).await;
        }
    }
}

/// Runs download jobs in the background
pub struct JobRunner {
    messenger: Arc<dyn Messenger>,
    downloader: Arc<Downloader>,
    delivery: Arc<DeliveryDispatcher>,
    slots: Arc<Semaphore>,
}

impl JobRunner {
    /// Allows `max_concurrent` jobs at once (at least one)
    #[must_use]
    pub fn new(
        messenger: Arc<dyn Messenger>,
        downloader: Arc<Downloader>,
        delivery: Arc<DeliveryDispatcher>,
        max_concurrent: usize,
    ) -> Self {
        Self {
            messenger,
            downloader,
            delivery,
            slots: Arc::new(Semaphore::new(max_concurrent.max(1))),
        }
    }

    /// Starts a job on its own task and returns immediately
    pub fn spawn(self: &Arc<Self>, chat_id: ChatId, request: MediaRequest) {
        let runner = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) = runner.run(chat_id, request).await {
                error!(chat_id = chat_id.0, "Job error: {e}");
            }
        });
    }

    async fn run(&self, chat_id: ChatId, request: MediaRequest) -> anyhow::Result<()> {
        let kind = request.kind;
        info!(
            chat_id = chat_id.0,
            video_id = %request.link.video_id,
            kind = kind.noun(),
            "Job received"
        );

        let msg_id = match self
            .messenger
            .send(chat_id, views::PROCESSING.to_string(), None)
            .await
        {
            Ok(id) => Some(id),
            Err(e) => {
                warn!(chat_id = chat_id.0, "Could not send status message: {e}");
                None
            }
        };
        let status = Arc::new(StatusMessage {
            messenger: Arc::clone(&self.messenger),
            chat_id,
            msg_id,
        });

        let _permit = match Arc::clone(&self.slots).try_acquire_owned() {
            Ok(permit) => permit,
            Err(TryAcquireError::NoPermits) => {
                status.edit(views::queued_text(kind)).await;
                Arc::clone(&self.slots).acquire_owned().await?
            }
            Err(e @ TryAcquireError::Closed) => return Err(e.into()),
        };

        let artifact = match self.fetch_with_status(&request, &status).await {
            Ok(artifact) => artifact,
            Err(e) => {
                error!(
                    chat_id = chat_id.0,
                    video_id = %request.link.video_id,
                    error = %e,
                    "Job failed while fetching media"
                );
                report_failure(&*self.messenger, chat_id, msg_id, e.user_message()).await;
                return Ok(());
            }
        };

        info!(
            chat_id = chat_id.0,
            video_id = %request.link.video_id,
            size = %format_megabytes(artifact.size_bytes),
            "Media ready for delivery"
        );
        let large = artifact.size_bytes > PRIMARY_UPLOAD_LIMIT_BYTES;
        let status_key = status.key();
        let delivered = self
            .delivery
            .deliver(chat_id, &artifact, &request.link.url, status, status_key)
            .await;
        artifact.cleanup().await;

        match delivered {
            Ok(outcome) => {
                if let Some(msg_id) = msg_id {
                    self.messenger.delete(chat_id, msg_id).await;
                }
                let text = views::sent_text(kind, large, outcome == DeliveryOutcome::Unconfirmed);
                self.messenger
                    .send(chat_id, text, Some(views::info_keyboard()))
                    .await?;
            }
            Err(e) => {
                error!(
                    chat_id = chat_id.0,
                    video_id = %request.link.video_id,
                    error = %e,
                    "Job failed while delivering media"
                );
                report_failure(&*self.messenger, chat_id, msg_id, e.user_message()).await;
            }
        }
        Ok(())
    }

    /// Fetches the media while mirroring orchestrator phases in `status`.
    async fn fetch_with_status(
        &self,
        request: &MediaRequest,
        status: &Arc<StatusMessage>,
    ) -> Result<MediaArtifact, MediaError> {
        let (phase_tx, mut phase_rx) = mpsc::channel(8);
        let forwarder = {
            let status = Arc::clone(status);
            tokio::spawn(async move {
                while let Some(phase) = phase_rx.recv().await {
                    status.edit(views::phase_text(&phase)).await;
                }
            })
        };
        let fetched = self.downloader.fetch(request, Some(&phase_tx)).await;
        drop(phase_tx);
        if let Err(e) = forwarder.await {
            warn!("Phase forwarder stopped: {e}");
        }
        fetched
    }
}

/// Shows `text` in the status message, or in a new message if that fails.
async fn report_failure(
    messenger: &dyn Messenger,
    chat_id: ChatId,
    msg_id: Option<MessageId>,
    text: String,
) {
    if let Some(msg_id) = msg_id {
        let outcome = messenger
            .edit(chat_id, msg_id, text.clone(), Some(views::info_keyboard()))
            .await;
        if outcome != EditOutcome::Failed {
            return;
        }
    }
    if let Err(e) = messenger
        .send(chat_id, text, Some(views::info_keyboard()))
        .await
    {
        error!(chat_id = chat_id.0, "Could not report job failure: {e}");
    }
}
