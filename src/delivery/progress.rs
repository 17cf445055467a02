//! Upload progress: a byte-counting reader and the task that turns its
//! counter into status message edits.

use crate::media::MediaKind;
use crate::session::{EditThrottle, MessageKey};
use crate::utils::percent;
use async_trait::async_trait;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, ReadBuf};
use tokio::sync::watch;
use tracing::debug;

/// Something that can replace the text of a status message
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StatusEditor: Send + Sync {
    /// Best-effort edit; failures are swallowed by the implementation
    async fn edit(&self, text: String);
}

/// Wraps a reader and publishes the running byte count
pub struct ProgressReader<R> {
    inner: R,
    read: u64,
    tx: watch::Sender<u64>,
}

impl<R> ProgressReader<R> {
    /// Counts bytes read from `inner` into `tx`
    pub fn new(inner: R, tx: watch::Sender<u64>) -> Self {
        Self { inner, read: 0, tx }
    }
}

impl<R: AsyncRead + Unpin> AsyncRead for ProgressReader<R> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        let this = self.get_mut();
        let before = buf.filled().len();
        let poll = Pin::new(&mut this.inner).poll_read(cx, buf);
        if let Poll::Ready(Ok(())) = &poll {
            let n = buf.filled().len().saturating_sub(before);
            if n > 0 {
                this.read = this
                    .read
                    .saturating_add(u64::try_from(n).unwrap_or(u64::MAX));
                this.tx.send_replace(this.read);
            }
        }
        poll
    }
}

/// Status text for the large-file route
#[must_use]
pub fn upload_progress_text(kind: MediaKind, pct: u8) -> String {
    format!("Uploading large {}: {pct}%", kind.noun())
}

/// Edits the status message as the counter advances until the sender is
/// dropped.
///
/// Edits go through `throttle`; the entry is forgotten on exit.
pub async fn report_progress(
    mut rx: watch::Receiver<u64>,
    total: u64,
    kind: MediaKind,
    key: MessageKey,
    throttle: EditThrottle,
    editor: Arc<dyn StatusEditor>,
) {
    let mut last_pct: Option<u8> = None;
    while rx.changed().await.is_ok() {
        let done = *rx.borrow_and_update();
        let pct = percent(done, total);
        if last_pct == Some(pct) {
            continue;
        }
        if !throttle.try_acquire(key).await {
            continue;
        }
        debug!(chat_id = key.0, message_id = key.1, pct, "Upload progress");
        editor.edit(upload_progress_text(kind, pct)).await;
        last_pct = Some(pct);
    }
    throttle.forget(key).await;
}
