//! ffmpeg invocation producing the final MP3 or MP4.

use super::process::ProcessRunner;
use super::{MediaError, MediaKind};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Wraps ffmpeg with the settings for both output kinds
#[derive(Clone)]
pub struct Transcoder {
    runner: Arc<dyn ProcessRunner>,
    ffmpeg_bin: String,
    timeout: Duration,
    audio_bitrate_kbps: u32,
}

impl Transcoder {
    /// Creates a transcoder using the given runner and executable
    #[must_use]
    pub fn new(
        runner: Arc<dyn ProcessRunner>,
        ffmpeg_bin: impl Into<String>,
        timeout: Duration,
        audio_bitrate_kbps: u32,
    ) -> Self {
        Self {
            runner,
            ffmpeg_bin: ffmpeg_bin.into(),
            timeout,
            audio_bitrate_kbps,
        }
    }

    /// ffmpeg arguments turning `input` into `output`
    #[must_use]
    pub fn args(&self, kind: MediaKind, input: &Path, output: &Path) -> Vec<String> {
        let mut args: Vec<String> = vec![
            "-y".into(),
            "-hide_banner".into(),
            "-loglevel".into(),
            "error".into(),
            "-i".into(),
            input.to_string_lossy().into_owned(),
        ];
        match kind {
            MediaKind::Audio => {
                args.extend([
                    "-vn".into(),
                    "-c:a".into(),
                    "libmp3lame".into(),
                    "-b:a".into(),
                    format!("{}k", self.audio_bitrate_kbps),
                ]);
            }
            MediaKind::Video(_) => {
                args.extend([
                    "-c:v".into(),
                    "copy".into(),
                    "-c:a".into(),
                    "aac".into(),
                    "-b:a".into(),
                    format!("{}k", self.audio_bitrate_kbps),
                    "-movflags".into(),
                    "+faststart".into(),
                ]);
            }
        }
        args.push(output.to_string_lossy().into_owned());
        args
    }

    /// Runs ffmpeg and checks the output file exists.
    ///
    /// # Errors
    ///
    /// Returns `ProcessFailed` on a non-zero exit and `MissingOutput` when
    /// ffmpeg exits cleanly without writing `output`.
    pub async fn transcode(
        &self,
        kind: MediaKind,
        input: &Path,
        output: &Path,
    ) -> Result<(), MediaError> {
        let args = self.args(kind, input, output);
        debug!(input = %input.display(), output = %output.display(), "Transcoding");

        let result = self
            .runner
            .run(&self.ffmpeg_bin, &args, self.timeout)
            .await?;

        if !result.success() {
            return Err(MediaError::ProcessFailed {
                program: self.ffmpeg_bin.clone(),
                message: crate::utils::truncate_str(result.diagnostics().trim(), 500),
            });
        }

        if !tokio::fs::try_exists(output).await.unwrap_or(false) {
            return Err(MediaError::MissingOutput("transcoding"));
        }

        info!(output = %output.display(), "Transcoding finished");
        Ok(())
    }
}
