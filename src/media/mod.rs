//! Media acquisition: link recognition, the extractor fallback chain and
//! transcoding into the final artifact.

use std::path::PathBuf;
use thiserror::Error;

/// yt-dlp orchestration over the ordered strategy list
pub mod downloader;
/// YouTube link recognition
pub mod link;
/// External process execution
pub mod process;
/// Extractor strategy definitions
pub mod strategy;
/// ffmpeg invocation
pub mod transcode;

pub use downloader::Downloader;
pub use link::{recognize, VideoLink};
pub use process::{ProcessOutput, ProcessRunner, TokioProcessRunner};
pub use strategy::{default_strategies, ExtractorStrategy};

/// Video quality tier (maximum frame height)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Quality {
    /// 360p
    P360,
    /// 480p
    P480,
    /// 720p
    P720,
    /// 1080p
    P1080,
}

impl Quality {
    /// All tiers, lowest first
    pub const ALL: [Self; 4] = [Self::P360, Self::P480, Self::P720, Self::P1080];

    /// Maximum frame height in pixels
    #[must_use]
    pub const fn height(self) -> u32 {
        match self {
            Self::P360 => 360,
            Self::P480 => 480,
            Self::P720 => 720,
            Self::P1080 => 1080,
        }
    }

    /// Parses a tier from its height, e.g. `"720"`
    #[must_use]
    pub fn from_height(value: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|q| q.height().to_string() == value)
    }

    /// Button label, e.g. `720p`
    #[must_use]
    pub fn label(self) -> String {
        format!("{}p", self.height())
    }
}

/// Requested output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    /// MP3 audio track
    Audio,
    /// MP4 video capped at the given tier
    Video(Quality),
}

impl MediaKind {
    /// Lowercase noun used in user-facing texts
    #[must_use]
    pub const fn noun(self) -> &'static str {
        match self {
            Self::Audio => "audio",
            Self::Video(_) => "video",
        }
    }

    /// Extension of the final artifact
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Audio => "mp3",
            Self::Video(_) => "mp4",
        }
    }
}

/// A link plus the output the user picked for it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaRequest {
    /// Source link
    pub link: VideoLink,
    /// Output kind
    pub kind: MediaKind,
}

/// Final transcoded file, owned by its job directory
#[derive(Debug, Clone)]
pub struct MediaArtifact {
    /// Path of the transcoded file
    pub path: PathBuf,
    /// File size in bytes
    pub size_bytes: u64,
    /// Title reported by the extractor, if any
    pub title: Option<String>,
    /// Output kind
    pub kind: MediaKind,
    /// Working directory removed by [`MediaArtifact::cleanup`]
    pub job_dir: PathBuf,
}

impl MediaArtifact {
    /// File name shown to the recipient
    #[must_use]
    ///
    /// Built from the sanitized title; the on-disk stem (the video id) is
    /// used when there is no usable title.
    pub fn file_name(&self) -> String {
        let fallback = self
            .path
            .file_stem()
            .map_or_else(|| "media".to_string(), |n| n.to_string_lossy().into_owned());
        let stem = downloader::safe_file_stem(self.title.as_deref(), &fallback);
        format!("{stem}.{}", self.kind.extension())
    }

    /// Removes the job directory and everything in it.
    pub async fn cleanup(self) {
        downloader::remove_job_dir(&self.job_dir).await;
    }
}

/// Progress phases reported while a request is processed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobPhase {
    /// yt-dlp is running with the named strategy
    Downloading {
        /// Strategy name
        strategy: &'static str,
        /// 1-based attempt number
        attempt: usize,
        /// Number of strategies
        total: usize,
    },
    /// ffmpeg is running
    Converting,
}

/// Errors produced while acquiring media
#[derive(Debug, Error)]
pub enum MediaError {
    /// The executable could not be started
    #[error("failed to start {program}: {source}")]
    Spawn {
        /// Executable name
        program: String,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },
    /// The process exceeded its time budget
    #[error("{program} timed out after {secs}s")]
    Timeout {
        /// Executable name
        program: String,
        /// Time budget in seconds
        secs: u64,
    },
    /// The process ran but reported failure
    #[error("{program} failed: {message}")]
    ProcessFailed {
        /// Executable name
        program: String,
        /// Tail of the process diagnostics
        message: String,
    },
    /// The extractor reported an error no other strategy can fix
    #[error("video is not available: {0}")]
    Unavailable(String),
    /// The extractor exited cleanly but left no output file
    #[error("no output file found after {0}")]
    MissingOutput(&'static str),
    /// Every strategy failed
    #[error("all {attempts} download strategies failed; last error: {last_error}")]
    StrategiesExhausted {
        /// Number of strategies tried
        attempts: usize,
        /// Last failure message
        last_error: String,
    },
    /// Filesystem error in the job directory
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl MediaError {
    /// Short message suitable for the status message
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Unavailable(reason) => format!(
                "This video can't be downloaded: {}",
                crate::utils::truncate_str(reason, 200)
            ),
            Self::StrategiesExhausted { .. } => {
                "Couldn't process this link. Please check it or try again later.".to_string()
            }
            Self::Timeout { .. } => {
                "Processing took too long and was stopped. Please try again later.".to_string()
            }
            _ => "An unexpected error occurred while processing the link. Please try again later."
                .to_string(),
        }
    }
}
