//! yt-dlp orchestration: runs the strategy chain until one attempt yields
//! a transcoded artifact.
//!
//! Every request gets its own job directory under the download root. A
//! failed attempt purges the directory before the next strategy runs, and a
//! failed request removes it entirely. On success the directory travels
//! with the [`MediaArtifact`] and is removed by its `cleanup`.

use super::process::ProcessRunner;
use super::strategy::{default_strategies, ExtractorStrategy};
use super::transcode::Transcoder;
use super::{JobPhase, MediaArtifact, MediaError, MediaRequest};
use crate::config::Settings;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::Sender;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Extractor errors no other strategy can fix
const FATAL_ERROR_PATTERNS: &[&str] = &[
    "Video unavailable",
    "Private video",
    "This video is not available",
    "Sign in to confirm your age",
    "age-restricted",
    "members-only",
    "This video is private",
    "removed by the uploader",
    "no longer available",
    "blocked it in your country",
    "geo-restricted",
    "who has blocked it on copyright grounds",
    "copyright claim",
    "terminated account",
    "This video has been removed",
    "Unsupported URL",
    "is not a valid URL",
    "Premieres in",
    "This live event will begin",
    "Join this channel to get access",
    "HTTP Error 404",
];

/// Extractor errors known to clear up with a different client or no cookies
const KNOWN_RECOVERABLE_PATTERNS: &[&str] = &[
    "Sign in to confirm you're not a bot",
    "DPAPI",
    "Failed to decrypt",
    "failed to load cookies",
    "could not find",
    "Invalid po_token",
    "Requested format is not available",
    "Signature extraction failed",
    "HTTP Error 403",
    "forbidden",
    "unable to download video data",
];

/// Upper bound for a title-derived file stem, well under the 255-byte
/// limit most file systems put on a single name
pub(crate) const FILE_STEM_MAX_BYTES: usize = 200;

/// Suffixes of partial files yt-dlp leaves behind
const PARTIAL_SUFFIXES: &[&str] = &["part", "ytdl", "temp"];

/// How an extractor failure is handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Stop the chain
    Fatal,
    /// A known issue another strategy usually gets around
    KnownRecoverable,
    /// Anything else; the next strategy is tried
    Unknown,
}

/// Classifies extractor diagnostics.
///
/// Recoverable patterns win over fatal ones: a data-download failure such as
/// `unable to download video data: HTTP Error 404` is client specific and
/// must not stop the chain.
#[must_use]
pub fn classify_failure(diagnostics: &str) -> FailureClass {
    let lower = diagnostics.to_lowercase();
    if KNOWN_RECOVERABLE_PATTERNS
        .iter()
        .any(|pattern| lower.contains(&pattern.to_lowercase()))
    {
        return FailureClass::KnownRecoverable;
    }
    if FATAL_ERROR_PATTERNS
        .iter()
        .any(|pattern| diagnostics.contains(pattern))
    {
        return FailureClass::Fatal;
    }
    FailureClass::Unknown
}

/// Metadata yt-dlp prints with `--dump-json`
#[derive(Debug, Default, Deserialize)]
struct ExtractedInfo {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    duration: Option<f64>,
}

/// Runs the extractor strategy chain and the transcoder
pub struct Downloader {
    runner: Arc<dyn ProcessRunner>,
    transcoder: Transcoder,
    ytdlp_bin: String,
    ytdlp_timeout: Duration,
    strategies: Vec<ExtractorStrategy>,
    download_root: PathBuf,
}

impl Downloader {
    /// Builds a downloader with the default strategy chain
    #[must_use]
    pub fn new(settings: &Settings, runner: Arc<dyn ProcessRunner>) -> Self {
        let transcoder = Transcoder::new(
            runner.clone(),
            settings.ffmpeg_bin.clone(),
            settings.ffmpeg_timeout(),
            settings.audio_bitrate_kbps,
        );
        Self {
            runner,
            transcoder,
            ytdlp_bin: settings.ytdlp_bin.clone(),
            ytdlp_timeout: settings.ytdlp_timeout(),
            strategies: default_strategies(&settings.cookies_browser),
            download_root: settings.download_root(),
        }
    }

    /// Number of strategies in the chain
    #[must_use]
    pub fn strategy_count(&self) -> usize {
        self.strategies.len()
    }

    /// Downloads and transcodes `request`.
    ///
    /// Phases are reported on `phase_tx` when given.
    ///
    /// # Errors
    ///
    /// Returns `Unavailable` on a fatal extractor error, `Spawn` when yt-dlp
    /// cannot be started, and `StrategiesExhausted` when every strategy
    /// failed.
    pub async fn fetch(
        &self,
        request: &MediaRequest,
        phase_tx: Option<&Sender<JobPhase>>,
    ) -> Result<MediaArtifact, MediaError> {
        let job_dir = self
            .download_root
            .join(Uuid::new_v4().as_simple().to_string());
        tokio::fs::create_dir_all(&job_dir).await?;

        let result = self.run_strategies(request, &job_dir, phase_tx).await;
        if result.is_err() {
            remove_job_dir(&job_dir).await;
        }
        result
    }

    async fn run_strategies(
        &self,
        request: &MediaRequest,
        job_dir: &Path,
        phase_tx: Option<&Sender<JobPhase>>,
    ) -> Result<MediaArtifact, MediaError> {
        let total = self.strategies.len();
        let mut last_error: Option<String> = None;

        for (i, strategy) in self.strategies.iter().enumerate() {
            report(
                phase_tx,
                JobPhase::Downloading {
                    strategy: strategy.name,
                    attempt: i + 1,
                    total,
                },
            )
            .await;
            info!(
                video_id = %request.link.video_id,
                strategy = strategy.name,
                kind = request.kind.noun(),
                "Attempting download"
            );

            match self.attempt(strategy, request, job_dir, phase_tx).await {
                Ok(artifact) => {
                    info!(
                        video_id = %request.link.video_id,
                        strategy = strategy.name,
                        size = artifact.size_bytes,
                        "Download and conversion completed"
                    );
                    return Ok(artifact);
                }
                Err(e @ (MediaError::Unavailable(_) | MediaError::Spawn { .. })) => {
                    error!(
                        video_id = %request.link.video_id,
                        strategy = strategy.name,
                        error = %e,
                        "Unrecoverable download error"
                    );
                    return Err(e);
                }
                Err(e) => {
                    warn!(
                        video_id = %request.link.video_id,
                        strategy = strategy.name,
                        attempt = i + 1,
                        total,
                        error = %e,
                        "Strategy failed"
                    );
                    purge_dir(job_dir).await;
                    last_error = Some(e.to_string());
                }
            }
        }

        let last_error = last_error.unwrap_or_else(|| "no strategies configured".to_string());
        error!(
            video_id = %request.link.video_id,
            attempts = total,
            last_error = %last_error,
            "All download strategies failed"
        );
        Err(MediaError::StrategiesExhausted {
            attempts: total,
            last_error,
        })
    }

    async fn attempt(
        &self,
        strategy: &ExtractorStrategy,
        request: &MediaRequest,
        job_dir: &Path,
        phase_tx: Option<&Sender<JobPhase>>,
    ) -> Result<MediaArtifact, MediaError> {
        let video_id = &request.link.video_id;
        let template = job_dir.join(format!("{video_id}.source.%(ext)s"));
        let args = strategy.args(request.kind, &template.to_string_lossy(), &request.link.url);

        let output = self
            .runner
            .run(&self.ytdlp_bin, &args, self.ytdlp_timeout)
            .await?;

        if !output.success() {
            let diagnostics = output.diagnostics().trim();
            debug!(strategy = strategy.name, diagnostics = %diagnostics, "yt-dlp diagnostics");
            let message = last_error_line(diagnostics);
            return match classify_failure(diagnostics) {
                FailureClass::Fatal => Err(MediaError::Unavailable(message)),
                FailureClass::KnownRecoverable => {
                    info!(strategy = strategy.name, "Known extractor issue, next strategy may work");
                    Err(MediaError::ProcessFailed {
                        program: self.ytdlp_bin.clone(),
                        message,
                    })
                }
                FailureClass::Unknown => Err(MediaError::ProcessFailed {
                    program: self.ytdlp_bin.clone(),
                    message,
                }),
            };
        }

        let info = parse_extracted_info(&output.stdout);
        if let Some(duration) = info.duration {
            debug!(video_id = %video_id, duration_secs = duration, "Extractor reported duration");
        }

        let Some(source) = find_source_file(job_dir, video_id).await? else {
            let files = list_dir(job_dir).await;
            error!(
                video_id = %video_id,
                files = ?files,
                "yt-dlp finished but no source file was found"
            );
            return Err(MediaError::MissingOutput("download"));
        };

        report(phase_tx, JobPhase::Converting).await;
        // The title only names the upload; on disk the id keeps paths short.
        let target = job_dir.join(format!("{video_id}.{}", request.kind.extension()));
        self.transcoder
            .transcode(request.kind, &source, &target)
            .await?;

        if let Err(e) = tokio::fs::remove_file(&source).await {
            warn!(path = %source.display(), error = %e, "Failed to remove source file");
        }

        let size_bytes = tokio::fs::metadata(&target).await?.len();
        Ok(MediaArtifact {
            path: target,
            size_bytes,
            title: info.title,
            kind: request.kind,
            job_dir: job_dir.to_path_buf(),
        })
    }
}

async fn report(phase_tx: Option<&Sender<JobPhase>>, phase: JobPhase) {
    if let Some(tx) = phase_tx {
        if let Err(e) = tx.send(phase).await {
            debug!("Phase receiver dropped: {e}");
        }
    }
}

fn parse_extracted_info(stdout: &str) -> ExtractedInfo {
    stdout
        .lines()
        .rev()
        .filter(|line| line.trim_start().starts_with('{'))
        .find_map(|line| serde_json::from_str::<ExtractedInfo>(line).ok())
        .unwrap_or_default()
}

/// Last line mentioning an error, or the last non-empty line.
fn last_error_line(diagnostics: &str) -> String {
    let line = diagnostics
        .lines()
        .rev()
        .find(|l| l.contains("ERROR"))
        .or_else(|| diagnostics.lines().rev().find(|l| !l.trim().is_empty()))
        .unwrap_or("unknown error");
    crate::utils::truncate_str(line.trim(), 500)
}

/// File-name safe stem derived from the title, falling back to `fallback`.
///
/// Capped at 80 characters and [`FILE_STEM_MAX_BYTES`] bytes, cut on a char
/// boundary.
pub(crate) fn safe_file_stem(title: Option<&str>, fallback: &str) -> String {
    let cleaned: String = title
        .unwrap_or_default()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, ' ' | '-' | '_' | '(' | ')') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = crate::utils::truncate_str(cleaned.trim(), 80);
    let cleaned = crate::utils::truncate_bytes(&cleaned, FILE_STEM_MAX_BYTES)
        .trim()
        .trim_matches('_');
    if cleaned.is_empty() {
        fallback.to_string()
    } else {
        cleaned.to_string()
    }
}

/// Finds `<id>.source.<ext>`, skipping partial and per-format files.
async fn find_source_file(job_dir: &Path, video_id: &str) -> Result<Option<PathBuf>, MediaError> {
    let prefix = format!("{video_id}.source.");
    let mut entries = tokio::fs::read_dir(job_dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name();
        let name = name.to_string_lossy();
        let Some(ext) = name.strip_prefix(&prefix) else {
            continue;
        };
        if ext.is_empty() || ext.contains('.') || PARTIAL_SUFFIXES.contains(&ext) {
            continue;
        }
        return Ok(Some(entry.path()));
    }
    Ok(None)
}

async fn list_dir(dir: &Path) -> Vec<String> {
    let mut names = Vec::new();
    if let Ok(mut entries) = tokio::fs::read_dir(dir).await {
        while let Ok(Some(entry)) = entries.next_entry().await {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    names
}

/// Removes every entry of `dir`, keeping the directory itself.
async fn purge_dir(dir: &Path) {
    let Ok(mut entries) = tokio::fs::read_dir(dir).await else {
        return;
    };
    while let Ok(Some(entry)) = entries.next_entry().await {
        let path = entry.path();
        let removed = if path.is_dir() {
            tokio::fs::remove_dir_all(&path).await
        } else {
            tokio::fs::remove_file(&path).await
        };
        match removed {
            Ok(()) => debug!(path = %path.display(), "Removed intermediate file"),
            Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove intermediate file"),
        }
    }
}

/// Removes a job directory; a missing directory is not an error.
pub(crate) async fn remove_job_dir(dir: &Path) {
    match tokio::fs::remove_dir_all(dir).await {
        Ok(()) => debug!(path = %dir.display(), "Removed job directory"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %dir.display(), error = %e, "Failed to remove job directory"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::process::{MockProcessRunner, ProcessOutput};
    use crate::media::{MediaKind, Quality, VideoLink};
    use std::sync::atomic::{AtomicUsize, Ordering};

    const YTDLP: &str = "yt-dlp";
    const FFMPEG: &str = "ffmpeg";

    fn request(kind: MediaKind) -> MediaRequest {
        MediaRequest {
            link: VideoLink {
                url: "https://youtu.be/abc123".to_string(),
                video_id: "abc123".to_string(),
            },
            kind,
        }
    }

    fn temp_root() -> PathBuf {
        std::env::temp_dir().join(format!("tube-courier-test-{}", Uuid::new_v4().as_simple()))
    }

    fn downloader(runner: MockProcessRunner, root: &Path) -> Downloader {
        let runner: Arc<dyn ProcessRunner> = Arc::new(runner);
        let transcoder = Transcoder::new(runner.clone(), FFMPEG, Duration::from_secs(5), 192);
        Downloader {
            runner,
            transcoder,
            ytdlp_bin: YTDLP.to_string(),
            ytdlp_timeout: Duration::from_secs(5),
            strategies: default_strategies("firefox"),
            download_root: root.to_path_buf(),
        }
    }

    fn ok(stdout: &str) -> ProcessOutput {
        ProcessOutput {
            exit_code: Some(0),
            stdout: stdout.to_string(),
            stderr: String::new(),
        }
    }

    fn failed(stderr: &str) -> ProcessOutput {
        ProcessOutput {
            exit_code: Some(1),
            stdout: String::new(),
            stderr: stderr.to_string(),
        }
    }

    /// Writes the file yt-dlp would have produced for the `-o` template.
    fn fake_download(args: &[String]) {
        let template = args
            .iter()
            .position(|a| a == "-o")
            .and_then(|i| args.get(i + 1))
            .cloned()
            .unwrap_or_default();
        let path = template.replace("%(ext)s", "webm");
        std::fs::write(path, b"source bytes").unwrap();
    }

    /// Writes the file ffmpeg would have produced (last argument).
    fn fake_transcode(args: &[String]) {
        let out = args.last().cloned().unwrap_or_default();
        std::fs::write(out, b"transcoded").unwrap();
    }

    async fn entries(root: &Path) -> usize {
        list_dir(root).await.len()
    }

    #[test]
    fn classifies_known_failures() {
        assert_eq!(
            classify_failure("ERROR: [youtube] abc: Private video. Sign in if you've been granted access"),
            FailureClass::Fatal
        );
        assert_eq!(
            classify_failure("ERROR: [youtube] abc: Sign in to confirm you're not a bot"),
            FailureClass::KnownRecoverable
        );
        assert_eq!(
            classify_failure("ERROR: unable to download video data: HTTP Error 403: Forbidden"),
            FailureClass::KnownRecoverable
        );
        assert_eq!(
            classify_failure("ERROR: unable to download video data: HTTP Error 404: Not Found"),
            FailureClass::KnownRecoverable
        );
        assert_eq!(
            classify_failure("ERROR: [youtube] abc: HTTP Error 404: Not Found"),
            FailureClass::Fatal
        );
        assert_eq!(classify_failure("ERROR: something new"), FailureClass::Unknown);
    }

    #[test]
    fn extracted_info_uses_last_json_line() {
        let stdout = "noise\n{\"title\": \"First\"}\n{\"title\": \"Song\", \"duration\": 215.0}\n";
        let info = parse_extracted_info(stdout);
        assert_eq!(info.title.as_deref(), Some("Song"));
        assert_eq!(info.duration, Some(215.0));
        assert!(parse_extracted_info("not json").title.is_none());
    }

    #[test]
    fn file_stem_is_sanitized() {
        assert_eq!(safe_file_stem(Some("AC/DC - T.N.T."), "id"), "AC_DC - T_N_T");
        assert_eq!(safe_file_stem(Some("///"), "id"), "id");
        assert_eq!(safe_file_stem(None, "id"), "id");
    }

    #[test]
    fn file_stem_with_wide_characters_fits_a_file_name() {
        let title = "𝐋𝐨𝐟𝐢 𝐇𝐢𝐩 𝐇𝐨𝐩 𝐌𝐢𝐱 𝐓𝐨 𝐒𝐭𝐮𝐝𝐲 𝐀𝐧𝐝 𝐑𝐞𝐥𝐚𝐱 𝐓𝐨 𝐁𝐞𝐚𝐭𝐬 𝐕𝐨𝐥 𝟏 ".repeat(3);
        let stem = safe_file_stem(Some(&title), "abc123");
        assert!(stem.starts_with("𝐋𝐨𝐟𝐢"));
        assert!(stem.len() <= FILE_STEM_MAX_BYTES, "{} bytes", stem.len());

        let root = temp_root();
        std::fs::create_dir_all(&root).unwrap();
        std::fs::write(root.join(format!("{stem}.mp3")), b"ok").unwrap();
        let _ = std::fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn stylized_title_does_not_name_the_file_on_disk() {
        let root = temp_root();
        let title = "𝐋𝐨𝐟𝐢 𝐇𝐢𝐩 𝐇𝐨𝐩 ".repeat(10);
        let stdout = serde_json::json!({ "title": title }).to_string();

        let mut runner = MockProcessRunner::new();
        runner.expect_run().times(2).returning(move |program, args, _| {
            if program == YTDLP {
                fake_download(args);
                Ok(ok(&stdout))
            } else {
                fake_transcode(args);
                Ok(ok(""))
            }
        });

        let artifact = downloader(runner, &root)
            .fetch(&request(MediaKind::Audio), None)
            .await
            .unwrap();

        assert_eq!(artifact.path.file_name().unwrap(), "abc123.mp3");
        assert!(artifact.path.exists());
        let shown = artifact.file_name();
        assert!(shown.starts_with("𝐋𝐨𝐟𝐢"));
        assert!(shown.ends_with(".mp3"));
        assert!(shown.len() <= FILE_STEM_MAX_BYTES + ".mp3".len());

        artifact.cleanup().await;
        let _ = std::fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn falls_back_to_next_strategy_after_known_issue() {
        let root = temp_root();
        let ytdlp_calls = Arc::new(AtomicUsize::new(0));
        let calls = ytdlp_calls.clone();

        let mut runner = MockProcessRunner::new();
        runner.expect_run().returning(move |program, args, _| {
            if program == YTDLP {
                if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    assert!(args.iter().any(|a| a == "--cookies-from-browser"));
                    return Ok(failed("ERROR: [youtube] abc123: Sign in to confirm you're not a bot"));
                }
                assert!(!args.iter().any(|a| a == "--cookies-from-browser"));
                fake_download(args);
                Ok(ok("{\"title\": \"Never Gonna\", \"duration\": 212}"))
            } else {
                fake_transcode(args);
                Ok(ok(""))
            }
        });

        let (tx, mut rx) = tokio::sync::mpsc::channel(8);
        let artifact = downloader(runner, &root)
            .fetch(&request(MediaKind::Audio), Some(&tx))
            .await
            .unwrap();
        drop(tx);

        assert_eq!(ytdlp_calls.load(Ordering::SeqCst), 2);
        assert_eq!(artifact.title.as_deref(), Some("Never Gonna"));
        assert_eq!(artifact.file_name(), "Never Gonna.mp3");
        assert_eq!(artifact.path.file_name().unwrap(), "abc123.mp3");
        assert_eq!(artifact.size_bytes, 10);
        assert!(artifact.path.exists());
        assert!(find_source_file(&artifact.job_dir, "abc123").await.unwrap().is_none());

        let mut phases = Vec::new();
        while let Some(phase) = rx.recv().await {
            phases.push(phase);
        }
        assert_eq!(
            phases,
            vec![
                JobPhase::Downloading { strategy: "browser_cookies_tv_client", attempt: 1, total: 2 },
                JobPhase::Downloading { strategy: "basic_fallback", attempt: 2, total: 2 },
                JobPhase::Converting,
            ]
        );

        let job_dir = artifact.job_dir.clone();
        artifact.cleanup().await;
        assert!(!job_dir.exists());
        let _ = std::fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn fatal_error_stops_the_chain_and_cleans_up() {
        let root = temp_root();
        let ytdlp_calls = Arc::new(AtomicUsize::new(0));
        let calls = ytdlp_calls.clone();

        let mut runner = MockProcessRunner::new();
        runner.expect_run().returning(move |_, _, _| {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(failed("WARNING: foo\nERROR: [youtube] abc123: Private video"))
        });

        let result = downloader(runner, &root)
            .fetch(&request(MediaKind::Video(Quality::P720)), None)
            .await;

        assert!(matches!(
            result,
            Err(MediaError::Unavailable(ref msg)) if msg.contains("Private video")
        ));
        assert_eq!(ytdlp_calls.load(Ordering::SeqCst), 1);
        assert_eq!(entries(&root).await, 0);
        let _ = std::fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn exhausting_all_strategies_reports_last_error() {
        let root = temp_root();
        let mut runner = MockProcessRunner::new();
        runner
            .expect_run()
            .times(2)
            .returning(|_, _, _| Ok(failed("ERROR: HTTP Error 403: Forbidden")));

        let result = downloader(runner, &root)
            .fetch(&request(MediaKind::Audio), None)
            .await;

        match result {
            Err(MediaError::StrategiesExhausted { attempts, last_error }) => {
                assert_eq!(attempts, 2);
                assert!(last_error.contains("403"));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(entries(&root).await, 0);
        let _ = std::fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn missing_output_and_failed_transcode_fall_through() {
        let root = temp_root();
        let ytdlp_calls = Arc::new(AtomicUsize::new(0));
        let calls = ytdlp_calls.clone();

        let mut runner = MockProcessRunner::new();
        runner.expect_run().returning(move |program, args, _| {
            if program == YTDLP {
                // First attempt downloads, second exits cleanly with nothing
                if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    fake_download(args);
                }
                Ok(ok(""))
            } else {
                Ok(failed("Conversion failed!"))
            }
        });

        let result = downloader(runner, &root)
            .fetch(&request(MediaKind::Audio), None)
            .await;

        match result {
            Err(MediaError::StrategiesExhausted { last_error, .. }) => {
                assert!(last_error.contains("no output file"));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(ytdlp_calls.load(Ordering::SeqCst), 2);
        assert_eq!(entries(&root).await, 0);
        let _ = std::fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn spawn_failure_is_not_retried() {
        let root = temp_root();
        let mut runner = MockProcessRunner::new();
        runner.expect_run().times(1).returning(|program, _, _| {
            Err(MediaError::Spawn {
                program: program.to_string(),
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            })
        });

        let result = downloader(runner, &root)
            .fetch(&request(MediaKind::Audio), None)
            .await;

        assert!(matches!(result, Err(MediaError::Spawn { .. })));
        let _ = std::fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn source_lookup_skips_partials_and_format_fragments() {
        let root = temp_root();
        std::fs::create_dir_all(&root).unwrap();
        std::fs::write(root.join("vid.source.webm.part"), b"").unwrap();
        std::fs::write(root.join("vid.source.f137.mp4"), b"").unwrap();
        std::fs::write(root.join("other.source.mp4"), b"").unwrap();
        assert!(find_source_file(&root, "vid").await.unwrap().is_none());

        std::fs::write(root.join("vid.source.mkv"), b"").unwrap();
        let found = find_source_file(&root, "vid").await.unwrap();
        assert_eq!(found, Some(root.join("vid.source.mkv")));
        let _ = std::fs::remove_dir_all(&root);
    }
}
