//! Downloader runs against a scripted process runner, plus an opt-in run
//! against the real yt-dlp and ffmpeg.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tube_courier::config::Settings;
use tube_courier::media::{
    recognize, Downloader, MediaError, MediaKind, MediaRequest, ProcessOutput, ProcessRunner,
    Quality, TokioProcessRunner,
};

/// Fails yt-dlp `failures` times, then behaves like a working toolchain
struct ScriptedRunner {
    failures: usize,
    ytdlp_calls: AtomicUsize,
}

#[async_trait]
impl ProcessRunner for ScriptedRunner {
    async fn run(
        &self,
        program: &str,
        args: &[String],
        _timeout: Duration,
    ) -> Result<ProcessOutput, MediaError> {
        if program == "yt-dlp" {
            if self.ytdlp_calls.fetch_add(1, Ordering::SeqCst) < self.failures {
                return Ok(ProcessOutput {
                    exit_code: Some(1),
                    stdout: String::new(),
                    stderr: "ERROR: [youtube] x: Requested format is not available".to_string(),
                });
            }
            let template = args
                .iter()
                .position(|a| a == "-o")
                .and_then(|i| args.get(i + 1))
                .cloned()
                .unwrap_or_default();
            std::fs::write(template.replace("%(ext)s", "mkv"), vec![0u8; 2048])?;
            return Ok(ProcessOutput {
                exit_code: Some(0),
                stdout: "{\"title\": \"Clip\", \"duration\": 3.5}\n".to_string(),
                stderr: String::new(),
            });
        }
        let output = args.last().cloned().unwrap_or_default();
        std::fs::write(output, vec![1u8; 1024])?;
        Ok(ProcessOutput {
            exit_code: Some(0),
            stdout: String::new(),
            stderr: String::new(),
        })
    }
}

fn settings(download_dir: &Path) -> Settings {
    Settings {
        telegram_bot_token: "123:TEST".to_string(),
        api_id: None,
        api_hash: None,
        local_bot_api_url: None,
        download_dir: download_dir.to_string_lossy().into_owned(),
        ytdlp_bin: "yt-dlp".to_string(),
        ffmpeg_bin: "ffmpeg".to_string(),
        cookies_browser: "firefox".to_string(),
        audio_bitrate_kbps: 192,
        ytdlp_timeout_secs: 600,
        ffmpeg_timeout_secs: 900,
        pending_link_ttl_secs: 900,
        max_concurrent_jobs: 2,
        primary_upload_timeout_secs: 180,
        secondary_upload_timeout_secs: 1800,
    }
}

fn temp_dir() -> PathBuf {
    std::env::temp_dir().join(format!("tube-courier-it-{}", uuid::Uuid::new_v4().as_simple()))
}

#[tokio::test]
async fn test_second_strategy_produces_video() {
    let root = temp_dir();
    let runner = Arc::new(ScriptedRunner {
        failures: 1,
        ytdlp_calls: AtomicUsize::new(0),
    });
    let downloader = Downloader::new(&settings(&root), runner.clone());

    let request = MediaRequest {
        link: recognize("https://www.youtube.com/watch?v=abcDEF12345").unwrap(),
        kind: MediaKind::Video(Quality::P480),
    };
    let artifact = downloader.fetch(&request, None).await.unwrap();

    assert_eq!(runner.ytdlp_calls.load(Ordering::SeqCst), 2);
    assert_eq!(artifact.file_name(), "Clip.mp4");
    assert_eq!(artifact.size_bytes, 1024);
    assert_eq!(artifact.title.as_deref(), Some("Clip"));

    let job_dir = artifact.job_dir.clone();
    assert!(job_dir.starts_with(&root));
    artifact.cleanup().await;
    assert!(!job_dir.exists());
    let _ = std::fs::remove_dir_all(&root);
}

#[tokio::test]
async fn test_every_strategy_failing_is_reported() {
    let root = temp_dir();
    let runner = Arc::new(ScriptedRunner {
        failures: usize::MAX,
        ytdlp_calls: AtomicUsize::new(0),
    });
    let downloader = Downloader::new(&settings(&root), runner.clone());

    let request = MediaRequest {
        link: recognize("https://youtu.be/abcDEF12345").unwrap(),
        kind: MediaKind::Audio,
    };
    let err = downloader.fetch(&request, None).await.unwrap_err();

    assert!(matches!(err, MediaError::StrategiesExhausted { attempts: 2, .. }));
    assert_eq!(
        runner.ytdlp_calls.load(Ordering::SeqCst),
        downloader.strategy_count()
    );
    let _ = std::fs::remove_dir_all(&root);
}

#[tokio::test]
#[ignore = "Requires yt-dlp, ffmpeg and network access"]
async fn test_real_toolchain_downloads_audio() {
    let root = temp_dir();
    let mut settings = settings(&root);
    if let Ok(bin) = std::env::var("YTDLP_BIN") {
        settings.ytdlp_bin = bin;
    }
    let downloader = Downloader::new(&settings, Arc::new(TokioProcessRunner));

    let request = MediaRequest {
        link: recognize("https://www.youtube.com/watch?v=jNQXAC9IVRw").unwrap(),
        kind: MediaKind::Audio,
    };
    let artifact = downloader.fetch(&request, None).await.unwrap();
    assert!(artifact.size_bytes > 0);
    assert_eq!(artifact.path.extension().and_then(|e| e.to_str()), Some("mp3"));
    artifact.cleanup().await;
    let _ = std::fs::remove_dir_all(&root);
}
