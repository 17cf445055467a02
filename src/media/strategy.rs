//! Extractor strategies: named yt-dlp configurations tried in order.

use super::{MediaKind, Quality};

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

const EXTRA_HEADERS: &[&str] = &[
    "Accept:text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
    "Accept-Language:en-us,en;q=0.5",
    "Sec-Fetch-Mode:navigate",
];

/// Format selector for audio requests
pub const AUDIO_FORMAT: &str = "bestaudio/best[height<=480]/worst";

/// One yt-dlp configuration in the fallback chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractorStrategy {
    /// Name used in logs and status messages
    pub name: &'static str,
    /// Browser to read cookies from, if any
    pub cookies_from_browser: Option<String>,
    /// Value for `--extractor-args`
    pub extractor_args: &'static str,
}

/// The default chain: browser cookies with the TV client first, then a
/// cookieless client mix.
#[must_use]
pub fn default_strategies(cookies_browser: &str) -> Vec<ExtractorStrategy> {
    vec![
        ExtractorStrategy {
            name: "browser_cookies_tv_client",
            cookies_from_browser: Some(cookies_browser.to_string()),
            extractor_args: "youtube:player_client=tv,web",
        },
        ExtractorStrategy {
            name: "basic_fallback",
            cookies_from_browser: None,
            extractor_args:
                "youtube:player_client=android,web;player_skip=webpage;formats=missing_pot",
        },
    ]
}

/// yt-dlp format selector for a requested output
#[must_use]
pub fn format_selector(kind: MediaKind) -> String {
    match kind {
        MediaKind::Audio => AUDIO_FORMAT.to_string(),
        MediaKind::Video(quality) => video_format(quality),
    }
}

fn video_format(quality: Quality) -> String {
    let h = quality.height();
    format!(
        "bestvideo[height<={h}][vcodec^=avc1]+bestaudio[ext=m4a]/\
         bestvideo[height<={h}]+bestaudio/best[height<={h}]/best"
    )
}

impl ExtractorStrategy {
    /// Full yt-dlp argument list for one attempt.
    ///
    /// Metadata is printed as JSON on stdout while the download still
    /// happens (`--dump-json --no-simulate`).
    #[must_use]
    pub fn args(&self, kind: MediaKind, output_template: &str, url: &str) -> Vec<String> {
        let mut args: Vec<String> = vec![
            "--no-playlist".into(),
            "--geo-bypass".into(),
            "--no-progress".into(),
            "--no-warnings".into(),
            "--dump-json".into(),
            "--no-simulate".into(),
            "--user-agent".into(),
            USER_AGENT.into(),
        ];
        for header in EXTRA_HEADERS {
            args.push("--add-header".into());
            args.push((*header).into());
        }
        if let Some(ref browser) = self.cookies_from_browser {
            args.push("--cookies-from-browser".into());
            args.push(browser.clone());
        }
        args.push("--extractor-args".into());
        args.push(self.extractor_args.into());
        args.push("-f".into());
        args.push(format_selector(kind));
        if matches!(kind, MediaKind::Video(_)) {
            args.push("--merge-output-format".into());
            args.push("mp4".into());
        }
        args.push("-o".into());
        args.push(output_template.into());
        // Stop option parsing so ids starting with '-' stay positional
        args.push("--".into());
        args.push(url.into());
        args
    }
}
