//! YouTube link recognition.

// lazy_regex! keeps the pattern compile-time validated
#![allow(clippy::non_std_lazy_statics)]

use lazy_regex::lazy_regex;

/// Watch pages, Shorts and short links, scheme and `www.`/`m.` optional.
static RE_YOUTUBE_URL: lazy_regex::Lazy<regex::Regex> = lazy_regex!(
    r"(?:https?://)?(?:www\.|m\.)?(?:youtube\.com/(?:watch\?v=|shorts/)|youtu\.be/)([A-Za-z0-9_-]+)"
);

/// A recognized link and the content identifier extracted from it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoLink {
    /// Link as it will be handed to the extractor
    pub url: String,
    /// Content identifier, used as the key for pending choices
    pub video_id: String,
}

/// Finds the first YouTube link in free text.
///
/// # Examples
///
/// ```
/// use tube_courier::media::recognize;
///
/// let link = recognize("look: youtu.be/dQw4w9WgXcQ").unwrap();
/// assert_eq!(link.video_id, "dQw4w9WgXcQ");
/// assert_eq!(link.url, "https://youtu.be/dQw4w9WgXcQ");
/// ```
#[must_use]
pub fn recognize(text: &str) -> Option<VideoLink> {
    let caps = RE_YOUTUBE_URL.captures(text)?;
    let whole = caps.get(0)?.as_str();
    let video_id = caps.get(1)?.as_str().to_string();

    let url = if whole.starts_with("http://") || whole.starts_with("https://") {
        whole.to_string()
    } else {
        format!("https://{whole}")
    };

    Some(VideoLink { url, video_id })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn recognizes_watch_links() {
        let link = recognize("https://www.youtube.com/watch?v=dQw4w9WgXcQ&t=42s");
        assert_eq!(
            link,
            Some(VideoLink {
                url: "https://www.youtube.com/watch?v=dQw4w9WgXcQ".to_string(),
                video_id: "dQw4w9WgXcQ".to_string(),
            })
        );
    }

    #[test]
    fn recognizes_shorts_and_mobile_links() {
        let shorts = recognize("youtube.com/shorts/abc_DEF-123").map(|l| l.video_id);
        assert_eq!(shorts.as_deref(), Some("abc_DEF-123"));

        let mobile = recognize("http://m.youtube.com/watch?v=xyz").map(|l| l.url);
        assert_eq!(mobile.as_deref(), Some("http://m.youtube.com/watch?v=xyz"));
    }

    #[test]
    fn finds_link_inside_text() {
        let link = recognize("hey, grab this one youtu.be/Q1w2E3r4 please");
        assert_eq!(link.map(|l| l.video_id).as_deref(), Some("Q1w2E3r4"));
    }

    #[test]
    fn ignores_other_sites_and_plain_text() {
        assert_eq!(recognize("hello there"), None);
        assert_eq!(recognize("https://vimeo.com/12345"), None);
        assert_eq!(recognize("https://www.youtube.com/channel/UC123"), None);
    }

    proptest! {
        #[test]
        fn recognize_never_panics(text in ".*") {
            let _ = recognize(&text);
        }

        #[test]
        fn recognized_ids_are_url_safe(id in "[A-Za-z0-9_-]{1,20}") {
            let text = format!("see https://youtu.be/{id} now");
            let link = recognize(&text);
            prop_assert_eq!(link.map(|l| l.video_id), Some(id));
        }
    }
}
