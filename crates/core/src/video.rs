use std::sync::LazyLock;

use regex::Regex;

use crate::error::{PipelineError, Result};

static URL_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:v=|/v/|youtu\.be/|/shorts/|/embed/)([A-Za-z0-9_-]{11})")
        .expect("valid video url pattern")
});

static BARE_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Za-z0-9_-]{11})$").expect("valid video id pattern"));

/// Pull the 11-character video id out of a YouTube URL or accept a bare id.
pub fn extract_video_id(input: &str) -> Result<String> {
    let input = input.trim();

    [&*URL_ID, &*BARE_ID]
        .iter()
        .find_map(|re| re.captures(input))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| PipelineError::InvalidInput(format!("not a YouTube URL: {input}")))
}

/// Ids end up in file names and URLs, so only the YouTube alphabet is allowed.
pub fn is_safe_video_id(video_id: &str) -> bool {
    !video_id.is_empty()
        && video_id.len() <= 64
        && video_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_from_common_url_shapes() {
        let cases = [
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
            "https://www.youtube.com/watch?feature=share&v=dQw4w9WgXcQ&t=42",
            "https://youtu.be/dQw4w9WgXcQ?si=abc",
            "https://www.youtube.com/shorts/dQw4w9WgXcQ",
            "https://www.youtube.com/embed/dQw4w9WgXcQ",
            "  dQw4w9WgXcQ  ",
        ];
        for case in cases {
            assert_eq!(extract_video_id(case).unwrap(), "dQw4w9WgXcQ", "{case}");
        }
    }

    #[test]
    fn rejects_non_youtube_input() {
        assert!(matches!(
            extract_video_id("https://example.com/video/123"),
            Err(PipelineError::InvalidInput(_))
        ));
        assert!(extract_video_id("short").is_err());
    }

    #[test]
    fn safe_ids_exclude_path_characters() {
        assert!(is_safe_video_id("abc123"));
        assert!(is_safe_video_id("dQw4w9WgXcQ"));
        assert!(!is_safe_video_id("../etc/passwd"));
        assert!(!is_safe_video_id(""));
    }
}
