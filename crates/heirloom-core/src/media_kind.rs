//! Media kind classification from a URL alone.
//!
//! Extensions are matched as substrings of the path and query, not as a strict
//! suffix: hosted media often carries query strings or transformation
//! segments around the filename. An extension only counts when it is not
//! followed by another letter or digit, so `.mp3` never matches `.mp3x`.
//!
//! Precedence is audio, then video, then image. The shared upload segment of
//! the third-party host implies video, but an audio extension still wins
//! because that host stores audio under the same segment.

use crate::constants::SHARED_VIDEO_UPLOAD_SEGMENT;
use crate::models::MediaKind;

const AUDIO_EXTENSIONS: &[&str] = &[
    "mp3", "wav", "m4a", "aac", "ogg", "oga", "opus", "flac", "weba", "amr", "aiff",
];

const VIDEO_EXTENSIONS: &[&str] = &[
    "mp4", "mov", "webm", "m4v", "avi", "mkv", "ogv", "3gp", "mpeg", "mpg",
];

const IMAGE_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "webp", "heic", "heif", "avif", "bmp", "svg", "tif", "tiff",
];

/// Classify a URL. Total: every string, including `""`, gets exactly one kind.
pub fn classify(url: &str) -> MediaKind {
    let lowered = url.to_lowercase();
    let path = path_and_query(&lowered);

    if has_any_extension(path, AUDIO_EXTENSIONS) {
        return MediaKind::Audio;
    }
    if has_any_extension(path, VIDEO_EXTENSIONS) || path.contains(SHARED_VIDEO_UPLOAD_SEGMENT) {
        return MediaKind::Video;
    }
    if has_any_extension(path, IMAGE_EXTENSIONS) {
        return MediaKind::Image;
    }
    MediaKind::Unknown
}

/// Strip `scheme://authority` so host names like `cdn.mp3.example` never match.
fn path_and_query(url: &str) -> &str {
    match url.find("://") {
        Some(scheme_end) => {
            let rest = &url[scheme_end + 3..];
            match rest.find('/') {
                Some(slash) => &rest[slash..],
                None => "",
            }
        }
        None => url,
    }
}

fn has_any_extension(path: &str, extensions: &[&str]) -> bool {
    extensions.iter().any(|ext| has_extension(path, ext))
}

fn has_extension(path: &str, ext: &str) -> bool {
    let needle = format!(".{}", ext);
    path.match_indices(&needle).any(|(start, _)| {
        path[start + needle.len()..]
            .chars()
            .next()
            .map_or(true, |next| !next.is_ascii_alphanumeric())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_extensions() {
        assert_eq!(classify("https://x/a.jpg"), MediaKind::Image);
        assert_eq!(classify("https://x/b.mp4"), MediaKind::Video);
        assert_eq!(classify("https://x/c.mp3"), MediaKind::Audio);
    }

    #[test]
    fn test_case_insensitive() {
        assert_eq!(classify("https://x/PHOTO.JPEG"), MediaKind::Image);
        assert_eq!(classify("https://x/Clip.MoV"), MediaKind::Video);
        assert_eq!(classify("https://x/Voice.M4A"), MediaKind::Audio);
    }

    #[test]
    fn test_extension_before_query_string() {
        assert_eq!(classify("https://x/a.png?width=200&v=3"), MediaKind::Image);
        assert_eq!(classify("https://x/b.webm#t=10"), MediaKind::Video);
        assert_eq!(
            classify("https://x/storage/v1/object/sign/c.wav?token=abc"),
            MediaKind::Audio
        );
    }

    #[test]
    fn test_extension_followed_by_transformation_segment() {
        assert_eq!(classify("https://x/a.jpg/w_400,h_300"), MediaKind::Image);
    }

    #[test]
    fn test_shared_upload_segment_is_video() {
        assert_eq!(
            classify("https://res.cloudinary.com/demo/video/upload/v1/clip"),
            MediaKind::Video
        );
        assert_eq!(
            classify("https://res.cloudinary.com/demo/video/upload/v1/thumb.jpg"),
            MediaKind::Video
        );
    }

    #[test]
    fn test_audio_extension_wins_over_shared_segment() {
        for url in [
            "https://res.cloudinary.com/demo/video/upload/v1/story.mp3",
            "https://res.cloudinary.com/demo/video/upload/q_auto/story.m4a?x=1",
            "https://res.cloudinary.com/demo/VIDEO/UPLOAD/story.OGG",
        ] {
            assert_eq!(classify(url), MediaKind::Audio, "{}", url);
        }
    }

    #[test]
    fn test_unknown() {
        assert_eq!(classify(""), MediaKind::Unknown);
        assert_eq!(classify("https://example.com/"), MediaKind::Unknown);
        assert_eq!(classify("https://example.com/docs/readme"), MediaKind::Unknown);
        assert_eq!(classify("https://example.com/report.pdf"), MediaKind::Unknown);
        assert_eq!(classify("not a url"), MediaKind::Unknown);
    }

    #[test]
    fn test_host_name_is_ignored() {
        assert_eq!(classify("https://cdn.mp3.example/page"), MediaKind::Unknown);
        assert_eq!(classify("https://img.png.example"), MediaKind::Unknown);
    }

    #[test]
    fn test_extension_must_end_token() {
        assert_eq!(classify("https://x/file.mp3x"), MediaKind::Unknown);
        assert_eq!(classify("https://x/a.tiff"), MediaKind::Image);
        assert_eq!(classify("https://x/a.webp"), MediaKind::Image);
    }

    #[test]
    fn test_audio_checked_before_video_and_image() {
        assert_eq!(classify("https://x/cover.jpg.mp3"), MediaKind::Audio);
        assert_eq!(classify("https://x/poster.png.mp4"), MediaKind::Video);
    }

    #[test]
    fn test_relative_path() {
        assert_eq!(classify("uploads/a.gif"), MediaKind::Image);
    }
}
