use regex::{Regex, RegexBuilder};
use std::sync::OnceLock;

use super::EmbedType;

struct Pattern {
    embed_type: EmbedType,
    regex: Regex,
}

/// Patterns in precedence order, most specific first.
///
/// Platform patterns capture the content identifier in group 1. Shorts come
/// before regular YouTube so `youtu.be` links land on the shorts player, and
/// within a platform reels precede posts precede videos.
const PATTERN_SOURCES: &[(EmbedType, &str)] = &[
    (
        EmbedType::YoutubeShorts,
        r"^https?://(?:(?:www\.|m\.)?youtube\.com/shorts/|youtu\.be/)([a-z0-9_-]+)",
    ),
    (
        EmbedType::Youtube,
        r"^https?://(?:www\.|m\.)?youtube\.com/(?:watch\?v=|embed/)([a-z0-9_-]+)",
    ),
    (
        EmbedType::InstagramReels,
        r"^https?://(?:www\.)?instagram\.com/reels?/([a-z0-9_-]+)",
    ),
    (
        EmbedType::Instagram,
        r"^https?://(?:www\.)?instagram\.com/p/([a-z0-9_-]+)",
    ),
    (
        EmbedType::FacebookReels,
        r"^https?://(?:www\.|m\.)?facebook\.com/reel/([a-z0-9_-]+)",
    ),
    (
        EmbedType::Facebook,
        r"^https?://(?:www\.|m\.)?facebook\.com/[a-z0-9_.]+/posts/([a-z0-9_-]+)",
    ),
    (
        EmbedType::FacebookVideo,
        r"^https?://(?:www\.|m\.)?facebook\.com/[a-z0-9_.]+/videos/([a-z0-9_-]+)",
    ),
    (
        EmbedType::Tiktok,
        r"^https?://(?:(?:www\.)?tiktok\.com/@[\w.]+/video/|vm\.tiktok\.com/)([a-z0-9]+)",
    ),
    (
        EmbedType::Twitter,
        r"^https?://(?:www\.|mobile\.)?(?:twitter|x)\.com/[a-z0-9_]+/status/([0-9]+)",
    ),
    (
        EmbedType::Vimeo,
        r"^https?://(?:www\.)?vimeo\.com/([0-9]+)",
    ),
    (
        EmbedType::Image,
        r"^https?://\S+\.(?:jpg|jpeg|png|gif|webp|svg)(?:\?\S*)?$",
    ),
    (EmbedType::Generic, r"^https?://\S+$"),
];

fn patterns() -> &'static [Pattern] {
    static PATTERNS: OnceLock<Vec<Pattern>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        PATTERN_SOURCES
            .iter()
            .map(|(embed_type, source)| Pattern {
                embed_type: *embed_type,
                regex: RegexBuilder::new(source)
                    .case_insensitive(true)
                    .build()
                    .expect("Invalid embed pattern"),
            })
            .collect()
    })
}

fn pattern_for(embed_type: EmbedType) -> Option<&'static Pattern> {
    patterns().iter().find(|p| p.embed_type == embed_type)
}

/// Classify a URL by testing each pattern in precedence order.
///
/// Any absolute `http(s)` URL without whitespace classifies as at least
/// [`EmbedType::Generic`]; `None` means the input is not such a URL.
pub fn classify(url: &str) -> Option<EmbedType> {
    let embed_type = patterns()
        .iter()
        .find(|p| p.regex.is_match(url))
        .map(|p| p.embed_type);
    log::debug!("classified {url:?} as {embed_type:?}");
    embed_type
}

/// Extract the content identifier captured by the pattern for `embed_type`.
pub fn capture_id(url: &str, embed_type: EmbedType) -> Option<String> {
    let captures = pattern_for(embed_type)?.regex.captures(url)?;
    captures.get(1).map(|m| m.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("https://youtu.be/dQw4w9WgXcQ", EmbedType::YoutubeShorts)]
    #[case("https://www.youtube.com/shorts/abc123XYZ", EmbedType::YoutubeShorts)]
    #[case("https://www.youtube.com/watch?v=dQw4w9WgXcQ", EmbedType::Youtube)]
    #[case("https://youtube.com/embed/dQw4w9WgXcQ", EmbedType::Youtube)]
    #[case("https://instagram.com/reel/ABC123", EmbedType::InstagramReels)]
    #[case("https://www.instagram.com/reels/ABC123", EmbedType::InstagramReels)]
    #[case("https://www.instagram.com/p/Cx1_abc-9/", EmbedType::Instagram)]
    #[case("https://www.facebook.com/reel/123456789", EmbedType::FacebookReels)]
    #[case("https://www.facebook.com/somepage/posts/pfbid02abc", EmbedType::Facebook)]
    #[case("https://www.facebook.com/somepage/videos/987654321", EmbedType::FacebookVideo)]
    #[case(
        "https://www.tiktok.com/@some.user/video/7234567890123456789",
        EmbedType::Tiktok
    )]
    #[case("https://twitter.com/rustlang/status/1234567890", EmbedType::Twitter)]
    #[case("https://x.com/rustlang/status/1234567890", EmbedType::Twitter)]
    #[case("https://vimeo.com/76979871", EmbedType::Vimeo)]
    #[case("https://example.com/cat.PNG", EmbedType::Image)]
    #[case("https://example.com/cat.jpg?size=large", EmbedType::Image)]
    #[case("https://example.com/some-page", EmbedType::Generic)]
    #[case("http://localhost:8080/", EmbedType::Generic)]
    fn test_classify_precedence(#[case] url: &str, #[case] expected: EmbedType) {
        assert_eq!(classify(url), Some(expected));
    }

    #[rstest]
    #[case("ftp://example.com/file")]
    #[case("example.com")]
    #[case("https://example.com/has space")]
    #[case("")]
    fn test_classify_rejects_non_http(#[case] input: &str) {
        assert_eq!(classify(input), None);
    }

    #[test]
    fn test_platform_host_must_be_the_actual_host() {
        // A youtube path embedded in another site's query is not a video
        assert_eq!(
            classify("https://example.com/?next=youtube.com/watch?v=abc"),
            Some(EmbedType::Generic)
        );
    }

    #[test]
    fn test_vimeo_without_numeric_id_is_generic() {
        assert_eq!(
            classify("https://vimeo.com/channels/staffpicks"),
            Some(EmbedType::Generic)
        );
    }

    #[test]
    fn test_capture_id_uses_the_classifying_pattern() {
        assert_eq!(
            capture_id("https://youtu.be/dQw4w9WgXcQ", EmbedType::YoutubeShorts),
            Some("dQw4w9WgXcQ".to_string())
        );
        assert_eq!(
            capture_id("https://x.com/a/status/42", EmbedType::Twitter),
            Some("42".to_string())
        );
        assert_eq!(capture_id("https://example.com", EmbedType::Vimeo), None);
        assert_eq!(capture_id("https://example.com", EmbedType::Generic), None);
    }
}
