use html_escape::{encode_double_quoted_attribute, encode_text};
use url::Url;

use super::EmbedType;
use super::classify::capture_id;

const IFRAME_ALLOW: &str =
    "accelerometer; autoplay; clipboard-write; encrypted-media; gyroscope; picture-in-picture";

const INFO_ICON: &str = r#"<svg viewBox="0 0 24 24" fill="none" stroke="currentColor" stroke-width="2"><circle cx="12" cy="12" r="10"></circle><line x1="12" y1="8" x2="12" y2="16"></line><line x1="8" y1="12" x2="16" y2="12"></line></svg>"#;

const LINK_ICON: &str = r#"<svg viewBox="0 0 24 24" fill="none" stroke="currentColor" stroke-width="2"><path d="M10 13a5 5 0 0 0 7.54.54l3-3a5 5 0 0 0-7.07-7.07l-1.72 1.71"></path><path d="M14 11a5 5 0 0 0-7.54-.54l-3 3a5 5 0 0 0 7.07 7.07l1.71-1.71"></path></svg>"#;

/// Favicon service URL for a host.
pub fn favicon_url(host: &str) -> String {
    format!("https://www.google.com/s2/favicons?domain={host}&sz=64")
}

/// Render embed markup for `url` as `embed_type`.
///
/// Never fails: if the identifier cannot be extracted the result is an
/// open-link card, and a generic URL that does not parse becomes a bare link.
pub fn generate(url: &str, embed_type: EmbedType) -> String {
    let markup = match embed_type {
        EmbedType::Image => Some(image(url)),
        EmbedType::Generic => Some(generic(url)),
        _ => capture_id(url, embed_type).map(|id| platform(url, embed_type, &id)),
    };
    markup.unwrap_or_else(|| {
        log::warn!("no {embed_type} identifier in {url:?}, falling back to link card");
        link_card(url)
    })
}

fn host_of(url: &str) -> Option<String> {
    Url::parse(url)
        .ok()
        .and_then(|parsed| parsed.host_str().map(str::to_string))
}

fn platform(url: &str, embed_type: EmbedType, id: &str) -> String {
    let site = match embed_type {
        EmbedType::Youtube => "YouTube",
        EmbedType::YoutubeShorts => "YouTube Shorts",
        EmbedType::Vimeo => "Vimeo",
        EmbedType::Twitter => "twitter / x",
        EmbedType::Facebook | EmbedType::FacebookVideo | EmbedType::FacebookReels => "Facebook",
        EmbedType::Instagram | EmbedType::InstagramReels => "Instagram",
        EmbedType::Tiktok => "TikTok",
        EmbedType::Image | EmbedType::Generic => "Link",
    };
    let media = match embed_type {
        EmbedType::Youtube | EmbedType::YoutubeShorts => {
            iframe(&format!("https://www.youtube.com/embed/{id}"))
        }
        EmbedType::Vimeo => iframe(&format!("https://player.vimeo.com/video/{id}")),
        EmbedType::Twitter => iframe(&format!(
            "https://platform.twitter.com/embed/Tweet.html?id={id}&theme=dark&hide_thread=false"
        )),
        EmbedType::Tiktok => iframe(&format!("https://www.tiktok.com/embed/{id}")),
        EmbedType::Facebook => iframe(&facebook_plugin("post.php", url, "width=500&height=400")),
        EmbedType::FacebookVideo => iframe(&facebook_plugin(
            "video.php",
            url,
            "width=500&height=280&show_text=false",
        )),
        EmbedType::FacebookReels => iframe(&facebook_plugin(
            "video.php",
            url,
            "width=500&height=877&show_text=false",
        )),
        EmbedType::Instagram => instagram_placeholder(url, &format!("https://www.instagram.com/p/{id}/")),
        EmbedType::InstagramReels => {
            instagram_placeholder(url, &format!("https://www.instagram.com/reel/{id}/"))
        }
        EmbedType::Image | EmbedType::Generic => String::new(),
    };
    let domain = host_of(url).unwrap_or_else(|| url.to_string());
    let data = match embed_type {
        EmbedType::Twitter => format!(r#" data-tweet-id="{}""#, encode_double_quoted_attribute(id)),
        _ => String::new(),
    };
    format!(
        r#"<div class="link-preview link-preview--{kind}"{data}><a href="{href}" target="_blank" rel="noopener noreferrer"><div class="link-preview__content"><div class="link-preview__media">{media}</div><div class="link-preview__info"><div class="link-preview__site">{site}</div><div class="link-preview__url">{INFO_ICON}{domain}</div></div></div></a></div>"#,
        kind = embed_type.as_str(),
        href = encode_double_quoted_attribute(url),
        domain = encode_text(&domain),
    )
}

fn iframe(src: &str) -> String {
    format!(
        r#"<iframe src="{}" frameborder="0" allow="{IFRAME_ALLOW}" allowfullscreen></iframe>"#,
        encode_double_quoted_attribute(src)
    )
}

fn facebook_plugin(plugin: &str, url: &str, params: &str) -> String {
    format!(
        "https://www.facebook.com/plugins/{plugin}?href={}&{params}",
        urlencoding::encode(url)
    )
}

/// Placeholder in the shape the Instagram embed script rewrites.
fn instagram_placeholder(url: &str, permalink: &str) -> String {
    format!(
        r#"<blockquote class="instagram-media" data-instgrm-permalink="{}" data-instgrm-version="14"><a href="{}" target="_blank" rel="noopener noreferrer">View this post on Instagram</a></blockquote>"#,
        encode_double_quoted_attribute(permalink),
        encode_double_quoted_attribute(url),
    )
}

fn image(url: &str) -> String {
    let href = encode_double_quoted_attribute(url);
    format!(
        r#"<a class="link-preview__image" href="{href}" target="_blank" rel="noopener noreferrer"><img src="{href}" alt="Image"></a>"#
    )
}

fn generic(url: &str) -> String {
    let Some(host) = host_of(url) else {
        log::warn!("could not parse {url:?}, rendering bare link");
        return bare_link(url);
    };
    let href = encode_double_quoted_attribute(url);
    let favicon = encode_double_quoted_attribute(&favicon_url(&host)).into_owned();
    let host = encode_text(&host);
    format!(
        r#"<div class="link-preview link-preview--generic"><a href="{href}" target="_blank" rel="noopener noreferrer"><div class="link-preview__content"><div class="link-preview__icon"><img src="{favicon}" alt=""></div><div class="link-preview__details"><div class="link-preview__site">{host}</div><div class="link-preview__title">{host}</div><div class="link-preview__url">{LINK_ICON}{text}</div></div></div></a></div>"#,
        text = encode_text(url),
    )
}

/// Card used when a platform URL yields no identifier.
fn link_card(url: &str) -> String {
    let domain = host_of(url).unwrap_or_else(|| url.to_string());
    format!(
        r#"<div class="link-preview"><a href="{href}" target="_blank" rel="noopener noreferrer"><div class="link-preview__content"><div class="link-preview__info"><div class="link-preview__site">Link</div><div class="link-preview__title">{title}</div><div class="link-preview__url">{INFO_ICON}{domain}</div></div></div></a></div>"#,
        href = encode_double_quoted_attribute(url),
        title = encode_text(url),
        domain = encode_text(&domain),
    )
}

fn bare_link(url: &str) -> String {
    format!(
        r#"<a href="{}" target="_blank" rel="noopener noreferrer">{}</a>"#,
        encode_double_quoted_attribute(url),
        encode_text(url)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_youtu_be_renders_iframe_with_video_id() {
        let markup = generate("https://youtu.be/dQw4w9WgXcQ", EmbedType::YoutubeShorts);
        assert!(markup.contains(r#"<iframe src="https://www.youtube.com/embed/dQw4w9WgXcQ""#));
        assert!(markup.contains("link-preview--youtube-shorts"));
    }

    #[test]
    fn test_generic_includes_host_and_favicon() {
        let markup = generate("https://example.com/some-page", EmbedType::Generic);
        assert!(markup.contains("favicons?domain=example.com"));
        assert!(markup.contains(r#"<div class="link-preview__title">example.com</div>"#));
        assert!(markup.contains("https://example.com/some-page"));
    }

    #[test]
    fn test_unparseable_generic_falls_back_to_bare_link() {
        let markup = generate("https://", EmbedType::Generic);
        assert_eq!(
            markup,
            r#"<a href="https://" target="_blank" rel="noopener noreferrer">https://</a>"#
        );
    }

    #[test]
    fn test_missing_identifier_falls_back_to_link_card() {
        let markup = generate("https://example.com/not-a-video", EmbedType::Vimeo);
        assert!(markup.contains(r#"<div class="link-preview__site">Link</div>"#));
        assert!(!markup.contains("<iframe"));
    }

    #[test]
    fn test_image_is_direct_reference() {
        let markup = generate("https://example.com/a.png", EmbedType::Image);
        assert!(markup.contains(r#"<img src="https://example.com/a.png" alt="Image">"#));
    }

    #[test]
    fn test_instagram_emits_processor_placeholder() {
        let markup = generate("https://www.instagram.com/p/Cx1abc/", EmbedType::Instagram);
        assert!(markup.contains(r#"data-instgrm-permalink="https://www.instagram.com/p/Cx1abc/""#));
    }

    #[test]
    fn test_facebook_plugin_encodes_source_url() {
        let markup = generate(
            "https://www.facebook.com/page/videos/123",
            EmbedType::FacebookVideo,
        );
        assert!(markup.contains("video.php?href=https%3A%2F%2Fwww.facebook.com%2Fpage%2Fvideos%2F123"));
    }

    #[test]
    fn test_attribute_values_are_escaped() {
        let markup = generate("https://example.com/?q=\"x\"", EmbedType::Generic);
        assert!(markup.contains(r#"href="https://example.com/?q=&quot;x&quot;""#));
    }
}
