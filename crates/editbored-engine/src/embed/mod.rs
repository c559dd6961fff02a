//! URL classification and embed markup generation.
//!
//! Both halves are pure: [`classify`] decides what a URL points at from its
//! shape alone, and [`generate`] templates markup from the URL and the
//! identifiers captured while classifying. Nothing here touches the network.

pub mod classify;
pub mod generate;

use serde::{Deserialize, Serialize};
use std::fmt;

pub use classify::classify;
pub use generate::generate;

/// What kind of content a URL refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EmbedType {
    Youtube,
    YoutubeShorts,
    Vimeo,
    Twitter,
    Facebook,
    FacebookVideo,
    FacebookReels,
    Instagram,
    InstagramReels,
    Tiktok,
    Image,
    Generic,
}

impl EmbedType {
    /// Stable kebab-case name, also used as the CSS modifier in markup.
    pub fn as_str(&self) -> &'static str {
        match self {
            EmbedType::Youtube => "youtube",
            EmbedType::YoutubeShorts => "youtube-shorts",
            EmbedType::Vimeo => "vimeo",
            EmbedType::Twitter => "twitter",
            EmbedType::Facebook => "facebook",
            EmbedType::FacebookVideo => "facebook-video",
            EmbedType::FacebookReels => "facebook-reels",
            EmbedType::Instagram => "instagram",
            EmbedType::InstagramReels => "instagram-reels",
            EmbedType::Tiktok => "tiktok",
            EmbedType::Image => "image",
            EmbedType::Generic => "generic",
        }
    }

    /// Social and video platform permalinks, which are subject to the
    /// minimum-length completeness heuristic.
    pub fn is_social(&self) -> bool {
        !matches!(self, EmbedType::Image | EmbedType::Generic)
    }

    /// Embeds whose markup is a placeholder rewritten later by a platform
    /// script.
    pub fn requires_processor(&self) -> bool {
        matches!(self, EmbedType::Instagram | EmbedType::InstagramReels)
    }
}

impl fmt::Display for EmbedType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified URL together with the markup generated for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbedDescriptor {
    pub source_url: String,
    pub embed_type: EmbedType,
    pub markup: String,
}

impl EmbedDescriptor {
    /// Classify and render `url`. Returns `None` for anything that is not an
    /// absolute `http(s)` URL.
    pub fn from_url(url: &str) -> Option<Self> {
        let embed_type = classify(url)?;
        Some(Self::with_type(url, embed_type))
    }

    pub fn with_type(url: &str, embed_type: EmbedType) -> Self {
        Self {
            source_url: url.to_string(),
            embed_type,
            markup: generate(url, embed_type),
        }
    }
}
