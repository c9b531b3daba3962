//! Member entity and channel identifier value object
//!
//! A member's identity is its YouTube channel identifier. The published
//! representation of a channel varies (canonical `UC` id, handle, custom or
//! legacy user path, or an agency slug when no link is known yet), so the
//! identifier is modelled as a tagged variant rather than a bare string.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

static CHANNEL_PATH_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"youtube\.com/channel/(UC[\w-]+)").unwrap());
static HANDLE_PATH_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"/@([^/?]+)").unwrap());
static CUSTOM_PATH_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"/c/([^/?]+)").unwrap());
static USER_PATH_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"/user/([^/?]+)").unwrap());

/// Prefix under which pending agency slugs are stored in the database.
const PENDING_PREFIX: &str = "niji_";

/// The two talent agencies tracked by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Group {
    Hololive,
    Nijisanji,
}

impl Group {
    pub const ALL: [Group; 2] = [Group::Hololive, Group::Nijisanji];

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Group::Hololive => "hololive",
            Group::Nijisanji => "nijisanji",
        }
    }

    /// Parse the stored group tag. Returns `None` for anything but the two
    /// known tags.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "hololive" => Some(Group::Hololive),
            "nijisanji" => Some(Group::Nijisanji),
            _ => None,
        }
    }
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Channel identifier in one of its three shapes.
///
/// - `Canonical` is the platform's stable `UC`-prefixed id.
/// - `Fallback` is a synthesized `@handle` / `c_name` / `user_name` stand-in
///   used when canonicalization failed; stable enough to store, never
///   refreshed over the network.
/// - `Pending` is an agency slug recorded when no link was available at
///   roster-extraction time; it is retried on every video refresh and
///   migrated in place once resolved.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ChannelId {
    Canonical(String),
    Fallback(String),
    Pending(String),
}

impl ChannelId {
    /// Reconstruct an identifier from its stored string form.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        if raw.is_empty() {
            return None;
        }
        if let Some(slug) = raw.strip_prefix(PENDING_PREFIX) {
            return Some(ChannelId::Pending(slug.to_string()));
        }
        if raw.starts_with("UC") {
            return Some(ChannelId::Canonical(raw.to_string()));
        }
        Some(ChannelId::Fallback(raw.to_string()))
    }

    /// Derive an identifier from a YouTube URL without any network round
    /// trip. A `/channel/UC…` path yields the canonical id directly; handle,
    /// custom and legacy user paths yield the synthesized fallback form.
    #[must_use]
    pub fn from_youtube_url(url: &str) -> Option<Self> {
        if url.is_empty() {
            return None;
        }

        if let Some(caps) = CHANNEL_PATH_RE.captures(url) {
            return Some(ChannelId::Canonical(caps[1].to_string()));
        }

        // Handle/custom/user paths cannot be converted to a UC id without
        // fetching the page; synthesize a stable non-canonical identifier.
        if url.contains("/@") || url.contains("/c/") || url.contains("/user/") {
            if url.contains("/@") {
                if let Some(caps) = HANDLE_PATH_RE.captures(url) {
                    return Some(ChannelId::Fallback(format!("@{}", &caps[1])));
                }
            }
            if url.contains("/c/") {
                if let Some(caps) = CUSTOM_PATH_RE.captures(url) {
                    return Some(ChannelId::Fallback(format!("c_{}", &caps[1])));
                }
            }
            if url.contains("/user/") {
                if let Some(caps) = USER_PATH_RE.captures(url) {
                    return Some(ChannelId::Fallback(format!("user_{}", &caps[1])));
                }
            }
        }

        None
    }

    #[must_use]
    pub fn is_canonical(&self) -> bool {
        matches!(self, ChannelId::Canonical(_))
    }

    #[must_use]
    pub fn is_pending(&self) -> bool {
        matches!(self, ChannelId::Pending(_))
    }

    /// The string form written to the `channel_id` columns.
    #[must_use]
    pub fn storage_key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelId::Canonical(id) | ChannelId::Fallback(id) => f.write_str(id),
            ChannelId::Pending(slug) => write!(f, "{PENDING_PREFIX}{slug}"),
        }
    }
}

impl Serialize for ChannelId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ChannelId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        ChannelId::parse(&raw)
            .ok_or_else(|| serde::de::Error::custom("channel identifier must be non-empty"))
    }
}

/// A tracked talent, keyed by channel identifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Member {
    /// Database row id; 0 until the member has been stored.
    pub id: i64,
    pub name: String,
    pub group: Group,
    pub generation: String,
    pub channel_id: ChannelId,
    pub youtube_url: String,
    pub twitter_url: Option<String>,
    pub icon_url: Option<String>,
    /// User-set flag owned by the presentation layer; refresh never writes it.
    pub is_favorite: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_id_from_channel_path() {
        let id = ChannelId::from_youtube_url("https://www.youtube.com/channel/UCabc_123-xyz");
        assert_eq!(id, Some(ChannelId::Canonical("UCabc_123-xyz".to_string())));
    }

    #[test]
    fn fallback_ids_from_handle_custom_and_user_paths() {
        assert_eq!(
            ChannelId::from_youtube_url("https://www.youtube.com/@somehandle?sub=1"),
            Some(ChannelId::Fallback("@somehandle".to_string()))
        );
        assert_eq!(
            ChannelId::from_youtube_url("https://www.youtube.com/c/SomeName"),
            Some(ChannelId::Fallback("c_SomeName".to_string()))
        );
        assert_eq!(
            ChannelId::from_youtube_url("https://www.youtube.com/user/legacyname/videos"),
            Some(ChannelId::Fallback("user_legacyname".to_string()))
        );
    }

    #[test]
    fn unrecognized_urls_yield_nothing() {
        assert_eq!(ChannelId::from_youtube_url(""), None);
        assert_eq!(
            ChannelId::from_youtube_url("https://www.youtube.com/watch?v=xyz"),
            None
        );
    }

    #[test]
    fn storage_round_trip() {
        for raw in ["UCabc", "@handle", "c_name", "user_name", "niji_some-slug"] {
            let id = ChannelId::parse(raw).unwrap();
            assert_eq!(id.storage_key(), raw);
        }
        assert_eq!(
            ChannelId::parse("niji_some-slug"),
            Some(ChannelId::Pending("some-slug".to_string()))
        );
        assert_eq!(ChannelId::parse(""), None);
    }
}
