//! Channel video feed parsing
//!
//! Parses a channel's Atom feed into normalized video records. Entries
//! missing an id, title, link, or publish time are skipped individually so
//! one malformed entry never costs the rest of the feed.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use tracing::debug;

use crate::infrastructure::config::sites;

use super::error::ExtractionResult;

static TRAILING_OFFSET_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[+-]\d{2}:\d{2}$").unwrap());

/// Prefix of composite Atom entry ids, e.g. `yt:video:dQw4w9WgXcQ`.
const COMPOSITE_ID_PREFIX: &str = "yt:video:";

/// Normalized feed entry, ready for collab detection and persistence.
#[derive(Debug, Clone)]
pub struct FeedVideo {
    pub video_id: String,
    pub title: String,
    pub url: String,
    pub published_at: DateTime<Utc>,
    pub thumbnail_url: String,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AtomFeed {
    #[serde(rename = "entry", default)]
    entries: Vec<AtomEntry>,
}

#[derive(Debug, Deserialize)]
struct AtomEntry {
    #[serde(default)]
    id: Option<String>,
    #[serde(rename = "yt:videoId", default)]
    video_id: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(rename = "link", default)]
    links: Vec<AtomLink>,
    #[serde(default)]
    published: Option<String>,
    #[serde(rename = "media:group", default)]
    media: Option<MediaGroup>,
}

#[derive(Debug, Deserialize)]
struct AtomLink {
    #[serde(rename = "@rel", default)]
    rel: Option<String>,
    #[serde(rename = "@href", default)]
    href: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MediaGroup {
    #[serde(rename = "media:thumbnail", default)]
    thumbnails: Vec<MediaThumbnail>,
    #[serde(rename = "media:description", default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MediaThumbnail {
    #[serde(rename = "@url", default)]
    url: Option<String>,
}

/// Parse a feed timestamp. The trailing offset (or `Z`) is stripped and the
/// remainder read as a naive instant, so `12:30:00+09:00` and `12:30:00`
/// land on the same value. Anything unparseable becomes the current instant
/// rather than an error; a video must never end up without a publish time.
#[must_use]
pub fn parse_feed_timestamp(raw: &str) -> DateTime<Utc> {
    let stripped = TRAILING_OFFSET_RE.replace(raw.trim(), "");
    let stripped = stripped.trim_end_matches('Z');

    NaiveDateTime::parse_from_str(stripped, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(stripped, "%Y-%m-%dT%H:%M:%S"))
        .map(|naive| Utc.from_utc_datetime(&naive))
        .unwrap_or_else(|_| Utc::now())
}

/// Parse a channel's Atom feed document into normalized video records.
pub fn parse_feed(xml: &str) -> ExtractionResult<Vec<FeedVideo>> {
    let feed: AtomFeed = quick_xml::de::from_str(xml)?;

    let mut videos = Vec::new();
    for entry in feed.entries {
        match normalize_entry(entry) {
            Some(video) => videos.push(video),
            None => debug!("Skipping feed entry missing id, title, link, or publish time"),
        }
    }
    Ok(videos)
}

fn normalize_entry(entry: AtomEntry) -> Option<FeedVideo> {
    let video_id = entry
        .video_id
        .filter(|id| !id.is_empty())
        .or_else(|| composite_entry_id(entry.id.as_deref()))?;

    let title = entry.title?;

    let url = entry
        .links
        .iter()
        .find(|link| link.href.is_some() && matches!(link.rel.as_deref(), None | Some("alternate")))
        .and_then(|link| link.href.clone())
        .or_else(|| entry.links.iter().find_map(|link| link.href.clone()))?;

    let published_at = parse_feed_timestamp(&entry.published?);

    let thumbnail_url = entry
        .media
        .as_ref()
        .and_then(|group| group.thumbnails.iter().find_map(|t| t.url.clone()))
        .filter(|u| !u.is_empty())
        .unwrap_or_else(|| sites::youtube_thumbnail_url(&video_id));

    let description = entry
        .media
        .and_then(|group| group.description)
        .filter(|d| !d.is_empty());

    Some(FeedVideo {
        video_id,
        title,
        url,
        published_at,
        thumbnail_url,
        description,
    })
}

/// Split the last segment off a composite `yt:video:<id>` entry id.
fn composite_entry_id(id: Option<&str>) -> Option<String> {
    let id = id?;
    if !id.starts_with(COMPOSITE_ID_PREFIX) {
        return None;
    }
    id.rsplit(':')
        .next()
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    const SAMPLE_FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns:yt="http://www.youtube.com/xml/schemas/2015"
      xmlns:media="http://search.yahoo.com/mrss/"
      xmlns="http://www.w3.org/2005/Atom">
  <title>Channel uploads</title>
  <entry>
    <id>yt:video:abc123DEF45</id>
    <yt:videoId>abc123DEF45</yt:videoId>
    <title>First stream</title>
    <link rel="alternate" href="https://www.youtube.com/watch?v=abc123DEF45"/>
    <published>2024-01-15T12:30:00+09:00</published>
    <media:group>
      <media:title>First stream</media:title>
      <media:thumbnail url="https://i.ytimg.com/vi/abc123DEF45/hqdefault.jpg" width="480" height="360"/>
      <media:description>Playing a game with Bob</media:description>
    </media:group>
  </entry>
  <entry>
    <id>yt:video:xyz789GHI01</id>
    <title>Second stream</title>
    <link rel="alternate" href="https://www.youtube.com/watch?v=xyz789GHI01"/>
    <published>2024-01-14T08:00:00+00:00</published>
  </entry>
  <entry>
    <id>not-a-video-id</id>
    <title>Broken entry</title>
    <link rel="alternate" href="https://www.youtube.com/watch?v=nope"/>
    <published>2024-01-13T00:00:00+00:00</published>
  </entry>
</feed>"#;

    #[test]
    fn parses_entries_and_skips_unidentifiable_ones() {
        let videos = parse_feed(SAMPLE_FEED).unwrap();
        assert_eq!(videos.len(), 2);

        let first = &videos[0];
        assert_eq!(first.video_id, "abc123DEF45");
        assert_eq!(first.title, "First stream");
        assert_eq!(first.url, "https://www.youtube.com/watch?v=abc123DEF45");
        assert_eq!(
            first.thumbnail_url,
            "https://i.ytimg.com/vi/abc123DEF45/hqdefault.jpg"
        );
        assert_eq!(first.description.as_deref(), Some("Playing a game with Bob"));
    }

    #[test]
    fn video_id_falls_back_to_composite_entry_id() {
        let videos = parse_feed(SAMPLE_FEED).unwrap();
        assert_eq!(videos[1].video_id, "xyz789GHI01");
    }

    #[test]
    fn missing_thumbnail_is_synthesized_from_video_id() {
        let videos = parse_feed(SAMPLE_FEED).unwrap();
        assert_eq!(
            videos[1].thumbnail_url,
            "https://i.ytimg.com/vi/xyz789GHI01/mqdefault.jpg"
        );
    }

    #[test]
    fn timestamp_offset_is_stripped_not_applied() {
        let expected = Utc.from_utc_datetime(
            &NaiveDate::from_ymd_opt(2024, 1, 15)
                .unwrap()
                .and_hms_opt(12, 30, 0)
                .unwrap(),
        );
        assert_eq!(parse_feed_timestamp("2024-01-15T12:30:00+09:00"), expected);
        assert_eq!(parse_feed_timestamp("2024-01-15T12:30:00Z"), expected);
        // The offset-less form takes the fallback format and must land on
        // the same instant.
        assert_eq!(parse_feed_timestamp("2024-01-15T12:30:00"), expected);
    }

    #[test]
    fn unparseable_timestamp_defaults_to_now() {
        let before = Utc::now();
        let parsed = parse_feed_timestamp("not a date");
        let after = Utc::now();
        assert!(parsed >= before && parsed <= after);
    }

    #[test]
    fn empty_feed_yields_no_videos() {
        let xml = r#"<feed xmlns="http://www.w3.org/2005/Atom"><title>empty</title></feed>"#;
        assert!(parse_feed(xml).unwrap().is_empty());
    }
}
