//! Roster extractor for the nijisanji talents site
//!
//! The talents page is a client-rendered app; the full roster ships inside a
//! `__NEXT_DATA__` JSON island. Field names in that payload have drifted
//! across site versions, so social links are checked in two alternately
//! named containers and icons are tried through known role keys before
//! scanning everything with a url.

use std::sync::Arc;

use async_trait::async_trait;
use scraper::{Html, Selector};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::domain::{ChannelId, Group};
use crate::infrastructure::config::sites;
use crate::infrastructure::http_client::HttpClient;

use super::channel_resolver::ChannelIdResolver;
use super::error::{ExtractionError, ExtractionResult};
use super::{RosterExtractor, TalentCandidate};

const DATA_ISLAND_MARKER: &str = "__NEXT_DATA__";
const DEFAULT_GENERATION: &str = "にじさんじ";
/// Image role keys known to carry the talent portrait, in preference order.
const IMAGE_ROLE_KEYS: [&str; 3] = ["head", "main", "card"];

/// Raw per-talent fields lifted out of the data island.
#[derive(Debug)]
struct LiverFields {
    name: String,
    slug: String,
    youtube_url: String,
    twitter_url: String,
    icon_url: String,
    affiliation: String,
}

pub struct NijisanjiExtractor {
    http: Arc<HttpClient>,
    resolver: ChannelIdResolver,
    talents_url: String,
    data_island_selector: Selector,
}

impl NijisanjiExtractor {
    pub fn new(http: Arc<HttpClient>) -> ExtractionResult<Self> {
        let selector = format!("script#{DATA_ISLAND_MARKER}");
        let data_island_selector = Selector::parse(&selector)
            .map_err(|e| ExtractionError::invalid_selector(&selector, e))?;
        Ok(Self {
            resolver: ChannelIdResolver::new(http.clone())?,
            http,
            talents_url: sites::NIJISANJI_TALENTS_URL.to_string(),
            data_island_selector,
        })
    }

    /// Pull the embedded JSON payload out of the page.
    fn parse_data_island(&self, raw: &str) -> ExtractionResult<String> {
        let html = Html::parse_document(raw);
        html.select(&self.data_island_selector)
            .next()
            .map(|script| script.text().collect::<String>())
            .ok_or_else(|| ExtractionError::DataIslandMissing {
                marker: DATA_ISLAND_MARKER.to_string(),
            })
    }

    fn parse_liver(&self, liver: &Value) -> Option<LiverFields> {
        let name = string_field(liver, "name")
            .or_else(|| string_field(liver, "enName"))?
            .to_string();

        let slug = string_field(liver, "slug").unwrap_or_default().to_string();

        let youtube_url = social_link(liver, "youtube");
        let mut twitter_url = social_link(liver, "twitter");
        // Some payload versions carry a bare handle instead of a URL.
        if !twitter_url.is_empty() && !twitter_url.starts_with("http") {
            twitter_url = format!("https://twitter.com/{twitter_url}");
        }

        let affiliation = string_field(liver, "affiliation")
            .unwrap_or_default()
            .to_string();

        Some(LiverFields {
            name,
            slug,
            youtube_url,
            twitter_url,
            icon_url: extract_icon(liver),
            affiliation,
        })
    }
}

fn string_field<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

/// Check the two alternately named link containers for a social URL.
fn social_link(liver: &Value, key: &str) -> String {
    for container in ["socials", "socialLinks"] {
        if let Some(url) = liver
            .get(container)
            .and_then(|links| links.get(key))
            .and_then(Value::as_str)
        {
            if !url.is_empty() {
                return url.to_string();
            }
        }
    }
    String::new()
}

fn extract_icon(liver: &Value) -> String {
    let Some(images) = liver.get("images") else {
        return String::new();
    };

    for key in IMAGE_ROLE_KEYS {
        let Some(value) = images.get(key) else {
            continue;
        };
        let icon = match value {
            Value::Object(_) => value.get("url").and_then(Value::as_str).unwrap_or(""),
            Value::String(s) => s.as_str(),
            _ => "",
        };
        if !icon.is_empty() {
            // Root-relative portrait paths are served from the site origin.
            return if icon.starts_with('/') {
                format!("{}{icon}", sites::NIJISANJI_BASE_URL)
            } else {
                icon.to_string()
            };
        }
    }

    // Fallback: first image entry of any role that carries a url.
    if let Some(map) = images.as_object() {
        for value in map.values() {
            if let Some(url) = value.get("url").and_then(Value::as_str) {
                if !url.is_empty() {
                    return url.to_string();
                }
            }
        }
    }
    String::new()
}

#[async_trait]
impl RosterExtractor for NijisanjiExtractor {
    fn group(&self) -> Group {
        Group::Nijisanji
    }

    async fn extract(&self) -> ExtractionResult<Vec<TalentCandidate>> {
        let html = self.http.fetch_page(&self.talents_url).await;
        if html.is_empty() {
            return Err(ExtractionError::EmptyResponse {
                url: self.talents_url.clone(),
            });
        }

        let payload = self.parse_data_island(&html)?;
        let data: Value = serde_json::from_str(&payload)?;

        let Some(livers) = data
            .pointer("/props/pageProps/allLivers")
            .and_then(Value::as_array)
        else {
            warn!("Data island has no liver list; treating roster as empty");
            return Ok(Vec::new());
        };
        info!("Found {} nijisanji livers", livers.len());

        let mut candidates = Vec::new();
        for liver in livers {
            let Some(fields) = self.parse_liver(liver) else {
                debug!("Skipping liver entry without a name");
                continue;
            };

            let mut channel_id = ChannelId::from_youtube_url(&fields.youtube_url);
            if channel_id.is_none() && !fields.slug.is_empty() {
                channel_id = self.resolver.resolve_slug(&fields.slug).await;
            }
            let channel_id = match channel_id {
                Some(id) => id,
                // Keep the member under a placeholder so it is not silently
                // lost; the video phase retries resolution.
                None if !fields.slug.is_empty() => ChannelId::Pending(fields.slug.clone()),
                None => {
                    warn!(
                        "Skipping {}: no channel link or slug (url: {})",
                        fields.name, fields.youtube_url
                    );
                    continue;
                }
            };

            let generation = if fields.affiliation.is_empty() {
                DEFAULT_GENERATION.to_string()
            } else {
                fields.affiliation
            };

            candidates.push(TalentCandidate {
                name: fields.name,
                group: Group::Nijisanji,
                generation,
                channel_id,
                youtube_url: fields.youtube_url,
                twitter_url: if fields.twitter_url.is_empty() {
                    None
                } else {
                    Some(fields.twitter_url)
                },
                icon_url: if fields.icon_url.is_empty() {
                    None
                } else {
                    Some(fields.icon_url)
                },
            });
        }

        Ok(candidates)
    }
}
