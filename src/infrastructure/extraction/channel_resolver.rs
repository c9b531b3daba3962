//! Channel identifier resolution
//!
//! Resolves a canonical `UC` channel id when the URL pattern alone is not
//! enough: either by fetching the channel page itself and pulling the
//! embedded id token out of the body, or by fetching an agency B talent page
//! and scanning it for a usable channel link.

use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};

use crate::domain::ChannelId;
use crate::infrastructure::config::sites;
use crate::infrastructure::http_client::HttpClient;

use super::error::{ExtractionError, ExtractionResult};

// The id token appears plain in page JSON, or quote-escaped when the JSON is
// itself embedded in a script string.
static EMBEDDED_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""channelId":"(UC[\w-]+)""#).unwrap());
static ESCAPED_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"channelId\\":\\"(UC[\w-]+)\\""#).unwrap());

/// True for YouTube URLs with a channel-shaped path, the only ones worth
/// feeding into identifier derivation.
pub(crate) fn is_channel_like(href: &str) -> bool {
    href.contains("/channel/")
        || href.contains("/@")
        || href.contains("/c/")
        || href.contains("/user/")
}

/// Resolver for channel identifiers that need a secondary page fetch.
pub struct ChannelIdResolver {
    http: Arc<HttpClient>,
    anchor_selector: Selector,
}

impl ChannelIdResolver {
    pub fn new(http: Arc<HttpClient>) -> ExtractionResult<Self> {
        let anchor_selector = Selector::parse("a[href]")
            .map_err(|e| ExtractionError::invalid_selector("a[href]", e))?;
        Ok(Self {
            http,
            anchor_selector,
        })
    }

    /// Strategy 3 of identifier derivation: fetch the channel page and
    /// regex-extract the embedded canonical id. Returns `None` on any
    /// failure; resolution is always retryable on a later cycle.
    pub async fn canonicalize_from_page(&self, url: &str) -> Option<ChannelId> {
        if url.is_empty() {
            return None;
        }

        // Normalize a bare handle to its absolute page form.
        let absolute = if url.starts_with('@') {
            format!("{}/{}", sites::YOUTUBE_BASE_URL, url)
        } else {
            url.to_string()
        };
        // Strip query params that upset the embedded-id lookup.
        let page_url = absolute.split('?').next().unwrap_or(&absolute);

        let body = self.http.fetch_page(page_url).await;
        if body.is_empty() {
            return None;
        }

        for re in [&*EMBEDDED_ID_RE, &*ESCAPED_ID_RE] {
            if let Some(caps) = re.captures(&body) {
                return Some(ChannelId::Canonical(caps[1].to_string()));
            }
        }
        None
    }

    /// Resolve an agency B talent slug by fetching the talent's own page and
    /// scanning its anchors for a channel link, then running the usual
    /// derivation chain on it.
    pub async fn resolve_slug(&self, slug: &str) -> Option<ChannelId> {
        let url = sites::nijisanji_talent_url(slug);
        let body = self.http.fetch_page(&url).await;
        if body.is_empty() {
            return None;
        }

        let youtube_url = {
            let html = Html::parse_document(&body);
            html.select(&self.anchor_selector)
                .filter_map(|a| a.value().attr("href"))
                .find(|href| href.contains("youtube.com") && is_channel_like(href))
                .map(str::to_string)
        };

        let youtube_url = youtube_url?;
        match ChannelId::from_youtube_url(&youtube_url) {
            Some(id) => Some(id),
            None => self.canonicalize_from_page(&youtube_url).await,
        }
    }
}
