//! Roster extractor for the hololive talents site
//!
//! The talents index is plain server-rendered HTML. Talent sub-lists are
//! located by a structural class marker with a heading-pairing fallback, and
//! each talent's profile page is fetched for the name, channel link, social
//! link, and icon. Icon extraction walks four ordered strategies because the
//! profile layout has shipped in several variants.

use std::sync::Arc;

use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use tracing::{info, warn};
use url::Url;

use crate::domain::{ChannelId, Group};
use crate::infrastructure::config::sites;
use crate::infrastructure::http_client::HttpClient;

use super::channel_resolver::{ChannelIdResolver, is_channel_like};
use super::error::{ExtractionError, ExtractionResult};
use super::{RosterExtractor, TalentCandidate};

const DEFAULT_GENERATION: &str = "hololive";

/// One entry of the talents index: a profile link plus the cohort label of
/// the sub-list it was found in.
#[derive(Debug)]
struct RosterEntry {
    profile_url: String,
    generation: String,
}

/// Fields pulled from a single talent profile page.
#[derive(Debug)]
struct ProfileFields {
    name: String,
    youtube_url: String,
    twitter_url: String,
    icon_url: String,
}

pub struct HololiveExtractor {
    http: Arc<HttpClient>,
    resolver: ChannelIdResolver,
    talents_url: String,
    talent_list_selector: Selector,
    heading_selector: Selector,
    item_selector: Selector,
    anchor_selector: Selector,
    name_selector: Selector,
    title_meta_selector: Selector,
    /// Dedicated image containers, tried in order.
    icon_selectors: Vec<Selector>,
    figure_image_selector: Selector,
    og_image_selector: Selector,
}

fn compile(selector: &str) -> ExtractionResult<Selector> {
    Selector::parse(selector).map_err(|e| ExtractionError::invalid_selector(selector, e))
}

impl HololiveExtractor {
    pub fn new(http: Arc<HttpClient>) -> ExtractionResult<Self> {
        Ok(Self {
            resolver: ChannelIdResolver::new(http.clone())?,
            http,
            talents_url: sites::HOLOLIVE_TALENTS_URL.to_string(),
            talent_list_selector: compile("ul.talent_list")?,
            heading_selector: compile("h3, h4")?,
            item_selector: compile("li")?,
            anchor_selector: compile("a[href]")?,
            name_selector: compile("h1")?,
            title_meta_selector: compile(r#"meta[property="og:title"]"#)?,
            icon_selectors: vec![compile(".talent_main_img img")?, compile(".main_image img")?],
            figure_image_selector: compile("figure img")?,
            og_image_selector: compile(r#"meta[property="og:image"]"#)?,
        })
    }

    /// Collect the profile links of the talents index together with each
    /// sub-list's cohort label.
    fn parse_roster_index(&self, raw: &str) -> Vec<RosterEntry> {
        let html = Html::parse_document(raw);

        let mut lists: Vec<ElementRef> = html.select(&self.talent_list_selector).collect();

        // No structural marker: pair each heading with its nearest following
        // sibling list instead.
        if lists.is_empty() {
            for heading in html.select(&self.heading_selector) {
                if let Some(list) = heading
                    .next_siblings()
                    .filter_map(ElementRef::wrap)
                    .find(|el| el.value().name() == "ul")
                {
                    lists.push(list);
                }
            }
        }

        let base = Url::parse(&self.talents_url).ok();
        let mut entries = Vec::new();
        for list in lists {
            let generation = self.cohort_label(list);
            for item in list.select(&self.item_selector) {
                let Some(href) = item
                    .select(&self.anchor_selector)
                    .next()
                    .and_then(|a| a.value().attr("href"))
                else {
                    continue;
                };
                if href.is_empty() {
                    continue;
                }
                let profile_url = match &base {
                    Some(base) => match base.join(href) {
                        Ok(joined) => joined.to_string(),
                        Err(_) => href.to_string(),
                    },
                    None => href.to_string(),
                };
                entries.push(RosterEntry {
                    profile_url,
                    generation: generation.clone(),
                });
            }
        }
        entries
    }

    /// Cohort label from the nearest preceding heading, walking up one
    /// parent level when the heading is not an immediate sibling.
    fn cohort_label(&self, list: ElementRef<'_>) -> String {
        preceding_heading(list)
            .or_else(|| {
                list.parent()
                    .and_then(ElementRef::wrap)
                    .and_then(preceding_heading)
            })
            .unwrap_or_else(|| DEFAULT_GENERATION.to_string())
    }

    fn parse_profile(&self, raw: &str) -> Option<ProfileFields> {
        let html = Html::parse_document(raw);

        // Some profile pages carry empty decorative h1 elements before the
        // talent name; take the first with text.
        let mut name = html
            .select(&self.name_selector)
            .map(|h| h.text().collect::<String>().trim().to_string())
            .find(|text| !text.is_empty())
            .unwrap_or_default();
        if name.is_empty() {
            name = html
                .select(&self.title_meta_selector)
                .next()
                .and_then(|meta| meta.value().attr("content"))
                .map(|content| content.split('|').next().unwrap_or("").trim().to_string())
                .unwrap_or_default();
        }
        if name.is_empty() {
            return None;
        }

        let mut youtube_url = String::new();
        let mut twitter_url = String::new();
        for anchor in html.select(&self.anchor_selector) {
            let Some(href) = anchor.value().attr("href") else {
                continue;
            };
            if youtube_url.is_empty() && href.contains("youtube.com") && is_channel_like(href) {
                youtube_url = href.to_string();
            }
            if twitter_url.is_empty()
                && (href.contains("twitter.com") || href.contains("x.com"))
                && !href.contains("/status/")
            {
                twitter_url = href.to_string();
            }
        }

        Some(ProfileFields {
            name,
            youtube_url,
            twitter_url,
            icon_url: self.extract_icon(&html),
        })
    }

    fn extract_icon(&self, html: &Html) -> String {
        // Strategies 1-2: dedicated image containers.
        for selector in &self.icon_selectors {
            if let Some(src) = html
                .select(selector)
                .next()
                .and_then(|img| img.value().attr("src"))
            {
                if !src.is_empty() {
                    return src.to_string();
                }
            }
        }

        // Strategy 3: figure imagery, restricted to uploaded talent art.
        for img in html.select(&self.figure_image_selector) {
            if let Some(src) = img.value().attr("src") {
                if src.contains("wp-content") && (src.contains("talent") || src.contains("character"))
                {
                    return src.to_string();
                }
            }
        }

        // Strategy 4: open-graph fallback.
        html.select(&self.og_image_selector)
            .next()
            .and_then(|meta| meta.value().attr("content"))
            .unwrap_or("")
            .to_string()
    }
}

fn preceding_heading(el: ElementRef<'_>) -> Option<String> {
    el.prev_siblings()
        .filter_map(ElementRef::wrap)
        .find(|sibling| matches!(sibling.value().name(), "h3" | "h4"))
        .map(|heading| heading.text().collect::<String>().trim().to_string())
}

#[async_trait]
impl RosterExtractor for HololiveExtractor {
    fn group(&self) -> Group {
        Group::Hololive
    }

    async fn extract(&self) -> ExtractionResult<Vec<TalentCandidate>> {
        let index_html = self.http.fetch_page(&self.talents_url).await;
        if index_html.is_empty() {
            return Err(ExtractionError::EmptyResponse {
                url: self.talents_url.clone(),
            });
        }

        let entries = self.parse_roster_index(&index_html);
        info!("Found {} hololive roster entries", entries.len());

        let mut candidates = Vec::new();
        for entry in entries {
            let page = self.http.fetch_page(&entry.profile_url).await;
            if page.is_empty() {
                continue;
            }
            let Some(profile) = self.parse_profile(&page) else {
                warn!("Skipping profile {}: no talent name found", entry.profile_url);
                continue;
            };

            let mut channel_id = ChannelId::from_youtube_url(&profile.youtube_url);
            if channel_id.is_none() && !profile.youtube_url.is_empty() {
                channel_id = self.resolver.canonicalize_from_page(&profile.youtube_url).await;
            }
            let Some(channel_id) = channel_id else {
                warn!(
                    "Skipping {}: no resolvable channel id (url: {})",
                    profile.name, profile.youtube_url
                );
                continue;
            };

            candidates.push(TalentCandidate {
                name: profile.name,
                group: Group::Hololive,
                generation: entry.generation,
                channel_id,
                youtube_url: profile.youtube_url,
                twitter_url: if profile.twitter_url.is_empty() {
                    None
                } else {
                    Some(profile.twitter_url)
                },
                icon_url: if profile.icon_url.is_empty() {
                    None
                } else {
                    Some(profile.icon_url)
                },
            });
        }

        Ok(candidates)
    }
}
