//! # Update Orchestrator
//!
//! Sequences one refresh cycle: a member phase that re-extracts both agency
//! rosters behind a freshness window, then a video phase that refreshes each
//! member's feed in fixed-size concurrent batches. One member's failure
//! never cancels its siblings; one agency's failure never blocks the other.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use futures::future::join_all;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::domain::{ChannelId, Group, Member, Video, is_collaboration};
use crate::infrastructure::config::{UpdateConfig, sites};
use crate::infrastructure::extraction::{
    ChannelIdResolver, HololiveExtractor, NijisanjiExtractor, RosterExtractor, parse_feed,
};
use crate::infrastructure::http_client::HttpClient;
use crate::infrastructure::tracker_repository::{TrackerRepository, parse_stored_timestamp};

/// Settings key holding the instant of the last successful roster refresh.
const LAST_MEMBER_UPDATE_KEY: &str = "last_member_update";

/// Run `handler` over `items` in fixed-size batches. Members of one batch
/// run concurrently; batch N+1 does not start until every task of batch N
/// has settled. Failures are collected, never propagated mid-run.
pub(crate) async fn run_in_batches<'a, T, F, Fut>(
    items: &'a [T],
    batch_size: usize,
    handler: F,
) -> Vec<Result<()>>
where
    F: Fn(&'a T) -> Fut,
    Fut: Future<Output = Result<()>> + 'a,
{
    let mut results = Vec::with_capacity(items.len());
    for chunk in items.chunks(batch_size.max(1)) {
        results.extend(join_all(chunk.iter().map(&handler)).await);
    }
    results
}

pub struct UpdateOrchestrator {
    repo: TrackerRepository,
    http: Arc<HttpClient>,
    extractors: Vec<Box<dyn RosterExtractor>>,
    resolver: ChannelIdResolver,
    config: UpdateConfig,
}

impl UpdateOrchestrator {
    /// Build an orchestrator with the two production roster extractors.
    pub fn new(repo: TrackerRepository, http: Arc<HttpClient>, config: UpdateConfig) -> Result<Self> {
        let extractors: Vec<Box<dyn RosterExtractor>> = vec![
            Box::new(HololiveExtractor::new(http.clone())?),
            Box::new(NijisanjiExtractor::new(http.clone())?),
        ];
        Self::with_extractors(repo, http, extractors, config)
    }

    /// Build an orchestrator with injected extractors.
    pub fn with_extractors(
        repo: TrackerRepository,
        http: Arc<HttpClient>,
        extractors: Vec<Box<dyn RosterExtractor>>,
        config: UpdateConfig,
    ) -> Result<Self> {
        Ok(Self {
            resolver: ChannelIdResolver::new(http.clone())?,
            repo,
            http,
            extractors,
            config,
        })
    }

    /// Run one full refresh cycle: member phase, then video phase.
    pub async fn run_full_update(&self) -> Result<()> {
        info!("Starting full data update...");
        self.update_members().await?;
        self.update_recent_videos(None).await?;
        info!("Full data update complete.");
        Ok(())
    }

    /// Member phase. Skipped entirely while the stored roster is complete
    /// and fresh; otherwise both extractors run and the freshness checkpoint
    /// is rewritten regardless of per-agency failures.
    pub async fn update_members(&self) -> Result<()> {
        if self.roster_is_fresh().await? {
            info!(
                "Skipping members update (less than {} days since last update).",
                self.config.freshness_days
            );
            return Ok(());
        }

        info!("Updating members...");
        for extractor in &self.extractors {
            match self.ingest_roster(extractor.as_ref()).await {
                Ok(count) => info!("Upserted {count} {} member(s)", extractor.group()),
                Err(e) => error!("Failed to update {} members: {:#}", extractor.group(), e),
            }
        }

        self.repo
            .set_setting(LAST_MEMBER_UPDATE_KEY, &Utc::now().to_rfc3339())
            .await?;
        Ok(())
    }

    /// Video phase: refresh feeds for the selected members in fixed-size
    /// concurrent batches, isolating every member's errors.
    pub async fn update_recent_videos(&self, group: Option<Group>) -> Result<()> {
        info!(
            "Updating videos... (group: {})",
            group.map_or("all", |g| g.as_str())
        );

        let members = match group {
            Some(group) => self.repo.get_members_by_group(group).await?,
            None => self.repo.get_all_members().await?,
        };

        let results = run_in_batches(&members, self.config.batch_size, |member| {
            self.refresh_member_videos(member)
        })
        .await;

        let mut failures = 0usize;
        for (member, result) in members.iter().zip(&results) {
            if let Err(e) = result {
                failures += 1;
                error!("Error updating videos for {}: {:#}", member.name, e);
            }
        }

        if failures > 0 {
            warn!(
                "Video refresh finished: {failures} of {} member(s) failed",
                members.len()
            );
        } else {
            info!("Video refresh finished for {} member(s)", members.len());
        }
        Ok(())
    }

    /// The roster is fresh when a prior successful run exists, the store is
    /// non-empty, both groups are populated, and the checkpoint is inside
    /// the freshness window. An unparseable checkpoint forces a refresh.
    async fn roster_is_fresh(&self) -> Result<bool> {
        let Some(last_update) = self.repo.get_setting(LAST_MEMBER_UPDATE_KEY).await? else {
            return Ok(false);
        };

        let members = self.repo.get_all_members().await?;
        if members.is_empty() {
            return Ok(false);
        }
        for group in Group::ALL {
            if !members.iter().any(|m| m.group == group) {
                return Ok(false);
            }
        }

        match parse_stored_timestamp(&last_update) {
            Ok(checkpoint) => {
                Ok(Utc::now() - checkpoint < chrono::Duration::days(self.config.freshness_days))
            }
            Err(_) => {
                warn!("Invalid {LAST_MEMBER_UPDATE_KEY} value '{last_update}', forcing update");
                Ok(false)
            }
        }
    }

    async fn ingest_roster(&self, extractor: &dyn RosterExtractor) -> Result<usize> {
        let candidates = extractor.extract().await?;
        let mut count = 0usize;
        for candidate in candidates {
            self.repo.upsert_member(&candidate.into_member()).await?;
            count += 1;
        }
        Ok(count)
    }

    /// Refresh one member's feed. Pending identifiers are resolved (and
    /// migrated) first; fallback identifiers are skipped without a network
    /// call. A member that cannot be processed this cycle is left untouched.
    async fn refresh_member_videos(&self, member: &Member) -> Result<()> {
        let channel_id = match &member.channel_id {
            ChannelId::Canonical(_) => member.channel_id.clone(),
            ChannelId::Fallback(_) => {
                debug!(
                    "Skipping {}: non-canonical channel id {}",
                    member.name, member.channel_id
                );
                return Ok(());
            }
            ChannelId::Pending(slug) => {
                info!("Resolving channel id for {} ({slug})...", member.name);
                // Pace the extra roster-page fetch.
                sleep(Duration::from_millis(self.config.resolve_delay_ms)).await;

                match self.resolver.resolve_slug(slug).await {
                    Some(resolved @ ChannelId::Canonical(_)) => {
                        info!("Resolved {}: {resolved}", member.name);
                        self.repo
                            .migrate_channel_id(&member.channel_id.storage_key(), &resolved.storage_key())
                            .await?;
                        resolved
                    }
                    _ => {
                        warn!("Could not resolve channel id for {}", member.name);
                        return Ok(());
                    }
                }
            }
        };

        let feed_url = sites::youtube_feed_url(&channel_id.storage_key());
        let xml = self.http.fetch_page(&feed_url).await;
        if xml.is_empty() {
            return Ok(());
        }

        let entries = parse_feed(&xml)?;

        // Collab detection runs against every other member's display name.
        let roster = self.repo.get_all_members().await?;
        let other_names: Vec<&str> = roster
            .iter()
            .filter(|m| m.channel_id != channel_id)
            .map(|m| m.name.as_str())
            .collect();

        for entry in entries {
            let combined_text = match &entry.description {
                Some(description) => format!("{} {}", entry.title, description),
                None => entry.title.clone(),
            };
            let video = Video {
                video_id: entry.video_id,
                title: entry.title,
                url: entry.url,
                channel_id: channel_id.clone(),
                published_at: entry.published_at,
                thumbnail_url: entry.thumbnail_url,
                description: entry.description,
                is_collab: is_collaboration(&combined_text, other_names.iter().copied()),
            };
            self.repo.upsert_video(&video).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn batches_run_sequentially_with_isolated_failures() {
        let items: Vec<usize> = (0..12).collect();
        let t0 = Instant::now();
        let starts: Mutex<Vec<Option<Duration>>> = Mutex::new(vec![None; items.len()]);

        let results = run_in_batches(&items, 5, |item| {
            let idx = *item;
            let starts = &starts;
            async move {
                starts.lock().unwrap()[idx] = Some(Instant::now() - t0);
                sleep(Duration::from_millis(100)).await;
                if idx == 2 {
                    anyhow::bail!("injected failure");
                }
                Ok(())
            }
        })
        .await;

        // 12 members at batch size 5 form batches of 5, 5, 2.
        let starts = starts.lock().unwrap();
        for idx in 0..12 {
            let expected_batch = idx / 5;
            assert_eq!(
                starts[idx].unwrap(),
                Duration::from_millis(100 * expected_batch as u64),
                "item {idx} started in the wrong batch"
            );
        }

        // The injected failure is visible in its slot and nowhere else.
        assert_eq!(results.len(), 12);
        assert!(results[2].is_err());
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 11);
    }

    #[tokio::test]
    async fn zero_batch_size_is_clamped() {
        let items = [1, 2, 3];
        let results = run_in_batches(&items, 0, |_| async { Ok(()) }).await;
        assert_eq!(results.len(), 3);
    }
}
