//! Video entity
//!
//! One row per published video, keyed by the source-provided video id.
//! Videos are only ever inserted or overwritten by feed refresh; the
//! pipeline never deletes them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::member::ChannelId;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Video {
    pub video_id: String,
    pub title: String,
    /// Canonical watch URL.
    pub url: String,
    /// Owning channel; always matches a member's stored identifier.
    pub channel_id: ChannelId,
    pub published_at: DateTime<Utc>,
    pub thumbnail_url: String,
    pub description: Option<String>,
    /// Derived by the collaboration heuristic; recomputed on every refresh
    /// of the owning channel's feed.
    pub is_collab: bool,
}
