//! Roster and feed extraction for the two agency sites
//!
//! Each agency's extractor implements the [`RosterExtractor`] capability and
//! produces candidate talent records from that site's own markup. Fragile
//! field lookups are isolated behind ordered fallback strategies so a site
//! redesign stays a local change.

pub mod channel_resolver;
pub mod error;
pub mod feed;
pub mod hololive;
pub mod nijisanji;

pub use channel_resolver::ChannelIdResolver;
pub use error::{ExtractionError, ExtractionResult};
pub use feed::{FeedVideo, parse_feed, parse_feed_timestamp};
pub use hololive::HololiveExtractor;
pub use nijisanji::NijisanjiExtractor;

use async_trait::async_trait;

use crate::domain::{ChannelId, Group, Member};

/// Candidate talent record produced by a roster extractor.
#[derive(Debug, Clone)]
pub struct TalentCandidate {
    pub name: String,
    pub group: Group,
    pub generation: String,
    pub channel_id: ChannelId,
    pub youtube_url: String,
    pub twitter_url: Option<String>,
    pub icon_url: Option<String>,
}

impl TalentCandidate {
    /// Convert into a storable member. The favorite flag defaults off and is
    /// preserved by the upsert for members that already exist.
    #[must_use]
    pub fn into_member(self) -> Member {
        Member {
            id: 0,
            name: self.name,
            group: self.group,
            generation: self.generation,
            channel_id: self.channel_id,
            youtube_url: self.youtube_url,
            twitter_url: self.twitter_url,
            icon_url: self.icon_url,
            is_favorite: false,
        }
    }
}

/// Capability of producing candidate talent records for one agency.
#[async_trait]
pub trait RosterExtractor: Send + Sync {
    /// The agency tag this extractor covers.
    fn group(&self) -> Group;

    /// Fetch and extract the agency's current roster. Individual talents
    /// that cannot be extracted are dropped with a warning; only a wholesale
    /// failure (dead index page, missing data island) is an error.
    async fn extract(&self) -> ExtractionResult<Vec<TalentCandidate>>;
}
