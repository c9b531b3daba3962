//! Repository for members, videos, and pipeline settings
//!
//! All durable state lives here. Upserts are keyed by each entity's natural
//! identifier and are idempotent; the member favorite flag is owned by the
//! presentation layer and is never written by an upsert. The identifier
//! migration rewrites a member and its videos in one transaction.

use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use sqlx::{Row, SqlitePool, sqlite::SqliteRow};

use crate::domain::{ChannelId, Group, Member, Video};

/// Parse a timestamp stored as ISO-8601 text. Rows written by this pipeline
/// carry an RFC-3339 offset; rows migrated from older deployments may be
/// offset-less, so a fixed-format fallback parse is kept.
pub(crate) fn parse_stored_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .or_else(|_| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
                .map(|naive| Utc.from_utc_datetime(&naive))
        })
        .with_context(|| format!("Unparseable stored timestamp: {raw}"))
}

fn member_from_row(row: &SqliteRow) -> Result<Member> {
    let group_raw: String = row.get("group_name");
    let channel_raw: String = row.get("channel_id");
    Ok(Member {
        id: row.get("id"),
        name: row.get("name"),
        group: Group::parse(&group_raw).ok_or_else(|| anyhow!("Unknown group: {group_raw}"))?,
        generation: row.get("generation"),
        channel_id: ChannelId::parse(&channel_raw)
            .ok_or_else(|| anyhow!("Empty channel id in members row"))?,
        youtube_url: row.get("youtube_url"),
        twitter_url: row.get("twitter_url"),
        icon_url: row.get("icon_url"),
        is_favorite: row.get::<i64, _>("is_favorite") != 0,
    })
}

fn video_from_row(row: &SqliteRow) -> Result<Video> {
    let published_raw: String = row.get("published_at");
    let channel_raw: String = row.get("channel_id");
    Ok(Video {
        video_id: row.get("video_id"),
        title: row.get("title"),
        url: row.get("url"),
        channel_id: ChannelId::parse(&channel_raw)
            .ok_or_else(|| anyhow!("Empty channel id in videos row"))?,
        published_at: parse_stored_timestamp(&published_raw)?,
        thumbnail_url: row.get("thumbnail_url"),
        description: row.get("description"),
        is_collab: row.get::<i64, _>("is_collab") != 0,
    })
}

/// Repository over the members + videos + settings schema.
#[derive(Clone)]
pub struct TrackerRepository {
    pool: Arc<SqlitePool>,
}

impl TrackerRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    // ===============================
    // MEMBER OPERATIONS
    // ===============================

    /// Insert or update a member, keyed by channel identifier. Never touches
    /// `is_favorite`.
    pub async fn upsert_member(&self, member: &Member) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO members (name, group_name, generation, channel_id, youtube_url, twitter_url, icon_url)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(channel_id) DO UPDATE SET
                name=excluded.name,
                group_name=excluded.group_name,
                generation=excluded.generation,
                youtube_url=excluded.youtube_url,
                twitter_url=excluded.twitter_url,
                icon_url=excluded.icon_url
            "#,
        )
        .bind(&member.name)
        .bind(member.group.as_str())
        .bind(&member.generation)
        .bind(member.channel_id.storage_key())
        .bind(&member.youtube_url)
        .bind(&member.twitter_url)
        .bind(&member.icon_url)
        .execute(&*self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_all_members(&self) -> Result<Vec<Member>> {
        let rows = sqlx::query("SELECT * FROM members ORDER BY group_name, generation, name")
            .fetch_all(&*self.pool)
            .await?;
        rows.iter().map(member_from_row).collect()
    }

    pub async fn get_members_by_group(&self, group: Group) -> Result<Vec<Member>> {
        let rows =
            sqlx::query("SELECT * FROM members WHERE group_name = ? ORDER BY generation, name")
                .bind(group.as_str())
                .fetch_all(&*self.pool)
                .await?;
        rows.iter().map(member_from_row).collect()
    }

    /// Presentation-owned write: flip the favorite flag for one member.
    pub async fn set_favorite(&self, channel_id: &str, is_favorite: bool) -> Result<()> {
        sqlx::query("UPDATE members SET is_favorite = ? WHERE channel_id = ?")
            .bind(if is_favorite { 1 } else { 0 })
            .bind(channel_id)
            .execute(&*self.pool)
            .await?;
        Ok(())
    }

    /// Rewrite a member's channel identifier and every video referencing it,
    /// atomically. Used when a pending identifier resolves to its canonical
    /// form.
    pub async fn migrate_channel_id(&self, old_id: &str, new_id: &str) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("UPDATE members SET channel_id = ? WHERE channel_id = ?")
            .bind(new_id)
            .bind(old_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("UPDATE videos SET channel_id = ? WHERE channel_id = ?")
            .bind(new_id)
            .bind(old_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    // ===============================
    // VIDEO OPERATIONS
    // ===============================

    /// Insert or update a video, keyed by video id.
    pub async fn upsert_video(&self, video: &Video) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO videos (video_id, title, url, channel_id, published_at, thumbnail_url, description, is_collab)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(video_id) DO UPDATE SET
                title=excluded.title,
                thumbnail_url=excluded.thumbnail_url,
                description=excluded.description,
                is_collab=excluded.is_collab
            "#,
        )
        .bind(&video.video_id)
        .bind(&video.title)
        .bind(&video.url)
        .bind(video.channel_id.storage_key())
        .bind(video.published_at.to_rfc3339())
        .bind(&video.thumbnail_url)
        .bind(&video.description)
        .bind(if video.is_collab { 1 } else { 0 })
        .execute(&*self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_videos(&self, limit: i64, offset: i64) -> Result<Vec<Video>> {
        let rows =
            sqlx::query("SELECT * FROM videos ORDER BY published_at DESC LIMIT ? OFFSET ?")
                .bind(limit)
                .bind(offset)
                .fetch_all(&*self.pool)
                .await?;
        rows.iter().map(video_from_row).collect()
    }

    pub async fn get_videos_by_channel(
        &self,
        channel_id: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Video>> {
        let rows = sqlx::query(
            "SELECT * FROM videos WHERE channel_id = ? ORDER BY published_at DESC LIMIT ? OFFSET ?",
        )
        .bind(channel_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&*self.pool)
        .await?;
        rows.iter().map(video_from_row).collect()
    }

    pub async fn get_videos_by_group(
        &self,
        group: Group,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Video>> {
        let rows = sqlx::query(
            r#"
            SELECT v.* FROM videos v
            JOIN members m ON v.channel_id = m.channel_id
            WHERE m.group_name = ?
            ORDER BY v.published_at DESC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(group.as_str())
        .bind(limit)
        .bind(offset)
        .fetch_all(&*self.pool)
        .await?;
        rows.iter().map(video_from_row).collect()
    }

    /// Collaboration videos from members of one group.
    pub async fn get_collabs_by_group(&self, group: Group, limit: i64) -> Result<Vec<Video>> {
        let rows = sqlx::query(
            r#"
            SELECT v.* FROM videos v
            JOIN members m ON v.channel_id = m.channel_id
            WHERE m.group_name = ? AND v.is_collab = 1
            ORDER BY v.published_at DESC
            LIMIT ?
            "#,
        )
        .bind(group.as_str())
        .bind(limit)
        .fetch_all(&*self.pool)
        .await?;
        rows.iter().map(video_from_row).collect()
    }

    /// Videos from favorite members of one group.
    pub async fn get_favorites_by_group(&self, group: Group, limit: i64) -> Result<Vec<Video>> {
        let rows = sqlx::query(
            r#"
            SELECT v.* FROM videos v
            JOIN members m ON v.channel_id = m.channel_id
            WHERE m.group_name = ? AND m.is_favorite = 1
            ORDER BY v.published_at DESC
            LIMIT ?
            "#,
        )
        .bind(group.as_str())
        .bind(limit)
        .fetch_all(&*self.pool)
        .await?;
        rows.iter().map(video_from_row).collect()
    }

    // ===============================
    // SETTINGS
    // ===============================

    pub async fn get_setting(&self, key: &str) -> Result<Option<String>> {
        let row = sqlx::query("SELECT value FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(&*self.pool)
            .await?;
        Ok(row.map(|r| r.get("value")))
    }

    pub async fn get_setting_or(&self, key: &str, default: &str) -> Result<String> {
        Ok(self
            .get_setting(key)
            .await?
            .unwrap_or_else(|| default.to_string()))
    }

    pub async fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO settings (key, value) VALUES (?, ?)
            ON CONFLICT(key) DO UPDATE SET value=excluded.value
            "#,
        )
        .bind(key)
        .bind(value)
        .execute(&*self.pool)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stored_timestamp_round_trip() {
        let now = Utc::now();
        let parsed = parse_stored_timestamp(&now.to_rfc3339()).unwrap();
        assert_eq!(parsed, now);
    }

    #[test]
    fn stored_timestamp_legacy_offsetless_form() {
        let parsed = parse_stored_timestamp("2024-01-15T12:30:00.123456").unwrap();
        assert_eq!(parsed.to_rfc3339(), "2024-01-15T12:30:00.123456+00:00");
    }

    #[test]
    fn stored_timestamp_rejects_garbage() {
        assert!(parse_stored_timestamp("not a timestamp").is_err());
    }
}
