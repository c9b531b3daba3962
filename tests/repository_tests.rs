//! Tests for persistence: idempotent upserts, identifier migration, and the
//! read queries the presentation layers depend on.

use chrono::NaiveDateTime;
use tempfile::TempDir;

use vtuber_tracker::domain::{ChannelId, Group, Member, Video};
use vtuber_tracker::infrastructure::{DatabaseConnection, TrackerRepository};

async fn setup() -> (TempDir, TrackerRepository) {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite:{}", dir.path().join("test.db").display());
    let db = DatabaseConnection::new(&url).await.unwrap();
    db.migrate().await.unwrap();
    let repo = TrackerRepository::new(db.pool().clone());
    (dir, repo)
}

fn member(name: &str, group: Group, channel: &str) -> Member {
    Member {
        id: 0,
        name: name.to_string(),
        group,
        generation: "Gen 1".to_string(),
        channel_id: ChannelId::parse(channel).unwrap(),
        youtube_url: format!("https://www.youtube.com/channel/{channel}"),
        twitter_url: None,
        icon_url: None,
        is_favorite: false,
    }
}

fn video(id: &str, channel: &str, published: &str, is_collab: bool) -> Video {
    Video {
        video_id: id.to_string(),
        title: format!("Video {id}"),
        url: format!("https://www.youtube.com/watch?v={id}"),
        channel_id: ChannelId::parse(channel).unwrap(),
        published_at: NaiveDateTime::parse_from_str(published, "%Y-%m-%dT%H:%M:%S")
            .unwrap()
            .and_utc(),
        thumbnail_url: format!("https://i.ytimg.com/vi/{id}/mqdefault.jpg"),
        description: None,
        is_collab,
    }
}

#[tokio::test]
async fn member_upsert_is_idempotent_and_keyed_by_channel_id() {
    let (_dir, repo) = setup().await;

    let alice = member("Alice", Group::Hololive, "UCalice");
    repo.upsert_member(&alice).await.unwrap();
    repo.upsert_member(&alice).await.unwrap();

    let members = repo.get_all_members().await.unwrap();
    assert_eq!(members.len(), 1);
    assert_eq!(members[0].name, "Alice");
    assert_eq!(members[0].channel_id.storage_key(), "UCalice");
}

#[tokio::test]
async fn member_upsert_overwrites_fields_but_not_favorite() {
    let (_dir, repo) = setup().await;

    repo.upsert_member(&member("Alice", Group::Hololive, "UCalice"))
        .await
        .unwrap();
    repo.set_favorite("UCalice", true).await.unwrap();

    // A later roster refresh renames the talent; the user's favorite flag
    // must survive.
    let mut renamed = member("Alice Ch.", Group::Hololive, "UCalice");
    renamed.generation = "Gen 2".to_string();
    repo.upsert_member(&renamed).await.unwrap();

    let members = repo.get_all_members().await.unwrap();
    assert_eq!(members.len(), 1);
    assert_eq!(members[0].name, "Alice Ch.");
    assert_eq!(members[0].generation, "Gen 2");
    assert!(members[0].is_favorite);
}

#[tokio::test]
async fn video_upsert_is_idempotent() {
    let (_dir, repo) = setup().await;

    repo.upsert_member(&member("Alice", Group::Hololive, "UCalice"))
        .await
        .unwrap();
    let v = video("vid1", "UCalice", "2024-01-15T12:30:00", false);
    repo.upsert_video(&v).await.unwrap();
    repo.upsert_video(&v).await.unwrap();

    let videos = repo.get_videos(50, 0).await.unwrap();
    assert_eq!(videos.len(), 1);
    assert_eq!(videos[0].video_id, "vid1");
    assert_eq!(videos[0].published_at, v.published_at);
}

#[tokio::test]
async fn video_upsert_refreshes_collab_flag() {
    let (_dir, repo) = setup().await;

    repo.upsert_member(&member("Alice", Group::Hololive, "UCalice"))
        .await
        .unwrap();
    repo.upsert_video(&video("vid1", "UCalice", "2024-01-15T12:30:00", false))
        .await
        .unwrap();
    repo.upsert_video(&video("vid1", "UCalice", "2024-01-15T12:30:00", true))
        .await
        .unwrap();

    let videos = repo.get_videos(50, 0).await.unwrap();
    assert_eq!(videos.len(), 1);
    assert!(videos[0].is_collab);
}

#[tokio::test]
async fn videos_are_ordered_newest_first_with_pagination() {
    let (_dir, repo) = setup().await;

    repo.upsert_member(&member("Alice", Group::Hololive, "UCalice"))
        .await
        .unwrap();
    repo.upsert_video(&video("old", "UCalice", "2024-01-10T00:00:00", false))
        .await
        .unwrap();
    repo.upsert_video(&video("newest", "UCalice", "2024-01-20T00:00:00", false))
        .await
        .unwrap();
    repo.upsert_video(&video("mid", "UCalice", "2024-01-15T00:00:00", false))
        .await
        .unwrap();

    let page1 = repo.get_videos(2, 0).await.unwrap();
    assert_eq!(
        page1.iter().map(|v| v.video_id.as_str()).collect::<Vec<_>>(),
        vec!["newest", "mid"]
    );

    let page2 = repo.get_videos(2, 2).await.unwrap();
    assert_eq!(page2.len(), 1);
    assert_eq!(page2[0].video_id, "old");
}

#[tokio::test]
async fn group_channel_collab_and_favorite_queries() {
    let (_dir, repo) = setup().await;

    repo.upsert_member(&member("Alice", Group::Hololive, "UCalice"))
        .await
        .unwrap();
    repo.upsert_member(&member("Niji", Group::Nijisanji, "UCniji"))
        .await
        .unwrap();
    repo.set_favorite("UCalice", true).await.unwrap();

    repo.upsert_video(&video("a1", "UCalice", "2024-01-15T00:00:00", true))
        .await
        .unwrap();
    repo.upsert_video(&video("a2", "UCalice", "2024-01-16T00:00:00", false))
        .await
        .unwrap();
    repo.upsert_video(&video("n1", "UCniji", "2024-01-17T00:00:00", false))
        .await
        .unwrap();

    let holo = repo.get_videos_by_group(Group::Hololive, 50, 0).await.unwrap();
    assert_eq!(holo.len(), 2);
    assert!(holo.iter().all(|v| v.channel_id.storage_key() == "UCalice"));

    let channel = repo.get_videos_by_channel("UCniji", 20, 0).await.unwrap();
    assert_eq!(channel.len(), 1);
    assert_eq!(channel[0].video_id, "n1");

    let collabs = repo.get_collabs_by_group(Group::Hololive, 50).await.unwrap();
    assert_eq!(collabs.len(), 1);
    assert_eq!(collabs[0].video_id, "a1");
    assert!(
        repo.get_collabs_by_group(Group::Nijisanji, 50)
            .await
            .unwrap()
            .is_empty()
    );

    let favorites = repo.get_favorites_by_group(Group::Hololive, 50).await.unwrap();
    assert_eq!(favorites.len(), 2);
    assert!(
        repo.get_favorites_by_group(Group::Nijisanji, 50)
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn members_by_group_filters_and_orders() {
    let (_dir, repo) = setup().await;

    repo.upsert_member(&member("Zeta", Group::Hololive, "UCzeta"))
        .await
        .unwrap();
    repo.upsert_member(&member("Alice", Group::Hololive, "UCalice"))
        .await
        .unwrap();
    repo.upsert_member(&member("Niji", Group::Nijisanji, "UCniji"))
        .await
        .unwrap();

    let holo = repo.get_members_by_group(Group::Hololive).await.unwrap();
    assert_eq!(
        holo.iter().map(|m| m.name.as_str()).collect::<Vec<_>>(),
        vec!["Alice", "Zeta"]
    );
}

#[tokio::test]
async fn channel_id_migration_rewrites_member_and_all_videos() {
    let (_dir, repo) = setup().await;

    repo.upsert_member(&member("Pomu", Group::Nijisanji, "niji_pomu"))
        .await
        .unwrap();
    repo.upsert_member(&member("Other", Group::Nijisanji, "UCother"))
        .await
        .unwrap();
    repo.upsert_video(&video("p1", "niji_pomu", "2024-01-10T00:00:00", false))
        .await
        .unwrap();
    repo.upsert_video(&video("p2", "niji_pomu", "2024-01-11T00:00:00", false))
        .await
        .unwrap();
    repo.upsert_video(&video("o1", "UCother", "2024-01-12T00:00:00", false))
        .await
        .unwrap();

    repo.migrate_channel_id("niji_pomu", "UCpomu").await.unwrap();

    let members = repo.get_all_members().await.unwrap();
    let pomu = members.iter().find(|m| m.name == "Pomu").unwrap();
    assert_eq!(pomu.channel_id.storage_key(), "UCpomu");

    let migrated = repo.get_videos_by_channel("UCpomu", 20, 0).await.unwrap();
    assert_eq!(migrated.len(), 2);
    assert!(
        repo.get_videos_by_channel("niji_pomu", 20, 0)
            .await
            .unwrap()
            .is_empty()
    );

    // Unrelated rows are untouched.
    let other = repo.get_videos_by_channel("UCother", 20, 0).await.unwrap();
    assert_eq!(other.len(), 1);
}

#[tokio::test]
async fn channel_id_migration_is_all_or_nothing() {
    let (_dir, repo) = setup().await;

    repo.upsert_member(&member("Pomu", Group::Nijisanji, "niji_pomu"))
        .await
        .unwrap();
    repo.upsert_member(&member("Taken", Group::Nijisanji, "UCtaken"))
        .await
        .unwrap();
    repo.upsert_video(&video("p1", "niji_pomu", "2024-01-10T00:00:00", false))
        .await
        .unwrap();

    // The target id collides with an existing member, so the whole
    // migration must roll back: videos keep referencing the old id.
    let result = repo.migrate_channel_id("niji_pomu", "UCtaken").await;
    assert!(result.is_err());

    let videos = repo.get_videos_by_channel("niji_pomu", 20, 0).await.unwrap();
    assert_eq!(videos.len(), 1);
    let members = repo.get_all_members().await.unwrap();
    assert!(
        members
            .iter()
            .any(|m| m.channel_id.storage_key() == "niji_pomu")
    );
}

#[tokio::test]
async fn settings_round_trip_with_default() {
    let (_dir, repo) = setup().await;

    assert_eq!(repo.get_setting("missing").await.unwrap(), None);
    assert_eq!(
        repo.get_setting_or("missing", "fallback").await.unwrap(),
        "fallback"
    );

    repo.set_setting("last_member_update", "2024-01-15T12:30:00+00:00")
        .await
        .unwrap();
    repo.set_setting("last_member_update", "2024-02-01T00:00:00+00:00")
        .await
        .unwrap();

    assert_eq!(
        repo.get_setting("last_member_update").await.unwrap().as_deref(),
        Some("2024-02-01T00:00:00+00:00")
    );
}
