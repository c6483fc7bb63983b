use crate::Database;
use chrono::{Duration, TimeZone, Utc};
use tubegraph_core::{ChannelFeature, CoreError, UserFeature};
use uuid::Uuid;
use youtube_client::{ChannelRecord, CommentRecord, VideoRecord};

async fn test_db() -> Database {
    let path = std::env::temp_dir().join(format!("tubegraph-test-{}.db", Uuid::new_v4()));
    let url = format!("sqlite://{}", path.display());
    let db = Database::connect(&url).await.unwrap();
    db.run_migrations().await.unwrap();
    db
}

fn channel_record(channel_id: &str) -> ChannelRecord {
    ChannelRecord {
        channel_id: channel_id.to_string(),
        title: format!("Channel {}", channel_id),
        description: "a channel".to_string(),
        published_at: Some(Utc.with_ymd_and_hms(2015, 1, 1, 0, 0, 0).unwrap()),
        view_count: 1_000,
        subscriber_count: 50,
        video_count: 10,
    }
}

fn video_record(video_id: &str, channel_id: &str) -> VideoRecord {
    VideoRecord {
        video_id: video_id.to_string(),
        kind: "youtube#video".to_string(),
        channel_id: channel_id.to_string(),
        title: format!("Video {}", video_id),
        description: String::new(),
        thumbnail: String::new(),
        tags: vec!["tag1".to_string()],
        category_id: 22,
        default_language: None,
        published_at: Utc.with_ymd_and_hms(2018, 6, 1, 0, 0, 0).unwrap(),
        duration_secs: 120,
        definition: "hd".to_string(),
        view_count: 500,
        like_count: 10,
        dislike_count: 1,
        favorite_count: 0,
        comment_count: 2,
    }
}

fn comment_record(comment_id: &str, author_id: &str, video_id: &str) -> CommentRecord {
    CommentRecord {
        comment_id: comment_id.to_string(),
        kind: "youtube#comment".to_string(),
        author_id: author_id.to_string(),
        author_name: format!("name-{}", author_id),
        like_count: 1,
        parent_comment_id: None,
        published_at: Utc.with_ymd_and_hms(2018, 7, 1, 12, 0, 0).unwrap(),
        updated_at: Utc.with_ymd_and_hms(2018, 7, 1, 12, 0, 0).unwrap(),
        text_display: "hello".to_string(),
        text_original: "hello".to_string(),
        video_id: Some(video_id.to_string()),
        reply_count: 0,
    }
}

fn reply_record(comment_id: &str, author_id: &str, parent_id: &str) -> CommentRecord {
    CommentRecord {
        parent_comment_id: Some(parent_id.to_string()),
        video_id: None,
        ..comment_record(comment_id, author_id, "")
    }
}

#[tokio::test]
async fn test_migrations_are_idempotent() {
    let db = test_db().await;
    db.run_migrations().await.unwrap();
}

#[tokio::test]
async fn test_channel_upsert_refreshes_statistics() {
    let db = test_db().await;
    db.upsert_channel(&channel_record("c1")).await.unwrap();

    let mut updated = channel_record("c1");
    updated.view_count = 2_000;
    db.upsert_channel(&updated).await.unwrap();

    let channels = db.list_channels().await.unwrap();
    assert_eq!(channels.len(), 1);
    assert_eq!(channels[0].view_count, 2_000);
}

#[tokio::test]
async fn test_lease_blocks_second_owner() {
    let db = test_db().await;
    db.upsert_channel(&channel_record("c1")).await.unwrap();

    db.acquire_lease("c1", "worker-a", Duration::hours(1))
        .await
        .unwrap();

    let err = db
        .acquire_lease("c1", "worker-b", Duration::hours(1))
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::LeaseHeld { .. }));

    db.release_lease("c1", "worker-a").await.unwrap();
    db.acquire_lease("c1", "worker-b", Duration::hours(1))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_expired_lease_can_be_taken_over() {
    let db = test_db().await;
    db.upsert_channel(&channel_record("c1")).await.unwrap();

    db.acquire_lease("c1", "worker-a", Duration::seconds(-10))
        .await
        .unwrap();
    db.acquire_lease("c1", "worker-b", Duration::hours(1))
        .await
        .unwrap();

    let channel = db.get_channel("c1").await.unwrap().unwrap();
    assert_eq!(channel.lease_owner.as_deref(), Some("worker-b"));
}

#[tokio::test]
async fn test_release_by_non_owner_is_noop() {
    let db = test_db().await;
    db.upsert_channel(&channel_record("c1")).await.unwrap();
    db.acquire_lease("c1", "worker-a", Duration::hours(1))
        .await
        .unwrap();

    db.release_lease("c1", "worker-b").await.unwrap();
    let channel = db.get_channel("c1").await.unwrap().unwrap();
    assert_eq!(channel.lease_owner.as_deref(), Some("worker-a"));
}

#[tokio::test]
async fn test_user_upsert_is_stable() {
    let db = test_db().await;
    let first = db.upsert_user("u1", "Alice", "c1").await.unwrap();
    let second = db.upsert_user("u1", "Alice Renamed", "c1").await.unwrap();
    assert_eq!(first, second);

    let user = db.get_user("u1", "c1").await.unwrap().unwrap();
    assert_eq!(user.user_name, "Alice Renamed");

    // Same account on another channel is a separate row
    let other = db.upsert_user("u1", "Alice", "c2").await.unwrap();
    assert_ne!(first, other);
}

#[tokio::test]
async fn test_comment_resave_updates_in_place() {
    let db = test_db().await;
    db.save_comment(&comment_record("m1", "u1", "v1"), "c1", "v1")
        .await
        .unwrap();

    let mut edited = comment_record("m1", "u1", "v1");
    edited.like_count = 9;
    edited.text_display = "edited".to_string();
    db.save_comment(&edited, "c1", "v1").await.unwrap();

    assert_eq!(db.stored_comment_count("v1").await.unwrap(), 1);
    let comments = db.list_comments_for_video("v1").await.unwrap();
    assert_eq!(comments[0].like_count, 9);
    assert_eq!(comments[0].text_display, "edited");
}

#[tokio::test]
async fn test_reply_links_to_parent_row() {
    let db = test_db().await;
    db.save_comment(&comment_record("m1", "u1", "v1"), "c1", "v1")
        .await
        .unwrap();
    let saved = db
        .save_comment(&reply_record("m2", "u2", "m1"), "c1", "v1")
        .await
        .unwrap();
    assert!(saved);

    let comments = db.list_comments_for_video("v1").await.unwrap();
    assert_eq!(comments.len(), 2);
    let parent_row = comments.iter().find(|c| c.comment_id == "m1").unwrap().id;
    let reply = comments.iter().find(|c| c.comment_id == "m2").unwrap();
    assert_eq!(reply.parent_id, Some(parent_row));
}

#[tokio::test]
async fn test_orphan_reply_is_skipped() {
    let db = test_db().await;
    let saved = db
        .save_comment(&reply_record("m2", "u2", "missing"), "c1", "v1")
        .await
        .unwrap();
    assert!(!saved);
    assert_eq!(db.stored_comment_count("v1").await.unwrap(), 0);
}

#[tokio::test]
async fn test_comment_sync_detection() {
    let db = test_db().await;
    db.upsert_video(&video_record("v1", "c1")).await.unwrap();

    assert!(db.video_needs_comment_sync("v1", 2).await.unwrap());
    db.save_comment(&comment_record("m1", "u1", "v1"), "c1", "v1")
        .await
        .unwrap();
    db.save_comment(&comment_record("m2", "u2", "v1"), "c1", "v1")
        .await
        .unwrap();
    assert!(!db.video_needs_comment_sync("v1", 2).await.unwrap());
}

#[tokio::test]
async fn test_user_pairs_weighted_by_shared_videos() {
    let db = test_db().await;
    // u1 and u2 meet on v1 and v2; u3 appears on v1 only
    for (comment, author, video) in [
        ("m1", "u1", "v1"),
        ("m2", "u2", "v1"),
        ("m3", "u1", "v2"),
        ("m4", "u2", "v2"),
        ("m5", "u3", "v1"),
    ] {
        db.save_comment(&comment_record(comment, author, video), "c1", video)
            .await
            .unwrap();
    }

    let links = db.user_pairs("c1").await.unwrap();
    assert_eq!(links.len(), 3);

    let pair = links
        .iter()
        .find(|l| {
            (l.source == "u1" && l.target == "u2") || (l.source == "u2" && l.target == "u1")
        })
        .unwrap();
    assert_eq!(pair.weight, 2);
    assert!(links.iter().all(|l| l.weight > 0));
    assert!(links.iter().all(|l| l.source != l.target));
}

#[tokio::test]
async fn test_video_pairs_weighted_by_shared_commenters() {
    let db = test_db().await;
    db.upsert_video(&video_record("v1", "c1")).await.unwrap();
    db.upsert_video(&video_record("v2", "c1")).await.unwrap();
    for (comment, author, video) in [
        ("m1", "u1", "v1"),
        ("m2", "u1", "v2"),
        ("m3", "u2", "v1"),
        ("m4", "u2", "v2"),
    ] {
        db.save_comment(&comment_record(comment, author, video), "c1", video)
            .await
            .unwrap();
    }

    let links = db.video_pairs("c1").await.unwrap();
    assert_eq!(links.len(), 1);
    assert_eq!(links[0].weight, 2);
}

#[tokio::test]
async fn test_single_shared_commenter_gives_weight_one_edge() {
    let db = test_db().await;
    db.upsert_video(&video_record("v1", "c1")).await.unwrap();
    db.upsert_video(&video_record("v2", "c1")).await.unwrap();
    db.save_comment(&comment_record("m1", "u1", "v1"), "c1", "v1")
        .await
        .unwrap();
    db.save_comment(&comment_record("m2", "u1", "v2"), "c1", "v2")
        .await
        .unwrap();

    let links = db.video_pairs("c1").await.unwrap();
    assert_eq!(links.len(), 1);
    assert_eq!(links[0].weight, 1);
    assert_ne!(links[0].source, links[0].target);
}

#[tokio::test]
async fn test_channel_pairs_share_users() {
    let db = test_db().await;
    db.upsert_user("u1", "Alice", "c1").await.unwrap();
    db.upsert_user("u1", "Alice", "c2").await.unwrap();
    db.upsert_user("u2", "Bob", "c1").await.unwrap();

    let links = db.channel_pairs().await.unwrap();
    assert_eq!(links.len(), 1);
    assert_eq!(links[0].weight, 1);
}

#[tokio::test]
async fn test_recompute_user_aggregates() {
    let db = test_db().await;
    for (comment, video) in [("m1", "v1"), ("m2", "v2"), ("m3", "v2")] {
        db.save_comment(&comment_record(comment, "u1", video), "c1", video)
            .await
            .unwrap();
    }

    db.recompute_user_aggregates("c1").await.unwrap();
    let user = db.get_user("u1", "c1").await.unwrap().unwrap();
    assert_eq!(user.videos_commented, 2);
    assert_eq!(user.like_count, 3);
}

#[tokio::test]
async fn test_users_power_sums_commenter_activity() {
    let db = test_db().await;
    for (comment, author, video) in [
        ("m1", "u1", "v1"),
        ("m2", "u1", "v2"),
        ("m3", "u2", "v1"),
    ] {
        db.save_comment(&comment_record(comment, author, video), "c1", video)
            .await
            .unwrap();
    }
    db.recompute_user_aggregates("c1").await.unwrap();

    // u1 commented on 2 videos, u2 on 1; both appear on v1
    assert_eq!(db.users_power("v1").await.unwrap(), 3);
}

#[tokio::test]
async fn test_feature_snapshots_are_append_only() {
    let db = test_db().await;
    let run1 = Utc.with_ymd_and_hms(2018, 8, 1, 0, 0, 0).unwrap();
    let run2 = Utc.with_ymd_and_hms(2018, 8, 2, 0, 0, 0).unwrap();

    for run_at in [run1, run2] {
        db.insert_user_features(&[UserFeature {
            id: 0,
            run_at,
            channel_id: "c1".to_string(),
            user_id: "u1".to_string(),
            page_rank: 1.0,
            weighted_degree: 2.0,
            betweenness: None,
            videos_commented: 3,
            like_count: 4,
            subscriber_count: 0,
            view_count: 0,
            video_count: 0,
            description: String::new(),
        }])
        .await
        .unwrap();
        db.insert_channel_feature(&ChannelFeature {
            id: 0,
            run_at,
            channel_id: "c1".to_string(),
            view_count: 1,
            subscriber_count: 2,
            video_count: 3,
            comments_count: 4,
            user_node_count: 1,
            user_edge_count: 0,
            video_node_count: 0,
            video_edge_count: 0,
        })
        .await
        .unwrap();
    }

    assert_eq!(db.latest_run_at("c1").await.unwrap(), Some(run2));
    assert_eq!(db.user_features_at("c1", run1).await.unwrap().len(), 1);
    assert_eq!(db.user_features_at("c1", run2).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_link_tables_are_replaced_atomically() {
    let db = test_db().await;
    let link = |source: &str, target: &str, weight: i64| tubegraph_core::Link {
        source: source.to_string(),
        target: target.to_string(),
        weight,
        channel_id: "c1".to_string(),
    };

    db.replace_user_links("c1", &[link("u1", "u2", 2), link("u1", "u3", 1)])
        .await
        .unwrap();
    assert_eq!(db.load_user_links("c1").await.unwrap().len(), 2);

    db.replace_user_links("c1", &[link("u1", "u2", 3)]).await.unwrap();
    let links = db.load_user_links("c1").await.unwrap();
    assert_eq!(links.len(), 1);
    assert_eq!(links[0].weight, 3);
}

#[tokio::test]
async fn test_search_associations() {
    let db = test_db().await;
    let max_date = Utc.with_ymd_and_hms(2018, 9, 1, 0, 0, 0).unwrap();
    let search_id = db.create_search("rust tutorials", max_date).await.unwrap();

    db.link_search_video(search_id, "v1").await.unwrap();
    db.link_search_video(search_id, "v1").await.unwrap();
    db.link_search_channel(search_id, "c1").await.unwrap();

    let search = db.get_search(search_id).await.unwrap().unwrap();
    assert_eq!(search.keywords, "rust tutorials");
    assert_eq!(search.max_date, max_date);
    assert_eq!(db.search_video_ids(search_id).await.unwrap(), vec!["v1"]);
    assert_eq!(db.search_channel_ids(search_id).await.unwrap(), vec!["c1"]);
}

#[tokio::test]
async fn test_reset_empties_every_table() {
    let db = test_db().await;
    db.upsert_channel(&channel_record("c1")).await.unwrap();
    db.save_comment(&comment_record("m1", "u1", "v1"), "c1", "v1")
        .await
        .unwrap();

    db.reset().await.unwrap();
    assert!(db.list_channels().await.unwrap().is_empty());
    assert_eq!(db.stored_comment_count("v1").await.unwrap(), 0);
}
