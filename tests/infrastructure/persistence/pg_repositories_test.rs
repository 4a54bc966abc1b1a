use chrono::Utc;

use episode_pipeline::application::ports::{
    EpisodeRepository, LiveSessionRepository, ModerationRepository, SummaryRepository,
};
use episode_pipeline::domain::{
    Episode, EpisodeId, EpisodeStatus, FlagStatus, LiveSession, LiveSessionId, MoodScores,
    NewLiveEpisode, NewModerationFlag, PublishedMedia, StorageKey, Summary, UserId, VoiceMask,
    Waveform,
};

use crate::helpers::TestPostgres;

fn published_media(id: EpisodeId) -> PublishedMedia {
    let storage_key = StorageKey::processed(&id);
    PublishedMedia {
        playback_url: storage_key.playback_url(Some("https://cdn.example.com")),
        storage_key,
        size_bytes: 4096,
        duration_sec: 95,
        waveform: Waveform(vec![0, 50, 100]),
    }
}

fn ended_session() -> LiveSession {
    let now = Utc::now();
    LiveSession {
        id: LiveSessionId::new(),
        host_id: UserId::new(),
        topic_id: None,
        room_name: "late-night".to_string(),
        title: Some("Late night".to_string()),
        mask: VoiceMask::Studio,
        started_at: now - chrono::Duration::hours(1),
        ended_at: Some(now),
        recording_key: None,
        duration_sec: Some(3600),
    }
}

fn live_episode(session: &LiveSession, key: &str) -> NewLiveEpisode {
    NewLiveEpisode {
        id: EpisodeId::new(),
        author_id: session.host_id,
        topic_id: session.topic_id,
        title: session.title.clone(),
        mask: session.mask,
        duration_sec: session.duration_sec,
        storage_key: StorageKey::from_raw(key),
        live_session_id: session.id,
    }
}

#[tokio::test]
#[ignore = "requires docker"]
async fn given_pending_episode_when_publishing_twice_then_second_publish_is_rejected() {
    let pg = TestPostgres::new().await;
    let episode = Episode::pending_public(
        UserId::new(),
        VoiceMask::Basic,
        StorageKey::from_raw("uploads/a/original.webm"),
    );
    pg.episodes.insert(&episode).await.unwrap();

    let pending = pg.episodes.find_pending_public(episode.id).await.unwrap();
    assert_eq!(pending.map(|e| e.mask), Some(VoiceMask::Basic));

    let media = published_media(episode.id);
    assert!(pg.episodes.publish(episode.id, &media).await.unwrap());
    assert!(!pg.episodes.publish(episode.id, &media).await.unwrap());

    let stored = pg.episodes.get_by_id(episode.id).await.unwrap().unwrap();
    assert_eq!(stored.status, EpisodeStatus::Public);
    assert_eq!(stored.storage_key, Some(media.storage_key.clone()));
    assert_eq!(stored.playback_url.as_deref(), Some(media.playback_url.as_str()));
    assert_eq!(stored.duration_sec, Some(95));
    assert_eq!(stored.size_bytes, Some(4096));
    assert_eq!(stored.waveform, Some(Waveform(vec![0, 50, 100])));
    assert!(stored.published_at.is_some());
    assert!(pg.episodes.find_pending_public(episode.id).await.unwrap().is_none());
}

#[tokio::test]
#[ignore = "requires docker"]
async fn given_previously_published_episode_when_republishing_then_published_at_is_kept() {
    let pg = TestPostgres::new().await;
    let first_published = Utc::now() - chrono::Duration::days(3);
    let episode = Episode {
        published_at: Some(first_published),
        ..Episode::pending_public(
            UserId::new(),
            VoiceMask::None,
            StorageKey::from_raw("uploads/b/original.webm"),
        )
    };
    pg.episodes.insert(&episode).await.unwrap();

    pg.episodes
        .publish(episode.id, &published_media(episode.id))
        .await
        .unwrap();

    let stored = pg.episodes.get_by_id(episode.id).await.unwrap().unwrap();
    let kept = stored.published_at.unwrap();
    assert!((kept - first_published).num_milliseconds().abs() < 1);
}

#[tokio::test]
#[ignore = "requires docker"]
async fn given_published_episode_when_marking_deleted_then_it_stays_public() {
    let pg = TestPostgres::new().await;
    let episode = Episode::pending_public(
        UserId::new(),
        VoiceMask::None,
        StorageKey::from_raw("uploads/c/original.webm"),
    );
    pg.episodes.insert(&episode).await.unwrap();
    pg.episodes
        .publish(episode.id, &published_media(episode.id))
        .await
        .unwrap();

    assert!(!pg.episodes.mark_deleted(episode.id).await.unwrap());

    let stored = pg.episodes.get_by_id(episode.id).await.unwrap().unwrap();
    assert_eq!(stored.status, EpisodeStatus::Public);
}

#[tokio::test]
#[ignore = "requires docker"]
async fn given_session_when_creating_two_live_episodes_then_only_first_is_inserted() {
    let pg = TestPostgres::new().await;
    let session = ended_session();
    pg.live_sessions.insert(&session).await.unwrap();

    let first = live_episode(&session, "live/r1.webm");
    let second = live_episode(&session, "live/r2.webm");
    assert!(pg.episodes.create_from_live_session(&first).await.unwrap());
    assert!(!pg.episodes.create_from_live_session(&second).await.unwrap());

    let snapshot = pg
        .live_sessions
        .find_with_episode(session.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(snapshot.episode_id, Some(first.id));

    let stored = pg.episodes.get_by_id(first.id).await.unwrap().unwrap();
    assert_eq!(stored.status, EpisodeStatus::PendingPublic);
    assert!(stored.is_live);
    assert_eq!(stored.live_session_id, Some(session.id));
    assert_eq!(stored.mask, VoiceMask::Studio);
    assert!(pg.episodes.get_by_id(second.id).await.unwrap().is_none());
}

#[tokio::test]
#[ignore = "requires docker"]
async fn given_recording_update_without_duration_when_saving_then_stored_duration_is_kept() {
    let pg = TestPostgres::new().await;
    let session = ended_session();
    pg.live_sessions.insert(&session).await.unwrap();

    pg.live_sessions
        .update_recording(session.id, &StorageKey::from_raw("live/r9.webm"), None)
        .await
        .unwrap();

    let snapshot = pg
        .live_sessions
        .find_with_episode(session.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        snapshot.session.recording_key,
        Some(StorageKey::from_raw("live/r9.webm"))
    );
    assert_eq!(snapshot.session.duration_sec, Some(3600));
    assert_eq!(snapshot.episode_id, None);
}

#[tokio::test]
#[ignore = "requires docker"]
async fn given_same_flag_twice_when_inserting_then_only_one_row_exists() {
    let pg = TestPostgres::new().await;
    let object_ref = EpisodeId::new().object_ref();
    let flag = NewModerationFlag::processing_failed(&object_ref, "encode: boom");

    assert!(pg.moderation.insert_flag(&flag).await.unwrap());
    assert!(!pg.moderation.insert_flag(&flag).await.unwrap());
    assert!(
        pg.moderation
            .insert_flag(&NewModerationFlag::keyword_hit(&object_ref, "spam"))
            .await
            .unwrap()
    );

    let flags = pg.moderation.list_for_object(&object_ref).await.unwrap();
    assert_eq!(flags.len(), 2);
    assert_eq!(flags[0].reason, "processing_failed:encode: boom");
    assert_eq!(flags[0].severity, 2);
    assert_eq!(flags[0].status, FlagStatus::Open);
    assert_eq!(flags[1].reason, "keyword_hit:spam");
    assert_eq!(flags[1].severity, 1);
}

#[tokio::test]
#[ignore = "requires docker"]
async fn given_existing_summary_when_upserting_then_row_is_replaced() {
    let pg = TestPostgres::new().await;
    let episode = Episode::pending_public(
        UserId::new(),
        VoiceMask::None,
        StorageKey::from_raw("uploads/d/original.webm"),
    );
    pg.episodes.insert(&episode).await.unwrap();

    let first = Summary {
        episode_id: episode.id,
        tldr: "first".to_string(),
        keywords: vec!["none".to_string()],
        mood: MoodScores::default(),
    };
    let mut mood = MoodScores::default();
    mood.0.insert("calm".to_string(), 0.5);
    let second = Summary {
        episode_id: episode.id,
        tldr: "second".to_string(),
        keywords: vec!["studio".to_string(), "none".to_string()],
        mood,
    };

    pg.summaries.upsert(&first).await.unwrap();
    pg.summaries.upsert(&second).await.unwrap();

    assert_eq!(pg.summaries.get(episode.id).await.unwrap(), Some(second));
}
