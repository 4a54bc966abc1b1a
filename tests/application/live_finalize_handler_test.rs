use std::time::Duration;

use episode_pipeline::application::ports::EpisodeRepository;
use episode_pipeline::application::services::{FinalizeError, FinalizeOutcome};
use episode_pipeline::domain::{
    EpisodeStatus, FinalizeJob, LiveSessionId, StorageKey, TranscodeJob, Visibility, VoiceMask,
};

use crate::helpers::{Pipeline, ScriptedTranscoder, TRANSCODE_TOPIC};

fn pipeline() -> Pipeline {
    Pipeline::new(ScriptedTranscoder::succeeding(Duration::from_secs(300)))
}

#[tokio::test]
async fn given_ended_session_when_finalizing_then_pending_episode_and_transcode_job_exist() {
    let pipeline = pipeline();
    let session = pipeline.seed_ended_session(Some("r1"), Some(300));

    let outcome = pipeline
        .finalize_handler()
        .handle(&FinalizeJob::new(session.id))
        .await
        .unwrap();

    let FinalizeOutcome::EpisodeCreated(episode_id) = outcome else {
        panic!("expected a new episode, got {:?}", outcome);
    };
    let episodes = pipeline.catalog.episodes_for_session(session.id);
    assert_eq!(episodes.len(), 1);
    let episode = &episodes[0];
    assert_eq!(episode.id, episode_id);
    assert_eq!(episode.status, EpisodeStatus::PendingPublic);
    assert_eq!(episode.visibility, Visibility::Public);
    assert!(episode.is_live);
    assert_eq!(episode.duration_sec, Some(300));
    assert_eq!(episode.storage_key, Some(StorageKey::from_raw("r1")));
    assert_eq!(episode.live_session_id, Some(session.id));
    assert_eq!(episode.author_id, session.host_id);
    assert_eq!(episode.topic_id, session.topic_id);
    assert_eq!(episode.title, session.title);
    assert_eq!(episode.mask, VoiceMask::Basic);

    let jobs = pipeline.queue.inner.messages(TRANSCODE_TOPIC);
    assert_eq!(jobs.len(), 1);
    let job = TranscodeJob::from_fields(&jobs[0]).unwrap();
    assert_eq!(job, TranscodeJob::new(episode_id));
    assert_eq!(job.attempt, 0);
}

#[tokio::test]
async fn given_session_finalized_twice_when_second_has_other_key_then_one_episode_exists() {
    let pipeline = pipeline();
    let session = pipeline.seed_ended_session(Some("r1"), Some(300));
    let handler = pipeline.finalize_handler();

    let first = handler.handle(&FinalizeJob::new(session.id)).await.unwrap();
    let mut again = FinalizeJob::new(session.id);
    again.recording_key = Some(StorageKey::from_raw("r2"));
    let second = handler.handle(&again).await.unwrap();

    let FinalizeOutcome::EpisodeCreated(episode_id) = first else {
        panic!("expected a new episode, got {:?}", first);
    };
    assert_eq!(second, FinalizeOutcome::AlreadyFinalized(episode_id));
    let episodes = pipeline.catalog.episodes_for_session(session.id);
    assert_eq!(episodes.len(), 1);
    assert_eq!(episodes[0].storage_key, Some(StorageKey::from_raw("r1")));
    assert_eq!(pipeline.queue.inner.messages(TRANSCODE_TOPIC).len(), 1);
}

#[tokio::test]
async fn given_override_key_and_duration_when_finalizing_then_overrides_win_and_are_stored() {
    let pipeline = pipeline();
    let session = pipeline.seed_ended_session(Some("stored.ogg"), Some(120));
    let job = FinalizeJob {
        recording_key: Some(StorageKey::from_raw("override.ogg")),
        duration_sec: Some(450),
        ..FinalizeJob::new(session.id)
    };

    pipeline.finalize_handler().handle(&job).await.unwrap();

    let episode = &pipeline.catalog.episodes_for_session(session.id)[0];
    assert_eq!(episode.storage_key, Some(StorageKey::from_raw("override.ogg")));
    assert_eq!(episode.duration_sec, Some(450));
    let stored = pipeline.catalog.session(session.id).unwrap();
    assert_eq!(stored.recording_key, Some(StorageKey::from_raw("override.ogg")));
    assert_eq!(stored.duration_sec, Some(450));
}

#[tokio::test]
async fn given_no_duration_anywhere_when_finalizing_then_episode_duration_is_null() {
    let pipeline = pipeline();
    let session = pipeline.seed_ended_session(Some("r1"), None);

    pipeline
        .finalize_handler()
        .handle(&FinalizeJob::new(session.id))
        .await
        .unwrap();

    let episode = &pipeline.catalog.episodes_for_session(session.id)[0];
    assert_eq!(episode.duration_sec, None);
}

#[tokio::test]
async fn given_live_session_when_finalizing_then_it_fails_without_side_effects() {
    let pipeline = pipeline();
    let mut session = pipeline.seed_ended_session(Some("r1"), Some(300));
    session.ended_at = None;
    pipeline.catalog.insert_session(session.clone());

    let result = pipeline
        .finalize_handler()
        .handle(&FinalizeJob::new(session.id))
        .await;

    assert!(matches!(result, Err(FinalizeError::StillLive(id)) if id == session.id));
    assert!(pipeline.catalog.episodes_for_session(session.id).is_empty());
    assert!(pipeline.queue.inner.messages(TRANSCODE_TOPIC).is_empty());
}

#[tokio::test]
async fn given_no_recording_key_when_finalizing_then_it_fails() {
    let pipeline = pipeline();
    let session = pipeline.seed_ended_session(None, Some(300));
    let job = FinalizeJob {
        recording_key: StorageKey::parse(Some("   ")),
        ..FinalizeJob::new(session.id)
    };

    let result = pipeline.finalize_handler().handle(&job).await;

    assert!(matches!(result, Err(FinalizeError::MissingRecording(_))));
    assert!(pipeline.catalog.episodes_for_session(session.id).is_empty());
}

#[tokio::test]
async fn given_unknown_session_when_finalizing_then_it_fails() {
    let pipeline = pipeline();

    let result = pipeline
        .finalize_handler()
        .handle(&FinalizeJob::new(LiveSessionId::new()))
        .await;

    assert!(matches!(result, Err(FinalizeError::SessionNotFound(_))));
}

#[tokio::test]
async fn given_broker_down_when_finalizing_then_error_is_returned_after_insert() {
    let pipeline = pipeline();
    let session = pipeline.seed_ended_session(Some("r1"), Some(300));
    pipeline.queue.set_enqueue_failing(true);

    let result = pipeline
        .finalize_handler()
        .handle(&FinalizeJob::new(session.id))
        .await;

    assert!(matches!(result, Err(FinalizeError::Enqueue(_))));
    let episodes = pipeline.catalog.episodes_for_session(session.id);
    assert_eq!(episodes.len(), 1);
    let episode = pipeline.catalog.get_by_id(episodes[0].id).await.unwrap().unwrap();
    assert_eq!(episode.status, EpisodeStatus::PendingPublic);
}
