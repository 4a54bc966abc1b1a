use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use episode_pipeline::application::ports::{EpisodeRepository, JobQueue, ModerationRepository};
use episode_pipeline::application::services::{
    AudioProcessingService, DispatcherConfig, EpisodeTranscodeHandler, JobDispatcher,
    LiveFinalizeHandler, ModerationScanner, TickReport,
};
use episode_pipeline::domain::{
    EpisodeStatus, FinalizeJob, LiveSessionId, TranscodeJob, VoiceMask,
};
use episode_pipeline::infrastructure::queue::InMemoryJobQueue;

use crate::helpers::{
    FINALIZE_GROUP, FINALIZE_TOPIC, Pipeline, ScriptedTranscoder, TRANSCODE_GROUP,
    TRANSCODE_TOPIC, Unreachable, dispatcher_config,
};

fn fields(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn unreachable_dispatcher(queue: Arc<InMemoryJobQueue>) -> JobDispatcher {
    let scratch = std::env::temp_dir();
    let transcode = EpisodeTranscodeHandler::new(
        Arc::new(Unreachable),
        Arc::new(Unreachable),
        Arc::new(Unreachable),
        Arc::new(AudioProcessingService::new(
            Arc::new(Unreachable),
            Arc::new(Unreachable),
            scratch,
        )),
        ModerationScanner::default(),
        None,
    );
    let finalize = LiveFinalizeHandler::new(
        Arc::new(Unreachable),
        Arc::new(Unreachable),
        queue.clone(),
        TRANSCODE_TOPIC,
    );
    JobDispatcher::new(
        queue,
        Arc::new(transcode),
        Arc::new(finalize),
        dispatcher_config(),
    )
}

#[tokio::test]
async fn given_messages_without_valid_ids_when_ticking_then_they_are_acked_without_any_calls() {
    let queue = Arc::new(InMemoryJobQueue::new());
    queue
        .enqueue(TRANSCODE_TOPIC, &fields(&[("attempt", "0")]))
        .await
        .unwrap();
    queue
        .enqueue(FINALIZE_TOPIC, &fields(&[("session_id", "not-a-uuid")]))
        .await
        .unwrap();
    let dispatcher = unreachable_dispatcher(queue.clone());

    let report = dispatcher.tick(&CancellationToken::new()).await;

    assert_eq!(report.claimed, 2);
    assert_eq!(report.poison, 2);
    assert_eq!(report.succeeded, 0);
    assert_eq!(queue.pending_count(TRANSCODE_TOPIC, TRANSCODE_GROUP), 0);
    assert_eq!(queue.pending_count(FINALIZE_TOPIC, FINALIZE_GROUP), 0);
    assert_eq!(queue.messages(TRANSCODE_TOPIC).len(), 1);
}

#[tokio::test]
async fn given_published_job_when_ticking_then_message_is_acked() {
    let pipeline = Pipeline::new(ScriptedTranscoder::succeeding(Duration::from_secs(90)));
    let episode = pipeline.seed_pending_episode(VoiceMask::None).await;
    pipeline
        .queue
        .enqueue(TRANSCODE_TOPIC, &TranscodeJob::new(episode.id).to_fields())
        .await
        .unwrap();

    let report = pipeline.dispatcher().tick(&CancellationToken::new()).await;

    assert_eq!(report.succeeded, 1);
    assert_eq!(
        pipeline.queue.inner.pending_count(TRANSCODE_TOPIC, TRANSCODE_GROUP),
        0
    );
    let stored = pipeline.catalog.get_by_id(episode.id).await.unwrap().unwrap();
    assert_eq!(stored.status, EpisodeStatus::Public);
}

#[tokio::test]
async fn given_failing_job_when_ticking_then_it_is_requeued_with_next_attempt() {
    let pipeline = Pipeline::new(ScriptedTranscoder::failing("boom"));
    let episode = pipeline.seed_pending_episode(VoiceMask::None).await;
    pipeline
        .queue
        .enqueue(TRANSCODE_TOPIC, &TranscodeJob::new(episode.id).to_fields())
        .await
        .unwrap();

    let report = pipeline.dispatcher().tick(&CancellationToken::new()).await;

    assert_eq!(report.retried, 1);
    let messages = pipeline.queue.inner.messages(TRANSCODE_TOPIC);
    assert_eq!(messages.len(), 2);
    let retry = TranscodeJob::from_fields(&messages[1]).unwrap();
    assert_eq!(retry, TranscodeJob::new(episode.id).with_attempt(1));
    assert_eq!(
        pipeline.queue.inner.pending_count(TRANSCODE_TOPIC, TRANSCODE_GROUP),
        0
    );
    let stored = pipeline.catalog.get_by_id(episode.id).await.unwrap().unwrap();
    assert_eq!(stored.status, EpisodeStatus::PendingPublic);
}

#[tokio::test]
async fn given_job_failing_max_attempts_times_when_ticking_then_episode_is_dead_lettered_once() {
    let pipeline = Pipeline::new(ScriptedTranscoder::failing("boom"));
    let episode = pipeline.seed_pending_episode(VoiceMask::None).await;
    pipeline
        .queue
        .enqueue(TRANSCODE_TOPIC, &TranscodeJob::new(episode.id).to_fields())
        .await
        .unwrap();
    let dispatcher = pipeline.dispatcher();
    let cancel = CancellationToken::new();

    let mut total = TickReport::default();
    for _ in 0..3 {
        let report = dispatcher.tick(&cancel).await;
        total.retried += report.retried;
        total.dead_lettered += report.dead_lettered;
    }

    assert_eq!(total.retried, 2);
    assert_eq!(total.dead_lettered, 1);
    assert_eq!(pipeline.transcoder.encoded_masks().len(), 3);
    let stored = pipeline.catalog.get_by_id(episode.id).await.unwrap().unwrap();
    assert_eq!(stored.status, EpisodeStatus::Deleted);
    let flags = pipeline
        .catalog
        .list_for_object(&episode.id.object_ref())
        .await
        .unwrap();
    assert_eq!(flags.len(), 1);
    assert!(flags[0].reason.starts_with("processing_failed:encode:"));
    assert!(flags[0].reason.contains("boom"));

    let quiet = dispatcher.tick(&cancel).await;
    assert_eq!(quiet, TickReport::default());

    pipeline
        .queue
        .enqueue(
            TRANSCODE_TOPIC,
            &TranscodeJob::new(episode.id).with_attempt(2).to_fields(),
        )
        .await
        .unwrap();
    let replay = dispatcher.tick(&cancel).await;
    assert_eq!(replay.succeeded, 1);
    assert_eq!(
        pipeline
            .catalog
            .list_for_object(&episode.id.object_ref())
            .await
            .unwrap()
            .len(),
        1
    );
    assert_eq!(pipeline.transcoder.encoded_masks().len(), 3);
}

#[tokio::test]
async fn given_broker_rejecting_retry_when_ticking_then_original_stays_pending_for_reclaim() {
    let pipeline = Pipeline::new(ScriptedTranscoder::failing("boom"));
    let episode = pipeline.seed_pending_episode(VoiceMask::None).await;
    pipeline
        .queue
        .enqueue(TRANSCODE_TOPIC, &TranscodeJob::new(episode.id).to_fields())
        .await
        .unwrap();
    pipeline.queue.set_enqueue_failing(true);

    let report = pipeline.dispatcher().tick(&CancellationToken::new()).await;

    assert_eq!(report.retried, 0);
    assert_eq!(report.left_pending, 1);
    assert_eq!(
        pipeline.queue.inner.pending_count(TRANSCODE_TOPIC, TRANSCODE_GROUP),
        1
    );

    pipeline.queue.set_enqueue_failing(false);
    let reclaiming = pipeline.dispatcher_with(DispatcherConfig {
        consumer: "proc-rescuer".to_string(),
        reclaim_idle: Some(Duration::ZERO),
        ..dispatcher_config()
    });
    let report = reclaiming.tick(&CancellationToken::new()).await;

    assert_eq!(report.reclaimed, 1);
    assert_eq!(report.retried, 1);
    assert_eq!(
        pipeline.queue.inner.pending_count(TRANSCODE_TOPIC, TRANSCODE_GROUP),
        0
    );
    let messages = pipeline.queue.inner.messages(TRANSCODE_TOPIC);
    assert_eq!(messages.len(), 2);
    assert_eq!(TranscodeJob::from_fields(&messages[1]).unwrap().attempt, 1);
}

#[tokio::test]
async fn given_job_overrunning_its_deadline_when_ticking_then_it_is_retried_not_published() {
    let pipeline = Pipeline::new(ScriptedTranscoder::stalling(Duration::from_secs(30)));
    let episode = pipeline.seed_pending_episode(VoiceMask::None).await;
    pipeline
        .queue
        .enqueue(TRANSCODE_TOPIC, &TranscodeJob::new(episode.id).to_fields())
        .await
        .unwrap();
    let dispatcher = pipeline.dispatcher_with(DispatcherConfig {
        job_timeout: Some(Duration::from_millis(50)),
        ..dispatcher_config()
    });

    let report = dispatcher.tick(&CancellationToken::new()).await;

    assert_eq!(report.succeeded, 0);
    assert_eq!(report.retried, 1);
    assert_eq!(
        pipeline.queue.inner.pending_count(TRANSCODE_TOPIC, TRANSCODE_GROUP),
        0
    );
    let messages = pipeline.queue.inner.messages(TRANSCODE_TOPIC);
    assert_eq!(TranscodeJob::from_fields(&messages[1]).unwrap().attempt, 1);
    let stored = pipeline.catalog.get_by_id(episode.id).await.unwrap().unwrap();
    assert_eq!(stored.status, EpisodeStatus::PendingPublic);
}

#[tokio::test]
async fn given_finalize_job_when_ticking_twice_then_live_episode_is_published() {
    let pipeline = Pipeline::new(ScriptedTranscoder::succeeding(Duration::from_secs(300)));
    let original = pipeline.seed_pending_episode(VoiceMask::None).await;
    let recording = original.storage_key.clone().unwrap();
    let session = pipeline.seed_ended_session(Some(recording.as_str()), Some(300));
    pipeline
        .queue
        .enqueue(FINALIZE_TOPIC, &FinalizeJob::new(session.id).to_fields())
        .await
        .unwrap();
    let dispatcher = pipeline.dispatcher();
    let cancel = CancellationToken::new();

    let first = dispatcher.tick(&cancel).await;
    let second = dispatcher.tick(&cancel).await;

    assert_eq!(first.succeeded, 1);
    assert_eq!(second.succeeded, 1);
    let episodes = pipeline.catalog.episodes_for_session(session.id);
    assert_eq!(episodes.len(), 1);
    assert_eq!(episodes[0].status, EpisodeStatus::Public);
    assert_eq!(episodes[0].duration_sec, Some(300));
    assert!(episodes[0].is_live);
}

#[tokio::test]
async fn given_unfinalizable_session_when_retries_run_out_then_job_is_dropped_without_flags() {
    let pipeline = Pipeline::new(ScriptedTranscoder::succeeding(Duration::from_secs(1)));
    let session_id = LiveSessionId::new();
    pipeline
        .queue
        .enqueue(FINALIZE_TOPIC, &FinalizeJob::new(session_id).to_fields())
        .await
        .unwrap();
    let dispatcher = pipeline.dispatcher();
    let cancel = CancellationToken::new();

    let reports: Vec<TickReport> = {
        let mut reports = Vec::new();
        for _ in 0..4 {
            reports.push(dispatcher.tick(&cancel).await);
        }
        reports
    };

    assert_eq!(reports.iter().map(|r| r.retried).sum::<usize>(), 2);
    assert_eq!(reports.iter().map(|r| r.dead_lettered).sum::<usize>(), 1);
    assert_eq!(reports[3], TickReport::default());
    assert_eq!(pipeline.queue.inner.messages(FINALIZE_TOPIC).len(), 3);
    assert_eq!(
        pipeline.queue.inner.pending_count(FINALIZE_TOPIC, FINALIZE_GROUP),
        0
    );
}

#[tokio::test]
async fn given_cancelled_token_when_ticking_then_nothing_is_claimed() {
    let pipeline = Pipeline::new(ScriptedTranscoder::succeeding(Duration::from_secs(1)));
    let episode = pipeline.seed_pending_episode(VoiceMask::None).await;
    pipeline
        .queue
        .enqueue(TRANSCODE_TOPIC, &TranscodeJob::new(episode.id).to_fields())
        .await
        .unwrap();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let report = pipeline.dispatcher().tick(&cancel).await;

    assert_eq!(report, TickReport::default());
    assert!(pipeline.transcoder.encoded_masks().is_empty());
    let stored = pipeline.catalog.get_by_id(episode.id).await.unwrap().unwrap();
    assert_eq!(stored.status, EpisodeStatus::PendingPublic);
}

#[tokio::test]
async fn given_running_dispatcher_when_cancelled_then_run_returns() {
    let pipeline = Pipeline::new(ScriptedTranscoder::succeeding(Duration::from_secs(1)));
    let episode = pipeline.seed_pending_episode(VoiceMask::None).await;
    pipeline
        .queue
        .enqueue(TRANSCODE_TOPIC, &TranscodeJob::new(episode.id).to_fields())
        .await
        .unwrap();
    let dispatcher = Arc::new(pipeline.dispatcher());
    let cancel = CancellationToken::new();

    let handle = {
        let dispatcher = dispatcher.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { dispatcher.run(cancel).await })
    };

    let mut published = false;
    for _ in 0..100 {
        let stored = pipeline.catalog.get_by_id(episode.id).await.unwrap().unwrap();
        if stored.status == EpisodeStatus::Public {
            published = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    cancel.cancel();

    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("dispatcher did not stop")
        .unwrap();
    assert!(published);
}
