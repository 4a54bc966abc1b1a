use std::path::Path;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use episode_pipeline::application::services::TickReport;
use episode_pipeline::runtime::config::{Environment, Settings};
use episode_pipeline::runtime::state::WorkerContext;

fn test_settings() -> Settings {
    Settings::load_from(
        &Path::new(env!("CARGO_MANIFEST_DIR")).join("config"),
        Environment::Test,
    )
    .unwrap()
}

#[tokio::test]
async fn given_test_settings_when_building_context_then_dispatcher_config_follows_settings() {
    let context = WorkerContext::build(test_settings()).await.unwrap();

    let config = context.dispatcher_config();

    assert!(context.consumer.starts_with("proc-"));
    assert_eq!(config.consumer, context.consumer);
    assert_eq!(config.transcode.topic, "jobs:process_audio");
    assert_eq!(config.finalize.group, "finalize_live");
    assert_eq!(config.batch_size, 5);
    assert_eq!(config.poll_interval, Duration::from_millis(50));
    assert_eq!(config.reclaim_idle, None);
    assert_eq!(config.job_timeout, Some(Duration::from_secs(600)));
    assert_eq!(config.transcode_retry.max_attempts(), 3);
}

#[tokio::test]
async fn given_empty_in_memory_broker_when_ticking_then_nothing_happens() {
    let context = WorkerContext::build(test_settings()).await.unwrap();

    let report = context.dispatcher().tick(&CancellationToken::new()).await;

    assert_eq!(report, TickReport::default());
}
