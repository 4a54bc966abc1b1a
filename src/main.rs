use anyhow::Context;
use tokio_util::sync::CancellationToken;

use episode_pipeline::infrastructure::observability::{TracingConfig, init_tracing};
use episode_pipeline::runtime::config::{Environment, Settings};
use episode_pipeline::runtime::state::WorkerContext;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let environment = Environment::from_env().map_err(anyhow::Error::msg)?;
    let settings = Settings::load(environment).context("Failed to load configuration")?;

    init_tracing(&TracingConfig {
        environment: environment.to_string(),
        json_format: settings.logging.enable_json,
        default_filter: settings.logging.level.clone(),
    });

    let context = WorkerContext::build(settings)
        .await
        .context("Failed to initialize worker")?;
    tracing::info!(consumer = %context.consumer, "Worker initialized");

    let cancel = CancellationToken::new();
    tokio::spawn(shutdown_on_signal(cancel.clone()));

    context.dispatcher().run(cancel).await;

    tracing::info!("Worker shut down");
    Ok(())
}

async fn shutdown_on_signal(cancel: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    tracing::info!("Shutdown signal received, finishing in-flight job");
    cancel.cancel();
}
