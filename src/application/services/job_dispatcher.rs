use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use super::{EpisodeTranscodeHandler, LiveFinalizeHandler, RetryDecision, RetryPolicy};
use crate::application::ports::{JobQueue, QueueError, QueueMessage};
use crate::domain::{FinalizeJob, JobDecodeError, TranscodeJob};

/// A topic and the consumer group this worker reads it through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    pub topic: String,
    pub group: String,
}

impl Subscription {
    pub fn new(topic: impl Into<String>, group: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            group: group.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    pub transcode: Subscription,
    pub finalize: Subscription,
    pub consumer: String,
    pub batch_size: usize,
    pub poll_interval: Duration,
    /// `None` disables taking over messages abandoned by other consumers.
    pub reclaim_idle: Option<Duration>,
    /// Deadline for one handler run. Must stay below `reclaim_idle`, or a
    /// slow job is reclaimed and runs twice.
    pub job_timeout: Option<Duration>,
    pub transcode_retry: RetryPolicy,
    pub finalize_retry: RetryPolicy,
}

/// Counters for one poll of both topics.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    pub claimed: usize,
    pub reclaimed: usize,
    pub succeeded: usize,
    pub retried: usize,
    pub dead_lettered: usize,
    pub poison: usize,
    /// Messages left unacknowledged for a later reclaim.
    pub left_pending: usize,
}

pub struct JobDispatcher {
    queue: Arc<dyn JobQueue>,
    transcode: Arc<EpisodeTranscodeHandler>,
    finalize: Arc<LiveFinalizeHandler>,
    config: DispatcherConfig,
}

impl JobDispatcher {
    pub fn new(
        queue: Arc<dyn JobQueue>,
        transcode: Arc<EpisodeTranscodeHandler>,
        finalize: Arc<LiveFinalizeHandler>,
        config: DispatcherConfig,
    ) -> Self {
        Self {
            queue,
            transcode,
            finalize,
            config,
        }
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    pub async fn run(&self, cancel: CancellationToken) {
        tracing::info!(
            consumer = %self.config.consumer,
            transcode_topic = %self.config.transcode.topic,
            finalize_topic = %self.config.finalize.topic,
            poll_interval_ms = self.config.poll_interval.as_millis() as u64,
            "Job dispatcher started"
        );

        let mut interval = tokio::time::interval(self.config.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {}
            }

            let report = self.tick(&cancel).await;
            if report != TickReport::default() {
                tracing::debug!(?report, "Poll finished");
            }
        }

        tracing::info!("Job dispatcher stopped: cancellation requested");
    }

    /// Polls the transcode topic, then the finalize topic.
    pub async fn tick(&self, cancel: &CancellationToken) -> TickReport {
        let mut report = TickReport::default();

        let messages = self.fetch(&self.config.transcode, cancel, &mut report).await;
        for (index, message) in messages.iter().enumerate() {
            if cancel.is_cancelled() {
                self.leave_rest(&messages[index..], &mut report);
                return report;
            }
            self.dispatch_transcode(message, &mut report).await;
        }

        let messages = self.fetch(&self.config.finalize, cancel, &mut report).await;
        for (index, message) in messages.iter().enumerate() {
            if cancel.is_cancelled() {
                self.leave_rest(&messages[index..], &mut report);
                return report;
            }
            self.dispatch_finalize(message, &mut report).await;
        }

        report
    }

    async fn fetch(
        &self,
        subscription: &Subscription,
        cancel: &CancellationToken,
        report: &mut TickReport,
    ) -> Vec<QueueMessage> {
        let mut messages = Vec::new();

        if let Some(min_idle) = self.config.reclaim_idle {
            let reclaim = self.queue.reclaim(
                &subscription.topic,
                &subscription.group,
                &self.config.consumer,
                min_idle,
                self.config.batch_size,
            );
            match cancellable(cancel, reclaim).await {
                Some(Ok(reclaimed)) => {
                    if !reclaimed.is_empty() {
                        tracing::info!(
                            topic = %subscription.topic,
                            count = reclaimed.len(),
                            "Reclaimed idle messages from other consumers"
                        );
                    }
                    report.reclaimed += reclaimed.len();
                    messages.extend(reclaimed);
                }
                Some(Err(e)) => {
                    tracing::warn!(topic = %subscription.topic, error = %e, "Reclaim failed");
                }
                None => return messages,
            }
        }

        let claim = self.queue.claim(
            &subscription.topic,
            &subscription.group,
            &self.config.consumer,
            self.config.batch_size,
        );
        match cancellable(cancel, claim).await {
            Some(Ok(claimed)) => {
                report.claimed += claimed.len();
                messages.extend(claimed);
            }
            Some(Err(e)) => {
                tracing::warn!(topic = %subscription.topic, error = %e, "Claim failed");
            }
            None => {}
        }

        messages
    }

    async fn dispatch_transcode(&self, message: &QueueMessage, report: &mut TickReport) {
        let subscription = &self.config.transcode;
        let job = match TranscodeJob::from_fields(&message.fields) {
            Ok(job) => job,
            Err(e) => return self.drop_poison(subscription, message, e, report).await,
        };

        let span = tracing::info_span!(
            "transcode_job",
            episode_id = %job.episode_id,
            attempt = job.attempt,
            message_id = %message.id,
        );

        let settled = async {
            let error = match self.within_deadline(self.transcode.handle(job.episode_id)).await {
                Ok(outcome) => {
                    tracing::info!(?outcome, "Transcode job done");
                    report.succeeded += 1;
                    return true;
                }
                Err(error) => error,
            };
            tracing::error!(error = %error, "Transcode job failed");

            match self.config.transcode_retry.decide(job.attempt) {
                RetryDecision::Retry { next_attempt } => {
                    let retry = job.with_attempt(next_attempt).to_fields();
                    self.requeue(subscription, &retry, next_attempt, report).await
                }
                RetryDecision::GiveUp => {
                    match self.transcode.dead_letter(job.episode_id, &error).await {
                        Ok(()) => {
                            report.dead_lettered += 1;
                            true
                        }
                        Err(e) => {
                            tracing::error!(error = %e, "Dead-letter failed, leaving message pending");
                            false
                        }
                    }
                }
            }
        }
        .instrument(span)
        .await;

        self.settle(subscription, message, settled, report).await;
    }

    async fn dispatch_finalize(&self, message: &QueueMessage, report: &mut TickReport) {
        let subscription = &self.config.finalize;
        let job = match FinalizeJob::from_fields(&message.fields) {
            Ok(job) => job,
            Err(e) => return self.drop_poison(subscription, message, e, report).await,
        };

        let span = tracing::info_span!(
            "finalize_job",
            session_id = %job.session_id,
            attempt = job.attempt,
            message_id = %message.id,
        );

        let settled = async {
            let error = match self.within_deadline(self.finalize.handle(&job)).await {
                Ok(outcome) => {
                    tracing::info!(?outcome, "Finalize job done");
                    report.succeeded += 1;
                    return true;
                }
                Err(error) => error,
            };
            tracing::error!(error = %error, "Finalize job failed");

            match self.config.finalize_retry.decide(job.attempt) {
                RetryDecision::Retry { next_attempt } => {
                    let retry = job.with_attempt(next_attempt).to_fields();
                    self.requeue(subscription, &retry, next_attempt, report).await
                }
                RetryDecision::GiveUp => {
                    tracing::error!(
                        max_attempts = self.config.finalize_retry.max_attempts(),
                        "Giving up on finalize job"
                    );
                    report.dead_lettered += 1;
                    true
                }
            }
        }
        .instrument(span)
        .await;

        self.settle(subscription, message, settled, report).await;
    }

    /// A run that overruns `job_timeout` is dropped and counts as a failed attempt.
    async fn within_deadline<T, E, F>(&self, operation: F) -> Result<T, String>
    where
        F: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let Some(limit) = self.config.job_timeout else {
            return operation.await.map_err(|e| e.to_string());
        };
        match tokio::time::timeout(limit, operation).await {
            Ok(result) => result.map_err(|e| e.to_string()),
            Err(_) => Err(format!("timed out after {}ms", limit.as_millis())),
        }
    }

    async fn requeue(
        &self,
        subscription: &Subscription,
        fields: &[(String, String)],
        next_attempt: u32,
        report: &mut TickReport,
    ) -> bool {
        match self.queue.enqueue(&subscription.topic, fields).await {
            Ok(message_id) => {
                tracing::warn!(next_attempt, retry_message_id = %message_id, "Job requeued");
                report.retried += 1;
                true
            }
            Err(e) => {
                tracing::error!(error = %e, "Requeue failed, leaving message pending");
                false
            }
        }
    }

    async fn drop_poison(
        &self,
        subscription: &Subscription,
        message: &QueueMessage,
        error: JobDecodeError,
        report: &mut TickReport,
    ) {
        tracing::warn!(
            topic = %subscription.topic,
            message_id = %message.id,
            error = %error,
            "Dropping undecodable job message"
        );
        report.poison += 1;
        self.ack(subscription, message).await;
    }

    async fn settle(
        &self,
        subscription: &Subscription,
        message: &QueueMessage,
        settled: bool,
        report: &mut TickReport,
    ) {
        if settled {
            self.ack(subscription, message).await;
        } else {
            report.left_pending += 1;
        }
    }

    async fn ack(&self, subscription: &Subscription, message: &QueueMessage) {
        if let Err(e) = self
            .queue
            .ack(&subscription.topic, &subscription.group, &[message.id.clone()])
            .await
        {
            tracing::warn!(
                topic = %subscription.topic,
                message_id = %message.id,
                error = %e,
                "Ack failed"
            );
        }
    }

    fn leave_rest(&self, rest: &[QueueMessage], report: &mut TickReport) {
        tracing::info!(
            remaining = rest.len(),
            "Cancellation requested, leaving remaining messages pending"
        );
        report.left_pending += rest.len();
    }
}

async fn cancellable<F>(
    cancel: &CancellationToken,
    operation: F,
) -> Option<Result<Vec<QueueMessage>, QueueError>>
where
    F: Future<Output = Result<Vec<QueueMessage>, QueueError>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => None,
        result = operation => Some(result),
    }
}
