use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::application::ports::{JobQueue, QueueError, QueueMessage};
use crate::domain::JobFields;

struct PendingEntry {
    consumer: String,
    delivered_at: Instant,
}

#[derive(Default)]
struct GroupState {
    /// Sequence of the last entry handed out with `>`.
    last_delivered: u64,
    pending: BTreeMap<u64, PendingEntry>,
}

#[derive(Default)]
struct StreamState {
    entries: Vec<JobFields>,
    groups: HashMap<String, GroupState>,
}

/// Single-process broker with consumer-group semantics: delivered entries
/// stay pending per group until acknowledged and can be reclaimed once idle.
#[derive(Default)]
pub struct InMemoryJobQueue {
    streams: Mutex<HashMap<String, StreamState>>,
}

impl InMemoryJobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every entry ever appended to `topic`, oldest first.
    pub fn messages(&self, topic: &str) -> Vec<JobFields> {
        self.streams
            .lock()
            .ok()
            .and_then(|streams| streams.get(topic).map(|s| s.entries.clone()))
            .unwrap_or_default()
    }

    /// Entries delivered to `group` and not yet acknowledged.
    pub fn pending_count(&self, topic: &str, group: &str) -> usize {
        self.streams
            .lock()
            .ok()
            .and_then(|streams| {
                streams
                    .get(topic)
                    .and_then(|s| s.groups.get(group))
                    .map(|g| g.pending.len())
            })
            .unwrap_or(0)
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, StreamState>>, QueueError> {
        self.streams
            .lock()
            .map_err(|e| QueueError::ConnectionFailed(e.to_string()))
    }
}

fn message_id(seq: u64) -> String {
    format!("{}-0", seq)
}

fn parse_message_id(id: &str) -> Option<u64> {
    id.split_once('-').and_then(|(seq, _)| seq.parse().ok())
}

fn to_message(stream: &StreamState, seq: u64) -> Option<QueueMessage> {
    let index = usize::try_from(seq).ok()?.checked_sub(1)?;
    stream.entries.get(index).map(|fields| QueueMessage {
        id: message_id(seq),
        fields: fields.clone(),
    })
}

#[async_trait]
impl JobQueue for InMemoryJobQueue {
    async fn enqueue(&self, topic: &str, fields: &[(String, String)]) -> Result<String, QueueError> {
        let mut streams = self.lock()?;
        let stream = streams.entry(topic.to_string()).or_default();
        stream.entries.push(fields.iter().cloned().collect());
        Ok(message_id(stream.entries.len() as u64))
    }

    async fn claim(
        &self,
        topic: &str,
        group: &str,
        consumer: &str,
        batch_size: usize,
    ) -> Result<Vec<QueueMessage>, QueueError> {
        let mut streams = self.lock()?;
        let stream = streams.entry(topic.to_string()).or_default();
        let total = stream.entries.len() as u64;
        let state = stream.groups.entry(group.to_string()).or_default();

        let first = state.last_delivered + 1;
        let last = total.min(state.last_delivered + batch_size as u64);
        let now = Instant::now();
        for seq in first..=last {
            state.pending.insert(
                seq,
                PendingEntry {
                    consumer: consumer.to_string(),
                    delivered_at: now,
                },
            );
        }
        state.last_delivered = state.last_delivered.max(last);

        Ok((first..=last)
            .filter_map(|seq| to_message(stream, seq))
            .collect())
    }

    async fn reclaim(
        &self,
        topic: &str,
        group: &str,
        consumer: &str,
        min_idle: Duration,
        batch_size: usize,
    ) -> Result<Vec<QueueMessage>, QueueError> {
        let mut streams = self.lock()?;
        let Some(stream) = streams.get_mut(topic) else {
            return Ok(Vec::new());
        };
        let Some(state) = stream.groups.get_mut(group) else {
            return Ok(Vec::new());
        };

        let now = Instant::now();
        let mut reclaimed = Vec::new();
        for (seq, entry) in state.pending.iter_mut() {
            if reclaimed.len() >= batch_size {
                break;
            }
            if now.duration_since(entry.delivered_at) >= min_idle {
                entry.consumer = consumer.to_string();
                entry.delivered_at = now;
                reclaimed.push(*seq);
            }
        }

        Ok(reclaimed
            .into_iter()
            .filter_map(|seq| to_message(stream, seq))
            .collect())
    }

    async fn ack(&self, topic: &str, group: &str, ids: &[String]) -> Result<(), QueueError> {
        let mut streams = self.lock()?;
        if let Some(state) = streams
            .get_mut(topic)
            .and_then(|s| s.groups.get_mut(group))
        {
            for seq in ids.iter().filter_map(|id| parse_message_id(id)) {
                state.pending.remove(&seq);
            }
        }
        Ok(())
    }
}
