//! Redis Streams broker.
//!
//! One stream per topic, one consumer group per handler kind. New work is read
//! with `XREADGROUP ... >`; entries left pending by a dead consumer are taken
//! over with `XAUTOCLAIM`. A group that disappears with its stream (`DEL`, a
//! restart without persistence) is recreated on the next read.

use std::collections::HashSet;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::streams::{StreamId, StreamReadOptions, StreamReadReply};
use redis::{AsyncCommands, RedisError, Value};
use tracing::instrument;

use crate::application::ports::{JobQueue, QueueError, QueueMessage};
use crate::domain::JobFields;

const GROUP_EXISTS: &str = "BUSYGROUP";
const GROUP_MISSING: &str = "NOGROUP";

pub struct RedisStreamQueue {
    connection: MultiplexedConnection,
    known_groups: Mutex<HashSet<(String, String)>>,
}

impl RedisStreamQueue {
    #[instrument(skip(url))]
    pub async fn connect(url: &str) -> Result<Self, QueueError> {
        let client =
            redis::Client::open(url).map_err(|e| QueueError::ConnectionFailed(e.to_string()))?;
        let connection = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| QueueError::ConnectionFailed(e.to_string()))?;

        tracing::info!("Redis stream broker connected");
        Ok(Self {
            connection,
            known_groups: Mutex::new(HashSet::new()),
        })
    }

    /// Creates the group (and the stream) once per process; a concurrent
    /// creation by another worker is not an error.
    async fn ensure_group(&self, topic: &str, group: &str) -> Result<(), QueueError> {
        let key = (topic.to_string(), group.to_string());
        if self
            .known_groups
            .lock()
            .map(|groups| groups.contains(&key))
            .unwrap_or(false)
        {
            return Ok(());
        }

        let mut conn = self.connection.clone();
        let created: Result<(), RedisError> = conn.xgroup_create_mkstream(topic, group, "0").await;
        match created {
            Ok(()) => tracing::info!(topic, group, "Consumer group created"),
            Err(e) if e.code() == Some(GROUP_EXISTS) => {}
            Err(e) => return Err(QueueError::ConsumerGroup(e.to_string())),
        }

        if let Ok(mut groups) = self.known_groups.lock() {
            groups.insert(key);
        }
        Ok(())
    }

    /// Drops the cached group and creates it again.
    async fn recreate_group(&self, topic: &str, group: &str) -> Result<(), QueueError> {
        tracing::warn!(topic, group, "Consumer group is gone, recreating it");
        if let Ok(mut groups) = self.known_groups.lock() {
            groups.remove(&(topic.to_string(), group.to_string()));
        }
        self.ensure_group(topic, group).await
    }

    async fn read_new(
        &self,
        topic: &str,
        options: &StreamReadOptions,
    ) -> Result<Option<StreamReadReply>, RedisError> {
        let mut conn = self.connection.clone();
        conn.xread_options(&[topic], &[">"], options).await
    }

    async fn autoclaim(
        &self,
        topic: &str,
        group: &str,
        consumer: &str,
        min_idle: Duration,
        batch_size: usize,
    ) -> Result<Value, RedisError> {
        let mut conn = self.connection.clone();
        redis::cmd("XAUTOCLAIM")
            .arg(topic)
            .arg(group)
            .arg(consumer)
            .arg(min_idle.as_millis() as u64)
            .arg("0-0")
            .arg("COUNT")
            .arg(batch_size)
            .query_async(&mut conn)
            .await
    }
}

fn is_missing_group(error: &RedisError) -> bool {
    error.code() == Some(GROUP_MISSING)
}

#[async_trait]
impl JobQueue for RedisStreamQueue {
    #[instrument(skip(self, fields))]
    async fn enqueue(&self, topic: &str, fields: &[(String, String)]) -> Result<String, QueueError> {
        let mut conn = self.connection.clone();
        conn.xadd(topic, "*", fields)
            .await
            .map_err(|e| QueueError::CommandFailed(format!("XADD failed: {}", e)))
    }

    #[instrument(skip(self))]
    async fn claim(
        &self,
        topic: &str,
        group: &str,
        consumer: &str,
        batch_size: usize,
    ) -> Result<Vec<QueueMessage>, QueueError> {
        self.ensure_group(topic, group).await?;

        let options = StreamReadOptions::default()
            .group(group, consumer)
            .count(batch_size);
        let reply = match self.read_new(topic, &options).await {
            Err(e) if is_missing_group(&e) => {
                self.recreate_group(topic, group).await?;
                self.read_new(topic, &options).await
            }
            other => other,
        }
        .map_err(|e| QueueError::CommandFailed(format!("XREADGROUP failed: {}", e)))?;

        Ok(reply
            .map(|r| {
                r.keys
                    .into_iter()
                    .flat_map(|key| key.ids)
                    .map(stream_id_to_message)
                    .collect()
            })
            .unwrap_or_default())
    }

    #[instrument(skip(self))]
    async fn reclaim(
        &self,
        topic: &str,
        group: &str,
        consumer: &str,
        min_idle: Duration,
        batch_size: usize,
    ) -> Result<Vec<QueueMessage>, QueueError> {
        self.ensure_group(topic, group).await?;

        let reply = match self
            .autoclaim(topic, group, consumer, min_idle, batch_size)
            .await
        {
            Err(e) if is_missing_group(&e) => {
                self.recreate_group(topic, group).await?;
                self.autoclaim(topic, group, consumer, min_idle, batch_size)
                    .await
            }
            other => other,
        }
        .map_err(|e| QueueError::CommandFailed(format!("XAUTOCLAIM failed: {}", e)))?;

        parse_autoclaim_reply(reply)
    }

    #[instrument(skip(self, ids), fields(count = ids.len()))]
    async fn ack(&self, topic: &str, group: &str, ids: &[String]) -> Result<(), QueueError> {
        if ids.is_empty() {
            return Ok(());
        }
        let mut conn = self.connection.clone();
        let _: u64 = conn
            .xack(topic, group, ids)
            .await
            .map_err(|e| QueueError::CommandFailed(format!("XACK failed: {}", e)))?;
        Ok(())
    }
}

fn stream_id_to_message(entry: StreamId) -> QueueMessage {
    let fields = entry
        .map
        .iter()
        .filter_map(|(k, v)| value_to_string(v).map(|s| (k.clone(), s)))
        .collect();
    QueueMessage {
        id: entry.id,
        fields,
    }
}

/// `XAUTOCLAIM` replies `[next-cursor, [[id, [k, v, ...]], ...]]`, with a
/// third element listing deleted ids on Redis 7+.
fn parse_autoclaim_reply(reply: Value) -> Result<Vec<QueueMessage>, QueueError> {
    let Value::Bulk(parts) = reply else {
        return Err(QueueError::CommandFailed(
            "XAUTOCLAIM returned a non-array reply".to_string(),
        ));
    };
    let Some(Value::Bulk(entries)) = parts.into_iter().nth(1) else {
        return Ok(Vec::new());
    };

    let mut messages = Vec::with_capacity(entries.len());
    for entry in entries {
        let Value::Bulk(mut pair) = entry else {
            continue;
        };
        if pair.len() != 2 {
            continue;
        }
        let raw_fields = pair.pop();
        let Some(id) = pair.pop().as_ref().and_then(value_to_string) else {
            continue;
        };
        // Entries trimmed from the stream come back with a nil field list.
        let Some(Value::Bulk(raw_fields)) = raw_fields else {
            continue;
        };

        let fields: JobFields = raw_fields
            .chunks(2)
            .filter_map(|kv| match kv {
                [k, v] => Some((value_to_string(k)?, value_to_string(v)?)),
                _ => None,
            })
            .collect();
        messages.push(QueueMessage { id, fields });
    }
    Ok(messages)
}

fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::Data(bytes) => Some(String::from_utf8_lossy(bytes).into_owned()),
        Value::Status(s) => Some(s.clone()),
        Value::Int(i) => Some(i.to_string()),
        _ => None,
    }
}
