//! Typed job payloads carried on the broker.
//!
//! The broker delivers flat string maps; these types are decoded from them
//! right after a claim so handlers never look at raw fields.

use std::collections::HashMap;
use std::str::FromStr;

use super::{EpisodeId, LiveSessionId, StorageKey};

pub const EPISODE_ID_FIELD: &str = "episode_id";
pub const SESSION_ID_FIELD: &str = "session_id";
pub const ATTEMPT_FIELD: &str = "attempt";
pub const RECORDING_KEY_FIELD: &str = "recording_key";
pub const DURATION_FIELD: &str = "duration_sec";

pub type JobFields = HashMap<String, String>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum JobDecodeError {
    #[error("missing field: {0}")]
    MissingField(&'static str),
    #[error("invalid {field}: {value:?}")]
    InvalidField { field: &'static str, value: String },
}

/// Publish a recorded episode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TranscodeJob {
    pub episode_id: EpisodeId,
    pub attempt: u32,
}

impl TranscodeJob {
    pub fn new(episode_id: EpisodeId) -> Self {
        Self {
            episode_id,
            attempt: 0,
        }
    }

    pub fn from_fields(fields: &JobFields) -> Result<Self, JobDecodeError> {
        Ok(Self {
            episode_id: required(fields, EPISODE_ID_FIELD)?,
            attempt: attempt(fields)?,
        })
    }

    pub fn to_fields(&self) -> Vec<(String, String)> {
        vec![
            (EPISODE_ID_FIELD.to_string(), self.episode_id.to_string()),
            (ATTEMPT_FIELD.to_string(), self.attempt.to_string()),
        ]
    }

    pub fn with_attempt(&self, attempt: u32) -> Self {
        Self { attempt, ..*self }
    }
}

/// Turn an ended live session into an episode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalizeJob {
    pub session_id: LiveSessionId,
    pub attempt: u32,
    pub recording_key: Option<StorageKey>,
    pub duration_sec: Option<i32>,
}

impl FinalizeJob {
    pub fn new(session_id: LiveSessionId) -> Self {
        Self {
            session_id,
            attempt: 0,
            recording_key: None,
            duration_sec: None,
        }
    }

    pub fn from_fields(fields: &JobFields) -> Result<Self, JobDecodeError> {
        Ok(Self {
            session_id: required(fields, SESSION_ID_FIELD)?,
            attempt: attempt(fields)?,
            recording_key: StorageKey::parse(fields.get(RECORDING_KEY_FIELD).map(String::as_str)),
            duration_sec: optional(fields, DURATION_FIELD)?,
        })
    }

    pub fn to_fields(&self) -> Vec<(String, String)> {
        let mut fields = vec![
            (SESSION_ID_FIELD.to_string(), self.session_id.to_string()),
            (ATTEMPT_FIELD.to_string(), self.attempt.to_string()),
        ];
        if let Some(key) = &self.recording_key {
            fields.push((RECORDING_KEY_FIELD.to_string(), key.to_string()));
        }
        if let Some(duration) = self.duration_sec {
            fields.push((DURATION_FIELD.to_string(), duration.to_string()));
        }
        fields
    }

    pub fn with_attempt(&self, attempt: u32) -> Self {
        Self {
            attempt,
            ..self.clone()
        }
    }
}

fn required<T: FromStr>(fields: &JobFields, field: &'static str) -> Result<T, JobDecodeError> {
    optional(fields, field)?.ok_or(JobDecodeError::MissingField(field))
}

fn optional<T: FromStr>(fields: &JobFields, field: &'static str) -> Result<Option<T>, JobDecodeError> {
    match fields.get(field).map(|v| v.trim()) {
        None | Some("") => Ok(None),
        Some(value) => value
            .parse()
            .map(Some)
            .map_err(|_| JobDecodeError::InvalidField {
                field,
                value: value.to_string(),
            }),
    }
}

fn attempt(fields: &JobFields) -> Result<u32, JobDecodeError> {
    Ok(optional(fields, ATTEMPT_FIELD)?.unwrap_or(0))
}
