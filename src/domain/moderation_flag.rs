use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};

pub const SEVERITY_KEYWORD_HIT: i16 = 1;
pub const SEVERITY_PROCESSING_FAILED: i16 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlagStatus {
    Open,
    Review,
    Actioned,
}

impl FlagStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlagStatus::Open => "open",
            FlagStatus::Review => "review",
            FlagStatus::Actioned => "actioned",
        }
    }
}

impl FromStr for FlagStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(FlagStatus::Open),
            "review" => Ok(FlagStatus::Review),
            "actioned" => Ok(FlagStatus::Actioned),
            _ => Err(format!("Invalid flag status: {}", s)),
        }
    }
}

impl fmt::Display for FlagStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModerationFlag {
    pub id: i64,
    pub object_ref: String,
    pub severity: i16,
    pub reason: String,
    pub status: FlagStatus,
    pub created_at: DateTime<Utc>,
}

/// A flag to append; always inserted as `open`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewModerationFlag {
    pub object_ref: String,
    pub severity: i16,
    pub reason: String,
}

impl NewModerationFlag {
    pub fn keyword_hit(object_ref: impl Into<String>, term: &str) -> Self {
        Self {
            object_ref: object_ref.into(),
            severity: SEVERITY_KEYWORD_HIT,
            reason: format!("keyword_hit:{}", term),
        }
    }

    pub fn processing_failed(object_ref: impl Into<String>, error: &str) -> Self {
        Self {
            object_ref: object_ref.into(),
            severity: SEVERITY_PROCESSING_FAILED,
            reason: format!("processing_failed:{}", error),
        }
    }
}
