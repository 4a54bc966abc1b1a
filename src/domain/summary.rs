use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::EpisodeId;

/// Mood label to score in `0.0..=1.0`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MoodScores(pub BTreeMap<String, f32>);

#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    pub episode_id: EpisodeId,
    pub tldr: String,
    pub keywords: Vec<String>,
    pub mood: MoodScores,
}
