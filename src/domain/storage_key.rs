use std::fmt;

use super::EpisodeId;

/// Key of an object in the media bucket.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StorageKey(String);

impl StorageKey {
    /// Deterministic location of the transcoded artifact for an episode.
    pub fn processed(episode_id: &EpisodeId) -> Self {
        Self(format!("episodes/{}/processed.opus", episode_id.as_uuid()))
    }

    pub fn from_raw(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Blank keys are treated as absent.
    pub fn parse(key: Option<&str>) -> Option<Self> {
        key.map(str::trim)
            .filter(|k| !k.is_empty())
            .map(|k| Self(k.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Public URL for the key, prefixed with the CDN base when one is configured.
    pub fn playback_url(&self, cdn_base_url: Option<&str>) -> String {
        match cdn_base_url.map(|base| base.trim_end_matches('/')) {
            Some(base) if !base.is_empty() => format!("{}/{}", base, self.0),
            _ => self.0.clone(),
        }
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
