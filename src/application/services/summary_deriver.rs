//! Placeholder content summary.
//!
//! Stands in for a transcription + summarization service: everything is
//! derived from the voice mask and the duration so results are deterministic.

use std::collections::BTreeMap;

use crate::domain::{EpisodeId, MoodScores, Summary, VoiceMask};

#[derive(Debug, Clone, Copy, Default)]
pub struct SummaryDeriver;

impl SummaryDeriver {
    pub fn derive(&self, episode_id: EpisodeId, mask: VoiceMask, duration_sec: i32) -> Summary {
        let duration_sec = duration_sec.max(0);
        let (length_label, length_keyword) = length_bucket(duration_sec);

        let voice = match mask {
            VoiceMask::None => "in the speaker's own voice".to_string(),
            masked => format!("with a {} voice mask", masked.as_str()),
        };

        let tldr = format!(
            "A {} ({}m{:02}s) recorded {}.",
            length_label,
            duration_sec / 60,
            duration_sec % 60,
            voice
        );

        let mut keywords = vec![
            "audio".to_string(),
            length_keyword.to_string(),
            "voice".to_string(),
        ];
        if mask != VoiceMask::None {
            keywords.push("masked".to_string());
            keywords.push(mask.as_str().to_string());
        }

        Summary {
            episode_id,
            tldr,
            keywords,
            mood: mood_scores(mask, duration_sec),
        }
    }
}

fn length_bucket(duration_sec: i32) -> (&'static str, &'static str) {
    match duration_sec {
        s if s < 120 => ("quick take", "quick"),
        s if s < 900 => ("short episode", "short"),
        s if s < 2700 => ("episode", "medium"),
        _ => ("long-form episode", "long"),
    }
}

fn mood_scores(mask: VoiceMask, duration_sec: i32) -> MoodScores {
    let hours = duration_sec as f32 / 3600.0;
    let calm = round2((0.4 + hours * 0.5).min(1.0));
    let energetic = round2(1.0 - calm);
    let mysterious = match mask {
        VoiceMask::None => 0.1,
        VoiceMask::Basic => 0.5,
        VoiceMask::Studio => 0.7,
    };

    let mut scores = BTreeMap::new();
    scores.insert("calm".to_string(), calm);
    scores.insert("energetic".to_string(), energetic);
    scores.insert("mysterious".to_string(), mysterious);
    MoodScores(scores)
}

fn round2(value: f32) -> f32 {
    (value * 100.0).round() / 100.0
}
