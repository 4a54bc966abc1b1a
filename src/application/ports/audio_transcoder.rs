use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::{VoiceMask, Waveform};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AudioProbe {
    pub duration: Duration,
    pub size_bytes: u64,
}

/// Boundary to the audio toolchain. Every operation works on local file
/// paths so the implementation can be an external process or a codec library.
#[async_trait]
pub trait AudioTranscoder: Send + Sync {
    /// Denoise, normalize and encode `input` into `output`, applying `mask`.
    async fn encode(&self, input: &Path, output: &Path, mask: VoiceMask)
    -> Result<(), TranscoderError>;

    async fn probe(&self, path: &Path) -> Result<AudioProbe, TranscoderError>;

    async fn waveform(&self, path: &Path) -> Result<Waveform, TranscoderError>;
}

#[derive(Debug, thiserror::Error)]
pub enum TranscoderError {
    #[error("failed to spawn {tool}: {message}")]
    Spawn { tool: String, message: String },
    #[error("{tool} exited with status {code:?}: {stderr}")]
    Failed {
        tool: String,
        code: Option<i32>,
        stderr: String,
    },
    #[error("unexpected output: {0}")]
    InvalidOutput(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
