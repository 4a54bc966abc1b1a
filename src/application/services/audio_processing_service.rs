use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::StreamExt;
use tokio::io::AsyncWriteExt;
use tracing::instrument;

use crate::application::ports::{AudioTranscoder, MediaStore, MediaStoreError, TranscoderError};
use crate::domain::{EpisodeId, StorageKey, VoiceMask, Waveform};

const PROCESSED_FILE: &str = "processed.opus";

/// Result of running one recording through the audio toolchain.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedAudio {
    pub storage_key: StorageKey,
    pub duration: Duration,
    pub size_bytes: u64,
    pub waveform: Waveform,
}

/// Turns one uploaded original into the published opus artifact.
///
/// All intermediate files live in a scratch directory under `scratch_root`
/// that is removed when processing returns, whatever the outcome.
pub struct AudioProcessingService {
    media_store: Arc<dyn MediaStore>,
    transcoder: Arc<dyn AudioTranscoder>,
    scratch_root: PathBuf,
}

impl AudioProcessingService {
    pub fn new(
        media_store: Arc<dyn MediaStore>,
        transcoder: Arc<dyn AudioTranscoder>,
        scratch_root: PathBuf,
    ) -> Self {
        Self {
            media_store,
            transcoder,
            scratch_root,
        }
    }

    #[instrument(skip(self), fields(episode_id = %episode_id, source = %source, mask = %mask))]
    pub async fn process(
        &self,
        episode_id: EpisodeId,
        source: &StorageKey,
        mask: VoiceMask,
    ) -> Result<ProcessedAudio, AudioProcessingError> {
        tokio::fs::create_dir_all(&self.scratch_root)
            .await
            .map_err(AudioProcessingError::Scratch)?;
        let scratch = tempfile::Builder::new()
            .prefix("episode-")
            .tempdir_in(&self.scratch_root)
            .map_err(AudioProcessingError::Scratch)?;

        let original = scratch.path().join(original_file_name(source));
        let processed = scratch.path().join(PROCESSED_FILE);

        self.download(source, &original).await?;
        tracing::debug!(path = %original.display(), "Original downloaded");

        self.transcoder
            .encode(&original, &processed, mask)
            .await
            .map_err(AudioProcessingError::Encode)?;

        let probe = self
            .transcoder
            .probe(&processed)
            .await
            .map_err(AudioProcessingError::Probe)?;

        let waveform = self
            .transcoder
            .waveform(&processed)
            .await
            .map_err(AudioProcessingError::Waveform)?;

        let storage_key = StorageKey::processed(&episode_id);
        let data = tokio::fs::read(&processed)
            .await
            .map_err(|e| AudioProcessingError::Upload(MediaStoreError::Io(e)))?;
        self.media_store
            .put(&storage_key, Bytes::from(data), &[("processed", "true")])
            .await
            .map_err(AudioProcessingError::Upload)?;

        tracing::debug!(
            key = %storage_key,
            duration_ms = probe.duration.as_millis() as u64,
            size_bytes = probe.size_bytes,
            "Processed audio uploaded"
        );

        Ok(ProcessedAudio {
            storage_key,
            duration: probe.duration,
            size_bytes: probe.size_bytes,
            waveform,
        })
    }

    async fn download(&self, key: &StorageKey, dest: &Path) -> Result<(), AudioProcessingError> {
        let mut stream = self
            .media_store
            .get(key)
            .await
            .map_err(AudioProcessingError::Download)?;

        let mut file = tokio::fs::File::create(dest)
            .await
            .map_err(download_io)?;

        while let Some(chunk) = stream.next().await {
            let bytes = chunk.map_err(AudioProcessingError::Download)?;
            file.write_all(&bytes).await.map_err(download_io)?;
        }
        file.flush().await.map_err(download_io)?;

        Ok(())
    }
}

fn download_io(error: io::Error) -> AudioProcessingError {
    AudioProcessingError::Download(MediaStoreError::Io(error))
}

fn original_file_name(source: &StorageKey) -> String {
    match Path::new(source.as_str()).extension().and_then(|e| e.to_str()) {
        Some(ext) if !ext.is_empty() => format!("original.{}", ext),
        _ => "original".to_string(),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AudioProcessingError {
    #[error("scratch directory: {0}")]
    Scratch(io::Error),
    #[error("download original: {0}")]
    Download(MediaStoreError),
    #[error("encode: {0}")]
    Encode(TranscoderError),
    #[error("probe: {0}")]
    Probe(TranscoderError),
    #[error("waveform: {0}")]
    Waveform(TranscoderError),
    #[error("upload processed: {0}")]
    Upload(MediaStoreError),
}
