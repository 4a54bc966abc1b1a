use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::instrument;

use crate::application::ports::{AudioProbe, AudioTranscoder, TranscoderError};
use crate::domain::{VoiceMask, Waveform};

const FFMPEG: &str = "ffmpeg";
const FFPROBE: &str = "ffprobe";
const LOUDNESS_TARGET: &str = "loudnorm=I=-16";
const WAVEFORM_SAMPLE_RATE: u32 = 8000;
const STDERR_TAIL_LINES: usize = 20;

#[derive(Debug, Clone)]
pub struct FfmpegConfig {
    pub ffmpeg_path: PathBuf,
    pub ffprobe_path: PathBuf,
    pub opus_kbps: u32,
    pub sample_rate: u32,
    /// RNNoise model for `arnndn`; `afftdn` is used without one.
    pub rnnoise_model: Option<PathBuf>,
    pub waveform_points: usize,
}

impl Default for FfmpegConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: PathBuf::from(FFMPEG),
            ffprobe_path: PathBuf::from(FFPROBE),
            opus_kbps: 24,
            sample_rate: 48_000,
            rnnoise_model: None,
            waveform_points: 1000,
        }
    }
}

/// [`AudioTranscoder`] that shells out to ffmpeg and ffprobe.
pub struct FfmpegTranscoder {
    config: FfmpegConfig,
}

impl FfmpegTranscoder {
    pub fn new(config: FfmpegConfig) -> Self {
        Self { config }
    }

    async fn run(
        &self,
        tool: &'static str,
        program: &Path,
        args: &[String],
    ) -> Result<Vec<u8>, TranscoderError> {
        tracing::debug!(tool, args = ?args, "Running audio tool");

        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| TranscoderError::Spawn {
                tool: tool.to_string(),
                message: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(TranscoderError::Failed {
                tool: tool.to_string(),
                code: output.status.code(),
                stderr: stderr_tail(&output.stderr),
            });
        }

        Ok(output.stdout)
    }
}

#[async_trait]
impl AudioTranscoder for FfmpegTranscoder {
    #[instrument(skip(self), fields(input = %input.display(), mask = %mask))]
    async fn encode(
        &self,
        input: &Path,
        output: &Path,
        mask: VoiceMask,
    ) -> Result<(), TranscoderError> {
        let args = build_encode_args(&self.config, input, output, mask);
        self.run(FFMPEG, &self.config.ffmpeg_path, &args).await?;
        Ok(())
    }

    #[instrument(skip(self), fields(path = %path.display()))]
    async fn probe(&self, path: &Path) -> Result<AudioProbe, TranscoderError> {
        let stdout = self
            .run(FFPROBE, &self.config.ffprobe_path, &build_probe_args(path))
            .await?;
        let duration = parse_duration(&String::from_utf8_lossy(&stdout))?;
        let size_bytes = tokio::fs::metadata(path).await?.len();

        Ok(AudioProbe {
            duration,
            size_bytes,
        })
    }

    #[instrument(skip(self), fields(path = %path.display()))]
    async fn waveform(&self, path: &Path) -> Result<Waveform, TranscoderError> {
        let pcm = self
            .run(FFMPEG, &self.config.ffmpeg_path, &build_pcm_args(path))
            .await?;
        let samples: Vec<i16> = pcm
            .chunks_exact(2)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
            .collect();

        Ok(Waveform(bucket_peaks(&samples, self.config.waveform_points)))
    }
}

/// Denoise, normalize loudness, optionally mask, and encode mono Opus.
pub fn build_encode_args(
    config: &FfmpegConfig,
    input: &Path,
    output: &Path,
    mask: VoiceMask,
) -> Vec<String> {
    vec![
        "-y".to_string(),
        "-i".to_string(),
        input.display().to_string(),
        "-af".to_string(),
        filter_chain(config, mask),
        "-c:a".to_string(),
        "libopus".to_string(),
        "-b:a".to_string(),
        format!("{}k", config.opus_kbps),
        "-ar".to_string(),
        config.sample_rate.to_string(),
        "-ac".to_string(),
        "1".to_string(),
        output.display().to_string(),
    ]
}

fn filter_chain(config: &FfmpegConfig, mask: VoiceMask) -> String {
    let denoise = match &config.rnnoise_model {
        Some(model) => format!("arnndn=m={}", model.display()),
        None => "afftdn".to_string(),
    };
    let mut filters = vec![denoise, LOUDNESS_TARGET.to_string()];

    if let Some(shift) = mask.pitch_shift() {
        // loudnorm emits 192 kHz; asetrate only relabels, so pin the rate first.
        filters.push(format!("aresample={}", config.sample_rate));
        filters.push(format!(
            "asetrate={}*{:.2}",
            config.sample_rate, shift.resample_factor
        ));
        filters.push(format!("atempo={:.2}", shift.tempo));
    }

    filters.join(",")
}

fn build_probe_args(path: &Path) -> Vec<String> {
    [
        "-v",
        "error",
        "-select_streams",
        "a:0",
        "-show_entries",
        "stream=duration",
        "-of",
        "default=noprint_wrappers=1:nokey=1",
    ]
    .iter()
    .map(|s| s.to_string())
    .chain(std::iter::once(path.display().to_string()))
    .collect()
}

/// Decode to 16-bit little-endian mono PCM on stdout.
fn build_pcm_args(path: &Path) -> Vec<String> {
    vec![
        "-v".to_string(),
        "error".to_string(),
        "-i".to_string(),
        path.display().to_string(),
        "-ac".to_string(),
        "1".to_string(),
        "-ar".to_string(),
        WAVEFORM_SAMPLE_RATE.to_string(),
        "-f".to_string(),
        "s16le".to_string(),
        "-".to_string(),
    ]
}

fn parse_duration(stdout: &str) -> Result<Duration, TranscoderError> {
    let raw = stdout.lines().next().unwrap_or_default().trim();
    raw.parse::<f64>()
        .ok()
        .filter(|secs| secs.is_finite() && *secs >= 0.0)
        .map(Duration::from_secs_f64)
        .ok_or_else(|| TranscoderError::InvalidOutput(format!("duration {:?}", raw)))
}

/// Splits `samples` into `points` equal buckets and scales each bucket's
/// absolute peak against the loudest one to `0..=100`.
pub fn bucket_peaks(samples: &[i16], points: usize) -> Vec<u8> {
    if points == 0 {
        return Vec::new();
    }

    let len = samples.len();
    let raw: Vec<u16> = (0..points)
        .map(|i| {
            let start = i * len / points;
            let end = ((i + 1) * len / points).max(start);
            samples[start..end]
                .iter()
                .map(|s| s.unsigned_abs())
                .max()
                .unwrap_or(0)
        })
        .collect();

    let loudest = raw.iter().copied().max().unwrap_or(0);
    if loudest == 0 {
        return vec![0; points];
    }

    raw.into_iter()
        .map(|peak| ((u32::from(peak) * 100 + u32::from(loudest) / 2) / u32::from(loudest)) as u8)
        .collect()
}

fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let lines: Vec<&str> = text.lines().collect();
    lines[lines.len().saturating_sub(STDERR_TAIL_LINES)..].join("\n")
}
