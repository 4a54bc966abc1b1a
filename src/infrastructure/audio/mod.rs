mod ffmpeg_transcoder;

pub use ffmpeg_transcoder::{FfmpegConfig, FfmpegTranscoder, bucket_peaks, build_encode_args};
