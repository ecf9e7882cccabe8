use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid bpm {0}: must be a finite value above zero")]
    InvalidBpm(f64),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    // audio device bring-up; reported once, never retried
    #[error("no default output device")]
    NoOutputDevice,
    #[error("unsupported sample format {0:?} (only f32 output is supported)")]
    UnsupportedSampleFormat(cpal::SampleFormat),
    #[error("failed to query output config: {0}")]
    OutputConfig(#[from] cpal::DefaultStreamConfigError),
    #[error("failed to build output stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),
    #[error("failed to start output stream: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),

    #[error("wav encoding failed: {0}")]
    Wav(#[from] hound::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("config parse error: {0}")]
    Json(#[from] serde_json::Error),
}
