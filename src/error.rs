use thiserror::Error;

/// Errors surfaced by the RADIOFRY core.
///
/// Every variant is recoverable at the session level: the session stays
/// usable after any of them.
#[derive(Debug, Error)]
pub enum RadioFryError {
    /// Export requested with neither a source buffer nor a recording.
    #[error("no audio available: load a source or record something first")]
    NoAudioAvailable,

    /// Reverse requested before any source was loaded.
    #[error("no audio loaded: upload audio before reversing")]
    NoAudioLoaded,

    /// The impulse response for a reverb preset could not be fetched or decoded.
    #[error("could not load reverb preset '{preset}': {reason}")]
    ImpulseResponse { preset: String, reason: String },

    #[error("unknown preset '{0}'")]
    UnknownPreset(String),

    #[error("invalid sample buffer: {0}")]
    InvalidBuffer(String),

    /// The offline render failed as a whole; no partial output exists.
    #[error("render failed: {0}")]
    Render(String),

    #[error("invalid effect chain configuration: {0}")]
    Config(#[from] serde_json::Error),

    #[cfg(feature = "wav-io")]
    #[error("wav decode failed: {0}")]
    Wav(#[from] hound::Error),
}

pub type Result<T> = std::result::Result<T, RadioFryError>;
