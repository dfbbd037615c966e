use thiserror::Error;

/// Everything the pipeline can reject, at construction or on the render path.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PipelineError {
    #[error("FFT block size {0} is not a power of two")]
    NotPowerOfTwo(usize),

    #[error("FFT block size must be at least {min}, got {actual}")]
    BlockTooSmall { min: usize, actual: usize },

    #[error("expected a block of {expected} samples, got {actual}")]
    BlockSizeMismatch { expected: usize, actual: usize },

    #[error("track '{0}' has no samples")]
    EmptyTrack(String),

    #[error("unsupported output channel count {0} (only stereo is supported)")]
    UnsupportedChannelCount(usize),

    #[error("output buffer of {len} samples is not a whole number of {channels}-channel frames")]
    PartialFrame { len: usize, channels: usize },

    #[error("output channel buffers differ in length (left {left}, right {right})")]
    ChannelLengthMismatch { left: usize, right: usize },

    #[error("spectrum has {actual} bins, bus expects {expected}")]
    BinCountMismatch { expected: usize, actual: usize },

    #[error("analysis track {index} out of range for {tracks} tracks")]
    AnalysisTrackOutOfRange { index: usize, tracks: usize },

    #[error("track {0} has more than one analysis tap")]
    DuplicateAnalysisTrack(usize),

    #[error("no track at index {0}")]
    UnknownTrack(usize),

    #[error("invalid viewport: {0}")]
    InvalidViewport(&'static str),

    #[error("invalid session: {0}")]
    InvalidSession(&'static str),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
