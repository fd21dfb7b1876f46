use std::path::PathBuf;

use thiserror::Error;

/// Every way a single video (or the batch around it) can go wrong.
#[derive(Error, Debug)]
pub enum ShortsError {
    #[error("cannot open source video {path}: {reason}")]
    SourceOpen { path: PathBuf, reason: String },
    #[error("decoded frame has zero area ({width}x{height})")]
    ZeroAreaFrame { width: u32, height: u32 },
    #[error("no frame could be decoded from {0}")]
    EmptySource(PathBuf),
    #[error("frame decoding failed: {0}")]
    Decode(String),
    #[error("encoder unavailable: {0}")]
    EncoderUnavailable(String),
    #[error("audio muxing failed: {0}")]
    Muxing(String),
    #[error("title resolution failed: {0}")]
    TitleResolution(String),
    #[error("frame encoding failed: {0}")]
    Encode(String),
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl ShortsError {
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Resource-class failures end the whole batch; everything else is
    /// contained to the video it happened in.
    pub fn is_fatal_for_batch(&self) -> bool {
        matches!(self, Self::Io { .. })
    }
}
