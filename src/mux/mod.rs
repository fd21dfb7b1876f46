use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use log::{debug, info, warn};

use crate::pipeline::error::ShortsError;
use crate::pipeline::progress::CancelToken;
use crate::video::{detached, is_ffmpeg_available, responds};

/// An external tool that copies video from one file and audio from another.
pub trait AudioMuxer: Send + Sync {
    fn is_available(&self) -> bool;

    /// One invocation, no retry. `output` may be left partially written on
    /// error; the caller cleans it up.
    fn mux(&self, silent: &Path, source: &Path, output: &Path) -> Result<(), ShortsError>;
}

/// `ffmpeg` remux: video stream copied, audio re-encoded to AAC, trimmed to
/// the shorter stream. Sources without audio still succeed.
///
/// Availability is settled once when the muxer is built, so muxing a video
/// costs exactly one process.
#[derive(Debug, Clone)]
pub struct FfmpegMuxer {
    program: PathBuf,
    available: bool,
}

impl FfmpegMuxer {
    /// `ffmpeg` from PATH.
    pub fn detect() -> Self {
        let available = is_ffmpeg_available();
        debug!("ffmpeg available: {available}");
        Self {
            program: PathBuf::from("ffmpeg"),
            available,
        }
    }

    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        let program = program.into();
        let available = responds(&program);
        debug!("muxer {} available: {available}", program.display());
        Self { program, available }
    }
}

impl AudioMuxer for FfmpegMuxer {
    fn is_available(&self) -> bool {
        self.available
    }

    fn mux(&self, silent: &Path, source: &Path, output: &Path) -> Result<(), ShortsError> {
        let out = detached(&mut Command::new(&self.program))
            .args(["-y", "-v", "error", "-i"])
            .arg(silent)
            .arg("-i")
            .arg(source)
            .args([
                "-c:v", "copy", "-c:a", "aac", "-map", "0:v:0", "-map", "1:a:0?", "-shortest",
            ])
            .arg(output)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .output()
            .map_err(|e| match e.kind() {
                io::ErrorKind::NotFound => ShortsError::EncoderUnavailable(format!(
                    "{} not found: {e}",
                    self.program.display()
                )),
                _ => ShortsError::Muxing(format!("failed to run {}: {e}", self.program.display())),
            })?;

        if !out.status.success() {
            let stderr = String::from_utf8_lossy(&out.stderr);
            return Err(ShortsError::Muxing(format!(
                "{} exited with {}: {}",
                self.program.display(),
                out.status,
                stderr.trim()
            )));
        }
        Ok(())
    }
}

/// How the final output file was produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MuxOutcome {
    Muxed,
    /// The silent stream was delivered unchanged.
    SilentFallback(String),
}

impl MuxOutcome {
    pub fn is_muxed(&self) -> bool {
        matches!(self, Self::Muxed)
    }
}

/// Turn the finished silent stream at `working` into the file at `output`.
///
/// The muxer is invoked at most once. When it is missing, fails, or the
/// run was cancelled before this point, the silent stream becomes the
/// output byte for byte. Only failing to place the file at all is an error.
pub fn finalize(
    working: &Path,
    source: &Path,
    output: &Path,
    muxer: &dyn AudioMuxer,
    cancel: &CancelToken,
) -> Result<MuxOutcome, ShortsError> {
    let reason = if cancel.is_cancelled() {
        "cancelled before muxing".to_string()
    } else if !muxer.is_available() {
        "encoder unavailable".to_string()
    } else {
        match muxer.mux(working, source, output) {
            Ok(()) if output.is_file() => {
                info!("muxed audio into {}", output.display());
                let _ = fs::remove_file(working);
                return Ok(MuxOutcome::Muxed);
            }
            Ok(()) => "muxer reported success but wrote nothing".to_string(),
            Err(e) => e.to_string(),
        }
    };

    warn!("{}: keeping silent video ({reason})", output.display());
    if output.exists() {
        let _ = fs::remove_file(output);
    }
    deliver(working, output)?;
    Ok(MuxOutcome::SilentFallback(reason))
}

/// Move `from` to `to`, copying when a rename is not possible.
fn deliver(from: &Path, to: &Path) -> Result<(), ShortsError> {
    if fs::rename(from, to).is_ok() {
        return Ok(());
    }
    fs::copy(from, to).map_err(|e| {
        ShortsError::io(format!("cannot write {}", to.display()), e)
    })?;
    let _ = fs::remove_file(from);
    Ok(())
}
