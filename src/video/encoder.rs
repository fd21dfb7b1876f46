use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};

use image::RgbImage;
use log::info;

use super::{detached, FrameSink};
use crate::pipeline::error::ShortsError;

/// Encodes RGB frames into a silent H.264/MP4 file via the `ffmpeg` CLI.
///
/// Frames are piped as `rgb24` rawvideo; the output uses `yuv420p` so it
/// plays everywhere. If the sink is dropped without [`FrameSink::finish`]
/// the child is killed.
pub struct FfmpegSink {
    path: PathBuf,
    width: u32,
    height: u32,
    child: Child,
    stdin: Option<ChildStdin>,
    frames: u64,
}

impl FfmpegSink {
    pub fn create(path: &Path, width: u32, height: u32, fps: f64) -> Result<Self, ShortsError> {
        info!(
            "encoding to {} ({}x{} @ {:.3} fps)",
            path.display(),
            width,
            height,
            fps
        );

        let mut child = detached(&mut Command::new("ffmpeg"))
            .args([
                "-y",
                "-loglevel",
                "error",
                "-f",
                "rawvideo",
                "-pixel_format",
                "rgb24",
                "-video_size",
                &format!("{}x{}", width, height),
                "-framerate",
                &format!("{fps:.6}"),
                "-i",
                "pipe:0",
                "-an",
                "-c:v",
                "libx264",
                "-pix_fmt",
                "yuv420p",
                "-movflags",
                "+faststart",
            ])
            .arg(path)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| {
                ShortsError::EncoderUnavailable(format!(
                    "failed to spawn ffmpeg process, is ffmpeg installed? {e}"
                ))
            })?;

        let stdin = child.stdin.take();
        Ok(Self {
            path: path.to_path_buf(),
            width,
            height,
            child,
            stdin,
            frames: 0,
        })
    }
}

impl FrameSink for FfmpegSink {
    fn write_frame(&mut self, frame: &RgbImage) -> Result<(), ShortsError> {
        if frame.dimensions() != (self.width, self.height) {
            return Err(ShortsError::Encode(format!(
                "frame is {}x{}, stream is {}x{}",
                frame.width(),
                frame.height(),
                self.width,
                self.height
            )));
        }
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| ShortsError::Encode("ffmpeg stdin already closed".into()))?;
        stdin
            .write_all(frame.as_raw())
            .map_err(|e| ShortsError::Encode(format!("failed to write frame data to ffmpeg: {e}")))?;
        self.frames += 1;
        Ok(())
    }

    fn finish(mut self: Box<Self>) -> Result<u64, ShortsError> {
        drop(self.stdin.take());
        let status = self
            .child
            .wait()
            .map_err(|e| ShortsError::Encode(format!("ffmpeg process failed: {e}")))?;
        if !status.success() {
            return Err(ShortsError::Encode(format!(
                "ffmpeg exited with status: {status}"
            )));
        }
        info!("wrote {} frames to {}", self.frames, self.path.display());
        Ok(self.frames)
    }
}

impl Drop for FfmpegSink {
    fn drop(&mut self) {
        // Still holding stdin means finish() never ran: abandon the encode.
        if self.stdin.take().is_some() {
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}
