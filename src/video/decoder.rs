use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, Stdio};

use image::RgbImage;
use log::{debug, info};

use super::{detached, probe, FrameSource, SourceInfo};
use crate::pipeline::error::ShortsError;

/// Decodes a video into RGB frames through an `ffmpeg` child process.
///
/// The child is killed and reaped when the source is dropped, whether the
/// stream was read to the end or abandoned mid-way.
pub struct FfmpegSource {
    path: PathBuf,
    info: SourceInfo,
    child: Child,
    stdout: ChildStdout,
    frame_size: usize,
    frames_read: u64,
}

impl FfmpegSource {
    pub fn open(path: &Path) -> Result<Self, ShortsError> {
        let info = probe(path)?;
        if info.width == 0 || info.height == 0 {
            return Err(ShortsError::ZeroAreaFrame {
                width: info.width,
                height: info.height,
            });
        }
        info!(
            "decoding {} ({}x{} @ {:.2} fps, ~{} frames)",
            path.display(),
            info.width,
            info.height,
            info.fps,
            info.total_frames
        );

        let mut child = detached(&mut Command::new("ffmpeg"))
            .args(["-v", "error", "-noautorotate", "-i"])
            .arg(path)
            .args([
                "-map",
                "0:v:0",
                "-f",
                "rawvideo",
                "-pix_fmt",
                "rgb24",
                "-s",
                &format!("{}x{}", info.width, info.height),
                "pipe:1",
            ])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| ShortsError::SourceOpen {
                path: path.to_path_buf(),
                reason: format!("failed to spawn ffmpeg for decoding: {e}"),
            })?;

        let stdout = child.stdout.take().ok_or_else(|| ShortsError::SourceOpen {
            path: path.to_path_buf(),
            reason: "ffmpeg stdout unavailable".into(),
        })?;

        Ok(Self {
            path: path.to_path_buf(),
            info,
            child,
            stdout,
            frame_size: info.width as usize * info.height as usize * 3,
            frames_read: 0,
        })
    }
}

impl FrameSource for FfmpegSource {
    fn info(&self) -> SourceInfo {
        self.info
    }

    fn next_frame(&mut self) -> Result<Option<RgbImage>, ShortsError> {
        let mut buf = vec![0u8; self.frame_size];
        let filled = read_exact_or_eof(&mut self.stdout, &mut buf)
            .map_err(|e| ShortsError::Decode(format!("{}: {e}", self.path.display())))?;
        if !filled {
            debug!("{}: end of stream after {} frames", self.path.display(), self.frames_read);
            return Ok(None);
        }
        self.frames_read += 1;
        RgbImage::from_raw(self.info.width, self.info.height, buf)
            .map(Some)
            .ok_or(ShortsError::ZeroAreaFrame {
                width: self.info.width,
                height: self.info.height,
            })
    }
}

impl Drop for FfmpegSource {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

/// Read exactly `buf.len()` bytes, returning Ok(false) on clean EOF.
fn read_exact_or_eof(reader: &mut impl Read, buf: &mut [u8]) -> std::io::Result<bool> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => {
                if filled == 0 {
                    return Ok(false);
                } else {
                    return Err(std::io::Error::new(
                        std::io::ErrorKind::UnexpectedEof,
                        "partial frame read",
                    ));
                }
            }
            Ok(n) => filled += n,
            Err(ref e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(true)
}
