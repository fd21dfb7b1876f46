pub mod decoder;
pub mod encoder;

use std::path::Path;
use std::process::{Command, Stdio};

use image::RgbImage;
use log::debug;
use serde::Deserialize;

use crate::config::DEFAULT_FPS;
use crate::pipeline::error::ShortsError;

pub use decoder::FfmpegSource;
pub use encoder::FfmpegSink;

/// Stream properties known before the first frame is decoded.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SourceInfo {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    /// Best-effort frame count reported by the container.
    pub total_frames: u64,
}

/// An opened, decodable video stream.
pub trait FrameSource {
    fn info(&self) -> SourceInfo;

    /// Next frame in display order, `Ok(None)` at end of stream.
    fn next_frame(&mut self) -> Result<Option<RgbImage>, ShortsError>;
}

/// A silent video being written frame by frame.
pub trait FrameSink {
    fn write_frame(&mut self, frame: &RgbImage) -> Result<(), ShortsError>;

    /// Flush and close the stream; returns the number of frames written.
    fn finish(self: Box<Self>) -> Result<u64, ShortsError>;
}

/// Opens sources and creates sinks.
pub trait MediaIo: Send + Sync {
    fn open_source(&self, path: &Path) -> Result<Box<dyn FrameSource>, ShortsError>;

    fn create_sink(
        &self,
        path: &Path,
        width: u32,
        height: u32,
        fps: f64,
    ) -> Result<Box<dyn FrameSink>, ShortsError>;
}

/// The ffmpeg/ffprobe CLI backend. Decoding and encoding run over rawvideo
/// pipes.
pub struct FfmpegMediaIo;

impl MediaIo for FfmpegMediaIo {
    fn open_source(&self, path: &Path) -> Result<Box<dyn FrameSource>, ShortsError> {
        Ok(Box::new(FfmpegSource::open(path)?))
    }

    fn create_sink(
        &self,
        path: &Path,
        width: u32,
        height: u32,
        fps: f64,
    ) -> Result<Box<dyn FrameSink>, ShortsError> {
        Ok(Box::new(FfmpegSink::create(path, width, height, fps)?))
    }
}

pub fn is_ffmpeg_available() -> bool {
    responds(Path::new("ffmpeg"))
}

/// Whether `program -version` runs and exits cleanly.
pub fn responds(program: &Path) -> bool {
    detached(&mut Command::new(program))
        .arg("-version")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Put a child in its own process group so a terminal Ctrl-C reaches only
/// us. The pipeline then tears the child down itself, and a killed decoder
/// is never mistaken for a clean end of stream.
pub fn detached(cmd: &mut Command) -> &mut Command {
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        cmd.process_group(0);
    }
    cmd
}

#[derive(Deserialize)]
struct ProbeStream {
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
    nb_frames: Option<String>,
    duration: Option<String>,
}

#[derive(Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

#[derive(Deserialize)]
struct ProbeOut {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    format: Option<ProbeFormat>,
}

/// Read dimensions, frame rate and frame count with `ffprobe`.
pub fn probe(path: &Path) -> Result<SourceInfo, ShortsError> {
    let open_err = |reason: String| ShortsError::SourceOpen {
        path: path.to_path_buf(),
        reason,
    };

    if !path.is_file() {
        return Err(open_err("no such file".into()));
    }

    let out = detached(&mut Command::new("ffprobe"))
        .args(["-v", "error", "-print_format", "json", "-show_streams", "-show_format"])
        .arg(path)
        .stdin(Stdio::null())
        .output()
        .map_err(|e| open_err(format!("failed to run ffprobe: {e}")))?;
    if !out.status.success() {
        return Err(open_err(
            String::from_utf8_lossy(&out.stderr).trim().to_string(),
        ));
    }

    let parsed: ProbeOut = serde_json::from_slice(&out.stdout)
        .map_err(|e| open_err(format!("unreadable ffprobe output: {e}")))?;
    let info = source_info_from_probe(&parsed).ok_or_else(|| open_err("no video stream".into()))?;
    debug!(
        "probed {}: {}x{} @ {:.3} fps, {} frames",
        path.display(),
        info.width,
        info.height,
        info.fps,
        info.total_frames
    );
    Ok(info)
}

fn source_info_from_probe(parsed: &ProbeOut) -> Option<SourceInfo> {
    let stream = parsed
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))?;

    let fps = stream
        .avg_frame_rate
        .as_deref()
        .and_then(parse_ratio)
        .or_else(|| stream.r_frame_rate.as_deref().and_then(parse_ratio))
        .unwrap_or(DEFAULT_FPS);

    let duration = stream
        .duration
        .as_deref()
        .or(parsed.format.as_ref().and_then(|f| f.duration.as_deref()))
        .and_then(|d| d.parse::<f64>().ok());

    let total_frames = stream
        .nb_frames
        .as_deref()
        .and_then(|n| n.parse::<u64>().ok())
        .filter(|&n| n > 0)
        .or_else(|| duration.map(|d| (d * fps).round().max(0.0) as u64))
        .unwrap_or(0);

    Some(SourceInfo {
        width: stream.width.unwrap_or(0),
        height: stream.height.unwrap_or(0),
        fps,
        total_frames,
    })
}

/// Parse an ffmpeg rational such as `30000/1001`; zero rates are rejected.
fn parse_ratio(s: &str) -> Option<f64> {
    let (num, den) = s.split_once('/').unwrap_or((s, "1"));
    let num: f64 = num.trim().parse().ok()?;
    let den: f64 = den.trim().parse().ok()?;
    if num <= 0.0 || den <= 0.0 {
        return None;
    }
    Some(num / den)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ratio() {
        assert_eq!(parse_ratio("30/1"), Some(30.0));
        assert!((parse_ratio("30000/1001").unwrap() - 29.97).abs() < 0.01);
        assert_eq!(parse_ratio("0/0"), None);
        assert_eq!(parse_ratio("25"), Some(25.0));
    }

    #[test]
    fn test_probe_prefers_nb_frames() {
        let json = br#"{
            "streams": [
                {"codec_type": "audio"},
                {"codec_type": "video", "width": 1920, "height": 1080,
                 "avg_frame_rate": "30/1", "nb_frames": "300", "duration": "10.0"}
            ],
            "format": {"duration": "10.02"}
        }"#;
        let parsed: ProbeOut = serde_json::from_slice(json).unwrap();
        let info = source_info_from_probe(&parsed).unwrap();
        assert_eq!(
            info,
            SourceInfo {
                width: 1920,
                height: 1080,
                fps: 30.0,
                total_frames: 300
            }
        );
    }

    #[test]
    fn test_probe_estimates_frames_from_duration() {
        let json = br#"{
            "streams": [{"codec_type": "video", "width": 640, "height": 360,
                         "avg_frame_rate": "0/0", "r_frame_rate": "25/1"}],
            "format": {"duration": "4.0"}
        }"#;
        let parsed: ProbeOut = serde_json::from_slice(json).unwrap();
        let info = source_info_from_probe(&parsed).unwrap();
        assert_eq!(info.fps, 25.0);
        assert_eq!(info.total_frames, 100);
    }

    #[test]
    fn test_probe_without_video_stream() {
        let parsed: ProbeOut =
            serde_json::from_slice(br#"{"streams": [{"codec_type": "audio"}]}"#).unwrap();
        assert!(source_info_from_probe(&parsed).is_none());
    }

    #[test]
    fn test_missing_program_does_not_respond() {
        let path = std::env::temp_dir().join("shortsmith_no_such_program");
        assert!(!responds(&path));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_detached_child_leads_its_own_group() {
        // Field 5 of /proc/<pid>/stat is the process group id.
        let out = detached(&mut Command::new("sh"))
            .args(["-c", "echo $$; cut -d' ' -f5 /proc/$$/stat"])
            .output()
            .unwrap();
        let text = String::from_utf8(out.stdout).unwrap();
        let ids: Vec<&str> = text.lines().collect();
        assert_eq!(ids.len(), 2, "{text}");
        assert_eq!(ids[0], ids[1]);

        let own_group = std::fs::read_to_string("/proc/self/stat").unwrap();
        let own_group = own_group.rsplit(')').next().unwrap().split_whitespace().nth(2).unwrap();
        assert_ne!(ids[1], own_group);
    }

    #[test]
    fn test_probe_missing_file_is_source_open_error() {
        let path = std::env::temp_dir().join("shortsmith_no_such_video.mp4");
        assert!(matches!(probe(&path), Err(ShortsError::SourceOpen { .. })));
    }
}
