pub mod batch;
pub mod error;
pub mod progress;

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use image::RgbImage;
use log::{debug, info, warn};
use rand::Rng;

use crate::background::{create_background, BackgroundSource};
use crate::compositor::composite;
use crate::config::{RunContext, OUTPUT_EXTENSION, OUTPUT_SUFFIX, PROGRESS_INTERVAL, WORKING_SUFFIX};
use crate::font::{Face, FontProvider};
use crate::mux::{finalize, AudioMuxer, FfmpegMuxer};
use crate::perturb::Perturbation;
use crate::title::{render_title, resolve_title, ResolvedTitle, TitleLayout, TitleResolver};
use crate::video::{FfmpegMediaIo, FrameSink, FrameSource, MediaIo};
use crate::watermark::Watermark;
use error::ShortsError;
use progress::{Progress, ProgressHook};

/// Capabilities chosen once at startup and shared by every video of a run.
pub struct Toolkit {
    pub media: Box<dyn MediaIo>,
    pub muxer: Box<dyn AudioMuxer>,
    pub titles: Box<dyn TitleResolver>,
    pub fonts: Box<dyn FontProvider>,
}

impl Toolkit {
    /// ffmpeg for decoding, encoding and muxing. `muxer` has already
    /// settled whether ffmpeg runs.
    pub fn ffmpeg(
        muxer: FfmpegMuxer,
        titles: Box<dyn TitleResolver>,
        fonts: Box<dyn FontProvider>,
    ) -> Self {
        Self {
            media: Box::new(FfmpegMediaIo),
            muxer: Box::new(muxer),
            titles,
            fonts,
        }
    }
}

/// One source video and where its result goes.
#[derive(Debug, Clone)]
pub struct VideoJob {
    pub source: PathBuf,
    pub output: PathBuf,
    pub background: Option<PathBuf>,
    pub title_override: Option<String>,
}

impl VideoJob {
    pub fn new(source: impl Into<PathBuf>, output_dir: &Path) -> Self {
        let source = source.into();
        Self {
            output: output_path(output_dir, &source),
            source,
            background: None,
            title_override: None,
        }
    }
}

/// `<output_dir>/<stem>_editado.mp4`
pub fn output_path(output_dir: &Path, source: &Path) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "video".to_string());
    output_dir.join(format!("{stem}_{OUTPUT_SUFFIX}.{OUTPUT_EXTENSION}"))
}

/// Silent stream written next to the final output while frames stream.
pub fn working_path(output: &Path) -> PathBuf {
    output.with_extension(format!("{WORKING_SUFFIX}.{OUTPUT_EXTENSION}"))
}

/// Stages a single video moves through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Opening,
    BuildingBackdrop,
    StreamingFrames,
    Finalizing,
    Completed,
    Cancelled,
    Failed,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Opening => "opening",
            Self::BuildingBackdrop => "building backdrop",
            Self::StreamingFrames => "streaming frames",
            Self::Finalizing => "finalizing",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

#[derive(Debug)]
pub enum VideoOutcome {
    Completed { muxed: bool },
    Cancelled,
    Failed(ShortsError),
}

impl VideoOutcome {
    pub fn success(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }

    pub fn state(&self) -> PipelineState {
        match self {
            Self::Completed { .. } => PipelineState::Completed,
            Self::Cancelled => PipelineState::Cancelled,
            Self::Failed(_) => PipelineState::Failed,
        }
    }
}

/// What happened to one video.
#[derive(Debug)]
pub struct VideoReport {
    pub source: PathBuf,
    pub output: PathBuf,
    pub outcome: VideoOutcome,
    pub frames_written: u64,
    pub title: Option<ResolvedTitle>,
    pub background: Option<BackgroundSource>,
}

impl VideoReport {
    pub fn success(&self) -> bool {
        self.outcome.success()
    }
}

/// Background plus burned-in caption, built once per video and copied for
/// every output frame.
#[derive(Debug, Clone)]
pub struct Backdrop {
    pub image: RgbImage,
    pub background: BackgroundSource,
    pub title: TitleLayout,
}

pub fn render_backdrop<R: Rng>(
    ctx: &RunContext,
    face: &Face,
    background: Option<&Path>,
    title: &str,
    rng: &mut R,
) -> Backdrop {
    let config = &ctx.config;
    let bg = create_background(&ctx.layout, background, config.pattern, rng);
    let mut image = bg.image;
    let title = render_title(
        &mut image,
        title,
        config.title_anchor,
        config.title_font_size,
        face,
        &ctx.layout,
    );
    Backdrop {
        image,
        background: bg.source,
        title,
    }
}

/// Deletes the silent working stream when dropped, unless it has already
/// been moved into place.
pub struct WorkingFile {
    path: PathBuf,
}

impl WorkingFile {
    pub fn new(path: PathBuf) -> Self {
        if path.exists() {
            match fs::remove_file(&path) {
                Ok(()) => debug!("removed stale working file {}", path.display()),
                Err(e) => warn!("cannot remove stale {}: {e}", path.display()),
            }
        }
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for WorkingFile {
    fn drop(&mut self) {
        if self.path.exists() {
            match fs::remove_file(&self.path) {
                Ok(()) => debug!("removed working file {}", self.path.display()),
                Err(e) => warn!("cannot remove {}: {e}", self.path.display()),
            }
        }
    }
}

enum StreamEnd {
    Finished(u64),
    Cancelled(u64),
}

struct Run<'a, H> {
    job: &'a VideoJob,
    toolkit: &'a Toolkit,
    ctx: &'a RunContext,
    hook: &'a H,
    state: PipelineState,
    frames_written: u64,
    title: Option<ResolvedTitle>,
    background: Option<BackgroundSource>,
}

impl<H: ProgressHook> Run<'_, H> {
    fn enter(&mut self, next: PipelineState) {
        debug!("{}: {} -> {}", self.job.source.display(), self.state, next);
        self.state = next;
    }

    fn execute<R: Rng>(&mut self, rng: &mut R) -> Result<VideoOutcome, ShortsError> {
        self.enter(PipelineState::Opening);
        let mut source = self.toolkit.media.open_source(&self.job.source)?;
        let info = source.info();
        if info.width == 0 || info.height == 0 {
            return Err(ShortsError::ZeroAreaFrame {
                width: info.width,
                height: info.height,
            });
        }

        self.enter(PipelineState::BuildingBackdrop);
        let title = resolve_title(
            self.job.title_override.as_deref(),
            self.toolkit.titles.as_ref(),
            &self.job.source,
            rng,
        );
        self.hook.status(format!("title: {}", title.text));
        let face = self.toolkit.fonts.face();
        let backdrop = render_backdrop(
            self.ctx,
            face,
            self.job.background.as_deref(),
            &title.text,
            rng,
        );
        self.title = Some(title);
        self.background = Some(backdrop.background.clone());
        let watermark = Watermark::new(&self.ctx.config.watermark_text, face, &self.ctx.layout);
        let perturbation = self
            .ctx
            .config
            .perturb
            .then(|| Perturbation::for_video(info.total_frames));
        if let Some(p) = &perturbation {
            debug!(
                "perturbation seed {} (contrast {:.3}, brightness {:.2}, crop {})",
                p.seed, p.contrast, p.brightness, p.crop_border
            );
        }

        self.enter(PipelineState::StreamingFrames);
        let working = WorkingFile::new(working_path(&self.job.output));
        let sink = self.toolkit.media.create_sink(
            working.path(),
            self.ctx.layout.canvas_width,
            self.ctx.layout.canvas_height,
            info.fps,
        )?;
        let end = self.stream(
            source.as_mut(),
            sink,
            &backdrop.image,
            &watermark,
            perturbation.as_ref(),
            info.total_frames,
        )?;
        drop(source);

        match end {
            StreamEnd::Cancelled(written) => {
                self.frames_written = written;
                Ok(VideoOutcome::Cancelled)
            }
            StreamEnd::Finished(written) => {
                self.frames_written = written;
                self.enter(PipelineState::Finalizing);
                self.hook.status("adding audio");
                let outcome = finalize(
                    working.path(),
                    &self.job.source,
                    &self.job.output,
                    self.toolkit.muxer.as_ref(),
                    &self.ctx.cancel,
                )?;
                Ok(VideoOutcome::Completed {
                    muxed: outcome.is_muxed(),
                })
            }
        }
    }

    fn stream(
        &mut self,
        source: &mut dyn FrameSource,
        mut sink: Box<dyn FrameSink>,
        backdrop: &RgbImage,
        watermark: &Watermark,
        perturbation: Option<&Perturbation>,
        total_frames: u64,
    ) -> Result<StreamEnd, ShortsError> {
        let area = self.ctx.layout.video_area();
        let mut written = 0u64;
        loop {
            if self.ctx.cancel.is_cancelled() {
                info!("{}: cancelled after {written} frames", self.job.source.display());
                return Ok(StreamEnd::Cancelled(written));
            }
            let frame = match source.next_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => break,
                Err(e) if written > 0 => {
                    warn!("{}: treating decode error as end of stream: {e}", self.job.source.display());
                    break;
                }
                Err(e) => return Err(e),
            };
            let frame = match perturbation {
                Some(p) => p.apply(frame),
                None => frame,
            };
            let mut canvas = composite(backdrop, &frame, area)?;
            watermark.apply(&mut canvas);
            sink.write_frame(&canvas)?;
            written += 1;

            if written % PROGRESS_INTERVAL == 0 && total_frames > 0 {
                let percent = (written as f32 / total_frames as f32 * 100.0).min(100.0);
                self.hook.report(Progress::Percent(percent));
            }
        }

        if written == 0 {
            return Err(ShortsError::EmptySource(self.job.source.clone()));
        }
        let encoded = sink.finish()?;
        self.hook.report(Progress::Percent(100.0));
        Ok(StreamEnd::Finished(encoded))
    }
}

/// Drive one video from opening to its terminal state.
///
/// Errors never escape: they end up in [`VideoReport::outcome`]. The
/// silent working file is removed on every exit path, and nothing is
/// written to `job.output` unless the outcome is `Completed`. A file left
/// there by an earlier run is not touched.
pub fn process_video<H: ProgressHook, R: Rng>(
    job: &VideoJob,
    toolkit: &Toolkit,
    ctx: &RunContext,
    hook: &H,
    rng: &mut R,
) -> VideoReport {
    let mut run = Run {
        job,
        toolkit,
        ctx,
        hook,
        state: PipelineState::Idle,
        frames_written: 0,
        title: None,
        background: None,
    };
    let outcome = run.execute(rng).unwrap_or_else(VideoOutcome::Failed);
    run.enter(outcome.state());

    match &outcome {
        VideoOutcome::Completed { muxed } => info!(
            "{} -> {} ({} frames, {})",
            job.source.display(),
            job.output.display(),
            run.frames_written,
            if *muxed { "with audio" } else { "silent" }
        ),
        VideoOutcome::Cancelled => info!("{}: stopped", job.source.display()),
        VideoOutcome::Failed(e) => warn!("{}: {e}", job.source.display()),
    }

    VideoReport {
        source: job.source.clone(),
        output: job.output.clone(),
        outcome,
        frames_written: run.frames_written,
        title: run.title,
        background: run.background,
    }
}
