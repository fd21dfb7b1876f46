use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver};
use std::thread::{self, JoinHandle};

use log::info;
use rand::seq::SliceRandom;

use super::error::ShortsError;
use super::progress::{CancelToken, Progress, ProgressHook};
use super::{process_video, Toolkit, VideoJob, VideoOutcome, VideoReport};
use crate::config::{RunContext, IMAGE_EXTENSIONS, VIDEO_EXTENSIONS};

/// Regular files in `dir` whose extension is in `extensions`
/// (case-insensitive), sorted by file name. Not recursive.
fn iter_files(dir: &Path, extensions: &[&str]) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)
        .into_iter()
        .flatten()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().map(|ft| ft.is_file()).unwrap_or(false))
        .map(|e| e.path())
        .filter(|p| {
            p.extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| extensions.iter().any(|ex| ex.eq_ignore_ascii_case(ext)))
                .unwrap_or(false)
        })
        .collect();
    files.sort_by_key(|p| {
        p.file_name()
            .map(|n| n.to_string_lossy().to_lowercase())
            .unwrap_or_default()
    });
    files
}

pub fn discover_videos(dir: &Path) -> Vec<PathBuf> {
    iter_files(dir, VIDEO_EXTENSIONS)
}

pub fn discover_images(dir: &Path) -> Vec<PathBuf> {
    iter_files(dir, IMAGE_EXTENSIONS)
}

/// Videos to process and the inputs shared across them.
#[derive(Debug, Clone, Default)]
pub struct BatchJob {
    pub sources: Vec<PathBuf>,
    pub output_dir: PathBuf,
    /// Pool of background images; one is drawn per video.
    pub backgrounds: Vec<PathBuf>,
    pub title_override: Option<String>,
}

impl BatchJob {
    pub fn from_dirs(
        input_dir: &Path,
        output_dir: &Path,
        background_dir: Option<&Path>,
        title_override: Option<String>,
    ) -> Self {
        Self {
            sources: discover_videos(input_dir),
            output_dir: output_dir.to_path_buf(),
            backgrounds: background_dir.map(discover_images).unwrap_or_default(),
            title_override: title_override.filter(|t| !t.trim().is_empty()),
        }
    }
}

#[derive(Debug, Default)]
pub struct BatchSummary {
    pub reports: Vec<VideoReport>,
    /// Cancellation halted the batch before every source was handled.
    pub stopped: bool,
}

impl BatchSummary {
    pub fn succeeded(&self) -> usize {
        self.reports.iter().filter(|r| r.success()).count()
    }

    pub fn failed(&self) -> usize {
        self.reports
            .iter()
            .filter(|r| matches!(r.outcome, VideoOutcome::Failed(_)))
            .count()
    }
}

/// Process every source in order on the calling thread.
///
/// Per-video failures are reported and skipped. Only an error that leaves
/// the output directory unusable ends the batch with `Err`. Cancellation
/// is honoured between videos and inside each one.
pub fn run_batch<H: ProgressHook>(
    job: &BatchJob,
    toolkit: &Toolkit,
    ctx: &RunContext,
    hook: &H,
) -> Result<BatchSummary, ShortsError> {
    fs::create_dir_all(&job.output_dir).map_err(|e| {
        ShortsError::io(
            format!("cannot create output directory {}", job.output_dir.display()),
            e,
        )
    })?;

    let mut rng = rand::thread_rng();
    let mut summary = BatchSummary::default();
    let total = job.sources.len();
    info!("processing {total} videos into {}", job.output_dir.display());

    for (i, source) in job.sources.iter().enumerate() {
        let name = source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if ctx.cancel.is_cancelled() {
            hook.status(format!("stopped before {name}"));
            summary.stopped = true;
            break;
        }
        hook.status(format!("[{}/{total}] {name}", i + 1));
        hook.report(Progress::Percent(0.0));

        let video = VideoJob {
            background: job.backgrounds.choose(&mut rng).cloned(),
            title_override: job.title_override.clone(),
            ..VideoJob::new(source.clone(), &job.output_dir)
        };
        let report = process_video(&video, toolkit, ctx, hook, &mut rng);

        let verdict = match &report.outcome {
            VideoOutcome::Completed { .. } => "ok".to_string(),
            VideoOutcome::Cancelled => "stopped".to_string(),
            VideoOutcome::Failed(e) => format!("failed: {e}"),
        };
        hook.status(format!("[{}/{total}] {name}: {verdict}", i + 1));

        match report.outcome {
            VideoOutcome::Failed(e) if e.is_fatal_for_batch() => return Err(e),
            VideoOutcome::Cancelled => {
                summary.stopped = true;
                summary.reports.push(report);
                break;
            }
            _ => summary.reports.push(report),
        }
    }

    info!(
        "batch done: {} ok, {} failed{}",
        summary.succeeded(),
        summary.failed(),
        if summary.stopped { ", stopped" } else { "" }
    );
    Ok(summary)
}

/// A batch running on its own worker thread.
pub struct BatchHandle {
    pub cancel: CancelToken,
    pub updates: Receiver<Progress>,
    pub join: JoinHandle<Result<BatchSummary, ShortsError>>,
}

impl BatchHandle {
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Block until the worker finishes.
    pub fn wait(self) -> Result<BatchSummary, ShortsError> {
        self.join.join().map_err(|_| {
            ShortsError::io("batch worker", io::Error::other("worker thread panicked"))
        })?
    }
}

/// Start `run_batch` on a dedicated thread. Progress arrives on
/// [`BatchHandle::updates`]; the caller never blocks the worker.
pub fn spawn_batch(job: BatchJob, toolkit: Toolkit, ctx: RunContext) -> io::Result<BatchHandle> {
    let (tx, rx) = mpsc::channel();
    let cancel = ctx.cancel.clone();
    let join = thread::Builder::new()
        .name("shortsmith-worker".into())
        .spawn(move || run_batch(&job, &toolkit, &ctx, &tx))?;
    Ok(BatchHandle {
        cancel,
        updates: rx,
        join,
    })
}
