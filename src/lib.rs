pub mod background;
pub mod compositor;
pub mod config;
pub mod font;
pub mod mux;
pub mod perturb;
pub mod pipeline;
pub mod raster;
pub mod title;
pub mod video;
pub mod watermark;

pub use config::{Layout, RunContext, ShortsConfig};
pub use pipeline::batch::{run_batch, spawn_batch, BatchHandle, BatchJob, BatchSummary};
pub use pipeline::error::ShortsError;
pub use pipeline::progress::{CancelToken, LogHook, NoopHook, Progress, ProgressHook};
pub use pipeline::{
    process_video, render_backdrop, Toolkit, VideoJob, VideoOutcome, VideoReport,
};
