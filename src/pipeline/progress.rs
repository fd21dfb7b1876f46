use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;

use log::info;

/// One notification from the worker to whoever is watching it.
#[derive(Debug, Clone, PartialEq)]
pub enum Progress {
    /// Fractional completion of the current video, 0.0..=100.0.
    Percent(f32),
    /// Free-text status line (title chosen, per-video verdict, ...).
    Status(String),
}

/// Receives progress from the pipeline.
///
/// Reporting is fire-and-forget: implementations must return promptly and
/// must never fail the caller. Watchers that render slower than updates
/// arrive may drop all but the latest value.
///
/// # Example
///
/// ```rust
/// use shortsmith::{Progress, ProgressHook};
///
/// struct Stdout;
///
/// impl ProgressHook for Stdout {
///     fn report(&self, update: Progress) {
///         println!("{update:?}");
///     }
/// }
/// ```
pub trait ProgressHook {
    fn report(&self, update: Progress);

    fn status(&self, message: impl Into<String>)
    where
        Self: Sized,
    {
        self.report(Progress::Status(message.into()));
    }
}

/// Discards every update.
pub struct NoopHook;

impl ProgressHook for NoopHook {
    fn report(&self, _update: Progress) {}
}

/// Forwards status lines to the `log` facade; percentages go to `debug`.
pub struct LogHook;

impl ProgressHook for LogHook {
    fn report(&self, update: Progress) {
        match update {
            Progress::Percent(p) => log::debug!("progress: {p:.1}%"),
            Progress::Status(s) => info!("{s}"),
        }
    }
}

impl ProgressHook for Sender<Progress> {
    fn report(&self, update: Progress) {
        // A dropped receiver just means nobody is watching anymore.
        let _ = self.send(update);
    }
}

impl<H: ProgressHook + ?Sized> ProgressHook for &H {
    fn report(&self, update: Progress) {
        (**self).report(update);
    }
}

/// Cooperative stop flag shared between the worker and its controller.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
