use std::path::PathBuf;
use std::thread;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use log::warn;

use shortsmith::background::Pattern;
use shortsmith::config::{TITLE_FONT_SIZE, WATERMARK_TEXT};
use shortsmith::font::{FontChain, FontProvider};
use shortsmith::mux::{AudioMuxer, FfmpegMuxer};
use shortsmith::title::{CommandResolver, FilenameResolver, NoResolver, TitleAnchor, TitleResolver};
use shortsmith::watermark::Watermark;
use shortsmith::{
    render_backdrop, spawn_batch, BatchJob, CancelToken, Progress, RunContext, ShortsConfig,
    Toolkit,
};

/// shortsmith: turn landscape clips into captioned, watermarked vertical shorts.
#[derive(Parser)]
#[command(name = "shortsmith", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Look-and-feel options shared by every subcommand.
#[derive(Args)]
struct StyleArgs {
    /// Background pattern when no image is used (popcorn, cinema, plain)
    #[arg(long, default_value = "popcorn")]
    pattern: String,

    /// Caption position
    #[arg(long, value_enum, default_value_t = TitleAnchor::Top)]
    anchor: TitleAnchor,

    /// Caption font size in pixels
    #[arg(long, default_value_t = TITLE_FONT_SIZE)]
    font_size: f32,

    /// Handle burned near the bottom of every frame
    #[arg(long, default_value = WATERMARK_TEXT)]
    watermark: String,

    /// TrueType/OpenType font to use instead of searching the system
    #[arg(long)]
    font: Option<PathBuf>,

    /// Extra directory searched for fonts (repeatable)
    #[arg(long = "font-dir")]
    font_dirs: Vec<PathBuf>,
}

impl StyleArgs {
    fn config(&self, perturb: bool) -> ShortsConfig {
        ShortsConfig {
            pattern: Pattern::from_name(&self.pattern),
            title_anchor: self.anchor,
            title_font_size: self.font_size,
            perturb,
            watermark_text: self.watermark.clone(),
            font_path: self.font.clone(),
            font_dirs: self.font_dirs.clone(),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Process every video in a directory
    Batch {
        /// Directory containing source videos
        #[arg(short, long)]
        input: PathBuf,

        /// Directory the finished shorts are written to
        #[arg(short, long)]
        output: PathBuf,

        /// Directory of background images; one is picked per video
        #[arg(short, long)]
        backgrounds: Option<PathBuf>,

        /// Caption used for every video instead of resolving one
        #[arg(short, long)]
        title: Option<String>,

        /// Program printing a caption for the video path it is given
        #[arg(long, conflicts_with = "filename_titles")]
        title_command: Option<PathBuf>,

        /// Argument passed to the title program before the video path (repeatable)
        #[arg(long = "title-arg", requires = "title_command")]
        title_args: Vec<String>,

        /// Derive captions from file names like "my_great_clip.mp4"
        #[arg(long)]
        filename_titles: bool,

        /// Skip the brightness/contrast/crop perturbation
        #[arg(long)]
        no_perturb: bool,

        #[command(flatten)]
        style: StyleArgs,
    },

    /// Render the background, caption and watermark to a PNG without any video
    Backdrop {
        /// Output image path (.png)
        #[arg(short, long)]
        output: PathBuf,

        /// Background image to stretch onto the canvas
        #[arg(short, long)]
        background: Option<PathBuf>,

        /// Caption text
        #[arg(short, long, default_value = "Nada podia deter aquilo.")]
        title: String,

        #[command(flatten)]
        style: StyleArgs,
    },
}

/// The first Ctrl-C stops the batch once the current video is cleaned up;
/// a second one exits immediately.
fn stop_on_interrupt(cancel: CancelToken) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start signal runtime")?;
    thread::Builder::new()
        .name("shortsmith-signal".into())
        .spawn(move || {
            runtime.block_on(async {
                if tokio::signal::ctrl_c().await.is_err() {
                    return;
                }
                warn!("interrupted, cleaning up (Ctrl-C again to quit now)");
                cancel.cancel();
                if tokio::signal::ctrl_c().await.is_ok() {
                    std::process::exit(130);
                }
            })
        })
        .context("failed to start signal thread")?;
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Batch {
            input,
            output,
            backgrounds,
            title,
            title_command,
            title_args,
            filename_titles,
            no_perturb,
            style,
        } => {
            let muxer = FfmpegMuxer::detect();
            if !muxer.is_available() {
                bail!("ffmpeg was not found on PATH; it is needed to decode and encode video");
            }

            let job = BatchJob::from_dirs(&input, &output, backgrounds.as_deref(), title);
            if job.sources.is_empty() {
                bail!("no videos found in {}", input.display());
            }

            let ctx = RunContext::new(style.config(!no_perturb));
            let titles: Box<dyn TitleResolver> = match (title_command, filename_titles) {
                (Some(program), _) => Box::new(CommandResolver::new(program, title_args)),
                (None, true) => Box::new(FilenameResolver),
                (None, false) => Box::new(NoResolver),
            };
            let fonts = FontChain::discover(ctx.config.font_path.as_deref(), &ctx.config.font_dirs);
            let toolkit = Toolkit::ffmpeg(muxer, titles, Box::new(fonts));

            stop_on_interrupt(ctx.cancel.clone())?;
            let count = job.sources.len();
            let handle = spawn_batch(job, toolkit, ctx).context("failed to start worker thread")?;

            let bar = ProgressBar::new(100);
            bar.set_style(
                ProgressStyle::default_bar()
                    .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos:>3}% {msg}")
                    .context("invalid progress template")?
                    .progress_chars("##-"),
            );
            for update in handle.updates.iter() {
                match update {
                    Progress::Percent(p) => bar.set_position(p.round() as u64),
                    Progress::Status(s) => {
                        if s.contains(": ") && s.starts_with('[') {
                            bar.println(&s);
                        }
                        bar.set_message(s);
                    }
                }
            }
            bar.finish_and_clear();

            let summary = handle.wait().context("batch aborted")?;
            println!(
                "{} of {count} videos done, {} failed{}",
                summary.succeeded(),
                summary.failed(),
                if summary.stopped { " (stopped)" } else { "" }
            );
        }

        Commands::Backdrop {
            output,
            background,
            title,
            style,
        } => {
            let ctx = RunContext::new(style.config(false));
            let fonts = FontChain::discover(ctx.config.font_path.as_deref(), &ctx.config.font_dirs);
            let face = fonts.face();
            let mut rng = rand::thread_rng();

            let backdrop = render_backdrop(&ctx, face, background.as_deref(), &title, &mut rng);
            let mut canvas = backdrop.image;
            Watermark::new(&ctx.config.watermark_text, face, &ctx.layout).apply(&mut canvas);
            canvas
                .save(&output)
                .with_context(|| format!("failed to write {}", output.display()))?;
            println!(
                "wrote {} ({} caption lines, font {:?})",
                output.display(),
                backdrop.title.lines.len(),
                fonts.origin()
            );
        }
    }

    Ok(())
}
