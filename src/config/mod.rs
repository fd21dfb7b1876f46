use std::path::PathBuf;

use crate::background::Pattern;
use crate::pipeline::progress::CancelToken;
use crate::title::TitleAnchor;

// Canvas geometry
pub const CANVAS_WIDTH: u32 = 720;
pub const CANVAS_HEIGHT: u32 = 1280;
pub const VIDEO_AREA_TOP: u32 = 350;
pub const VIDEO_AREA_BOTTOM: u32 = 400;

// Background
pub const BACKGROUND_COLOR: [u8; 3] = [240, 240, 240];

// Title
pub const TITLE_FONT_SIZE: f32 = 50.0;
pub const TITLE_WRAP_MARGIN: u32 = 80;
pub const TITLE_LINE_SPACING: u32 = 10;
pub const TITLE_TOP_OFFSET: i64 = 100;
pub const TITLE_CENTER_BIAS: i64 = 50;
pub const TITLE_STROKE_WIDTH: u32 = 2;
pub const TITLE_FILL: [u8; 3] = [255, 214, 0];
pub const TITLE_STROKE: [u8; 3] = [0, 0, 0];
pub const MAX_TITLE_CHARS: usize = 40;

// Watermark
pub const WATERMARK_TEXT: &str = "@impactofinal";
pub const WATERMARK_FONT_SIZE: f32 = 60.0;
pub const WATERMARK_BOTTOM_MARGIN: u32 = 50;
pub const WATERMARK_OUTLINE_RADIUS: i32 = 2;
pub const WATERMARK_FILL: [u8; 3] = [255, 255, 0];
pub const WATERMARK_OUTLINE: [u8; 3] = [0, 0, 0];

// Output naming
pub const OUTPUT_SUFFIX: &str = "editado";
pub const OUTPUT_EXTENSION: &str = "mp4";
pub const WORKING_SUFFIX: &str = "silent";

// Streaming
pub const DEFAULT_FPS: f64 = 30.0;
pub const PROGRESS_INTERVAL: u64 = 10;

pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "avi", "mkv", "webm", "mov"];
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpeg", "jpg"];

/// Captions used whenever no usable title can be resolved for a video.
pub const FALLBACK_TITLES: [&str; 10] = [
    "Nada podia deter aquilo.",
    "Isso não podia ter acontecido...",
    "O que aconteceu vai te chocar.",
    "Quando tudo parecia normal...",
    "Você vai se arrepiar com isso.",
    "Era para ser só mais um dia...",
    "O erro que mudou tudo.",
    "Isso saiu do controle.",
    "Ninguém percebeu o que viria.",
    "Uma decisão. Um destino.",
];

/// A pixel rectangle on the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Fixed output geometry: the canvas and the band reserved for footage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    pub canvas_width: u32,
    pub canvas_height: u32,
    pub top_margin: u32,
    pub bottom_margin: u32,
}

impl Layout {
    /// Band of the canvas the source footage is composited into.
    pub fn video_area(&self) -> Rect {
        Rect {
            x: 0,
            y: self.top_margin,
            width: self.canvas_width,
            height: self.canvas_height - self.top_margin - self.bottom_margin,
        }
    }

    /// Widest a caption line may render before it wraps.
    pub fn title_max_width(&self) -> u32 {
        self.canvas_width - TITLE_WRAP_MARGIN
    }
}

impl Default for Layout {
    fn default() -> Self {
        Self {
            canvas_width: CANVAS_WIDTH,
            canvas_height: CANVAS_HEIGHT,
            top_margin: VIDEO_AREA_TOP,
            bottom_margin: VIDEO_AREA_BOTTOM,
        }
    }
}

/// User-overridable settings shared by every video of a run.
#[derive(Debug, Clone)]
pub struct ShortsConfig {
    pub pattern: Pattern,
    pub title_anchor: TitleAnchor,
    pub title_font_size: f32,
    pub perturb: bool,
    pub watermark_text: String,
    pub font_path: Option<PathBuf>,
    pub font_dirs: Vec<PathBuf>,
}

impl Default for ShortsConfig {
    fn default() -> Self {
        Self {
            pattern: Pattern::Popcorn,
            title_anchor: TitleAnchor::Top,
            title_font_size: TITLE_FONT_SIZE,
            perturb: true,
            watermark_text: WATERMARK_TEXT.to_string(),
            font_path: None,
            font_dirs: Vec::new(),
        }
    }
}

/// Everything a pipeline stage may consult: settings, geometry and the
/// cancellation signal shared with the controller.
#[derive(Debug, Clone, Default)]
pub struct RunContext {
    pub config: ShortsConfig,
    pub layout: Layout,
    pub cancel: CancelToken,
}

impl RunContext {
    pub fn new(config: ShortsConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }
}
