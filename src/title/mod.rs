pub mod resolver;
pub mod wrap;

use std::str::FromStr;

use image::RgbImage;

use crate::config::{
    Layout, TITLE_CENTER_BIAS, TITLE_FILL, TITLE_LINE_SPACING, TITLE_STROKE, TITLE_STROKE_WIDTH,
    TITLE_TOP_OFFSET,
};
use crate::font::{Face, OutlineStyle};
use crate::raster::blit;

pub use resolver::{
    resolve_title, CommandResolver, FilenameResolver, NoResolver, ResolvedTitle, TitleResolver,
    TitleSource,
};

/// Vertical placement of the caption block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum TitleAnchor {
    #[default]
    Top,
    Center,
}

impl FromStr for TitleAnchor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "top" => Ok(TitleAnchor::Top),
            "center" | "centre" => Ok(TitleAnchor::Center),
            other => Err(format!("unknown title position '{other}'")),
        }
    }
}

/// One caption line. `x` is where the left edge of its ink lands and
/// `width` is the ink width.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TitleLine {
    pub text: String,
    pub width: u32,
    pub x: i64,
    pub y: i64,
}

/// Positioned caption lines, top of each line at `y`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TitleLayout {
    pub lines: Vec<TitleLine>,
    pub line_height: u32,
}

/// Uppercase, wrap and position a caption on the canvas.
pub fn layout_title(
    text: &str,
    anchor: TitleAnchor,
    px: f32,
    face: &Face,
    layout: &Layout,
) -> TitleLayout {
    let upper = text.to_uppercase();
    let lines = wrap::wrap_words(&upper, layout.title_max_width(), |s| face.measure(s, px));
    let line_height = face.line_height(px);
    let pitch = (line_height + TITLE_LINE_SPACING) as i64;

    // An empty caption still occupies one (blank) line.
    let count = lines.len().max(1) as i64;
    let block_height = count * pitch - TITLE_LINE_SPACING as i64;
    let start_y = match anchor {
        TitleAnchor::Top => TITLE_TOP_OFFSET,
        TitleAnchor::Center => {
            (layout.canvas_height as i64 - block_height).div_euclid(2) + TITLE_CENTER_BIAS
        }
    };

    let lines = lines
        .into_iter()
        .enumerate()
        .map(|(i, text)| {
            let width = face.measure(&text, px);
            TitleLine {
                x: (layout.canvas_width as i64 - width as i64).div_euclid(2),
                y: start_y + i as i64 * pitch,
                width,
                text,
            }
        })
        .collect();

    TitleLayout { lines, line_height }
}

/// Burn the caption into `image`: yellow fill over a black vector stroke.
/// Pixels outside the stroked glyphs are left untouched.
pub fn render_title(
    image: &mut RgbImage,
    text: &str,
    anchor: TitleAnchor,
    px: f32,
    face: &Face,
    layout: &Layout,
) -> TitleLayout {
    let placed = layout_title(text, anchor, px, face, layout);
    let outline = OutlineStyle::Stroke {
        color: TITLE_STROKE,
        width: TITLE_STROKE_WIDTH as f32,
    };
    for line in &placed.lines {
        let Some(sprite) = face.render_line(&line.text, px, TITLE_FILL, outline) else {
            continue;
        };
        let x = line.x - sprite.ink.left as i64 + sprite.x as i64;
        let y = line.y + sprite.y as i64;
        blit(image, &sprite.pixmap, x, y);
    }
    placed
}
