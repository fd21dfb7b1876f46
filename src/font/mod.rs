pub mod builtin;

use std::fs;
use std::path::{Path as FsPath, PathBuf};

use log::{debug, info, warn};
use tiny_skia::{FillRule, LineCap, LineJoin, Path, PathBuilder, Pixmap, Rect, Stroke, Transform};
use ttf_parser::{GlyphId, OutlineBuilder};

use crate::raster::solid;

/// Bold candidates, tried first.
const BOLD_FONT_FILES: &[&str] = &[
    "arialbd.ttf",
    "Arial Bold.ttf",
    "DejaVuSans-Bold.ttf",
    "LiberationSans-Bold.ttf",
    "FreeSansBold.ttf",
];

const REGULAR_FONT_FILES: &[&str] = &[
    "arial.ttf",
    "Arial.ttf",
    "DejaVuSans.ttf",
    "LiberationSans-Regular.ttf",
    "FreeSans.ttf",
];

const SYSTEM_FONT_DIRS: &[&str] = &[
    ".",
    "/usr/share/fonts/truetype/dejavu",
    "/usr/share/fonts/truetype/liberation",
    "/usr/share/fonts/truetype/freefont",
    "/usr/share/fonts/TTF",
    "/usr/share/fonts/dejavu",
    "/Library/Fonts",
    "/System/Library/Fonts/Supplemental",
    "C:\\Windows\\Fonts",
];

/// Vertical extent of a line of text, in whole pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineMetrics {
    /// Baseline distance from the top of the line.
    pub ascent: u32,
    /// Extent below the baseline.
    pub descent: u32,
}

impl LineMetrics {
    pub fn height(&self) -> u32 {
        self.ascent + self.descent
    }
}

/// Pixel box around the ink of a line, in line coordinates: the pen starts
/// at x = 0 and the top of the line is y = 0. `left` is negative when the
/// first glyph overhangs the pen origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InkBounds {
    pub left: i32,
    pub top: i32,
    pub width: u32,
    pub height: u32,
}

impl InkBounds {
    fn of(path: &Path) -> Self {
        let b = path.bounds();
        let (left, top) = (b.left().floor() as i32, b.top().floor() as i32);
        let (right, bottom) = (b.right().ceil() as i32, b.bottom().ceil() as i32);
        Self {
            left,
            top,
            width: (right - left).max(0) as u32,
            height: (bottom - top).max(0) as u32,
        }
    }
}

/// How the edge of rendered text is outlined.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OutlineStyle {
    None,
    /// Vector stroke reaching `width` pixels outside the glyph edges.
    Stroke { color: [u8; 3], width: f32 },
    /// The glyphs stamped at every offset within `radius` in both axes.
    Offsets { color: [u8; 3], radius: i32 },
}

impl OutlineStyle {
    fn reach(&self) -> i32 {
        match *self {
            OutlineStyle::None => 0,
            OutlineStyle::Stroke { width, .. } => width.ceil() as i32,
            OutlineStyle::Offsets { radius, .. } => radius.abs(),
        }
    }
}

/// A rendered line: the pixmap's top-left corner sits at (`x`, `y`) in line
/// coordinates, and every outlined pixel lies inside its transparent
/// one-pixel frame.
pub struct TextSprite {
    pub pixmap: Pixmap,
    pub ink: InkBounds,
    pub x: i32,
    pub y: i32,
}

/// A parsed TrueType/OpenType font. Glyph tables are re-read from `data`
/// on demand.
pub struct OutlineFont {
    data: Vec<u8>,
    units_per_em: f32,
    ascender: f32,
    descender: f32,
}

impl OutlineFont {
    fn parse(data: Vec<u8>) -> Result<Self, ttf_parser::FaceParsingError> {
        let face = ttf_parser::Face::parse(&data, 0)?;
        let units_per_em = face.units_per_em().max(1) as f32;
        let (ascender, descender) = (face.ascender() as f32, face.descender() as f32);
        Ok(Self {
            data,
            units_per_em,
            ascender,
            descender,
        })
    }

    fn scale(&self, px: f32) -> f32 {
        px / self.units_per_em
    }

    fn append_text(&self, builder: &mut PathBuilder, text: &str, px: f32) {
        let Ok(face) = ttf_parser::Face::parse(&self.data, 0) else {
            return;
        };
        let scale = self.scale(px);
        let mut pen = PenBuilder {
            path: builder,
            scale,
            x: 0.0,
            baseline: self.ascender * scale,
        };
        for ch in text.chars() {
            let gid = face.glyph_index(ch).unwrap_or(GlyphId(0));
            face.outline_glyph(gid, &mut pen);
            pen.x += face.glyph_hor_advance(gid).unwrap_or(0) as f32 * scale;
        }
    }
}

/// Feeds font-unit outlines into a pixel-space path, flipping y so the
/// baseline sits `baseline` pixels below the top of the line.
struct PenBuilder<'a> {
    path: &'a mut PathBuilder,
    scale: f32,
    x: f32,
    baseline: f32,
}

impl PenBuilder<'_> {
    fn at(&self, x: f32, y: f32) -> (f32, f32) {
        (self.x + x * self.scale, self.baseline - y * self.scale)
    }
}

impl OutlineBuilder for PenBuilder<'_> {
    fn move_to(&mut self, x: f32, y: f32) {
        let (x, y) = self.at(x, y);
        self.path.move_to(x, y);
    }

    fn line_to(&mut self, x: f32, y: f32) {
        let (x, y) = self.at(x, y);
        self.path.line_to(x, y);
    }

    fn quad_to(&mut self, x1: f32, y1: f32, x: f32, y: f32) {
        let (x1, y1) = self.at(x1, y1);
        let (x, y) = self.at(x, y);
        self.path.quad_to(x1, y1, x, y);
    }

    fn curve_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x: f32, y: f32) {
        let (x1, y1) = self.at(x1, y1);
        let (x2, y2) = self.at(x2, y2);
        let (x, y) = self.at(x, y);
        self.path.cubic_to(x1, y1, x2, y2, x, y);
    }

    fn close(&mut self) {
        self.path.close();
    }
}

/// A typeface able to measure and rasterise single lines of text.
pub enum Face {
    Outline(Box<OutlineFont>),
    Builtin,
}

impl Face {
    pub fn load(path: &FsPath) -> anyhow::Result<Self> {
        let bytes = fs::read(path)?;
        let font = OutlineFont::parse(bytes)
            .map_err(|e| anyhow::anyhow!("failed to parse font {}: {e}", path.display()))?;
        Ok(Face::Outline(Box::new(font)))
    }

    pub fn line_metrics(&self, px: f32) -> LineMetrics {
        match self {
            Face::Outline(font) => {
                let scale = font.scale(px);
                LineMetrics {
                    ascent: (font.ascender * scale).ceil().max(0.0) as u32,
                    descent: (-font.descender * scale).ceil().max(0.0) as u32,
                }
            }
            Face::Builtin => {
                let scale = builtin::scale_for(px);
                LineMetrics {
                    ascent: builtin::GLYPH_ROWS * scale,
                    descent: (builtin::CELL_HEIGHT - builtin::GLYPH_ROWS) * scale,
                }
            }
        }
    }

    pub fn line_height(&self, px: f32) -> u32 {
        self.line_metrics(px).height()
    }

    /// Glyph outlines of `text` in line coordinates, `None` when nothing
    /// would be inked.
    pub fn text_path(&self, text: &str, px: f32) -> Option<Path> {
        let mut builder = PathBuilder::new();
        match self {
            Face::Outline(font) => font.append_text(&mut builder, text, px),
            Face::Builtin => {
                let scale = builtin::scale_for(px);
                let cell = scale as f32;
                for (i, ch) in text.chars().enumerate() {
                    let origin = (i as u32 * builtin::CELL_WIDTH * scale) as f32;
                    for col in 0..builtin::GLYPH_COLUMNS {
                        for row in 0..builtin::GLYPH_ROWS {
                            if !builtin::is_set(ch, col, row) {
                                continue;
                            }
                            let x = origin + col as f32 * cell;
                            if let Some(rect) = Rect::from_xywh(x, row as f32 * cell, cell, cell) {
                                builder.push_rect(rect);
                            }
                        }
                    }
                }
            }
        }
        builder.finish()
    }

    pub fn ink(&self, text: &str, px: f32) -> Option<InkBounds> {
        self.text_path(text, px).map(|path| InkBounds::of(&path))
    }

    /// Width of the ink of `text` on a single line.
    pub fn measure(&self, text: &str, px: f32) -> u32 {
        self.ink(text, px).map_or(0, |ink| ink.width)
    }

    /// Rasterise `text` with its outline underneath the fill. `None` when
    /// the text has no ink.
    pub fn render_line(
        &self,
        text: &str,
        px: f32,
        fill: [u8; 3],
        outline: OutlineStyle,
    ) -> Option<TextSprite> {
        let path = self.text_path(text, px)?;
        let ink = InkBounds::of(&path);
        let pad = outline.reach() + 1;
        let mut pixmap = Pixmap::new(ink.width + 2 * pad as u32, ink.height + 2 * pad as u32)?;
        let (x, y) = (ink.left - pad, ink.top - pad);
        let shift = |dx: i32, dy: i32| Transform::from_translate((dx - x) as f32, (dy - y) as f32);

        match outline {
            OutlineStyle::None => {}
            OutlineStyle::Stroke { color, width } => {
                let stroke = Stroke {
                    width: width * 2.0,
                    line_join: LineJoin::Round,
                    line_cap: LineCap::Round,
                    ..Stroke::default()
                };
                pixmap.stroke_path(&path, &solid(color), &stroke, shift(0, 0), None);
            }
            OutlineStyle::Offsets { color, radius } => {
                let paint = solid(color);
                for dy in -radius..=radius {
                    for dx in -radius..=radius {
                        if dx == 0 && dy == 0 {
                            continue;
                        }
                        pixmap.fill_path(&path, &paint, FillRule::Winding, shift(dx, dy), None);
                    }
                }
            }
        }
        pixmap.fill_path(&path, &solid(fill), FillRule::Winding, shift(0, 0), None);

        Some(TextSprite { pixmap, ink, x, y })
    }
}

impl std::fmt::Debug for Face {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Face::Outline(_) => f.write_str("Face::Outline"),
            Face::Builtin => f.write_str("Face::Builtin"),
        }
    }
}

/// Supplies the face used for captions and the watermark.
pub trait FontProvider: Send + Sync {
    fn face(&self) -> &Face;
}

/// Provider that always answers with the bitmap face.
#[derive(Debug)]
pub struct BuiltinFont {
    face: Face,
}

impl BuiltinFont {
    pub fn new() -> Self {
        Self {
            face: Face::Builtin,
        }
    }
}

impl Default for BuiltinFont {
    fn default() -> Self {
        Self::new()
    }
}

impl FontProvider for BuiltinFont {
    fn face(&self) -> &Face {
        &self.face
    }
}

/// Where the selected face came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FaceOrigin {
    Explicit(PathBuf),
    Bold(PathBuf),
    Regular(PathBuf),
    Builtin,
}

/// Bold, then regular, then built-in: resolved once, never fails.
#[derive(Debug)]
pub struct FontChain {
    face: Face,
    origin: FaceOrigin,
}

impl FontChain {
    /// Resolve the best available face. `explicit` wins when it loads;
    /// `extra_dirs` are searched before the well-known system locations.
    pub fn discover(explicit: Option<&FsPath>, extra_dirs: &[PathBuf]) -> Self {
        if let Some(path) = explicit {
            match Face::load(path) {
                Ok(face) => {
                    info!("using font {}", path.display());
                    return Self {
                        face,
                        origin: FaceOrigin::Explicit(path.to_path_buf()),
                    };
                }
                Err(e) => warn!("font {} unusable, searching defaults: {e}", path.display()),
            }
        }

        let dirs: Vec<PathBuf> = extra_dirs
            .iter()
            .cloned()
            .chain(SYSTEM_FONT_DIRS.iter().map(PathBuf::from))
            .collect();

        if let Some((face, path)) = first_loadable(&dirs, BOLD_FONT_FILES) {
            info!("using bold font {}", path.display());
            return Self {
                face,
                origin: FaceOrigin::Bold(path),
            };
        }
        if let Some((face, path)) = first_loadable(&dirs, REGULAR_FONT_FILES) {
            warn!("no bold font found, using regular {}", path.display());
            return Self {
                face,
                origin: FaceOrigin::Regular(path),
            };
        }

        warn!("no TrueType font found, using built-in bitmap font");
        Self {
            face: Face::Builtin,
            origin: FaceOrigin::Builtin,
        }
    }

    pub fn origin(&self) -> &FaceOrigin {
        &self.origin
    }
}

impl FontProvider for FontChain {
    fn face(&self) -> &Face {
        &self.face
    }
}

fn first_loadable(dirs: &[PathBuf], names: &[&str]) -> Option<(Face, PathBuf)> {
    for dir in dirs {
        for name in names {
            let path = dir.join(name);
            if !path.is_file() {
                continue;
            }
            match Face::load(&path) {
                Ok(face) => return Some((face, path)),
                Err(e) => debug!("skipping font {}: {e}", path.display()),
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const FILL: [u8; 3] = [255, 214, 0];

    fn system_face() -> Option<FontChain> {
        let chain = FontChain::discover(None, &[]);
        match chain.origin() {
            FaceOrigin::Builtin => {
                eprintln!("no TrueType font installed, skipping");
                None
            }
            _ => Some(chain),
        }
    }

    // Columns and rows of the sprite holding any coverage, in line coordinates.
    fn inked_extent(sprite: &TextSprite) -> Option<(i32, i32, i32, i32)> {
        let width = sprite.pixmap.width() as usize;
        let mut extent: Option<(i32, i32, i32, i32)> = None;
        for (i, px) in sprite.pixmap.pixels().iter().enumerate() {
            if px.alpha() == 0 {
                continue;
            }
            let x = (i % width) as i32 + sprite.x;
            let y = (i / width) as i32 + sprite.y;
            extent = Some(match extent {
                None => (x, y, x, y),
                Some((l, t, r, b)) => (l.min(x), t.min(y), r.max(x), b.max(y)),
            });
        }
        extent
    }

    fn frame_is_clear(pixmap: &Pixmap) -> bool {
        let (w, h) = (pixmap.width(), pixmap.height());
        (0..w).all(|x| {
            pixmap.pixel(x, 0).map_or(false, |p| p.alpha() == 0)
                && pixmap.pixel(x, h - 1).map_or(false, |p| p.alpha() == 0)
        }) && (0..h).all(|y| {
            pixmap.pixel(0, y).map_or(false, |p| p.alpha() == 0)
                && pixmap.pixel(w - 1, y).map_or(false, |p| p.alpha() == 0)
        })
    }

    #[test]
    fn test_builtin_measure_matches_rendered_ink() {
        let face = Face::Builtin;
        let sprite = face
            .render_line("HELLO", 16.0, FILL, OutlineStyle::None)
            .unwrap();
        let (l, t, r, b) = inked_extent(&sprite).unwrap();
        assert_eq!(sprite.ink.left, 0);
        assert_eq!((r - l + 1) as u32, face.measure("HELLO", 16.0));
        assert!(t >= 0 && (b as u32) < face.line_height(16.0));
        let opaque = sprite.pixmap.pixels().iter().filter(|p| p.alpha() == 255).count();
        assert!(opaque > 0);
    }

    #[test]
    fn test_builtin_empty_text_has_no_ink() {
        let face = Face::Builtin;
        assert_eq!(face.measure("", 50.0), 0);
        assert_eq!(face.measure("   ", 50.0), 0);
        assert!(face.render_line("", 50.0, FILL, OutlineStyle::None).is_none());
    }

    #[test]
    fn test_stroke_surrounds_fill() {
        let face = Face::Builtin;
        let outline = OutlineStyle::Stroke {
            color: [0, 0, 0],
            width: 2.0,
        };
        let sprite = face.render_line("I", 16.0, FILL, outline).unwrap();
        assert!(frame_is_clear(&sprite.pixmap));
        let colors: Vec<(u8, u8, u8, u8)> = sprite
            .pixmap
            .pixels()
            .iter()
            .map(|p| (p.red(), p.green(), p.blue(), p.alpha()))
            .collect();
        assert!(colors.contains(&(0, 0, 0, 255)));
        assert!(colors.contains(&(255, 214, 0, 255)));
        // Two pixels of stroke on each side of the ink.
        let (l, _, r, _) = inked_extent(&sprite).unwrap();
        assert_eq!(l, sprite.ink.left - 2);
        assert_eq!(r, sprite.ink.left + sprite.ink.width as i32 + 1);
    }

    #[test]
    fn test_offset_outline_reaches_radius() {
        let face = Face::Builtin;
        let outline = OutlineStyle::Offsets {
            color: [0, 0, 0],
            radius: 2,
        };
        let sprite = face.render_line("AB", 16.0, FILL, outline).unwrap();
        assert!(frame_is_clear(&sprite.pixmap));
        let (l, t, _, _) = inked_extent(&sprite).unwrap();
        assert_eq!((l, t), (sprite.ink.left - 2, sprite.ink.top - 2));
    }

    #[test]
    fn test_overhanging_glyphs_are_not_clipped() {
        let Some(chain) = system_face() else {
            return;
        };
        let face = chain.face();
        let outline = OutlineStyle::Stroke {
            color: [0, 0, 0],
            width: 2.0,
        };
        for text in ["J", "K", "Y", "JÁ", "VAI SE ARREPIAR"] {
            for px in [30.0, 50.0, 64.0] {
                let sprite = face.render_line(text, px, FILL, outline).unwrap();
                assert!(frame_is_clear(&sprite.pixmap), "{text} at {px}");

                let bare = face.render_line(text, px, FILL, OutlineStyle::None).unwrap();
                let (l, _, r, _) = inked_extent(&bare).unwrap();
                let ink = bare.ink;
                assert!(l >= ink.left && r < ink.left + ink.width as i32, "{text} at {px}");
                assert_eq!(ink.width, face.measure(text, px));
            }
        }
    }

    #[test]
    fn test_chain_falls_back_to_builtin_for_bad_explicit_path() {
        let missing = std::env::temp_dir().join("shortsmith_no_such_font.ttf");
        let chain = FontChain::discover(Some(&missing), &[]);
        assert_ne!(chain.origin(), &FaceOrigin::Explicit(missing));
    }

    #[test]
    fn test_garbage_font_file_is_rejected() {
        let path = std::env::temp_dir().join("shortsmith_garbage_font.ttf");
        fs::write(&path, b"not a font").unwrap();
        assert!(Face::load(&path).is_err());
        fs::remove_file(&path).ok();
    }
}
