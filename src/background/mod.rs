use std::path::{Path, PathBuf};
use std::str::FromStr;

use image::imageops::FilterType;
use image::RgbImage;
use log::{debug, warn};
use rand::Rng;
use tiny_skia::{FillRule, PathBuilder, Pixmap, Rect, Stroke, Transform};

use crate::config::{Layout, BACKGROUND_COLOR};
use crate::raster::{filled, solid, to_rgb};

const BUCKET_RED: [u8; 3] = [220, 20, 20];
const BUCKET_EDGE: [u8; 3] = [180, 0, 0];
const BUCKET_STRIPE: [u8; 3] = [255, 255, 255];
const KERNEL_GOLD: [u8; 3] = [255, 215, 0];
const RING_OUTER: [u8; 3] = [50, 50, 50];
const RING_INNER: [u8; 3] = [200, 200, 200];

/// Decorative motif stamped over the flat fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Pattern {
    /// Popcorn buckets: red trapezoid, white stripes, gold kernels on top.
    #[default]
    Popcorn,
    /// Film-reel rings: concentric filled circles.
    Cinema,
    /// Flat fill only.
    Plain,
}

impl Pattern {
    /// Grid cell size (x step, y step) and jitter bound for the motif.
    fn grid(self) -> Option<(u32, u32, i32)> {
        match self {
            Pattern::Popcorn => Some((100, 120, 30)),
            Pattern::Cinema => Some((80, 100, 20)),
            Pattern::Plain => None,
        }
    }

    /// Look up a pattern by name; unknown names mean no motif.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "popcorn" | "bucket" => Pattern::Popcorn,
            "cinema" | "ring" | "rings" => Pattern::Cinema,
            _ => Pattern::Plain,
        }
    }
}

impl FromStr for Pattern {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Pattern::from_name(s))
    }
}

impl std::fmt::Display for Pattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Pattern::Popcorn => "popcorn",
            Pattern::Cinema => "cinema",
            Pattern::Plain => "plain",
        })
    }
}

/// How a background was obtained, so callers can tell a fallback apart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackgroundSource {
    Image(PathBuf),
    Pattern(Pattern),
    /// The image at the path could not be used; the pattern was drawn instead.
    Fallback { path: PathBuf, pattern: Pattern },
}

#[derive(Debug, Clone)]
pub struct Background {
    pub image: RgbImage,
    pub source: BackgroundSource,
}

/// Build the canvas background. A missing or unreadable image is not an
/// error: the pattern is synthesised instead. `rng` only drives cosmetic
/// jitter.
pub fn create_background<R: Rng>(
    layout: &Layout,
    image_path: Option<&Path>,
    pattern: Pattern,
    rng: &mut R,
) -> Background {
    if let Some(path) = image_path {
        match load_stretched(path, layout) {
            Ok(image) => {
                debug!("background image {}", path.display());
                return Background {
                    image,
                    source: BackgroundSource::Image(path.to_path_buf()),
                };
            }
            Err(e) => {
                warn!("background {} unusable, drawing {pattern}: {e}", path.display());
                return Background {
                    image: synthesize(layout, pattern, rng),
                    source: BackgroundSource::Fallback {
                        path: path.to_path_buf(),
                        pattern,
                    },
                };
            }
        }
    }
    Background {
        image: synthesize(layout, pattern, rng),
        source: BackgroundSource::Pattern(pattern),
    }
}

fn load_stretched(path: &Path, layout: &Layout) -> image::ImageResult<RgbImage> {
    let img = image::open(path)?;
    Ok(img
        .resize_exact(layout.canvas_width, layout.canvas_height, FilterType::Lanczos3)
        .to_rgb8())
}

/// Flat fill plus a jittered grid of motifs.
pub fn synthesize<R: Rng>(layout: &Layout, pattern: Pattern, rng: &mut R) -> RgbImage {
    let Some(mut canvas) = filled(layout.canvas_width, layout.canvas_height, BACKGROUND_COLOR)
    else {
        return RgbImage::new(layout.canvas_width, layout.canvas_height);
    };
    if let Some((step_x, step_y, jitter)) = pattern.grid() {
        for gx in (0..layout.canvas_width).step_by(step_x as usize) {
            for gy in (0..layout.canvas_height).step_by(step_y as usize) {
                let x = (gx as i32 + rng.gen_range(-jitter..jitter)) as f32;
                let y = (gy as i32 + rng.gen_range(-jitter..jitter)) as f32;
                match pattern {
                    Pattern::Popcorn => draw_bucket(&mut canvas, x, y, rng),
                    Pattern::Cinema => draw_ring(&mut canvas, x, y),
                    Pattern::Plain => {}
                }
            }
        }
    }
    to_rgb(&canvas)
}

fn draw_bucket<R: Rng>(canvas: &mut Pixmap, x: f32, y: f32, rng: &mut R) {
    let mut pb = PathBuilder::new();
    pb.move_to(x, y + 40.0);
    pb.line_to(x + 50.0, y + 40.0);
    pb.line_to(x + 45.0, y + 10.0);
    pb.line_to(x + 5.0, y + 10.0);
    pb.close();
    if let Some(body) = pb.finish() {
        let id = Transform::identity();
        canvas.fill_path(&body, &solid(BUCKET_RED), FillRule::Winding, id, None);
        let edge = Stroke {
            width: 1.0,
            ..Stroke::default()
        };
        canvas.stroke_path(&body, &solid(BUCKET_EDGE), &edge, id, None);
    }

    for i in 0..3 {
        let ys = y + 15.0 + i as f32 * 8.0;
        if let Some(stripe) = Rect::from_xywh(x + 5.0, ys, 41.0, 2.0) {
            canvas.fill_rect(stripe, &solid(BUCKET_STRIPE), Transform::identity(), None);
        }
    }

    for i in 0..4 {
        let px = x + 10.0 + i as f32 * 8.0 + rng.gen_range(-3..3) as f32;
        let py = y - 5.0 + rng.gen_range(-8..5) as f32;
        disc(canvas, px + 3.0, py + 3.0, 3.0, KERNEL_GOLD);
    }
}

fn draw_ring(canvas: &mut Pixmap, x: f32, y: f32) {
    disc(canvas, x + 15.0, y + 15.0, 15.0, RING_OUTER);
    disc(canvas, x + 15.0, y + 15.0, 10.0, RING_INNER);
}

fn disc(canvas: &mut Pixmap, cx: f32, cy: f32, r: f32, color: [u8; 3]) {
    if let Some(circle) = PathBuilder::from_circle(cx, cy, r) {
        canvas.fill_path(&circle, &solid(color), FillRule::Winding, Transform::identity(), None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_every_pattern_fills_the_canvas() {
        let layout = Layout::default();
        let mut rng = StdRng::seed_from_u64(7);
        for pattern in [Pattern::Popcorn, Pattern::Cinema, Pattern::Plain] {
            let bg = create_background(&layout, None, pattern, &mut rng);
            assert_eq!(bg.image.dimensions(), (720, 1280), "{pattern}");
            assert_eq!(bg.source, BackgroundSource::Pattern(pattern));
        }
    }

    #[test]
    fn test_unknown_pattern_name_is_flat_fill() {
        let layout = Layout::default();
        let pattern = Pattern::from_name("confetti");
        assert_eq!(pattern, Pattern::Plain);
        let img = synthesize(&layout, pattern, &mut StdRng::seed_from_u64(1));
        assert!(img.pixels().all(|p| *p == Rgb(BACKGROUND_COLOR)));
    }

    #[test]
    fn test_pattern_names() {
        assert_eq!(Pattern::from_name("Bucket"), Pattern::Popcorn);
        assert_eq!(Pattern::from_name("ring"), Pattern::Cinema);
        assert_eq!("cinema".parse::<Pattern>().unwrap(), Pattern::Cinema);
    }

    #[test]
    fn test_motifs_leave_marks() {
        let layout = Layout::default();
        let img = synthesize(&layout, Pattern::Popcorn, &mut StdRng::seed_from_u64(3));
        assert!(img.pixels().any(|p| *p == Rgb(BUCKET_RED)));
        assert!(img.pixels().any(|p| *p == Rgb(BUCKET_STRIPE)));
        assert!(img.pixels().any(|p| *p == Rgb(KERNEL_GOLD)));
        let img = synthesize(&layout, Pattern::Cinema, &mut StdRng::seed_from_u64(3));
        assert!(img.pixels().any(|p| *p == Rgb(RING_OUTER)));
        assert!(img.pixels().any(|p| *p == Rgb(RING_INNER)));
    }

    #[test]
    fn test_ring_is_concentric_disc() {
        let mut canvas = filled(40, 40, BACKGROUND_COLOR).unwrap();
        draw_ring(&mut canvas, 5.0, 5.0);
        let img = to_rgb(&canvas);
        // Centre (20, 20): inner disc; 12px out: outer band; corner untouched.
        assert_eq!(*img.get_pixel(20, 20), Rgb(RING_INNER));
        assert_eq!(*img.get_pixel(20 + 12, 20), Rgb(RING_OUTER));
        assert_eq!(*img.get_pixel(1, 1), Rgb(BACKGROUND_COLOR));
        // The rim is anti-aliased into the fill.
        let known = [RING_INNER, RING_OUTER, BACKGROUND_COLOR].map(Rgb);
        assert!(img.pixels().any(|p| !known.contains(p)));
    }

    #[test]
    fn test_motifs_clip_at_canvas_edges() {
        let layout = Layout::default();
        let mut rng = StdRng::seed_from_u64(11);
        let mut canvas = filled(60, 60, BACKGROUND_COLOR).unwrap();
        draw_bucket(&mut canvas, -30.0, 40.0, &mut rng);
        draw_ring(&mut canvas, 45.0, -10.0);
        assert_eq!(to_rgb(&canvas).dimensions(), (60, 60));
        let img = synthesize(&layout, Pattern::Popcorn, &mut rng);
        assert_eq!(img.dimensions(), (720, 1280));
    }

    #[test]
    fn test_missing_image_falls_back_to_pattern() {
        let layout = Layout::default();
        let path = std::env::temp_dir().join("shortsmith_missing_background.png");
        let bg = create_background(&layout, Some(&path), Pattern::Cinema, &mut StdRng::seed_from_u64(2));
        assert_eq!(bg.image.dimensions(), (720, 1280));
        assert_eq!(
            bg.source,
            BackgroundSource::Fallback {
                path,
                pattern: Pattern::Cinema
            }
        );
    }

    #[test]
    fn test_image_is_stretched_to_canvas() {
        let dir = std::env::temp_dir().join("shortsmith_test_background");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("wide.png");
        RgbImage::from_pixel(64, 16, Rgb([9, 99, 199])).save(&path).unwrap();

        let layout = Layout::default();
        let bg = create_background(&layout, Some(&path), Pattern::Popcorn, &mut StdRng::seed_from_u64(0));
        assert_eq!(bg.image.dimensions(), (720, 1280));
        assert_eq!(bg.source, BackgroundSource::Image(path.clone()));
        let center = bg.image.get_pixel(360, 640);
        for (got, want) in center.0.iter().zip([9u8, 99, 199]) {
            assert!(got.abs_diff(want) <= 1);
        }

        std::fs::remove_dir_all(&dir).ok();
    }
}
