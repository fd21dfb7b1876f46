use image::RgbImage;
use tiny_skia::Pixmap;

use crate::config::{
    Layout, WATERMARK_BOTTOM_MARGIN, WATERMARK_FILL, WATERMARK_FONT_SIZE, WATERMARK_OUTLINE,
    WATERMARK_OUTLINE_RADIUS,
};
use crate::font::{Face, OutlineStyle};
use crate::raster::blit;

/// Handle text burned near the bottom of every output frame.
///
/// The outline is built by stamping the text at every offset in
/// `-2..=2` x `-2..=2` (except the origin) in the outline colour, then the
/// fill is drawn on top. The stamp is rendered once and reused.
pub struct Watermark {
    stamp: Option<Pixmap>,
    x: i64,
    y: i64,
}

impl Watermark {
    pub fn new(text: &str, face: &Face, layout: &Layout) -> Self {
        let px = WATERMARK_FONT_SIZE;
        let outline = OutlineStyle::Offsets {
            color: WATERMARK_OUTLINE,
            radius: WATERMARK_OUTLINE_RADIUS,
        };
        let Some(sprite) = face.render_line(text, px, WATERMARK_FILL, outline) else {
            return Self {
                stamp: None,
                x: 0,
                y: 0,
            };
        };

        // Baseline sits WATERMARK_BOTTOM_MARGIN above the bottom edge.
        let baseline = layout.canvas_height as i64 - WATERMARK_BOTTOM_MARGIN as i64;
        let top = baseline - face.line_metrics(px).ascent as i64;
        let ink_x = (layout.canvas_width as i64 - sprite.ink.width as i64).div_euclid(2);
        Self {
            x: ink_x - sprite.ink.left as i64 + sprite.x as i64,
            y: top + sprite.y as i64,
            stamp: Some(sprite.pixmap),
        }
    }

    pub fn apply(&self, frame: &mut RgbImage) {
        if let Some(stamp) = &self.stamp {
            blit(frame, stamp, self.x, self.y);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_watermark_lands_near_bottom() {
        let layout = Layout::default();
        let mark = Watermark::new("@impactofinal", &Face::Builtin, &layout);
        let mut frame = RgbImage::from_pixel(720, 1280, Rgb([100, 100, 100]));
        mark.apply(&mut frame);

        let changed: Vec<(u32, u32)> = frame
            .enumerate_pixels()
            .filter(|(_, _, p)| **p != Rgb([100, 100, 100]))
            .map(|(x, y, _)| (x, y))
            .collect();
        assert!(!changed.is_empty());
        assert!(changed.iter().all(|&(_, y)| y >= 1100 && y < 1280 - 40));
        assert!(frame.pixels().any(|p| *p == Rgb(WATERMARK_FILL)));
        assert!(frame.pixels().any(|p| *p == Rgb(WATERMARK_OUTLINE)));
    }

    #[test]
    fn test_watermark_is_horizontally_centered() {
        let layout = Layout::default();
        let mark = Watermark::new("AB", &Face::Builtin, &layout);
        let mut frame = RgbImage::from_pixel(720, 1280, Rgb([100, 100, 100]));
        mark.apply(&mut frame);
        let xs: Vec<u32> = frame
            .enumerate_pixels()
            .filter(|(_, _, p)| **p != Rgb([100, 100, 100]))
            .map(|(x, _, _)| x)
            .collect();
        let (min, max) = (*xs.iter().min().unwrap(), *xs.iter().max().unwrap());
        assert!((min as i64 - (719 - max as i64)).abs() <= 1);
    }

    #[test]
    fn test_watermark_is_identical_every_frame() {
        let layout = Layout::default();
        let mark = Watermark::new("@x", &Face::Builtin, &layout);
        let mut a = RgbImage::from_pixel(720, 1280, Rgb([1, 1, 1]));
        let mut b = a.clone();
        mark.apply(&mut a);
        mark.apply(&mut b);
        assert_eq!(a, b);
    }

    #[test]
    fn test_blank_watermark_is_a_no_op() {
        let layout = Layout::default();
        let mark = Watermark::new("  ", &Face::Builtin, &layout);
        let mut frame = RgbImage::from_pixel(720, 1280, Rgb([7, 7, 7]));
        mark.apply(&mut frame);
        assert!(frame.pixels().all(|p| *p == Rgb([7, 7, 7])));
    }
}
