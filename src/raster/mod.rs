use image::{Rgb, RgbImage};
use tiny_skia::{Color, Paint, Pixmap};

/// Opaque anti-aliased paint.
pub fn solid(color: [u8; 3]) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color_rgba8(color[0], color[1], color[2], 255);
    paint.anti_alias = true;
    paint
}

/// A pixmap of the given size filled with `color`, `None` for zero area.
pub fn filled(width: u32, height: u32, color: [u8; 3]) -> Option<Pixmap> {
    let mut pixmap = Pixmap::new(width, height)?;
    pixmap.fill(Color::from_rgba8(color[0], color[1], color[2], 255));
    Some(pixmap)
}

/// Drop the alpha channel of an opaque pixmap.
pub fn to_rgb(pixmap: &Pixmap) -> RgbImage {
    let mut img = RgbImage::new(pixmap.width(), pixmap.height());
    for (dst, src) in img.pixels_mut().zip(pixmap.pixels()) {
        let c = src.demultiply();
        *dst = Rgb([c.red(), c.green(), c.blue()]);
    }
    img
}

/// Source-over composite of a premultiplied pixmap onto an opaque image,
/// top-left corner at (`x`, `y`). Pixels falling outside are clipped.
pub fn blit(target: &mut RgbImage, pixmap: &Pixmap, x: i64, y: i64) {
    let width = pixmap.width() as usize;
    for (i, px) in pixmap.pixels().iter().enumerate() {
        let alpha = px.alpha();
        if alpha == 0 {
            continue;
        }
        let tx = x + (i % width) as i64;
        let ty = y + (i / width) as i64;
        if tx < 0 || ty < 0 || tx >= target.width() as i64 || ty >= target.height() as i64 {
            continue;
        }
        let dst = target.get_pixel_mut(tx as u32, ty as u32);
        let keep = 255 - alpha as u32;
        let src = [px.red(), px.green(), px.blue()];
        for c in 0..3 {
            let v = src[c] as u32 + (dst.0[c] as u32 * keep + 127) / 255;
            dst.0[c] = v.min(255) as u8;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tiny_skia::{Rect, Transform};

    #[test]
    fn test_blit_leaves_transparent_pixels_untouched() {
        let mut target = RgbImage::from_pixel(4, 4, Rgb([10, 20, 30]));
        let mut sprite = Pixmap::new(2, 2).unwrap();
        let rect = Rect::from_xywh(0.0, 0.0, 1.0, 1.0).unwrap();
        sprite.fill_rect(rect, &solid([255, 0, 0]), Transform::identity(), None);

        blit(&mut target, &sprite, 1, 1);
        assert_eq!(*target.get_pixel(1, 1), Rgb([255, 0, 0]));
        assert_eq!(*target.get_pixel(2, 2), Rgb([10, 20, 30]));
        assert_eq!(*target.get_pixel(0, 0), Rgb([10, 20, 30]));
    }

    #[test]
    fn test_blit_clips_at_edges() {
        let mut target = RgbImage::from_pixel(2, 2, Rgb([0, 0, 0]));
        let sprite = filled(3, 3, [9, 9, 9]).unwrap();
        blit(&mut target, &sprite, -2, -2);
        assert_eq!(*target.get_pixel(0, 0), Rgb([9, 9, 9]));
        assert_eq!(*target.get_pixel(1, 1), Rgb([0, 0, 0]));
    }

    #[test]
    fn test_opaque_round_trip() {
        let pixmap = filled(3, 2, [240, 240, 240]).unwrap();
        let img = to_rgb(&pixmap);
        assert_eq!(img.dimensions(), (3, 2));
        assert!(img.pixels().all(|p| *p == Rgb([240, 240, 240])));
        assert!(filled(0, 5, [0, 0, 0]).is_none());
    }
}
