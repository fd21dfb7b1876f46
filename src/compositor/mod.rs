use image::imageops::{self, FilterType};
use image::RgbImage;

use crate::config::Rect;
use crate::pipeline::error::ShortsError;

/// Where and how a source frame lands inside the video area.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub scale: f64,
    /// Size after uniform scaling, before cropping.
    pub scaled_width: u32,
    pub scaled_height: u32,
    /// Pixels trimmed from the left/top of the scaled frame.
    pub crop_x: u32,
    pub crop_y: u32,
    /// Size actually copied onto the canvas.
    pub width: u32,
    pub height: u32,
    /// Canvas position of the copied region.
    pub dest_x: u32,
    pub dest_y: u32,
}

/// Scale so the frame covers `area`, then centre-crop the overflow.
///
/// Truncation can leave the scaled frame a pixel short of the area; the
/// shortfall is centred and left showing the backdrop rather than stretched.
pub fn cover_fit(src_width: u32, src_height: u32, area: Rect) -> Result<Placement, ShortsError> {
    if src_width == 0 || src_height == 0 {
        return Err(ShortsError::ZeroAreaFrame {
            width: src_width,
            height: src_height,
        });
    }
    let scale_w = area.width as f64 / src_width as f64;
    let scale_h = area.height as f64 / src_height as f64;
    let scale = scale_w.max(scale_h);

    let scaled_width = ((src_width as f64 * scale) as u32).max(1);
    let scaled_height = ((src_height as f64 * scale) as u32).max(1);

    let (crop_x, width) = if scaled_width > area.width {
        ((scaled_width - area.width) / 2, area.width)
    } else {
        (0, scaled_width)
    };
    let (crop_y, height) = if scaled_height > area.height {
        ((scaled_height - area.height) / 2, area.height)
    } else {
        (0, scaled_height)
    };

    Ok(Placement {
        scale,
        scaled_width,
        scaled_height,
        crop_x,
        crop_y,
        width,
        height,
        dest_x: area.x + (area.width - width) / 2,
        dest_y: area.y + (area.height - height) / 2,
    })
}

/// Produce one output frame: a fresh copy of `backdrop` with `frame`
/// cover-fitted into `area`. The backdrop itself is never modified.
pub fn composite(backdrop: &RgbImage, frame: &RgbImage, area: Rect) -> Result<RgbImage, ShortsError> {
    let placement = cover_fit(frame.width(), frame.height(), area)?;
    let scaled = if (placement.scaled_width, placement.scaled_height) == frame.dimensions() {
        frame.clone()
    } else {
        imageops::resize(
            frame,
            placement.scaled_width,
            placement.scaled_height,
            FilterType::Triangle,
        )
    };
    let fitted = imageops::crop_imm(
        &scaled,
        placement.crop_x,
        placement.crop_y,
        placement.width,
        placement.height,
    )
    .to_image();

    let mut out = backdrop.clone();
    imageops::replace(
        &mut out,
        &fitted,
        placement.dest_x as i64,
        placement.dest_y as i64,
    );
    Ok(out)
}
