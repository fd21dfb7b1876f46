use image::RgbImage;
use sha2::{Digest, Sha256};

/// Seeds fall in `0..SEED_RANGE`.
pub const SEED_RANGE: u64 = 100;
/// Pixels removed from each edge when the border crop triggers.
pub const CROP_BORDER: u32 = 1;

/// Seed derived from the decimal frame count.
pub fn video_seed(total_frames: u64) -> u64 {
    let digest = Sha256::digest(total_frames.to_string().as_bytes());
    let mut head = [0u8; 8];
    head.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(head) % SEED_RANGE
}

/// The per-video transform: `out = |in * contrast + brightness|`, saturated,
/// plus an optional one-pixel border crop.
#[derive(Debug, Clone, PartialEq)]
pub struct Perturbation {
    pub seed: u64,
    pub contrast: f64,
    pub brightness: f64,
    pub crop_border: bool,
    lut: [u8; 256],
}

impl Perturbation {
    pub fn for_video(total_frames: u64) -> Self {
        Self::from_seed(video_seed(total_frames))
    }

    pub fn from_seed(seed: u64) -> Self {
        let seed = seed % SEED_RANGE;
        let contrast = 1.0 + ((seed % 8) as f64 - 4.0) * 0.015;
        let brightness = (1.0 + ((seed % 10) as f64 - 5.0) * 0.02) * 5.0;
        let mut lut = [0u8; 256];
        for (value, out) in lut.iter_mut().enumerate() {
            let v = (value as f64 * contrast + brightness).abs().round();
            *out = v.clamp(0.0, 255.0) as u8;
        }
        Self {
            seed,
            contrast,
            brightness,
            crop_border: seed % 3 == 0,
            lut,
        }
    }

    /// Adjust one decoded frame. The output is the same size, or two pixels
    /// smaller in each dimension when the border crop is active.
    pub fn apply(&self, frame: RgbImage) -> RgbImage {
        let mut frame = if self.crop_border {
            crop_border(frame)
        } else {
            frame
        };
        for value in frame.iter_mut() {
            *value = self.lut[*value as usize];
        }
        frame
    }
}

fn crop_border(frame: RgbImage) -> RgbImage {
    let (w, h) = frame.dimensions();
    let inner_w = w.saturating_sub(2 * CROP_BORDER);
    let inner_h = h.saturating_sub(2 * CROP_BORDER);
    if inner_w == w && inner_h == h {
        return frame;
    }
    image::imageops::crop_imm(&frame, CROP_BORDER, CROP_BORDER, inner_w, inner_h).to_image()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_seed_is_stable_and_bounded() {
        for total in [0u64, 1, 299, 300, 301, 10_000] {
            let seed = video_seed(total);
            assert!(seed < SEED_RANGE);
            assert_eq!(seed, video_seed(total));
        }
    }

    #[test]
    fn test_same_length_same_transform() {
        assert_eq!(Perturbation::for_video(300), Perturbation::for_video(300));
    }

    #[test]
    fn test_lengths_spread_over_seeds() {
        let seeds: std::collections::HashSet<u64> = (1..500).map(video_seed).collect();
        assert!(seeds.len() > 10);
    }

    #[test]
    fn test_deltas_stay_small() {
        for seed in 0..SEED_RANGE {
            let p = Perturbation::from_seed(seed);
            assert!((p.contrast - 1.0).abs() <= 0.08, "seed {seed}");
            assert!(p.brightness.abs() <= 10.0, "seed {seed}");
            assert_eq!(p.crop_border, seed % 3 == 0);
        }
    }

    #[test]
    fn test_known_seed_values() {
        let p = Perturbation::from_seed(37);
        // 37 % 8 = 5, 37 % 10 = 7
        assert!((p.contrast - 1.015).abs() < 1e-9);
        assert!((p.brightness - 5.2).abs() < 1e-9);
        assert!(!p.crop_border);
        let frame = RgbImage::from_pixel(4, 4, Rgb([100, 0, 255]));
        let out = p.apply(frame);
        // 100 * 1.015 + 5.2 = 106.7, 0 + 5.2 = 5.2, 255 * 1.015 + 5.2 saturates
        assert_eq!(*out.get_pixel(0, 0), Rgb([107, 5, 255]));
    }

    #[test]
    fn test_crop_removes_one_pixel_border() {
        let p = Perturbation::from_seed(3);
        assert!(p.crop_border);
        let out = p.apply(RgbImage::new(10, 6));
        assert_eq!(out.dimensions(), (8, 4));
    }

    #[test]
    fn test_crop_of_tiny_frame_can_reach_zero_area() {
        let p = Perturbation::from_seed(0);
        let out = p.apply(RgbImage::new(2, 5));
        assert_eq!(out.width(), 0);
    }
}
