//! Brightness sampling over down-sampled previews.
//!
//! A frame's brightness is the mean Rec.709 luma of its best-fit preview,
//! computed on the 8-bit channel values without linearization.

use lapse_frame_model::FrameId;

use crate::error::FrameIssue;
use crate::mipmap::{PixelSource, PreviewBuffer, PreviewSize};

/// Perceptual luma weights for R, G and B.
pub const LUMA_WEIGHTS: [f64; 3] = [0.2126, 0.7152, 0.0722];

/// Luma of one RGBA8 pixel.
pub fn pixel_luma(px: &[u8]) -> f64 {
    LUMA_WEIGHTS[0] * px[0] as f64 + LUMA_WEIGHTS[1] * px[1] as f64 + LUMA_WEIGHTS[2] * px[2] as f64
}

/// Mean luma over all pixels, in `[0, 255]`. `None` for an empty buffer.
pub fn average_luma(buffer: &PreviewBuffer) -> Option<f64> {
    let count = buffer.pixel_count();
    if count == 0 {
        return None;
    }
    let sum: f64 = buffer.pixels().chunks_exact(4).map(pixel_luma).sum();
    Some(sum / count as f64)
}

/// Measures frame brightness through a [`PixelSource`].
pub struct BrightnessSampler<'a, P> {
    source: &'a P,
    target: PreviewSize,
}

impl<'a, P: PixelSource> BrightnessSampler<'a, P> {
    pub fn new(source: &'a P, target: PreviewSize) -> Self {
        Self { source, target }
    }

    pub fn target(&self) -> PreviewSize {
        self.target
    }

    /// Average luma of `id`, or [`FrameIssue::SampleUnavailable`] when no
    /// adequate preview is resident.
    pub fn sample(&self, id: FrameId) -> Result<f64, FrameIssue> {
        let measured = self.source.with_best_fit(id, self.target, |buffer| {
            tracing::trace!(
                frame = id,
                width = buffer.width(),
                height = buffer.height(),
                color_space = ?buffer.color_space(),
                "Sampling preview"
            );
            average_luma(buffer)
        });

        match measured.flatten() {
            Some(brightness) => Ok(brightness),
            None => Err(FrameIssue::SampleUnavailable { id }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mipmap::{ColorSpace, MipmapCache};

    fn solid(width: u32, height: u32, rgb: [u8; 3]) -> PreviewBuffer {
        let pixels = (0..width * height)
            .flat_map(|_| [rgb[0], rgb[1], rgb[2], 255])
            .collect();
        PreviewBuffer::new(width, height, ColorSpace::Srgb, pixels).unwrap()
    }

    #[test]
    fn test_weights_sum_to_one() {
        let white = solid(2, 2, [255, 255, 255]);
        assert!((average_luma(&white).unwrap() - 255.0).abs() < 1e-9);
    }

    #[test]
    fn test_channel_weights() {
        assert!((average_luma(&solid(1, 1, [100, 0, 0])).unwrap() - 21.26).abs() < 1e-9);
        assert!((average_luma(&solid(1, 1, [0, 100, 0])).unwrap() - 71.52).abs() < 1e-9);
        assert!((average_luma(&solid(1, 1, [0, 0, 100])).unwrap() - 7.22).abs() < 1e-9);
    }

    #[test]
    fn test_alpha_is_ignored() {
        let buf = PreviewBuffer::new(1, 1, ColorSpace::Srgb, vec![0, 100, 0, 0]).unwrap();
        assert!((average_luma(&buf).unwrap() - 71.52).abs() < 1e-9);
    }

    #[test]
    fn test_mean_over_pixels() {
        let pixels = vec![255, 255, 255, 255, 0, 0, 0, 255];
        let buf = PreviewBuffer::new(2, 1, ColorSpace::Srgb, pixels).unwrap();
        assert!((average_luma(&buf).unwrap() - 127.5).abs() < 1e-9);
    }

    #[test]
    fn test_empty_buffer_has_no_luma() {
        let buf = PreviewBuffer::new(0, 0, ColorSpace::Srgb, vec![]).unwrap();
        assert!(average_luma(&buf).is_none());
    }

    #[test]
    fn test_sampler_reads_best_fit() {
        let cache = MipmapCache::new();
        cache.insert_pyramid(5, solid(256, 256, [40, 40, 40]), 32);
        let sampler = BrightnessSampler::new(&cache, PreviewSize::new(64, 64));
        let brightness = sampler.sample(5).unwrap();
        assert!((brightness - 40.0).abs() < 1e-9);
    }

    #[test]
    fn test_sampler_reports_unavailable() {
        let cache = MipmapCache::new();
        let sampler = BrightnessSampler::new(&cache, PreviewSize::new(64, 64));
        assert_eq!(sampler.sample(5), Err(FrameIssue::SampleUnavailable { id: 5 }));
    }

    #[test]
    fn test_sampler_releases_lock_on_miss() {
        let cache = MipmapCache::new();
        let sampler = BrightnessSampler::new(&cache, PreviewSize::new(64, 64));
        assert!(sampler.sample(1).is_err());
        // A writer must not deadlock after a failed read.
        cache.insert_level(1, solid(64, 64, [0, 0, 0]));
        assert_eq!(sampler.sample(1), Ok(0.0));
    }
}
