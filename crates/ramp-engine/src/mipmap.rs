//! Resident preview pyramid used as the pixel provider.
//!
//! Each frame may have several decoded RGBA8 levels of decreasing size.
//! Readers ask for the best fit against a target bounding box and run
//! their computation inside a closure while the cache's read lock is held,
//! so the lock is released on every exit path.

use std::collections::HashMap;
use std::sync::RwLock;

use lapse_common::{LapseError, LapseResult};
use lapse_frame_model::FrameId;

/// Color encoding of a preview's pixel values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorSpace {
    #[default]
    Srgb,
    AdobeRgb,
    Linear,
    /// Already transformed to the display profile.
    Display,
}

/// Requested bounding box for a preview.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreviewSize {
    pub width: u32,
    pub height: u32,
}

impl PreviewSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// One decoded RGBA8 level.
#[derive(Debug, Clone, PartialEq)]
pub struct PreviewBuffer {
    width: u32,
    height: u32,
    color_space: ColorSpace,
    full_resolution: bool,
    pixels: Vec<u8>,
}

impl PreviewBuffer {
    /// Wrap RGBA8 pixel data. Fails if `pixels` is not `width * height * 4` bytes.
    pub fn new(
        width: u32,
        height: u32,
        color_space: ColorSpace,
        pixels: Vec<u8>,
    ) -> LapseResult<Self> {
        let expected = width as usize * height as usize * 4;
        if pixels.len() != expected {
            return Err(LapseError::sampling(format!(
                "preview {width}x{height} needs {expected} bytes, got {}",
                pixels.len()
            )));
        }
        Ok(Self {
            width,
            height,
            color_space,
            full_resolution: false,
            pixels,
        })
    }

    /// Mark this level as the full-resolution decode.
    pub fn into_full_resolution(mut self) -> Self {
        self.full_resolution = true;
        self
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn color_space(&self) -> ColorSpace {
        self.color_space
    }

    pub fn is_full_resolution(&self) -> bool {
        self.full_resolution
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Whether this level is large enough for `target` on both axes.
    ///
    /// The full-resolution level is always adequate.
    pub fn covers(&self, target: PreviewSize) -> bool {
        self.full_resolution || (self.width >= target.width && self.height >= target.height)
    }

    /// Half-size level using a 2x2 box filter. `None` below 2 pixels on an axis.
    pub fn downsample_half(&self) -> Option<PreviewBuffer> {
        if self.width < 2 || self.height < 2 {
            return None;
        }
        let (w, h) = (self.width / 2, self.height / 2);
        let src_stride = self.width as usize * 4;
        let mut out = Vec::with_capacity(w as usize * h as usize * 4);

        for y in 0..h as usize {
            let row0 = &self.pixels[(2 * y) * src_stride..(2 * y + 1) * src_stride];
            let row1 = &self.pixels[(2 * y + 1) * src_stride..(2 * y + 2) * src_stride];
            for x in 0..w as usize {
                let i = 8 * x;
                for c in 0..4 {
                    let sum = row0[i + c] as u16
                        + row0[i + 4 + c] as u16
                        + row1[i + c] as u16
                        + row1[i + 4 + c] as u16;
                    out.push(((sum + 2) / 4) as u8);
                }
            }
        }

        Some(PreviewBuffer {
            width: w,
            height: h,
            color_space: self.color_space,
            full_resolution: false,
            pixels: out,
        })
    }
}

/// Provider of decoded pixel data for frames.
pub trait PixelSource {
    /// Run `read` on the smallest resident level that covers `target`.
    ///
    /// Returns `None` without blocking when nothing adequate is resident.
    /// Any lock the provider needs is held for the whole call to `read`.
    fn with_best_fit<R>(
        &self,
        id: FrameId,
        target: PreviewSize,
        read: impl FnOnce(&PreviewBuffer) -> R,
    ) -> Option<R>;
}

/// In-memory preview pyramid keyed by frame id.
#[derive(Debug, Default)]
pub struct MipmapCache {
    levels: RwLock<HashMap<FrameId, Vec<PreviewBuffer>>>,
}

impl MipmapCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a single level for `id`.
    pub fn insert_level(&self, id: FrameId, level: PreviewBuffer) {
        let mut levels = self.levels.write().unwrap_or_else(|e| e.into_inner());
        levels.entry(id).or_default().push(level);
    }

    /// Store `full` and successive half-size levels down to `floor` pixels.
    ///
    /// Returns the number of levels stored.
    pub fn insert_pyramid(&self, id: FrameId, full: PreviewBuffer, floor: u32) -> usize {
        let mut pyramid = vec![full.into_full_resolution()];
        while let Some(next) = pyramid.last().and_then(PreviewBuffer::downsample_half) {
            if next.width.max(next.height) < floor {
                break;
            }
            pyramid.push(next);
        }

        let count = pyramid.len();
        let mut levels = self.levels.write().unwrap_or_else(|e| e.into_inner());
        levels.insert(id, pyramid);
        count
    }

    /// Drop all levels of `id`.
    pub fn evict(&self, id: FrameId) -> bool {
        let mut levels = self.levels.write().unwrap_or_else(|e| e.into_inner());
        levels.remove(&id).is_some()
    }

    pub fn contains(&self, id: FrameId) -> bool {
        let levels = self.levels.read().unwrap_or_else(|e| e.into_inner());
        levels.contains_key(&id)
    }

    /// Number of frames with at least one level.
    pub fn len(&self) -> usize {
        let levels = self.levels.read().unwrap_or_else(|e| e.into_inner());
        levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl PixelSource for MipmapCache {
    fn with_best_fit<R>(
        &self,
        id: FrameId,
        target: PreviewSize,
        read: impl FnOnce(&PreviewBuffer) -> R,
    ) -> Option<R> {
        let levels = self.levels.read().unwrap_or_else(|e| e.into_inner());
        let best = levels
            .get(&id)?
            .iter()
            .filter(|level| level.covers(target))
            .min_by_key(|level| level.pixel_count())?;
        Some(read(best))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(width: u32, height: u32, rgb: [u8; 3]) -> PreviewBuffer {
        let pixels = (0..width * height)
            .flat_map(|_| [rgb[0], rgb[1], rgb[2], 255])
            .collect();
        PreviewBuffer::new(width, height, ColorSpace::Srgb, pixels).unwrap()
    }

    #[test]
    fn test_buffer_length_is_checked() {
        assert!(PreviewBuffer::new(2, 2, ColorSpace::Srgb, vec![0; 15]).is_err());
    }

    #[test]
    fn test_downsample_averages_blocks() {
        let pixels = vec![
            0, 0, 0, 255, 100, 100, 100, 255, //
            200, 200, 200, 255, 100, 100, 100, 255,
        ];
        let buf = PreviewBuffer::new(2, 2, ColorSpace::Srgb, pixels).unwrap();
        let half = buf.downsample_half().unwrap();
        assert_eq!((half.width(), half.height()), (1, 1));
        assert_eq!(&half.pixels()[..3], &[100, 100, 100]);
        assert!(solid(1, 4, [0, 0, 0]).downsample_half().is_none());
    }

    #[test]
    fn test_pyramid_stops_at_floor() {
        let cache = MipmapCache::new();
        let count = cache.insert_pyramid(7, solid(256, 128, [10, 10, 10]), 64);
        // 256, 128, 64
        assert_eq!(count, 3);
        assert!(cache.contains(7));
    }

    #[test]
    fn test_best_fit_picks_smallest_covering_level() {
        let cache = MipmapCache::new();
        cache.insert_pyramid(1, solid(512, 384, [0, 0, 0]), 32);

        let width = cache.with_best_fit(1, PreviewSize::new(100, 100), |b| b.width());
        assert_eq!(width, Some(256));

        let width = cache.with_best_fit(1, PreviewSize::new(300, 300), |b| b.width());
        assert_eq!(width, Some(512));
    }

    #[test]
    fn test_level_short_on_one_axis_does_not_cover() {
        let level = solid(128, 96, [0, 0, 0]);
        assert!(!level.covers(PreviewSize::new(100, 100)));
        assert!(!level.covers(PreviewSize::new(200, 50)));
        assert!(level.covers(PreviewSize::new(128, 96)));

        let cache = MipmapCache::new();
        cache.insert_level(2, level);
        assert!(cache
            .with_best_fit(2, PreviewSize::new(100, 100), |_| ())
            .is_none());
    }

    #[test]
    fn test_full_resolution_covers_any_target() {
        let cache = MipmapCache::new();
        cache.insert_pyramid(1, solid(64, 48, [0, 0, 0]), 64);
        let width = cache.with_best_fit(1, PreviewSize::new(1000, 1000), |b| b.width());
        assert_eq!(width, Some(64));
    }

    #[test]
    fn test_small_level_alone_is_unavailable() {
        let cache = MipmapCache::new();
        cache.insert_level(3, solid(32, 32, [0, 0, 0]));
        assert!(cache
            .with_best_fit(3, PreviewSize::new(320, 240), |_| ())
            .is_none());
        assert!(cache.with_best_fit(4, PreviewSize::new(1, 1), |_| ()).is_none());
    }

    #[test]
    fn test_evict() {
        let cache = MipmapCache::new();
        cache.insert_level(3, solid(4, 4, [0, 0, 0]));
        assert_eq!(cache.len(), 1);
        assert!(cache.evict(3));
        assert!(!cache.evict(3));
        assert!(cache.is_empty());
    }
}
