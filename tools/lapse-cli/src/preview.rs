//! Decoding frames into the preview pyramid.

use std::path::Path;

use anyhow::Context;
use lapse_common::SamplerConfig;
use lapse_frame_model::{FrameId, LoadedCatalog};
use lapse_ramp_engine::{ColorSpace, MipmapCache, PreviewBuffer};
use tracing::{debug, warn};

/// Largest base level kept per frame, as a multiple of the sampling box.
const BASE_LEVEL_FACTOR: u32 = 4;

/// Decode `path` to RGBA8, shrunk to fit `max_width` x `max_height`.
pub fn decode_preview(path: &Path, max_width: u32, max_height: u32) -> anyhow::Result<PreviewBuffer> {
    let image = image::open(path).with_context(|| format!("Failed to decode {}", path.display()))?;
    let image = if image.width() > max_width && image.height() > max_height {
        image.thumbnail(max_width, max_height)
    } else {
        image
    };

    let rgba = image.to_rgba8();
    let (width, height) = rgba.dimensions();
    Ok(PreviewBuffer::new(width, height, ColorSpace::Srgb, rgba.into_raw())?)
}

/// Decode every selected frame without a measured brightness.
///
/// Frames that fail to decode are skipped; the pass reports them as missed.
/// Returns the number of frames loaded.
pub fn load_previews(cache: &MipmapCache, loaded: &LoadedCatalog, config: &SamplerConfig) -> usize {
    let max_width = config.preview_width.saturating_mul(BASE_LEVEL_FACTOR);
    let max_height = config.preview_height.saturating_mul(BASE_LEVEL_FACTOR);

    let pending: Vec<(FrameId, std::path::PathBuf)> = loaded
        .catalog
        .selected_images()
        .filter(|r| r.known_brightness().is_none())
        .map(|r| (r.id, loaded.image_path(r)))
        .collect();

    let mut count = 0;
    for (id, path) in pending {
        match decode_preview(&path, max_width, max_height) {
            Ok(buffer) => {
                let levels = cache.insert_pyramid(id, buffer, config.mip_floor);
                debug!(frame = id, levels, "Loaded preview pyramid");
                count += 1;
            }
            Err(e) => warn!(frame = id, "Skipping preview: {e:#}"),
        }
    }
    count
}
