//! Capture settings from EXIF metadata.

use std::path::Path;

use anyhow::Context;
use exif::{Exif, In, Tag, Value};
use lapse_frame_model::CaptureSettings;

/// Sensitivity tags in order of preference.
const ISO_TAGS: [Tag; 3] = [
    Tag::PhotographicSensitivity,
    Tag::RecommendedExposureIndex,
    Tag::StandardOutputSensitivity,
];

/// Placeholder values cameras write when the real ISO did not fit.
const ISO_PLACEHOLDERS: [u32; 2] = [0, 65535];

/// Read shutter, aperture, ISO and focal length from `path`.
///
/// Missing fields come back as 0, which the engine treats as malformed.
pub fn read_capture(path: &Path) -> anyhow::Result<CaptureSettings> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    let mut reader = std::io::BufReader::new(file);
    let exif = exif::Reader::new()
        .read_from_container(&mut reader)
        .with_context(|| format!("No EXIF data in {}", path.display()))?;

    let capture = CaptureSettings::new(
        rational(&exif, Tag::ExposureTime).unwrap_or(0.0),
        rational(&exif, Tag::FNumber).unwrap_or(0.0),
        pick_iso(
            ISO_TAGS
                .iter()
                .map(|tag| exif.get_field(*tag, In::PRIMARY).and_then(|f| f.value.get_uint(0))),
        )
        .unwrap_or(0.0),
    )
    .with_focal_length(rational(&exif, Tag::FocalLength).unwrap_or(0.0));

    tracing::debug!(
        file = %path.display(),
        exposure = %capture.exposure_label(),
        aperture = %capture.aperture_label(),
        iso = %capture.iso_label(),
        "Read capture settings"
    );
    Ok(capture)
}

fn rational(exif: &Exif, tag: Tag) -> Option<f64> {
    match exif.get_field(tag, In::PRIMARY).map(|f| &f.value) {
        Some(Value::Rational(values)) => values
            .first()
            .filter(|r| r.denom != 0)
            .map(|r| r.to_f64()),
        _ => None,
    }
}

/// First candidate that is present and not a placeholder.
fn pick_iso(candidates: impl IntoIterator<Item = Option<u32>>) -> Option<f64> {
    candidates
        .into_iter()
        .flatten()
        .find(|v| !ISO_PLACEHOLDERS.contains(v))
        .map(f64::from)
}
