//! Show the frame table of a catalog.

use std::path::PathBuf;

use lapse_frame_model::{ImageRecord, LoadedCatalog};

pub fn run(path: PathBuf) -> anyhow::Result<()> {
    let loaded =
        LoadedCatalog::load(&path).map_err(|e| anyhow::anyhow!("Failed to load catalog: {e}"))?;
    let c = &loaded.catalog;

    println!("Catalog: {}", c.name);
    println!("  ID: {}", c.id);
    println!("  Created: {}", c.created_at);
    println!("  Modified: {}", c.modified_at);
    println!("  Frames: {} ({} selected)", c.images.len(), c.selection.len());
    println!(
        "  Keyframes: {}",
        c.selected_images().filter(|r| r.timelapse_keyframe).count()
    );

    let missing = loaded.validate_sources();
    if !missing.is_empty() {
        println!("  Missing sources: {}", missing.len());
    }
    println!();

    println!("{}", header());
    for record in c.selected_images() {
        println!("{}", format_row(record));
    }

    Ok(())
}

fn header() -> String {
    format!(
        "{:<2} {:>5}  {:<24} {:>7} {:>10} {:>8} {:>6} {:>6} {:>7}",
        "K", "Frame", "Filename", "EV", "Brightness", "Exposure", "Ap.", "ISO", "Focal"
    )
}

fn format_row(record: &ImageRecord) -> String {
    let brightness = record
        .known_brightness()
        .map(|b| format!("{b:.1}"))
        .unwrap_or_else(|| "---".to_string());

    format!(
        "{:<2} {:>5}  {:<24} {:>+7.2} {:>10} {:>8} {:>6} {:>6} {:>7}",
        if record.timelapse_keyframe { "*" } else { "" },
        record.id,
        record.filename,
        record.exposure_correction,
        brightness,
        record.capture.exposure_label(),
        record.capture.aperture_label(),
        record.capture.iso_label(),
        record.capture.focal_length_label(),
    )
}
