//! Create a catalog from a directory of frames.

use std::path::{Path, PathBuf};

use lapse_frame_model::{CaptureSettings, Catalog, ImageRecord, LoadedCatalog};
use tracing::warn;

use crate::capture::read_capture;

const IMAGE_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "tif", "tiff"];

pub fn run(path: PathBuf, name: Option<String>, force: bool) -> anyhow::Result<()> {
    println!("Scanning {}", path.display());

    if path.join("meta").join("catalog.json").exists() && !force {
        anyhow::bail!(
            "Catalog already exists at {} (use --force to overwrite)",
            path.display()
        );
    }

    let files = scan_frames(&path)?;
    if files.is_empty() {
        anyhow::bail!("No image files found in {}", path.display());
    }

    let name = name.unwrap_or_else(|| {
        path.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "timelapse".to_string())
    });
    let mut catalog = Catalog::new(&name);
    let mut without_exif = 0;

    for filename in &files {
        let capture = match read_capture(&path.join(filename)) {
            Ok(capture) => capture,
            Err(e) => {
                warn!("{e:#}");
                without_exif += 1;
                CaptureSettings::new(0.0, 0.0, 0.0)
            }
        };
        catalog.push_image(ImageRecord::new(0, filename.as_str(), capture));
    }

    let loaded = LoadedCatalog::create(&path, catalog)
        .map_err(|e| anyhow::anyhow!("Failed to create catalog: {e}"))?;

    println!("Catalog '{}' created:", name);
    println!("  Frames: {}", loaded.catalog.images.len());
    if without_exif > 0 {
        println!("  Without capture metadata: {without_exif}");
    }
    println!(
        "  Catalog: {}",
        loaded.root.join("meta").join("catalog.json").display()
    );

    Ok(())
}

/// File names of supported images directly inside `dir`, sorted.
fn scan_frames(dir: &Path) -> anyhow::Result<Vec<String>> {
    let entries = std::fs::read_dir(dir)
        .map_err(|e| anyhow::anyhow!("Failed to read {}: {e}", dir.display()))?;

    let mut files = vec![];
    for entry in entries {
        let path = entry?.path();
        if !path.is_file() || !is_image(&path) {
            continue;
        }
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            files.push(name.to_string());
        }
    }
    files.sort();
    Ok(files)
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}
