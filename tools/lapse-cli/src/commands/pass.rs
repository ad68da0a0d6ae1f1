//! Run a reset, initialize or equalize pass over a catalog.

use std::path::PathBuf;

use lapse_common::AppConfig;
use lapse_frame_model::{FrameId, LoadedCatalog};
use lapse_ramp_engine::{
    MipmapCache, PassObserver, PassReport, TimelapseView, ViewCommand, ViewOutcome,
};
use tracing::{debug, info};

use crate::preview::load_previews;

/// Logs pass progress to the console.
struct ConsoleProgress;

impl PassObserver for ConsoleProgress {
    fn correction_assigned(&mut self, id: FrameId, correction: f64) {
        debug!(frame = id, correction, "Exposure correction assigned");
    }

    fn progress(&mut self, done: usize, total: usize) {
        info!("Processed {done}/{total} frames");
    }
}

pub fn run(path: PathBuf, command: ViewCommand, config: AppConfig) -> anyhow::Result<()> {
    println!("Running {command:?} on: {}", path.display());

    let loaded =
        LoadedCatalog::load(&path).map_err(|e| anyhow::anyhow!("Failed to load catalog: {e}"))?;

    let cache = MipmapCache::new();
    if command != ViewCommand::Reset {
        let count = load_previews(&cache, &loaded, &config.sampler);
        println!("  Decoded {count} preview(s)");
    }

    let LoadedCatalog { root, catalog } = loaded;
    let view = TimelapseView::new(catalog, cache, &config);
    view.enter();
    let outcome = view.execute(command, &mut ConsoleProgress);
    view.leave();
    let outcome = outcome?;

    if let ViewOutcome::Pass(report) = &outcome {
        if report.cancelled || report.advisory.is_some() {
            print_report(report);
            return Ok(());
        }
    }

    let mut loaded = LoadedCatalog {
        root,
        catalog: view.into_store(),
    };
    loaded.catalog.touch();
    loaded
        .save()
        .map_err(|e| anyhow::anyhow!("Failed to save catalog: {e}"))?;

    match outcome {
        ViewOutcome::Reset { frames } => println!("  Reset {frames} frame(s)"),
        ViewOutcome::Pass(report) => print_report(&report),
    }
    println!(
        "  Catalog saved to: {}",
        loaded.root.join("meta").join("catalog.json").display()
    );

    Ok(())
}

fn print_report(report: &PassReport) {
    if let Some(advisory) = &report.advisory {
        println!("  {advisory}");
        return;
    }
    if report.cancelled {
        println!("  Pass cancelled, nothing saved.");
        return;
    }

    println!("  Frames: {}", report.frames);
    println!("  Keyframes: {}", report.keyframes);
    let corrected = report
        .corrections
        .iter()
        .filter(|c| c.exposure_correction != 0.0)
        .count();
    if corrected > 0 {
        println!("  Corrected frames: {corrected}");
    }
    println!("  Time: {} ms", report.elapsed_ms);

    if report.missed_frames > 0 {
        println!("\n{} frame(s) missed:", report.missed_frames);
        for issue in &report.issues {
            println!("  - {issue}");
        }
        if report.should_retry() {
            println!("Run the pass again once previews are available.");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lapse_frame_model::{CaptureSettings, Catalog, ImageRecord};

    fn sample_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("lapse-pass-{tag}-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();

        let mut catalog = Catalog::new(tag);
        let settings = [(0.01, 100), (0.01, 120), (0.02, 200)];
        for (i, (exposure, gray)) in settings.iter().enumerate() {
            let name = format!("{i:04}.png");
            image::RgbaImage::from_pixel(80, 60, image::Rgba([*gray, *gray, *gray, 255]))
                .save(dir.join(&name))
                .unwrap();
            catalog.push_image(ImageRecord::new(
                0,
                name,
                CaptureSettings::new(*exposure, 4.0, 100.0),
            ));
        }
        LoadedCatalog::create(&dir, catalog).unwrap();
        dir
    }

    #[test]
    fn test_equalize_persists_results() {
        let dir = sample_dir("equalize");
        run(dir.clone(), ViewCommand::Equalize, AppConfig::default()).unwrap();

        let catalog = LoadedCatalog::load(&dir).unwrap().catalog;
        let flags: Vec<bool> = catalog.images.iter().map(|r| r.timelapse_keyframe).collect();
        assert_eq!(flags, vec![false, true, true]);
        assert!((catalog.images[2].exposure_correction - 1.0).abs() < 1e-9);
        assert!((catalog.images[1].exposure_correction - 1.0 / 3.0).abs() < 1e-9);
        assert!((catalog.images[0].brightness - 100.0).abs() < 1e-6);
        assert!(catalog.images.iter().all(|r| r.history.len() == 1));

        run(dir.clone(), ViewCommand::Reset, AppConfig::default()).unwrap();
        let catalog = LoadedCatalog::load(&dir).unwrap().catalog;
        assert!(catalog.images.iter().all(|r| r.known_brightness().is_none()));
        let _ = std::fs::remove_dir_all(&dir);
    }
}
