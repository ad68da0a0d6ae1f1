use std::path::PathBuf;

use lapse_frame_model::{Catalog, LoadedCatalog};
use lapse_ramp_engine::{
    BrightnessSampler, CancelToken, MipmapCache, NoopObserver, PassMode, PreviewSize, RampEngine,
};

fn load_fixture_catalog() -> Catalog {
    let root = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("..")
        .join("fixtures")
        .join("sample-catalog");

    LoadedCatalog::load(root)
        .expect("fixture catalog should load")
        .catalog
}

fn equalize(catalog: &mut Catalog) -> lapse_ramp_engine::PassReport {
    // Brightness is pre-filled in the fixture, so no previews are needed.
    let cache = MipmapCache::new();
    let sampler = BrightnessSampler::new(&cache, PreviewSize::new(320, 240));
    RampEngine::with_defaults()
        .run(
            catalog,
            &sampler,
            PassMode::Equalize,
            &CancelToken::new(),
            &mut NoopObserver,
        )
        .expect("pass should succeed")
}

#[test]
fn sample_catalog_keyframes_and_corrections_are_stable() {
    let mut catalog = load_fixture_catalog();
    let report = equalize(&mut catalog);

    assert!(report.is_complete());
    assert_eq!(report.frames, 8);

    let keyframes: Vec<usize> = report
        .corrections
        .iter()
        .filter(|c| c.is_keyframe)
        .map(|c| c.order)
        .collect();
    assert_eq!(keyframes, vec![2, 3, 5, 6]);

    let expected = [0.0, 0.25, 0.5, 1.0, 0.75, 0.5, 0.0, 0.0];
    for (correction, want) in report.corrections.iter().zip(expected) {
        assert!(
            (correction.exposure_correction - want).abs() < 1e-9,
            "frame {} got {}",
            correction.order,
            correction.exposure_correction
        );
    }
}

#[test]
fn sample_catalog_history_is_stable_across_reruns() {
    let mut catalog = load_fixture_catalog();
    equalize(&mut catalog);
    let first = serde_json::to_string(&catalog.images).expect("serialize");
    equalize(&mut catalog);
    let second = serde_json::to_string(&catalog.images).expect("serialize");

    assert_eq!(first, second);
    assert!(catalog.images.iter().all(|r| r.history_end == 1));
}
