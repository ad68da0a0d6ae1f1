//! Print diagram curves of a catalog as JSON.

use std::path::PathBuf;

use lapse_frame_model::LoadedCatalog;
use lapse_ramp_engine::DiagramCurves;

pub fn run(path: PathBuf) -> anyhow::Result<()> {
    let loaded =
        LoadedCatalog::load(&path).map_err(|e| anyhow::anyhow!("Failed to load catalog: {e}"))?;

    let curves = DiagramCurves::from_records(loaded.catalog.selected_images());
    println!("{}", serde_json::to_string_pretty(&curves)?);
    Ok(())
}
