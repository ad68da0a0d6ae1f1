//! Catalog metadata and on-disk layout.
//!
//! A catalog is the top-level container that ties together the image
//! records of a timelapse and the ordered selection the passes run over.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::frame::{FrameId, ImageRecord};

/// Top-level catalog file (`meta/catalog.json`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Catalog {
    /// Schema version.
    pub version: String,

    /// Human-readable catalog name.
    pub name: String,

    /// Unique catalog identifier.
    pub id: String,

    /// Creation timestamp (ISO 8601).
    pub created_at: String,

    /// Last modified timestamp (ISO 8601).
    pub modified_at: String,

    /// All images known to the catalog.
    #[serde(default)]
    pub images: Vec<ImageRecord>,

    /// Ordered selection of image ids that make up the timelapse.
    #[serde(default)]
    pub selection: Vec<FrameId>,
}

impl Catalog {
    /// Create an empty catalog.
    pub fn new(name: impl Into<String>) -> Self {
        let now = chrono::Utc::now();
        Self {
            version: "1.0".to_string(),
            name: name.into(),
            id: catalog_id(now),
            created_at: now.to_rfc3339(),
            modified_at: now.to_rfc3339(),
            images: vec![],
            selection: vec![],
        }
    }

    /// Add an image at the end of the catalog and the selection.
    ///
    /// The record's id is replaced with the next free id, which is returned.
    pub fn push_image(&mut self, mut record: ImageRecord) -> FrameId {
        let id = self.images.iter().map(|r| r.id + 1).max().unwrap_or(1);
        record.id = id;
        self.images.push(record);
        self.selection.push(id);
        id
    }

    pub fn image(&self, id: FrameId) -> Option<&ImageRecord> {
        self.images.iter().find(|r| r.id == id)
    }

    pub fn image_mut(&mut self, id: FrameId) -> Option<&mut ImageRecord> {
        self.images.iter_mut().find(|r| r.id == id)
    }

    /// Selected records in selection order. Ids without a record are skipped.
    pub fn selected_images(&self) -> impl Iterator<Item = &ImageRecord> {
        self.selection.iter().filter_map(|id| self.image(*id))
    }

    /// Check structural invariants: unique ids and a resolvable, duplicate-free selection.
    pub fn validate(&self) -> Result<(), CatalogError> {
        let mut seen = std::collections::HashSet::new();
        for record in &self.images {
            if !seen.insert(record.id) {
                return Err(CatalogError::ValidationError {
                    message: format!("duplicate image id {}", record.id),
                });
            }
        }

        let mut selected = std::collections::HashSet::new();
        for id in &self.selection {
            if !seen.contains(id) {
                return Err(CatalogError::UnknownImage { id: *id });
            }
            if !selected.insert(*id) {
                return Err(CatalogError::ValidationError {
                    message: format!("image {id} selected twice"),
                });
            }
        }
        Ok(())
    }

    /// Refresh the modification timestamp.
    pub fn touch(&mut self) {
        self.modified_at = chrono::Utc::now().to_rfc3339();
    }
}

/// The complete in-memory representation of a loaded catalog.
#[derive(Debug, Clone)]
pub struct LoadedCatalog {
    /// Filesystem path to the catalog directory.
    pub root: PathBuf,

    /// Catalog contents.
    pub catalog: Catalog,
}

impl LoadedCatalog {
    /// Load a catalog from a directory.
    pub fn load(root: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let root = root.as_ref().to_path_buf();
        let catalog_path = catalog_file(&root);

        let json = std::fs::read_to_string(&catalog_path).map_err(|e| CatalogError::IoError {
            path: catalog_path.clone(),
            source: e,
        })?;

        let catalog: Catalog =
            serde_json::from_str(&json).map_err(|e| CatalogError::ParseError {
                path: catalog_path,
                source: e,
            })?;
        catalog.validate()?;

        Ok(Self { root, catalog })
    }

    /// Save the catalog to disk.
    pub fn save(&self) -> Result<(), CatalogError> {
        let meta_dir = self.root.join("meta");
        std::fs::create_dir_all(&meta_dir).map_err(|e| CatalogError::IoError {
            path: meta_dir.clone(),
            source: e,
        })?;

        let catalog_path = catalog_file(&self.root);
        let json =
            serde_json::to_string_pretty(&self.catalog).map_err(|e| CatalogError::ParseError {
                path: catalog_path.clone(),
                source: e,
            })?;
        std::fs::write(&catalog_path, json).map_err(|e| CatalogError::IoError {
            path: catalog_path,
            source: e,
        })?;

        Ok(())
    }

    /// Create a new catalog on disk with the standard directory structure.
    pub fn create(root: impl AsRef<Path>, catalog: Catalog) -> Result<Self, CatalogError> {
        let root = root.as_ref().to_path_buf();
        catalog.validate()?;

        let loaded = Self { root, catalog };
        loaded.save()?;
        Ok(loaded)
    }

    /// Absolute path of an image file.
    pub fn image_path(&self, record: &ImageRecord) -> PathBuf {
        self.root.join(&record.filename)
    }

    /// Report selected images whose file is missing.
    pub fn validate_sources(&self) -> Vec<String> {
        self.catalog
            .selected_images()
            .filter(|r| !self.image_path(r).exists())
            .map(|r| format!("Image {} source missing: {}", r.id, r.filename))
            .collect()
    }
}

/// Errors that can occur when working with catalogs.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("I/O error at {path}: {source}")]
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Parse error in {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Invalid catalog: {message}")]
    ValidationError { message: String },

    #[error("Unknown image id {id}")]
    UnknownImage { id: FrameId },
}

fn catalog_file(root: &Path) -> PathBuf {
    root.join("meta").join("catalog.json")
}

fn catalog_id(now: chrono::DateTime<chrono::Utc>) -> String {
    format!(
        "lapse-{}-{:08x}",
        now.format("%Y%m%d%H%M%S"),
        now.timestamp_subsec_nanos()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::CaptureSettings;

    fn sample_catalog() -> Catalog {
        let mut catalog = Catalog::new("Sunset");
        for (i, exposure) in [0.01, 0.01, 0.02].into_iter().enumerate() {
            catalog.push_image(ImageRecord::new(
                0,
                format!("IMG_{i:04}.jpg"),
                CaptureSettings::new(exposure, 4.0, 100.0),
            ));
        }
        catalog
    }

    #[test]
    fn test_push_assigns_sequential_ids() {
        let catalog = sample_catalog();
        let ids: Vec<_> = catalog.images.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(catalog.selection, vec![1, 2, 3]);
    }

    #[test]
    fn test_selected_images_follow_selection_order() {
        let mut catalog = sample_catalog();
        catalog.selection = vec![3, 1];
        let names: Vec<_> = catalog
            .selected_images()
            .map(|r| r.filename.as_str())
            .collect();
        assert_eq!(names, vec!["IMG_0002.jpg", "IMG_0000.jpg"]);
    }

    #[test]
    fn test_validate_rejects_unknown_selection() {
        let mut catalog = sample_catalog();
        catalog.selection.push(42);
        assert!(matches!(
            catalog.validate(),
            Err(CatalogError::UnknownImage { id: 42 })
        ));
    }

    #[test]
    fn test_validate_rejects_duplicate_selection() {
        let mut catalog = sample_catalog();
        catalog.selection.push(1);
        assert!(matches!(
            catalog.validate(),
            Err(CatalogError::ValidationError { .. })
        ));
    }

    #[test]
    fn test_loaded_catalog_create_and_load() {
        let dir = std::env::temp_dir().join("lapse_test_catalog");
        let _ = std::fs::remove_dir_all(&dir);

        let created = LoadedCatalog::create(&dir, sample_catalog()).unwrap();
        assert_eq!(created.catalog.name, "Sunset");

        let loaded = LoadedCatalog::load(&dir).unwrap();
        assert_eq!(loaded.catalog.images.len(), 3);
        assert_eq!(loaded.catalog.selection, vec![1, 2, 3]);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_validate_sources_reports_missing() {
        let dir = std::env::temp_dir().join("lapse_test_catalog_sources");
        let _ = std::fs::remove_dir_all(&dir);

        let loaded = LoadedCatalog::create(&dir, sample_catalog()).unwrap();
        let errors = loaded.validate_sources();
        assert_eq!(errors.len(), 3);
        assert!(errors[0].contains("IMG_0000.jpg"));

        std::fs::remove_dir_all(&dir).ok();
    }
}
