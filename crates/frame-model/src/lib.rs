//! Lapse Frame Model
//!
//! Defines the core data contracts for Lapse catalogs:
//! - **Frames:** Image records with capture settings and analysis state
//! - **History:** Per-image edit stacks and the exposure edit payload
//! - **Catalog:** Top-level metadata, the ordered selection, and on-disk layout
//!
//! Brightness uses a negative sentinel for "not yet sampled" so that
//! records written before a pass stay readable.

pub mod catalog;
pub mod frame;
pub mod history;

pub use catalog::*;
pub use frame::*;
pub use history::*;
