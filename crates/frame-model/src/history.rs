//! Per-image edit history.
//!
//! Each image carries a stack of edit operations. Downstream rendering
//! applies entries `0..history_end`, so every append advances
//! `history_end` to keep the new entry active.

use serde::{Deserialize, Serialize};

use crate::frame::ImageRecord;

/// Operation name of the exposure edit written by equalize passes.
pub const EXPOSURE_OPERATION: &str = "exposure";

/// Multi-instance name that marks exposure entries owned by the timelapse passes.
pub const TIMELAPSE_INSTANCE: &str = " T";

/// Parameter payload version of [`ExposureParams`].
pub const EXPOSURE_PARAMS_VERSION: u32 = 2;

/// One entry of an image's edit stack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Position in the stack.
    pub num: u32,

    /// Operation name (e.g. `"exposure"`).
    pub operation: String,

    /// Version of the parameter payload.
    pub version: u32,

    /// Opaque parameter payload.
    pub params: serde_json::Value,

    pub enabled: bool,

    /// Ordering among instances of the same operation.
    pub multi_priority: u32,

    /// Instance name distinguishing several entries of one operation.
    pub multi_name: String,
}

/// Insert or refresh an entry for `operation`/`multi_name` on `record`.
///
/// An existing entry with the same operation and instance name is updated
/// in place. Otherwise a new entry is appended at `max(num) + 1` with a
/// `multi_priority` one above the highest existing instance of the
/// operation. Returns the `num` of the affected entry.
pub fn append_or_update(
    record: &mut ImageRecord,
    operation: &str,
    multi_name: &str,
    version: u32,
    params: serde_json::Value,
) -> u32 {
    let num = if let Some(entry) = record
        .history
        .iter_mut()
        .find(|e| e.operation == operation && e.multi_name == multi_name)
    {
        entry.params = params;
        entry.version = version;
        entry.enabled = true;
        entry.num
    } else {
        let num = record
            .history
            .iter()
            .map(|e| e.num + 1)
            .max()
            .unwrap_or(0);
        let multi_priority = record
            .history
            .iter()
            .filter(|e| e.operation == operation)
            .map(|e| e.multi_priority + 1)
            .max()
            .unwrap_or(0);
        record.history.push(HistoryEntry {
            num,
            operation: operation.to_string(),
            version,
            params,
            enabled: true,
            multi_priority,
            multi_name: multi_name.to_string(),
        });
        num
    };

    // The whole stack stays active.
    record.history_end = record
        .history
        .iter()
        .map(|e| e.num + 1)
        .max()
        .unwrap_or(0);
    num
}

/// Parameters of the exposure operation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExposureParams {
    /// Black level offset.
    pub black: f32,

    /// Exposure adjustment in EV.
    pub exposure: f32,

    pub gain: f32,
}

impl ExposureParams {
    /// Parameters that apply `correction_ev` with a neutral black level.
    pub fn from_correction(correction_ev: f64) -> Self {
        Self {
            black: BLACKS_TABLE.interpolate(0.0),
            exposure: correction_ev as f32,
            gain: 0.0,
        }
    }

    /// Opaque history payload.
    pub fn to_value(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(self)
    }
}

/// Piecewise-linear mapping between two parameter scales.
#[derive(Debug, Clone, Copy)]
pub struct LookupTable<const N: usize> {
    points: [(f32, f32); N],
}

/// Lightroom "blacks" slider to black level offset.
pub const BLACKS_TABLE: LookupTable<5> = LookupTable::new([
    (-100.0, 0.020),
    (-50.0, 0.005),
    (0.0, 0.0),
    (50.0, -0.005),
    (100.0, -0.010),
]);

impl<const N: usize> LookupTable<N> {
    /// `points` must be sorted by their first component.
    pub const fn new(points: [(f32, f32); N]) -> Self {
        Self { points }
    }

    /// Map `value`, clamping to the table's outermost points.
    pub fn interpolate(&self, value: f32) -> f32 {
        let Some(&(first_x, first_y)) = self.points.first() else {
            return value;
        };
        if value <= first_x {
            return first_y;
        }
        for pair in self.points.windows(2) {
            let (x0, y0) = pair[0];
            let (x1, y1) = pair[1];
            if value <= x1 {
                if x1 <= x0 {
                    return y1;
                }
                return y0 + (value - x0) / (x1 - x0) * (y1 - y0);
            }
        }
        self.points.last().map_or(value, |&(_, y)| y)
    }
}
