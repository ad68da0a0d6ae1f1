//! Image records and their capture settings.
//!
//! A record couples the immutable capture metadata read from the file
//! with the mutable analysis fields the timelapse passes maintain:
//! measured brightness, keyframe flag, and exposure correction.

use serde::{Deserialize, Serialize};

use crate::history::HistoryEntry;

/// Identifier of an image inside a catalog.
pub type FrameId = u32;

/// Sentinel stored in `brightness` while a frame has not been sampled.
pub const BRIGHTNESS_UNKNOWN: f64 = -1.0;

/// Capture metadata as recorded by the camera.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CaptureSettings {
    /// Shutter time in seconds.
    pub exposure_time: f64,

    /// Aperture f-number.
    pub aperture: f64,

    /// Sensor sensitivity.
    pub iso: f64,

    /// Focal length in millimetres.
    #[serde(default)]
    pub focal_length: f64,
}

impl CaptureSettings {
    pub fn new(exposure_time: f64, aperture: f64, iso: f64) -> Self {
        Self {
            exposure_time,
            aperture,
            iso,
            focal_length: 0.0,
        }
    }

    pub fn with_focal_length(mut self, focal_length: f64) -> Self {
        self.focal_length = focal_length;
        self
    }

    /// Photometric light value `log2(sqrt(aperture)) + log2(1 / exposure_time)`.
    ///
    /// Returns `None` when the exposure time or aperture is not a positive
    /// finite number, since the logarithm is undefined there.
    pub fn light_value(&self) -> Option<f64> {
        if !self.exposure_time.is_finite() || self.exposure_time <= 0.0 {
            return None;
        }
        if !self.aperture.is_finite() || self.aperture <= 0.0 {
            return None;
        }
        Some(self.aperture.sqrt().log2() + (1.0 / self.exposure_time).log2())
    }

    /// Whether shutter, aperture or ISO changed between `self` and `other`.
    ///
    /// Focal length is not an exposure setting and is ignored.
    pub fn differs_from(&self, other: &CaptureSettings) -> bool {
        self.exposure_time != other.exposure_time
            || self.aperture != other.aperture
            || self.iso != other.iso
    }

    /// Human-readable shutter time: `1/N` up to half a second, `N''` above.
    pub fn exposure_label(&self) -> String {
        if self.exposure_time <= 0.0 || !self.exposure_time.is_finite() {
            "---".to_string()
        } else if self.exposure_time <= 0.5 {
            format!("1/{}", trim_number(1.0 / self.exposure_time, 0))
        } else {
            format!("{}''", trim_number(self.exposure_time, 1))
        }
    }

    pub fn aperture_label(&self) -> String {
        format!("f/{}", trim_number(self.aperture, 1))
    }

    pub fn iso_label(&self) -> String {
        trim_number(self.iso, 0)
    }

    pub fn focal_length_label(&self) -> String {
        format!("{} mm", trim_number(self.focal_length, 0))
    }
}

/// A catalog entry for one image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRecord {
    /// Unique identifier within the catalog.
    pub id: FrameId,

    /// File name relative to the catalog root.
    pub filename: String,

    /// Capture metadata (read-only for the engine).
    pub capture: CaptureSettings,

    /// Average luma in `[0, 255]`, or [`BRIGHTNESS_UNKNOWN`].
    #[serde(default = "unknown_brightness")]
    pub brightness: f64,

    /// Set where capture settings differ from a neighbour in sequence.
    #[serde(default)]
    pub timelapse_keyframe: bool,

    /// Exposure adjustment in EV.
    #[serde(default)]
    pub exposure_correction: f64,

    /// Edit history stack.
    #[serde(default)]
    pub history: Vec<HistoryEntry>,

    /// Number of active history entries (`max(num) + 1`).
    #[serde(default)]
    pub history_end: u32,
}

impl ImageRecord {
    pub fn new(id: FrameId, filename: impl Into<String>, capture: CaptureSettings) -> Self {
        Self {
            id,
            filename: filename.into(),
            capture,
            brightness: BRIGHTNESS_UNKNOWN,
            timelapse_keyframe: false,
            exposure_correction: 0.0,
            history: vec![],
            history_end: 0,
        }
    }

    /// Measured brightness, if the frame has been sampled.
    pub fn known_brightness(&self) -> Option<f64> {
        (self.brightness >= 0.0).then_some(self.brightness)
    }

    /// Forget brightness and keyframe state.
    pub fn reset_analysis(&mut self) {
        self.brightness = BRIGHTNESS_UNKNOWN;
        self.timelapse_keyframe = false;
    }
}

fn unknown_brightness() -> f64 {
    BRIGHTNESS_UNKNOWN
}

/// Format with at most `decimals` fractional digits and no trailing zeros.
fn trim_number(value: f64, decimals: usize) -> String {
    let s = format!("{value:.decimals$}");
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    } else {
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_light_value_combines_aperture_and_shutter() {
        let lw = CaptureSettings::new(1.0 / 100.0, 4.0, 100.0)
            .light_value()
            .unwrap();
        assert!((lw - (1.0 + 100f64.log2())).abs() < 1e-9);
    }

    #[test]
    fn test_light_value_rejects_non_positive_inputs() {
        assert!(CaptureSettings::new(0.0, 4.0, 100.0).light_value().is_none());
        assert!(CaptureSettings::new(0.01, 0.0, 100.0).light_value().is_none());
        assert!(CaptureSettings::new(-1.0, 4.0, 100.0).light_value().is_none());
        assert!(CaptureSettings::new(f64::NAN, 4.0, 100.0)
            .light_value()
            .is_none());
    }

    #[test]
    fn test_differs_from_ignores_focal_length() {
        let a = CaptureSettings::new(0.01, 4.0, 100.0).with_focal_length(24.0);
        let b = a.with_focal_length(35.0);
        assert!(!a.differs_from(&b));
        assert!(a.differs_from(&CaptureSettings::new(0.01, 4.0, 200.0)));
        assert!(a.differs_from(&CaptureSettings::new(0.02, 4.0, 100.0)));
        assert!(a.differs_from(&CaptureSettings::new(0.01, 5.6, 100.0)));
    }

    #[test]
    fn test_labels() {
        assert_eq!(CaptureSettings::new(0.01, 4.0, 100.0).exposure_label(), "1/100");
        assert_eq!(CaptureSettings::new(0.5, 4.0, 100.0).exposure_label(), "1/2");
        assert_eq!(CaptureSettings::new(2.5, 4.0, 100.0).exposure_label(), "2.5''");
        assert_eq!(CaptureSettings::new(1.0, 5.6, 100.0).aperture_label(), "f/5.6");
        assert_eq!(
            CaptureSettings::new(1.0, 8.0, 400.0)
                .with_focal_length(24.0)
                .focal_length_label(),
            "24 mm"
        );
    }

    #[test]
    fn test_missing_brightness_deserializes_as_unknown() {
        let json = r#"{
            "id": 3,
            "filename": "IMG_0003.jpg",
            "capture": { "exposure_time": 0.01, "aperture": 4.0, "iso": 100.0 }
        }"#;
        let record: ImageRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.brightness, BRIGHTNESS_UNKNOWN);
        assert!(record.known_brightness().is_none());
        assert!(!record.timelapse_keyframe);
    }

    #[test]
    fn test_reset_keeps_correction() {
        let mut record = ImageRecord::new(1, "a.jpg", CaptureSettings::new(0.01, 4.0, 100.0));
        record.brightness = 120.0;
        record.timelapse_keyframe = true;
        record.exposure_correction = 0.5;
        record.reset_analysis();
        assert!(record.known_brightness().is_none());
        assert!(!record.timelapse_keyframe);
        assert_eq!(record.exposure_correction, 0.5);
    }
}
