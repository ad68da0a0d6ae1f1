//! Per-frame series for the timelapse diagram.
//!
//! Every series is normalized to `[0, 1]` by its own minimum and maximum
//! so curves with different units can share one plot.

use serde::Serialize;

use lapse_frame_model::ImageRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CurveKind {
    ExposureTime,
    Aperture,
    Iso,
    Brightness,
    ExposureCorrection,
}

/// One normalized series. `None` marks frames without a value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Curve {
    pub kind: CurveKind,
    /// Raw minimum over known values (0 when none are known).
    pub min: f64,
    pub max: f64,
    pub points: Vec<Option<f64>>,
}

impl Curve {
    /// Normalize `raw`. A constant series maps to 0.
    pub fn normalized(kind: CurveKind, raw: &[Option<f64>]) -> Self {
        let known = raw.iter().flatten().copied();
        let (min, max) = known.fold(None, |acc: Option<(f64, f64)>, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
        .unwrap_or((0.0, 0.0));

        let span = max - min;
        let points = raw
            .iter()
            .map(|v| {
                v.map(|v| if span > 0.0 { (v - min) / span } else { 0.0 })
            })
            .collect();

        Self {
            kind,
            min,
            max,
            points,
        }
    }
}

/// All curves of a selection, in sequence order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiagramCurves {
    pub frames: usize,
    /// Sequence positions flagged as keyframes.
    pub keyframes: Vec<usize>,
    pub curves: Vec<Curve>,
}

impl DiagramCurves {
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a ImageRecord>) -> Self {
        let records: Vec<&ImageRecord> = records.into_iter().collect();
        let series = |f: fn(&ImageRecord) -> Option<f64>| -> Vec<Option<f64>> {
            records.iter().map(|r| f(r)).collect()
        };

        let curves = vec![
            Curve::normalized(
                CurveKind::ExposureTime,
                &series(|r| Some(r.capture.exposure_time)),
            ),
            Curve::normalized(CurveKind::Aperture, &series(|r| Some(r.capture.aperture))),
            Curve::normalized(CurveKind::Iso, &series(|r| Some(r.capture.iso))),
            Curve::normalized(CurveKind::Brightness, &series(ImageRecord::known_brightness)),
            Curve::normalized(
                CurveKind::ExposureCorrection,
                &series(|r| Some(r.exposure_correction)),
            ),
        ];

        Self {
            frames: records.len(),
            keyframes: records
                .iter()
                .enumerate()
                .filter(|(_, r)| r.timelapse_keyframe)
                .map(|(i, _)| i)
                .collect(),
            curves,
        }
    }

    pub fn curve(&self, kind: CurveKind) -> Option<&Curve> {
        self.curves.iter().find(|c| c.kind == kind)
    }
}
