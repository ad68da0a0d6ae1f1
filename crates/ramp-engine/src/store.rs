//! Collaborator interfaces for the frame collection and edit persistence.
//!
//! The engine never touches a catalog directly: it reads the ordered
//! selection and capture metadata through [`FrameStore`] and writes edit
//! records through [`EditHistory`]. [`Catalog`] implements both.

use lapse_common::{LapseError, LapseResult};
use lapse_frame_model::{
    append_or_update, CaptureSettings, Catalog, ExposureParams, FrameId, EXPOSURE_OPERATION,
    EXPOSURE_PARAMS_VERSION, TIMELAPSE_INSTANCE,
};

/// Mutable analysis fields written back at the end of a pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameAnalysis {
    /// Measured brightness, or a negative value when unknown.
    pub brightness: f64,
    pub is_keyframe: bool,
    pub exposure_correction: f64,
}

/// Ordered collection of frames with their metadata and analysis state.
pub trait FrameStore {
    /// Ids of the selected frames, in sequence order.
    fn selection(&self) -> Vec<FrameId>;

    /// Capture metadata, or `None` for an unknown id.
    fn capture(&self, id: FrameId) -> Option<CaptureSettings>;

    /// Stored brightness (negative when unknown), or `None` for an unknown id.
    fn brightness(&self, id: FrameId) -> Option<f64>;

    fn store_analysis(&mut self, id: FrameId, analysis: FrameAnalysis) -> LapseResult<()>;

    /// Forget brightness and keyframe state of `id`.
    fn reset_analysis(&mut self, id: FrameId) -> LapseResult<()>;
}

/// Persistence of per-frame edit records.
pub trait EditHistory {
    /// Append or update the timelapse exposure edit of `id`.
    ///
    /// Returns the stack position of the record.
    fn record_exposure(&mut self, id: FrameId, params: &ExposureParams) -> LapseResult<u32>;
}

impl FrameStore for Catalog {
    fn selection(&self) -> Vec<FrameId> {
        self.selection.clone()
    }

    fn capture(&self, id: FrameId) -> Option<CaptureSettings> {
        self.image(id).map(|r| r.capture)
    }

    fn brightness(&self, id: FrameId) -> Option<f64> {
        self.image(id).map(|r| r.brightness)
    }

    fn store_analysis(&mut self, id: FrameId, analysis: FrameAnalysis) -> LapseResult<()> {
        let record = self
            .image_mut(id)
            .ok_or_else(|| LapseError::catalog(format!("unknown image id {id}")))?;
        record.brightness = analysis.brightness;
        record.timelapse_keyframe = analysis.is_keyframe;
        record.exposure_correction = analysis.exposure_correction;
        Ok(())
    }

    fn reset_analysis(&mut self, id: FrameId) -> LapseResult<()> {
        let record = self
            .image_mut(id)
            .ok_or_else(|| LapseError::catalog(format!("unknown image id {id}")))?;
        record.reset_analysis();
        Ok(())
    }
}

impl EditHistory for Catalog {
    fn record_exposure(&mut self, id: FrameId, params: &ExposureParams) -> LapseResult<u32> {
        let record = self
            .image_mut(id)
            .ok_or_else(|| LapseError::history(format!("unknown image id {id}")))?;
        Ok(append_or_update(
            record,
            EXPOSURE_OPERATION,
            TIMELAPSE_INSTANCE,
            EXPOSURE_PARAMS_VERSION,
            params.to_value()?,
        ))
    }
}
