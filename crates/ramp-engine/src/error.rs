//! Per-frame issues, pass advisories, and view errors.

use lapse_common::LapseError;
use lapse_frame_model::FrameId;

/// A non-fatal problem with one frame. The pass records it and moves on.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FrameIssue {
    /// No pixel data is resident for the frame yet; a later pass may succeed.
    #[error("frame {id}: no preview available for sampling")]
    SampleUnavailable { id: FrameId },

    /// Capture metadata cannot produce a light value.
    #[error("frame {id}: malformed metadata ({reason})")]
    MalformedMetadata { id: FrameId, reason: String },

    /// The selection references an id the store does not know.
    #[error("frame {id}: not found in store")]
    UnknownFrame { id: FrameId },
}

impl FrameIssue {
    pub fn frame_id(&self) -> FrameId {
        match self {
            Self::SampleUnavailable { id }
            | Self::MalformedMetadata { id, .. }
            | Self::UnknownFrame { id } => *id,
        }
    }

    /// Whether retrying the pass later can resolve the issue.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::SampleUnavailable { .. })
    }
}

/// User-facing notice that a pass had nothing to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PassAdvisory {
    #[error("select at least two frames for a timelapse ({selected} selected)")]
    EmptyCollection { selected: usize },
}

/// Failures of the view wrapper around the engine.
#[derive(Debug, thiserror::Error)]
pub enum ViewError {
    /// Another pass currently holds the collection.
    #[error("a timelapse pass is already running")]
    Busy,

    /// Commands are only accepted while the view is entered.
    #[error("timelapse view is not active")]
    Inactive,

    /// Flushing results back to the store failed.
    #[error("failed to persist pass results: {0}")]
    Persist(#[from] LapseError),
}
