//! Lapse Ramp Engine
//!
//! Turns an ordered selection of timelapse frames into editing decisions:
//! - **Brightness sampling:** mean luma of a best-fit preview per frame
//! - **Keyframe detection:** flag both frames around every change of
//!   shutter, aperture or ISO
//! - **Exposure ramping:** compensate light-value jumps between runs
//!
//! The engine works against the [`FrameStore`], [`EditHistory`] and
//! [`PixelSource`] traits; nothing here touches the filesystem.

pub mod curves;
pub mod engine;
pub mod error;
pub mod mipmap;
pub mod ramp;
pub mod sampler;
pub mod store;
pub mod view;

pub use curves::{Curve, CurveKind, DiagramCurves};
pub use engine::{
    CancelToken, FrameCorrection, NoopObserver, PassMode, PassObserver, PassReport, RampEngine,
};
pub use error::{FrameIssue, PassAdvisory, ViewError};
pub use mipmap::{ColorSpace, MipmapCache, PixelSource, PreviewBuffer, PreviewSize};
pub use sampler::BrightnessSampler;
pub use store::{EditHistory, FrameAnalysis, FrameStore};
pub use view::{TimelapseView, ViewCommand, ViewOutcome};
