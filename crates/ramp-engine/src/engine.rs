//! Keyframe detection and exposure ramping.
//!
//! # Algorithm
//!
//! 1. **Materialize** the ordered selection into read-only frames.
//! 2. **Scan** frames in order: resolve brightness on demand, compute the
//!    light value `LW = log2(sqrt(aperture)) + log2(1 / exposure_time)`,
//!    and flag both frames of every pair whose shutter, aperture or ISO
//!    differ.
//! 3. **Ramp** each run as it closes. A run spans from the previous
//!    boundary to the frame where settings change. The shift across the
//!    change, `LW(before) - LW(after)`, is added to the correction already
//!    in effect: the changed frame receives all of it and the frames
//!    leading up to it a linearly growing share. Corrections accumulate
//!    across changes and carry over unchanged to frames after the last one.
//! 4. **Flush** brightness, keyframe flags and corrections back to the
//!    store in sequence order.
//!
//! Frames whose brightness cannot be sampled or whose metadata has no
//! light value are excluded from EV comparisons and counted as missed.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, trace, warn};

use lapse_common::{LapseResult, PassClock, ProgressConfig, RateController};
use lapse_frame_model::{CaptureSettings, ExposureParams, FrameId, BRIGHTNESS_UNKNOWN};

use crate::error::{FrameIssue, PassAdvisory};
use crate::mipmap::PixelSource;
use crate::ramp::{light_shift, Run};
use crate::sampler::BrightnessSampler;
use crate::store::{EditHistory, FrameAnalysis, FrameStore};

/// What a pass computes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PassMode {
    /// Sample brightness and flag keyframes; corrections stay 0.
    Initialize,
    /// Initialize, then ramp exposure corrections across runs.
    Equalize,
}

/// One frame as seen by a pass. Read-only once materialized.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Position in the ordered selection.
    pub order: usize,
    pub id: FrameId,
    pub capture: CaptureSettings,
    /// Brightness stored before the pass started, if known.
    pub stored_brightness: Option<f64>,
}

/// Result for one frame, in sequence order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameCorrection {
    pub order: usize,
    pub id: FrameId,
    /// Resolved brightness, or `None` when sampling failed.
    pub brightness: Option<f64>,
    pub is_keyframe: bool,
    pub exposure_correction: f64,
}

/// Summary of a finished (or cancelled) pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PassReport {
    pub mode: PassMode,
    /// Frames in the selection.
    pub frames: usize,
    pub keyframes: usize,
    /// Frames excluded from EV comparison this pass.
    pub missed_frames: usize,
    #[serde(skip)]
    pub issues: Vec<FrameIssue>,
    #[serde(skip)]
    pub advisory: Option<PassAdvisory>,
    pub cancelled: bool,
    pub elapsed_ms: u64,
    pub corrections: Vec<FrameCorrection>,
}

impl PassReport {
    fn empty(mode: PassMode, frames: usize) -> Self {
        Self {
            mode,
            frames,
            keyframes: 0,
            missed_frames: 0,
            issues: vec![],
            advisory: None,
            cancelled: false,
            elapsed_ms: 0,
            corrections: vec![],
        }
    }

    /// A pass is complete when it ran to the end without missed frames.
    pub fn is_complete(&self) -> bool {
        !self.cancelled && self.missed_frames == 0
    }

    /// Whether a later retry pass could resolve missed frames.
    pub fn should_retry(&self) -> bool {
        !self.cancelled && self.issues.iter().any(FrameIssue::is_retryable)
    }
}

/// Cooperative cancellation flag, checked once per frame boundary.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Fire-and-forget notifications emitted during a pass.
///
/// None of these can influence the pass.
pub trait PassObserver {
    /// A correction was computed for `id`; viewers holding the frame open
    /// should pick it up immediately.
    fn correction_assigned(&mut self, _id: FrameId, _correction: f64) {}

    /// Throttled progress hint.
    fn progress(&mut self, _done: usize, _total: usize) {}

    fn pass_finished(&mut self, _report: &PassReport) {}
}

/// Observer that ignores every notification.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl PassObserver for NoopObserver {}

/// The keyframe/ramp engine.
#[derive(Debug, Clone)]
pub struct RampEngine {
    redraw_interval_ms: u64,
}

impl RampEngine {
    pub fn new(config: &ProgressConfig) -> Self {
        Self {
            redraw_interval_ms: config.redraw_interval_ms,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(&ProgressConfig::default())
    }

    /// Run one pass over the store's selection.
    ///
    /// Per-frame problems never abort the pass; they surface as
    /// `missed_frames` and `issues`. Errors are returned only when
    /// flushing results to the store fails. A cancelled pass leaves the
    /// store untouched.
    pub fn run<S, P, O>(
        &self,
        store: &mut S,
        sampler: &BrightnessSampler<'_, P>,
        mode: PassMode,
        cancel: &CancelToken,
        observer: &mut O,
    ) -> LapseResult<PassReport>
    where
        S: FrameStore + EditHistory,
        P: PixelSource,
        O: PassObserver + ?Sized,
    {
        let clock = PassClock::start();
        let selection = store.selection();

        if selection.len() < 2 {
            let advisory = PassAdvisory::EmptyCollection {
                selected: selection.len(),
            };
            warn!("{advisory}");
            let mut report = PassReport::empty(mode, selection.len());
            report.advisory = Some(advisory);
            observer.pass_finished(&report);
            return Ok(report);
        }

        info!(?mode, frames = selection.len(), "Starting timelapse pass");

        let (frames, mut issues) = materialize(store, &selection);
        let mut cursor = PassCursor::new(&frames, mode);
        let mut throttle = RateController::every_ms(self.redraw_interval_ms);

        for i in 0..frames.len() {
            if cancel.is_cancelled() {
                info!(done = i, total = frames.len(), "Timelapse pass cancelled");
                let mut report = PassReport::empty(mode, selection.len());
                report.cancelled = true;
                report.issues = issues;
                report.elapsed_ms = clock.elapsed_ms();
                observer.pass_finished(&report);
                return Ok(report);
            }

            if let Some(issue) = cursor.resolve(i, sampler) {
                issues.push(issue);
            }
            cursor.advance(i, observer);

            if throttle.should_tick(clock.elapsed_ns()) {
                observer.progress(i + 1, frames.len());
            }
        }

        let corrections = cursor.finish();
        flush(store, &corrections, mode)?;

        let report = PassReport {
            mode,
            frames: selection.len(),
            keyframes: corrections.iter().filter(|c| c.is_keyframe).count(),
            missed_frames: issues.len(),
            issues,
            advisory: None,
            cancelled: false,
            elapsed_ms: clock.elapsed_ms(),
            corrections,
        };

        info!(
            keyframes = report.keyframes,
            missed = report.missed_frames,
            elapsed_ms = report.elapsed_ms,
            "Timelapse pass finished"
        );
        observer.progress(frames.len(), frames.len());
        observer.pass_finished(&report);
        Ok(report)
    }

    /// Clear brightness and keyframe flags for every selected frame.
    ///
    /// Returns the number of frames reset.
    pub fn reset<S: FrameStore>(&self, store: &mut S) -> LapseResult<usize> {
        let selection = store.selection();
        for id in &selection {
            store.reset_analysis(*id)?;
        }
        info!(frames = selection.len(), "Reset timelapse analysis");
        Ok(selection.len())
    }
}

/// Build read-only frames for the selection. Unknown ids are dropped.
fn materialize<S: FrameStore>(store: &S, selection: &[FrameId]) -> (Vec<Frame>, Vec<FrameIssue>) {
    let mut frames = Vec::with_capacity(selection.len());
    let mut issues = vec![];

    for &id in selection {
        match store.capture(id) {
            Some(capture) => frames.push(Frame {
                order: frames.len(),
                id,
                capture,
                stored_brightness: store.brightness(id).filter(|b| *b >= 0.0),
            }),
            None => {
                warn!(frame = id, "Selected frame not found in store");
                issues.push(FrameIssue::UnknownFrame { id });
            }
        }
    }
    (frames, issues)
}

/// Write results back in sequence order.
fn flush<S: FrameStore + EditHistory>(
    store: &mut S,
    corrections: &[FrameCorrection],
    mode: PassMode,
) -> LapseResult<()> {
    for c in corrections {
        store.store_analysis(
            c.id,
            FrameAnalysis {
                brightness: c.brightness.unwrap_or(BRIGHTNESS_UNKNOWN),
                is_keyframe: c.is_keyframe,
                exposure_correction: c.exposure_correction,
            },
        )?;
        if mode == PassMode::Equalize {
            store.record_exposure(c.id, &ExposureParams::from_correction(c.exposure_correction))?;
        }
    }
    Ok(())
}

/// Mutable state of one pass over the materialized frames.
struct PassCursor<'f> {
    frames: &'f [Frame],
    mode: PassMode,
    brightness: Vec<Option<f64>>,
    light: Vec<Option<f64>>,
    keyframe: Vec<bool>,
    correction: Vec<f64>,
    run_start: usize,
    /// Accumulated correction of all changes closed so far.
    offset: f64,
}

impl<'f> PassCursor<'f> {
    fn new(frames: &'f [Frame], mode: PassMode) -> Self {
        let n = frames.len();
        Self {
            frames,
            mode,
            brightness: vec![None; n],
            light: vec![None; n],
            keyframe: vec![false; n],
            correction: vec![0.0; n],
            run_start: 0,
            offset: 0.0,
        }
    }

    /// Resolve brightness and light value of frame `i`.
    fn resolve<P: PixelSource>(
        &mut self,
        i: usize,
        sampler: &BrightnessSampler<'_, P>,
    ) -> Option<FrameIssue> {
        let frames = self.frames;
        let frame = &frames[i];

        let brightness = match frame.stored_brightness {
            Some(b) => b,
            None => match sampler.sample(frame.id) {
                Ok(b) => {
                    trace!(frame = frame.id, brightness = b, "Sampled brightness");
                    b
                }
                Err(issue) => {
                    debug!(frame = frame.id, "Brightness unavailable, will retry later");
                    return Some(issue);
                }
            },
        };
        self.brightness[i] = Some(brightness);

        match frame.capture.light_value() {
            Some(lw) => {
                self.light[i] = Some(lw);
                None
            }
            None => {
                warn!(
                    frame = frame.id,
                    exposure_time = frame.capture.exposure_time,
                    aperture = frame.capture.aperture,
                    "Malformed capture metadata, skipping EV comparison"
                );
                Some(FrameIssue::MalformedMetadata {
                    id: frame.id,
                    reason: format!(
                        "exposure time {} / aperture {}",
                        frame.capture.exposure_time, frame.capture.aperture
                    ),
                })
            }
        }
    }

    /// Detect a setting change ending at `i` and close finished runs.
    fn advance<O: PassObserver + ?Sized>(&mut self, i: usize, observer: &mut O) {
        if i > 0 && self.frames[i - 1].capture.differs_from(&self.frames[i].capture) {
            self.keyframe[i - 1] = true;
            self.keyframe[i] = true;

            let shift = match (self.light[i - 1], self.light[i]) {
                (Some(before), Some(after)) => light_shift(before, after),
                _ => {
                    debug!(
                        from = self.frames[i - 1].id,
                        to = self.frames[i].id,
                        "Change next to an excluded frame, no shift"
                    );
                    0.0
                }
            };
            debug!(
                from = self.frames[i - 1].id,
                to = self.frames[i].id,
                shift,
                "Capture settings changed"
            );
            self.close_run(Run::new(self.run_start, i), shift, observer);
        } else if i + 1 == self.frames.len() && i > self.run_start {
            self.close_run(Run::new(self.run_start, i), 0.0, observer);
        }
    }

    /// Ramp `shift` over `run` on top of the accumulated offset.
    ///
    /// The leading frame keeps its value; it closed the previous run.
    fn close_run<O: PassObserver + ?Sized>(&mut self, run: Run, shift: f64, observer: &mut O) {
        self.run_start = run.trail;
        if self.mode != PassMode::Equalize {
            return;
        }

        let base = self.offset;
        if shift != 0.0 {
            debug!(
                lead = self.frames[run.lead].id,
                trail = self.frames[run.trail].id,
                frames = run.frame_count(),
                shift,
                base,
                "Ramping exposure"
            );
        }
        for (pos, value) in run.ramp(shift) {
            self.assign(pos, base + value, observer);
        }
        self.offset = base + shift;
        self.assign(run.trail, self.offset, observer);
    }

    fn assign<O: PassObserver + ?Sized>(&mut self, pos: usize, value: f64, observer: &mut O) {
        self.correction[pos] = value;
        observer.correction_assigned(self.frames[pos].id, value);
    }

    fn finish(self) -> Vec<FrameCorrection> {
        self.frames
            .iter()
            .enumerate()
            .map(|(i, frame)| FrameCorrection {
                order: frame.order,
                id: frame.id,
                brightness: self.brightness[i],
                is_keyframe: self.keyframe[i],
                exposure_correction: self.correction[i],
            })
            .collect()
    }
}
