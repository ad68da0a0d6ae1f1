//! Timelapse view: owns the collection while active and serializes passes.
//!
//! Commands are queued with [`TimelapseView::post`] and drained by
//! [`TimelapseView::process_pending`], or run directly with
//! [`TimelapseView::execute`]. The store sits behind a mutex so at most one
//! pass touches it at a time; a second caller gets [`ViewError::Busy`]
//! instead of waiting.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, TryLockError};

use tracing::{debug, info};

use lapse_common::AppConfig;

use crate::engine::{CancelToken, PassMode, PassObserver, PassReport, RampEngine};
use crate::error::ViewError;
use crate::mipmap::{PixelSource, PreviewSize};
use crate::sampler::BrightnessSampler;
use crate::store::{EditHistory, FrameStore};

/// Requests accepted by the view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewCommand {
    /// Clear brightness and keyframe flags of the whole selection.
    Reset,
    Initialize,
    Equalize,
}

impl ViewCommand {
    fn pass_mode(self) -> Option<PassMode> {
        match self {
            Self::Reset => None,
            Self::Initialize => Some(PassMode::Initialize),
            Self::Equalize => Some(PassMode::Equalize),
        }
    }
}

/// Result of one executed command.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewOutcome {
    Reset { frames: usize },
    Pass(PassReport),
}

pub struct TimelapseView<S, P> {
    store: Mutex<S>,
    pixels: P,
    engine: RampEngine,
    target: PreviewSize,
    queue: Mutex<VecDeque<ViewCommand>>,
    active: AtomicBool,
    cancel: CancelToken,
    last_pass: Mutex<Option<(PassMode, bool)>>,
}

impl<S, P> TimelapseView<S, P>
where
    S: FrameStore + EditHistory,
    P: PixelSource,
{
    pub fn new(store: S, pixels: P, config: &AppConfig) -> Self {
        Self {
            store: Mutex::new(store),
            pixels,
            engine: RampEngine::new(&config.progress),
            target: PreviewSize::new(config.sampler.preview_width, config.sampler.preview_height),
            queue: Mutex::new(VecDeque::new()),
            active: AtomicBool::new(false),
            cancel: CancelToken::new(),
            last_pass: Mutex::new(None),
        }
    }

    /// Start accepting commands. Clears a cancellation left by [`Self::leave`].
    pub fn enter(&self) {
        self.cancel.reset();
        self.active.store(true, Ordering::SeqCst);
        debug!("Entered timelapse view");
    }

    /// Stop accepting commands. Pending commands are dropped and a
    /// running pass is asked to stop at its next frame boundary.
    pub fn leave(&self) {
        self.active.store(false, Ordering::SeqCst);
        let dropped = {
            let mut queue = lock(&self.queue);
            let n = queue.len();
            queue.clear();
            n
        };
        self.cancel.cancel();
        debug!(dropped, "Left timelapse view");
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Queue a command for [`Self::process_pending`].
    pub fn post(&self, command: ViewCommand) -> Result<(), ViewError> {
        if !self.is_active() {
            return Err(ViewError::Inactive);
        }
        lock(&self.queue).push_back(command);
        Ok(())
    }

    pub fn pending(&self) -> usize {
        lock(&self.queue).len()
    }

    /// Execute queued commands in posting order.
    ///
    /// Stops at the first failing command; later commands stay queued.
    pub fn process_pending<O>(&self, observer: &mut O) -> Result<Vec<ViewOutcome>, ViewError>
    where
        O: PassObserver + ?Sized,
    {
        let mut outcomes = vec![];
        loop {
            let Some(command) = lock(&self.queue).pop_front() else {
                break;
            };
            match self.execute(command, observer) {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => {
                    lock(&self.queue).push_front(command);
                    return Err(e);
                }
            }
        }
        Ok(outcomes)
    }

    /// Run one command now.
    ///
    /// A cancellation requested before the pass starts applies to it. The
    /// token is cleared once the pass returns.
    pub fn execute<O>(&self, command: ViewCommand, observer: &mut O) -> Result<ViewOutcome, ViewError>
    where
        O: PassObserver + ?Sized,
    {
        if !self.is_active() {
            return Err(ViewError::Inactive);
        }
        let mut store = match self.store.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::WouldBlock) => return Err(ViewError::Busy),
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
        };

        let Some(mode) = command.pass_mode() else {
            let frames = self.engine.reset(&mut *store)?;
            *lock(&self.last_pass) = None;
            return Ok(ViewOutcome::Reset { frames });
        };

        let sampler = BrightnessSampler::new(&self.pixels, self.target);
        let result = self
            .engine
            .run(&mut *store, &sampler, mode, &self.cancel, observer);
        self.cancel.reset();
        let report = result?;

        *lock(&self.last_pass) = Some((mode, report.should_retry()));
        Ok(ViewOutcome::Pass(report))
    }

    /// Re-run the last pass if it left retryable frames behind.
    ///
    /// Returns `Ok(None)` when there is nothing to retry.
    pub fn retry_incomplete<O>(&self, observer: &mut O) -> Result<Option<ViewOutcome>, ViewError>
    where
        O: PassObserver + ?Sized,
    {
        let Some((mode, true)) = *lock(&self.last_pass) else {
            return Ok(None);
        };
        info!(?mode, "Retrying incomplete timelapse pass");
        let command = match mode {
            PassMode::Initialize => ViewCommand::Initialize,
            PassMode::Equalize => ViewCommand::Equalize,
        };
        self.execute(command, observer).map(Some)
    }

    /// Handle for cancelling a running pass from another thread.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Pixel provider, for loading previews while the view is alive.
    pub fn pixels(&self) -> &P {
        &self.pixels
    }

    /// Read or modify the store outside of a pass.
    pub fn with_store<R>(&self, f: impl FnOnce(&mut S) -> R) -> R {
        f(&mut lock(&self.store))
    }

    pub fn into_store(self) -> S {
        self.store
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::NoopObserver;
    use crate::mipmap::{ColorSpace, MipmapCache, PreviewBuffer};
    use lapse_frame_model::{CaptureSettings, Catalog, ImageRecord};

    fn view(settings: &[(f64, f64, f64)]) -> TimelapseView<Catalog, MipmapCache> {
        let mut catalog = Catalog::new("view");
        for (i, &(exp, ap, iso)) in settings.iter().enumerate() {
            catalog.push_image(ImageRecord::new(
                0,
                format!("{i}.jpg"),
                CaptureSettings::new(exp, ap, iso),
            ));
        }
        TimelapseView::new(catalog, MipmapCache::new(), &AppConfig::default())
    }

    fn load_previews(view: &TimelapseView<Catalog, MipmapCache>) {
        let ids = view.with_store(|c| c.selection.clone());
        for id in ids {
            let pixels = [60, 60, 60, 255].repeat(400 * 300);
            let buffer = PreviewBuffer::new(400, 300, ColorSpace::Srgb, pixels).unwrap();
            view.pixels().insert_pyramid(id, buffer, 64);
        }
    }

    #[test]
    fn test_commands_require_active_view() {
        let view = view(&[(0.01, 4.0, 100.0), (0.02, 4.0, 100.0)]);
        assert!(matches!(
            view.post(ViewCommand::Initialize),
            Err(ViewError::Inactive)
        ));
        assert!(matches!(
            view.execute(ViewCommand::Equalize, &mut NoopObserver),
            Err(ViewError::Inactive)
        ));
    }

    #[test]
    fn test_queue_runs_in_order() {
        let view = view(&[(0.01, 4.0, 100.0), (0.02, 4.0, 100.0)]);
        load_previews(&view);
        view.enter();
        view.post(ViewCommand::Equalize).unwrap();
        view.post(ViewCommand::Reset).unwrap();
        assert_eq!(view.pending(), 2);

        let outcomes = view.process_pending(&mut NoopObserver).unwrap();
        assert_eq!(outcomes.len(), 2);
        assert!(matches!(&outcomes[0], ViewOutcome::Pass(r) if r.keyframes == 2));
        assert_eq!(outcomes[1], ViewOutcome::Reset { frames: 2 });
        assert_eq!(view.pending(), 0);

        let catalog = view.into_store();
        assert!(catalog.images.iter().all(|r| !r.timelapse_keyframe));
        assert!((catalog.images[1].exposure_correction - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_second_pass_is_busy() {
        let view = view(&[(0.01, 4.0, 100.0), (0.02, 4.0, 100.0)]);
        view.enter();
        let result = view.with_store(|_| view.execute(ViewCommand::Initialize, &mut NoopObserver));
        assert!(matches!(result, Err(ViewError::Busy)));
    }

    #[test]
    fn test_failed_command_stays_queued() {
        let view = view(&[(0.01, 4.0, 100.0), (0.02, 4.0, 100.0)]);
        view.enter();
        view.post(ViewCommand::Initialize).unwrap();
        let result = view.with_store(|_| view.process_pending(&mut NoopObserver));
        assert!(matches!(result, Err(ViewError::Busy)));
        assert_eq!(view.pending(), 1);
    }

    #[test]
    fn test_leave_drops_pending_commands() {
        let view = view(&[(0.01, 4.0, 100.0), (0.02, 4.0, 100.0)]);
        view.enter();
        view.post(ViewCommand::Initialize).unwrap();
        view.leave();
        assert!(!view.is_active());
        assert_eq!(view.pending(), 0);
        assert!(view.cancel_token().is_cancelled());

        view.enter();
        assert!(!view.cancel_token().is_cancelled());
    }

    #[test]
    fn test_cancel_before_execute_stops_that_pass() {
        let view = view(&[(0.01, 4.0, 100.0), (0.02, 4.0, 100.0)]);
        load_previews(&view);
        view.enter();

        view.cancel_token().cancel();
        let outcome = view.execute(ViewCommand::Equalize, &mut NoopObserver).unwrap();
        let ViewOutcome::Pass(report) = outcome else {
            panic!("expected a pass report");
        };
        assert!(report.cancelled);
        assert!(view.with_store(|c| c.images.iter().all(|r| !r.timelapse_keyframe)));
        assert!(!view.cancel_token().is_cancelled());

        let outcome = view.execute(ViewCommand::Equalize, &mut NoopObserver).unwrap();
        let ViewOutcome::Pass(report) = outcome else {
            panic!("expected a pass report");
        };
        assert!(!report.cancelled);
        assert!(report.is_complete());
        assert_eq!(report.keyframes, 2);
    }

    #[test]
    fn test_retry_picks_up_late_previews() {
        let view = view(&[(0.01, 4.0, 100.0), (0.02, 4.0, 100.0)]);
        view.enter();

        let first = view.execute(ViewCommand::Equalize, &mut NoopObserver).unwrap();
        let ViewOutcome::Pass(report) = first else {
            panic!("expected a pass report");
        };
        assert_eq!(report.missed_frames, 2);

        load_previews(&view);
        let retried = view.retry_incomplete(&mut NoopObserver).unwrap();
        let Some(ViewOutcome::Pass(report)) = retried else {
            panic!("expected a retry");
        };
        assert!(report.is_complete());
        assert!((report.corrections[1].exposure_correction - 1.0).abs() < 1e-9);

        assert!(view.retry_incomplete(&mut NoopObserver).unwrap().is_none());
    }
}
