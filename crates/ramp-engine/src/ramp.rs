//! Runs and the linear exposure ramp.
//!
//! A run is the contiguous span of frames from the previous boundary up to
//! and including the frame where capture settings change. The shift across
//! that change is spread over the run: the changed frame receives all of it
//! and the frames before it a linearly increasing share.

/// Inclusive span of sequence positions `lead..=trail`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Run {
    pub lead: usize,
    pub trail: usize,
}

impl Run {
    pub fn new(lead: usize, trail: usize) -> Self {
        debug_assert!(lead <= trail);
        Self { lead, trail }
    }

    /// Number of frames in the run, endpoints included.
    pub fn frame_count(&self) -> usize {
        self.trail - self.lead + 1
    }

    /// Sequence positions strictly between the endpoints.
    pub fn interior(&self) -> std::ops::Range<usize> {
        (self.lead + 1)..self.trail.max(self.lead + 1)
    }

    /// Ramp values for the interior positions as `(position, correction)`.
    ///
    /// The interior frame at rank `k` (1-based from the leading endpoint)
    /// gets `shift * k / len`, which stays below the full shift; the
    /// trailing endpoint itself is assigned the exact shift by the caller.
    pub fn ramp(&self, shift: f64) -> impl Iterator<Item = (usize, f64)> {
        let (lead, len) = (self.lead, self.frame_count());
        self.interior()
            .map(move |pos| (pos, ramp_value(shift, pos - lead, len)))
    }
}

/// Share of `shift` for rank `k` in a run of `run_len` frames.
///
/// Runs of one frame carry no ramp.
pub fn ramp_value(shift: f64, k: usize, run_len: usize) -> f64 {
    if run_len <= 1 {
        return 0.0;
    }
    shift * k as f64 / run_len as f64
}

/// Exposure shift across a setting change: `LW(before) - LW(after)`.
///
/// Positive when the light value dropped, so the later frame is boosted.
pub fn light_shift(before: f64, after: f64) -> f64 {
    before - after
}
