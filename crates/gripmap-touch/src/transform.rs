//! Raw counts to calibrated gram maps.
//!
//! Each channel sample is reshaped against its baseline, the baseline
//! is subtracted, negatives are clamped to zero, and the remainder is
//! scaled by the calibrated gram-per-count factor. An optional
//! exponential smoother then blends the new map into the running one.
//!
//! Channels that cannot be converted are never dropped silently; every
//! one comes back as a [`ChannelSkip`] with a typed reason.

use ndarray::Array2;
use std::collections::BTreeMap;

use crate::baseline::Baseline;
use crate::frame::{CalibratedFrame, TouchFrame};

/// Temporal smoothing policy for calibrated maps.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Smoothing {
    /// Every frame replaces the previous map outright
    #[default]
    Disabled,

    /// `smoothed = alpha * new + (1 - alpha) * previous`. Alpha 1.0
    /// behaves like [`Smoothing::Disabled`]; alpha 0.0 freezes the
    /// map at its seed.
    Exponential { alpha: f64 },
}

impl Smoothing {
    /// Exponential smoothing with `alpha` clamped to `[0.0, 1.0]`.
    pub fn exponential(alpha: f64) -> Self {
        Self::Exponential {
            alpha: alpha.clamp(0.0, 1.0),
        }
    }
}

/// Why a channel was left out of a frame's calibrated output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Sample carried no values
    EmptySample,

    /// Sample length disagrees with the baseline shape
    ShapeMismatch { expected: (usize, usize), len: usize },

    /// Channel id is not in the sensor layout
    UnknownChannel,

    /// Channel is declared but no baseline has been captured for it
    NotBaselined,
}

/// One skipped channel in a frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelSkip {
    pub channel: String,
    pub reason: SkipReason,
}

/// Result of transforming one frame: the full calibrated state after
/// the frame was folded in, plus whatever had to be skipped.
#[derive(Debug, Clone)]
pub struct FrameUpdate {
    pub calibrated: CalibratedFrame,
    pub skipped: Vec<ChannelSkip>,
}

/// Settings for [`FrameTransformer`].
#[derive(Debug, Clone, Copy)]
pub struct TransformConfig {
    /// Grams per raw count, from calibration
    pub scale_g_per_count: f64,

    pub smoothing: Smoothing,
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            scale_g_per_count: gripmap_core::REFERENCE_SCALE_G_PER_COUNT,
            smoothing: Smoothing::Disabled,
        }
    }
}

/// Per-channel running gram maps.
///
/// A channel keeps its last map until a new valid sample for it
/// arrives, so a frame that omits a channel leaves that channel's
/// reading in place.
#[derive(Debug, Clone, Default)]
pub struct SmoothedState {
    channels: BTreeMap<String, Array2<f64>>,
}

impl SmoothedState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a new gram map into the running state.
    pub fn apply(&mut self, id: &str, mut delta_g: Array2<f64>, smoothing: Smoothing) {
        match smoothing {
            Smoothing::Disabled => {
                self.channels.insert(id.to_string(), delta_g);
            }
            Smoothing::Exponential { alpha } => match self.channels.get_mut(id) {
                Some(prev) if prev.dim() == delta_g.dim() => {
                    prev.zip_mut_with(&delta_g, |p, &d| *p = alpha * d + (1.0 - alpha) * *p);
                }
                // first sample blends against an implicit zero map
                _ => {
                    delta_g.mapv_inplace(|d| alpha * d);
                    self.channels.insert(id.to_string(), delta_g);
                }
            },
        }
    }

    pub fn get(&self, id: &str) -> Option<&Array2<f64>> {
        self.channels.get(id)
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// All channel maps as a calibrated frame stamped with `seq`.
    pub fn snapshot(&self, seq: u64) -> CalibratedFrame {
        CalibratedFrame {
            seq,
            channels: self.channels.clone(),
        }
    }

    pub fn clear(&mut self) {
        self.channels.clear();
    }
}

/// Applies baseline subtraction, scaling and smoothing to raw frames.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameTransformer {
    pub config: TransformConfig,
}

impl FrameTransformer {
    pub fn new(config: TransformConfig) -> Self {
        Self { config }
    }

    /// Convert one raw frame, folding it into `state`.
    ///
    /// The returned calibrated frame is a snapshot of the whole state,
    /// not only the channels this frame touched.
    pub fn transform(
        &self,
        frame: &TouchFrame,
        baseline: &Baseline,
        state: &mut SmoothedState,
    ) -> FrameUpdate {
        let mut skipped = Vec::new();

        for (id, values) in &frame.channels {
            let Some(base) = baseline.get(id) else {
                skipped.push(ChannelSkip {
                    channel: id.clone(),
                    reason: SkipReason::NotBaselined,
                });
                continue;
            };
            if values.is_empty() {
                skipped.push(ChannelSkip {
                    channel: id.clone(),
                    reason: SkipReason::EmptySample,
                });
                continue;
            }
            if values.len() != base.len() {
                skipped.push(ChannelSkip {
                    channel: id.clone(),
                    reason: SkipReason::ShapeMismatch {
                        expected: base.dim(),
                        len: values.len(),
                    },
                });
                continue;
            }

            let mut delta_g = Array2::zeros(base.dim());
            for ((d, &v), &b) in delta_g.iter_mut().zip(values.iter()).zip(base.iter()) {
                *d = (v - b).max(0.0) * self.config.scale_g_per_count;
            }
            state.apply(id, delta_g, self.config.smoothing);
        }

        FrameUpdate {
            calibrated: state.snapshot(frame.seq),
            skipped,
        }
    }
}
