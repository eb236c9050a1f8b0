//! Zero-load baseline estimation.
//!
//! Tactile arrays rest at a nonzero raw count, and the resting level
//! drifts between mounts and sessions. Everything downstream works on
//! the delta above a learned per-taxel baseline, so baseline quality
//! bounds calibration quality.
//!
//! Two policies are supported:
//!
//! - **Low-load median** (offline, with a paired reference-force
//!   signal): the frames with the lowest reference force are selected
//!   by a full ascending sort, and the baseline is the elementwise
//!   median over that window. Robust to transient contact at the
//!   start or end of a recording.
//! - **First valid sample** (live, no reference): each channel's
//!   baseline is its first decodable raw matrix. Available
//!   immediately, at the cost of statistical robustness.

use ndarray::Array2;
use std::cmp::Ordering;
use std::collections::BTreeMap;

use gripmap_core::{Error, Result, SensorLayout};

use crate::frame::{reshape, TouchFrame};

/// Minimum paired samples for any reference-guided estimate or fit
pub const MIN_CALIBRATION_SAMPLES: usize = 5;

/// Bounds the low-load window fraction is clamped into
pub const BASELINE_FRACTION_BOUNDS: (f64, f64) = (0.05, 0.8);

/// Learned zero-load readings, one matrix per channel.
///
/// Entries are captured once and never overwritten; re-baselining
/// means clearing the whole object.
#[derive(Debug, Clone, Default)]
pub struct Baseline {
    channels: BTreeMap<String, Array2<f64>>,

    /// Reference-force level at zero load, grams. Zero for baselines
    /// captured live without a load cell.
    pub force_g: f64,

    /// Number of frames that contributed samples
    pub frames_used: usize,
}

impl Baseline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str) -> Option<&Array2<f64>> {
        self.channels.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.channels.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    pub fn channels(&self) -> impl Iterator<Item = (&String, &Array2<f64>)> {
        self.channels.iter()
    }

    /// Add a channel baseline. Existing entries win; the zero-load
    /// reading for a channel is fixed for the life of the baseline.
    pub fn insert(&mut self, id: impl Into<String>, matrix: Array2<f64>) {
        self.channels.entry(id.into()).or_insert(matrix);
    }

    /// Capture baselines for any declared channel this frame carries a
    /// valid sample for and that has none yet. Returns the number of
    /// channels captured.
    ///
    /// This is the live seeding policy: on the frame that captures a
    /// channel, that channel's delta is zero by construction.
    pub fn absorb_first_valid(&mut self, frame: &TouchFrame, layout: &SensorLayout) -> usize {
        let mut captured = 0;
        for (id, values) in &frame.channels {
            if self.channels.contains_key(id) {
                continue;
            }
            let Some(spec) = layout.get(id) else {
                continue;
            };
            match reshape(id, values, spec.shape()) {
                Ok(matrix) => {
                    self.channels.insert(id.clone(), matrix);
                    captured += 1;
                }
                Err(_) => {
                    tracing::debug!("channel {} invalid at capture, waiting for a valid sample", id);
                }
            }
        }
        if captured > 0 {
            self.frames_used += 1;
        }
        captured
    }

    pub fn clear(&mut self) {
        self.channels.clear();
        self.force_g = 0.0;
        self.frames_used = 0;
    }
}

/// Computes a [`Baseline`] from a frame sequence.
#[derive(Debug, Clone, Copy)]
pub struct BaselineEstimator {
    /// Fraction of the lowest-force frames used as the zero-load
    /// window, clamped to [`BASELINE_FRACTION_BOUNDS`]
    pub baseline_fraction: f64,
}

impl Default for BaselineEstimator {
    fn default() -> Self {
        Self {
            baseline_fraction: 0.2,
        }
    }
}

impl BaselineEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fraction(mut self, fraction: f64) -> Self {
        self.baseline_fraction = fraction;
        self
    }

    /// Estimate a baseline over `frames`.
    ///
    /// With `reference` supplied, frames and reference are paired by
    /// index, truncated to the shorter of the two, and the low-load
    /// median policy applies; at least [`MIN_CALIBRATION_SAMPLES`]
    /// pairs are required. Without it, each channel takes its first
    /// valid sample.
    pub fn estimate(
        &self,
        frames: &[TouchFrame],
        reference: Option<&[f64]>,
        layout: &SensorLayout,
    ) -> Result<Baseline> {
        match reference {
            Some(forces) => self.estimate_low_load(frames, forces, layout),
            None => Ok(self.first_valid(frames, layout)),
        }
    }

    fn estimate_low_load(
        &self,
        frames: &[TouchFrame],
        reference: &[f64],
        layout: &SensorLayout,
    ) -> Result<Baseline> {
        let n = frames.len().min(reference.len());
        if n < MIN_CALIBRATION_SAMPLES {
            return Err(Error::InsufficientData {
                required: MIN_CALIBRATION_SAMPLES,
                available: n,
            });
        }

        let (selected, _) = low_load_selection(&reference[..n], self.baseline_fraction);

        let mut baseline = Baseline::new();
        baseline.frames_used = selected.len();

        let forces: Vec<f64> = selected.iter().map(|&i| reference[i]).collect();
        baseline.force_g = median_of(&forces);

        for spec in layout.channels() {
            let samples: Vec<Array2<f64>> = selected
                .iter()
                .filter_map(|&i| frames[i].sample(&spec.id))
                .filter_map(|values| reshape(&spec.id, values, spec.shape()).ok())
                .collect();

            if samples.is_empty() {
                tracing::debug!(
                    "channel {} has no valid sample in the low-load window, omitted",
                    spec.id
                );
                continue;
            }

            let mut matrix = Array2::zeros(spec.shape());
            let mut cell = Vec::with_capacity(samples.len());
            for (idx, value) in matrix.iter_mut().enumerate() {
                cell.clear();
                for sample in &samples {
                    // samples share the channel shape, so flat indexing lines up
                    if let Some(v) = sample.as_slice().and_then(|s| s.get(idx)) {
                        cell.push(*v);
                    }
                }
                *value = median_of(&cell);
            }
            baseline.insert(spec.id.clone(), matrix);
        }

        Ok(baseline)
    }

    fn first_valid(&self, frames: &[TouchFrame], layout: &SensorLayout) -> Baseline {
        let mut baseline = Baseline::new();
        for frame in frames {
            baseline.absorb_first_valid(frame, layout);
            if baseline.len() == layout.len() {
                break;
            }
        }
        baseline
    }
}

/// Indices of the lowest-reference frames, ascending by force, plus
/// the clamped fraction actually used. The window holds
/// `max(MIN_CALIBRATION_SAMPLES, floor(fraction * n))` frames, capped
/// at `n`.
pub(crate) fn low_load_selection(reference: &[f64], fraction: f64) -> (Vec<usize>, f64) {
    let n = reference.len();
    let (lo, hi) = BASELINE_FRACTION_BOUNDS;
    let fraction = fraction.clamp(lo, hi);
    let k0 = ((fraction * n as f64) as usize)
        .max(MIN_CALIBRATION_SAMPLES)
        .min(n);

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| {
        reference[a]
            .partial_cmp(&reference[b])
            .unwrap_or(Ordering::Equal)
    });
    order.truncate(k0);
    (order, fraction)
}

/// Median of a slice, averaging the two middle values for even
/// lengths. Returns zero for an empty slice.
pub(crate) fn median_of(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gripmap_core::Region;
    use gripmap_core::{ChannelSpec, SensorLayout};

    fn tiny_layout() -> SensorLayout {
        SensorLayout::from_specs(vec![
            ChannelSpec::new("palm_touch", 1, 2, Region::Palm),
            ChannelSpec::new("fingerfour_tip_touch", 1, 1, Region::IndexTip),
        ])
        .unwrap()
    }

    fn frame(seq: u64, palm: Vec<f64>, tip: Vec<f64>) -> TouchFrame {
        TouchFrame::new(seq)
            .with_channel("palm_touch", palm)
            .with_channel("fingerfour_tip_touch", tip)
    }

    #[test]
    fn test_median() {
        assert_eq!(median_of(&[3.0, 1.0, 2.0]), 2.0);
        assert_eq!(median_of(&[4.0, 1.0, 3.0, 2.0]), 2.5);
        assert_eq!(median_of(&[]), 0.0);
    }

    #[test]
    fn test_low_load_selection_ignores_position() {
        // Lowest forces sit at both ends; selection must find them
        let forces = vec![1.0, 50.0, 60.0, 55.0, 70.0, 52.0, 58.0, 61.0, 2.0, 3.0];
        let (idx, frac) = low_load_selection(&forces, 0.2);
        assert_eq!(frac, 0.2);
        // max(5, floor(0.2 * 10)) = 5 frames
        assert_eq!(idx.len(), 5);
        assert!(idx.contains(&0) && idx.contains(&8) && idx.contains(&9));
    }

    #[test]
    fn test_fraction_clamping() {
        let forces: Vec<f64> = (0..100).map(|i| i as f64).collect();
        let (idx_low, frac_low) = low_load_selection(&forces, 0.001);
        assert_eq!(frac_low, 0.05);
        assert_eq!(idx_low.len(), 5);

        let (idx_high, frac_high) = low_load_selection(&forces, 3.0);
        assert_eq!(frac_high, 0.8);
        assert_eq!(idx_high.len(), 80);
    }

    #[test]
    fn test_estimate_insufficient_data() {
        let layout = tiny_layout();
        let frames: Vec<TouchFrame> = (0..4)
            .map(|i| frame(i, vec![1.0, 2.0], vec![3.0]))
            .collect();
        let forces = vec![0.0, 0.0, 0.0, 0.0];
        let result = BaselineEstimator::new().estimate(&frames, Some(&forces), &layout);
        assert!(matches!(
            result,
            Err(Error::InsufficientData {
                required: 5,
                available: 4
            })
        ));
    }

    #[test]
    fn test_low_load_medians() {
        let layout = tiny_layout();
        // Five low-force frames with known values, five loaded ones
        // whose readings must not leak into the baseline
        let mut frames = Vec::new();
        let mut forces = Vec::new();
        for i in 0..5 {
            frames.push(frame(i, vec![10.0 + i as f64, 20.0], vec![5.0]));
            forces.push(1.0 + i as f64 * 0.1);
        }
        for i in 5..10 {
            frames.push(frame(i, vec![900.0, 900.0], vec![900.0]));
            forces.push(500.0);
        }

        let baseline = BaselineEstimator::new()
            .with_fraction(0.5)
            .estimate(&frames, Some(&forces), &layout)
            .unwrap();

        assert_eq!(baseline.frames_used, 5);
        // median of 1.0..=1.4
        assert!((baseline.force_g - 1.2).abs() < 1e-12);
        let palm = baseline.get("palm_touch").unwrap();
        // median of 10..14 is 12
        assert!((palm[[0, 0]] - 12.0).abs() < 1e-12);
        assert!((palm[[0, 1]] - 20.0).abs() < 1e-12);
        assert!((baseline.get("fingerfour_tip_touch").unwrap()[[0, 0]] - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_first_valid_capture() {
        let layout = tiny_layout();
        let frames = vec![
            // palm sample malformed here, tip valid
            TouchFrame::new(0)
                .with_channel("palm_touch", vec![1.0])
                .with_channel("fingerfour_tip_touch", vec![7.0]),
            frame(1, vec![40.0, 41.0], vec![999.0]),
        ];

        let baseline = BaselineEstimator::new()
            .estimate(&frames, None, &layout)
            .unwrap();

        assert_eq!(baseline.len(), 2);
        assert_eq!(baseline.force_g, 0.0);
        // tip captured from frame 0, palm from frame 1
        assert_eq!(baseline.get("fingerfour_tip_touch").unwrap()[[0, 0]], 7.0);
        assert_eq!(baseline.get("palm_touch").unwrap()[[0, 0]], 40.0);
    }

    #[test]
    fn test_absorb_skips_unknown_and_existing() {
        let layout = tiny_layout();
        let mut baseline = Baseline::new();

        let first = frame(0, vec![1.0, 2.0], vec![3.0]).with_channel("mystery", vec![9.0]);
        assert_eq!(baseline.absorb_first_valid(&first, &layout), 2);
        assert!(!baseline.contains("mystery"));

        // Captured entries never move
        let second = frame(1, vec![100.0, 100.0], vec![100.0]);
        assert_eq!(baseline.absorb_first_valid(&second, &layout), 0);
        assert_eq!(baseline.get("palm_touch").unwrap()[[0, 0]], 1.0);
    }
}
