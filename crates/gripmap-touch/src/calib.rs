//! Force calibration against a reference load cell.
//!
//! Raw tactile counts are unitless. To report grams, the aggregate
//! activation `S = sum(max(touch - baseline, 0))` is regressed against
//! the reference force delta with a least-squares line through the
//! origin. The origin is forced because zero activation above the
//! baseline must mean zero added force, whatever the load cell's own
//! offset is; the offset lives in the baseline force instead.
//!
//! The fitted scale `k` (grams per summed count) plus the baseline
//! force fully describe a calibration and can be saved to JSON for a
//! later monitoring session.

use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use gripmap_core::{Error, Result, NEWTONS_PER_GRAM};

use crate::baseline::{
    low_load_selection, median_of, Baseline, BaselineEstimator, BASELINE_FRACTION_BOUNDS,
    MIN_CALIBRATION_SAMPLES,
};
use crate::frame::TouchFrame;

/// Below this summed squared activation the regression has no signal
/// to fit and the calibration is rejected
pub const ENERGY_EPS: f64 = 1e-12;

/// Knobs for [`ScaleCalibrator`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CalibrationOptions {
    /// Fraction of the lowest-force samples treated as zero-load
    pub baseline_fraction: f64,

    /// Per-taxel deltas must exceed this many counts to enter `S`.
    /// Zero keeps every positive delta.
    pub dead_zone: f64,
}

impl Default for CalibrationOptions {
    fn default() -> Self {
        Self {
            baseline_fraction: 0.2,
            dead_zone: 0.0,
        }
    }
}

impl CalibrationOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_baseline_fraction(mut self, fraction: f64) -> Self {
        self.baseline_fraction = fraction;
        self
    }

    pub fn with_dead_zone(mut self, dead_zone: f64) -> Self {
        self.dead_zone = dead_zone;
        self
    }

    /// Baseline estimator matching these options.
    pub fn estimator(&self) -> BaselineEstimator {
        BaselineEstimator::new().with_fraction(self.baseline_fraction)
    }
}

/// Output of a calibration fit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationResult {
    /// Paired samples that entered the regression
    pub samples: usize,

    /// Frames in the zero-load window
    pub baseline_frames: usize,

    /// Window fraction actually used, after clamping
    pub baseline_fraction: f64,

    /// Reference force at zero load, grams
    pub force_baseline_g: f64,

    /// Grams per summed activation count
    pub scale_g_per_count: f64,

    /// Coefficient of determination of the fit. `None` when the
    /// reference force never moved, which makes the statistic
    /// meaningless rather than zero.
    pub r_squared: Option<f64>,
}

impl CalibrationResult {
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = File::create(path)?;
        serde_json::to_writer_pretty(BufWriter::new(file), self)?;
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }
}

impl fmt::Display for CalibrationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Calibration Result ===")?;
        writeln!(f, "samples_used: {}", self.samples)?;
        writeln!(
            f,
            "baseline_frames: {} (lowest {:.1}% by force)",
            self.baseline_frames,
            self.baseline_fraction * 100.0
        )?;
        writeln!(f, "force_baseline_g (F0): {:.4}", self.force_baseline_g)?;
        writeln!(
            f,
            "k_g_per_countsum (scale factor): {:.8}",
            self.scale_g_per_count
        )?;
        match self.r_squared {
            Some(r2) => writeln!(f, "R2 (delta force vs S): {:.4}", r2)?,
            None => writeln!(f, "R2 (delta force vs S): nan")?,
        }
        writeln!(f)?;
        writeln!(f, "Equation:")?;
        writeln!(f, "Let S = sum(max(touch - touch_baseline, 0))")?;
        writeln!(f, "delta_force_g ≈ {:.8} * S", self.scale_g_per_count)?;
        writeln!(f, "force_g ≈ {:.4} + delta_force_g", self.force_baseline_g)?;
        write!(f, "force_N ≈ force_g * {}", NEWTONS_PER_GRAM)
    }
}

/// Fits the gram-per-count scale from paired touch and force data.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScaleCalibrator {
    pub options: CalibrationOptions,
}

impl ScaleCalibrator {
    pub fn new(options: CalibrationOptions) -> Self {
        Self { options }
    }

    /// Fit against decoded frames and an already-estimated baseline.
    ///
    /// Frames and reference are paired by index and truncated to the
    /// shorter of the two. Channels absent from the baseline, or whose
    /// sample length disagrees with it, are left out of `S` for that
    /// frame.
    pub fn fit(
        &self,
        reference: &[f64],
        frames: &[TouchFrame],
        baseline: &Baseline,
    ) -> Result<CalibrationResult> {
        let n = reference.len().min(frames.len());
        if n < MIN_CALIBRATION_SAMPLES {
            return Err(Error::InsufficientData {
                required: MIN_CALIBRATION_SAMPLES,
                available: n,
            });
        }

        let f0 = baseline.force_g;
        let mut s = Vec::with_capacity(n);
        let mut df = Vec::with_capacity(n);
        for i in 0..n {
            df.push((reference[i] - f0).max(0.0));
            s.push(frame_feature(&frames[i], baseline, self.options.dead_zone));
        }

        let (scale, r_squared) = fit_through_origin(&s, &df)?;
        let (lo, hi) = BASELINE_FRACTION_BOUNDS;
        Ok(CalibrationResult {
            samples: n,
            baseline_frames: baseline.frames_used,
            baseline_fraction: self.options.baseline_fraction.clamp(lo, hi),
            force_baseline_g: f0,
            scale_g_per_count: scale,
            r_squared,
        })
    }

    /// Fit directly from a numeric table: one force value and one row
    /// of flattened touch counts per sample. Baseline selection and
    /// per-column medians happen inline, so this is the whole offline
    /// procedure in one call.
    pub fn fit_table(&self, force: &[f64], touch: &Array2<f64>) -> Result<CalibrationResult> {
        let n = force.len().min(touch.nrows());
        if n < MIN_CALIBRATION_SAMPLES {
            return Err(Error::InsufficientData {
                required: MIN_CALIBRATION_SAMPLES,
                available: n,
            });
        }
        let force = &force[..n];

        let (selected, fraction) = low_load_selection(force, self.options.baseline_fraction);

        let cols = touch.ncols();
        let mut t0 = vec![0.0; cols];
        let mut column = Vec::with_capacity(selected.len());
        for (j, slot) in t0.iter_mut().enumerate() {
            column.clear();
            for &i in &selected {
                column.push(touch[[i, j]]);
            }
            *slot = median_of(&column);
        }

        let selected_force: Vec<f64> = selected.iter().map(|&i| force[i]).collect();
        let f0 = median_of(&selected_force);

        let mut s = Vec::with_capacity(n);
        let mut df = Vec::with_capacity(n);
        for i in 0..n {
            df.push((force[i] - f0).max(0.0));
            let mut row_sum = 0.0;
            for j in 0..cols {
                let d = touch[[i, j]] - t0[j];
                if d > self.options.dead_zone {
                    row_sum += d;
                }
            }
            s.push(row_sum);
        }

        let (scale, r_squared) = fit_through_origin(&s, &df)?;
        Ok(CalibrationResult {
            samples: n,
            baseline_frames: selected.len(),
            baseline_fraction: fraction,
            force_baseline_g: f0,
            scale_g_per_count: scale,
            r_squared,
        })
    }
}

/// Summed baseline-subtracted activation of one frame. Deltas must
/// strictly exceed the dead zone to count.
fn frame_feature(frame: &TouchFrame, baseline: &Baseline, dead_zone: f64) -> f64 {
    let mut total = 0.0;
    for (id, values) in &frame.channels {
        let Some(base) = baseline.get(id) else {
            continue;
        };
        if values.len() != base.len() {
            continue;
        }
        for (v, b) in values.iter().zip(base.iter()) {
            let d = v - b;
            if d > dead_zone {
                total += d;
            }
        }
    }
    total
}

/// Least squares through the origin: `k = sum(s * df) / sum(s^2)`.
fn fit_through_origin(s: &[f64], df: &[f64]) -> Result<(f64, Option<f64>)> {
    let energy: f64 = s.iter().map(|v| v * v).sum();
    if energy < ENERGY_EPS {
        return Err(Error::DegenerateFit { energy });
    }
    let cross: f64 = s.iter().zip(df).map(|(a, b)| a * b).sum();
    let k = cross / energy;

    let mean = df.iter().sum::<f64>() / df.len() as f64;
    let ss_res: f64 = s
        .iter()
        .zip(df)
        .map(|(a, b)| {
            let r = b - k * a;
            r * r
        })
        .sum();
    let ss_tot: f64 = df
        .iter()
        .map(|v| {
            let r = v - mean;
            r * r
        })
        .sum();

    let r_squared = if ss_tot > ENERGY_EPS {
        Some(1.0 - ss_res / ss_tot)
    } else {
        None
    };
    Ok((k, r_squared))
}

#[cfg(test)]
mod tests {
    use super::*;
    use gripmap_core::{ChannelSpec, Region, SensorLayout};
    use ndarray::Array2;

    /// 40-sample table: 10 zero-load rows, then a linear ramp with
    /// S = 2 * delta_force, so the true scale is 0.5 g per count.
    fn ramp_table() -> (Vec<f64>, Array2<f64>) {
        let t0 = [100.0, 200.0, 300.0];
        let shares = [0.5, 0.3, 0.2];
        let mut force = Vec::new();
        let mut rows = Vec::new();
        for i in 0..40 {
            let load = if i < 10 { 0.0 } else { (i - 9) as f64 * 25.0 };
            force.push(2.0 + load);
            for j in 0..3 {
                rows.push(t0[j] + load * 2.0 * shares[j]);
            }
        }
        let touch = Array2::from_shape_vec((40, 3), rows).unwrap();
        (force, touch)
    }

    #[test]
    fn test_fit_table_recovers_scale() {
        let (force, touch) = ramp_table();
        let result = ScaleCalibrator::default().fit_table(&force, &touch).unwrap();

        assert_eq!(result.samples, 40);
        // max(5, floor(0.2 * 40)) = 8 zero-load frames
        assert_eq!(result.baseline_frames, 8);
        assert!((result.force_baseline_g - 2.0).abs() < 1e-12);
        assert!((result.scale_g_per_count - 0.5).abs() < 1e-9);
        assert!(result.r_squared.unwrap() > 0.999999);
    }

    #[test]
    fn test_fit_table_degenerate() {
        // Force moves but the array never does
        let force: Vec<f64> = (0..20).map(|i| i as f64 * 10.0).collect();
        let touch = Array2::from_elem((20, 4), 150.0);
        let result = ScaleCalibrator::default().fit_table(&force, &touch);
        assert!(matches!(result, Err(Error::DegenerateFit { .. })));
    }

    #[test]
    fn test_fit_table_insufficient() {
        let force = vec![0.0; 4];
        let touch = Array2::from_elem((4, 2), 1.0);
        let result = ScaleCalibrator::default().fit_table(&force, &touch);
        assert!(matches!(
            result,
            Err(Error::InsufficientData {
                required: 5,
                available: 4
            })
        ));
    }

    #[test]
    fn test_dead_zone_is_strict() {
        // Loaded rows carry deltas of exactly 5 and 15 counts; with a
        // dead zone of 5 only the 15 survives
        let mut force = vec![0.0; 8];
        let mut rows = vec![10.0; 16];
        for _ in 0..4 {
            force.push(30.0);
            rows.extend_from_slice(&[15.0, 25.0]);
        }
        let touch = Array2::from_shape_vec((12, 2), rows).unwrap();

        let calibrator =
            ScaleCalibrator::new(CalibrationOptions::new().with_dead_zone(5.0));
        let result = calibrator.fit_table(&force, &touch).unwrap();
        // S = 15 against dF = 30; an inclusive threshold would give 1.5
        assert!((result.scale_g_per_count - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_flat_force_has_no_r2() {
        let force = vec![10.0; 6];
        let mut rows = Vec::new();
        for i in 0..6 {
            rows.push(100.0 + i as f64 * 7.0);
        }
        let touch = Array2::from_shape_vec((6, 1), rows).unwrap();

        let result = ScaleCalibrator::default().fit_table(&force, &touch).unwrap();
        assert_eq!(result.r_squared, None);
        assert_eq!(result.scale_g_per_count, 0.0);
    }

    #[test]
    fn test_fit_with_frames() {
        let layout = SensorLayout::from_specs(vec![
            ChannelSpec::new("a", 1, 1, Region::Palm),
            ChannelSpec::new("b", 1, 1, Region::IndexTip),
        ])
        .unwrap();

        let mut baseline = Baseline::new();
        for spec in layout.channels() {
            baseline.insert(spec.id.clone(), Array2::zeros(spec.shape()));
        }
        baseline.force_g = 2.0;
        baseline.frames_used = 5;

        let mut frames = Vec::new();
        let mut reference = Vec::new();
        for i in 0..6u64 {
            let v = i as f64 * 10.0;
            frames.push(
                TouchFrame::new(i)
                    .with_channel("a", vec![v])
                    .with_channel("b", vec![v / 2.0]),
            );
            reference.push(2.0 + 0.25 * (v + v / 2.0));
        }

        let result = ScaleCalibrator::default()
            .fit(&reference, &frames, &baseline)
            .unwrap();
        assert!((result.scale_g_per_count - 0.25).abs() < 1e-10);
        assert!((result.force_baseline_g - 2.0).abs() < 1e-12);
        assert!(result.r_squared.unwrap() > 0.999999);
    }

    #[test]
    fn test_truncates_to_shorter_input() {
        let (force, touch) = ramp_table();
        let result = ScaleCalibrator::default()
            .fit_table(&force[..25], &touch)
            .unwrap();
        assert_eq!(result.samples, 25);
    }

    #[test]
    fn test_report_format() {
        let result = CalibrationResult {
            samples: 40,
            baseline_frames: 8,
            baseline_fraction: 0.2,
            force_baseline_g: 2.0,
            scale_g_per_count: 0.5,
            r_squared: Some(0.9987),
        };
        let report = result.to_string();
        assert!(report.starts_with("=== Calibration Result ==="));
        assert!(report.contains("samples_used: 40"));
        assert!(report.contains("baseline_frames: 8 (lowest 20.0% by force)"));
        assert!(report.contains("k_g_per_countsum (scale factor): 0.50000000"));
        assert!(report.contains("R2 (delta force vs S): 0.9987"));
        assert!(report.contains("force_N ≈ force_g * 0.00981"));

        let flat = CalibrationResult {
            r_squared: None,
            ..result
        };
        assert!(flat.to_string().contains("R2 (delta force vs S): nan"));
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("calibration.json");

        let result = CalibrationResult {
            samples: 12,
            baseline_frames: 5,
            baseline_fraction: 0.2,
            force_baseline_g: 1.5,
            scale_g_per_count: 0.0842,
            r_squared: Some(0.99),
        };
        result.save(&path).unwrap();

        let loaded = CalibrationResult::load(&path).unwrap();
        assert_eq!(loaded.samples, 12);
        assert!((loaded.scale_g_per_count - 0.0842).abs() < 1e-12);
        assert_eq!(loaded.r_squared, Some(0.99));
    }
}
