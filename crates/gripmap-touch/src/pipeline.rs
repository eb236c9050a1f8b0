//! End-to-end frame processing.
//!
//! [`TouchPipeline`] owns everything a live monitoring session needs:
//! the sensor layout, lazily captured baselines, the smoothing state
//! and the region aggregator. Feed it raw frames in arrival order and
//! it hands back one [`FrameReport`] per frame.
//!
//! The first frame that carries a valid sample for a channel becomes
//! that channel's baseline, so the channel reads zero grams on its
//! capture frame and tracks deltas from then on. [`TouchPipeline::reset`]
//! drops all learned state to re-zero the hand between grasps.

use std::collections::BTreeSet;

use gripmap_core::SensorLayout;

use crate::aggregate::{RegionAggregator, RegionSummary};
use crate::baseline::Baseline;
use crate::calib::CalibrationResult;
use crate::frame::{CalibratedFrame, TouchFrame};
use crate::transform::{
    ChannelSkip, FrameTransformer, SkipReason, SmoothedState, Smoothing, TransformConfig,
};

/// Pipeline settings.
#[derive(Debug, Clone, Copy)]
pub struct PipelineConfig {
    /// Grams per raw count
    pub scale_g_per_count: f64,

    pub smoothing: Smoothing,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            scale_g_per_count: gripmap_core::REFERENCE_SCALE_G_PER_COUNT,
            smoothing: Smoothing::Disabled,
        }
    }
}

impl PipelineConfig {
    /// Settings taken from an offline calibration run.
    pub fn from_calibration(calibration: &CalibrationResult) -> Self {
        Self {
            scale_g_per_count: calibration.scale_g_per_count,
            smoothing: Smoothing::Disabled,
        }
    }

    pub fn with_smoothing(mut self, smoothing: Smoothing) -> Self {
        self.smoothing = smoothing;
        self
    }
}

/// Everything derived from one raw frame.
#[derive(Debug, Clone)]
pub struct FrameReport {
    pub seq: u64,

    /// Full calibrated state after this frame
    pub calibrated: CalibratedFrame,

    /// Region totals and peaks over the calibrated state
    pub summary: RegionSummary,

    /// Channels this frame carried that could not be converted
    pub skipped: Vec<ChannelSkip>,
}

/// Stateful raw-frame to region-load processor.
pub struct TouchPipeline {
    layout: SensorLayout,
    config: PipelineConfig,
    transformer: FrameTransformer,
    aggregator: RegionAggregator,
    baseline: Baseline,
    state: SmoothedState,
    warned: BTreeSet<String>,
    frames: u64,
}

impl TouchPipeline {
    pub fn new(layout: SensorLayout, config: PipelineConfig) -> Self {
        let transformer = FrameTransformer::new(TransformConfig {
            scale_g_per_count: config.scale_g_per_count,
            smoothing: config.smoothing,
        });
        Self {
            layout,
            config,
            transformer,
            aggregator: RegionAggregator::new(),
            baseline: Baseline::new(),
            state: SmoothedState::new(),
            warned: BTreeSet::new(),
            frames: 0,
        }
    }

    /// Start from an already-estimated baseline instead of capturing
    /// one from the stream.
    pub fn with_baseline(mut self, baseline: Baseline) -> Self {
        self.baseline = baseline;
        self
    }

    pub fn layout(&self) -> &SensorLayout {
        &self.layout
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn baseline(&self) -> &Baseline {
        &self.baseline
    }

    /// True once every declared channel has a baseline.
    pub fn is_baselined(&self) -> bool {
        self.baseline.len() == self.layout.len()
    }

    pub fn frames_processed(&self) -> u64 {
        self.frames
    }

    /// Process one raw frame.
    ///
    /// Never fails: channels that cannot be converted are reported in
    /// the result's `skipped` list and logged once per channel.
    pub fn process(&mut self, frame: &TouchFrame) -> FrameReport {
        self.baseline.absorb_first_valid(frame, &self.layout);

        let mut update = self.transformer.transform(frame, &self.baseline, &mut self.state);

        for skip in &mut update.skipped {
            if skip.reason == SkipReason::NotBaselined && !self.layout.contains(&skip.channel) {
                skip.reason = SkipReason::UnknownChannel;
            }
        }
        for skip in &update.skipped {
            if self.warned.insert(skip.channel.clone()) {
                tracing::warn!("channel {} skipped: {:?}", skip.channel, skip.reason);
            }
        }

        let summary = self.aggregator.aggregate(&update.calibrated, &self.layout);
        self.frames += 1;

        FrameReport {
            seq: frame.seq,
            calibrated: update.calibrated,
            summary,
            skipped: update.skipped,
        }
    }

    /// Drop baselines, smoothing state and warning history. The next
    /// frames re-zero the hand.
    pub fn reset(&mut self) {
        self.baseline.clear();
        self.state.clear();
        self.warned.clear();
        self.frames = 0;
    }
}
