//! Frame sources.
//!
//! The pipeline pulls frames through the [`FrameSource`] trait and
//! does not care where they come from. Three sources cover the usual
//! setups: a crossbeam channel fed by whatever thread talks to the
//! hardware, replay of a recorded session directory, and a synthetic
//! generator for bench rigs with no hand attached.
//!
//! `read` returning `Ok(None)` always means the stream is over, never
//! a transient gap.

use std::thread;
use std::time::Duration;

use gripmap_core::{Result, SensorLayout, MAX_RAW_COUNT, REFERENCE_SCALE_G_PER_COUNT};

use crate::frame::TouchFrame;
use crate::session::read_session;

/// A pull-based stream of raw frames.
pub trait FrameSource {
    /// Next frame, or `Ok(None)` once the stream is exhausted.
    fn read(&mut self) -> Result<Option<TouchFrame>>;
}

/// Producer half of [`frame_channel`].
#[derive(Debug, Clone)]
pub struct FrameSender {
    tx: crossbeam_channel::Sender<TouchFrame>,
}

impl FrameSender {
    /// Queue a frame. Returns false once the consumer is gone.
    pub fn send(&self, frame: TouchFrame) -> bool {
        self.tx.send(frame).is_ok()
    }
}

/// Consumer half of [`frame_channel`].
#[derive(Debug)]
pub struct ChannelSource {
    rx: crossbeam_channel::Receiver<TouchFrame>,
}

impl FrameSource for ChannelSource {
    fn read(&mut self) -> Result<Option<TouchFrame>> {
        match self.rx.recv() {
            Ok(frame) => Ok(Some(frame)),
            // all senders dropped
            Err(_) => Ok(None),
        }
    }
}

/// Bounded handoff between an acquisition thread and the pipeline.
pub fn frame_channel(capacity: usize) -> (FrameSender, ChannelSource) {
    let (tx, rx) = crossbeam_channel::bounded(capacity);
    (FrameSender { tx }, ChannelSource { rx })
}

/// Replays a recorded session in order.
#[derive(Debug)]
pub struct ReplaySource {
    frames: std::vec::IntoIter<TouchFrame>,
    interval: Option<Duration>,
}

impl ReplaySource {
    /// Load every frame of a session directory up front.
    pub fn from_dir(path: impl AsRef<std::path::Path>) -> Result<Self> {
        Ok(Self::from_frames(read_session(path.as_ref())?))
    }

    pub fn from_frames(frames: Vec<TouchFrame>) -> Self {
        Self {
            frames: frames.into_iter(),
            interval: None,
        }
    }

    /// Sleep this long before handing out each frame, to mimic the
    /// original acquisition rate.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = Some(interval);
        self
    }
}

impl FrameSource for ReplaySource {
    fn read(&mut self) -> Result<Option<TouchFrame>> {
        let Some(frame) = self.frames.next() else {
            return Ok(None);
        };
        if let Some(interval) = self.interval {
            thread::sleep(interval);
        }
        Ok(Some(frame))
    }
}

/// Deterministic pressure waves over a layout, with a consistent
/// simulated load-cell reading attached to every frame.
///
/// All channels share one press envelope, a half-rectified sine over
/// `period` frames, so half of each cycle is exactly zero load. The
/// attached force is the reference scale times the summed activation
/// plus a fixed tare, which makes the generated data calibrate back
/// to the reference scale.
#[derive(Debug, Clone)]
pub struct SyntheticSource {
    layout: SensorLayout,
    seq: u64,
    limit: Option<u64>,
    amplitude: f64,
    period: u64,
    interval: Option<Duration>,
}

/// Simulated load-cell tare, grams
const SYNTHETIC_TARE_G: f64 = 2.0;

impl SyntheticSource {
    pub fn new(layout: SensorLayout) -> Self {
        Self {
            layout,
            seq: 0,
            limit: None,
            amplitude: 600.0,
            period: 120,
            interval: None,
        }
    }

    /// Stop after this many frames instead of running forever.
    pub fn with_limit(mut self, frames: u64) -> Self {
        self.limit = Some(frames);
        self
    }

    /// Peak activation in raw counts above the resting level.
    pub fn with_amplitude(mut self, amplitude: f64) -> Self {
        self.amplitude = amplitude;
        self
    }

    /// Frames per press cycle.
    pub fn with_period(mut self, period: u64) -> Self {
        self.period = period.max(1);
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = Some(interval);
        self
    }

    fn generate(&self, seq: u64) -> TouchFrame {
        let phase = std::f64::consts::TAU * (seq % self.period) as f64 / self.period as f64;
        let envelope = phase.sin().max(0.0);

        let mut frame = TouchFrame::new(seq);
        let mut activation = 0.0;
        for (ci, spec) in self.layout.channels().iter().enumerate() {
            let gain = 0.5 + (ci % 5) as f64 * 0.125;
            let mut values = Vec::with_capacity(spec.taxels());
            for j in 0..spec.taxels() {
                let rest = 120.0 + (j % 7) as f64;
                let cell = (j as f64 * 0.25).sin() * 0.5 + 0.5;
                let press = (self.amplitude * envelope * gain * cell).min(MAX_RAW_COUNT - rest);
                activation += press;
                values.push(rest + press);
            }
            frame = frame.with_channel(spec.id.clone(), values);
        }
        frame.with_force(SYNTHETIC_TARE_G + REFERENCE_SCALE_G_PER_COUNT * activation)
    }
}

impl FrameSource for SyntheticSource {
    fn read(&mut self) -> Result<Option<TouchFrame>> {
        if let Some(limit) = self.limit {
            if self.seq >= limit {
                return Ok(None);
            }
        }
        let frame = self.generate(self.seq);
        self.seq += 1;
        if let Some(interval) = self.interval {
            thread::sleep(interval);
        }
        Ok(Some(frame))
    }
}
