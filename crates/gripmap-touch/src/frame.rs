//! Touch frame data structures.

use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use gripmap_core::{Error, Result};

/// One raw frame from the hand: every channel's flattened sample,
/// captured at the same logical timestep.
///
/// Samples are row-major raw counts. A sample whose length does not
/// match its channel's declared shape is carried as-is; validation
/// happens where the matrix is needed, so a malformed channel never
/// poisons the rest of the frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TouchFrame {
    /// Sequence number for frame ordering
    pub seq: u64,

    /// Channel id to flattened raw sample
    pub channels: BTreeMap<String, Vec<f64>>,

    /// Paired reference-force reading in grams, when a load cell was
    /// recording alongside the touch stream
    pub force_g: Option<f64>,
}

impl TouchFrame {
    pub fn new(seq: u64) -> Self {
        Self {
            seq,
            channels: BTreeMap::new(),
            force_g: None,
        }
    }

    pub fn with_channel(mut self, id: impl Into<String>, values: Vec<f64>) -> Self {
        self.channels.insert(id.into(), values);
        self
    }

    pub fn with_force(mut self, grams: f64) -> Self {
        self.force_g = Some(grams);
        self
    }

    pub fn sample(&self, id: &str) -> Option<&[f64]> {
        self.channels.get(id).map(Vec::as_slice)
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }
}

/// Calibrated counterpart of a raw frame: grams-force per taxel,
/// already smoothed, shaped per channel.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CalibratedFrame {
    pub seq: u64,
    pub channels: BTreeMap<String, Array2<f64>>,
}

impl CalibratedFrame {
    pub fn new(seq: u64) -> Self {
        Self {
            seq,
            channels: BTreeMap::new(),
        }
    }

    pub fn get(&self, id: &str) -> Option<&Array2<f64>> {
        self.channels.get(id)
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}

/// Reshape a flattened sample into the declared channel matrix.
///
/// Fails when the sample is empty or its length does not match
/// `rows * cols`.
pub fn reshape(channel: &str, values: &[f64], shape: (usize, usize)) -> Result<Array2<f64>> {
    let (rows, cols) = shape;
    if values.is_empty() || values.len() != rows * cols {
        return Err(Error::ChannelShapeMismatch {
            channel: channel.to_string(),
            rows,
            cols,
            len: values.len(),
        });
    }
    Array2::from_shape_vec((rows, cols), values.to_vec()).map_err(|_| {
        Error::ChannelShapeMismatch {
            channel: channel.to_string(),
            rows,
            cols,
            len: values.len(),
        }
    })
}
