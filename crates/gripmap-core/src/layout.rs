//! Static sensor layout: which channels exist, their matrix shapes,
//! and the region each one belongs to.
//!
//! The layout is built once at startup and validated while it is
//! built: an id that resolves to no region, a duplicate id, or an
//! empty matrix shape is a construction error, never a silent
//! per-frame misclassification.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::region::Region;

/// Saturation value of the tactile ADC (12-bit)
pub const MAX_RAW_COUNT: f64 = 4095.0;

/// Bench reference scale factor in grams-force per raw count,
/// measured against a load cell on the middle fingertip. Calibration
/// replaces this with a fitted value.
pub const REFERENCE_SCALE_G_PER_COUNT: f64 = 0.02106959 * 4.0;

/// Conversion from grams-force to newtons
pub const NEWTONS_PER_GRAM: f64 = 0.00981;

/// One tactile sensing element group and its place on the hand
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelSpec {
    /// Stable channel id, e.g. `fingerfour_tip_touch`
    pub id: String,
    /// Matrix rows
    pub rows: usize,
    /// Matrix columns
    pub cols: usize,
    /// Anatomical region this channel reports for
    pub region: Region,
}

impl ChannelSpec {
    pub fn new(id: impl Into<String>, rows: usize, cols: usize, region: Region) -> Self {
        Self {
            id: id.into(),
            rows,
            cols,
            region,
        }
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// Number of sensing points in this channel
    pub fn taxels(&self) -> usize {
        self.rows * self.cols
    }
}

/// Validated lookup table from channel id to shape and region
#[derive(Debug, Clone)]
pub struct SensorLayout {
    channels: Vec<ChannelSpec>,
    index: BTreeMap<String, usize>,
}

impl SensorLayout {
    /// Build a layout from explicit specs, validating ids and shapes.
    pub fn from_specs(specs: Vec<ChannelSpec>) -> Result<Self> {
        let mut index = BTreeMap::new();
        for (i, spec) in specs.iter().enumerate() {
            if spec.taxels() == 0 {
                return Err(Error::Config(format!(
                    "channel {} has an empty shape {}x{}",
                    spec.id, spec.rows, spec.cols
                )));
            }
            if index.insert(spec.id.clone(), i).is_some() {
                return Err(Error::DuplicateChannel {
                    channel: spec.id.clone(),
                });
            }
        }
        Ok(Self {
            channels: specs,
            index,
        })
    }

    /// Build a layout from ids and shapes, resolving each region from
    /// the id's naming convention. Ids that resolve to no region fail
    /// construction.
    pub fn from_ids<I, S>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, (usize, usize))>,
        S: Into<String>,
    {
        let mut specs = Vec::new();
        for (id, (rows, cols)) in entries {
            let id = id.into();
            let region = Region::resolve(&id).ok_or_else(|| Error::UnresolvedRegion {
                channel: id.clone(),
            })?;
            specs.push(ChannelSpec::new(id, rows, cols, region));
        }
        Self::from_specs(specs)
    }

    /// The stock hand: 17 channels, 1062 taxels.
    pub fn standard() -> Self {
        let table: [(&str, usize, usize, Region); 17] = [
            ("fingerone_tip_touch", 3, 3, Region::PinkyTip),
            ("fingerone_top_touch", 12, 8, Region::PinkyPad),
            ("fingerone_palm_touch", 10, 8, Region::PinkyProx),
            ("fingertwo_tip_touch", 3, 3, Region::RingTip),
            ("fingertwo_top_touch", 12, 8, Region::RingPad),
            ("fingertwo_palm_touch", 10, 8, Region::RingProx),
            ("fingerthree_tip_touch", 3, 3, Region::MiddleTip),
            ("fingerthree_top_touch", 12, 8, Region::MiddlePad),
            ("fingerthree_palm_touch", 10, 8, Region::MiddleProx),
            ("fingerfour_tip_touch", 3, 3, Region::IndexTip),
            ("fingerfour_top_touch", 12, 8, Region::IndexPad),
            ("fingerfour_palm_touch", 10, 8, Region::IndexProx),
            ("fingerfive_tip_touch", 3, 3, Region::ThumbTip),
            ("fingerfive_top_touch", 12, 8, Region::ThumbPad),
            ("fingerfive_middle_touch", 3, 3, Region::ThumbMiddle),
            ("fingerfive_palm_touch", 12, 8, Region::ThumbBase),
            ("palm_touch", 8, 14, Region::Palm),
        ];

        let channels: Vec<ChannelSpec> = table
            .iter()
            .map(|&(id, rows, cols, region)| ChannelSpec::new(id, rows, cols, region))
            .collect();
        let index = channels
            .iter()
            .enumerate()
            .map(|(i, spec)| (spec.id.clone(), i))
            .collect();

        Self { channels, index }
    }

    pub fn get(&self, id: &str) -> Option<&ChannelSpec> {
        self.index.get(id).map(|&i| &self.channels[i])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn region_of(&self, id: &str) -> Option<Region> {
        self.get(id).map(|spec| spec.region)
    }

    pub fn channels(&self) -> &[ChannelSpec] {
        &self.channels
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Total sensing points across all channels
    pub fn total_taxels(&self) -> usize {
        self.channels.iter().map(ChannelSpec::taxels).sum()
    }
}
