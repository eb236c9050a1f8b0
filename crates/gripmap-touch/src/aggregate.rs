//! Per-region load summaries.
//!
//! Calibrated gram maps are folded down to one total and one peak per
//! hand region, in the fixed presentation order of
//! [`Region`](gripmap_core::Region). This is the view an operator
//! actually watches during a grasp.

use std::collections::BTreeMap;
use std::fmt::Write;

use gripmap_core::{Region, SensorLayout};

use crate::frame::CalibratedFrame;

/// Load on one region, grams.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RegionLoad {
    /// Sum over every taxel mapped to the region
    pub total_g: f64,

    /// Largest single-taxel reading in the region
    pub peak_g: f64,
}

/// Region loads for one frame, ordered for presentation.
#[derive(Debug, Clone, Default)]
pub struct RegionSummary {
    loads: BTreeMap<Region, RegionLoad>,
}

impl RegionSummary {
    pub fn get(&self, region: Region) -> Option<RegionLoad> {
        self.loads.get(&region).copied()
    }

    /// Regions in presentation order, palm first, thumb last.
    pub fn iter(&self) -> impl Iterator<Item = (Region, RegionLoad)> + '_ {
        self.loads.iter().map(|(r, l)| (*r, *l))
    }

    pub fn len(&self) -> usize {
        self.loads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.loads.is_empty()
    }

    /// Fixed-width text table of the loads, one region per row.
    pub fn render_table(&self, scale_g_per_count: f64) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Region Loads (g)");
        let _ = writeln!(out, "k = {scale_g_per_count:.8} g/count");
        let _ = writeln!(out, "{}", "-".repeat(30));
        let _ = writeln!(out, "{:<14}{:>8}{:>8}", "Region", "Sum(g)", "Max(g)");
        let _ = writeln!(out, "{}", "-".repeat(30));
        for (region, load) in self.iter() {
            let _ = writeln!(out, "{:<14}{:>8.1}{:>8.1}", region, load.total_g, load.peak_g);
        }
        out
    }
}

/// Folds calibrated frames into [`RegionSummary`] values.
#[derive(Debug, Clone, Copy, Default)]
pub struct RegionAggregator;

impl RegionAggregator {
    pub fn new() -> Self {
        Self
    }

    /// Sum and peak each channel's gram map into its region. Channels
    /// the layout does not declare contribute nothing.
    pub fn aggregate(&self, frame: &CalibratedFrame, layout: &SensorLayout) -> RegionSummary {
        let mut summary = RegionSummary::default();
        for (id, map) in &frame.channels {
            let Some(region) = layout.region_of(id) else {
                tracing::debug!("channel {} has no region, ignored in summary", id);
                continue;
            };
            let load = summary.loads.entry(region).or_default();
            load.total_g += map.sum();
            load.peak_g = map.fold(load.peak_g, |m, &v| m.max(v));
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gripmap_core::ChannelSpec;
    use ndarray::array;

    fn layout() -> SensorLayout {
        SensorLayout::from_specs(vec![
            ChannelSpec::new("heel", 1, 2, Region::Palm),
            ChannelSpec::new("web", 1, 2, Region::Palm),
            ChannelSpec::new("tip", 1, 1, Region::IndexTip),
        ])
        .unwrap()
    }

    #[test]
    fn test_channels_merge_into_region() {
        let mut frame = CalibratedFrame::new(0);
        frame.channels.insert("heel".into(), array![[4.0, 6.0]]);
        frame.channels.insert("web".into(), array![[1.0, 9.0]]);
        frame.channels.insert("tip".into(), array![[2.5]]);

        let summary = RegionAggregator::new().aggregate(&frame, &layout());
        assert_eq!(summary.len(), 2);

        let palm = summary.get(Region::Palm).unwrap();
        assert!((palm.total_g - 20.0).abs() < 1e-10);
        // peak is the max taxel across both palm channels
        assert!((palm.peak_g - 9.0).abs() < 1e-10);

        let tip = summary.get(Region::IndexTip).unwrap();
        assert!((tip.total_g - 2.5).abs() < 1e-10);
        assert!((tip.peak_g - 2.5).abs() < 1e-10);
    }

    #[test]
    fn test_presentation_order() {
        let mut frame = CalibratedFrame::new(0);
        frame.channels.insert("tip".into(), array![[1.0]]);
        frame.channels.insert("heel".into(), array![[1.0, 1.0]]);

        let summary = RegionAggregator::new().aggregate(&frame, &layout());
        let order: Vec<Region> = summary.iter().map(|(r, _)| r).collect();
        assert_eq!(order, vec![Region::Palm, Region::IndexTip]);
    }

    #[test]
    fn test_unknown_channel_ignored() {
        let mut frame = CalibratedFrame::new(0);
        frame.channels.insert("nowhere".into(), array![[99.0]]);
        let summary = RegionAggregator::new().aggregate(&frame, &layout());
        assert!(summary.is_empty());
    }

    #[test]
    fn test_table_format() {
        let mut frame = CalibratedFrame::new(0);
        frame.channels.insert("heel".into(), array![[12.0, 8.25]]);
        frame.channels.insert("tip".into(), array![[3.0]]);

        let summary = RegionAggregator::new().aggregate(&frame, &layout());
        let table = summary.render_table(0.5);

        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines[0], "Region Loads (g)");
        assert_eq!(lines[1], "k = 0.50000000 g/count");
        assert_eq!(lines[2], "-".repeat(30));
        assert_eq!(lines[3], format!("{:<14}{:>8}{:>8}", "Region", "Sum(g)", "Max(g)"));
        assert_eq!(lines[4], "-".repeat(30));
        assert_eq!(lines[5], format!("{:<14}{:>8.1}{:>8.1}", "Palm", 20.25, 12.0));
        assert_eq!(lines[6], format!("{:<14}{:>8.1}{:>8.1}", "Index Tip", 3.0, 3.0));
    }
}
