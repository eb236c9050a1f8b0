//! Session recording and replay.
//!
//! A recording session is a directory of per-channel CSV files plus an
//! optional `force.csv` with the reference load. Channel logs begin
//! with a `shape` row carrying the grid dimensions, then hold one
//! flattened frame per row. Frames are paired across files by row
//! index, so every file in a healthy session has the same row count.

use std::collections::BTreeMap;
use std::fs;
use std::fs::File;
use std::path::{Path, PathBuf};

use gripmap_core::{Error, Result, SensorLayout};

use crate::frame::TouchFrame;

/// Session directories are named `{prefix}_{%m_%d_%y_%H%M%S}`
pub const SESSION_PREFIX: &str = "gripmap_session";

const SHAPE_TAG: &str = "shape";
const FORCE_STEM: &str = "force";

/// Streams raw frames into a new session directory.
pub struct SessionWriter {
    dir: PathBuf,
    writers: BTreeMap<String, csv::Writer<File>>,
    force: Option<csv::Writer<File>>,
    frames: u64,
    missing_warned: bool,
    finished: bool,
}

impl SessionWriter {
    /// Create a timestamped session directory under `base_dir` with
    /// one seeded log per declared channel.
    pub fn create(base_dir: impl AsRef<Path>, layout: &SensorLayout) -> Result<Self> {
        let stamp = chrono::Local::now().format("%m_%d_%y_%H%M%S");
        let dir = base_dir.as_ref().join(format!("{SESSION_PREFIX}_{stamp}"));
        fs::create_dir_all(&dir)?;

        let mut writers = BTreeMap::new();
        for spec in layout.channels() {
            let mut writer = csv::WriterBuilder::new()
                .flexible(true)
                .from_path(dir.join(format!("{}.csv", spec.id)))
                .map_err(|e| Error::Session(e.to_string()))?;
            writer
                .write_record([SHAPE_TAG, &spec.rows.to_string(), &spec.cols.to_string()])
                .map_err(|e| Error::Session(e.to_string()))?;
            writers.insert(spec.id.clone(), writer);
        }

        Ok(Self {
            dir,
            writers,
            force: None,
            frames: 0,
            missing_warned: false,
            finished: false,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn frames_written(&self) -> u64 {
        self.frames
    }

    /// Append one frame.
    ///
    /// Frames are expected to carry every declared channel; a missing
    /// sample leaves a gap that shifts later rows of that log, so it
    /// is logged the first time it happens. Channels the layout does
    /// not declare are not recorded.
    pub fn write(&mut self, frame: &TouchFrame) -> Result<()> {
        for (id, writer) in &mut self.writers {
            let Some(values) = frame.sample(id) else {
                if !self.missing_warned {
                    tracing::warn!("frame {} carries no sample for channel {}", frame.seq, id);
                    self.missing_warned = true;
                }
                continue;
            };
            writer
                .write_record(values.iter().map(|v| v.to_string()))
                .map_err(|e| Error::Session(e.to_string()))?;
        }

        if let Some(force_g) = frame.force_g {
            if self.force.is_none() {
                let writer = csv::Writer::from_path(self.dir.join(format!("{FORCE_STEM}.csv")))
                    .map_err(|e| Error::Session(e.to_string()))?;
                self.force = Some(writer);
            }
            if let Some(writer) = &mut self.force {
                writer
                    .write_record([force_g.to_string()])
                    .map_err(|e| Error::Session(e.to_string()))?;
            }
        }

        self.frames += 1;
        Ok(())
    }

    /// Flush everything and hand back the session directory.
    pub fn finish(mut self) -> Result<PathBuf> {
        for writer in self.writers.values_mut() {
            writer.flush()?;
        }
        if let Some(writer) = &mut self.force {
            writer.flush()?;
        }
        self.finished = true;
        Ok(self.dir.clone())
    }
}

impl Drop for SessionWriter {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        for writer in self.writers.values_mut() {
            let _ = writer.flush();
        }
        if let Some(writer) = &mut self.force {
            let _ = writer.flush();
        }
    }
}

/// Load every frame of a session directory.
///
/// Channel rows that fail to parse come back as empty samples instead
/// of disappearing, which keeps row indices paired across files and
/// lets the pipeline report the corruption as a skip.
pub fn read_session(path: &Path) -> Result<Vec<TouchFrame>> {
    if !path.is_dir() {
        return Err(Error::Session(format!(
            "{} is not a session directory",
            path.display()
        )));
    }

    let mut channels: BTreeMap<String, Vec<Vec<f64>>> = BTreeMap::new();
    let mut force: Vec<f64> = Vec::new();

    for entry in fs::read_dir(path)? {
        let entry = entry?;
        let file = entry.path();
        if file.extension().and_then(|e| e.to_str()) != Some("csv") {
            continue;
        }
        let Some(stem) = file.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };

        if stem == FORCE_STEM {
            force = read_force_log(&file)?;
        } else {
            channels.insert(stem.to_string(), read_channel_log(stem, &file)?);
        }
    }

    let frame_count = channels.values().map(Vec::len).max().unwrap_or(0);
    let mut frames = Vec::with_capacity(frame_count);
    for i in 0..frame_count {
        let mut frame = TouchFrame::new(i as u64);
        for (id, rows) in &channels {
            if let Some(values) = rows.get(i) {
                frame = frame.with_channel(id.clone(), values.clone());
            }
        }
        if let Some(&force_g) = force.get(i) {
            if force_g.is_finite() {
                frame = frame.with_force(force_g);
            }
        }
        frames.push(frame);
    }
    Ok(frames)
}

fn read_channel_log(id: &str, path: &Path) -> Result<Vec<Vec<f64>>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .map_err(|e| Error::Session(e.to_string()))?;

    let mut rows = Vec::new();
    let mut saw_shape = false;
    for record in reader.records() {
        let record = record.map_err(|e| Error::Session(e.to_string()))?;

        if !saw_shape {
            if record.get(0) != Some(SHAPE_TAG) {
                return Err(Error::Session(format!(
                    "channel log {} does not start with a shape row",
                    path.display()
                )));
            }
            saw_shape = true;
            continue;
        }

        let values: std::result::Result<Vec<f64>, _> =
            record.iter().map(|f| f.trim().parse::<f64>()).collect();
        match values {
            Ok(values) => rows.push(values),
            Err(_) => {
                tracing::warn!("channel {} row {} is corrupt, kept as empty", id, rows.len());
                rows.push(Vec::new());
            }
        }
    }

    if !saw_shape {
        return Err(Error::Session(format!(
            "channel log {} does not start with a shape row",
            path.display()
        )));
    }
    Ok(rows)
}

fn read_force_log(path: &Path) -> Result<Vec<f64>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .map_err(|e| Error::Session(e.to_string()))?;

    let mut values = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| Error::Session(e.to_string()))?;
        let parsed = record
            .get(0)
            .and_then(|f| f.trim().parse::<f64>().ok())
            .unwrap_or(f64::NAN);
        values.push(parsed);
    }
    Ok(values)
}
