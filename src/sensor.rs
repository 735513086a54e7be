// Depth sensor adapters. Whatever produces the 8x8 grid hides behind
// `SensorAdapter` so the main loop doesn't care whether the frames come from
// a synthetic calibration pattern, a recording, or nowhere at all.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::SensorConfig;
use crate::error::{Error, Result};
use crate::types::{DepthGrid, Zone, GRID_SIDE, GRID_ZONES};

pub trait SensorAdapter {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Bring the device up. May be retried; see `init_with_retry`.
    fn init(&mut self) -> Result<()>;

    /// Non-blocking: is a fresh grid waiting?
    fn poll_ready(&mut self) -> bool;

    /// Fetch the waiting grid.
    fn read(&mut self) -> Result<DepthGrid>;
}

/// Which adapter to build.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SensorKind {
    Simulated,
    Replay(PathBuf),
    Disabled,
}

pub fn build_sensor(kind: &SensorKind, cfg: &SensorConfig) -> Box<dyn SensorAdapter> {
    match kind {
        SensorKind::Simulated => Box::new(SimulatedSensor::new(cfg.simulation_step)),
        SensorKind::Replay(path) => Box::new(ReplaySensor::new(path, cfg.ranging_hz)),
        SensorKind::Disabled => Box::new(DisabledSensor),
    }
}

/// Try `init()` up to `attempts` times with a fixed pause in between.
/// Gives up with `SensorUnavailable`; the caller decides what a restart means.
/// A configuration error is returned straight away, retrying can't fix it.
pub fn init_with_retry(sensor: &mut dyn SensorAdapter, attempts: u32, delay: Duration) -> Result<()> {
    for attempt in 1..=attempts {
        match sensor.init() {
            Ok(()) => {
                info!(sensor = sensor.name(), attempt, "Sensor initialized");
                return Ok(());
            }
            Err(e) if !e.is_retryable() => return Err(e),
            Err(e) => {
                warn!(sensor = sensor.name(), attempt, attempts, error = %e, "Sensor init failed");
                if attempt < attempts {
                    thread::sleep(delay);
                }
            }
        }
    }
    Err(Error::SensorUnavailable { attempts })
}

/* ------------------------------ simulated ------------------------------ */

const BACKGROUND_MM: u16 = 1000;
const PATTERN_CENTER_MM: u16 = 200;
const PATTERN_RING_MM: u16 = 300;

/// Pattern centres as (column, row): nine interior spots, then the four
/// corners where only a 2x2 quarter of the pattern is on the grid.
const CALIBRATION_POINTS: [(usize, usize); 13] = [
    (1, 1), (1, 4), (1, 6),
    (4, 1), (4, 4), (4, 6),
    (6, 1), (6, 4), (6, 6),
    (0, 0), (0, 7), (7, 0), (7, 7),
];

/// Synthetic calibration source: a 3x3 "object" hopping between fixed spots.
/// Always ready, so the tracker runs every tick.
pub struct SimulatedSensor {
    step: Duration,
    started: Option<Instant>,
}

impl SimulatedSensor {
    pub fn new(step: Duration) -> Self {
        Self { step, started: None }
    }

    /// Which calibration point is shown after `elapsed`.
    pub fn point_index(&self, elapsed: Duration) -> usize {
        if self.step.is_zero() {
            return 0;
        }
        (elapsed.as_millis() / self.step.as_millis()) as usize % CALIBRATION_POINTS.len()
    }

    /// The grid for calibration point `index`.
    pub fn pattern(index: usize) -> DepthGrid {
        let (center_col, center_row) = CALIBRATION_POINTS[index % CALIBRATION_POINTS.len()];
        DepthGrid::from_fn(|row, col| {
            let dr = row.abs_diff(center_row);
            let dc = col.abs_diff(center_col);
            let distance_mm = match (dr, dc) {
                (0, 0) => PATTERN_CENTER_MM,
                (0..=1, 0..=1) => PATTERN_RING_MM,
                _ => BACKGROUND_MM,
            };
            Zone::valid(distance_mm)
        })
    }
}

impl SensorAdapter for SimulatedSensor {
    fn name(&self) -> &'static str {
        "simulated"
    }

    fn init(&mut self) -> Result<()> {
        self.started = Some(Instant::now());
        info!("ToF calibration simulation active");
        Ok(())
    }

    fn poll_ready(&mut self) -> bool {
        true
    }

    fn read(&mut self) -> Result<DepthGrid> {
        let started = self.started.ok_or_else(|| Error::SensorRead("simulated sensor not initialized".into()))?;
        Ok(Self::pattern(self.point_index(started.elapsed())))
    }
}

/* ------------------------------- replay -------------------------------- */

/// One line of a recording: 64 distances and 64 status codes, row-major.
#[derive(Debug, Serialize, Deserialize)]
pub struct RecordedFrame {
    pub distance_mm: Vec<u16>,
    pub status: Vec<u8>,
}

impl RecordedFrame {
    pub fn from_grid(grid: &DepthGrid) -> Self {
        Self {
            distance_mm: grid.zones().iter().map(|z| z.distance_mm).collect(),
            status: grid.zones().iter().map(|z| z.status).collect(),
        }
    }

    fn into_grid(self) -> Option<DepthGrid> {
        if self.distance_mm.len() != GRID_ZONES || self.status.len() != GRID_ZONES {
            return None;
        }
        Some(DepthGrid::from_fn(|row, col| {
            let i = row * GRID_SIDE + col;
            Zone { distance_mm: self.distance_mm[i], status: self.status[i] }
        }))
    }
}

/// Plays a JSON-lines recording back at the sensor's ranging rate, looping.
pub struct ReplaySensor {
    path: PathBuf,
    period: Duration,
    frames: Vec<DepthGrid>,
    cursor: usize,
    last_release: Option<Instant>,
}

impl ReplaySensor {
    pub fn new(path: &Path, ranging_hz: u32) -> Self {
        Self {
            path: path.to_path_buf(),
            period: Duration::from_secs(1) / ranging_hz.max(1),
            frames: Vec::new(),
            cursor: 0,
            last_release: None,
        }
    }

    /// A missing or malformed file is a configuration error; a failed read is not.
    fn load(path: &Path) -> Result<Vec<DepthGrid>> {
        let file = File::open(path)
            .map_err(|e| Error::Config(format!("recording {}: {e}", path.display())))?;
        let mut frames = Vec::new();
        for (n, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|e| Error::SensorInit(format!("read {}: {e}", path.display())))?;
            if line.trim().is_empty() {
                continue;
            }
            let frame: RecordedFrame = serde_json::from_str(&line)
                .map_err(|e| Error::Config(format!("{}:{}: {e}", path.display(), n + 1)))?;
            let grid = frame.into_grid().ok_or_else(|| {
                Error::Config(format!("{}:{}: expected {GRID_ZONES} zones", path.display(), n + 1))
            })?;
            frames.push(grid);
        }
        if frames.is_empty() {
            return Err(Error::Config(format!("{}: no frames", path.display())));
        }
        Ok(frames)
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }
}

impl SensorAdapter for ReplaySensor {
    fn name(&self) -> &'static str {
        "replay"
    }

    fn init(&mut self) -> Result<()> {
        self.frames = Self::load(&self.path)?;
        self.cursor = 0;
        self.last_release = None;
        info!(path = %self.path.display(), frames = self.frame_count(), "Replay loaded");
        Ok(())
    }

    fn poll_ready(&mut self) -> bool {
        !self.frames.is_empty()
            && self.last_release.is_none_or(|t| t.elapsed() >= self.period)
    }

    fn read(&mut self) -> Result<DepthGrid> {
        let grid = self
            .frames
            .get(self.cursor)
            .cloned()
            .ok_or_else(|| Error::SensorRead("replay sensor not initialized".into()))?;
        self.cursor = (self.cursor + 1) % self.frames.len();
        self.last_release = Some(Instant::now());
        Ok(grid)
    }
}

/// Appends every grid it sees to a JSON-lines file that `ReplaySensor` can play back.
pub struct GridRecorder {
    out: BufWriter<File>,
    frames: usize,
}

impl GridRecorder {
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path)?;
        info!(path = %path.display(), "Recording depth grids");
        Ok(Self { out: BufWriter::new(file), frames: 0 })
    }

    pub fn record(&mut self, grid: &DepthGrid) -> Result<()> {
        serde_json::to_writer(&mut self.out, &RecordedFrame::from_grid(grid))
            .map_err(|e| Error::Io(e.into()))?;
        self.out.write_all(b"\n")?;
        self.frames += 1;
        Ok(())
    }

    pub fn frames(&self) -> usize {
        self.frames
    }

    pub fn flush(&mut self) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }
}

/* ------------------------------ disabled ------------------------------- */

/// No sensor fitted: never has data, so the eyes idle forever.
pub struct DisabledSensor;

impl SensorAdapter for DisabledSensor {
    fn name(&self) -> &'static str {
        "disabled"
    }

    fn init(&mut self) -> Result<()> {
        Ok(())
    }

    fn poll_ready(&mut self) -> bool {
        false
    }

    fn read(&mut self) -> Result<DepthGrid> {
        // status 0 everywhere: nothing valid
        Ok(DepthGrid::default())
    }
}
