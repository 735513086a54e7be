// Every tunable of the rig in one place. Defaults are the values the physical
// build ships with (two 240x240 round panels, 350x350 eye art, VL53L5CX at 15 Hz).

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::fixed::FixedStep;
use crate::motion::MotionConfig;
use crate::render::RenderConfig;
use crate::tracker::TrackerConfig;

pub const DEFAULT_PANEL_SIZE: usize = 240;
pub const DEFAULT_TEXTURE_SIZE: usize = 350;
pub const DEFAULT_CHANNELS: usize = 2;

/// Sensor bring-up and pacing.
#[derive(Clone, Debug)]
pub struct SensorConfig {
    /// How many times `init()` is attempted before giving up.
    pub init_attempts: u32,
    /// Fixed pause between failed attempts.
    pub init_retry_delay: Duration,
    /// Ranging frequency; the replay sensor releases one frame per period.
    pub ranging_hz: u32,
    /// How long the simulated calibration pattern stays on one position.
    pub simulation_step: Duration,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            init_attempts: 3,
            init_retry_delay: Duration::from_millis(3000),
            ranging_hz: 15,
            simulation_step: Duration::from_millis(1000),
        }
    }
}

/// Debug overlays and startup screens.
#[derive(Clone, Debug)]
pub struct OverlayConfig {
    /// Draw the 8x8 depth grid + FPS on the right eye.
    pub show_debug_grid: bool,
    /// Edge length of the debug grid in pixels.
    pub debug_grid_size: usize,
    /// Splash text shown on every panel at boot.
    pub splash_text: String,
    /// How long the splash stays up.
    pub splash_duration: Duration,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            show_debug_grid: true,
            debug_grid_size: 80,
            splash_text: "TOF EYES".to_string(),
            splash_duration: Duration::from_millis(1000),
        }
    }
}

/// Top-level configuration, fixed for the lifetime of the process.
#[derive(Clone, Debug)]
pub struct Config {
    /// Number of physical panels (one per eye).
    pub channels: usize,
    pub tracker: TrackerConfig,
    pub motion: MotionConfig,
    pub render: RenderConfig,
    pub sensor: SensorConfig,
    pub overlay: OverlayConfig,
    /// Texture shown while idling.
    pub idle_texture: PathBuf,
    /// Texture shown while a target is tracked.
    pub tracking_texture: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            channels: DEFAULT_CHANNELS,
            tracker: TrackerConfig::default(),
            motion: MotionConfig::default(),
            render: RenderConfig::default(),
            sensor: SensorConfig::default(),
            overlay: OverlayConfig::default(),
            idle_texture: PathBuf::from("assets/eye_idle.bin"),
            tracking_texture: PathBuf::from("assets/eye_tracking.bin"),
        }
    }
}

impl Config {
    pub fn with_textures(mut self, idle: PathBuf, tracking: PathBuf) -> Self {
        self.idle_texture = idle;
        self.tracking_texture = tracking;
        self
    }

    pub fn with_gain(mut self, gain: f32) -> Self {
        self.motion.gain = gain;
        self
    }

    pub fn with_max_distance_mm(mut self, max_distance_mm: u16) -> Self {
        self.tracker.max_distance_mm = max_distance_mm;
        self
    }

    pub fn with_texture_scale(mut self, scale: FixedStep) -> Self {
        self.render = self.render.with_scale(scale);
        self
    }

    /// 0 = open .. `EYELID_CLOSED` = shut; larger values clamp at draw time.
    pub fn with_eyelid_level(mut self, level: u8) -> Self {
        self.render.eyelid_level = level;
        self
    }

    pub fn with_debug_grid(mut self, show: bool) -> Self {
        self.overlay.show_debug_grid = show;
        self
    }

    pub fn with_saccade_seed(mut self, seed: Option<u64>) -> Self {
        self.motion.seed = seed;
        self
    }

    /// Reject values the rest of the pipeline can't handle.
    pub fn validate(&self) -> Result<()> {
        if self.channels == 0 {
            return Err(Error::Config("at least one display channel is required".into()));
        }
        if !(self.motion.gain > 0.0 && self.motion.gain <= 1.0) {
            return Err(Error::Config(format!(
                "smoothing gain must be in (0, 1], got {}",
                self.motion.gain
            )));
        }
        let r = &self.render;
        if r.panel_width == 0 || r.panel_height == 0 {
            return Err(Error::Config("panel dimensions must be non-zero".into()));
        }
        if r.texture_width == 0 || r.texture_height == 0 {
            return Err(Error::Config("texture dimensions must be non-zero".into()));
        }
        if self.sensor.init_attempts == 0 {
            return Err(Error::Config("sensor init attempts must be at least 1".into()));
        }
        if self.sensor.ranging_hz == 0 {
            return Err(Error::Config("ranging frequency must be non-zero".into()));
        }
        if self.tracker.min_reliable_neighbors == 0 || self.tracker.min_reliable_neighbors > 9 {
            return Err(Error::Config(format!(
                "reliable neighbor count must be in 1..=9, got {}",
                self.tracker.min_reliable_neighbors
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let cfg = Config::default();
        cfg.validate().unwrap();
        assert_eq!(cfg.render.resting_offset, -55);
        assert_eq!(cfg.render.max_offset_px, 55);
        assert_eq!(cfg.tracker.max_distance_mm, 400);
        assert_eq!(cfg.tracker.min_reliable_neighbors, 4);
        assert_eq!(cfg.motion.saccade_interval, Duration::from_millis(1500));
        assert_eq!(cfg.motion.grace_period, Duration::from_millis(2000));
    }

    #[test]
    fn test_gain_out_of_range_rejected() {
        assert!(Config::default().with_gain(0.0).validate().is_err());
        assert!(Config::default().with_gain(1.5).validate().is_err());
        assert!(Config::default().with_gain(1.0).validate().is_ok());
    }

    #[test]
    fn test_zero_attempts_rejected() {
        let mut cfg = Config::default();
        cfg.sensor.init_attempts = 0;
        assert!(matches!(cfg.validate(), Err(Error::Config(_))));
    }
}
