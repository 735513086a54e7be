// One error type for all the I/O-adjacent parts (window, sensor, assets).
// The per-frame core (tracker, motion, renderer) never produces one of these.
use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Window init error: {0}")]
    WindowInit(String),

    #[error("Window update error: {0}")]
    WindowUpdate(String),

    #[error("Sensor init error: {0}")]
    SensorInit(String),

    #[error("Sensor read error: {0}")]
    SensorRead(String),

    /// Init kept failing; the caller is expected to restart the process.
    #[error("Sensor unavailable after {attempts} attempts")]
    SensorUnavailable { attempts: u32 },

    #[error("Failed to open texture {path}: {source}")]
    TextureOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Texture size mismatch for {path}: expected {expected} bytes, got {actual}")]
    TextureSize {
        path: PathBuf,
        expected: usize,
        actual: usize,
    },

    #[error("Texture decode error: {0}")]
    TextureDecode(String),

    #[error("Failed to allocate {bytes} bytes")]
    Allocation { bytes: usize },

    #[error("Channel {channel} out of range (sink has {count})")]
    ChannelOutOfRange { channel: usize, count: usize },

    #[error("Present called without a selected channel")]
    NoChannelSelected,

    #[error("Frame size {width}x{height} does not match panel {panel_width}x{panel_height}")]
    FrameSize {
        width: usize,
        height: usize,
        panel_width: usize,
        panel_height: usize,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Can trying again help? A bad path or a malformed file stays bad.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Error::Config(_))
    }

    /// The device never answered; the process should start over.
    pub fn needs_restart(&self) -> bool {
        matches!(self, Error::SensorUnavailable { .. })
    }
}
