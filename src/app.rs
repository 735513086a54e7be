// One tick of the rig, start to finish:
// sensor poll -> tracker -> motion -> paint every panel -> select + present.
// Everything the loop touches is allocated in `EyeRig::new`; a tick only
// overwrites existing buffers.

use std::fmt::Write as _;
use std::time::{Duration, Instant};

use tracing::{debug, info, trace, warn};

use crate::config::Config;
use crate::display::DisplaySink;
use crate::error::{Error, Result};
use crate::motion::{MotionController, MotionState};
use crate::overlay::{draw_aim_marker, draw_depth_grid, draw_splash, draw_text_centered, text_height};
use crate::palette::{BLACK, GREEN, WHITE};
use crate::render::Renderer;
use crate::sensor::{GridRecorder, SensorAdapter};
use crate::tracker::find_target;
use crate::types::{DepthGrid, EyeImage, FrameBuffer, Target};

/// Longest label the meter writes, "FPS: 99999.9", with headroom.
const FPS_TEXT_CAPACITY: usize = 24;

/// Frames per second, refreshed once a second. The label is rewritten in place.
pub struct FpsMeter {
    window_start: Instant,
    frames: u32,
    text: String,
}

impl FpsMeter {
    pub fn new(now: Instant) -> Self {
        let mut text = String::with_capacity(FPS_TEXT_CAPACITY);
        text.push_str("FPS: 0.0");
        Self {
            window_start: now,
            frames: 0,
            text,
        }
    }

    /// Count a frame; returns the new figure when a second has passed.
    pub fn frame(&mut self, now: Instant) -> Option<f32> {
        self.frames += 1;
        let elapsed = now.saturating_duration_since(self.window_start);
        if elapsed < Duration::from_secs(1) {
            return None;
        }
        let fps = self.frames as f32 / elapsed.as_secs_f32();
        self.text.clear();
        // writing into a String can't fail
        let _ = write!(self.text, "FPS: {fps:.1}");
        self.frames = 0;
        self.window_start = now;
        Some(fps)
    }

    /// HUD label, e.g. "FPS: 14.8".
    pub fn text(&self) -> &str {
        &self.text
    }
}

pub struct EyeRig<S: DisplaySink> {
    cfg: Config,
    sensor: Box<dyn SensorAdapter>,
    recorder: Option<GridRecorder>,
    grid: DepthGrid,
    target: Target,
    motion: MotionController,
    renderer: Renderer,
    frames: Vec<FrameBuffer>,
    sink: S,
    fps: FpsMeter,
}

impl<S: DisplaySink> EyeRig<S> {
    /// Allocate every panel buffer and load both textures.
    ///
    /// A framebuffer that can't be allocated is fatal. A texture that can't be
    /// loaded is not: that variant just leaves the eye area blank.
    /// The sensor is expected to be initialized already.
    pub fn new(cfg: Config, sensor: Box<dyn SensorAdapter>, sink: S, now: Instant) -> Result<Self> {
        cfg.validate()?;
        if sink.channels() < cfg.channels {
            return Err(Error::Config(format!(
                "display has {} channels, {} configured",
                sink.channels(),
                cfg.channels
            )));
        }

        let (w, h) = (cfg.render.panel_width, cfg.render.panel_height);
        let mut frames = Vec::with_capacity(cfg.channels);
        for _ in 0..cfg.channels {
            frames.push(FrameBuffer::try_new(w, h)?);
        }
        info!(channels = cfg.channels, width = w, height = h, "Framebuffers allocated");

        let mut renderer = Renderer::new(cfg.render.clone());
        for (image, path) in [
            (EyeImage::Idle, &cfg.idle_texture),
            (EyeImage::Tracking, &cfg.tracking_texture),
        ] {
            if let Err(e) = renderer.load_texture(image, path) {
                warn!(image = image.as_str(), path = %path.display(), error = %e, "Texture unavailable, eye will be blank");
            }
        }
        info!(
            idle = renderer.has_texture(EyeImage::Idle),
            tracking = renderer.has_texture(EyeImage::Tracking),
            "Eye art ready"
        );

        let motion = MotionController::new(cfg.motion.clone(), cfg.channels, now);
        Ok(Self {
            cfg,
            sensor,
            recorder: None,
            grid: DepthGrid::default(),
            target: Target::none(),
            motion,
            renderer,
            frames,
            sink,
            fps: FpsMeter::new(now),
        })
    }

    /// Append every fresh grid to a recording.
    pub fn with_recorder(mut self, recorder: GridRecorder) -> Self {
        self.recorder = Some(recorder);
        self
    }

    pub fn config(&self) -> &Config {
        &self.cfg
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    pub fn motion(&self) -> &MotionController {
        &self.motion
    }

    pub fn is_open(&self) -> bool {
        self.sink.is_open()
    }

    /// Show the boot splash on every panel.
    pub fn splash(&mut self) -> Result<()> {
        let text = &self.cfg.overlay.splash_text;
        for (channel, fb) in self.frames.iter_mut().enumerate() {
            draw_splash(fb, text, WHITE);
            self.sink.select(channel)?;
            self.sink.present(fb)?;
        }
        Ok(())
    }

    /// Run one tick at time `now`. Only display errors come back out.
    pub fn tick(&mut self, now: Instant) -> Result<MotionState> {
        self.poll_sensor();

        let state = self.motion.update(&self.target, now);
        let image = self.motion.image();
        let eyelid = self.cfg.render.eyelid_level;

        for (eye, fb) in self.frames.iter_mut().enumerate() {
            self.renderer.clear(fb, BLACK);
            self.renderer.draw(fb, self.motion.eye_position(eye), eyelid, image);
        }

        if let Some(fps) = self.fps.frame(now) {
            debug!(fps, state = state.as_str(), "Frame rate");
        }
        if self.cfg.overlay.show_debug_grid {
            self.draw_debug(state);
        }

        for (channel, fb) in self.frames.iter().enumerate() {
            self.sink.select(channel)?;
            self.sink.present(fb)?;
        }
        Ok(state)
    }

    /// Fresh grid -> fresh target. No data keeps the previous target.
    fn poll_sensor(&mut self) {
        if !self.sensor.poll_ready() {
            return;
        }
        match self.sensor.read() {
            Ok(grid) => {
                trace!(sensor = self.sensor.name(), "\n{grid}");
                self.target = find_target(&grid, &self.cfg.tracker);
                if let Some(recorder) = &mut self.recorder {
                    if let Err(e) = recorder.record(&grid) {
                        warn!(error = %e, "Recording stopped");
                        self.recorder = None;
                    }
                }
                self.grid = grid;
            }
            Err(e) => warn!(sensor = self.sensor.name(), error = %e, "Sensor read failed, keeping last target"),
        }
    }

    /// Depth grid, aim marker, state and FPS on the right-hand panel.
    fn draw_debug(&mut self, state: MotionState) {
        let size = self.cfg.overlay.debug_grid_size as i32;
        let aim = self.motion.aim();
        let Some(fb) = self.frames.last_mut() else {
            return;
        };
        let x = (fb.width as i32 - size) / 2;
        let y = (fb.height as i32 - size) / 2;

        draw_depth_grid(fb, x, y, size, &self.grid, self.target.cell);
        draw_aim_marker(fb, x, y, size, aim, GREEN);
        draw_text_centered(fb, y - 3 - text_height(1), state.as_str(), WHITE, 1);
        draw_text_centered(fb, y + size + 3, self.fps.text(), WHITE, 1);
    }

    /// Flush whatever the recorder buffered.
    pub fn finish(&mut self) -> Result<()> {
        if let Some(recorder) = &mut self.recorder {
            recorder.flush()?;
            info!(frames = recorder.frames(), "Recording saved");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::MemorySink;
    use crate::palette::{to_bus, RED};
    use crate::render::RenderConfig;
    use crate::sensor::{DisabledSensor, SimulatedSensor};
    use std::alloc::{GlobalAlloc, Layout, System};
    use std::cell::Cell;
    use std::path::Path;
    use tempfile::TempDir;

    // Counts heap allocations made by the current thread, so parallel tests
    // don't see each other's traffic.
    struct CountingAlloc;

    thread_local! {
        static ALLOCS: Cell<usize> = const { Cell::new(0) };
    }

    fn bump() {
        let _ = ALLOCS.try_with(|c| c.set(c.get() + 1));
    }

    unsafe impl GlobalAlloc for CountingAlloc {
        unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
            bump();
            unsafe { System.alloc(layout) }
        }

        unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
            unsafe { System.dealloc(ptr, layout) }
        }

        unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
            bump();
            unsafe { System.realloc(ptr, layout, new_size) }
        }
    }

    #[global_allocator]
    static GLOBAL: CountingAlloc = CountingAlloc;

    fn allocations() -> usize {
        ALLOCS.with(Cell::get)
    }

    const BLUE: u16 = 0x001F;
    const PANEL: usize = 40;
    const TEX: usize = 60;

    fn write_flat(path: &Path, color: u16) {
        let bytes: Vec<u8> = std::iter::repeat_n(color.to_le_bytes(), TEX * TEX).flatten().collect();
        std::fs::write(path, bytes).unwrap();
    }

    /// Small panels, flat textures (idle blue, tracking green) that always cover the panel.
    fn test_config(dir: &TempDir) -> Config {
        let idle = dir.path().join("idle.bin");
        let tracking = dir.path().join("tracking.bin");
        write_flat(&idle, BLUE);
        write_flat(&tracking, GREEN);

        let mut cfg = Config::default()
            .with_textures(idle, tracking)
            .with_debug_grid(false)
            .with_saccade_seed(Some(7));
        cfg.render = RenderConfig {
            panel_width: PANEL,
            panel_height: PANEL,
            texture_width: TEX,
            texture_height: TEX,
            max_offset_px: 10,
            resting_offset: (PANEL as i32 - TEX as i32) / 2,
            ..RenderConfig::default()
        };
        cfg.overlay.debug_grid_size = 24;
        cfg
    }

    fn simulated() -> Box<dyn SensorAdapter> {
        let mut s = SimulatedSensor::new(Duration::from_secs(60));
        s.init().unwrap();
        Box::new(s)
    }

    fn centre(sink: &MemorySink, channel: usize) -> u16 {
        sink.frame(channel).unwrap().get(PANEL / 2, PANEL / 2)
    }

    #[test]
    fn test_tick_tracks_simulated_target() {
        let dir = TempDir::new().unwrap();
        let now = Instant::now();
        let sink = MemorySink::new(2, PANEL, PANEL);
        let mut rig = EyeRig::new(test_config(&dir), simulated(), sink, now).unwrap();

        let state = rig.tick(now).unwrap();
        assert_eq!(state, MotionState::Tracking);
        assert!(rig.target().is_valid);
        assert_eq!(rig.sink().selects(), 2);
        assert_eq!(rig.sink().presents(), 2);
        assert_eq!(centre(rig.sink(), 0), to_bus(GREEN));
        assert_eq!(centre(rig.sink(), 1), to_bus(GREEN));
        // corners are outside the round panel
        assert_eq!(rig.sink().frame(0).unwrap().get(0, 0), to_bus(BLACK));
    }

    #[test]
    fn test_eyes_move_toward_target() {
        let dir = TempDir::new().unwrap();
        let start = Instant::now();
        let mut rig = EyeRig::new(test_config(&dir), simulated(), MemorySink::new(2, PANEL, PANEL), start).unwrap();
        for i in 0..30 {
            rig.tick(start + Duration::from_millis(33 * i)).unwrap();
        }
        let t = *rig.target();
        let eye = rig.motion().eye_position(0);
        assert!((eye.x - t.x).abs() < 0.01 && (eye.y - t.y).abs() < 0.01);
        assert_eq!(rig.motion().eye_position(1), eye);
    }

    #[test]
    fn test_disabled_sensor_idles() {
        let dir = TempDir::new().unwrap();
        let now = Instant::now();
        let sink = MemorySink::new(2, PANEL, PANEL);
        let mut rig = EyeRig::new(test_config(&dir), Box::new(DisabledSensor), sink, now).unwrap();

        for i in 0..5 {
            let state = rig.tick(now + Duration::from_millis(100 * i)).unwrap();
            assert_eq!(state, MotionState::IdleSaccade);
        }
        assert!(!rig.target().is_valid);
        assert_eq!(centre(rig.sink(), 0), to_bus(BLUE));
    }

    #[test]
    fn test_missing_textures_leave_panels_blank() {
        let dir = TempDir::new().unwrap();
        let cfg = test_config(&dir).with_textures(dir.path().join("nope.bin"), dir.path().join("nope2.bin"));
        let now = Instant::now();
        let mut rig = EyeRig::new(cfg, simulated(), MemorySink::new(2, PANEL, PANEL), now).unwrap();
        rig.tick(now).unwrap();
        for ch in 0..2 {
            assert!(rig.sink().frame(ch).unwrap().pixels.iter().all(|&p| p == to_bus(BLACK)));
        }
    }

    #[test]
    fn test_debug_grid_only_on_right_panel() {
        let dir = TempDir::new().unwrap();
        let cfg = test_config(&dir).with_debug_grid(true);
        let now = Instant::now();
        let mut rig = EyeRig::new(cfg, simulated(), MemorySink::new(2, PANEL, PANEL), now).unwrap();
        rig.tick(now).unwrap();

        let has_red = |ch: usize| rig.sink().frame(ch).unwrap().pixels.contains(&to_bus(RED));
        assert!(!has_red(0));
        assert!(has_red(1));
    }

    #[test]
    fn test_sink_with_too_few_channels_rejected() {
        let dir = TempDir::new().unwrap();
        let result = EyeRig::new(test_config(&dir), simulated(), MemorySink::new(1, PANEL, PANEL), Instant::now());
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_splash_reaches_every_panel() {
        let dir = TempDir::new().unwrap();
        let mut rig = EyeRig::new(test_config(&dir), simulated(), MemorySink::new(2, PANEL, PANEL), Instant::now()).unwrap();
        rig.splash().unwrap();
        assert_eq!(rig.sink().presents(), 2);
        assert!(rig.sink().frame(1).unwrap().pixels.contains(&to_bus(WHITE)));
    }

    #[test]
    fn test_ticks_do_not_allocate() {
        let dir = TempDir::new().unwrap();
        let cfg = test_config(&dir).with_debug_grid(true);
        let t0 = Instant::now();
        let mut rig = EyeRig::new(cfg, simulated(), MemorySink::new(2, PANEL, PANEL), t0).unwrap();

        // first second: the sink keeps its own copy of each frame, first
        // state change and first FPS refresh happen here
        for ms in (0..=1000).step_by(100) {
            rig.tick(t0 + Duration::from_millis(ms)).unwrap();
        }

        // second second, including the tick that refreshes the FPS label
        let before = allocations();
        for ms in (1100..=2000).step_by(100) {
            rig.tick(t0 + Duration::from_millis(ms)).unwrap();
        }
        assert_eq!(allocations() - before, 0);
        assert_eq!(rig.fps.text(), "FPS: 10.0");
    }

    #[test]
    fn test_fps_meter_reports_once_per_second() {
        let t0 = Instant::now();
        let mut fps = FpsMeter::new(t0);
        for i in 1..10 {
            assert!(fps.frame(t0 + Duration::from_millis(100 * i)).is_none());
        }
        let rate = fps.frame(t0 + Duration::from_secs(1)).unwrap();
        assert!((rate - 10.0).abs() < 1e-3);
        assert_eq!(fps.text(), "FPS: 10.0");
    }
}
