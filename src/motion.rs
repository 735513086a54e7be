// Where the eyes should look this tick.
// TRACKING     : a target is visible, aim at it.
// IDLE_HOLD    : target just vanished, keep staring where it was (grace period).
// IDLE_SACCADE : nothing seen for a while, dart to a random point every interval.
// Whatever the state, each eye eases toward the chosen aim by `gain` per tick.

use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use crate::types::{EyeImage, EyePosition, Target};

#[derive(Clone, Debug)]
pub struct MotionConfig {
    /// Time between two random idle points.
    pub saccade_interval: Duration,
    /// How long to hold the last known position after losing a target.
    pub grace_period: Duration,
    /// Fraction of the remaining distance closed per tick, in (0, 1].
    pub gain: f32,
    /// Fixed RNG seed for reproducible saccades; `None` seeds from the OS.
    pub seed: Option<u64>,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            saccade_interval: Duration::from_millis(1500),
            grace_period: Duration::from_millis(2000),
            gain: 0.2,
            seed: None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MotionState {
    Tracking,
    IdleHold,
    IdleSaccade,
}

impl MotionState {
    pub fn as_str(self) -> &'static str {
        match self {
            MotionState::Tracking => "TRACK",
            MotionState::IdleHold => "HOLD",
            MotionState::IdleSaccade => "SACCADE",
        }
    }
}

pub struct MotionController {
    cfg: MotionConfig,
    state: MotionState,
    /// Last tick with a valid target; `None` until the first one.
    last_track: Option<Instant>,
    last_saccade: Instant,
    saccade_point: EyePosition,
    last_known: EyePosition,
    aim: EyePosition,
    eyes: Vec<EyePosition>,
    rng: StdRng,
}

impl MotionController {
    /// Starts idle, all eyes at rest, first saccade one interval after `now`.
    pub fn new(cfg: MotionConfig, eye_count: usize, now: Instant) -> Self {
        let rng = match cfg.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self {
            cfg,
            state: MotionState::IdleSaccade,
            last_track: None,
            last_saccade: now,
            saccade_point: EyePosition::REST,
            last_known: EyePosition::REST,
            aim: EyePosition::REST,
            eyes: vec![EyePosition::REST; eye_count],
            rng,
        }
    }

    /// Advance one tick. Total over every input; returns the new state.
    pub fn update(&mut self, target: &Target, now: Instant) -> MotionState {
        let next = if target.is_valid {
            self.last_track = Some(now);
            self.last_known = EyePosition::new(target.x, target.y);
            self.aim = self.last_known;
            MotionState::Tracking
        } else if self
            .last_track
            .is_some_and(|t| now.saturating_duration_since(t) < self.cfg.grace_period)
        {
            self.aim = self.last_known;
            MotionState::IdleHold
        } else {
            if now.saturating_duration_since(self.last_saccade) > self.cfg.saccade_interval {
                self.last_saccade = now;
                self.saccade_point = EyePosition::new(
                    self.rng.random_range(-1.0..=1.0),
                    self.rng.random_range(-1.0..=1.0),
                );
                debug!(x = self.saccade_point.x, y = self.saccade_point.y, "New saccade point");
            }
            self.aim = self.saccade_point;
            MotionState::IdleSaccade
        };

        if next != self.state {
            debug!(from = self.state.as_str(), to = next.as_str(), "Motion state change");
            self.state = next;
        }

        // Both eyes share aim and gain, so they move in lockstep.
        let gain = self.cfg.gain;
        for eye in &mut self.eyes {
            eye.x += (self.aim.x - eye.x) * gain;
            eye.y += (self.aim.y - eye.y) * gain;
        }

        self.state
    }

    pub fn state(&self) -> MotionState {
        self.state
    }

    /// The point the eyes are easing toward.
    pub fn aim(&self) -> EyePosition {
        self.aim
    }

    /// Smoothed position of one eye; out-of-range indices read as rest.
    pub fn eye_position(&self, eye: usize) -> EyePosition {
        self.eyes.get(eye).copied().unwrap_or(EyePosition::REST)
    }

    #[cfg(test)]
    pub fn positions(&self) -> &[EyePosition] {
        &self.eyes
    }

    /// Focused art while tracking, relaxed art otherwise.
    pub fn image(&self) -> EyeImage {
        match self.state {
            MotionState::Tracking => EyeImage::Tracking,
            MotionState::IdleHold | MotionState::IdleSaccade => EyeImage::Idle,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn seeded() -> MotionConfig {
        MotionConfig { seed: Some(7), ..MotionConfig::default() }
    }

    fn valid(x: f32, y: f32) -> Target {
        Target { x, y, distance_mm: 200, is_valid: true, score: 200, cell: None }
    }

    #[test]
    fn test_starts_idle_at_rest() {
        let mc = MotionController::new(seeded(), 2, Instant::now());
        assert_eq!(mc.state(), MotionState::IdleSaccade);
        assert_eq!(mc.positions(), &[EyePosition::REST, EyePosition::REST]);
        assert_eq!(mc.image(), EyeImage::Idle);
    }

    #[test]
    fn test_tracks_on_first_valid_tick() {
        let t0 = Instant::now();
        let mut mc = MotionController::new(seeded(), 2, t0);
        let state = mc.update(&valid(0.5, -0.5), t0 + Duration::from_millis(10));
        assert_eq!(state, MotionState::Tracking);
        assert_eq!(mc.image(), EyeImage::Tracking);
        assert_eq!(mc.aim(), EyePosition::new(0.5, -0.5));
        let p = mc.eye_position(0);
        assert!((p.x - 0.1).abs() < 1e-6);
        assert!((p.y + 0.1).abs() < 1e-6);
    }

    #[test]
    fn test_holds_through_grace_then_saccades() {
        let t0 = Instant::now();
        let mut mc = MotionController::new(seeded(), 2, t0);
        mc.update(&valid(0.8, 0.2), t0);

        for ms in [1, 500, 1999] {
            let s = mc.update(&Target::none(), t0 + Duration::from_millis(ms));
            assert_eq!(s, MotionState::IdleHold, "at {ms} ms");
            assert_eq!(mc.aim(), EyePosition::new(0.8, 0.2));
        }
        let s = mc.update(&Target::none(), t0 + Duration::from_millis(2000));
        assert_eq!(s, MotionState::IdleSaccade);
        assert_eq!(mc.image(), EyeImage::Idle);
    }

    #[test]
    fn test_saccade_point_changes_only_after_interval() {
        let t0 = Instant::now();
        let mut mc = MotionController::new(seeded(), 1, t0);

        mc.update(&Target::none(), t0 + Duration::from_millis(100));
        assert_eq!(mc.aim(), EyePosition::REST);

        mc.update(&Target::none(), t0 + Duration::from_millis(1501));
        let first = mc.aim();
        assert!((-1.0..=1.0).contains(&first.x) && (-1.0..=1.0).contains(&first.y));

        mc.update(&Target::none(), t0 + Duration::from_millis(2500));
        assert_eq!(mc.aim(), first);

        mc.update(&Target::none(), t0 + Duration::from_millis(3002));
        assert_ne!(mc.aim(), first);
    }

    #[test]
    fn test_same_seed_same_saccades() {
        let t0 = Instant::now();
        let mut a = MotionController::new(seeded(), 1, t0);
        let mut b = MotionController::new(seeded(), 1, t0);
        for step in 1..20u64 {
            let now = t0 + Duration::from_millis(step * 400);
            a.update(&Target::none(), now);
            b.update(&Target::none(), now);
            assert_eq!(a.aim(), b.aim());
        }
    }

    #[test]
    fn test_eyes_move_in_lockstep() {
        let t0 = Instant::now();
        let mut mc = MotionController::new(seeded(), 2, t0);
        for i in 0..30u64 {
            mc.update(&valid(-0.3, 0.9), t0 + Duration::from_millis(i * 33));
        }
        assert_eq!(mc.eye_position(0), mc.eye_position(1));
        assert_eq!(mc.eye_position(5), EyePosition::REST);
    }

    proptest! {
        #[test]
        fn prop_smoothing_is_fixed_at_equality(x in -1.0f32..=1.0, y in -1.0f32..=1.0, gain in 0.01f32..=1.0) {
            let t0 = Instant::now();
            let cfg = MotionConfig { gain: 1.0, ..seeded() };
            let mut mc = MotionController::new(cfg, 1, t0);
            // gain 1.0 lands exactly on the aim
            mc.update(&valid(x, y), t0);
            prop_assert_eq!(mc.eye_position(0), EyePosition::new(x, y));
            mc.cfg.gain = gain;
            mc.update(&valid(x, y), t0 + Duration::from_millis(1));
            prop_assert_eq!(mc.eye_position(0), EyePosition::new(x, y));
        }

        #[test]
        fn prop_smoothing_never_overshoots(x in -1.0f32..=1.0, y in -1.0f32..=1.0, gain in 0.01f32..=1.0) {
            let t0 = Instant::now();
            let cfg = MotionConfig { gain, ..seeded() };
            let mut mc = MotionController::new(cfg, 1, t0);
            mc.update(&valid(x, y), t0);
            let p = mc.eye_position(0);
            prop_assert!(p.x.abs() <= x.abs() + 1e-6);
            prop_assert!(p.y.abs() <= y.abs() + 1e-6);
        }
    }
}
