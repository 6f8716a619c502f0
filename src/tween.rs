//! Eased value animation for scripted sprites: named easing curves, a
//! per-frame tween and the saved motion state of a sprite.

use std::f64::consts::{FRAC_PI_2, PI};

use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::{PfxError, Result};

/// Host frame rate tweens are timed against.
pub const FRAMES_PER_SECOND: f64 = 60.0;

/// Milliseconds to whole frames, truncated.
pub fn frames(ms: i32) -> u32 {
    (FRAMES_PER_SECOND * ms.max(0) as f64 / 1000.0) as u32
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Easing {
    #[default]
    Linear,
    QuadraticIn,
    QuadraticOut,
    QuadraticInOut,
    CubicIn,
    CubicOut,
    CubicInOut,
    SinusoidalIn,
    SinusoidalOut,
    SinusoidalInOut,
    ExponentialIn,
    ExponentialOut,
    ExponentialInOut,
    CircularIn,
    CircularOut,
    CircularInOut,
}

impl Easing {
    pub const ALL: [Easing; 16] = [
        Easing::Linear,
        Easing::QuadraticIn,
        Easing::QuadraticOut,
        Easing::QuadraticInOut,
        Easing::CubicIn,
        Easing::CubicOut,
        Easing::CubicInOut,
        Easing::SinusoidalIn,
        Easing::SinusoidalOut,
        Easing::SinusoidalInOut,
        Easing::ExponentialIn,
        Easing::ExponentialOut,
        Easing::ExponentialInOut,
        Easing::CircularIn,
        Easing::CircularOut,
        Easing::CircularInOut,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Easing::Linear => "linear",
            Easing::QuadraticIn => "quadratic in",
            Easing::QuadraticOut => "quadratic out",
            Easing::QuadraticInOut => "quadratic in/out",
            Easing::CubicIn => "cubic in",
            Easing::CubicOut => "cubic out",
            Easing::CubicInOut => "cubic in/out",
            Easing::SinusoidalIn => "sinusoidal in",
            Easing::SinusoidalOut => "sinusoidal out",
            Easing::SinusoidalInOut => "sinusoidal in/out",
            Easing::ExponentialIn => "exponential in",
            Easing::ExponentialOut => "exponential out",
            Easing::ExponentialInOut => "exponential in/out",
            Easing::CircularIn => "circular in",
            Easing::CircularOut => "circular out",
            Easing::CircularInOut => "circular in/out",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Easing::ALL.into_iter().find(|e| e.name() == name)
    }

    /// Like [`Easing::from_name`], but unknown names warn and become linear.
    /// An empty name is linear without a warning.
    pub fn from_name_or_linear(name: &str) -> Self {
        if name.is_empty() {
            return Easing::Linear;
        }
        Easing::from_name(name).unwrap_or_else(|| {
            warn!("Unsupported easing mode '{name}', using linear");
            Easing::Linear
        })
    }

    /// Value at time `t` of a change from `b` by `c` over duration `d`.
    pub fn apply(self, t: f64, b: f64, c: f64, d: f64) -> f64 {
        match self {
            Easing::Linear => c * t / d + b,
            Easing::QuadraticIn => {
                let t = t / d;
                c * t * t + b
            }
            Easing::QuadraticOut => {
                let t = t / d;
                -c * t * (t - 2.0) + b
            }
            Easing::QuadraticInOut => {
                let t = t / (d / 2.0);
                if t < 1.0 {
                    c / 2.0 * t * t + b
                } else {
                    let t = t - 1.0;
                    -c / 2.0 * (t * (t - 2.0) - 1.0) + b
                }
            }
            Easing::CubicIn => {
                let t = t / d;
                c * t * t * t + b
            }
            Easing::CubicOut => {
                let t = t / d - 1.0;
                c * (t * t * t + 1.0) + b
            }
            Easing::CubicInOut => {
                let t = t / (d / 2.0);
                if t < 1.0 {
                    c / 2.0 * t * t * t + b
                } else {
                    let t = t - 2.0;
                    c / 2.0 * (t * t * t + 2.0) + b
                }
            }
            Easing::SinusoidalIn => -c * (t / d * FRAC_PI_2).cos() + c + b,
            Easing::SinusoidalOut => c * (t / d * FRAC_PI_2).sin() + b,
            Easing::SinusoidalInOut => -c / 2.0 * ((PI * t / d).cos() - 1.0) + b,
            Easing::ExponentialIn => c * 2f64.powf(10.0 * (t / d - 1.0)) + b,
            Easing::ExponentialOut => c * (1.0 - 2f64.powf(-10.0 * t / d)) + b,
            Easing::ExponentialInOut => {
                let t = t / (d / 2.0);
                if t < 1.0 {
                    c / 2.0 * 2f64.powf(10.0 * (t - 1.0)) + b
                } else {
                    let t = t - 1.0;
                    c / 2.0 * (2.0 - 2f64.powf(-10.0 * t)) + b
                }
            }
            Easing::CircularIn => {
                let t = t / d;
                -c * ((1.0 - t * t).sqrt() - 1.0) + b
            }
            Easing::CircularOut => {
                let t = t / d - 1.0;
                c * (1.0 - t * t).sqrt() + b
            }
            Easing::CircularInOut => {
                let t = t / (d / 2.0);
                if t < 1.0 {
                    -c / 2.0 * ((1.0 - t * t).sqrt() - 1.0) + b
                } else {
                    let t = t - 2.0;
                    c / 2.0 * ((1.0 - t * t).sqrt() + 1.0) + b
                }
            }
        }
    }
}

impl From<String> for Easing {
    fn from(name: String) -> Self {
        Easing::from_name_or_linear(&name)
    }
}

impl From<Easing> for String {
    fn from(e: Easing) -> Self {
        e.name().to_string()
    }
}

/// A value moving from `start` to `finish` over `finish_frame` frames.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tween {
    pub start: f64,
    pub finish: f64,
    pub current: f64,
    pub current_frame: u32,
    pub finish_frame: u32,
    pub easing: Easing,
    /// Per-frame increments, filled on the first step
    #[serde(skip)]
    deltas: Vec<f64>,
}

impl Tween {
    /// A value that never changes.
    pub fn fixed(value: f64) -> Self {
        Tween {
            start: value,
            finish: value,
            current: value,
            current_frame: 0,
            finish_frame: 0,
            easing: Easing::Linear,
            deltas: Vec::new(),
        }
    }

    pub fn new(start: f64, finish: f64, frames: u32, easing: Easing) -> Self {
        Tween {
            start,
            finish,
            current: start,
            current_frame: 0,
            finish_frame: frames,
            easing,
            deltas: Vec::new(),
        }
    }

    pub fn is_finished(&self) -> bool {
        !(self.finish_frame > 0 && self.current_frame <= self.finish_frame)
    }

    /// Step one frame and return the new value. The last step lands on `finish`.
    pub fn next_frame(&mut self) -> f64 {
        if self.is_finished() {
            return self.current;
        }
        if self.deltas.is_empty() {
            self.precalculate();
        }
        if let Some(delta) = self.deltas.get(self.current_frame as usize) {
            self.current += delta;
        }
        self.current_frame += 1;
        self.current
    }

    fn precalculate(&mut self) {
        let n = self.finish_frame as usize;
        let d = self.finish_frame as f64;
        let c = self.finish - self.start;
        self.deltas = vec![0.0; n + 1];

        let mut prev = self.start;
        for i in 1..n {
            let e = self.easing.apply(i as f64, self.start, c, d);
            self.deltas[i] = e - prev;
            prev = e;
        }
        self.deltas[n] = self.finish - prev;
    }
}

/// Current save layout; version 1 records carry no tweens.
pub const MOTION_VERSION: u32 = 2;

/// Position and zoom animation of one scripted sprite.
#[derive(Debug, Clone, PartialEq)]
pub struct SpriteMotion {
    pub movement_x: Tween,
    pub movement_y: Tween,
    /// Percent
    pub zoom_x: Tween,
    pub zoom_y: Tween,
}

impl Default for SpriteMotion {
    fn default() -> Self {
        SpriteMotion {
            movement_x: Tween::fixed(160.0),
            movement_y: Tween::fixed(120.0),
            zoom_x: Tween::fixed(100.0),
            zoom_y: Tween::fixed(100.0),
        }
    }
}

#[derive(Serialize, Deserialize)]
struct MotionRecord {
    #[serde(default = "first_version")]
    version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    movement_x: Option<Tween>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    movement_y: Option<Tween>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    zoom_x: Option<Tween>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    zoom_y: Option<Tween>,
}

fn first_version() -> u32 {
    1
}

impl SpriteMotion {
    pub fn move_to(&mut self, x: f64, y: f64, ms: i32, easing: Easing) {
        let n = frames(ms);
        self.movement_x = Tween::new(self.movement_x.current, x, n, easing);
        self.movement_y = Tween::new(self.movement_y.current, y, n, easing);
    }

    pub fn move_by(&mut self, dx: f64, dy: f64, ms: i32, easing: Easing) {
        let (x, y) = (self.movement_x.current + dx, self.movement_y.current + dy);
        self.move_to(x, y, ms, easing);
    }

    pub fn zoom_to(&mut self, zoom_x: f64, zoom_y: f64, ms: i32, easing: Easing) {
        let n = frames(ms);
        self.zoom_x = Tween::new(self.zoom_x.current, zoom_x, n, easing);
        self.zoom_y = Tween::new(self.zoom_y.current, zoom_y, n, easing);
    }

    /// Advance every tween; returns `(x, y, zoom_x, zoom_y)` with zoom as a factor.
    pub fn next_frame(&mut self) -> (f64, f64, f64, f64) {
        (
            self.movement_x.next_frame(),
            self.movement_y.next_frame(),
            self.zoom_x.next_frame() / 100.0,
            self.zoom_y.next_frame() / 100.0,
        )
    }

    pub fn to_json(&self) -> Result<String> {
        let record = MotionRecord {
            version: MOTION_VERSION,
            movement_x: Some(self.movement_x.clone()),
            movement_y: Some(self.movement_y.clone()),
            zoom_x: Some(self.zoom_x.clone()),
            zoom_y: Some(self.zoom_y.clone()),
        };
        Ok(serde_json::to_string(&record)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let record: MotionRecord = serde_json::from_str(json)?;
        if record.version > MOTION_VERSION {
            return Err(PfxError::UnsupportedVersion(record.version));
        }
        let mut motion = SpriteMotion::default();
        if record.version > 1 {
            let or = |t: Option<Tween>, d: Tween| t.unwrap_or(d);
            motion.movement_x = or(record.movement_x, motion.movement_x);
            motion.movement_y = or(record.movement_y, motion.movement_y);
            motion.zoom_x = or(record.zoom_x, motion.zoom_x);
            motion.zoom_y = or(record.zoom_y, motion.zoom_y);
        }
        Ok(motion)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_round_trip() {
        for e in Easing::ALL {
            assert_eq!(Easing::from_name(e.name()), Some(e));
        }
        assert_eq!(Easing::from_name("bounce"), None);
    }

    #[test]
    fn test_unknown_easing_is_linear() {
        assert_eq!(Easing::from_name_or_linear("elastic"), Easing::Linear);
        assert_eq!(Easing::from_name_or_linear(""), Easing::Linear);
        assert_eq!(Easing::from_name_or_linear("cubic in/out"), Easing::CubicInOut);
    }

    #[test]
    fn test_curves_hit_their_endpoints() {
        for e in Easing::ALL {
            let end = e.apply(10.0, 5.0, 20.0, 10.0);
            assert!((end - 25.0).abs() < 0.05, "{} ends at {end}", e.name());
        }
        assert_eq!(Easing::Linear.apply(5.0, 0.0, 10.0, 10.0), 5.0);
        assert!(Easing::QuadraticIn.apply(5.0, 0.0, 10.0, 10.0) < 5.0);
        assert!(Easing::QuadraticOut.apply(5.0, 0.0, 10.0, 10.0) > 5.0);
    }

    #[test]
    fn test_every_tween_lands_on_finish() {
        for e in Easing::ALL {
            let mut t = Tween::new(10.0, -30.0, 12, e);
            let mut last = 0.0;
            while !t.is_finished() {
                last = t.next_frame();
            }
            assert!((last + 30.0).abs() < 1e-9, "{}", e.name());
            assert_eq!(t.next_frame(), last);
        }
    }

    #[test]
    fn test_linear_steps_evenly() {
        let mut t = Tween::new(0.0, 40.0, 4, Easing::Linear);
        let steps: Vec<f64> = (0..5).map(|_| t.next_frame()).collect();
        assert_eq!(steps, vec![0.0, 10.0, 20.0, 30.0, 40.0]);
    }

    #[test]
    fn test_frames_from_ms() {
        assert_eq!(frames(1000), 60);
        assert_eq!(frames(250), 15);
        assert_eq!(frames(-5), 0);
    }

    #[test]
    fn test_version_one_loads_defaults() {
        let motion = SpriteMotion::from_json(r#"{"version": 1}"#).unwrap();
        assert_eq!(motion, SpriteMotion::default());
        let motion = SpriteMotion::from_json("{}").unwrap();
        assert_eq!(motion.movement_x.current, 160.0);
    }

    #[test]
    fn test_motion_save_restores_tweens_mid_flight() {
        let mut motion = SpriteMotion::default();
        motion.move_by(40.0, 0.0, 1000, Easing::SinusoidalOut);
        for _ in 0..10 {
            motion.next_frame();
        }
        let json = motion.to_json().unwrap();
        assert!(json.contains("\"sinusoidal out\""));

        let mut restored = SpriteMotion::from_json(&json).unwrap();
        assert_eq!(restored.movement_x.current_frame, 10);
        assert_eq!(restored.movement_x.easing, Easing::SinusoidalOut);
        for _ in 0..60 {
            restored.next_frame();
            motion.next_frame();
        }
        assert!((restored.movement_x.current - 200.0).abs() < 1e-9);
        assert!((restored.movement_x.current - motion.movement_x.current).abs() < 1e-9);
    }

    #[test]
    fn test_newer_motion_version_is_rejected() {
        let err = SpriteMotion::from_json(r#"{"version": 9}"#);
        assert!(matches!(err, Err(PfxError::UnsupportedVersion(9))));
    }
}
