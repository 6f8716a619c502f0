use serde::{Deserialize, Serialize};

use super::buffer::Forces;

/// Degrees to radians
const DEG: f32 = 0.017_453_292;
/// Ticks per second; script velocities are given per second.
pub const TICKS_PER_SECOND: f32 = 60.0;
/// Script gravity and attraction factors are divided by this.
pub const FORCE_DIVISOR: f32 = 600.0;
/// Longest particle lifetime in ticks.
pub const MAX_FADE: usize = 255;
/// Most particles per burst batch or per stream emission.
pub const MAX_AMOUNT: usize = 4096;

/// How initial positions and velocities are chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Generator {
    /// Start at the origin (plus jitter), fly out inside the angle range
    #[default]
    #[serde(rename = "standard")]
    Basic,
    /// Start on a ring around the origin and fly back inward, twisted by the secondary angle
    Radial,
}

impl Generator {
    /// Match a script name by prefix, case-insensitively ("Radial", "standard2", ...).
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.to_ascii_lowercase();
        if name.starts_with("standard") {
            Some(Generator::Basic)
        } else if name.starts_with("radial") {
            Some(Generator::Radial)
        } else {
            None
        }
    }
}

/// Simulation parameters shared by bursts and streams.
///
/// Values are stored in per-tick units and radians; the setters take the
/// script-level units and convert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EffectParams {
    /// Particles per emission
    pub amount: usize,
    /// Lifetime in ticks, 1..=255
    pub fade: usize,
    /// Ticks the start colour is held before blending, < fade
    pub delay: usize,

    /// Ring radius for the radial generator
    pub radius: f32,
    pub random_radius: f32,
    /// Half-width of the uniform position jitter
    pub random_x: f32,
    pub random_y: f32,

    pub speed: f32,
    pub random_speed: f32,

    pub size_start: f32,
    pub size_end: f32,

    pub gravity_x: f32,
    pub gravity_y: f32,

    pub attraction_x: f32,
    pub attraction_y: f32,
    pub attraction: f32,

    /// Lower bound of the emission angle
    pub alpha: f32,
    /// Width of the emission angle range
    pub beta: f32,
    /// Secondary twist added to radial velocities
    pub theta: f32,

    /// Packed 0xRRGGBB
    pub color_start: u32,
    pub color_end: u32,

    /// Emit every Nth tick (streams)
    pub interval: u32,
    /// Ignore the map scroll position when drawing
    pub screen_relative: bool,

    pub texture: Option<String>,
    pub generator: Generator,
}

impl Default for EffectParams {
    fn default() -> Self {
        EffectParams {
            amount: 50,
            fade: 30,
            delay: 0,
            radius: 50.0,
            random_radius: 0.0,
            random_x: 0.0,
            random_y: 0.0,
            speed: 0.5,
            random_speed: 0.5,
            size_start: 1.0,
            size_end: 1.0,
            gravity_x: 0.0,
            gravity_y: 0.0,
            attraction_x: 0.0,
            attraction_y: 0.0,
            attraction: 0.0,
            alpha: 0.0,
            beta: 6.2832,
            theta: 0.0,
            color_start: 0xffffff,
            color_end: 0xffffff,
            interval: 1,
            screen_relative: false,
            texture: None,
            generator: Generator::Basic,
        }
    }
}

impl EffectParams {
    /// Clamp `fade` into 1..=255 and `delay` into 0..fade.
    pub fn set_timeout(&mut self, fade: i32, delay: i32) {
        let fade = fade.clamp(1, MAX_FADE as i32);
        self.fade = fade as usize;
        self.delay = delay.clamp(0, fade - 1) as usize;
    }

    /// Clamped into `1..=MAX_AMOUNT`.
    pub fn set_amount(&mut self, amount: i32) {
        self.amount = amount.clamp(1, MAX_AMOUNT as i32) as usize;
    }

    /// `center` and `spread` in degrees; particles leave within `center ± spread/2`.
    pub fn set_angle(&mut self, center: f32, spread: f32) {
        let center = center * DEG;
        let spread = spread * DEG;
        self.beta = spread.abs();
        self.alpha = center - spread / 2.0;
    }

    /// Degrees, wrapped into -360..=360 first.
    pub fn set_secondary_angle(&mut self, degrees: f32) {
        let mut v = degrees;
        while v > 360.0 {
            v -= 360.0;
        }
        while v < -360.0 {
            v += 360.0;
        }
        self.theta = v * DEG;
    }

    /// Pixels per second.
    pub fn set_velocity(&mut self, speed: f32, random_speed: f32) {
        self.speed = speed / TICKS_PER_SECOND;
        self.random_speed = random_speed / TICKS_PER_SECOND;
    }

    pub fn set_radius(&mut self, radius: i32) {
        self.radius = radius as f32;
    }

    pub fn set_random_radius(&mut self, radius: i32) {
        self.random_radius = radius.unsigned_abs() as f32;
    }

    pub fn set_random_position(&mut self, x: i32, y: i32) {
        self.random_x = x.unsigned_abs() as f32;
        self.random_y = y.unsigned_abs() as f32;
    }

    pub fn set_growth(&mut self, start: f32, end: f32) {
        self.size_start = start;
        self.size_end = end;
    }

    /// Constant pull towards `degrees` with script strength `factor`.
    pub fn set_gravity_direction(&mut self, degrees: f32, factor: f32) {
        let a = degrees * DEG;
        self.gravity_x = factor * a.cos() / FORCE_DIVISOR;
        self.gravity_y = factor * a.sin() / FORCE_DIVISOR;
    }

    pub fn set_acceleration_point(&mut self, x: f32, y: f32, factor: f32) {
        self.attraction_x = x;
        self.attraction_y = y;
        self.attraction = factor / FORCE_DIVISOR;
    }

    /// Intervals below one are ignored.
    pub fn set_interval(&mut self, interval: i32) -> bool {
        if interval < 1 {
            return false;
        }
        self.interval = interval as u32;
        true
    }

    pub fn set_color_start(&mut self, r: u8, g: u8, b: u8) {
        self.color_start = pack(r, g, b);
    }

    pub fn set_color_end(&mut self, r: u8, g: u8, b: u8) {
        self.color_end = pack(r, g, b);
    }

    /// Pull values that did not come through the setters, such as a loaded
    /// save record, back into the ranges the setters allow.
    pub fn sanitize(&mut self) {
        let to_i32 = |v: usize| v.min(i32::MAX as usize) as i32;
        self.set_timeout(to_i32(self.fade), to_i32(self.delay));
        self.set_amount(to_i32(self.amount));
        self.interval = self.interval.max(1);
    }

    /// Scale change per tick so particles reach `size_end` when they expire.
    pub fn size_step(&self) -> f32 {
        (self.size_end - self.size_start) / self.fade as f32
    }

    pub fn forces(&self) -> Forces {
        Forces {
            gx: self.gravity_x,
            gy: self.gravity_y,
            ax: self.attraction_x,
            ay: self.attraction_y,
            attraction: self.attraction,
            ds: self.size_step(),
        }
    }
}

fn pack(r: u8, g: u8, b: u8) -> u32 {
    ((r as u32) << 16) | ((g as u32) << 8) | b as u32
}
