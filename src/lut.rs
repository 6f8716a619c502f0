//! Lookup tables shared by every emitter: a coarse sine table for turning
//! emission angles into direction vectors, and per-age colour ramps.

use std::sync::LazyLock;

use crate::render::{Rgba, Tone};

/// Number of entries in the sine table (one full turn).
pub const ANGLE_SAMPLES: usize = 32;

/// Angular distance between two neighbouring table entries.
pub const SECTOR: f32 = std::f32::consts::PI / 16.0;

/// `sin(i * PI / 16)` for `i` in `0..32`.
///
/// Cosine is read from the same table eight entries ahead.
pub struct AngleTable {
    sin: [f32; ANGLE_SAMPLES],
}

impl AngleTable {
    pub fn build() -> Self {
        let mut sin = [0.0f32; ANGLE_SAMPLES];
        for (i, v) in sin.iter_mut().enumerate() {
            *v = (i as f64 * std::f64::consts::PI / 16.0).sin() as f32;
        }
        AngleTable { sin }
    }

    #[inline]
    fn at(&self, index: i32) -> f32 {
        self.sin[(index & (ANGLE_SAMPLES as i32 - 1)) as usize]
    }

    /// Approximate `(cos, sin)` of `angle` (radians) by blending the two
    /// table entries around it.
    #[inline]
    pub fn direction(&self, angle: f32) -> (f32, f32) {
        let pos = angle / SECTOR;
        let sector = pos.floor();
        let p = pos - sector;
        let v = sector as i32;
        let cos = self.at(v + 9) * p + self.at(v + 8) * (1.0 - p);
        let sin = self.at(v + 1) * p + self.at(v) * (1.0 - p);
        (cos, sin)
    }
}

static ANGLES: LazyLock<AngleTable> = LazyLock::new(AngleTable::build);

/// Process-wide angle table, built on first use.
pub fn angles() -> &'static AngleTable {
    &ANGLES
}

/// `fade` colour samples: `start` held for the first `delay` samples, then a
/// linear blend that lands exactly on `end` at the last sample.
///
/// `fade` is raised to at least 1 and `delay` clamped to `fade - 1`.
pub fn color_ramp(start: Rgba, end: Rgba, fade: usize, delay: usize) -> Vec<Rgba> {
    let fade = fade.max(1);
    let delay = delay.min(fade - 1);
    let span = fade - 1 - delay;
    let lerp = |a: u8, b: u8, t: f32| -> u8 {
        (a as f32 + (b as f32 - a as f32) * t).round().clamp(0.0, 255.0) as u8
    };

    (0..fade)
        .map(|i| {
            if i < delay {
                return start;
            }
            let t = if span == 0 {
                1.0
            } else {
                (i - delay) as f32 / span as f32
            };
            Rgba::new(
                lerp(start.r, end.r, t),
                lerp(start.g, end.g, t),
                lerp(start.b, end.b, t),
                lerp(start.a, end.a, t),
            )
        })
        .collect()
}

/// Flat-colour palette: one opaque swatch colour per age.
pub fn palette(start: u32, end: u32, fade: usize, delay: usize) -> Vec<Rgba> {
    color_ramp(Rgba::from_hex(start), Rgba::from_hex(end), fade, delay)
}

/// Per-age tint channels used to tone a texture.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Tint {
    pub r: Vec<u8>,
    pub g: Vec<u8>,
    pub b: Vec<u8>,
}

impl Tint {
    pub fn build(start: u32, end: u32, fade: usize, delay: usize) -> Self {
        let ramp = palette(start, end, fade, delay);
        Tint {
            r: ramp.iter().map(|c| c.r).collect(),
            g: ramp.iter().map(|c| c.g).collect(),
            b: ramp.iter().map(|c| c.b).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.r.len()
    }

    pub fn is_empty(&self) -> bool {
        self.r.is_empty()
    }

    /// Tone for a particle of the given age; ages past the end reuse the last sample.
    pub fn tone(&self, age: usize) -> Tone {
        let i = age.min(self.len().saturating_sub(1));
        match (self.r.get(i), self.g.get(i), self.b.get(i)) {
            (Some(&r), Some(&g), Some(&b)) => Tone::new(r, g, b, 128),
            _ => Tone::NEUTRAL,
        }
    }
}

/// Opacity of a textured particle at `age`, falling by `255 / fade` per tick.
pub fn fade_opacity(fade: usize, age: usize) -> u8 {
    let step = 255 / fade.max(1);
    255usize.saturating_sub(step * age) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_matches_sine() {
        let t = AngleTable::build();
        assert_eq!(t.sin[0], 0.0);
        assert!((t.sin[8] - 1.0).abs() < 1e-6);
        assert!((t.sin[24] + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_direction_approximates_cos_sin() {
        let t = angles();
        let mut a = -7.0f32;
        while a < 7.0 {
            let (c, s) = t.direction(a);
            assert!((c - a.cos()).abs() < 0.02, "cos({a})");
            assert!((s - a.sin()).abs() < 0.02, "sin({a})");
            a += 0.05;
        }
    }

    #[test]
    fn test_direction_exact_on_table_points() {
        let (c, s) = angles().direction(SECTOR * 4.0);
        let h = std::f32::consts::FRAC_1_SQRT_2;
        assert!((c - h).abs() < 1e-5);
        assert!((s - h).abs() < 1e-5);
    }

    #[test]
    fn test_ramp_shape_for_every_fade_and_delay() {
        let start = Rgba::from_hex(0x20c0ff);
        let end = Rgba::from_hex(0xff1008);
        for fade in 1..=255 {
            for delay in [0, 1, fade / 2, fade - 1] {
                if delay >= fade {
                    continue;
                }
                let ramp = color_ramp(start, end, fade, delay);
                assert_eq!(ramp.len(), fade);
                assert!(ramp[..delay].iter().all(|&c| c == start));
                assert_eq!(ramp[fade - 1], end, "fade {fade} delay {delay}");
            }
        }
    }

    #[test]
    fn test_white_to_black_over_ten() {
        let ramp = palette(0xffffff, 0x000000, 10, 0);
        assert_eq!(ramp[0], Rgba::rgb(255, 255, 255));
        assert_eq!(ramp[9], Rgba::rgb(0, 0, 0));
        for pair in ramp.windows(2) {
            assert!(pair[1].r < pair[0].r);
            assert!(pair[1].g < pair[0].g);
            assert!(pair[1].b < pair[0].b);
        }
    }

    #[test]
    fn test_delay_is_clamped() {
        let ramp = palette(0xffffff, 0x000000, 4, 9);
        assert_eq!(ramp.len(), 4);
        assert_eq!(ramp[2], Rgba::WHITE);
        assert_eq!(ramp[3], Rgba::rgb(0, 0, 0));
    }

    #[test]
    fn test_tint_follows_palette() {
        let tint = Tint::build(0xff0000, 0x0000ff, 3, 0);
        assert_eq!(tint.len(), 3);
        assert_eq!(tint.tone(0), Tone::new(255, 0, 0, 128));
        assert_eq!(tint.tone(2), Tone::new(0, 0, 255, 128));
        assert_eq!(tint.tone(40), Tone::new(0, 0, 255, 128));
    }

    #[test]
    fn test_fade_opacity_steps_down() {
        assert_eq!(fade_opacity(30, 0), 255);
        assert_eq!(fade_opacity(30, 1), 247);
        assert_eq!(fade_opacity(1, 3), 0);
    }
}
