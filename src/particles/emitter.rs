use std::ops::Range;
use std::rc::Rc;

use rand::RngExt;

use super::buffer::ParticleBuffer;
use super::params::{EffectParams, Generator};
use crate::lut::{self, Tint};
use crate::render::{Bitmap, Rect, Rgba, Surface};

/// A loaded texture plus the scratch bitmap it is toned into each age sample.
#[derive(Debug)]
struct Texture {
    image: Option<Rc<Bitmap>>,
    toned: Bitmap,
    tint: Tint,
}

/// Parameters, colour tables and draw state shared by bursts and streams.
///
/// The emitter never owns particles; the caller passes in the buffer and the
/// index range to seed or draw.
pub struct Emitter {
    params: EffectParams,
    palette: Vec<Rgba>,
    /// 1x1 bitmap stretched into every flat-colour particle
    swatch: Bitmap,
    texture: Option<Texture>,
    /// Ticks left until the next emission tick
    countdown: u32,
    rng: rand::rngs::ThreadRng,
}

impl Emitter {
    pub fn new(params: EffectParams) -> Self {
        let mut emitter = Emitter {
            palette: Vec::new(),
            swatch: Bitmap::new(1, 1),
            texture: None,
            countdown: params.interval.max(1),
            params,
            rng: rand::rng(),
        };
        emitter.rebuild_colors();
        emitter
    }

    pub fn params(&self) -> &EffectParams {
        &self.params
    }

    /// Mutable access for setters that need no derived-state rebuild.
    pub fn params_mut(&mut self) -> &mut EffectParams {
        &mut self.params
    }

    pub fn palette(&self) -> &[Rgba] {
        &self.palette
    }

    pub fn tint(&self) -> Option<&Tint> {
        self.texture.as_ref().map(|t| &t.tint)
    }

    pub fn is_textured(&self) -> bool {
        self.texture.is_some()
    }

    pub fn set_timeout(&mut self, fade: i32, delay: i32) {
        self.params.set_timeout(fade, delay);
        self.rebuild_colors();
    }

    pub fn set_color_start(&mut self, r: u8, g: u8, b: u8) {
        self.params.set_color_start(r, g, b);
        self.rebuild_colors();
    }

    pub fn set_color_end(&mut self, r: u8, g: u8, b: u8) {
        self.params.set_color_end(r, g, b);
        self.rebuild_colors();
    }

    pub fn set_interval(&mut self, interval: i32) {
        if self.params.set_interval(interval) {
            self.countdown = self.params.interval;
        }
    }

    /// Unknown names leave the generator unchanged.
    pub fn set_generator(&mut self, name: &str) -> bool {
        match Generator::from_name(name) {
            Some(generator) => {
                self.params.generator = generator;
                true
            }
            None => false,
        }
    }

    /// Switch to textured drawing. `image` is `None` when the picture could
    /// not be loaded; the effect then draws nothing until another texture is set.
    pub fn set_texture(&mut self, name: &str, image: Option<Rc<Bitmap>>) {
        self.params.texture = Some(name.to_string());
        let toned = image
            .as_ref()
            .map(|i| Bitmap::new(i.width(), i.height()))
            .unwrap_or_else(|| Bitmap::new(0, 0));
        self.texture = Some(Texture {
            image,
            toned,
            tint: Tint::default(),
        });
        self.rebuild_colors();
    }

    /// Back to flat-colour quads; drops the texture reference.
    pub fn unload_texture(&mut self) {
        self.params.texture = None;
        self.texture = None;
        self.rebuild_colors();
    }

    fn rebuild_colors(&mut self) {
        let p = &self.params;
        self.palette = lut::palette(p.color_start, p.color_end, p.fade, p.delay);
        if let Some(tex) = &mut self.texture {
            tex.tint = Tint::build(p.color_start, p.color_end, p.fade, p.delay);
        }
    }

    /// Count down the emission interval. Returns true on emission ticks.
    pub fn tick_interval(&mut self) -> bool {
        self.countdown = self.countdown.saturating_sub(1);
        if self.countdown == 0 {
            self.countdown = self.params.interval.max(1);
            true
        } else {
            false
        }
    }

    /// Map scroll offset to subtract when drawing.
    pub fn camera(&self, display: (i32, i32)) -> (i32, i32) {
        if self.params.screen_relative {
            (0, 0)
        } else {
            display
        }
    }

    #[inline]
    fn unit(&mut self) -> f32 {
        self.rng.random_range(0.0f32..1.0)
    }

    /// Initialise particles `range` around `origin` with the current generator.
    pub fn seed(&mut self, buf: &mut ParticleBuffer, range: Range<usize>, origin: (f32, f32)) {
        let table = lut::angles();
        let (x0, y0) = origin;
        for i in range {
            match self.params.generator {
                Generator::Basic => {
                    let (rx, ry) = (self.params.random_x, self.params.random_y);
                    buf.x[i] = x0 + 2.0 * rx * self.unit() - rx;
                    buf.y[i] = y0 + 2.0 * ry * self.unit() - ry;

                    let angle = self.unit() * self.params.beta + self.params.alpha;
                    let speed = self.params.speed + self.params.random_speed * self.unit();
                    let (c, s) = table.direction(angle);
                    buf.dx[i] = speed * c;
                    buf.dy[i] = speed * s;
                }
                Generator::Radial => {
                    let extra = self.params.random_radius * self.unit();
                    let angle = self.unit() * self.params.beta + self.params.alpha;
                    let speed = self.params.speed + self.params.random_speed * self.unit();

                    let r = self.params.radius + extra;
                    let (c, s) = table.direction(angle);
                    buf.x[i] = x0 + r * c;
                    buf.y[i] = y0 + r * s;

                    let (c, s) = table.direction(angle + self.params.theta);
                    buf.dx[i] = -speed * c;
                    buf.dy[i] = -speed * s;
                }
            }
            buf.s[i] = self.params.size_start;
        }
    }

    /// Advance particles `range` by one tick and blit each with the colour of `age`.
    pub fn draw_run(
        &mut self,
        buf: &mut ParticleBuffer,
        range: Range<usize>,
        age: usize,
        dst: &mut dyn Surface,
        camera: (i32, i32),
    ) {
        let forces = self.params.forces();
        let (cx, cy) = (camera.0 as f32, camera.1 as f32);

        match &mut self.texture {
            None => {
                let Some(&color) = self.palette.get(age).or(self.palette.last()) else {
                    return;
                };
                self.swatch.fill(color);
                for i in range {
                    buf.step(i, &forces);
                    let s = buf.s[i];
                    if let Some(rect) = particle_rect(buf.x[i] - cx, buf.y[i] - cy, s, s) {
                        dst.stretch_blit(rect, &self.swatch, 255);
                    }
                }
            }
            Some(tex) => {
                let Some(image) = tex.image.as_deref() else {
                    // Missing picture: keep simulating, draw nothing
                    for i in range {
                        buf.step(i, &forces);
                    }
                    return;
                };
                tex.toned.tone_blit(image, tex.tint.tone(age));
                let opacity = lut::fade_opacity(self.params.fade, age);
                let (w, h) = (image.width() as f32, image.height() as f32);
                for i in range {
                    buf.step(i, &forces);
                    let (sw, sh) = (w * buf.s[i], h * buf.s[i]);
                    if let Some(rect) = particle_rect(buf.x[i] - cx, buf.y[i] - cy, sw, sh) {
                        dst.stretch_blit(rect, &tex.toned, opacity);
                    }
                }
            }
        }
    }
}

/// Screen rectangle of a particle centred on `(x, y)`. Particles whose
/// position or size overflowed to infinity or NaN are not drawn.
fn particle_rect(x: f32, y: f32, w: f32, h: f32) -> Option<Rect> {
    if !(x.is_finite() && y.is_finite() && w.is_finite() && h.is_finite()) {
        return None;
    }
    Some(Rect::new(
        (x - w / 2.0) as i32,
        (y - h / 2.0) as i32,
        w as i32,
        h as i32,
    ))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Surface double that records every blit.
    #[derive(Default)]
    pub(crate) struct BlitLog {
        pub blits: Vec<(Rect, Rgba, u8)>,
    }

    impl Surface for BlitLog {
        fn stretch_blit(&mut self, dst: Rect, src: &Bitmap, opacity: u8) {
            let color = src.get(0, 0).unwrap_or_default();
            self.blits.push((dst, color, opacity));
        }
    }

    fn emitter_with(f: impl FnOnce(&mut EffectParams)) -> Emitter {
        let mut params = EffectParams::default();
        f(&mut params);
        Emitter::new(params)
    }

    #[test]
    fn test_basic_seed_respects_speed_and_spread() {
        let mut e = emitter_with(|p| {
            p.set_velocity(120.0, 60.0);
            p.set_angle(45.0, 30.0);
        });
        let mut buf = ParticleBuffer::new(200, 1);
        e.seed(&mut buf, 0..200, (10.0, 20.0));
        let (lo, hi) = (e.params().alpha, e.params().alpha + e.params().beta);
        for i in 0..200 {
            assert_eq!((buf.x[i], buf.y[i]), (10.0, 20.0));
            let speed = buf.dx[i].hypot(buf.dy[i]);
            assert!(speed >= 2.0 * 0.99 && speed <= 3.0 + 1e-4, "speed {speed}");
            let angle = buf.dy[i].atan2(buf.dx[i]);
            assert!(angle >= lo - 0.01 && angle <= hi + 0.01, "angle {angle}");
        }
    }

    #[test]
    fn test_basic_seed_jitters_position() {
        let mut e = emitter_with(|p| p.set_random_position(5, 2));
        let mut buf = ParticleBuffer::new(100, 1);
        e.seed(&mut buf, 0..100, (0.0, 0.0));
        assert!(buf.x.iter().all(|&x| (-5.0..=5.0).contains(&x)));
        assert!(buf.y.iter().all(|&y| (-2.0..=2.0).contains(&y)));
    }

    #[test]
    fn test_radial_seed_starts_on_ring_and_points_inward() {
        let mut e = emitter_with(|p| {
            p.generator = Generator::Radial;
            p.set_radius(40);
        });
        let mut buf = ParticleBuffer::new(64, 1);
        e.seed(&mut buf, 0..64, (100.0, 100.0));
        for i in 0..64 {
            let (ox, oy) = (buf.x[i] - 100.0, buf.y[i] - 100.0);
            let r = ox.hypot(oy);
            assert!((r - 40.0).abs() < 0.5, "radius {r}");
            // no twist: velocity is anti-parallel to the offset
            assert!(ox * buf.dx[i] + oy * buf.dy[i] <= 0.0);
        }
    }

    #[test]
    fn test_flat_draw_uses_palette_for_age() {
        let mut e = emitter_with(|p| {
            p.set_timeout(10, 0);
            p.color_start = 0xffffff;
            p.color_end = 0x000000;
        });
        e.set_timeout(10, 0);
        let mut buf = ParticleBuffer::new(3, 1);
        for i in 0..3 {
            buf.s[i] = 2.0;
            buf.x[i] = 10.0;
            buf.y[i] = 10.0;
        }
        let mut log = BlitLog::default();
        e.draw_run(&mut buf, 0..3, 9, &mut log, (4, 0));
        assert_eq!(log.blits.len(), 3);
        assert_eq!(log.blits[0].0, Rect::new(5, 9, 2, 2));
        assert_eq!(log.blits[0].1, Rgba::rgb(0, 0, 0));
    }

    #[test]
    fn test_overflowed_particles_are_skipped() {
        let mut e = emitter_with(|_| {});
        let mut buf = ParticleBuffer::new(3, 1);
        buf.s.fill(1.0);
        buf.x[0] = f32::INFINITY;
        buf.y[1] = f32::NAN;
        buf.x[2] = 1e30;
        let mut log = BlitLog::default();
        e.draw_run(&mut buf, 0..3, 0, &mut log, (0, 0));
        // Only the finite one is drawn; its position saturates
        assert_eq!(log.blits.len(), 1);
        assert_eq!(log.blits[0].0.x, i32::MAX);
    }

    #[test]
    fn test_screen_relative_ignores_camera() {
        let mut e = emitter_with(|p| p.screen_relative = true);
        assert_eq!(e.camera((32, 48)), (0, 0));
        e.params_mut().screen_relative = false;
        assert_eq!(e.camera((32, 48)), (32, 48));
    }

    #[test]
    fn test_missing_texture_draws_nothing_but_simulates() {
        let mut e = emitter_with(|_| {});
        e.set_texture("spark", None);
        let mut buf = ParticleBuffer::new(2, 1);
        buf.dx[0] = 1.0;
        let mut log = BlitLog::default();
        e.draw_run(&mut buf, 0..2, 0, &mut log, (0, 0));
        assert!(log.blits.is_empty());
        assert_eq!(buf.x[0], 1.0);
    }

    #[test]
    fn test_textured_draw_scales_by_image_size() {
        let mut e = emitter_with(|p| p.set_timeout(30, 0));
        let image = Rc::new(Bitmap::filled(4, 2, Rgba::WHITE));
        e.set_texture("spark", Some(image));
        assert_eq!(e.tint().map(|t| t.len()), Some(30));
        let mut buf = ParticleBuffer::new(1, 1);
        buf.s[0] = 1.0;
        buf.x[0] = 20.0;
        buf.y[0] = 20.0;
        let mut log = BlitLog::default();
        e.draw_run(&mut buf, 0..1, 2, &mut log, (0, 0));
        assert_eq!(log.blits[0].0, Rect::new(18, 19, 4, 2));
        assert_eq!(log.blits[0].2, 255 - 8 * 2);
    }

    #[test]
    fn test_unload_texture_restores_flat_palette() {
        let mut e = emitter_with(|_| {});
        e.set_texture("spark", Some(Rc::new(Bitmap::new(1, 1))));
        e.set_timeout(12, 3);
        assert_eq!(e.tint().map(|t| t.len()), Some(12));
        e.unload_texture();
        assert!(!e.is_textured());
        assert_eq!(e.params().texture, None);
        assert_eq!(e.palette().len(), 12);
    }

    #[test]
    fn test_interval_fires_every_nth_tick() {
        let mut e = emitter_with(|_| {});
        e.set_interval(3);
        let fired: Vec<bool> = (0..6).map(|_| e.tick_interval()).collect();
        assert_eq!(fired, vec![false, false, true, false, false, true]);
    }
}
