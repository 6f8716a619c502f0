use serde::{Deserialize, Serialize};

/// 8-bit RGBA colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const TRANSPARENT: Rgba = Rgba::new(0, 0, 0, 0);
    pub const WHITE: Rgba = Rgba::rgb(255, 255, 255);

    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Rgba { r, g, b, a }
    }

    /// Opaque colour
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Rgba { r, g, b, a: 255 }
    }

    /// Opaque colour from a packed `0xRRGGBB` value.
    pub const fn from_hex(hex: u32) -> Self {
        Rgba::rgb((hex >> 16) as u8, (hex >> 8) as u8, hex as u8)
    }

    /// Packed `0xRRGGBB`, alpha dropped.
    pub const fn to_hex(self) -> u32 {
        ((self.r as u32) << 16) | ((self.g as u32) << 8) | self.b as u32
    }
}

/// Colour tone applied by [`Bitmap::tone_blit`]. 128 on every channel is identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tone {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
    pub gray: u8,
}

impl Tone {
    pub const NEUTRAL: Tone = Tone::new(128, 128, 128, 128);

    pub const fn new(red: u8, green: u8, blue: u8, gray: u8) -> Self {
        Tone {
            red,
            green,
            blue,
            gray,
        }
    }
}

/// Integer destination rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, w: i32, h: i32) -> Self {
        Rect { x, y, w, h }
    }

    pub fn is_empty(&self) -> bool {
        self.w <= 0 || self.h <= 0
    }
}

/// Anything particles can be blitted onto.
pub trait Surface {
    /// Scale `src` into `dst`, blending with `opacity` (255 = opaque).
    fn stretch_blit(&mut self, dst: Rect, src: &Bitmap, opacity: u8);
}

/// A pixel buffer. Used both as blit source (textures, colour swatches)
/// and as destination frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Bitmap {
    width: usize,
    height: usize,
    pixels: Vec<Rgba>,
}

impl Bitmap {
    /// Fully transparent bitmap
    pub fn new(width: usize, height: usize) -> Self {
        Bitmap::filled(width, height, Rgba::TRANSPARENT)
    }

    pub fn filled(width: usize, height: usize, color: Rgba) -> Self {
        Bitmap {
            width,
            height,
            pixels: vec![color; width * height],
        }
    }

    /// Build from tightly packed RGBA8 bytes. Returns `None` on a size mismatch.
    pub fn from_rgba8(width: usize, height: usize, bytes: &[u8]) -> Option<Self> {
        if bytes.len() != width * height * 4 {
            return None;
        }
        let pixels = bytes
            .chunks_exact(4)
            .map(|p| Rgba::new(p[0], p[1], p[2], p[3]))
            .collect();
        Some(Bitmap {
            width,
            height,
            pixels,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn rect(&self) -> Rect {
        Rect::new(0, 0, self.width as i32, self.height as i32)
    }

    pub fn fill(&mut self, color: Rgba) {
        self.pixels.fill(color);
    }

    pub fn clear(&mut self) {
        self.fill(Rgba::TRANSPARENT);
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> Option<Rgba> {
        if x < self.width && y < self.height {
            Some(self.pixels[y * self.width + x])
        } else {
            None
        }
    }

    /// Set a pixel. Bounds-checked.
    #[inline]
    pub fn set(&mut self, x: usize, y: usize, color: Rgba) {
        if x < self.width && y < self.height {
            self.pixels[y * self.width + x] = color;
        }
    }

    /// Replace this bitmap's content with `src` tinted by `tone`.
    /// Reallocates if the sizes differ.
    pub fn tone_blit(&mut self, src: &Bitmap, tone: Tone) {
        if self.width != src.width || self.height != src.height {
            *self = Bitmap::new(src.width, src.height);
        }
        let sat = tone.gray as i32;
        let scale = |c: i32, t: u8| -> u8 { (c * t as i32 / 128).clamp(0, 255) as u8 };
        for (out, p) in self.pixels.iter_mut().zip(&src.pixels) {
            let (mut r, mut g, mut b) = (p.r as i32, p.g as i32, p.b as i32);
            if sat != 128 {
                let lum = (r * 299 + g * 587 + b * 114) / 1000;
                r = lum + (r - lum) * sat / 128;
                g = lum + (g - lum) * sat / 128;
                b = lum + (b - lum) * sat / 128;
            }
            *out = Rgba::new(
                scale(r, tone.red),
                scale(g, tone.green),
                scale(b, tone.blue),
                p.a,
            );
        }
    }
}

impl Surface for Bitmap {
    /// Nearest-neighbour scale with source-over blending, clipped to bounds.
    fn stretch_blit(&mut self, dst: Rect, src: &Bitmap, opacity: u8) {
        if dst.is_empty() || src.width == 0 || src.height == 0 || opacity == 0 {
            return;
        }
        // Clip in i64: far-off particles arrive with coordinates near i32::MAX
        let (dx, dy, dw, dh) = (dst.x as i64, dst.y as i64, dst.w as i64, dst.h as i64);
        let x0 = dx.max(0);
        let y0 = dy.max(0);
        let x1 = (dx + dw).min(self.width as i64);
        let y1 = (dy + dh).min(self.height as i64);

        for y in y0..y1 {
            let sy = ((y - dy) * src.height as i64 / dh) as usize;
            for x in x0..x1 {
                let sx = ((x - dx) * src.width as i64 / dw) as usize;
                let s = src.pixels[sy * src.width + sx];
                let a = s.a as u32 * opacity as u32 / 255;
                if a == 0 {
                    continue;
                }
                let idx = y as usize * self.width + x as usize;
                let d = self.pixels[idx];
                let mix = |sc: u8, dc: u8| -> u8 {
                    ((sc as u32 * a + dc as u32 * (255 - a)) / 255) as u8
                };
                self.pixels[idx] = Rgba::new(
                    mix(s.r, d.r),
                    mix(s.g, d.g),
                    mix(s.b, d.b),
                    (a + d.a as u32 * (255 - a) / 255) as u8,
                );
            }
        }
    }
}
