pub mod bitmap;
pub mod halfblock;

pub use bitmap::{Bitmap, Rect, Rgba, Surface, Tone};
pub use halfblock::ColorMode;
