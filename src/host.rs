//! The engine-side services a particle plugin talks to: map scroll, switch
//! storage and the picture cache.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use log::{debug, warn};

use crate::error::{PfxError, Result};
use crate::render::Bitmap;

/// Map positions are stored in 1/16 pixel units by the engine.
pub const SUBPIXELS: i32 = 16;

/// Folder under the game directory that holds pictures.
pub const PICTURE_DIR: &str = "Picture";

pub trait Host {
    /// Top-left corner of the visible map area, in pixels
    fn display_origin(&self) -> (i32, i32);

    fn set_switch(&mut self, id: i32, value: bool);

    /// Look up a picture by name. `None` when it cannot be loaded.
    fn picture(&mut self, name: &str) -> Option<Rc<Bitmap>>;
}

/// Host used by the demo binary and the tests: switches live in memory and
/// pictures come from `<game dir>/Picture/<name>.png`.
#[derive(Debug, Default)]
pub struct SessionHost {
    game_dir: Option<PathBuf>,
    switches: HashMap<i32, bool>,
    /// Scroll position in subpixels
    display: (i32, i32),
    pictures: HashMap<String, Option<Rc<Bitmap>>>,
}

impl SessionHost {
    pub fn new(game_dir: Option<PathBuf>) -> Self {
        SessionHost {
            game_dir,
            ..SessionHost::default()
        }
    }

    pub fn switch(&self, id: i32) -> bool {
        self.switches.get(&id).copied().unwrap_or(false)
    }

    /// Scroll the map view by whole pixels.
    pub fn scroll(&mut self, dx: i32, dy: i32) {
        self.display.0 += dx * SUBPIXELS;
        self.display.1 += dy * SUBPIXELS;
    }

    /// Make a picture available without touching the filesystem.
    pub fn insert_picture(&mut self, name: &str, bitmap: Bitmap) {
        self.pictures
            .insert(picture_key(name).to_string(), Some(Rc::new(bitmap)));
    }

    fn load(&self, name: &str) -> Result<Bitmap> {
        let Some(dir) = &self.game_dir else {
            return Err(PfxError::Image(format!("no picture directory for '{name}'")));
        };
        let path = dir.join(PICTURE_DIR).join(format!("{name}.png"));
        load_png(&path)
    }
}

impl Host for SessionHost {
    fn display_origin(&self) -> (i32, i32) {
        (self.display.0 / SUBPIXELS, self.display.1 / SUBPIXELS)
    }

    fn set_switch(&mut self, id: i32, value: bool) {
        debug!("switch {id} = {value}");
        self.switches.insert(id, value);
    }

    fn picture(&mut self, name: &str) -> Option<Rc<Bitmap>> {
        let key = picture_key(name);
        if let Some(cached) = self.pictures.get(key) {
            return cached.clone();
        }
        // Failures are cached too so a missing file warns once
        let loaded = match self.load(key) {
            Ok(bitmap) => Some(Rc::new(bitmap)),
            Err(e) => {
                warn!("Cannot load picture '{key}': {e}");
                None
            }
        };
        self.pictures.insert(key.to_string(), loaded.clone());
        loaded
    }
}

/// Script names may carry the file extension; the cache key never does.
fn picture_key(name: &str) -> &str {
    name.strip_suffix(".png").unwrap_or(name)
}

/// Decode a PNG into an RGBA bitmap.
pub fn load_png(path: &Path) -> Result<Bitmap> {
    let img = image::open(path)
        .map_err(|e| PfxError::Image(format!("{}: {e}", path.display())))?
        .to_rgba8();
    let (w, h) = img.dimensions();
    Bitmap::from_rgba8(w as usize, h as usize, img.as_raw())
        .ok_or_else(|| PfxError::Image(format!("{}: bad pixel data", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::Rgba;

    #[test]
    fn test_scroll_is_reported_in_pixels() {
        let mut host = SessionHost::new(None);
        host.scroll(3, -2);
        assert_eq!(host.display.0, 48);
        assert_eq!(host.display_origin(), (3, -2));
    }

    #[test]
    fn test_switches_default_off() {
        let mut host = SessionHost::new(None);
        assert!(!host.switch(7));
        host.set_switch(7, true);
        assert!(host.switch(7));
    }

    #[test]
    fn test_picture_names_drop_png_suffix() {
        let mut host = SessionHost::new(None);
        host.insert_picture("spark.png", Bitmap::filled(2, 2, Rgba::WHITE));
        let pic = host.picture("spark");
        assert_eq!(pic.map(|p| p.width()), Some(2));
        assert!(host.picture("spark.png").is_some());
    }

    #[test]
    fn test_missing_picture_is_none() {
        let dir = std::env::temp_dir().join("kazefx-host-test-missing");
        let mut host = SessionHost::new(Some(dir));
        assert!(host.picture("nothing").is_none());
        assert!(host.pictures.contains_key("nothing"));
    }
}
