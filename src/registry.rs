use std::collections::BTreeMap;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::error::{PfxError, Result};
use crate::host::Host;
use crate::particles::{Effect, EffectKind, EffectParams};
use crate::render::Surface;

/// Draw priorities of the host's scene layers. The top byte selects the
/// layer, the low bytes order drawables inside it.
pub mod priority {
    pub const BACKGROUND: i32 = 5 << 24;
    pub const TILESET_BELOW: i32 = 10 << 24;
    pub const EVENTS_BELOW: i32 = 15 << 24;
    pub const PLAYER: i32 = 20 << 24;
    pub const TILESET_ABOVE: i32 = 25 << 24;
    pub const EVENTS_ABOVE: i32 = 30 << 24;
    pub const PICTURE_NEW: i32 = 45 << 24;
    pub const BATTLE_ANIMATION: i32 = 50 << 24;
    pub const WINDOW: i32 = 65 << 24;
    pub const TIMER: i32 = 70 << 24;

    /// Offset that places effects above the host's own drawables on a layer
    pub const LAYER_MASK: i32 = 5 << 16;

    pub const DEFAULT: i32 = TIMER + LAYER_MASK;

    /// Script layer number (1..=10) to priority; anything else is 0.
    pub fn of_layer(layer: i32) -> i32 {
        match layer {
            1 => BACKGROUND,
            2 => TILESET_BELOW,
            3 => EVENTS_BELOW,
            4 => PLAYER,
            5 => TILESET_ABOVE,
            6 => EVENTS_ABOVE,
            7 => PICTURE_NEW,
            8 => BATTLE_ANIMATION,
            9 => WINDOW,
            10 => TIMER,
            _ => 0,
        }
    }
}

/// Current save record layout.
pub const SAVE_VERSION: u32 = 2;

struct Entry {
    effect: Effect,
    z: i32,
}

#[derive(Debug, Serialize, Deserialize)]
struct SavedEffect {
    kind: EffectKind,
    z: i32,
    params: EffectParams,
}

#[derive(Debug, Serialize, Deserialize)]
struct SaveRecord {
    version: u32,
    #[serde(default)]
    effects: BTreeMap<String, SavedEffect>,
}

/// All live effects of a session, keyed by script tag.
#[derive(Default)]
pub struct EffectRegistry {
    effects: BTreeMap<String, Entry>,
}

impl EffectRegistry {
    pub fn new() -> Self {
        EffectRegistry::default()
    }

    pub fn len(&self) -> usize {
        self.effects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }

    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.effects.keys().map(String::as_str)
    }

    pub fn exists(&self, tag: &str) -> bool {
        self.effects.contains_key(tag)
    }

    /// Returns false when `tag` is already taken; the existing effect is kept.
    pub fn create(&mut self, tag: &str, kind: EffectKind) -> bool {
        if self.effects.contains_key(tag) {
            return false;
        }
        debug!("create {} effect '{tag}'", kind.name());
        self.effects.insert(
            tag.to_string(),
            Entry {
                effect: Effect::new(kind),
                z: priority::DEFAULT,
            },
        );
        true
    }

    pub fn destroy(&mut self, tag: &str) -> bool {
        self.effects.remove(tag).is_some()
    }

    pub fn destroy_all(&mut self) {
        self.effects.clear();
    }

    /// Release everything at plugin unload.
    pub fn shutdown(&mut self) {
        info!("Shutting down {} particle effects", self.effects.len());
        self.destroy_all();
    }

    pub fn get(&self, tag: &str) -> Option<&Effect> {
        self.effects.get(tag).map(|e| &e.effect)
    }

    pub fn get_mut(&mut self, tag: &str) -> Option<&mut Effect> {
        self.effects.get_mut(tag).map(|e| &mut e.effect)
    }

    pub fn z(&self, tag: &str) -> Option<i32> {
        self.effects.get(tag).map(|e| e.z)
    }

    /// Keep the layer bits and order the effect `z` below the top of that band.
    pub fn set_z(&mut self, tag: &str, z: i32) -> bool {
        let Some(entry) = self.effects.get_mut(tag) else {
            debug!("set_z: no effect '{tag}'");
            return false;
        };
        entry.z = (entry.z & !0xFFFF).saturating_sub(z);
        true
    }

    /// Move the effect onto a scene layer, keeping its position inside the layer.
    pub fn set_layer(&mut self, tag: &str, layer: i32) -> bool {
        let Some(entry) = self.effects.get_mut(tag) else {
            debug!("set_layer: no effect '{tag}'");
            return false;
        };
        entry.z = (entry.z & 0x00FF_FFFF) + priority::of_layer(layer);
        true
    }

    /// Drop in-flight particles of every effect; the effects themselves stay.
    pub fn on_map_change(&mut self) {
        for entry in self.effects.values_mut() {
            entry.effect.clear();
        }
    }

    /// Advance and draw every effect, lowest z first.
    pub fn update(&mut self, dst: &mut dyn Surface, host: &dyn Host) {
        let display = host.display_origin();
        let mut order: Vec<(&String, &mut Entry)> = self.effects.iter_mut().collect();
        // BTreeMap iteration is tag-ordered, so a stable sort breaks ties by tag
        order.sort_by_key(|(_, entry)| entry.z);
        for (_, entry) in order {
            entry.effect.draw(dst, display);
        }
    }

    pub fn particle_count(&self) -> usize {
        self.effects
            .values()
            .map(|e| e.effect.particle_count())
            .sum()
    }

    /// Serialize every effect's parameters. In-flight particles are not saved.
    pub fn save(&self) -> Result<String> {
        let record = SaveRecord {
            version: SAVE_VERSION,
            effects: self
                .effects
                .iter()
                .map(|(tag, entry)| {
                    let saved = SavedEffect {
                        kind: entry.effect.kind(),
                        z: entry.z,
                        params: entry.effect.emitter().params().clone(),
                    };
                    (tag.clone(), saved)
                })
                .collect(),
        };
        Ok(serde_json::to_string(&record)?)
    }

    /// Replace the registry with the effects in a save record, reloading textures.
    pub fn load(&mut self, json: &str, host: &mut dyn Host) -> Result<()> {
        let record: SaveRecord = serde_json::from_str(json)?;
        if record.version > SAVE_VERSION {
            warn!("Particle save record version {} is newer than {SAVE_VERSION}", record.version);
            return Err(PfxError::UnsupportedVersion(record.version));
        }
        self.destroy_all();
        for (tag, saved) in record.effects {
            let texture = saved.params.texture.clone();
            let mut effect = Effect::with_params(saved.kind, saved.params);
            if let Some(name) = texture {
                let image = host.picture(&name);
                effect.emitter_mut().set_texture(&name, image);
            }
            self.effects.insert(tag, Entry { effect, z: saved.z });
        }
        info!("Restored {} particle effects", self.effects.len());
        Ok(())
    }
}
