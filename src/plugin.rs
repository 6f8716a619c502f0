use crate::commands;
use crate::error::Result;
use crate::host::Host;
use crate::registry::EffectRegistry;
use crate::render::Surface;

/// Every engine plugin implements this trait
pub trait Plugin {
    /// Human-readable name
    fn name(&self) -> &str;

    /// Handle a script call. Returns false when `func` is not one of ours so
    /// the host can offer it to the next plugin.
    fn invoke(&mut self, func: &str, args: &[String], host: &mut dyn Host) -> bool;

    /// Advance the simulation and draw into the frame
    fn update(&mut self, dst: &mut dyn Surface, host: &mut dyn Host);

    /// Called when the player is moved to another map. Default is a no-op.
    fn on_map_change(&mut self) {}

    /// Serialized state for the save file, if the plugin keeps any
    fn save(&self) -> Result<Option<String>> {
        Ok(None)
    }

    /// Restore state written by [`Plugin::save`]. Default is a no-op.
    fn load(&mut self, _data: &str, _host: &mut dyn Host) -> Result<()> {
        Ok(())
    }
}

/// Burst and stream particle effects, addressed by script tag.
#[derive(Default)]
pub struct ParticlePlugin {
    registry: EffectRegistry,
}

impl ParticlePlugin {
    pub fn new() -> Self {
        ParticlePlugin::default()
    }

    pub fn registry(&self) -> &EffectRegistry {
        &self.registry
    }

    pub fn shutdown(&mut self) {
        self.registry.shutdown();
    }
}

impl Plugin for ParticlePlugin {
    fn name(&self) -> &str {
        "KazeParticles"
    }

    fn invoke(&mut self, func: &str, args: &[String], host: &mut dyn Host) -> bool {
        if !commands::is_command(func) {
            return false;
        }
        commands::invoke(&mut self.registry, host, func, args)
    }

    fn update(&mut self, dst: &mut dyn Surface, host: &mut dyn Host) {
        self.registry.update(dst, host);
    }

    fn on_map_change(&mut self) {
        self.registry.on_map_change();
    }

    fn save(&self) -> Result<Option<String>> {
        self.registry.save().map(Some)
    }

    fn load(&mut self, data: &str, host: &mut dyn Host) -> Result<()> {
        self.registry.load(data, host)
    }
}
