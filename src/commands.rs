//! Script command surface. Every command takes the effect tag first and
//! reports completion even when it could not do anything, so a broken call
//! never stalls the host's event script.

use log::debug;

use crate::error::{PfxError, Result};
use crate::host::Host;
use crate::particles::{Effect, EffectKind};
use crate::registry::EffectRegistry;

/// Optional prefix the host uses to route calls to this plugin.
pub const PREFIX: &str = "pfx_";

/// Every command with its argument list.
pub const COMMANDS: &[(&str, &str)] = &[
    ("create_effect", "tag, burst|stream"),
    ("destroy_effect", "tag"),
    ("destroy_all", ""),
    ("does_effect_exist", "tag, switch"),
    ("burst", "tag, x, y"),
    ("start", "tag, stream tag, x, y"),
    ("stop", "tag, stream tag"),
    ("stopall", "tag"),
    ("set_simul_effects", "tag, count"),
    ("set_amount", "tag, particles"),
    ("set_timeout", "tag, fade, delay"),
    ("set_initial_color", "tag, r, g, b"),
    ("set_final_color", "tag, r, g, b"),
    ("set_growth", "tag, start scale, end scale"),
    ("set_position", "tag, stream tag, x, y"),
    ("set_random_position", "tag, x, y"),
    ("set_random_radius", "tag, radius"),
    ("set_radius", "tag, radius"),
    ("set_texture", "tag, picture"),
    ("set_acceleration_point", "tag, x, y, factor"),
    ("set_gravity_direction", "tag, degrees, factor"),
    ("set_velocity", "tag, px/s, random px/s"),
    ("set_angle", "tag, degrees, spread"),
    ("set_interval", "tag, ticks"),
    ("set_secondary_angle", "tag, degrees"),
    ("set_generating_function", "tag, standard|radial"),
    ("use_screen_relative", "tag, true|false"),
    ("unload_texture", "tag"),
    ("set_z", "tag, z"),
    ("set_layer", "tag, layer 1-10"),
];

/// Positional argument access with typed conversion.
pub struct Args<'a> {
    func: &'a str,
    values: &'a [String],
}

impl<'a> Args<'a> {
    pub fn new(func: &'a str, values: &'a [String]) -> Self {
        Args { func, values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn string(&self, index: usize) -> Result<&'a str> {
        self.values
            .get(index)
            .map(|s| s.trim())
            .ok_or_else(|| PfxError::MissingArgument {
                func: self.func.to_string(),
                index,
            })
    }

    fn invalid(&self, index: usize, value: &str) -> PfxError {
        PfxError::InvalidArgument {
            func: self.func.to_string(),
            index,
            value: value.to_string(),
        }
    }

    /// Integers; a decimal value is truncated.
    pub fn int(&self, index: usize) -> Result<i32> {
        let s = self.string(index)?;
        if let Ok(v) = s.parse::<i32>() {
            return Ok(v);
        }
        s.parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .map(|v| v as i32)
            .ok_or_else(|| self.invalid(index, s))
    }

    pub fn float(&self, index: usize) -> Result<f32> {
        let s = self.string(index)?;
        s.parse::<f32>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| self.invalid(index, s))
    }

    /// True when the value starts with `t` or `T`.
    pub fn flag(&self, index: usize) -> Result<bool> {
        let s = self.string(index)?;
        Ok(s.starts_with(['t', 'T']))
    }

    /// Colour channel, clamped into 0..=255.
    pub fn channel(&self, index: usize) -> Result<u8> {
        Ok(self.int(index)?.clamp(0, 255) as u8)
    }
}

/// Run one command. Always returns true: errors and unknown tags are logged
/// and the call becomes a no-op.
pub fn invoke(registry: &mut EffectRegistry, host: &mut dyn Host, func: &str, args: &[String]) -> bool {
    let name = func.strip_prefix(PREFIX).unwrap_or(func);
    if let Err(e) = dispatch(registry, host, name, &Args::new(name, args)) {
        debug!("{e}");
    }
    true
}

/// Is `func` (with or without prefix) one of ours?
pub fn is_command(func: &str) -> bool {
    let name = func.strip_prefix(PREFIX).unwrap_or(func);
    COMMANDS.iter().any(|(n, _)| *n == name)
}

fn dispatch(reg: &mut EffectRegistry, host: &mut dyn Host, name: &str, a: &Args) -> Result<()> {
    match name {
        "create_effect" => {
            let (tag, kind) = (a.string(0)?, a.string(1)?);
            match EffectKind::from_name(kind) {
                Some(kind) => {
                    reg.create(tag, kind);
                }
                None => debug!("create_effect: unknown kind '{kind}'"),
            }
        }
        "destroy_effect" => {
            reg.destroy(a.string(0)?);
        }
        "destroy_all" => reg.destroy_all(),
        "does_effect_exist" => {
            let (tag, switch) = (a.string(0)?, a.int(1)?);
            host.set_switch(switch, reg.exists(tag));
        }
        "burst" => {
            let (tag, x, y) = (a.string(0)?, a.int(1)?, a.int(2)?);
            match reg.get_mut(tag) {
                Some(Effect::Burst(b)) => b.trigger(x as f32, y as f32),
                other => not_kind(name, tag, other.is_some()),
            }
        }
        "start" => {
            let (tag, stream_tag) = (a.string(0)?, a.string(1)?);
            let (x, y) = (a.int(2)?, a.int(3)?);
            match reg.get_mut(tag) {
                Some(Effect::Stream(s)) => s.start(x as f32, y as f32, stream_tag),
                other => not_kind(name, tag, other.is_some()),
            }
        }
        "stop" => {
            let (tag, stream_tag) = (a.string(0)?, a.string(1)?);
            match reg.get_mut(tag) {
                Some(Effect::Stream(s)) => s.stop(stream_tag),
                other => not_kind(name, tag, other.is_some()),
            }
        }
        "stopall" => {
            let tag = a.string(0)?;
            match reg.get_mut(tag) {
                Some(Effect::Stream(s)) => s.stop_all(),
                other => not_kind(name, tag, other.is_some()),
            }
        }
        "set_position" => {
            let (tag, stream_tag) = (a.string(0)?, a.string(1)?);
            let (x, y) = (a.int(2)?, a.int(3)?);
            match reg.get_mut(tag) {
                Some(Effect::Stream(s)) => s.set_position(stream_tag, x as f32, y as f32),
                other => not_kind(name, tag, other.is_some()),
            }
        }
        "set_z" => {
            reg.set_z(a.string(0)?, a.int(1)?);
        }
        "set_layer" => {
            reg.set_layer(a.string(0)?, a.int(1)?);
        }
        "set_texture" => {
            let (tag, picture) = (a.string(0)?, a.string(1)?);
            if let Some(fx) = reg.get_mut(tag) {
                let image = host.picture(picture);
                fx.emitter_mut().set_texture(picture, image);
            }
        }
        _ => return set_param(reg, name, a),
    }
    Ok(())
}

/// Parameter setters shared by both effect kinds.
fn set_param(reg: &mut EffectRegistry, name: &str, a: &Args) -> Result<()> {
    if !COMMANDS.iter().any(|(n, _)| *n == name) {
        return Err(PfxError::UnknownCommand(name.to_string()));
    }
    let tag = a.string(0)?;
    // Parse everything before touching the effect so a bad call changes nothing
    let op = Setter::parse(name, a)?;
    let Some(fx) = reg.get_mut(tag) else {
        debug!("{name}: no effect '{tag}'");
        return Ok(());
    };
    op.apply(fx);
    Ok(())
}

enum Setter<'a> {
    Simul(i32),
    Amount(i32),
    Timeout(i32, i32),
    InitialColor(u8, u8, u8),
    FinalColor(u8, u8, u8),
    Growth(f32, f32),
    RandomPosition(i32, i32),
    RandomRadius(i32),
    Radius(i32),
    AccelerationPoint(f32, f32, f32),
    GravityDirection(f32, f32),
    Velocity(f32, f32),
    Angle(f32, f32),
    Interval(i32),
    SecondaryAngle(f32),
    Generator(&'a str),
    ScreenRelative(bool),
    UnloadTexture,
}

impl<'a> Setter<'a> {
    fn parse(name: &str, a: &Args<'a>) -> Result<Self> {
        Ok(match name {
            "set_simul_effects" => Setter::Simul(a.int(1)?),
            "set_amount" => Setter::Amount(a.int(1)?),
            "set_timeout" => Setter::Timeout(a.int(1)?, a.int(2)?),
            "set_initial_color" => Setter::InitialColor(a.channel(1)?, a.channel(2)?, a.channel(3)?),
            "set_final_color" => Setter::FinalColor(a.channel(1)?, a.channel(2)?, a.channel(3)?),
            "set_growth" => Setter::Growth(a.float(1)?, a.float(2)?),
            "set_random_position" => Setter::RandomPosition(a.int(1)?, a.int(2)?),
            "set_random_radius" => Setter::RandomRadius(a.int(1)?),
            "set_radius" => Setter::Radius(a.int(1)?),
            "set_acceleration_point" => {
                Setter::AccelerationPoint(a.float(1)?, a.float(2)?, a.float(3)?)
            }
            "set_gravity_direction" => Setter::GravityDirection(a.float(1)?, a.float(2)?),
            "set_velocity" => Setter::Velocity(a.float(1)?, a.float(2)?),
            "set_angle" => Setter::Angle(a.float(1)?, a.float(2)?),
            "set_interval" => Setter::Interval(a.int(1)?),
            "set_secondary_angle" => Setter::SecondaryAngle(a.float(1)?),
            "set_generating_function" => Setter::Generator(a.string(1)?),
            "use_screen_relative" => Setter::ScreenRelative(a.flag(1)?),
            "unload_texture" => Setter::UnloadTexture,
            _ => return Err(PfxError::UnknownCommand(name.to_string())),
        })
    }

    fn apply(self, fx: &mut Effect) {
        match self {
            Setter::Simul(n) => fx.set_simul(n.max(1) as usize),
            Setter::Amount(n) => fx.set_amount(n),
            Setter::Timeout(fade, delay) => fx.set_timeout(fade, delay),
            Setter::InitialColor(r, g, b) => fx.emitter_mut().set_color_start(r, g, b),
            Setter::FinalColor(r, g, b) => fx.emitter_mut().set_color_end(r, g, b),
            Setter::Growth(start, end) => fx.emitter_mut().params_mut().set_growth(start, end),
            Setter::RandomPosition(x, y) => {
                fx.emitter_mut().params_mut().set_random_position(x, y)
            }
            Setter::RandomRadius(r) => fx.emitter_mut().params_mut().set_random_radius(r),
            Setter::Radius(r) => fx.emitter_mut().params_mut().set_radius(r),
            Setter::AccelerationPoint(x, y, factor) => {
                fx.emitter_mut()
                    .params_mut()
                    .set_acceleration_point(x, y, factor)
            }
            Setter::GravityDirection(deg, factor) => {
                fx.emitter_mut()
                    .params_mut()
                    .set_gravity_direction(deg, factor)
            }
            Setter::Velocity(speed, random) => {
                fx.emitter_mut().params_mut().set_velocity(speed, random)
            }
            Setter::Angle(center, spread) => fx.emitter_mut().params_mut().set_angle(center, spread),
            Setter::Interval(n) => fx.emitter_mut().set_interval(n),
            Setter::SecondaryAngle(deg) => fx.emitter_mut().params_mut().set_secondary_angle(deg),
            Setter::Generator(name) => {
                if !fx.emitter_mut().set_generator(name) {
                    debug!("set_generating_function: unknown generator '{name}'");
                }
            }
            Setter::ScreenRelative(on) => fx.emitter_mut().params_mut().screen_relative = on,
            Setter::UnloadTexture => fx.emitter_mut().unload_texture(),
        }
    }
}

fn not_kind(name: &str, tag: &str, exists: bool) {
    if exists {
        debug!("{name}: effect '{tag}' is the wrong kind");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::SessionHost;
    use crate::particles::Generator;
    use crate::particles::buffer::MAX_PARTICLES;
    use crate::particles::params::MAX_AMOUNT;
    use crate::render::{Bitmap, Rgba};

    fn run(reg: &mut EffectRegistry, host: &mut SessionHost, line: &str) -> bool {
        let mut parts = line.split(',').map(|s| s.trim().to_string());
        let func = parts.next().unwrap_or_default();
        let args: Vec<String> = parts.collect();
        invoke(reg, host, &func, &args)
    }

    #[test]
    fn test_burst_scenario() {
        let mut reg = EffectRegistry::new();
        let mut host = SessionHost::new(None);
        run(&mut reg, &mut host, "pfx_create_effect, fx, burst");
        run(&mut reg, &mut host, "pfx_set_amount, fx, 10");
        run(&mut reg, &mut host, "pfx_set_timeout, fx, 30, 0");
        run(&mut reg, &mut host, "pfx_burst, fx, 100, 100");
        assert_eq!(reg.particle_count(), 10);

        let mut frame = Bitmap::new(4, 4);
        for _ in 0..30 {
            reg.update(&mut frame, &host);
        }
        assert_eq!(reg.particle_count(), 0);
    }

    #[test]
    fn test_prefix_is_optional() {
        let mut reg = EffectRegistry::new();
        let mut host = SessionHost::new(None);
        run(&mut reg, &mut host, "create_effect, a, Stream");
        run(&mut reg, &mut host, "pfx_create_effect, b, burst");
        assert!(reg.exists("a") && reg.exists("b"));
        assert!(is_command("pfx_set_layer"));
        assert!(is_command("set_layer"));
        assert!(!is_command("pfx_explode"));
    }

    #[test]
    fn test_bad_arguments_are_noops_that_complete() {
        let mut reg = EffectRegistry::new();
        let mut host = SessionHost::new(None);
        run(&mut reg, &mut host, "create_effect, fx, burst");
        assert!(run(&mut reg, &mut host, "set_timeout, fx, soon, 0"));
        assert!(run(&mut reg, &mut host, "set_timeout, fx"));
        assert!(run(&mut reg, &mut host, "no_such_command, fx"));
        assert!(run(&mut reg, &mut host, "set_amount, missing, 5"));
        assert_eq!(reg.get("fx").map(|f| f.emitter().params().fade), Some(30));
    }

    #[test]
    fn test_does_effect_exist_writes_switch() {
        let mut reg = EffectRegistry::new();
        let mut host = SessionHost::new(None);
        run(&mut reg, &mut host, "create_effect, fx, burst");
        run(&mut reg, &mut host, "does_effect_exist, fx, 4");
        run(&mut reg, &mut host, "does_effect_exist, nope, 5");
        assert!(host.switch(4));
        assert!(!host.switch(5));
    }

    #[test]
    fn test_stream_lifecycle_commands() {
        let mut reg = EffectRegistry::new();
        let mut host = SessionHost::new(None);
        run(&mut reg, &mut host, "create_effect, smoke, stream");
        run(&mut reg, &mut host, "start, smoke, chimney, 40, 60");
        run(&mut reg, &mut host, "set_position, smoke, chimney, 41, 61");
        let Some(Effect::Stream(s)) = reg.get("smoke") else {
            panic!("not a stream");
        };
        assert_eq!(s.origin("chimney"), Some((41.0, 61.0)));

        run(&mut reg, &mut host, "stop, smoke, chimney");
        let Some(Effect::Stream(s)) = reg.get("smoke") else {
            panic!("not a stream");
        };
        assert!(!s.is_running("chimney"));
    }

    #[test]
    fn test_wrong_kind_is_ignored() {
        let mut reg = EffectRegistry::new();
        let mut host = SessionHost::new(None);
        run(&mut reg, &mut host, "create_effect, smoke, stream");
        run(&mut reg, &mut host, "burst, smoke, 1, 1");
        assert_eq!(reg.particle_count(), 0);
    }

    #[test]
    fn test_setters_convert_units() {
        let mut reg = EffectRegistry::new();
        let mut host = SessionHost::new(None);
        run(&mut reg, &mut host, "create_effect, fx, burst");
        run(&mut reg, &mut host, "set_velocity, fx, 60, 30");
        run(&mut reg, &mut host, "set_generating_function, fx, Radial");
        run(&mut reg, &mut host, "use_screen_relative, fx, True");
        run(&mut reg, &mut host, "set_initial_color, fx, 300, 128, -4");
        let p = reg.get("fx").map(|f| f.emitter().params().clone()).unwrap();
        assert_eq!(p.speed, 1.0);
        assert_eq!(p.random_speed, 0.5);
        assert_eq!(p.generator, Generator::Radial);
        assert!(p.screen_relative);
        assert_eq!(p.color_start, 0xff8000);
    }

    #[test]
    fn test_set_texture_uses_host_pictures() {
        let mut reg = EffectRegistry::new();
        let mut host = SessionHost::new(None);
        host.insert_picture("star", Bitmap::filled(3, 3, Rgba::WHITE));
        run(&mut reg, &mut host, "create_effect, fx, burst");
        run(&mut reg, &mut host, "set_texture, fx, star.png");
        assert!(reg.get("fx").is_some_and(|f| f.emitter().is_textured()));
        run(&mut reg, &mut host, "unload_texture, fx");
        assert!(reg.get("fx").is_some_and(|f| !f.emitter().is_textured()));
    }

    #[test]
    fn test_runaway_velocity_keeps_drawing() {
        let mut reg = EffectRegistry::new();
        let mut host = SessionHost::new(None);
        run(&mut reg, &mut host, "create_effect, fx, burst");
        run(&mut reg, &mut host, "set_amount, fx, 1");
        run(&mut reg, &mut host, "set_angle, fx, 0, 0");
        run(&mut reg, &mut host, "set_velocity, fx, 1e30, 0");
        run(&mut reg, &mut host, "burst, fx, 0, 0");
        let mut frame = Bitmap::new(8, 8);
        for _ in 0..3 {
            reg.update(&mut frame, &host);
        }
        assert_eq!(frame, Bitmap::new(8, 8));
        assert_eq!(reg.particle_count(), 1);
    }

    #[test]
    fn test_simul_and_amount_are_capped() {
        let mut reg = EffectRegistry::new();
        let mut host = SessionHost::new(None);
        run(&mut reg, &mut host, "create_effect, fx, burst");
        run(&mut reg, &mut host, "set_simul_effects, fx, 2000000000");
        run(&mut reg, &mut host, "set_amount, fx, 2000000000");
        let Some(Effect::Burst(b)) = reg.get("fx") else {
            panic!("not a burst");
        };
        assert_eq!(b.emitter.params().amount, MAX_AMOUNT);
        assert!(b.capacity() * MAX_AMOUNT <= MAX_PARTICLES);
    }

    #[test]
    fn test_simul_effects_sets_capacity() {
        let mut reg = EffectRegistry::new();
        let mut host = SessionHost::new(None);
        run(&mut reg, &mut host, "create_effect, fx, burst");
        run(&mut reg, &mut host, "set_simul_effects, fx, 6");
        let Some(Effect::Burst(b)) = reg.get("fx") else {
            panic!("not a burst");
        };
        assert_eq!(b.capacity(), 6);
    }
}
