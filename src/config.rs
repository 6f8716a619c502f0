use crate::render::ColorMode;
use serde::Deserialize;
use std::path::PathBuf;

/// User configuration loaded from config file.
/// All fields are optional. CLI flags override config, config overrides defaults.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Ticks per second (1-120)
    pub fps: Option<u32>,
    /// Default color mode
    pub color: Option<ColorMode>,
    /// Game directory holding the `Picture/` folder
    pub pictures: Option<PathBuf>,
    /// Log filter used when RUST_LOG is unset
    pub log: Option<String>,
    /// Hide status bar
    pub clean: Option<bool>,
}

impl Config {
    pub fn parse(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }
}

/// Get the config file path: ~/.config/kazefx/config.toml
pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("kazefx").join("config.toml"))
}

/// Load config from file. Returns default config if file doesn't exist.
pub fn load_config() -> Config {
    let Some(path) = config_path() else {
        return Config::default();
    };
    let Ok(contents) = std::fs::read_to_string(&path) else {
        return Config::default();
    };
    // Runs before the logger exists, so report on stderr
    match Config::parse(&contents) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Warning: failed to parse {}: {}", path.display(), e);
            Config::default()
        }
    }
}

/// Generate a default config file with all options commented out
pub fn default_config_string() -> String {
    r#"# kazefx configuration
# Use --show-config to see the active config file path.
# CLI flags override these settings.

# Ticks per second (1-120)
# fps = 60

# Color mode: mono, ansi16, ansi256, true-color
# color = "true-color"

# Game directory; textures are read from <pictures>/Picture/<name>.png
# pictures = "~/games/my-rpg"

# Log filter when RUST_LOG is unset (error, warn, info, debug, trace)
# log = "warn"

# Hide status bar
# clean = false
"#
    .to_string()
}
