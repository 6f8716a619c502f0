//! Timeline scripts for the demo host: a list of plugin commands keyed by
//! the frame they run on.
//!
//! ```toml
//! title = "campfire"
//! repeat = 240
//!
//! [[step]]
//! frame = 0
//! command = "pfx_create_effect"
//! args = ["fire", "stream"]
//! ```

use std::fmt;
use std::path::{Path, PathBuf};

use log::warn;
use serde::Deserialize;

use crate::error::Result;
use crate::host::SessionHost;
use crate::plugin::Plugin;

/// A command argument as written in TOML or JSON.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Arg {
    Int(i64),
    Float(f64),
    Bool(bool),
    Text(String),
}

impl fmt::Display for Arg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arg::Int(v) => write!(f, "{v}"),
            Arg::Float(v) => write!(f, "{v}"),
            Arg::Bool(v) => write!(f, "{v}"),
            Arg::Text(v) => f.write_str(v),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Step {
    /// Frame the command runs on; ignored for live commands
    #[serde(default)]
    pub frame: u64,
    pub command: String,
    #[serde(default)]
    pub args: Vec<Arg>,
}

impl Step {
    pub fn arg_strings(&self) -> Vec<String> {
        self.args.iter().map(Arg::to_string).collect()
    }
}

fn default_width() -> usize {
    320
}

fn default_height() -> usize {
    240
}

#[derive(Debug, Clone, Deserialize)]
pub struct Script {
    #[serde(default)]
    pub title: Option<String>,
    /// Game screen size in pixels
    #[serde(default = "default_width")]
    pub width: usize,
    #[serde(default = "default_height")]
    pub height: usize,
    /// Directory holding `Picture/`; relative paths resolve against the script
    #[serde(default)]
    pub game_dir: Option<PathBuf>,
    /// Restart the timeline every N frames
    #[serde(default)]
    pub repeat: Option<u64>,
    #[serde(default, rename = "step")]
    pub steps: Vec<Step>,
}

impl Script {
    pub fn parse(text: &str) -> Result<Self> {
        let mut script: Script = toml::from_str(text)?;
        script.steps.sort_by_key(|s| s.frame);
        Ok(script)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let mut script = Script::parse(&text)?;
        if let Some(dir) = &script.game_dir
            && dir.is_relative()
            && let Some(parent) = path.parent()
        {
            script.game_dir = Some(parent.join(dir));
        }
        Ok(script)
    }

    /// Steps due on `frame`, in file order.
    pub fn steps_at(&self, frame: u64) -> impl Iterator<Item = &Step> {
        let frame = match self.repeat {
            Some(n) if n > 0 => frame % n,
            _ => frame,
        };
        self.steps.iter().filter(move |s| s.frame == frame)
    }

    /// Last frame with a step
    pub fn length(&self) -> u64 {
        self.steps.last().map_or(0, |s| s.frame)
    }
}

/// Run one step. `map_change` and `scroll dx dy` drive the host; everything
/// else goes to the plugin. Returns false for a command nobody handled.
pub fn apply(step: &Step, plugin: &mut dyn Plugin, host: &mut SessionHost) -> bool {
    match step.command.as_str() {
        "map_change" => {
            plugin.on_map_change();
            true
        }
        "scroll" => {
            let int = |i: usize| match step.args.get(i) {
                Some(Arg::Int(v)) => *v as i32,
                Some(Arg::Float(v)) => *v as i32,
                _ => 0,
            };
            host.scroll(int(0), int(1));
            true
        }
        command => {
            let handled = plugin.invoke(command, &step.arg_strings(), host);
            if !handled {
                warn!("Unknown command '{command}'");
            }
            handled
        }
    }
}
