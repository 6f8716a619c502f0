//! Burst and stream particle effects for a tile-based RPG engine.
//!
//! The engine hands script calls to [`plugin::ParticlePlugin`], which keeps an
//! [`registry::EffectRegistry`] of tagged effects and draws them once per tick
//! onto any [`render::Surface`].

pub mod commands;
pub mod config;
pub mod error;
pub mod external;
pub mod host;
pub mod lut;
pub mod particles;
pub mod plugin;
pub mod registry;
pub mod render;
pub mod script;
pub mod tween;

pub use error::{PfxError, Result};
