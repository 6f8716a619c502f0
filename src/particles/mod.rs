pub mod buffer;
pub mod burst;
pub mod emitter;
pub mod params;
pub mod stream;

use serde::{Deserialize, Serialize};

pub use burst::Burst;
pub use emitter::Emitter;
pub use params::{EffectParams, Generator};
pub use stream::{SlotPartition, SlotState, Stream};

use crate::render::Surface;

/// Particles per stream emission unless the script says otherwise.
pub const STREAM_DEFAULT_AMOUNT: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EffectKind {
    Burst,
    Stream,
}

impl EffectKind {
    /// Case-insensitive prefix match, so "Burst" and "streams" both work.
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.to_ascii_lowercase();
        if name.starts_with("burst") {
            Some(EffectKind::Burst)
        } else if name.starts_with("stream") {
            Some(EffectKind::Stream)
        } else {
            None
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            EffectKind::Burst => "burst",
            EffectKind::Stream => "stream",
        }
    }

    pub fn default_params(self) -> EffectParams {
        match self {
            EffectKind::Burst => EffectParams::default(),
            EffectKind::Stream => EffectParams {
                amount: STREAM_DEFAULT_AMOUNT,
                ..EffectParams::default()
            },
        }
    }
}

/// A live effect of either kind.
pub enum Effect {
    Burst(Burst),
    Stream(Stream),
}

impl Effect {
    pub fn new(kind: EffectKind) -> Self {
        Self::with_params(kind, kind.default_params())
    }

    /// `params` may come from a save record, so it is brought back into range first.
    pub fn with_params(kind: EffectKind, mut params: EffectParams) -> Self {
        params.sanitize();
        match kind {
            EffectKind::Burst => Effect::Burst(Burst::new(params)),
            EffectKind::Stream => Effect::Stream(Stream::new(params)),
        }
    }

    pub fn kind(&self) -> EffectKind {
        match self {
            Effect::Burst(_) => EffectKind::Burst,
            Effect::Stream(_) => EffectKind::Stream,
        }
    }

    pub fn emitter(&self) -> &Emitter {
        match self {
            Effect::Burst(b) => &b.emitter,
            Effect::Stream(s) => &s.emitter,
        }
    }

    pub fn emitter_mut(&mut self) -> &mut Emitter {
        match self {
            Effect::Burst(b) => &mut b.emitter,
            Effect::Stream(s) => &mut s.emitter,
        }
    }

    pub fn draw(&mut self, dst: &mut dyn Surface, display: (i32, i32)) {
        match self {
            Effect::Burst(b) => b.draw(dst, display),
            Effect::Stream(s) => s.draw(dst, display),
        }
    }

    pub fn clear(&mut self) {
        match self {
            Effect::Burst(b) => b.clear(),
            Effect::Stream(s) => s.clear(),
        }
    }

    pub fn set_simul(&mut self, n: usize) {
        match self {
            Effect::Burst(b) => b.set_simul(n),
            Effect::Stream(s) => s.set_simul(n),
        }
    }

    pub fn set_amount(&mut self, amount: i32) {
        match self {
            Effect::Burst(b) => b.set_amount(amount),
            Effect::Stream(s) => s.set_amount(amount),
        }
    }

    /// Bursts only rebuild their colours; streams also reallocate slot storage.
    pub fn set_timeout(&mut self, fade: i32, delay: i32) {
        match self {
            Effect::Burst(b) => b.emitter.set_timeout(fade, delay),
            Effect::Stream(s) => s.set_timeout(fade, delay),
        }
    }

    pub fn particle_count(&self) -> usize {
        match self {
            Effect::Burst(b) => b.particle_count(),
            Effect::Stream(s) => s.particle_count(),
        }
    }
}
