use std::ops::Range;

/// Structure-of-arrays particle storage, split into fixed-size blocks.
///
/// A block is the unit an emitter hands out (one burst batch, or one stream
/// slot with all of its age slices). Indices stay valid until the next
/// [`ParticleBuffer::grow`].
#[derive(Debug, Clone, PartialEq)]
pub struct ParticleBuffer {
    block_len: usize,
    blocks: usize,

    /// Position
    pub x: Vec<f32>,
    pub y: Vec<f32>,

    /// Velocity per tick
    pub dx: Vec<f32>,
    pub dy: Vec<f32>,

    /// Scale factor
    pub s: Vec<f32>,
}

/// Accelerations applied to every particle each tick.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Forces {
    /// Constant acceleration
    pub gx: f32,
    pub gy: f32,
    /// Attraction point and strength
    pub ax: f32,
    pub ay: f32,
    pub attraction: f32,
    /// Scale change per tick
    pub ds: f32,
}

/// Smallest distance used when dividing by the distance to the attraction point.
pub const ATTRACTION_EPSILON: f32 = 0.001;

/// Most blocks (burst batches or stream slots) one buffer holds.
pub const MAX_BLOCKS: usize = 255;

/// Most particles one buffer holds, about 40 MB of storage.
pub const MAX_PARTICLES: usize = 1 << 21;

/// Block count allowed for blocks of `block_len` particles, at least one.
pub fn block_limit(block_len: usize) -> usize {
    (MAX_PARTICLES / block_len.max(1)).clamp(1, MAX_BLOCKS)
}

impl ParticleBuffer {
    /// `blocks` is clamped into `1..=block_limit(block_len)`.
    pub fn new(block_len: usize, blocks: usize) -> Self {
        let blocks = blocks.clamp(1, block_limit(block_len));
        let n = block_len * blocks;
        ParticleBuffer {
            block_len,
            blocks,
            x: vec![0.0; n],
            y: vec![0.0; n],
            dx: vec![0.0; n],
            dy: vec![0.0; n],
            s: vec![0.0; n],
        }
    }

    /// Particles per block
    pub fn block_len(&self) -> usize {
        self.block_len
    }

    /// Number of blocks currently allocated
    pub fn capacity(&self) -> usize {
        self.blocks
    }

    /// Total particle slots
    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    /// Particle index range of `block`.
    #[inline]
    pub fn block(&self, block: usize) -> Range<usize> {
        block * self.block_len..(block + 1) * self.block_len
    }

    /// Double the block capacity, up to [`block_limit`]. Existing particles
    /// keep their indices and values. Returns false when already at the limit.
    pub fn grow(&mut self) -> bool {
        let before = self.blocks;
        self.reserve_blocks((self.blocks * 2).max(1));
        self.blocks > before
    }

    /// Grow to at least `blocks` blocks, capped at [`block_limit`]; never shrinks.
    pub fn reserve_blocks(&mut self, blocks: usize) {
        let blocks = blocks.min(block_limit(self.block_len));
        if blocks <= self.blocks {
            return;
        }
        let n = blocks * self.block_len;
        // Copy into fresh arrays and swap them in as a whole
        let copy = |old: &Vec<f32>| -> Vec<f32> {
            let mut fresh = Vec::with_capacity(n);
            fresh.extend_from_slice(old);
            fresh.resize(n, 0.0);
            fresh
        };
        let (x, y, dx, dy, s) = (
            copy(&self.x),
            copy(&self.y),
            copy(&self.dx),
            copy(&self.dy),
            copy(&self.s),
        );
        self.x = x;
        self.y = y;
        self.dx = dx;
        self.dy = dy;
        self.s = s;
        self.blocks = blocks;
    }

    /// Overwrite block `dst` with the contents of block `src`.
    pub fn copy_block(&mut self, src: usize, dst: usize) {
        if src == dst {
            return;
        }
        let from = self.block(src);
        let to = self.block(dst).start;
        self.x.copy_within(from.clone(), to);
        self.y.copy_within(from.clone(), to);
        self.dx.copy_within(from.clone(), to);
        self.dy.copy_within(from.clone(), to);
        self.s.copy_within(from, to);
    }

    /// Advance one particle by one tick: move, then accelerate and grow.
    #[inline]
    pub fn step(&mut self, i: usize, f: &Forces) {
        self.x[i] += self.dx[i];
        self.y[i] += self.dy[i];

        let tx = f.ax - self.x[i];
        let ty = f.ay - self.y[i];
        let dist = (tx * tx + ty * ty).sqrt().max(ATTRACTION_EPSILON);
        // factor / distance, pointed at the attraction point
        let pull = f.attraction / dist;
        self.dx[i] += f.gx + pull * tx / dist;
        self.dy[i] += f.gy + pull * ty / dist;

        self.s[i] += f.ds;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled(block_len: usize, blocks: usize) -> ParticleBuffer {
        let mut buf = ParticleBuffer::new(block_len, blocks);
        for i in 0..buf.len() {
            let v = i as f32;
            buf.x[i] = v * 1.5;
            buf.y[i] = -v;
            buf.dx[i] = v / 7.0;
            buf.dy[i] = v * 0.1;
            buf.s[i] = 1.0 + v;
        }
        buf
    }

    #[test]
    fn test_grow_doubles_and_preserves_bits() {
        let mut buf = filled(5, 3);
        let before = buf.clone();
        buf.grow();
        assert_eq!(buf.capacity(), 6);
        assert_eq!(buf.len(), 30);
        for i in 0..before.len() {
            assert_eq!(buf.x[i].to_bits(), before.x[i].to_bits());
            assert_eq!(buf.y[i].to_bits(), before.y[i].to_bits());
            assert_eq!(buf.dx[i].to_bits(), before.dx[i].to_bits());
            assert_eq!(buf.dy[i].to_bits(), before.dy[i].to_bits());
            assert_eq!(buf.s[i].to_bits(), before.s[i].to_bits());
        }
        assert!(buf.x[15..].iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_block_count_is_capped() {
        assert_eq!(block_limit(10), MAX_BLOCKS);
        assert_eq!(block_limit(MAX_PARTICLES / 4), 4);
        assert_eq!(block_limit(MAX_PARTICLES * 2), 1);

        let mut buf = ParticleBuffer::new(MAX_PARTICLES / 8, 1_000_000);
        assert_eq!(buf.capacity(), 8);
        assert!(!buf.grow());
        assert_eq!(buf.len(), MAX_PARTICLES);

        let mut buf = ParticleBuffer::new(1, 200);
        assert!(buf.grow());
        assert_eq!(buf.capacity(), MAX_BLOCKS);
        assert!(!buf.grow());
    }

    #[test]
    fn test_reserve_never_shrinks() {
        let mut buf = filled(2, 4);
        buf.reserve_blocks(2);
        assert_eq!(buf.capacity(), 4);
        assert_eq!(buf.len(), 8);
    }

    #[test]
    fn test_copy_block_moves_whole_block() {
        let mut buf = filled(3, 3);
        let src = buf.clone();
        buf.copy_block(2, 0);
        assert_eq!(&buf.x[0..3], &src.x[6..9]);
        assert_eq!(&buf.s[0..3], &src.s[6..9]);
        assert_eq!(&buf.x[3..6], &src.x[3..6]);
    }

    #[test]
    fn test_step_applies_velocity_and_gravity() {
        let mut buf = ParticleBuffer::new(1, 1);
        buf.dx[0] = 1.0;
        buf.dy[0] = 2.0;
        buf.s[0] = 1.0;
        let f = Forces {
            gy: 0.5,
            ds: 0.25,
            ..Forces::default()
        };
        buf.step(0, &f);
        assert_eq!((buf.x[0], buf.y[0]), (1.0, 2.0));
        assert_eq!((buf.dx[0], buf.dy[0]), (1.0, 2.5));
        assert_eq!(buf.s[0], 1.25);
    }

    #[test]
    fn test_attraction_scales_with_inverse_distance() {
        let mut near = ParticleBuffer::new(1, 1);
        near.x[0] = 8.0;
        let mut far = ParticleBuffer::new(1, 1);
        far.x[0] = 16.0;
        let f = Forces {
            attraction: 4.0,
            ..Forces::default()
        };
        near.step(0, &f);
        far.step(0, &f);
        assert!((near.dx[0] + 0.5).abs() < 1e-6);
        assert!((far.dx[0] + 0.25).abs() < 1e-6);
        assert_eq!(near.dy[0], 0.0);
    }

    #[test]
    fn test_attraction_at_point_is_finite() {
        let mut buf = ParticleBuffer::new(1, 1);
        let f = Forces {
            attraction: 10.0,
            ..Forces::default()
        };
        buf.step(0, &f);
        assert!(buf.dx[0].is_finite());
        assert_eq!(buf.dx[0], 0.0);
    }
}
