use log::debug;

use super::buffer::ParticleBuffer;
use super::emitter::Emitter;
use super::params::EffectParams;
use crate::render::Surface;

/// One-shot emissions: every trigger seeds a batch of `amount` particles that
/// ages out after `fade` ticks.
pub struct Burst {
    pub emitter: Emitter,
    /// One block per batch
    buffer: ParticleBuffer,
    /// Age of each live batch, indexed like the blocks
    ages: Vec<usize>,
}

impl Burst {
    pub fn new(params: EffectParams) -> Self {
        let buffer = ParticleBuffer::new(params.amount.max(1), 1);
        Burst {
            emitter: Emitter::new(params),
            buffer,
            ages: Vec::new(),
        }
    }

    /// Batches currently alive
    pub fn live(&self) -> usize {
        self.ages.len()
    }

    pub fn capacity(&self) -> usize {
        self.buffer.capacity()
    }

    pub fn particle_count(&self) -> usize {
        self.live() * self.buffer.block_len()
    }

    /// Fire one batch at `(x, y)`.
    pub fn trigger(&mut self, x: f32, y: f32) {
        self.sync_layout();
        let batch = self.ages.len();
        if batch == self.buffer.capacity() && !self.buffer.grow() {
            debug!("burst: all {batch} batches in flight, trigger dropped");
            return;
        }
        let range = self.buffer.block(batch);
        self.emitter.seed(&mut self.buffer, range, (x, y));
        self.ages.push(0);
    }

    /// Advance and blit every batch, then drop the ones that reached `fade`.
    pub fn draw(&mut self, dst: &mut dyn Surface, display: (i32, i32)) {
        self.sync_layout();
        let camera = self.emitter.camera(display);
        for (batch, age) in self.ages.iter_mut().enumerate() {
            let range = self.buffer.block(batch);
            self.emitter
                .draw_run(&mut self.buffer, range, *age, dst, camera);
            *age += 1;
        }

        let fade = self.emitter.params().fade;
        let mut i = 0;
        while i < self.ages.len() {
            if self.ages[i] >= fade {
                // Last batch moves into the hole; look at index i again
                let last = self.ages.len() - 1;
                self.buffer.copy_block(last, i);
                self.ages.swap_remove(i);
            } else {
                i += 1;
            }
        }
    }

    /// Drop every live batch; storage is kept.
    pub fn clear(&mut self) {
        self.ages.clear();
    }

    pub fn set_amount(&mut self, amount: i32) {
        self.emitter.params_mut().set_amount(amount);
        self.reallocate(self.buffer.capacity());
    }

    /// Reserve room for `n` simultaneous batches and clear. `n` is capped by
    /// the buffer's block limit.
    pub fn set_simul(&mut self, n: usize) {
        self.reallocate(n.max(1));
    }

    /// Amount changed straight through the emitter: drop live batches.
    fn sync_layout(&mut self) {
        if self.buffer.block_len() != self.emitter.params().amount {
            self.reallocate(self.buffer.capacity());
        }
    }

    fn reallocate(&mut self, blocks: usize) {
        self.buffer = ParticleBuffer::new(self.emitter.params().amount, blocks);
        self.ages.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::particles::buffer::MAX_BLOCKS;
    use crate::particles::emitter::tests::BlitLog;

    fn burst(amount: i32, fade: i32) -> Burst {
        let mut params = EffectParams::default();
        params.set_amount(amount);
        params.set_timeout(fade, 0);
        Burst::new(params)
    }

    #[test]
    fn test_ten_particles_live_for_thirty_ticks() {
        let mut b = burst(10, 30);
        b.trigger(100.0, 100.0);
        assert_eq!(b.particle_count(), 10);

        for tick in 0..30 {
            let mut log = BlitLog::default();
            b.draw(&mut log, (0, 0));
            assert_eq!(log.blits.len(), 10, "tick {tick}");
        }
        assert_eq!(b.particle_count(), 0);

        let mut log = BlitLog::default();
        b.draw(&mut log, (0, 0));
        assert!(log.blits.is_empty());
    }

    #[test]
    fn test_trigger_spawns_amount_at_origin() {
        let mut b = burst(7, 5);
        b.trigger(12.0, -3.0);
        let range = b.buffer.block(0);
        assert_eq!(range.len(), 7);
        for i in range {
            assert_eq!((b.buffer.x[i], b.buffer.y[i]), (12.0, -3.0));
        }
    }

    #[test]
    fn test_trigger_grows_and_keeps_live_batches() {
        let mut b = burst(4, 10);
        b.trigger(1.0, 1.0);
        b.draw(&mut BlitLog::default(), (0, 0));
        let before: Vec<u32> = b.buffer.x[0..4].iter().map(|v| v.to_bits()).collect();

        b.trigger(2.0, 2.0);
        b.trigger(3.0, 3.0);
        assert_eq!(b.capacity(), 4);
        assert_eq!(b.live(), 3);
        let after: Vec<u32> = b.buffer.x[0..4].iter().map(|v| v.to_bits()).collect();
        assert_eq!(before, after);
        assert_eq!(b.ages, vec![1, 0, 0]);
    }

    #[test]
    fn test_expired_batch_is_replaced_by_last() {
        let mut b = burst(2, 3);
        b.trigger(0.0, 0.0);
        b.draw(&mut BlitLog::default(), (0, 0));
        b.draw(&mut BlitLog::default(), (0, 0));
        b.trigger(50.0, 50.0);
        b.trigger(60.0, 60.0);
        // first batch expires on this tick; the third slides into slot 0
        b.draw(&mut BlitLog::default(), (0, 0));
        assert_eq!(b.ages, vec![1, 1]);
        assert_eq!(b.particle_count(), 4);

        for _ in 0..2 {
            b.draw(&mut BlitLog::default(), (0, 0));
        }
        assert_eq!(b.live(), 0);
    }

    #[test]
    fn test_clear_keeps_capacity() {
        let mut b = burst(3, 10);
        for _ in 0..3 {
            b.trigger(0.0, 0.0);
        }
        let cap = b.capacity();
        b.clear();
        assert_eq!(b.live(), 0);
        assert_eq!(b.capacity(), cap);
    }

    #[test]
    fn test_set_amount_reallocates() {
        let mut b = burst(3, 10);
        b.trigger(0.0, 0.0);
        b.set_amount(8);
        assert_eq!(b.live(), 0);
        b.trigger(0.0, 0.0);
        assert_eq!(b.particle_count(), 8);
    }

    #[test]
    fn test_amount_set_on_params_drops_batches() {
        let mut b = burst(3, 10);
        b.trigger(0.0, 0.0);
        b.emitter.params_mut().set_amount(6);
        let mut log = BlitLog::default();
        b.draw(&mut log, (0, 0));
        assert!(log.blits.is_empty());
        b.trigger(0.0, 0.0);
        assert_eq!(b.particle_count(), 6);
    }

    #[test]
    fn test_triggers_past_the_batch_limit_are_dropped() {
        let mut b = burst(1, 10);
        b.set_simul(MAX_BLOCKS);
        for _ in 0..MAX_BLOCKS + 5 {
            b.trigger(0.0, 0.0);
        }
        assert_eq!(b.live(), MAX_BLOCKS);
        assert_eq!(b.capacity(), MAX_BLOCKS);
    }

    #[test]
    fn test_set_simul_is_capped() {
        let mut b = burst(3, 10);
        b.set_simul(2_000_000_000);
        assert_eq!(b.capacity(), MAX_BLOCKS);
    }

    #[test]
    fn test_set_simul_reserves_batches() {
        let mut b = burst(3, 10);
        b.set_simul(5);
        assert_eq!(b.capacity(), 5);
        b.set_simul(0);
        assert_eq!(b.capacity(), 1);
    }
}
