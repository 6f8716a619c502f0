use std::collections::BTreeMap;
use std::ops::Range;

use log::debug;

use super::buffer::ParticleBuffer;
use super::emitter::Emitter;
use super::params::EffectParams;
use crate::render::Surface;

/// Lifecycle of one stream slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    Free,
    /// Emitting, not every age slice filled yet
    Starting,
    /// Emitting with every age slice in use
    Streaming,
    /// No longer emitting; draining its last particles
    Stopping,
}

/// Permutation of slot ids split into four contiguous regions:
///
/// ```text
/// order: [ starting | streaming | stopping | free ]
///        0          starting    streaming  total   capacity
/// ```
///
/// Transitions swap a slot across one boundary at a time and move the
/// boundary, so every slot keeps a stable id while its position changes.
#[derive(Debug, Clone)]
pub struct SlotPartition {
    order: Vec<usize>,
    /// Position of each slot id in `order`
    position: Vec<usize>,
    states: Vec<SlotState>,
    starting: usize,
    streaming: usize,
    total: usize,
}

impl SlotPartition {
    pub fn new(capacity: usize) -> Self {
        SlotPartition {
            order: (0..capacity).collect(),
            position: (0..capacity).collect(),
            states: vec![SlotState::Free; capacity],
            starting: 0,
            streaming: 0,
            total: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.order.len()
    }

    /// Slots in use, in any state but free
    pub fn total(&self) -> usize {
        self.total
    }

    pub fn is_full(&self) -> bool {
        self.total == self.capacity()
    }

    pub fn state(&self, slot: usize) -> SlotState {
        self.states.get(slot).copied().unwrap_or(SlotState::Free)
    }

    /// Region boundaries `(starting, streaming, total)`.
    pub fn bounds(&self) -> (usize, usize, usize) {
        (self.starting, self.streaming, self.total)
    }

    /// Slot ids in use, starting region first, then streaming, then stopping.
    pub fn in_use(&self) -> &[usize] {
        &self.order[..self.total]
    }

    fn swap(&mut self, a: usize, b: usize) {
        if a == b {
            return;
        }
        self.order.swap(a, b);
        self.position[self.order[a]] = a;
        self.position[self.order[b]] = b;
    }

    /// Take a free slot into the starting region.
    pub fn activate(&mut self) -> Option<usize> {
        if self.is_full() {
            return None;
        }
        let slot = self.order[self.total];
        self.swap(self.total, self.streaming);
        self.swap(self.streaming, self.starting);
        self.starting += 1;
        self.streaming += 1;
        self.total += 1;
        self.states[slot] = SlotState::Starting;
        Some(slot)
    }

    /// Starting → Streaming.
    pub fn promote(&mut self, slot: usize) {
        if self.state(slot) != SlotState::Starting {
            return;
        }
        self.swap(self.position[slot], self.starting - 1);
        self.starting -= 1;
        self.states[slot] = SlotState::Streaming;
    }

    /// Starting or Streaming → Stopping.
    pub fn stop(&mut self, slot: usize) {
        match self.state(slot) {
            SlotState::Starting => {
                self.swap(self.position[slot], self.starting - 1);
                self.starting -= 1;
            }
            SlotState::Streaming => {}
            SlotState::Stopping | SlotState::Free => return,
        }
        self.swap(self.position[slot], self.streaming - 1);
        self.streaming -= 1;
        self.states[slot] = SlotState::Stopping;
    }

    /// Stopping → Free.
    pub fn retire(&mut self, slot: usize) {
        if self.state(slot) != SlotState::Stopping {
            return;
        }
        self.swap(self.position[slot], self.total - 1);
        self.total -= 1;
        self.states[slot] = SlotState::Free;
    }

    /// Move every active slot to Stopping and return their ids.
    pub fn stop_all(&mut self) -> Vec<usize> {
        let stopped = self.order[..self.streaming].to_vec();
        for &slot in &stopped {
            self.states[slot] = SlotState::Stopping;
        }
        self.starting = 0;
        self.streaming = 0;
        stopped
    }

    pub fn clear(&mut self) {
        self.starting = 0;
        self.streaming = 0;
        self.total = 0;
        self.states.fill(SlotState::Free);
    }

    /// Add free slots up to `capacity`; never shrinks.
    pub fn grow(&mut self, capacity: usize) {
        for slot in self.capacity()..capacity {
            self.order.push(slot);
            self.position.push(slot);
            self.states.push(SlotState::Free);
        }
    }

    /// Boundaries are ordered, `order` is a permutation consistent with
    /// `position`, and each slot's state matches the region it sits in.
    pub fn check(&self) -> bool {
        let cap = self.capacity();
        if !(self.starting <= self.streaming && self.streaming <= self.total && self.total <= cap) {
            return false;
        }
        let mut seen = vec![false; cap];
        for (pos, &slot) in self.order.iter().enumerate() {
            if slot >= cap || seen[slot] || self.position[slot] != pos {
                return false;
            }
            seen[slot] = true;
            let expected = if pos < self.starting {
                SlotState::Starting
            } else if pos < self.streaming {
                SlotState::Streaming
            } else if pos < self.total {
                SlotState::Stopping
            } else {
                SlotState::Free
            };
            if self.states[slot] != expected {
                return false;
            }
        }
        true
    }
}

/// Per-slot emission state. The slot's block holds `fade` age slices of
/// `amount` particles each, used as a ring.
#[derive(Debug, Clone, Default)]
struct Slot {
    origin: (f32, f32),
    /// Ring index of the age-0 slice
    head: usize,
    /// Ticks spent emitting, counted up to `fade`
    primed: usize,
    /// Ticks left to draw once stopped
    drain: usize,
    /// Whether each slice holds particles from an emission
    seeded: Vec<bool>,
}

impl Slot {
    fn reset(&mut self, origin: (f32, f32), fade: usize) {
        self.origin = origin;
        self.head = 0;
        self.primed = 0;
        self.drain = 0;
        self.seeded.clear();
        self.seeded.resize(fade, false);
    }
}

/// Continuous emissions addressed by tag. Each running tag owns a slot that
/// re-seeds one age slice per emission tick.
pub struct Stream {
    pub emitter: Emitter,
    /// One block per slot, `fade * amount` particles each
    buffer: ParticleBuffer,
    slots: Vec<Slot>,
    partition: SlotPartition,
    tags: BTreeMap<String, usize>,
    /// `(fade, amount)` the storage was laid out for
    layout: (usize, usize),
}

impl Stream {
    pub fn new(params: EffectParams) -> Self {
        let buffer = ParticleBuffer::new(params.fade * params.amount, 1);
        Stream {
            layout: (params.fade, params.amount),
            emitter: Emitter::new(params),
            buffer,
            slots: vec![Slot::default()],
            partition: SlotPartition::new(1),
            tags: BTreeMap::new(),
        }
    }

    pub fn partition(&self) -> &SlotPartition {
        &self.partition
    }

    pub fn capacity(&self) -> usize {
        self.partition.capacity()
    }

    pub fn is_running(&self, tag: &str) -> bool {
        self.tags.contains_key(tag)
    }

    pub fn origin(&self, tag: &str) -> Option<(f32, f32)> {
        self.tags.get(tag).map(|&slot| self.slots[slot].origin)
    }

    /// Particles the next draw will show, over every slot in use
    pub fn particle_count(&self) -> usize {
        let amount = self.emitter.params().amount;
        self.partition
            .in_use()
            .iter()
            .map(|&slot| self.live_slices(slot) * amount)
            .sum()
    }

    /// Seeded slices still drawn: all of them while emitting, the youngest
    /// `drain` once stopping.
    fn live_slices(&self, slot: usize) -> usize {
        let s = &self.slots[slot];
        let fade = s.seeded.len();
        if fade == 0 {
            return 0;
        }
        let visible = match self.partition.state(slot) {
            SlotState::Stopping => s.drain.min(fade),
            _ => fade,
        };
        (0..visible).filter(|&k| s.seeded[(s.head + k) % fade]).count()
    }

    fn slice(&self, slot: usize, index: usize) -> Range<usize> {
        let amount = self.emitter.params().amount;
        let start = self.buffer.block(slot).start + index * amount;
        start..start + amount
    }

    /// Begin emitting at `(x, y)` under `tag`. A tag that is already running is left alone.
    pub fn start(&mut self, x: f32, y: f32, tag: &str) {
        self.sync_layout();
        if self.tags.contains_key(tag) {
            return;
        }
        if self.partition.is_full() {
            if !self.buffer.grow() {
                debug!("stream: all {} slots in use, '{tag}' not started", self.capacity());
                return;
            }
            let capacity = self.buffer.capacity();
            self.slots.resize_with(capacity, Slot::default);
            self.partition.grow(capacity);
        }
        let Some(slot) = self.partition.activate() else {
            return;
        };
        let fade = self.emitter.params().fade;
        self.slots[slot].reset((x, y), fade);
        self.tags.insert(tag.to_string(), slot);
    }

    /// Stop emitting under `tag`; particles already out keep flying until they expire.
    pub fn stop(&mut self, tag: &str) {
        let Some(slot) = self.tags.remove(tag) else {
            return;
        };
        self.partition.stop(slot);
        self.slots[slot].drain = self.emitter.params().fade - 1;
    }

    /// Stop every running tag. Slots that were already draining keep their counters.
    pub fn stop_all(&mut self) {
        let drain = self.emitter.params().fade - 1;
        for slot in self.partition.stop_all() {
            self.slots[slot].drain = drain;
        }
        self.tags.clear();
    }

    pub fn set_position(&mut self, tag: &str, x: f32, y: f32) {
        if let Some(&slot) = self.tags.get(tag) {
            self.slots[slot].origin = (x, y);
        }
    }

    /// Forget every slot and tag; storage is kept.
    pub fn clear(&mut self) {
        self.partition.clear();
        self.tags.clear();
    }

    /// Reset to `n` slots, capped by the buffer's block limit.
    pub fn set_simul(&mut self, n: usize) {
        self.reallocate(n.max(1));
    }

    pub fn set_amount(&mut self, amount: i32) {
        self.emitter.params_mut().set_amount(amount);
        self.reallocate(self.capacity());
    }

    pub fn set_timeout(&mut self, fade: i32, delay: i32) {
        self.emitter.set_timeout(fade, delay);
        self.reallocate(self.capacity());
    }

    fn reallocate(&mut self, slots: usize) {
        let params = self.emitter.params();
        self.layout = (params.fade, params.amount);
        self.buffer = ParticleBuffer::new(params.fade * params.amount, slots);
        let slots = self.buffer.capacity();
        self.slots = vec![Slot::default(); slots];
        self.partition = SlotPartition::new(slots);
        self.tags.clear();
    }

    /// Lifetime or amount changed straight through the emitter: start over
    /// with storage that fits.
    fn sync_layout(&mut self) {
        let params = self.emitter.params();
        if self.layout != (params.fade, params.amount) {
            self.reallocate(self.capacity());
        }
    }

    /// One tick: emit into every active slot on interval boundaries, then
    /// advance and blit every seeded slice. Order is starting, streaming, stopping.
    pub fn draw(&mut self, dst: &mut dyn Surface, display: (i32, i32)) {
        self.sync_layout();
        let emit = self.emitter.tick_interval();
        let camera = self.emitter.camera(display);
        let fade = self.emitter.params().fade;

        // Transitions below reorder the partition, so walk a snapshot of it
        let in_use = self.partition.in_use().to_vec();
        for slot in in_use {
            match self.partition.state(slot) {
                SlotState::Starting | SlotState::Streaming => {
                    let head = (self.slots[slot].head + fade - 1) % fade;
                    self.slots[slot].head = head;
                    if emit {
                        let range = self.slice(slot, head);
                        let origin = self.slots[slot].origin;
                        self.emitter.seed(&mut self.buffer, range, origin);
                    }
                    // Without emission the oldest slice is emptied, not redrawn
                    self.slots[slot].seeded[head] = emit;

                    self.draw_slices(slot, 0, dst, camera);

                    let primed = &mut self.slots[slot].primed;
                    if *primed < fade {
                        *primed += 1;
                        if *primed == fade {
                            self.partition.promote(slot);
                        }
                    }
                }
                SlotState::Stopping => {
                    let drain = self.slots[slot].drain;
                    if drain > 0 {
                        self.draw_slices(slot, fade - drain, dst, camera);
                        self.slots[slot].drain -= 1;
                    }
                    if self.slots[slot].drain == 0 {
                        self.partition.retire(slot);
                    }
                }
                SlotState::Free => {}
            }
        }
    }

    /// Draw the slot's seeded slices, the newest at age `shift`, skipping
    /// slices that would be past their lifetime.
    fn draw_slices(&mut self, slot: usize, shift: usize, dst: &mut dyn Surface, camera: (i32, i32)) {
        let fade = self.emitter.params().fade;
        let head = self.slots[slot].head;
        for k in 0..fade - shift.min(fade) {
            let index = (head + k) % fade;
            if !self.slots[slot].seeded[index] {
                continue;
            }
            let range = self.slice(slot, index);
            self.emitter
                .draw_run(&mut self.buffer, range, k + shift, dst, camera);
        }
    }
}
