// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Per-frame submission buffers and the game/render handoff.

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicUsize, Ordering};

use ember_core::config::RenderConfig;
use ember_core::renderer::limits::MAX_RENDER_LAYERS;
use ember_core::renderer::{SortKey, SortKeyFields};

use super::command::{ComputeCommand, DrawCommand, RecordRef};
use super::command_stream::CommandStream;
use super::fence::Fence;
use super::renderer::Renderer;
use super::uniform_encoder::UniformArena;

/// Draws, dispatches, sort keys and uniforms submitted during one frame.
///
/// Producers reserve slots with atomic counters and write them concurrently;
/// the render thread reads everything back once the game phase has ended, then
/// resets. Exceeding a capacity panics.
pub struct FrameSubmissions {
    draws: Box<[UnsafeCell<DrawCommand>]>,
    draw_count: AtomicUsize,
    computes: Box<[UnsafeCell<ComputeCommand>]>,
    compute_count: AtomicUsize,
    keys: Box<[UnsafeCell<(SortKey, RecordRef)>]>,
    key_count: AtomicUsize,
    uniforms: UniformArena,
    layer_sequential: Box<[AtomicBool]>,
    layer_sequence: Box<[AtomicU32]>,
}

// Every slot is written by the single producer that reserved it, and only read
// during the render phase.
unsafe impl Sync for FrameSubmissions {}
unsafe impl Send for FrameSubmissions {}

impl FrameSubmissions {
    /// Allocates buffers for `max_draws` draws and as many dispatches.
    pub fn new(max_draws: usize, uniform_bytes: usize) -> Self {
        let placeholder = (SortKey::from_bits(0), RecordRef::Draw(0));
        Self {
            draws: (0..max_draws).map(|_| UnsafeCell::new(DrawCommand::default())).collect(),
            draw_count: AtomicUsize::new(0),
            computes: (0..max_draws)
                .map(|_| UnsafeCell::new(ComputeCommand::default()))
                .collect(),
            compute_count: AtomicUsize::new(0),
            keys: (0..max_draws * 2).map(|_| UnsafeCell::new(placeholder)).collect(),
            key_count: AtomicUsize::new(0),
            uniforms: UniformArena::new(uniform_bytes),
            layer_sequential: (0..MAX_RENDER_LAYERS).map(|_| AtomicBool::new(false)).collect(),
            layer_sequence: (0..MAX_RENDER_LAYERS).map(|_| AtomicU32::new(0)).collect(),
        }
    }

    /// Draws recorded this frame.
    pub fn draw_count(&self) -> usize {
        self.draw_count.load(Ordering::Acquire).min(self.draws.len())
    }

    /// Dispatches recorded this frame.
    pub fn compute_count(&self) -> usize {
        self.compute_count.load(Ordering::Acquire).min(self.computes.len())
    }

    /// Sort keys recorded this frame.
    pub fn key_count(&self) -> usize {
        self.key_count.load(Ordering::Acquire).min(self.keys.len())
    }

    /// The shared uniform arena.
    pub fn uniforms(&self) -> &UniformArena {
        &self.uniforms
    }

    pub(crate) fn set_layer_sequential(&self, layer: u8, sequential: bool) {
        self.layer_sequential[layer as usize].store(sequential, Ordering::Release);
    }

    /// Sequence number for the next submit into `layer`: a per-layer counter
    /// for sequential layers, zero otherwise.
    pub(crate) fn next_sequence(&self, layer: u8) -> u16 {
        if !self.layer_sequential[layer as usize].load(Ordering::Acquire) {
            return 0;
        }
        let sequence = self.layer_sequence[layer as usize].fetch_add(1, Ordering::Relaxed);
        (sequence as u16) & SortKey::MAX_SEQUENCE
    }

    fn reserve(counter: &AtomicUsize, capacity: usize, what: &str) -> usize {
        let slot = counter.fetch_add(1, Ordering::AcqRel);
        if slot >= capacity {
            panic!(
                "frame {what} buffer overflow: {capacity} per frame; raise render.max_draws_per_frame"
            );
        }
        slot
    }

    pub(crate) fn push_draw(&self, fields: SortKeyFields, draw: DrawCommand) {
        let slot = Self::reserve(&self.draw_count, self.draws.len(), "draw");
        // SAFETY: `slot` was reserved by this call.
        unsafe { *self.draws[slot].get() = draw };
        self.push_key(SortKey::encode(fields), RecordRef::Draw(slot as u32));
    }

    pub(crate) fn push_compute(&self, fields: SortKeyFields, compute: ComputeCommand) {
        let slot = Self::reserve(&self.compute_count, self.computes.len(), "compute");
        // SAFETY: `slot` was reserved by this call.
        unsafe { *self.computes[slot].get() = compute };
        self.push_key(SortKey::encode(fields), RecordRef::Compute(slot as u32));
    }

    fn push_key(&self, key: SortKey, record: RecordRef) {
        let slot = Self::reserve(&self.key_count, self.keys.len(), "sort key");
        // SAFETY: `slot` was reserved by this call.
        unsafe { *self.keys[slot].get() = (key, record) };
    }

    /// Copies this frame's keys into `out`, sorted ascending. Equal keys keep
    /// their reservation order.
    ///
    /// # Safety
    ///
    /// Render phase only: no producer may be submitting.
    pub(crate) unsafe fn sorted_keys(&self, out: &mut Vec<(SortKey, RecordRef)>) {
        out.clear();
        out.extend(self.keys[..self.key_count()].iter().map(|cell| *cell.get()));
        out.sort_by_key(|(key, _)| *key);
    }

    /// # Safety
    ///
    /// Render phase only; `index` must come from this frame's keys.
    pub(crate) unsafe fn draw(&self, index: u32) -> &DrawCommand {
        &*self.draws[index as usize].get()
    }

    /// # Safety
    ///
    /// Render phase only; `index` must come from this frame's keys.
    pub(crate) unsafe fn compute(&self, index: u32) -> &ComputeCommand {
        &*self.computes[index as usize].get()
    }

    /// Empties every buffer and layer sequence counter.
    pub fn reset(&self) {
        self.draw_count.store(0, Ordering::Release);
        self.compute_count.store(0, Ordering::Release);
        self.key_count.store(0, Ordering::Release);
        self.uniforms.reset();
        for counter in self.layer_sequence.iter() {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

/// State shared by the game side and the render thread.
///
/// The two sides strictly alternate: the game thread records until
/// [`end_frame`](Self::end_frame), which hands the frame over through
/// `render_fence` and blocks on `game_fence` until the render thread is done.
pub struct FrameChannel {
    pub(crate) commands: CommandStream<Renderer>,
    pub(crate) frame: FrameSubmissions,
    render_fence: Fence,
    game_fence: Fence,
    frames_submitted: AtomicU64,
    frames_rendered: AtomicU64,
}

impl FrameChannel {
    /// Allocates the command stream and frame buffers sized by `config`.
    pub fn new(config: &RenderConfig) -> Self {
        Self {
            commands: CommandStream::new(config.command_stream_bytes),
            frame: FrameSubmissions::new(config.max_draws_per_frame, config.uniform_arena_bytes),
            render_fence: Fence::new(),
            game_fence: Fence::new(),
            frames_submitted: AtomicU64::new(0),
            frames_rendered: AtomicU64::new(0),
        }
    }

    /// This frame's submissions.
    pub fn frame(&self) -> &FrameSubmissions {
        &self.frame
    }

    /// Frames handed to the render thread.
    pub fn frames_submitted(&self) -> u64 {
        self.frames_submitted.load(Ordering::Acquire)
    }

    /// Frames the render thread finished.
    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered.load(Ordering::Acquire)
    }

    /// Game side: publishes the frame and spins until the render thread has
    /// executed its commands and drawn it.
    pub fn end_frame(&self) {
        self.commands.swap();
        self.frames_submitted.fetch_add(1, Ordering::AcqRel);
        self.render_fence.signal();
        self.game_fence.wait();
    }

    /// Game side: like [`end_frame`](Self::end_frame) but stops waiting once
    /// `alive` returns `false`. Returns `true` if the frame was acknowledged.
    pub fn end_frame_while(&self, alive: impl FnMut() -> bool) -> bool {
        self.commands.swap();
        self.frames_submitted.fetch_add(1, Ordering::AcqRel);
        self.render_fence.signal();
        self.game_fence.wait_while(alive)
    }

    /// Hands the frame over without the fences, for a renderer driven on the
    /// calling thread.
    pub(crate) fn submit_local(&self) {
        self.commands.swap();
        self.frames_submitted.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn complete_local(&self) {
        self.frames_rendered.fetch_add(1, Ordering::AcqRel);
    }

    /// Render side: waits for the next frame while `running` holds.
    pub(crate) fn wait_for_frame(&self, running: impl FnMut() -> bool) -> bool {
        self.render_fence.wait_while(running)
    }

    /// Render side: releases the game thread.
    pub(crate) fn frame_done(&self) {
        self.frames_rendered.fetch_add(1, Ordering::AcqRel);
        self.game_fence.signal();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::command::WHOLE_BUFFER;

    fn fields(layer: u8, program: u16, depth: u32) -> SortKeyFields {
        SortKeyFields {
            layer,
            compute: false,
            sequence: 0,
            program,
            depth,
        }
    }

    #[test]
    fn keys_sort_stably() {
        let frame = FrameSubmissions::new(8, 64);
        for i in 0..3u32 {
            let draw = DrawCommand {
                first_vertex: i,
                ..DrawCommand::default()
            };
            frame.push_draw(fields(0, 1, 0), draw);
        }
        frame.push_draw(fields(0, 0, 9), DrawCommand::default());

        let mut keys = Vec::new();
        unsafe { frame.sorted_keys(&mut keys) };
        let order: Vec<_> = keys.iter().map(|(_, record)| *record).collect();
        assert_eq!(
            order,
            vec![RecordRef::Draw(3), RecordRef::Draw(0), RecordRef::Draw(1), RecordRef::Draw(2)]
        );
        assert_eq!(unsafe { frame.draw(1) }.first_vertex, 1);
        assert_eq!(unsafe { frame.draw(1) }.vertex_count, WHOLE_BUFFER);
    }

    #[test]
    fn sequential_layers_number_their_submits() {
        let frame = FrameSubmissions::new(4, 0);
        frame.set_layer_sequential(2, true);
        assert_eq!(frame.next_sequence(1), 0);
        assert_eq!(frame.next_sequence(2), 0);
        assert_eq!(frame.next_sequence(2), 1);
        frame.reset();
        assert_eq!(frame.next_sequence(2), 0);
    }

    #[test]
    fn reset_empties_every_buffer() {
        let frame = FrameSubmissions::new(4, 64);
        frame.push_draw(fields(0, 0, 0), DrawCommand::default());
        frame.push_compute(fields(0, 0, 0), ComputeCommand::default());
        frame.uniforms().append(&[1, 2, 3, 4]);

        frame.reset();

        assert_eq!(frame.draw_count(), 0);
        assert_eq!(frame.compute_count(), 0);
        assert_eq!(frame.key_count(), 0);
        assert_eq!(frame.uniforms().write_pos(), 0);
    }

    #[test]
    #[should_panic(expected = "draw buffer overflow")]
    fn draw_overflow_panics() {
        let frame = FrameSubmissions::new(1, 0);
        frame.push_draw(fields(0, 0, 0), DrawCommand::default());
        frame.push_draw(fields(0, 0, 0), DrawCommand::default());
    }
}
