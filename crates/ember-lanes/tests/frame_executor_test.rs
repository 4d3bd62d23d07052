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

use std::borrow::Cow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use ember_core::config::RenderConfig;
use ember_core::event::{EventBus, RenderEvent};
use ember_core::renderer::{
    AttributeType, BufferUsage, ClearValues, FramebufferDescriptor, GpuFramebuffer,
    IndexBufferDescriptor, IndexFormat, MemoryBarrier, PrimitiveTopology, ProgramDescriptor,
    ProgramHandle, ProgramSource, RenderLayerDescriptor, RenderLayerHandle, RenderState,
    TextureDescriptor, TextureFormat, UniformDescriptor, UniformType, VertexBufferDescriptor,
    VertexBufferHandle, VertexLayout,
};
use ember_infra::{BackendCall, CallLog, HeadlessBackend};
use ember_lanes::render_lane::{FrameChannel, MemoryRef, RenderFrontend, Renderer, WHOLE_BUFFER};

// --- TEST HARNESS ---

fn setup() -> (RenderFrontend, Renderer, CallLog) {
    let config = RenderConfig {
        max_draws_per_frame: 64,
        uniform_arena_bytes: 4096,
        command_stream_bytes: 16 * 1024,
        framebuffer_size: (320, 240),
        ..RenderConfig::default()
    };
    let channel = Arc::new(FrameChannel::new(&config));
    let backend = HeadlessBackend::new();
    let log = backend.log();
    let renderer = Renderer::new(Box::new(backend), Arc::clone(&channel), &config, EventBus::new());
    (RenderFrontend::new(channel), renderer, log)
}

fn program(frontend: &mut RenderFrontend, label: &'static str, fragment: &'static str) -> ProgramHandle {
    frontend.create_program(ProgramDescriptor {
        label: Some(Cow::Borrowed(label)),
        source: ProgramSource::Graphics {
            vertex: Cow::Borrowed("in vec3 a_position; void main() {}"),
            fragment: Cow::Borrowed(fragment),
        },
    })
}

fn triangle(frontend: &mut RenderFrontend) -> VertexBufferHandle {
    let vertices = [[0.0f32, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]];
    frontend.create_vertex_buffer(
        VertexBufferDescriptor {
            label: Some(Cow::Borrowed("triangle")),
            size: std::mem::size_of_val(&vertices),
            layout: VertexLayout::interleaved().attribute(0, 3, AttributeType::F32, false),
            usage: BufferUsage::Static,
        },
        Some(MemoryRef::from_pod(&vertices)),
    )
}

fn layer(frontend: &mut RenderFrontend, name: &'static str) -> RenderLayerHandle {
    frontend.create_render_layer(RenderLayerDescriptor {
        name: Cow::Borrowed(name),
        ..RenderLayerDescriptor::default()
    })
}

fn draws(calls: &[BackendCall]) -> Vec<u32> {
    calls
        .iter()
        .filter_map(|call| match call {
            BackendCall::Draw { count, .. } => Some(*count),
            _ => None,
        })
        .collect()
}

// --- SCENARIOS ---

#[test]
fn test_layer_dominates_then_program_groups_within_layer() {
    // --- 1. ARRANGE ---
    let (mut frontend, mut renderer, log) = setup();
    let p0 = program(&mut frontend, "p0", "void main() {}");
    let p1 = program(&mut frontend, "p1", "void main() {}");
    let layer0 = layer(&mut frontend, "opaque");
    let layer1 = layer(&mut frontend, "overlay");
    let vertices = triangle(&mut frontend);

    // Submitted in an order the sort has to undo; the vertex count tags each draw.
    let mut recorder = frontend.recorder();
    recorder.set_vertex_buffer(vertices, 0, 3);
    recorder.submit(layer1, p0, 0, false);
    recorder.set_vertex_buffer(vertices, 0, 2);
    recorder.submit(layer0, p1, 5, false);
    recorder.set_vertex_buffer(vertices, 0, 1);
    recorder.submit(layer0, p0, 10, false);

    // --- 2. ACT ---
    let stats = frontend.end_frame_local(&mut renderer);

    // --- 3. ASSERT ---
    assert_eq!(
        draws(&log.calls()),
        vec![1, 2, 3],
        "Expected (layer 0, P0), (layer 0, P1), (layer 1, P0)"
    );
    assert_eq!(stats.draw_calls, 3);
    assert_eq!(stats.frame_number, 1);
}

#[test]
fn test_identical_state_draws_skip_redundant_backend_calls() {
    // --- 1. ARRANGE ---
    let (mut frontend, mut renderer, log) = setup();
    let shader = program(&mut frontend, "opaque", "void main() {}");
    let layer = layer(&mut frontend, "main");
    let vertices = triangle(&mut frontend);

    let mut recorder = frontend.recorder();
    for depth in [1, 2] {
        recorder
            .set_state(RenderState::DEFAULT)
            .set_vertex_buffer(vertices, 0, WHOLE_BUFFER);
        recorder.submit(layer, shader, depth, false);
    }

    // --- 2. ACT ---
    let stats = frontend.end_frame_local(&mut renderer);

    // --- 3. ASSERT ---
    let calls = log.calls();
    let program_binds = calls
        .iter()
        .filter(|call| matches!(call, BackendCall::BindProgram(Some(_))))
        .count();
    assert_eq!(program_binds, 1, "The second draw must reuse the bound program");

    let first_draw = calls
        .iter()
        .position(|call| matches!(call, BackendCall::Draw { .. }))
        .expect("a draw should have been issued");
    let later_raster_calls = calls[first_draw..]
        .iter()
        .filter(|call| call.is_raster_state())
        .count();
    assert_eq!(later_raster_calls, 0, "No raster state call after the first draw");

    let vertex_arrays = calls
        .iter()
        .filter(|call| matches!(call, BackendCall::CreateVertexArray { .. }))
        .count();
    assert_eq!(vertex_arrays, 1, "The vertex array is cached between draws");
    assert_eq!(draws(&calls), vec![3, 3]);
    assert_eq!(stats.program_binds, 1);
    assert_eq!(stats.state_changes, 0);
    assert_eq!(stats.vertex_array_misses, 1);
}

#[test]
fn test_frame_buffers_are_empty_after_rendering() {
    // --- 1. ARRANGE ---
    let (mut frontend, mut renderer, _log) = setup();
    let shader = program(&mut frontend, "tinted", "uniform vec4 u_tint; void main() {}");
    let tint = frontend.create_uniform(UniformDescriptor {
        name: Cow::Borrowed("u_tint"),
        ty: UniformType::Vec4,
        count: 1,
    });
    let layer = layer(&mut frontend, "main");
    let vertices = triangle(&mut frontend);

    let mut recorder = frontend.recorder();
    recorder
        .set_vertex_buffer(vertices, 0, 3)
        .set_uniform(tint, &[[1.0f32, 0.5, 0.25, 1.0]]);
    recorder.submit(layer, shader, 0, false);
    recorder.submit_compute(layer, shader, 1, 1, 1);

    let frame = frontend.channel().frame();
    assert_eq!(frame.draw_count(), 1);
    assert_eq!(frame.compute_count(), 1);
    assert!(frame.uniforms().write_pos() > 0);

    // --- 2. ACT ---
    frontend.end_frame_local(&mut renderer);

    // --- 3. ASSERT ---
    let frame = frontend.channel().frame();
    assert_eq!(frame.uniforms().write_pos(), 0);
    assert_eq!(frame.draw_count(), 0);
    assert_eq!(frame.compute_count(), 0);
    assert_eq!(frame.key_count(), 0);
}

#[test]
fn test_uniforms_resolve_against_the_bound_program() {
    // --- 1. ARRANGE ---
    let (mut frontend, mut renderer, log) = setup();
    let shader = program(&mut frontend, "tinted", "uniform float u_time; uniform vec4 u_tint; void main() {}");
    let tint = frontend.create_uniform(UniformDescriptor {
        name: Cow::Borrowed("u_tint"),
        ty: UniformType::Vec4,
        count: 1,
    });
    let unused = frontend.create_uniform(UniformDescriptor {
        name: Cow::Borrowed("u_unused"),
        ty: UniformType::Float,
        count: 1,
    });
    let layer = layer(&mut frontend, "main");
    let vertices = triangle(&mut frontend);

    let color = [0.1f32, 0.2, 0.3, 0.4];
    let mut recorder = frontend.recorder();
    recorder
        .set_vertex_buffer(vertices, 0, 3)
        .set_uniform(tint, &[color])
        .set_uniform(unused, &[1.0f32]);
    recorder.submit(layer, shader, 0, false);

    // --- 2. ACT ---
    let stats = frontend.end_frame_local(&mut renderer);

    // --- 3. ASSERT ---
    let uploads: Vec<_> = log
        .calls()
        .into_iter()
        .filter(|call| matches!(call, BackendCall::SetUniform { .. }))
        .collect();
    assert_eq!(
        uploads,
        vec![BackendCall::SetUniform {
            location: 1,
            ty: UniformType::Vec4,
            count: 1,
            data: bytemuck::cast_slice(&color).to_vec(),
        }],
        "Only the uniform active in the program is uploaded"
    );
    assert_eq!(stats.uniform_uploads, 1);
}

#[test]
fn test_compute_runs_before_graphics_and_is_followed_by_a_barrier() {
    // --- 1. ARRANGE ---
    let (mut frontend, mut renderer, log) = setup();
    let draw_program = program(&mut frontend, "draw", "void main() {}");
    let compute_program = frontend.create_program(ProgramDescriptor {
        label: Some(Cow::Borrowed("simulate")),
        source: ProgramSource::Compute {
            compute: Cow::Borrowed("layout(local_size_x = 64) in; void main() {}"),
        },
    });
    let layer = layer(&mut frontend, "main");
    let vertices = triangle(&mut frontend);

    let mut recorder = frontend.recorder();
    recorder.set_vertex_buffer(vertices, 0, 3);
    recorder.submit(layer, draw_program, 0, false);
    recorder.submit_compute(layer, compute_program, 8, 4, 1);

    // --- 2. ACT ---
    let stats = frontend.end_frame_local(&mut renderer);

    // --- 3. ASSERT ---
    let calls = log.calls();
    let dispatch = calls
        .iter()
        .position(|call| matches!(call, BackendCall::DispatchCompute { x: 8, y: 4, z: 1 }))
        .expect("the dispatch should have been issued");
    let draw = calls
        .iter()
        .position(|call| matches!(call, BackendCall::Draw { .. }))
        .expect("the draw should have been issued");
    assert!(dispatch < draw);
    assert_eq!(calls[dispatch + 1], BackendCall::MemoryBarrier(MemoryBarrier::ALL));
    assert_eq!(stats.dispatches, 1);
}

#[test]
fn test_indexed_draws_use_byte_offsets_and_base_vertex() {
    // --- 1. ARRANGE ---
    let (mut frontend, mut renderer, log) = setup();
    let shader = program(&mut frontend, "mesh", "void main() {}");
    let layer = layer(&mut frontend, "main");
    let vertices = triangle(&mut frontend);
    let indices: [u16; 6] = [0, 1, 2, 2, 1, 0];
    let index_buffer = frontend.create_index_buffer(
        IndexBufferDescriptor {
            label: None,
            size: std::mem::size_of_val(&indices),
            format: IndexFormat::U16,
            usage: BufferUsage::Static,
        },
        Some(MemoryRef::from_pod(&indices)),
    );

    let mut recorder = frontend.recorder();
    recorder
        .set_state(RenderState::DEFAULT | RenderState::PRIMITIVE_LINES)
        .set_vertex_buffer(vertices, 1, WHOLE_BUFFER)
        .set_index_buffer(index_buffer, 3, WHOLE_BUFFER);
    recorder.submit(layer, shader, 0, false);

    // --- 2. ACT ---
    frontend.end_frame_local(&mut renderer);

    // --- 3. ASSERT ---
    let indexed: Vec<_> = log
        .calls()
        .into_iter()
        .filter(|call| matches!(call, BackendCall::DrawIndexed { .. }))
        .collect();
    assert_eq!(
        indexed,
        vec![BackendCall::DrawIndexed {
            primitive: PrimitiveTopology::Lines,
            format: IndexFormat::U16,
            count: 3,
            byte_offset: 6,
            base_vertex: 1,
        }]
    );
}

#[test]
fn test_layers_bind_their_framebuffer_and_apply_their_clear() {
    // --- 1. ARRANGE ---
    let (mut frontend, mut renderer, log) = setup();
    let shader = program(&mut frontend, "offscreen", "void main() {}");
    let color = frontend.create_texture(TextureDescriptor::new_2d(64, 64, TextureFormat::Rgba8), None);
    let framebuffer = frontend.create_framebuffer(FramebufferDescriptor {
        label: None,
        color: vec![color],
        depth: None,
    });
    let clear = ClearValues {
        color: Some([1.0, 0.0, 1.0, 1.0]),
        depth: None,
    };
    let offscreen = frontend.create_render_layer(RenderLayerDescriptor {
        name: Cow::Borrowed("offscreen"),
        sequential: false,
        framebuffer: Some(framebuffer),
        clear,
    });
    let vertices = triangle(&mut frontend);

    let mut recorder = frontend.recorder();
    recorder.set_vertex_buffer(vertices, 0, 3);
    recorder.submit(offscreen, shader, 0, false);

    // --- 2. ACT ---
    frontend.end_frame_local(&mut renderer);

    // --- 3. ASSERT ---
    let calls = log.calls();
    let created = calls
        .iter()
        .find_map(|call| match call {
            BackendCall::CreateFramebuffer { framebuffer, .. } => Some(*framebuffer),
            _ => None,
        })
        .expect("the framebuffer should exist on the GPU");
    let bind = calls
        .iter()
        .position(|call| *call == BackendCall::BindFramebuffer(Some(created)))
        .expect("the layer should bind its framebuffer");
    assert_eq!(calls[bind + 1], BackendCall::Clear(clear));
    assert_ne!(created, GpuFramebuffer(0));
}

#[test]
fn test_destroying_a_vertex_buffer_evicts_its_vertex_arrays() {
    // --- 1. ARRANGE ---
    let (mut frontend, mut renderer, log) = setup();
    let shader = program(&mut frontend, "opaque", "void main() {}");
    let layer = layer(&mut frontend, "main");
    let vertices = triangle(&mut frontend);
    let mut recorder = frontend.recorder();
    recorder.set_vertex_buffer(vertices, 0, 3);
    recorder.submit(layer, shader, 0, false);
    frontend.end_frame_local(&mut renderer);
    log.take();

    // --- 2. ACT ---
    frontend.destroy_vertex_buffer(vertices);
    assert!(frontend.vertex_buffer(vertices).is_none());
    frontend.end_frame_local(&mut renderer);

    // --- 3. ASSERT ---
    let calls = log.calls();
    let evicted = calls
        .iter()
        .position(|call| matches!(call, BackendCall::DestroyVertexArray(_)))
        .expect("the cached vertex array should be destroyed");
    let destroyed = calls
        .iter()
        .position(|call| matches!(call, BackendCall::DestroyBuffer(_)))
        .expect("the buffer should be destroyed");
    assert!(evicted < destroyed);

    // The slot is free again once the destroy has been processed.
    let reused = triangle(&mut frontend);
    assert_eq!(reused, vertices);
}

#[test]
fn test_shader_failures_reach_the_callback_and_the_event_bus() {
    // --- 1. ARRANGE ---
    let (mut frontend, mut renderer, log) = setup();
    let failures = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&failures);
    frontend.set_shader_error_callback(move |program, error| {
        sink.lock().unwrap().push((program, error.log().to_owned()));
    });
    let broken = program(&mut frontend, "broken", "#error missing semicolon\nvoid main() {}");
    let layer = layer(&mut frontend, "main");
    let vertices = triangle(&mut frontend);
    let mut recorder = frontend.recorder();
    recorder.set_vertex_buffer(vertices, 0, 3);
    recorder.submit(layer, broken, 0, false);

    // --- 2. ACT ---
    let stats = frontend.end_frame_local(&mut renderer);

    // --- 3. ASSERT ---
    assert_eq!(
        *failures.lock().unwrap(),
        vec![(broken, "#error missing semicolon".to_owned())]
    );
    let events = renderer.events().drain();
    assert!(events
        .iter()
        .any(|event| matches!(event, RenderEvent::ShaderFailed { program, .. } if *program == broken)));
    assert!(events
        .iter()
        .any(|event| matches!(event, RenderEvent::FrameRendered(_))));
    assert_eq!(stats.draw_calls, 0, "Draws with a failed program are skipped");
    assert!(draws(&log.calls()).is_empty());
}

#[test]
fn test_memory_refs_are_released_after_the_frame() {
    // --- 1. ARRANGE ---
    static VERTICES: [u8; 36] = [0; 36];
    let (mut frontend, mut renderer, _log) = setup();
    let released = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&released);
    // SAFETY: `VERTICES` is static.
    let data = unsafe {
        MemoryRef::make_ref_with_release(VERTICES.as_ptr(), VERTICES.len(), move |bytes| {
            assert_eq!(bytes.len(), 36);
            flag.store(true, Ordering::SeqCst);
        })
    };
    let vertices = frontend.create_vertex_buffer(
        VertexBufferDescriptor {
            label: None,
            size: VERTICES.len(),
            layout: VertexLayout::interleaved().attribute(0, 3, AttributeType::F32, false),
            usage: BufferUsage::Dynamic,
        },
        Some(data),
    );
    assert!(!released.load(Ordering::SeqCst));

    // --- 2. ACT ---
    frontend.end_frame_local(&mut renderer);

    // --- 3. ASSERT ---
    assert!(released.load(Ordering::SeqCst));
    assert_eq!(
        frontend.vertex_buffer(vertices).map(|descriptor| descriptor.vertex_count()),
        Some(3)
    );
}
