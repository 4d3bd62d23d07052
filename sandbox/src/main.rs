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

// Ember Sandbox
// Headless demo: a grid of quads animated by jobs and drawn through the
// render thread, with scripted input.

use std::borrow::Cow;
use std::mem;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use ember_core::renderer::{
    BlendFactor, IndexBufferDescriptor, IndexBufferHandle, ProgramHandle, RenderLayerHandle, UniformHandle, VertexBufferHandle,
};
use ember_infra::{InputChange, InputFeed};
use ember_sdk::prelude::*;

const GRID: usize = 16;
const DEMO_FRAMES: u64 = 600;

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct Vertex {
    position: [f32; 3],
    color: [f32; 3],
}

const VERTICES: &[Vertex] = &[
    Vertex {
        position: [-0.5, -0.5, 0.0],
        color: [1.0, 0.0, 0.0],
    },
    Vertex {
        position: [0.5, -0.5, 0.0],
        color: [0.0, 1.0, 0.0],
    },
    Vertex {
        position: [0.5, 0.5, 0.0],
        color: [0.0, 0.0, 1.0],
    },
    Vertex {
        position: [-0.5, 0.5, 0.0],
        color: [1.0, 1.0, 1.0],
    },
];

const INDICES: &[u16] = &[0, 1, 2, 2, 3, 0];

const VERTEX_SHADER: &str = r#"#version 430
layout(location = 0) in vec3 a_position;
layout(location = 1) in vec3 a_color;
uniform vec2 u_offset;
uniform float u_scale;
out vec3 v_color;
void main() {
    v_color = a_color;
    gl_Position = vec4(a_position * u_scale + vec3(u_offset, 0.0), 1.0);
}
"#;

const FRAGMENT_SHADER: &str = r#"#version 430
in vec3 v_color;
uniform vec4 u_tint;
out vec4 o_color;
void main() {
    o_color = vec4(v_color, 1.0) * u_tint;
}
"#;

#[derive(Debug, Clone, Copy)]
struct SceneResources {
    vertices: VertexBufferHandle,
    indices: IndexBufferHandle,
    program: ProgramHandle,
    offset: UniformHandle,
    scale: UniformHandle,
    tint: UniformHandle,
    world: RenderLayerHandle,
    overlay: RenderLayerHandle,
}

/// Animates a grid of quads. Offsets are computed on the job system and
/// stored as `f32` bits.
struct QuadGrid {
    resources: Option<SceneResources>,
    phase: f32,
    offsets: Arc<[AtomicU32]>,
}

impl QuadGrid {
    fn new() -> Self {
        Self {
            resources: None,
            phase: 0.0,
            offsets: (0..GRID * GRID * 2).map(|_| AtomicU32::new(0)).collect(),
        }
    }
}

impl System for QuadGrid {
    fn name(&self) -> &str {
        "QuadGrid"
    }

    fn initialize(&mut self, ctx: &mut SystemContext<'_>) {
        let render = ctx.render();
        let vertices = render.create_vertex_buffer(
            VertexBufferDescriptor {
                label: Some(Cow::Borrowed("Quad Vertex Buffer")),
                size: mem::size_of_val(VERTICES),
                layout: VertexLayout::interleaved()
                    .attribute(0, 3, AttributeType::F32, false)
                    .attribute(1, 3, AttributeType::F32, false),
                usage: BufferUsage::Static,
            },
            Some(MemoryRef::from_pod(VERTICES)),
        );
        let indices = render.create_index_buffer(
            IndexBufferDescriptor {
                label: Some(Cow::Borrowed("Quad Index Buffer")),
                size: mem::size_of_val(INDICES),
                format: IndexFormat::U16,
                usage: BufferUsage::Static,
            },
            Some(MemoryRef::from_pod(INDICES)),
        );
        let program = render.create_program(ProgramDescriptor {
            label: Some(Cow::Borrowed("Quad Program")),
            source: ProgramSource::Graphics {
                vertex: Cow::Borrowed(VERTEX_SHADER),
                fragment: Cow::Borrowed(FRAGMENT_SHADER),
            },
        });
        let uniform = |render: &mut RenderFrontend, name: &'static str, ty| {
            render.create_uniform(UniformDescriptor {
                name: Cow::Borrowed(name),
                ty,
                count: 1,
            })
        };
        let offset = uniform(render, "u_offset", UniformType::Vec2);
        let scale = uniform(render, "u_scale", UniformType::Float);
        let tint = uniform(render, "u_tint", UniformType::Vec4);
        let world = render.create_render_layer(RenderLayerDescriptor {
            name: Cow::Borrowed("world"),
            ..RenderLayerDescriptor::default()
        });
        let overlay = render.create_render_layer(RenderLayerDescriptor {
            name: Cow::Borrowed("overlay"),
            sequential: true,
            clear: ClearValues {
                color: None,
                depth: Some(1.0),
            },
            ..RenderLayerDescriptor::default()
        });

        self.resources = Some(SceneResources {
            vertices,
            indices,
            program,
            offset,
            scale,
            tint,
            world,
            overlay,
        });
        log::info!("QuadGrid created {} quads", GRID * GRID);
    }

    fn fixed_update(&mut self, ctx: &mut SystemContext<'_>) {
        self.phase += ctx.time().fixed_step.as_secs_f32();
    }

    fn update(&mut self, ctx: &mut SystemContext<'_>, _dt: Duration) {
        let Some(scene) = self.resources else {
            return;
        };

        let phase = self.phase + ctx.time().alpha * ctx.time().fixed_step.as_secs_f32();
        let offsets = Arc::clone(&self.offsets);
        let jobs = ctx.jobs();
        let root = jobs.parallel_for(GRID * GRID, GRID, move |i| {
            let (column, row) = ((i % GRID) as f32, (i / GRID) as f32);
            let cell = 2.0 / GRID as f32;
            let wobble = (phase * 2.0 + column * 0.3 + row * 0.7).sin() * cell * 0.25;
            let x = -1.0 + cell * (column + 0.5) + wobble;
            let y = -1.0 + cell * (row + 0.5);
            offsets[i * 2].store(x.to_bits(), Ordering::Relaxed);
            offsets[i * 2 + 1].store(y.to_bits(), Ordering::Relaxed);
        });
        jobs.run(root);
        jobs.wait(root);

        let mut recorder = ctx.render().recorder();
        let cell_scale = 1.6 / GRID as f32;
        for i in 0..GRID * GRID {
            let offset = [
                f32::from_bits(self.offsets[i * 2].load(Ordering::Relaxed)),
                f32::from_bits(self.offsets[i * 2 + 1].load(Ordering::Relaxed)),
            ];
            recorder
                .set_vertex_buffer(scene.vertices, 0, WHOLE_BUFFER)
                .set_index_buffer(scene.indices, 0, WHOLE_BUFFER)
                .set_uniform(scene.offset, &[offset])
                .set_uniform(scene.scale, &[cell_scale])
                .set_uniform(scene.tint, &[[1.0f32, 1.0, 1.0, 1.0]]);
            recorder.submit(scene.world, scene.program, i as u32, false);
        }

        // Translucent overlay drawn last, in submission order.
        recorder
            .set_state(
                RenderState::WRITE_RGB
                    | RenderState::WRITE_A
                    | RenderState::blend_func(BlendFactor::SrcAlpha, BlendFactor::InvSrcAlpha),
            )
            .set_vertex_buffer(scene.vertices, 0, WHOLE_BUFFER)
            .set_index_buffer(scene.indices, 0, WHOLE_BUFFER)
            .set_uniform(scene.offset, &[[0.0f32, 0.0]])
            .set_uniform(scene.scale, &[2.0f32])
            .set_uniform(scene.tint, &[[0.0f32, 0.0, 0.0, 0.25]]);
        recorder.submit(scene.overlay, scene.program, 0, false);
    }
}

/// Plays back a fixed sequence of input changes.
struct InputScript {
    feed: InputFeed,
}

impl System for InputScript {
    fn name(&self) -> &str {
        "InputScript"
    }

    fn late_update(&mut self, ctx: &mut SystemContext<'_>) {
        let frame = ctx.time().frame;
        match frame {
            120 => self.feed.send(InputChange::Resized(1920, 1080)),
            240 => self.feed.send(InputChange::Key(KeyCode::Space, true)),
            241 => self.feed.send(InputChange::Key(KeyCode::Space, false)),
            _ => {}
        }
        if ctx.input().is_key_down(KeyCode::Space) {
            log::info!("Space pressed on frame {frame}");
        }
        if frame + 1 >= DEMO_FRAMES {
            self.feed.send(InputChange::CloseRequested);
        }
    }
}

/// Surfaces renderer failures in the log of the game thread.
struct RenderEventLog;

impl System for RenderEventLog {
    fn name(&self) -> &str {
        "RenderEventLog"
    }

    fn update(&mut self, ctx: &mut SystemContext<'_>, _dt: Duration) {
        for event in ctx.render_events() {
            match event {
                RenderEvent::ShaderFailed { program, error } => {
                    log::warn!("{program:?} is not drawable: {error}");
                }
                RenderEvent::ResourceFailed { kind, index, error } => {
                    log::warn!("{kind} #{index} failed: {error}");
                }
                RenderEvent::FrameRendered(_) => {}
            }
        }
    }
}

fn load_config() -> Result<EngineConfig> {
    match std::env::args().nth(1) {
        Some(path) => EngineConfig::load(&path).with_context(|| format!("while loading '{path}'")),
        None => {
            let mut config = EngineConfig::default();
            config.frame_loop.telemetry_interval_frames = 120;
            Ok(config)
        }
    }
}

fn main() -> Result<()> {
    use env_logger::{Builder, Env};

    Builder::from_env(Env::default().default_filter_or("info")).init();

    let config = load_config()?;
    let (mut engine, input) = Engine::headless(config)?;
    engine
        .on_resize(|width, height| log::info!("Viewport is now {width}x{height}"))
        .add_system(InputScript { feed: input })
        .add_system(QuadGrid::new())
        .add_system(RenderEventLog);
    engine.run()?;
    Ok(())
}
