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

//! A backend that draws nothing and records every call it receives.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use ember_core::renderer::{
    ActiveUniform, BlendEquation, BlendFactor, BufferKind, BufferUsage, ClearValues, CullMode,
    DepthTest, GpuBuffer, GpuFramebuffer, GpuProgram, GpuTexture, GpuVertexArray, GraphicsBackend,
    IndexFormat, MemoryBarrier, PrimitiveTopology, ProgramDescriptor, ProgramSource,
    ResourceError, ScissorRect, ShaderError, ShaderStage, TextureDescriptor, UniformType,
    VertexLayout, WriteMask,
};

/// One call received by a [`HeadlessBackend`].
#[derive(Debug, Clone, PartialEq)]
#[allow(missing_docs)]
pub enum BackendCall {
    CreateBuffer { buffer: GpuBuffer, kind: BufferKind, size: usize, initialised: bool },
    UpdateBuffer { buffer: GpuBuffer, offset: usize, len: usize },
    DestroyBuffer(GpuBuffer),
    CreateTexture { texture: GpuTexture, width: u32, height: u32 },
    DestroyTexture(GpuTexture),
    CreateProgram(GpuProgram),
    DestroyProgram(GpuProgram),
    CreateFramebuffer { framebuffer: GpuFramebuffer, color: Vec<GpuTexture>, depth: Option<GpuTexture> },
    DestroyFramebuffer(GpuFramebuffer),
    CreateVertexArray { vertex_array: GpuVertexArray, vertex_buffer: GpuBuffer, index_buffer: Option<GpuBuffer> },
    DestroyVertexArray(GpuVertexArray),
    BindFramebuffer(Option<GpuFramebuffer>),
    Clear(ClearValues),
    BindProgram(Option<GpuProgram>),
    SetUniform { location: i32, ty: UniformType, count: u8, data: Vec<u8> },
    BindTexture { unit: u32, texture: Option<GpuTexture> },
    BindStorageBuffer { binding: u32, buffer: Option<GpuBuffer> },
    BindAtomicCounterBuffer { binding: u32, buffer: Option<GpuBuffer> },
    SetWriteMask(WriteMask),
    SetDepthTest(DepthTest),
    SetBlend(Option<(BlendFactor, BlendFactor)>),
    SetBlendEquation(BlendEquation),
    SetCullMode(CullMode),
    SetScissor(ScissorRect),
    BindVertexArray(Option<GpuVertexArray>),
    DrawIndexed { primitive: PrimitiveTopology, format: IndexFormat, count: u32, byte_offset: usize, base_vertex: i32 },
    Draw { primitive: PrimitiveTopology, first: u32, count: u32 },
    DispatchCompute { x: u32, y: u32, z: u32 },
    MemoryBarrier(MemoryBarrier),
    EndFrame,
}

impl BackendCall {
    /// Returns `true` for the write-mask, depth, blend and cull setters.
    pub fn is_raster_state(&self) -> bool {
        matches!(
            self,
            Self::SetWriteMask(_)
                | Self::SetDepthTest(_)
                | Self::SetBlend(_)
                | Self::SetBlendEquation(_)
                | Self::SetCullMode(_)
        )
    }

    /// Returns `true` for draws and dispatches.
    pub fn is_work(&self) -> bool {
        matches!(
            self,
            Self::Draw { .. } | Self::DrawIndexed { .. } | Self::DispatchCompute { .. }
        )
    }
}

/// A shared, cloneable view of a [`HeadlessBackend`]'s call log.
///
/// Keep a clone before handing the backend to the renderer to inspect the
/// calls from another thread.
#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<BackendCall>>>);

impl CallLog {
    fn lock(&self) -> MutexGuard<'_, Vec<BackendCall>> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn push(&self, call: BackendCall) {
        self.lock().push(call);
    }

    /// A copy of every call recorded so far.
    pub fn calls(&self) -> Vec<BackendCall> {
        self.lock().clone()
    }

    /// Removes and returns every recorded call.
    pub fn take(&self) -> Vec<BackendCall> {
        std::mem::take(&mut *self.lock())
    }

    /// Number of recorded calls.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns `true` if nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Counts the recorded calls matching `filter`.
    pub fn count(&self, filter: impl Fn(&BackendCall) -> bool) -> usize {
        self.lock().iter().filter(|call| filter(call)).count()
    }
}

/// Maps a GLSL type name to a uniform type.
fn glsl_uniform_type(name: &str) -> Option<UniformType> {
    Some(match name {
        "float" => UniformType::Float,
        "vec2" => UniformType::Vec2,
        "vec3" => UniformType::Vec3,
        "vec4" => UniformType::Vec4,
        "mat3" => UniformType::Mat3,
        "mat4" => UniformType::Mat4,
        "int" | "bool" => UniformType::Int,
        "ivec2" => UniformType::IVec2,
        "ivec3" => UniformType::IVec3,
        "ivec4" => UniformType::IVec4,
        "uint" => UniformType::UInt,
        "sampler2D" | "isampler2D" | "usampler2D" | "sampler2DShadow" => UniformType::Sampler,
        _ => return None,
    })
}

/// Collects `uniform <type> <name>[N];` declarations from GLSL source.
fn reflect_uniforms(source: &str, uniforms: &mut Vec<ActiveUniform>) {
    for statement in source.split(';') {
        let mut tokens = statement.split_whitespace().skip_while(|token| *token != "uniform");
        if tokens.next().is_none() {
            continue;
        }
        let tokens: Vec<&str> = tokens
            .filter(|token| !matches!(*token, "highp" | "mediump" | "lowp"))
            .collect();
        let [ty, declarator] = tokens[..] else {
            continue;
        };
        let Some(ty) = glsl_uniform_type(ty) else {
            continue;
        };
        let (name, count) = match declarator.split_once('[') {
            Some((name, rest)) => {
                let count = rest.trim_end_matches(']').parse::<u8>().unwrap_or(1);
                (name, count)
            }
            None => (declarator, 1),
        };
        if uniforms.iter().any(|uniform| uniform.name == name) {
            continue;
        }
        uniforms.push(ActiveUniform {
            name: name.to_owned(),
            location: uniforms.len() as i32,
            ty,
            count,
        });
    }
}

/// A [`GraphicsBackend`] for tests and servers without a GPU.
///
/// Resource ids are sequential. Programs "compile" unless a stage contains
/// `#error`, and report the uniforms declared in their source as active.
#[derive(Debug, Default)]
pub struct HeadlessBackend {
    log: CallLog,
    next_id: u32,
    programs: HashMap<u32, Vec<ActiveUniform>>,
    frames: u64,
}

impl HeadlessBackend {
    /// Creates a backend with an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// The shared call log.
    pub fn log(&self) -> CallLog {
        self.log.clone()
    }

    /// Frames ended so far.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    fn next(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }
}

impl GraphicsBackend for HeadlessBackend {
    fn name(&self) -> &str {
        "headless"
    }

    fn create_buffer(
        &mut self,
        kind: BufferKind,
        size: usize,
        _usage: BufferUsage,
        data: Option<&[u8]>,
    ) -> Result<GpuBuffer, ResourceError> {
        if let Some(bytes) = data {
            if bytes.len() > size {
                return Err(ResourceError::OutOfBounds {
                    offset: 0,
                    len: bytes.len(),
                    size,
                });
            }
        }
        let buffer = GpuBuffer(self.next());
        self.log.push(BackendCall::CreateBuffer {
            buffer,
            kind,
            size,
            initialised: data.is_some(),
        });
        Ok(buffer)
    }

    fn update_buffer(&mut self, buffer: GpuBuffer, _kind: BufferKind, offset: usize, data: &[u8]) {
        self.log.push(BackendCall::UpdateBuffer {
            buffer,
            offset,
            len: data.len(),
        });
    }

    fn destroy_buffer(&mut self, buffer: GpuBuffer) {
        self.log.push(BackendCall::DestroyBuffer(buffer));
    }

    fn create_texture(
        &mut self,
        descriptor: &TextureDescriptor,
        _data: Option<&[u8]>,
    ) -> Result<GpuTexture, ResourceError> {
        let texture = GpuTexture(self.next());
        self.log.push(BackendCall::CreateTexture {
            texture,
            width: descriptor.width,
            height: descriptor.height,
        });
        Ok(texture)
    }

    fn destroy_texture(&mut self, texture: GpuTexture) {
        self.log.push(BackendCall::DestroyTexture(texture));
    }

    fn create_program(&mut self, descriptor: &ProgramDescriptor) -> Result<GpuProgram, ShaderError> {
        let label = descriptor.label.as_deref().unwrap_or("unnamed").to_owned();
        let stages: Vec<(ShaderStage, &str)> = match &descriptor.source {
            ProgramSource::Graphics { vertex, fragment } => {
                vec![
                    (ShaderStage::Vertex, vertex.as_ref()),
                    (ShaderStage::Fragment, fragment.as_ref()),
                ]
            }
            ProgramSource::Compute { compute } => vec![(ShaderStage::Compute, compute.as_ref())],
        };
        let mut uniforms = Vec::new();
        for (stage, source) in stages {
            if let Some(line) = source.lines().find(|line| line.trim_start().starts_with("#error")) {
                return Err(ShaderError::CompilationFailed {
                    stage,
                    label,
                    log: line.trim().to_owned(),
                });
            }
            reflect_uniforms(source, &mut uniforms);
        }
        let program = GpuProgram(self.next());
        self.programs.insert(program.0, uniforms);
        self.log.push(BackendCall::CreateProgram(program));
        Ok(program)
    }

    fn active_uniforms(&mut self, program: GpuProgram) -> Vec<ActiveUniform> {
        self.programs.get(&program.0).cloned().unwrap_or_default()
    }

    fn destroy_program(&mut self, program: GpuProgram) {
        self.programs.remove(&program.0);
        self.log.push(BackendCall::DestroyProgram(program));
    }

    fn create_framebuffer(
        &mut self,
        color: &[GpuTexture],
        depth: Option<GpuTexture>,
    ) -> Result<GpuFramebuffer, ResourceError> {
        let framebuffer = GpuFramebuffer(self.next());
        self.log.push(BackendCall::CreateFramebuffer {
            framebuffer,
            color: color.to_vec(),
            depth,
        });
        Ok(framebuffer)
    }

    fn destroy_framebuffer(&mut self, framebuffer: GpuFramebuffer) {
        self.log.push(BackendCall::DestroyFramebuffer(framebuffer));
    }

    fn create_vertex_array(
        &mut self,
        vertex_buffer: GpuBuffer,
        _layout: &VertexLayout,
        _vertex_count: usize,
        index_buffer: Option<GpuBuffer>,
    ) -> Result<GpuVertexArray, ResourceError> {
        let vertex_array = GpuVertexArray(self.next());
        self.log.push(BackendCall::CreateVertexArray {
            vertex_array,
            vertex_buffer,
            index_buffer,
        });
        Ok(vertex_array)
    }

    fn destroy_vertex_array(&mut self, vertex_array: GpuVertexArray) {
        self.log.push(BackendCall::DestroyVertexArray(vertex_array));
    }

    fn bind_framebuffer(&mut self, framebuffer: Option<GpuFramebuffer>) {
        self.log.push(BackendCall::BindFramebuffer(framebuffer));
    }

    fn clear(&mut self, values: ClearValues) {
        self.log.push(BackendCall::Clear(values));
    }

    fn bind_program(&mut self, program: Option<GpuProgram>) {
        self.log.push(BackendCall::BindProgram(program));
    }

    fn set_uniform(&mut self, location: i32, ty: UniformType, count: u8, data: &[u8]) {
        self.log.push(BackendCall::SetUniform {
            location,
            ty,
            count,
            data: data.to_vec(),
        });
    }

    fn bind_texture(&mut self, unit: u32, texture: Option<GpuTexture>) {
        self.log.push(BackendCall::BindTexture { unit, texture });
    }

    fn bind_storage_buffer(&mut self, binding: u32, buffer: Option<GpuBuffer>) {
        self.log.push(BackendCall::BindStorageBuffer { binding, buffer });
    }

    fn bind_atomic_counter_buffer(&mut self, binding: u32, buffer: Option<GpuBuffer>) {
        self.log
            .push(BackendCall::BindAtomicCounterBuffer { binding, buffer });
    }

    fn set_write_mask(&mut self, mask: WriteMask) {
        self.log.push(BackendCall::SetWriteMask(mask));
    }

    fn set_depth_test(&mut self, test: DepthTest) {
        self.log.push(BackendCall::SetDepthTest(test));
    }

    fn set_blend(&mut self, factors: Option<(BlendFactor, BlendFactor)>) {
        self.log.push(BackendCall::SetBlend(factors));
    }

    fn set_blend_equation(&mut self, equation: BlendEquation) {
        self.log.push(BackendCall::SetBlendEquation(equation));
    }

    fn set_cull_mode(&mut self, mode: CullMode) {
        self.log.push(BackendCall::SetCullMode(mode));
    }

    fn set_scissor(&mut self, rect: ScissorRect) {
        self.log.push(BackendCall::SetScissor(rect));
    }

    fn bind_vertex_array(&mut self, vertex_array: Option<GpuVertexArray>) {
        self.log.push(BackendCall::BindVertexArray(vertex_array));
    }

    fn draw_indexed(
        &mut self,
        primitive: PrimitiveTopology,
        format: IndexFormat,
        count: u32,
        byte_offset: usize,
        base_vertex: i32,
    ) {
        self.log.push(BackendCall::DrawIndexed {
            primitive,
            format,
            count,
            byte_offset,
            base_vertex,
        });
    }

    fn draw(&mut self, primitive: PrimitiveTopology, first: u32, count: u32) {
        self.log.push(BackendCall::Draw {
            primitive,
            first,
            count,
        });
    }

    fn dispatch_compute(&mut self, x: u32, y: u32, z: u32) {
        self.log.push(BackendCall::DispatchCompute { x, y, z });
    }

    fn memory_barrier(&mut self, barrier: MemoryBarrier) {
        self.log.push(BackendCall::MemoryBarrier(barrier));
    }

    fn end_frame(&mut self) {
        self.frames += 1;
        self.log.push(BackendCall::EndFrame);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::borrow::Cow;

    fn graphics(vertex: &'static str, fragment: &'static str) -> ProgramDescriptor {
        ProgramDescriptor {
            label: Some(Cow::Borrowed("test")),
            source: ProgramSource::Graphics {
                vertex: Cow::Borrowed(vertex),
                fragment: Cow::Borrowed(fragment),
            },
        }
    }

    #[test]
    fn reflects_declared_uniforms() {
        let mut backend = HeadlessBackend::new();
        let program = backend
            .create_program(&graphics(
                "uniform mat4 u_mvp; uniform highp vec4 u_tint;",
                "layout(binding = 0) uniform sampler2D u_albedo; uniform float u_weights[4]; uniform vec4 u_tint;",
            ))
            .expect("program should compile");

        let uniforms = backend.active_uniforms(program);
        let names: Vec<_> = uniforms.iter().map(|u| (u.name.as_str(), u.ty, u.count)).collect();
        assert_eq!(
            names,
            vec![
                ("u_mvp", UniformType::Mat4, 1),
                ("u_tint", UniformType::Vec4, 1),
                ("u_albedo", UniformType::Sampler, 1),
                ("u_weights", UniformType::Float, 4),
            ]
        );
    }

    #[test]
    fn error_directive_fails_compilation() {
        let mut backend = HeadlessBackend::new();
        let error = backend
            .create_program(&graphics("void main() {}", "#error broken fragment\nvoid main() {}"))
            .unwrap_err();
        assert!(matches!(
            error,
            ShaderError::CompilationFailed {
                stage: ShaderStage::Fragment,
                ..
            }
        ));
        assert_eq!(error.log(), "#error broken fragment");
        assert!(backend.log().is_empty());
    }

    #[test]
    fn log_is_shared_between_clones() {
        let mut backend = HeadlessBackend::new();
        let log = backend.log();
        backend.draw(PrimitiveTopology::Lines, 0, 2);
        backend.end_frame();

        assert_eq!(log.len(), 2);
        assert_eq!(log.count(BackendCall::is_work), 1);
        assert_eq!(log.take().last(), Some(&BackendCall::EndFrame));
        assert!(log.is_empty());
    }
}
