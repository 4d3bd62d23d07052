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

use glow::HasContext;

use ember_core::renderer::{
    ActiveUniform, AttributeType, BlendEquation, BlendFactor, BufferKind, BufferUsage, ClearValues,
    CullMode, DepthTest, GpuBuffer, GpuFramebuffer, GpuProgram, GpuTexture, GpuVertexArray,
    GraphicsBackend, IndexFormat, MemoryBarrier, PrimitiveTopology, ProgramDescriptor,
    ProgramSource, ResourceError, ScissorRect, ShaderError, ShaderStage, TextureDescriptor,
    UniformType, VertexLayout, WriteMask,
};

use super::conversions::{filter, uniform_type_from_gl, IntoGl};

/// Backend objects addressed by the dense ids handed to the engine.
struct GlObjects<T> {
    items: Vec<Option<T>>,
    free: Vec<u32>,
}

impl<T> GlObjects<T> {
    fn new() -> Self {
        Self {
            items: Vec::new(),
            free: Vec::new(),
        }
    }

    fn insert(&mut self, item: T) -> u32 {
        match self.free.pop() {
            Some(id) => {
                self.items[id as usize] = Some(item);
                id
            }
            None => {
                self.items.push(Some(item));
                (self.items.len() - 1) as u32
            }
        }
    }

    fn get(&self, id: u32) -> Option<&T> {
        self.items.get(id as usize)?.as_ref()
    }

    fn remove(&mut self, id: u32) -> Option<T> {
        let item = self.items.get_mut(id as usize)?.take();
        if item.is_some() {
            self.free.push(id);
        }
        item
    }

    fn drain(&mut self) -> impl Iterator<Item = T> + '_ {
        self.free.clear();
        self.items.drain(..).flatten()
    }
}

struct GlBuffer<C: HasContext> {
    buffer: C::Buffer,
    target: u32,
}

struct GlProgram<C: HasContext> {
    program: C::Program,
    locations: Vec<Option<C::UniformLocation>>,
}

/// A [`GraphicsBackend`] issuing OpenGL calls through a `glow` context.
///
/// The context must be current on the render thread for the backend's whole
/// lifetime; creating it is left to the windowing layer.
pub struct GlowBackend<C: HasContext = glow::Context> {
    gl: C,
    buffers: GlObjects<GlBuffer<C>>,
    textures: GlObjects<C::Texture>,
    programs: GlObjects<GlProgram<C>>,
    framebuffers: GlObjects<C::Framebuffer>,
    vertex_arrays: GlObjects<C::VertexArray>,
    bound_program: Option<u32>,
    renderer_name: String,
}

fn shader_stages(source: &ProgramSource) -> Vec<(ShaderStage, u32, &str)> {
    match source {
        ProgramSource::Graphics { vertex, fragment } => vec![
            (ShaderStage::Vertex, glow::VERTEX_SHADER, vertex.as_ref()),
            (ShaderStage::Fragment, glow::FRAGMENT_SHADER, fragment.as_ref()),
        ],
        ProgramSource::Compute { compute } => {
            vec![(ShaderStage::Compute, glow::COMPUTE_SHADER, compute.as_ref())]
        }
    }
}

fn floats(data: &[u8]) -> Cow<'_, [f32]> {
    match bytemuck::try_cast_slice(data) {
        Ok(values) => Cow::Borrowed(values),
        Err(_) => Cow::Owned(bytemuck::pod_collect_to_vec(data)),
    }
}

fn ints(data: &[u8]) -> Cow<'_, [i32]> {
    match bytemuck::try_cast_slice(data) {
        Ok(values) => Cow::Borrowed(values),
        Err(_) => Cow::Owned(bytemuck::pod_collect_to_vec(data)),
    }
}

fn uints(data: &[u8]) -> Cow<'_, [u32]> {
    match bytemuck::try_cast_slice(data) {
        Ok(values) => Cow::Borrowed(values),
        Err(_) => Cow::Owned(bytemuck::pod_collect_to_vec(data)),
    }
}

impl<C: HasContext> GlowBackend<C> {
    /// Wraps a context that is current on the calling thread.
    pub fn new(gl: C) -> Self {
        // SAFETY: the caller made the context current.
        let renderer_name = unsafe {
            format!(
                "OpenGL {} ({})",
                gl.get_parameter_string(glow::VERSION),
                gl.get_parameter_string(glow::RENDERER)
            )
        };
        log::info!("GlowBackend initialised: {renderer_name}");
        Self {
            gl,
            buffers: GlObjects::new(),
            textures: GlObjects::new(),
            programs: GlObjects::new(),
            framebuffers: GlObjects::new(),
            vertex_arrays: GlObjects::new(),
            bound_program: None,
            renderer_name,
        }
    }

    /// The wrapped context.
    pub fn context(&self) -> &C {
        &self.gl
    }

    fn compile(&self, descriptor: &ProgramDescriptor) -> Result<C::Program, ShaderError> {
        let label = descriptor
            .label
            .as_deref()
            .unwrap_or("unnamed")
            .to_owned();
        let gl = &self.gl;
        // SAFETY: the context is current on this thread.
        unsafe {
            let program = gl.create_program().map_err(|log| ShaderError::LinkFailed {
                label: label.clone(),
                log,
            })?;
            let mut shaders = Vec::new();
            for (stage, kind, source) in shader_stages(&descriptor.source) {
                let shader = match gl.create_shader(kind) {
                    Ok(shader) => shader,
                    Err(log) => {
                        gl.delete_program(program);
                        return Err(ShaderError::CompilationFailed { stage, label, log });
                    }
                };
                gl.shader_source(shader, source);
                gl.compile_shader(shader);
                if !gl.get_shader_compile_status(shader) {
                    let log = gl.get_shader_info_log(shader);
                    gl.delete_shader(shader);
                    for attached in shaders {
                        gl.delete_shader(attached);
                    }
                    gl.delete_program(program);
                    return Err(ShaderError::CompilationFailed { stage, label, log });
                }
                gl.attach_shader(program, shader);
                shaders.push(shader);
            }

            gl.link_program(program);
            let linked = gl.get_program_link_status(program);
            for shader in shaders {
                gl.detach_shader(program, shader);
                gl.delete_shader(shader);
            }
            if !linked {
                let log = gl.get_program_info_log(program);
                gl.delete_program(program);
                return Err(ShaderError::LinkFailed { label, log });
            }
            Ok(program)
        }
    }

    fn buffer(&self, id: GpuBuffer) -> Option<&GlBuffer<C>> {
        let buffer = self.buffers.get(id.0);
        if buffer.is_none() {
            log::warn!("Unknown GL buffer {id:?}");
        }
        buffer
    }
}

impl<C: HasContext> GraphicsBackend for GlowBackend<C> {
    fn name(&self) -> &str {
        &self.renderer_name
    }

    fn create_buffer(
        &mut self,
        kind: BufferKind,
        size: usize,
        usage: BufferUsage,
        data: Option<&[u8]>,
    ) -> Result<GpuBuffer, ResourceError> {
        let target = kind.into_gl();
        let size_i32 = i32::try_from(size)
            .map_err(|_| ResourceError::BackendError(format!("buffer of {size} bytes is too large")))?;
        // SAFETY: the context is current on this thread.
        let buffer = unsafe {
            let buffer = self.gl.create_buffer().map_err(ResourceError::BackendError)?;
            self.gl.bind_buffer(target, Some(buffer));
            match data {
                Some(bytes) if bytes.len() == size => {
                    self.gl.buffer_data_u8_slice(target, bytes, usage.into_gl());
                }
                Some(bytes) => {
                    self.gl.buffer_data_size(target, size_i32, usage.into_gl());
                    let len = bytes.len().min(size);
                    self.gl.buffer_sub_data_u8_slice(target, 0, &bytes[..len]);
                }
                None => self.gl.buffer_data_size(target, size_i32, usage.into_gl()),
            }
            self.gl.bind_buffer(target, None);
            buffer
        };
        Ok(GpuBuffer(self.buffers.insert(GlBuffer { buffer, target })))
    }

    fn update_buffer(&mut self, buffer: GpuBuffer, _kind: BufferKind, offset: usize, data: &[u8]) {
        let Some(gl_buffer) = self.buffer(buffer) else {
            return;
        };
        // SAFETY: the context is current on this thread.
        unsafe {
            self.gl.bind_buffer(gl_buffer.target, Some(gl_buffer.buffer));
            self.gl
                .buffer_sub_data_u8_slice(gl_buffer.target, offset as i32, data);
            self.gl.bind_buffer(gl_buffer.target, None);
        }
    }

    fn destroy_buffer(&mut self, buffer: GpuBuffer) {
        if let Some(gl_buffer) = self.buffers.remove(buffer.0) {
            // SAFETY: the context is current on this thread.
            unsafe { self.gl.delete_buffer(gl_buffer.buffer) };
        }
    }

    fn create_texture(
        &mut self,
        descriptor: &TextureDescriptor,
        data: Option<&[u8]>,
    ) -> Result<GpuTexture, ResourceError> {
        let (internal, format, ty) = descriptor.format.into_gl();
        let (min, mag) = filter(descriptor.filter, descriptor.mipmaps);
        let wrap: i32 = descriptor.wrap.into_gl();
        if let Some(bytes) = data {
            if bytes.len() < descriptor.byte_size() {
                return Err(ResourceError::OutOfBounds {
                    offset: 0,
                    len: descriptor.byte_size(),
                    size: bytes.len(),
                });
            }
        }
        // SAFETY: the context is current on this thread.
        let texture = unsafe {
            let texture = self.gl.create_texture().map_err(ResourceError::BackendError)?;
            self.gl.bind_texture(glow::TEXTURE_2D, Some(texture));
            self.gl
                .tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MIN_FILTER, min);
            self.gl
                .tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MAG_FILTER, mag);
            self.gl
                .tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_WRAP_S, wrap);
            self.gl
                .tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_WRAP_T, wrap);
            self.gl.tex_image_2d(
                glow::TEXTURE_2D,
                0,
                internal,
                descriptor.width as i32,
                descriptor.height as i32,
                0,
                format,
                ty,
                glow::PixelUnpackData::Slice(data),
            );
            if descriptor.mipmaps {
                self.gl.generate_mipmap(glow::TEXTURE_2D);
            }
            self.gl.bind_texture(glow::TEXTURE_2D, None);
            texture
        };
        Ok(GpuTexture(self.textures.insert(texture)))
    }

    fn destroy_texture(&mut self, texture: GpuTexture) {
        if let Some(texture) = self.textures.remove(texture.0) {
            // SAFETY: the context is current on this thread.
            unsafe { self.gl.delete_texture(texture) };
        }
    }

    fn create_program(&mut self, descriptor: &ProgramDescriptor) -> Result<GpuProgram, ShaderError> {
        let program = self.compile(descriptor)?;
        Ok(GpuProgram(self.programs.insert(GlProgram {
            program,
            locations: Vec::new(),
        })))
    }

    fn active_uniforms(&mut self, program: GpuProgram) -> Vec<ActiveUniform> {
        let Some(gl_program) = self.programs.items.get_mut(program.0 as usize).and_then(Option::as_mut) else {
            return Vec::new();
        };
        let gl = &self.gl;
        let mut uniforms = Vec::new();
        gl_program.locations.clear();
        // SAFETY: the context is current on this thread.
        unsafe {
            let count = gl.get_active_uniforms(gl_program.program);
            for index in 0..count {
                let Some(active) = gl.get_active_uniform(gl_program.program, index) else {
                    continue;
                };
                let Some(ty) = uniform_type_from_gl(active.utype) else {
                    log::debug!("Uniform `{}` has an unsupported GL type {:#x}", active.name, active.utype);
                    continue;
                };
                let Some(location) = gl.get_uniform_location(gl_program.program, &active.name) else {
                    // Block members have no location.
                    continue;
                };
                let name = active.name.trim_end_matches("[0]").to_owned();
                uniforms.push(ActiveUniform {
                    name,
                    location: gl_program.locations.len() as i32,
                    ty,
                    count: active.size.clamp(1, u8::MAX as i32) as u8,
                });
                gl_program.locations.push(Some(location));
            }
        }
        uniforms
    }

    fn destroy_program(&mut self, program: GpuProgram) {
        if let Some(gl_program) = self.programs.remove(program.0) {
            if self.bound_program == Some(program.0) {
                self.bound_program = None;
            }
            // SAFETY: the context is current on this thread.
            unsafe { self.gl.delete_program(gl_program.program) };
        }
    }

    fn create_framebuffer(
        &mut self,
        color: &[GpuTexture],
        depth: Option<GpuTexture>,
    ) -> Result<GpuFramebuffer, ResourceError> {
        let texture = |id: GpuTexture| self.textures.get(id.0).copied().ok_or(ResourceError::InvalidHandle);
        let color = color.iter().map(|&id| texture(id)).collect::<Result<Vec<_>, _>>()?;
        let depth = depth.map(texture).transpose()?;
        // SAFETY: the context is current on this thread.
        unsafe {
            let framebuffer = self.gl.create_framebuffer().map_err(ResourceError::BackendError)?;
            self.gl.bind_framebuffer(glow::FRAMEBUFFER, Some(framebuffer));
            let mut attachments = Vec::with_capacity(color.len());
            for (index, texture) in color.iter().enumerate() {
                let attachment = glow::COLOR_ATTACHMENT0 + index as u32;
                self.gl.framebuffer_texture_2d(
                    glow::FRAMEBUFFER,
                    attachment,
                    glow::TEXTURE_2D,
                    Some(*texture),
                    0,
                );
                attachments.push(attachment);
            }
            if let Some(texture) = depth {
                self.gl.framebuffer_texture_2d(
                    glow::FRAMEBUFFER,
                    glow::DEPTH_ATTACHMENT,
                    glow::TEXTURE_2D,
                    Some(texture),
                    0,
                );
            }
            self.gl.draw_buffers(&attachments);
            let status = self.gl.check_framebuffer_status(glow::FRAMEBUFFER);
            self.gl.bind_framebuffer(glow::FRAMEBUFFER, None);
            if status != glow::FRAMEBUFFER_COMPLETE {
                self.gl.delete_framebuffer(framebuffer);
                return Err(ResourceError::BackendError(format!(
                    "framebuffer incomplete (status {status:#x})"
                )));
            }
            Ok(GpuFramebuffer(self.framebuffers.insert(framebuffer)))
        }
    }

    fn destroy_framebuffer(&mut self, framebuffer: GpuFramebuffer) {
        if let Some(framebuffer) = self.framebuffers.remove(framebuffer.0) {
            // SAFETY: the context is current on this thread.
            unsafe { self.gl.delete_framebuffer(framebuffer) };
        }
    }

    fn create_vertex_array(
        &mut self,
        vertex_buffer: GpuBuffer,
        layout: &VertexLayout,
        vertex_count: usize,
        index_buffer: Option<GpuBuffer>,
    ) -> Result<GpuVertexArray, ResourceError> {
        let vertices = self
            .buffers
            .get(vertex_buffer.0)
            .map(|buffer| buffer.buffer)
            .ok_or(ResourceError::InvalidHandle)?;
        let indices = match index_buffer {
            Some(id) => Some(
                self.buffers
                    .get(id.0)
                    .map(|buffer| buffer.buffer)
                    .ok_or(ResourceError::InvalidHandle)?,
            ),
            None => None,
        };
        // SAFETY: the context is current on this thread.
        unsafe {
            let vertex_array = self.gl.create_vertex_array().map_err(ResourceError::BackendError)?;
            self.gl.bind_vertex_array(Some(vertex_array));
            self.gl.bind_buffer(glow::ARRAY_BUFFER, Some(vertices));
            for (index, attribute) in layout.attributes().iter().enumerate() {
                let location = u32::from(attribute.location());
                let size = i32::from(attribute.size());
                let ty: u32 = attribute.ty().into_gl();
                let stride = layout.stride(index) as i32;
                let offset = layout.offset(index, vertex_count) as i32;
                self.gl.enable_vertex_attrib_array(location);
                match attribute.ty() {
                    AttributeType::F64 => {
                        self.gl.vertex_attrib_pointer_f64(location, size, ty, stride, offset)
                    }
                    integer if integer.is_integer() && !attribute.normalized() => {
                        self.gl.vertex_attrib_pointer_i32(location, size, ty, stride, offset)
                    }
                    _ => self.gl.vertex_attrib_pointer_f32(
                        location,
                        size,
                        ty,
                        attribute.normalized(),
                        stride,
                        offset,
                    ),
                }
            }
            if let Some(indices) = indices {
                self.gl.bind_buffer(glow::ELEMENT_ARRAY_BUFFER, Some(indices));
            }
            self.gl.bind_vertex_array(None);
            self.gl.bind_buffer(glow::ARRAY_BUFFER, None);
            Ok(GpuVertexArray(self.vertex_arrays.insert(vertex_array)))
        }
    }

    fn destroy_vertex_array(&mut self, vertex_array: GpuVertexArray) {
        if let Some(vertex_array) = self.vertex_arrays.remove(vertex_array.0) {
            // SAFETY: the context is current on this thread.
            unsafe { self.gl.delete_vertex_array(vertex_array) };
        }
    }

    fn bind_framebuffer(&mut self, framebuffer: Option<GpuFramebuffer>) {
        let framebuffer = framebuffer.and_then(|id| self.framebuffers.get(id.0).copied());
        // SAFETY: the context is current on this thread.
        unsafe { self.gl.bind_framebuffer(glow::FRAMEBUFFER, framebuffer) };
    }

    fn clear(&mut self, values: ClearValues) {
        let mut mask = 0;
        // SAFETY: the context is current on this thread.
        unsafe {
            if let Some([r, g, b, a]) = values.color {
                self.gl.clear_color(r, g, b, a);
                mask |= glow::COLOR_BUFFER_BIT;
            }
            if let Some(depth) = values.depth {
                self.gl.clear_depth_f32(depth);
                mask |= glow::DEPTH_BUFFER_BIT;
            }
            if mask != 0 {
                self.gl.clear(mask);
            }
        }
    }

    fn bind_program(&mut self, program: Option<GpuProgram>) {
        let gl_program = program.and_then(|id| self.programs.get(id.0)).map(|p| p.program);
        self.bound_program = program.map(|id| id.0).filter(|_| gl_program.is_some());
        // SAFETY: the context is current on this thread.
        unsafe { self.gl.use_program(gl_program) };
    }

    fn set_uniform(&mut self, location: i32, ty: UniformType, count: u8, data: &[u8]) {
        let Some(program) = self.bound_program.and_then(|id| self.programs.get(id)) else {
            return;
        };
        let Some(Some(location)) = program.locations.get(location as usize) else {
            return;
        };
        let location = Some(location);
        let len = ty.size() * count as usize;
        let data = &data[..len.min(data.len())];
        let gl = &self.gl;
        // SAFETY: the context is current on this thread.
        unsafe {
            match ty {
                UniformType::Float => gl.uniform_1_f32_slice(location, &floats(data)),
                UniformType::Vec2 => gl.uniform_2_f32_slice(location, &floats(data)),
                UniformType::Vec3 => gl.uniform_3_f32_slice(location, &floats(data)),
                UniformType::Vec4 => gl.uniform_4_f32_slice(location, &floats(data)),
                UniformType::Mat3 => gl.uniform_matrix_3_f32_slice(location, false, &floats(data)),
                UniformType::Mat4 => gl.uniform_matrix_4_f32_slice(location, false, &floats(data)),
                UniformType::Int | UniformType::Sampler => gl.uniform_1_i32_slice(location, &ints(data)),
                UniformType::IVec2 => gl.uniform_2_i32_slice(location, &ints(data)),
                UniformType::IVec3 => gl.uniform_3_i32_slice(location, &ints(data)),
                UniformType::IVec4 => gl.uniform_4_i32_slice(location, &ints(data)),
                UniformType::UInt => gl.uniform_1_u32_slice(location, &uints(data)),
            }
        }
    }

    fn bind_texture(&mut self, unit: u32, texture: Option<GpuTexture>) {
        let texture = texture.and_then(|id| self.textures.get(id.0).copied());
        // SAFETY: the context is current on this thread.
        unsafe {
            self.gl.active_texture(glow::TEXTURE0 + unit);
            self.gl.bind_texture(glow::TEXTURE_2D, texture);
        }
    }

    fn bind_storage_buffer(&mut self, binding: u32, buffer: Option<GpuBuffer>) {
        let buffer = buffer.and_then(|id| self.buffers.get(id.0)).map(|b| b.buffer);
        // SAFETY: the context is current on this thread.
        unsafe {
            self.gl
                .bind_buffer_base(glow::SHADER_STORAGE_BUFFER, binding, buffer)
        };
    }

    fn bind_atomic_counter_buffer(&mut self, binding: u32, buffer: Option<GpuBuffer>) {
        let buffer = buffer.and_then(|id| self.buffers.get(id.0)).map(|b| b.buffer);
        // SAFETY: the context is current on this thread.
        unsafe {
            self.gl
                .bind_buffer_base(glow::ATOMIC_COUNTER_BUFFER, binding, buffer)
        };
    }

    fn set_write_mask(&mut self, mask: WriteMask) {
        // SAFETY: the context is current on this thread.
        unsafe {
            self.gl.color_mask(mask.rgb, mask.rgb, mask.rgb, mask.alpha);
            self.gl.depth_mask(mask.depth);
        }
    }

    fn set_depth_test(&mut self, test: DepthTest) {
        let func: Option<u32> = test.into_gl();
        // SAFETY: the context is current on this thread.
        unsafe {
            match func {
                Some(func) => {
                    self.gl.enable(glow::DEPTH_TEST);
                    self.gl.depth_func(func);
                }
                None => self.gl.disable(glow::DEPTH_TEST),
            }
        }
    }

    fn set_blend(&mut self, factors: Option<(BlendFactor, BlendFactor)>) {
        // SAFETY: the context is current on this thread.
        unsafe {
            match factors {
                Some((src, dst)) => {
                    self.gl.enable(glow::BLEND);
                    self.gl.blend_func(src.into_gl(), dst.into_gl());
                }
                None => self.gl.disable(glow::BLEND),
            }
        }
    }

    fn set_blend_equation(&mut self, equation: BlendEquation) {
        // SAFETY: the context is current on this thread.
        unsafe { self.gl.blend_equation(equation.into_gl()) };
    }

    fn set_cull_mode(&mut self, mode: CullMode) {
        let face: Option<u32> = mode.into_gl();
        // SAFETY: the context is current on this thread.
        unsafe {
            match face {
                Some(face) => {
                    self.gl.enable(glow::CULL_FACE);
                    self.gl.cull_face(face);
                }
                None => self.gl.disable(glow::CULL_FACE),
            }
        }
    }

    fn set_scissor(&mut self, rect: ScissorRect) {
        // SAFETY: the context is current on this thread.
        unsafe {
            self.gl.enable(glow::SCISSOR_TEST);
            self.gl.scissor(
                rect.x as i32,
                rect.y as i32,
                rect.width as i32,
                rect.height as i32,
            );
        }
    }

    fn bind_vertex_array(&mut self, vertex_array: Option<GpuVertexArray>) {
        let vertex_array = vertex_array.and_then(|id| self.vertex_arrays.get(id.0).copied());
        // SAFETY: the context is current on this thread.
        unsafe { self.gl.bind_vertex_array(vertex_array) };
    }

    fn draw_indexed(
        &mut self,
        primitive: PrimitiveTopology,
        format: IndexFormat,
        count: u32,
        byte_offset: usize,
        base_vertex: i32,
    ) {
        // SAFETY: the context is current on this thread.
        unsafe {
            self.gl.draw_elements_base_vertex(
                primitive.into_gl(),
                count as i32,
                format.into_gl(),
                byte_offset as i32,
                base_vertex,
            )
        };
    }

    fn draw(&mut self, primitive: PrimitiveTopology, first: u32, count: u32) {
        // SAFETY: the context is current on this thread.
        unsafe {
            self.gl
                .draw_arrays(primitive.into_gl(), first as i32, count as i32)
        };
    }

    fn dispatch_compute(&mut self, x: u32, y: u32, z: u32) {
        // SAFETY: the context is current on this thread.
        unsafe { self.gl.dispatch_compute(x, y, z) };
    }

    fn memory_barrier(&mut self, barrier: MemoryBarrier) {
        // SAFETY: the context is current on this thread.
        unsafe { self.gl.memory_barrier(barrier.into_gl()) };
    }
}

impl<C: HasContext> Drop for GlowBackend<C> {
    fn drop(&mut self) {
        // SAFETY: the context is current on this thread.
        unsafe {
            for vertex_array in self.vertex_arrays.drain() {
                self.gl.delete_vertex_array(vertex_array);
            }
            for framebuffer in self.framebuffers.drain() {
                self.gl.delete_framebuffer(framebuffer);
            }
            for program in self.programs.drain() {
                self.gl.delete_program(program.program);
            }
            for texture in self.textures.drain() {
                self.gl.delete_texture(texture);
            }
            for buffer in self.buffers.drain() {
                self.gl.delete_buffer(buffer.buffer);
            }
        }
        log::info!("GlowBackend released its GL objects");
    }
}
