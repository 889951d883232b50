// SPDX-License-Identifier: CEPL-1.0
use std::mem::{offset_of, size_of};
use std::sync::Arc;

use ash::vk;
use prism_core::{RenderError, RenderResult};
use prism_render::scene::validate_vertices;
use prism_render::Vertex;
use tracing::debug;

use crate::DeviceContext;

/// A static mesh in a host-visible, host-coherent vertex buffer.
pub struct GeometryBuffer {
    ctx: Arc<DeviceContext>,
    buffer: vk::Buffer,
    memory: vk::DeviceMemory,
    vertex_count: u32,
}

impl GeometryBuffer {
    /// Uploads `vertices` directly; there is no staging copy.
    pub fn create(ctx: Arc<DeviceContext>, vertices: &[Vertex]) -> RenderResult<Self> {
        validate_vertices(vertices)?;

        let bytes: &[u8] = bytemuck::cast_slice(vertices);
        let size = bytes.len() as vk::DeviceSize;
        let (buffer, memory) = ctx.create_buffer(
            size,
            vk::BufferUsageFlags::VERTEX_BUFFER,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        )?;

        // Dropped on error, releasing the buffer and memory.
        let geometry = Self {
            ctx,
            buffer,
            memory,
            vertex_count: vertices.len() as u32,
        };

        unsafe {
            let d = geometry.ctx.device();
            let ptr = d
                .map_memory(memory, 0, size, vk::MemoryMapFlags::empty())
                .map_err(|e| RenderError::Allocation(format!("map_memory: {e}")))?;
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), ptr.cast::<u8>(), bytes.len());
            d.unmap_memory(memory);
        }

        debug!("vertex buffer: {} vertices, {size} bytes", geometry.vertex_count);
        Ok(geometry)
    }

    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }

    pub fn bind(&self, cmd: vk::CommandBuffer) {
        unsafe {
            self.ctx
                .device()
                .cmd_bind_vertex_buffers(cmd, 0, &[self.buffer], &[0]);
        }
    }

    pub fn draw(&self, cmd: vk::CommandBuffer) {
        unsafe {
            self.ctx.device().cmd_draw(cmd, self.vertex_count, 1, 0, 0);
        }
    }
}

impl Drop for GeometryBuffer {
    fn drop(&mut self) {
        unsafe {
            let d = self.ctx.device();
            d.destroy_buffer(self.buffer, None);
            d.free_memory(self.memory, None);
        }
    }
}

pub(crate) fn vertex_binding_descriptions() -> [vk::VertexInputBindingDescription; 1] {
    [vk::VertexInputBindingDescription {
        binding: 0,
        stride: size_of::<Vertex>() as u32,
        input_rate: vk::VertexInputRate::VERTEX,
    }]
}

pub(crate) fn vertex_attribute_descriptions() -> [vk::VertexInputAttributeDescription; 2] {
    [
        vk::VertexInputAttributeDescription {
            location: 0,
            binding: 0,
            format: vk::Format::R32G32_SFLOAT,
            offset: offset_of!(Vertex, position) as u32,
        },
        vk::VertexInputAttributeDescription {
            location: 1,
            binding: 0,
            format: vk::Format::R32G32B32_SFLOAT,
            offset: offset_of!(Vertex, colour) as u32,
        },
    ]
}
