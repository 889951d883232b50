// SPDX-License-Identifier: CEPL-1.0
//! Vulkan implementation of the renderer's backend traits.

mod device;
mod geometry;
mod pipeline;
mod swapchain;

use std::sync::Arc;

use ash::vk;
use prism_core::{RenderError, RenderResult};
use prism_render::{
    ClearValues, GraphicsBackend, PipelineConfig, PushConstantPayload, RenderSize, Vertex,
    Viewport,
};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use tracing::info;

pub use device::DeviceContext;
pub use geometry::GeometryBuffer;
pub use pipeline::{GraphicsPipeline, ShaderBinaries};
pub use swapchain::{Swapchain, MAX_FRAMES_IN_FLIGHT};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum VkVsyncMode {
    Fifo, // Target monitor refresh rate
    #[default]
    Mailbox, // Low latency, falls back to FIFO
}

/// Wraps a failed `vk::Result` in the given error kind, naming the call.
pub(crate) fn vk_err(
    kind: fn(String) -> RenderError,
    what: &'static str,
) -> impl Fn(vk::Result) -> RenderError {
    move |e| kind(format!("{what}: {e}"))
}

pub struct VkBackend {
    layout: vk::PipelineLayout,
    shaders: ShaderBinaries,
    pipeline_config: PipelineConfig,
    vsync_mode: VkVsyncMode,
    ctx: Arc<DeviceContext>,
}

impl VkBackend {
    pub fn new<W: HasWindowHandle + HasDisplayHandle>(
        window: &W,
        shaders: ShaderBinaries,
        vsync_mode: VkVsyncMode,
    ) -> RenderResult<Self> {
        let ctx = Arc::new(DeviceContext::new(window, "prism")?);
        let layout = unsafe { pipeline::create_pipeline_layout(ctx.device())? };
        info!("vk backend ready (vsync_mode={vsync_mode:?})");
        Ok(Self {
            layout,
            shaders,
            pipeline_config: PipelineConfig::default(),
            vsync_mode,
            ctx,
        })
    }

    pub fn context(&self) -> &Arc<DeviceContext> {
        &self.ctx
    }

    pub fn create_mesh(&self, vertices: &[Vertex]) -> RenderResult<GeometryBuffer> {
        GeometryBuffer::create(self.ctx.clone(), vertices)
    }
}

impl Drop for VkBackend {
    fn drop(&mut self) {
        // Chains, pipelines and meshes hold their own context handle; only the
        // shared layout is ours.
        unsafe {
            self.ctx.device().device_wait_idle().ok();
            self.ctx
                .device()
                .destroy_pipeline_layout(self.layout, None);
        }
    }
}

impl GraphicsBackend for VkBackend {
    type CommandBuffer = vk::CommandBuffer;
    type Chain = Swapchain;
    type Pipeline = GraphicsPipeline;
    type Mesh = GeometryBuffer;

    fn wait_idle(&self) -> RenderResult<()> {
        self.ctx.wait_idle()
    }

    fn create_chain(&self, extent: RenderSize, previous: Option<Swapchain>) -> RenderResult<Swapchain> {
        Swapchain::create(self.ctx.clone(), extent, previous, self.vsync_mode)
    }

    fn allocate_command_buffers(&self, count: usize) -> RenderResult<Vec<vk::CommandBuffer>> {
        let alloc_info = vk::CommandBufferAllocateInfo {
            s_type: vk::StructureType::COMMAND_BUFFER_ALLOCATE_INFO,
            command_pool: self.ctx.command_pool(),
            level: vk::CommandBufferLevel::PRIMARY,
            command_buffer_count: count as u32,
            ..Default::default()
        };
        unsafe { self.ctx.device().allocate_command_buffers(&alloc_info) }
            .map_err(vk_err(RenderError::Allocation, "allocate_command_buffers"))
    }

    fn free_command_buffers(&self, buffers: Vec<vk::CommandBuffer>) {
        unsafe {
            self.ctx
                .device()
                .free_command_buffers(self.ctx.command_pool(), &buffers);
        }
    }

    fn build_pipeline(&self, chain: &Swapchain) -> RenderResult<GraphicsPipeline> {
        GraphicsPipeline::build(
            self.ctx.clone(),
            &self.pipeline_config,
            self.layout,
            chain.render_pass(),
            &self.shaders,
        )
    }

    fn begin_commands(&self, cmd: vk::CommandBuffer) -> RenderResult<()> {
        let d = self.ctx.device();
        let begin = vk::CommandBufferBeginInfo {
            s_type: vk::StructureType::COMMAND_BUFFER_BEGIN_INFO,
            ..Default::default()
        };
        unsafe {
            d.reset_command_buffer(cmd, vk::CommandBufferResetFlags::empty())
                .map_err(vk_err(RenderError::Device, "reset_command_buffer"))?;
            d.begin_command_buffer(cmd, &begin)
                .map_err(vk_err(RenderError::Device, "begin_command_buffer"))
        }
    }

    fn end_commands(&self, cmd: vk::CommandBuffer) -> RenderResult<()> {
        unsafe { self.ctx.device().end_command_buffer(cmd) }
            .map_err(vk_err(RenderError::Device, "end_command_buffer"))
    }

    fn begin_render_pass(
        &self,
        cmd: vk::CommandBuffer,
        chain: &Swapchain,
        image_index: u32,
        clear: &ClearValues,
    ) {
        let clear_values = [
            vk::ClearValue {
                color: vk::ClearColorValue {
                    float32: clear.colour,
                },
            },
            vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue {
                    depth: clear.depth,
                    stencil: clear.stencil,
                },
            },
        ];
        let info = vk::RenderPassBeginInfo {
            s_type: vk::StructureType::RENDER_PASS_BEGIN_INFO,
            render_pass: chain.render_pass(),
            framebuffer: chain.framebuffer(image_index),
            render_area: vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent: chain.extent_vk(),
            },
            clear_value_count: clear_values.len() as u32,
            p_clear_values: clear_values.as_ptr(),
            ..Default::default()
        };
        unsafe {
            self.ctx
                .device()
                .cmd_begin_render_pass(cmd, &info, vk::SubpassContents::INLINE);
        }
    }

    fn set_viewport(&self, cmd: vk::CommandBuffer, viewport: &Viewport) {
        let vp = vk::Viewport {
            x: viewport.x,
            y: viewport.y,
            width: viewport.width,
            height: viewport.height,
            min_depth: viewport.min_depth,
            max_depth: viewport.max_depth,
        };
        let sc = vk::Rect2D {
            offset: vk::Offset2D {
                x: viewport.x as i32,
                y: viewport.y as i32,
            },
            extent: vk::Extent2D {
                width: viewport.width as u32,
                height: viewport.height as u32,
            },
        };
        unsafe {
            let d = self.ctx.device();
            d.cmd_set_viewport(cmd, 0, std::slice::from_ref(&vp));
            d.cmd_set_scissor(cmd, 0, std::slice::from_ref(&sc));
        }
    }

    fn end_render_pass(&self, cmd: vk::CommandBuffer) {
        unsafe { self.ctx.device().cmd_end_render_pass(cmd) }
    }

    fn bind_pipeline(&self, cmd: vk::CommandBuffer, pipeline: &GraphicsPipeline) {
        pipeline.bind(cmd);
    }

    fn push_constants(
        &self,
        cmd: vk::CommandBuffer,
        pipeline: &GraphicsPipeline,
        payload: &PushConstantPayload,
    ) {
        unsafe {
            self.ctx.device().cmd_push_constants(
                cmd,
                pipeline.layout(),
                pipeline::PUSH_STAGES,
                0,
                bytemuck::bytes_of(payload),
            );
        }
    }

    fn bind_mesh(&self, cmd: vk::CommandBuffer, mesh: &GeometryBuffer) {
        mesh.bind(cmd);
    }

    fn draw_mesh(&self, cmd: vk::CommandBuffer, mesh: &GeometryBuffer) {
        mesh.draw(cmd);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vk_err_names_the_call() {
        let e = vk_err(RenderError::Device, "create_surface")(vk::Result::ERROR_SURFACE_LOST_KHR);
        match e {
            RenderError::Device(msg) => assert!(msg.starts_with("create_surface: ")),
            other => panic!("unexpected {other:?}"),
        }

        let e = vk_err(RenderError::Allocation, "allocate_memory")(
            vk::Result::ERROR_OUT_OF_DEVICE_MEMORY,
        );
        assert!(matches!(e, RenderError::Allocation(_)));
    }

    #[test]
    fn mailbox_is_the_default_mode() {
        assert_eq!(VkVsyncMode::default(), VkVsyncMode::Mailbox);
    }
}
