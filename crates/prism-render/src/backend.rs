// SPDX-License-Identifier: CEPL-1.0
use std::fmt::Debug;

use prism_core::RenderResult;

use crate::{PushConstantPayload, RenderSize};

/// Outcome of an acquire or present that did not fail outright.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SwapStatus {
    Optimal,
    /// Still presentable, but no longer matches the surface exactly.
    Suboptimal,
    /// No longer usable; the chain must be rebuilt before retrying.
    OutOfDate,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ClearValues {
    pub colour: [f32; 4],
    pub depth: f32,
    pub stencil: u32,
}

impl Default for ClearValues {
    fn default() -> Self {
        Self {
            colour: [0.01, 0.01, 0.01, 1.0],
            depth: 1.0,
            stencil: 0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub min_depth: f32,
    pub max_depth: f32,
}

impl Viewport {
    /// Origin at (0, 0), covering `size`, depth range [0, 1].
    pub fn full(size: RenderSize) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width: size.width as f32,
            height: size.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        }
    }
}

/// Presentable images plus the render pass and framebuffers that target them.
pub trait PresentationChain {
    type CommandBuffer: Copy;

    fn image_count(&self) -> usize;
    fn extent(&self) -> RenderSize;

    /// Errors other than staleness surface as `RenderError::SurfaceLost`.
    fn acquire_next_image(&mut self) -> RenderResult<(u32, SwapStatus)>;

    /// Errors other than staleness surface as `RenderError::Presentation`.
    fn submit_and_present(
        &mut self,
        cmd: Self::CommandBuffer,
        image_index: u32,
    ) -> RenderResult<SwapStatus>;
}

/// Device capabilities the frame loop and draw recording are written against.
pub trait GraphicsBackend {
    type CommandBuffer: Copy + PartialEq + Debug;
    type Chain: PresentationChain<CommandBuffer = Self::CommandBuffer>;
    type Pipeline;
    type Mesh;

    /// Blocks until the device has finished all submitted work.
    fn wait_idle(&self) -> RenderResult<()>;

    /// Builds a chain for `extent`. `previous` is handed over so its resources can be
    /// retired after the new chain exists.
    fn create_chain(
        &self,
        extent: RenderSize,
        previous: Option<Self::Chain>,
    ) -> RenderResult<Self::Chain>;

    fn allocate_command_buffers(&self, count: usize) -> RenderResult<Vec<Self::CommandBuffer>>;
    fn free_command_buffers(&self, buffers: Vec<Self::CommandBuffer>);

    /// Builds the graphics pipeline against `chain`'s render pass.
    fn build_pipeline(&self, chain: &Self::Chain) -> RenderResult<Self::Pipeline>;

    fn begin_commands(&self, cmd: Self::CommandBuffer) -> RenderResult<()>;
    fn end_commands(&self, cmd: Self::CommandBuffer) -> RenderResult<()>;

    fn begin_render_pass(
        &self,
        cmd: Self::CommandBuffer,
        chain: &Self::Chain,
        image_index: u32,
        clear: &ClearValues,
    );
    /// Sets the dynamic viewport and a scissor covering the same area.
    fn set_viewport(&self, cmd: Self::CommandBuffer, viewport: &Viewport);
    fn end_render_pass(&self, cmd: Self::CommandBuffer);

    fn bind_pipeline(&self, cmd: Self::CommandBuffer, pipeline: &Self::Pipeline);
    fn push_constants(
        &self,
        cmd: Self::CommandBuffer,
        pipeline: &Self::Pipeline,
        payload: &PushConstantPayload,
    );
    fn bind_mesh(&self, cmd: Self::CommandBuffer, mesh: &Self::Mesh);
    fn draw_mesh(&self, cmd: Self::CommandBuffer, mesh: &Self::Mesh);
}
