// SPDX-License-Identifier: CEPL-1.0
mod backend;
pub mod frame;
#[cfg(test)]
mod mock;
pub mod pipeline;
mod push;
pub mod scene;
pub mod system;

pub use backend::{ClearValues, GraphicsBackend, PresentationChain, SwapStatus, Viewport};
pub use frame::{FramePhase, Renderer};
pub use pipeline::PipelineConfig;
pub use prism_core::{RenderError, RenderResult};
pub use push::PushConstantPayload;
pub use scene::{MeshArena, MeshHandle, ObjectId, ObjectRegistry, RenderableObject, Vertex};
pub use system::SimpleRenderSystem;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RenderSize {
    pub width: u32,
    pub height: u32,
}

impl RenderSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Zero in either dimension, e.g. a minimized window.
    #[inline]
    pub fn is_degenerate(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// The window side of the renderer: size, resize notification and event pumping.
pub trait SurfaceProvider {
    fn extent(&self) -> RenderSize;
    fn should_close(&self) -> bool;
    /// Processes pending events without blocking.
    fn poll_events(&mut self);
    /// Blocks until at least one event arrives.
    fn wait_events(&mut self);
    fn was_resized(&self) -> bool;
    fn reset_resized_flag(&mut self);
}
