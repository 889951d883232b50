// SPDX-License-Identifier: CEPL-1.0
use tracing::warn;

use crate::{GraphicsBackend, MeshArena, PushConstantPayload, RenderableObject, Renderer};

/// Records one draw per object, in order, with the renderer's pipeline.
#[derive(Debug)]
pub struct SimpleRenderSystem {
    /// Radians added to every object's rotation per recorded frame.
    rotation_step: f32,
}

impl SimpleRenderSystem {
    pub const ROTATION_STEP: f32 = 0.01;

    pub fn new() -> Self {
        Self {
            rotation_step: Self::ROTATION_STEP,
        }
    }

    #[cfg(test)]
    fn with_step(rotation_step: f32) -> Self {
        Self { rotation_step }
    }

    pub fn rotation_step(&self) -> f32 {
        self.rotation_step
    }

    /// Must be called between `begin_render_pass` and `end_render_pass` with
    /// the current frame's command buffer; panics otherwise.
    pub fn render_objects<B: GraphicsBackend>(
        &self,
        renderer: &Renderer<B>,
        cmd: B::CommandBuffer,
        objects: &mut [RenderableObject],
        meshes: &MeshArena<B::Mesh>,
    ) {
        assert!(
            renderer.current_command_buffer() == cmd,
            "cannot record draws with a command buffer from another frame"
        );
        assert!(
            renderer.is_render_pass_open(),
            "cannot record draws outside a render pass"
        );

        let backend = renderer.backend();
        let pipeline = renderer.pipeline();
        backend.bind_pipeline(cmd, pipeline);

        for obj in objects {
            obj.transform.rotate(self.rotation_step);

            let Some(mesh) = meshes.get(obj.mesh) else {
                warn!(id = obj.id().get(), "object refers to a missing mesh; skipped");
                continue;
            };
            let push = PushConstantPayload::new(&obj.transform, obj.colour);
            backend.push_constants(cmd, pipeline, &push);
            backend.bind_mesh(cmd, mesh);
            backend.draw_mesh(cmd, mesh);
        }
    }
}

impl Default for SimpleRenderSystem {
    fn default() -> Self {
        Self::new()
    }
}
