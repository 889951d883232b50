// SPDX-License-Identifier: CEPL-1.0
use std::fs;
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;

use ash::util::read_spv;
use ash::vk;
use prism_core::{RenderError, RenderResult};
use prism_render::pipeline::{
    BlendFactor, BlendOp, CompareOp, CullMode, DynamicStates, FrontFace, PolygonMode, Topology,
};
use prism_render::{PipelineConfig, PushConstantPayload};
use tracing::debug;

use crate::geometry::{vertex_attribute_descriptions, vertex_binding_descriptions};
use crate::{vk_err, DeviceContext};

pub(crate) const PUSH_STAGES: vk::ShaderStageFlags = vk::ShaderStageFlags::from_raw(
    vk::ShaderStageFlags::VERTEX.as_raw() | vk::ShaderStageFlags::FRAGMENT.as_raw(),
);

/// Decoded SPIR-V for the vertex and fragment stages.
#[derive(Clone, Debug)]
pub struct ShaderBinaries {
    vertex: Vec<u32>,
    fragment: Vec<u32>,
}

impl ShaderBinaries {
    /// The shaders compiled into the crate at build time.
    pub fn embedded() -> RenderResult<Self> {
        Self::from_bytes(
            include_bytes!(concat!(env!("OUT_DIR"), "/simple.vert.spv")),
            include_bytes!(concat!(env!("OUT_DIR"), "/simple.frag.spv")),
        )
    }

    pub fn load(vertex: &Path, fragment: &Path) -> RenderResult<Self> {
        let read = |p: &Path| -> RenderResult<Vec<u32>> {
            let bytes = fs::read(p)
                .map_err(|e| RenderError::ShaderLoad(format!("{}: {e}", p.display())))?;
            decode(&bytes, &p.display().to_string())
        };
        Ok(Self {
            vertex: read(vertex)?,
            fragment: read(fragment)?,
        })
    }

    pub fn from_bytes(vertex: &[u8], fragment: &[u8]) -> RenderResult<Self> {
        Ok(Self {
            vertex: decode(vertex, "vertex shader")?,
            fragment: decode(fragment, "fragment shader")?,
        })
    }
}

fn decode(bytes: &[u8], name: &str) -> RenderResult<Vec<u32>> {
    read_spv(&mut Cursor::new(bytes)).map_err(|e| RenderError::ShaderLoad(format!("{name}: {e}")))
}

/// One push-constant range covering [`PushConstantPayload`], visible to both stages.
pub(crate) unsafe fn create_pipeline_layout(
    device: &ash::Device,
) -> RenderResult<vk::PipelineLayout> {
    let range = vk::PushConstantRange {
        stage_flags: PUSH_STAGES,
        offset: 0,
        size: PushConstantPayload::SIZE,
    };
    let layout_info = vk::PipelineLayoutCreateInfo {
        s_type: vk::StructureType::PIPELINE_LAYOUT_CREATE_INFO,
        push_constant_range_count: 1,
        p_push_constant_ranges: &range,
        ..Default::default()
    };
    device
        .create_pipeline_layout(&layout_info, None)
        .map_err(vk_err(RenderError::PipelineCreation, "create_pipeline_layout"))
}

pub struct GraphicsPipeline {
    ctx: Arc<DeviceContext>,
    pipeline: vk::Pipeline,
    layout: vk::PipelineLayout,
}

impl GraphicsPipeline {
    /// Compiles `config` against `render_pass`. The layout is borrowed, not owned.
    pub fn build(
        ctx: Arc<DeviceContext>,
        config: &PipelineConfig,
        layout: vk::PipelineLayout,
        render_pass: vk::RenderPass,
        shaders: &ShaderBinaries,
    ) -> RenderResult<Self> {
        assert!(
            layout != vk::PipelineLayout::null(),
            "cannot build a pipeline without a layout"
        );
        assert!(
            render_pass != vk::RenderPass::null(),
            "cannot build a pipeline without a render pass"
        );
        assert!(
            config.sample_count.is_power_of_two(),
            "sample count must be a power of two"
        );

        let pipeline =
            unsafe { create_pipeline(ctx.device(), config, layout, render_pass, shaders)? };
        debug!("graphics pipeline built ({:?})", config.topology);
        Ok(Self {
            ctx,
            pipeline,
            layout,
        })
    }

    pub fn bind(&self, cmd: vk::CommandBuffer) {
        unsafe {
            self.ctx
                .device()
                .cmd_bind_pipeline(cmd, vk::PipelineBindPoint::GRAPHICS, self.pipeline);
        }
    }

    pub fn layout(&self) -> vk::PipelineLayout {
        self.layout
    }
}

impl Drop for GraphicsPipeline {
    fn drop(&mut self) {
        unsafe { self.ctx.device().destroy_pipeline(self.pipeline, None) }
    }
}

unsafe fn create_shader_module(device: &ash::Device, code: &[u32]) -> RenderResult<vk::ShaderModule> {
    let ci = vk::ShaderModuleCreateInfo {
        s_type: vk::StructureType::SHADER_MODULE_CREATE_INFO,
        p_code: code.as_ptr(),
        code_size: code.len() * 4,
        ..Default::default()
    };
    device
        .create_shader_module(&ci, None)
        .map_err(vk_err(RenderError::ShaderLoad, "create_shader_module"))
}

unsafe fn create_pipeline(
    device: &ash::Device,
    config: &PipelineConfig,
    layout: vk::PipelineLayout,
    render_pass: vk::RenderPass,
    shaders: &ShaderBinaries,
) -> RenderResult<vk::Pipeline> {
    // --- Shader modules (destroyed before return) ---
    let vs = create_shader_module(device, &shaders.vertex)?;
    let fs = match create_shader_module(device, &shaders.fragment) {
        Ok(fs) => fs,
        Err(e) => {
            device.destroy_shader_module(vs, None);
            return Err(e);
        }
    };
    let entry = c"main";

    let stages = [
        vk::PipelineShaderStageCreateInfo {
            s_type: vk::StructureType::PIPELINE_SHADER_STAGE_CREATE_INFO,
            stage: vk::ShaderStageFlags::VERTEX,
            module: vs,
            p_name: entry.as_ptr(),
            ..Default::default()
        },
        vk::PipelineShaderStageCreateInfo {
            s_type: vk::StructureType::PIPELINE_SHADER_STAGE_CREATE_INFO,
            stage: vk::ShaderStageFlags::FRAGMENT,
            module: fs,
            p_name: entry.as_ptr(),
            ..Default::default()
        },
    ];

    // --- Fixed-function state ---
    let bindings = vertex_binding_descriptions();
    let attributes = vertex_attribute_descriptions();
    let vertex_input = vk::PipelineVertexInputStateCreateInfo {
        s_type: vk::StructureType::PIPELINE_VERTEX_INPUT_STATE_CREATE_INFO,
        vertex_binding_description_count: bindings.len() as u32,
        p_vertex_binding_descriptions: bindings.as_ptr(),
        vertex_attribute_description_count: attributes.len() as u32,
        p_vertex_attribute_descriptions: attributes.as_ptr(),
        ..Default::default()
    };
    let input_assembly = vk::PipelineInputAssemblyStateCreateInfo {
        s_type: vk::StructureType::PIPELINE_INPUT_ASSEMBLY_STATE_CREATE_INFO,
        topology: topology(config.topology),
        primitive_restart_enable: vk::FALSE,
        ..Default::default()
    };
    let dyn_states = dynamic_states(config.dynamic_states);
    let dynamic_state = vk::PipelineDynamicStateCreateInfo {
        s_type: vk::StructureType::PIPELINE_DYNAMIC_STATE_CREATE_INFO,
        dynamic_state_count: dyn_states.len() as u32,
        p_dynamic_states: dyn_states.as_ptr(),
        ..Default::default()
    };
    // Viewport and scissor are set while recording.
    let viewport_state = vk::PipelineViewportStateCreateInfo {
        s_type: vk::StructureType::PIPELINE_VIEWPORT_STATE_CREATE_INFO,
        viewport_count: config.viewport_count,
        p_viewports: std::ptr::null(),
        scissor_count: config.scissor_count,
        p_scissors: std::ptr::null(),
        ..Default::default()
    };
    let raster = vk::PipelineRasterizationStateCreateInfo {
        s_type: vk::StructureType::PIPELINE_RASTERIZATION_STATE_CREATE_INFO,
        depth_clamp_enable: vk::FALSE,
        rasterizer_discard_enable: vk::FALSE,
        polygon_mode: polygon_mode(config.polygon_mode),
        cull_mode: cull_mode(config.cull_mode),
        front_face: front_face(config.front_face),
        depth_bias_enable: vk::FALSE,
        line_width: config.line_width,
        ..Default::default()
    };
    let multisample = vk::PipelineMultisampleStateCreateInfo {
        s_type: vk::StructureType::PIPELINE_MULTISAMPLE_STATE_CREATE_INFO,
        rasterization_samples: vk::SampleCountFlags::from_raw(config.sample_count),
        sample_shading_enable: vk::FALSE,
        min_sample_shading: 1.0,
        ..Default::default()
    };
    let depth_stencil = vk::PipelineDepthStencilStateCreateInfo {
        s_type: vk::StructureType::PIPELINE_DEPTH_STENCIL_STATE_CREATE_INFO,
        depth_test_enable: config.depth_test.into(),
        depth_write_enable: config.depth_write.into(),
        depth_compare_op: compare_op(config.depth_compare),
        depth_bounds_test_enable: vk::FALSE,
        min_depth_bounds: 0.0,
        max_depth_bounds: 1.0,
        stencil_test_enable: vk::FALSE,
        ..Default::default()
    };
    let b = &config.blend;
    let color_blend_att = vk::PipelineColorBlendAttachmentState {
        color_write_mask: vk::ColorComponentFlags::R
            | vk::ColorComponentFlags::G
            | vk::ColorComponentFlags::B
            | vk::ColorComponentFlags::A,
        blend_enable: b.enabled.into(),
        src_color_blend_factor: blend_factor(b.src_colour),
        dst_color_blend_factor: blend_factor(b.dst_colour),
        color_blend_op: blend_op(b.colour_op),
        src_alpha_blend_factor: blend_factor(b.src_alpha),
        dst_alpha_blend_factor: blend_factor(b.dst_alpha),
        alpha_blend_op: blend_op(b.alpha_op),
    };
    let color_blend = vk::PipelineColorBlendStateCreateInfo {
        s_type: vk::StructureType::PIPELINE_COLOR_BLEND_STATE_CREATE_INFO,
        logic_op_enable: vk::FALSE,
        logic_op: vk::LogicOp::COPY,
        attachment_count: 1,
        p_attachments: &color_blend_att,
        ..Default::default()
    };

    let pipeline_info = vk::GraphicsPipelineCreateInfo {
        s_type: vk::StructureType::GRAPHICS_PIPELINE_CREATE_INFO,
        stage_count: stages.len() as u32,
        p_stages: stages.as_ptr(),
        p_vertex_input_state: &vertex_input,
        p_input_assembly_state: &input_assembly,
        p_viewport_state: &viewport_state,
        p_rasterization_state: &raster,
        p_multisample_state: &multisample,
        p_depth_stencil_state: &depth_stencil,
        p_color_blend_state: &color_blend,
        p_dynamic_state: &dynamic_state,
        layout,
        render_pass,
        subpass: config.subpass,
        base_pipeline_handle: vk::Pipeline::null(),
        base_pipeline_index: -1,
        ..Default::default()
    };

    let result = device.create_graphics_pipelines(
        vk::PipelineCache::null(),
        std::slice::from_ref(&pipeline_info),
        None,
    );
    device.destroy_shader_module(vs, None);
    device.destroy_shader_module(fs, None);

    match result {
        Ok(pipelines) => Ok(pipelines[0]),
        Err((_, err)) => Err(RenderError::PipelineCreation(format!(
            "create_graphics_pipelines: {err}"
        ))),
    }
}

fn topology(t: Topology) -> vk::PrimitiveTopology {
    match t {
        Topology::PointList => vk::PrimitiveTopology::POINT_LIST,
        Topology::LineList => vk::PrimitiveTopology::LINE_LIST,
        Topology::LineStrip => vk::PrimitiveTopology::LINE_STRIP,
        Topology::TriangleList => vk::PrimitiveTopology::TRIANGLE_LIST,
        Topology::TriangleStrip => vk::PrimitiveTopology::TRIANGLE_STRIP,
    }
}

fn polygon_mode(m: PolygonMode) -> vk::PolygonMode {
    match m {
        PolygonMode::Fill => vk::PolygonMode::FILL,
        PolygonMode::Line => vk::PolygonMode::LINE,
        PolygonMode::Point => vk::PolygonMode::POINT,
    }
}

fn cull_mode(c: CullMode) -> vk::CullModeFlags {
    match c {
        CullMode::None => vk::CullModeFlags::NONE,
        CullMode::Front => vk::CullModeFlags::FRONT,
        CullMode::Back => vk::CullModeFlags::BACK,
        CullMode::FrontAndBack => vk::CullModeFlags::FRONT_AND_BACK,
    }
}

fn front_face(f: FrontFace) -> vk::FrontFace {
    match f {
        FrontFace::Clockwise => vk::FrontFace::CLOCKWISE,
        FrontFace::CounterClockwise => vk::FrontFace::COUNTER_CLOCKWISE,
    }
}

fn compare_op(op: CompareOp) -> vk::CompareOp {
    match op {
        CompareOp::Never => vk::CompareOp::NEVER,
        CompareOp::Less => vk::CompareOp::LESS,
        CompareOp::Equal => vk::CompareOp::EQUAL,
        CompareOp::LessOrEqual => vk::CompareOp::LESS_OR_EQUAL,
        CompareOp::Greater => vk::CompareOp::GREATER,
        CompareOp::GreaterOrEqual => vk::CompareOp::GREATER_OR_EQUAL,
        CompareOp::Always => vk::CompareOp::ALWAYS,
    }
}

fn blend_factor(f: BlendFactor) -> vk::BlendFactor {
    match f {
        BlendFactor::Zero => vk::BlendFactor::ZERO,
        BlendFactor::One => vk::BlendFactor::ONE,
        BlendFactor::SrcAlpha => vk::BlendFactor::SRC_ALPHA,
        BlendFactor::OneMinusSrcAlpha => vk::BlendFactor::ONE_MINUS_SRC_ALPHA,
    }
}

fn blend_op(op: BlendOp) -> vk::BlendOp {
    match op {
        BlendOp::Add => vk::BlendOp::ADD,
        BlendOp::Subtract => vk::BlendOp::SUBTRACT,
        BlendOp::Min => vk::BlendOp::MIN,
        BlendOp::Max => vk::BlendOp::MAX,
    }
}

fn dynamic_states(flags: DynamicStates) -> Vec<vk::DynamicState> {
    let mut out = Vec::new();
    if flags.contains(DynamicStates::VIEWPORT) {
        out.push(vk::DynamicState::VIEWPORT);
    }
    if flags.contains(DynamicStates::SCISSOR) {
        out.push(vk::DynamicState::SCISSOR);
    }
    if flags.contains(DynamicStates::LINE_WIDTH) {
        out.push(vk::DynamicState::LINE_WIDTH);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAGIC: u32 = 0x0723_0203;

    #[test]
    fn truncated_spirv_is_a_shader_load_error() {
        let err = ShaderBinaries::from_bytes(&[1, 2, 3], &MAGIC.to_le_bytes()).unwrap_err();
        match err {
            RenderError::ShaderLoad(msg) => assert!(msg.starts_with("vertex shader")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn missing_magic_is_rejected() {
        assert!(matches!(
            ShaderBinaries::from_bytes(&MAGIC.to_le_bytes(), &[0; 8]),
            Err(RenderError::ShaderLoad(_))
        ));
        assert!(matches!(
            ShaderBinaries::from_bytes(&[], &MAGIC.to_le_bytes()),
            Err(RenderError::ShaderLoad(_))
        ));
    }

    #[test]
    fn magic_only_binaries_decode() {
        let bin = ShaderBinaries::from_bytes(&MAGIC.to_le_bytes(), &MAGIC.to_be_bytes()).unwrap();
        assert_eq!(bin.vertex, vec![MAGIC]);
        assert_eq!(bin.fragment, vec![MAGIC]);
    }

    #[test]
    fn missing_file_names_the_path() {
        let err = ShaderBinaries::load(
            Path::new("does/not/exist.vert.spv"),
            Path::new("does/not/exist.frag.spv"),
        )
        .unwrap_err();
        match err {
            RenderError::ShaderLoad(msg) => assert!(msg.contains("exist.vert.spv")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn embedded_shaders_are_spirv() {
        let bin = ShaderBinaries::embedded().unwrap();
        assert_eq!(bin.vertex[0], MAGIC);
        assert_eq!(bin.fragment[0], MAGIC);
    }

    #[test]
    fn default_config_maps_to_vulkan_state() {
        let c = PipelineConfig::default();
        assert_eq!(topology(c.topology), vk::PrimitiveTopology::TRIANGLE_LIST);
        assert_eq!(cull_mode(c.cull_mode), vk::CullModeFlags::NONE);
        assert_eq!(front_face(c.front_face), vk::FrontFace::CLOCKWISE);
        assert_eq!(compare_op(c.depth_compare), vk::CompareOp::LESS);
        assert_eq!(blend_factor(c.blend.src_colour), vk::BlendFactor::ONE);
        assert_eq!(blend_factor(c.blend.dst_colour), vk::BlendFactor::ZERO);
        assert_eq!(
            dynamic_states(c.dynamic_states),
            vec![vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR]
        );
        assert_eq!(
            vk::SampleCountFlags::from_raw(c.sample_count),
            vk::SampleCountFlags::TYPE_1
        );
    }

    #[test]
    fn push_range_covers_both_stages() {
        assert!(PUSH_STAGES.contains(vk::ShaderStageFlags::VERTEX));
        assert!(PUSH_STAGES.contains(vk::ShaderStageFlags::FRAGMENT));
        assert!(!PUSH_STAGES.contains(vk::ShaderStageFlags::COMPUTE));
    }
}
