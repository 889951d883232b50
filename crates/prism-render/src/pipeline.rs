// SPDX-License-Identifier: CEPL-1.0
//! Backend-neutral fixed-function state for the graphics pipeline.

use bitflags::bitflags;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Topology {
    PointList,
    LineList,
    LineStrip,
    TriangleList,
    TriangleStrip,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PolygonMode {
    Fill,
    Line,
    Point,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CullMode {
    None,
    Front,
    Back,
    FrontAndBack,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrontFace {
    Clockwise,
    CounterClockwise,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompareOp {
    Never,
    Less,
    Equal,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
    Always,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlendFactor {
    Zero,
    One,
    SrcAlpha,
    OneMinusSrcAlpha,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlendOp {
    Add,
    Subtract,
    Min,
    Max,
}

bitflags! {
    /// State supplied while recording instead of being baked into the pipeline.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct DynamicStates: u32 {
        const VIEWPORT = 1 << 0;
        const SCISSOR = 1 << 1;
        const LINE_WIDTH = 1 << 2;
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BlendState {
    pub enabled: bool,
    pub src_colour: BlendFactor,
    pub dst_colour: BlendFactor,
    pub colour_op: BlendOp,
    pub src_alpha: BlendFactor,
    pub dst_alpha: BlendFactor,
    pub alpha_op: BlendOp,
}

impl Default for BlendState {
    fn default() -> Self {
        Self {
            enabled: false,
            src_colour: BlendFactor::One,
            dst_colour: BlendFactor::Zero,
            colour_op: BlendOp::Add,
            src_alpha: BlendFactor::One,
            dst_alpha: BlendFactor::Zero,
            alpha_op: BlendOp::Add,
        }
    }
}

/// Fixed-function configuration. The layout and render pass are supplied by the
/// backend when the pipeline is built.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PipelineConfig {
    pub topology: Topology,
    pub viewport_count: u32,
    pub scissor_count: u32,
    pub polygon_mode: PolygonMode,
    pub cull_mode: CullMode,
    pub front_face: FrontFace,
    pub line_width: f32,
    /// Rasterization samples; must be a power of two.
    pub sample_count: u32,
    pub blend: BlendState,
    pub depth_test: bool,
    pub depth_write: bool,
    pub depth_compare: CompareOp,
    pub dynamic_states: DynamicStates,
    pub subpass: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            topology: Topology::TriangleList,
            viewport_count: 1,
            scissor_count: 1,
            polygon_mode: PolygonMode::Fill,
            cull_mode: CullMode::None,
            front_face: FrontFace::Clockwise,
            line_width: 1.0,
            sample_count: 1,
            blend: BlendState::default(),
            depth_test: true,
            depth_write: true,
            depth_compare: CompareOp::Less,
            dynamic_states: DynamicStates::VIEWPORT | DynamicStates::SCISSOR,
            subpass: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = PipelineConfig::default();
        assert_eq!(c.topology, Topology::TriangleList);
        assert_eq!(c.cull_mode, CullMode::None);
        assert_eq!(c.front_face, FrontFace::Clockwise);
        assert!(!c.blend.enabled);
        assert!(c.depth_test && c.depth_write);
        assert_eq!(c.depth_compare, CompareOp::Less);
        assert!(c.dynamic_states.contains(DynamicStates::VIEWPORT | DynamicStates::SCISSOR));
        assert!(!c.dynamic_states.contains(DynamicStates::LINE_WIDTH));
        assert_eq!((c.viewport_count, c.scissor_count, c.subpass), (1, 1, 0));
    }
}
