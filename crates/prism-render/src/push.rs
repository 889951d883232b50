// SPDX-License-Identifier: CEPL-1.0
use bytemuck::{Pod, Zeroable};
use prism_math::{Transform2d, Vec3};

/// Per-draw data pushed to both shader stages.
///
/// Mirrors the shader block `{ mat2 transform; vec2 offset; vec3 colour; }`,
/// where the device aligns the vec3 to 16 bytes.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct PushConstantPayload {
    /// Column-major.
    pub transform: [[f32; 2]; 2],
    pub offset: [f32; 2],
    _pad0: [f32; 2],
    pub colour: [f32; 3],
    _pad1: f32,
}

impl PushConstantPayload {
    pub const SIZE: u32 = std::mem::size_of::<Self>() as u32;

    pub fn new(transform: &Transform2d, colour: Vec3) -> Self {
        Self {
            transform: transform.mat2().to_cols_array_2d(),
            offset: transform.translation.to_array(),
            colour: colour.to_array(),
            ..Self::zeroed()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prism_math::{vec2, vec3};
    use std::mem::{offset_of, size_of};

    #[test]
    fn layout_matches_shader_block() {
        assert_eq!(size_of::<PushConstantPayload>(), 48);
        assert_eq!(offset_of!(PushConstantPayload, transform), 0);
        assert_eq!(offset_of!(PushConstantPayload, offset), 16);
        assert_eq!(offset_of!(PushConstantPayload, colour), 32);
        assert_eq!(PushConstantPayload::SIZE, 48);
    }

    #[test]
    fn built_from_transform_and_colour() {
        let t = Transform2d::default()
            .with_translation(vec2(0.2, -0.1))
            .with_scale(vec2(2.0, 0.5));
        let p = PushConstantPayload::new(&t, vec3(0.1, 0.8, 0.1));

        assert_eq!(p.transform, [[2.0, 0.0], [0.0, 0.5]]);
        assert_eq!(p.offset, [0.2, -0.1]);
        assert_eq!(p.colour, [0.1, 0.8, 0.1]);
        assert_eq!(bytemuck::bytes_of(&p).len(), 48);
    }
}
