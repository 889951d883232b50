// SPDX-License-Identifier: CEPL-1.0
//! 2D math used by the renderer: angle wrapping and object transforms.

pub use glam::{vec2, vec3, Mat2, Vec2, Vec3};

use std::f32::consts::TAU;

/// Wraps an angle in radians into `[0, 2π)`.
pub fn wrap_angle(radians: f32) -> f32 {
    let r = radians.rem_euclid(TAU);
    // rem_euclid can round up to exactly TAU for tiny negative inputs
    if r >= TAU {
        0.0
    } else {
        r
    }
}

/// Position, non-uniform scale and rotation of a 2D object.
///
/// The rotation is kept in `[0, 2π)` at all times.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform2d {
    pub translation: Vec2,
    pub scale: Vec2,
    rotation: f32,
}

impl Default for Transform2d {
    fn default() -> Self {
        Self {
            translation: Vec2::ZERO,
            scale: Vec2::ONE,
            rotation: 0.0,
        }
    }
}

impl Transform2d {
    pub fn new(translation: Vec2, scale: Vec2, rotation: f32) -> Self {
        Self {
            translation,
            scale,
            rotation: wrap_angle(rotation),
        }
    }

    pub fn with_translation(mut self, translation: Vec2) -> Self {
        self.translation = translation;
        self
    }

    pub fn with_scale(mut self, scale: Vec2) -> Self {
        self.scale = scale;
        self
    }

    pub fn with_rotation(mut self, radians: f32) -> Self {
        self.set_rotation(radians);
        self
    }

    #[inline]
    pub fn rotation(&self) -> f32 {
        self.rotation
    }

    pub fn set_rotation(&mut self, radians: f32) {
        self.rotation = wrap_angle(radians);
    }

    /// Advances the rotation by `delta` radians, wrapping into `[0, 2π)`.
    pub fn rotate(&mut self, delta: f32) {
        self.rotation = wrap_angle(self.rotation + delta);
    }

    /// Rotation × scale: scale is applied in object space, then rotation.
    pub fn mat2(&self) -> Mat2 {
        let (sin, cos) = self.rotation.sin_cos();
        let rot = Mat2::from_cols(vec2(cos, sin), vec2(-sin, cos));
        let scale = Mat2::from_diagonal(self.scale);
        rot * scale
    }
}
