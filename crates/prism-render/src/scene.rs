// SPDX-License-Identifier: CEPL-1.0
//! Objects drawn each frame and the meshes they share.
//!
//! Meshes live in a [`MeshArena`] and are addressed by [`MeshHandle`], so many
//! objects can share one device buffer. Objects are created only through
//! [`ObjectRegistry::spawn`], which hands out increasing ids.

use bytemuck::{Pod, Zeroable};
use prism_core::{RenderError, RenderResult};
use prism_math::{Transform2d, Vec2, Vec3};

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 2],
    pub colour: [f32; 3],
}

impl Vertex {
    pub const fn new(position: [f32; 2], colour: [f32; 3]) -> Self {
        Self { position, colour }
    }
}

/// A triangle is the smallest drawable mesh.
pub const MIN_VERTICES: usize = 3;

pub fn validate_vertices(vertices: &[Vertex]) -> RenderResult<()> {
    if vertices.len() < MIN_VERTICES {
        return Err(RenderError::Allocation(format!(
            "vertex buffer needs at least {MIN_VERTICES} vertices, got {}",
            vertices.len()
        )));
    }
    Ok(())
}

/// Red/green/blue triangle centred on the origin.
pub fn triangle() -> Vec<Vertex> {
    vec![
        Vertex::new([0.0, -0.5], [1.0, 0.0, 0.0]),
        Vertex::new([0.5, 0.5], [0.0, 1.0, 0.0]),
        Vertex::new([-0.5, 0.5], [0.0, 0.0, 1.0]),
    ]
}

/// Deepest subdivision [`sierpinski`] accepts: 3 * 3^8 = 19683 vertices.
pub const MAX_SIERPINSKI_DEPTH: u32 = 8;

/// Subdivides a triangle `depth` times, keeping the three corner triangles at
/// each level. Positions and colours at midpoints are interpolated.
///
/// Panics if `depth` exceeds [`MAX_SIERPINSKI_DEPTH`].
pub fn sierpinski(depth: u32, left: Vertex, right: Vertex, top: Vertex) -> Vec<Vertex> {
    assert!(
        depth <= MAX_SIERPINSKI_DEPTH,
        "sierpinski depth {depth} exceeds {MAX_SIERPINSKI_DEPTH}"
    );
    let mut out = Vec::with_capacity(3 * 3usize.pow(depth));
    subdivide(&mut out, depth, left, right, top);
    out
}

fn subdivide(out: &mut Vec<Vertex>, depth: u32, left: Vertex, right: Vertex, top: Vertex) {
    if depth == 0 {
        out.extend([top, right, left]);
        return;
    }
    let left_top = midpoint(left, top);
    let right_top = midpoint(right, top);
    let left_right = midpoint(left, right);

    subdivide(out, depth - 1, left, left_right, left_top);
    subdivide(out, depth - 1, left_right, right, right_top);
    subdivide(out, depth - 1, left_top, right_top, top);
}

fn midpoint(a: Vertex, b: Vertex) -> Vertex {
    let p = (Vec2::from(a.position) + Vec2::from(b.position)) * 0.5;
    let c = (Vec3::from(a.colour) + Vec3::from(b.colour)) * 0.5;
    Vertex::new(p.to_array(), c.to_array())
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MeshHandle(usize);

/// Owns meshes; each is dropped exactly once, on removal, sweep or arena drop.
#[derive(Debug)]
pub struct MeshArena<M> {
    slots: Vec<Option<M>>,
}

impl<M> Default for MeshArena<M> {
    fn default() -> Self {
        Self { slots: Vec::new() }
    }
}

impl<M> MeshArena<M> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, mesh: M) -> MeshHandle {
        if let Some(i) = self.slots.iter().position(Option::is_none) {
            self.slots[i] = Some(mesh);
            MeshHandle(i)
        } else {
            self.slots.push(Some(mesh));
            MeshHandle(self.slots.len() - 1)
        }
    }

    pub fn get(&self, handle: MeshHandle) -> Option<&M> {
        self.slots.get(handle.0).and_then(Option::as_ref)
    }

    pub fn remove(&mut self, handle: MeshHandle) -> Option<M> {
        self.slots.get_mut(handle.0).and_then(Option::take)
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every mesh no object refers to. Returns how many were dropped.
    pub fn retain_referenced(&mut self, objects: &[RenderableObject]) -> usize {
        let mut dropped = 0;
        for (i, slot) in self.slots.iter_mut().enumerate() {
            if slot.is_some() && !objects.iter().any(|o| o.mesh == MeshHandle(i)) {
                *slot = None;
                dropped += 1;
            }
        }
        dropped
    }

    pub fn clear(&mut self) {
        self.slots.clear();
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectId(u32);

impl ObjectId {
    pub fn get(self) -> u32 {
        self.0
    }
}

#[derive(Debug)]
pub struct RenderableObject {
    id: ObjectId,
    pub mesh: MeshHandle,
    pub colour: Vec3,
    pub transform: Transform2d,
}

impl RenderableObject {
    pub fn id(&self) -> ObjectId {
        self.id
    }
}

/// Ordered collection of objects; insertion order is draw order.
#[derive(Debug, Default)]
pub struct ObjectRegistry {
    next_id: u32,
    objects: Vec<RenderableObject>,
}

impl ObjectRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spawn(&mut self, mesh: MeshHandle, colour: Vec3, transform: Transform2d) -> ObjectId {
        let id = ObjectId(self.next_id);
        self.next_id += 1;
        self.objects.push(RenderableObject {
            id,
            mesh,
            colour,
            transform,
        });
        id
    }

    pub fn get(&self, id: ObjectId) -> Option<&RenderableObject> {
        self.objects.iter().find(|o| o.id == id)
    }

    pub fn objects(&self) -> &[RenderableObject] {
        &self.objects
    }

    pub fn objects_mut(&mut self) -> &mut [RenderableObject] {
        &mut self.objects
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Removes every object. Ids keep increasing afterwards.
    pub fn clear(&mut self) {
        self.objects.clear();
    }
}
