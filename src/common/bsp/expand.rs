// Copyright © 2018 Cormac O'Brien
//
// Permission is hereby granted, free of charge, to any person obtaining a copy of this software
// and associated documentation files (the "Software"), to deal in the Software without
// restriction, including without limitation the rights to use, copy, modify, merge, publish,
// distribute, sublicense, and/or sell copies of the Software, and to permit persons to whom the
// Software is furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in all copies or
// substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR IMPLIED, INCLUDING
// BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY, FITNESS FOR A PARTICULAR PURPOSE AND
// NONINFRINGEMENT. IN NO EVENT SHALL THE AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM,
// DAMAGES OR OTHER LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE SOFTWARE.

//! Conversion of indexed surface geometry into a flat vertex stream.
//!
//! Every index of every surface produces one output vertex, so the output can be drawn as a
//! plain triangle list with no index buffer. Surfaces are emitted in lump order and each
//! surface's vertices in index order, which preserves triangle winding.

use std::mem::size_of;

use crate::common::{
    bsp::{BspError, BspErrorKind, DrawVertex, IndexPool, Surface, WORLD_UNIT_SCALE},
    util,
};

/// A vertex ready for the renderer: a position in world units and a texture coordinate.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct RenderVertex {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub u: f32,
    pub v: f32,
}

impl RenderVertex {
    /// Size of one vertex in an interleaved buffer.
    pub const STRIDE: usize = size_of::<RenderVertex>();
}

impl<'a> From<&'a DrawVertex> for RenderVertex {
    fn from(vert: &'a DrawVertex) -> RenderVertex {
        RenderVertex {
            x: vert.position.x / WORLD_UNIT_SCALE,
            y: vert.position.y / WORLD_UNIT_SCALE,
            z: vert.position.z / WORLD_UNIT_SCALE,
            u: vert.texcoord.x,
            v: vert.texcoord.y,
        }
    }
}

/// The expanded vertices of a map.
#[derive(Clone, Debug, PartialEq)]
pub struct VertexBuffer {
    vertices: Box<[RenderVertex]>,
}

impl VertexBuffer {
    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    pub fn vertices(&self) -> &[RenderVertex] {
        &self.vertices
    }

    /// The vertices as interleaved `x y z u v` floats, for upload to a vertex buffer object.
    pub fn as_bytes(&self) -> &[u8] {
        // RenderVertex is five f32s with no padding
        unsafe { util::any_slice_as_bytes(&self.vertices) }
    }
}

/// Expands `surfaces` into one vertex per draw index.
///
/// Fails with `IndexOutOfRange` if a surface's index range runs past the end of `draw_indexes`
/// or an index resolves to a vertex past the end of `draw_verts`.
pub fn expand(
    surfaces: &[Surface],
    draw_indexes: &[u32],
    draw_verts: &[DrawVertex],
) -> Result<VertexBuffer, BspError> {
    // check index ranges before sizing the output so a corrupt count can't drive the allocation
    let mut total = 0;
    for (surface_id, surface) in surfaces.iter().enumerate() {
        let end = surface.first_index as usize + surface.num_indexes as usize;
        if surface.num_indexes > 0 && end > draw_indexes.len() {
            return Err(BspErrorKind::IndexOutOfRange {
                surface: surface_id,
                pool: IndexPool::DrawIndexes,
                index: end - 1,
                len: draw_indexes.len(),
            }
            .into());
        }

        total += surface.num_indexes as usize;
    }

    debug!("Expanding {} surfaces into {} vertices", surfaces.len(), total);

    let mut vertices = Vec::with_capacity(total);
    for (surface_id, surface) in surfaces.iter().enumerate() {
        if surface.num_indexes == 0 {
            continue;
        }

        let first = surface.first_index as usize;
        let last = first + surface.num_indexes as usize;

        for &rel_index in &draw_indexes[first..last] {
            let vert_id = surface.first_vert as usize + rel_index as usize;

            let vert = match draw_verts.get(vert_id) {
                Some(v) => v,
                None => {
                    return Err(BspErrorKind::IndexOutOfRange {
                        surface: surface_id,
                        pool: IndexPool::DrawVerts,
                        index: vert_id,
                        len: draw_verts.len(),
                    }
                    .into())
                }
            };

            vertices.push(RenderVertex::from(vert));
        }
    }

    Ok(VertexBuffer {
        vertices: vertices.into_boxed_slice(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    use cgmath::{Vector2, Vector3};

    use crate::common::bsp::SurfaceType;

    fn draw_vertex(position: [f32; 3], texcoord: [f32; 2]) -> DrawVertex {
        DrawVertex {
            position: Vector3::from(position),
            texcoord: Vector2::from(texcoord),
            lightmap: Vector2::new(0.0, 0.0),
            normal: Vector3::new(0.0, 0.0, 1.0),
            color: [255; 4],
        }
    }

    fn surface(first_vert: u32, first_index: u32, num_indexes: u32) -> Surface {
        Surface {
            shader_id: 0,
            fog_id: 0,
            surface_type: SurfaceType::TriangleSoup,
            first_vert,
            num_verts: num_indexes,
            first_index,
            num_indexes,
            lightmap_id: 0,
            lightmap_x: 0,
            lightmap_y: 0,
            lightmap_width: 0,
            lightmap_height: 0,
            lightmap_origin: Vector3::new(0.0, 0.0, 0.0),
            lightmap_vecs: [Vector3::new(0.0, 0.0, 0.0); 3],
            patch_width: 0,
            patch_height: 0,
            subdivisions: 0.0,
        }
    }

    #[test]
    fn test_expand_scales_positions() {
        let mut verts = vec![draw_vertex([0.0; 3], [0.0; 2]); 10];
        verts.push(draw_vertex([100.0, 200.0, 300.0], [0.25, 0.5]));
        verts.push(draw_vertex([400.0, 500.0, 600.0], [1.0, 0.0]));
        verts.push(draw_vertex([700.0, 800.0, 900.0], [-2.0, 3.0]));

        let buffer = expand(&[surface(10, 0, 3)], &[0, 1, 2], &verts).unwrap();

        let positions: Vec<_> = buffer
            .vertices()
            .iter()
            .map(|v| (v.x, v.y, v.z))
            .collect();
        assert_eq!(
            positions,
            vec![(1.0, 2.0, 3.0), (4.0, 5.0, 6.0), (7.0, 8.0, 9.0)]
        );

        let texcoords: Vec<_> = buffer.vertices().iter().map(|v| (v.u, v.v)).collect();
        assert_eq!(texcoords, vec![(0.25, 0.5), (1.0, 0.0), (-2.0, 3.0)]);
    }

    #[test]
    fn test_expand_order_and_length() {
        let verts: Vec<_> = (0..6)
            .map(|i| draw_vertex([i as f32 * 100.0, 0.0, 0.0], [i as f32, 0.0]))
            .collect();

        // two quads sharing one index pool, each surface with its own vertex base
        let indexes = [0, 1, 2, 2, 1, 0, 0, 2, 1];
        let surfaces = [surface(0, 0, 6), surface(3, 6, 3)];

        let buffer = expand(&surfaces, &indexes, &verts).unwrap();
        assert_eq!(buffer.len(), 9);

        let us: Vec<_> = buffer.vertices().iter().map(|v| v.u).collect();
        assert_eq!(us, vec![0.0, 1.0, 2.0, 2.0, 1.0, 0.0, 3.0, 5.0, 4.0]);
        assert_eq!(buffer.vertices()[7].x, 5.0);
    }

    #[test]
    fn test_expand_empty() {
        let buffer = expand(&[], &[], &[]).unwrap();
        assert!(buffer.is_empty());
        assert!(buffer.as_bytes().is_empty());
    }

    #[test]
    fn test_empty_surface_ignores_first_index() {
        let verts = vec![draw_vertex([0.0; 3], [0.0; 2]); 3];
        let buffer = expand(&[surface(0, 50, 0), surface(0, 0, 3)], &[0, 1, 2], &verts).unwrap();
        assert_eq!(buffer.len(), 3);
    }

    #[test]
    fn test_vertex_out_of_range() {
        let verts = vec![draw_vertex([0.0; 3], [0.0; 2]); 3];
        let err = expand(&[surface(1, 0, 3)], &[0, 1, 2], &verts).unwrap_err();

        assert_eq!(
            err.kind(),
            BspErrorKind::IndexOutOfRange {
                surface: 0,
                pool: IndexPool::DrawVerts,
                index: 3,
                len: 3,
            }
        );
    }

    #[test]
    fn test_index_range_out_of_range() {
        let verts = vec![draw_vertex([0.0; 3], [0.0; 2]); 3];
        let surfaces = [surface(0, 0, 3), surface(0, 2, 3)];
        let err = expand(&surfaces, &[0, 1, 2], &verts).unwrap_err();

        assert_eq!(
            err.kind(),
            BspErrorKind::IndexOutOfRange {
                surface: 1,
                pool: IndexPool::DrawIndexes,
                index: 4,
                len: 3,
            }
        );
    }

    #[test]
    fn test_as_bytes_layout() {
        let verts = vec![draw_vertex([100.0, 200.0, 300.0], [0.5, 0.75])];
        let buffer = expand(&[surface(0, 0, 1)], &[0], &verts).unwrap();

        let bytes = buffer.as_bytes();
        assert_eq!(RenderVertex::STRIDE, 20);
        assert_eq!(bytes.len(), RenderVertex::STRIDE);
        assert_eq!(&bytes[12..16], &0.5f32.to_ne_bytes());
        assert_eq!(&bytes[16..20], &0.75f32.to_ne_bytes());
    }
}
