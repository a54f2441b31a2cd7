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

//! Sanity checks on loaded surfaces.
//!
//! Nothing here changes the map. The checks only flag data that would make the renderer read the
//! wrong vertices.

use std::fmt;

use crate::common::bsp::{Surface, SurfaceType};

#[derive(Copy, Clone, Debug, Eq, PartialEq, PartialOrd, Ord)]
pub enum Severity {
    Warning,
    Error,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SurfaceDiagnostic {
    /// The surface has type `Bad`.
    BadType { surface: usize },

    /// A planar surface without vertices or without indexes.
    EmptyPlanar {
        surface: usize,
        num_verts: u32,
        num_indexes: u32,
    },

    UnknownType { surface: usize, raw: u32 },
}

impl SurfaceDiagnostic {
    pub fn surface(&self) -> usize {
        match *self {
            SurfaceDiagnostic::BadType { surface } => surface,
            SurfaceDiagnostic::EmptyPlanar { surface, .. } => surface,
            SurfaceDiagnostic::UnknownType { surface, .. } => surface,
        }
    }

    pub fn severity(&self) -> Severity {
        match *self {
            SurfaceDiagnostic::BadType { .. } => Severity::Error,
            _ => Severity::Warning,
        }
    }
}

impl fmt::Display for SurfaceDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            SurfaceDiagnostic::BadType { surface } => write!(f, "{}: bad surface type", surface),
            SurfaceDiagnostic::EmptyPlanar {
                surface,
                num_verts,
                num_indexes,
            } => write!(
                f,
                "{}: planar surface with numVerts={} numIndexes={}",
                surface, num_verts, num_indexes
            ),
            SurfaceDiagnostic::UnknownType { surface, raw } => {
                write!(f, "{}: unknown surface type: {}", surface, raw)
            }
        }
    }
}

/// Checks every surface's type and, for planar surfaces, its vertex and index counts.
///
/// Each finding is logged as well as returned.
pub fn validate_surfaces(surfaces: &[Surface]) -> Vec<SurfaceDiagnostic> {
    let mut diagnostics = Vec::new();

    for (surface_id, surface) in surfaces.iter().enumerate() {
        let diagnostic = match surface.surface_type {
            SurfaceType::Bad => SurfaceDiagnostic::BadType {
                surface: surface_id,
            },

            SurfaceType::Planar if surface.num_verts == 0 || surface.num_indexes == 0 => {
                SurfaceDiagnostic::EmptyPlanar {
                    surface: surface_id,
                    num_verts: surface.num_verts,
                    num_indexes: surface.num_indexes,
                }
            }

            SurfaceType::Unknown(raw) => SurfaceDiagnostic::UnknownType {
                surface: surface_id,
                raw,
            },

            _ => continue,
        };

        match diagnostic.severity() {
            Severity::Error => error!("{}", diagnostic),
            Severity::Warning => warn!("{}", diagnostic),
        }

        diagnostics.push(diagnostic);
    }

    diagnostics
}

#[cfg(test)]
mod tests {
    use super::*;

    use cgmath::Vector3;

    fn surface(surface_type: SurfaceType, num_verts: u32, num_indexes: u32) -> Surface {
        Surface {
            shader_id: 0,
            fog_id: 0,
            surface_type,
            first_vert: 0,
            num_verts,
            first_index: 0,
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
    fn test_bad_surface() {
        let surfaces = vec![
            surface(SurfaceType::Planar, 4, 6),
            surface(SurfaceType::Patch, 9, 0),
            surface(SurfaceType::Bad, 3, 3),
        ];
        let before = surfaces.clone();

        let diagnostics = validate_surfaces(&surfaces);

        let errors: Vec<_> = diagnostics
            .iter()
            .filter(|d| d.severity() == Severity::Error)
            .collect();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0], &SurfaceDiagnostic::BadType { surface: 2 });
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(surfaces, before);
    }

    #[test]
    fn test_empty_planar() {
        let diagnostics = validate_surfaces(&[
            surface(SurfaceType::Planar, 0, 6),
            surface(SurfaceType::Planar, 4, 0),
            surface(SurfaceType::TriangleSoup, 0, 0),
        ]);

        assert_eq!(
            diagnostics,
            vec![
                SurfaceDiagnostic::EmptyPlanar {
                    surface: 0,
                    num_verts: 0,
                    num_indexes: 6,
                },
                SurfaceDiagnostic::EmptyPlanar {
                    surface: 1,
                    num_verts: 4,
                    num_indexes: 0,
                },
            ]
        );
        assert!(diagnostics.iter().all(|d| d.severity() == Severity::Warning));
    }

    #[test]
    fn test_unknown_type() {
        let diagnostics = validate_surfaces(&[
            surface(SurfaceType::Flare, 0, 0),
            surface(SurfaceType::Unknown(9), 3, 3),
            surface(SurfaceType::Terrain, 0, 0),
        ]);

        assert_eq!(
            diagnostics,
            vec![SurfaceDiagnostic::UnknownType { surface: 1, raw: 9 }]
        );
        assert!(diagnostics[0].to_string().contains("unknown surface type: 9"));
    }

    #[test]
    fn test_no_surfaces() {
        assert!(validate_surfaces(&[]).is_empty());
    }
}
