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

//! BSP map file and data structure handling.
//!
//! # File Format
//!
//! The map file begins with a 12-byte header: a 4-byte identifier (`2015` for the maps this
//! loader targets), a 32-bit version number and a 32-bit checksum. All integers in the file are
//! little-endian.
//!
//! The header is followed by the lump directory, 28 entries of a 32-bit offset (from the start of
//! the file) and a 32-bit length (in bytes). The lumps themselves may appear anywhere in the file
//! and in any order. Most lumps are arrays of fixed-size records, so a lump's length must be a
//! multiple of its record size.
//!
//! ## Shaders
//!
//! A 64-byte shader name, surface flags, content flags, a subdivision count and a 64-byte fence
//! mask image name. 140 bytes.
//!
//! ## Planes
//!
//! A normal vector of 3 `f32` followed by the distance from the origin along it. 16 bytes.
//!
//! ## Lightmaps
//!
//! Raw 128x128 RGB images, one after another.
//!
//! ## Surfaces
//!
//! Renderable geometry. Each surface names a shader and a fog volume, its type, a range of draw
//! vertices and a range of draw indexes, its place in the lightmap atlas and its patch
//! dimensions. 108 bytes.
//!
//! ## Draw vertices and indexes
//!
//! Draw vertices hold a position, a texture coordinate, a lightmap coordinate, a normal and an
//! RGBA color (44 bytes). Draw indexes are 32-bit and relative to the first vertex of the surface
//! that uses them.
//!
//! ## Leafs
//!
//! The terminal regions of the BSP tree. Each leaf records the visibility cluster and area it
//! belongs to, its bounds, and ranges into the leaf surface, leaf brush, terrain patch and static
//! model lists. 64 bytes.
//!
//! ## Nodes
//!
//! Internal BSP tree nodes: a plane index, two child indexes (negative children are bitwise
//! negated leaf indexes) and integer bounds. 36 bytes.
//!
//! ## Entities
//!
//! The level entity data as a text blob of `{ "key" "value" ... }` blocks. The lump length does
//! not include a terminator, so one is added on load.

mod error;
mod expand;
mod load;
mod validate;

#[cfg(test)]
mod fixture;

use std::{collections::HashMap, fmt, path::Path};

use crate::common::{parse, stream::FileStream, util};

use cgmath::{Vector2, Vector3};
use failure::ResultExt;

pub use self::{
    error::{BspError, BspErrorKind, IndexPool},
    expand::{expand, RenderVertex, VertexBuffer},
    load::{count_clusters_areas, load},
    validate::{validate_surfaces, Severity, SurfaceDiagnostic},
};

/// The identifier of the only map format this loader understands.
pub const MAP_IDENT: [u8; 4] = *b"2015";

/// The version number used by Medal of Honor: Allied Assault 1.12 maps.
pub const MOHAA_VERSION: u32 = 19;

pub const HEADER_SIZE: usize = 12;
pub const HEADER_LUMPS: usize = 28;
pub const LUMP_ENTRY_SIZE: usize = 8;

pub const LIGHTMAP_SIZE: usize = 128;
pub const LIGHTMAP_BLOCK_LEN: usize = LIGHTMAP_SIZE * LIGHTMAP_SIZE * 3;

/// Map units per world unit.
pub const WORLD_UNIT_SCALE: f32 = 100.0;

const SHADER_NAME_LEN: usize = 64;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, FromPrimitive)]
pub enum LumpKind {
    Shaders = 0,
    Planes = 1,
    Lightmaps = 2,
    Surfaces = 3,
    DrawVerts = 4,
    DrawIndexes = 5,
    LeafBrushes = 6,
    LeafSurfaces = 7,
    Leafs = 8,
    Nodes = 9,
    SideEquations = 10,
    BrushSides = 11,
    Brushes = 12,
    Models = 13,
    Entities = 14,
    Visibility = 15,
    LightGridPalette = 16,
    LightGridOffsets = 17,
    LightGridData = 18,
    SphereLights = 19,
    SphereLightVis = 20,
    LightDefs = 21,
    Terrain = 22,
    TerrainIndexes = 23,
    StaticModelData = 24,
    StaticModelDef = 25,
    StaticModelIndexes = 26,
    Unknown = 27,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct MapHeader {
    pub ident: [u8; 4],
    pub version: u32,
    pub checksum: u32,
}

impl MapHeader {
    pub fn has_known_ident(&self) -> bool {
        self.ident == MAP_IDENT
    }
}

/// A byte range in the map file.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct LumpEntry {
    pub offset: u32,
    pub length: u32,
}

/// The lump directory, one entry per `LumpKind`.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct LumpDirectory([LumpEntry; HEADER_LUMPS]);

impl LumpDirectory {
    pub fn new(entries: [LumpEntry; HEADER_LUMPS]) -> LumpDirectory {
        LumpDirectory(entries)
    }

    pub fn entry(&self, kind: LumpKind) -> LumpEntry {
        self.0[kind as usize]
    }

    pub fn entries(&self) -> &[LumpEntry] {
        &self.0
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Shader {
    pub name: [u8; SHADER_NAME_LEN],
    pub surface_flags: u32,
    pub content_flags: u32,
    pub subdivisions: u32,
    pub fence_mask_image: [u8; SHADER_NAME_LEN],
}

impl Shader {
    pub fn name(&self) -> Result<&str, std::str::Utf8Error> {
        util::fixed_cstr(&self.name)
    }

    pub fn fence_mask_image(&self) -> Result<&str, std::str::Utf8Error> {
        util::fixed_cstr(&self.fence_mask_image)
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Plane {
    pub normal: Vector3<f32>,
    pub dist: f32,
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct Leaf {
    pub cluster: u32,
    pub area: u32,

    pub mins: [u32; 3],
    pub maxs: [u32; 3],

    pub first_leaf_surface: u32,
    pub num_leaf_surfaces: u32,

    pub first_leaf_brush: u32,
    pub num_leaf_brushes: u32,

    pub first_terra_patch: u32,
    pub num_terra_patches: u32,

    pub first_static_model: u32,
    pub num_static_models: u32,
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct Node {
    pub plane: i32,

    // negative values are bitwise-negated leaf indices
    pub children: [i32; 2],

    pub mins: [i32; 3],
    pub maxs: [i32; 3],
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SurfaceType {
    Bad,
    Planar,
    Patch,
    TriangleSoup,
    Flare,
    Terrain,
    Unknown(u32),
}

impl SurfaceType {
    pub fn from_raw(raw: u32) -> SurfaceType {
        match raw {
            0 => SurfaceType::Bad,
            1 => SurfaceType::Planar,
            2 => SurfaceType::Patch,
            3 => SurfaceType::TriangleSoup,
            4 => SurfaceType::Flare,
            5 => SurfaceType::Terrain,
            r => SurfaceType::Unknown(r),
        }
    }

    pub fn raw(&self) -> u32 {
        match *self {
            SurfaceType::Bad => 0,
            SurfaceType::Planar => 1,
            SurfaceType::Patch => 2,
            SurfaceType::TriangleSoup => 3,
            SurfaceType::Flare => 4,
            SurfaceType::Terrain => 5,
            SurfaceType::Unknown(r) => r,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Surface {
    pub shader_id: u32,
    pub fog_id: u32,
    pub surface_type: SurfaceType,

    pub first_vert: u32,
    pub num_verts: u32,

    pub first_index: u32,
    pub num_indexes: u32,

    pub lightmap_id: u32,
    pub lightmap_x: u32,
    pub lightmap_y: u32,
    pub lightmap_width: u32,
    pub lightmap_height: u32,

    pub lightmap_origin: Vector3<f32>,
    pub lightmap_vecs: [Vector3<f32>; 3],

    pub patch_width: u32,
    pub patch_height: u32,

    pub subdivisions: f32,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct DrawVertex {
    pub position: Vector3<f32>,
    pub texcoord: Vector2<f32>,
    pub lightmap: Vector2<f32>,
    pub normal: Vector3<f32>,
    pub color: [u8; 4],
}

/// Which part of the file a short read happened in.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ReadRegion {
    Header,
    Directory,
    Lump(LumpKind),
}

impl fmt::Display for ReadRegion {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            ReadRegion::Header => write!(f, "header"),
            ReadRegion::Directory => write!(f, "lump directory"),
            ReadRegion::Lump(kind) => write!(f, "{:?} lump", kind),
        }
    }
}

/// A recoverable problem found while loading a map.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum LoadDiagnostic {
    /// The header identifier is not `MAP_IDENT`. Loading continues regardless.
    UnknownIdent { ident: [u8; 4] },

    /// A lump's length is not a multiple of its record size. The lump is left empty.
    LumpSizeMismatch {
        kind: LumpKind,
        block_size: usize,
        length: u32,
    },

    /// The stream returned fewer bytes than requested. A lump read short is left empty; a short
    /// header or directory is zero-filled.
    StreamReadShortfall {
        region: ReadRegion,
        requested: usize,
        read: usize,
    },

    Surface(SurfaceDiagnostic),
}

impl LoadDiagnostic {
    pub fn severity(&self) -> Severity {
        match *self {
            LoadDiagnostic::Surface(ref s) => s.severity(),
            _ => Severity::Warning,
        }
    }
}

impl fmt::Display for LoadDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            LoadDiagnostic::UnknownIdent { ident } => write!(
                f,
                "unknown map format {}",
                String::from_utf8_lossy(&ident)
            ),
            LoadDiagnostic::LumpSizeMismatch {
                kind,
                block_size,
                length,
            } => write!(
                f,
                "weird size in {:?} lump: blocksize {} for length {}",
                kind, block_size, length
            ),
            LoadDiagnostic::StreamReadShortfall {
                region,
                requested,
                read,
            } => write!(f, "short read in {}: got {} of {} bytes", region, read, requested),
            LoadDiagnostic::Surface(ref s) => fmt::Display::fmt(s, f),
        }
    }
}

/// Record counts for a loaded map.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct MapCounts {
    pub shaders: usize,
    pub planes: usize,
    pub lightmaps: usize,
    pub surfaces: usize,
    pub draw_verts: usize,
    pub draw_indexes: usize,
    pub leaf_surfaces: usize,
    pub leafs: usize,
    pub clusters: usize,
    pub areas: usize,
    pub nodes: usize,
    pub entity_string_len: usize,
}

impl fmt::Display for MapCounts {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "{} shaders", self.shaders)?;
        writeln!(f, "{} planes", self.planes)?;
        writeln!(f, "{} lightmaps", self.lightmaps)?;
        writeln!(f, "{} surfaces", self.surfaces)?;
        writeln!(f, "{} drawverts", self.draw_verts)?;
        writeln!(f, "{} drawindexes", self.draw_indexes)?;
        writeln!(f, "{} leafsurfaces", self.leaf_surfaces)?;
        writeln!(
            f,
            "map has {} leafs, {} clusters, {} areas",
            self.leafs, self.clusters, self.areas
        )?;
        writeln!(f, "{} nodes", self.nodes)?;
        write!(f, "{} bytes of entity data", self.entity_string_len)
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum MapState {
    Unopened,
    Loading,
    Loaded,
    Closed,
}

/// A loaded map and every buffer read from it.
///
/// Built once by `open` or `load` and read-only afterwards. `close` releases the buffers; using
/// the map after that, or closing it twice, panics.
#[derive(Debug)]
pub struct MapResource {
    state: MapState,

    header: MapHeader,
    lumps: LumpDirectory,

    shaders: Box<[Shader]>,
    planes: Box<[Plane]>,
    lightmaps: Box<[u8]>,
    num_lightmaps: usize,
    surfaces: Box<[Surface]>,
    draw_verts: Box<[DrawVertex]>,
    draw_indexes: Box<[u32]>,
    leaf_surfaces: Box<[u32]>,
    leafs: Box<[Leaf]>,
    nodes: Box<[Node]>,

    // always one byte longer than entity_string_len, ending in zero
    entity_string: Box<[u8]>,
    entity_string_len: usize,

    num_clusters: usize,
    num_areas: usize,

    diagnostics: Vec<LoadDiagnostic>,
}

impl MapResource {
    fn new() -> MapResource {
        MapResource {
            state: MapState::Unopened,
            header: MapHeader {
                ident: [0; 4],
                version: 0,
                checksum: 0,
            },
            lumps: LumpDirectory::default(),
            shaders: Box::new([]),
            planes: Box::new([]),
            lightmaps: Box::new([]),
            num_lightmaps: 0,
            surfaces: Box::new([]),
            draw_verts: Box::new([]),
            draw_indexes: Box::new([]),
            leaf_surfaces: Box::new([]),
            leafs: Box::new([]),
            nodes: Box::new([]),
            entity_string: Box::new([0]),
            entity_string_len: 0,
            num_clusters: 0,
            num_areas: 0,
            diagnostics: Vec::new(),
        }
    }

    /// Opens and loads the map file at `path`.
    ///
    /// This never fails outright. A missing or damaged file produces a map with empty lumps and
    /// the problems recorded in `diagnostics`.
    pub fn open<P>(path: P) -> MapResource
    where
        P: AsRef<Path>,
    {
        info!("Loading map {}", path.as_ref().display());
        load(FileStream::open(path))
    }

    fn check_loaded(&self) {
        match self.state {
            MapState::Loaded => (),
            MapState::Closed => panic!("map resource used after close"),
            s => panic!("map resource used before loading finished ({:?})", s),
        }
    }

    /// Releases every buffer owned by the map.
    ///
    /// ## Panics
    /// - If the map has already been closed.
    pub fn close(&mut self) {
        match self.state {
            MapState::Loaded => (),
            MapState::Closed => panic!("map resource closed twice"),
            s => panic!("map resource closed before loading finished ({:?})", s),
        }

        self.shaders = Box::new([]);
        self.planes = Box::new([]);
        self.lightmaps = Box::new([]);
        self.num_lightmaps = 0;
        self.surfaces = Box::new([]);
        self.draw_verts = Box::new([]);
        self.draw_indexes = Box::new([]);
        self.leaf_surfaces = Box::new([]);
        self.leafs = Box::new([]);
        self.nodes = Box::new([]);
        self.entity_string = Box::new([]);
        self.entity_string_len = 0;
        self.diagnostics = Vec::new();

        self.state = MapState::Closed;
        debug!("Map closed");
    }

    pub fn state(&self) -> MapState {
        self.state
    }

    pub fn is_closed(&self) -> bool {
        self.state == MapState::Closed
    }

    pub fn header(&self) -> &MapHeader {
        self.check_loaded();
        &self.header
    }

    pub fn lumps(&self) -> &LumpDirectory {
        self.check_loaded();
        &self.lumps
    }

    pub fn shaders(&self) -> &[Shader] {
        self.check_loaded();
        &self.shaders
    }

    pub fn planes(&self) -> &[Plane] {
        self.check_loaded();
        &self.planes
    }

    pub fn num_lightmaps(&self) -> usize {
        self.check_loaded();
        self.num_lightmaps
    }

    /// Returns the raw RGB data of lightmap `id`, or `None` if there is no such lightmap.
    pub fn lightmap(&self, id: usize) -> Option<&[u8]> {
        self.check_loaded();
        if id >= self.num_lightmaps {
            return None;
        }

        let start = id * LIGHTMAP_BLOCK_LEN;
        Some(&self.lightmaps[start..start + LIGHTMAP_BLOCK_LEN])
    }

    pub fn surfaces(&self) -> &[Surface] {
        self.check_loaded();
        &self.surfaces
    }

    pub fn draw_verts(&self) -> &[DrawVertex] {
        self.check_loaded();
        &self.draw_verts
    }

    pub fn draw_indexes(&self) -> &[u32] {
        self.check_loaded();
        &self.draw_indexes
    }

    pub fn leaf_surfaces(&self) -> &[u32] {
        self.check_loaded();
        &self.leaf_surfaces
    }

    pub fn leafs(&self) -> &[Leaf] {
        self.check_loaded();
        &self.leafs
    }

    pub fn nodes(&self) -> &[Node] {
        self.check_loaded();
        &self.nodes
    }

    pub fn num_clusters(&self) -> usize {
        self.check_loaded();
        self.num_clusters
    }

    pub fn num_areas(&self) -> usize {
        self.check_loaded();
        self.num_areas
    }

    /// Returns the entity lump including its added terminator.
    pub fn entity_bytes(&self) -> &[u8] {
        self.check_loaded();
        &self.entity_string
    }

    /// Returns the entity text up to its first zero byte.
    pub fn entity_string(&self) -> Result<&str, BspError> {
        self.check_loaded();
        let len = self
            .entity_string
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(self.entity_string_len);
        let text = std::str::from_utf8(&self.entity_string[..len])
            .context(BspErrorKind::EntityParse)?;
        Ok(text)
    }

    /// Parses the entity text into one attribute map per entity.
    pub fn entities(&self) -> Result<Vec<HashMap<&str, &str>>, BspError> {
        let text = self.entity_string()?;
        match parse::entities(text) {
            Ok((_, ents)) => Ok(ents),
            Err(why) => {
                debug!("Entity parse failed: {:?}", why);
                Err(BspErrorKind::EntityParse.into())
            }
        }
    }

    pub fn counts(&self) -> MapCounts {
        self.check_loaded();
        MapCounts {
            shaders: self.shaders.len(),
            planes: self.planes.len(),
            lightmaps: self.num_lightmaps,
            surfaces: self.surfaces.len(),
            draw_verts: self.draw_verts.len(),
            draw_indexes: self.draw_indexes.len(),
            leaf_surfaces: self.leaf_surfaces.len(),
            leafs: self.leafs.len(),
            clusters: self.num_clusters,
            areas: self.num_areas,
            nodes: self.nodes.len(),
            entity_string_len: self.entity_string_len,
        }
    }

    /// Every recoverable problem found during loading, in the order it was found.
    pub fn diagnostics(&self) -> &[LoadDiagnostic] {
        self.check_loaded();
        &self.diagnostics
    }

    /// Expands the indexed surface geometry into a flat vertex stream.
    pub fn expand_vertices(&self) -> Result<VertexBuffer, BspError> {
        self.check_loaded();
        expand(&self.surfaces, &self.draw_indexes, &self.draw_verts)
    }
}
