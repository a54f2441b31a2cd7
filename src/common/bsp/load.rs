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

use std::{
    cmp,
    io::{self, Cursor},
};

use crate::common::{
    bsp::{
        validate_surfaces, DrawVertex, Leaf, LoadDiagnostic, LumpDirectory, LumpEntry, LumpKind,
        MapHeader, MapResource, MapState, Node, Plane, ReadRegion, Shader, Surface, SurfaceType,
        HEADER_LUMPS, HEADER_SIZE, LIGHTMAP_BLOCK_LEN, LUMP_ENTRY_SIZE, MOHAA_VERSION,
        SHADER_NAME_LEN,
    },
    stream::ByteStream,
};

use byteorder::{ByteOrder, LittleEndian, ReadBytesExt};
use cgmath::{Vector2, Vector3};
use num_traits::FromPrimitive;

const SHADER_SIZE: usize = 140;
const PLANE_SIZE: usize = 16;
const SURFACE_SIZE: usize = 108;
const DRAW_VERTEX_SIZE: usize = 44;
const DRAW_INDEX_SIZE: usize = 4;
const LEAF_SURFACE_SIZE: usize = 4;
const LEAF_SIZE: usize = 64;
const NODE_SIZE: usize = 36;

// lumps are read in pieces of at most this size so a bogus length can't force a huge allocation
const READ_CHUNK: usize = 0x10000;

/// The decoded contents of one lump.
enum LumpData {
    Shaders(Box<[Shader]>),
    Planes(Box<[Plane]>),
    Lightmaps { data: Box<[u8]>, count: usize },
    Surfaces(Box<[Surface]>),
    DrawVerts(Box<[DrawVertex]>),
    DrawIndexes(Box<[u32]>),
    LeafSurfaces(Box<[u32]>),
    Leafs(Box<[Leaf]>),
    Nodes(Box<[Node]>),
    Entities { data: Box<[u8]>, len: usize },
}

struct LumpDescriptor {
    kind: LumpKind,
    block_size: usize,

    // reserve one byte past the lump and force it to zero
    terminated: bool,

    decode: fn(Vec<u8>, usize) -> io::Result<LumpData>,
}

const LUMP_TABLE: [LumpDescriptor; 10] = [
    LumpDescriptor {
        kind: LumpKind::Shaders,
        block_size: SHADER_SIZE,
        terminated: false,
        decode: decode_shaders,
    },
    LumpDescriptor {
        kind: LumpKind::Planes,
        block_size: PLANE_SIZE,
        terminated: false,
        decode: decode_planes,
    },
    LumpDescriptor {
        kind: LumpKind::Lightmaps,
        block_size: LIGHTMAP_BLOCK_LEN,
        terminated: false,
        decode: decode_lightmaps,
    },
    LumpDescriptor {
        kind: LumpKind::Surfaces,
        block_size: SURFACE_SIZE,
        terminated: false,
        decode: decode_surfaces,
    },
    LumpDescriptor {
        kind: LumpKind::DrawVerts,
        block_size: DRAW_VERTEX_SIZE,
        terminated: false,
        decode: decode_draw_verts,
    },
    LumpDescriptor {
        kind: LumpKind::DrawIndexes,
        block_size: DRAW_INDEX_SIZE,
        terminated: false,
        decode: decode_draw_indexes,
    },
    LumpDescriptor {
        kind: LumpKind::LeafSurfaces,
        block_size: LEAF_SURFACE_SIZE,
        terminated: false,
        decode: decode_leaf_surfaces,
    },
    LumpDescriptor {
        kind: LumpKind::Leafs,
        block_size: LEAF_SIZE,
        terminated: false,
        decode: decode_leafs,
    },
    LumpDescriptor {
        kind: LumpKind::Nodes,
        block_size: NODE_SIZE,
        terminated: false,
        decode: decode_nodes,
    },
    LumpDescriptor {
        kind: LumpKind::Entities,
        block_size: 1,
        terminated: true,
        decode: decode_entities,
    },
];

fn load_vector2<R>(reader: &mut R) -> io::Result<Vector2<f32>>
where
    R: ReadBytesExt,
{
    Ok(Vector2::new(
        reader.read_f32::<LittleEndian>()?,
        reader.read_f32::<LittleEndian>()?,
    ))
}

fn load_vector3<R>(reader: &mut R) -> io::Result<Vector3<f32>>
where
    R: ReadBytesExt,
{
    Ok(Vector3::new(
        reader.read_f32::<LittleEndian>()?,
        reader.read_f32::<LittleEndian>()?,
        reader.read_f32::<LittleEndian>()?,
    ))
}

fn load_shader<R>(reader: &mut R) -> io::Result<Shader>
where
    R: ReadBytesExt,
{
    let mut name = [0u8; SHADER_NAME_LEN];
    reader.read_exact(&mut name)?;

    let surface_flags = reader.read_u32::<LittleEndian>()?;
    let content_flags = reader.read_u32::<LittleEndian>()?;
    let subdivisions = reader.read_u32::<LittleEndian>()?;

    let mut fence_mask_image = [0u8; SHADER_NAME_LEN];
    reader.read_exact(&mut fence_mask_image)?;

    Ok(Shader {
        name,
        surface_flags,
        content_flags,
        subdivisions,
        fence_mask_image,
    })
}

fn load_plane<R>(reader: &mut R) -> io::Result<Plane>
where
    R: ReadBytesExt,
{
    let normal = load_vector3(reader)?;
    let dist = reader.read_f32::<LittleEndian>()?;

    Ok(Plane { normal, dist })
}

fn load_surface<R>(reader: &mut R) -> io::Result<Surface>
where
    R: ReadBytesExt,
{
    let shader_id = reader.read_u32::<LittleEndian>()?;
    let fog_id = reader.read_u32::<LittleEndian>()?;
    let surface_type = SurfaceType::from_raw(reader.read_u32::<LittleEndian>()?);

    let first_vert = reader.read_u32::<LittleEndian>()?;
    let num_verts = reader.read_u32::<LittleEndian>()?;
    let first_index = reader.read_u32::<LittleEndian>()?;
    let num_indexes = reader.read_u32::<LittleEndian>()?;

    let lightmap_id = reader.read_u32::<LittleEndian>()?;
    let lightmap_x = reader.read_u32::<LittleEndian>()?;
    let lightmap_y = reader.read_u32::<LittleEndian>()?;
    let lightmap_width = reader.read_u32::<LittleEndian>()?;
    let lightmap_height = reader.read_u32::<LittleEndian>()?;

    let lightmap_origin = load_vector3(reader)?;
    let lightmap_vecs = [
        load_vector3(reader)?,
        load_vector3(reader)?,
        load_vector3(reader)?,
    ];

    let patch_width = reader.read_u32::<LittleEndian>()?;
    let patch_height = reader.read_u32::<LittleEndian>()?;
    let subdivisions = reader.read_f32::<LittleEndian>()?;

    Ok(Surface {
        shader_id,
        fog_id,
        surface_type,
        first_vert,
        num_verts,
        first_index,
        num_indexes,
        lightmap_id,
        lightmap_x,
        lightmap_y,
        lightmap_width,
        lightmap_height,
        lightmap_origin,
        lightmap_vecs,
        patch_width,
        patch_height,
        subdivisions,
    })
}

fn load_draw_vertex<R>(reader: &mut R) -> io::Result<DrawVertex>
where
    R: ReadBytesExt,
{
    let position = load_vector3(reader)?;
    let texcoord = load_vector2(reader)?;
    let lightmap = load_vector2(reader)?;
    let normal = load_vector3(reader)?;

    let mut color = [0u8; 4];
    reader.read_exact(&mut color)?;

    Ok(DrawVertex {
        position,
        texcoord,
        lightmap,
        normal,
        color,
    })
}

fn load_leaf<R>(reader: &mut R) -> io::Result<Leaf>
where
    R: ReadBytesExt,
{
    let cluster = reader.read_u32::<LittleEndian>()?;
    let area = reader.read_u32::<LittleEndian>()?;

    let mut mins = [0u32; 3];
    reader.read_u32_into::<LittleEndian>(&mut mins)?;
    let mut maxs = [0u32; 3];
    reader.read_u32_into::<LittleEndian>(&mut maxs)?;

    Ok(Leaf {
        cluster,
        area,
        mins,
        maxs,
        first_leaf_surface: reader.read_u32::<LittleEndian>()?,
        num_leaf_surfaces: reader.read_u32::<LittleEndian>()?,
        first_leaf_brush: reader.read_u32::<LittleEndian>()?,
        num_leaf_brushes: reader.read_u32::<LittleEndian>()?,
        first_terra_patch: reader.read_u32::<LittleEndian>()?,
        num_terra_patches: reader.read_u32::<LittleEndian>()?,
        first_static_model: reader.read_u32::<LittleEndian>()?,
        num_static_models: reader.read_u32::<LittleEndian>()?,
    })
}

fn load_node<R>(reader: &mut R) -> io::Result<Node>
where
    R: ReadBytesExt,
{
    let plane = reader.read_i32::<LittleEndian>()?;

    let mut children = [0i32; 2];
    reader.read_i32_into::<LittleEndian>(&mut children)?;
    let mut mins = [0i32; 3];
    reader.read_i32_into::<LittleEndian>(&mut mins)?;
    let mut maxs = [0i32; 3];
    reader.read_i32_into::<LittleEndian>(&mut maxs)?;

    Ok(Node {
        plane,
        children,
        mins,
        maxs,
    })
}

fn load_index<R>(reader: &mut R) -> io::Result<u32>
where
    R: ReadBytesExt,
{
    reader.read_u32::<LittleEndian>()
}

fn read_records<'a, T, F>(data: &'a [u8], count: usize, load_record: F) -> io::Result<Box<[T]>>
where
    F: Fn(&mut Cursor<&'a [u8]>) -> io::Result<T>,
{
    let mut reader = Cursor::new(data);
    let mut records = Vec::with_capacity(count);
    for _ in 0..count {
        records.push(load_record(&mut reader)?);
    }

    Ok(records.into_boxed_slice())
}

fn decode_shaders(data: Vec<u8>, count: usize) -> io::Result<LumpData> {
    read_records(&data, count, load_shader).map(LumpData::Shaders)
}

fn decode_planes(data: Vec<u8>, count: usize) -> io::Result<LumpData> {
    read_records(&data, count, load_plane).map(LumpData::Planes)
}

fn decode_lightmaps(data: Vec<u8>, count: usize) -> io::Result<LumpData> {
    Ok(LumpData::Lightmaps {
        data: data.into_boxed_slice(),
        count,
    })
}

fn decode_surfaces(data: Vec<u8>, count: usize) -> io::Result<LumpData> {
    read_records(&data, count, load_surface).map(LumpData::Surfaces)
}

fn decode_draw_verts(data: Vec<u8>, count: usize) -> io::Result<LumpData> {
    read_records(&data, count, load_draw_vertex).map(LumpData::DrawVerts)
}

fn decode_draw_indexes(data: Vec<u8>, count: usize) -> io::Result<LumpData> {
    read_records(&data, count, load_index).map(LumpData::DrawIndexes)
}

fn decode_leaf_surfaces(data: Vec<u8>, count: usize) -> io::Result<LumpData> {
    read_records(&data, count, load_index).map(LumpData::LeafSurfaces)
}

fn decode_leafs(data: Vec<u8>, count: usize) -> io::Result<LumpData> {
    read_records(&data, count, load_leaf).map(LumpData::Leafs)
}

fn decode_nodes(data: Vec<u8>, count: usize) -> io::Result<LumpData> {
    read_records(&data, count, load_node).map(LumpData::Nodes)
}

fn decode_entities(data: Vec<u8>, count: usize) -> io::Result<LumpData> {
    Ok(LumpData::Entities {
        data: data.into_boxed_slice(),
        len: count,
    })
}

/// Reads exactly `len` bytes, or returns the number of bytes the stream actually had.
fn read_bytes<S>(stream: &mut S, len: usize) -> Result<Vec<u8>, usize>
where
    S: ByteStream,
{
    let mut data = Vec::new();
    while data.len() < len {
        let start = data.len();
        let want = cmp::min(len - start, READ_CHUNK);
        data.resize(start + want, 0);

        let read = stream.read(&mut data[start..]);
        if read < want {
            return Err(start + read);
        }
    }

    Ok(data)
}

fn read_header<S>(stream: &mut S, diagnostics: &mut Vec<LoadDiagnostic>) -> MapHeader
where
    S: ByteStream,
{
    let mut buf = [0u8; HEADER_SIZE];
    let read = stream.read(&mut buf);
    if read < HEADER_SIZE {
        warn!("short read in header: got {} of {} bytes", read, HEADER_SIZE);
        diagnostics.push(LoadDiagnostic::StreamReadShortfall {
            region: ReadRegion::Header,
            requested: HEADER_SIZE,
            read,
        });
    }

    let mut ident = [0u8; 4];
    ident.copy_from_slice(&buf[0..4]);

    let header = MapHeader {
        ident,
        version: LittleEndian::read_u32(&buf[4..8]),
        checksum: LittleEndian::read_u32(&buf[8..12]),
    };

    // the directory and lumps are positional, so an unknown ident doesn't stop the load
    if header.has_known_ident() {
        info!("loading '2015' map");
    } else {
        let diagnostic = LoadDiagnostic::UnknownIdent { ident };
        warn!("{}", diagnostic);
        diagnostics.push(diagnostic);
    }

    info!("map is BSP v{:02}", header.version);
    if header.version == MOHAA_VERSION {
        info!("format is MOHAA v1.12, checksum {:#010x}", header.checksum);
    }

    header
}

fn read_directory<S>(stream: &mut S, diagnostics: &mut Vec<LoadDiagnostic>) -> LumpDirectory
where
    S: ByteStream,
{
    let mut buf = [0u8; HEADER_LUMPS * LUMP_ENTRY_SIZE];
    let read = stream.read(&mut buf);
    if read < buf.len() {
        warn!("short read in lump directory: got {} of {} bytes", read, buf.len());
        diagnostics.push(LoadDiagnostic::StreamReadShortfall {
            region: ReadRegion::Directory,
            requested: buf.len(),
            read,
        });
    }

    let mut entries = [LumpEntry::default(); HEADER_LUMPS];
    for (l, (entry, raw)) in entries
        .iter_mut()
        .zip(buf.chunks(LUMP_ENTRY_SIZE))
        .enumerate()
    {
        entry.offset = LittleEndian::read_u32(&raw[0..4]);
        entry.length = LittleEndian::read_u32(&raw[4..8]);

        debug!(
            "{: <20} Offset = 0x{:>08x} | Size = 0x{:>08x}",
            match LumpKind::from_usize(l) {
                Some(kind) => format!("{:?}:", kind),
                None => format!("{}:", l),
            },
            entry.offset,
            entry.length
        );
    }

    LumpDirectory::new(entries)
}

fn load_lump<S>(
    stream: &mut S,
    lumps: &LumpDirectory,
    desc: &LumpDescriptor,
    diagnostics: &mut Vec<LoadDiagnostic>,
) -> Option<LumpData>
where
    S: ByteStream,
{
    let LumpEntry { offset, length } = lumps.entry(desc.kind);
    let len = length as usize;

    if len % desc.block_size != 0 {
        let diagnostic = LoadDiagnostic::LumpSizeMismatch {
            kind: desc.kind,
            block_size: desc.block_size,
            length,
        };
        warn!("{}", diagnostic);
        diagnostics.push(diagnostic);
        return None;
    }

    let count = len / desc.block_size;

    stream.seek(offset as i64, false);
    let mut data = match read_bytes(stream, len) {
        Ok(d) => d,
        Err(read) => {
            let diagnostic = LoadDiagnostic::StreamReadShortfall {
                region: ReadRegion::Lump(desc.kind),
                requested: len,
                read,
            };
            warn!("{}", diagnostic);
            diagnostics.push(diagnostic);
            return None;
        }
    };

    if desc.terminated {
        data.push(0);
    }

    match (desc.decode)(data, count) {
        Ok(lump) => Some(lump),
        Err(why) => {
            error!("Failed to decode {:?} lump: {}", desc.kind, why);
            diagnostics.push(LoadDiagnostic::LumpSizeMismatch {
                kind: desc.kind,
                block_size: desc.block_size,
                length,
            });
            None
        }
    }
}

fn store_lump(map: &mut MapResource, lump: LumpData) {
    match lump {
        LumpData::Shaders(s) => map.shaders = s,
        LumpData::Planes(p) => map.planes = p,
        LumpData::Lightmaps { data, count } => {
            map.lightmaps = data;
            map.num_lightmaps = count;
        }
        LumpData::Surfaces(s) => map.surfaces = s,
        LumpData::DrawVerts(v) => map.draw_verts = v,
        LumpData::DrawIndexes(i) => map.draw_indexes = i,
        LumpData::LeafSurfaces(l) => map.leaf_surfaces = l,
        LumpData::Leafs(l) => map.leafs = l,
        LumpData::Nodes(n) => map.nodes = n,
        LumpData::Entities { data, len } => {
            map.entity_string = data;
            map.entity_string_len = len;
        }
    }
}

/// Returns the number of clusters and areas referenced by `leafs`.
///
/// Each is one more than the highest index used, or zero if there are no leafs.
pub fn count_clusters_areas(leafs: &[Leaf]) -> (usize, usize) {
    leafs.iter().fold((0, 0), |(clusters, areas), leaf| {
        (
            cmp::max(clusters, (leaf.cluster as usize).saturating_add(1)),
            cmp::max(areas, (leaf.area as usize).saturating_add(1)),
        )
    })
}

/// Load a map from `stream`.
///
/// Loading is best-effort: problems with individual lumps leave those lumps empty and are
/// recorded in the map's diagnostics. The stream is released before this returns.
pub fn load<S>(mut stream: S) -> MapResource
where
    S: ByteStream,
{
    let mut map = MapResource::new();
    map.state = MapState::Loading;

    let mut diagnostics = Vec::new();

    map.header = read_header(&mut stream, &mut diagnostics);
    map.lumps = read_directory(&mut stream, &mut diagnostics);

    for desc in LUMP_TABLE.iter() {
        if let Some(lump) = load_lump(&mut stream, &map.lumps, desc, &mut diagnostics) {
            store_lump(&mut map, lump);
        }
    }

    // nothing reads from the stream past this point
    drop(stream);

    let (num_clusters, num_areas) = count_clusters_areas(&map.leafs);
    map.num_clusters = num_clusters;
    map.num_areas = num_areas;

    diagnostics.extend(
        validate_surfaces(&map.surfaces)
            .into_iter()
            .map(LoadDiagnostic::Surface),
    );
    map.diagnostics = diagnostics;

    map.state = MapState::Loaded;

    for line in map.counts().to_string().lines() {
        info!("{}", line);
    }

    map
}
