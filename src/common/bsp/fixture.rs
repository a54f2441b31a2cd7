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

//! In-memory map images for tests.

use crate::common::bsp::{
    LumpEntry, LumpKind, HEADER_LUMPS, HEADER_SIZE, LUMP_ENTRY_SIZE, MAP_IDENT, MOHAA_VERSION,
};

use byteorder::{LittleEndian, WriteBytesExt};

/// Builds a map file. Lump payloads follow the directory in the order they were added.
pub struct MapImage {
    ident: [u8; 4],
    version: u32,
    checksum: u32,
    lumps: Vec<(LumpKind, Vec<u8>)>,
    entries: Vec<(LumpKind, LumpEntry)>,
}

impl MapImage {
    pub fn new() -> MapImage {
        MapImage {
            ident: MAP_IDENT,
            version: MOHAA_VERSION,
            checksum: 0,
            lumps: Vec::new(),
            entries: Vec::new(),
        }
    }

    pub fn ident(mut self, ident: [u8; 4]) -> MapImage {
        self.ident = ident;
        self
    }

    pub fn version(mut self, version: u32, checksum: u32) -> MapImage {
        self.version = version;
        self.checksum = checksum;
        self
    }

    pub fn lump(mut self, kind: LumpKind, data: Vec<u8>) -> MapImage {
        self.lumps.push((kind, data));
        self
    }

    /// Overrides the directory entry for `kind` without adding a payload.
    pub fn entry(mut self, kind: LumpKind, offset: u32, length: u32) -> MapImage {
        self.entries.push((kind, LumpEntry { offset, length }));
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let base = HEADER_SIZE + HEADER_LUMPS * LUMP_ENTRY_SIZE;

        let mut directory = [LumpEntry::default(); HEADER_LUMPS];
        let mut payload = Vec::new();
        for &(kind, ref data) in self.lumps.iter() {
            directory[kind as usize] = LumpEntry {
                offset: (base + payload.len()) as u32,
                length: data.len() as u32,
            };
            payload.extend_from_slice(data);
        }

        for &(kind, entry) in self.entries.iter() {
            directory[kind as usize] = entry;
        }

        let mut out = Vec::with_capacity(base + payload.len());
        out.extend_from_slice(&self.ident);
        out.write_u32::<LittleEndian>(self.version).unwrap();
        out.write_u32::<LittleEndian>(self.checksum).unwrap();
        for entry in directory.iter() {
            out.write_u32::<LittleEndian>(entry.offset).unwrap();
            out.write_u32::<LittleEndian>(entry.length).unwrap();
        }
        out.extend_from_slice(&payload);

        out
    }
}

fn write_f32s(out: &mut Vec<u8>, values: &[f32]) {
    for v in values {
        out.write_f32::<LittleEndian>(*v).unwrap();
    }
}

fn write_u32s(out: &mut Vec<u8>, values: &[u32]) {
    for v in values {
        out.write_u32::<LittleEndian>(*v).unwrap();
    }
}

fn write_name(out: &mut Vec<u8>, name: &str) {
    let mut field = [0u8; 64];
    field[..name.len()].copy_from_slice(name.as_bytes());
    out.extend_from_slice(&field);
}

pub fn shader(name: &str, fence_mask_image: &str) -> Vec<u8> {
    let mut out = Vec::new();
    write_name(&mut out, name);
    write_u32s(&mut out, &[0x80, 0x1, 0]);
    write_name(&mut out, fence_mask_image);
    out
}

pub fn plane(normal: [f32; 3], dist: f32) -> Vec<u8> {
    let mut out = Vec::new();
    write_f32s(&mut out, &normal);
    write_f32s(&mut out, &[dist]);
    out
}

pub fn leaf(cluster: u32, area: u32) -> Vec<u8> {
    let mut out = Vec::new();
    write_u32s(&mut out, &[cluster, area]);
    write_u32s(&mut out, &[0, 0, 0, 64, 64, 64]);
    write_u32s(&mut out, &[0; 8]);
    out
}

pub fn node(plane: i32, children: [i32; 2]) -> Vec<u8> {
    let mut out = Vec::new();
    out.write_i32::<LittleEndian>(plane).unwrap();
    for c in children.iter() {
        out.write_i32::<LittleEndian>(*c).unwrap();
    }
    for b in [-64, -64, -64, 64, 64, 64].iter() {
        out.write_i32::<LittleEndian>(*b).unwrap();
    }
    out
}

pub fn surface(
    surface_type: u32,
    first_vert: u32,
    num_verts: u32,
    first_index: u32,
    num_indexes: u32,
) -> Vec<u8> {
    let mut out = Vec::new();
    write_u32s(
        &mut out,
        &[0, 0, surface_type, first_vert, num_verts, first_index, num_indexes],
    );
    write_u32s(&mut out, &[0, 0, 0, 128, 128]);
    write_f32s(&mut out, &[0.0; 12]);
    write_u32s(&mut out, &[0, 0]);
    write_f32s(&mut out, &[4.0]);
    out
}

pub fn draw_vertex(position: [f32; 3], texcoord: [f32; 2]) -> Vec<u8> {
    let mut out = Vec::new();
    write_f32s(&mut out, &position);
    write_f32s(&mut out, &texcoord);
    write_f32s(&mut out, &[0.0, 0.0]);
    write_f32s(&mut out, &[0.0, 0.0, 1.0]);
    out.extend_from_slice(&[255; 4]);
    out
}

pub fn indexes(values: &[u32]) -> Vec<u8> {
    let mut out = Vec::new();
    write_u32s(&mut out, values);
    out
}

#[test]
fn test_record_sizes() {
    assert_eq!(shader("a", "").len(), 140);
    assert_eq!(plane([0.0; 3], 0.0).len(), 16);
    assert_eq!(leaf(0, 0).len(), 64);
    assert_eq!(node(0, [0, 0]).len(), 36);
    assert_eq!(surface(0, 0, 0, 0, 0).len(), 108);
    assert_eq!(draw_vertex([0.0; 3], [0.0; 2]).len(), 44);
    assert_eq!(MapImage::new().build().len(), 12 + 28 * 8);
}
