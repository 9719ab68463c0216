// testmap.rs — synthetic IBSP images for tests

use crate::endian::ByteOrder;
use crate::q_shared::{Contents, SurfaceFlags, Vec3};
use crate::qfiles::*;

#[derive(Debug, Clone, Copy)]
pub struct RawPlane {
    pub normal: Vec3,
    pub dist: f32,
}

#[derive(Debug, Clone)]
pub struct RawTexinfo {
    pub name: String,
    pub flags: u32,
    pub value: i32,
}

#[derive(Debug, Clone, Copy)]
pub struct RawNode {
    pub plane: i32,
    /// negative values are `-(leaf + 1)`
    pub children: [i32; 2],
}

#[derive(Debug, Clone, Copy)]
pub struct RawLeaf {
    pub contents: u32,
    pub cluster: i16,
    pub area: i16,
    pub first_leaf_brush: u16,
    pub num_leaf_brushes: u16,
}

#[derive(Debug, Clone, Copy)]
pub struct RawBrush {
    pub first_side: i32,
    pub num_sides: i32,
    pub contents: u32,
}

#[derive(Debug, Clone, Copy)]
pub struct RawBrushSide {
    pub plane: u16,
    pub texinfo: i16,
}

#[derive(Debug, Clone, Copy)]
pub struct RawModel {
    pub mins: Vec3,
    pub maxs: Vec3,
    pub origin: Vec3,
    pub headnode: i32,
}

#[derive(Debug, Clone, Copy)]
pub struct RawArea {
    pub num_area_portals: i32,
    pub first_area_portal: i32,
}

#[derive(Debug, Clone, Copy)]
pub struct RawAreaPortal {
    pub portal_num: i32,
    pub other_area: i32,
}

/// Compressed PVS and PHS rows for one cluster.
#[derive(Debug, Clone)]
pub struct RawVisRow {
    pub pvs: Vec<u8>,
    pub phs: Vec<u8>,
}

/// Lump contents in structured form; `build` lays them out as a map file.
#[derive(Debug, Clone, Default)]
pub struct MapBuilder {
    pub entities: String,
    pub planes: Vec<RawPlane>,
    pub texinfo: Vec<RawTexinfo>,
    pub nodes: Vec<RawNode>,
    pub leafs: Vec<RawLeaf>,
    pub leaf_brushes: Vec<u16>,
    pub brushes: Vec<RawBrush>,
    pub brush_sides: Vec<RawBrushSide>,
    pub models: Vec<RawModel>,
    pub areas: Vec<RawArea>,
    pub area_portals: Vec<RawAreaPortal>,
    /// Empty means no visibility lump.
    pub visibility: Vec<RawVisRow>,
}

struct Writer {
    buf: Vec<u8>,
    order: ByteOrder,
}

impl Writer {
    fn new(order: ByteOrder) -> Self {
        Self {
            buf: Vec::new(),
            order,
        }
    }

    fn u16(&mut self, v: u16) {
        match self.order {
            ByteOrder::Little => self.buf.extend_from_slice(&v.to_le_bytes()),
            ByteOrder::Big => self.buf.extend_from_slice(&v.to_be_bytes()),
        }
    }

    fn i16(&mut self, v: i16) {
        self.u16(v as u16);
    }

    fn u32(&mut self, v: u32) {
        match self.order {
            ByteOrder::Little => self.buf.extend_from_slice(&v.to_le_bytes()),
            ByteOrder::Big => self.buf.extend_from_slice(&v.to_be_bytes()),
        }
    }

    fn i32(&mut self, v: i32) {
        self.u32(v as u32);
    }

    fn f32(&mut self, v: f32) {
        self.u32(v.to_bits());
    }

    fn vec3(&mut self, v: &Vec3) {
        for c in v {
            self.f32(*c);
        }
    }

    fn zeros(&mut self, n: usize) {
        self.buf.resize(self.buf.len() + n, 0);
    }
}

impl MapBuilder {
    fn lump_bytes(&self, lump: usize, order: ByteOrder) -> Vec<u8> {
        let mut w = Writer::new(order);
        match lump {
            LUMP_ENTITIES => {
                if !self.entities.is_empty() {
                    w.buf.extend_from_slice(self.entities.as_bytes());
                    w.buf.push(0);
                }
            }
            LUMP_PLANES => {
                for p in &self.planes {
                    w.vec3(&p.normal);
                    w.f32(p.dist);
                    w.i32(0);
                }
            }
            LUMP_TEXINFO => {
                for t in &self.texinfo {
                    w.zeros(32);
                    w.u32(t.flags);
                    w.i32(t.value);
                    let mut name = [0u8; TEXINFO_TEXTURE_LEN];
                    let n = t.name.len().min(TEXINFO_TEXTURE_LEN - 1);
                    name[..n].copy_from_slice(&t.name.as_bytes()[..n]);
                    w.buf.extend_from_slice(&name);
                    w.i32(-1);
                }
            }
            LUMP_NODES => {
                for n in &self.nodes {
                    w.i32(n.plane);
                    w.i32(n.children[0]);
                    w.i32(n.children[1]);
                    w.zeros(12);
                    w.u16(0);
                    w.u16(0);
                }
            }
            LUMP_LEAFS => {
                for l in &self.leafs {
                    w.u32(l.contents);
                    w.i16(l.cluster);
                    w.i16(l.area);
                    w.zeros(12);
                    w.u16(0);
                    w.u16(0);
                    w.u16(l.first_leaf_brush);
                    w.u16(l.num_leaf_brushes);
                }
            }
            LUMP_LEAFBRUSHES => {
                for &b in &self.leaf_brushes {
                    w.u16(b);
                }
            }
            LUMP_BRUSHES => {
                for b in &self.brushes {
                    w.i32(b.first_side);
                    w.i32(b.num_sides);
                    w.u32(b.contents);
                }
            }
            LUMP_BRUSHSIDES => {
                for s in &self.brush_sides {
                    w.u16(s.plane);
                    w.i16(s.texinfo);
                }
            }
            LUMP_MODELS => {
                for m in &self.models {
                    w.vec3(&m.mins);
                    w.vec3(&m.maxs);
                    w.vec3(&m.origin);
                    w.i32(m.headnode);
                    w.i32(0);
                    w.i32(0);
                }
            }
            LUMP_AREAS => {
                for a in &self.areas {
                    w.i32(a.num_area_portals);
                    w.i32(a.first_area_portal);
                }
            }
            LUMP_AREAPORTALS => {
                for p in &self.area_portals {
                    w.i32(p.portal_num);
                    w.i32(p.other_area);
                }
            }
            LUMP_VISIBILITY => {
                if !self.visibility.is_empty() {
                    let count = self.visibility.len();
                    w.i32(count as i32);
                    let mut ofs = 4 + count * 8;
                    for row in &self.visibility {
                        w.i32(ofs as i32);
                        w.i32((ofs + row.pvs.len()) as i32);
                        ofs += row.pvs.len() + row.phs.len();
                    }
                    for row in &self.visibility {
                        w.buf.extend_from_slice(&row.pvs);
                        w.buf.extend_from_slice(&row.phs);
                    }
                }
            }
            _ => {}
        }
        w.buf
    }

    /// Lay out the header and every lump, 4-byte aligned, in `order`.
    pub fn build(&self, order: ByteOrder) -> Vec<u8> {
        let lumps: Vec<Vec<u8>> = (0..HEADER_LUMPS).map(|i| self.lump_bytes(i, order)).collect();

        let mut w = Writer::new(order);
        w.i32(IDBSPHEADER);
        w.i32(BSPVERSION);
        let mut ofs = HEADER_SIZE;
        for lump in &lumps {
            w.i32(ofs as i32);
            w.i32(lump.len() as i32);
            ofs += (lump.len() + 3) & !3;
        }
        for lump in &lumps {
            w.buf.extend_from_slice(lump);
            let pad = ((lump.len() + 3) & !3) - lump.len();
            w.zeros(pad);
        }
        w.buf
    }
}

const SOLID: u32 = Contents::SOLID.bits();

fn plane(normal: Vec3, dist: f32) -> RawPlane {
    RawPlane { normal, dist }
}

fn leaf(contents: u32, cluster: i16, area: i16, first: u16, num: u16) -> RawLeaf {
    RawLeaf {
        contents,
        cluster,
        area,
        first_leaf_brush: first,
        num_leaf_brushes: num,
    }
}

/// One solid cube brush spanning `[0,0,0]-[64,64,64]`.
///
/// The world tree carves the cube out with six axial nodes. Space with
/// `x < 0` is leaf 3 (cluster 1, area 2); all other open space is leaf 1
/// (cluster 0, area 1); the cube itself is leaf 2. Areas 1 and 2 share
/// portal 0, closed after load. Submodel 1 is headed by node 4 inside the
/// world tree and has the cube's bounds. The top face carries a slick
/// surface.
pub fn cube_map() -> MapBuilder {
    let x = [1.0, 0.0, 0.0];
    let nx = [-1.0, 0.0, 0.0];
    let y = [0.0, 1.0, 0.0];
    let ny = [0.0, -1.0, 0.0];
    let z = [0.0, 0.0, 1.0];
    let nz = [0.0, 0.0, -1.0];

    MapBuilder {
        entities: concat!(
            "{\n\"classname\" \"worldspawn\"\n}\n",
            "{\n\"classname\" \"func_door\"\n\"model\" \"*1\"\n}\n",
        )
        .to_string(),
        planes: vec![
            plane(x, 0.0),
            plane(nx, 0.0),
            plane(x, 64.0),
            plane(nx, -64.0),
            plane(y, 0.0),
            plane(ny, 0.0),
            plane(y, 64.0),
            plane(ny, -64.0),
            plane(z, 0.0),
            plane(nz, 0.0),
            plane(z, 64.0),
            plane(nz, -64.0),
        ],
        texinfo: vec![
            RawTexinfo {
                name: "e1u1/wall".to_string(),
                flags: 0,
                value: 0,
            },
            RawTexinfo {
                name: "e1u1/slick".to_string(),
                flags: SurfaceFlags::SLICK.bits(),
                value: 7,
            },
        ],
        nodes: vec![
            RawNode { plane: 0, children: [1, -4] },
            RawNode { plane: 2, children: [-2, 2] },
            RawNode { plane: 4, children: [3, -2] },
            RawNode { plane: 6, children: [-2, 4] },
            RawNode { plane: 8, children: [5, -2] },
            RawNode { plane: 10, children: [-2, -3] },
        ],
        leafs: vec![
            leaf(SOLID, -1, 0, 0, 0),
            leaf(0, 0, 1, 0, 0),
            leaf(SOLID, -1, 1, 0, 1),
            leaf(0, 1, 2, 0, 0),
        ],
        leaf_brushes: vec![0],
        brushes: vec![RawBrush {
            first_side: 0,
            num_sides: 6,
            contents: SOLID,
        }],
        brush_sides: vec![
            RawBrushSide { plane: 1, texinfo: 0 },
            RawBrushSide { plane: 2, texinfo: 0 },
            RawBrushSide { plane: 5, texinfo: 0 },
            RawBrushSide { plane: 6, texinfo: 0 },
            RawBrushSide { plane: 9, texinfo: 0 },
            RawBrushSide { plane: 10, texinfo: 1 },
        ],
        models: vec![
            RawModel {
                mins: [-4096.0, -4096.0, -4096.0],
                maxs: [4096.0, 4096.0, 4096.0],
                origin: [0.0; 3],
                headnode: 0,
            },
            RawModel {
                mins: [0.0; 3],
                maxs: [64.0; 3],
                origin: [0.0; 3],
                headnode: 4,
            },
        ],
        areas: vec![
            RawArea {
                num_area_portals: 0,
                first_area_portal: 0,
            },
            RawArea {
                num_area_portals: 1,
                first_area_portal: 0,
            },
            RawArea {
                num_area_portals: 1,
                first_area_portal: 1,
            },
        ],
        area_portals: vec![
            RawAreaPortal {
                portal_num: 0,
                other_area: 2,
            },
            RawAreaPortal {
                portal_num: 0,
                other_area: 1,
            },
        ],
        visibility: vec![
            RawVisRow {
                pvs: vec![0x01],
                phs: vec![0x03],
            },
            RawVisRow {
                pvs: vec![0x02],
                phs: vec![0x03],
            },
        ],
    }
}

/// One solid wedge brush bounded by two slanted walls.
///
/// The brush is `x + y <= 0`, `x - y <= 0`, `x >= -64` and `|z| <= 64`, a
/// triangle in plan with its point at the origin. Node 0 splits on the
/// first wall and node 1 on the second; everything in front of either is
/// leaf 1 and the space behind both is leaf 2. No areas, no visibility.
pub fn wedge_map() -> MapBuilder {
    let s = std::f32::consts::FRAC_1_SQRT_2;

    MapBuilder {
        entities: "{\n\"classname\" \"worldspawn\"\n}\n".to_string(),
        planes: vec![
            plane([s, s, 0.0], 0.0),
            plane([s, -s, 0.0], 0.0),
            plane([-1.0, 0.0, 0.0], 64.0),
            plane([0.0, 0.0, 1.0], 64.0),
            plane([0.0, 0.0, -1.0], 64.0),
        ],
        texinfo: vec![RawTexinfo {
            name: "e1u1/ramp".to_string(),
            flags: 0,
            value: 0,
        }],
        nodes: vec![
            RawNode { plane: 0, children: [-2, 1] },
            RawNode { plane: 1, children: [-2, -3] },
        ],
        leafs: vec![
            leaf(SOLID, -1, 0, 0, 0),
            leaf(0, 0, 0, 0, 0),
            leaf(SOLID, 0, 0, 0, 1),
        ],
        leaf_brushes: vec![0],
        brushes: vec![RawBrush {
            first_side: 0,
            num_sides: 5,
            contents: SOLID,
        }],
        brush_sides: (0..5).map(|plane| RawBrushSide { plane, texinfo: 0 }).collect(),
        models: vec![RawModel {
            mins: [-64.0; 3],
            maxs: [0.0, 64.0, 64.0],
            origin: [0.0; 3],
            headnode: 0,
        }],
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lumps_are_aligned_and_in_range() {
        let image = cube_map().build(ByteOrder::Little);
        for i in 0..HEADER_LUMPS {
            let base = 8 + i * 8;
            let ofs = i32::from_le_bytes(image[base..base + 4].try_into().unwrap()) as usize;
            let len = i32::from_le_bytes(image[base + 4..base + 8].try_into().unwrap()) as usize;
            assert_eq!(ofs % 4, 0);
            assert!(ofs + len <= image.len());
        }
    }

    #[test]
    fn test_record_sizes_match_the_format() {
        let b = cube_map();
        assert_eq!(b.lump_bytes(LUMP_PLANES, ByteOrder::Little).len(), 12 * DPLANE_SIZE);
        assert_eq!(b.lump_bytes(LUMP_NODES, ByteOrder::Little).len(), 6 * DNODE_SIZE);
        assert_eq!(b.lump_bytes(LUMP_TEXINFO, ByteOrder::Little).len(), 2 * TEXINFO_SIZE);
        assert_eq!(b.lump_bytes(LUMP_LEAFS, ByteOrder::Little).len(), 4 * DLEAF_SIZE);
        assert_eq!(b.lump_bytes(LUMP_MODELS, ByteOrder::Little).len(), 2 * DMODEL_SIZE);
        assert_eq!(b.lump_bytes(LUMP_VISIBILITY, ByteOrder::Little).len(), 24);
    }
}
