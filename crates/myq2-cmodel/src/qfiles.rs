// qfiles.rs — IBSP on-disk format: header, lump directory, record layouts

use crate::endian::LumpReader;
use crate::error::LoadError;

// ============================================================
// BSP file format
// ============================================================

/// "IBSP" read as a little-endian int
pub const IDBSPHEADER: i32 =
    (b'P' as i32) << 24 | (b'S' as i32) << 16 | (b'B' as i32) << 8 | b'I' as i32;
pub const BSPVERSION: i32 = 38;

// upper design bounds
pub const MAX_MAP_MODELS: usize = 1024;
pub const MAX_MAP_BRUSHES: usize = 8192;
pub const MAX_MAP_ENTSTRING: usize = 0x40000;
pub const MAX_MAP_TEXINFO: usize = 8192;
pub const MAX_MAP_AREAS: usize = 256;
pub const MAX_MAP_AREAPORTALS: usize = 1024;
pub const MAX_MAP_PLANES: usize = 65536;
pub const MAX_MAP_NODES: usize = 65536;
pub const MAX_MAP_BRUSHSIDES: usize = 65536;
pub const MAX_MAP_LEAFS: usize = 65536;
pub const MAX_MAP_LEAFBRUSHES: usize = 65536;
pub const MAX_MAP_VISIBILITY: usize = 0x100000;

pub const LUMP_ENTITIES: usize = 0;
pub const LUMP_PLANES: usize = 1;
pub const LUMP_VERTEXES: usize = 2;
pub const LUMP_VISIBILITY: usize = 3;
pub const LUMP_NODES: usize = 4;
pub const LUMP_TEXINFO: usize = 5;
pub const LUMP_FACES: usize = 6;
pub const LUMP_LIGHTING: usize = 7;
pub const LUMP_LEAFS: usize = 8;
pub const LUMP_LEAFFACES: usize = 9;
pub const LUMP_LEAFBRUSHES: usize = 10;
pub const LUMP_EDGES: usize = 11;
pub const LUMP_SURFEDGES: usize = 12;
pub const LUMP_MODELS: usize = 13;
pub const LUMP_BRUSHES: usize = 14;
pub const LUMP_BRUSHSIDES: usize = 15;
pub const LUMP_POP: usize = 16;
pub const LUMP_AREAS: usize = 17;
pub const LUMP_AREAPORTALS: usize = 18;
pub const HEADER_LUMPS: usize = 19;

/// ident + version + lump directory
pub const HEADER_SIZE: usize = 8 + HEADER_LUMPS * 8;

// Record sizes and field offsets of the lumps the collision model reads.

/// normal[3], dist, type
pub const DPLANE_SIZE: usize = 20;

/// planenum, children[2], mins[3] i16, maxs[3] i16, firstface u16, numfaces u16
pub const DNODE_SIZE: usize = 28;

/// vecs[2][4], flags, value, texture[32], nexttexinfo
pub const TEXINFO_SIZE: usize = 76;
pub const TEXINFO_FLAGS: usize = 32;
pub const TEXINFO_VALUE: usize = 36;
pub const TEXINFO_TEXTURE: usize = 40;
pub const TEXINFO_TEXTURE_LEN: usize = 32;

/// contents, cluster i16, area i16, mins/maxs i16[3], leaffaces u16 x2, leafbrushes u16 x2
pub const DLEAF_SIZE: usize = 28;
pub const DLEAF_CLUSTER: usize = 4;
pub const DLEAF_AREA: usize = 6;
pub const DLEAF_FIRSTLEAFBRUSH: usize = 24;
pub const DLEAF_NUMLEAFBRUSHES: usize = 26;

/// u16 brush index
pub const DLEAFBRUSH_SIZE: usize = 2;

/// firstside, numsides, contents
pub const DBRUSH_SIZE: usize = 12;

/// planenum u16, texinfo i16
pub const DBRUSHSIDE_SIZE: usize = 4;

/// mins[3], maxs[3], origin[3], headnode, firstface, numfaces
pub const DMODEL_SIZE: usize = 48;
pub const DMODEL_HEADNODE: usize = 36;

/// numareaportals, firstareaportal
pub const DAREA_SIZE: usize = 8;

/// portalnum, otherarea
pub const DAREAPORTAL_SIZE: usize = 8;

// Visibility
pub const DVIS_PVS: usize = 0;
pub const DVIS_PHS: usize = 1;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Lump {
    pub fileofs: i32,
    pub filelen: i32,
}

#[derive(Debug, Clone, Copy)]
pub struct DHeader {
    pub ident: i32,
    pub version: i32,
    pub lumps: [Lump; HEADER_LUMPS],
}

impl DHeader {
    /// Read and check the header and lump directory. Every lump range is
    /// verified to lie inside the image.
    pub fn parse(r: &LumpReader<'_>) -> Result<Self, LoadError> {
        if r.len() < HEADER_SIZE {
            return Err(LoadError::Truncated { len: r.len() });
        }

        let ident = r.i32(0);
        if ident != IDBSPHEADER {
            return Err(LoadError::BadIdent { found: ident });
        }
        let version = r.i32(4);
        if version != BSPVERSION {
            return Err(LoadError::WrongVersion {
                found: version,
                expected: BSPVERSION,
            });
        }

        let mut lumps = [Lump::default(); HEADER_LUMPS];
        for (i, lump) in lumps.iter_mut().enumerate() {
            let base = 8 + i * 8;
            *lump = Lump {
                fileofs: r.i32(base),
                filelen: r.i32(base + 4),
            };
            let ofs = lump.fileofs as i64;
            let len = lump.filelen as i64;
            if ofs < 0 || len < 0 || ofs + len > r.len() as i64 {
                return Err(LoadError::LumpOutOfRange {
                    lump: lump_name(i),
                    offset: ofs,
                    len,
                    file_len: r.len(),
                });
            }
        }

        Ok(Self {
            ident,
            version,
            lumps,
        })
    }

    /// Byte range of a lump inside the image.
    pub fn range(&self, lump: usize) -> std::ops::Range<usize> {
        let l = self.lumps[lump];
        l.fileofs as usize..(l.fileofs as usize + l.filelen as usize)
    }
}

pub fn lump_name(lump: usize) -> &'static str {
    match lump {
        LUMP_ENTITIES => "entities",
        LUMP_PLANES => "planes",
        LUMP_VERTEXES => "vertexes",
        LUMP_VISIBILITY => "visibility",
        LUMP_NODES => "nodes",
        LUMP_TEXINFO => "surfaces",
        LUMP_FACES => "faces",
        LUMP_LIGHTING => "lighting",
        LUMP_LEAFS => "leafs",
        LUMP_LEAFFACES => "leaffaces",
        LUMP_LEAFBRUSHES => "leafbrushes",
        LUMP_EDGES => "edges",
        LUMP_SURFEDGES => "surfedges",
        LUMP_MODELS => "submodels",
        LUMP_BRUSHES => "brushes",
        LUMP_BRUSHSIDES => "brushsides",
        LUMP_POP => "pop",
        LUMP_AREAS => "areas",
        LUMP_AREAPORTALS => "areaportals",
        _ => "unknown",
    }
}

/// Layout and limits of a record lump.
#[derive(Debug, Clone, Copy)]
pub struct LumpSpec {
    pub index: usize,
    pub stride: usize,
    pub max: usize,
    /// A map without any records in this lump is rejected.
    pub required: bool,
}

impl LumpSpec {
    pub fn name(&self) -> &'static str {
        lump_name(self.index)
    }
}

pub const PLANES: LumpSpec = LumpSpec {
    index: LUMP_PLANES,
    stride: DPLANE_SIZE,
    max: MAX_MAP_PLANES,
    required: true,
};
pub const NODES: LumpSpec = LumpSpec {
    index: LUMP_NODES,
    stride: DNODE_SIZE,
    max: MAX_MAP_NODES,
    required: true,
};
pub const TEXINFO: LumpSpec = LumpSpec {
    index: LUMP_TEXINFO,
    stride: TEXINFO_SIZE,
    max: MAX_MAP_TEXINFO,
    required: true,
};
pub const LEAFS: LumpSpec = LumpSpec {
    index: LUMP_LEAFS,
    stride: DLEAF_SIZE,
    max: MAX_MAP_LEAFS,
    required: true,
};
pub const LEAFBRUSHES: LumpSpec = LumpSpec {
    index: LUMP_LEAFBRUSHES,
    stride: DLEAFBRUSH_SIZE,
    max: MAX_MAP_LEAFBRUSHES,
    required: true,
};
pub const BRUSHES: LumpSpec = LumpSpec {
    index: LUMP_BRUSHES,
    stride: DBRUSH_SIZE,
    max: MAX_MAP_BRUSHES,
    required: false,
};
pub const BRUSHSIDES: LumpSpec = LumpSpec {
    index: LUMP_BRUSHSIDES,
    stride: DBRUSHSIDE_SIZE,
    max: MAX_MAP_BRUSHSIDES,
    required: false,
};
pub const MODELS: LumpSpec = LumpSpec {
    index: LUMP_MODELS,
    stride: DMODEL_SIZE,
    max: MAX_MAP_MODELS,
    required: true,
};
pub const AREAS: LumpSpec = LumpSpec {
    index: LUMP_AREAS,
    stride: DAREA_SIZE,
    max: MAX_MAP_AREAS,
    required: false,
};
pub const AREAPORTALS: LumpSpec = LumpSpec {
    index: LUMP_AREAPORTALS,
    stride: DAREAPORTAL_SIZE,
    max: MAX_MAP_AREAPORTALS,
    required: false,
};
