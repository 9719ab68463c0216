// cm_load.rs — IBSP image → MapData
//
// Each lump is decoded into its record type, then cross-references between
// lumps are checked once so the query code can index without guarding.

use log::debug;
use rayon::prelude::*;

use crate::cm_tree::{CArea, CAreaPortal, CBrush, CBrushSide, CLeaf, CNode, MapData};
use crate::cm_vis::VisData;
use crate::config::DEFAULT_PARALLEL_LUMPS;
use crate::endian::{ByteOrder, LumpReader};
use crate::error::LoadError;
use crate::q_shared::{CModel, CPlane, CSurface, Contents, NodeChild, SurfaceFlags};
use crate::qfiles::{self, *};

#[derive(Debug, Clone, Copy)]
pub struct LoadOptions {
    pub byte_order: ByteOrder,
    /// Lumps with at least this many records decode in parallel; 0 never does.
    pub parallel_threshold: usize,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            byte_order: ByteOrder::Little,
            parallel_threshold: DEFAULT_PARALLEL_LUMPS,
        }
    }
}

// Record layouts as stored, before indices are checked.

#[derive(Debug, Clone, Copy)]
struct DNode {
    planenum: i32,
    children: [i32; 2],
}

#[derive(Debug, Clone, Copy)]
struct DLeaf {
    contents: u32,
    cluster: i16,
    area: i16,
    firstleafbrush: u16,
    numleafbrushes: u16,
}

#[derive(Debug, Clone, Copy)]
struct DBrush {
    firstside: i32,
    numsides: i32,
    contents: u32,
}

#[derive(Debug, Clone, Copy)]
struct DBrushSide {
    planenum: u16,
    texinfo: i16,
}

#[derive(Debug, Clone, Copy)]
struct DModel {
    mins: [f32; 3],
    maxs: [f32; 3],
    origin: [f32; 3],
    headnode: i32,
}

#[derive(Debug, Clone, Copy)]
struct DArea {
    numareaportals: i32,
    firstareaportal: i32,
}

#[derive(Debug, Clone, Copy)]
struct DAreaPortal {
    portalnum: i32,
    otherarea: i32,
}

/// Split a lump into fixed-size records and decode each one, on the rayon
/// pool when the lump is large enough.
fn load_records<T, F>(
    r: &LumpReader<'_>,
    header: &DHeader,
    spec: &LumpSpec,
    threshold: usize,
    decode: F,
) -> Result<Vec<T>, LoadError>
where
    T: Send,
    F: Fn(&LumpReader<'_>, usize) -> T + Sync + Send,
{
    let range = header.range(spec.index);
    let len = range.len();
    if len % spec.stride != 0 {
        return Err(LoadError::FunnyLumpSize { lump: spec.name() });
    }
    let count = len / spec.stride;
    if count < 1 && spec.required {
        return Err(LoadError::EmptyLump { lump: spec.name() });
    }
    if count > spec.max {
        return Err(LoadError::TooMany {
            lump: spec.name(),
            count,
            max: spec.max,
        });
    }

    let base = range.start;
    let stride = spec.stride;
    let records = if threshold > 0 && count >= threshold {
        (0..count)
            .into_par_iter()
            .map(|i| decode(r, base + i * stride))
            .collect()
    } else {
        (0..count).map(|i| decode(r, base + i * stride)).collect()
    };
    Ok(records)
}

fn decode_plane(r: &LumpReader<'_>, ofs: usize) -> CPlane {
    // the stored type field is recomputed from the normal
    CPlane::new(r.vec3(ofs), r.f32(ofs + 12))
}

fn decode_texinfo(r: &LumpReader<'_>, ofs: usize) -> CSurface {
    let raw = r.bytes(ofs + TEXINFO_TEXTURE, TEXINFO_TEXTURE_LEN);
    let name_len = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
    CSurface {
        name: String::from_utf8_lossy(&raw[..name_len]).into_owned(),
        flags: SurfaceFlags::from_bits_retain(r.u32(ofs + TEXINFO_FLAGS)),
        value: r.i32(ofs + TEXINFO_VALUE),
    }
}

fn decode_node(r: &LumpReader<'_>, ofs: usize) -> DNode {
    DNode {
        planenum: r.i32(ofs),
        children: [r.i32(ofs + 4), r.i32(ofs + 8)],
    }
}

fn decode_leaf(r: &LumpReader<'_>, ofs: usize) -> DLeaf {
    DLeaf {
        contents: r.u32(ofs),
        cluster: r.i16(ofs + DLEAF_CLUSTER),
        area: r.i16(ofs + DLEAF_AREA),
        firstleafbrush: r.u16(ofs + DLEAF_FIRSTLEAFBRUSH),
        numleafbrushes: r.u16(ofs + DLEAF_NUMLEAFBRUSHES),
    }
}

fn decode_brush(r: &LumpReader<'_>, ofs: usize) -> DBrush {
    DBrush {
        firstside: r.i32(ofs),
        numsides: r.i32(ofs + 4),
        contents: r.u32(ofs + 8),
    }
}

fn decode_brush_side(r: &LumpReader<'_>, ofs: usize) -> DBrushSide {
    DBrushSide {
        planenum: r.u16(ofs),
        texinfo: r.i16(ofs + 2),
    }
}

fn decode_model(r: &LumpReader<'_>, ofs: usize) -> DModel {
    DModel {
        mins: r.vec3(ofs),
        maxs: r.vec3(ofs + 12),
        origin: r.vec3(ofs + 24),
        headnode: r.i32(ofs + DMODEL_HEADNODE),
    }
}

fn decode_area(r: &LumpReader<'_>, ofs: usize) -> DArea {
    DArea {
        numareaportals: r.i32(ofs),
        firstareaportal: r.i32(ofs + 4),
    }
}

fn decode_area_portal(r: &LumpReader<'_>, ofs: usize) -> DAreaPortal {
    DAreaPortal {
        portalnum: r.i32(ofs),
        otherarea: r.i32(ofs + 4),
    }
}

/// Index into a store of `len` items, or `BadIndex`.
fn check_index(
    index: i64,
    len: usize,
    lump: &'static str,
    record: usize,
    what: &'static str,
) -> Result<usize, LoadError> {
    if index < 0 || index as u64 >= len as u64 {
        return Err(LoadError::BadIndex {
            lump,
            record,
            what,
            index,
        });
    }
    Ok(index as usize)
}

/// `first..first+count` must fit inside a store of `len` items.
fn check_span(
    first: i64,
    count: i64,
    len: usize,
    lump: &'static str,
    record: usize,
    what: &'static str,
) -> Result<(usize, usize), LoadError> {
    if first < 0 || count < 0 || first + count > len as i64 {
        return Err(LoadError::BadIndex {
            lump,
            record,
            what,
            index: first,
        });
    }
    Ok((first as usize, count as usize))
}

fn check_child(
    child: NodeChild,
    num_nodes: usize,
    num_leafs: usize,
    lump: &'static str,
    record: usize,
) -> Result<NodeChild, LoadError> {
    match child {
        NodeChild::Node(n) => {
            check_index(n as i64, num_nodes, lump, record, "node").map(NodeChild::Node)
        }
        NodeChild::Leaf(l) => {
            check_index(l as i64, num_leafs, lump, record, "leaf").map(NodeChild::Leaf)
        }
    }
}

/// Every node must be reached by exactly one path from the first walk that
/// finds it. Model heads are walked first, and a model head already inside
/// an earlier model's tree is skipped. Nodes no model reaches are then
/// walked on their own and may lead into an earlier walk but never back
/// into their own.
fn check_tree(nodes: &[CNode], models: &[CModel]) -> Result<(), LoadError> {
    // number of the walk that first reached each node, 0 for none
    let mut walk_of = vec![0usize; nodes.len()];
    let mut stack = Vec::new();
    let mut walk = 0;

    let model_heads = models.iter().filter_map(|m| match m.headnode {
        NodeChild::Node(n) => Some((n, true)),
        NodeChild::Leaf(_) => None,
    });
    let unreached = (0..nodes.len()).map(|n| (n, false));

    for (head, from_model) in model_heads.chain(unreached) {
        if walk_of[head] != 0 {
            continue;
        }
        walk += 1;
        stack.push(head);
        while let Some(n) = stack.pop() {
            if walk_of[n] == walk || (walk_of[n] != 0 && from_model) {
                return Err(LoadError::NotATree { node: n });
            }
            if walk_of[n] != 0 {
                continue;
            }
            walk_of[n] = walk;
            for child in nodes[n].children {
                if let NodeChild::Node(c) = child {
                    stack.push(c);
                }
            }
        }
    }
    Ok(())
}

impl MapData {
    /// Parse a complete map image.
    pub fn parse(data: &[u8], opts: &LoadOptions) -> Result<Self, LoadError> {
        let r = LumpReader::new(data, opts.byte_order);
        let header = DHeader::parse(&r)?;
        let par = opts.parallel_threshold;

        // load in dependency order: each lump's references point backwards
        let surfaces = load_records(&r, &header, &qfiles::TEXINFO, par, decode_texinfo)?;
        let planes = load_records(&r, &header, &qfiles::PLANES, par, decode_plane)?;

        let dsides = load_records(&r, &header, &qfiles::BRUSHSIDES, par, decode_brush_side)?;
        let mut brush_sides = Vec::with_capacity(dsides.len());
        for (i, s) in dsides.iter().enumerate() {
            let plane = check_index(s.planenum as i64, planes.len(), "brushsides", i, "plane")?;
            let surface = if s.texinfo < 0 {
                None
            } else {
                Some(check_index(s.texinfo as i64, surfaces.len(), "brushsides", i, "texinfo")?)
            };
            brush_sides.push(CBrushSide { plane, surface });
        }

        let dbrushes = load_records(&r, &header, &qfiles::BRUSHES, par, decode_brush)?;
        let mut brushes = Vec::with_capacity(dbrushes.len());
        for (i, b) in dbrushes.iter().enumerate() {
            let (first_side, num_sides) = check_span(
                b.firstside as i64,
                b.numsides as i64,
                brush_sides.len(),
                "brushes",
                i,
                "brush sides",
            )?;
            brushes.push(CBrush {
                contents: Contents::from_bits_retain(b.contents),
                first_side,
                num_sides,
            });
        }

        let leaf_brushes =
            load_records(&r, &header, &qfiles::LEAFBRUSHES, par, |r, ofs| r.u16(ofs))?;
        for (i, &b) in leaf_brushes.iter().enumerate() {
            check_index(b as i64, brushes.len(), "leafbrushes", i, "brush")?;
        }

        let dportals = load_records(&r, &header, &qfiles::AREAPORTALS, par, decode_area_portal)?;
        let dareas = load_records(&r, &header, &qfiles::AREAS, par, decode_area)?;
        let mut areas = Vec::with_capacity(dareas.len().max(1));
        for (i, a) in dareas.iter().enumerate() {
            let (first_area_portal, num_area_portals) = check_span(
                a.firstareaportal as i64,
                a.numareaportals as i64,
                dportals.len(),
                "areas",
                i,
                "area portals",
            )?;
            areas.push(CArea {
                first_area_portal,
                num_area_portals,
            });
        }
        if areas.is_empty() {
            areas.push(CArea::default());
        }
        let mut area_portals = Vec::with_capacity(dportals.len());
        for (i, p) in dportals.iter().enumerate() {
            area_portals.push(CAreaPortal {
                portal_num: check_index(
                    p.portalnum as i64,
                    dportals.len(),
                    "areaportals",
                    i,
                    "portal",
                )?,
                other_area: check_index(p.otherarea as i64, areas.len(), "areaportals", i, "area")?,
            });
        }

        let vis_range = header.range(LUMP_VISIBILITY);
        if vis_range.len() > MAX_MAP_VISIBILITY {
            return Err(LoadError::TooMany {
                lump: lump_name(LUMP_VISIBILITY),
                count: vis_range.len(),
                max: MAX_MAP_VISIBILITY,
            });
        }
        let vis = VisData::parse(&data[vis_range], opts.byte_order)?;

        let dleafs = load_records(&r, &header, &qfiles::LEAFS, par, decode_leaf)?;
        let mut leafs = Vec::with_capacity(dleafs.len());
        for (i, l) in dleafs.iter().enumerate() {
            if l.cluster < -1 {
                return Err(LoadError::BadIndex {
                    lump: "leafs",
                    record: i,
                    what: "cluster",
                    index: l.cluster as i64,
                });
            }
            if !vis.is_empty() && l.cluster as i64 >= vis.num_clusters() as i64 {
                return Err(LoadError::BadVisibility(format!(
                    "leaf {} cluster {} beyond the {} clusters in the lump",
                    i,
                    l.cluster,
                    vis.num_clusters()
                )));
            }
            check_index(l.area as i64, areas.len(), "leafs", i, "area")?;
            check_span(
                l.firstleafbrush as i64,
                l.numleafbrushes as i64,
                leaf_brushes.len(),
                "leafs",
                i,
                "leaf brushes",
            )?;
            leafs.push(CLeaf {
                contents: Contents::from_bits_retain(l.contents),
                cluster: l.cluster as i32,
                area: l.area as i32,
                first_leaf_brush: l.firstleafbrush,
                num_leaf_brushes: l.numleafbrushes,
            });
        }
        if leafs[0].contents != Contents::SOLID {
            return Err(LoadError::LeafZeroNotSolid);
        }
        // rows past the last cluster a leaf names are never read
        let num_clusters = leafs
            .iter()
            .map(|l| (l.cluster + 1) as usize)
            .max()
            .unwrap_or(0);

        let dnodes = load_records(&r, &header, &qfiles::NODES, par, decode_node)?;
        let mut nodes = Vec::with_capacity(dnodes.len());
        for (i, n) in dnodes.iter().enumerate() {
            let plane = check_index(n.planenum as i64, planes.len(), "nodes", i, "plane")?;
            let mut children = [NodeChild::default(); 2];
            for (slot, &raw) in children.iter_mut().zip(n.children.iter()) {
                let child = NodeChild::from_raw(raw);
                *slot = check_child(child, dnodes.len(), leafs.len(), "nodes", i)?;
            }
            nodes.push(CNode { plane, children });
        }

        let dmodels = load_records(&r, &header, &qfiles::MODELS, par, decode_model)?;
        let mut models = Vec::with_capacity(dmodels.len());
        for (i, m) in dmodels.iter().enumerate() {
            // spread the bounds by one unit so edge contact still links
            models.push(CModel {
                mins: [m.mins[0] - 1.0, m.mins[1] - 1.0, m.mins[2] - 1.0],
                maxs: [m.maxs[0] + 1.0, m.maxs[1] + 1.0, m.maxs[2] + 1.0],
                origin: m.origin,
                headnode: check_child(
                    NodeChild::from_raw(m.headnode),
                    nodes.len(),
                    leafs.len(),
                    "submodels",
                    i,
                )?,
            });
        }
        check_tree(&nodes, &models)?;

        let ent_range = header.range(LUMP_ENTITIES);
        if ent_range.len() > MAX_MAP_ENTSTRING {
            return Err(LoadError::TooMany {
                lump: lump_name(LUMP_ENTITIES),
                count: ent_range.len(),
                max: MAX_MAP_ENTSTRING,
            });
        }
        let entity_string = String::from_utf8_lossy(&data[ent_range])
            .trim_end_matches('\0')
            .to_string();

        debug!(
            "parsed {} planes, {} nodes, {} leafs, {} brushes, {} models, {} areas, {} clusters",
            planes.len(),
            nodes.len(),
            leafs.len(),
            brushes.len(),
            models.len(),
            areas.len(),
            num_clusters
        );

        Ok(MapData {
            planes,
            nodes,
            leafs,
            leaf_brushes,
            brushes,
            brush_sides,
            surfaces,
            models,
            areas,
            area_portals,
            vis,
            num_clusters,
            entity_string,
        })
    }
}
