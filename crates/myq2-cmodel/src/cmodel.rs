// cmodel.rs — the collision world: map lifecycle and every public query

use std::fs;
use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicUsize, Ordering};

use log::{debug, error, info, warn};

use crate::cm_areas::AreaGraph;
use crate::cm_boxhull::BoxHull;
use crate::cm_load::LoadOptions;
use crate::cm_tree::{AsBspTree, BspTree, MapData};
use crate::cm_vis::VisKind;
use crate::config::CmConfig;
use crate::endian::ByteOrder;
use crate::error::LoadError;
use crate::md4::com_block_checksum;
use crate::q_shared::{
    rotate_into, vector_compare, vector_lerp, vector_subtract, CModel, Contents, NodeChild, Trace,
    Vec3, VEC3_ORIGIN,
};

/// Misuse from a caller: a hard stop in debug builds, a warning and a
/// neutral answer otherwise.
macro_rules! misuse {
    ($($arg:tt)*) => {{
        if cfg!(debug_assertions) {
            panic!($($arg)*);
        }
        warn!($($arg)*);
    }};
}

/// Which tree a query runs against.
#[derive(Debug, Clone)]
pub enum HeadNode {
    /// A node or leaf of the loaded map, usually a model's `headnode`.
    Tree(NodeChild),
    /// A standalone box from `CollisionWorld::head_node_for_box`.
    Box(BoxHull),
}

impl HeadNode {
    pub fn is_box(&self) -> bool {
        matches!(self, HeadNode::Box(_))
    }
}

impl From<NodeChild> for HeadNode {
    fn from(n: NodeChild) -> Self {
        HeadNode::Tree(n)
    }
}

impl From<&CModel> for HeadNode {
    fn from(m: &CModel) -> Self {
        HeadNode::Tree(m.headnode)
    }
}

/// Query counters since the current map was loaded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CmStats {
    pub point_contents: usize,
    pub traces: usize,
    pub brush_traces: usize,
}

#[derive(Debug, Default)]
struct Counters {
    point_contents: AtomicUsize,
    traces: AtomicUsize,
    brush_traces: AtomicUsize,
}

impl Counters {
    fn snapshot(&self) -> CmStats {
        CmStats {
            point_contents: self.point_contents.load(Ordering::Relaxed),
            traces: self.traces.load(Ordering::Relaxed),
            brush_traces: self.brush_traces.load(Ordering::Relaxed),
        }
    }

    fn reset(&self) {
        self.point_contents.store(0, Ordering::Relaxed);
        self.traces.store(0, Ordering::Relaxed);
        self.brush_traces.store(0, Ordering::Relaxed);
    }
}

/// One loaded map plus its portal state. Queries take `&self` and may run
/// from any number of threads; loading and portal changes take `&mut self`.
#[derive(Debug)]
pub struct CollisionWorld {
    config: CmConfig,
    name: String,
    checksum: u32,
    map: MapData,
    areas: AreaGraph,
    box_template: BoxHull,
    counters: Counters,
}

impl Default for CollisionWorld {
    fn default() -> Self {
        Self::new(CmConfig::default())
    }
}

impl CollisionWorld {
    /// An empty world: one leaf, one cluster, one area.
    pub fn new(config: CmConfig) -> Self {
        let map = MapData::empty();
        let mut areas = AreaGraph::new(map.areas.len(), map.num_portals());
        areas.flood(&map.areas, &map.area_portals);
        Self {
            config,
            name: String::new(),
            checksum: 0,
            map,
            areas,
            box_template: BoxHull::new(),
            counters: Counters::default(),
        }
    }

    pub fn config(&self) -> &CmConfig {
        &self.config
    }

    /// Console-style variable set; false if the name isn't ours.
    pub fn set_cvar(&mut self, name: &str, value: &str) -> bool {
        self.config.set(name, value)
    }

    // ============================================================
    // Loading
    // ============================================================

    /// Load a map file. Returns the world model and the file checksum.
    ///
    /// Asking for the map that is already loaded skips the parse; a server
    /// load (`clientload == false`) also closes every portal. An empty
    /// name unloads and leaves the empty world in place.
    pub fn load_map(&mut self, name: &str, clientload: bool) -> Result<(CModel, u32), LoadError> {
        if let Some(cached) = self.reuse(name, clientload) {
            return Ok(cached);
        }
        self.unload_map();
        if name.is_empty() {
            return Ok((self.world_model(), 0));
        }

        let data = fs::read(name).map_err(|source| {
            error!("Couldn't load {}: {}", name, source);
            LoadError::Io {
                path: name.to_string(),
                source,
            }
        })?;
        self.install(name, &data, ByteOrder::Little)
    }

    /// As `load_map`, with the file contents already in memory.
    pub fn load_map_from_bytes(
        &mut self,
        name: &str,
        data: &[u8],
        clientload: bool,
    ) -> Result<(CModel, u32), LoadError> {
        self.load_map_from_bytes_with_order(name, data, clientload, ByteOrder::Little)
    }

    /// As `load_map_from_bytes` for an image written in `order`.
    pub fn load_map_from_bytes_with_order(
        &mut self,
        name: &str,
        data: &[u8],
        clientload: bool,
        order: ByteOrder,
    ) -> Result<(CModel, u32), LoadError> {
        if let Some(cached) = self.reuse(name, clientload) {
            return Ok(cached);
        }
        self.unload_map();
        if name.is_empty() {
            return Ok((self.world_model(), 0));
        }
        self.install(name, data, order)
    }

    fn reuse(&mut self, name: &str, clientload: bool) -> Option<(CModel, u32)> {
        if name.is_empty() || name != self.name {
            return None;
        }
        if !clientload {
            self.areas.close_all(&self.map.areas, &self.map.area_portals);
        }
        debug!("{} already loaded", name);
        Some((self.world_model(), self.checksum))
    }

    fn install(
        &mut self,
        name: &str,
        data: &[u8],
        order: ByteOrder,
    ) -> Result<(CModel, u32), LoadError> {
        let opts = LoadOptions {
            byte_order: order,
            parallel_threshold: self.config.parallel_lump_threshold,
        };
        let map = MapData::parse(data, &opts).map_err(|e| {
            error!("Couldn't load {}: {}", name, e);
            e
        })?;

        let checksum = com_block_checksum(data);
        let mut areas = AreaGraph::new(map.areas.len(), map.num_portals());
        areas.flood(&map.areas, &map.area_portals);

        self.map = map;
        self.areas = areas;
        self.box_template = BoxHull::new();
        self.name = name.to_string();
        self.checksum = checksum;

        info!(
            "loaded {}: {} inline models, {} leafs, {} clusters, {} areas, checksum {:08x}",
            name,
            self.map.models.len(),
            self.map.leafs.len(),
            self.map.num_clusters,
            self.map.areas.len(),
            checksum
        );
        Ok((self.world_model(), checksum))
    }

    /// Drop the current map and fall back to the empty world.
    pub fn unload_map(&mut self) {
        if !self.name.is_empty() {
            let s = self.counters.snapshot();
            debug!(
                "unloading {}: {} point contents, {} traces, {} brush traces",
                self.name, s.point_contents, s.traces, s.brush_traces
            );
        }
        self.map = MapData::empty();
        self.areas = AreaGraph::new(self.map.areas.len(), self.map.num_portals());
        self.areas.flood(&self.map.areas, &self.map.area_portals);
        self.name.clear();
        self.checksum = 0;
        self.counters.reset();
    }

    // ============================================================
    // Map info
    // ============================================================

    pub fn map_name(&self) -> &str {
        &self.name
    }

    pub fn checksum(&self) -> u32 {
        self.checksum
    }

    pub fn is_loaded(&self) -> bool {
        !self.name.is_empty()
    }

    pub fn num_inline_models(&self) -> usize {
        self.map.models.len()
    }

    pub fn world_model(&self) -> CModel {
        self.map.models.first().copied().unwrap_or_default()
    }

    /// Brush model by its entity name, `"*1"` and up.
    pub fn inline_model(&self, name: &str) -> Option<&CModel> {
        let num = name.strip_prefix('*').and_then(|n| n.parse::<usize>().ok());
        match num {
            Some(n) if n >= 1 && n < self.map.models.len() => Some(&self.map.models[n]),
            _ => {
                misuse!("inline_model: bad name \"{}\"", name);
                None
            }
        }
    }

    pub fn entity_string(&self) -> &str {
        &self.map.entity_string
    }

    pub fn num_clusters(&self) -> usize {
        self.map.num_clusters
    }

    pub fn num_leafs(&self) -> usize {
        self.map.leafs.len()
    }

    pub fn num_areas(&self) -> usize {
        self.map.areas.len()
    }

    pub fn num_portals(&self) -> usize {
        self.map.num_portals()
    }

    pub fn leaf_contents(&self, leaf: usize) -> Contents {
        match self.map.leafs.get(leaf) {
            Some(l) => l.contents,
            None => {
                misuse!("leaf_contents: bad leaf {}", leaf);
                Contents::empty()
            }
        }
    }

    pub fn leaf_cluster(&self, leaf: usize) -> i32 {
        match self.map.leafs.get(leaf) {
            Some(l) => l.cluster,
            None => {
                misuse!("leaf_cluster: bad leaf {}", leaf);
                -1
            }
        }
    }

    pub fn leaf_area(&self, leaf: usize) -> i32 {
        match self.map.leafs.get(leaf) {
            Some(l) => l.area,
            None => {
                misuse!("leaf_area: bad leaf {}", leaf);
                0
            }
        }
    }

    // ============================================================
    // Point and box queries
    // ============================================================

    fn resolve<'h>(&'h self, head: &'h HeadNode) -> Option<(BspTree<'h>, NodeChild)> {
        match head {
            HeadNode::Tree(n) => {
                let tree = self.map.bsp_tree();
                if tree.contains(*n) {
                    Some((tree, *n))
                } else {
                    misuse!("bad headnode {:?}", n);
                    None
                }
            }
            HeadNode::Box(hull) => Some((hull.bsp_tree(), hull.head())),
        }
    }

    /// Leaf of the world tree containing `p`.
    pub fn point_leafnum(&self, p: &Vec3) -> usize {
        self.map
            .bsp_tree()
            .point_leafnum(p, self.world_model().headnode)
    }

    /// World leafs touched by a box and the first node splitting it.
    pub fn box_leafnums(
        &self,
        mins: &Vec3,
        maxs: &Vec3,
        capacity: usize,
    ) -> (Vec<usize>, Option<usize>) {
        self.box_leafnums_headnode(mins, maxs, capacity, self.world_model().headnode)
    }

    pub fn box_leafnums_headnode(
        &self,
        mins: &Vec3,
        maxs: &Vec3,
        capacity: usize,
        head: NodeChild,
    ) -> (Vec<usize>, Option<usize>) {
        let tree = self.map.bsp_tree();
        if !tree.contains(head) {
            misuse!("box_leafnums: bad headnode {:?}", head);
            return (Vec::new(), None);
        }
        tree.box_leafnums(mins, maxs, head, capacity)
    }

    pub fn point_contents(&self, p: &Vec3, head: &HeadNode) -> Contents {
        self.counters.point_contents.fetch_add(1, Ordering::Relaxed);
        match self.resolve(head) {
            Some((tree, num)) => tree.point_contents(p, num),
            None => Contents::empty(),
        }
    }

    /// Contents at a world point for a model placed at `origin` with `angles`.
    pub fn transformed_point_contents(
        &self,
        p: &Vec3,
        head: &HeadNode,
        origin: &Vec3,
        angles: &Vec3,
    ) -> Contents {
        let mut p_l = vector_subtract(p, origin);
        if !head.is_box() && !vector_compare(angles, &VEC3_ORIGIN) {
            p_l = rotate_into(&p_l, angles);
        }
        self.point_contents(&p_l, head)
    }

    /// A standalone box tree. Each call returns its own copy.
    pub fn head_node_for_box(&self, mins: &Vec3, maxs: &Vec3) -> HeadNode {
        let mut hull = self.box_template.clone();
        hull.set_bounds(mins, maxs);
        HeadNode::Box(hull)
    }

    pub fn box_trace(
        &self,
        start: &Vec3,
        end: &Vec3,
        mins: &Vec3,
        maxs: &Vec3,
        head: &HeadNode,
        mask: Contents,
    ) -> Trace {
        self.counters.traces.fetch_add(1, Ordering::Relaxed);
        let Some((tree, num)) = self.resolve(head) else {
            return Trace {
                endpos: *end,
                ..Trace::default()
            };
        };
        let (trace, tested) =
            tree.box_trace(start, end, mins, maxs, num, mask, self.config.position_leafs);
        self.counters.brush_traces.fetch_add(tested, Ordering::Relaxed);
        trace
    }

    /// Trace against a model moved to `origin` and turned by `angles`.
    /// The hit normal and `endpos` come back in world space.
    pub fn transformed_box_trace(
        &self,
        start: &Vec3,
        end: &Vec3,
        mins: &Vec3,
        maxs: &Vec3,
        head: &HeadNode,
        mask: Contents,
        origin: &Vec3,
        angles: &Vec3,
    ) -> Trace {
        let mut start_l = vector_subtract(start, origin);
        let mut end_l = vector_subtract(end, origin);

        let rotated = !head.is_box() && !vector_compare(angles, &VEC3_ORIGIN);
        if rotated {
            start_l = rotate_into(&start_l, angles);
            end_l = rotate_into(&end_l, angles);
        }

        let mut trace = self.box_trace(&start_l, &end_l, mins, maxs, head, mask);

        if rotated && trace.fraction != 1.0 {
            let back = [-angles[0], -angles[1], -angles[2]];
            trace.plane.normal = rotate_into(&trace.plane.normal, &back);
        }

        trace.endpos = if trace.fraction == 1.0 {
            *end
        } else {
            vector_lerp(start, end, trace.fraction)
        };
        trace
    }

    /// True if any leaf under `head` is in a cluster set in `visbits`.
    pub fn headnode_visible(&self, head: NodeChild, visbits: &[u8]) -> bool {
        let tree = self.map.bsp_tree();
        if !tree.contains(head) {
            misuse!("headnode_visible: bad headnode {:?}", head);
            return false;
        }
        tree.headnode_visible(head, visbits)
    }

    // ============================================================
    // PVS / PHS
    // ============================================================

    pub fn cluster_pvs(&self, cluster: i32) -> Vec<u8> {
        self.map
            .vis
            .cluster_set(cluster, VisKind::Pvs, self.map.num_clusters)
    }

    pub fn cluster_phs(&self, cluster: i32) -> Vec<u8> {
        self.map
            .vis
            .cluster_set(cluster, VisKind::Phs, self.map.num_clusters)
    }

    // ============================================================
    // Area portals
    // ============================================================

    pub fn flood_area_connections(&mut self) {
        self.areas.flood(&self.map.areas, &self.map.area_portals);
    }

    pub fn set_area_portal_state(&mut self, portal: usize, open: bool) {
        if !self
            .areas
            .set_portal_state(portal, open, &self.map.areas, &self.map.area_portals)
        {
            misuse!(
                "set_area_portal_state: portal {} > {}",
                portal,
                self.areas.num_portals()
            );
        }
    }

    pub fn area_portal_open(&self, portal: usize) -> bool {
        self.areas.is_open(portal).unwrap_or(false)
    }

    pub fn areas_connected(&self, area1: usize, area2: usize) -> bool {
        match self.areas.areas_connected(area1, area2, self.config.no_areas) {
            Some(connected) => connected,
            None => {
                misuse!("areas_connected: area {} or {} out of range", area1, area2);
                false
            }
        }
    }

    /// Bit row of areas connected to `area` (0 = all). Returns the number
    /// of bytes written, short of the row when `buffer` is.
    pub fn write_area_bits(&self, buffer: &mut [u8], area: usize) -> usize {
        if area >= self.areas.num_areas() && !self.config.no_areas {
            misuse!("write_area_bits: bad area {}", area);
            let fill = ((self.areas.num_areas() + 7) >> 3).min(buffer.len());
            buffer[..fill].fill(0);
            return fill;
        }
        self.areas.write_area_bits(buffer, area, self.config.no_areas)
    }

    pub fn write_portal_state(&self, writer: &mut dyn Write) -> io::Result<()> {
        self.areas.write_portal_state(writer)
    }

    pub fn read_portal_state(&mut self, reader: &mut dyn Read) -> io::Result<()> {
        self.areas
            .read_portal_state(reader, &self.map.areas, &self.map.area_portals)
    }

    pub fn stats(&self) -> CmStats {
        self.counters.snapshot()
    }
}
