// cm_tree.rs — in-memory collision geometry
//
// All stores for one map live in `MapData` as flat vectors addressed by
// index. Nothing points into another store by reference, so unloading a map
// is dropping one value.

use crate::cm_vis::VisData;
use crate::q_shared::{CModel, CPlane, CSurface, Contents, NodeChild};

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CNode {
    pub plane: usize,
    pub children: [NodeChild; 2],
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CLeaf {
    pub contents: Contents,
    /// -1 for leafs outside every cluster
    pub cluster: i32,
    pub area: i32,
    pub first_leaf_brush: u16,
    pub num_leaf_brushes: u16,
}

impl Default for CLeaf {
    fn default() -> Self {
        Self {
            contents: Contents::empty(),
            cluster: -1,
            area: 0,
            first_leaf_brush: 0,
            num_leaf_brushes: 0,
        }
    }
}

impl CLeaf {
    pub fn brush_range(&self) -> std::ops::Range<usize> {
        let first = self.first_leaf_brush as usize;
        first..first + self.num_leaf_brushes as usize
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CBrush {
    pub contents: Contents,
    pub first_side: usize,
    pub num_sides: usize,
}

impl CBrush {
    pub fn side_range(&self) -> std::ops::Range<usize> {
        self.first_side..self.first_side + self.num_sides
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CBrushSide {
    pub plane: usize,
    /// `None` is the null surface.
    pub surface: Option<usize>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CArea {
    pub first_area_portal: usize,
    pub num_area_portals: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CAreaPortal {
    /// Index into the portal open/closed table.
    pub portal_num: usize,
    pub other_area: usize,
}

/// Borrowed view of one collision tree. The world and box hulls both hand
/// one out so a single set of walkers serves both.
#[derive(Debug, Clone, Copy)]
pub struct BspTree<'a> {
    pub planes: &'a [CPlane],
    pub nodes: &'a [CNode],
    pub leafs: &'a [CLeaf],
    pub leaf_brushes: &'a [u16],
    pub brushes: &'a [CBrush],
    pub brush_sides: &'a [CBrushSide],
    pub surfaces: &'a [CSurface],
}

impl<'a> BspTree<'a> {
    #[inline]
    pub fn node(&self, n: usize) -> &'a CNode {
        &self.nodes[n]
    }

    /// Brush indices referenced by a leaf.
    pub fn leaf_brushes(&self, leaf: usize) -> impl Iterator<Item = usize> + 'a {
        self.leaf_brushes[self.leafs[leaf].brush_range()]
            .iter()
            .map(|&b| b as usize)
    }

    pub fn brush_sides(&self, brush: usize) -> &'a [CBrushSide] {
        &self.brush_sides[self.brushes[brush].side_range()]
    }

    /// Surface reported when a side stops a trace.
    pub fn side_surface(&self, side: &CBrushSide) -> CSurface {
        side.surface
            .and_then(|s| self.surfaces.get(s))
            .cloned()
            .unwrap_or_default()
    }

    pub fn contains(&self, head: NodeChild) -> bool {
        match head {
            NodeChild::Node(n) => n < self.nodes.len(),
            NodeChild::Leaf(l) => l < self.leafs.len(),
        }
    }
}

pub trait AsBspTree {
    fn bsp_tree(&self) -> BspTree<'_>;
}

/// Everything parsed out of one map file.
#[derive(Debug, Clone, Default)]
pub struct MapData {
    pub planes: Vec<CPlane>,
    pub nodes: Vec<CNode>,
    pub leafs: Vec<CLeaf>,
    pub leaf_brushes: Vec<u16>,
    pub brushes: Vec<CBrush>,
    pub brush_sides: Vec<CBrushSide>,
    pub surfaces: Vec<CSurface>,
    pub models: Vec<CModel>,
    pub areas: Vec<CArea>,
    pub area_portals: Vec<CAreaPortal>,
    pub vis: VisData,
    pub num_clusters: usize,
    pub entity_string: String,
}

impl MapData {
    /// The "no map" world: one leaf, one cluster, one area, and a world
    /// model headed directly by leaf 0.
    pub fn empty() -> Self {
        Self {
            leafs: vec![CLeaf::default()],
            models: vec![CModel::default()],
            areas: vec![CArea::default()],
            num_clusters: 1,
            ..Default::default()
        }
    }

    /// Portal open/closed slots; one per area portal record.
    pub fn num_portals(&self) -> usize {
        self.area_portals.len()
    }
}

impl AsBspTree for MapData {
    fn bsp_tree(&self) -> BspTree<'_> {
        BspTree {
            planes: &self.planes,
            nodes: &self.nodes,
            leafs: &self.leafs,
            leaf_brushes: &self.leaf_brushes,
            brushes: &self.brushes,
            brush_sides: &self.brush_sides,
            surfaces: &self.surfaces,
        }
    }
}
