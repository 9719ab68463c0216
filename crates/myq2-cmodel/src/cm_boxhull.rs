// cm_boxhull.rs — a tiny BSP tree standing in for an axis-aligned box
//
// Lets entity bounding boxes go through the same trace and contents code as
// world geometry. Each hull is a value; callers get their own copy with the
// plane distances already set.

use crate::cm_tree::{AsBspTree, BspTree, CBrush, CBrushSide, CLeaf, CNode};
use crate::q_shared::{CPlane, Contents, NodeChild, Vec3};

pub const BOX_EMPTY_LEAF: usize = 0;
pub const BOX_LEAF: usize = 1;

/// Six chained nodes, each with the empty leaf on its outer side and the
/// next node on its inner side; the last node's inner side is the box leaf.
/// Plane `2i` faces +axis and `2i+1` faces -axis for node `i`'s axis.
#[derive(Debug, Clone)]
pub struct BoxHull {
    planes: [CPlane; 12],
    nodes: [CNode; 6],
    leafs: [CLeaf; 2],
    leaf_brushes: [u16; 1],
    brushes: [CBrush; 1],
    brush_sides: [CBrushSide; 6],
}

impl BoxHull {
    pub fn new() -> Self {
        let mut planes = [CPlane::default(); 12];
        let mut nodes = [CNode::default(); 6];
        let mut brush_sides = [CBrushSide::default(); 6];

        for i in 0..6 {
            let side = i & 1;
            let axis = i >> 1;

            brush_sides[i] = CBrushSide {
                plane: i * 2 + side,
                surface: None,
            };

            let mut children = [NodeChild::Leaf(BOX_EMPTY_LEAF); 2];
            children[side ^ 1] = if i != 5 {
                NodeChild::Node(i + 1)
            } else {
                NodeChild::Leaf(BOX_LEAF)
            };
            nodes[i] = CNode {
                plane: i * 2,
                children,
            };

            let mut normal = [0.0; 3];
            normal[axis] = 1.0;
            planes[i * 2] = CPlane::new(normal, 0.0);
            normal[axis] = -1.0;
            planes[i * 2 + 1] = CPlane::new(normal, 0.0);
        }

        let leafs = [
            CLeaf::default(),
            CLeaf {
                contents: Contents::MONSTER,
                first_leaf_brush: 0,
                num_leaf_brushes: 1,
                ..CLeaf::default()
            },
        ];

        Self {
            planes,
            nodes,
            leafs,
            leaf_brushes: [0],
            brushes: [CBrush {
                contents: Contents::MONSTER,
                first_side: 0,
                num_sides: 6,
            }],
            brush_sides,
        }
    }

    pub fn with_bounds(mins: &Vec3, maxs: &Vec3) -> Self {
        let mut hull = Self::new();
        hull.set_bounds(mins, maxs);
        hull
    }

    pub fn set_bounds(&mut self, mins: &Vec3, maxs: &Vec3) {
        for axis in 0..3 {
            let p = axis * 4;
            self.planes[p].dist = maxs[axis];
            self.planes[p + 1].dist = -maxs[axis];
            self.planes[p + 2].dist = mins[axis];
            self.planes[p + 3].dist = -mins[axis];
        }
    }

    pub fn head(&self) -> NodeChild {
        NodeChild::Node(0)
    }

    pub fn mins(&self) -> Vec3 {
        [self.planes[2].dist, self.planes[6].dist, self.planes[10].dist]
    }

    pub fn maxs(&self) -> Vec3 {
        [self.planes[0].dist, self.planes[4].dist, self.planes[8].dist]
    }
}

impl Default for BoxHull {
    fn default() -> Self {
        Self::new()
    }
}

impl AsBspTree for BoxHull {
    fn bsp_tree(&self) -> BspTree<'_> {
        BspTree {
            planes: &self.planes,
            nodes: &self.nodes,
            leafs: &self.leafs,
            leaf_brushes: &self.leaf_brushes,
            brushes: &self.brushes,
            brush_sides: &self.brush_sides,
            surfaces: &[],
        }
    }
}
