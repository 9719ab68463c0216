// cm_trace.rs — point, leaf and swept box queries against a BSP tree
//
// Every query reads a `BspTree` view and keeps its scratch state on the
// stack, so any number of queries may run at once against one map.

use bit_vec::BitVec;

use crate::cm_tree::BspTree;
use crate::cm_vis::cluster_visible;
use crate::q_shared::{
    dot_product, vector_compare, vector_lerp, BoxSide, CPlane, Contents, NodeChild, Trace, Vec3,
};

/// Traces stop this far short of a surface.
pub const DIST_EPSILON: f32 = 0.03125;

/// Box corner nearest the plane: the one that touches it first when the box
/// approaches from the front.
#[inline]
fn nearest_corner(plane: &CPlane, mins: &Vec3, maxs: &Vec3) -> Vec3 {
    let mut ofs = [0.0; 3];
    for j in 0..3 {
        ofs[j] = if plane.normal[j] < 0.0 { maxs[j] } else { mins[j] };
    }
    ofs
}

impl<'a> BspTree<'a> {
    /// Leaf containing `p`. Points on a plane go to the front child.
    pub fn point_leafnum(&self, p: &Vec3, head: NodeChild) -> usize {
        let mut num = head;
        loop {
            match num {
                NodeChild::Leaf(leaf) => return leaf,
                NodeChild::Node(n) => {
                    let node = self.node(n);
                    let d = self.planes[node.plane].distance(p);
                    num = if d < 0.0 {
                        node.children[1]
                    } else {
                        node.children[0]
                    };
                }
            }
        }
    }

    fn point_in_brush(&self, p: &Vec3, brush: usize) -> bool {
        let sides = self.brush_sides(brush);
        !sides.is_empty()
            && sides
                .iter()
                .all(|side| self.planes[side.plane].distance(p) < 0.0)
    }

    /// Contents of every brush in `p`'s leaf that strictly contains `p`.
    pub fn point_contents(&self, p: &Vec3, head: NodeChild) -> Contents {
        let leaf = self.point_leafnum(p, head);
        if self.leafs[leaf].contents.is_empty() {
            return Contents::empty();
        }
        self.leaf_brushes(leaf)
            .filter(|&b| self.point_in_brush(p, b))
            .fold(Contents::empty(), |acc, b| acc | self.brushes[b].contents)
    }

    /// Leafs touched by a box, up to `capacity` of them, and the first node
    /// whose plane splits the box.
    pub fn box_leafnums(
        &self,
        mins: &Vec3,
        maxs: &Vec3,
        head: NodeChild,
        capacity: usize,
    ) -> (Vec<usize>, Option<usize>) {
        let mut list = Vec::new();
        let mut top = None;
        self.box_leafnums_r(head, mins, maxs, capacity, &mut list, &mut top);
        (list, top)
    }

    fn box_leafnums_r(
        &self,
        mut num: NodeChild,
        mins: &Vec3,
        maxs: &Vec3,
        capacity: usize,
        list: &mut Vec<usize>,
        top: &mut Option<usize>,
    ) {
        loop {
            let n = match num {
                NodeChild::Leaf(leaf) => {
                    if list.len() < capacity {
                        list.push(leaf);
                    }
                    return;
                }
                NodeChild::Node(n) => n,
            };

            let node = self.node(n);
            match self.planes[node.plane].box_on_side(mins, maxs) {
                BoxSide::Front => num = node.children[0],
                BoxSide::Back => num = node.children[1],
                BoxSide::Both => {
                    if top.is_none() {
                        *top = Some(n);
                    }
                    self.box_leafnums_r(node.children[0], mins, maxs, capacity, list, top);
                    num = node.children[1];
                }
            }
        }
    }

    /// True if any leaf under `head` is in a cluster set in `visbits`.
    pub fn headnode_visible(&self, head: NodeChild, visbits: &[u8]) -> bool {
        match head {
            NodeChild::Leaf(leaf) => cluster_visible(visbits, self.leafs[leaf].cluster),
            NodeChild::Node(n) => {
                let node = self.node(n);
                self.headnode_visible(node.children[0], visbits)
                    || self.headnode_visible(node.children[1], visbits)
            }
        }
    }

    /// Sweep a box from `start` to `end` against brushes matching `mask`.
    /// `start == end` is a position test that gathers up to `position_leafs`
    /// leafs. Returns the trace and the number of brushes tested.
    pub fn box_trace(
        &self,
        start: &Vec3,
        end: &Vec3,
        mins: &Vec3,
        maxs: &Vec3,
        head: NodeChild,
        mask: Contents,
        position_leafs: usize,
    ) -> (Trace, usize) {
        let mut tw = TraceWork::new(*self, start, end, mins, maxs, mask);

        if vector_compare(start, end) {
            tw.position_test(head, position_leafs);
            tw.trace.endpos = *start;
        } else {
            tw.recursive_hull_check(head, 0.0, 1.0, start, end);
            tw.trace.endpos = if tw.trace.fraction == 1.0 {
                *end
            } else {
                vector_lerp(start, end, tw.trace.fraction)
            };
        }

        (tw.trace, tw.brush_tests)
    }
}

/// Scratch state for one trace.
struct TraceWork<'a> {
    tree: BspTree<'a>,
    start: Vec3,
    end: Vec3,
    mins: Vec3,
    maxs: Vec3,
    extents: Vec3,
    is_point: bool,
    mask: Contents,
    /// Brushes already tested by this trace; a brush can sit in many leafs.
    checked: BitVec,
    brush_tests: usize,
    trace: Trace,
}

impl<'a> TraceWork<'a> {
    fn new(
        tree: BspTree<'a>,
        start: &Vec3,
        end: &Vec3,
        mins: &Vec3,
        maxs: &Vec3,
        mask: Contents,
    ) -> Self {
        let is_point = vector_compare(mins, &[0.0; 3]) && vector_compare(maxs, &[0.0; 3]);
        let mut extents = [0.0; 3];
        if !is_point {
            for i in 0..3 {
                extents[i] = (-mins[i]).max(maxs[i]);
            }
        }
        Self {
            tree,
            start: *start,
            end: *end,
            mins: *mins,
            maxs: *maxs,
            extents,
            is_point,
            mask,
            checked: BitVec::from_elem(tree.brushes.len(), false),
            brush_tests: 0,
            trace: Trace::default(),
        }
    }

    /// Marks `brush` as visited; false if it already was or doesn't match.
    fn take_brush(&mut self, brush: usize) -> bool {
        if self.checked[brush] {
            return false;
        }
        self.checked.set(brush, true);
        self.tree.brushes[brush].contents.intersects(self.mask)
    }

    fn position_test(&mut self, head: NodeChild, capacity: usize) {
        let mut c1 = [0.0; 3];
        let mut c2 = [0.0; 3];
        for i in 0..3 {
            c1[i] = self.start[i] + self.mins[i] - 1.0;
            c2[i] = self.start[i] + self.maxs[i] + 1.0;
        }

        let (leafs, _) = self.tree.box_leafnums(&c1, &c2, head, capacity);
        for leaf in leafs {
            self.test_in_leaf(leaf);
            if self.trace.allsolid {
                break;
            }
        }
    }

    fn test_in_leaf(&mut self, leaf: usize) {
        let tree = self.tree;
        if !tree.leafs[leaf].contents.intersects(self.mask) {
            return;
        }
        for brush in tree.leaf_brushes(leaf) {
            if !self.take_brush(brush) {
                continue;
            }
            self.test_box_in_brush(brush);
            if self.trace.allsolid {
                return;
            }
        }
    }

    /// Stationary box against one brush. Touching a face counts as inside.
    fn test_box_in_brush(&mut self, brush: usize) {
        let tree = self.tree;
        let sides = tree.brush_sides(brush);
        if sides.is_empty() {
            return;
        }
        self.brush_tests += 1;

        for side in sides {
            let plane = &tree.planes[side.plane];
            let ofs = nearest_corner(plane, &self.mins, &self.maxs);
            let dist = plane.dist - dot_product(&ofs, &plane.normal);
            let d1 = dot_product(&self.start, &plane.normal) - dist;
            if d1 > 0.0 {
                return;
            }
        }

        self.trace.startsolid = true;
        self.trace.allsolid = true;
        self.trace.fraction = 0.0;
        self.trace.contents = tree.brushes[brush].contents;
    }

    fn trace_to_leaf(&mut self, leaf: usize) {
        let tree = self.tree;
        if !tree.leafs[leaf].contents.intersects(self.mask) {
            return;
        }
        for brush in tree.leaf_brushes(leaf) {
            if !self.take_brush(brush) {
                continue;
            }
            self.clip_box_to_brush(brush);
            if self.trace.fraction == 0.0 {
                return;
            }
        }
    }

    fn clip_box_to_brush(&mut self, brush: usize) {
        let tree = self.tree;
        let sides = tree.brush_sides(brush);
        if sides.is_empty() {
            return;
        }
        self.brush_tests += 1;

        let mut enterfrac: f32 = -1.0;
        let mut leavefrac: f32 = 1.0;
        let mut lead = None;
        let mut getout = false;
        let mut startout = false;

        for side in sides {
            let plane = &tree.planes[side.plane];

            let dist = if self.is_point {
                plane.dist
            } else {
                let ofs = nearest_corner(plane, &self.mins, &self.maxs);
                plane.dist - dot_product(&ofs, &plane.normal)
            };

            let d1 = dot_product(&self.start, &plane.normal) - dist;
            let d2 = dot_product(&self.end, &plane.normal) - dist;

            if d2 > 0.0 {
                getout = true;
            }
            if d1 > 0.0 {
                startout = true;
            }

            // starts in front and ends at least an epsilon in front, or moves away
            if d1 > 0.0 && (d2 >= DIST_EPSILON || d2 >= d1) {
                return;
            }
            if d1 <= 0.0 && d2 <= 0.0 {
                continue;
            }

            if d1 > d2 {
                let f = (d1 - DIST_EPSILON) / (d1 - d2);
                if f > enterfrac {
                    enterfrac = f;
                    lead = Some(side);
                }
            } else {
                let f = (d1 + DIST_EPSILON) / (d1 - d2);
                if f < leavefrac {
                    leavefrac = f;
                }
            }
        }

        if !startout {
            self.trace.startsolid = true;
            if !getout {
                self.trace.allsolid = true;
                self.trace.fraction = 0.0;
                self.trace.contents = tree.brushes[brush].contents;
            }
            return;
        }

        if enterfrac < leavefrac && enterfrac > -1.0 && enterfrac < self.trace.fraction {
            if let Some(side) = lead {
                self.trace.fraction = enterfrac.max(0.0);
                self.trace.plane = tree.planes[side.plane];
                self.trace.surface = Some(tree.side_surface(side));
                self.trace.contents = tree.brushes[brush].contents;
            }
        }
    }

    fn recursive_hull_check(&mut self, num: NodeChild, p1f: f32, p2f: f32, p1: &Vec3, p2: &Vec3) {
        // already hit something nearer
        if self.trace.fraction <= p1f {
            return;
        }

        let n = match num {
            NodeChild::Leaf(leaf) => {
                self.trace_to_leaf(leaf);
                return;
            }
            NodeChild::Node(n) => n,
        };

        let tree = self.tree;
        let node = tree.node(n);
        let plane = &tree.planes[node.plane];

        let (t1, t2, offset) = match plane.plane_type.axis() {
            Some(axis) => (
                p1[axis] - plane.dist,
                p2[axis] - plane.dist,
                self.extents[axis],
            ),
            None => {
                let offset = if self.is_point {
                    0.0
                } else {
                    (self.extents[0] * plane.normal[0]).abs()
                        + (self.extents[1] * plane.normal[1]).abs()
                        + (self.extents[2] * plane.normal[2]).abs()
                };
                (
                    dot_product(&plane.normal, p1) - plane.dist,
                    dot_product(&plane.normal, p2) - plane.dist,
                    offset,
                )
            }
        };

        if t1 >= offset && t2 >= offset {
            self.recursive_hull_check(node.children[0], p1f, p2f, p1, p2);
            return;
        }
        if t1 < -offset && t2 < -offset {
            self.recursive_hull_check(node.children[1], p1f, p2f, p1, p2);
            return;
        }

        // split the segment, nudging each part an epsilon past the plane
        let (side, frac, frac2) = if t1 < t2 {
            let idist = 1.0 / (t1 - t2);
            (
                1,
                (t1 - offset + DIST_EPSILON) * idist,
                (t1 + offset + DIST_EPSILON) * idist,
            )
        } else if t1 > t2 {
            let idist = 1.0 / (t1 - t2);
            (
                0,
                (t1 + offset + DIST_EPSILON) * idist,
                (t1 - offset - DIST_EPSILON) * idist,
            )
        } else {
            (0, 1.0, 0.0)
        };
        let frac = frac.clamp(0.0, 1.0);
        let frac2 = frac2.clamp(0.0, 1.0);

        // near side first
        let midf = p1f + (p2f - p1f) * frac;
        let mid = vector_lerp(p1, p2, frac);
        self.recursive_hull_check(node.children[side], p1f, midf, p1, &mid);

        let midf2 = p1f + (p2f - p1f) * frac2;
        let mid2 = vector_lerp(p1, p2, frac2);
        self.recursive_hull_check(node.children[side ^ 1], midf2, p2f, &mid2, p2);
    }
}
