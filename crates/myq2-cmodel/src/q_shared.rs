// q_shared.rs — math, content flags and value types shared by the collision model

pub type Vec3 = [f32; 3];

pub const VEC3_ORIGIN: Vec3 = [0.0, 0.0, 0.0];

// angle indexes
pub const PITCH: usize = 0;
pub const YAW: usize = 1;
pub const ROLL: usize = 2;

// ============================================================
// Content flags
// ============================================================

bitflags::bitflags! {
    /// Brush and leaf contents. Unknown bits from the map file are kept.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct Contents: u32 {
        const SOLID         = 0x00000001;
        const WINDOW        = 0x00000002;
        const AUX           = 0x00000004;
        const LAVA          = 0x00000008;
        const SLIME         = 0x00000010;
        const WATER         = 0x00000020;
        const MIST          = 0x00000040;

        const AREAPORTAL    = 0x00008000;
        const PLAYERCLIP    = 0x00010000;
        const MONSTERCLIP   = 0x00020000;

        const CURRENT_0     = 0x00040000;
        const CURRENT_90    = 0x00080000;
        const CURRENT_180   = 0x00100000;
        const CURRENT_270   = 0x00200000;
        const CURRENT_UP    = 0x00400000;
        const CURRENT_DOWN  = 0x00800000;

        const ORIGIN        = 0x01000000;
        const MONSTER       = 0x02000000;
        const DEADMONSTER   = 0x04000000;
        const DETAIL        = 0x08000000;
        const TRANSLUCENT   = 0x10000000;
        const LADDER        = 0x20000000;
    }
}

pub const MASK_ALL: Contents = Contents::from_bits_retain(u32::MAX);
pub const MASK_SOLID: Contents = Contents::SOLID.union(Contents::WINDOW);
pub const MASK_PLAYERSOLID: Contents = Contents::SOLID
    .union(Contents::PLAYERCLIP)
    .union(Contents::WINDOW)
    .union(Contents::MONSTER);
pub const MASK_MONSTERSOLID: Contents = Contents::SOLID
    .union(Contents::MONSTERCLIP)
    .union(Contents::WINDOW)
    .union(Contents::MONSTER);
pub const MASK_WATER: Contents = Contents::WATER.union(Contents::LAVA).union(Contents::SLIME);
pub const MASK_OPAQUE: Contents = Contents::SOLID.union(Contents::SLIME).union(Contents::LAVA);
pub const MASK_SHOT: Contents = Contents::SOLID
    .union(Contents::MONSTER)
    .union(Contents::WINDOW)
    .union(Contents::DEADMONSTER);

bitflags::bitflags! {
    /// Gameplay surface flags carried by texinfo records.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct SurfaceFlags: u32 {
        const LIGHT    = 0x01;
        const SLICK    = 0x02;
        const SKY      = 0x04;
        const WARP     = 0x08;
        const TRANS33  = 0x10;
        const TRANS66  = 0x20;
        const FLOWING  = 0x40;
        const NODRAW   = 0x80;
    }
}

// ============================================================
// Vector operations
// ============================================================

#[inline]
pub fn dot_product(a: &Vec3, b: &Vec3) -> f32 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

#[inline]
pub fn vector_subtract(a: &Vec3, b: &Vec3) -> Vec3 {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

/// `a + frac * (b - a)`
#[inline]
pub fn vector_lerp(a: &Vec3, b: &Vec3, frac: f32) -> Vec3 {
    [
        a[0] + frac * (b[0] - a[0]),
        a[1] + frac * (b[1] - a[1]),
        a[2] + frac * (b[2] - a[2]),
    ]
}

#[inline]
pub fn vector_compare(v1: &Vec3, v2: &Vec3) -> bool {
    v1[0] == v2[0] && v1[1] == v2[1] && v1[2] == v2[2]
}

/// Forward, right and up vectors for a pitch/yaw/roll triple in degrees.
pub fn angle_vectors(angles: &Vec3) -> (Vec3, Vec3, Vec3) {
    let (sy, cy) = angles[YAW].to_radians().sin_cos();
    let (sp, cp) = angles[PITCH].to_radians().sin_cos();
    let (sr, cr) = angles[ROLL].to_radians().sin_cos();

    let forward = [cp * cy, cp * sy, -sp];
    let right = [
        -sr * sp * cy + -cr * -sy,
        -sr * sp * sy + -cr * cy,
        -sr * cp,
    ];
    let up = [
        cr * sp * cy + -sr * -sy,
        cr * sp * sy + -sr * cy,
        cr * cp,
    ];
    (forward, right, up)
}

/// Express `v` in the frame given by `angles` (forward, left, up).
pub fn rotate_into(v: &Vec3, angles: &Vec3) -> Vec3 {
    let (forward, right, up) = angle_vectors(angles);
    [
        dot_product(v, &forward),
        -dot_product(v, &right),
        dot_product(v, &up),
    ]
}

// ============================================================
// Planes
// ============================================================

/// Axis tag used for the fast distance path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaneType {
    X,
    Y,
    Z,
    #[default]
    NonAxial,
}

impl PlaneType {
    /// Only exact positive unit normals are axial; the fast path assumes `+1`.
    pub fn for_normal(normal: &Vec3) -> Self {
        if vector_compare(normal, &[1.0, 0.0, 0.0]) {
            PlaneType::X
        } else if vector_compare(normal, &[0.0, 1.0, 0.0]) {
            PlaneType::Y
        } else if vector_compare(normal, &[0.0, 0.0, 1.0]) {
            PlaneType::Z
        } else {
            PlaneType::NonAxial
        }
    }

    #[inline]
    pub fn axis(self) -> Option<usize> {
        match self {
            PlaneType::X => Some(0),
            PlaneType::Y => Some(1),
            PlaneType::Z => Some(2),
            PlaneType::NonAxial => None,
        }
    }
}

/// Which side(s) of a plane a box occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoxSide {
    Front,
    Back,
    Both,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CPlane {
    pub normal: Vec3,
    pub dist: f32,
    pub plane_type: PlaneType,
    pub signbits: u8,
}

impl CPlane {
    pub fn new(normal: Vec3, dist: f32) -> Self {
        Self {
            normal,
            dist,
            plane_type: PlaneType::for_normal(&normal),
            signbits: sign_bits(&normal),
        }
    }

    /// Signed distance from the plane, positive in front.
    #[inline]
    pub fn distance(&self, p: &Vec3) -> f32 {
        match self.plane_type.axis() {
            Some(axis) => p[axis] - self.dist,
            None => dot_product(&self.normal, p) - self.dist,
        }
    }

    /// Classify an axis-aligned box against the plane.
    pub fn box_on_side(&self, emins: &Vec3, emaxs: &Vec3) -> BoxSide {
        if let Some(axis) = self.plane_type.axis() {
            if self.dist <= emins[axis] {
                return BoxSide::Front;
            }
            if self.dist >= emaxs[axis] {
                return BoxSide::Back;
            }
            return BoxSide::Both;
        }

        // signbits pick the corner farthest along the normal (dist1) and
        // the one farthest against it (dist2)
        let mut dist1 = 0.0;
        let mut dist2 = 0.0;
        for j in 0..3 {
            let (near, far) = if self.signbits & (1 << j) != 0 {
                (emaxs[j], emins[j])
            } else {
                (emins[j], emaxs[j])
            };
            dist1 += self.normal[j] * far;
            dist2 += self.normal[j] * near;
        }

        match (dist1 >= self.dist, dist2 < self.dist) {
            (true, false) => BoxSide::Front,
            (false, true) => BoxSide::Back,
            _ => BoxSide::Both,
        }
    }
}

pub fn sign_bits(normal: &Vec3) -> u8 {
    let mut bits = 0u8;
    for (j, n) in normal.iter().enumerate() {
        if *n < 0.0 {
            bits |= 1 << j;
        }
    }
    bits
}

// ============================================================
// Tree references, models, surfaces
// ============================================================

/// Child of a BSP node: another node, or a terminal leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeChild {
    Node(usize),
    Leaf(usize),
}

impl NodeChild {
    /// Decode the on-disk form, where negative values are `-(leaf + 1)`.
    pub fn from_raw(raw: i32) -> Self {
        if raw >= 0 {
            NodeChild::Node(raw as usize)
        } else {
            NodeChild::Leaf((-1 - raw) as usize)
        }
    }
}

impl Default for NodeChild {
    fn default() -> Self {
        NodeChild::Leaf(0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CModel {
    pub mins: Vec3,
    pub maxs: Vec3,
    pub origin: Vec3,
    pub headnode: NodeChild,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CSurface {
    pub name: String,
    pub flags: SurfaceFlags,
    pub value: i32,
}

// ============================================================
// Trace
// ============================================================

#[derive(Debug, Clone, PartialEq)]
pub struct Trace {
    /// The whole move was inside solid.
    pub allsolid: bool,
    /// The start point was inside solid.
    pub startsolid: bool,
    /// 1.0 = nothing hit.
    pub fraction: f32,
    pub endpos: Vec3,
    /// Surface normal at impact.
    pub plane: CPlane,
    /// `None` until a brush side stops the move.
    pub surface: Option<CSurface>,
    /// Contents of the brush that stopped the move, not of the leaf holding
    /// `endpos`; empty when nothing was hit.
    pub contents: Contents,
}

impl Default for Trace {
    fn default() -> Self {
        Self {
            allsolid: false,
            startsolid: false,
            fraction: 1.0,
            endpos: VEC3_ORIGIN,
            plane: CPlane::default(),
            surface: None,
            contents: Contents::empty(),
        }
    }
}

impl Trace {
    pub fn hit_something(&self) -> bool {
        self.surface.is_some()
    }
}
