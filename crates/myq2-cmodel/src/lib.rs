#![allow(clippy::too_many_arguments, clippy::float_cmp, clippy::needless_range_loop,
         clippy::manual_range_contains, clippy::comparison_chain)]

pub mod q_shared;
pub mod qfiles;
pub mod endian;
pub mod md4;
pub mod error;
pub mod config;
pub mod cm_tree;
pub mod cm_vis;
pub mod cm_load;
pub mod cm_trace;
pub mod cm_areas;
pub mod cm_boxhull;
pub mod cmodel;

#[cfg(test)]
pub(crate) mod testmap;

pub use cm_load::LoadOptions;
pub use cm_tree::MapData;
pub use cmodel::{CmStats, CollisionWorld, HeadNode};
pub use config::CmConfig;
pub use endian::ByteOrder;
pub use error::LoadError;
pub use q_shared::{CModel, CPlane, CSurface, Contents, NodeChild, SurfaceFlags, Trace, Vec3};
