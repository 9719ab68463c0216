// error.rs — map load failures

use thiserror::Error;

/// Why a map image was rejected. The world is left unloaded on any of these.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("couldn't load {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("BSP file too short ({len} bytes)")]
    Truncated { len: usize },

    #[error("not an IBSP file (ident {found:#010x})")]
    BadIdent { found: i32 },

    #[error("wrong version number ({found} should be {expected})")]
    WrongVersion { found: i32, expected: i32 },

    #[error("{lump} lump out of range (offset {offset}, length {len}, file {file_len} bytes)")]
    LumpOutOfRange {
        lump: &'static str,
        offset: i64,
        len: i64,
        file_len: usize,
    },

    #[error("funny lump size ({lump})")]
    FunnyLumpSize { lump: &'static str },

    #[error("map with no {lump}")]
    EmptyLump { lump: &'static str },

    #[error("map has too many {lump} ({count} > {max})")]
    TooMany {
        lump: &'static str,
        count: usize,
        max: usize,
    },

    #[error("map leaf 0 is not CONTENTS_SOLID")]
    LeafZeroNotSolid,

    #[error("bad {what} {index} in {lump} record {record}")]
    BadIndex {
        lump: &'static str,
        record: usize,
        what: &'static str,
        index: i64,
    },

    #[error("node {node} is reachable by more than one path")]
    NotATree { node: usize },

    #[error("bad visibility lump: {0}")]
    BadVisibility(String),
}
