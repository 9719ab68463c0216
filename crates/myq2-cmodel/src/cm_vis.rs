// cm_vis.rs — PVS / PHS storage and decompression

use log::warn;

use crate::endian::{ByteOrder, LumpReader};
use crate::error::LoadError;
use crate::qfiles::{DVIS_PHS, DVIS_PVS};

/// Which per-cluster set to decompress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisKind {
    Pvs,
    Phs,
}

impl VisKind {
    fn slot(self) -> usize {
        match self {
            VisKind::Pvs => DVIS_PVS,
            VisKind::Phs => DVIS_PHS,
        }
    }
}

/// Raw visibility lump plus its decoded offset table.
#[derive(Debug, Clone, Default)]
pub struct VisData {
    data: Vec<u8>,
    /// `[pvs, phs]` byte offsets into `data`, one pair per cluster.
    offsets: Vec<[usize; 2]>,
}

impl VisData {
    /// Decode the lump header. Offsets are checked against the lump so
    /// later decompression never reads out of bounds by construction.
    pub fn parse(lump: &[u8], order: ByteOrder) -> Result<Self, LoadError> {
        if lump.is_empty() {
            return Ok(Self::default());
        }
        if lump.len() < 4 {
            return Err(LoadError::BadVisibility(format!(
                "{} bytes is too short for a header",
                lump.len()
            )));
        }

        let r = LumpReader::new(lump, order);
        let count = r.i32(0);
        if count < 0 {
            return Err(LoadError::BadVisibility(format!("negative cluster count {}", count)));
        }
        let count = count as usize;
        let table_end = 4 + count * 8;
        if table_end > lump.len() {
            return Err(LoadError::BadVisibility(format!(
                "offset table for {} clusters overruns the lump",
                count
            )));
        }

        let mut offsets = Vec::with_capacity(count);
        for c in 0..count {
            let base = 4 + c * 8;
            let mut pair = [0usize; 2];
            for (k, slot) in pair.iter_mut().enumerate() {
                let ofs = r.i32(base + k * 4);
                if ofs < table_end as i32 || ofs as usize >= lump.len() {
                    return Err(LoadError::BadVisibility(format!(
                        "cluster {} offset {} outside the lump",
                        c, ofs
                    )));
                }
                *slot = ofs as usize;
            }
            offsets.push(pair);
        }

        Ok(Self {
            data: lump.to_vec(),
            offsets,
        })
    }

    /// No visibility lump was present; everything is visible.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Cluster count from the lump header (0 when absent).
    pub fn num_clusters(&self) -> usize {
        self.offsets.len()
    }

    /// Decompressed set for `cluster`, `ceil(num_clusters / 8)` bytes.
    pub fn cluster_set(&self, cluster: i32, kind: VisKind, num_clusters: usize) -> Vec<u8> {
        let row = (num_clusters + 7) >> 3;
        if cluster < 0 {
            return vec![0; row];
        }
        if self.is_empty() {
            return vec![0xff; row];
        }
        match self.offsets.get(cluster as usize) {
            Some(pair) => decompress_vis(&self.data[pair[kind.slot()]..], row),
            None => {
                warn!("cluster {} has no visibility row", cluster);
                vec![0; row]
            }
        }
    }
}

/// Run-length decode: a nonzero byte is literal, `0, n` is `n` zero bytes.
pub fn decompress_vis(input: &[u8], row: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(row);
    let mut inp = 0;

    while out.len() < row {
        let Some(&b) = input.get(inp) else {
            warn!("Vis decompression ran out of input");
            break;
        };
        if b != 0 {
            out.push(b);
            inp += 1;
            continue;
        }

        let Some(&n) = input.get(inp + 1) else {
            warn!("Vis decompression ran out of input");
            break;
        };
        inp += 2;
        let mut c = n as usize;
        if out.len() + c > row {
            c = row - out.len();
            warn!("Vis decompression overrun");
        }
        out.resize(out.len() + c, 0);
    }

    out.resize(row, 0);
    out
}

/// True if `cluster`'s bit is set in a decompressed set.
pub fn cluster_visible(bits: &[u8], cluster: i32) -> bool {
    if cluster < 0 {
        return false;
    }
    let c = cluster as usize;
    bits.get(c >> 3).is_some_and(|b| b & (1 << (c & 7)) != 0)
}
