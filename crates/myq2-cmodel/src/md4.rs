// md4.rs — map checksum
//
// Clients compare this value against the server's to detect a different map
// file with the same name.

use md4::{Digest, Md4};

/// XOR of the four little-endian words of the MD4 digest of `data`.
pub fn com_block_checksum(data: &[u8]) -> u32 {
    let digest = Md4::digest(data);
    digest
        .chunks_exact(4)
        .map(|w| u32::from_le_bytes([w[0], w[1], w[2], w[3]]))
        .fold(0, |acc, w| acc ^ w)
}
