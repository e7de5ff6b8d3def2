//! Key hashing.

use crate::layout::HASH_MASK;

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// 64-bit FNV-1a over `bytes`.
#[must_use]
pub fn fnv1a_64(bytes: &[u8]) -> u64 {
    bytes.iter().fold(FNV_OFFSET_BASIS, |hash, &byte| {
        (hash ^ u64::from(byte)).wrapping_mul(FNV_PRIME)
    })
}

/// Slot hash of a key: FNV-1a folded to 32 bits, then masked to 26 bits.
#[must_use]
pub fn key_hash(key: &[u8]) -> u32 {
    let hash = fnv1a_64(key);
    ((hash >> 32) as u32 ^ hash as u32) & HASH_MASK
}
