/// Seed of the palette hash; also the hash of "no palette".
pub const PALETTE_HASH_SEED: u32 = 0xC0DE_BABE;

/// Only the first bytes of a palette are checked.
pub const PALETTE_HASH_BYTES: usize = 16;

/// Rolling hash over the first [`PALETTE_HASH_BYTES`] bytes of `palette`.
pub fn palette_hash(palette: &[u8]) -> u32 {
    palette
        .iter()
        .take(PALETTE_HASH_BYTES)
        .fold(PALETTE_HASH_SEED, |h, &b| (h.rotate_left(13) ^ b as u32).wrapping_add(31))
}
