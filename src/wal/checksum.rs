//! CRC32 checksums for log and data records
//!
//! Every record carries a CRC32 (IEEE) over all of its bytes except the
//! checksum itself. A mismatch is corruption.

use crc32fast::Hasher;

/// Computes a CRC32 checksum over the provided data.
pub fn compute_checksum(data: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(data);
    hasher.finalize()
}

/// Returns `true` if `data` hashes to `expected`.
pub fn verify_checksum(data: &[u8], expected: u32) -> bool {
    compute_checksum(data) == expected
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum_deterministic() {
        let data = b"episode payload";
        assert_eq!(compute_checksum(data), compute_checksum(data));
    }

    #[test]
    fn test_single_bit_flip_detected() {
        let data = b"episode payload".to_vec();
        let checksum = compute_checksum(&data);
        let mut flipped = data.clone();
        flipped[3] ^= 0x01;
        assert!(verify_checksum(&data, checksum));
        assert!(!verify_checksum(&flipped, checksum));
    }
}
