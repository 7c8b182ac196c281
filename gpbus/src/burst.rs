//! Burst segmentation into data-phase chunks

use core::num::NonZeroU32;

/// How a burst is split into data-phase chunks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ChunkPolicy {
    /// The whole burst becomes valid in a single data phase
    Unchunked,
    /// Each data phase adds at most the given number of bytes
    FixedChunk(NonZeroU32),
}

impl ChunkPolicy {
    /// Fixed-size chunks; `None` for a zero chunk size.
    pub const fn fixed(bytes: u32) -> Option<Self> {
        match NonZeroU32::new(bytes) {
            Some(bytes) => Some(ChunkPolicy::FixedChunk(bytes)),
            None => None,
        }
    }
}

impl Default for ChunkPolicy {
    fn default() -> Self {
        ChunkPolicy::Unchunked
    }
}

/// Returns the cumulative valid byte count after the next data phase.
///
/// `already_valid` must not exceed `total_length`. Starting from zero, repeated calls reach
/// `total_length` in `ceil(total_length / chunk)` steps.
pub fn next_chunk(total_length: u32, already_valid: u32, policy: ChunkPolicy) -> u32 {
    debug_assert!(already_valid <= total_length);
    match policy {
        ChunkPolicy::Unchunked => total_length,
        ChunkPolicy::FixedChunk(chunk) => already_valid
            .saturating_add(chunk.get())
            .min(total_length),
    }
}

#[cfg(test)]
mod tests {
    extern crate std;
    use super::*;
    use std::vec::Vec;

    fn steps(total_length: u32, policy: ChunkPolicy) -> Vec<u32> {
        let mut valid = 0;
        let mut steps = Vec::new();
        loop {
            valid = next_chunk(total_length, valid, policy);
            steps.push(valid);
            if valid == total_length {
                return steps;
            }
            assert!(steps.len() <= total_length as usize);
        }
    }

    #[test]
    fn test_unchunked() {
        assert_eq!(steps(20, ChunkPolicy::Unchunked), [20]);
        assert_eq!(steps(1, ChunkPolicy::Unchunked), [1]);
    }

    #[test]
    fn test_fixed_chunk() {
        let policy = ChunkPolicy::fixed(8).unwrap();
        assert_eq!(steps(20, policy), [8, 16, 20]);
        assert_eq!(steps(16, policy), [8, 16]);
        assert_eq!(steps(3, policy), [3]);
    }

    #[test]
    fn test_zero_chunk_rejected() {
        assert_eq!(ChunkPolicy::fixed(0), None);
    }

    #[test]
    fn test_chunk_sequence() {
        for total in 1u32..=100 {
            for chunk in 1u32..=33 {
                let steps = steps(total, ChunkPolicy::fixed(chunk).unwrap());
                assert_eq!(steps.len() as u32, total.div_ceil(chunk));
                assert_eq!(*steps.last().unwrap(), total);
                assert!(steps.windows(2).all(|w| w[0] < w[1]));
                assert!(steps.windows(2).all(|w| w[1] - w[0] <= chunk));
            }
        }
    }

    #[test]
    fn test_saturation() {
        let policy = ChunkPolicy::fixed(u32::MAX).unwrap();
        assert_eq!(next_chunk(u32::MAX, 1, policy), u32::MAX);
    }
}
