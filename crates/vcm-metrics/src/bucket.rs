//! Job-size bucketing for the Slurm histograms.
//!
//! Bands are power-of-two derived and give roughly log-scale resolution:
//!
//! | index | nodes     |
//! |-------|-----------|
//! | 0     | 1         |
//! | 1     | 2         |
//! | 2     | 3-4       |
//! | 3     | 5-8       |
//! | 4     | 9-16      |
//! | 5     | 17-32     |
//! | 6     | 33-64     |
//! | 7     | 65-128    |
//! | 8     | 129-256   |
//! | 9     | 257 and up|
//!
//! Stored histograms depend on these boundaries; they must not change.

use crate::error::{Error, Result};
use crate::types::HISTOGRAM_BANDS;

/// Exclusive upper bound of bands 0 through 8. Band 9 is unbounded.
const BAND_UPPER_BOUNDS: [i64; HISTOGRAM_BANDS - 1] = [2, 3, 5, 9, 17, 33, 65, 129, 257];

/// Maps a requested node count to its band index in `0..10`.
///
/// # Errors
///
/// Returns `Error::InvalidInput` if `requested_nodes` is zero or negative.
pub fn bucket(requested_nodes: i64) -> Result<usize> {
    if requested_nodes < 1 {
        return Err(Error::invalid_input(format!(
            "requested node count must be positive, got {requested_nodes}"
        )));
    }

    Ok(BAND_UPPER_BOUNDS.partition_point(|&upper| upper <= requested_nodes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use test_case::test_case;

    #[test_case(1, 0)]
    #[test_case(2, 1)]
    #[test_case(3, 2)]
    #[test_case(4, 2)]
    #[test_case(5, 3)]
    #[test_case(8, 3)]
    #[test_case(9, 4)]
    #[test_case(16, 4)]
    #[test_case(17, 5)]
    #[test_case(32, 5)]
    #[test_case(33, 6)]
    #[test_case(64, 6)]
    #[test_case(65, 7)]
    #[test_case(128, 7)]
    #[test_case(129, 8)]
    #[test_case(256, 8)]
    #[test_case(257, 9)]
    #[test_case(1000, 9)]
    #[test_case(i64::MAX, 9)]
    fn band_boundaries(nodes: i64, expected: usize) {
        assert_eq!(bucket(nodes).unwrap(), expected);
    }

    #[test_case(0 ; "zero")]
    #[test_case(-1 ; "negative")]
    #[test_case(i64::MIN ; "minimum")]
    fn non_positive_counts_are_rejected(nodes: i64) {
        let err = bucket(nodes).unwrap_err();
        assert!(matches!(err, Error::InvalidInput { .. }));
    }

    proptest! {
        #[test]
        fn bucket_is_monotonic(a in 1i64..100_000, b in 1i64..100_000) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(bucket(lo).unwrap() <= bucket(hi).unwrap());
        }

        #[test]
        fn bucket_matches_power_of_two_rule(n in 1i64..100_000) {
            // band i holds (2^(i-1), 2^i] for i in 1..9, everything above 256 is band 9
            let expected = if n == 1 {
                0
            } else {
                let bits = 64 - (n - 1).leading_zeros() as usize;
                bits.min(HISTOGRAM_BANDS - 1)
            };
            prop_assert_eq!(bucket(n).unwrap(), expected);
        }
    }
}
