//! Base-fee projection for the next block.
//!
//! Pure arithmetic, no I/O. The projection follows the EIP-1559 adjustment
//! rule as a piecewise-linear function of the block fill rate: a half-full
//! block keeps the base fee unchanged, an empty block decreases it by the
//! maximum 12.5%, a full block increases it by the maximum 12.5%. The two
//! branches meet at 50% fill with a step up to the increase side.
//!
//! The math is evaluated in gwei (decimal) and the result is rounded to six
//! fractional gwei digits before converting back to an integer wei amount.
//! Rounding at a fixed display precision avoids the precision loss of
//! integer division on intermediate values.

use crate::types::WEI_PER_GWEI;

/// Wei per one millionth of a gwei, the rounding granularity.
const WEI_PER_MICRO_GWEI: u128 = WEI_PER_GWEI / 1_000_000;

/// Projects the next block's base fee from the current base fee (wei) and
/// the current block's gas-used ratio (`[0, 1]`).
///
/// Properties, for any `base_fee > 0`:
/// - `next_base_fee(b, 0.5) == b`
/// - `next_base_fee(b, 0.0) == 0.875 * b`
/// - `next_base_fee(b, 1.0) == 1.125 * b`
/// - monotonically non-decreasing in the ratio.
#[must_use]
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn next_base_fee(base_fee_per_gas: u128, gas_used_ratio: f64) -> u128 {
    let current = base_fee_per_gas as f64 / WEI_PER_GWEI as f64;
    let fill = gas_used_ratio * 100.0;

    let next = if fill <= 50.0 {
        let ratio = 1.0 - fill / 50.0;
        current - current * 0.125 * ratio
    } else {
        let ratio = fill / 100.0;
        current + current * 0.125 * ratio
    };

    // Round to 6 fractional gwei digits, then scale back to wei.
    let micro_gwei = (next * 1_000_000.0).round();
    if micro_gwei <= 0.0 {
        return 0;
    }
    micro_gwei as u128 * WEI_PER_MICRO_GWEI
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEN_GWEI: u128 = 10 * WEI_PER_GWEI;

    #[test]
    fn test_half_full_block_keeps_base_fee() {
        assert_eq!(next_base_fee(TEN_GWEI, 0.5), TEN_GWEI);
        assert_eq!(next_base_fee(WEI_PER_GWEI, 0.5), WEI_PER_GWEI);
        assert_eq!(next_base_fee(500 * WEI_PER_GWEI, 0.5), 500 * WEI_PER_GWEI);
    }

    #[test]
    fn test_empty_block_max_decrease() {
        // 12.5% decrease: 10 gwei -> 8.75 gwei.
        assert_eq!(next_base_fee(TEN_GWEI, 0.0), 8_750_000_000);
    }

    #[test]
    fn test_full_block_max_increase() {
        // 12.5% increase: 10 gwei -> 11.25 gwei.
        assert_eq!(next_base_fee(TEN_GWEI, 1.0), 11_250_000_000);
    }

    #[test]
    fn test_monotonically_non_decreasing() {
        let mut previous = 0;
        for step in 0..=1000 {
            let ratio = f64::from(step) / 1000.0;
            let next = next_base_fee(TEN_GWEI, ratio);
            assert!(
                next >= previous,
                "projection regressed at ratio {ratio}: {next} < {previous}"
            );
            previous = next;
        }
    }

    #[test]
    fn test_branch_boundary_at_half_fill() {
        // The decrease branch owns fill <= 50 and approaches the unchanged
        // base fee; the increase branch starts at +6.25%.
        let below = next_base_fee(TEN_GWEI, 0.499_999);
        assert!(TEN_GWEI - below < WEI_PER_GWEI / 100_000);

        let above = next_base_fee(TEN_GWEI, 0.500_001);
        assert!(above > TEN_GWEI);
        // 10 gwei * (1 + 0.125 * ~0.5) ~= 10.625 gwei.
        assert!((above as i128 - 10_625_000_000_i128).unsigned_abs() < WEI_PER_GWEI / 100_000);
    }

    #[test]
    fn test_rounds_to_micro_gwei() {
        // Results are always whole multiples of 1e-6 gwei (1000 wei).
        for step in 0..100 {
            let ratio = f64::from(step) / 100.0;
            let next = next_base_fee(13_337_777_333, ratio);
            assert_eq!(next % (WEI_PER_GWEI / 1_000_000), 0);
        }
    }

    #[test]
    fn test_zero_base_fee() {
        assert_eq!(next_base_fee(0, 0.0), 0);
        assert_eq!(next_base_fee(0, 1.0), 0);
    }
}
