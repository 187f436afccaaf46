//! Core type definitions for networks, fee data, and block summaries.
//!
//! # Amount Representation
//!
//! All fee amounts are integers denominated in wei. The concrete type is
//! `u128`, which comfortably holds any realistic wei value; amounts are
//! never represented as floating point at an API boundary. The base-fee
//! projection in [`crate::basefee`] converts to gwei internally and rounds
//! back to an integer wei amount.
//!
//! # Hex Quantities
//!
//! Ethereum JSON-RPC encodes quantities as 0x-prefixed hex strings.
//! [`parse_quantity_u64`] and [`parse_quantity_u128`] accept both prefixed
//! and bare hex, mirroring how lenient upstream providers are in practice.

use serde::Serialize;

/// Number of wei in one gwei.
pub const WEI_PER_GWEI: u128 = 1_000_000_000;

/// Identity of the network a connection is attached to.
///
/// Equality is defined by `chain_id` alone: two connections to mainnet via
/// different providers describe the same network even if one labels it
/// `"homestead"` and the other `"mainnet"`.
#[derive(Debug, Clone, Serialize)]
pub struct Network {
    /// Human-readable network name (e.g., "mainnet", "sepolia", "unknown").
    pub name: String,
    /// Chain id uniquely identifying the network (1 for mainnet).
    pub chain_id: u64,
}

impl PartialEq for Network {
    fn eq(&self, other: &Self) -> bool {
        self.chain_id == other.chain_id
    }
}

impl Eq for Network {}

impl std::fmt::Display for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (chain {})", self.name, self.chain_id)
    }
}

/// Recommended fee tuple for the next block, all amounts in wei.
///
/// Produced by the fee aggregator on every observed block. Missing inputs
/// default to zero rather than failing the aggregation (see
/// [`crate::aggregator`]).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FeeSuggestion {
    /// Projected base fee for the next block.
    pub base_fee_per_gas: u128,
    /// Suggested priority fee (tip).
    pub max_priority_fee_per_gas: u128,
    /// Suggested fee ceiling.
    pub max_fee_per_gas: u128,
}

/// Immutable summary of a single observed block.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BlockSummary {
    pub block_number: u64,
    /// Base fee of the block in wei; zero on pre-EIP-1559 chains.
    pub base_fee_per_gas: u128,
    /// `gas_used / gas_limit`, in `[0, 1]`.
    pub gas_used_ratio: f64,
}

/// Mempool-level fee data as reported by the node.
///
/// All fields are optional: pre-EIP-1559 chains report no max fees, and
/// individual sub-queries may fail without invalidating the rest.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeeData {
    /// Legacy gas price, carried for completeness.
    pub gas_price: Option<u128>,
    pub max_fee_per_gas: Option<u128>,
    pub max_priority_fee_per_gas: Option<u128>,
}

/// Gas accounting fields of a fetched block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockGasInfo {
    /// Base fee in wei; `None` on pre-EIP-1559 chains.
    pub base_fee_per_gas: Option<u128>,
    pub gas_used: u64,
    pub gas_limit: u64,
}

impl BlockGasInfo {
    /// Returns `gas_used / gas_limit`, or `0.0` for a zero gas limit.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn gas_used_ratio(&self) -> f64 {
        if self.gas_limit == 0 {
            return 0.0;
        }
        self.gas_used as f64 / self.gas_limit as f64
    }
}

/// Parses a hex quantity (with or without `0x` prefix) into a `u64`.
///
/// Returns `None` for empty or malformed input.
#[must_use]
pub fn parse_quantity_u64(value: &str) -> Option<u64> {
    let digits = value.strip_prefix("0x").unwrap_or(value);
    if digits.is_empty() {
        return None;
    }
    u64::from_str_radix(digits, 16).ok()
}

/// Parses a hex quantity (with or without `0x` prefix) into a `u128`.
///
/// Wei amounts such as `baseFeePerGas` can exceed `u64`; this is the
/// variant used for fee fields.
#[must_use]
pub fn parse_quantity_u128(value: &str) -> Option<u128> {
    let digits = value.strip_prefix("0x").unwrap_or(value);
    if digits.is_empty() {
        return None;
    }
    u128::from_str_radix(digits, 16).ok()
}

/// Formats a wei amount as hex with `0x` prefix. Zero becomes `0x0`.
#[must_use]
pub fn format_quantity(value: u128) -> String {
    format!("0x{value:x}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_equality_by_chain_id() {
        let a = Network { name: "homestead".to_string(), chain_id: 1 };
        let b = Network { name: "mainnet".to_string(), chain_id: 1 };
        let c = Network { name: "mainnet".to_string(), chain_id: 5 };

        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_gas_used_ratio() {
        let info = BlockGasInfo {
            base_fee_per_gas: Some(10 * WEI_PER_GWEI),
            gas_used: 15_000_000,
            gas_limit: 30_000_000,
        };
        assert!((info.gas_used_ratio() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_gas_used_ratio_zero_limit() {
        let info = BlockGasInfo { base_fee_per_gas: None, gas_used: 0, gas_limit: 0 };
        assert_eq!(info.gas_used_ratio(), 0.0);
    }

    #[test]
    fn test_parse_quantity_u64() {
        assert_eq!(parse_quantity_u64("0x0"), Some(0));
        assert_eq!(parse_quantity_u64("0x1"), Some(1));
        assert_eq!(parse_quantity_u64("0xff"), Some(255));
        assert_eq!(parse_quantity_u64("100"), Some(256));
        assert_eq!(parse_quantity_u64("0x00100"), Some(256));
    }

    #[test]
    fn test_parse_quantity_invalid() {
        assert_eq!(parse_quantity_u64(""), None);
        assert_eq!(parse_quantity_u64("0x"), None);
        assert_eq!(parse_quantity_u64("0xzz"), None);
        assert_eq!(parse_quantity_u128("not_hex"), None);
    }

    #[test]
    fn test_parse_quantity_u128_large() {
        // 500 gwei in wei does not fit cleanly in u32 but well within u128.
        assert_eq!(parse_quantity_u128("0x746a528800"), Some(500 * WEI_PER_GWEI));
    }

    #[test]
    fn test_format_quantity() {
        assert_eq!(format_quantity(0), "0x0");
        assert_eq!(format_quantity(255), "0xff");
        assert_eq!(parse_quantity_u128(&format_quantity(500 * WEI_PER_GWEI)), Some(500 * WEI_PER_GWEI));
    }
}
