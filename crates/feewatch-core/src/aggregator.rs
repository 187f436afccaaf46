//! Per-block fee aggregation.
//!
//! For every observed block the aggregator fetches the block's gas
//! accounting and the node's fee data concurrently, then folds them into a
//! [`FeeSuggestion`] and a [`BlockSummary`]. Aggregation never fails: any
//! fetch error is logged and the affected fields default to zero, so a
//! transient provider hiccup degrades one sample instead of wedging the
//! subscription.

use std::sync::Arc;

use crate::{
    basefee::next_base_fee,
    connection::Connection,
    types::{BlockSummary, FeeSuggestion},
};

/// Fetches and folds fee inputs for `block_number`.
pub async fn aggregate(
    connection: &Arc<dyn Connection>,
    block_number: u64,
) -> (FeeSuggestion, BlockSummary) {
    let (block, fee_data) =
        tokio::join!(connection.block(block_number), connection.fee_data());

    let (base_fee_per_gas, gas_used_ratio) = match block {
        Ok(info) => (info.base_fee_per_gas.unwrap_or(0), info.gas_used_ratio()),
        Err(e) => {
            tracing::warn!(block_number = block_number, error = %e, "block fetch failed");
            (0, 0.0)
        }
    };

    let fee_data = match fee_data {
        Ok(data) => data,
        Err(e) => {
            tracing::warn!(block_number = block_number, error = %e, "fee data fetch failed");
            Default::default()
        }
    };

    let projected_base_fee = if base_fee_per_gas == 0 {
        0
    } else {
        next_base_fee(base_fee_per_gas, gas_used_ratio)
    };

    let suggestion = FeeSuggestion {
        base_fee_per_gas: projected_base_fee,
        max_priority_fee_per_gas: fee_data.max_priority_fee_per_gas.unwrap_or(0),
        max_fee_per_gas: fee_data.max_fee_per_gas.unwrap_or(0),
    };
    let summary = BlockSummary { block_number, base_fee_per_gas, gas_used_ratio };

    tracing::debug!(
        block_number = block_number,
        base_fee_per_gas = base_fee_per_gas,
        gas_used_ratio = gas_used_ratio,
        projected_base_fee = projected_base_fee,
        "aggregated block"
    );

    (suggestion, summary)
}
