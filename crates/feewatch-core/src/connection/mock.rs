//! In-memory [`Connection`] used by engine, aggregator, and subscription
//! tests. Blocks are emitted manually via [`MockConnection::emit_block`].

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::{
    connection::{BlockListener, Connection},
    error::ConnectionError,
    types::{BlockGasInfo, FeeData, Network, WEI_PER_GWEI},
};

pub(crate) struct MockConnection {
    network: Network,
    fee_data: Mutex<FeeData>,
    blocks: Mutex<HashMap<u64, BlockGasInfo>>,
    listener: Mutex<Option<Arc<BlockListener>>>,
}

impl MockConnection {
    pub(crate) fn new(name: &str, chain_id: u64) -> Arc<Self> {
        Arc::new(Self {
            network: Network { name: name.to_string(), chain_id },
            fee_data: Mutex::new(FeeData {
                gas_price: Some(12 * WEI_PER_GWEI),
                max_fee_per_gas: Some(22 * WEI_PER_GWEI),
                max_priority_fee_per_gas: Some(2 * WEI_PER_GWEI),
            }),
            blocks: Mutex::new(HashMap::new()),
            listener: Mutex::new(None),
        })
    }

    pub(crate) fn mainnet() -> Arc<Self> {
        Self::new("mainnet", 1)
    }

    pub(crate) fn set_fee_data(&self, fee_data: FeeData) {
        *self.fee_data.lock() = fee_data;
    }

    /// Registers a block so that `block(number)` succeeds for it.
    pub(crate) fn add_block(&self, number: u64, base_fee_gwei: u128, gas_used_ratio: f64) {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let gas_used = (30_000_000.0 * gas_used_ratio) as u64;
        self.blocks.lock().insert(
            number,
            BlockGasInfo {
                base_fee_per_gas: Some(base_fee_gwei * WEI_PER_GWEI),
                gas_used,
                gas_limit: 30_000_000,
            },
        );
    }

    /// Invokes the attached listener (if any) with `number`.
    pub(crate) fn emit_block(&self, number: u64) {
        let listener = self.listener.lock().clone();
        if let Some(listener) = listener {
            listener(number);
        }
    }
}

#[async_trait]
impl Connection for MockConnection {
    async fn network(&self) -> Result<Network, ConnectionError> {
        Ok(self.network.clone())
    }

    async fn fee_data(&self) -> Result<FeeData, ConnectionError> {
        Ok(*self.fee_data.lock())
    }

    async fn block(&self, number: u64) -> Result<BlockGasInfo, ConnectionError> {
        self.blocks
            .lock()
            .get(&number)
            .copied()
            .ok_or_else(|| ConnectionError::InvalidResponse(format!("no such block: {number}")))
    }

    fn on_block(&self, listener: BlockListener) {
        *self.listener.lock() = Some(Arc::new(listener));
    }

    fn off_block(&self) {
        *self.listener.lock() = None;
    }

    fn listener_count(&self) -> usize {
        usize::from(self.listener.lock().is_some())
    }
}
