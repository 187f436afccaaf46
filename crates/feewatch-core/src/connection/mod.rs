//! Node connections: the trait the engine talks through, the resolver that
//! builds connections from declarative specs, and the JSON-RPC
//! implementation.

pub mod resolver;
pub mod rpc;

#[cfg(test)]
pub(crate) mod mock;

use async_trait::async_trait;

use crate::{
    error::ConnectionError,
    types::{BlockGasInfo, FeeData, Network},
};

/// Callback invoked with each newly observed block number.
pub type BlockListener = Box<dyn Fn(u64) + Send + Sync>;

/// A live connection to an Ethereum-compatible node.
///
/// At most one block listener is attached at a time; registering a new one
/// replaces the previous listener. The subscription controller relies on
/// this to guarantee it is the sole consumer of block notifications.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Reports the identity of the network this connection is attached to.
    ///
    /// # Errors
    ///
    /// Returns an error if the node cannot be reached or responds with a
    /// malformed chain id.
    async fn network(&self) -> Result<Network, ConnectionError>;

    /// Fetches current mempool-level fee data from the node.
    ///
    /// # Errors
    ///
    /// Returns an error only when the latest block itself cannot be
    /// fetched; individual fee sub-queries degrade to `None` fields.
    async fn fee_data(&self) -> Result<FeeData, ConnectionError>;

    /// Fetches the gas accounting fields of the given block.
    ///
    /// # Errors
    ///
    /// Returns an error if the round trip fails or the block is unknown.
    async fn block(&self, number: u64) -> Result<BlockGasInfo, ConnectionError>;

    /// Attaches `listener` as the connection's sole block listener,
    /// starting the block feed if it was not already running.
    fn on_block(&self, listener: BlockListener);

    /// Detaches the block listener and stops the block feed.
    ///
    /// Idempotent; detaching with no listener attached is a no-op.
    fn off_block(&self);

    /// Number of currently attached block listeners (zero or one).
    fn listener_count(&self) -> usize;
}
