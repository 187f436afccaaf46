//! JSON-RPC implementation of [`Connection`].
//!
//! Queries go over HTTP POST. The block feed prefers a WebSocket
//! `newHeads` subscription when the endpoint has one, falling back to
//! polling `eth_blockNumber` at a fixed cadence. Either way the feed runs
//! as a single background task that is started by the first
//! [`on_block`](Connection::on_block) and stopped by
//! [`off_block`](Connection::off_block).

use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;

use crate::{
    connection::{BlockListener, Connection},
    error::{ConnectionError, ResolveError},
    networks,
    types::{
        format_quantity, parse_quantity_u128, parse_quantity_u64, BlockGasInfo, FeeData, Network,
        WEI_PER_GWEI,
    },
};

/// Priority fee assumed when the node does not expose
/// `eth_maxPriorityFeePerGas` (1.5 gwei).
const FALLBACK_PRIORITY_FEE: u128 = WEI_PER_GWEI + WEI_PER_GWEI / 2;

/// Delay before reconnecting a dropped WebSocket feed.
const WS_RECONNECT_DELAY: Duration = Duration::from_secs(2);

/// Time allowed to establish a TCP connection to the endpoint.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Total time allowed for one JSON-RPC round trip. A node that accepts the
/// connection but never answers surfaces as a transport error instead of
/// pending forever.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(45);

/// Endpoint details shared between query calls and the feed task.
struct Endpoint {
    http_url: String,
    ws_url: Option<String>,
    /// HTTP basic-auth credentials, `(username, password)`.
    auth: Option<(String, String)>,
    client: reqwest::Client,
    poll_interval: Duration,
    next_id: AtomicU64,
    listener: Mutex<Option<Arc<BlockListener>>>,
}

impl Endpoint {
    async fn request(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<serde_json::Value, ConnectionError> {
        let body = serde_json::json!({
            "jsonrpc": "2.0",
            "id": self.next_id.fetch_add(1, Ordering::Relaxed),
            "method": method,
            "params": params,
        });

        let mut req = self.client.post(&self.http_url).json(&body);
        if let Some((user, password)) = &self.auth {
            req = req.basic_auth(user, Some(password));
        }

        let response: serde_json::Value = req.send().await?.json().await?;

        if let Some(error) = response.get("error") {
            let code = error.get("code").and_then(serde_json::Value::as_i64).unwrap_or(0);
            let message = error
                .get("message")
                .and_then(serde_json::Value::as_str)
                .unwrap_or("unknown rpc error")
                .to_string();
            return Err(ConnectionError::Rpc { code, message });
        }

        response
            .get("result")
            .cloned()
            .ok_or_else(|| ConnectionError::InvalidResponse(format!("{method}: no result field")))
    }

    fn emit(&self, block_number: u64) {
        let listener = self.listener.lock().clone();
        if let Some(listener) = listener {
            listener(block_number);
        }
    }
}

/// A JSON-RPC node connection.
pub struct RpcConnection {
    endpoint: Arc<Endpoint>,
    /// Network identity known at construction, sparing a chain-id round
    /// trip for named and managed-provider specs.
    known_network: Option<Network>,
    feed_task: Mutex<Option<JoinHandle<()>>>,
}

impl RpcConnection {
    /// Creates a connection against `http_url`, optionally with a
    /// WebSocket feed URL and basic-auth credentials.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client fails to build.
    pub fn new(
        http_url: String,
        ws_url: Option<String>,
        auth: Option<(String, String)>,
        known_network: Option<Network>,
        poll_interval: Duration,
    ) -> Result<Self, ResolveError> {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| {
                tracing::error!(error = %e, "failed to build http client");
                ResolveError::ClientBuild(e.to_string())
            })?;

        Ok(Self {
            endpoint: Arc::new(Endpoint {
                http_url,
                ws_url,
                auth,
                client,
                poll_interval,
                next_id: AtomicU64::new(1),
                listener: Mutex::new(None),
            }),
            known_network,
            feed_task: Mutex::new(None),
        })
    }

    async fn run_feed(endpoint: Arc<Endpoint>) {
        loop {
            if let Some(ws_url) = endpoint.ws_url.clone() {
                if let Err(e) = Self::run_websocket_feed(&endpoint, &ws_url).await {
                    tracing::warn!(ws_url = ws_url, error = %e, "block feed dropped");
                }
                tokio::time::sleep(WS_RECONNECT_DELAY).await;
            } else {
                Self::run_polling_feed(&endpoint).await;
            }
        }
    }

    /// Subscribes to `newHeads` and emits each notified block number.
    ///
    /// Returns when the stream closes or errors; the caller reconnects.
    async fn run_websocket_feed(
        endpoint: &Arc<Endpoint>,
        ws_url: &str,
    ) -> Result<(), ConnectionError> {
        tracing::debug!(ws_url = ws_url, "connecting block feed websocket");

        let (ws_stream, _) = tokio_tungstenite::connect_async(ws_url)
            .await
            .map_err(|e| ConnectionError::InvalidResponse(format!("websocket connect: {e}")))?;
        let (mut write, mut read) = ws_stream.split();

        let subscribe_msg = serde_json::json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "eth_subscribe",
            "params": ["newHeads"],
        });
        write
            .send(Message::Text(subscribe_msg.to_string().into()))
            .await
            .map_err(|e| ConnectionError::InvalidResponse(format!("websocket send: {e}")))?;

        while let Some(msg) = read.next().await {
            match msg {
                Ok(Message::Text(text)) => {
                    if let Some(block_number) = parse_new_heads_number(&text) {
                        endpoint.emit(block_number);
                    }
                }
                Ok(Message::Close(_)) => {
                    tracing::warn!(ws_url = ws_url, "block feed websocket closed");
                    break;
                }
                Err(e) => {
                    return Err(ConnectionError::InvalidResponse(format!("websocket read: {e}")));
                }
                _ => {}
            }
        }

        Ok(())
    }

    /// Polls `eth_blockNumber` and emits every block past the first
    /// observation. The first poll only records a baseline so a restart
    /// does not replay history.
    async fn run_polling_feed(endpoint: &Arc<Endpoint>) {
        let mut last_seen: Option<u64> = None;

        loop {
            match endpoint.request("eth_blockNumber", serde_json::json!([])).await {
                Ok(result) => {
                    let number = result.as_str().and_then(parse_quantity_u64);
                    match (number, last_seen) {
                        (Some(current), Some(previous)) if current > previous => {
                            for block_number in previous + 1..=current {
                                endpoint.emit(block_number);
                            }
                            last_seen = Some(current);
                        }
                        (Some(current), None) => last_seen = Some(current),
                        _ => {}
                    }
                }
                Err(e) => {
                    tracing::warn!(url = endpoint.http_url, error = %e, "block poll failed");
                }
            }

            tokio::time::sleep(endpoint.poll_interval).await;
        }
    }
}

#[async_trait]
impl Connection for RpcConnection {
    async fn network(&self) -> Result<Network, ConnectionError> {
        if let Some(network) = &self.known_network {
            return Ok(network.clone());
        }

        let result = self.endpoint.request("eth_chainId", serde_json::json!([])).await?;
        let chain_id = result
            .as_str()
            .and_then(parse_quantity_u64)
            .ok_or_else(|| ConnectionError::InvalidResponse(format!("bad chain id: {result}")))?;
        Ok(networks::identify(chain_id))
    }

    async fn fee_data(&self) -> Result<FeeData, ConnectionError> {
        let latest = self
            .endpoint
            .request("eth_getBlockByNumber", serde_json::json!(["latest", false]))
            .await?;
        let base_fee = latest
            .get("baseFeePerGas")
            .and_then(serde_json::Value::as_str)
            .and_then(parse_quantity_u128);

        // Sub-queries degrade to None instead of failing the whole call.
        let gas_price = match self.endpoint.request("eth_gasPrice", serde_json::json!([])).await {
            Ok(v) => v.as_str().and_then(parse_quantity_u128),
            Err(e) => {
                tracing::debug!(error = %e, "eth_gasPrice unavailable");
                None
            }
        };

        let priority = match self
            .endpoint
            .request("eth_maxPriorityFeePerGas", serde_json::json!([]))
            .await
        {
            Ok(v) => v.as_str().and_then(parse_quantity_u128),
            Err(e) => {
                tracing::debug!(error = %e, "eth_maxPriorityFeePerGas unavailable");
                None
            }
        };

        Ok(compose_fee_data(base_fee, gas_price, priority))
    }

    async fn block(&self, number: u64) -> Result<BlockGasInfo, ConnectionError> {
        let result = self
            .endpoint
            .request(
                "eth_getBlockByNumber",
                serde_json::json!([format_quantity(u128::from(number)), false]),
            )
            .await?;

        if result.is_null() {
            return Err(ConnectionError::InvalidResponse(format!("no such block: {number}")));
        }
        parse_block_gas_info(&result)
            .ok_or_else(|| ConnectionError::InvalidResponse(format!("malformed block {number}")))
    }

    fn on_block(&self, listener: BlockListener) {
        *self.endpoint.listener.lock() = Some(Arc::new(listener));

        let mut feed_task = self.feed_task.lock();
        if feed_task.is_none() {
            let endpoint = Arc::clone(&self.endpoint);
            *feed_task = Some(tokio::spawn(Self::run_feed(endpoint)));
        }
    }

    fn off_block(&self) {
        *self.endpoint.listener.lock() = None;
        if let Some(task) = self.feed_task.lock().take() {
            task.abort();
        }
    }

    fn listener_count(&self) -> usize {
        usize::from(self.endpoint.listener.lock().is_some())
    }
}

impl Drop for RpcConnection {
    fn drop(&mut self) {
        if let Some(task) = self.feed_task.lock().take() {
            task.abort();
        }
    }
}

/// Extracts the block number from a `newHeads` notification, ignoring
/// subscription confirmations and unrelated frames.
fn parse_new_heads_number(text: &str) -> Option<u64> {
    let json: serde_json::Value = serde_json::from_str(text).ok()?;

    // Subscription confirmation carries a string result at the top level.
    if json.get("result").is_some_and(serde_json::Value::is_string) {
        return None;
    }

    json.get("params")?
        .get("result")?
        .get("number")?
        .as_str()
        .and_then(parse_quantity_u64)
}

/// Combines raw fee queries the way common provider libraries do: when a
/// base fee exists, the fee ceiling is twice the base fee plus the
/// priority fee, defaulting the priority fee to 1.5 gwei.
fn compose_fee_data(
    base_fee: Option<u128>,
    gas_price: Option<u128>,
    priority: Option<u128>,
) -> FeeData {
    match base_fee {
        Some(base) => {
            let priority = priority.unwrap_or(FALLBACK_PRIORITY_FEE);
            FeeData {
                gas_price,
                max_fee_per_gas: Some(base * 2 + priority),
                max_priority_fee_per_gas: Some(priority),
            }
        }
        None => FeeData { gas_price, max_fee_per_gas: None, max_priority_fee_per_gas: None },
    }
}

fn parse_block_gas_info(block: &serde_json::Value) -> Option<BlockGasInfo> {
    let gas_used = block.get("gasUsed")?.as_str().and_then(parse_quantity_u64)?;
    let gas_limit = block.get("gasLimit")?.as_str().and_then(parse_quantity_u64)?;
    let base_fee_per_gas = block
        .get("baseFeePerGas")
        .and_then(serde_json::Value::as_str)
        .and_then(parse_quantity_u128);

    Some(BlockGasInfo { base_fee_per_gas, gas_used, gas_limit })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_new_heads_number() {
        let notification = serde_json::json!({
            "jsonrpc": "2.0",
            "method": "eth_subscription",
            "params": {
                "subscription": "0x9ce59a13059e417087c02d3236a0b9cc",
                "result": {
                    "number": "0x1234",
                    "baseFeePerGas": "0x7",
                    "gasUsed": "0x0",
                    "gasLimit": "0x1c9c380"
                }
            }
        });

        assert_eq!(parse_new_heads_number(&notification.to_string()), Some(0x1234));
    }

    #[test]
    fn test_parse_new_heads_skips_confirmation() {
        let confirmation = serde_json::json!({
            "jsonrpc": "2.0",
            "id": 1,
            "result": "0x9ce59a13059e417087c02d3236a0b9cc"
        });

        assert_eq!(parse_new_heads_number(&confirmation.to_string()), None);
    }

    #[test]
    fn test_parse_new_heads_malformed() {
        assert_eq!(parse_new_heads_number("not json"), None);
        assert_eq!(parse_new_heads_number("{}"), None);
        assert_eq!(
            parse_new_heads_number(&serde_json::json!({"params": {}}).to_string()),
            None
        );
    }

    #[test]
    fn test_compose_fee_data_eip1559() {
        let base = 10 * WEI_PER_GWEI;
        let data = compose_fee_data(Some(base), Some(11 * WEI_PER_GWEI), Some(2 * WEI_PER_GWEI));

        assert_eq!(data.max_priority_fee_per_gas, Some(2 * WEI_PER_GWEI));
        assert_eq!(data.max_fee_per_gas, Some(22 * WEI_PER_GWEI));
        assert_eq!(data.gas_price, Some(11 * WEI_PER_GWEI));
    }

    #[test]
    fn test_compose_fee_data_priority_fallback() {
        let base = 10 * WEI_PER_GWEI;
        let data = compose_fee_data(Some(base), None, None);

        assert_eq!(data.max_priority_fee_per_gas, Some(FALLBACK_PRIORITY_FEE));
        assert_eq!(data.max_fee_per_gas, Some(2 * base + FALLBACK_PRIORITY_FEE));
        assert_eq!(data.gas_price, None);
    }

    #[test]
    fn test_compose_fee_data_legacy_chain() {
        let data = compose_fee_data(None, Some(5 * WEI_PER_GWEI), None);

        assert_eq!(data.gas_price, Some(5 * WEI_PER_GWEI));
        assert_eq!(data.max_fee_per_gas, None);
        assert_eq!(data.max_priority_fee_per_gas, None);
    }

    #[test]
    fn test_parse_block_gas_info() {
        let block = serde_json::json!({
            "number": "0x1234",
            "baseFeePerGas": "0x2540be400",
            "gasUsed": "0xe4e1c0",
            "gasLimit": "0x1c9c380"
        });

        let info = parse_block_gas_info(&block).expect("well-formed block");
        assert_eq!(info.base_fee_per_gas, Some(10 * WEI_PER_GWEI));
        assert_eq!(info.gas_used, 15_000_000);
        assert_eq!(info.gas_limit, 30_000_000);
    }

    #[test]
    fn test_parse_block_gas_info_pre_eip1559() {
        let block = serde_json::json!({
            "number": "0x10",
            "gasUsed": "0x0",
            "gasLimit": "0x1c9c380"
        });

        let info = parse_block_gas_info(&block).expect("legacy block");
        assert_eq!(info.base_fee_per_gas, None);
        assert_eq!(info.gas_used_ratio(), 0.0);
    }

    #[test]
    fn test_parse_block_gas_info_missing_fields() {
        assert!(parse_block_gas_info(&serde_json::json!({})).is_none());
        assert!(parse_block_gas_info(&serde_json::json!({"gasUsed": "0x0"})).is_none());
    }

    #[tokio::test]
    async fn test_known_network_needs_no_round_trip() {
        let conn = RpcConnection::new(
            "http://localhost:1".to_string(),
            None,
            None,
            Some(Network { name: "mainnet".to_string(), chain_id: 1 }),
            Duration::from_secs(4),
        )
        .expect("client builds");

        let network = conn.network().await.expect("local identity");
        assert_eq!(network.chain_id, 1);
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_surfaces_transport_error() {
        let conn = RpcConnection::new(
            "http://127.0.0.1:1".to_string(),
            None,
            None,
            None,
            Duration::from_secs(4),
        )
        .expect("client builds");

        // No identity known locally, so this must hit the wire and fail
        // with a bounded transport error rather than pending.
        let err = conn.network().await.expect_err("nothing listens on port 1");
        assert!(matches!(err, ConnectionError::Transport(_)), "{err}");
    }

    #[tokio::test]
    async fn test_listener_replacement_and_removal() {
        let conn = RpcConnection::new(
            "http://localhost:1".to_string(),
            None,
            None,
            None,
            Duration::from_secs(3600),
        )
        .expect("client builds");
        assert_eq!(conn.listener_count(), 0);

        conn.on_block(Box::new(|_| {}));
        assert_eq!(conn.listener_count(), 1);

        // A second registration replaces, never stacks.
        conn.on_block(Box::new(|_| {}));
        assert_eq!(conn.listener_count(), 1);

        conn.off_block();
        assert_eq!(conn.listener_count(), 0);
        conn.off_block();
        assert_eq!(conn.listener_count(), 0);
    }
}
