//! Turns declarative connection specs into live connections.
//!
//! A [`ConnectionSpec`] describes where to connect without performing any
//! I/O: a named network, a raw endpoint URL, or a managed-infrastructure
//! descriptor (Infura, Alchemy). Resolution validates the spec and builds
//! an [`RpcConnection`], but never touches the network, so invalid specs
//! fail fast and deterministically.

use std::{sync::Arc, time::Duration};

use crate::{
    connection::{rpc::RpcConnection, Connection},
    error::ResolveError,
    networks::{self, KnownNetwork, DEFAULT_CHAIN_ID},
};

/// Default polling cadence when the endpoint has no WebSocket feed.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(4);

/// Reference to a known network, by name or by chain id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkRef {
    Name(String),
    ChainId(u64),
}

impl NetworkRef {
    fn lookup(&self) -> Result<&'static KnownNetwork, ResolveError> {
        match self {
            NetworkRef::Name(name) => networks::by_name(name)
                .ok_or_else(|| ResolveError::UnknownNetwork(name.clone())),
            NetworkRef::ChainId(chain_id) => networks::by_chain_id(*chain_id)
                .ok_or_else(|| ResolveError::UnknownNetwork(format!("chain {chain_id}"))),
        }
    }
}

/// Declarative description of how to reach a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionSpec {
    /// Default public endpoint for Ethereum mainnet.
    Default,
    /// Default public endpoint for a named network.
    Named(NetworkRef),
    /// Explicit JSON-RPC endpoint URL (`http://`, `https://`, `ws://`,
    /// or `wss://`).
    Url { url: String },
    /// Infura project endpoint for a named network.
    Infura {
        network: NetworkRef,
        project_id: String,
        project_secret: Option<String>,
    },
    /// Alchemy application endpoint for a named network.
    Alchemy { network: NetworkRef, api_key: String },
}

/// Resolves a spec into a connection.
///
/// The returned connection knows its network identity locally whenever the
/// spec names a known network, so reporting it needs no round trip.
///
/// # Errors
///
/// Returns [`ResolveError`] for unknown networks, malformed URLs, missing
/// credentials, a managed provider that does not serve the network, or a
/// failure to build the HTTP client.
pub fn resolve(
    spec: &ConnectionSpec,
    poll_interval: Duration,
) -> Result<Arc<dyn Connection>, ResolveError> {
    let connection = match spec {
        ConnectionSpec::Default => {
            let known = NetworkRef::ChainId(DEFAULT_CHAIN_ID).lookup()?;
            from_known(known, known.rpc_url.to_string(), poll_interval)?
        }
        ConnectionSpec::Named(network) => {
            let known = network.lookup()?;
            from_known(known, known.rpc_url.to_string(), poll_interval)?
        }
        ConnectionSpec::Url { url } => {
            let (http_url, ws_url) = split_endpoint_url(url)?;
            RpcConnection::new(http_url, ws_url, None, None, poll_interval)?
        }
        ConnectionSpec::Infura { network, project_id, project_secret } => {
            if project_id.trim().is_empty() {
                return Err(ResolveError::MissingCredential("infura project id"));
            }
            let known = network.lookup()?;
            let host = known.infura_host.ok_or_else(|| {
                ResolveError::UnknownNetwork(format!("{} is not served by infura", known.name))
            })?;
            let auth = project_secret
                .as_deref()
                .filter(|s| !s.trim().is_empty())
                .map(|secret| (String::new(), secret.to_string()));
            RpcConnection::new(
                format!("https://{host}.infura.io/v3/{project_id}"),
                Some(format!("wss://{host}.infura.io/ws/v3/{project_id}")),
                auth,
                Some(networks::identify(known.chain_id)),
                poll_interval,
            )?
        }
        ConnectionSpec::Alchemy { network, api_key } => {
            if api_key.trim().is_empty() {
                return Err(ResolveError::MissingCredential("alchemy api key"));
            }
            let known = network.lookup()?;
            let host = known.alchemy_host.ok_or_else(|| {
                ResolveError::UnknownNetwork(format!("{} is not served by alchemy", known.name))
            })?;
            RpcConnection::new(
                format!("https://{host}.g.alchemy.com/v2/{api_key}"),
                Some(format!("wss://{host}.g.alchemy.com/v2/{api_key}")),
                None,
                Some(networks::identify(known.chain_id)),
                poll_interval,
            )?
        }
    };

    Ok(Arc::new(connection))
}

fn from_known(
    known: &'static KnownNetwork,
    http_url: String,
    poll_interval: Duration,
) -> Result<RpcConnection, ResolveError> {
    RpcConnection::new(
        http_url,
        None,
        None,
        Some(networks::identify(known.chain_id)),
        poll_interval,
    )
}

/// Validates an endpoint URL and splits it into HTTP and WebSocket halves.
///
/// An `http(s)://` URL yields no WebSocket feed; a `ws(s)://` URL is used
/// for the feed and converted to its HTTP counterpart for queries, which
/// is how most providers expose paired endpoints.
fn split_endpoint_url(url: &str) -> Result<(String, Option<String>), ResolveError> {
    let url = url.trim();
    if url.is_empty() {
        return Err(ResolveError::InvalidUrl("empty url".to_string()));
    }

    if url.starts_with("http://") || url.starts_with("https://") {
        return Ok((url.to_string(), None));
    }
    if let Some(rest) = url.strip_prefix("ws://") {
        return Ok((format!("http://{rest}"), Some(url.to_string())));
    }
    if let Some(rest) = url.strip_prefix("wss://") {
        return Ok((format!("https://{rest}"), Some(url.to_string())));
    }

    Err(ResolveError::InvalidUrl(url.to_string()))
}
