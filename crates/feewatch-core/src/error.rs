//! Error taxonomy for the fee engine.
//!
//! Three layers, matching where the failure occurs:
//!
//! - [`ResolveError`]: a configuration description could not be turned into
//!   a connection. Always captured locally, never propagated as a panic.
//! - [`ConnectionError`]: a JSON-RPC round trip failed.
//! - [`EngineFault`]: the caller-visible fault stored in the engine state's
//!   `error` field. Every fault is `Clone` so state snapshots stay `Clone`;
//!   construction failures carry the transport error's message rather than
//!   the error itself, which is not.

use thiserror::Error;

/// Errors producing a connection from a [`ConnectionSpec`].
///
/// [`ConnectionSpec`]: crate::connection::resolver::ConnectionSpec
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum ResolveError {
    /// The named network (or chain id) is not in the known-network table.
    #[error("unknown network: {0}")]
    UnknownNetwork(String),

    /// Endpoint URL did not look like an HTTP(S) or WS(S) URL.
    #[error("invalid endpoint url: {0}")]
    InvalidUrl(String),

    /// A managed-infrastructure descriptor was missing a required credential.
    #[error("missing credential: {0}")]
    MissingCredential(&'static str),

    /// The HTTP client for the endpoint could not be constructed.
    #[error("http client build failed: {0}")]
    ClientBuild(String),
}

/// Errors from a JSON-RPC round trip against the node.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConnectionError {
    /// Network-level error from the underlying HTTP client.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// JSON-RPC error object returned by the node.
    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },

    /// Response was missing fields or otherwise malformed.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// Caller-visible fault surfaced through the engine state.
///
/// `SameNetwork` is advisory: the existing connection, subscription, and
/// data are retained. The other variants indicate the requested connection
/// was never adopted.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum EngineFault {
    /// The connection spec could not be resolved.
    #[error("invalid connection spec: {0}")]
    InvalidSpec(#[from] ResolveError),

    /// Requested network equals the currently connected one.
    #[error("already connected to chain {chain_id}")]
    SameNetwork { chain_id: u64 },

    /// The connection was built but confirming its identity failed.
    #[error("connection construction failed: {0}")]
    ConstructionFailure(String),
}
