//! # Feewatch Core
//!
//! Core library for the Feewatch EIP-1559 fee suggestion engine.
//!
//! Feewatch observes new blocks from an Ethereum-compatible node and
//! derives a recommended `{baseFeePerGas, maxPriorityFeePerGas,
//! maxFeePerGas}` tuple plus a bounded history of recent blocks.
//!
//! This crate provides the components:
//!
//! - **[`engine`]**: The connection lifecycle state machine and the
//!   [`FeeEngine`](engine::FeeEngine) handle callers interact with.
//!
//! - **[`subscription`]**: Exclusive owner of the block listener across
//!   connection replacements; spawns one aggregation task per block.
//!
//! - **[`aggregator`]**: Concurrent per-block fetch-and-fold producing a
//!   fee suggestion and a block summary.
//!
//! - **[`basefee`]**: Pure base-fee projection for the next block.
//!
//! - **[`history`]**: Bounded, newest-first log of block summaries.
//!
//! - **[`connection`]**: The `Connection` trait, the spec resolver, and
//!   the JSON-RPC implementation with WebSocket/polling block feeds.
//!
//! - **[`config`]**: Layered configuration (defaults, TOML file,
//!   environment overrides).
//!
//! ## Data Flow
//!
//! ```text
//! connect(spec)
//!       │
//!       ▼
//! ┌──────────────┐   Adopt/Fault    ┌──────────────────────┐
//! │   Resolver   │ ───────────────► │  Lifecycle driver    │
//! └──────────────┘                  │  (pure reducer +     │
//!                                   │   effect execution)  │
//! subscribe() ────── Subscribe ───► │                      │
//!                                   └──────┬───────▲───────┘
//!                                   Attach │       │ NewData
//!                                          ▼       │
//!                               ┌────────────────┐ │
//!                               │ Subscription   │ │
//!                               │ controller     │ │
//!                               └──────┬─────────┘ │
//!                              block N │           │
//!                                      ▼           │
//!                               ┌────────────────┐ │
//!                               │ Aggregator     │─┘
//!                               │ (block ∥ fees) │
//!                               └────────────────┘
//! ```

pub mod aggregator;
pub mod basefee;
pub mod config;
pub mod connection;
pub mod engine;
pub mod error;
pub mod history;
pub mod networks;
pub mod subscription;
pub mod types;
