//! Chain access for the transaction pipeline.
//!
//! [`ChainClient`] and [`ChainState`] are the only way the rest of the
//! workspace talks to a node. [`HttpChainClient`] implements both over
//! JSON-RPC 2.0 with a per-request timeout; tests substitute in-memory fakes.

pub mod client;
pub mod error;
pub mod http;
pub mod types;

pub use client::{ChainClient, ChainState};
pub use error::RpcError;
pub use http::HttpChainClient;
pub use types::{CallRequest, LogFilter};
