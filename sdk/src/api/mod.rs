//! Node HTTP API surface consumed by the local network orchestrator.
//!
//! [`NodeApi`] is the seam: the orchestrator only ever talks to nodes through
//! it, so tests can swap in a scripted implementation. [`JsonRpcNodeApi`]
//! talks to real nodes over JSON-RPC.

mod client;
pub mod serde_parsers;

pub use client::*;
use {
    crate::ids::{Id, NodeId},
    async_trait::async_trait,
    serde::{Deserialize, Serialize},
    serde_parsers::{deserialize_string_u64, serialize_string_u64},
    std::collections::HashMap,
    thiserror::Error,
};

/// Substring the node returns when asked about a chain it does not know.
pub const NO_SUCH_CHAIN: &str = "there is no chain with alias/ID";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected HTTP status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },
    #[error("no such chain '{0}'")]
    NoSuchChain(String),
    #[error("malformed response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// A current validator of a subnet as reported by the platform chain.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Validator {
    #[serde(rename = "nodeID")]
    pub node_id: NodeId,
    #[serde(
        default,
        deserialize_with = "deserialize_string_u64",
        serialize_with = "serialize_string_u64"
    )]
    pub weight: u64,
    #[serde(
        deserialize_with = "deserialize_string_u64",
        serialize_with = "serialize_string_u64"
    )]
    pub end_time: u64,
    #[serde(rename = "txID", default)]
    pub tx_id: Id,
}

/// A blockchain deployed on the network.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockchainInfo {
    pub name: String,
    pub id: Id,
    #[serde(rename = "subnetID")]
    pub subnet_id: Id,
    #[serde(rename = "vmID")]
    pub vm_id: Id,
}

/// Operations the orchestrator needs from a node's HTTP API. Every call is
/// addressed to a node by its base `uri`.
#[async_trait]
pub trait NodeApi: Send + Sync {
    /// Whether `chain` (an ID or an alias) is bootstrapped on the node.
    /// Unknown chains yield [`ApiError::NoSuchChain`].
    async fn is_bootstrapped(&self, uri: &str, chain: &str) -> Result<bool, ApiError>;

    async fn get_current_validators(
        &self,
        uri: &str,
        subnet_id: Id,
    ) -> Result<Vec<Validator>, ApiError>;

    /// Validator weights of `subnet_id` at the proposed height.
    async fn get_validators_at(
        &self,
        uri: &str,
        subnet_id: Id,
    ) -> Result<HashMap<NodeId, u64>, ApiError>;

    async fn get_blockchains(&self, uri: &str) -> Result<Vec<BlockchainInfo>, ApiError>;

    async fn get_chain_aliases(&self, uri: &str, chain_id: Id) -> Result<Vec<String>, ApiError>;

    async fn alias_chain(&self, uri: &str, chain_id: Id, alias: &str) -> Result<(), ApiError>;
}
