//! Transaction-signing surface used to register non-sovereign subnet
//! validators. Key management and transaction construction live behind this
//! trait.

use {
    crate::ids::{Id, NodeId},
    async_trait::async_trait,
};

/// Weight given to every validator registered through
/// [`SubnetValidatorWallet`] by the orchestrator.
pub const NON_SOVEREIGN_VALIDATOR_WEIGHT: u64 = 1000;

/// Parameters of an "add subnet validator" transaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubnetValidator {
    pub node_id: NodeId,
    pub subnet_id: Id,
    /// Unix timestamp in seconds.
    pub end_time: u64,
    pub weight: u64,
}

#[async_trait]
pub trait SubnetValidatorWallet: Send + Sync {
    /// Issue and confirm the transaction adding `validator` to its subnet.
    async fn issue_add_subnet_validator_tx(&self, validator: SubnetValidator)
        -> anyhow::Result<()>;
}
