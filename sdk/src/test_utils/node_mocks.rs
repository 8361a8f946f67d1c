use {
    crate::{
        api::{ApiError, BlockchainInfo, NodeApi, Validator, NO_SUCH_CHAIN},
        ids::{Id, NodeId},
    },
    async_trait::async_trait,
    rand::{rngs::OsRng, Rng},
    std::{
        collections::{BTreeSet, HashMap},
        sync::{Arc, Mutex, MutexGuard},
    },
};

/// Create a new [`Id`] with random bytes.
pub fn random_id() -> Id {
    Id::new(OsRng.gen())
}

/// Create a new [`NodeId`] with random bytes.
pub fn random_node_id() -> NodeId {
    NodeId::new(OsRng.gen())
}

#[derive(Default)]
struct State {
    bootstrapped: HashMap<String, bool>,
    validators: HashMap<Id, Vec<Validator>>,
    blockchains: Vec<BlockchainInfo>,
    aliases: HashMap<(String, Id), Vec<String>>,
    alias_calls: usize,
    bootstrap_queries: usize,
}

/// In-memory node API. Every node answers the same, apart from chain aliases
/// which are kept per node URI.
///
/// The P-Chain starts out bootstrapped, every other chain is unknown until
/// [`MockNodeApi::set_bootstrapped`] is called for it.
pub struct MockNodeApi {
    state: Mutex<State>,
}

impl MockNodeApi {
    pub fn new() -> Arc<Self> {
        let mut state = State::default();
        state.bootstrapped.insert("P".to_string(), true);

        Arc::new(Self {
            state: Mutex::new(state),
        })
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().expect("Mock state lock is poisoned.")
    }

    pub fn set_bootstrapped(&self, chain: &str, bootstrapped: bool) {
        self.state()
            .bootstrapped
            .insert(chain.to_string(), bootstrapped);
    }

    pub fn set_validators(&self, subnet_id: Id, validators: Vec<Validator>) {
        self.state().validators.insert(subnet_id, validators);
    }

    pub fn add_validator(&self, subnet_id: Id, validator: Validator) {
        self.state()
            .validators
            .entry(subnet_id)
            .or_default()
            .push(validator);
    }

    pub fn validator_ids(&self, subnet_id: Id) -> Vec<NodeId> {
        self.state()
            .validators
            .get(&subnet_id)
            .map(|validators| validators.iter().map(|v| v.node_id).collect())
            .unwrap_or_default()
    }

    pub fn add_blockchain(&self, blockchain: BlockchainInfo) {
        self.state().blockchains.push(blockchain);
    }

    /// Aliases of `chain_id` across all nodes.
    pub fn aliases(&self, chain_id: Id) -> Vec<String> {
        self.state()
            .aliases
            .iter()
            .filter(|((_, chain), _)| *chain == chain_id)
            .flat_map(|(_, aliases)| aliases.iter().cloned())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Number of `alias_chain` calls served.
    pub fn alias_calls(&self) -> usize {
        self.state().alias_calls
    }

    /// Number of `is_bootstrapped` calls served.
    pub fn bootstrap_queries(&self) -> usize {
        self.state().bootstrap_queries
    }
}

#[async_trait]
impl NodeApi for MockNodeApi {
    async fn is_bootstrapped(&self, _uri: &str, chain: &str) -> Result<bool, ApiError> {
        let mut state = self.state();
        state.bootstrap_queries += 1;

        match state.bootstrapped.get(chain) {
            Some(bootstrapped) => Ok(*bootstrapped),
            None => Err(ApiError::NoSuchChain(format!("{NO_SUCH_CHAIN} {chain}"))),
        }
    }

    async fn get_current_validators(
        &self,
        _uri: &str,
        subnet_id: Id,
    ) -> Result<Vec<Validator>, ApiError> {
        Ok(self
            .state()
            .validators
            .get(&subnet_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_validators_at(
        &self,
        _uri: &str,
        subnet_id: Id,
    ) -> Result<HashMap<NodeId, u64>, ApiError> {
        Ok(self
            .state()
            .validators
            .get(&subnet_id)
            .map(|validators| validators.iter().map(|v| (v.node_id, v.weight)).collect())
            .unwrap_or_default())
    }

    async fn get_blockchains(&self, _uri: &str) -> Result<Vec<BlockchainInfo>, ApiError> {
        Ok(self.state().blockchains.clone())
    }

    async fn get_chain_aliases(&self, uri: &str, chain_id: Id) -> Result<Vec<String>, ApiError> {
        Ok(self
            .state()
            .aliases
            .get(&(uri.to_string(), chain_id))
            .cloned()
            .unwrap_or_default())
    }

    async fn alias_chain(&self, uri: &str, chain_id: Id, alias: &str) -> Result<(), ApiError> {
        let mut state = self.state();
        state.alias_calls += 1;
        state
            .aliases
            .entry((uri.to_string(), chain_id))
            .or_default()
            .push(alias.to_string());

        Ok(())
    }
}
