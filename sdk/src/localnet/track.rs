//! Make a running network track a new subnet and bootstrap its chain.

use {
    super::{
        error::{LocalnetError, LocalnetResult},
        manager::{NetworkManager, P_CHAIN},
        network::Network,
    },
    crate::{
        api::NodeApi,
        ids::{vm_id, Id, NodeId},
        wallet::{SubnetValidator, SubnetValidatorWallet, NON_SOVEREIGN_VALIDATOR_WEIGHT},
    },
    log::{info, warn},
    std::{
        collections::{HashMap, HashSet},
        path::PathBuf,
    },
    tokio::time::Instant,
};

/// A chain to install on a running network.
#[derive(Clone, Debug)]
pub struct TrackSubnetRequest {
    pub chain_name: String,
    /// Sovereign validators register themselves. Non-sovereign ones need an
    /// explicit transaction per node.
    pub sovereign: bool,
    pub chain_id: Id,
    pub subnet_id: Id,
    pub vm_binary_path: PathBuf,
    pub chain_config: Option<Vec<u8>>,
    pub subnet_config: Option<Vec<u8>>,
    pub per_node_chain_config: HashMap<NodeId, Vec<u8>>,
}

impl TrackSubnetRequest {
    pub fn new(
        chain_name: impl Into<String>,
        chain_id: Id,
        subnet_id: Id,
        vm_binary_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            chain_name: chain_name.into(),
            sovereign: true,
            chain_id,
            subnet_id,
            vm_binary_path: vm_binary_path.into(),
            chain_config: None,
            subnet_config: None,
            per_node_chain_config: HashMap::new(),
        }
    }

    pub fn with_sovereign(mut self, sovereign: bool) -> Self {
        self.sovereign = sovereign;
        self
    }

    pub fn with_chain_config(mut self, config: Vec<u8>) -> Self {
        self.chain_config = Some(config);
        self
    }

    pub fn with_subnet_config(mut self, config: Vec<u8>) -> Self {
        self.subnet_config = Some(config);
        self
    }

    pub fn with_node_chain_config(mut self, node_id: NodeId, config: Vec<u8>) -> Self {
        self.per_node_chain_config.insert(node_id, config);
        self
    }
}

impl NetworkManager {
    /// Install the chain's VM and configs, restart every node tracking the
    /// subnet, register non-sovereign validators and wait for the chain.
    ///
    /// Steps run strictly in order and any failure aborts the call. Nothing
    /// already written or restarted is rolled back; re-running is harmless.
    pub async fn track_subnet(
        &self,
        network: &mut Network,
        req: &TrackSubnetRequest,
        wallet: Option<&dyn SubnetValidatorWallet>,
        deadline: Option<Instant>,
    ) -> LocalnetResult<()> {
        let deadline = self.deadline(deadline);

        if !req.sovereign && wallet.is_none() {
            return Err(LocalnetError::Config(format!(
                "a wallet is required to add validators of non-sovereign subnet {}",
                req.subnet_id
            )));
        }

        let vm_id = vm_id(&req.chain_name)?;
        let installed = network.install_vm(&req.vm_binary_path, vm_id).await?;
        info!("Installed VM {vm_id} at '{}'", installed.display());

        if let Some(config) = &req.chain_config {
            network.set_chain_config(req.chain_id, config).await?;
        }
        if let Some(config) = &req.subnet_config {
            network.set_subnet_config(req.subnet_id, config).await?;
        }
        for (node_id, config) in &req.per_node_chain_config {
            if network.node(*node_id).is_none() {
                warn!("Node {node_id} is not part of the network, ignoring its chain config");
                continue;
            }

            network
                .set_node_chain_config(*node_id, req.chain_id, config)
                .await?;
        }

        for node in &mut network.nodes {
            node.add_tracked_subnet(req.subnet_id)?;
        }
        for node in &network.nodes {
            network.write_node(node).await?;
        }

        // Nodes only read their tracked subnets at startup.
        self.restart_nodes(network, Some(deadline)).await?;

        if !req.sovereign {
            if let Some(wallet) = wallet {
                self.add_non_sovereign_validators(network, req.subnet_id, wallet)
                    .await?;
            }
            self.wait_non_sovereign_validators(network, req.subnet_id, deadline)
                .await?;
        }

        info!("Waiting for blockchain {} to be bootstrapped", req.chain_id);

        self.wait_blockchain_bootstrapped(
            network,
            &req.chain_id.to_string(),
            req.subnet_id,
            Some(deadline),
        )
        .await
    }

    /// Register every node that is not yet a validator of `subnet_id`. End
    /// times are borrowed from each node's primary network validation.
    pub async fn add_non_sovereign_validators(
        &self,
        network: &Network,
        subnet_id: Id,
        wallet: &dyn SubnetValidatorWallet,
    ) -> LocalnetResult<()> {
        let endpoint = network.endpoint()?;

        let primary_end_times = self
            .api()
            .get_current_validators(endpoint, Id::EMPTY)
            .await
            .map_err(LocalnetError::api(endpoint))?
            .into_iter()
            .map(|v| (v.node_id, v.end_time))
            .collect::<HashMap<_, _>>();

        let subnet_validators = self.subnet_validators(endpoint, subnet_id).await?;

        for node in &network.nodes {
            if subnet_validators.contains(&node.node_id) {
                continue;
            }

            let Some(end_time) = primary_end_times.get(&node.node_id) else {
                return Err(LocalnetError::Process {
                    node_id: node.node_id,
                    reason: "not a primary network validator".into(),
                });
            };

            info!("Adding node {} as validator of {subnet_id}", node.node_id);

            wallet
                .issue_add_subnet_validator_tx(SubnetValidator {
                    node_id: node.node_id,
                    subnet_id,
                    end_time: *end_time,
                    weight: NON_SOVEREIGN_VALIDATOR_WEIGHT,
                })
                .await
                .map_err(LocalnetError::Wallet)?;
        }

        Ok(())
    }

    /// Poll until every node shows up in the current validators of
    /// `subnet_id`.
    pub async fn wait_non_sovereign_validators(
        &self,
        network: &Network,
        subnet_id: Id,
        deadline: Instant,
    ) -> LocalnetResult<()> {
        let endpoint = network.endpoint()?;

        loop {
            let validators = self.subnet_validators(endpoint, subnet_id).await?;

            if network
                .nodes
                .iter()
                .all(|node| validators.contains(&node.node_id))
            {
                return Ok(());
            }

            if Instant::now() >= deadline {
                return Err(LocalnetError::Timeout(format!(
                    "network nodes to become validators of {subnet_id}"
                )));
            }

            tokio::time::sleep_until(std::cmp::min(
                Instant::now() + self.config().validator_check_interval,
                deadline,
            ))
            .await;
        }
    }

    async fn subnet_validators(
        &self,
        endpoint: &str,
        subnet_id: Id,
    ) -> LocalnetResult<HashSet<NodeId>> {
        Ok(self
            .api()
            .get_current_validators(endpoint, subnet_id)
            .await
            .map_err(LocalnetError::api(endpoint))?
            .into_iter()
            .map(|v| v.node_id)
            .collect())
    }
}

/// Whether a chain whose VM was derived from `chain_name` already runs
/// behind `endpoint`.
pub async fn blockchain_already_deployed(
    api: &dyn NodeApi,
    endpoint: &str,
    chain_name: &str,
) -> LocalnetResult<bool> {
    let vm_id = vm_id(chain_name)?;

    let blockchains = api
        .get_blockchains(endpoint)
        .await
        .map_err(LocalnetError::api(endpoint))?;

    Ok(blockchains.iter().any(|b| b.vm_id == vm_id))
}

/// Whether the P-Chain answers on `network`.
pub async fn is_p_chain_bootstrapped(
    manager: &NetworkManager,
    network: &Network,
) -> LocalnetResult<bool> {
    manager
        .is_blockchain_bootstrapped(network, P_CHAIN, Id::EMPTY)
        .await
}
