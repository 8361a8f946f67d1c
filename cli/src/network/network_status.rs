use {
    crate::{
        command_title,
        display::{json_output, print_table},
        notify_success,
        prelude::*,
    },
    subnet_sdk::localnet::{
        cluster::{cluster_endpoints, cluster_health, cluster_network_kind, filtered_clusters},
        meta::{local_network_bootstrapping_status, local_network_meta},
        BootstrappingStatus,
        LocalnetError,
        Network,
        NetworkManager,
    },
};

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct StatusReport {
    pub(crate) local_network: LocalNetworkStatus,
    pub(crate) clusters: Vec<ClusterStatus>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct LocalNetworkStatus {
    pub(crate) status: &'static str,
    pub(crate) network_dir: Option<PathBuf>,
    pub(crate) nodes: Vec<NodeStatus>,
    pub(crate) blockchains: Vec<BlockchainStatus>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct NodeStatus {
    pub(crate) node_id: String,
    pub(crate) uri: Option<String>,
    pub(crate) staking_address: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct BlockchainStatus {
    pub(crate) name: String,
    pub(crate) blockchain_id: String,
    pub(crate) subnet_id: String,
    /// `None` when no node of this network validates the subnet.
    pub(crate) healthy: Option<bool>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ClusterStatus {
    pub(crate) name: String,
    pub(crate) network: &'static str,
    pub(crate) endpoints: Vec<String>,
    pub(crate) p_chain_healthy: bool,
    pub(crate) blockchains_healthy: bool,
}

fn status_label(status: BootstrappingStatus) -> &'static str {
    match status {
        BootstrappingStatus::FullyBootstrapped => "running",
        BootstrappingStatus::PartiallyBootstrapped => "partially running",
        BootstrappingStatus::NotBootstrapped => "stopped",
        BootstrappingStatus::Undefined => "unknown",
    }
}

fn health_label(healthy: Option<bool>) -> String {
    match healthy {
        Some(true) => "healthy".green().to_string(),
        Some(false) => "unhealthy".red().to_string(),
        None => "not validated here".truecolor(100, 100, 100).to_string(),
    }
}

/// Endpoints and health of the local network and of every running cluster.
pub(crate) async fn network_status(
    conf: &CliConf,
    manager: &NetworkManager,
) -> AnyResult<StatusReport, CliError> {
    command_title!("Local network status");

    let status = local_network_bootstrapping_status(&conf.app_dir).await?;

    let mut local_network = LocalNetworkStatus {
        status: status_label(status),
        network_dir: None,
        nodes: vec![],
        blockchains: vec![],
    };

    if status != BootstrappingStatus::NotBootstrapped {
        if let Some(meta) = local_network_meta(&conf.app_dir).await? {
            let network = manager.load(&meta.network_dir).await?;

            local_network.nodes = node_statuses(&network);

            if status == BootstrappingStatus::FullyBootstrapped {
                local_network.blockchains = blockchain_statuses(manager, &network).await?;
            }

            local_network.network_dir = Some(network.dir);
        }
    }

    let mut clusters = vec![];

    for name in filtered_clusters(manager, &conf.app_dir, true, None, None).await? {
        let (p_chain_healthy, blockchains_healthy) =
            cluster_health(manager, &conf.app_dir, &name).await?;

        clusters.push(ClusterStatus {
            network: cluster_network_kind(&conf.app_dir, &name).await?.name(),
            endpoints: cluster_endpoints(&conf.app_dir, &name).await?,
            name,
            p_chain_healthy,
            blockchains_healthy,
        });
    }

    let report = StatusReport {
        local_network,
        clusters,
    };

    display(&report);

    json_output(&report)?;

    Ok(report)
}

fn node_statuses(network: &Network) -> Vec<NodeStatus> {
    network
        .nodes
        .iter()
        .map(|node| NodeStatus {
            node_id: node.node_id.to_string(),
            uri: node.uri().map(str::to_string),
            staking_address: node.staking_address().map(str::to_string),
        })
        .collect()
}

async fn blockchain_statuses(
    manager: &NetworkManager,
    network: &Network,
) -> AnyResult<Vec<BlockchainStatus>, CliError> {
    let endpoint = network.endpoint()?;
    let blockchains = manager
        .api()
        .get_blockchains(endpoint)
        .await
        .map_err(|e| CliError::Any(anyhow!("Failed to list blockchains at {endpoint}: {e}")))?;

    let mut statuses = vec![];

    for blockchain in blockchains {
        if blockchain.subnet_id.is_empty() {
            continue;
        }

        let healthy = match manager
            .is_blockchain_bootstrapped(network, &blockchain.id.to_string(), blockchain.subnet_id)
            .await
        {
            Ok(bootstrapped) => Some(bootstrapped),
            Err(LocalnetError::NoValidators(_)) => None,
            Err(e) => return Err(e.into()),
        };

        statuses.push(BlockchainStatus {
            name: blockchain.name,
            blockchain_id: blockchain.id.to_string(),
            subnet_id: blockchain.subnet_id.to_string(),
            healthy,
        });
    }

    Ok(statuses)
}

fn display(report: &StatusReport) {
    let local = &report.local_network;

    match &local.network_dir {
        Some(dir) => notify_success!(
            "Local network is {} at {}",
            local.status.bold(),
            dir.display().to_string().truecolor(100, 100, 100)
        ),
        None => notify_success!("Local network is {}", local.status.bold()),
    }

    if !local.nodes.is_empty() {
        print_table(
            vec!["Node ID", "Endpoint", "Staking address"],
            local
                .nodes
                .iter()
                .map(|node| {
                    vec![
                        node.node_id.clone(),
                        node.uri.clone().unwrap_or_else(|| "-".to_string()),
                        node.staking_address.clone().unwrap_or_else(|| "-".to_string()),
                    ]
                })
                .collect(),
        );
    }

    if !local.blockchains.is_empty() {
        print_table(
            vec!["Blockchain", "Blockchain ID", "Subnet ID", "Health"],
            local
                .blockchains
                .iter()
                .map(|chain| {
                    vec![
                        chain.name.clone(),
                        chain.blockchain_id.clone(),
                        chain.subnet_id.clone(),
                        health_label(chain.healthy),
                    ]
                })
                .collect(),
        );
    }

    if report.clusters.is_empty() {
        return;
    }

    print_table(
        vec!["Cluster", "Network", "Endpoints", "P-Chain", "Blockchains"],
        report
            .clusters
            .iter()
            .map(|cluster| {
                vec![
                    cluster.name.clone(),
                    cluster.network.to_string(),
                    cluster.endpoints.join("\n"),
                    health_label(Some(cluster.p_chain_healthy)),
                    health_label(Some(cluster.blockchains_healthy)),
                ]
            })
            .collect(),
    );
}
