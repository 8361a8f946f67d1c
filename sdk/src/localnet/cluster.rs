//! Named local clusters: independent networks under
//! `<app_dir>/local-clusters/<name>`, usually connected to a public network
//! or to the local network. A directory is a cluster only while it holds a
//! loadable descriptor.

use {
    super::{
        archive::ArchiveSeeder,
        config::NetworkKind,
        error::{LocalnetError, LocalnetResult},
        manager::{CreateOptions, NetworkManager},
        meta::local_network_dir,
        network::{
            remove_dir_all_if_exists,
            status_of,
            BootstrappingStatus,
            Network,
        },
        node::{copy_node, Flags, Node},
        track::{is_p_chain_bootstrapped, TrackSubnetRequest},
    },
    crate::{
        api::BlockchainInfo,
        ids::NodeId,
        wallet::SubnetValidatorWallet,
    },
    log::{debug, info, warn},
    std::path::{Path, PathBuf},
    tokio::time::Instant,
};

pub const LOCAL_CLUSTERS_DIR: &str = "local-clusters";

/// How a cluster reaches the network it joins. Public networks only need
/// their ID; custom networks also need genesis, upgrade and bootstrappers.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConnectionSettings {
    pub network_id: u32,
    pub genesis: Option<Vec<u8>>,
    pub upgrade: Option<Vec<u8>>,
    pub bootstrap_ids: Vec<String>,
    pub bootstrap_ips: Vec<String>,
}

impl ConnectionSettings {
    pub fn public(network_id: u32) -> Self {
        Self {
            network_id,
            ..Default::default()
        }
    }
}

/// Everything needed to create a cluster.
#[derive(Clone, Debug)]
pub struct ClusterRequest {
    pub name: String,
    pub binary_path: PathBuf,
    pub plugin_dir: Option<PathBuf>,
    pub default_flags: Flags,
    pub connection: ConnectionSettings,
    pub nodes: Vec<Node>,
    /// Pre-seed node databases from the public archive, when there is one.
    pub seed: bool,
    /// Start the nodes once created.
    pub bootstrap: bool,
}

impl ClusterRequest {
    pub fn new(
        name: &str,
        binary_path: impl Into<PathBuf>,
        connection: ConnectionSettings,
        nodes: Vec<Node>,
    ) -> Self {
        Self {
            name: name.to_string(),
            binary_path: binary_path.into(),
            plugin_dir: None,
            default_flags: Flags::new(),
            connection,
            nodes,
            seed: false,
            bootstrap: false,
        }
    }

    pub fn with_plugin_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.plugin_dir = Some(dir.into());
        self
    }

    pub fn with_default_flags(mut self, flags: Flags) -> Self {
        self.default_flags = flags;
        self
    }

    pub fn with_seed(mut self, seed: bool) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_bootstrap(mut self, bootstrap: bool) -> Self {
        self.bootstrap = bootstrap;
        self
    }
}

pub fn local_clusters_dir(app_dir: &Path) -> PathBuf {
    app_dir.join(LOCAL_CLUSTERS_DIR)
}

pub fn local_cluster_dir(app_dir: &Path, name: &str) -> PathBuf {
    local_clusters_dir(app_dir).join(name)
}

/// Standard cluster name for a node of `blockchain_name` on `kind`.
pub fn local_cluster_name(kind: NetworkKind, blockchain_name: &str) -> String {
    format!(
        "{}-local-node-{}",
        blockchain_name.replace(' ', "-"),
        kind.name().to_lowercase().replace(' ', "-")
    )
}

pub async fn load_cluster(app_dir: &Path, name: &str) -> LocalnetResult<Network> {
    Network::load(local_cluster_dir(app_dir, name)).await
}

pub async fn cluster_exists(app_dir: &Path, name: &str) -> bool {
    load_cluster(app_dir, name).await.is_ok()
}

/// Names of every directory under the clusters root holding a loadable
/// network, sorted. A missing root means no clusters.
pub async fn list_clusters(app_dir: &Path) -> LocalnetResult<Vec<String>> {
    let root = local_clusters_dir(app_dir);

    let mut entries = match tokio::fs::read_dir(&root).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(vec![]),
        Err(e) => return Err(LocalnetError::io("read directory", &root)(e)),
    };

    let mut clusters = vec![];

    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(LocalnetError::io("read directory", &root))?
    {
        let is_dir = entry
            .file_type()
            .await
            .map(|t| t.is_dir())
            .unwrap_or(false);

        if !is_dir {
            continue;
        }

        let name = entry.file_name().to_string_lossy().into_owned();

        if Network::load(entry.path()).await.is_ok() {
            clusters.push(name);
        }
    }

    clusters.sort();

    Ok(clusters)
}

async fn cluster_status(app_dir: &Path, name: &str) -> LocalnetResult<BootstrappingStatus> {
    Ok(status_of(&load_cluster(app_dir, name).await?))
}

pub async fn cluster_is_running(app_dir: &Path, name: &str) -> LocalnetResult<bool> {
    Ok(cluster_status(app_dir, name).await? == BootstrappingStatus::FullyBootstrapped)
}

/// Whether any node of the cluster runs. Stop and remove flows act on such
/// clusters even though they are not usable.
pub async fn cluster_is_partially_running(app_dir: &Path, name: &str) -> LocalnetResult<bool> {
    Ok(cluster_status(app_dir, name).await? != BootstrappingStatus::NotBootstrapped)
}

pub async fn cluster_network_kind(app_dir: &Path, name: &str) -> LocalnetResult<NetworkKind> {
    Ok(NetworkKind::from_network_id(
        load_cluster(app_dir, name).await?.network_id(),
    ))
}

/// Node URIs of the cluster, wildcard bind addresses resolved.
pub async fn cluster_endpoints(app_dir: &Path, name: &str) -> LocalnetResult<Vec<String>> {
    Ok(load_cluster(app_dir, name).await?.node_uris_with_fix())
}

/// Blockchains deployed on the cluster's network whose subnet is tracked by
/// at least one of its nodes.
pub async fn cluster_tracked_blockchains(
    manager: &NetworkManager,
    app_dir: &Path,
    name: &str,
) -> LocalnetResult<Vec<BlockchainInfo>> {
    tracked_blockchains(manager, &load_cluster(app_dir, name).await?).await
}

async fn tracked_blockchains(
    manager: &NetworkManager,
    network: &Network,
) -> LocalnetResult<Vec<BlockchainInfo>> {
    let endpoint = network.endpoint()?;
    let blockchains = manager
        .api()
        .get_blockchains(endpoint)
        .await
        .map_err(LocalnetError::api(endpoint))?;

    let mut tracked = vec![];

    for blockchain in blockchains {
        if network.is_tracking_subnet(blockchain.subnet_id)? {
            tracked.push(blockchain);
        }
    }

    Ok(tracked)
}

/// P-Chain health and, separately, whether every tracked blockchain is
/// bootstrapped too.
pub async fn cluster_health(
    manager: &NetworkManager,
    app_dir: &Path,
    name: &str,
) -> LocalnetResult<(bool, bool)> {
    let network = load_cluster(app_dir, name).await?;

    let p_chain = is_p_chain_bootstrapped(manager, &network).await?;

    for blockchain in tracked_blockchains(manager, &network).await? {
        let bootstrapped = manager
            .is_blockchain_bootstrapped(&network, &blockchain.id.to_string(), blockchain.subnet_id)
            .await;

        match bootstrapped {
            Ok(true) => {}
            Ok(false) => return Ok((p_chain, false)),
            Err(LocalnetError::NoValidators(_)) => {
                debug!("Cluster '{name}' only tracks {}, skipping", blockchain.name);
            }
            Err(e) => return Err(e),
        }
    }

    Ok((p_chain, true))
}

/// Clusters matching every given filter: running ones only, connected to
/// `network_id`, and, among running clusters, tracking `blockchain_name`.
pub async fn filtered_clusters(
    manager: &NetworkManager,
    app_dir: &Path,
    running: bool,
    network_id: Option<u32>,
    blockchain_name: Option<&str>,
) -> LocalnetResult<Vec<String>> {
    let mut filtered = vec![];

    for name in list_clusters(app_dir).await? {
        let network = load_cluster(app_dir, &name).await?;

        if running {
            if status_of(&network) != BootstrappingStatus::FullyBootstrapped {
                continue;
            }

            if let Some(blockchain_name) = blockchain_name {
                let tracked = tracked_blockchains(manager, &network).await?;

                if !tracked.iter().any(|b| b.name == blockchain_name) {
                    continue;
                }
            }
        }

        if let Some(id) = network_id {
            if network.network_id() != id {
                continue;
            }
        }

        filtered.push(name);
    }

    Ok(filtered)
}

/// Create cluster `req.name`, optionally seed it and start it.
///
/// Seeding failures are logged and ignored: the nodes can still sync from
/// scratch.
pub async fn create_local_cluster(
    manager: &NetworkManager,
    app_dir: &Path,
    req: ClusterRequest,
    seeder: Option<&ArchiveSeeder>,
    deadline: Option<Instant>,
) -> LocalnetResult<Network> {
    let dir = local_cluster_dir(app_dir, &req.name);
    let kind = NetworkKind::from_network_id(req.connection.network_id);

    let mut opts = CreateOptions::new(&dir, req.connection.network_id, req.nodes)
        .with_binary_path(req.binary_path)
        .with_default_flags(req.default_flags)
        .with_bootstrappers(req.connection.bootstrap_ips, req.connection.bootstrap_ids);

    if let Some(plugin_dir) = req.plugin_dir {
        opts = opts.with_plugin_dir(plugin_dir);
    }
    if let Some(genesis) = req.connection.genesis {
        opts = opts.with_genesis(genesis);
    }
    if let Some(upgrade) = req.connection.upgrade {
        opts = opts.with_upgrade(upgrade);
    }

    let mut network = manager.create(opts, deadline).await?;

    // Single node clusters would otherwise run without it.
    network.enable_sybil_protection().await?;

    if req.seed {
        if let Some(seeder) = seeder {
            seed_nodes(seeder, kind, &network, &network.nodes).await;
        }
    }

    if req.bootstrap {
        manager.start(&mut network, deadline).await?;
    }

    info!("Created local cluster '{}'", req.name);

    Ok(network)
}

async fn seed_nodes(seeder: &ArchiveSeeder, kind: NetworkKind, network: &Network, nodes: &[Node]) {
    let names = nodes
        .iter()
        .map(|node| node.node_id.to_string())
        .collect::<Vec<_>>();

    if let Err(e) = seeder.download_and_seed(kind, &network.dir, &names).await {
        warn!("Seeding public archive data finished with error, ignoring: {e}");
    }
}

/// Add a fresh node with the given ports to cluster `name`. It inherits the
/// first node's connection flags, tracked subnets and shared chain configs,
/// then is started and waited on for every tracked blockchain.
pub async fn add_node_to_local_cluster(
    manager: &NetworkManager,
    app_dir: &Path,
    name: &str,
    http_port: u16,
    staking_port: u16,
    seeder: Option<&ArchiveSeeder>,
    deadline: Option<Instant>,
) -> LocalnetResult<NodeId> {
    let deadline = manager.deadline(deadline);
    let mut network = load_cluster(app_dir, name).await?;

    let Some(first) = network.nodes.first() else {
        return Err(LocalnetError::Config(format!("cluster '{name}' has no nodes")));
    };

    // Chain configs follow: they are rebuilt from the shared ones at start.
    let node = copy_node(first)?;

    if let Some(seeder) = seeder {
        let kind = NetworkKind::from_network_id(network.network_id());
        seed_nodes(seeder, kind, &network, std::slice::from_ref(&node)).await;
    }

    info!("Waiting for node {} to bootstrap the P-Chain", node.node_id);

    let node_id = manager
        .add_node(&mut network, node, http_port, staking_port, Some(deadline))
        .await?;

    for blockchain in tracked_blockchains(manager, &network).await? {
        info!("Waiting for node {node_id} to bootstrap {}", blockchain.name);

        wait_tracked_blockchain(manager, &network, &blockchain, deadline).await?;
    }

    Ok(node_id)
}

/// Wait for a tracked blockchain. Chains whose validators all live outside
/// the cluster have nothing to wait on here.
async fn wait_tracked_blockchain(
    manager: &NetworkManager,
    network: &Network,
    blockchain: &BlockchainInfo,
    deadline: Instant,
) -> LocalnetResult<()> {
    let waited = manager
        .wait_blockchain_bootstrapped(
            network,
            &blockchain.id.to_string(),
            blockchain.subnet_id,
            Some(deadline),
        )
        .await;

    match waited {
        Err(LocalnetError::NoValidators(_)) => {
            debug!("No validators of {} in the cluster, not waiting", blockchain.name);

            Ok(())
        }
        other => other,
    }
}

/// Start an existing cluster, wait for its tracked blockchains and, when it
/// belongs to the local network, alias them.
pub async fn load_local_cluster(
    manager: &NetworkManager,
    app_dir: &Path,
    name: &str,
    deadline: Option<Instant>,
) -> LocalnetResult<Network> {
    let deadline = manager.deadline(deadline);
    let mut network = load_cluster(app_dir, name).await?;

    manager.start(&mut network, Some(deadline)).await?;

    for blockchain in tracked_blockchains(manager, &network).await? {
        wait_tracked_blockchain(manager, &network, &blockchain, deadline).await?;
    }

    if NetworkKind::from_network_id(network.network_id()) == NetworkKind::Local {
        manager.set_default_aliases(&network, Some(deadline)).await?;
    }

    Ok(network)
}

/// Track a subnet on cluster `name`.
pub async fn local_cluster_track_subnet(
    manager: &NetworkManager,
    app_dir: &Path,
    name: &str,
    req: &TrackSubnetRequest,
    wallet: Option<&dyn SubnetValidatorWallet>,
    deadline: Option<Instant>,
) -> LocalnetResult<()> {
    let mut network = load_cluster(app_dir, name).await?;

    manager.track_subnet(&mut network, req, wallet, deadline).await
}

pub async fn cluster_stop(
    manager: &NetworkManager,
    app_dir: &Path,
    name: &str,
) -> LocalnetResult<()> {
    let mut network = load_cluster(app_dir, name).await?;

    manager.stop(&mut network).await
}

/// Stop cluster `name` if it runs, then delete its directory.
pub async fn cluster_remove(
    manager: &NetworkManager,
    app_dir: &Path,
    name: &str,
) -> LocalnetResult<()> {
    if name.is_empty() {
        return Err(LocalnetError::Config("invalid cluster ''".into()));
    }

    let dir = local_cluster_dir(app_dir, name);

    if !tokio::fs::try_exists(&dir).await.unwrap_or(false) {
        return Err(LocalnetError::NotFound(dir));
    }

    if let Err(e) = cluster_stop(manager, app_dir, name).await {
        warn!("Failed to stop cluster '{name}' before removal: {e}");
    }

    remove_dir_all_if_exists(&dir).await
}

/// Settings for connecting a cluster to the running local network.
pub async fn local_network_connection_info(app_dir: &Path) -> LocalnetResult<ConnectionSettings> {
    let network = Network::load(local_network_dir(app_dir).await?).await?;
    let (bootstrap_ips, bootstrap_ids) = network.bootstrappers(None);

    Ok(ConnectionSettings {
        network_id: network.network_id(),
        genesis: network.genesis().map(<[u8]>::to_vec),
        upgrade: network.upgrade()?,
        bootstrap_ids,
        bootstrap_ips,
    })
}
