//! Network lifecycle: create, start, stop and restart node processes, and
//! wait for chains to bootstrap.

use {
    super::{
        config::LocalnetConfig,
        error::{LocalnetError, LocalnetResult},
        network::*,
        node::*,
        process::{
            read_process_context,
            remove_process_context,
            spawn_node,
            terminate,
            wait_for_exit,
            ProcessContext,
        },
    },
    crate::{
        api::{ApiError, NodeApi},
        ids::{Id, NodeId},
    },
    log::{debug, info, warn},
    std::{
        collections::HashSet,
        path::{Path, PathBuf},
        sync::Arc,
        time::Duration,
    },
    tokio::{process::Child, time::Instant},
};

/// Chain every node validates. Waiting on it means the node is usable.
pub const P_CHAIN: &str = "P";
/// Binary used when the caller does not name one. Resolved through `PATH`.
pub const DEFAULT_NODE_BINARY: &str = "avalanchego";
const PROCESS_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Everything needed to lay out a new network on disk.
#[derive(Clone, Debug, Default)]
pub struct CreateOptions {
    pub root_dir: PathBuf,
    pub binary_path: Option<PathBuf>,
    pub plugin_dir: Option<PathBuf>,
    pub network_id: u32,
    /// Peers of an existing network to join. Empty to found a new one.
    pub bootstrap_ips: Vec<String>,
    pub bootstrap_ids: Vec<String>,
    pub genesis: Option<Vec<u8>>,
    pub upgrade: Option<Vec<u8>>,
    pub default_flags: Flags,
    pub nodes: Vec<Node>,
    /// Start every node and wait for the P-Chain before returning.
    pub auto_bootstrap: bool,
}

impl CreateOptions {
    pub fn new(root_dir: impl Into<PathBuf>, network_id: u32, nodes: Vec<Node>) -> Self {
        Self {
            root_dir: root_dir.into(),
            network_id,
            nodes,
            ..Default::default()
        }
    }

    pub fn with_binary_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.binary_path = Some(path.into());
        self
    }

    pub fn with_plugin_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.plugin_dir = Some(path.into());
        self
    }

    pub fn with_bootstrappers(mut self, ips: Vec<String>, ids: Vec<String>) -> Self {
        self.bootstrap_ips = ips;
        self.bootstrap_ids = ids;
        self
    }

    pub fn with_genesis(mut self, genesis: Vec<u8>) -> Self {
        self.genesis = Some(genesis);
        self
    }

    pub fn with_upgrade(mut self, upgrade: Vec<u8>) -> Self {
        self.upgrade = Some(upgrade);
        self
    }

    pub fn with_default_flags(mut self, flags: Flags) -> Self {
        self.default_flags = flags;
        self
    }

    pub fn with_auto_bootstrap(mut self, auto_bootstrap: bool) -> Self {
        self.auto_bootstrap = auto_bootstrap;
        self
    }
}

/// Drives node processes of a network and queries them through a
/// [`NodeApi`].
#[derive(Clone)]
pub struct NetworkManager {
    api: Arc<dyn NodeApi>,
    conf: LocalnetConfig,
}

impl NetworkManager {
    pub fn new(api: Arc<dyn NodeApi>) -> Self {
        Self {
            api,
            conf: LocalnetConfig::default(),
        }
    }

    pub fn with_config(mut self, conf: LocalnetConfig) -> Self {
        self.conf = conf;
        self
    }

    pub fn api(&self) -> &dyn NodeApi {
        self.api.as_ref()
    }

    pub fn config(&self) -> &LocalnetConfig {
        &self.conf
    }

    /// The caller's deadline, or the default bootstrap budget from now.
    pub fn deadline(&self, deadline: Option<Instant>) -> Instant {
        deadline.unwrap_or_else(|| Instant::now() + self.conf.bootstrap_timeout)
    }

    /// Write a new network to disk and, if asked, bootstrap it.
    ///
    /// On a failed bootstrap, nodes started so far keep running. Tearing
    /// them down is up to the caller.
    pub async fn create(
        &self,
        opts: CreateOptions,
        deadline: Option<Instant>,
    ) -> LocalnetResult<Network> {
        if opts.bootstrap_ips.len() != opts.bootstrap_ids.len() {
            return Err(LocalnetError::Config(
                "number of bootstrap IDs and bootstrap IP:port pairs must be equal".into(),
            ));
        }

        if opts.nodes.is_empty() {
            return Err(LocalnetError::Config(
                "a network needs at least one node".into(),
            ));
        }

        let binary = opts
            .binary_path
            .unwrap_or_else(|| PathBuf::from(DEFAULT_NODE_BINARY));

        let mut network = Network::new(&opts.root_dir, opts.network_id, binary);
        network.default_flags = opts.default_flags;
        network.genesis = opts.genesis;
        network.nodes = opts.nodes;

        let plugin_dir = opts
            .plugin_dir
            .unwrap_or_else(|| opts.root_dir.join(PLUGINS_DIR));
        network
            .default_flags
            .insert(PLUGIN_DIR_KEY.into(), path_value(&plugin_dir));

        if let Some(upgrade) = &opts.upgrade {
            network.set_upgrade(upgrade);
        }

        if !opts.bootstrap_ips.is_empty() {
            let (ips, ids) = (opts.bootstrap_ips.join(","), opts.bootstrap_ids.join(","));

            for node in &mut network.nodes {
                node.flags.insert(BOOTSTRAP_IPS_KEY.into(), ips.clone().into());
                node.flags.insert(BOOTSTRAP_IDS_KEY.into(), ids.clone().into());
            }

            network.fixed_bootstrappers = true;
        }

        network.write().await?;
        create_dir_all(&plugin_dir).await?;

        info!(
            "Created network {} with {} nodes at '{}'",
            network.network_id,
            network.nodes.len(),
            network.dir.display()
        );

        if opts.auto_bootstrap {
            self.start(&mut network, deadline).await?;
        }

        Ok(network)
    }

    pub async fn load(&self, dir: impl AsRef<Path>) -> LocalnetResult<Network> {
        Network::load(dir).await
    }

    /// Start every node that is not already running, then wait for the
    /// P-Chain on the whole network and persist the bound ports.
    pub async fn start(
        &self,
        network: &mut Network,
        deadline: Option<Instant>,
    ) -> LocalnetResult<()> {
        let deadline = self.deadline(deadline);

        for index in 0..network.nodes.len() {
            self.start_node(network, index, deadline).await?;
        }

        self.wait_blockchain_bootstrapped(network, P_CHAIN, Id::EMPTY, Some(deadline))
            .await?;

        network.persist_ports().await
    }

    /// Start the node at `index`. A node that fails to come up is stopped
    /// before the error is returned.
    async fn start_node(
        &self,
        network: &mut Network,
        index: usize,
        deadline: Instant,
    ) -> LocalnetResult<()> {
        let node = network.nodes[index].clone();

        if node.is_running() {
            debug!("Node {} is already running", node.node_id);
            return Ok(());
        }

        let node_dir = network.node_dir(&node);
        let logs_dir = node_dir.join(LOGS_DIR);
        let flags_file = node_dir.join(FLAGS_FILE);

        create_dir_all(&logs_dir).await?;
        network.write_node(&node).await?;
        network.rebuild_chain_configs(&node).await?;
        write_json(&flags_file, &network.effective_flags(&node)).await?;

        // A leftover context from a crashed run would be mistaken for ours.
        remove_process_context(&node_dir).await?;

        let binary = &network.runtime.binary_path;
        let mut child = spawn_node(
            binary,
            &node_dir,
            &flags_file,
            &logs_dir.join(PROCESS_LOG_FILE),
        )
        .map_err(|e| LocalnetError::Process {
            node_id: node.node_id,
            reason: format!("failed to spawn '{}': {e}", binary.display()),
        })?;

        let pid = child.id();

        match self
            .wait_process_context(node.node_id, &node_dir, &mut child, pid, deadline)
            .await
        {
            Ok(context) => {
                info!("Started node {} at {}", node.node_id, context.uri);

                network.nodes[index].process = Some(context);

                Ok(())
            }
            Err(e) => {
                warn!("Node {} failed to start: {e}", node.node_id);

                if let Some(pid) = pid {
                    if let Err(stop_err) = terminate(pid) {
                        warn!("Failed to stop node {}: {stop_err}", node.node_id);
                    }
                }

                Err(e)
            }
        }
    }

    async fn wait_process_context(
        &self,
        node_id: NodeId,
        node_dir: &Path,
        child: &mut Child,
        pid: Option<u32>,
        deadline: Instant,
    ) -> LocalnetResult<ProcessContext> {
        let limit = std::cmp::min(
            Instant::now() + self.conf.process_context_timeout,
            deadline,
        );

        loop {
            if let Ok(Some(status)) = child.try_wait() {
                return Err(LocalnetError::Process {
                    node_id,
                    reason: format!("process exited early with {status}"),
                });
            }

            // Missing or half written reads as `None`.
            if let Some(context) = read_process_context(node_dir).await? {
                if Some(context.pid) == pid {
                    return Ok(context);
                }
            }

            if Instant::now() >= limit {
                return Err(LocalnetError::Timeout(format!(
                    "node {node_id} to write its process context"
                )));
            }

            tokio::time::sleep_until(std::cmp::min(
                Instant::now() + PROCESS_POLL_INTERVAL,
                limit,
            ))
            .await;
        }
    }

    /// Gracefully terminate every node process and wait up to the stop
    /// timeout for them to exit. The network directory is left in place.
    pub async fn stop(&self, network: &mut Network) -> LocalnetResult<()> {
        network.refresh_processes().await?;

        let mut pids = vec![];

        for node in &network.nodes {
            let Some(context) = &node.process else {
                continue;
            };

            terminate(context.pid).map_err(|e| LocalnetError::Process {
                node_id: node.node_id,
                reason: format!("failed to stop pid {}: {e}", context.pid),
            })?;

            pids.push(context.pid);
        }

        let alive = wait_for_exit(
            &pids,
            Instant::now() + self.conf.stop_timeout,
            PROCESS_POLL_INTERVAL,
        )
        .await;

        network.refresh_processes().await?;

        if !alive.is_empty() {
            return Err(LocalnetError::Timeout(format!(
                "{} node processes of '{}' to exit",
                alive.len(),
                network.dir.display()
            )));
        }

        info!("Stopped network at '{}'", network.dir.display());

        Ok(())
    }

    async fn stop_node(&self, network: &mut Network, index: usize) -> LocalnetResult<()> {
        let node = &network.nodes[index];
        let node_dir = network.node_dir(node);
        let node_id = node.node_id;

        if let Some(context) = read_process_context(&node_dir).await? {
            terminate(context.pid).map_err(|e| LocalnetError::Process {
                node_id,
                reason: format!("failed to stop pid {}: {e}", context.pid),
            })?;

            let alive = wait_for_exit(
                &[context.pid],
                Instant::now() + self.conf.stop_timeout,
                PROCESS_POLL_INTERVAL,
            )
            .await;

            if !alive.is_empty() {
                return Err(LocalnetError::Timeout(format!("node {node_id} to exit")));
            }
        }

        remove_process_context(&node_dir).await?;
        network.nodes[index].process = None;

        Ok(())
    }

    /// Restart every node, one at a time, so the flags on disk are picked up.
    /// Then wait for the P-Chain.
    pub async fn restart_nodes(
        &self,
        network: &mut Network,
        deadline: Option<Instant>,
    ) -> LocalnetResult<()> {
        let deadline = self.deadline(deadline);

        for index in 0..network.nodes.len() {
            info!("Restarting node {}", network.nodes[index].node_id);

            self.stop_node(network, index).await?;
            self.start_node(network, index, deadline).await?;
        }

        self.wait_blockchain_bootstrapped(network, P_CHAIN, Id::EMPTY, Some(deadline))
            .await?;

        network.persist_ports().await
    }

    /// Add `node` to the network with the given ports, start it and wait for
    /// the P-Chain.
    pub async fn add_node(
        &self,
        network: &mut Network,
        mut node: Node,
        http_port: u16,
        staking_port: u16,
        deadline: Option<Instant>,
    ) -> LocalnetResult<NodeId> {
        let deadline = self.deadline(deadline);
        let node_id = node.node_id;

        node.flags.insert(HTTP_PORT_KEY.into(), http_port.into());
        node.flags.insert(STAKING_PORT_KEY.into(), staking_port.into());
        network.nodes.push(node);

        let index = network.nodes.len() - 1;
        network.write_node(&network.nodes[index]).await?;

        self.start_node(network, index, deadline).await?;
        self.wait_blockchain_bootstrapped(network, P_CHAIN, Id::EMPTY, Some(deadline))
            .await?;
        network.persist_ports().await?;

        Ok(node_id)
    }

    /// Nodes of `network` whose health decides `subnet_id`: every node for
    /// the primary network, the subnet's current validators otherwise.
    async fn relevant_nodes<'a>(
        &self,
        network: &'a Network,
        subnet_id: Id,
    ) -> LocalnetResult<Vec<&'a Node>> {
        if subnet_id.is_empty() {
            return Ok(network.nodes.iter().collect());
        }

        let endpoint = network.endpoint()?;
        let validators = self
            .api
            .get_current_validators(endpoint, subnet_id)
            .await
            .map_err(LocalnetError::api(endpoint))?
            .into_iter()
            .map(|v| v.node_id)
            .collect::<HashSet<_>>();

        let nodes = network
            .nodes
            .iter()
            .filter(|node| validators.contains(&node.node_id))
            .collect::<Vec<_>>();

        if nodes.is_empty() {
            return Err(LocalnetError::NoValidators(subnet_id));
        }

        Ok(nodes)
    }

    /// Whether `chain` is bootstrapped on every node that matters for
    /// `subnet_id`. A node that is down, or that does not know the chain
    /// yet, is not bootstrapped.
    pub async fn is_blockchain_bootstrapped(
        &self,
        network: &Network,
        chain: &str,
        subnet_id: Id,
    ) -> LocalnetResult<bool> {
        let nodes = self.relevant_nodes(network, subnet_id).await?;

        if nodes.is_empty() {
            return Ok(false);
        }

        for node in nodes {
            let Some(uri) = node.uri() else {
                return Ok(false);
            };

            match self.api.is_bootstrapped(uri, chain).await {
                Ok(true) => continue,
                Ok(false) | Err(ApiError::NoSuchChain(_)) => return Ok(false),
                Err(e) => return Err(LocalnetError::api(uri)(e)),
            }
        }

        Ok(true)
    }

    /// Poll [Self::is_blockchain_bootstrapped] until it holds or `deadline`
    /// passes. An already expired deadline fails without querying.
    pub async fn wait_blockchain_bootstrapped(
        &self,
        network: &Network,
        chain: &str,
        subnet_id: Id,
        deadline: Option<Instant>,
    ) -> LocalnetResult<()> {
        let deadline = self.deadline(deadline);
        let timeout = || {
            LocalnetError::Timeout(format!(
                "chain {chain} to bootstrap on '{}'",
                network.dir.display()
            ))
        };

        loop {
            if Instant::now() >= deadline {
                return Err(timeout());
            }

            let check = self.is_blockchain_bootstrapped(network, chain, subnet_id);

            match tokio::time::timeout_at(deadline, check).await {
                Ok(Ok(true)) => return Ok(()),
                Ok(Ok(false)) => {}
                Ok(Err(e)) => return Err(e),
                Err(_) => return Err(timeout()),
            }

            debug!("Chain {chain} is not bootstrapped yet");

            tokio::time::sleep_until(std::cmp::min(
                Instant::now() + self.conf.bootstrap_check_interval,
                deadline,
            ))
            .await;
        }
    }

    /// Alias `chain_id` as `alias` on the nodes that validate `subnet_id`,
    /// skipping nodes that already carry the alias.
    pub async fn set_alias(
        &self,
        network: &Network,
        chain_id: Id,
        alias: &str,
        subnet_id: Id,
    ) -> LocalnetResult<()> {
        for node in self.relevant_nodes(network, subnet_id).await? {
            let Some(uri) = node.uri() else {
                continue;
            };

            let aliases = self
                .api
                .get_chain_aliases(uri, chain_id)
                .await
                .map_err(LocalnetError::api(uri))?;

            if aliases.iter().any(|a| a == alias) {
                continue;
            }

            self.api
                .alias_chain(uri, chain_id, alias)
                .await
                .map_err(LocalnetError::api(uri))?;

            debug!("Aliased {chain_id} as '{alias}' on node {}", node.node_id);
        }

        Ok(())
    }

    /// Alias every non-primary chain the network validates by its name, once
    /// bootstrapped. Chains without validators here are skipped.
    pub async fn set_default_aliases(
        &self,
        network: &Network,
        deadline: Option<Instant>,
    ) -> LocalnetResult<()> {
        let deadline = self.deadline(deadline);

        self.wait_blockchain_bootstrapped(network, P_CHAIN, Id::EMPTY, Some(deadline))
            .await?;

        let endpoint = network.endpoint()?;
        let blockchains = self
            .api
            .get_blockchains(endpoint)
            .await
            .map_err(LocalnetError::api(endpoint))?;

        for blockchain in blockchains {
            if blockchain.subnet_id.is_empty() {
                continue;
            }

            match self.relevant_nodes(network, blockchain.subnet_id).await {
                Ok(_) => {}
                Err(LocalnetError::NoValidators(_)) => {
                    debug!("Skipping alias of {}, no validators here", blockchain.name);
                    continue;
                }
                Err(e) => return Err(e),
            }

            self.wait_blockchain_bootstrapped(
                network,
                &blockchain.id.to_string(),
                blockchain.subnet_id,
                Some(deadline),
            )
            .await?;

            self.set_alias(network, blockchain.id, &blockchain.name, blockchain.subnet_id)
                .await?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{
            api::{BlockchainInfo, Validator},
            localnet::{
                config::LOCAL_ID,
                network::status_of,
                process::is_process_alive,
            },
            test_utils::{
                write_failing_node_binary,
                write_fake_node_binary,
                write_silent_node_binary,
                MockNodeApi,
                SILENT_NODE_PID_FILE,
            },
        },
        assert_matches::assert_matches,
        tempfile::{tempdir, TempDir},
    };

    fn manager(api: Arc<MockNodeApi>) -> NetworkManager {
        NetworkManager::new(api).with_config(
            LocalnetConfig::default()
                .with_bootstrap_check_interval(Duration::from_millis(20))
                .with_stop_timeout(Duration::from_secs(5))
                .with_bootstrap_timeout(Duration::from_secs(10))
                .with_process_context_timeout(Duration::from_secs(5)),
        )
    }

    async fn started(manager: &NetworkManager, nodes: usize) -> (TempDir, Network) {
        let dir = tempdir().unwrap();
        let binary = write_fake_node_binary(dir.path()).unwrap();
        let nodes = new_nodes(nodes, &[], &[]).unwrap();
        let opts = CreateOptions::new(dir.path().join("network"), LOCAL_ID, nodes)
            .with_binary_path(binary)
            .with_auto_bootstrap(true);

        let network = manager.create(opts, None).await.unwrap();

        (dir, network)
    }

    fn validator(node_id: NodeId) -> Validator {
        Validator {
            node_id,
            weight: 20,
            end_time: 1_900_000_000,
            tx_id: Id::EMPTY,
        }
    }

    #[tokio::test]
    async fn test_create_start_stop_start_keeps_identities() {
        let api = MockNodeApi::new();
        let manager = manager(api);
        let (_dir, mut network) = started(&manager, 2).await;

        assert_eq!(status_of(&network), BootstrappingStatus::FullyBootstrapped);
        let ids = network.nodes.iter().map(|n| n.node_id).collect::<Vec<_>>();

        manager.stop(&mut network).await.unwrap();
        assert_eq!(
            bootstrapping_status(&network.dir).await.unwrap(),
            BootstrappingStatus::NotBootstrapped
        );

        let mut reloaded = manager.load(&network.dir).await.unwrap();
        let mut reloaded_ids = reloaded.nodes.iter().map(|n| n.node_id).collect::<Vec<_>>();
        reloaded_ids.sort();
        let mut expected = ids.clone();
        expected.sort();
        assert_eq!(reloaded_ids, expected);

        manager.start(&mut reloaded, None).await.unwrap();
        assert_eq!(
            bootstrapping_status(&reloaded.dir).await.unwrap(),
            BootstrappingStatus::FullyBootstrapped
        );
        // Ports bound on the first start are reused.
        for node in &reloaded.nodes {
            assert_ne!(node.http_port(), 0);
        }

        manager.stop(&mut reloaded).await.unwrap();
    }

    #[tokio::test]
    async fn test_killed_node_makes_network_partial() {
        let api = MockNodeApi::new();
        let manager = manager(api);
        let (_dir, mut network) = started(&manager, 3).await;

        let pid = network.nodes[1].process.as_ref().unwrap().pid;
        terminate(pid).unwrap();
        wait_for_exit(&[pid], Instant::now() + Duration::from_secs(5), PROCESS_POLL_INTERVAL).await;

        assert_eq!(
            bootstrapping_status(&network.dir).await.unwrap(),
            BootstrappingStatus::PartiallyBootstrapped
        );

        manager.stop(&mut network).await.unwrap();
        assert_eq!(
            bootstrapping_status(&network.dir).await.unwrap(),
            BootstrappingStatus::NotBootstrapped
        );
    }

    #[tokio::test]
    async fn test_failed_start_is_reported() {
        let api = MockNodeApi::new();
        let manager = manager(api);
        let dir = tempdir().unwrap();
        let binary = write_failing_node_binary(dir.path()).unwrap();
        let nodes = new_nodes(1, &[], &[]).unwrap();
        let opts = CreateOptions::new(dir.path().join("network"), LOCAL_ID, nodes)
            .with_binary_path(binary)
            .with_auto_bootstrap(true);

        assert_matches!(
            manager.create(opts, None).await,
            Err(LocalnetError::Process { .. })
        );
        assert_eq!(
            bootstrapping_status(dir.path().join("network")).await.unwrap(),
            BootstrappingStatus::NotBootstrapped
        );
    }

    #[tokio::test]
    async fn test_silent_node_is_killed_after_timeout() {
        let manager = NetworkManager::new(MockNodeApi::new()).with_config(
            LocalnetConfig::default().with_process_context_timeout(Duration::from_millis(300)),
        );
        let dir = tempdir().unwrap();
        let binary = write_silent_node_binary(dir.path()).unwrap();
        let nodes = new_nodes(1, &[], &[]).unwrap();
        let opts = CreateOptions::new(dir.path().join("network"), LOCAL_ID, nodes)
            .with_binary_path(binary)
            .with_auto_bootstrap(true);

        assert_matches!(
            manager.create(opts, None).await,
            Err(LocalnetError::Timeout(_))
        );

        let network = manager.load(dir.path().join("network")).await.unwrap();
        let pid_file = network.node_dir(&network.nodes[0]).join(SILENT_NODE_PID_FILE);
        let pid = std::fs::read_to_string(pid_file)
            .unwrap()
            .trim()
            .parse::<u32>()
            .unwrap();

        let alive = wait_for_exit(
            &[pid],
            Instant::now() + Duration::from_secs(5),
            Duration::from_millis(20),
        )
        .await;
        assert!(alive.is_empty());
        assert!(!is_process_alive(pid));
    }

    #[tokio::test]
    async fn test_create_rejects_mismatched_bootstrappers() {
        let manager = manager(MockNodeApi::new());
        let dir = tempdir().unwrap();
        let opts = CreateOptions::new(dir.path(), LOCAL_ID, new_nodes(1, &[], &[]).unwrap())
            .with_bootstrappers(vec!["127.0.0.1:9651".into()], vec![]);

        assert_matches!(
            manager.create(opts, None).await,
            Err(LocalnetError::Config(_))
        );
    }

    #[tokio::test]
    async fn test_create_with_bootstrappers_fixes_peers() {
        let manager = manager(MockNodeApi::new());
        let dir = tempdir().unwrap();
        let opts = CreateOptions::new(dir.path(), LOCAL_ID, new_nodes(2, &[], &[]).unwrap())
            .with_bootstrappers(vec!["10.0.0.1:9651".into()], vec!["NodeID-x".into()]);

        let network = manager.create(opts, None).await.unwrap();
        let loaded = manager.load(dir.path()).await.unwrap();

        assert!(loaded.fixed_bootstrappers);
        for node in &network.nodes {
            assert_eq!(
                loaded.effective_flags(node)[BOOTSTRAP_IPS_KEY],
                "10.0.0.1:9651"
            );
        }
    }

    #[tokio::test]
    async fn test_no_validators_fails_fast() {
        let api = MockNodeApi::new();
        let manager = manager(api.clone());
        let (_dir, mut network) = started(&manager, 2).await;
        let subnet = Id::new([3; 32]);

        // Validated by someone else entirely.
        api.set_validators(subnet, vec![validator(NodeId::new([1; 20]))]);

        assert_matches!(
            manager
                .is_blockchain_bootstrapped(&network, "chain", subnet)
                .await,
            Err(LocalnetError::NoValidators(id)) if id == subnet
        );

        manager.stop(&mut network).await.unwrap();
    }

    #[tokio::test]
    async fn test_unknown_chain_is_not_bootstrapped() {
        let api = MockNodeApi::new();
        let manager = manager(api.clone());
        let (_dir, mut network) = started(&manager, 1).await;

        assert!(!manager
            .is_blockchain_bootstrapped(&network, "unknown", Id::EMPTY)
            .await
            .unwrap());

        api.set_bootstrapped("unknown", true);
        assert!(manager
            .is_blockchain_bootstrapped(&network, "unknown", Id::EMPTY)
            .await
            .unwrap());

        manager.stop(&mut network).await.unwrap();
    }

    #[tokio::test]
    async fn test_expired_deadline_times_out_immediately() {
        let api = MockNodeApi::new();
        let manager = NetworkManager::new(api.clone());
        let dir = tempdir().unwrap();
        let network = Network::new(dir.path(), LOCAL_ID, "/bin/false");

        let started_at = std::time::Instant::now();
        let result = manager
            .wait_blockchain_bootstrapped(
                &network,
                P_CHAIN,
                Id::EMPTY,
                Some(Instant::now() - Duration::from_millis(1)),
            )
            .await;

        assert_matches!(&result, Err(e) if e.is_timeout());
        assert!(started_at.elapsed() < manager.config().bootstrap_check_interval);
        assert_eq!(api.bootstrap_queries(), 0);
    }

    #[tokio::test]
    async fn test_default_aliases_only_for_validated_chains() {
        let api = MockNodeApi::new();
        let manager = manager(api.clone());
        let (_dir, mut network) = started(&manager, 2).await;
        let (ours, theirs) = (Id::new([4; 32]), Id::new([5; 32]));
        let (our_chain, their_chain) = (Id::new([6; 32]), Id::new([7; 32]));

        api.set_validators(
            ours,
            network.nodes.iter().map(|n| validator(n.node_id)).collect(),
        );
        api.set_validators(theirs, vec![validator(NodeId::new([9; 20]))]);
        for (name, id, subnet_id) in [("ours", our_chain, ours), ("theirs", their_chain, theirs)] {
            api.add_blockchain(BlockchainInfo {
                name: name.into(),
                id,
                subnet_id,
                vm_id: Id::EMPTY,
            });
        }
        api.set_bootstrapped(&our_chain.to_string(), true);

        manager.set_default_aliases(&network, None).await.unwrap();
        // A second pass finds the aliases in place.
        manager.set_default_aliases(&network, None).await.unwrap();

        assert_eq!(api.aliases(our_chain), vec!["ours".to_string()]);
        assert!(api.aliases(their_chain).is_empty());
        assert_eq!(api.alias_calls(), 2);

        manager.stop(&mut network).await.unwrap();
    }

    #[tokio::test]
    async fn test_add_node_joins_running_network() {
        let api = MockNodeApi::new();
        let manager = manager(api);
        let (_dir, mut network) = started(&manager, 1).await;

        let node = copy_node(&network.nodes[0]).unwrap();
        let node_id = manager
            .add_node(&mut network, node, 0, 0, None)
            .await
            .unwrap();

        let reloaded = manager.load(&network.dir).await.unwrap();
        assert_eq!(reloaded.nodes.len(), 2);
        assert!(reloaded.node(node_id).unwrap().is_running());
        assert_eq!(status_of(&reloaded), BootstrappingStatus::FullyBootstrapped);

        manager.stop(&mut network).await.unwrap();
    }
}
