//! On-disk network descriptor. The network directory is the only source of
//! truth: every query reloads it and every mutation writes it back.
//!
//! Layout of a network directory:
//!
//! ```text
//! <dir>/config.json                          network ID, default flags, runtime
//! <dir>/genesis.json                         optional custom genesis
//! <dir>/plugins/<vmID>                       shared VM binaries
//! <dir>/chains/<chainID>/config.json         shared chain configs
//! <dir>/subnets/<subnetID>.json              subnet configs
//! <dir>/<nodeID>/node.json                   node descriptor
//! <dir>/<nodeID>/flags.json                  effective flags of the last start
//! <dir>/<nodeID>/process.json                written by the running node
//! <dir>/<nodeID>/chain-overrides/<chainID>/config.json
//! <dir>/<nodeID>/configs/chains/...          rebuilt before each start
//! <dir>/<nodeID>/logs/
//! <dir>/<nodeID>/db/
//! ```

use {
    super::{
        config::{FUJI_ID, MAINNET_ID},
        error::{LocalnetError, LocalnetResult},
        node::*,
        process::{read_process_context, remove_process_context, PROCESS_CONTEXT_FILE},
    },
    crate::ids::{Id, NodeId},
    base64::{engine::general_purpose::STANDARD, Engine as _},
    log::debug,
    serde::{de::DeserializeOwned, Deserialize, Serialize},
    serde_json::Value,
    std::{
        collections::BTreeSet,
        io,
        path::{Path, PathBuf},
    },
};

pub const CONFIG_FILE: &str = "config.json";
pub const GENESIS_FILE: &str = "genesis.json";
pub const NODE_FILE: &str = "node.json";
pub const FLAGS_FILE: &str = "flags.json";
pub const PLUGINS_DIR: &str = "plugins";
pub const CHAINS_DIR: &str = "chains";
pub const SUBNETS_DIR: &str = "subnets";
pub const CHAIN_OVERRIDES_DIR: &str = "chain-overrides";
pub const NODE_CHAIN_CONFIGS_DIR: &str = "configs/chains";
pub const LOGS_DIR: &str = "logs";
pub const PROCESS_LOG_FILE: &str = "process.log";
pub const DB_DIR: &str = "db";
/// Name of the per-chain config file inside a chain config directory.
pub const CHAIN_CONFIG_FILE: &str = "config.json";

/// Derived from process liveness, never stored.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BootstrappingStatus {
    /// The status could not be computed.
    #[default]
    Undefined,
    NotBootstrapped,
    PartiallyBootstrapped,
    FullyBootstrapped,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeConfig {
    pub binary_path: PathBuf,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NetworkConfigFile {
    network_id: u32,
    #[serde(default)]
    default_flags: Flags,
    runtime_config: RuntimeConfig,
    #[serde(default)]
    fixed_bootstrappers: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Network {
    pub dir: PathBuf,
    pub network_id: u32,
    pub default_flags: Flags,
    pub runtime: RuntimeConfig,
    /// Bootstrap peers were supplied from outside and must not be recomputed.
    pub fixed_bootstrappers: bool,
    pub genesis: Option<Vec<u8>>,
    pub nodes: Vec<Node>,
}

pub(crate) fn path_value(path: &Path) -> Value {
    Value::String(path.to_string_lossy().into_owned())
}

pub(crate) async fn write_json<T: Serialize>(path: &Path, value: &T) -> LocalnetResult<()> {
    let bytes = serde_json::to_vec_pretty(value).map_err(LocalnetError::json(path))?;

    write_bytes(path, &bytes).await
}

pub(crate) async fn write_bytes(path: &Path, bytes: &[u8]) -> LocalnetResult<()> {
    if let Some(parent) = path.parent() {
        create_dir_all(parent).await?;
    }

    tokio::fs::write(path, bytes)
        .await
        .map_err(LocalnetError::io("write", path))
}

pub(crate) async fn read_json<T: DeserializeOwned>(path: &Path) -> LocalnetResult<T> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(LocalnetError::io("read", path))?;

    serde_json::from_slice(&bytes).map_err(LocalnetError::json(path))
}

pub(crate) async fn create_dir_all(path: &Path) -> LocalnetResult<()> {
    tokio::fs::create_dir_all(path)
        .await
        .map_err(LocalnetError::io("create directory", path))
}

pub(crate) async fn remove_dir_all_if_exists(path: &Path) -> LocalnetResult<()> {
    match tokio::fs::remove_dir_all(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(LocalnetError::io("remove", path)(e)),
    }
}

impl Network {
    pub fn new(dir: impl Into<PathBuf>, network_id: u32, binary_path: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            network_id,
            default_flags: Flags::new(),
            runtime: RuntimeConfig {
                binary_path: binary_path.into(),
            },
            fixed_bootstrappers: false,
            genesis: None,
            nodes: vec![],
        }
    }

    /// Load the network at `dir` and refresh the runtime state of its nodes.
    /// Fails with [`LocalnetError::NotFound`] when there is no parsable
    /// descriptor.
    pub async fn load(dir: impl AsRef<Path>) -> LocalnetResult<Self> {
        let dir = dir.as_ref();
        let not_found = || LocalnetError::NotFound(dir.to_path_buf());

        let bytes = tokio::fs::read(dir.join(CONFIG_FILE))
            .await
            .map_err(|_| not_found())?;
        let config: NetworkConfigFile = serde_json::from_slice(&bytes).map_err(|_| not_found())?;

        let genesis = match tokio::fs::read(dir.join(GENESIS_FILE)).await {
            Ok(bytes) => Some(bytes),
            Err(e) if e.kind() == io::ErrorKind::NotFound => None,
            Err(e) => return Err(LocalnetError::io("read", dir.join(GENESIS_FILE))(e)),
        };

        let mut nodes = vec![];
        let mut entries = tokio::fs::read_dir(dir)
            .await
            .map_err(LocalnetError::io("read directory", dir))?;

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(LocalnetError::io("read directory", dir))?
        {
            let node_file = entry.path().join(NODE_FILE);

            if tokio::fs::try_exists(&node_file).await.unwrap_or(false) {
                nodes.push(read_json::<Node>(&node_file).await?);
            }
        }

        nodes.sort_by_key(|node| node.node_id);

        let mut network = Self {
            dir: dir.to_path_buf(),
            network_id: config.network_id,
            default_flags: config.default_flags,
            runtime: config.runtime_config,
            fixed_bootstrappers: config.fixed_bootstrappers,
            genesis,
            nodes,
        };

        network.refresh_processes().await?;

        Ok(network)
    }

    /// Re-read every node's process context.
    pub async fn refresh_processes(&mut self) -> LocalnetResult<()> {
        for node in &mut self.nodes {
            node.process = read_process_context(&node.dir(&self.dir)).await?;
        }

        Ok(())
    }

    /// Persist the descriptor, the genesis and every node descriptor.
    pub async fn write(&self) -> LocalnetResult<()> {
        create_dir_all(&self.dir).await?;

        self.write_config().await?;

        if let Some(genesis) = &self.genesis {
            write_bytes(&self.dir.join(GENESIS_FILE), genesis).await?;
        }

        for node in &self.nodes {
            self.write_node(node).await?;
        }

        Ok(())
    }

    pub async fn write_config(&self) -> LocalnetResult<()> {
        let config = NetworkConfigFile {
            network_id: self.network_id,
            default_flags: self.default_flags.clone(),
            runtime_config: self.runtime.clone(),
            fixed_bootstrappers: self.fixed_bootstrappers,
        };

        write_json(&self.dir.join(CONFIG_FILE), &config).await
    }

    pub async fn write_node(&self, node: &Node) -> LocalnetResult<()> {
        write_json(&node.dir(&self.dir).join(NODE_FILE), node).await
    }

    pub fn node(&self, node_id: NodeId) -> Option<&Node> {
        self.nodes.iter().find(|node| node.node_id == node_id)
    }

    pub fn node_dir(&self, node: &Node) -> PathBuf {
        node.dir(&self.dir)
    }

    pub fn plugin_dir(&self) -> PathBuf {
        self.default_flags
            .get(PLUGIN_DIR_KEY)
            .and_then(Value::as_str)
            .map(PathBuf::from)
            .unwrap_or_else(|| self.dir.join(PLUGINS_DIR))
    }

    pub fn chain_config_path(&self, chain_id: Id) -> PathBuf {
        self.dir
            .join(CHAINS_DIR)
            .join(chain_id.to_string())
            .join(CHAIN_CONFIG_FILE)
    }

    pub fn node_chain_config_path(&self, node_id: NodeId, chain_id: Id) -> PathBuf {
        self.dir
            .join(node_id.to_string())
            .join(CHAIN_OVERRIDES_DIR)
            .join(chain_id.to_string())
            .join(CHAIN_CONFIG_FILE)
    }

    pub fn subnet_config_path(&self, subnet_id: Id) -> PathBuf {
        self.dir
            .join(SUBNETS_DIR)
            .join(format!("{subnet_id}.json"))
    }

    pub fn network_id(&self) -> u32 {
        self.network_id
    }

    pub fn genesis(&self) -> Option<&[u8]> {
        self.genesis.as_deref()
    }

    /// The upgrade payload, stored base64 in the default flags.
    pub fn upgrade(&self) -> LocalnetResult<Option<Vec<u8>>> {
        let Some(encoded) = self
            .default_flags
            .get(UPGRADE_CONTENT_KEY)
            .and_then(Value::as_str)
        else {
            return Ok(None);
        };

        STANDARD
            .decode(encoded)
            .map(Some)
            .map_err(|e| LocalnetError::Config(format!("invalid upgrade payload: {e}")))
    }

    pub fn set_upgrade(&mut self, upgrade: &[u8]) {
        self.default_flags
            .insert(UPGRADE_CONTENT_KEY.into(), STANDARD.encode(upgrade).into());
    }

    /// Networks with public bootstrappers never get computed peers.
    pub fn is_public_network(&self) -> bool {
        self.network_id == MAINNET_ID || self.network_id == FUJI_ID
    }

    pub fn sybil_protection_enabled(&self) -> bool {
        self.default_flags
            .get(SYBIL_PROTECTION_KEY)
            .and_then(Value::as_bool)
            .unwrap_or(true)
    }

    /// Turn sybil protection back on, for single node clusters where it
    /// would otherwise be disabled.
    pub async fn enable_sybil_protection(&mut self) -> LocalnetResult<()> {
        self.default_flags
            .insert(SYBIL_PROTECTION_KEY.into(), Value::Bool(true));

        self.write_config().await
    }

    pub fn first_running_node(&self) -> Option<&Node> {
        self.nodes.iter().find(|node| node.is_running())
    }

    /// API endpoint of the first running node.
    pub fn endpoint(&self) -> LocalnetResult<&str> {
        self.first_running_node()
            .and_then(Node::uri)
            .ok_or(LocalnetError::NotBootstrapped)
    }

    /// Staking addresses and node IDs of the running nodes, `exclude` aside.
    pub fn bootstrappers(&self, exclude: Option<NodeId>) -> (Vec<String>, Vec<String>) {
        self.nodes
            .iter()
            .filter(|node| Some(node.node_id) != exclude)
            .filter_map(|node| {
                node.staking_address()
                    .map(|address| (address.to_string(), node.node_id.to_string()))
            })
            .unzip()
    }

    /// Union of the subnets tracked by any node.
    pub fn tracked_subnets(&self) -> LocalnetResult<Vec<Id>> {
        let mut subnets = BTreeSet::new();

        for node in &self.nodes {
            subnets.extend(node.tracked_subnets()?);
        }

        Ok(subnets.into_iter().collect())
    }

    pub fn is_tracking_subnet(&self, subnet_id: Id) -> LocalnetResult<bool> {
        for node in &self.nodes {
            if node.is_tracking_subnet(subnet_id)? {
                return Ok(true);
            }
        }

        Ok(false)
    }

    /// Flags the node is started with: network defaults, then the node's own
    /// flags, then derived paths and bootstrap peers.
    pub fn effective_flags(&self, node: &Node) -> Flags {
        let node_dir = self.node_dir(node);

        let mut flags = self.default_flags.clone();
        flags.extend(node.flags.clone());

        flags.insert(NETWORK_ID_KEY.into(), self.network_id.into());
        flags.insert(DATA_DIR_KEY.into(), path_value(&node_dir));
        flags.insert(LOG_DIR_KEY.into(), path_value(&node_dir.join(LOGS_DIR)));
        flags.insert(
            CHAIN_CONFIG_DIR_KEY.into(),
            path_value(&node_dir.join(NODE_CHAIN_CONFIGS_DIR)),
        );
        flags.insert(
            SUBNET_CONFIG_DIR_KEY.into(),
            path_value(&self.dir.join(SUBNETS_DIR)),
        );
        flags.insert(
            PROCESS_CONTEXT_FILE_KEY.into(),
            path_value(&node_dir.join(PROCESS_CONTEXT_FILE)),
        );
        flags
            .entry(PLUGIN_DIR_KEY.to_string())
            .or_insert_with(|| path_value(&self.dir.join(PLUGINS_DIR)));

        if self.genesis.is_some() {
            flags.insert(
                GENESIS_FILE_KEY.into(),
                path_value(&self.dir.join(GENESIS_FILE)),
            );
        }

        let fixed = self.fixed_bootstrappers || node.flags.contains_key(BOOTSTRAP_IPS_KEY);

        if !fixed && !self.is_public_network() {
            let (ips, ids) = self.bootstrappers(Some(node.node_id));

            flags.insert(BOOTSTRAP_IPS_KEY.into(), ips.join(",").into());
            flags.insert(BOOTSTRAP_IDS_KEY.into(), ids.join(",").into());
        }

        flags
    }

    /// Rebuild `<node>/configs/chains` from the shared chain configs, with
    /// the node's overrides taking precedence.
    pub async fn rebuild_chain_configs(&self, node: &Node) -> LocalnetResult<()> {
        let node_dir = self.node_dir(node);
        let target = node_dir.join(NODE_CHAIN_CONFIGS_DIR);

        remove_dir_all_if_exists(&target).await?;
        create_dir_all(&target).await?;

        for source in [
            self.dir.join(CHAINS_DIR),
            node_dir.join(CHAIN_OVERRIDES_DIR),
        ] {
            let mut entries = match tokio::fs::read_dir(&source).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => return Err(LocalnetError::io("read directory", &source)(e)),
            };

            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(LocalnetError::io("read directory", &source))?
            {
                let config = entry.path().join(CHAIN_CONFIG_FILE);

                if !tokio::fs::try_exists(&config).await.unwrap_or(false) {
                    continue;
                }

                let dest = target.join(entry.file_name()).join(CHAIN_CONFIG_FILE);
                let bytes = tokio::fs::read(&config)
                    .await
                    .map_err(LocalnetError::io("read", &config))?;

                write_bytes(&dest, &bytes).await?;
            }
        }

        Ok(())
    }

    pub async fn set_chain_config(&self, chain_id: Id, config: &[u8]) -> LocalnetResult<()> {
        write_bytes(&self.chain_config_path(chain_id), config).await
    }

    pub async fn set_subnet_config(&self, subnet_id: Id, config: &[u8]) -> LocalnetResult<()> {
        write_bytes(&self.subnet_config_path(subnet_id), config).await
    }

    pub async fn set_node_chain_config(
        &self,
        node_id: NodeId,
        chain_id: Id,
        config: &[u8],
    ) -> LocalnetResult<()> {
        if self.node(node_id).is_none() {
            return Err(LocalnetError::Config(format!(
                "node {node_id} is not part of the network at '{}'",
                self.dir.display()
            )));
        }

        write_bytes(&self.node_chain_config_path(node_id, chain_id), config).await
    }

    /// Copy a VM binary into the shared plugin directory under its VM ID.
    pub async fn install_vm(&self, binary: &Path, vm_id: Id) -> LocalnetResult<PathBuf> {
        let plugin_dir = self.plugin_dir();
        let target = plugin_dir.join(vm_id.to_string());

        create_dir_all(&plugin_dir).await?;

        tokio::fs::copy(binary, &target)
            .await
            .map_err(LocalnetError::io("copy VM binary", binary))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;

            tokio::fs::set_permissions(&target, std::fs::Permissions::from_mode(0o755))
                .await
                .map_err(LocalnetError::io("set permissions of", &target))?;
        }

        Ok(target)
    }

    /// Record the ports of running nodes so the next start binds the same
    /// ones.
    pub async fn persist_ports(&mut self) -> LocalnetResult<()> {
        for i in 0..self.nodes.len() {
            let node = &self.nodes[i];
            let Some(context) = &node.process else {
                continue;
            };

            let http_port = port_of(&context.uri);
            let staking_port = port_of(&context.staking_address);

            let node = &mut self.nodes[i];
            if let Some(port) = http_port {
                node.flags.insert(HTTP_PORT_KEY.into(), port.into());
            }
            if let Some(port) = staking_port {
                node.flags.insert(STAKING_PORT_KEY.into(), port.into());
            }

            self.write_node(&self.nodes[i]).await?;
        }

        Ok(())
    }

    /// Node URIs with a wildcard bind address replaced by the node's public
    /// IP when it has one. Nodes that are not running are skipped.
    pub fn node_uris_with_fix(&self) -> Vec<String> {
        self.nodes
            .iter()
            .filter_map(|node| {
                let uri = node.uri()?;

                Some(match node.flag_str(PUBLIC_IP_KEY) {
                    Some(ip) if !ip.is_empty() => {
                        uri.replace("[::]", ip).replace("0.0.0.0", ip)
                    }
                    _ => uri.to_string(),
                })
            })
            .collect()
    }

    /// Log files present on disk, per node: the blockchain's log, then the
    /// C-Chain, P-Chain and main logs.
    pub async fn available_logs(
        &self,
        blockchain_id: Option<Id>,
        include_c_chain: bool,
    ) -> Vec<PathBuf> {
        let mut prefixes = vec![];
        if let Some(id) = blockchain_id {
            prefixes.push(id.to_string());
        }
        if include_c_chain {
            prefixes.push("C".to_string());
        }
        prefixes.push("P".to_string());
        prefixes.push("main".to_string());

        let mut logs = vec![];

        for node in &self.nodes {
            let logs_dir = self.node_dir(node).join(LOGS_DIR);

            for prefix in &prefixes {
                let path = logs_dir.join(format!("{prefix}.log"));

                if tokio::fs::try_exists(&path).await.unwrap_or(false) {
                    logs.push(path);
                }
            }
        }

        logs
    }
}

fn port_of(address: &str) -> Option<u16> {
    address
        .trim_end_matches('/')
        .rsplit_once(':')
        .and_then(|(_, port)| port.parse().ok())
}

/// Compute the status of the network at `dir` from the liveness of its node
/// processes. Nodes without a process context count as not running.
pub async fn bootstrapping_status(dir: impl AsRef<Path>) -> LocalnetResult<BootstrappingStatus> {
    let network = Network::load(dir).await?;

    Ok(status_of(&network))
}

pub fn status_of(network: &Network) -> BootstrappingStatus {
    let running = network.nodes.iter().filter(|n| n.is_running()).count();

    match running {
        0 => BootstrappingStatus::NotBootstrapped,
        n if n == network.nodes.len() => BootstrappingStatus::FullyBootstrapped,
        _ => BootstrappingStatus::PartiallyBootstrapped,
    }
}

/// Recursively copy the content of `src` into `dst`, overwriting. A missing
/// `src` copies nothing.
pub(crate) async fn copy_dir(src: &Path, dst: &Path) -> LocalnetResult<()> {
    if !tokio::fs::try_exists(src).await.unwrap_or(false) {
        return Ok(());
    }

    create_dir_all(dst).await?;

    let (from, to) = (src.to_path_buf(), dst.to_path_buf());
    let options = fs_extra::dir::CopyOptions::new()
        .content_only(true)
        .overwrite(true);

    tokio::task::spawn_blocking(move || fs_extra::dir::copy(&from, &to, &options))
        .await
        .map_err(|e| LocalnetError::io("copy", src)(io::Error::other(e)))?
        .map_err(|e| LocalnetError::io("copy", src)(io::Error::other(e)))?;

    Ok(())
}

/// Copy the network at `src` into `dst` and load it there. Process contexts
/// are dropped from the copy since its nodes were never started.
pub async fn move_network(src: &Path, dst: &Path) -> LocalnetResult<Network> {
    if !tokio::fs::try_exists(src).await.unwrap_or(false) {
        return Err(LocalnetError::NotFound(src.to_path_buf()));
    }

    copy_dir(src, dst).await?;

    let mut entries = tokio::fs::read_dir(dst)
        .await
        .map_err(LocalnetError::io("read directory", dst))?;

    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(LocalnetError::io("read directory", dst))?
    {
        if entry.path().join(NODE_FILE).exists() {
            remove_process_context(&entry.path()).await?;
        }
    }

    debug!("Copied network '{}' to '{}'", src.display(), dst.display());

    Network::load(dst).await
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::localnet::{config::LOCAL_ID, process::ProcessContext},
        assert_matches::assert_matches,
        tempfile::tempdir,
    };

    async fn sample_network(dir: &Path, nodes: usize) -> Network {
        let mut network = Network::new(dir, LOCAL_ID, "/bin/node");
        network.nodes = new_nodes(nodes, &[], &[]).unwrap();
        network.genesis = Some(br#"{"networkID":12345}"#.to_vec());
        network.write().await.unwrap();
        network
    }

    fn running(pid: u32, port: u16) -> Option<ProcessContext> {
        Some(ProcessContext {
            pid,
            uri: format!("http://[::]:{port}"),
            staking_address: format!("127.0.0.1:{}", port + 1),
        })
    }

    #[tokio::test]
    async fn test_load_missing_is_not_found() {
        let dir = tempdir().unwrap();

        assert_matches!(
            Network::load(dir.path().join("nope")).await,
            Err(LocalnetError::NotFound(_))
        );

        tokio::fs::write(dir.path().join(CONFIG_FILE), b"garbage")
            .await
            .unwrap();
        assert_matches!(
            Network::load(dir.path()).await,
            Err(LocalnetError::NotFound(_))
        );
    }

    #[tokio::test]
    async fn test_write_then_load_keeps_identities() {
        let dir = tempdir().unwrap();
        let network = sample_network(dir.path(), 3).await;

        let loaded = Network::load(dir.path()).await.unwrap();

        let mut expected = network.nodes.iter().map(|n| n.node_id).collect::<Vec<_>>();
        expected.sort();
        assert_eq!(
            loaded.nodes.iter().map(|n| n.node_id).collect::<Vec<_>>(),
            expected
        );
        assert_eq!(loaded.genesis(), network.genesis());
        assert_eq!(loaded.network_id(), LOCAL_ID);
    }

    #[tokio::test]
    async fn test_status_counts_live_nodes() {
        let dir = tempdir().unwrap();
        let mut network = sample_network(dir.path(), 2).await;

        assert_eq!(status_of(&network), BootstrappingStatus::NotBootstrapped);

        network.nodes[0].process = running(std::process::id(), 9650);
        assert_eq!(
            status_of(&network),
            BootstrappingStatus::PartiallyBootstrapped
        );

        network.nodes[1].process = running(std::process::id(), 9652);
        assert_eq!(status_of(&network), BootstrappingStatus::FullyBootstrapped);
    }

    #[tokio::test]
    async fn test_effective_flags_compute_peers() {
        let dir = tempdir().unwrap();
        let mut network = sample_network(dir.path(), 3).await;
        network.nodes[1].process = running(std::process::id(), 9650);

        let flags = network.effective_flags(&network.nodes[0]);

        assert_eq!(flags[BOOTSTRAP_IPS_KEY], "127.0.0.1:9651");
        assert_eq!(
            flags[BOOTSTRAP_IDS_KEY],
            network.nodes[1].node_id.to_string()
        );
        assert_eq!(flags[NETWORK_ID_KEY], LOCAL_ID);
        assert_eq!(
            flags[GENESIS_FILE_KEY],
            path_value(&dir.path().join(GENESIS_FILE))
        );

        // Self is never a peer.
        let flags = network.effective_flags(&network.nodes[1]);
        assert_eq!(flags[BOOTSTRAP_IPS_KEY], "");
    }

    #[tokio::test]
    async fn test_effective_flags_keep_fixed_peers() {
        let dir = tempdir().unwrap();
        let mut network = sample_network(dir.path(), 2).await;
        network.nodes[1].process = running(std::process::id(), 9650);
        network.fixed_bootstrappers = true;
        network.default_flags.insert(BOOTSTRAP_IPS_KEY.into(), "10.0.0.1:9651".into());

        let flags = network.effective_flags(&network.nodes[0]);

        assert_eq!(flags[BOOTSTRAP_IPS_KEY], "10.0.0.1:9651");
    }

    #[tokio::test]
    async fn test_rebuild_chain_configs_prefers_overrides() {
        let dir = tempdir().unwrap();
        let network = sample_network(dir.path(), 2).await;
        let (chain_a, chain_b) = (Id::new([1; 32]), Id::new([2; 32]));
        let node = &network.nodes[0];

        network.set_chain_config(chain_a, b"shared-a").await.unwrap();
        network.set_chain_config(chain_b, b"shared-b").await.unwrap();
        network
            .set_node_chain_config(node.node_id, chain_a, b"override-a")
            .await
            .unwrap();

        network.rebuild_chain_configs(node).await.unwrap();

        let configs = network.node_dir(node).join(NODE_CHAIN_CONFIGS_DIR);
        let read = |chain: Id| {
            std::fs::read(configs.join(chain.to_string()).join(CHAIN_CONFIG_FILE)).unwrap()
        };
        assert_eq!(read(chain_a), b"override-a");
        assert_eq!(read(chain_b), b"shared-b");

        // The other node only sees shared configs.
        network.rebuild_chain_configs(&network.nodes[1]).await.unwrap();
        let other = network
            .node_dir(&network.nodes[1])
            .join(NODE_CHAIN_CONFIGS_DIR)
            .join(chain_a.to_string())
            .join(CHAIN_CONFIG_FILE);
        assert_eq!(std::fs::read(other).unwrap(), b"shared-a");
    }

    #[tokio::test]
    async fn test_persist_ports_and_uri_fix() {
        let dir = tempdir().unwrap();
        let mut network = sample_network(dir.path(), 1).await;
        network.nodes[0].process = running(std::process::id(), 9650);
        network.nodes[0]
            .flags
            .insert(PUBLIC_IP_KEY.into(), "192.168.1.10".into());

        network.persist_ports().await.unwrap();

        assert_eq!(network.nodes[0].http_port(), 9650);
        assert_eq!(network.nodes[0].staking_port(), 9651);
        assert_eq!(
            network.node_uris_with_fix(),
            vec!["http://192.168.1.10:9650".to_string()]
        );
    }

    #[tokio::test]
    async fn test_upgrade_roundtrip_and_public_network() {
        let dir = tempdir().unwrap();
        let mut network = sample_network(dir.path(), 1).await;

        assert_eq!(network.upgrade().unwrap(), None);
        network.set_upgrade(b"{}");
        assert_eq!(network.upgrade().unwrap(), Some(b"{}".to_vec()));

        assert!(!network.is_public_network());
        network.network_id = FUJI_ID;
        assert!(network.is_public_network());
    }

    #[tokio::test]
    async fn test_available_logs_order() {
        let dir = tempdir().unwrap();
        let network = sample_network(dir.path(), 1).await;
        let chain = Id::new([9; 32]);
        let logs_dir = network.node_dir(&network.nodes[0]).join(LOGS_DIR);
        std::fs::create_dir_all(&logs_dir).unwrap();
        for name in [format!("{chain}.log"), "P.log".into(), "main.log".into()] {
            std::fs::write(logs_dir.join(name), b"").unwrap();
        }

        let logs = network.available_logs(Some(chain), true).await;

        assert_eq!(
            logs,
            vec![
                logs_dir.join(format!("{chain}.log")),
                logs_dir.join("P.log"),
                logs_dir.join("main.log"),
            ]
        );
    }

    #[tokio::test]
    async fn test_move_network_drops_process_contexts() {
        let src = tempdir().unwrap();
        let dst = tempdir().unwrap();
        let network = sample_network(src.path(), 2).await;
        let node_dir = network.node_dir(&network.nodes[0]);
        std::fs::write(
            node_dir.join(PROCESS_CONTEXT_FILE),
            format!(
                r#"{{"pid":{},"uri":"http://127.0.0.1:9650","stakingAddress":"127.0.0.1:9651"}}"#,
                std::process::id()
            ),
        )
        .unwrap();

        let moved = move_network(src.path(), &dst.path().join("copy")).await.unwrap();

        assert_eq!(moved.nodes.len(), 2);
        assert_eq!(status_of(&moved), BootstrappingStatus::NotBootstrapped);
        assert!(node_dir.join(PROCESS_CONTEXT_FILE).exists());
    }
}
