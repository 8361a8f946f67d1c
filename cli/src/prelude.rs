pub(crate) use {
    crate::error::CliError,
    anyhow::{anyhow, Result as AnyResult},
    clap::{builder::ValueParser, Args, Parser, Subcommand},
    colored::Colorize,
    serde::{Deserialize, Serialize},
    std::{
        path::{Path, PathBuf},
        sync::atomic::{AtomicBool, Ordering},
    },
};
use {
    std::{sync::Arc, time::Duration},
    subnet_sdk::{
        api::JsonRpcNodeApi,
        localnet::{
            config::LOCAL_ID,
            manager::DEFAULT_NODE_BINARY,
            LocalnetConfig,
            NetworkManager,
        },
    },
};

// Where to find config file.
pub(crate) const CLI_CONF_PATH: &str = "~/.subnet-cli/conf.toml";

/// Set from the global `--json` flag. Display macros stay silent and
/// commands print JSON instead.
pub(crate) static JSON_MODE: AtomicBool = AtomicBool::new(false);

/// Struct holding the config structure.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct CliConf {
    /// Root of everything the CLI writes: run directories, snapshots,
    /// clusters and the local network pointer.
    #[serde(default = "default_app_dir")]
    pub(crate) app_dir: PathBuf,
    #[serde(default)]
    pub(crate) node: NodeConf,
    #[serde(default)]
    pub(crate) timeouts: TimeoutConf,
}

impl Default for CliConf {
    fn default() -> Self {
        Self {
            app_dir: default_app_dir(),
            node: NodeConf::default(),
            timeouts: TimeoutConf::default(),
        }
    }
}

impl CliConf {
    pub(crate) async fn load_from_path(path: &Path) -> AnyResult<Self> {
        let conf = tokio::fs::read_to_string(path).await?;

        Ok(toml::from_str(&conf)?)
    }

    pub(crate) async fn save_to_path(&self, path: &Path) -> AnyResult<()> {
        let conf = toml::to_string_pretty(&self)?;

        if let Some(parent_folder) = path.parent() {
            tokio::fs::create_dir_all(parent_folder).await?;
        }

        tokio::fs::write(path, conf).await?;

        Ok(())
    }

    /// Timing knobs handed to the orchestrator.
    pub(crate) fn localnet_config(&self) -> LocalnetConfig {
        LocalnetConfig::default()
            .with_bootstrap_timeout(Duration::from_secs(self.timeouts.bootstrap_secs))
            .with_stop_timeout(Duration::from_secs(self.timeouts.stop_secs))
    }

    /// Orchestrator talking to real nodes over JSON-RPC.
    pub(crate) fn network_manager(&self) -> AnyResult<NetworkManager> {
        let api = JsonRpcNodeApi::builder().build()?;

        Ok(NetworkManager::new(Arc::new(api)).with_config(self.localnet_config()))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct NodeConf {
    #[serde(default = "default_binary_path")]
    pub(crate) binary_path: PathBuf,
    #[serde(default = "default_num_nodes")]
    pub(crate) num_nodes: usize,
    #[serde(default = "default_network_id")]
    pub(crate) network_id: u32,
    /// Custom genesis. The node's built-in one is used when unset.
    #[serde(default)]
    pub(crate) genesis_path: Option<PathBuf>,
}

impl Default for NodeConf {
    fn default() -> Self {
        Self {
            binary_path: default_binary_path(),
            num_nodes: default_num_nodes(),
            network_id: default_network_id(),
            genesis_path: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct TimeoutConf {
    #[serde(default = "default_timeout_secs")]
    pub(crate) bootstrap_secs: u64,
    #[serde(default = "default_timeout_secs")]
    pub(crate) stop_secs: u64,
}

impl Default for TimeoutConf {
    fn default() -> Self {
        Self {
            bootstrap_secs: default_timeout_secs(),
            stop_secs: default_timeout_secs(),
        }
    }
}

/// Hidden argument used for testing to set the path of the configuration
/// file.
#[derive(Args, Clone, Debug)]
pub(crate) struct ConfPathArgs {
    #[arg(
        long = "conf-path",
        hide = true,
        default_value = CLI_CONF_PATH,
        value_parser = ValueParser::from(expand_tilde)
    )]
    pub(crate) conf_path: PathBuf,
}

impl ConfPathArgs {
    /// Stored configuration, or the defaults when there is none yet.
    pub(crate) async fn load_conf(&self) -> CliConf {
        CliConf::load_from_path(&self.conf_path)
            .await
            .unwrap_or_default()
    }
}

// == Used by clap ==

/// Expands `~/` to the user's home directory in path arguments.
pub(crate) fn expand_tilde(path: &str) -> AnyResult<PathBuf> {
    if let Some(path) = path.strip_prefix("~/") {
        match home::home_dir() {
            Some(home) => return Ok(home.join(path)),
            None => return Err(anyhow!("Could not find home directory")),
        }
    }

    Ok(path.into())
}

// == Used by serde ==

fn default_app_dir() -> PathBuf {
    home::home_dir().unwrap_or_default().join(".subnet-cli")
}

fn default_binary_path() -> PathBuf {
    PathBuf::from(DEFAULT_NODE_BINARY)
}

fn default_num_nodes() -> usize {
    2
}

fn default_network_id() -> u32 {
    LOCAL_ID
}

fn default_timeout_secs() -> u64 {
    120
}
