use {
    crate::{
        command_title,
        display::json_output,
        item,
        loading,
        network::{runs_dir, snapshot_dir, versioned_binary_path},
        notify_success,
        prelude::*,
    },
    log::warn,
    subnet_sdk::localnet::{
        manager::CreateOptions,
        meta::{local_network_bootstrapping_status, local_network_meta, save_local_network_meta},
        network::{move_network, CONFIG_FILE},
        node::new_nodes,
        BootstrappingStatus,
        LocalnetError,
        Network,
        NetworkManager,
    },
};

/// What `network start` was asked for, flags already merged with the
/// configuration.
pub(crate) struct StartOptions {
    pub(crate) snapshot_name: String,
    /// Explicitly requested binary. Overrides the one a snapshot was taken
    /// with.
    pub(crate) binary_path: Option<PathBuf>,
    pub(crate) num_nodes: usize,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct StartedNetwork {
    pub(crate) network_dir: PathBuf,
    pub(crate) endpoints: Vec<String>,
    pub(crate) already_running: bool,
}

/// An explicit path wins over an installed version. `None` leaves the choice
/// to the snapshot or the configuration.
pub(crate) fn resolve_binary_path(
    conf: &CliConf,
    version: Option<&str>,
    path: Option<PathBuf>,
) -> AnyResult<Option<PathBuf>, CliError> {
    if path.is_some() {
        return Ok(path);
    }

    let Some(version) = version else {
        return Ok(None);
    };

    let path = versioned_binary_path(&conf.app_dir, version);

    if !path.is_file() {
        return Err(CliError::Any(anyhow!(
            "Node version {version} is not installed, expected a binary at '{}'",
            path.display()
        )));
    }

    Ok(Some(path))
}

/// Start the local network: report it when it already runs, otherwise
/// restore the snapshot into a fresh run directory (or create a new network)
/// and boot it.
pub(crate) async fn start_network(
    conf: &CliConf,
    manager: &NetworkManager,
    opts: StartOptions,
) -> AnyResult<StartedNetwork, CliError> {
    command_title!("Starting the local network");

    let snapshot = snapshot_dir(&conf.app_dir, &opts.snapshot_name)?;

    match local_network_bootstrapping_status(&conf.app_dir).await? {
        BootstrappingStatus::FullyBootstrapped => {
            let Some(meta) = local_network_meta(&conf.app_dir).await? else {
                return Err(LocalnetError::NotBootstrapped.into());
            };

            let network = manager.load(&meta.network_dir).await?;

            notify_success!("Local network is already running");

            return report(&network, true);
        }
        BootstrappingStatus::PartiallyBootstrapped => {
            return Err(CliError::Any(anyhow!(
                "The local network is partially running. Run `subnet network clean` and start again"
            )));
        }
        BootstrappingStatus::NotBootstrapped | BootstrappingStatus::Undefined => {}
    }

    let run_dir = new_run_dir(&conf.app_dir).await;

    let mut network = if tokio::fs::try_exists(snapshot.join(CONFIG_FILE))
        .await
        .unwrap_or(false)
    {
        let restore_handle = loading!("Restoring snapshot...");

        match restore_snapshot(&snapshot, &run_dir, opts.binary_path).await {
            Ok(network) => {
                restore_handle.success();

                network
            }
            Err(e) => {
                restore_handle.error();

                remove_run_dir(&run_dir).await;

                return Err(e.into());
            }
        }
    } else {
        let create_handle = loading!("Creating a new network...");

        match create(conf, manager, &run_dir, opts).await {
            Ok(network) => {
                create_handle.success();

                network
            }
            Err(e) => {
                create_handle.error();

                remove_run_dir(&run_dir).await;

                return Err(e);
            }
        }
    };

    let deadline = manager.deadline(None);
    let boot_handle = loading!("Booting nodes...");

    if let Err(e) = manager.start(&mut network, Some(deadline)).await {
        boot_handle.error();

        if let Err(stop) = manager.stop(&mut network).await {
            warn!("Failed to stop nodes of a failed start: {stop}");
        }

        remove_run_dir(&run_dir).await;

        return Err(e.into());
    }

    boot_handle.success();

    save_local_network_meta(&conf.app_dir, &run_dir).await?;

    let alias_handle = loading!("Aliasing blockchains...");

    match manager.set_default_aliases(&network, Some(deadline)).await {
        Ok(()) => alias_handle.success(),
        Err(e) => {
            alias_handle.error();

            return Err(e.into());
        }
    }

    notify_success!("Local network is up");

    report(&network, false)
}

async fn restore_snapshot(
    snapshot: &Path,
    run_dir: &Path,
    binary_path: Option<PathBuf>,
) -> Result<Network, LocalnetError> {
    let mut network = move_network(snapshot, run_dir).await?;

    if let Some(binary_path) = binary_path {
        network.runtime.binary_path = binary_path;
        network.write_config().await?;
    }

    Ok(network)
}

async fn create(
    conf: &CliConf,
    manager: &NetworkManager,
    run_dir: &Path,
    opts: StartOptions,
) -> AnyResult<Network, CliError> {
    let nodes = new_nodes(opts.num_nodes, &[], &[])?;
    let binary_path = opts
        .binary_path
        .unwrap_or_else(|| conf.node.binary_path.clone());

    let mut create = CreateOptions::new(run_dir, conf.node.network_id, nodes)
        .with_binary_path(binary_path);

    if let Some(genesis_path) = &conf.node.genesis_path {
        let genesis = tokio::fs::read(genesis_path)
            .await
            .map_err(CliError::IoError)?;

        create = create.with_genesis(genesis);
    }

    Ok(manager.create(create, None).await?)
}

/// A run directory named after the current time that does not exist yet.
async fn new_run_dir(app_dir: &Path) -> PathBuf {
    let base = format!("network_{}", chrono::Local::now().format("%Y%m%d_%H%M%S"));
    let mut dir = runs_dir(app_dir).join(&base);
    let mut attempt = 1;

    while tokio::fs::try_exists(&dir).await.unwrap_or(false) {
        dir = runs_dir(app_dir).join(format!("{base}_{attempt}"));
        attempt += 1;
    }

    dir
}

async fn remove_run_dir(run_dir: &Path) {
    if let Err(e) = tokio::fs::remove_dir_all(run_dir).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!("Failed to remove '{}': {e}", run_dir.display());
        }
    }
}

fn report(network: &Network, already_running: bool) -> AnyResult<StartedNetwork, CliError> {
    let started = StartedNetwork {
        network_dir: network.dir.clone(),
        endpoints: network.node_uris_with_fix(),
        already_running,
    };

    item!(
        "Network directory: {}",
        started
            .network_dir
            .display()
            .to_string()
            .truecolor(100, 100, 100)
    );

    for endpoint in &started.endpoints {
        item!("Endpoint: {}", endpoint.truecolor(100, 100, 100));
    }

    json_output(&started)?;

    Ok(started)
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::network::{network_stop::stop_network, test_helpers::*},
        assert_matches::assert_matches,
        subnet_sdk::{
            localnet::process::PROCESS_CONTEXT_FILE,
            test_utils::{write_failing_node_binary, MockNodeApi},
        },
    };

    fn opts(snapshot_name: &str) -> StartOptions {
        StartOptions {
            snapshot_name: snapshot_name.to_string(),
            binary_path: None,
            num_nodes: 2,
        }
    }

    #[tokio::test]
    async fn test_start_creates_then_reports_running_network() {
        let app = tempfile::tempdir().unwrap();
        let conf = test_conf(app.path());
        let manager = test_manager(MockNodeApi::new());

        let started = start_network(&conf, &manager, opts("default"))
            .await
            .unwrap();

        assert!(!started.already_running);
        assert_eq!(started.endpoints.len(), 2);
        assert!(started.network_dir.starts_with(runs_dir(app.path())));

        let meta = local_network_meta(app.path()).await.unwrap().unwrap();
        assert_eq!(meta.network_dir, started.network_dir);

        // Second start only reports.
        let again = start_network(&conf, &manager, opts("default"))
            .await
            .unwrap();

        assert!(again.already_running);
        assert_eq!(again.network_dir, started.network_dir);
        assert_eq!(again.endpoints, started.endpoints);

        stop_network(&conf, &manager, "default", true).await.unwrap();
    }

    #[tokio::test]
    async fn test_start_restores_snapshot() {
        let app = tempfile::tempdir().unwrap();
        let conf = test_conf(app.path());
        let manager = test_manager(MockNodeApi::new());

        let first = start_network(&conf, &manager, opts("saved")).await.unwrap();
        let first_nodes = manager.load(&first.network_dir).await.unwrap().nodes;

        stop_network(&conf, &manager, "saved", false).await.unwrap();

        // Node count of the snapshot wins over the requested one.
        let restored = start_network(
            &conf,
            &manager,
            StartOptions {
                num_nodes: 5,
                ..opts("saved")
            },
        )
        .await
        .unwrap();

        assert!(!restored.already_running);
        assert_eq!(restored.endpoints.len(), 2);

        let restored_nodes = manager.load(&restored.network_dir).await.unwrap().nodes;
        let ids = |nodes: &[subnet_sdk::localnet::Node]| {
            nodes.iter().map(|n| n.node_id).collect::<Vec<_>>()
        };

        assert_eq!(ids(&restored_nodes), ids(&first_nodes));

        // The snapshot itself is left untouched.
        assert!(snapshot_dir(app.path(), "saved")
            .unwrap()
            .join(CONFIG_FILE)
            .exists());

        stop_network(&conf, &manager, "saved", true).await.unwrap();
    }

    #[tokio::test]
    async fn test_failed_start_leaves_nothing_behind() {
        let app = tempfile::tempdir().unwrap();
        let mut conf = test_conf(app.path());
        conf.node.binary_path = write_failing_node_binary(app.path()).unwrap();
        let manager = test_manager(MockNodeApi::new());

        let result = start_network(&conf, &manager, opts("default")).await;

        assert_matches!(result, Err(CliError::Localnet(_)));
        assert!(local_network_meta(app.path()).await.unwrap().is_none());

        let mut runs = tokio::fs::read_dir(runs_dir(app.path())).await.unwrap();
        assert!(runs.next_entry().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_partially_running_network_is_refused() {
        let app = tempfile::tempdir().unwrap();
        let conf = test_conf(app.path());
        let manager = test_manager(MockNodeApi::new());

        let started = start_network(&conf, &manager, opts("default"))
            .await
            .unwrap();

        // Forget about one node: it keeps running but no longer counts.
        let network = manager.load(&started.network_dir).await.unwrap();
        let orphan = &network.nodes[0];
        let pid = orphan.process.as_ref().unwrap().pid;
        tokio::fs::remove_file(network.node_dir(orphan).join(PROCESS_CONTEXT_FILE))
            .await
            .unwrap();

        let result = start_network(&conf, &manager, opts("default")).await;

        assert_matches!(result, Err(CliError::Any(_)));

        std::process::Command::new("kill")
            .arg(pid.to_string())
            .status()
            .unwrap();
        stop_network(&conf, &manager, "default", true).await.unwrap();
    }

    #[test]
    fn test_resolve_binary_path() {
        let app = tempfile::tempdir().unwrap();
        let conf = test_conf(app.path());

        assert_eq!(resolve_binary_path(&conf, None, None).unwrap(), None);
        assert_eq!(
            resolve_binary_path(&conf, Some("v1.0.0"), Some(PathBuf::from("/bin/node"))).unwrap(),
            Some(PathBuf::from("/bin/node"))
        );
        assert_matches!(
            resolve_binary_path(&conf, Some("v1.0.0"), None),
            Err(CliError::Any(_))
        );

        let installed = versioned_binary_path(app.path(), "v1.0.0");
        std::fs::create_dir_all(installed.parent().unwrap()).unwrap();
        std::fs::write(&installed, "").unwrap();

        assert_eq!(
            resolve_binary_path(&conf, Some("v1.0.0"), None).unwrap(),
            Some(installed)
        );
    }
}
