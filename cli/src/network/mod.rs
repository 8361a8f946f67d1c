mod network_clean;
mod network_migrate;
mod network_start;
mod network_status;
mod network_stop;

use {
    crate::prelude::*,
    network_clean::*,
    network_migrate::*,
    network_start::*,
    network_status::*,
    network_stop::*,
};

pub(crate) const DEFAULT_SNAPSHOT_NAME: &str = "default";
/// Every `network start` runs in a fresh directory under here.
const RUNS_DIR: &str = "runs";
const SNAPSHOTS_DIR: &str = "snapshots";
/// Installed node binaries, one `avalanchego-<version>` directory each.
const BIN_DIR: &str = "bin";

pub(crate) fn runs_dir(app_dir: &Path) -> PathBuf {
    app_dir.join(RUNS_DIR)
}

pub(crate) fn snapshots_dir(app_dir: &Path) -> PathBuf {
    app_dir.join(SNAPSHOTS_DIR)
}

/// Directory of snapshot `name`. Names are single path components.
pub(crate) fn snapshot_dir(app_dir: &Path, name: &str) -> AnyResult<PathBuf, CliError> {
    if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']) {
        return Err(CliError::Any(anyhow!("Invalid snapshot name '{name}'")));
    }

    Ok(snapshots_dir(app_dir).join(name))
}

pub(crate) fn versioned_binary_path(app_dir: &Path, version: &str) -> PathBuf {
    app_dir
        .join(BIN_DIR)
        .join(format!("avalanchego-{version}"))
        .join("avalanchego")
}

#[derive(Subcommand)]
pub(crate) enum NetworkCommand {
    #[command(about = "Start the local network, restoring a snapshot when there is one")]
    Start {
        /// Snapshot to restore the network from
        #[arg(
            long = "snapshot-name",
            help = "Snapshot to restore the network from",
            default_value = DEFAULT_SNAPSHOT_NAME,
            value_name = "NAME"
        )]
        snapshot_name: String,
        /// Installed node version to run
        #[arg(
            long = "avalanchego-version",
            help = "Installed node version to run",
            value_name = "VERSION",
            conflicts_with = "node_binary_path"
        )]
        avalanchego_version: Option<String>,
        /// Node binary to run
        #[arg(
            long = "node-binary-path",
            help = "Node binary to run",
            value_name = "PATH",
            value_parser = ValueParser::from(expand_tilde)
        )]
        node_binary_path: Option<PathBuf>,
        /// Number of nodes of a newly created network
        #[arg(
            long = "num-nodes",
            help = "Number of nodes of a newly created network",
            value_name = "COUNT"
        )]
        num_nodes: Option<usize>,
        #[command(flatten)]
        conf: ConfPathArgs,
    },
    #[command(about = "Stop the local network and save it as a snapshot")]
    Stop {
        /// Snapshot to save the network as
        #[arg(
            long = "snapshot-name",
            help = "Snapshot to save the network as",
            default_value = DEFAULT_SNAPSHOT_NAME,
            value_name = "NAME"
        )]
        snapshot_name: String,
        /// Discard the network instead of saving it
        #[arg(long = "dont-save", help = "Discard the network instead of saving it")]
        dont_save: bool,
        #[command(flatten)]
        conf: ConfPathArgs,
    },
    #[command(
        about = "Stop everything and remove the local network, its snapshots and connected clusters"
    )]
    Clean {
        #[command(flatten)]
        conf: ConfPathArgs,
    },
    #[command(about = "Show endpoints and health of the local network and running clusters")]
    Status {
        #[command(flatten)]
        conf: ConfPathArgs,
    },
    #[command(about = "Convert clusters written in the legacy layout")]
    Migrate {
        #[command(flatten)]
        conf: ConfPathArgs,
    },
}

/// Handle the provided network command. The [NetworkCommand] instance is passed
/// from [crate::main].
pub(crate) async fn handle(command: NetworkCommand) -> AnyResult<(), CliError> {
    match command {
        // == `$ subnet network start` ==
        NetworkCommand::Start {
            snapshot_name,
            avalanchego_version,
            node_binary_path,
            num_nodes,
            conf,
        } => {
            let conf = conf.load_conf().await;
            let manager = conf.network_manager().map_err(CliError::Any)?;
            let opts = StartOptions {
                snapshot_name,
                binary_path: resolve_binary_path(
                    &conf,
                    avalanchego_version.as_deref(),
                    node_binary_path,
                )?,
                num_nodes: num_nodes.unwrap_or(conf.node.num_nodes),
            };

            start_network(&conf, &manager, opts).await.map(|_| ())
        }

        // == `$ subnet network stop` ==
        NetworkCommand::Stop {
            snapshot_name,
            dont_save,
            conf,
        } => {
            let conf = conf.load_conf().await;
            let manager = conf.network_manager().map_err(CliError::Any)?;

            stop_network(&conf, &manager, &snapshot_name, dont_save)
                .await
                .map(|_| ())
        }

        // == `$ subnet network clean` ==
        NetworkCommand::Clean { conf } => {
            let conf = conf.load_conf().await;
            let manager = conf.network_manager().map_err(CliError::Any)?;

            clean_network(&conf, &manager).await
        }

        // == `$ subnet network status` ==
        NetworkCommand::Status { conf } => {
            let conf = conf.load_conf().await;
            let manager = conf.network_manager().map_err(CliError::Any)?;

            network_status(&conf, &manager).await.map(|_| ())
        }

        // == `$ subnet network migrate` ==
        NetworkCommand::Migrate { conf } => {
            let conf = conf.load_conf().await;
            let manager = conf.network_manager().map_err(CliError::Any)?;

            let report = migrate_clusters(&conf, &manager).await?;

            if !report.failed.is_empty() {
                return Err(CliError::Any(anyhow!(
                    "{} cluster(s) failed to migrate",
                    report.failed.len()
                )));
            }

            Ok(())
        }
    }
}


#[cfg(test)]
mod tests {
    use {super::*, assert_matches::assert_matches};

    #[test]
    fn test_snapshot_names_are_single_components() {
        let app = Path::new("/tmp/app");

        assert_eq!(
            snapshot_dir(app, "default").unwrap(),
            PathBuf::from("/tmp/app/snapshots/default")
        );

        for name in ["", ".", "..", "a/b", "a\\b"] {
            assert_matches!(snapshot_dir(app, name), Err(CliError::Any(_)));
        }
    }

    #[test]
    fn test_versioned_binary_path() {
        assert_eq!(
            versioned_binary_path(Path::new("/tmp/app"), "v1.11.0"),
            PathBuf::from("/tmp/app/bin/avalanchego-v1.11.0/avalanchego")
        );
    }
}
