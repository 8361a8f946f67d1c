use crate::{command_title, display::json_output, item, loading, prelude::*};

#[derive(Args, Clone, Debug)]
pub(crate) struct ConfCommand {
    #[arg(
        long = "app-dir",
        help = "Set the directory holding networks, snapshots and clusters",
        value_name = "PATH",
        value_parser = ValueParser::from(expand_tilde)
    )]
    app_dir: Option<PathBuf>,
    #[arg(
        long = "node.binary-path",
        help = "Set the node binary used for new networks",
        value_name = "PATH",
        value_parser = ValueParser::from(expand_tilde)
    )]
    node_binary_path: Option<PathBuf>,
    #[arg(
        long = "node.num-nodes",
        help = "Set how many nodes a new local network has",
        value_name = "COUNT"
    )]
    node_num_nodes: Option<usize>,
    #[arg(
        long = "node.network-id",
        help = "Set the network ID of new local networks",
        value_name = "ID"
    )]
    node_network_id: Option<u32>,
    #[arg(
        long = "node.genesis-path",
        help = "Set a custom genesis file for new local networks",
        value_name = "PATH",
        value_parser = ValueParser::from(expand_tilde)
    )]
    node_genesis_path: Option<PathBuf>,
    #[arg(
        long = "timeouts.bootstrap-secs",
        help = "Set how long to wait for a network to bootstrap",
        value_name = "SECONDS"
    )]
    timeouts_bootstrap_secs: Option<u64>,
    #[arg(
        long = "timeouts.stop-secs",
        help = "Set how long stopped nodes may take to exit",
        value_name = "SECONDS"
    )]
    timeouts_stop_secs: Option<u64>,
    #[command(flatten)]
    conf: ConfPathArgs,
}

impl ConfCommand {
    fn is_empty(&self) -> bool {
        self.app_dir.is_none()
            && self.node_binary_path.is_none()
            && self.node_num_nodes.is_none()
            && self.node_network_id.is_none()
            && self.node_genesis_path.is_none()
            && self.timeouts_bootstrap_secs.is_none()
            && self.timeouts_stop_secs.is_none()
    }
}

/// Handle the provided conf command. The [ConfCommand] instance is passed from
/// [crate::main].
pub(crate) async fn handle(command: ConfCommand) -> AnyResult<(), CliError> {
    let mut conf = command.conf.load_conf().await;

    // If all fields are None, we just want to display the current configuration.
    if command.is_empty() {
        command_title!("Current Subnet CLI Configuration");

        print_conf(&conf);

        return json_output(&conf);
    }

    if command.node_num_nodes == Some(0) {
        return Err(CliError::Any(anyhow!("A network needs at least one node")));
    }

    command_title!("Updating Subnet CLI Configuration");

    let conf_handle = loading!("Updating configuration...");

    let ConfCommand {
        app_dir,
        node_binary_path,
        node_num_nodes,
        node_network_id,
        node_genesis_path,
        timeouts_bootstrap_secs,
        timeouts_stop_secs,
        conf: conf_path,
    } = command;

    conf.app_dir = app_dir.unwrap_or(conf.app_dir);
    conf.node.binary_path = node_binary_path.unwrap_or(conf.node.binary_path);
    conf.node.num_nodes = node_num_nodes.unwrap_or(conf.node.num_nodes);
    conf.node.network_id = node_network_id.unwrap_or(conf.node.network_id);
    conf.node.genesis_path = node_genesis_path.or(conf.node.genesis_path);
    conf.timeouts.bootstrap_secs = timeouts_bootstrap_secs.unwrap_or(conf.timeouts.bootstrap_secs);
    conf.timeouts.stop_secs = timeouts_stop_secs.unwrap_or(conf.timeouts.stop_secs);

    match conf.save_to_path(&conf_path.conf_path).await {
        Ok(()) => {
            conf_handle.success();

            json_output(&conf)
        }
        Err(e) => {
            conf_handle.error();

            Err(CliError::Any(e))
        }
    }
}

fn print_conf(conf: &CliConf) {
    item!("app_dir: {}", conf.app_dir.display());
    item!("node.binary_path: {}", conf.node.binary_path.display());
    item!("node.num_nodes: {}", conf.node.num_nodes);
    item!("node.network_id: {}", conf.node.network_id);
    item!(
        "node.genesis_path: {}",
        conf.node
            .genesis_path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "-".to_string())
    );
    item!("timeouts.bootstrap_secs: {}", conf.timeouts.bootstrap_secs);
    item!("timeouts.stop_secs: {}", conf.timeouts.stop_secs);
}

#[cfg(test)]
mod tests {
    use {super::*, assert_matches::assert_matches};

    fn command(path: &Path) -> ConfCommand {
        ConfCommand {
            app_dir: None,
            node_binary_path: None,
            node_num_nodes: None,
            node_network_id: None,
            node_genesis_path: None,
            timeouts_bootstrap_secs: None,
            timeouts_stop_secs: None,
            conf: ConfPathArgs {
                conf_path: path.to_path_buf(),
            },
        }
    }

    #[tokio::test]
    async fn test_conf_loads_and_saves() {
        let tempdir = tempfile::tempdir().unwrap();
        let path = tempdir.path().join("conf.toml");

        assert!(!tokio::fs::try_exists(&path).await.unwrap());

        // Command saves values.
        let result = handle(ConfCommand {
            app_dir: Some(tempdir.path().join("app")),
            node_binary_path: Some(PathBuf::from("/opt/node/bin/node")),
            node_num_nodes: Some(5),
            timeouts_bootstrap_secs: Some(30),
            ..command(&path)
        })
        .await;

        assert_matches!(result, Ok(()));

        let conf = CliConf::load_from_path(&path).await.unwrap();

        assert_eq!(conf.app_dir, tempdir.path().join("app"));
        assert_eq!(conf.node.binary_path, PathBuf::from("/opt/node/bin/node"));
        assert_eq!(conf.node.num_nodes, 5);
        assert_eq!(conf.timeouts.bootstrap_secs, 30);
        assert_eq!(conf.timeouts.stop_secs, 120);

        // Overriding one value will save that one value and leave other values intact.
        let result = handle(ConfCommand {
            node_network_id: Some(1337),
            ..command(&path)
        })
        .await;

        assert_matches!(result, Ok(()));

        let conf = CliConf::load_from_path(&path).await.unwrap();

        assert_eq!(conf.node.network_id, 1337);
        assert_eq!(conf.node.num_nodes, 5);
        assert_eq!(conf.app_dir, tempdir.path().join("app"));

        // Displaying does not touch the file.
        let before = tokio::fs::read_to_string(&path).await.unwrap();

        assert_matches!(handle(command(&path)).await, Ok(()));
        assert_eq!(tokio::fs::read_to_string(&path).await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_zero_nodes_is_rejected() {
        let tempdir = tempfile::tempdir().unwrap();
        let path = tempdir.path().join("conf.toml");

        let result = handle(ConfCommand {
            node_num_nodes: Some(0),
            ..command(&path)
        })
        .await;

        assert_matches!(result, Err(CliError::Any(_)));
        assert!(!tokio::fs::try_exists(&path).await.unwrap());
    }
}
