use {
    crate::{
        command_title,
        display::json_output,
        item,
        loading,
        network::snapshot_dir,
        notify_success,
        prelude::*,
    },
    log::warn,
    subnet_sdk::localnet::{
        cluster::{cluster_is_partially_running, cluster_stop, filtered_clusters},
        meta::{local_network_meta, remove_local_network_meta},
        network::move_network,
        NetworkManager,
    },
};

#[derive(Clone, Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct StoppedNetwork {
    /// Run directory of the stopped network, `None` when nothing ran.
    pub(crate) network_dir: Option<PathBuf>,
    pub(crate) snapshot_dir: Option<PathBuf>,
    /// Clusters connected to the local network that were stopped with it.
    pub(crate) stopped_clusters: Vec<String>,
}

/// Stop the local network and the clusters connected to it, save the run
/// directory as snapshot `snapshot_name` unless `dont_save`, then remove it.
pub(crate) async fn stop_network(
    conf: &CliConf,
    manager: &NetworkManager,
    snapshot_name: &str,
    dont_save: bool,
) -> AnyResult<StoppedNetwork, CliError> {
    command_title!("Stopping the local network");

    let snapshot = snapshot_dir(&conf.app_dir, snapshot_name)?;
    let mut stopped = StoppedNetwork::default();

    let Some(meta) = local_network_meta(&conf.app_dir).await? else {
        notify_success!("Local network is not running");

        json_output(&stopped)?;

        return Ok(stopped);
    };

    if !tokio::fs::try_exists(&meta.network_dir).await.unwrap_or(false) {
        remove_local_network_meta(&conf.app_dir).await?;

        notify_success!("Local network is not running");

        json_output(&stopped)?;

        return Ok(stopped);
    }

    let mut network = manager.load(&meta.network_dir).await?;

    stopped.stopped_clusters =
        stop_connected_clusters(conf, manager, network.network_id()).await?;

    let stop_handle = loading!("Stopping nodes...");

    if let Err(e) = manager.stop(&mut network).await {
        stop_handle.error();

        return Err(e.into());
    }

    stop_handle.success();

    remove_local_network_meta(&conf.app_dir).await?;

    if !dont_save {
        let save_handle = loading!("Saving snapshot...");

        if let Err(e) = save_snapshot(&network.dir, &snapshot).await {
            save_handle.error();

            return Err(e);
        }

        save_handle.success();

        item!(
            "Snapshot: {}",
            snapshot.display().to_string().truecolor(100, 100, 100)
        );

        stopped.snapshot_dir = Some(snapshot);
    }

    tokio::fs::remove_dir_all(&network.dir)
        .await
        .map_err(CliError::IoError)?;

    notify_success!("Local network stopped");

    stopped.network_dir = Some(network.dir);

    json_output(&stopped)?;

    Ok(stopped)
}

/// Replace the snapshot at `snapshot` with a copy of `network_dir`.
async fn save_snapshot(network_dir: &Path, snapshot: &Path) -> AnyResult<(), CliError> {
    match tokio::fs::remove_dir_all(snapshot).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(CliError::IoError(e)),
    }

    move_network(network_dir, snapshot).await?;

    Ok(())
}

/// Stop every cluster on `network_id` that has at least one node up.
/// Failures are logged: a stuck cluster must not keep the network running.
pub(crate) async fn stop_connected_clusters(
    conf: &CliConf,
    manager: &NetworkManager,
    network_id: u32,
) -> AnyResult<Vec<String>, CliError> {
    let mut stopped = vec![];

    for name in filtered_clusters(manager, &conf.app_dir, false, Some(network_id), None).await? {
        if !cluster_is_partially_running(&conf.app_dir, &name).await? {
            continue;
        }

        match cluster_stop(manager, &conf.app_dir, &name).await {
            Ok(()) => {
                item!("Stopped cluster '{name}'");

                stopped.push(name);
            }
            Err(e) => warn!("Failed to stop cluster '{name}': {e}"),
        }
    }

    Ok(stopped)
}
