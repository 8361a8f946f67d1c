use {
    crate::{
        command_title,
        item,
        network::{runs_dir, snapshots_dir},
        notify_error,
        notify_success,
        prelude::*,
    },
    subnet_sdk::localnet::{
        cluster::{cluster_remove, filtered_clusters},
        meta::{local_network_meta, remove_local_network_meta},
        NetworkManager,
    },
};

/// Stop whatever is up, even partially, and remove the local network
/// pointer, every run directory, every snapshot and every cluster connected
/// to the local network.
pub(crate) async fn clean_network(
    conf: &CliConf,
    manager: &NetworkManager,
) -> AnyResult<(), CliError> {
    command_title!("Cleaning the local network");

    let mut network_id = conf.node.network_id;

    if let Some(meta) = local_network_meta(&conf.app_dir).await? {
        // A pointer to a half-written or vanished run is simply dropped.
        if let Ok(mut network) = manager.load(&meta.network_dir).await {
            network_id = network.network_id();

            match manager.stop(&mut network).await {
                Ok(()) => item!("Stopped nodes of '{}'", network.dir.display()),
                Err(e) => notify_error!("Failed to stop the local network: {e}"),
            }
        }
    }

    remove_local_network_meta(&conf.app_dir).await?;

    for name in filtered_clusters(manager, &conf.app_dir, false, Some(network_id), None).await? {
        match cluster_remove(manager, &conf.app_dir, &name).await {
            Ok(()) => item!("Removed cluster '{name}'"),
            Err(e) => notify_error!("Failed to remove cluster '{name}': {e}"),
        }
    }

    for dir in [runs_dir(&conf.app_dir), snapshots_dir(&conf.app_dir)] {
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(CliError::IoError(e)),
        }
    }

    notify_success!("Local network state removed");

    Ok(())
}
