//! Pointer to the directory currently backing "the" local network.
//!
//! Reading the status garbage-collects a pointer whose directory is gone, so
//! callers never need a separate cleanup pass.

use {
    super::{
        error::{LocalnetError, LocalnetResult},
        network::{bootstrapping_status, read_json, write_json, BootstrappingStatus},
    },
    log::debug,
    serde::{Deserialize, Serialize},
    std::{
        io,
        path::{Path, PathBuf},
    },
};

pub const LOCAL_NETWORK_META_FILE: &str = "local_network_meta.json";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalNetworkMeta {
    pub network_dir: PathBuf,
}

fn meta_path(app_dir: &Path) -> PathBuf {
    app_dir.join(LOCAL_NETWORK_META_FILE)
}

pub async fn save_local_network_meta(app_dir: &Path, network_dir: &Path) -> LocalnetResult<()> {
    let meta = LocalNetworkMeta {
        network_dir: network_dir.to_path_buf(),
    };

    write_json(&meta_path(app_dir), &meta).await
}

/// The stored pointer, or `None` when there is none.
pub async fn local_network_meta(app_dir: &Path) -> LocalnetResult<Option<LocalNetworkMeta>> {
    let path = meta_path(app_dir);

    if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
        return Ok(None);
    }

    read_json(&path).await.map(Some)
}

pub async fn remove_local_network_meta(app_dir: &Path) -> LocalnetResult<()> {
    let path = meta_path(app_dir);

    match tokio::fs::remove_file(&path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(LocalnetError::io("remove", &path)(e)),
    }
}

/// Status of the local network. A pointer to a missing directory is stale:
/// it is removed and the network reported as not bootstrapped.
pub async fn local_network_bootstrapping_status(
    app_dir: &Path,
) -> LocalnetResult<BootstrappingStatus> {
    let Some(meta) = local_network_meta(app_dir).await? else {
        return Ok(BootstrappingStatus::NotBootstrapped);
    };

    if !tokio::fs::try_exists(&meta.network_dir)
        .await
        .unwrap_or(false)
    {
        debug!(
            "Removing stale pointer to '{}'",
            meta.network_dir.display()
        );

        remove_local_network_meta(app_dir).await?;

        return Ok(BootstrappingStatus::NotBootstrapped);
    }

    bootstrapping_status(&meta.network_dir).await
}

/// Directory of the local network, only if every node is up.
pub async fn local_network_dir(app_dir: &Path) -> LocalnetResult<PathBuf> {
    if local_network_bootstrapping_status(app_dir).await? != BootstrappingStatus::FullyBootstrapped
    {
        return Err(LocalnetError::NotBootstrapped);
    }

    local_network_meta(app_dir)
        .await?
        .map(|meta| meta.network_dir)
        .ok_or(LocalnetError::NotBootstrapped)
}
