//! Migration of clusters written in the legacy layout.
//!
//! A legacy cluster directory holds a single `network.json` describing every
//! node, with each node's state under `<cluster>/<node name>/`. Migration
//! moves the legacy directory aside to `<cluster>-migrated`, recreates the
//! cluster in the current layout from the same staking material and ports,
//! then copies node databases and plugins over. Clusters are migrated one by
//! one and a failure only affects the cluster at hand.

use {
    super::{
        cluster::{
            create_local_cluster,
            local_cluster_dir,
            local_clusters_dir,
            ClusterRequest,
            ConnectionSettings,
        },
        config::LOCAL_ID,
        error::{LocalnetError, LocalnetResult},
        manager::NetworkManager,
        network::{copy_dir, read_json, Network, DB_DIR, PLUGINS_DIR},
        node::{new_nodes, Flags, NodeSetting, HTTP_PORT_KEY, STAKING_PORT_KEY, TRACK_SUBNETS_KEY},
    },
    crate::ids::Id,
    base64::{engine::general_purpose::STANDARD, Engine},
    log::{info, warn},
    serde::Deserialize,
    serde_json::Value,
    std::path::{Path, PathBuf},
};

pub const LEGACY_NETWORK_FILE: &str = "network.json";
pub const MIGRATED_SUFFIX: &str = "-migrated";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyNetworkConfig {
    #[serde(rename = "networkID")]
    network_id: u32,
    #[serde(default)]
    binary_path: PathBuf,
    #[serde(default)]
    node_configs: Vec<LegacyNodeConfig>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyNodeConfig {
    name: String,
    staking_key: String,
    staking_cert: String,
    #[serde(default)]
    staking_signing_key: String,
    #[serde(default)]
    flags: serde_json::Map<String, Value>,
}

/// Outcome of a migration pass, one entry per legacy-looking directory.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MigrationReport {
    pub migrated: Vec<String>,
    /// Directories left alone, with the reason.
    pub skipped: Vec<(String, String)>,
    /// Clusters whose migration started and failed, with the error.
    pub failed: Vec<(String, String)>,
}

impl MigrationReport {
    pub fn is_empty(&self) -> bool {
        self.migrated.is_empty() && self.skipped.is_empty() && self.failed.is_empty()
    }
}

/// Flags every migrated cluster starts with.
fn migrated_default_flags() -> Flags {
    let mut flags = Flags::new();
    flags.insert("partial-sync-primary-network".into(), Value::Bool(true));
    flags.insert("network-allow-private-ips".into(), Value::Bool(true));
    flags.insert("index-enabled".into(), Value::Bool(false));
    flags.insert("index-allow-incomplete".into(), Value::Bool(true));
    flags
}

/// Migrate every legacy cluster under `<app_dir>/local-clusters`.
pub async fn migrate_legacy_clusters(
    manager: &NetworkManager,
    app_dir: &Path,
) -> LocalnetResult<MigrationReport> {
    let root = local_clusters_dir(app_dir);
    let mut report = MigrationReport::default();

    let mut entries = match tokio::fs::read_dir(&root).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(report),
        Err(e) => return Err(LocalnetError::io("read directory", &root)(e)),
    };

    let mut to_migrate = vec![];

    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(LocalnetError::io("read directory", &root))?
    {
        if !entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false) {
            continue;
        }

        let name = entry.file_name().to_string_lossy().into_owned();
        let dir = entry.path();

        if Network::load(&dir).await.is_ok() {
            continue;
        }

        if name.ends_with(MIGRATED_SUFFIX) {
            report.skipped.push((
                name,
                "partially migrated with failure, please recover manually".into(),
            ));
            continue;
        }

        let legacy_file = dir.join(LEGACY_NETWORK_FILE);

        if !tokio::fs::try_exists(&legacy_file).await.unwrap_or(false) {
            report.skipped.push((
                name,
                "unexpected format, please recover manually".into(),
            ));
            continue;
        }

        match read_json::<LegacyNetworkConfig>(&legacy_file).await {
            Ok(config) if config.network_id == LOCAL_ID => report.skipped.push((
                name,
                "legacy local network cluster, please remove manually".into(),
            )),
            Ok(_) => to_migrate.push(name),
            Err(e) => report
                .skipped
                .push((name, format!("{e}, please recover manually"))),
        }
    }

    to_migrate.sort();

    for name in to_migrate {
        info!("Migrating cluster '{name}'");

        match migrate_cluster(manager, app_dir, &name).await {
            Ok(()) => report.migrated.push(name),
            Err(e) => {
                warn!(
                    "Failed to migrate '{name}' at '{}': {e}",
                    local_cluster_dir(app_dir, &name).display()
                );

                report.failed.push((name, e.to_string()));
            }
        }
    }

    Ok(report)
}

async fn migrate_cluster(
    manager: &NetworkManager,
    app_dir: &Path,
    name: &str,
) -> LocalnetResult<()> {
    let network_dir = local_cluster_dir(app_dir, name);
    let legacy_dir = local_cluster_dir(app_dir, &format!("{name}{MIGRATED_SUFFIX}"));

    tokio::fs::rename(&network_dir, &legacy_dir)
        .await
        .map_err(LocalnetError::io("rename", &network_dir))?;

    let config: LegacyNetworkConfig = read_json(&legacy_dir.join(LEGACY_NETWORK_FILE)).await?;

    let mut settings = vec![];
    let mut tracked_subnets = vec![];

    for node in &config.node_configs {
        settings.push(node_setting(node)?);

        // Every legacy node tracks the same subnets.
        tracked_subnets = legacy_tracked_subnets(node)?;
    }

    let nodes = new_nodes(settings.len(), &settings, &tracked_subnets)?;

    let req = ClusterRequest::new(
        name,
        config.binary_path.clone(),
        ConnectionSettings::public(config.network_id),
        nodes,
    )
    .with_plugin_dir(network_dir.join(PLUGINS_DIR))
    .with_default_flags(migrated_default_flags());

    let network = create_local_cluster(manager, app_dir, req, None, None).await?;

    for (node, legacy) in network.nodes.iter().zip(&config.node_configs) {
        let legacy_node_dir = legacy_dir.join(&legacy.name);

        copy_dir(
            &legacy_node_dir.join(DB_DIR),
            &network.node_dir(node).join(DB_DIR),
        )
        .await?;
        copy_dir(
            &legacy_node_dir.join(PLUGINS_DIR),
            &network.plugin_dir(),
        )
        .await?;
    }

    info!(
        "Migrated '{name}', the legacy data stays at '{}'",
        legacy_dir.display()
    );

    Ok(())
}

fn node_setting(node: &LegacyNodeConfig) -> LocalnetResult<NodeSetting> {
    let staking_signer_key = if node.staking_signing_key.is_empty() {
        None
    } else {
        Some(STANDARD.decode(&node.staking_signing_key).map_err(|e| {
            LocalnetError::Config(format!("invalid signing key of node {}: {e}", node.name))
        })?)
    };

    Ok(NodeSetting {
        staking_cert: node.staking_cert.as_bytes().to_vec(),
        staking_key: node.staking_key.as_bytes().to_vec(),
        staking_signer_key,
        http_port: legacy_port(node, HTTP_PORT_KEY)?,
        staking_port: legacy_port(node, STAKING_PORT_KEY)?,
    })
}

fn legacy_port(node: &LegacyNodeConfig, key: &str) -> LocalnetResult<u16> {
    node.flags
        .get(key)
        .and_then(Value::as_f64)
        .filter(|port| (0.0..=f64::from(u16::MAX)).contains(port))
        .map(|port| port as u16)
        .ok_or_else(|| {
            LocalnetError::Config(format!(
                "failure reading legacy network conf: node {} has no valid '{key}'",
                node.name
            ))
        })
}

fn legacy_tracked_subnets(node: &LegacyNodeConfig) -> LocalnetResult<Vec<Id>> {
    let Some(tracked) = node.flags.get(TRACK_SUBNETS_KEY).and_then(Value::as_str) else {
        return Ok(vec![]);
    };

    tracked
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<Id>().map_err(LocalnetError::from))
        .collect()
}
