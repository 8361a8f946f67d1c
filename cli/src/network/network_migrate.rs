use {
    crate::{
        command_title,
        display::json_output,
        item,
        loading,
        notify_error,
        notify_success,
        prelude::*,
    },
    serde_json::json,
    subnet_sdk::localnet::{
        migration::{migrate_legacy_clusters, MigrationReport},
        NetworkManager,
    },
};

/// Convert every cluster still in the legacy layout. One failed cluster
/// does not stop the others.
pub(crate) async fn migrate_clusters(
    conf: &CliConf,
    manager: &NetworkManager,
) -> AnyResult<MigrationReport, CliError> {
    command_title!("Migrating legacy clusters");

    let migrate_handle = loading!("Looking for legacy clusters...");

    let report = match migrate_legacy_clusters(manager, &conf.app_dir).await {
        Ok(report) => {
            migrate_handle.success();

            report
        }
        Err(e) => {
            migrate_handle.error();

            return Err(e.into());
        }
    };

    if report.is_empty() {
        notify_success!("Nothing to migrate");
    }

    for name in &report.migrated {
        notify_success!("Migrated cluster '{name}'");
    }

    for (name, reason) in &report.skipped {
        item!("Skipped '{name}': {reason}");
    }

    for (name, error) in &report.failed {
        notify_error!("Failed to migrate '{name}': {error}");
    }

    let entries = |entries: &[(String, String)]| {
        entries
            .iter()
            .map(|(name, reason)| json!({ "name": name, "reason": reason }))
            .collect::<Vec<_>>()
    };

    json_output(&json!({
        "migrated": report.migrated,
        "skipped": entries(&report.skipped),
        "failed": entries(&report.failed),
    }))?;

    Ok(report)
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::network::test_helpers::*,
        subnet_sdk::{
            localnet::{
                cluster::local_cluster_dir,
                config::{FUJI_ID, LOCAL_ID},
                migration::{LEGACY_NETWORK_FILE, MIGRATED_SUFFIX},
            },
            test_utils::MockNodeApi,
        },
    };

    fn write_legacy(app: &Path, name: &str, network_id: u32) {
        let dir = local_cluster_dir(app, name);

        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join(LEGACY_NETWORK_FILE),
            json!({ "networkID": network_id, "nodeConfigs": [] }).to_string(),
        )
        .unwrap();
    }

    #[tokio::test]
    async fn test_nothing_to_migrate() {
        let app = tempfile::tempdir().unwrap();
        let conf = test_conf(app.path());
        let manager = test_manager(MockNodeApi::new());

        let report = migrate_clusters(&conf, &manager).await.unwrap();

        assert!(report.is_empty());
    }

    #[tokio::test]
    async fn test_report_lists_skips_and_failures() {
        let app = tempfile::tempdir().unwrap();
        let conf = test_conf(app.path());
        let manager = test_manager(MockNodeApi::new());

        write_legacy(app.path(), "local-legacy", LOCAL_ID);
        // A cluster without nodes cannot be recreated.
        write_legacy(app.path(), "empty", FUJI_ID);
        write_legacy(app.path(), &format!("old{MIGRATED_SUFFIX}"), FUJI_ID);

        let report = migrate_clusters(&conf, &manager).await.unwrap();

        assert!(report.migrated.is_empty());

        let mut skipped = report
            .skipped
            .iter()
            .map(|(name, _)| name.as_str())
            .collect::<Vec<_>>();
        skipped.sort();
        assert_eq!(skipped, vec!["local-legacy", "old-migrated"]);

        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "empty");
    }
}
