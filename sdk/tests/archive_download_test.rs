#![cfg(feature = "localnet")]

use {
    anyhow::Result,
    mockito::{Server, ServerGuard},
    std::{sync::Arc, time::Duration},
    subnet_sdk::localnet::{
        archive::{ArchiveSeeder, ArchiveSource, HttpArchiveSource},
        error::LocalnetError,
        network::DB_DIR,
        NetworkKind,
    },
    tempfile::tempdir,
};

fn tar_with(path: &str, content: &[u8]) -> Result<Vec<u8>> {
    let mut builder = tar::Builder::new(Vec::new());
    let mut header = tar::Header::new_gnu();
    header.set_size(content.len() as u64);
    header.set_mode(0o644);
    header.set_cksum();
    builder.append_data(&mut header, path, content)?;

    Ok(builder.into_inner()?)
}

/// Setup mock server serving archives
async fn setup_mock_server() -> Result<(ServerGuard, HttpArchiveSource)> {
    let server = Server::new_async().await;
    let source = HttpArchiveSource::builder()
        .with_client(reqwest::Client::new())
        .with_url(&format!("{}/latest.tar", server.url()))
        .build();

    Ok((server, source))
}

#[tokio::test]
async fn test_fetch_streams_archive_to_disk() -> Result<()> {
    let (mut server, source) = setup_mock_server().await?;
    let archive = tar_with("db/state", b"state")?;

    let mock = server
        .mock("GET", "/latest.tar")
        .with_status(200)
        .with_body(&archive)
        .create_async()
        .await;

    let dir = tempdir()?;
    let dest = dir.path().join("archive.tar");
    source.fetch(NetworkKind::Fuji, &dest).await?;

    assert_eq!(std::fs::read(&dest)?, archive);

    mock.assert_async().await;

    Ok(())
}

#[tokio::test]
async fn test_fetch_fails_on_error_status() -> Result<()> {
    let (mut server, source) = setup_mock_server().await?;

    let mock = server
        .mock("GET", "/latest.tar")
        .with_status(404)
        .with_body("not found")
        .create_async()
        .await;

    let dir = tempdir()?;
    let result = source
        .fetch(NetworkKind::Fuji, &dir.path().join("archive.tar"))
        .await;

    assert!(result.is_err());
    assert!(result.unwrap_err().to_string().contains("404"));

    mock.assert_async().await;

    Ok(())
}

#[tokio::test]
async fn test_seed_over_http_then_from_cache() -> Result<()> {
    let (mut server, source) = setup_mock_server().await?;

    // Served once: the second seeding must hit the cache.
    let mock = server
        .mock("GET", "/latest.tar")
        .with_status(200)
        .with_body(tar_with("fuji/state", b"state")?)
        .expect(1)
        .create_async()
        .await;

    let root = tempdir()?;
    let cache = root.path().join("cache");
    let seeder = ArchiveSeeder::new(Arc::new(source), &cache, Duration::from_secs(3600));
    let nodes = vec!["NodeID-a".to_string(), "NodeID-b".to_string()];

    seeder
        .download_and_seed(NetworkKind::Fuji, &root.path().join("first"), &nodes)
        .await?;
    seeder
        .download_and_seed(NetworkKind::Fuji, &root.path().join("second"), &nodes)
        .await?;

    for run in ["first", "second"] {
        for node in &nodes {
            let state = root.path().join(run).join(node).join(DB_DIR).join("fuji/state");
            assert_eq!(std::fs::read(state)?, b"state");
        }
    }

    mock.assert_async().await;

    Ok(())
}

#[tokio::test]
async fn test_failed_download_seeds_nothing() -> Result<()> {
    let (mut server, source) = setup_mock_server().await?;

    let mock = server
        .mock("GET", "/latest.tar")
        .with_status(503)
        .create_async()
        .await;

    let root = tempdir()?;
    let seeder = ArchiveSeeder::new(
        Arc::new(source),
        root.path().join("cache"),
        Duration::from_secs(3600),
    );
    let nodes = vec!["NodeID-a".to_string()];

    let result = seeder
        .download_and_seed(NetworkKind::Fuji, root.path(), &nodes)
        .await;

    assert!(matches!(result, Err(LocalnetError::Seeding(_))));
    assert!(!root.path().join("NodeID-a").join(DB_DIR).exists());

    mock.assert_async().await;

    Ok(())
}
