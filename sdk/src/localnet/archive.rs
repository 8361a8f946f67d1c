//! Seed node databases from a public chain-state archive.
//!
//! The archive is fetched once, cached per network and unpacked into every
//! requested node concurrently. A failed unpack removes the data of every
//! requested node so the network is never left half seeded.

use {
    super::{
        config::{LocalnetConfig, NetworkKind},
        error::{LocalnetError, LocalnetResult},
        network::{create_dir_all, DB_DIR},
    },
    anyhow::{anyhow, Context},
    async_trait::async_trait,
    flate2::read::GzDecoder,
    futures_util::StreamExt,
    log::{info, warn},
    reqwest::Client,
    std::{
        fs::File,
        io::{self, Read, Seek, SeekFrom},
        path::{Path, PathBuf},
        sync::Arc,
        time::{Duration, SystemTime},
    },
    tokio::{io::AsyncWriteExt, task::JoinSet},
};

/// Public P-Chain database archive of the Fuji test network.
pub const FUJI_ARCHIVE_URL: &str = concat!(
    "https://avalanchego-public-shared-database.avax-test.network",
    "/testnet/p-chain/avalanchego/data-tar/latest.tar",
);

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Where archives come from.
#[async_trait]
pub trait ArchiveSource: Send + Sync {
    /// Store the archive of `kind` at `dest`.
    async fn fetch(&self, kind: NetworkKind, dest: &Path) -> anyhow::Result<()>;
}

/// Builder for [HttpArchiveSource] configuration
pub struct HttpArchiveSourceBuilder {
    client: Client,
    url: String,
}

impl Default for HttpArchiveSourceBuilder {
    fn default() -> Self {
        Self {
            client: Client::new(),
            url: FUJI_ARCHIVE_URL.to_string(),
        }
    }
}

impl HttpArchiveSourceBuilder {
    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    pub fn with_url(mut self, url: &str) -> Self {
        self.url = url.to_string();
        self
    }

    pub fn build(self) -> HttpArchiveSource {
        HttpArchiveSource {
            client: self.client,
            url: self.url,
        }
    }
}

/// Streams the archive over HTTP.
pub struct HttpArchiveSource {
    client: Client,
    url: String,
}

impl Default for HttpArchiveSource {
    fn default() -> Self {
        HttpArchiveSourceBuilder::default().build()
    }
}

impl HttpArchiveSource {
    pub fn builder() -> HttpArchiveSourceBuilder {
        HttpArchiveSourceBuilder::default()
    }
}

#[async_trait]
impl ArchiveSource for HttpArchiveSource {
    async fn fetch(&self, kind: NetworkKind, dest: &Path) -> anyhow::Result<()> {
        if kind != NetworkKind::Fuji {
            return Err(anyhow!("no public archive for {}", kind.name()));
        }

        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .context(format!("Failed to download archive from {}", self.url))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(anyhow!("Download failed with {status}: {error_text}"));
        }

        // Stream the response body to file
        let mut file = tokio::fs::File::create(dest).await?;
        let mut stream = response.bytes_stream();

        while let Some(chunk_result) = stream.next().await {
            let chunk = chunk_result?;
            file.write_all(&chunk).await?;
        }

        file.flush().await?;

        Ok(())
    }
}

/// Fetches, caches and unpacks archives into node data directories.
#[derive(Clone)]
pub struct ArchiveSeeder {
    source: Arc<dyn ArchiveSource>,
    cache_dir: PathBuf,
    max_age: Duration,
}

impl ArchiveSeeder {
    pub fn new(
        source: Arc<dyn ArchiveSource>,
        cache_dir: impl Into<PathBuf>,
        max_age: Duration,
    ) -> Self {
        Self {
            source,
            cache_dir: cache_dir.into(),
            max_age,
        }
    }

    /// Seeder whose cache expires after [`LocalnetConfig::archive_max_age`].
    pub fn from_config(
        source: Arc<dyn ArchiveSource>,
        cache_dir: impl Into<PathBuf>,
        conf: &LocalnetConfig,
    ) -> Self {
        Self::new(source, cache_dir, conf.archive_max_age)
    }

    pub fn cache_path(&self, kind: NetworkKind) -> PathBuf {
        self.cache_dir.join(kind.name())
    }

    /// Unpack the archive of `kind` into `<root_dir>/<node>/db` for every
    /// node in `node_names`. Only Fuji has a public archive: other kinds are
    /// a no-op. Nodes that already have a database are skipped.
    pub async fn download_and_seed(
        &self,
        kind: NetworkKind,
        root_dir: &Path,
        node_names: &[String],
    ) -> LocalnetResult<()> {
        if kind != NetworkKind::Fuji {
            return Ok(());
        }

        // Keeps a fresh download alive until every unpack is done.
        let mut _download = None;

        let archive = match self.fresh_cache(kind).await {
            Some(cached) => cached,
            None => {
                let download = tempfile::NamedTempFile::new()
                    .map_err(LocalnetError::io("create", std::env::temp_dir()))?;
                let path = download.path().to_path_buf();

                info!("Downloading public archive for {}", kind.name());

                self.source
                    .fetch(kind, &path)
                    .await
                    .map_err(|e| LocalnetError::Seeding(format!("{e:#}")))?;

                self.store_in_cache(kind, &path).await;
                _download = Some(download);

                path
            }
        };

        let mut tasks = JoinSet::new();

        for name in node_names {
            let target = root_dir.join(name).join(DB_DIR);

            if tokio::fs::try_exists(&target).await.unwrap_or(false) {
                info!("Data folder '{}' already exists. Skipping", target.display());
                continue;
            }

            let archive = archive.clone();

            tasks.spawn_blocking(move || {
                unpack(&archive, &target).map_err(|e| {
                    format!("failed to unpack into '{}': {e}", target.display())
                })
            });
        }

        let mut first_error = None;

        while let Some(joined) = tasks.join_next().await {
            let result = joined.map_err(|e| e.to_string()).and_then(|r| r);

            if let Err(e) = result {
                first_error.get_or_insert(e);
            }
        }

        if let Some(e) = first_error {
            clean_up_node_data(root_dir, node_names).await;

            return Err(LocalnetError::Seeding(e));
        }

        info!("Public archive unpacked to '{}'", root_dir.display());

        Ok(())
    }

    async fn fresh_cache(&self, kind: NetworkKind) -> Option<PathBuf> {
        let path = self.cache_path(kind);
        let modified = tokio::fs::metadata(&path).await.ok()?.modified().ok()?;
        let age = SystemTime::now()
            .duration_since(modified)
            .unwrap_or_default();

        if age < self.max_age {
            info!("Using cached public archive (age: {}h)", age.as_secs() / 3600);
            return Some(path);
        }

        info!("Cached public archive is too old, downloading a fresh copy");

        None
    }

    async fn store_in_cache(&self, kind: NetworkKind, downloaded: &Path) {
        let cached = self.cache_path(kind);

        if let Err(e) = create_dir_all(&self.cache_dir).await {
            warn!("Failed to create cache directory: {e}");
            return;
        }

        if let Err(e) = tokio::fs::copy(downloaded, &cached).await {
            warn!("Failed to cache downloaded archive: {e}");
        }
    }
}

async fn clean_up_node_data(root_dir: &Path, node_names: &[String]) {
    for name in node_names {
        let target = root_dir.join(name).join(DB_DIR);

        match tokio::fs::remove_dir_all(&target).await {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to clean up '{}': {e}", target.display()),
        }
    }
}

/// Unpack a plain or gzip compressed tar into `target`.
fn unpack(archive: &Path, target: &Path) -> io::Result<()> {
    let mut file = File::open(archive)?;

    let mut magic = [0u8; 2];
    let gzipped = file.read_exact(&mut magic).is_ok() && magic == GZIP_MAGIC;
    file.seek(SeekFrom::Start(0))?;

    std::fs::create_dir_all(target)?;

    if gzipped {
        tar::Archive::new(GzDecoder::new(file)).unpack(target)
    } else {
        tar::Archive::new(file).unpack(target)
    }
}
