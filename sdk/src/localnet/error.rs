use {
    crate::{
        api::ApiError,
        ids::{Id, IdError, NodeId},
    },
    std::path::{Path, PathBuf},
    thiserror::Error,
};

pub type LocalnetResult<T> = Result<T, LocalnetError>;

#[derive(Debug, Error)]
pub enum LocalnetError {
    /// Descriptor or metadata file is absent or unparsable.
    #[error("no network found at '{}'", .0.display())]
    NotFound(PathBuf),
    #[error("local network is not fully bootstrapped")]
    NotBootstrapped,
    #[error("network has no validators for subnet {0}")]
    NoValidators(Id),
    #[error("timed out waiting for {0}")]
    Timeout(String),
    /// Archive seeding failed. Data of every requested node was removed.
    #[error("archive seeding failed: {0}")]
    Seeding(String),
    #[error("failed to {op} '{}': {source}", path.display())]
    Io {
        op: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse '{}': {source}", path.display())]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("node API at {uri} failed: {source}")]
    Api { uri: String, source: ApiError },
    #[error("node {node_id}: {reason}")]
    Process { node_id: NodeId, reason: String },
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("wallet operation failed: {0:#}")]
    Wallet(anyhow::Error),
    #[error(transparent)]
    Id(#[from] IdError),
}

impl LocalnetError {
    /// Deadline errors can be retried with a longer budget, everything else
    /// is a hard failure.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }

    pub(crate) fn io(
        op: &'static str,
        path: impl AsRef<Path>,
    ) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.as_ref().to_path_buf();

        move |source| Self::Io { op, path, source }
    }

    pub(crate) fn json(path: impl AsRef<Path>) -> impl FnOnce(serde_json::Error) -> Self {
        let path = path.as_ref().to_path_buf();

        move |source| Self::Json { path, source }
    }

    pub(crate) fn api(uri: &str) -> impl FnOnce(ApiError) -> Self {
        let uri = uri.to_string();

        move |source| Self::Api { uri, source }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_is_distinguishable() {
        assert!(LocalnetError::Timeout("chain P".into()).is_timeout());
        assert!(!LocalnetError::NotBootstrapped.is_timeout());
        assert!(!LocalnetError::NoValidators(Id::EMPTY).is_timeout());
    }

    #[test]
    fn test_io_error_carries_context() {
        let err = LocalnetError::io("read", "/tmp/config.json")(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "denied",
        ));

        assert_eq!(err.to_string(), "failed to read '/tmp/config.json': denied");
    }
}
