use std::time::Duration;

pub const MAINNET_ID: u32 = 1;
pub const FUJI_ID: u32 = 5;
pub const LOCAL_ID: u32 = 12345;

/// Which kind of network a network ID belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NetworkKind {
    Local,
    Fuji,
    Mainnet,
    Devnet,
}

impl NetworkKind {
    pub fn from_network_id(network_id: u32) -> Self {
        match network_id {
            MAINNET_ID => Self::Mainnet,
            FUJI_ID => Self::Fuji,
            LOCAL_ID => Self::Local,
            _ => Self::Devnet,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Local => "Local Network",
            Self::Fuji => "Fuji",
            Self::Mainnet => "Mainnet",
            Self::Devnet => "Devnet",
        }
    }
}

/// Timing knobs of the orchestrator. Every wait loop reads its interval and
/// budget from here.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LocalnetConfig {
    /// Sleep between two blockchain bootstrap checks.
    pub bootstrap_check_interval: Duration,
    /// Sleep between two validator set convergence checks.
    pub validator_check_interval: Duration,
    /// How long stopped nodes may take to exit.
    pub stop_timeout: Duration,
    /// Budget for waits whose caller supplied no deadline.
    pub bootstrap_timeout: Duration,
    /// How long a spawned node may take to publish its process context.
    pub process_context_timeout: Duration,
    /// Cached archives older than this are downloaded again.
    pub archive_max_age: Duration,
}

impl Default for LocalnetConfig {
    fn default() -> Self {
        Self {
            bootstrap_check_interval: Duration::from_secs(1),
            validator_check_interval: Duration::from_millis(100),
            stop_timeout: Duration::from_secs(120),
            bootstrap_timeout: Duration::from_secs(120),
            process_context_timeout: Duration::from_secs(30),
            archive_max_age: Duration::from_secs(7 * 24 * 60 * 60),
        }
    }
}

impl LocalnetConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bootstrap_check_interval(mut self, interval: Duration) -> Self {
        self.bootstrap_check_interval = interval;
        self
    }

    pub fn with_validator_check_interval(mut self, interval: Duration) -> Self {
        self.validator_check_interval = interval;
        self
    }

    pub fn with_stop_timeout(mut self, timeout: Duration) -> Self {
        self.stop_timeout = timeout;
        self
    }

    pub fn with_bootstrap_timeout(mut self, timeout: Duration) -> Self {
        self.bootstrap_timeout = timeout;
        self
    }

    pub fn with_process_context_timeout(mut self, timeout: Duration) -> Self {
        self.process_context_timeout = timeout;
        self
    }

    pub fn with_archive_max_age(mut self, max_age: Duration) -> Self {
        self.archive_max_age = max_age;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let conf = LocalnetConfig::default();

        assert_eq!(conf.bootstrap_check_interval, Duration::from_secs(1));
        assert_eq!(conf.validator_check_interval, Duration::from_millis(100));
        assert_eq!(conf.stop_timeout, Duration::from_secs(120));
        assert_eq!(conf.archive_max_age.as_secs(), 604_800);
    }

    #[test]
    fn test_network_kind_from_id() {
        assert_eq!(NetworkKind::from_network_id(1), NetworkKind::Mainnet);
        assert_eq!(NetworkKind::from_network_id(5), NetworkKind::Fuji);
        assert_eq!(NetworkKind::from_network_id(12345), NetworkKind::Local);
        assert_eq!(NetworkKind::from_network_id(1337), NetworkKind::Devnet);
        assert_eq!(NetworkKind::Fuji.name(), "Fuji");
    }

    #[test]
    fn test_builder_overrides() {
        let conf = LocalnetConfig::new()
            .with_bootstrap_check_interval(Duration::from_millis(10))
            .with_stop_timeout(Duration::from_secs(5));

        assert_eq!(conf.bootstrap_check_interval, Duration::from_millis(10));
        assert_eq!(conf.stop_timeout, Duration::from_secs(5));
        assert_eq!(conf.bootstrap_timeout, Duration::from_secs(120));
    }
}
