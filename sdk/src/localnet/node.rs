//! Node descriptors: identity, staking material and per-node flags.

use {
    super::{
        error::{LocalnetError, LocalnetResult},
        process::ProcessContext,
    },
    crate::ids::{Id, NodeId},
    base64::{engine::general_purpose::STANDARD, Engine as _},
    serde::{Deserialize, Serialize},
    serde_json::Value,
    std::{collections::BTreeMap, path::Path},
};

/// Node flags, keyed by the node binary's flag names.
pub type Flags = BTreeMap<String, Value>;

pub const HTTP_PORT_KEY: &str = "http-port";
pub const STAKING_PORT_KEY: &str = "staking-port";
pub const PUBLIC_IP_KEY: &str = "public-ip";
pub const DATA_DIR_KEY: &str = "data-dir";
pub const LOG_DIR_KEY: &str = "log-dir";
pub const CHAIN_CONFIG_DIR_KEY: &str = "chain-config-dir";
pub const SUBNET_CONFIG_DIR_KEY: &str = "subnet-config-dir";
pub const PLUGIN_DIR_KEY: &str = "plugin-dir";
pub const PROCESS_CONTEXT_FILE_KEY: &str = "process-context-file";
pub const TRACK_SUBNETS_KEY: &str = "track-subnets";
pub const BOOTSTRAP_IPS_KEY: &str = "bootstrap-ips";
pub const BOOTSTRAP_IDS_KEY: &str = "bootstrap-ids";
pub const NETWORK_ID_KEY: &str = "network-id";
pub const GENESIS_FILE_KEY: &str = "genesis-file";
pub const UPGRADE_CONTENT_KEY: &str = "upgrade-file-content";
pub const SYBIL_PROTECTION_KEY: &str = "sybil-protection-enabled";
pub const STAKING_CERT_CONTENT_KEY: &str = "staking-tls-cert-file-content";
pub const STAKING_KEY_CONTENT_KEY: &str = "staking-tls-key-file-content";
pub const STAKING_SIGNER_CONTENT_KEY: &str = "staking-signer-key-file-content";

/// Flags that describe one specific node and must not be carried over when
/// cloning a node's configuration.
const NODE_SPECIFIC_KEYS: [&str; 9] = [
    HTTP_PORT_KEY,
    STAKING_PORT_KEY,
    DATA_DIR_KEY,
    LOG_DIR_KEY,
    CHAIN_CONFIG_DIR_KEY,
    PROCESS_CONTEXT_FILE_KEY,
    STAKING_CERT_CONTENT_KEY,
    STAKING_KEY_CONTENT_KEY,
    STAKING_SIGNER_CONTENT_KEY,
];

/// Pre-generated staking material and ports for a node. Ports set to 0 are
/// picked by the node at start.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NodeSetting {
    /// PEM encoded TLS certificate.
    pub staking_cert: Vec<u8>,
    /// PEM encoded TLS key.
    pub staking_key: Vec<u8>,
    pub staking_signer_key: Option<Vec<u8>>,
    pub http_port: u16,
    pub staking_port: u16,
}

impl NodeSetting {
    /// Fresh self-signed staking material with dynamic ports.
    pub fn generate() -> LocalnetResult<Self> {
        let rcgen::CertifiedKey { cert, key_pair } =
            rcgen::generate_simple_self_signed(vec!["localhost".to_string()])
                .map_err(|e| LocalnetError::Config(format!("cannot generate staking key: {e}")))?;

        Ok(Self {
            staking_cert: cert.pem().into_bytes(),
            staking_key: key_pair.serialize_pem().into_bytes(),
            ..Default::default()
        })
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Node {
    #[serde(rename = "nodeID")]
    pub node_id: NodeId,
    pub flags: Flags,
    /// Runtime state, refreshed from the node directory on load.
    #[serde(skip)]
    pub process: Option<ProcessContext>,
}

impl Node {
    pub fn generate() -> LocalnetResult<Self> {
        Self::from_setting(&NodeSetting::generate()?)
    }

    /// Build a node from pre-supplied staking material. The node ID is
    /// derived from the certificate so the same setting always yields the
    /// same identity.
    pub fn from_setting(setting: &NodeSetting) -> LocalnetResult<Self> {
        let node_id = NodeId::from_cert_der(&pem_to_der(&setting.staking_cert)?);

        let mut flags = Flags::new();
        flags.insert(
            STAKING_CERT_CONTENT_KEY.into(),
            STANDARD.encode(&setting.staking_cert).into(),
        );
        flags.insert(
            STAKING_KEY_CONTENT_KEY.into(),
            STANDARD.encode(&setting.staking_key).into(),
        );
        if let Some(signer) = &setting.staking_signer_key {
            flags.insert(
                STAKING_SIGNER_CONTENT_KEY.into(),
                STANDARD.encode(signer).into(),
            );
        }
        flags.insert(HTTP_PORT_KEY.into(), setting.http_port.into());
        flags.insert(STAKING_PORT_KEY.into(), setting.staking_port.into());

        Ok(Self {
            node_id,
            flags,
            process: None,
        })
    }

    pub fn dir(&self, network_dir: &Path) -> std::path::PathBuf {
        network_dir.join(self.node_id.to_string())
    }

    pub fn is_running(&self) -> bool {
        self.process.is_some()
    }

    pub fn uri(&self) -> Option<&str> {
        self.process.as_ref().map(|p| p.uri.as_str())
    }

    pub fn staking_address(&self) -> Option<&str> {
        self.process.as_ref().map(|p| p.staking_address.as_str())
    }

    pub fn flag_str(&self, key: &str) -> Option<&str> {
        self.flags.get(key).and_then(Value::as_str)
    }

    /// Port flags may be stored as numbers or strings.
    pub fn port_flag(&self, key: &str) -> Option<u16> {
        match self.flags.get(key)? {
            Value::Number(n) => n.as_u64().and_then(|n| u16::try_from(n).ok()),
            Value::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    pub fn http_port(&self) -> u16 {
        self.port_flag(HTTP_PORT_KEY).unwrap_or_default()
    }

    pub fn staking_port(&self) -> u16 {
        self.port_flag(STAKING_PORT_KEY).unwrap_or_default()
    }

    pub fn tracked_subnets(&self) -> LocalnetResult<Vec<Id>> {
        let Some(subnets) = self.flag_str(TRACK_SUBNETS_KEY) else {
            return Ok(vec![]);
        };

        subnets
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| s.parse::<Id>().map_err(LocalnetError::from))
            .collect()
    }

    pub fn is_tracking_subnet(&self, subnet_id: Id) -> LocalnetResult<bool> {
        Ok(self.tracked_subnets()?.contains(&subnet_id))
    }

    pub fn set_tracked_subnets(&mut self, subnets: &[Id]) {
        if subnets.is_empty() {
            self.flags.remove(TRACK_SUBNETS_KEY);
            return;
        }

        let joined = subnets
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",");

        self.flags.insert(TRACK_SUBNETS_KEY.into(), joined.into());
    }

    /// Add `subnet_id` to the tracked set. Returns false if already tracked.
    pub fn add_tracked_subnet(&mut self, subnet_id: Id) -> LocalnetResult<bool> {
        let mut subnets = self.tracked_subnets()?;

        if subnets.contains(&subnet_id) {
            return Ok(false);
        }

        subnets.push(subnet_id);
        self.set_tracked_subnets(&subnets);

        Ok(true)
    }
}

/// Build `count` nodes. The first nodes take their material from `settings`,
/// the rest get fresh keys. Every node tracks `tracked_subnets`.
pub fn new_nodes(
    count: usize,
    settings: &[NodeSetting],
    tracked_subnets: &[Id],
) -> LocalnetResult<Vec<Node>> {
    if settings.len() > count {
        return Err(LocalnetError::Config(format!(
            "{} node settings given for {count} nodes",
            settings.len()
        )));
    }

    (0..count)
        .map(|i| {
            let mut node = match settings.get(i) {
                Some(setting) => Node::from_setting(setting)?,
                None => Node::generate()?,
            };

            node.set_tracked_subnets(tracked_subnets);

            Ok(node)
        })
        .collect()
}

/// A fresh node carrying `source`'s connection flags and tracked subnets.
pub fn copy_node(source: &Node) -> LocalnetResult<Node> {
    let mut node = Node::generate()?;

    for (key, value) in &source.flags {
        if !NODE_SPECIFIC_KEYS.contains(&key.as_str()) {
            node.flags.insert(key.clone(), value.clone());
        }
    }

    Ok(node)
}

/// DER bytes of the first certificate in `pem`.
fn pem_to_der(pem: &[u8]) -> LocalnetResult<Vec<u8>> {
    let invalid = |reason: String| {
        LocalnetError::Config(format!("staking certificate is not valid PEM: {reason}"))
    };

    match rustls_pemfile::certs(&mut &pem[..]).next() {
        Some(Ok(cert)) => Ok(cert.as_ref().to_vec()),
        Some(Err(e)) => Err(invalid(e.to_string())),
        None => Err(invalid("no certificate section".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use {super::*, assert_matches::assert_matches};

    #[test]
    fn test_identity_is_deterministic_from_setting() {
        let setting = NodeSetting::generate().unwrap();

        let a = Node::from_setting(&setting).unwrap();
        let b = Node::from_setting(&setting).unwrap();

        assert_eq!(a.node_id, b.node_id);
        assert_ne!(a.node_id, Node::generate().unwrap().node_id);
    }

    #[test]
    fn test_ports_from_setting() {
        let setting = NodeSetting {
            http_port: 9650,
            staking_port: 9651,
            ..NodeSetting::generate().unwrap()
        };
        let node = Node::from_setting(&setting).unwrap();

        assert_eq!(node.http_port(), 9650);
        assert_eq!(node.staking_port(), 9651);
    }

    #[test]
    fn test_invalid_pem_is_rejected() {
        let setting = NodeSetting {
            staking_cert: b"not a cert".to_vec(),
            ..Default::default()
        };

        assert_matches!(
            Node::from_setting(&setting),
            Err(LocalnetError::Config(_))
        );
    }

    #[test]
    fn test_node_id_comes_from_certificate_der() {
        let rcgen::CertifiedKey { cert, key_pair } =
            rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();

        assert_eq!(pem_to_der(cert.pem().as_bytes()).unwrap(), cert.der().to_vec());

        // A key alone carries no certificate.
        assert_matches!(
            pem_to_der(key_pair.serialize_pem().as_bytes()),
            Err(LocalnetError::Config(_))
        );
    }

    #[test]
    fn test_new_nodes_uses_settings_first() {
        let setting = NodeSetting::generate().unwrap();
        let subnet = Id::new([7; 32]);

        let nodes = new_nodes(3, &[setting.clone()], &[subnet]).unwrap();

        assert_eq!(nodes.len(), 3);
        assert_eq!(
            nodes[0].node_id,
            Node::from_setting(&setting).unwrap().node_id
        );
        assert!(nodes
            .iter()
            .all(|n| n.tracked_subnets().unwrap() == vec![subnet]));
        assert_matches!(
            new_nodes(0, &[setting], &[]),
            Err(LocalnetError::Config(_))
        );
    }

    #[test]
    fn test_add_tracked_subnet_is_idempotent() {
        let mut node = Node::generate().unwrap();
        let subnet = Id::new([1; 32]);

        assert!(node.add_tracked_subnet(subnet).unwrap());
        assert!(!node.add_tracked_subnet(subnet).unwrap());
        assert_eq!(node.tracked_subnets().unwrap(), vec![subnet]);
        assert!(node.is_tracking_subnet(subnet).unwrap());
    }

    #[test]
    fn test_copy_node_drops_identity() {
        let mut source = Node::generate().unwrap();
        source.flags.insert(BOOTSTRAP_IPS_KEY.into(), "127.0.0.1:9651".into());
        source.flags.insert(HTTP_PORT_KEY.into(), 9650.into());
        source.set_tracked_subnets(&[Id::new([2; 32])]);

        let copy = copy_node(&source).unwrap();

        assert_ne!(copy.node_id, source.node_id);
        assert_eq!(copy.flag_str(BOOTSTRAP_IPS_KEY), Some("127.0.0.1:9651"));
        assert_eq!(copy.tracked_subnets().unwrap(), vec![Id::new([2; 32])]);
        assert_eq!(copy.http_port(), 0);
        assert_ne!(
            copy.flags.get(STAKING_CERT_CONTENT_KEY),
            source.flags.get(STAKING_CERT_CONTENT_KEY)
        );
    }
}
