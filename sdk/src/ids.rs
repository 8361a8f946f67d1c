//! Identifiers used across the network: 32-byte [`Id`]s for chains, subnets
//! and VMs, and 20-byte [`NodeId`]s for nodes.
//!
//! Both are rendered in CB58, which is base58 over the raw bytes followed by
//! the last 4 bytes of their SHA-256 digest.

use {
    ripemd::Ripemd160,
    serde::{de::Error as _, Deserialize, Deserializer, Serialize, Serializer},
    sha2::{Digest, Sha256},
    std::{fmt, str::FromStr},
    thiserror::Error,
};

const CHECKSUM_LEN: usize = 4;
const NODE_ID_PREFIX: &str = "NodeID-";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdError {
    #[error("invalid base58 string '{0}'")]
    Base58(String),
    #[error("checksum mismatch for '{0}'")]
    Checksum(String),
    #[error("expected {expected} bytes, found {found}")]
    Length { expected: usize, found: usize },
    #[error("node ID '{0}' is missing the '{NODE_ID_PREFIX}' prefix")]
    NodeIdPrefix(String),
    #[error("VM name must be <= 32 bytes, found {0}")]
    VmNameTooLong(usize),
}

fn cb58_encode(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    let mut payload = bytes.to_vec();
    payload.extend_from_slice(&digest[digest.len() - CHECKSUM_LEN..]);

    bs58::encode(payload).into_string()
}

fn cb58_decode(s: &str) -> Result<Vec<u8>, IdError> {
    let mut payload = bs58::decode(s)
        .into_vec()
        .map_err(|_| IdError::Base58(s.to_string()))?;

    if payload.len() < CHECKSUM_LEN {
        return Err(IdError::Checksum(s.to_string()));
    }

    let checksum = payload.split_off(payload.len() - CHECKSUM_LEN);
    let digest = Sha256::digest(&payload);

    if checksum[..] != digest[digest.len() - CHECKSUM_LEN..] {
        return Err(IdError::Checksum(s.to_string()));
    }

    Ok(payload)
}

fn to_array<const N: usize>(bytes: Vec<u8>) -> Result<[u8; N], IdError> {
    let found = bytes.len();

    bytes
        .try_into()
        .map_err(|_| IdError::Length { expected: N, found })
}

/// A 32-byte identifier for chains, subnets, VMs and transactions.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Id([u8; 32]);

impl Id {
    /// The all-zero ID. Doubles as the primary network subnet ID.
    pub const EMPTY: Id = Id([0; 32]);

    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::EMPTY
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", cb58_encode(&self.0))
    }
}

impl fmt::Debug for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Id({self})")
    }
}

impl FromStr for Id {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(to_array(cb58_decode(s)?)?))
    }
}

impl Serialize for Id {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Id {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;

        s.parse().map_err(D::Error::custom)
    }
}

/// A 20-byte node identity, derived from the node's staking certificate.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId([u8; 20]);

impl NodeId {
    pub const EMPTY: NodeId = NodeId([0; 20]);

    pub const fn new(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Derive the node identity from the DER bytes of its staking
    /// certificate. The same certificate always yields the same ID.
    pub fn from_cert_der(der: &[u8]) -> Self {
        let sha = Sha256::digest(der);
        let ripe = Ripemd160::digest(sha);
        let mut bytes = [0; 20];
        bytes.copy_from_slice(&ripe);

        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{NODE_ID_PREFIX}{}", cb58_encode(&self.0))
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self}")
    }
}

impl FromStr for NodeId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let Some(encoded) = s.strip_prefix(NODE_ID_PREFIX) else {
            return Err(IdError::NodeIdPrefix(s.to_string()));
        };

        Ok(Self(to_array(cb58_decode(encoded)?)?))
    }
}

impl Serialize for NodeId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for NodeId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;

        s.parse().map_err(D::Error::custom)
    }
}

/// Deterministic VM ID for a chain name: the name's bytes zero-padded to 32.
pub fn vm_id(name: &str) -> Result<Id, IdError> {
    let bytes = name.as_bytes();

    if bytes.len() > 32 {
        return Err(IdError::VmNameTooLong(bytes.len()));
    }

    let mut padded = [0; 32];
    padded[..bytes.len()].copy_from_slice(bytes);

    Ok(Id(padded))
}

#[cfg(test)]
mod tests {
    use {super::*, assert_matches::assert_matches};

    #[test]
    fn test_empty_id_cb58() {
        assert_eq!(
            Id::EMPTY.to_string(),
            "11111111111111111111111111111111LpoYY"
        );
        assert_eq!(
            "11111111111111111111111111111111LpoYY".parse::<Id>(),
            Ok(Id::EMPTY)
        );
    }

    #[test]
    fn test_id_rejects_bad_checksum() {
        assert_matches!(
            "11111111111111111111111111111111LpoYZ".parse::<Id>(),
            Err(IdError::Checksum(_))
        );
    }

    #[test]
    fn test_node_id_prefix() {
        let node_id = NodeId::from_cert_der(b"certificate");
        let rendered = node_id.to_string();

        assert!(rendered.starts_with("NodeID-"));
        assert_eq!(rendered.parse::<NodeId>(), Ok(node_id));
        assert_matches!(
            rendered.trim_start_matches("NodeID-").parse::<NodeId>(),
            Err(IdError::NodeIdPrefix(_))
        );
    }

    #[test]
    fn test_node_id_is_deterministic() {
        assert_eq!(
            NodeId::from_cert_der(b"same"),
            NodeId::from_cert_der(b"same")
        );
        assert_ne!(
            NodeId::from_cert_der(b"same"),
            NodeId::from_cert_der(b"other")
        );
    }

    #[test]
    fn test_vm_id_pads_name() {
        let id = vm_id("mychain").unwrap();

        assert_eq!(&id.as_bytes()[..7], b"mychain");
        assert!(id.as_bytes()[7..].iter().all(|b| *b == 0));
        assert_eq!(vm_id("mychain").unwrap(), id);
        assert_matches!(vm_id(&"x".repeat(33)), Err(IdError::VmNameTooLong(33)));
    }

    #[test]
    fn test_id_serde_as_string() {
        let json = serde_json::to_string(&Id::EMPTY).unwrap();

        assert_eq!(json, "\"11111111111111111111111111111111LpoYY\"");
        assert_eq!(serde_json::from_str::<Id>(&json).unwrap(), Id::EMPTY);
    }
}
