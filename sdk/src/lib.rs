//! This library contains everything the Subnet CLI needs to run local
//! multi-node networks: identifiers, the node API, the wallet seam and the
//! orchestrator itself.

/// Identifiers used across the network: chain and subnet IDs, node IDs and
/// the VM ID derived from a chain name. Contains the logic for encoding,
/// decoding and serializing them.
#[cfg(feature = "ids")]
pub mod ids;

/// The node HTTP API as the orchestrator sees it, plus a JSON-RPC client
/// talking to real nodes.
#[cfg(feature = "api")]
pub mod api;

/// Transaction-signing seam used to register non-sovereign subnet
/// validators.
#[cfg(feature = "wallet")]
pub mod wallet;

/// Local network lifecycle: descriptors, node processes, bootstrap checks,
/// subnet tracking, metadata, migration, archive seeding and named clusters.
#[cfg(feature = "localnet")]
pub mod localnet;

/// Scriptable doubles for the node API, the wallet and the node binary.
#[cfg(all(feature = "localnet", any(test, feature = "test_utils")))]
pub mod test_utils;
