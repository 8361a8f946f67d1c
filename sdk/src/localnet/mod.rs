//! Local network orchestrator.
//!
//! A network lives in a directory (see [`network`] for the layout) and is
//! driven by a [`NetworkManager`]: create, start, stop and restart node
//! processes, wait for chains to bootstrap, track subnets. Liveness is never
//! cached, it is derived from the process contexts the nodes write.
//!
//! Around the core:
//! - [`meta`] points at the directory backing "the" local network.
//! - [`cluster`] manages named clusters under the application directory.
//! - [`migration`] converts clusters written in the legacy layout.
//! - [`archive`] seeds node databases from a public chain-state archive.

pub mod archive;
pub mod cluster;
pub mod config;
pub mod error;
pub mod manager;
pub mod meta;
pub mod migration;
pub mod network;
pub mod node;
pub mod process;
pub mod track;

pub use {
    archive::{ArchiveSeeder, ArchiveSource, HttpArchiveSource},
    config::{LocalnetConfig, NetworkKind},
    error::{LocalnetError, LocalnetResult},
    manager::{CreateOptions, NetworkManager},
    network::{bootstrapping_status, BootstrappingStatus, Network},
    node::{Node, NodeSetting},
    track::TrackSubnetRequest,
};
