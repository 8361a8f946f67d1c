//! Helpers for testing code that drives local networks without a real node
//! binary or a real node API.
//!
//! - [`MockNodeApi`] is a scriptable in-memory [`crate::api::NodeApi`].
//! - [`RecordingWallet`] records the validators it is asked to add and feeds
//!   them back into a [`MockNodeApi`].
//! - [`write_fake_node_binary`] writes a shell script that behaves like a
//!   node process as far as the orchestrator can tell.

mod node_binary;
mod node_mocks;
mod wallet;

pub use {node_binary::*, node_mocks::*, wallet::*};
