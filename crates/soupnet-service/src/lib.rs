//! Service orchestrator for the SoupNet core.
//!
//! [`Service`] wires the identity vault, the per-community store, the
//! gossip node and the anonymity providers behind a synchronous command
//! API. The embedder calls commands and drives [`Service::sync_tick`]
//! periodically; everything else (confirmation, reward claims, scheduled
//! backtests, gossip flushing) hangs off that tick.

mod commands;
mod community;
mod profile_state;
mod recovery;
mod reference;
mod service;

pub use reference::ReferenceEntry;
pub use service::{NodeStatusReport, Service};
