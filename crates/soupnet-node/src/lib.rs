//! Thin gossip layer for the SoupNet core.
//!
//! The [`GossipNode`] owns the peer list, the seen-event dedup set and
//! the outbound queue; actual wire transport is an external concern.
//! Anonymity transports (Tor/I2P) are modeled as [`AnonymityProvider`]
//! scaffolds that produce a proxy endpoint and a status record.

pub mod node;
pub mod transport;

pub use node::GossipNode;
pub use transport::{make_anonymity_provider, AnonymityProvider, I2pProvider, TorProvider};
