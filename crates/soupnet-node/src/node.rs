//! Gossip node: peer list persistence, event dedup and the outbound
//! queue drained on every sync tick.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use tracing::debug;

use soupnet_types::{EventEnvelope, NodeRuntimeStats, ProxyEndpoint, Result, SoupNetError};

fn network_err(reason: impl Into<String>) -> SoupNetError {
    SoupNetError::Network {
        reason: reason.into(),
    }
}

/// Per-node gossip state.
///
/// The node never talks to the network itself: `sync_tick` returns the
/// events that *would* be published and the embedder's transport takes
/// it from there.
#[derive(Default)]
pub struct GossipNode {
    running: bool,
    alpha_test_mode: bool,
    network_name: String,
    p2p_port: u16,
    local_cid: String,
    endpoint: ProxyEndpoint,
    peers: Vec<String>,
    seen_event_ids: HashSet<String>,
    outbound_queue: Vec<EventEnvelope>,
    sync_tick_count: u64,
}

impl GossipNode {
    /// Starts the node with seed peers and bind/advertise metadata.
    pub fn start(
        &mut self,
        seed_peers: &[String],
        endpoint: ProxyEndpoint,
        local_cid: &str,
        alpha_test_mode: bool,
        p2p_port: u16,
        network_name: &str,
    ) -> Result<()> {
        if local_cid.is_empty() {
            return Err(network_err("P2P start failed: local CID is empty."));
        }

        self.running = true;
        self.alpha_test_mode = alpha_test_mode;
        self.network_name = if network_name.is_empty() {
            "mainnet".into()
        } else {
            network_name.to_string()
        };
        self.p2p_port = if p2p_port == 0 {
            if alpha_test_mode {
                14001
            } else {
                4001
            }
        } else {
            p2p_port
        };
        self.local_cid = local_cid.to_string();
        self.endpoint = endpoint;
        if self.endpoint.port == 0 {
            self.endpoint.port = if alpha_test_mode { 4444 } else { 9050 };
        }

        for peer in seed_peers {
            if !peer.is_empty() {
                self.peers.push(peer.clone());
            }
        }
        self.peers.sort();
        self.peers.dedup();

        debug!(
            peers = self.peers.len(),
            network = %self.network_name,
            "gossip node started"
        );
        Ok(())
    }

    /// Stops the node and drops any unpublished events.
    pub fn stop(&mut self) {
        self.running = false;
        self.outbound_queue.clear();
    }

    pub fn peers(&self) -> &[String] {
        &self.peers
    }

    /// CID this node advertises to peers.
    pub fn local_cid(&self) -> &str {
        &self.local_cid
    }

    /// Loads newline-delimited peer endpoints; `#` lines are comments.
    /// A missing file is not an error — it appears on first save.
    pub fn load_peers_dat(&mut self, path: &Path) -> Result<()> {
        let Ok(contents) = fs::read_to_string(path) else {
            return Ok(());
        };

        for line in contents.lines() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            self.peers.push(trimmed.to_string());
        }

        self.peers.sort();
        self.peers.dedup();
        Ok(())
    }

    /// Serializes the peer list back to disk.
    pub fn save_peers_dat(&self, path: &Path) -> Result<()> {
        if path.as_os_str().is_empty() {
            return Err(network_err("save_peers_dat failed: empty path."));
        }

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| {
                    network_err(format!("Unable to create peers.dat directory: {e}"))
                })?;
            }
        }

        let mut contents = String::from("# got-soup peers.dat\n# one peer per line\n");
        for peer in &self.peers {
            contents.push_str(peer);
            contents.push('\n');
        }
        fs::write(path, contents)
            .map_err(|e| network_err(format!("Unable to write peers.dat file: {e}")))
    }

    /// Adds one peer endpoint. Loopback peers require alpha test mode.
    pub fn add_peer(&mut self, peer: &str) -> Result<()> {
        let trimmed = peer.trim().to_string();
        if trimmed.is_empty() {
            return Err(network_err("Peer is empty."));
        }
        if !self.alpha_test_mode && trimmed.contains("127.0.0.1") {
            return Err(network_err("127.0.0.1 peers require Alpha Test Mode."));
        }

        self.peers.push(trimmed);
        self.peers.sort();
        self.peers.dedup();
        Ok(())
    }

    /// Queues a locally-authored event unless its id was already seen.
    pub fn queue_local_event(&mut self, event: &EventEnvelope) {
        if !self.running || event.event_id.is_empty() {
            return;
        }
        if self.seen_event_ids.insert(event.event_id.clone()) {
            self.outbound_queue.push(event.clone());
        }
    }

    /// Marks a remote event seen; returns whether it was new.
    pub fn ingest_remote_event(&mut self, event: &EventEnvelope) -> bool {
        if !self.running || event.event_id.is_empty() {
            return false;
        }
        self.seen_event_ids.insert(event.event_id.clone())
    }

    /// Drains the outbound queue and returns what would be published.
    pub fn sync_tick(&mut self) -> Vec<EventEnvelope> {
        if !self.running {
            return Vec::new();
        }
        self.sync_tick_count += 1;
        std::mem::take(&mut self.outbound_queue)
    }

    /// Runtime counters for `node_status()`.
    pub fn runtime_status(&self) -> NodeRuntimeStats {
        NodeRuntimeStats {
            running: self.running,
            alpha_test_mode: self.alpha_test_mode,
            network: self.network_name.clone(),
            bind_host: if self.alpha_test_mode {
                "127.0.0.1".into()
            } else {
                "0.0.0.0".into()
            },
            bind_port: self.p2p_port,
            proxy_port: self.endpoint.port,
            peer_count: self.peers.len(),
            outbound_queue: self.outbound_queue.len(),
            seen_event_count: self.seen_event_ids.len(),
            sync_tick_count: self.sync_tick_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn started_node(alpha: bool) -> GossipNode {
        let mut node = GossipNode::default();
        node.start(
            &["seed-a:4001".into(), "seed-b:4001".into(), "seed-a:4001".into()],
            ProxyEndpoint {
                host: "127.0.0.1".into(),
                port: 9150,
            },
            "cid-local",
            alpha,
            4001,
            "mainnet",
        )
        .expect("node starts");
        node
    }

    fn sample_event(id: &str) -> EventEnvelope {
        EventEnvelope {
            event_id: id.into(),
            payload: "k=v\n".into(),
            signature: "sig".into(),
            ..EventEnvelope::default()
        }
    }

    #[test]
    fn start_dedups_seed_peers() {
        let node = started_node(false);
        assert_eq!(node.peers(), &["seed-a:4001", "seed-b:4001"]);
    }

    #[test]
    fn start_requires_local_cid() {
        let mut node = GossipNode::default();
        let result = node.start(&[], ProxyEndpoint::default(), "", false, 0, "mainnet");
        assert!(result.is_err());
    }

    #[test]
    fn queue_dedups_by_event_id() {
        let mut node = started_node(false);
        let event = sample_event("evt-1");
        node.queue_local_event(&event);
        node.queue_local_event(&event);

        let published = node.sync_tick();
        assert_eq!(published.len(), 1);
        assert!(node.sync_tick().is_empty());
    }

    #[test]
    fn ingest_reports_novelty_once() {
        let mut node = started_node(false);
        let event = sample_event("evt-remote");
        assert!(node.ingest_remote_event(&event));
        assert!(!node.ingest_remote_event(&event));
    }

    #[test]
    fn ingested_event_is_not_requeued_locally() {
        let mut node = started_node(false);
        let event = sample_event("evt-shared");
        assert!(node.ingest_remote_event(&event));
        node.queue_local_event(&event);
        assert!(node.sync_tick().is_empty());
    }

    #[test]
    fn stopped_node_ignores_traffic() {
        let mut node = started_node(false);
        node.queue_local_event(&sample_event("evt-1"));
        node.stop();
        assert!(node.sync_tick().is_empty());
        assert!(!node.ingest_remote_event(&sample_event("evt-2")));
    }

    #[test]
    fn loopback_peers_require_alpha_mode() {
        let mut node = started_node(false);
        assert!(node.add_peer("127.0.0.1:4001").is_err());

        let mut alpha_node = started_node(true);
        assert!(alpha_node.add_peer("127.0.0.1:4001").is_ok());
    }

    #[test]
    fn peers_dat_roundtrip() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("peers.dat");

        let mut node = started_node(false);
        node.add_peer("peer.example:4001").expect("add peer");
        node.save_peers_dat(&path).expect("save");

        let mut reloaded = GossipNode::default();
        reloaded.load_peers_dat(&path).expect("load");
        assert!(reloaded
            .peers()
            .contains(&"peer.example:4001".to_string()));
    }

    #[test]
    fn runtime_status_reflects_mode() {
        let node = started_node(true);
        let status = node.runtime_status();
        assert!(status.running);
        assert!(status.alpha_test_mode);
        assert_eq!(status.bind_host, "127.0.0.1");
        assert_eq!(status.peer_count, 2);
    }
}
