//! Anonymity-transport providers.
//!
//! Tor and I2P are opaque external services as far as the core is
//! concerned: each provider exposes start/stop/status and a SOCKS-style
//! proxy endpoint the gossip node routes through. These scaffold
//! implementations track lifecycle state and hand out the conventional
//! local proxy ports; embedders supply real daemons out of band.

use soupnet_protocol::clock::unix_timestamp_now;
use soupnet_types::{AnonymityMode, AnonymityStatus, ProxyEndpoint, Result};

const TOR_PROVIDER_VERSION: &str = "libtor-provider-scaffold-0.1";
const I2P_PROVIDER_VERSION: &str = "i2pd-provider-scaffold-0.1";

/// Capability interface over an anonymity transport.
pub trait AnonymityProvider {
    fn start(&mut self) -> Result<()>;
    fn stop(&mut self);
    fn set_alpha_test_mode(&mut self, enabled: bool);
    fn status(&self) -> AnonymityStatus;
    fn proxy_endpoint(&self) -> ProxyEndpoint;
}

#[derive(Default)]
struct ProviderState {
    running: bool,
    alpha_test_mode: bool,
    last_started_unix: i64,
    last_stopped_unix: i64,
    update_count: u64,
}

/// Embedded Tor scaffold (SOCKS on 9150, 19050 in alpha test mode).
#[derive(Default)]
pub struct TorProvider {
    state: ProviderState,
}

/// Embedded i2pd scaffold (HTTP proxy on 4444, 14044 in alpha test mode).
#[derive(Default)]
pub struct I2pProvider {
    state: ProviderState,
}

fn status_for(
    state: &ProviderState,
    mode: &str,
    version: &str,
    endpoint: ProxyEndpoint,
) -> AnonymityStatus {
    let details = if state.running {
        if state.alpha_test_mode {
            format!("{mode} provider running in localhost alpha test mode.")
        } else {
            format!("{mode} provider running in standard network mode.")
        }
    } else {
        format!("{mode} provider stopped.")
    };

    AnonymityStatus {
        running: state.running,
        mode: mode.to_string(),
        version: version.to_string(),
        details,
        last_started_unix: state.last_started_unix,
        last_stopped_unix: state.last_stopped_unix,
        update_count: state.update_count,
        endpoint,
    }
}

impl AnonymityProvider for TorProvider {
    fn start(&mut self) -> Result<()> {
        self.state.running = true;
        self.state.last_started_unix = unix_timestamp_now();
        self.state.update_count += 1;
        Ok(())
    }

    fn stop(&mut self) {
        self.state.running = false;
        self.state.last_stopped_unix = unix_timestamp_now();
        self.state.update_count += 1;
    }

    fn set_alpha_test_mode(&mut self, enabled: bool) {
        self.state.alpha_test_mode = enabled;
        self.state.update_count += 1;
    }

    fn status(&self) -> AnonymityStatus {
        status_for(
            &self.state,
            "Tor",
            TOR_PROVIDER_VERSION,
            self.proxy_endpoint(),
        )
    }

    fn proxy_endpoint(&self) -> ProxyEndpoint {
        ProxyEndpoint {
            host: "127.0.0.1".into(),
            port: if self.state.alpha_test_mode {
                19050
            } else {
                9150
            },
        }
    }
}

impl AnonymityProvider for I2pProvider {
    fn start(&mut self) -> Result<()> {
        self.state.running = true;
        self.state.last_started_unix = unix_timestamp_now();
        self.state.update_count += 1;
        Ok(())
    }

    fn stop(&mut self) {
        self.state.running = false;
        self.state.last_stopped_unix = unix_timestamp_now();
        self.state.update_count += 1;
    }

    fn set_alpha_test_mode(&mut self, enabled: bool) {
        self.state.alpha_test_mode = enabled;
        self.state.update_count += 1;
    }

    fn status(&self) -> AnonymityStatus {
        status_for(
            &self.state,
            "I2P",
            I2P_PROVIDER_VERSION,
            self.proxy_endpoint(),
        )
    }

    fn proxy_endpoint(&self) -> ProxyEndpoint {
        ProxyEndpoint {
            host: "127.0.0.1".into(),
            port: if self.state.alpha_test_mode {
                14044
            } else {
                4444
            },
        }
    }
}

/// Builds the provider for a transport mode.
pub fn make_anonymity_provider(mode: AnonymityMode) -> Box<dyn AnonymityProvider> {
    match mode {
        AnonymityMode::I2p => Box::new(I2pProvider::default()),
        AnonymityMode::Tor => Box::new(TorProvider::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tor_lifecycle_updates_status() {
        let mut provider = TorProvider::default();
        assert!(!provider.status().running);

        provider.start().expect("start");
        let status = provider.status();
        assert!(status.running);
        assert_eq!(status.mode, "Tor");
        assert!(status.last_started_unix > 0);

        provider.stop();
        assert!(!provider.status().running);
    }

    #[test]
    fn alpha_mode_switches_proxy_ports() {
        let mut tor = TorProvider::default();
        assert_eq!(tor.proxy_endpoint().port, 9150);
        tor.set_alpha_test_mode(true);
        assert_eq!(tor.proxy_endpoint().port, 19050);

        let mut i2p = I2pProvider::default();
        assert_eq!(i2p.proxy_endpoint().port, 4444);
        i2p.set_alpha_test_mode(true);
        assert_eq!(i2p.proxy_endpoint().port, 14044);
    }

    #[test]
    fn factory_builds_matching_mode() {
        let tor = make_anonymity_provider(AnonymityMode::Tor);
        assert_eq!(tor.status().mode, "Tor");
        let i2p = make_anonymity_provider(AnonymityMode::I2p);
        assert_eq!(i2p.status().mode, "I2P");
    }
}
