//! Client configuration from environment variables.

use std::time::Duration;

use crate::ws::ReconnectConfig;

pub const DEFAULT_SOCKET_URL: &str = "wss://chat.api.drift.com/ws/websocket";
pub const DEFAULT_PROBE_TARGET: &str = "chat.api.drift.com:443";

const DEFAULT_HEARTBEAT_SECS: u64 = 30;
const DEFAULT_REJOIN_SECS: u64 = 5;
const DEFAULT_PROBE_SECS: u64 = 10;

/// How the reachability monitor observes the network.
#[derive(Debug, Clone, PartialEq)]
pub enum ProbeTarget {
    /// Periodically open a TCP connection to `addr` (`host:port`).
    Tcp { addr: String, interval: Duration },
    /// No active probing; the host application feeds reachability itself.
    Disabled,
}

/// Settings for the realtime connection.
#[derive(Debug, Clone)]
pub struct SocketConfig {
    /// Socket endpoint; the session token is appended as a query parameter.
    pub url: String,
    pub heartbeat_interval: Duration,
    /// Delay before rejoining a channel the server rejected or closed.
    pub rejoin_delay: Duration,
    pub reconnect: ReconnectConfig,
    pub probe: ProbeTarget,
}

impl Default for SocketConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_SOCKET_URL.to_string(),
            heartbeat_interval: Duration::from_secs(DEFAULT_HEARTBEAT_SECS),
            rejoin_delay: Duration::from_secs(DEFAULT_REJOIN_SECS),
            reconnect: ReconnectConfig::default(),
            probe: ProbeTarget::Tcp {
                addr: DEFAULT_PROBE_TARGET.to_string(),
                interval: Duration::from_secs(DEFAULT_PROBE_SECS),
            },
        }
    }
}

impl SocketConfig {
    /// Read configuration from the process environment. Values that are not
    /// a positive whole number of seconds fall back to the default.
    ///
    /// Environment variables:
    /// - `CHATLINK_SOCKET_URL`: socket endpoint (default: the hosted chat backend)
    /// - `CHATLINK_HEARTBEAT_SECS`: heartbeat interval (default: 30)
    /// - `CHATLINK_REJOIN_SECS`: channel rejoin delay (default: 5)
    /// - `CHATLINK_PROBE_TARGET`: `host:port` to probe, or `off` (default: the backend on 443)
    /// - `CHATLINK_PROBE_SECS`: probe interval (default: 10)
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`SocketConfig::from_env`] with an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let secs = |key: &str, default: u64| {
            lookup(key)
                .and_then(|v| v.trim().parse::<u64>().ok())
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .unwrap_or(Duration::from_secs(default))
        };

        let url = lookup("CHATLINK_SOCKET_URL")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_SOCKET_URL.to_string());

        let probe_interval = secs("CHATLINK_PROBE_SECS", DEFAULT_PROBE_SECS);
        let probe = match lookup("CHATLINK_PROBE_TARGET") {
            Some(v) if v.eq_ignore_ascii_case("off") => ProbeTarget::Disabled,
            Some(v) if !v.trim().is_empty() => ProbeTarget::Tcp {
                addr: v.trim().to_string(),
                interval: probe_interval,
            },
            _ => ProbeTarget::Tcp {
                addr: DEFAULT_PROBE_TARGET.to_string(),
                interval: probe_interval,
            },
        };

        Self {
            url,
            heartbeat_interval: secs("CHATLINK_HEARTBEAT_SECS", DEFAULT_HEARTBEAT_SECS),
            rejoin_delay: secs("CHATLINK_REJOIN_SECS", DEFAULT_REJOIN_SECS),
            reconnect: ReconnectConfig::default(),
            probe,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let config = SocketConfig::from_lookup(lookup(&[]));
        assert_eq!(config.url, DEFAULT_SOCKET_URL);
        assert_eq!(config.heartbeat_interval, Duration::from_secs(30));
        assert_eq!(config.rejoin_delay, Duration::from_secs(5));
        assert_eq!(
            config.probe,
            ProbeTarget::Tcp {
                addr: DEFAULT_PROBE_TARGET.to_string(),
                interval: Duration::from_secs(10)
            }
        );
    }

    #[test]
    fn overrides_are_applied() {
        let config = SocketConfig::from_lookup(lookup(&[
            ("CHATLINK_SOCKET_URL", "ws://localhost:4000/socket/websocket"),
            ("CHATLINK_HEARTBEAT_SECS", "5"),
            ("CHATLINK_PROBE_TARGET", "localhost:4000"),
            ("CHATLINK_PROBE_SECS", "2"),
        ]));
        assert_eq!(config.url, "ws://localhost:4000/socket/websocket");
        assert_eq!(config.heartbeat_interval, Duration::from_secs(5));
        assert_eq!(
            config.probe,
            ProbeTarget::Tcp {
                addr: "localhost:4000".to_string(),
                interval: Duration::from_secs(2)
            }
        );
    }

    #[test]
    fn probe_can_be_disabled() {
        let config = SocketConfig::from_lookup(lookup(&[("CHATLINK_PROBE_TARGET", "OFF")]));
        assert_eq!(config.probe, ProbeTarget::Disabled);
    }

    #[test]
    fn bad_numbers_fall_back() {
        let config = SocketConfig::from_lookup(lookup(&[("CHATLINK_REJOIN_SECS", "soon")]));
        assert_eq!(config.rejoin_delay, Duration::from_secs(5));
    }

    #[test]
    fn zero_intervals_fall_back() {
        let config = SocketConfig::from_lookup(lookup(&[
            ("CHATLINK_PROBE_SECS", "0"),
            ("CHATLINK_HEARTBEAT_SECS", "0"),
        ]));
        assert_eq!(config.heartbeat_interval, Duration::from_secs(30));
        assert_eq!(
            config.probe,
            ProbeTarget::Tcp {
                addr: DEFAULT_PROBE_TARGET.to_string(),
                interval: Duration::from_secs(10)
            }
        );
    }
}
