//! `/health` and `/status` bodies.

use std::time::Instant;

use serde::Serialize;

use crate::channel::ChannelTable;

/// Liveness body for `/health`.
pub const HEALTH_OK: &str = "OK";

/// Registry sizes for one channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelStatus {
    /// Channel name.
    pub name: String,
    /// Registered clients.
    pub clients: usize,
    /// Registered hosts.
    pub hosts: usize,
    /// Whether at least one host is registered.
    pub host_connected: bool,
}

/// Body of `/status`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    /// Seconds since the server started.
    pub uptime_secs: u64,
    /// Per-channel counts, sorted by name.
    pub channels: Vec<ChannelStatus>,
}

/// Snapshot registry sizes. Counts are read per registry, not atomically
/// across the table.
pub fn status_report(start_time: Instant, table: &ChannelTable) -> StatusReport {
    let channels = table
        .channels()
        .iter()
        .map(|channel| {
            let hosts = channel.hosts().len();
            ChannelStatus {
                name: channel.name().to_owned(),
                clients: channel.clients().len(),
                hosts,
                host_connected: hosts > 0,
            }
        })
        .collect();

    StatusReport {
        uptime_secs: start_time.elapsed().as_secs(),
        channels,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use stul_core::Role;
    use tokio::sync::mpsc;

    use crate::websocket::connection::ConnectionHandle;

    #[test]
    fn empty_channels_report_zero() {
        let table = ChannelTable::new([("beta", "b"), ("alpha", "a")]);
        let report = status_report(Instant::now(), &table);
        assert_eq!(report.channels.len(), 2);
        assert_eq!(report.channels[0].name, "alpha");
        assert!(report.channels.iter().all(|c| c.clients == 0 && c.hosts == 0));
        assert!(report.uptime_secs < 2);
    }

    #[test]
    fn counts_follow_registries() {
        let table = ChannelTable::new([("alpha", "a")]);
        let channel = table.lookup("alpha").unwrap();
        let (tx, _rx) = mpsc::channel(1);
        let _ = channel
            .registry(Role::Host)
            .register(Arc::new(ConnectionHandle::new(Role::Host, tx)));

        let report = status_report(Instant::now(), &table);
        assert_eq!(
            report.channels[0],
            ChannelStatus {
                name: "alpha".into(),
                clients: 0,
                hosts: 1,
                host_connected: true,
            }
        );
    }

    #[test]
    fn serializes_camel_case() {
        let start = Instant::now().checked_sub(Duration::from_secs(30)).unwrap();
        let report = status_report(start, &ChannelTable::new([("alpha", "a")]));
        let json = serde_json::to_value(&report).unwrap();
        assert!(json["uptimeSecs"].as_u64().unwrap() >= 29);
        assert_eq!(json["channels"][0]["hostConnected"], false);
    }
}
