//! Best-effort fan-out of one envelope to a registry.

use axum::extract::ws::Utf8Bytes;
use metrics::counter;
use stul_core::Envelope;
use tracing::{debug, warn};

use super::registry::ConnectionRegistry;
use crate::metrics::BROADCAST_DROPS_TOTAL;

/// Outcome of one broadcast.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Handles in the snapshot.
    pub recipients: usize,
    /// Handles that accepted the frame.
    pub delivered: usize,
    /// Handles that refused it (full, closed or cancelled).
    pub failed: usize,
}

/// Deliver `envelope` to every connection currently in `registry`.
///
/// The envelope is serialized once. Each recipient is tried independently:
/// a failure is logged and counted but never stops delivery to the others,
/// and never removes the recipient. Only the recipient's own session
/// deregisters it.
pub fn broadcast(registry: &ConnectionRegistry, envelope: &Envelope) -> BroadcastReport {
    let frame = match serde_json::to_string(envelope) {
        Ok(json) => Utf8Bytes::from(json),
        Err(e) => {
            warn!(kind = envelope.kind(), error = %e, "failed to serialize envelope");
            return BroadcastReport::default();
        }
    };

    let snapshot = registry.snapshot();
    let mut report = BroadcastReport {
        recipients: snapshot.len(),
        ..BroadcastReport::default()
    };

    for (id, handle) in snapshot {
        match handle.send_frame(frame.clone()) {
            Ok(()) => report.delivered += 1,
            Err(e) => {
                report.failed += 1;
                counter!(BROADCAST_DROPS_TOTAL).increment(1);
                debug!(conn_id = %id, role = %registry.role(), error = %e, "broadcast delivery failed");
            }
        }
    }

    debug!(
        kind = envelope.kind(),
        role = %registry.role(),
        recipients = report.recipients,
        failed = report.failed,
        "broadcast"
    );
    report
}
