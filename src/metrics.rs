// Copyright (c) 2026 Amunchain
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//     http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! Router-level Prometheus metrics.

use prometheus::{IntCounter, IntGauge, Registry};
use thiserror::Error;

/// Metrics errors.
#[derive(Debug, Error)]
pub enum MetricsError {
    /// A metric name collided with an already-registered one, or
    /// `prometheus` otherwise rejected registration.
    #[error("prometheus registration failed")]
    Prom,
}

/// Router-level metrics container.
///
/// Scoped to what a `RouterCore` can observe about itself, not the full
/// embedding node — constructed once by the caller and shared via `Arc`,
/// never a process-global singleton, mirroring how the teacher's
/// `spawn_p2p` takes an `Arc<Metrics>` rather than reaching for a static.
#[derive(Clone)]
pub struct RouterMetrics {
    /// Registry these metrics are registered against.
    pub registry: Registry,

    /// Current size of the peer map.
    pub pubsub_peers: IntGauge,
    /// `validate` failures due to a bad signature.
    pub pubsub_invalid_signature_total: IntCounter,
    /// Strict-mode drops of unsigned inbound messages.
    pub pubsub_missing_signature_total: IntCounter,
    /// Frame decode failures.
    pub pubsub_malformed_frame_total: IntCounter,
    /// `onPeerConnected` outbound stream-negotiation failures.
    pub pubsub_outbound_negotiate_failed_total: IntCounter,
}

impl RouterMetrics {
    /// Create and register metrics against a fresh registry.
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();

        let pubsub_peers = IntGauge::new("pubsub_peers", "Current size of the peer map")
            .map_err(|_| MetricsError::Prom)?;
        let pubsub_invalid_signature_total = IntCounter::new(
            "pubsub_invalid_signature_total",
            "Messages dropped for failing signature verification",
        )
        .map_err(|_| MetricsError::Prom)?;
        let pubsub_missing_signature_total = IntCounter::new(
            "pubsub_missing_signature_total",
            "Unsigned messages dropped under strict signing",
        )
        .map_err(|_| MetricsError::Prom)?;
        let pubsub_malformed_frame_total = IntCounter::new(
            "pubsub_malformed_frame_total",
            "Frame decode failures on a peer's inbound stream",
        )
        .map_err(|_| MetricsError::Prom)?;
        let pubsub_outbound_negotiate_failed_total = IntCounter::new(
            "pubsub_outbound_negotiate_failed_total",
            "Outbound stream negotiation failures in onPeerConnected",
        )
        .map_err(|_| MetricsError::Prom)?;

        registry.register(Box::new(pubsub_peers.clone())).map_err(|_| MetricsError::Prom)?;
        registry
            .register(Box::new(pubsub_invalid_signature_total.clone()))
            .map_err(|_| MetricsError::Prom)?;
        registry
            .register(Box::new(pubsub_missing_signature_total.clone()))
            .map_err(|_| MetricsError::Prom)?;
        registry
            .register(Box::new(pubsub_malformed_frame_total.clone()))
            .map_err(|_| MetricsError::Prom)?;
        registry
            .register(Box::new(pubsub_outbound_negotiate_failed_total.clone()))
            .map_err(|_| MetricsError::Prom)?;

        Ok(Self {
            registry,
            pubsub_peers,
            pubsub_invalid_signature_total,
            pubsub_missing_signature_total,
            pubsub_malformed_frame_total,
            pubsub_outbound_negotiate_failed_total,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registers_without_name_collisions() {
        let metrics = RouterMetrics::new().unwrap();
        assert_eq!(metrics.pubsub_peers.get(), 0);
    }
}
