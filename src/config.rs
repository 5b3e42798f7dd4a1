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

//! Router construction and validation.

use std::sync::Arc;

use crate::error::RouterError;
use crate::peer_id::PeerId;
use crate::registrar::Registrar;

/// Validated construction parameters for a [`crate::router::RouterCore`].
///
/// Holds a registrar trait object and private key material, so unlike the
/// teacher's TOML-sourced `NodeConfig`, this is never `serde`-derived —
/// it is built and validated in-process by the embedding node.
pub struct RouterConfig {
    /// Human-readable name used in logs.
    pub debug_name: String,
    /// Ordered protocol ids this router negotiates, most-preferred first.
    pub multicodecs: Vec<String>,
    /// The local peer's identity.
    pub peer_id: PeerId,
    /// The host's registrar.
    pub registrar: Arc<dyn Registrar>,
    /// Whether `buildMessage` signs outgoing messages. Defaults to `true`
    /// via [`RouterConfig::new`]'s explicit parameter — this crate makes
    /// security-relevant defaults explicit at call sites rather than
    /// silent, the way the teacher's `NodeP2pConfig::require_allow_peers`
    /// is never implicitly assumed.
    pub sign_messages: bool,
    /// Whether `validate` rejects unsigned inbound messages.
    pub strict_signing: bool,
}

impl RouterConfig {
    /// Construct and validate a router configuration.
    ///
    /// Fails with [`RouterError::InvalidConfig`] when `debug_name` is
    /// empty, `multicodecs` is empty, or `sign_messages` is requested
    /// without the local `peer_id` carrying a private key.
    pub fn new(
        debug_name: impl Into<String>,
        multicodecs: Vec<String>,
        peer_id: PeerId,
        registrar: Arc<dyn Registrar>,
        sign_messages: bool,
        strict_signing: bool,
    ) -> Result<Self, RouterError> {
        let debug_name = debug_name.into();
        if debug_name.is_empty() {
            return Err(RouterError::InvalidConfig("debugName must not be empty"));
        }
        if multicodecs.is_empty() {
            return Err(RouterError::InvalidConfig("multicodecs must contain at least one protocol"));
        }
        if sign_messages && !peer_id.has_private_key() {
            return Err(RouterError::InvalidConfig(
                "peerId must carry a private key when signMessages is true",
            ));
        }

        Ok(Self { debug_name, multicodecs, peer_id, registrar, sign_messages, strict_signing })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registrar::{IncomingStream, Receipt, Topology};
    use async_trait::async_trait;

    struct StubRegistrar;

    #[async_trait]
    impl Registrar for StubRegistrar {
        async fn handle(&self, _m: Vec<String>, _h: Arc<dyn Fn(IncomingStream) + Send + Sync>) {}
        async fn register(&self, _t: Arc<dyn Topology>) -> Receipt {
            Receipt(0)
        }
        async fn unregister(&self, _r: Receipt) {}
    }

    #[test]
    fn rejects_empty_debug_name() {
        let result = RouterConfig::new(
            "",
            vec!["/pubsub/1.0.0".into()],
            PeerId::generate_ed25519(),
            Arc::new(StubRegistrar),
            true,
            true,
        );
        assert!(matches!(result, Err(RouterError::InvalidConfig(_))));
    }

    #[test]
    fn rejects_empty_multicodecs() {
        let result = RouterConfig::new(
            "node-a",
            vec![],
            PeerId::generate_ed25519(),
            Arc::new(StubRegistrar),
            true,
            true,
        );
        assert!(matches!(result, Err(RouterError::InvalidConfig(_))));
    }

    #[test]
    fn rejects_sign_messages_without_private_key() {
        let remote = PeerId::from_public_key(PeerId::generate_ed25519().public_key().clone());
        let result = RouterConfig::new(
            "node-a",
            vec!["/pubsub/1.0.0".into()],
            remote,
            Arc::new(StubRegistrar),
            true,
            true,
        );
        assert!(matches!(result, Err(RouterError::InvalidConfig(_))));
    }

    #[test]
    fn accepts_valid_config() {
        let result = RouterConfig::new(
            "node-a",
            vec!["/pubsub/1.0.0".into()],
            PeerId::generate_ed25519(),
            Arc::new(StubRegistrar),
            true,
            true,
        );
        assert!(result.is_ok());
    }
}
