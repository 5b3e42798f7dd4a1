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

//! Router lifecycle, peer registry, and the subclass hook surface.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, error, warn};

use crate::config::RouterConfig;
use crate::error::RouterError;
use crate::message::Message;
use crate::metrics::RouterMetrics;
use crate::peer_id::PeerId;
use crate::peer_stream::{InboundFrames, PeerStream, PeerStreamEvent};
use crate::registrar::{Connection, IncomingStream, Receipt, Topology};
use crate::signing::{sign, verify};

/// A routing policy built on top of [`RouterCore`].
///
/// The base implementation of every method here fails with
/// [`RouterError::NotImplemented`] — a concrete flood/mesh policy
/// overrides the five operations it actually provides. `core()` exposes
/// the shared lifecycle/registry state every hook needs.
#[async_trait]
pub trait PubsubRouter: Send + Sync {
    /// The router-base state this policy is layered over.
    fn core(&self) -> &Arc<RouterCore>;

    /// Publish `data` to `topic`.
    async fn publish(&self, _topic: &str, _data: Vec<u8>) -> Result<(), RouterError> {
        Err(RouterError::NotImplemented)
    }

    /// Subscribe to `topic`.
    async fn subscribe(&self, _topic: &str) -> Result<(), RouterError> {
        Err(RouterError::NotImplemented)
    }

    /// Unsubscribe from `topic`.
    async fn unsubscribe(&self, _topic: &str) -> Result<(), RouterError> {
        Err(RouterError::NotImplemented)
    }

    /// The topics this router is currently subscribed to.
    fn get_topics(&self) -> Result<Vec<String>, RouterError> {
        Err(RouterError::NotImplemented)
    }

    /// Consume a peer's framed inbound iterator, typically decoding each
    /// frame as an RPC, validating contained messages via
    /// [`RouterCore::validate`], deduping by `(from, seqno)` at its own
    /// discretion, and re-dispatching.
    async fn process_messages(
        &self,
        _peer_b58: String,
        _inbound: InboundFrames,
        _stream: Arc<PeerStream>,
    ) -> Result<(), RouterError> {
        Err(RouterError::NotImplemented)
    }
}

struct RouterTopology {
    core: Arc<RouterCore>,
    multicodecs: Vec<String>,
}

#[async_trait]
impl Topology for RouterTopology {
    fn multicodecs(&self) -> &[String] {
        &self.multicodecs
    }

    async fn on_connect(&self, peer: PeerId, connection: Arc<dyn Connection>) {
        self.core.on_peer_connected(peer, connection).await;
    }

    async fn on_disconnect(&self, peer: PeerId, error: Option<String>) {
        self.core.on_peer_disconnected(peer, error).await;
    }
}

/// Router lifecycle, peer registry, and topic-subscriber index.
///
/// Exclusively owns the `peers` map (mutated only by `add_peer`/
/// `remove_peer`); `topics` is mutated by the subclass through
/// [`RouterCore::subscribe_peer`]/[`RouterCore::unsubscribe_peer`] and
/// read only by [`RouterCore::get_subscribers`].
pub struct RouterCore {
    config: RouterConfig,
    metrics: Arc<RouterMetrics>,
    started: AtomicBool,
    peers: Mutex<HashMap<String, Arc<PeerStream>>>,
    topics: Mutex<HashMap<String, Vec<Arc<PeerStream>>>>,
    registrar_receipt: Mutex<Option<Receipt>>,
}

impl RouterCore {
    /// Construct a router base from a validated configuration.
    pub fn new(config: RouterConfig, metrics: Arc<RouterMetrics>) -> Arc<Self> {
        Arc::new(Self {
            config,
            metrics,
            started: AtomicBool::new(false),
            peers: Mutex::new(HashMap::new()),
            topics: Mutex::new(HashMap::new()),
            registrar_receipt: Mutex::new(None),
        })
    }

    /// Whether `start()` has completed without a matching `stop()`.
    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    /// The router's own identity.
    pub fn peer_id(&self) -> &PeerId {
        &self.config.peer_id
    }

    /// Idempotent. Registers the inbound-stream handler and a connection
    /// topology with the registrar, retaining the opaque receipt.
    pub async fn start(self: &Arc<Self>, router: Arc<dyn PubsubRouter>) -> Result<(), RouterError> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let core_for_handler = Arc::clone(self);
        let router_for_handler = Arc::clone(&router);
        let handler: Arc<dyn Fn(IncomingStream) + Send + Sync> = Arc::new(move |incoming| {
            let core = Arc::clone(&core_for_handler);
            let router = Arc::clone(&router_for_handler);
            tokio::spawn(async move {
                core.on_incoming_stream(incoming, router).await;
            });
        });
        self.config.registrar.handle(self.config.multicodecs.clone(), handler).await;

        let topology = Arc::new(RouterTopology {
            core: Arc::clone(self),
            multicodecs: self.config.multicodecs.clone(),
        });
        let receipt = self.config.registrar.register(topology).await;
        *self.registrar_receipt.lock().await = Some(receipt);

        debug!(router = %self.config.debug_name, "router started");
        Ok(())
    }

    /// Idempotent. Unregisters using the stored receipt, then closes and
    /// clears every peer. Does not fail if an individual peer close does.
    pub async fn stop(&self) -> Result<(), RouterError> {
        if !self.started.swap(false, Ordering::SeqCst) {
            return Ok(());
        }

        if let Some(receipt) = self.registrar_receipt.lock().await.take() {
            self.config.registrar.unregister(receipt).await;
        }

        let old_peers = {
            let mut peers = self.peers.lock().await;
            std::mem::take(&mut *peers)
        };
        self.metrics.pubsub_peers.set(0);
        for (_, stream) in old_peers {
            stream.close().await;
        }

        debug!(router = %self.config.debug_name, "router stopped");
        Ok(())
    }

    /// Returns the existing entry if any (idempotent); otherwise
    /// constructs a new [`PeerStream`], stores it under its base58 id,
    /// and arranges for its `close` event to remove it from the map.
    pub async fn add_peer(self: &Arc<Self>, peer_id: PeerId, protocol: String) -> Arc<PeerStream> {
        let b58 = peer_id.to_base58();
        {
            let peers = self.peers.lock().await;
            if let Some(existing) = peers.get(&b58) {
                return Arc::clone(existing);
            }
        }

        let stream = PeerStream::new(peer_id, protocol);
        {
            let mut peers = self.peers.lock().await;
            if let Some(existing) = peers.get(&b58) {
                return Arc::clone(existing);
            }
            peers.insert(b58.clone(), Arc::clone(&stream));
            self.metrics.pubsub_peers.set(peers.len() as i64);
        }

        let core = Arc::clone(self);
        let mut events = stream.subscribe();
        tokio::spawn(async move {
            while let Ok(event) = events.recv().await {
                if event == PeerStreamEvent::Close {
                    core.remove_peer_by_b58(&b58).await;
                    break;
                }
            }
        });

        stream
    }

    /// Locates the entry for `peer_id`; if present, closes it and removes
    /// it from the map, returning the removed entry.
    pub async fn remove_peer(&self, peer_id: &PeerId) -> Option<Arc<PeerStream>> {
        self.remove_peer_by_b58(&peer_id.to_base58()).await
    }

    async fn remove_peer_by_b58(&self, b58: &str) -> Option<Arc<PeerStream>> {
        let removed = {
            let mut peers = self.peers.lock().await;
            let removed = peers.remove(b58);
            self.metrics.pubsub_peers.set(peers.len() as i64);
            removed
        };
        if let Some(stream) = &removed {
            stream.close().await;
        }
        removed
    }

    /// Derives the peer id from `incoming.connection`, attaches the
    /// inbound stream, and dispatches `processMessages` to the subclass
    /// in the background.
    pub async fn on_incoming_stream(self: &Arc<Self>, incoming: IncomingStream, router: Arc<dyn PubsubRouter>) {
        let peer_id = incoming.connection.remote_peer().clone();
        let peer_b58 = peer_id.to_base58();
        let peer_stream = self.add_peer(peer_id, incoming.protocol).await;
        let inbound = peer_stream.attach_inbound(incoming.stream).await;

        let stream_for_process = Arc::clone(&peer_stream);
        tokio::spawn(async move {
            if let Err(err) = router.process_messages(peer_b58, inbound, stream_for_process).await {
                warn!("process_messages returned an error: {err}");
            }
        });
    }

    /// Opens a new outbound stream on `connection`, negotiating the
    /// configured multicodecs, and attaches it. A negotiation failure is
    /// logged; the peer is left without an outbound until the next
    /// connect event.
    pub async fn on_peer_connected(self: &Arc<Self>, peer_id: PeerId, connection: Arc<dyn Connection>) {
        match connection.new_stream(&self.config.multicodecs).await {
            Ok(duplex) => {
                let stream = self.add_peer(peer_id, duplex.protocol).await;
                stream.attach_outbound(duplex.write).await;
            }
            Err(err) => {
                self.metrics.pubsub_outbound_negotiate_failed_total.inc();
                warn!(peer = %peer_id, "outbound stream negotiation failed: {}", err.0);
            }
        }
    }

    /// Removes the peer. An error whose message is exactly `socket hang
    /// up` is not logged at error level; any other error is.
    pub async fn on_peer_disconnected(&self, peer_id: PeerId, error: Option<String>) {
        match error.as_deref() {
            Some("socket hang up") => warn!(peer = %peer_id, "peer disconnected: socket hang up"),
            Some(other) => error!(peer = %peer_id, "peer disconnected with error: {other}"),
            None => {}
        }
        self.remove_peer(&peer_id).await;
    }

    /// Normalise `message` (the caller is expected to have set `from`,
    /// `data`, `seqno`, and `topic_ids`) and, when `signMessages` is
    /// true, sign it with the local identity.
    pub fn build_message(&self, message: Message) -> Result<Message, RouterError> {
        if self.config.sign_messages {
            Ok(sign(&self.config.peer_id, &message)?)
        } else {
            let mut unsigned = message;
            unsigned.signature = None;
            unsigned.key = None;
            Ok(unsigned)
        }
    }

    /// Fails with [`RouterError::MissingSignature`] when strict signing
    /// is on and `message` carries no signature. Fails with
    /// [`RouterError::InvalidSignature`] when a present signature does
    /// not verify.
    pub fn validate(&self, message: &Message) -> Result<(), RouterError> {
        if message.signature.is_none() {
            if self.config.strict_signing {
                self.metrics.pubsub_missing_signature_total.inc();
                return Err(RouterError::MissingSignature);
            }
            return Ok(());
        }

        match verify(message) {
            Ok(true) => Ok(()),
            Ok(false) => {
                self.metrics.pubsub_invalid_signature_total.inc();
                Err(RouterError::InvalidSignature)
            }
            Err(_) => {
                self.metrics.pubsub_invalid_signature_total.inc();
                Err(RouterError::InvalidSignature)
            }
        }
    }

    /// Fails with [`RouterError::NotStarted`] if the router has not
    /// started; fails with [`RouterError::InvalidTopic`] if `topic` is
    /// empty. Otherwise returns the base58 ids of the topic's
    /// subscribers in iteration order.
    pub async fn get_subscribers(&self, topic: &str) -> Result<Vec<String>, RouterError> {
        if !self.is_started() {
            return Err(RouterError::NotStarted);
        }
        if topic.is_empty() {
            return Err(RouterError::InvalidTopic);
        }
        let topics = self.topics.lock().await;
        Ok(topics.get(topic).map(|subs| subs.iter().map(|s| s.id().to_base58()).collect()).unwrap_or_default())
    }

    /// Add `stream` as a subscriber of `topic` (subclass-owned mutation).
    /// A no-op if it is already subscribed.
    pub async fn subscribe_peer(&self, topic: &str, stream: Arc<PeerStream>) {
        let mut topics = self.topics.lock().await;
        let subs = topics.entry(topic.to_string()).or_default();
        if !subs.iter().any(|s| s.id() == stream.id()) {
            subs.push(stream);
        }
    }

    /// Remove `stream` as a subscriber of `topic` (subclass-owned
    /// mutation). A no-op if it was not subscribed.
    pub async fn unsubscribe_peer(&self, topic: &str, stream: &Arc<PeerStream>) {
        let mut topics = self.topics.lock().await;
        if let Some(subs) = topics.get_mut(topic) {
            subs.retain(|s| s.id() != stream.id());
        }
    }

    /// Look up a connected peer by its base58 id.
    pub async fn peer(&self, b58: &str) -> Option<Arc<PeerStream>> {
        self.peers.lock().await.get(b58).cloned()
    }

    /// The base58 ids of every currently connected peer.
    pub async fn peer_ids(&self) -> Vec<String> {
        self.peers.lock().await.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registrar::{DuplexStream, NegotiationError, Registrar};
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::Mutex as AsyncMutex;

    struct CountingRegistrar {
        handle_calls: AtomicUsize,
        register_calls: AtomicUsize,
        unregister_calls: AtomicUsize,
        topology: AsyncMutex<Option<Arc<dyn Topology>>>,
    }

    impl CountingRegistrar {
        fn new() -> Self {
            Self {
                handle_calls: AtomicUsize::new(0),
                register_calls: AtomicUsize::new(0),
                unregister_calls: AtomicUsize::new(0),
                topology: AsyncMutex::new(None),
            }
        }
    }

    #[async_trait]
    impl Registrar for CountingRegistrar {
        async fn handle(&self, _m: Vec<String>, _h: Arc<dyn Fn(IncomingStream) + Send + Sync>) {
            self.handle_calls.fetch_add(1, Ordering::SeqCst);
        }

        async fn register(&self, topology: Arc<dyn Topology>) -> Receipt {
            self.register_calls.fetch_add(1, Ordering::SeqCst);
            *self.topology.lock().await = Some(topology);
            Receipt(1)
        }

        async fn unregister(&self, _r: Receipt) {
            self.unregister_calls.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct StubConnection {
        remote: PeerId,
    }

    #[async_trait]
    impl Connection for StubConnection {
        fn remote_peer(&self) -> &PeerId {
            &self.remote
        }

        async fn new_stream(&self, _m: &[String]) -> Result<DuplexStream, NegotiationError> {
            Err(NegotiationError("no transport in test".into()))
        }
    }

    struct NoopRouter {
        core: Arc<RouterCore>,
    }

    #[async_trait]
    impl PubsubRouter for NoopRouter {
        fn core(&self) -> &Arc<RouterCore> {
            &self.core
        }
    }

    fn build_core(registrar: Arc<CountingRegistrar>) -> Arc<RouterCore> {
        let config = RouterConfig::new(
            "test-node",
            vec!["/pubsub/1.0.0".into()],
            PeerId::generate_ed25519(),
            registrar,
            true,
            true,
        )
        .unwrap();
        RouterCore::new(config, Arc::new(RouterMetrics::new().unwrap()))
    }

    #[tokio::test]
    async fn start_stop_is_idempotent_and_calls_registrar_once() {
        let registrar = Arc::new(CountingRegistrar::new());
        let core = build_core(Arc::clone(&registrar));
        let router: Arc<dyn PubsubRouter> = Arc::new(NoopRouter { core: Arc::clone(&core) });

        core.start(Arc::clone(&router)).await.unwrap();
        core.start(Arc::clone(&router)).await.unwrap();
        assert_eq!(registrar.handle_calls.load(Ordering::SeqCst), 1);
        assert_eq!(registrar.register_calls.load(Ordering::SeqCst), 1);

        core.stop().await.unwrap();
        core.stop().await.unwrap();
        assert_eq!(registrar.unregister_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn stop_without_start_is_a_noop() {
        let registrar = Arc::new(CountingRegistrar::new());
        let core = build_core(registrar);
        core.stop().await.unwrap();
    }

    #[tokio::test]
    async fn get_subscribers_requires_started_and_nonempty_topic() {
        let registrar = Arc::new(CountingRegistrar::new());
        let core = build_core(registrar);

        assert!(matches!(core.get_subscribers("t").await, Err(RouterError::NotStarted)));

        let router: Arc<dyn PubsubRouter> = Arc::new(NoopRouter { core: Arc::clone(&core) });
        core.start(router).await.unwrap();

        assert!(matches!(core.get_subscribers("").await, Err(RouterError::InvalidTopic)));
        assert_eq!(core.get_subscribers("unknown").await.unwrap(), Vec::<String>::new());
    }

    #[tokio::test]
    async fn add_peer_is_idempotent_by_base58_id() {
        let registrar = Arc::new(CountingRegistrar::new());
        let core = build_core(registrar);
        let peer = PeerId::generate_ed25519();

        let a = core.add_peer(peer.clone(), "/pubsub/1.0.0".into()).await;
        let b = core.add_peer(peer.clone(), "/pubsub/1.0.0".into()).await;
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(core.peer_ids().await.len(), 1);
    }

    #[tokio::test]
    async fn remove_peer_deletes_the_map_entry() {
        let registrar = Arc::new(CountingRegistrar::new());
        let core = build_core(registrar);
        let peer = PeerId::generate_ed25519();

        core.add_peer(peer.clone(), "/pubsub/1.0.0".into()).await;
        let removed = core.remove_peer(&peer).await;
        assert!(removed.is_some());
        assert_eq!(core.peer_ids().await.len(), 0);
        assert!(core.peer(&peer.to_base58()).await.is_none());
    }

    #[tokio::test]
    async fn on_peer_connected_negotiation_failure_is_logged_and_peer_has_no_outbound() {
        let registrar = Arc::new(CountingRegistrar::new());
        let core = build_core(registrar);
        let peer = PeerId::generate_ed25519();
        let connection: Arc<dyn Connection> = Arc::new(StubConnection { remote: peer.clone() });

        core.on_peer_connected(peer.clone(), connection).await;
        // no outbound was attached, so the peer is never added to the map
        assert!(core.peer(&peer.to_base58()).await.is_none());
    }

    #[tokio::test]
    async fn validate_respects_strict_signing() {
        let registrar = Arc::new(CountingRegistrar::new());
        let core = build_core(registrar);
        let msg = Message {
            from: core.peer_id().to_bytes(),
            data: b"hi".to_vec(),
            seqno: vec![1],
            topic_ids: vec!["t".into()],
            signature: None,
            key: None,
            received_from: None,
        };
        assert!(matches!(core.validate(&msg), Err(RouterError::MissingSignature)));

        let signed = core.build_message(msg).unwrap();
        assert!(core.validate(&signed).is_ok());
    }

    #[tokio::test]
    async fn default_hooks_fail_not_implemented() {
        let registrar = Arc::new(CountingRegistrar::new());
        let core = build_core(registrar);
        let router = NoopRouter { core };
        assert!(matches!(router.publish("t", vec![]).await, Err(RouterError::NotImplemented)));
        assert!(matches!(router.subscribe("t").await, Err(RouterError::NotImplemented)));
        assert!(matches!(router.unsubscribe("t").await, Err(RouterError::NotImplemented)));
        assert!(matches!(router.get_topics(), Err(RouterError::NotImplemented)));
    }
}
