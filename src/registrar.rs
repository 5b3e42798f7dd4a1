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

//! Host networking contracts the router binds to.
//!
//! The router never dials or listens itself; it is handed a [`Registrar`]
//! by the embedding node, the same "duck-typed capability set, now made
//! explicit" idiom `SPEC_FULL.md` calls for. Async trait methods follow
//! the teacher's `async_trait` usage pattern (see `core/security/keystore.rs`'s
//! `SignerBackend`).

use std::sync::Arc;

use async_trait::async_trait;

use crate::peer_id::PeerId;
use crate::peer_stream::{RawRead, RawWrite};

/// Opaque receipt returned by [`Registrar::register`], handed back
/// unchanged to [`Registrar::unregister`].
pub struct Receipt(pub u64);

/// A negotiated duplex byte stream, split into its two halves.
pub struct DuplexStream {
    /// Inbound half.
    pub read: RawRead,
    /// Outbound half.
    pub write: RawWrite,
    /// The multicodec the two sides settled on.
    pub protocol: String,
}

/// A live connection to a remote peer, as seen by the host.
#[async_trait]
pub trait Connection: Send + Sync {
    /// The identity of the remote end of this connection.
    fn remote_peer(&self) -> &PeerId;

    /// Negotiate and open a new outbound stream on this connection,
    /// offering `multicodecs` in order; the remote selects one.
    async fn new_stream(&self, multicodecs: &[String]) -> Result<DuplexStream, NegotiationError>;
}

/// Failure negotiating a new outbound stream.
#[derive(Debug, thiserror::Error)]
#[error("stream negotiation failed: {0}")]
pub struct NegotiationError(pub String);

/// An inbound stream delivered to the protocol handler registered via
/// [`Registrar::handle`].
pub struct IncomingStream {
    /// The negotiated multicodec.
    pub protocol: String,
    /// The raw inbound half.
    pub stream: RawRead,
    /// The connection this stream arrived on.
    pub connection: Arc<dyn Connection>,
}

/// Connection-topology notifications a router registers for.
#[async_trait]
pub trait Topology: Send + Sync {
    /// The multicodecs this topology cares about.
    fn multicodecs(&self) -> &[String];

    /// Fired once per session, regardless of which side dialled.
    async fn on_connect(&self, peer: PeerId, connection: Arc<dyn Connection>);

    /// Fired when a previously connected peer disconnects. `error`
    /// carries the host's disconnect reason, if any.
    async fn on_disconnect(&self, peer: PeerId, error: Option<String>);
}

/// The host node's registry for protocol handlers and connection-topology
/// notifications — the capability surface a [`crate::router::RouterCore`]
/// is built against.
#[async_trait]
pub trait Registrar: Send + Sync {
    /// Register `handler` for incoming streams on any of `multicodecs`.
    async fn handle(
        &self,
        multicodecs: Vec<String>,
        handler: Arc<dyn Fn(IncomingStream) + Send + Sync>,
    );

    /// Register a connection topology, returning an opaque receipt.
    async fn register(&self, topology: Arc<dyn Topology>) -> Receipt;

    /// Reverse a prior `register`, removing the handler.
    async fn unregister(&self, receipt: Receipt);
}
