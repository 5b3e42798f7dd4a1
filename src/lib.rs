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

//! Pubsub router base: the reusable substrate a concrete publish/subscribe
//! routing policy (flood-style broadcast, mesh-style gossip, ...) is built
//! on top of.
//!
//! This crate owns three things:
//! - the per-peer bidirectional message stream (inbound read side, outbound
//!   write queue), framed with length-prefixed encoding;
//! - the router lifecycle and peer registry, wired to a host networking
//!   node through a small registrar contract;
//! - message signing, verification, and the strict-signing policy switch.
//!
//! It does not implement a routing algorithm: `publish`, `subscribe`,
//! `unsubscribe`, `get_topics`, and `process_messages` are left abstract on
//! [`router::PubsubRouter`] for a concrete policy to provide.

/// Router construction and validation.
pub mod config;
/// Crate-wide error type and the spec's `ERR_*` codes.
pub mod error;
/// Length-prefixed frame codec over a duplex byte stream.
pub mod frame;
/// Router-level Prometheus metrics.
pub mod metrics;
/// Canonical binary encoding of the RPC message record.
pub mod message;
/// Opaque peer identity with a base58 textual form and key material.
pub mod peer_id;
/// Per-peer inbound/outbound stream state machine.
pub mod peer_stream;
/// Host networking contracts the router binds to (registrar, connection).
pub mod registrar;
/// Router lifecycle, peer registry, and the subclass hook surface.
pub mod router;
/// Message signing/verification with domain-separated prefixes.
pub mod signing;

pub use config::RouterConfig;
pub use error::RouterError;
pub use message::Message;
pub use peer_id::PeerId;
pub use peer_stream::PeerStream;
pub use router::{PubsubRouter, RouterCore};
