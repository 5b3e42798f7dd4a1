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

//! Crate-wide error type.

use thiserror::Error;

use crate::frame::FrameError;
use crate::message::MessageError;
use crate::peer_stream::PeerStreamError;
use crate::registrar::NegotiationError;
use crate::signing::SigningError;

/// Errors surfaced by the router base.
///
/// Variant names map directly onto the spec's `ERR_*` wire/API codes;
/// module-local error types (frame/message/signing/peer_stream) are wrapped
/// rather than flattened, the way `core::security::keystore::KeystoreError`
/// stays independent of `networking::p2p::P2pError` in the teacher crate.
#[derive(Debug, Error)]
pub enum RouterError {
    /// `ERR_NOT_STARTED_YET`: an operation that requires `start()` was
    /// called before the router started.
    #[error("router not started")]
    NotStarted,

    /// `ERR_NOT_VALID_TOPIC`: `getSubscribers` was called with an empty
    /// topic.
    #[error("invalid topic")]
    InvalidTopic,

    /// `ERR_NOT_IMPLEMENTED`: an abstract subclass hook was not overridden.
    #[error("not implemented")]
    NotImplemented,

    /// `ERR_MISSING_SIGNATURE`: strict signing is on and the message
    /// carried no signature.
    #[error("missing signature")]
    MissingSignature,

    /// `ERR_INVALID_SIGNATURE`: a present signature failed verification.
    #[error("invalid signature")]
    InvalidSignature,

    /// `ERR_INVALID_CONFIG`: `RouterConfig` construction failed validation.
    #[error("invalid router config: {0}")]
    InvalidConfig(&'static str),

    /// A write was attempted on a `PeerStream` with no outbound queue.
    #[error("peer stream not writable")]
    NotWritable,

    /// Frame codec failure while reading/writing a peer's stream.
    #[error("frame codec: {0}")]
    Frame(#[from] FrameError),

    /// Message codec failure while decoding an RPC record.
    #[error("message codec: {0}")]
    Message(#[from] MessageError),

    /// Signing/verification failure.
    #[error("signing: {0}")]
    Signing(#[from] SigningError),

    /// `PeerStream`-level failure (see [`PeerStreamError`]).
    #[error("peer stream: {0}")]
    PeerStream(#[from] PeerStreamError),

    /// The host failed to negotiate a new outbound stream for a connection.
    #[error("stream negotiation failed: {0}")]
    Negotiation(String),

    /// Raw stream I/O error surfaced from the underlying duplex transport.
    #[error("stream io: {0}")]
    Io(#[from] std::io::Error),
}

impl From<NegotiationError> for RouterError {
    fn from(err: NegotiationError) -> Self {
        RouterError::Negotiation(err.0)
    }
}
