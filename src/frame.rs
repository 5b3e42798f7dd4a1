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

//! Length-prefixed frame codec over a duplex byte stream.
//!
//! Every RPC exchanged between two peers' [`crate::peer_stream::PeerStream`]s
//! is wrapped in a varint-length-prefixed frame, the same shape libp2p
//! pubsub uses over its multistream-negotiated substreams. Framing is kept
//! separate from the RPC message codec (`crate::message`) so the frame
//! layer never has to understand message semantics.

use bytes::{BufMut, BytesMut};
use thiserror::Error;
use tokio_util::codec::{Decoder, Encoder};
use unsigned_varint::codec::UviBytes;

/// Default ceiling on a single frame's payload, matching the teacher's
/// conservative bound on untrusted wire input (see `networking/p2p.rs`'s
/// gossipsub transport limits).
pub const DEFAULT_MAX_FRAME_LEN: usize = 1024 * 1024;

/// Errors raised while framing or deframing a peer's byte stream.
#[derive(Debug, Error)]
pub enum FrameError {
    /// The varint length prefix could not be parsed, or the frame exceeded
    /// the codec's configured maximum length. Corresponds to spec's
    /// `ErrMalformedFrame`.
    #[error("malformed frame")]
    Malformed,

    /// Underlying I/O failure while reading or writing the stream.
    #[error("frame io: {0}")]
    Io(#[from] std::io::Error),
}

/// A varint-length-prefixed frame codec.
///
/// Wraps [`unsigned_varint::codec::UviBytes`], translating its error type
/// into [`FrameError`] and exposing a fixed maximum frame length so a
/// malicious peer cannot force unbounded buffering.
pub struct FrameCodec {
    inner: UviBytes<BytesMut>,
}

impl FrameCodec {
    /// Build a codec that rejects any frame longer than `max_len` bytes.
    pub fn new(max_len: usize) -> Self {
        let mut inner = UviBytes::default();
        inner.set_max_len(max_len);
        Self { inner }
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAME_LEN)
    }
}

impl Decoder for FrameCodec {
    type Item = BytesMut;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        self.inner.decode(src).map_err(|_| FrameError::Malformed)
    }
}

impl Encoder<BytesMut> for FrameCodec {
    type Error = FrameError;

    fn encode(&mut self, item: BytesMut, dst: &mut BytesMut) -> Result<(), Self::Error> {
        self.inner.encode(item, dst).map_err(|_| FrameError::Malformed)
    }
}

impl Encoder<Vec<u8>> for FrameCodec {
    type Error = FrameError;

    fn encode(&mut self, item: Vec<u8>, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let mut buf = BytesMut::with_capacity(item.len());
        buf.put_slice(&item);
        Encoder::<BytesMut>::encode(self, buf, dst)
    }
}
