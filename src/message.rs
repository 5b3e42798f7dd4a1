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

//! Canonical binary encoding of the RPC message record.
//!
//! Encoding is a minimal tag-length scheme over the real libp2p pubsub
//! `RPC.Message` field layout (`from=1, data=2, seqno=3, topicIDs=4,
//! signature=5, key=6`, see `SPEC_FULL.md` §G) rather than a full protobuf
//! implementation: every field is a length-delimited byte string, decoded
//! by tag, with `topicIDs` tagged repeatedly, and any unrecognized tag
//! skipped — the same "ignore unknown trailing fields" tolerance the real
//! wire format has.

use bytes::{BufMut, BytesMut};
use thiserror::Error;
use unsigned_varint::encode as varint_encode;

const TAG_FROM: u64 = 1;
const TAG_DATA: u64 = 2;
const TAG_SEQNO: u64 = 3;
const TAG_TOPIC_ID: u64 = 4;
const TAG_SIGNATURE: u64 = 5;
const TAG_KEY: u64 = 6;

/// Errors raised decoding or encoding a [`Message`].
#[derive(Debug, Error)]
pub enum MessageError {
    /// A length-delimited field's varint length prefix was truncated or
    /// invalid.
    #[error("truncated field length")]
    TruncatedLength,

    /// A field's declared length ran past the end of the buffer.
    #[error("truncated field value")]
    TruncatedValue,

    /// The tag varint itself was truncated.
    #[error("truncated tag")]
    TruncatedTag,
}

/// The canonical RPC message record exchanged between peers.
///
/// Mirrors libp2p pubsub's `RPC.Message`: an originating peer id, an
/// opaque payload, a per-publisher sequence number, the topics the message
/// is published to, and an optional signature/key pair establishing
/// authenticity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Raw bytes of the publishing peer's [`crate::peer_id::PeerId`].
    pub from: Vec<u8>,
    /// Opaque application payload.
    pub data: Vec<u8>,
    /// Per-publisher sequence number, unique for a given `from`.
    pub seqno: Vec<u8>,
    /// Topics this message is published to.
    pub topic_ids: Vec<String>,
    /// Signature over the message with `key`/`signature` stripped, per
    /// [`crate::signing`]. Absent for unsigned messages.
    pub signature: Option<Vec<u8>>,
    /// Protobuf-encoded public key, present when the originating peer id
    /// does not inline its own public key. Absent otherwise.
    pub key: Option<Vec<u8>>,

    /// The peer this message was received from on the wire, distinct from
    /// `from` (the original publisher). Local-only bookkeeping, never
    /// encoded on the wire.
    pub received_from: Option<String>,
}

impl Message {
    /// Encode this message, including `signature` and `key` when present.
    pub fn encode(&self) -> Vec<u8> {
        self.encode_with(true)
    }

    /// Encode this message with `signature` and `key` stripped — the bytes
    /// a signature is actually computed and verified over (spec §4.3).
    pub fn encode_unsigned(&self) -> Vec<u8> {
        self.encode_with(false)
    }

    fn encode_with(&self, include_signature: bool) -> Vec<u8> {
        let mut out = BytesMut::new();
        put_field(&mut out, TAG_FROM, &self.from);
        put_field(&mut out, TAG_DATA, &self.data);
        put_field(&mut out, TAG_SEQNO, &self.seqno);
        for topic in &self.topic_ids {
            put_field(&mut out, TAG_TOPIC_ID, topic.as_bytes());
        }
        if include_signature {
            if let Some(sig) = &self.signature {
                put_field(&mut out, TAG_SIGNATURE, sig);
            }
            if let Some(key) = &self.key {
                put_field(&mut out, TAG_KEY, key);
            }
        }
        out.to_vec()
    }

    /// Decode a message from its canonical encoding, ignoring any tag not
    /// in the known field set.
    pub fn decode(mut buf: &[u8]) -> Result<Self, MessageError> {
        let mut from = Vec::new();
        let mut data = Vec::new();
        let mut seqno = Vec::new();
        let mut topic_ids = Vec::new();
        let mut signature = None;
        let mut key = None;

        while !buf.is_empty() {
            let (tag, rest) = read_varint(buf)?;
            buf = rest;
            let (len, rest) = read_varint(buf)?;
            buf = rest;
            let len = len as usize;
            if buf.len() < len {
                return Err(MessageError::TruncatedValue);
            }
            let (value, rest) = buf.split_at(len);
            buf = rest;

            match tag {
                TAG_FROM => from = value.to_vec(),
                TAG_DATA => data = value.to_vec(),
                TAG_SEQNO => seqno = value.to_vec(),
                TAG_TOPIC_ID => topic_ids.push(String::from_utf8_lossy(value).into_owned()),
                TAG_SIGNATURE => signature = Some(value.to_vec()),
                TAG_KEY => key = Some(value.to_vec()),
                _ => {}
            }
        }

        Ok(Message { from, data, seqno, topic_ids, signature, key, received_from: None })
    }
}

fn put_field(out: &mut BytesMut, tag: u64, value: &[u8]) {
    let mut tag_buf = varint_encode::u64_buffer();
    out.put_slice(varint_encode::u64(tag, &mut tag_buf));
    let mut len_buf = varint_encode::u64_buffer();
    out.put_slice(varint_encode::u64(value.len() as u64, &mut len_buf));
    out.put_slice(value);
}

fn read_varint(buf: &[u8]) -> Result<(u64, &[u8]), MessageError> {
    let mut value: u64 = 0;
    for (i, &byte) in buf.iter().enumerate() {
        let has_more = byte & 0x80 != 0;
        value |= u64::from(byte & 0x7f) << (7 * i);
        if !has_more {
            return Ok((value, &buf[i + 1..]));
        }
        if i == 9 {
            return Err(MessageError::TruncatedTag);
        }
    }
    Err(MessageError::TruncatedLength)
}
