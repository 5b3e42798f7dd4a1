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

//! Message signing, verification, and public-key recovery.
//!
//! Signatures are computed over the message with `signature` and `key`
//! stripped, prefixed with a fixed domain-separation tag — the same scheme
//! `core/consensus/signing.rs` uses for votes (`vote_signing_bytes_v1`),
//! narrowed here to the constant prefix real libp2p pubsub uses on the
//! wire.

use libp2p_identity::PublicKey;
use thiserror::Error;

use crate::message::Message;
use crate::peer_id::{recover_inlined_public_key, PeerId};

/// Domain-separation prefix prepended to every signed message's bytes
/// before signing/verification, matching the real libp2p pubsub wire
/// protocol's `SIGNING_PREFIX`.
pub const SIGN_PREFIX: &[u8] = b"libp2p-pubsub:";

/// Errors raised while signing or verifying a message.
#[derive(Debug, Error)]
pub enum SigningError {
    /// The message carries an explicit `key` field whose derived peer id
    /// does not match `from`.
    #[error("message key does not match its claimed sender")]
    KeyMismatch,

    /// The message carries an explicit `key` field that is not a validly
    /// encoded public key at all.
    #[error("message key is not a valid public key")]
    MalformedKey,

    /// No public key could be recovered: `from` does not inline a public
    /// key and no explicit `key` field was present.
    #[error("no public key available to verify message")]
    NoKey,

    /// `from` is not a validly encoded peer id.
    #[error("malformed sender peer id")]
    MalformedFrom,

    /// The local identity has no private key and so cannot sign.
    #[error("signing identity has no private key")]
    NoPrivateKey,
}

fn signing_bytes(message: &Message) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(SIGN_PREFIX.len() + 64);
    bytes.extend_from_slice(SIGN_PREFIX);
    bytes.extend_from_slice(&message.encode_unsigned());
    bytes
}

/// Sign `message` as `peer_id`, returning a copy with `signature` and `key`
/// populated. `peer_id` must carry a private key.
pub fn sign(peer_id: &PeerId, message: &Message) -> Result<Message, SigningError> {
    let keypair = peer_id.keypair().ok_or(SigningError::NoPrivateKey)?;
    let mut signed = message.clone();
    signed.from = peer_id.to_bytes();
    signed.signature = None;
    signed.key = None;

    let bytes = signing_bytes(&signed);
    let signature = keypair.sign(&bytes).map_err(|_| SigningError::NoPrivateKey)?;

    signed.signature = Some(signature);
    signed.key = Some(peer_id.public_key().encode_protobuf());
    Ok(signed)
}

/// Recover the public key that authenticated `message`, following the
/// same rule real libp2p pubsub uses: prefer an explicit `key` field
/// (checked against `from` for consistency), and fall back to recovering
/// an inlined public key directly from `from` when no `key` field is
/// present.
pub fn message_public_key(message: &Message) -> Result<PublicKey, SigningError> {
    let from = libp2p_identity::PeerId::from_bytes(&message.from)
        .map_err(|_| SigningError::MalformedFrom)?;

    if let Some(key_bytes) = &message.key {
        let key = PublicKey::try_decode_protobuf(key_bytes).map_err(|_| SigningError::MalformedKey)?;
        if key.to_peer_id() != from {
            return Err(SigningError::KeyMismatch);
        }
        return Ok(key);
    }

    recover_inlined_public_key(&from).ok_or(SigningError::NoKey)
}

/// Verify `message`'s signature. Returns `Ok(true)` iff a signature is
/// present, a public key could be recovered, and the signature matches;
/// returns `Ok(false)` when a signature is present but does not verify.
/// The caller (see [`crate::router::RouterCore::validate`]) decides how to
/// treat an altogether absent signature under the strict-signing policy.
pub fn verify(message: &Message) -> Result<bool, SigningError> {
    let Some(signature) = &message.signature else {
        return Ok(false);
    };
    let public_key = message_public_key(message)?;

    let mut unsigned = message.clone();
    unsigned.signature = None;
    unsigned.key = None;
    let bytes = signing_bytes(&unsigned);

    Ok(public_key.verify(&bytes, signature))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_message(from: &PeerId, topic: &str) -> Message {
        Message {
            from: from.to_bytes(),
            data: b"hello".to_vec(),
            seqno: vec![0, 0, 0, 1],
            topic_ids: vec![topic.to_string()],
            signature: None,
            key: None,
            received_from: None,
        }
    }

    #[test]
    fn sign_and_verify_with_inlined_key_peer_id() {
        let peer = PeerId::generate_ed25519();
        let msg = base_message(&peer, "topic-a");
        let signed = sign(&peer, &msg).unwrap();
        assert!(verify(&signed).unwrap());
    }

    #[test]
    fn sign_and_verify_with_explicit_key_stripped_from_id() {
        let peer = PeerId::generate_secp256k1();
        let msg = base_message(&peer, "topic-a");
        let signed = sign(&peer, &msg).unwrap();
        assert!(signed.key.is_some());
        assert!(verify(&signed).unwrap());
    }

    #[test]
    fn tampered_payload_fails_verification() {
        let peer = PeerId::generate_ed25519();
        let msg = base_message(&peer, "topic-a");
        let mut signed = sign(&peer, &msg).unwrap();
        signed.data = b"tampered".to_vec();
        assert!(!verify(&signed).unwrap());
    }

    #[test]
    fn mismatched_key_is_rejected() {
        let peer = PeerId::generate_ed25519();
        let other = PeerId::generate_ed25519();
        let msg = base_message(&peer, "topic-a");
        let mut signed = sign(&peer, &msg).unwrap();
        signed.key = Some(other.public_key().encode_protobuf());
        assert!(matches!(verify(&signed), Err(SigningError::KeyMismatch)));
    }

    #[test]
    fn absent_signature_is_not_verified_but_not_an_error() {
        let peer = PeerId::generate_ed25519();
        let msg = base_message(&peer, "topic-a");
        assert_eq!(verify(&msg).unwrap(), false);
    }

    #[test]
    fn malformed_key_is_distinct_from_mismatched_key() {
        let peer = PeerId::generate_ed25519();
        let msg = base_message(&peer, "topic-a");
        let mut signed = sign(&peer, &msg).unwrap();
        signed.key = Some(vec![0xff, 0x00, 0x01]);
        assert!(matches!(verify(&signed), Err(SigningError::MalformedKey)));
    }
}
