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

//! Opaque peer identity: a base58 textual form over a libp2p identity key.

use std::fmt;
use std::sync::Arc;

use libp2p_identity::{Keypair, PublicKey};

/// Cryptographically derived identifier of a peer.
///
/// Carries a public key always, and a private [`Keypair`] when this
/// `PeerId` is the local peer's own identity. Equality and ordering are by
/// the underlying id bytes; the base58 form ([`PeerId::to_base58`]) is the
/// canonical key used in every peer-indexed map in this crate.
#[derive(Clone)]
pub struct PeerId {
    inner: libp2p_identity::PeerId,
    public: PublicKey,
    keypair: Option<Arc<Keypair>>,
}

impl PeerId {
    /// Generate a fresh local identity using an Ed25519 key.
    pub fn generate_ed25519() -> Self {
        Self::from_keypair(Keypair::generate_ed25519())
    }

    /// Generate a fresh local identity using a secp256k1 key.
    pub fn generate_secp256k1() -> Self {
        Self::from_keypair(Keypair::generate_secp256k1())
    }

    /// Build a local identity (carries the private key) from a keypair.
    pub fn from_keypair(keypair: Keypair) -> Self {
        let public = keypair.public();
        let inner = public.to_peer_id();
        Self { inner, public, keypair: Some(Arc::new(keypair)) }
    }

    /// Build a remote identity (no private key) from a public key.
    pub fn from_public_key(public: PublicKey) -> Self {
        let inner = public.to_peer_id();
        Self { inner, public, keypair: None }
    }

    /// Parse a remote identity directly from raw id bytes (e.g. the `from`
    /// field of an inbound message). Succeeds only when the id carries an
    /// inlined public key short enough to recover without an explicit
    /// `key` field — mirrors `messagePublicKey` rule 2 in the signing
    /// protocol.
    pub fn try_from_inlined_bytes(bytes: &[u8]) -> Option<Self> {
        let inner = libp2p_identity::PeerId::from_bytes(bytes).ok()?;
        let public = recover_inlined_public_key(&inner)?;
        Some(Self { inner, public, keypair: None })
    }

    /// Raw identity bytes (protobuf-encoded multihash of the public key, or
    /// an inlined public-key digest for short key types).
    pub fn to_bytes(&self) -> Vec<u8> {
        self.inner.to_bytes()
    }

    /// Canonical base58 textual form. The key used in every peer-indexed
    /// mapping in this crate.
    pub fn to_base58(&self) -> String {
        self.inner.to_base58()
    }

    /// The peer's public key.
    pub fn public_key(&self) -> &PublicKey {
        &self.public
    }

    /// The peer's private keypair, present only for the local identity.
    pub fn keypair(&self) -> Option<&Keypair> {
        self.keypair.as_deref()
    }

    /// True when this `PeerId` carries private key material (i.e. it is
    /// the local peer's own identity, not a remote peer's).
    pub fn has_private_key(&self) -> bool {
        self.keypair.is_some()
    }
}

/// Recover a public key inlined into a short-form peer id's multihash
/// digest. Mirrors the real libp2p pubsub wire behaviour: the peer id's
/// bytes are a multihash (1-byte code, 1-byte length, digest); when the
/// digest is itself a protobuf-encoded public key (small key types such
/// as Ed25519/secp256k1), it decodes directly off the tail.
pub(crate) fn recover_inlined_public_key(id: &libp2p_identity::PeerId) -> Option<PublicKey> {
    let bytes = id.to_bytes();
    PublicKey::try_decode_protobuf(bytes.get(2..)?).ok()
}

impl PartialEq for PeerId {
    fn eq(&self, other: &Self) -> bool {
        self.inner == other.inner
    }
}

impl Eq for PeerId {}

impl std::hash::Hash for PeerId {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.inner.hash(state);
    }
}

impl fmt::Debug for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PeerId").field(&self.to_base58()).finish()
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_base58())
    }
}
