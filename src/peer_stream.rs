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

//! Per-peer inbound/outbound stream state machine.
//!
//! A [`PeerStream`] owns exactly one connected peer's raw duplex stream
//! halves and wraps them through the frame codec. Following the teacher's
//! `networking/p2p.rs` style of driving I/O from a background task
//! communicating over `tokio::sync::mpsc`, the outbound side is a push
//! queue drained by a spawned task; the inbound side is a cancellable
//! `Stream` the subclass consumes directly.

use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use std::future::Future;

use bytes::BytesMut;
use futures::{SinkExt, Stream};
#[cfg(test)]
use futures::StreamExt;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{broadcast, Mutex};
use tokio_util::codec::{FramedRead, FramedWrite};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::frame::{FrameCodec, DEFAULT_MAX_FRAME_LEN};
use crate::peer_id::PeerId;

/// A boxed, `Unpin` half of a host-provided duplex byte stream.
pub type RawRead = Pin<Box<dyn AsyncRead + Send>>;
/// A boxed, `Unpin` half of a host-provided duplex byte stream.
pub type RawWrite = Pin<Box<dyn AsyncWrite + Send>>;

/// Errors raised by [`PeerStream`] operations.
#[derive(Debug, Error)]
pub enum PeerStreamError {
    /// `write()` was called with no outbound queue attached.
    #[error("peer stream has no outbound queue")]
    NotWritable,
}

/// Events a [`PeerStream`] fires. Fire-and-forget: subscribers must not
/// assume ordering relative to the operation that triggered them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerStreamEvent {
    /// The first successful `attachInbound` since construction or the last
    /// full close.
    StreamInbound,
    /// The first successful `attachOutbound` since construction or the
    /// last full close.
    StreamOutbound,
    /// Fired exactly once when the stream transitions to closed, either
    /// via an explicit `close()` or because the outbound queue terminated
    /// non-quietly.
    Close,
}

/// A cancellable, length-prefix-decoded inbound frame sequence.
///
/// Polling after cancellation returns `Poll::Ready(None)` — a clean
/// termination, never an error, matching the spec's "cancelling an
/// inbound iterator causes a clean return rather than an exception."
pub struct InboundFrames {
    inner: FramedRead<RawRead, FrameCodec>,
    cancel: CancellationToken,
}

impl Stream for InboundFrames {
    type Item = Result<BytesMut, crate::frame::FrameError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.cancel.is_cancelled() {
            return Poll::Ready(None);
        }
        match Pin::new(&mut this.inner).poll_next(cx) {
            Poll::Ready(item) => Poll::Ready(item),
            Poll::Pending => {
                let cancelled = std::pin::pin!(this.cancel.cancelled());
                match cancelled.poll(cx) {
                    Poll::Ready(()) => Poll::Ready(None),
                    Poll::Pending => Poll::Pending,
                }
            }
        }
    }
}

struct OutboundHandle {
    tx: tokio::sync::mpsc::UnboundedSender<Vec<u8>>,
    quiet_on_end: Arc<AtomicBool>,
}

struct Inner {
    readable: bool,
    writable: bool,
    inbound_cancel: Option<CancellationToken>,
    outbound: Option<OutboundHandle>,
    outbound_join: Option<tokio::task::JoinHandle<()>>,
    emitted_inbound: bool,
    emitted_outbound: bool,
}

/// Per-peer bidirectional stream state.
///
/// Owns at most one active inbound iterator and one active outbound queue
/// at a time; `attachInbound`/`attachOutbound` are the only legal mutators
/// of each direction and are not re-entrant on the same direction.
pub struct PeerStream {
    id: PeerId,
    protocol: String,
    inner: Mutex<Inner>,
    closed: AtomicBool,
    events: broadcast::Sender<PeerStreamEvent>,
    max_frame_len: usize,
}

impl PeerStream {
    /// Construct with no attached streams; `readable = false`,
    /// `writable = false`.
    pub fn new(id: PeerId, protocol: String) -> Arc<Self> {
        let (events, _) = broadcast::channel(32);
        Arc::new(Self {
            id,
            protocol,
            inner: Mutex::new(Inner {
                readable: false,
                writable: false,
                inbound_cancel: None,
                outbound: None,
                outbound_join: None,
                emitted_inbound: false,
                emitted_outbound: false,
            }),
            closed: AtomicBool::new(false),
            events,
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
        })
    }

    /// This peer's identity.
    pub fn id(&self) -> &PeerId {
        &self.id
    }

    /// The negotiated multicodec for this stream.
    pub fn protocol(&self) -> &str {
        &self.protocol
    }

    /// Subscribe to this stream's event surface.
    pub fn subscribe(&self) -> broadcast::Receiver<PeerStreamEvent> {
        self.events.subscribe()
    }

    /// Whether an inbound iterator is currently attached.
    pub async fn is_readable(&self) -> bool {
        self.inner.lock().await.readable
    }

    /// Whether an outbound queue is currently attached.
    pub async fn is_writable(&self) -> bool {
        self.inner.lock().await.writable
    }

    /// Whether this stream has fully closed.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Attach a new inbound raw stream, returning the cancellable frame
    /// sequence the subclass should consume.
    ///
    /// If an inbound stream already exists, its iterator is cancelled
    /// (returning cleanly rather than raising) before the new one is
    /// installed. `stream:inbound` fires only on the first successful
    /// attach since construction or the last full close.
    pub async fn attach_inbound(&self, raw: RawRead) -> InboundFrames {
        let mut inner = self.inner.lock().await;
        if let Some(previous) = inner.inbound_cancel.take() {
            previous.cancel();
        }
        let cancel = CancellationToken::new();
        inner.inbound_cancel = Some(cancel.clone());
        inner.readable = true;

        if !inner.emitted_inbound {
            inner.emitted_inbound = true;
            let _ = self.events.send(PeerStreamEvent::StreamInbound);
        }

        InboundFrames {
            inner: FramedRead::new(raw, FrameCodec::new(self.max_frame_len)),
            cancel,
        }
    }

    /// Attach a new outbound raw stream.
    ///
    /// If an outbound queue already exists, it is ended quietly (no
    /// `close` event): its sender is dropped and the driving task's
    /// completion — which drains any already-queued bytes to the old raw
    /// stream — is awaited before the new queue is installed, so the two
    /// outbound tasks are never alive at once. `stream:outbound` fires
    /// only on the first successful attach since construction or the last
    /// full close.
    pub async fn attach_outbound(self: &Arc<Self>, raw: RawWrite) {
        let (previous, previous_join) = {
            let mut inner = self.inner.lock().await;
            (inner.outbound.take(), inner.outbound_join.take())
        };
        if let Some(previous) = previous {
            previous.quiet_on_end.store(true, Ordering::SeqCst);
            drop(previous.tx);
        }
        if let Some(previous_join) = previous_join {
            let _ = previous_join.await;
        }

        let (tx, rx) = tokio::sync::mpsc::unbounded_channel::<Vec<u8>>();
        let quiet_on_end = Arc::new(AtomicBool::new(false));

        let stream = Arc::clone(self);
        let task_quiet_on_end = quiet_on_end.clone();
        let join = tokio::spawn(async move {
            stream.drive_outbound(raw, rx, task_quiet_on_end).await;
        });

        {
            let mut inner = self.inner.lock().await;
            inner.outbound = Some(OutboundHandle { tx, quiet_on_end });
            inner.outbound_join = Some(join);
            inner.writable = true;
            if !inner.emitted_outbound {
                inner.emitted_outbound = true;
                let _ = self.events.send(PeerStreamEvent::StreamOutbound);
            }
        }
    }

    async fn drive_outbound(
        self: Arc<Self>,
        raw: RawWrite,
        mut rx: tokio::sync::mpsc::UnboundedReceiver<Vec<u8>>,
        quiet_on_end: Arc<AtomicBool>,
    ) {
        let mut sink = FramedWrite::new(raw, FrameCodec::new(self.max_frame_len));
        let mut had_error = false;

        while let Some(bytes) = rx.recv().await {
            if let Err(err) = sink.send(BytesMut::from(&bytes[..])).await {
                warn!(peer = %self.id, "peer stream outbound write failed: {err}");
                had_error = true;
                break;
            }
        }

        let quiet = quiet_on_end.load(Ordering::SeqCst) && !had_error;

        {
            let mut inner = self.inner.lock().await;
            inner.writable = false;
            inner.outbound = None;
            inner.outbound_join = None;
            if had_error || !quiet {
                inner.emitted_outbound = false;
            }
        }

        if had_error || !quiet {
            self.finish_close().await;
        }
    }

    /// Enqueue `bytes` on the outbound queue; fails with
    /// [`PeerStreamError::NotWritable`] when no outbound queue exists.
    pub async fn write(&self, bytes: Vec<u8>) -> Result<(), PeerStreamError> {
        let inner = self.inner.lock().await;
        let outbound = inner.outbound.as_ref().ok_or(PeerStreamError::NotWritable)?;
        outbound.tx.send(bytes).map_err(|_| PeerStreamError::NotWritable)
    }

    /// End the outbound queue (loud), cancel the inbound iterator, reset
    /// all stream fields, and emit `close` exactly once. Further calls
    /// after the first are no-ops.
    pub async fn close(self: &Arc<Self>) {
        {
            let mut inner = self.inner.lock().await;
            if let Some(previous) = inner.inbound_cancel.take() {
                previous.cancel();
            }
            inner.readable = false;
            if let Some(outbound) = inner.outbound.take() {
                outbound.quiet_on_end.store(false, Ordering::SeqCst);
                drop(outbound.tx);
            }
            inner.writable = false;
        }
        self.finish_close().await;
    }

    async fn finish_close(&self) {
        if self.closed.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst).is_ok() {
            debug!(peer = %self.id, "peer stream closed");
            let _ = self.events.send(PeerStreamEvent::Close);
        }
    }
}
