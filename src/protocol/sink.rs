//! Event sinks: where the driver pushes events, decoupled from the transport.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::types::RequestContext;

use super::encoder::encode_frame;
use super::events::{EventMetadata, EventPayload, EventStatus, StreamEvent};

/// The receiving side went away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("event sink closed")]
pub struct SinkClosed;

/// Destination for stream events.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn send(&self, event: StreamEvent) -> Result<(), SinkClosed>;

    /// Close the channel after the terminal frame.
    async fn close(&self) {}
}

/// Sink backed by a bounded tokio channel.
pub struct ChannelSink {
    tx: Mutex<Option<mpsc::Sender<StreamEvent>>>,
}

impl ChannelSink {
    /// Create a sink and the receiver a transport reads from.
    pub fn channel(buffer: usize) -> (Self, mpsc::Receiver<StreamEvent>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (
            Self {
                tx: Mutex::new(Some(tx)),
            },
            rx,
        )
    }

    fn sender(&self) -> Option<mpsc::Sender<StreamEvent>> {
        self.tx.lock().ok().and_then(|guard| guard.clone())
    }
}

#[async_trait]
impl EventSink for ChannelSink {
    async fn send(&self, event: StreamEvent) -> Result<(), SinkClosed> {
        let Some(tx) = self.sender() else {
            return Err(SinkClosed);
        };
        tx.send(event).await.map_err(|_| SinkClosed)
    }

    async fn close(&self) {
        if let Ok(mut guard) = self.tx.lock() {
            guard.take();
        }
    }
}

/// Turn a receiver of events into a stream of encoded frames.
pub fn frames(rx: mpsc::Receiver<StreamEvent>) -> BoxStream<'static, String> {
    ReceiverStream::new(rx)
        .filter_map(|event| async move {
            match encode_frame(&event) {
                Ok(frame) => Some(frame),
                Err(err) => {
                    tracing::warn!(error = %err, event_type = %event.event_type(), "dropping unencodable event");
                    None
                }
            }
        })
        .boxed()
}

/// Stamps metadata onto payloads and forwards them to a sink.
///
/// Once a send fails the emitter stays closed; later emits fail fast.
#[derive(Clone)]
pub struct EventEmitter {
    sink: Arc<dyn EventSink>,
    context: RequestContext,
    closed: Arc<std::sync::atomic::AtomicBool>,
}

impl EventEmitter {
    pub fn new(sink: Arc<dyn EventSink>, context: RequestContext) -> Self {
        Self {
            sink,
            context,
            closed: Arc::new(std::sync::atomic::AtomicBool::new(false)),
        }
    }

    pub async fn emit(&self, payload: EventPayload) -> Result<(), SinkClosed> {
        let status = payload.default_status();
        self.emit_with(payload, status, None).await
    }

    pub async fn emit_from(&self, payload: EventPayload, source: &str) -> Result<(), SinkClosed> {
        let status = payload.default_status();
        self.emit_with(payload, status, Some(source)).await
    }

    pub async fn emit_with(
        &self,
        payload: EventPayload,
        status: EventStatus,
        source: Option<&str>,
    ) -> Result<(), SinkClosed> {
        if self.is_closed() {
            return Err(SinkClosed);
        }
        let mut metadata = EventMetadata::new(status).with_context(&self.context);
        if let Some(source) = source {
            metadata = metadata.with_source(source);
        }
        let result = self.sink.send(StreamEvent::new(payload, metadata)).await;
        if result.is_err() {
            self.closed.store(true, std::sync::atomic::Ordering::SeqCst);
        }
        result
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(std::sync::atomic::Ordering::SeqCst)
    }

    /// Emit `end_of_stream` (best effort) and close the sink.
    pub async fn finish(&self) {
        if !self.is_closed() {
            let _ = self.emit(EventPayload::EndOfStream).await;
        }
        self.sink.close().await;
        self.closed.store(true, std::sync::atomic::Ordering::SeqCst);
    }
}
