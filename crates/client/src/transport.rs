//! The Arrow Flight surface the client needs.
//!
//! A subscription opens one bidirectional exchange: the client writes a
//! single metadata message (the subscription request) and then reads
//! frames until the subscription ends.  [`FlightClient`] abstracts the
//! connection that opens exchanges, so that the subscription machinery does
//! not depend on a particular gRPC stack.  [`channel`] provides an
//! in-process implementation.

use anyhow::{anyhow, Result as AnyResult};
use arrow::array::RecordBatch;
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use futures::StreamExt;
use tokio_util::sync::CancellationToken;

pub mod channel;

/// Per-call options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallOptions {
    /// `(name, value)` headers sent with the call.
    pub headers: Vec<(String, String)>,
}

/// Identifies the exchange to open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlightDescriptor {
    pub cmd: Bytes,
}

impl FlightDescriptor {
    pub fn new_cmd(cmd: impl Into<Bytes>) -> Self {
        Self { cmd: cmd.into() }
    }
}

/// One frame received from the server.
#[derive(Debug, Clone)]
pub struct FlightStreamChunk {
    pub data: RecordBatch,
    pub app_metadata: Option<Bytes>,
}

/// A connection that can open Flight exchanges.
#[async_trait]
pub trait FlightClient: Send + Sync {
    async fn do_exchange(
        &self,
        options: &CallOptions,
        descriptor: FlightDescriptor,
    ) -> AnyResult<FlightExchange>;
}

/// The client-to-server half of an exchange.
///
/// Dropping the writer half-closes the exchange; the subscription keeps it
/// alive for as long as it reads.
#[async_trait]
pub trait FlightStreamWriter: Send {
    /// Sends a message that consists of application metadata only.
    async fn write_metadata(&mut self, metadata: Bytes) -> AnyResult<()>;
}

pub struct FlightExchange {
    pub writer: Box<dyn FlightStreamWriter>,
    pub reader: FlightStreamReader,
}

/// The server-to-client half of an exchange.
pub struct FlightStreamReader {
    stream: BoxStream<'static, AnyResult<FlightStreamChunk>>,
    token: CancellationToken,
}

impl FlightStreamReader {
    pub fn new(stream: BoxStream<'static, AnyResult<FlightStreamChunk>>) -> Self {
        Self {
            stream,
            token: CancellationToken::new(),
        }
    }

    /// A token that, when cancelled, makes a pending or future
    /// [`next`](Self::next) fail.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Waits for the next frame.  Returns `None` at the end of the stream.
    pub async fn next(&mut self) -> AnyResult<Option<FlightStreamChunk>> {
        if self.token.is_cancelled() {
            return Err(anyhow!("stream was cancelled"));
        }
        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(anyhow!("stream was cancelled")),
            chunk = self.stream.next() => chunk.transpose(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::channel::channel;
    use super::{CallOptions, FlightClient, FlightDescriptor};
    use crate::test::{add_rows, ticker_frame, TIMEOUT};
    use crate::tokio::TOKIO;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn frames_then_end_of_stream() {
        let (flight, mut server) = channel();
        let mut exchange = TOKIO
            .block_on(flight.do_exchange(
                &CallOptions::default(),
                FlightDescriptor::new_cmd(&b"cmd"[..]),
            ))
            .unwrap();
        let peer = server.accept(TIMEOUT).unwrap();
        assert_eq!(&peer.descriptor.cmd[..], b"cmd");

        peer.send(ticker_frame(&["AAPL"], &[23.5], Some(&add_rows(0, [0]))));
        drop(peer);

        let chunk = TOKIO.block_on(exchange.reader.next()).unwrap().unwrap();
        assert_eq!(chunk.data.num_rows(), 1);
        assert!(chunk.app_metadata.is_some());
        assert!(TOKIO.block_on(exchange.reader.next()).unwrap().is_none());
    }

    #[test]
    fn cancellation_interrupts_pending_read() {
        let (flight, mut server) = channel();
        let mut exchange = TOKIO
            .block_on(flight.do_exchange(
                &CallOptions::default(),
                FlightDescriptor::new_cmd(&b"cmd"[..]),
            ))
            .unwrap();
        let _peer = server.accept(TIMEOUT).unwrap();

        let token = exchange.reader.cancellation_token();
        let canceller = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            token.cancel();
        });
        assert!(TOKIO.block_on(exchange.reader.next()).is_err());
        canceller.join().unwrap();
        assert!(TOKIO.block_on(exchange.reader.next()).is_err());
    }

    #[test]
    fn writer_reaches_server() {
        let (flight, mut server) = channel();
        let flight: Arc<dyn FlightClient> = Arc::new(flight);
        let mut exchange = TOKIO
            .block_on(flight.do_exchange(
                &CallOptions {
                    headers: vec![("x-test".to_string(), "1".to_string())],
                },
                FlightDescriptor::new_cmd(&b"cmd"[..]),
            ))
            .unwrap();
        TOKIO
            .block_on(exchange.writer.write_metadata(bytes::Bytes::from_static(b"hello")))
            .unwrap();

        let mut peer = server.accept(TIMEOUT).unwrap();
        assert_eq!(peer.header("X-Test"), Some("1"));
        assert_eq!(&peer.recv_metadata(TIMEOUT).unwrap()[..], b"hello");

        drop(server);
        assert!(TOKIO
            .block_on(flight.do_exchange(
                &CallOptions::default(),
                FlightDescriptor::new_cmd(&b"cmd"[..])
            ))
            .is_err());
    }
}
