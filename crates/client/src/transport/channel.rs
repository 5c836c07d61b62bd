//! An in-process Flight transport.
//!
//! [`channel`] returns a [`ChannelFlightClient`] and the [`ChannelServer`]
//! that receives its exchanges.  The server side sees the headers,
//! descriptor and metadata written by the client and decides which frames
//! to send back.

use super::{
    CallOptions, FlightClient, FlightDescriptor, FlightExchange, FlightStreamChunk,
    FlightStreamReader, FlightStreamWriter,
};
use crate::tokio::TOKIO;
use anyhow::{anyhow, Error as AnyError, Result as AnyResult};
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use std::time::Duration;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::time::timeout;
use tokio_stream::wrappers::UnboundedReceiverStream;

pub fn channel() -> (ChannelFlightClient, ChannelServer) {
    let (sender, receiver) = unbounded_channel();
    (
        ChannelFlightClient { exchanges: sender },
        ChannelServer {
            exchanges: receiver,
        },
    )
}

pub struct ChannelFlightClient {
    exchanges: UnboundedSender<ServerExchange>,
}

#[async_trait]
impl FlightClient for ChannelFlightClient {
    async fn do_exchange(
        &self,
        options: &CallOptions,
        descriptor: FlightDescriptor,
    ) -> AnyResult<FlightExchange> {
        let (metadata_sender, metadata_receiver) = unbounded_channel();
        let (chunk_sender, chunk_receiver) = unbounded_channel();
        self.exchanges
            .send(ServerExchange {
                headers: options.headers.clone(),
                descriptor,
                metadata: metadata_receiver,
                chunks: chunk_sender,
            })
            .map_err(|_| anyhow!("server is not accepting exchanges"))?;
        Ok(FlightExchange {
            writer: Box::new(ChannelWriter {
                metadata: metadata_sender,
            }),
            reader: FlightStreamReader::new(UnboundedReceiverStream::new(chunk_receiver).boxed()),
        })
    }
}

struct ChannelWriter {
    metadata: UnboundedSender<Bytes>,
}

#[async_trait]
impl FlightStreamWriter for ChannelWriter {
    async fn write_metadata(&mut self, metadata: Bytes) -> AnyResult<()> {
        self.metadata
            .send(metadata)
            .map_err(|_| anyhow!("exchange closed by the server"))
    }
}

/// Receives the exchanges opened by the paired [`ChannelFlightClient`].
///
/// Dropping the server makes further `do_exchange` calls fail.
pub struct ChannelServer {
    exchanges: UnboundedReceiver<ServerExchange>,
}

impl ChannelServer {
    /// Waits up to `wait` for the next exchange.
    pub fn accept(&mut self, wait: Duration) -> Option<ServerExchange> {
        TOKIO
            .block_on(async { timeout(wait, self.exchanges.recv()).await })
            .ok()?
    }

    pub async fn accept_async(&mut self) -> Option<ServerExchange> {
        self.exchanges.recv().await
    }
}

/// The server end of one exchange.
///
/// Dropping it ends the client's stream.
pub struct ServerExchange {
    pub headers: Vec<(String, String)>,
    pub descriptor: FlightDescriptor,
    metadata: UnboundedReceiver<Bytes>,
    chunks: UnboundedSender<AnyResult<FlightStreamChunk>>,
}

impl ServerExchange {
    /// Value of the first header called `name`.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(header, _)| header.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Waits up to `wait` for the next metadata message from the client.
    pub fn recv_metadata(&mut self, wait: Duration) -> Option<Bytes> {
        TOKIO
            .block_on(async { timeout(wait, self.metadata.recv()).await })
            .ok()?
    }

    /// Sends a frame.  Returns `false` if the client is gone.
    pub fn send(&self, chunk: FlightStreamChunk) -> bool {
        self.chunks.send(Ok(chunk)).is_ok()
    }

    /// Fails the client's stream with `error`.
    pub fn send_error(&self, error: AnyError) -> bool {
        self.chunks.send(Err(error)).is_ok()
    }

    /// Whether the client has stopped reading.
    pub fn is_closed(&self) -> bool {
        self.chunks.is_closed()
    }

    /// Waits until the client stops reading.
    pub async fn closed(&self) {
        self.chunks.closed().await
    }
}

#[cfg(test)]
mod test {
    use super::channel;
    use crate::transport::{CallOptions, FlightClient, FlightDescriptor};
    use crate::tokio::TOKIO;
    use std::time::Duration;

    #[test]
    fn accept_and_recv_time_out_from_a_plain_thread() {
        let (flight, mut server) = channel();
        assert!(server.accept(Duration::from_millis(20)).is_none());

        let _exchange = TOKIO
            .block_on(flight.do_exchange(
                &CallOptions::default(),
                FlightDescriptor::new_cmd(&b"cmd"[..]),
            ))
            .unwrap();
        let mut peer = server.accept(Duration::from_secs(10)).unwrap();
        assert!(peer.recv_metadata(Duration::from_millis(20)).is_none());
        assert!(!peer.is_closed());
    }
}
