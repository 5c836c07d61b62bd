//! Subscription threads.
//!
//! Each subscription owns one OS thread that blocks on the next frame of its
//! exchange, feeds the frame to a [`BarrageProcessor`] and delivers the
//! resulting updates to the subscriber's [`TickingCallback`].  Setup happens
//! on the flight [`Executor`]; the caller of [`SubscriptionThread::start`]
//! waits for it to finish.

use crate::callback::TickingCallback;
use crate::error::{SubscribeError, SubscriptionError};
use crate::executor::{panic_message, Executor};
use crate::server::Server;
use crate::tokio::TOKIO;
use crate::transport::{FlightDescriptor, FlightExchange, FlightStreamReader, FlightStreamWriter};
use anyhow::Error as AnyError;
use barrage_core::callbacks::SfCallback;
use barrage_core::ticking::metadata::exchange_command;
use barrage_core::ticking::{BarrageProcessor, ProtocolError, SubscriptionRequest};
use barrage_core::{ColumnSource, Schema};
use barrage_types::{SubscriptionOptions, Ticket};
use std::convert::Infallible;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle, ThreadId};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, trace, warn, Instrument};


static NEXT_SUBSCRIPTION_ID: AtomicU64 = AtomicU64::new(0);

/// Starts subscriptions.
pub struct SubscriptionThread;

impl SubscriptionThread {
    /// Subscribes to the table identified by `ticket`.
    ///
    /// Opens the exchange, sends the subscription request and starts the
    /// subscription thread, all as a task on `executor`, and waits for that
    /// task to finish.  On error no thread is started and `callback` is never
    /// called.
    pub fn start(
        server: Arc<Server>,
        executor: &Executor,
        schema: Arc<Schema>,
        ticket: Ticket,
        callback: Arc<dyn TickingCallback>,
        options: SubscriptionOptions,
    ) -> Result<Arc<SubscriptionHandle>, SubscribeError> {
        let id = NEXT_SUBSCRIPTION_ID.fetch_add(1, Ordering::Relaxed);
        let request = SubscriptionRequest::new(ticket, options);
        info!("subscription {id}: subscribing to {}", request.ticket);

        let (setup_done, setup_result) = SfCallback::create_for_future();
        executor.invoke(move || {
            if let Err(error) =
                setup_done.fulfil(Self::setup(id, &server, schema, &request, callback))
            {
                error!("subscription {id}: failed to report setup result: {error}");
            }
        })?;
        setup_result.wait()
    }

    fn setup(
        id: u64,
        server: &Server,
        schema: Arc<Schema>,
        request: &SubscriptionRequest,
        callback: Arc<dyn TickingCallback>,
    ) -> Result<Arc<SubscriptionHandle>, SubscribeError> {
        let span = info_span!("barrage_subscription", id);
        let FlightExchange { writer, reader } = TOKIO
            .block_on(
                async {
                    let mut exchange = server
                        .flight_client()
                        .do_exchange(
                            &server.call_options(),
                            FlightDescriptor::new_cmd(exchange_command()),
                        )
                        .await?;
                    exchange.writer.write_metadata(request.encode()).await?;
                    Ok::<_, AnyError>(exchange)
                }
                .instrument(span.clone()),
            )
            .map_err(|error| {
                warn!("subscription {id}: setup failed: {error:#}");
                SubscribeError::Setup(error)
            })?;

        let token = reader.cancellation_token();
        let shared = Arc::new(WorkerShared {
            cancelled: AtomicBool::new(false),
            finished: AtomicBool::new(false),
            callback,
        });
        let worker = Worker {
            id,
            reader,
            _writer: writer,
            processor: BarrageProcessor::new(schema),
            shared: shared.clone(),
        };
        let join_handle = thread::Builder::new()
            .name(format!("barrage-subscription-{id}"))
            .spawn({
                let shared = shared.clone();
                move || {
                    span.in_scope(|| worker.run());
                    shared.finished.store(true, Ordering::Release);
                }
            })
            .map_err(|error| {
                SubscribeError::Setup(
                    AnyError::new(error).context("failed to spawn subscription thread"),
                )
            })?;

        Ok(Arc::new(SubscriptionHandle {
            id,
            worker: join_handle.thread().id(),
            token,
            shared,
            join_handle: Mutex::new(Some(join_handle)),
        }))
    }
}

/// State shared between a subscription thread and its handle.
struct WorkerShared {
    /// Set before the transport is cancelled, so that the worker can tell a
    /// requested stop from a failure.
    cancelled: AtomicBool,
    /// Set once the thread has delivered its last callback.
    finished: AtomicBool,
    callback: Arc<dyn TickingCallback>,
}

struct Worker {
    id: u64,
    reader: FlightStreamReader,
    // Dropping the writer would half-close the exchange.
    _writer: Box<dyn FlightStreamWriter>,
    processor: BarrageProcessor,
    shared: Arc<WorkerShared>,
}

impl Worker {
    fn run(mut self) {
        debug!("subscription {}: thread started", self.id);
        let Err(error) = self.process_frames();
        if self.is_cancelled() {
            debug!("subscription {}: stopped: {error}", self.id);
            return;
        }

        warn!("subscription {}: failed: {error}", self.id);
        let callback = &self.shared.callback;
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| callback.on_failure(error))) {
            error!(
                "subscription {}: failure callback panicked: {}",
                self.id,
                panic_message(&*payload)
            );
        }
    }

    fn is_cancelled(&self) -> bool {
        self.shared.cancelled.load(Ordering::Acquire)
    }

    /// Reads frames and delivers updates until the stream fails, ends or is
    /// cancelled.
    fn process_frames(&mut self) -> Result<Infallible, SubscriptionError> {
        loop {
            let chunk = match TOKIO.block_on(self.reader.next()) {
                Ok(Some(chunk)) => chunk,
                Ok(None) => return Err(SubscriptionError::StreamClosed),
                Err(_) if self.is_cancelled() => return Err(SubscriptionError::Cancelled),
                Err(error) => return Err(SubscriptionError::Transport(error)),
            };

            let sources = chunk
                .data
                .columns()
                .iter()
                .map(ColumnSource::from_envelope)
                .collect::<Result<Vec<_>, _>>()
                .map_err(ProtocolError::from)?;
            let sizes = sources.iter().map(ColumnSource::len).collect::<Vec<_>>();
            let Some(update) = self.processor.process_next_chunk(
                &sources,
                &sizes,
                chunk.app_metadata.as_deref(),
            )?
            else {
                continue;
            };

            if self.is_cancelled() {
                return Err(SubscriptionError::Cancelled);
            }
            trace!(
                "subscription {}: delivering {:?} with {} rows",
                self.id,
                update.kind(),
                update.current().num_rows()
            );
            let callback = &self.shared.callback;
            panic::catch_unwind(AssertUnwindSafe(|| callback.on_tick(update)))
                .map_err(|payload| SubscriptionError::CallbackPanicked(panic_message(&*payload)))?;
        }
    }
}

/// Controls a running subscription.  Dropping the handle cancels the
/// subscription.
pub struct SubscriptionHandle {
    id: u64,
    worker: ThreadId,
    token: CancellationToken,
    shared: Arc<WorkerShared>,
    /// `None` once the thread has been joined.
    join_handle: Mutex<Option<JoinHandle<()>>>,
}

impl SubscriptionHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn is_cancelled(&self) -> bool {
        self.shared.cancelled.load(Ordering::Acquire)
    }

    /// Whether the subscription thread has stopped delivering callbacks,
    /// because it was cancelled or failed.
    pub fn is_finished(&self) -> bool {
        self.shared.finished.load(Ordering::Acquire)
    }

    /// Stops the subscription.
    ///
    /// Returns after the subscription thread has exited, so no callback runs
    /// once `cancel` returns, including for concurrent callers and after the
    /// subscription cancelled itself.  Cancelling a subscription whose thread
    /// has already been joined only logs a warning.
    ///
    /// Called from the subscription's own callback, `cancel` cannot wait for
    /// the thread; the subscription stops as soon as the callback returns.
    pub fn cancel(&self) {
        let first = !self.shared.cancelled.swap(true, Ordering::AcqRel);
        if first {
            self.token.cancel();
        }

        if thread::current().id() == self.worker {
            if first {
                info!("subscription {}: cancelled from its own thread", self.id);
            } else {
                warn!("subscription {}: already cancelled", self.id);
            }
            return;
        }

        let mut join_handle = self.join_handle.lock().unwrap();
        let Some(handle) = join_handle.take() else {
            warn!("subscription {}: already cancelled", self.id);
            return;
        };
        if handle.join().is_err() {
            error!("subscription {}: thread panicked", self.id);
        }
        info!("subscription {}: cancelled", self.id);
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        let joined = self
            .join_handle
            .get_mut()
            .map_or(true, |join_handle| join_handle.is_none());
        if !joined {
            self.cancel();
        }
    }
}
