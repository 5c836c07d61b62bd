use crate::callback::{FnTickingCallback, TickingCallback};
use crate::error::{ClientError, SubscribeError, SubscriptionError};
use crate::executor::Executor;
use crate::server::Server;
use crate::subscription::{SubscriptionHandle, SubscriptionThread};
use crate::transport::FlightClient;
use barrage_core::ticking::TickingUpdate;
use barrage_core::Schema;
use barrage_types::{ClientConfig, SubscriptionOptions, Ticket};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use tracing::info;

/// Entry point for subscribing to ticking tables on one server.
///
/// The client tracks the subscriptions it created until they are
/// unsubscribed or their thread finishes after a failure; [`shutdown`] (or
/// dropping the client) cancels those that are still tracked.
///
/// [`shutdown`]: Client::shutdown
pub struct Client {
    config: ClientConfig,
    server: Arc<Server>,
    flight_executor: Executor,
    subscriptions: Mutex<BTreeMap<u64, Arc<SubscriptionHandle>>>,
}

impl Client {
    pub fn connect(
        config: ClientConfig,
        flight: Arc<dyn FlightClient>,
    ) -> Result<Self, ClientError> {
        config.validate()?;
        let flight_executor = Executor::start(&config.flight_executor_name)?;
        let server = Arc::new(Server::new(flight, config.headers()));
        info!("barrage client connected");
        Ok(Self {
            config,
            server,
            flight_executor,
            subscriptions: Mutex::new(BTreeMap::new()),
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn server(&self) -> &Arc<Server> {
        &self.server
    }

    /// Subscribes with the options from the client configuration.
    pub fn subscribe(
        &self,
        schema: Arc<Schema>,
        ticket: Ticket,
        callback: Arc<dyn TickingCallback>,
    ) -> Result<Arc<SubscriptionHandle>, SubscribeError> {
        self.subscribe_with_options(
            schema,
            ticket,
            callback,
            self.config.subscription.clone(),
        )
    }

    pub fn subscribe_with_options(
        &self,
        schema: Arc<Schema>,
        ticket: Ticket,
        callback: Arc<dyn TickingCallback>,
        options: SubscriptionOptions,
    ) -> Result<Arc<SubscriptionHandle>, SubscribeError> {
        let handle = SubscriptionThread::start(
            self.server.clone(),
            &self.flight_executor,
            schema,
            ticket,
            callback,
            options,
        )?;
        let finished = {
            let mut subscriptions = self.subscriptions.lock().unwrap();
            subscriptions.insert(handle.id(), handle.clone());
            Self::prune(&mut subscriptions)
        };
        drop(finished);
        Ok(handle)
    }

    /// Subscribes with a pair of closures as the callback.
    pub fn subscribe_fn<T, F>(
        &self,
        schema: Arc<Schema>,
        ticket: Ticket,
        on_tick: T,
        on_failure: F,
    ) -> Result<Arc<SubscriptionHandle>, SubscribeError>
    where
        T: Fn(TickingUpdate) + Send + Sync + 'static,
        F: Fn(SubscriptionError) + Send + Sync + 'static,
    {
        self.subscribe(
            schema,
            ticket,
            Arc::new(FnTickingCallback::new(on_tick, on_failure)),
        )
    }

    /// Forgets and cancels a subscription.
    pub fn unsubscribe(&self, handle: &SubscriptionHandle) {
        self.subscriptions.lock().unwrap().remove(&handle.id());
        handle.cancel();
    }

    /// Number of subscriptions created by this client that are still
    /// running and not unsubscribed.
    pub fn num_subscriptions(&self) -> usize {
        let (count, finished) = {
            let mut subscriptions = self.subscriptions.lock().unwrap();
            let finished = Self::prune(&mut subscriptions);
            (subscriptions.len(), finished)
        };
        drop(finished);
        count
    }

    /// Removes subscriptions whose thread has finished.  The caller drops the
    /// returned handles after releasing the lock, since dropping the last
    /// reference joins the thread.
    fn prune(
        subscriptions: &mut BTreeMap<u64, Arc<SubscriptionHandle>>,
    ) -> Vec<Arc<SubscriptionHandle>> {
        let ids = subscriptions
            .iter()
            .filter(|(_, handle)| handle.is_finished())
            .map(|(id, _)| *id)
            .collect::<Vec<_>>();
        ids.iter()
            .filter_map(|id| subscriptions.remove(id))
            .collect()
    }

    /// Cancels every remaining subscription and stops the flight executor.
    pub fn shutdown(&self) {
        let subscriptions = std::mem::take(&mut *self.subscriptions.lock().unwrap());
        for handle in subscriptions.values() {
            handle.cancel();
        }
        self.flight_executor.shutdown();
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.shutdown();
    }
}
