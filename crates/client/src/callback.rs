use crate::error::SubscriptionError;
use barrage_core::ticking::TickingUpdate;

/// Receives the updates of one subscription.
///
/// Both methods are called on the subscription's own thread, one call at a
/// time.  After `on_failure` the subscription delivers nothing more.  A
/// subscription that the caller cancels ends without `on_failure`.
pub trait TickingCallback: Send + Sync {
    fn on_tick(&self, update: TickingUpdate);

    fn on_failure(&self, error: SubscriptionError);
}

/// A [`TickingCallback`] built from two closures.
pub struct FnTickingCallback<T, F> {
    on_tick: T,
    on_failure: F,
}

impl<T, F> FnTickingCallback<T, F>
where
    T: Fn(TickingUpdate) + Send + Sync,
    F: Fn(SubscriptionError) + Send + Sync,
{
    pub fn new(on_tick: T, on_failure: F) -> Self {
        Self {
            on_tick,
            on_failure,
        }
    }
}

impl<T, F> TickingCallback for FnTickingCallback<T, F>
where
    T: Fn(TickingUpdate) + Send + Sync,
    F: Fn(SubscriptionError) + Send + Sync,
{
    fn on_tick(&self, update: TickingUpdate) {
        (self.on_tick)(update)
    }

    fn on_failure(&self, error: SubscriptionError) {
        (self.on_failure)(error)
    }
}
