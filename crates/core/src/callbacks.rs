//! Single-fire callbacks that can be waited on from another thread.
//!
//! [`SfCallback::create_for_future`] returns a connected pair: the callback
//! side is handed to the code that produces a result, possibly on another
//! thread, and the [`SfFuture`] side blocks until the result arrives or
//! chains a continuation onto it.

use std::fmt::{self, Debug, Formatter};
use std::sync::{Arc, Condvar, Mutex};
use thiserror::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackError {
    /// The callback already received a result.
    #[error("callback was already fulfilled")]
    AlreadyFulfilled,

    /// Every copy of the callback was dropped without being fulfilled.
    #[error("callback was dropped without being fulfilled")]
    Abandoned,
}

type Continuation<T, E> = Box<dyn FnOnce(Result<T, E>) + Send>;

struct State<T, E> {
    fulfilled: bool,
    outcome: Option<Result<T, E>>,
    continuation: Option<Continuation<T, E>>,
    /// Number of live `SfCallback` copies.
    senders: usize,
}

struct Shared<T, E> {
    state: Mutex<State<T, E>>,
    ready: Condvar,
}

/// Receives exactly one outcome: a value or an error.
///
/// Clones share the same slot, so the first of them to be fulfilled wins.
pub struct SfCallback<T, E> {
    shared: Arc<Shared<T, E>>,
}

/// The waiting side of an [`SfCallback`].
pub struct SfFuture<T, E> {
    shared: Arc<Shared<T, E>>,
}

impl<T, E> SfCallback<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    pub fn create_for_future() -> (Self, SfFuture<T, E>) {
        let shared = Arc::new(Shared {
            state: Mutex::new(State {
                fulfilled: false,
                outcome: None,
                continuation: None,
                senders: 1,
            }),
            ready: Condvar::new(),
        });
        (
            Self {
                shared: shared.clone(),
            },
            SfFuture { shared },
        )
    }

    pub fn on_success(&self, value: T) -> Result<(), CallbackError> {
        self.fulfil(Ok(value))
    }

    pub fn on_failure(&self, error: E) -> Result<(), CallbackError> {
        self.fulfil(Err(error))
    }

    /// Delivers `outcome`.  Fulfilling a callback twice is a programming
    /// error: it panics in debug builds and returns
    /// [`CallbackError::AlreadyFulfilled`] otherwise.
    pub fn fulfil(&self, outcome: Result<T, E>) -> Result<(), CallbackError> {
        let mut state = self.shared.state.lock().unwrap();
        if state.fulfilled {
            drop(state);
            debug_assert!(false, "single-fire callback fulfilled twice");
            return Err(CallbackError::AlreadyFulfilled);
        }
        state.fulfilled = true;
        match state.continuation.take() {
            Some(continuation) => {
                drop(state);
                continuation(outcome);
            }
            None => {
                state.outcome = Some(outcome);
                drop(state);
                self.shared.ready.notify_all();
            }
        }
        Ok(())
    }

    pub fn is_fulfilled(&self) -> bool {
        self.shared.state.lock().unwrap().fulfilled
    }
}

impl<T, E> Clone for SfCallback<T, E> {
    fn clone(&self) -> Self {
        self.shared.state.lock().unwrap().senders += 1;
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<T, E> Drop for SfCallback<T, E> {
    fn drop(&mut self) {
        let Ok(mut state) = self.shared.state.lock() else {
            return;
        };
        state.senders -= 1;
        if state.senders == 0 && !state.fulfilled {
            state.fulfilled = true;
            match state.continuation.take() {
                Some(continuation) => {
                    drop(state);
                    // Without an `E` to report, the continuation cannot run.
                    drop(continuation);
                }
                None => {
                    drop(state);
                    self.shared.ready.notify_all();
                }
            }
        }
    }
}

impl<T, E> Debug for SfCallback<T, E> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("SfCallback").finish_non_exhaustive()
    }
}

impl<T, E> SfFuture<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    /// Blocks until the callback is fulfilled and returns its outcome.
    ///
    /// If every copy of the callback is dropped unfulfilled, returns
    /// [`CallbackError::Abandoned`] converted into `E`.
    pub fn wait(self) -> Result<T, E>
    where
        E: From<CallbackError>,
    {
        let mut state = self.shared.state.lock().unwrap();
        loop {
            if let Some(outcome) = state.outcome.take() {
                return outcome;
            }
            if state.fulfilled {
                return Err(E::from(CallbackError::Abandoned));
            }
            state = self.shared.ready.wait(state).unwrap();
        }
    }

    /// Runs `continuation` with the outcome: immediately on the calling
    /// thread if it is already available, otherwise on the thread that
    /// fulfils the callback.
    ///
    /// The continuation is dropped without running if the callback is
    /// abandoned.
    pub fn then<F>(self, continuation: F)
    where
        F: FnOnce(Result<T, E>) + Send + 'static,
    {
        let mut state = self.shared.state.lock().unwrap();
        match state.outcome.take() {
            Some(outcome) => {
                drop(state);
                continuation(outcome);
            }
            None if state.fulfilled => (),
            None => state.continuation = Some(Box::new(continuation)),
        }
    }
}

impl<T, E> Debug for SfFuture<T, E> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("SfFuture").finish_non_exhaustive()
    }
}
