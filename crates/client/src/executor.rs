use crate::error::ExecutorError;
use crossbeam::channel::{unbounded, Sender};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Mutex;
use std::thread::{self, JoinHandle};
use tracing::{debug, error};

type Task = Box<dyn FnOnce() + Send>;

/// A named thread that runs tasks one at a time, in submission order.
///
/// Dropping the executor, or calling [`shutdown`](Self::shutdown), stops
/// accepting tasks, lets the queued ones finish and joins the thread.
pub struct Executor {
    name: String,
    sender: Mutex<Option<Sender<Task>>>,
    join_handle: Mutex<Option<JoinHandle<()>>>,
}

impl Executor {
    pub fn start(name: &str) -> Result<Self, ExecutorError> {
        let (sender, receiver) = unbounded::<Task>();
        let join_handle = thread::Builder::new()
            .name(name.to_string())
            .spawn({
                let name = name.to_string();
                move || {
                    for task in receiver {
                        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(task)) {
                            error!("{name}: task panicked: {}", panic_message(&*payload));
                        }
                    }
                    debug!("{name}: stopped");
                }
            })
            .map_err(ExecutorError::Spawn)?;
        Ok(Self {
            name: name.to_string(),
            sender: Mutex::new(Some(sender)),
            join_handle: Mutex::new(Some(join_handle)),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Queues `task` to run on the executor thread.
    pub fn invoke<F>(&self, task: F) -> Result<(), ExecutorError>
    where
        F: FnOnce() + Send + 'static,
    {
        let sender = self.sender.lock().unwrap();
        sender
            .as_ref()
            .ok_or(ExecutorError::Shutdown)?
            .send(Box::new(task))
            .map_err(|_| ExecutorError::Shutdown)
    }

    pub fn shutdown(&self) {
        drop(self.sender.lock().unwrap().take());
        if let Some(join_handle) = self.join_handle.lock().unwrap().take() {
            // A task cannot wait for its own thread; the thread exits once
            // the queue drains.
            if join_handle.thread().id() != thread::current().id() {
                let _ = join_handle.join();
            }
        }
    }
}

impl Drop for Executor {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Extracts the message of a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
