use once_cell::sync::Lazy;
use tokio::runtime::{Builder, Runtime};

/// Runtime shared by every subscription in the process.
///
/// Subscription threads block on it to await the next frame; the flight
/// executor blocks on it to open exchanges.
pub static TOKIO: Lazy<Runtime> = Lazy::new(|| {
    Builder::new_multi_thread()
        .thread_name_fn(|| {
            use std::sync::atomic::{AtomicUsize, Ordering};
            static ATOMIC_ID: AtomicUsize = AtomicUsize::new(0);
            let id = ATOMIC_ID.fetch_add(1, Ordering::SeqCst);
            format!("barrage-tokio-{}", id)
        })
        .enable_all()
        .build()
        .unwrap()
});
