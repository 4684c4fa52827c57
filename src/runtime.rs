//! The background executor that runs accept loops and relays.

use std::future::Future;
use std::sync::Arc;
use std::thread;

use once_cell::sync::{Lazy, OnceCell};
use smol::{future, Executor, Task};

static THREADS: OnceCell<usize> = OnceCell::new();

static EXECUTOR: Lazy<Arc<Executor<'static>>> = Lazy::new(|| {
    let ex = Arc::new(Executor::new());
    let threads = THREADS.get().copied().unwrap_or_else(num_cpus::get);
    for i in 1..=threads {
        let builder = thread::Builder::new().name(format!("tetherfwd-{}", i));
        {
            let ex = ex.clone();
            builder
                .spawn(move || {
                    future::block_on(ex.run(future::pending::<()>()));
                })
                .expect("could not spawn executor thread");
        }
    }
    ex
});

/// Sets the number of executor threads, defaulting to the number of logical
/// CPUs. Must be called before the first forwarding rule is added; panics if
/// the thread count was already configured.
pub fn set_worker_threads(threads: usize) {
    THREADS
        .set(threads.max(1))
        .expect("worker threads already configured")
}

/// Spawns a future onto the forwarding executor.
pub(crate) fn spawn<T: Send + 'static>(
    future: impl Future<Output = T> + Send + 'static,
) -> Task<T> {
    EXECUTOR.spawn(future)
}
