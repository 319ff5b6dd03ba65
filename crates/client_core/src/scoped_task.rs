use std::future::Future;

use tokio::task::JoinHandle;

/// A spawned task that is aborted when the guard is dropped.
pub(crate) struct ScopedTask {
    handle: JoinHandle<()>,
}

impl ScopedTask {
    pub(crate) fn spawn<F>(future: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        Self {
            handle: tokio::spawn(future),
        }
    }

    pub(crate) fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for ScopedTask {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
