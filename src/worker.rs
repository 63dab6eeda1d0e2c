//! Dedicated OS threads for blocking device reads.

use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, error, warn};

const JOIN_POLL: Duration = Duration::from_millis(5);

/// Spawns a named thread for a blocking device loop
pub fn spawn_worker<F>(name: &str, body: F) -> std::io::Result<JoinHandle<()>>
where
    F: FnOnce() + Send + 'static,
{
    std::thread::Builder::new()
        .name(name.to_string())
        .spawn(body)
}

/// Waits up to `grace` for a worker thread to finish
///
/// A thread stuck in a device read is abandoned; it ends with the process.
/// Returns whether the thread finished in time.
pub async fn join_worker(name: &str, handle: JoinHandle<()>, grace: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + grace;
    while !handle.is_finished() {
        if tokio::time::Instant::now() >= deadline {
            warn!(
                "Worker {} still busy after {}ms, abandoning it",
                name,
                grace.as_millis()
            );
            return false;
        }
        tokio::time::sleep(JOIN_POLL).await;
    }

    match handle.join() {
        Ok(()) => debug!("Worker {} finished", name),
        Err(_) => error!("Worker {} panicked", name),
    }
    true
}
