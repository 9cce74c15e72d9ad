//! Detached background work.
//!
//! Side effects such as analytics posts and best-effort writes must never
//! hold up or fail the request that triggered them.

use std::future::Future;

use tokio::task::JoinHandle;
use tracing::warn;

/// Spawn `fut` on the current runtime without tracking it. Errors are logged under `task`.
pub fn spawn_detached<F, E>(task: &'static str, fut: F) -> JoinHandle<()>
where
    F: Future<Output = Result<(), E>> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    tokio::spawn(async move {
        if let Err(e) = fut.await {
            warn!(task, error = %e, "detached task failed");
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn detached_errors_do_not_escape() {
        let ran = Arc::new(AtomicBool::new(false));
        let flag = ran.clone();
        let handle = spawn_detached("test", async move {
            flag.store(true, Ordering::SeqCst);
            Err::<(), _>("boom")
        });
        handle.await.expect("task joins cleanly");
        assert!(ran.load(Ordering::SeqCst));
    }
}
