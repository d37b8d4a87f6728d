use std::future::Future;
use std::sync::mpsc;
use std::thread;
use tracing::error;

use crate::UiMessage;

/// Runs a future to completion on a fresh background thread.
pub fn run_async(task: impl Future<Output = ()> + Send + 'static) {
    thread::spawn(move || {
        let rt = match tokio::runtime::Runtime::new() {
            Ok(rt) => rt,
            Err(e) => {
                error!("Failed to create runtime: {}", e);
                return;
            }
        };
        rt.block_on(task);
    });
}

/// Runs `task` in the background and lets `on_done` post its outcome back to
/// the UI thread.
pub fn async_call<T, F, D>(tx: mpsc::Sender<UiMessage>, task: F, on_done: D)
where
    F: Future<Output = T> + Send + 'static,
    T: Send + 'static,
    D: FnOnce(T, &mpsc::Sender<UiMessage>) + Send + 'static,
{
    run_async(async move {
        let result = task.await;
        on_done(result, &tx);
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_async_call_posts_result() {
        let (tx, rx) = mpsc::channel();

        async_call(
            tx,
            async { 40 + 2 },
            |answer, tx| {
                let _ = tx.send(UiMessage::SetStatus(format!("answer {}", answer)));
            },
        );

        match rx.recv_timeout(Duration::from_secs(5)) {
            Ok(UiMessage::SetStatus(status)) => assert_eq!(status, "answer 42"),
            other => panic!("unexpected {:?}", other),
        }
    }
}
