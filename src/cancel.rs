//! Cancellation of in-flight network calls
//!
//! A [`CancelHandle`] is held by whoever may abandon the operation (a UI, a
//! Ctrl-C handler); the paired [`Cancellation`] is passed into the call and
//! raced against it.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::watch;

use crate::error::{InklessError, Result};

/// Caller side: trigger cancellation
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

/// Operation side: observe cancellation
#[derive(Clone, Debug)]
pub struct Cancellation {
    rx: watch::Receiver<bool>,
    _owner: Option<Arc<watch::Sender<bool>>>,
}

/// Create a linked handle and token
pub fn cancellation() -> (CancelHandle, Cancellation) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle { tx }, Cancellation { rx, _owner: None })
}

impl CancelHandle {
    /// Abandon the operation
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }
}

impl Cancellation {
    /// A token that never fires
    pub fn never() -> Self {
        let (tx, rx) = watch::channel(false);
        Cancellation {
            rx,
            _owner: Some(Arc::new(tx)),
        }
    }

    /// Whether cancellation was requested
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Fail with [`InklessError::Cancelled`] if cancellation was requested
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            return Err(InklessError::Cancelled);
        }
        Ok(())
    }

    /// Resolves once cancellation is requested
    ///
    /// If the handle is dropped without cancelling, this never resolves.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }

    /// Run `fut` unless cancelled first; a cancelled call is never reported as success
    pub async fn run<F, T>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        self.check()?;
        tokio::select! {
            biased;
            _ = self.cancelled() => Err(InklessError::Cancelled),
            result = fut => result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_completes_when_not_cancelled() {
        let (_handle, token) = cancellation();
        let value = token.run(async { Ok(7) }).await.unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn test_cancel_wins_over_slow_call() {
        let (handle, token) = cancellation();
        let task = tokio::spawn(async move {
            token
                .run(async {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    Ok(())
                })
                .await
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        handle.cancel();
        let result = task.await.unwrap();
        assert!(matches!(result, Err(InklessError::Cancelled)));
    }

    #[tokio::test]
    async fn test_already_cancelled_never_runs() {
        let (handle, token) = cancellation();
        handle.cancel();
        let result = token.run(async { Ok::<_, InklessError>(()) }).await;
        assert!(matches!(result, Err(InklessError::Cancelled)));
    }

    #[tokio::test]
    async fn test_dropped_handle_does_not_cancel() {
        let (handle, token) = cancellation();
        drop(handle);
        assert!(!token.is_cancelled());
        assert_eq!(token.run(async { Ok(1) }).await.unwrap(), 1);
    }
}
