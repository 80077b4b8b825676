use std::future::Future;

use tokio::sync::watch;

/// Owner side of the session-wide cancellation signal.
pub struct CancelSource {
    tx: watch::Sender<bool>,
}

impl CancelSource {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx }
    }

    pub fn token(&self) -> CancelToken {
        CancelToken {
            rx: self.tx.subscribe(),
        }
    }

    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }
}

impl Default for CancelSource {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone)]
pub struct CancelToken {
    rx: watch::Receiver<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cancelled;

impl CancelToken {
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    pub async fn cancelled(&mut self) {
        while !*self.rx.borrow_and_update() {
            if self.rx.changed().await.is_err() {
                // Source dropped without cancelling.
                std::future::pending::<()>().await;
            }
        }
    }

    /// Drives `fut` to completion unless the token fires first, in which case
    /// `fut` is dropped and the request it carried is abandoned.
    pub async fn run<F: Future>(mut self, fut: F) -> Result<F::Output, Cancelled> {
        tokio::select! {
            biased;
            _ = self.cancelled() => Err(Cancelled),
            output = fut => Ok(output),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn completes_when_not_cancelled() {
        let source = CancelSource::new();
        let output = source.token().run(async { 7 }).await;
        assert_eq!(output, Ok(7));
    }

    #[tokio::test]
    async fn cancel_interrupts_pending_future() {
        let source = CancelSource::new();
        let token = source.token();
        let task = tokio::spawn(token.run(std::future::pending::<()>()));

        tokio::time::sleep(Duration::from_millis(10)).await;
        source.cancel();

        let output = tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("cancel should wake the task")
            .expect("join");
        assert_eq!(output, Err(Cancelled));
    }

    #[tokio::test]
    async fn tokens_created_after_cancel_fire_immediately() {
        let source = CancelSource::new();
        source.cancel();
        assert!(source.is_cancelled());
        assert!(source.token().is_cancelled());
        let output = source.token().run(async { 1 }).await;
        assert_eq!(output, Err(Cancelled));
    }
}
