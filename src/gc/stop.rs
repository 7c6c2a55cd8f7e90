//! Cooperative stop signal shared by the scheduler and the passes.

use tokio::sync::watch;

/// Sending half: raises the stop flag.
#[derive(Debug)]
pub struct StopTrigger {
    tx: watch::Sender<bool>,
}

impl StopTrigger {
    /// Raises the stop flag. Idempotent.
    pub fn stop(&self) {
        self.tx.send_replace(true);
    }
}

/// Receiving half: observed between topics and between passes.
#[derive(Debug, Clone)]
pub struct StopSignal {
    rx: watch::Receiver<bool>,
}

impl StopSignal {
    /// A signal that is never raised.
    #[must_use]
    pub fn never() -> Self {
        let (_tx, rx) = watch::channel(false);
        Self { rx }
    }

    /// Returns `true` once stop has been requested.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        *self.rx.borrow()
    }

    /// Completes once stop has been requested.
    ///
    /// Pends forever if the trigger is dropped without stopping.
    pub async fn stopped(&self) {
        let mut rx = self.rx.clone();
        let closed = rx.wait_for(|stopped| *stopped).await.is_err();
        if closed {
            std::future::pending::<()>().await;
        }
    }
}

/// Creates a connected trigger/signal pair.
#[must_use]
pub fn stop_channel() -> (StopTrigger, StopSignal) {
    let (tx, rx) = watch::channel(false);
    (StopTrigger { tx }, StopSignal { rx })
}
