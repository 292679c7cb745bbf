use tokio::sync::watch;

/// Stopper stops everything listening on the paired `StopCheck`s: explicitly via `stop()`, or
/// when it's dropped.
pub(crate) struct Stopper {
    stop_signal: watch::Sender<bool>,
}

#[derive(Clone)]
pub(crate) struct StopCheck {
    stop_signal: watch::Receiver<bool>,
}

impl Stopper {
    pub(crate) fn stop(&self) {
        let _ = self.stop_signal.send(true);
    }
}

impl Drop for Stopper {
    fn drop(&mut self) {
        self.stop();
    }
}

impl StopCheck {
    pub(crate) fn should_stop(&self) -> bool {
        *self.stop_signal.borrow()
    }

    /// stopped resolves once the paired `Stopper` has stopped or is gone.
    pub(crate) async fn stopped(&mut self) {
        while !self.should_stop() {
            if self.stop_signal.changed().await.is_err() {
                return;
            }
        }
    }
}

pub(crate) fn new() -> (Stopper, StopCheck) {
    let (snd, rcv) = watch::channel(false);

    (Stopper { stop_signal: snd }, StopCheck { stop_signal: rcv })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn drop_releases_waiters() {
        let (stopper, stop_check) = new();
        let mut waiter_check = stop_check.clone();
        let waiter = tokio::spawn(async move { waiter_check.stopped().await });

        assert!(!stop_check.should_stop());
        drop(stopper);
        waiter.await.unwrap();
        assert!(stop_check.should_stop());
    }
}
