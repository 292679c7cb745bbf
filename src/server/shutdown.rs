use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::oneshot;

/// shutdown_signal pairs a handle with the future an `RpcServer` serves until. The server stops
/// once the handle is used or dropped.
pub(crate) fn shutdown_signal() -> (RpcServerShutdownHandle, RpcServerShutdownSignal) {
    let (tx, rx) = oneshot::channel();

    (RpcServerShutdownHandle { tx }, RpcServerShutdownSignal { rx })
}

pub(crate) struct RpcServerShutdownHandle {
    tx: oneshot::Sender<()>,
}

impl RpcServerShutdownHandle {
    pub(crate) fn shutdown(self) {
        let _ = self.tx.send(());
    }
}

pub(crate) struct RpcServerShutdownSignal {
    rx: oneshot::Receiver<()>,
}

impl Future for RpcServerShutdownSignal {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        // Sent or dropped, both mean shut down.
        Pin::new(&mut self.rx).poll(cx).map(|_| ())
    }
}
