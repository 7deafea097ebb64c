use tokio::sync::watch;

/// Creates a connected pair of cancel handle and cancellation signal.
pub fn cancellation() -> (CancelHandle, Cancellation) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle { tx }, Cancellation { rx })
}

/// The caller side of a cancellation, see [`cancellation`].
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    /// Cancels every turn observing the paired [`Cancellation`].
    #[inline]
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}

/// A signal telling a running turn to stop.
///
/// Dropping the paired [`CancelHandle`] without calling
/// [`CancelHandle::cancel`] means the turn will never be cancelled.
#[derive(Clone, Debug)]
pub struct Cancellation {
    rx: watch::Receiver<bool>,
}

impl Cancellation {
    /// Returns a signal that never fires.
    #[inline]
    pub fn never() -> Self {
        cancellation().1
    }

    /// Returns `true` if cancellation has been requested.
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once cancellation has been requested.
    ///
    /// # Cancel safety
    ///
    /// This method is cancel safe.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        let handle_dropped = rx.wait_for(|cancelled| *cancelled).await.is_err();
        if handle_dropped {
            std::future::pending::<()>().await;
        }
    }
}
