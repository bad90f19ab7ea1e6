use tokio_util::sync::CancellationToken as TokioToken;

/// Hierarchical, cooperative cancellation handle. Cancelling a token
/// cancels every descendant created via [`CancellationToken::child`]; a
/// child never propagates cancellation back up to its parent.
#[derive(Debug, Clone)]
pub struct CancellationToken {
    inner: TokioToken,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self {
            inner: TokioToken::new(),
        }
    }

    pub fn cancel(&self) {
        log::debug!("cancellation token cancelled");
        self.inner.cancel();
    }

    pub fn check(&self) -> bool {
        self.inner.is_cancelled()
    }

    pub fn child(&self) -> CancellationToken {
        CancellationToken {
            inner: self.inner.child_token(),
        }
    }

    /// Resolves once this token (or an ancestor) is cancelled; useful for
    /// composing with `tokio::select!` at a suspension point.
    pub async fn cancelled(&self) {
        self.inner.cancelled().await;
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}
