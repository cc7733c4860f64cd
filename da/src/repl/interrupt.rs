//! Ctrl-C cancellation for in-flight remote calls

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Cancels its token on Ctrl-C until dropped
pub struct InterruptGuard {
    token: CancellationToken,
    listener: JoinHandle<()>,
}

impl InterruptGuard {
    /// Start listening for Ctrl-C; must be called inside a tokio runtime
    pub fn install() -> Self {
        debug!("InterruptGuard::install: called");
        let token = CancellationToken::new();
        let child = token.clone();
        let listener = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                debug!("InterruptGuard: ctrl-c received");
                child.cancel();
            }
        });
        Self { token, listener }
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}

impl Drop for InterruptGuard {
    fn drop(&mut self) {
        self.listener.abort();
    }
}
