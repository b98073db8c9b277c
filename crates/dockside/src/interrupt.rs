//! Interrupt handling.
//!
//! SIGINT (and SIGTERM on Unix) cancel a process-wide [`CancellationToken`].
//! Nothing is torn down from the signal handler itself; each session phase
//! races its blocking call against the token with [`until_cancelled`] and
//! decides how to wind down.

use std::future::Future;
use std::io;

use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Owns the cancellation token fed by the signal listener.
#[derive(Debug, Clone)]
pub struct InterruptController {
    token: CancellationToken,
}

impl InterruptController {
    /// Register the signal handlers and start listening.
    ///
    /// Must be called from within a Tokio runtime. The handlers stay active for
    /// the rest of the process, so repeated interrupts never fall back to the
    /// default kill behaviour.
    pub fn install() -> io::Result<Self> {
        let token = CancellationToken::new();
        let trigger = token.clone();

        #[cfg(unix)]
        {
            use tokio::signal::unix::{SignalKind, signal};

            let mut interrupt = signal(SignalKind::interrupt())?;
            let mut terminate = signal(SignalKind::terminate())?;
            tokio::spawn(async move {
                tokio::select! {
                    _ = interrupt.recv() => debug!("received SIGINT"),
                    _ = terminate.recv() => debug!("received SIGTERM"),
                }
                trigger.cancel();
                // Keep the streams registered so later signals are swallowed.
                loop {
                    tokio::select! {
                        _ = interrupt.recv() => {}
                        _ = terminate.recv() => {}
                    }
                }
            });
        }

        #[cfg(not(unix))]
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                debug!("received Ctrl+C");
                trigger.cancel();
            }
        });

        Ok(Self { token })
    }

    /// Controller that only cancels when told to. Used by tests and embedders.
    pub fn manual() -> Self {
        Self {
            token: CancellationToken::new(),
        }
    }

    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn is_interrupted(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// Run `fut` unless `token` is cancelled first. Returns `None` on cancellation,
/// dropping `fut`.
pub async fn until_cancelled<F: Future>(token: &CancellationToken, fut: F) -> Option<F::Output> {
    tokio::select! {
        biased;
        _ = token.cancelled() => None,
        out = fut => Some(out),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_until_cancelled_completes() {
        let token = CancellationToken::new();
        assert_eq!(until_cancelled(&token, async { 7 }).await, Some(7));
    }

    #[tokio::test]
    async fn test_until_cancelled_interrupts_pending_future() {
        let controller = InterruptController::manual();
        let token = controller.token();
        let canceller = controller.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            canceller.token().cancel();
        });

        let out = until_cancelled(&token, std::future::pending::<()>()).await;
        assert!(out.is_none());
        assert!(controller.is_interrupted());
    }

    #[tokio::test]
    async fn test_already_cancelled_wins() {
        let token = CancellationToken::new();
        token.cancel();
        assert_eq!(until_cancelled(&token, async { 1 }).await, None);
    }
}
