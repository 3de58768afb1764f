/*!
 * Signal-driven shutdown
 */

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Cancel `token` on Ctrl-C or SIGTERM
///
/// Only the first signal is acted on. The handlers stay registered for the
/// rest of the process, so later signals are absorbed while teardown runs.
pub fn listen(token: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            _ = token.cancelled() => return,
            signal = wait_for_signal() => {
                if let Err(e) = signal {
                    warn!(error = %e, "Signal listener failed");
                    return;
                }
            }
        }

        println!("Ctrl-C received, starting shutdown");
        info!("Shutdown requested");
        token.cancel();
    })
}

#[cfg(unix)]
async fn wait_for_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut term_signal = signal(SignalKind::terminate())?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result,
        _ = term_signal.recv() => Ok(()),
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_listener_exits_when_token_cancelled_elsewhere() {
        let token = CancellationToken::new();
        let handle = listen(token.clone());

        token.cancel();
        tokio::time::timeout(std::time::Duration::from_secs(5), handle)
            .await
            .expect("listener should stop")
            .unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_signals_after_the_first_are_absorbed() {
        use std::time::Duration;
        use tokio::signal::unix::{signal, SignalKind};

        // Registered before anything is raised at this process
        let mut term = signal(SignalKind::terminate()).unwrap();
        let token = CancellationToken::new();
        let handle = listen(token.clone());

        let send_term = || {
            std::process::Command::new("kill")
                .args(["-TERM", &std::process::id().to_string()])
                .status()
                .unwrap();
        };

        // The listener registers inside its task, so keep signalling until it reacts
        tokio::time::timeout(Duration::from_secs(5), async {
            while !token.is_cancelled() {
                send_term();
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
        })
        .await
        .expect("first signal should cancel the token");
        handle.await.unwrap();

        send_term();
        tokio::time::timeout(Duration::from_secs(5), term.recv())
            .await
            .expect("later signal should reach the registered handler");
        assert!(token.is_cancelled());
    }
}
