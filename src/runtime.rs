//! # Runtime
//!
//! Process startup and shutdown shared by the sample binaries.

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Install ring as the rustls crypto provider
///
/// Must run before any TLS connection is made. A provider that is already
/// installed is left in place.
pub fn install_crypto_provider() {
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        debug!("rustls crypto provider already installed");
    }
}

/// Resolves on SIGINT, or SIGTERM on Unix
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for SIGINT: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}

/// Cancel `token` when a shutdown signal arrives
///
/// The returned task ends once `token` is cancelled, by a signal or otherwise.
pub fn cancel_on_signal(token: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            () = shutdown_signal() => {
                info!("Received shutdown signal (SIGINT/SIGTERM), initiating graceful shutdown...");
                token.cancel();
            }
            () = token.cancelled() => {}
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_install_crypto_provider_twice() {
        install_crypto_provider();
        install_crypto_provider();
        assert!(rustls::crypto::CryptoProvider::get_default().is_some());
    }

    #[tokio::test]
    async fn test_listener_exits_when_token_is_cancelled() {
        let token = CancellationToken::new();
        let listener = cancel_on_signal(token.clone());
        token.cancel();

        tokio::time::timeout(std::time::Duration::from_secs(5), listener)
            .await
            .expect("listener should stop after cancellation")
            .expect("listener task");
    }

    #[tokio::test]
    async fn test_listener_waits_while_token_is_live() {
        let token = CancellationToken::new();
        let listener = cancel_on_signal(token.clone());
        tokio::task::yield_now().await;

        assert!(!listener.is_finished());
        assert!(!token.is_cancelled());
        token.cancel();
        listener.await.expect("listener task");
    }
}
