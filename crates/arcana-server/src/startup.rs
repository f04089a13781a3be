//! Process-level startup and shutdown utilities shared by every role.

use tokio::signal;
use tracing::info;

/// Prints the startup banner.
pub fn print_banner() {
    info!(
        r#"
   ___
  / _ |_ _____ ___ ___  ___ _
 / __ | '_/ _ `/ _ `/ _ \/ _ `/
/_/ |_|_| \_,_/\_,_/_//_/\_,_/

      Job Queue Runtime
    "#
    );
}

/// Prints where the admin surface is listening.
pub fn print_startup_info(bind_addr: &str) {
    let separator = "=".repeat(60);
    info!("{}", separator);
    info!("Admin API:  http://{}", bind_addr);
    info!("Health:     http://{}/healthz", bind_addr);
    info!("Metrics:    http://{}/metrics", bind_addr);
    info!("{}", separator);
}

/// Waits for Ctrl+C or, on Unix, SIGTERM, whichever arrives first.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("received Ctrl+C, initiating graceful shutdown...");
        }
        () = terminate => {
            info!("received terminate signal, initiating graceful shutdown...");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_print_banner_does_not_panic() {
        let _ = tracing_subscriber::fmt::try_init();
        print_banner();
    }

    #[test]
    fn test_print_startup_info_does_not_panic() {
        let _ = tracing_subscriber::fmt::try_init();
        print_startup_info("0.0.0.0:9091");
    }
}
