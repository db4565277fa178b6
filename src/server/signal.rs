// Signal handling module
//
// Supported signals:
// - SIGHUP:  Reload the in-memory asset cache from disk
// - SIGTERM: Graceful shutdown
// - SIGINT:  Graceful shutdown (Ctrl+C)

use std::sync::Arc;
use tokio::sync::Notify;

use crate::handler::AssetCache;
use crate::logger;

/// Signal handler state
pub struct SignalHandler {
    /// Notified once on SIGTERM/SIGINT
    pub shutdown: Arc<Notify>,
    assets: Arc<AssetCache>,
}

impl SignalHandler {
    pub fn new(assets: Arc<AssetCache>) -> Self {
        Self {
            shutdown: Arc::new(Notify::new()),
            assets,
        }
    }

    /// Re-read the critical assets off the async worker threads
    pub async fn reload_assets(&self) {
        logger::log_info("[Signal] Reloading critical assets");
        let assets = Arc::clone(&self.assets);
        match tokio::task::spawn_blocking(move || {
            assets.reload();
            assets.len()
        })
        .await
        {
            Ok(count) => logger::log_info(&format!("[Signal] Asset cache reloaded ({count} entries)")),
            Err(e) => logger::log_error(&format!("[Signal] Asset reload task failed: {e}")),
        }
    }

    pub fn request_shutdown(&self) {
        // notify_one keeps a permit if the accept loop is not waiting yet
        self.shutdown.notify_one();
    }
}

/// Start signal handlers (Unix)
///
/// | Signal  | Action                  |
/// |---------|-------------------------|
/// | SIGHUP  | Reload asset cache      |
/// | SIGTERM | Graceful stop           |
/// | SIGINT  | Graceful stop (Ctrl+C)  |
#[cfg(unix)]
pub fn start_signal_handler(handler: Arc<SignalHandler>) -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sighup = signal(SignalKind::hangup())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    logger::log_info(&format!(
        "[Signal] Handlers registered (pid {}): HUP reloads assets, TERM/INT shut down",
        std::process::id()
    ));

    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = sighup.recv() => {
                    handler.reload_assets().await;
                }
                _ = sigterm.recv() => {
                    logger::log_info("[Signal] SIGTERM received, shutting down");
                    handler.request_shutdown();
                    break;
                }
                _ = sigint.recv() => {
                    logger::log_info("[Signal] SIGINT received, shutting down");
                    handler.request_shutdown();
                    break;
                }
            }
        }
    });

    Ok(())
}

/// Non-unix fallback: only Ctrl+C is handled
#[cfg(not(unix))]
pub fn start_signal_handler(handler: Arc<SignalHandler>) -> std::io::Result<()> {
    tokio::spawn(async move {
        if let Ok(()) = tokio::signal::ctrl_c().await {
            logger::log_info("[Signal] Ctrl+C received, shutting down");
            handler.request_shutdown();
        }
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[tokio::test]
    async fn test_reload_assets_picks_up_changes() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("index.html"), "old").unwrap();
        let assets = Arc::new(AssetCache::load(dir.path(), vec!["index.html".to_string()]));
        let handler = SignalHandler::new(Arc::clone(&assets));

        fs::write(dir.path().join("index.html"), "new").unwrap();
        handler.reload_assets().await;
        assert_eq!(assets.lookup("/index.html").unwrap().content.as_ref(), b"new");
    }

    #[tokio::test]
    async fn test_shutdown_permit_is_kept() {
        let dir = tempfile::tempdir().unwrap();
        let assets = Arc::new(AssetCache::load(dir.path(), Vec::new()));
        let handler = SignalHandler::new(assets);

        handler.request_shutdown();
        // Notified before anyone waited; the stored permit completes this
        tokio::time::timeout(std::time::Duration::from_secs(1), handler.shutdown.notified())
            .await
            .unwrap();
    }
}
