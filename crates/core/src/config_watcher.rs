use crate::config_loader::ConfigLoader;
use crate::snapshot::SnapshotHolder;
use crate::traits::ExchangeGateway;
use anyhow::Result;
use notify::{Event, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Re-activates the symbols config whenever its file changes.
pub struct ConfigWatcher {
    path: PathBuf,
    holder: SnapshotHolder,
    gateway: Arc<dyn ExchangeGateway>,
}

impl ConfigWatcher {
    #[must_use]
    pub fn new(
        path: impl Into<PathBuf>,
        holder: SnapshotHolder,
        gateway: Arc<dyn ExchangeGateway>,
    ) -> Self {
        Self {
            path: path.into(),
            holder,
            gateway,
        }
    }

    /// Watches the config file and swaps in a new snapshot after each
    /// modification. A reload that fails leaves the active snapshot in place.
    ///
    /// Runs until the underlying watcher stops.
    ///
    /// # Errors
    ///
    /// Returns an error if file watching cannot be initiated.
    pub async fn watch(&self) -> Result<()> {
        let (event_tx, mut event_rx) = mpsc::unbounded_channel();

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            if let Ok(event) = res {
                let _ = event_tx.send(event);
            }
        })?;

        // Editors often replace the file, so watch its directory instead.
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        watcher.watch(dir, RecursiveMode::NonRecursive)?;
        let file_name = self.path.file_name();

        while let Some(event) = event_rx.recv().await {
            let touches_config = event.paths.iter().any(|p| p.file_name() == file_name);
            if !touches_config || !(event.kind.is_modify() || event.kind.is_create()) {
                continue;
            }
            tracing::info!(path = %self.path.display(), "config file changed, reloading");
            self.reload().await;
        }

        Ok(())
    }

    /// Loads the file once and activates it.
    pub async fn reload(&self) {
        let config = match ConfigLoader::load(&self.path) {
            Ok(config) => config,
            Err(e) => {
                tracing::error!(error = %e, "failed to reload config");
                return;
            }
        };
        if self.holder.reload(&config, self.gateway.as_ref()).await.is_ok() {
            tracing::info!("config reloaded successfully");
        }
    }
}
