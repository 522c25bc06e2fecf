//! Notify-based quota hot-reload watcher.
//!
//! - Watches a single JSON file using notify::RecommendedWatcher.
//! - On create/modify events, attempts to reload/validate and atomically
//!   replace the shared quota table. In-flight checks keep the table they
//!   already loaded; there is never a partially updated view.

use crate::config::loader::load_quota_config_from_file;
use crate::config::RoleQuotaTable;
use crate::errors::AdmissionError;
use arc_swap::ArcSwap;
use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Watch the quota file for changes and trigger reloads.
///
/// On a valid change (Modify or Create event) the new configuration is
/// loaded and validated; only then is a fresh `RoleQuotaTable` swapped into
/// the shared `ArcSwap`. A broken file keeps the previous table in place.
pub async fn watch_quota_file(
    path: PathBuf,
    shared_table: Arc<ArcSwap<RoleQuotaTable>>,
) -> Result<(), notify::Error> {
    // Tokio MPSC channel bridges the sync watcher thread with our async task.
    let (tx, mut rx) = mpsc::channel(1);

    let mut watcher = RecommendedWatcher::new(
        move |res: Result<Event, notify::Error>| {
            // blocking_send: this callback runs on the watcher's own thread.
            if let Err(e) = tx.blocking_send(res) {
                debug!("Failed to send quota file event: {}", e);
            }
        },
        notify::Config::default(),
    )?;

    watcher.watch(&path, RecursiveMode::NonRecursive)?;
    info!("Watching quota file for changes: {}", path.display());

    while let Some(res) = rx.recv().await {
        match res {
            Ok(event) => {
                if should_reload(&event) {
                    info!(
                        "Quota file change detected. Event: {:?}. Triggering reload.",
                        event.kind
                    );
                    reload_quotas(&path, &shared_table).await;
                } else {
                    debug!("Ignoring irrelevant filesystem event: {:?}", event.kind);
                }
            }
            Err(e) => {
                crate::metrics::record_config_reload(false);
                error!("Error watching quota file: {}", e);
            }
        }
    }

    warn!("Quota watcher task is shutting down.");
    Ok(())
}

/// Only file modifications and creations should trigger a reload.
fn should_reload(event: &Event) -> bool {
    matches!(
        event.kind,
        notify::EventKind::Modify(_) | notify::EventKind::Create(_)
    )
}

/// Performs the actual reload and atomic swap.
async fn reload_quotas(path: &Path, shared_table: &Arc<ArcSwap<RoleQuotaTable>>) {
    let new_config = match load_quota_config_from_file(path).await {
        Ok(config) => config,
        Err(e) => {
            crate::metrics::record_config_reload(false);
            match e {
                AdmissionError::FileSystemError(io_err) => {
                    error!(
                        "Failed to read quota file '{}': {}. Keeping old quotas.",
                        path.display(),
                        io_err
                    );
                }
                AdmissionError::JsonError(json_err) => {
                    error!(
                        "Failed to parse JSON from '{}': {}. Keeping old quotas.",
                        path.display(),
                        json_err
                    );
                }
                AdmissionError::ConfigurationError(msg) | AdmissionError::InvalidQuota(msg) => {
                    error!(
                        "New quota config in '{}' is invalid: {}. Keeping old quotas.",
                        path.display(),
                        msg
                    );
                }
                _ => {
                    error!(
                        "Unexpected error while reloading quotas: {}. Keeping old quotas.",
                        e
                    );
                }
            }
            return;
        }
    };

    let new_table = match RoleQuotaTable::new(&new_config) {
        Ok(table) => table,
        Err(e) => {
            crate::metrics::record_config_reload(false);
            error!("Failed to build quota table: {}. Keeping old quotas.", e);
            return;
        }
    };

    // `store` performs the atomic replacement. Existing readers finish with
    // the old Arc, new readers get the new one.
    shared_table.store(Arc::new(new_table));
    crate::metrics::record_config_reload(true);
    info!("Quota table hot-reloaded successfully.");
}
