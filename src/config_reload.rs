use crate::metrics::DnsMetrics;
use crate::zone::{DefinitionError, ZoneBuilder, ZoneDefinition, ZoneError, ZoneStore};
use parking_lot::Mutex;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{error, info, warn};

/// What a successful reload published
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReloadSummary {
    pub zones: usize,
    pub names: usize,
    pub records: usize,
    pub generation: u64,
    pub serial: u32,
    #[serde(rename = "elapsed_ms", serialize_with = "as_millis")]
    pub elapsed: Duration,
}

fn as_millis<S: serde::Serializer>(elapsed: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(elapsed.as_millis() as u64)
}

#[derive(Error, Debug)]
pub enum ReloadError {
    #[error(transparent)]
    Definition(#[from] DefinitionError),

    #[error(transparent)]
    Zone(#[from] ZoneError),

    #[error("No zone file configured")]
    NoZoneFile,
}

/// Zone hot-reload manager.
///
/// Every reload path (HTTP API, SIGHUP, startup) goes through
/// [`ReloadCoordinator::apply`]. Reloads are serialized; the snapshot is built
/// without holding any lock readers contend on and is published only when
/// the whole build succeeded.
pub struct ReloadCoordinator {
    store: Arc<ZoneStore>,
    builder: ZoneBuilder,
    reload_lock: Mutex<()>,
    metrics: Option<Arc<DnsMetrics>>,
    zone_file: Option<PathBuf>,
}

impl ReloadCoordinator {
    pub fn new(store: Arc<ZoneStore>, builder: ZoneBuilder) -> Self {
        Self {
            store,
            builder,
            reload_lock: Mutex::new(()),
            metrics: None,
            zone_file: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<DnsMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// File re-read on SIGHUP
    pub fn with_zone_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.zone_file = Some(path.into());
        self
    }

    pub fn store(&self) -> &Arc<ZoneStore> {
        &self.store
    }

    pub fn zone_file(&self) -> Option<&Path> {
        self.zone_file.as_deref()
    }

    /// Build `definition` and publish it, or leave the current snapshot in
    /// place and return the build error
    pub fn apply(&self, definition: &ZoneDefinition) -> Result<ReloadSummary, ZoneError> {
        let _guard = self.reload_lock.lock();
        let started = Instant::now();

        let snapshot = match self.builder.build(definition) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!("Zone reload rejected: {}", e);
                if let Some(metrics) = &self.metrics {
                    metrics.record_reload(false);
                }
                return Err(e);
            }
        };

        let zones = snapshot.zone_count();
        let names = snapshot.name_count();
        let records = snapshot.record_count();
        let serial = snapshot.serial();
        self.store.apply(snapshot);
        let generation = self.store.generation();

        if let Some(metrics) = &self.metrics {
            metrics.record_reload(true);
            metrics.update_snapshot(&self.store.current(), generation);
        }

        let summary = ReloadSummary {
            zones,
            names,
            records,
            generation,
            serial,
            elapsed: started.elapsed(),
        };
        info!(
            "Zones reloaded: {} zones, {} names, {} records (generation {}, serial {}) in {:?}",
            summary.zones,
            summary.names,
            summary.records,
            summary.generation,
            summary.serial,
            summary.elapsed
        );
        Ok(summary)
    }

    /// Read a YAML or JSON zone file and apply it
    pub fn reload_from_file(&self, path: &Path) -> Result<ReloadSummary, ReloadError> {
        let definition = match ZoneDefinition::from_path(path) {
            Ok(definition) => definition,
            Err(e) => {
                warn!("Failed to load zone file {}: {}", path.display(), e);
                if let Some(metrics) = &self.metrics {
                    metrics.record_reload(false);
                }
                return Err(e.into());
            }
        };
        Ok(self.apply(&definition)?)
    }

    /// Reload the configured zone file
    pub fn reload_zone_file(&self) -> Result<ReloadSummary, ReloadError> {
        let path = self.zone_file.as_deref().ok_or(ReloadError::NoZoneFile)?;
        self.reload_from_file(path)
    }

    /// Start signal handler for manual reload (SIGHUP)
    pub fn start_signal_handler(self: &Arc<Self>) {
        let coordinator = Arc::clone(self);

        tokio::spawn(async move {
            #[cfg(unix)]
            {
                use tokio::signal::unix::{SignalKind, signal};

                let mut sighup = match signal(SignalKind::hangup()) {
                    Ok(sighup) => sighup,
                    Err(e) => {
                        error!("Failed to create SIGHUP handler: {}", e);
                        return;
                    }
                };

                while sighup.recv().await.is_some() {
                    info!("Received SIGHUP, reloading zones...");
                    let coordinator = Arc::clone(&coordinator);
                    let result =
                        tokio::task::spawn_blocking(move || coordinator.reload_zone_file()).await;
                    match result {
                        Ok(Ok(_)) => {}
                        Ok(Err(e)) => error!("Failed to reload zones from SIGHUP: {}", e),
                        Err(e) => error!("Zone reload task failed: {}", e),
                    }
                }
            }

            #[cfg(not(unix))]
            {
                let _ = coordinator;
            }
        });
    }
}
