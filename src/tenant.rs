use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use dashmap::DashMap;

use crate::config::Settings;
use crate::engine::Engine;
use crate::limits::{MAX_TENANTS, MAX_TENANT_NAME_LEN};
use crate::maintenance;
use crate::notify::NotifyHub;
use crate::observability;

/// One engine per shop, created lazily on first use. Each engine gets its
/// own WAL file and background compactor; tenants never share state.
pub struct TenantManager {
    engines: DashMap<String, Arc<Engine>>,
    data_dir: PathBuf,
    compact_threshold: u64,
}

/// Tenant names become WAL file names, so restrict them to a safe alphabet.
fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

impl TenantManager {
    pub fn new(settings: &Settings) -> Self {
        Self {
            engines: DashMap::new(),
            data_dir: settings.data_dir.clone(),
            compact_threshold: settings.compact_threshold,
        }
    }

    /// Fetch the engine for a tenant, creating it (and replaying its WAL)
    /// on first access.
    pub fn get_or_create(&self, tenant: &str) -> io::Result<Arc<Engine>> {
        if tenant.is_empty() || tenant.len() > MAX_TENANT_NAME_LEN {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "invalid tenant name",
            ));
        }
        let safe = sanitize(tenant);

        if let Some(engine) = self.engines.get(&safe) {
            return Ok(engine.value().clone());
        }
        if self.engines.len() >= MAX_TENANTS {
            return Err(io::Error::other("tenant limit reached"));
        }

        std::fs::create_dir_all(&self.data_dir)?;
        let wal_path = self.data_dir.join(format!("{safe}.wal"));

        // Double-checked under the entry lock so two racing first requests
        // build the engine exactly once.
        let engine = match self.engines.entry(safe.clone()) {
            dashmap::Entry::Occupied(e) => e.get().clone(),
            dashmap::Entry::Vacant(e) => {
                tracing::info!(tenant = %safe, wal = %wal_path.display(), "loading tenant");
                let engine = Arc::new(Engine::new(wal_path, Arc::new(NotifyHub::new()))?);
                tokio::spawn(maintenance::run_compactor(
                    engine.clone(),
                    self.compact_threshold,
                ));
                e.insert(engine.clone());
                engine
            }
        };
        // Gauge update outside the entry guard; len() takes shard locks.
        metrics::gauge!(observability::TENANTS_ACTIVE).set(self.engines.len() as f64);
        Ok(engine)
    }

    pub fn tenant_count(&self) -> usize {
        self.engines.len()
    }
}
