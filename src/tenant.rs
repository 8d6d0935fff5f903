use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::info;

use crate::clock::{Clock, SystemClock};
use crate::engine::Engine;
use crate::limits::*;
use crate::reaper;
use crate::store::WalStore;

/// Manages per-tenant engines. Each tenant gets its own Engine + WAL + reaper.
/// Tenant = database name from the pgwire connection.
pub struct TenantManager {
    engines: DashMap<String, Arc<Engine>>,
    data_dir: PathBuf,
    compact_threshold: u64,
    reaper_interval: Duration,
    clock: Arc<dyn Clock>,
}

impl TenantManager {
    pub fn new(data_dir: PathBuf, compact_threshold: u64, reaper_interval: Duration) -> Self {
        Self::with_clock(data_dir, compact_threshold, reaper_interval, Arc::new(SystemClock))
    }

    pub fn with_clock(
        data_dir: PathBuf,
        compact_threshold: u64,
        reaper_interval: Duration,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            engines: DashMap::new(),
            data_dir,
            compact_threshold,
            reaper_interval,
            clock,
        }
    }

    /// Get or lazily create an engine for the given tenant.
    pub fn get_or_create(&self, tenant: &str) -> std::io::Result<Arc<Engine>> {
        if let Some(engine) = self.engines.get(tenant) {
            return Ok(engine.value().clone());
        }
        if tenant.len() > MAX_TENANT_NAME_LEN {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "tenant name too long",
            ));
        }
        // The name is the WAL file stem, so it must map to exactly one file
        // on every filesystem, case-insensitive ones included.
        if !is_valid_tenant_name(tenant) {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("invalid tenant name {tenant:?}: use lowercase letters, digits, '_' or '-'"),
            ));
        }
        if self.engines.len() >= MAX_TENANTS {
            return Err(std::io::Error::other("too many tenants"));
        }

        // Two connections may race to open the same tenant; the entry lock
        // makes exactly one of them replay the WAL.
        let entry = self.engines.entry(tenant.to_string());
        if let Entry::Occupied(existing) = &entry {
            return Ok(existing.get().clone());
        }

        std::fs::create_dir_all(&self.data_dir)?;
        let wal_path = self.data_dir.join(format!("{tenant}.wal"));
        let store = Arc::new(WalStore::open(tenant, &wal_path)?);
        let engine = Arc::new(Engine::new(store.clone(), self.clock.clone()));

        // Spawn reaper + compactor for this tenant
        tokio::spawn(reaper::run_reaper(engine.clone(), self.reaper_interval));
        tokio::spawn(reaper::run_compactor(store, self.compact_threshold));

        entry.or_insert(engine.clone());
        let count = self.engines.len();
        metrics::gauge!(crate::observability::TENANTS_ACTIVE).set(count as f64);
        info!("tenant {tenant}: opened {}", wal_path.display());
        Ok(engine)
    }
}

fn is_valid_tenant_name(tenant: &str) -> bool {
    !tenant.is_empty()
        && tenant
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_' || b == b'-')
}
