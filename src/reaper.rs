use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::engine::Engine;
use crate::observability::HOLDS_REAPED_TOTAL;
use crate::store::WalStore;

/// Background task that periodically deletes expired holds. Availability never
/// depends on it; expired holds already stop blocking at read time.
pub async fn run_reaper(engine: Arc<Engine>, every: Duration) {
    let mut interval = tokio::time::interval(every);
    loop {
        interval.tick().await;
        reap_once(&engine).await;
    }
}

async fn reap_once(engine: &Engine) -> usize {
    match engine.cleanup_expired_holds().await {
        Ok(0) => 0,
        Ok(n) => {
            metrics::counter!(HOLDS_REAPED_TOTAL).increment(n as u64);
            info!("tenant {}: reaped {n} expired holds", engine.tenant_id());
            n
        }
        Err(e) => {
            warn!("tenant {}: reaper failed: {e}", engine.tenant_id());
            0
        }
    }
}

/// Background task that rewrites the WAL as a snapshot once enough appends
/// have piled up since the last compaction.
pub async fn run_compactor(store: Arc<WalStore>, threshold: u64) {
    let mut interval = tokio::time::interval(Duration::from_secs(30));
    loop {
        interval.tick().await;
        compact_if_needed(&store, threshold).await;
    }
}

async fn compact_if_needed(store: &WalStore, threshold: u64) -> bool {
    let appends = store.appends_since_compact().await;
    if appends < threshold {
        return false;
    }
    match store.compact().await {
        Ok(kept) => {
            info!("compacted WAL: {appends} appends -> {kept} records");
            true
        }
        Err(e) => {
            debug!("compaction skipped: {e}");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::model::*;
    use chrono::{Duration as ChronoDuration, NaiveDate, NaiveTime};
    use std::path::PathBuf;
    use ulid::Ulid;

    fn test_wal_path(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("chairtime_test_reaper_{}", Ulid::new()));
        std::fs::create_dir_all(&dir).unwrap();
        dir.join(name)
    }

    fn monday_at(h: u32) -> chrono::NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 10, 19)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    async fn seeded(path: &PathBuf, clock: Arc<FixedClock>) -> (Arc<WalStore>, Engine, HoldRequest) {
        let store = Arc::new(WalStore::open("salon", path).unwrap());
        let engine = Engine::new(store.clone(), clock);
        let staff = Ulid::new();
        let service = ServiceBookingPolicy {
            id: Ulid::new(),
            tenant_id: String::new(),
            duration_minutes: 60,
            min_advance_hours: 0,
            max_advance_days: 30,
            buffer_time_before: 0,
            buffer_time_after: 0,
        };
        let service_id = service.id;
        engine.save_staff(staff, "Mina".into(), true).await.unwrap();
        engine.save_service(service).await.unwrap();
        engine
            .save_assignment(staff, service_id, true, None)
            .await
            .unwrap();
        let open = NaiveTime::from_hms_opt(9, 0, 0).unwrap();
        let close = NaiveTime::from_hms_opt(17, 0, 0).unwrap();
        engine
            .save_schedule(Ulid::new(), staff, 1, open, close, true)
            .await
            .unwrap();
        let req = HoldRequest {
            session_id: "s1".into(),
            staff_id: staff,
            service_id,
            date: monday_at(0).date(),
            time: NaiveTime::from_hms_opt(14, 0, 0).unwrap(),
            duration_minutes: 60,
            client_id: None,
        };
        (store, engine, req)
    }

    #[tokio::test]
    async fn reaper_removes_expired_holds() {
        let path = test_wal_path("reaper_collect.wal");
        let clock = Arc::new(FixedClock::new(monday_at(9)));
        let (_store, engine, req) = seeded(&path, clock.clone()).await;

        let hold = engine.hold_slot(req).await.unwrap();
        assert_eq!(reap_once(&engine).await, 0);

        clock.advance(ChronoDuration::minutes(HOLD_TTL_MINUTES));
        assert_eq!(reap_once(&engine).await, 1);
        assert!(engine.store().get_hold(hold.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn compactor_waits_for_threshold() {
        let path = test_wal_path("compactor.wal");
        let clock = Arc::new(FixedClock::new(monday_at(9)));
        let (store, engine, req) = seeded(&path, clock).await;
        for i in 0..5 {
            engine
                .hold_slot(HoldRequest {
                    session_id: format!("s{i}"),
                    ..req.clone()
                })
                .await
                .ok();
        }

        assert!(!compact_if_needed(&store, 1000).await);
        let before = std::fs::metadata(&path).unwrap().len();
        assert!(compact_if_needed(&store, 3).await);
        let after = std::fs::metadata(&path).unwrap().len();
        assert!(after <= before);
        assert_eq!(store.appends_since_compact().await, 0);
    }
}
