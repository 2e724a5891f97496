//! Usage Analytics Module
//!
//! Runs the usage queries against the warehouse and memoizes the results:
//! - Catalog + usage counts for a (windows, schema) selection
//! - Per-user counts for one data product
//!
//! # Caching
//!
//! Results are kept in bounded LRU maps for a fixed TTL (one hour by
//! default). The cache is shared by every session. Concurrent misses for the
//! same key each query the warehouse; the last writer wins.

use chrono::{DateTime, Utc};
use dpusage_core::query_builder::{
    build_usage_query, build_user_usage_query, map_usage_row, map_user_row, UsageQuery,
};
use dpusage_core::validation::{validate_object_name, validate_windows};
use dpusage_core::{Result, SchemaChoice, UsageRow, UserUsageRow};
use dpusage_storage::WarehouseBackend;
use lru::LruCache;
use parking_lot::Mutex;
use rusqlite::Connection;
use std::hash::Hash;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Default time a cached result stays valid
pub const DEFAULT_CACHE_TTL_SECS: u64 = 3600;

/// Default number of cached results per cache
pub const DEFAULT_CACHE_CAPACITY: usize = 64;

// ===== Query Execution =====

/// Run the catalog + usage aggregation
pub fn load_usage_data(conn: &Connection, query: &UsageQuery) -> Result<Vec<UsageRow>> {
    let built = build_usage_query(query)?;
    let mut stmt = conn.prepare(&built.sql)?;
    let rows = stmt
        .query_map(rusqlite::params_from_iter(built.params.iter()), |row| {
            map_usage_row(row, &built.windows)
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    debug!(
        schema = %query.schema,
        windows = ?built.windows,
        rows = rows.len(),
        "Loaded usage data"
    );
    Ok(rows)
}

/// Run the per-user drill-down for one object
pub fn load_user_data(
    conn: &Connection,
    object_name: &str,
    now: DateTime<Utc>,
) -> Result<Vec<UserUsageRow>> {
    let built = build_user_usage_query(object_name, now)?;
    let mut stmt = conn.prepare(&built.sql)?;
    let rows = stmt
        .query_map(rusqlite::params_from_iter(built.params.iter()), map_user_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    debug!(object = %object_name, users = rows.len(), "Loaded user data");
    Ok(rows)
}

// ===== Memo Cache =====

/// Bounded LRU map whose entries expire a fixed time after insertion
pub struct TtlCache<K: Hash + Eq, V: Clone> {
    entries: Mutex<LruCache<K, (Instant, V)>>,
    ttl: Duration,
}

impl<K: Hash + Eq, V: Clone> TtlCache<K, V> {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            ttl,
        }
    }

    /// Fresh value for `key`; expired entries are dropped on the way
    pub fn get(&self, key: &K) -> Option<V> {
        let mut entries = self.entries.lock();
        let hit = entries
            .get(key)
            .map(|(stored_at, value)| (stored_at.elapsed() < self.ttl, value.clone()));

        match hit {
            Some((true, value)) => Some(value),
            Some((false, _)) => {
                entries.pop(key);
                None
            }
            None => None,
        }
    }

    pub fn insert(&self, key: K, value: V) {
        self.entries.lock().put(key, (Instant::now(), value));
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

/// Cache key of a usage result
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UsageCacheKey {
    pub windows: Vec<u32>,
    pub schema: SchemaChoice,
}

// ===== Service =====

/// Cached access to the warehouse for the HTTP handlers
pub struct UsageService<B: WarehouseBackend> {
    backend: Arc<B>,
    database: String,
    usage_cache: TtlCache<UsageCacheKey, Arc<Vec<UsageRow>>>,
    user_cache: TtlCache<String, Arc<Vec<UserUsageRow>>>,
}

impl<B: WarehouseBackend> UsageService<B> {
    pub fn new(backend: Arc<B>, database: impl Into<String>) -> Self {
        Self::with_cache(
            backend,
            database,
            DEFAULT_CACHE_CAPACITY,
            Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
        )
    }

    pub fn with_cache(
        backend: Arc<B>,
        database: impl Into<String>,
        capacity: usize,
        ttl: Duration,
    ) -> Self {
        Self {
            backend,
            database: database.into(),
            usage_cache: TtlCache::new(capacity, ttl),
            user_cache: TtlCache::new(capacity, ttl),
        }
    }

    /// Usage rows for a selection, served from cache while fresh
    pub fn usage(&self, windows: &[u32], schema: SchemaChoice) -> Result<Arc<Vec<UsageRow>>> {
        let key = UsageCacheKey {
            windows: validate_windows(windows)?,
            schema,
        };

        if let Some(rows) = self.usage_cache.get(&key) {
            debug!(schema = %schema, windows = ?key.windows, "Usage cache hit");
            return Ok(rows);
        }

        let query = UsageQuery::new(key.windows.clone(), schema).with_database(&self.database);
        let conn = self.backend.get_connection()?;
        let rows = Arc::new(load_usage_data(&conn, &query)?);

        info!(
            schema = %schema,
            windows = ?key.windows,
            rows = rows.len(),
            "Queried warehouse for usage"
        );
        self.usage_cache.insert(key, Arc::clone(&rows));
        Ok(rows)
    }

    /// Per-user counts for one object, served from cache while fresh
    pub fn users(&self, object_name: &str) -> Result<Arc<Vec<UserUsageRow>>> {
        validate_object_name(object_name)?;

        if let Some(rows) = self.user_cache.get(&object_name.to_string()) {
            debug!(object = %object_name, "User cache hit");
            return Ok(rows);
        }

        let conn = self.backend.get_connection()?;
        let rows = Arc::new(load_user_data(&conn, object_name, Utc::now())?);

        info!(object = %object_name, users = rows.len(), "Queried warehouse for users");
        self.user_cache
            .insert(object_name.to_string(), Arc::clone(&rows));
        Ok(rows)
    }

    /// Drop every cached result
    pub fn invalidate(&self) {
        self.usage_cache.clear();
        self.user_cache.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use dpusage_core::{record_query, register_view};
    use dpusage_storage::LocalSqliteBackend;
    use tempfile::TempDir;

    const SALES: &str = "DATAPRODUKTER.INTERNE.SALES_V1";

    fn seeded_backend() -> (TempDir, Arc<LocalSqliteBackend>) {
        let dir = tempfile::tempdir().unwrap();
        let backend = LocalSqliteBackend::new(dir.path().join("warehouse.db"));
        backend.initialize().unwrap();

        let conn = backend.get_connection().unwrap();
        register_view(&conn, "DATAPRODUKTER", "INTERNE", "SALES_V1").unwrap();
        register_view(&conn, "DATAPRODUKTER", "EKSTERNE", "PARTNER_FEED").unwrap();
        let now = Utc::now();
        record_query(&conn, SALES, "alice", "q1", now - ChronoDuration::days(2)).unwrap();
        record_query(&conn, SALES, "bob", "q2", now - ChronoDuration::days(10)).unwrap();

        (dir, Arc::new(backend))
    }

    #[test]
    fn test_ttl_cache_hit_and_expiry() {
        let cache: TtlCache<&str, i32> = TtlCache::new(4, Duration::from_secs(60));
        cache.insert("a", 1);
        assert_eq!(cache.get(&"a"), Some(1));
        assert_eq!(cache.get(&"b"), None);

        let expired: TtlCache<&str, i32> = TtlCache::new(4, Duration::ZERO);
        expired.insert("a", 1);
        assert_eq!(expired.get(&"a"), None);
        assert!(expired.is_empty());
    }

    #[test]
    fn test_ttl_cache_is_bounded() {
        let cache: TtlCache<u32, u32> = TtlCache::new(2, Duration::from_secs(60));
        cache.insert(1, 1);
        cache.insert(2, 2);
        cache.insert(3, 3);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(&1), None);
    }

    #[test]
    fn test_ttl_cache_zero_capacity_still_holds_one() {
        let cache: TtlCache<u32, u32> = TtlCache::new(0, Duration::from_secs(60));
        cache.insert(1, 1);
        assert_eq!(cache.get(&1), Some(1));
    }

    #[test]
    fn test_service_usage_counts() {
        let (_dir, backend) = seeded_backend();
        let service = UsageService::new(backend, "DATAPRODUKTER");

        let rows = service.usage(&[7, 30], SchemaChoice::Both).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].entry.full_object_name, SALES);
        assert_eq!(rows[0].last(7), 1);
        assert_eq!(rows[0].last(30), 2);
        assert_eq!(rows[1].last(30), 0);
    }

    #[test]
    fn test_service_serves_cached_rows() {
        let (_dir, backend) = seeded_backend();
        let service = UsageService::new(Arc::clone(&backend), "DATAPRODUKTER");

        let first = service.usage(&[7], SchemaChoice::Internal).unwrap();

        let conn = backend.get_connection().unwrap();
        register_view(&conn, "DATAPRODUKTER", "INTERNE", "NEW_VIEW").unwrap();

        let second = service.usage(&[7], SchemaChoice::Internal).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.len(), 1);

        service.invalidate();
        let third = service.usage(&[7], SchemaChoice::Internal).unwrap();
        assert_eq!(third.len(), 2);
    }

    #[test]
    fn test_service_duplicate_windows_share_cache_entry() {
        let (_dir, backend) = seeded_backend();
        let service = UsageService::new(backend, "DATAPRODUKTER");

        let first = service.usage(&[7, 7], SchemaChoice::Both).unwrap();
        let second = service.usage(&[7], SchemaChoice::Both).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_service_expired_cache_requeries() {
        let (_dir, backend) = seeded_backend();
        let service =
            UsageService::with_cache(backend, "DATAPRODUKTER", 8, Duration::ZERO);

        let first = service.usage(&[7], SchemaChoice::Both).unwrap();
        let second = service.usage(&[7], SchemaChoice::Both).unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(first, second);
    }

    #[test]
    fn test_service_users() {
        let (_dir, backend) = seeded_backend();
        let service = UsageService::new(backend, "DATAPRODUKTER");

        let users = service.users(SALES).unwrap();
        let names: Vec<&str> = users.iter().map(|u| u.user_name.as_str()).collect();
        assert_eq!(names, vec!["alice", "bob"]);
        assert_eq!(users[0].queries_last_7_days, 1);
        assert_eq!(users[1].queries_last_7_days, 0);

        assert!(service
            .users("DATAPRODUKTER.EKSTERNE.PARTNER_FEED")
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_service_rejects_bad_input() {
        let (_dir, backend) = seeded_backend();
        let service = UsageService::new(backend, "DATAPRODUKTER");

        assert!(service.usage(&[0], SchemaChoice::Both).is_err());
        assert!(service.users("SALES_V1").is_err());
    }

    #[test]
    fn test_service_surfaces_warehouse_errors() {
        let dir = tempfile::tempdir().unwrap();
        let config = dpusage_storage::WarehouseConfig::new(dir.path().join("missing.db"));
        let backend = Arc::new(LocalSqliteBackend::from_config(&config));
        let service = UsageService::new(backend, "DATAPRODUKTER");

        let err = service.usage(&[7], SchemaChoice::Both).unwrap_err();
        assert!(err.is_warehouse());
    }
}
