// # Memory Record Store
//
// In-memory implementation of RecordStore.
//
// ## Purpose
//
// Provides a record store that behaves like a remote provider (ids,
// modification times, echoed content) without any network access.
// Useful for testing the synchronizer and the watch loop, and for
// rehearsing a configuration before pointing it at a real zone.
//
// ## Fault Injection
//
// - `set_echo_override`: answer writes with different content than requested
// - `fail_writes_for`: make every write to one FQDN fail
// - `backdate`: age every record, as if the cooldown window had passed

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;

use crate::Error;
use crate::model::{Family, ZoneRecord};
use crate::traits::RecordStore;

#[derive(Debug, Clone)]
struct StoredRecord {
    fqdn: String,
    family: Family,
    content: String,
    last_modified: DateTime<Utc>,
}

impl StoredRecord {
    fn to_zone_record(&self, id: &str) -> ZoneRecord {
        ZoneRecord {
            id: id.to_string(),
            content: self.content.clone(),
            last_modified: self.last_modified,
        }
    }
}

#[derive(Debug, Default)]
struct Inner {
    records: BTreeMap<String, StoredRecord>,
    next_id: u64,
    echo_override: Option<String>,
    failing: HashSet<String>,
}

#[derive(Debug, Default)]
struct Counters {
    find_zone: AtomicUsize,
    list: AtomicUsize,
    create: AtomicUsize,
    update: AtomicUsize,
    delete: AtomicUsize,
}

/// In-memory record store for a single zone
///
/// Clones share the same records and counters.
///
/// # Example
///
/// ```rust,no_run
/// use failover_core::store::MemoryRecordStore;
/// use failover_core::Family;
///
/// #[tokio::main]
/// async fn main() {
///     let store = MemoryRecordStore::new("example.com");
///     store.seed("example.com", Family::V4, "10.0.0.11").await;
///     assert_eq!(store.contents("example.com", Family::V4).await, vec!["10.0.0.11"]);
/// }
/// ```
#[derive(Debug, Clone)]
pub struct MemoryRecordStore {
    domain: Arc<str>,
    zone_id: Arc<str>,
    inner: Arc<RwLock<Inner>>,
    counters: Arc<Counters>,
}

impl MemoryRecordStore {
    /// Create an empty zone for `domain`
    pub fn new(domain: &str) -> Self {
        Self {
            domain: Arc::from(domain),
            zone_id: Arc::from(format!("memory-{}", domain).as_str()),
            inner: Arc::new(RwLock::new(Inner::default())),
            counters: Arc::new(Counters::default()),
        }
    }

    /// Zone id answered by `find_zone`
    pub fn zone_id(&self) -> &str {
        &self.zone_id
    }

    /// Insert a record modified long ago (outside any cooldown window)
    pub async fn seed(&self, fqdn: &str, family: Family, content: &str) -> String {
        self.seed_at(fqdn, family, content, DateTime::<Utc>::UNIX_EPOCH)
            .await
    }

    /// Insert a record with an explicit modification time
    pub async fn seed_at(
        &self,
        fqdn: &str,
        family: Family,
        content: &str,
        last_modified: DateTime<Utc>,
    ) -> String {
        let mut guard = self.inner.write().await;
        insert(&mut guard, fqdn, family, content, last_modified)
    }

    /// Contents of all records for a name and family, in id order
    pub async fn contents(&self, fqdn: &str, family: Family) -> Vec<String> {
        let guard = self.inner.read().await;
        guard
            .records
            .values()
            .filter(|r| r.fqdn == fqdn && r.family == family)
            .map(|r| r.content.clone())
            .collect()
    }

    /// Number of records held
    pub async fn len(&self) -> usize {
        self.inner.read().await.records.len()
    }

    /// Check if the zone is empty
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.records.is_empty()
    }

    /// Shift every record's modification time into the past
    pub async fn backdate(&self, by: Duration) {
        let by = chrono::Duration::from_std(by).unwrap_or_else(|_| chrono::Duration::days(36_500));
        let mut guard = self.inner.write().await;
        for record in guard.records.values_mut() {
            record.last_modified = record
                .last_modified
                .checked_sub_signed(by)
                .unwrap_or(DateTime::<Utc>::MIN_UTC);
        }
    }

    /// Echo `content` for every subsequent create/update instead of the request
    pub async fn set_echo_override(&self, content: Option<&str>) {
        self.inner.write().await.echo_override = content.map(str::to_string);
    }

    /// Fail every subsequent write to `fqdn`
    pub async fn fail_writes_for(&self, fqdn: &str) {
        self.inner.write().await.failing.insert(fqdn.to_string());
    }

    pub fn find_zone_count(&self) -> usize {
        self.counters.find_zone.load(Ordering::SeqCst)
    }

    pub fn list_count(&self) -> usize {
        self.counters.list.load(Ordering::SeqCst)
    }

    pub fn create_count(&self) -> usize {
        self.counters.create.load(Ordering::SeqCst)
    }

    pub fn update_count(&self) -> usize {
        self.counters.update.load(Ordering::SeqCst)
    }

    pub fn delete_count(&self) -> usize {
        self.counters.delete.load(Ordering::SeqCst)
    }

    /// Creates, updates and deletes combined
    pub fn write_count(&self) -> usize {
        self.create_count() + self.update_count() + self.delete_count()
    }

    fn check_zone(&self, zone_id: &str) -> Result<(), Error> {
        if zone_id != &*self.zone_id {
            return Err(Error::not_found(format!("Zone not found: {}", zone_id)));
        }
        Ok(())
    }
}

fn insert(
    inner: &mut Inner,
    fqdn: &str,
    family: Family,
    content: &str,
    last_modified: DateTime<Utc>,
) -> String {
    inner.next_id += 1;
    let id = format!("rec-{:04}", inner.next_id);
    inner.records.insert(
        id.clone(),
        StoredRecord {
            fqdn: fqdn.to_string(),
            family,
            content: content.to_string(),
            last_modified,
        },
    );
    id
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn find_zone(&self, domain: &str) -> Result<String, Error> {
        self.counters.find_zone.fetch_add(1, Ordering::SeqCst);
        if domain != &*self.domain {
            return Err(Error::not_found(format!("Zone not found: {}", domain)));
        }
        Ok(self.zone_id.to_string())
    }

    async fn list_records(
        &self,
        zone_id: &str,
        fqdn: &str,
        family: Family,
    ) -> Result<Vec<ZoneRecord>, Error> {
        self.counters.list.fetch_add(1, Ordering::SeqCst);
        self.check_zone(zone_id)?;
        let guard = self.inner.read().await;
        Ok(guard
            .records
            .iter()
            .filter(|(_, r)| r.fqdn == fqdn && r.family == family)
            .map(|(id, r)| r.to_zone_record(id))
            .collect())
    }

    async fn create_record(
        &self,
        zone_id: &str,
        fqdn: &str,
        family: Family,
        content: &str,
    ) -> Result<ZoneRecord, Error> {
        self.counters.create.fetch_add(1, Ordering::SeqCst);
        self.check_zone(zone_id)?;
        let mut guard = self.inner.write().await;
        if guard.failing.contains(fqdn) {
            return Err(Error::provider("memory", format!("Write to {} rejected", fqdn)));
        }
        let stored = guard.echo_override.clone().unwrap_or_else(|| content.to_string());
        let id = insert(&mut guard, fqdn, family, &stored, Utc::now());
        Ok(guard.records[&id].to_zone_record(&id))
    }

    async fn update_record(
        &self,
        zone_id: &str,
        record_id: &str,
        content: &str,
    ) -> Result<ZoneRecord, Error> {
        self.counters.update.fetch_add(1, Ordering::SeqCst);
        self.check_zone(zone_id)?;
        let mut guard = self.inner.write().await;
        let echo = guard.echo_override.clone();
        let failing = guard
            .records
            .get(record_id)
            .is_some_and(|r| guard.failing.contains(&r.fqdn));
        if failing {
            return Err(Error::provider("memory", format!("Write to {} rejected", record_id)));
        }
        let record = guard
            .records
            .get_mut(record_id)
            .ok_or_else(|| Error::not_found(format!("DNS record not found: {}", record_id)))?;
        // An override simulates a store that accepted the write without applying it
        if echo.is_none() {
            record.content = content.to_string();
            record.last_modified = Utc::now();
        }
        let mut answer = record.to_zone_record(record_id);
        if let Some(echo) = echo {
            answer.content = echo;
        }
        Ok(answer)
    }

    async fn delete_record(&self, zone_id: &str, record_id: &str) -> Result<(), Error> {
        self.counters.delete.fetch_add(1, Ordering::SeqCst);
        self.check_zone(zone_id)?;
        let mut guard = self.inner.write().await;
        let failing = guard
            .records
            .get(record_id)
            .is_some_and(|r| guard.failing.contains(&r.fqdn));
        if failing {
            return Err(Error::provider("memory", format!("Delete of {} rejected", record_id)));
        }
        guard
            .records
            .remove(record_id)
            .map(|_| ())
            .ok_or_else(|| Error::not_found(format!("DNS record not found: {}", record_id)))
    }

    fn store_name(&self) -> &'static str {
        "memory"
    }
}
