// # Record Store Trait
//
// Defines the interface for reading and mutating DNS records via provider APIs.
//
// ## Implementations
//
// - Cloudflare: `failover-provider-cloudflare` crate
// - In-memory: `failover_core::store::MemoryRecordStore` (tests, dry runs)
//
// ## Usage
//
// ```rust,ignore
// use failover_core::{Family, RecordStore};
//
// async fn show(store: &dyn RecordStore) -> failover_core::Result<()> {
//     let zone = store.find_zone("example.com").await?;
//     for record in store.list_records(&zone, "example.com", Family::V4).await? {
//         println!("{} -> {}", record.id, record.content);
//     }
//     Ok(())
// }
// ```

use async_trait::async_trait;

use crate::model::{Family, ZoneRecord};

/// Trait for record store implementations
///
/// Every method maps to exactly one provider API call.
///
/// # Thread Safety
///
/// Implementations must be thread-safe and usable across async tasks.
///
/// # Trust Level: Untrusted
///
/// Record stores are **untrusted** components with strict limitations:
///
/// ## Allowed Capabilities
/// - ✅ Perform HTTP/HTTPS API calls to their endpoints only
/// - ✅ Parse provider-specific responses
/// - ✅ Return success or failure (the watch loop retries on its next tick)
///
/// ## Forbidden Capabilities
/// - ❌ Spawn tasks or threads
/// - ❌ Implement retry logic or backoff
/// - ❌ Cache zone records between calls (the synchronizer re-reads before every write)
/// - ❌ Decide whether a write is needed (owned by `RecordSynchronizer`)
///
/// Non-2xx responses must surface as errors carrying the status description.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Look up the zone identifier for a domain
    async fn find_zone(&self, domain: &str) -> Result<String, crate::Error>;

    /// List the records of one family for a fully qualified name
    ///
    /// An empty vector means no such record exists; it is not an error.
    async fn list_records(
        &self,
        zone_id: &str,
        fqdn: &str,
        family: Family,
    ) -> Result<Vec<ZoneRecord>, crate::Error>;

    /// Create a record and return it as stored
    async fn create_record(
        &self,
        zone_id: &str,
        fqdn: &str,
        family: Family,
        content: &str,
    ) -> Result<ZoneRecord, crate::Error>;

    /// Change a record's content and return it as stored
    ///
    /// The returned content is what the synchronizer verifies against the
    /// requested value.
    async fn update_record(
        &self,
        zone_id: &str,
        record_id: &str,
        content: &str,
    ) -> Result<ZoneRecord, crate::Error>;

    /// Delete a record
    async fn delete_record(&self, zone_id: &str, record_id: &str) -> Result<(), crate::Error>;

    /// Get the store name (for logging/debugging)
    fn store_name(&self) -> &'static str;
}

/// Helper trait for constructing record stores from configuration
pub trait RecordStoreFactory: Send + Sync {
    /// Create a RecordStore instance from configuration
    fn create(
        &self,
        config: &crate::config::RecordStoreConfig,
    ) -> Result<Box<dyn RecordStore>, crate::Error>;
}
