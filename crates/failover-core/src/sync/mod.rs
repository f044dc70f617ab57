//! Record synchronizer
//!
//! Reconciles one family's published records against a requested target.
//!
//! ## Flow
//!
//! ```text
//! load (list per name) ──► source guard (A only) ──► cooldown guard ──► apply ──► verify echo
//! ```
//!
//! | Loaded     | Target  | Action                                      |
//! |------------|---------|---------------------------------------------|
//! | not found  | address | create one record per name                  |
//! | not found  | empty   | nothing to do                               |
//! | found      | address | cooldown guard, then update (create missing) |
//! | found      | empty   | delete every loaded record, no cooldown     |
//!
//! The anchor record gates the cooldown for the whole set. Records are
//! re-read on every call; nothing is cached between cycles.

use chrono::{DateTime, Utc};
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::addr::{addr_opt_equal, address_equal, display_addr, parse_addr};
use crate::error::{Error, Result};
use crate::model::{Family, RecordName, RecordSet, ZoneRecord};
use crate::traits::RecordStore;

/// Default anti-flap window (10 minutes)
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(600);

/// A zone record together with the relative name it was loaded for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedRecord {
    pub name: RecordName,
    pub record: ZoneRecord,
}

/// Structural outcome of loading one family's records
///
/// Transport and authentication failures are the `Err` arm of the
/// surrounding `Result`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordLookup {
    /// No name in the set has a record of this family
    NotFound,
    /// At least one record exists
    Found {
        /// Loaded records, in record set order
        records: Vec<LoadedRecord>,
        /// Names in the set without a record of this family
        missing: Vec<RecordName>,
    },
}

/// What a reconciliation did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Records were created from scratch
    Created { count: usize },
    /// Existing records were rewritten; names that were missing got created
    Updated { count: usize, created: usize },
    /// Records were removed
    Deleted { count: usize },
    /// Nothing needed writing
    Unchanged,
}

/// Reconciles switch intents against a remote record store
///
/// The store is injected at construction; the zone id is either configured
/// or looked up at the start of every reconciliation.
pub struct RecordSynchronizer {
    store: Arc<dyn RecordStore>,
    domain: String,
    zone_id: Option<String>,
    cooldown: Duration,
}

impl RecordSynchronizer {
    /// Create a synchronizer for `domain` with the default cooldown
    pub fn new(store: Arc<dyn RecordStore>, domain: impl Into<String>) -> Self {
        Self {
            store,
            domain: domain.into(),
            zone_id: None,
            cooldown: DEFAULT_COOLDOWN,
        }
    }

    /// Use a pre-configured zone id instead of looking it up
    pub fn with_zone_id(mut self, zone_id: Option<String>) -> Self {
        self.zone_id = zone_id;
        self
    }

    /// Override the anti-flap window
    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// Reconcile one family of `names` towards `target`
    ///
    /// # Parameters
    ///
    /// - `names`: records to reconcile, anchor first
    /// - `family`: address family being reconciled
    /// - `source`: address the caller believes is published (A family only)
    /// - `target`: address to publish, `None` to remove the records
    pub async fn reconcile(
        &self,
        names: &RecordSet,
        family: Family,
        source: Option<IpAddr>,
        target: Option<IpAddr>,
    ) -> Result<SyncOutcome> {
        if let Some(ip) = target.filter(|ip| !family.matches(ip)) {
            return Err(Error::invalid_input(format!(
                "{} is not an {} address",
                ip, family
            )));
        }
        if family == Family::V4 && target.is_none() {
            return Err(Error::invalid_input("A records cannot be removed"));
        }

        let zone_id = self.zone().await?;
        let lookup = self.load(&zone_id, names, family).await?;

        let (records, missing) = match lookup {
            RecordLookup::NotFound => {
                if family == Family::V4 {
                    return Err(Error::not_found(format!(
                        "No A records found for {}",
                        self.domain
                    )));
                }
                return match target {
                    Some(ip) => {
                        let names: Vec<RecordName> = names.iter().cloned().collect();
                        let count = self.create_all(&zone_id, &names, family, ip).await?;
                        Ok(SyncOutcome::Created { count })
                    }
                    None => {
                        debug!("No {} records and no target, nothing to do", family.record_type());
                        Ok(SyncOutcome::Unchanged)
                    }
                };
            }
            RecordLookup::Found { records, missing } => (records, missing),
        };

        if family == Family::V4
            && let Some(expected) = source
        {
            let anchor = records
                .iter()
                .find(|loaded| loaded.name.is_anchor())
                .ok_or_else(|| {
                    Error::not_found(format!("Anchor A record missing for {}", self.domain))
                })?;
            if !addr_opt_equal(parse_addr(&anchor.record.content), Some(expected)) {
                return Err(Error::SourceMismatch {
                    expected: expected.to_string(),
                    actual: anchor.record.content.clone(),
                });
            }
        }

        let Some(ip) = target else {
            let count = self.delete_all(&zone_id, &records, family).await?;
            return Ok(SyncOutcome::Deleted { count });
        };

        self.check_cooldown(&records, Utc::now())?;

        let content = ip.to_string();
        if missing.is_empty()
            && records
                .iter()
                .all(|loaded| address_equal(&loaded.record.content, &content))
        {
            debug!(
                "{} records of {} already point to {}",
                family.record_type(),
                self.domain,
                content
            );
            return Ok(SyncOutcome::Unchanged);
        }

        self.update_all(&zone_id, &records, &missing, family, ip).await
    }

    /// Load the records of `family` for every name in the set
    pub async fn load(
        &self,
        zone_id: &str,
        names: &RecordSet,
        family: Family,
    ) -> Result<RecordLookup> {
        let mut records = Vec::with_capacity(names.len());
        let mut missing = Vec::new();

        for name in names.iter() {
            let fqdn = name.fqdn(&self.domain);
            let mut found = self.store.list_records(zone_id, &fqdn, family).await?;
            if found.len() > 1 {
                warn!(
                    "{} {} records found for {}, using the first",
                    found.len(),
                    family.record_type(),
                    fqdn
                );
            }
            if found.is_empty() {
                missing.push(name.clone());
            } else {
                records.push(LoadedRecord {
                    name: name.clone(),
                    record: found.swap_remove(0),
                });
            }
        }

        if records.is_empty() {
            return Ok(RecordLookup::NotFound);
        }
        Ok(RecordLookup::Found { records, missing })
    }

    async fn zone(&self) -> Result<String> {
        if let Some(ref zone_id) = self.zone_id {
            return Ok(zone_id.clone());
        }
        self.store.find_zone(&self.domain).await
    }

    /// The anchor gates the whole set. Without an anchor the most recently
    /// modified record gates instead.
    fn check_cooldown(&self, records: &[LoadedRecord], now: DateTime<Utc>) -> Result<()> {
        let gate = records
            .iter()
            .find(|loaded| loaded.name.is_anchor())
            .or_else(|| records.iter().max_by_key(|loaded| loaded.record.last_modified));

        let Some(gate) = gate else {
            return Ok(());
        };

        let window = chrono::Duration::from_std(self.cooldown)
            .map_err(|e| Error::config(format!("Invalid cooldown: {}", e)))?;
        let age = now.signed_duration_since(gate.record.last_modified);
        if age < window {
            return Err(Error::Cooldown {
                record: gate.name.to_string(),
                age_secs: age.num_seconds(),
                window_secs: window.num_seconds(),
            });
        }
        Ok(())
    }

    async fn create_all(
        &self,
        zone_id: &str,
        names: &[RecordName],
        family: Family,
        ip: IpAddr,
    ) -> Result<usize> {
        let content = ip.to_string();
        let mut first_error = None;
        let mut count = 0;

        for name in names {
            let fqdn = name.fqdn(&self.domain);
            let result = self
                .store
                .create_record(zone_id, &fqdn, family, &content)
                .await
                .and_then(|echo| verify(name, &content, &echo));
            match result {
                Ok(()) => {
                    info!("Created {} record {} -> {}", family.record_type(), fqdn, content);
                    count += 1;
                }
                Err(e) => record_failure(&mut first_error, &fqdn, e),
            }
        }

        first_error.map_or(Ok(count), Err)
    }

    async fn update_all(
        &self,
        zone_id: &str,
        records: &[LoadedRecord],
        missing: &[RecordName],
        family: Family,
        ip: IpAddr,
    ) -> Result<SyncOutcome> {
        let content = ip.to_string();
        let mut first_error = None;
        let mut count = 0;

        for loaded in records {
            let fqdn = loaded.name.fqdn(&self.domain);
            let result = self
                .store
                .update_record(zone_id, &loaded.record.id, &content)
                .await
                .and_then(|echo| verify(&loaded.name, &content, &echo));
            match result {
                Ok(()) => {
                    info!(
                        "Updated {} record {} -> {} (was: {})",
                        family.record_type(),
                        fqdn,
                        content,
                        loaded.record.content
                    );
                    count += 1;
                }
                Err(e) => record_failure(&mut first_error, &fqdn, e),
            }
        }

        let created = match self.create_all(zone_id, missing, family, ip).await {
            Ok(created) => created,
            Err(e) => {
                first_error.get_or_insert(e);
                0
            }
        };

        match first_error {
            Some(e) => Err(e),
            None => Ok(SyncOutcome::Updated { count, created }),
        }
    }

    async fn delete_all(
        &self,
        zone_id: &str,
        records: &[LoadedRecord],
        family: Family,
    ) -> Result<usize> {
        let mut first_error = None;
        let mut count = 0;

        for loaded in records {
            let fqdn = loaded.name.fqdn(&self.domain);
            match self.store.delete_record(zone_id, &loaded.record.id).await {
                Ok(()) => {
                    info!(
                        "Deleted {} record {} (was: {})",
                        family.record_type(),
                        fqdn,
                        loaded.record.content
                    );
                    count += 1;
                }
                Err(e) => record_failure(&mut first_error, &fqdn, e),
            }
        }

        first_error.map_or(Ok(count), Err)
    }
}

/// Compare the echoed content with what was requested
fn verify(name: &RecordName, requested: &str, echo: &ZoneRecord) -> Result<()> {
    if address_equal(&echo.content, requested) {
        return Ok(());
    }
    error!(
        "Record store did not apply {} -> {}, still {}",
        name, requested, echo.content
    );
    Err(Error::Verification {
        record: name.to_string(),
        expected: requested.to_string(),
        actual: echo.content.clone(),
    })
}

/// Keep the first failure, log the rest
fn record_failure(first_error: &mut Option<Error>, fqdn: &str, err: Error) {
    if first_error.is_some() {
        error!("Failed to write {}: {}", fqdn, err);
    } else {
        warn!("Failed to write {}: {}", fqdn, err);
        *first_error = Some(err);
    }
}

/// Render a target for logs, empty meaning "remove"
pub fn describe_target(target: Option<IpAddr>) -> String {
    match target {
        Some(_) => display_addr(target),
        None => "<none>".to_string(),
    }
}
