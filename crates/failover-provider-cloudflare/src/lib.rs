// # Cloudflare Record Store
//
// This crate provides a Cloudflare-backed `RecordStore` for the failover controller.
//
// ## Implementation Status
//
// - ✅ One HTTP request per trait call
// - ✅ Full error propagation (the watch loop's next tick is the retry)
// - ✅ HTTP timeout configured (30 seconds)
// - ✅ Specific error handling for HTTP status codes (401/403, 404, 409, 429, 5xx)
// - ✅ API token or global key (email + key) authentication
// - ✅ Dry-run mode for safe rehearsals
// - ✅ Both A and AAAA records
// - ❌ NO retry logic (owned by the watch loop)
// - ❌ NO caching (the synchronizer re-reads before every write)
// - ❌ NO background tasks
//
// ## Security Requirements
//
// - Credentials NEVER appear in logs or Debug output
// - Credentials MUST be provided via environment variables only
// - The store MUST fail fast on empty credentials
//
// ## API Reference
//
// - Cloudflare API v4: https://developers.cloudflare.com/api/
// - List Zones: GET `/zones?name=...`
// - List DNS Records: GET `/zones/:zone_id/dns_records?type=...&name=...&match=all`
// - Create DNS Record: POST `/zones/:zone_id/dns_records`
// - Patch DNS Record: PATCH `/zones/:zone_id/dns_records/:record_id`
// - Delete DNS Record: DELETE `/zones/:zone_id/dns_records/:record_id`

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use failover_core::config::RecordStoreConfig;
use failover_core::model::{Family, ZoneRecord};
use failover_core::registry::StoreRegistry;
use failover_core::traits::{RecordStore, RecordStoreFactory};
use failover_core::{Error, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Cloudflare API base URL
const CLOUDFLARE_API_BASE: &str = "https://api.cloudflare.com/client/v4";

/// Default HTTP timeout for API requests (30 seconds)
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// TTL value meaning "automatic"
const AUTO_TTL: u32 = 1;

/// Environment variable selecting dry-run mode (`FAILOVER_MODE=dry-run`)
pub const MODE_ENV: &str = "FAILOVER_MODE";

/// Cloudflare API credentials
#[derive(Clone)]
pub enum Credentials {
    /// Scoped API token (Zone:DNS:Edit)
    Token(String),
    /// Account email with the global API key
    GlobalKey { email: String, key: String },
}

impl Credentials {
    fn validate(&self) -> Result<()> {
        match self {
            Credentials::Token(token) if token.is_empty() => {
                Err(Error::config("Cloudflare API token cannot be empty"))
            }
            Credentials::GlobalKey { email, key } if email.is_empty() || key.is_empty() => Err(
                Error::config("Cloudflare email and API key cannot be empty"),
            ),
            _ => Ok(()),
        }
    }

    fn apply(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self {
            Credentials::Token(token) => request.bearer_auth(token),
            Credentials::GlobalKey { email, key } => request
                .header("X-Auth-Email", email)
                .header("X-Auth-Key", key),
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Credentials::Token(_) => "token",
            Credentials::GlobalKey { .. } => "global-key",
        }
    }
}

// Custom Debug implementation that hides the secrets
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Credentials").field(&self.kind()).finish()
    }
}

/// Cloudflare API v4 response envelope
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    success: bool,
    #[serde(default)]
    errors: Vec<ApiMessage>,
    result: Option<T>,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct Zone {
    id: String,
}

#[derive(Debug, Deserialize)]
struct DnsRecord {
    id: String,
    content: String,
    modified_on: DateTime<Utc>,
}

impl From<DnsRecord> for ZoneRecord {
    fn from(record: DnsRecord) -> Self {
        ZoneRecord {
            id: record.id,
            content: record.content,
            last_modified: record.modified_on,
        }
    }
}

#[derive(Debug, Deserialize)]
struct DeletedRecord {
    #[allow(dead_code)]
    id: String,
}

#[derive(Debug, Serialize)]
struct NewRecord<'a> {
    #[serde(rename = "type")]
    record_type: &'a str,
    name: &'a str,
    content: &'a str,
    ttl: u32,
    proxied: bool,
}

#[derive(Debug, Serialize)]
struct ContentPatch<'a> {
    content: &'a str,
}

/// Cloudflare record store
///
/// # Trust Level: Untrusted
///
/// This store is isolated, stateless, and single-shot. All coordination
/// (guards, verification, scheduling) is owned by the synchronizer and the
/// watch loop.
///
/// # Dry-Run Mode
///
/// When `dry_run` is true, the store will:
/// - Perform all GET requests (zone lookup, record listing)
/// - Log the intended POST/PATCH/DELETE payload
/// - **NOT** actually modify DNS records, echoing the requested content instead
pub struct CloudflareRecordStore {
    /// ⚠️ NEVER log these values
    credentials: Credentials,

    /// API base URL, overridable for testing
    api_base: String,

    /// HTTP client for API requests
    client: reqwest::Client,

    /// Dry-run mode: if true, perform GET requests but skip writes
    dry_run: bool,
}

// Custom Debug implementation that hides the credentials
impl std::fmt::Debug for CloudflareRecordStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudflareRecordStore")
            .field("credentials", &"<REDACTED>")
            .field("api_base", &self.api_base)
            .field("dry_run", &self.dry_run)
            .finish()
    }
}

impl CloudflareRecordStore {
    /// Create a new Cloudflare record store
    ///
    /// # Security
    ///
    /// Credentials will NEVER be logged or displayed in error messages.
    pub fn new(credentials: Credentials, dry_run: bool) -> Result<Self> {
        credentials.validate()?;

        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::http(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            credentials,
            api_base: CLOUDFLARE_API_BASE.to_string(),
            client,
            dry_run,
        })
    }

    /// Create a store in live mode
    pub fn new_live(credentials: Credentials) -> Result<Self> {
        Self::new(credentials, false)
    }

    /// Create a store in dry-run mode
    pub fn new_dry_run(credentials: Credentials) -> Result<Self> {
        Self::new(credentials, true)
    }

    /// Point the store at a different API base URL
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    fn record_url(&self, zone_id: &str, record_id: &str) -> String {
        format!("{}/zones/{}/dns_records/{}", self.api_base, zone_id, record_id)
    }

    /// Send an authenticated request and unwrap the response envelope
    async fn send<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        context: &str,
    ) -> Result<T> {
        let response = self
            .credentials
            .apply(request)
            .header("Content-Type", "application/json")
            .send()
            .await
            .map_err(|e| Error::provider("cloudflare", format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());
            return Err(status_error(status, &error_text, context));
        }

        let envelope: ApiResponse<T> = response.json().await.map_err(|e| {
            Error::provider("cloudflare", format!("Failed to parse response: {}", e))
        })?;

        if !envelope.success {
            return Err(Error::provider(
                "cloudflare",
                format!("{} rejected: {}", context, describe_errors(&envelope.errors)),
            ));
        }

        envelope.result.ok_or_else(|| {
            Error::provider(
                "cloudflare",
                format!("Invalid response format: {} returned no result", context),
            )
        })
    }
}

#[async_trait]
impl RecordStore for CloudflareRecordStore {
    /// Look up the zone for `domain`; exactly one zone must match
    ///
    /// ```http
    /// GET /zones?name=example.com
    /// ```
    async fn find_zone(&self, domain: &str) -> Result<String> {
        tracing::debug!("Looking up zone ID for domain: {}", domain);

        let request = self
            .client
            .get(format!("{}/zones", self.api_base))
            .query(&[("name", domain)]);
        let zones: Vec<Zone> = self.send(request, "Zone lookup").await?;

        match zones.as_slice() {
            [zone] => {
                tracing::debug!("Found zone ID: {}", zone.id);
                Ok(zone.id.clone())
            }
            [] => Err(Error::not_found(format!("Zone not found: {}", domain))),
            _ => Err(Error::provider(
                "cloudflare",
                format!("{} zones match {}, expected exactly one", zones.len(), domain),
            )),
        }
    }

    /// ```http
    /// GET /zones/:zone_id/dns_records?type=A&name=www.example.com&match=all
    /// ```
    async fn list_records(
        &self,
        zone_id: &str,
        fqdn: &str,
        family: Family,
    ) -> Result<Vec<ZoneRecord>> {
        tracing::debug!("Listing {} records for {}", family.record_type(), fqdn);

        let request = self
            .client
            .get(format!("{}/zones/{}/dns_records", self.api_base, zone_id))
            .query(&[
                ("type", family.record_type()),
                ("name", fqdn),
                ("match", "all"),
            ]);
        let records: Vec<DnsRecord> = self.send(request, "Record lookup").await?;

        Ok(records.into_iter().map(ZoneRecord::from).collect())
    }

    /// ```http
    /// POST /zones/:zone_id/dns_records
    /// {"type": "AAAA", "name": "example.com", "content": "2001:db8::1", "ttl": 1, "proxied": false}
    /// ```
    async fn create_record(
        &self,
        zone_id: &str,
        fqdn: &str,
        family: Family,
        content: &str,
    ) -> Result<ZoneRecord> {
        let payload = NewRecord {
            record_type: family.record_type(),
            name: fqdn,
            content,
            ttl: AUTO_TTL,
            proxied: false,
        };

        if self.dry_run {
            tracing::info!(
                "[DRY-RUN] Would send POST request to {}/zones/{}/dns_records with payload: {}",
                self.api_base,
                zone_id,
                serde_json::to_string(&payload)?
            );
            return Ok(dry_run_echo("dry-run", content));
        }

        let request = self
            .client
            .post(format!("{}/zones/{}/dns_records", self.api_base, zone_id))
            .json(&payload);
        let record: DnsRecord = self.send(request, "Record creation").await?;

        Ok(record.into())
    }

    /// ```http
    /// PATCH /zones/:zone_id/dns_records/:record_id
    /// {"content": "10.0.0.12"}
    /// ```
    async fn update_record(
        &self,
        zone_id: &str,
        record_id: &str,
        content: &str,
    ) -> Result<ZoneRecord> {
        let url = self.record_url(zone_id, record_id);
        let payload = ContentPatch { content };

        if self.dry_run {
            tracing::info!(
                "[DRY-RUN] Would send PATCH request to {} with payload: {}",
                url,
                serde_json::to_string(&payload)?
            );
            return Ok(dry_run_echo(record_id, content));
        }

        let request = self.client.patch(url).json(&payload);
        let record: DnsRecord = self.send(request, "Record update").await?;

        Ok(record.into())
    }

    /// ```http
    /// DELETE /zones/:zone_id/dns_records/:record_id
    /// ```
    async fn delete_record(&self, zone_id: &str, record_id: &str) -> Result<()> {
        let url = self.record_url(zone_id, record_id);

        if self.dry_run {
            tracing::info!("[DRY-RUN] Would send DELETE request to {}", url);
            return Ok(());
        }

        let request = self.client.delete(url);
        let _: DeletedRecord = self.send(request, "Record deletion").await?;

        Ok(())
    }

    fn store_name(&self) -> &'static str {
        "cloudflare"
    }
}

/// Map a non-2xx status to an error
fn status_error(status: reqwest::StatusCode, error_text: &str, context: &str) -> Error {
    match status.as_u16() {
        401 | 403 => Error::auth(format!(
            "Invalid credentials or insufficient permissions. Status: {}",
            status
        )),
        404 => Error::not_found(format!("{}: {}", context, status)),
        409 => Error::provider(
            "cloudflare",
            format!("Conflict: Record is being updated by another process. Status: {}", status),
        ),
        429 => Error::rate_limited(format!("Please retry later. Status: {}", status)),
        500..=599 => Error::provider(
            "cloudflare",
            format!("Cloudflare server error (transient): {} - {}", status, error_text),
        ),
        _ => Error::provider(
            "cloudflare",
            format!("{} failed: {} - {}", context, status, error_text),
        ),
    }
}

fn describe_errors(errors: &[ApiMessage]) -> String {
    if errors.is_empty() {
        return "no error details".to_string();
    }
    errors
        .iter()
        .map(|e| format!("[{}] {}", e.code, e.message))
        .collect::<Vec<_>>()
        .join("; ")
}

/// What a live store would echo for a successful write
fn dry_run_echo(id: &str, content: &str) -> ZoneRecord {
    ZoneRecord {
        id: id.to_string(),
        content: content.to_string(),
        last_modified: Utc::now(),
    }
}

/// Whether `FAILOVER_MODE` selects dry-run
pub fn dry_run_from_env() -> bool {
    std::env::var(MODE_ENV)
        .map(|mode| mode.eq_ignore_ascii_case("dry-run"))
        .unwrap_or(false)
}

/// Factory for creating Cloudflare record stores
pub struct CloudflareFactory;

impl CloudflareFactory {
    fn credentials(
        api_token: &Option<String>,
        email: &Option<String>,
        api_key: &Option<String>,
    ) -> Result<Credentials> {
        let non_empty = |value: &Option<String>| value.clone().filter(|v| !v.is_empty());

        if let Some(token) = non_empty(api_token) {
            return Ok(Credentials::Token(token));
        }
        match (non_empty(email), non_empty(api_key)) {
            (Some(email), Some(key)) => Ok(Credentials::GlobalKey { email, key }),
            _ => Err(Error::config(
                "Cloudflare requires an API token or an email and API key",
            )),
        }
    }
}

impl RecordStoreFactory for CloudflareFactory {
    fn create(&self, config: &RecordStoreConfig) -> Result<Box<dyn RecordStore>> {
        match config {
            RecordStoreConfig::Cloudflare {
                api_token,
                email,
                api_key,
                ..
            } => {
                let credentials = Self::credentials(api_token, email, api_key)?;

                let dry_run = dry_run_from_env();
                if dry_run {
                    tracing::warn!(
                        "Cloudflare record store running in DRY-RUN mode - no changes will be made"
                    );
                }

                Ok(Box::new(CloudflareRecordStore::new(credentials, dry_run)?))
            }
            _ => Err(Error::config("Invalid config for Cloudflare record store")),
        }
    }
}

/// Register the Cloudflare record store with a registry
///
/// # Example
///
/// ```rust
/// use failover_core::StoreRegistry;
///
/// let registry = StoreRegistry::new();
/// failover_provider_cloudflare::register(&registry);
/// assert!(registry.has_store("cloudflare"));
/// ```
pub fn register(registry: &StoreRegistry) {
    registry.register_store("cloudflare", Box::new(CloudflareFactory));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(value: &str) -> Credentials {
        Credentials::Token(value.to_string())
    }

    #[test]
    fn test_factory_creation() {
        let factory = CloudflareFactory;

        let config = RecordStoreConfig::Cloudflare {
            api_token: Some("test_token".to_string()),
            email: None,
            api_key: None,
            zone_id: Some("test_zone".to_string()),
        };

        let store = factory.create(&config);
        assert!(store.is_ok());
        assert_eq!(store.unwrap().store_name(), "cloudflare");
    }

    #[test]
    fn test_factory_missing_credentials() {
        let factory = CloudflareFactory;

        let config = RecordStoreConfig::Cloudflare {
            api_token: Some(String::new()),
            email: Some("ops@example.com".to_string()),
            api_key: None,
            zone_id: None,
        };

        assert!(matches!(factory.create(&config), Err(Error::Config(_))));
    }

    #[test]
    fn test_factory_prefers_token_over_global_key() {
        let credentials = CloudflareFactory::credentials(
            &Some("tok".to_string()),
            &Some("ops@example.com".to_string()),
            &Some("key".to_string()),
        )
        .unwrap();

        assert!(matches!(credentials, Credentials::Token(_)));
    }

    #[test]
    fn test_empty_token_is_rejected() {
        assert!(CloudflareRecordStore::new(token(""), false).is_err());
        assert!(
            CloudflareRecordStore::new(
                Credentials::GlobalKey {
                    email: "ops@example.com".to_string(),
                    key: String::new(),
                },
                false
            )
            .is_err()
        );
    }

    #[test]
    fn test_dry_run_mode() {
        let dry = CloudflareRecordStore::new_dry_run(token("token")).unwrap();
        let live = CloudflareRecordStore::new_live(token("token")).unwrap();

        assert!(dry.is_dry_run(), "Dry-run store should have dry_run=true");
        assert!(!live.is_dry_run(), "Live store should have dry_run=false");
    }

    #[test]
    fn test_credentials_not_exposed_in_debug() {
        let store = CloudflareRecordStore::new(token("secret_token_12345"), false).unwrap();
        let debug_str = format!("{:?}", store);
        assert!(!debug_str.contains("secret_token"));
        assert!(debug_str.contains("CloudflareRecordStore"));

        let key = Credentials::GlobalKey {
            email: "ops@example.com".to_string(),
            key: "global_key_67890".to_string(),
        };
        let debug_str = format!("{:?}", key);
        assert!(!debug_str.contains("global_key_67890"));
        assert!(!debug_str.contains("ops@example.com"));
    }

    #[test]
    fn test_status_mapping() {
        use reqwest::StatusCode;

        assert!(matches!(
            status_error(StatusCode::FORBIDDEN, "", "Zone lookup"),
            Error::Authentication(_)
        ));
        assert!(matches!(
            status_error(StatusCode::NOT_FOUND, "", "Zone lookup"),
            Error::NotFound(_)
        ));
        assert!(matches!(
            status_error(StatusCode::TOO_MANY_REQUESTS, "", "Zone lookup"),
            Error::RateLimited(_)
        ));
        assert!(matches!(
            status_error(StatusCode::BAD_GATEWAY, "upstream", "Zone lookup"),
            Error::Provider { .. }
        ));
    }

    #[test]
    fn test_envelope_parsing() {
        let json = serde_json::json!({
            "success": true,
            "errors": [],
            "messages": [],
            "result": [{
                "id": "rec-1",
                "type": "A",
                "name": "example.com",
                "content": "10.0.0.11",
                "proxied": false,
                "ttl": 1,
                "modified_on": "2024-05-01T12:00:00.123456Z"
            }]
        });

        let envelope: ApiResponse<Vec<DnsRecord>> = serde_json::from_value(json).unwrap();
        let records: Vec<ZoneRecord> = envelope
            .result
            .unwrap()
            .into_iter()
            .map(ZoneRecord::from)
            .collect();

        assert!(envelope.success);
        assert_eq!(records[0].id, "rec-1");
        assert_eq!(records[0].content, "10.0.0.11");
    }

    #[tokio::test]
    async fn test_dry_run_echoes_request_without_network() {
        let store = CloudflareRecordStore::new_dry_run(token("token"))
            .unwrap()
            .with_api_base("http://127.0.0.1:9");

        let echo = store.update_record("zone", "rec-1", "10.0.0.12").await.unwrap();
        assert_eq!(echo.content, "10.0.0.12");

        let created = store
            .create_record("zone", "example.com", Family::V6, "2001:db8::1")
            .await
            .unwrap();
        assert_eq!(created.content, "2001:db8::1");

        assert!(store.delete_record("zone", "rec-1").await.is_ok());
    }
}
