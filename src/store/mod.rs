//! # Discount Store
//!
//! Client-side view of the discount collection, kept in sync with the remote
//! API through a [`DiscountApi`] implementation.
//!
//! ## State
//!
//! - `records`: server response order, appended on create
//! - `loading`: true only while `refresh` is in flight
//! - `error`: last `refresh` failure; create/update/delete failures are
//!   returned to the caller instead
//! - `stats`: recounted on `refresh`, adjusted in place on every other mutation
//!
//! Every state change publishes a [`StoreSnapshot`] on a `watch` channel so a
//! presentation layer can re-render without polling.
//!
//! ## Degraded Mode
//!
//! When `refresh` fails because the server is unreachable or answered with
//! something that is not JSON, the store falls back to three built-in sample
//! records so the UI stays usable. The error is still recorded. Individual
//! list entries that are not discount records are skipped, not treated as a
//! failure.
//!
//! ## Name Uniqueness
//!
//! Names are unique case-insensitively. The local check runs before every
//! create/update but two in-flight requests can both pass it; a server 400 is
//! reported as the same uniqueness violation and is the final word.

use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::api::{ApiClient, DiscountApi};
use crate::config::{ConfigStore, PRIMARY_RESOURCE};
use crate::error::{ApiError, ApiResult, Operation};
use crate::models::{
    ApiConfig, ApiConfigUpdate, ConnectionTest, Discount, DiscountPayload, DiscountStats,
    DiscountType,
};

/// Immutable copy of the store state
#[derive(Debug, Clone, Default, Serialize)]
pub struct StoreSnapshot {
    pub records: Vec<Discount>,
    pub loading: bool,
    pub error: Option<String>,
    pub stats: DiscountStats,
}

pub struct DiscountStore<A: DiscountApi = ApiClient> {
    api: A,
    config: ConfigStore,
    records: Vec<Discount>,
    loading: bool,
    error: Option<String>,
    stats: DiscountStats,
    notifier: watch::Sender<StoreSnapshot>,
}

impl<A: DiscountApi> DiscountStore<A> {
    /// Creates an empty store. Call [`refresh`](Self::refresh) to populate it.
    pub fn new(api: A, config: ConfigStore) -> Self {
        let (notifier, _) = watch::channel(StoreSnapshot::default());

        Self {
            api,
            config,
            records: Vec::new(),
            loading: false,
            error: None,
            stats: DiscountStats::default(),
            notifier,
        }
    }

    pub fn records(&self) -> &[Discount] {
        &self.records
    }

    pub fn loading(&self) -> bool {
        self.loading
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn stats(&self) -> DiscountStats {
        self.stats
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        StoreSnapshot {
            records: self.records.clone(),
            loading: self.loading,
            error: self.error.clone(),
            stats: self.stats,
        }
    }

    /// Receiver that always holds the latest snapshot
    pub fn subscribe(&self) -> watch::Receiver<StoreSnapshot> {
        self.notifier.subscribe()
    }

    fn publish(&self) {
        self.notifier.send_replace(self.snapshot());
    }

    /// Replaces all records with the server's list.
    ///
    /// Never returns an error: failures land in [`error`](Self::error), and
    /// connectivity failures additionally switch to the sample dataset.
    pub async fn refresh(&mut self) {
        self.loading = true;
        self.error = None;
        self.publish();

        let result = self
            .api
            .fetch_list(&mut self.config, PRIMARY_RESOURCE, &[])
            .await
            .map(parse_records);

        match result {
            Ok(records) => {
                info!("Fetched {} discounts", records.len());
                self.replace_records(records);
            }
            Err(e) => {
                error!("Error fetching discounts: {}", e);
                self.error = Some(e.to_string());

                if e.is_connectivity() {
                    warn!("Using sample discounts while the API is unreachable");
                    self.replace_records(sample_discounts());
                }
            }
        }

        self.loading = false;
        self.publish();
    }

    fn replace_records(&mut self, records: Vec<Discount>) {
        self.stats = DiscountStats::from_records(&records);
        self.records = records;
    }

    fn name_taken(&self, name: &str, except_id: Option<&str>) -> bool {
        let name = name.to_lowercase();
        self.records
            .iter()
            .filter(|d| Some(d.id.as_str()) != except_id)
            .any(|d| d.name.to_lowercase() == name)
    }

    pub async fn create(&mut self, data: DiscountPayload) -> ApiResult<Discount> {
        if data.name.trim().is_empty() {
            return Err(ApiError::BadRequest);
        }
        if self.name_taken(&data.name, None) {
            return Err(ApiError::DuplicateName);
        }

        let created = match self.api.create(&mut self.config, PRIMARY_RESOURCE, &data).await {
            Ok(created) => created,
            Err(ApiError::BadRequest) => return Err(ApiError::DuplicateName),
            Err(e) => return Err(e.during(Operation::Create)),
        };

        info!("Created discount {} ({})", created.name, created.id);
        self.stats.add(created.kind);
        self.records.push(created.clone());
        self.publish();

        Ok(created)
    }

    pub async fn update(&mut self, id: &str, data: DiscountPayload) -> ApiResult<Discount> {
        if data.name.trim().is_empty() {
            return Err(ApiError::BadRequest);
        }
        if self.name_taken(&data.name, Some(id)) {
            return Err(ApiError::DuplicateName);
        }

        let updated = match self
            .api
            .update(&mut self.config, PRIMARY_RESOURCE, id, &data)
            .await
        {
            Ok(updated) => updated,
            Err(ApiError::BadRequest) => return Err(ApiError::DuplicateName),
            Err(e) => return Err(e.during(Operation::Update)),
        };

        if let Some(index) = self.records.iter().position(|d| d.id == id) {
            let old_kind = self.records[index].kind;
            self.stats.retype(old_kind, updated.kind);
            self.records[index] = updated.clone();
            self.publish();
        }

        info!("Updated discount {}", id);
        Ok(updated)
    }

    /// Deletes remotely, then locally. An id unknown to the store is still
    /// deleted on the server; stats are then left as they are.
    pub async fn remove(&mut self, id: &str) -> ApiResult<()> {
        let kind = self.find_by_id(id).map(|d| d.kind);

        self.api
            .remove(&mut self.config, PRIMARY_RESOURCE, id)
            .await
            .map_err(|e| e.during(Operation::Delete))?;

        if let Some(index) = self.records.iter().position(|d| d.id == id) {
            self.records.remove(index);
            if let Some(kind) = kind {
                self.stats.subtract(kind);
            }
            self.publish();
        } else {
            warn!("Deleted discount {} that was not held locally", id);
        }

        info!("Deleted discount {}", id);
        Ok(())
    }

    pub fn find_by_id(&self, id: &str) -> Option<&Discount> {
        self.records.iter().find(|d| d.id == id)
    }

    /// Case-insensitive substring match on name and description.
    /// An empty query returns every record.
    pub fn search(&self, query: &str) -> Vec<&Discount> {
        if query.is_empty() {
            return self.records.iter().collect();
        }

        let needle = query.to_lowercase();
        self.records.iter().filter(|d| d.matches(&needle)).collect()
    }

    pub async fn test_api_connection(&mut self) -> ConnectionTest {
        self.api.test_connection(&mut self.config).await
    }

    /// Applies an override URL if given, otherwise a base URL and token pair
    /// if both are non-empty, then refreshes.
    pub async fn update_api_config(&mut self, update: ApiConfigUpdate) -> ApiResult<()> {
        match update {
            ApiConfigUpdate {
                full_url: Some(full_url),
                ..
            } if !full_url.is_empty() => self.config.set_full_url(&full_url).await?,
            ApiConfigUpdate {
                base_url: Some(base_url),
                token: Some(token),
                ..
            } if !base_url.is_empty() && !token.is_empty() => {
                self.config.save(&base_url, &token).await?;
            }
            _ => warn!("Ignoring incomplete API config update"),
        }

        self.refresh().await;
        Ok(())
    }

    pub async fn reset_api_config(&mut self) -> ApiResult<()> {
        self.config.reset().await
    }

    pub fn api_config(&self) -> ApiConfig {
        self.config.get_config()
    }

    /// Stats computed straight from the server, without touching local state.
    /// Any failure is logged and yields zero counts.
    pub async fn remote_stats(&mut self) -> DiscountStats {
        let result = self
            .api
            .fetch_list(&mut self.config, PRIMARY_RESOURCE, &[])
            .await
            .map(parse_records);

        match result {
            Ok(records) => DiscountStats::from_records(&records),
            Err(e) => {
                error!("Error getting stats: {}", e);
                DiscountStats::default()
            }
        }
    }
}

/// Arrays are parsed item by item, skipping entries that are not discount
/// records; any other body counts as an empty list.
fn parse_records(body: Value) -> Vec<Discount> {
    let Value::Array(items) = body else {
        return Vec::new();
    };

    items
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<Discount>(item) {
            Ok(discount) => Some(discount),
            Err(e) => {
                warn!("Skipping unparseable discount record: {}", e);
                None
            }
        })
        .collect()
}

/// Canned records shown while the API is unreachable
pub fn sample_discounts() -> Vec<Discount> {
    let now = Utc::now();
    let sample = |id: &str, name: &str, kind, value, description: &str| Discount {
        id: id.to_string(),
        name: name.to_string(),
        kind,
        value,
        description: Some(description.to_string()),
        created_at: Some(now),
    };

    vec![
        sample(
            "1",
            "Diskon Opening",
            DiscountType::Percentage,
            15.0,
            "Diskon pembukaan toko",
        ),
        sample(
            "2",
            "Burger Hemat",
            DiscountType::Fixed,
            10000.0,
            "Diskon burger spesial",
        ),
        sample(
            "3",
            "Cheese Lover Promo",
            DiscountType::Percentage,
            20.0,
            "Promo untuk pecinta keju",
        ),
    ]
}
