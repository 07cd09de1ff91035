//! Data models for discount records and API configuration snapshots

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Whether a discount takes percentage points or a fixed currency amount
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiscountType {
    Percentage,
    Fixed,
}

impl std::fmt::Display for DiscountType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Percentage => write!(f, "percentage"),
            Self::Fixed => write!(f, "fixed"),
        }
    }
}

impl std::str::FromStr for DiscountType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "percentage" => Ok(Self::Percentage),
            "fixed" => Ok(Self::Fixed),
            other => Err(format!("unknown discount type: {other}")),
        }
    }
}

/// A discount record as held by the remote API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Discount {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: DiscountType,
    #[serde(deserialize_with = "number_or_numeric_string")]
    pub value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

/// Some backends send `value` as a JSON string ("15")
fn number_or_numeric_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(f64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Number(n) => Ok(n),
        Raw::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

impl Discount {
    /// Case-insensitive match against the name and, if present, the description.
    /// `needle` must already be lowercased.
    pub(crate) fn matches(&self, needle: &str) -> bool {
        self.name.to_lowercase().contains(needle)
            || self
                .description
                .as_ref()
                .is_some_and(|d| d.to_lowercase().contains(needle))
    }
}

/// Body sent on create and update
#[derive(Debug, Clone, Serialize)]
pub struct DiscountPayload {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: DiscountType,
    pub value: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Per-type record counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TypeCounts {
    pub percentage: usize,
    pub fixed: usize,
}

/// Aggregate statistics over the records held by the store
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscountStats {
    pub total: usize,
    pub by_type: TypeCounts,
}

impl DiscountStats {
    /// Full recount over a record list
    pub fn from_records(records: &[Discount]) -> Self {
        let percentage = records
            .iter()
            .filter(|d| d.kind == DiscountType::Percentage)
            .count();

        Self {
            total: records.len(),
            by_type: TypeCounts {
                percentage,
                fixed: records.len() - percentage,
            },
        }
    }

    pub(crate) fn add(&mut self, kind: DiscountType) {
        self.total += 1;
        *self.bucket(kind) += 1;
    }

    pub(crate) fn subtract(&mut self, kind: DiscountType) {
        self.total = self.total.saturating_sub(1);
        let bucket = self.bucket(kind);
        *bucket = bucket.saturating_sub(1);
    }

    pub(crate) fn retype(&mut self, from: DiscountType, to: DiscountType) {
        if from == to {
            return;
        }
        let old = self.bucket(from);
        *old = old.saturating_sub(1);
        *self.bucket(to) += 1;
    }

    fn bucket(&mut self, kind: DiscountType) -> &mut usize {
        match kind {
            DiscountType::Percentage => &mut self.by_type.percentage,
            DiscountType::Fixed => &mut self.by_type.fixed,
        }
    }
}

/// Effective connection settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiConfig {
    pub base_url: String,
    pub token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_url: Option<String>,
}

/// Requested configuration change, applied by `DiscountStore::update_api_config`
#[derive(Debug, Clone, Default)]
pub struct ApiConfigUpdate {
    pub base_url: Option<String>,
    pub token: Option<String>,
    pub full_url: Option<String>,
}

/// Outcome of a connection probe. Never an error: failures are reported in-band.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionTest {
    pub success: bool,
    pub status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<serde_json::Value>,
    pub message: String,
}
