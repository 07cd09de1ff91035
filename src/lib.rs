//! Client-side synchronization layer for discount records served by a REST API.
//!
//! [`DiscountStore`] holds the records and derived stats, [`ApiClient`] talks
//! to the server, and [`ConfigStore`] resolves endpoint URLs from persisted
//! settings.

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod storage;
pub mod store;

pub use api::{ApiClient, DiscountApi};
pub use config::{ConfigStore, Defaults};
pub use error::{ApiError, ApiResult};
pub use models::{Discount, DiscountPayload, DiscountStats, DiscountType};
pub use store::{DiscountStore, StoreSnapshot};
