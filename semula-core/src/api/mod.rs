//! REST API shared utilities (response types, pagination, filter queries)

pub mod auth;
pub mod budget;
pub mod health;
pub mod metrics;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Maximum allowed per_page value for pagination
pub(crate) const MAX_PER_PAGE: i64 = 100;

/// Pagination query parameters
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct PaginationQuery {
    #[serde(default = "default_page", deserialize_with = "deserialize_page")]
    pub page: i64,
    #[serde(
        default = "default_per_page",
        deserialize_with = "deserialize_per_page",
        alias = "limit"
    )]
    pub per_page: i64,
}

impl PaginationQuery {
    /// Rows to skip; pages past the addressable range saturate and come back empty
    pub fn offset(&self) -> u64 {
        let skipped = (self.page.max(1) as u64 - 1).saturating_mul(self.per_page.max(0) as u64);
        skipped.min(i64::MAX as u64)
    }
}

pub(crate) fn default_page() -> i64 {
    1
}

pub(crate) fn default_per_page() -> i64 {
    20
}

/// Reject page values less than 1
pub(crate) fn deserialize_page<'de, D>(deserializer: D) -> std::result::Result<i64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = i64::deserialize(deserializer)?;
    if value < 1 {
        return Err(serde::de::Error::custom(
            "page must be a positive integer (>= 1)",
        ));
    }
    Ok(value)
}

/// Reject per_page values less than 1, clamp to MAX_PER_PAGE
pub(crate) fn deserialize_per_page<'de, D>(deserializer: D) -> std::result::Result<i64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = i64::deserialize(deserializer)?;
    if value < 1 {
        return Err(serde::de::Error::custom(
            "per_page must be a positive integer (>= 1)",
        ));
    }
    Ok(value.min(MAX_PER_PAGE))
}

/// Free-text search over the uraian
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct SearchQuery {
    #[serde(default)]
    pub search: Option<String>,
}

/// Paginated response wrapper
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginatedResponse<T> {
    pub data: Vec<T>,
    pub pagination: PaginationMeta,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PaginationMeta {
    pub page: i64,
    pub per_page: i64,
    pub total: i64,
    pub total_pages: i64,
}

impl<T: Serialize> PaginatedResponse<T> {
    pub fn new(data: Vec<T>, page: i64, per_page: i64, total: i64) -> Self {
        let total_pages = (total as f64 / per_page as f64).ceil() as i64;
        Self {
            data,
            pagination: PaginationMeta {
                page,
                per_page,
                total,
                total_pages,
            },
        }
    }
}

/// Success response wrapper
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuccessResponse<T> {
    pub data: T,
}

impl<T: Serialize> SuccessResponse<T> {
    pub fn new(data: T) -> Self {
        Self { data }
    }
}

/// Message response (for delete, sign-out, etc.)
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
