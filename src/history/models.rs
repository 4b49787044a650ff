//! Data models for the history view

use crate::backend::{HistoryWithImage, RecordStatus};
use crate::error::{RecognitionError, Result};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Client-side mirror of one backend history record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryRecord {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub image_id: String,
    pub image_url: Option<String>,
    pub model: String,
    pub result: Option<serde_json::Value>,
    pub confidence: Option<f64>,
    pub status: RecordStatus,
    pub original_file_name: Option<String>,
    pub file_size: Option<i64>,
    pub file_format: Option<String>,
    pub error_message: Option<String>,
}

impl From<HistoryWithImage> for HistoryRecord {
    fn from(pair: HistoryWithImage) -> Self {
        let HistoryWithImage { history, image } = pair;

        let timestamp = Utc
            .timestamp_millis_opt(history.created_at)
            .single()
            .unwrap_or_else(|| {
                warn!(id = %history.id, created_at = history.created_at, "Invalid record timestamp");
                DateTime::<Utc>::default()
            });

        let status = RecordStatus::parse(&history.status).unwrap_or_else(|| {
            warn!(id = %history.id, status = %history.status, "Unknown record status, treating as error");
            RecordStatus::Error
        });

        let (image_url, original_file_name, file_size, file_format) = match image {
            Some(image) => (image.image_url, image.original_file_name, image.file_size, image.format),
            None => (None, None, None, None),
        };

        Self {
            id: history.id,
            timestamp,
            image_id: history.image_id,
            image_url,
            model: history.model_name,
            result: history.result,
            confidence: history.confidence,
            status,
            original_file_name,
            file_size,
            file_format,
            error_message: history.error_message,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortBy {
    Newest,
    Oldest,
    Confidence,
}

/// Sparse filter set; `None` means no constraint
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_term: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<RecordStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_by: Option<SortBy>,
    /// First calendar day included (UTC)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    /// Last calendar day included (UTC), the whole day counts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
}

impl FilterParams {
    /// Search term with blank input treated as absent
    pub fn search(&self) -> Option<&str> {
        self.search_term.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }

    /// Model name with blank input treated as absent
    pub fn model_name(&self) -> Option<&str> {
        self.model.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }

    /// True when every record passes and the server's own order is kept
    pub fn is_unconstrained(&self) -> bool {
        self.search().is_none()
            && self.status.is_none()
            && self.model_name().is_none()
            && self.start_date.is_none()
            && self.end_date.is_none()
            && matches!(self.sort_by, None | Some(SortBy::Newest))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationParams {
    pub page: u32,
    pub limit: u32,
}

impl PaginationParams {
    /// Build pagination, rejecting `page < 1` and `limit == 0`
    pub fn new(page: u32, limit: u32) -> Result<Self> {
        if page < 1 {
            return Err(RecognitionError::Precondition("page must be at least 1".to_string()));
        }
        if limit == 0 {
            return Err(RecognitionError::Precondition("limit must be positive".to_string()));
        }
        Ok(Self { page, limit })
    }

    /// Records to skip before this page
    pub fn skip(&self) -> u32 {
        self.page.saturating_sub(1).saturating_mul(self.limit)
    }
}

impl Default for PaginationParams {
    fn default() -> Self {
        Self { page: 1, limit: 10 }
    }
}

/// Pagination plus derived totals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub total_pages: u64,
}

impl PageInfo {
    pub fn new(pagination: PaginationParams, total: u64) -> Self {
        let limit = u64::from(pagination.limit.max(1));
        Self {
            page: pagination.page,
            limit: pagination.limit,
            total,
            total_pages: (total + limit - 1) / limit,
        }
    }

    /// 1-based `(first, last)` record numbers shown on this page, `(0, 0)` when empty
    pub fn range(&self) -> (u64, u64) {
        if self.total == 0 {
            return (0, 0);
        }
        let limit = u64::from(self.limit);
        let start = u64::from(self.page.saturating_sub(1)) * limit + 1;
        let end = (u64::from(self.page) * limit).min(self.total);
        (start.min(end), end)
    }
}

/// Summary counters over the whole record population
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryStats {
    pub total: usize,
    pub success: usize,
    pub failed: usize,
    pub processing: usize,
    pub pending: usize,
    pub error: usize,
    /// Mean over records with confidence > 0; 0 when there are none
    pub avg_confidence: f64,
    pub model_distribution: IndexMap<String, usize>,
}

/// Result of a history fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The view now reflects the requested page
    Completed,
    /// Another fetch was in flight; nothing was sent
    Skipped,
    /// The list call failed; the previous records are kept
    Failed(String),
}

/// Result of a bulk delete
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteOutcome {
    pub total: usize,
    pub failed_ids: Vec<String>,
}

impl DeleteOutcome {
    pub fn success(&self) -> bool {
        self.failed_ids.is_empty()
    }

    pub fn failed_count(&self) -> usize {
        self.failed_ids.len()
    }

    pub fn deleted_count(&self) -> usize {
        self.total - self.failed_ids.len()
    }

    /// Convert to a `Result`, reporting partial failure as `PartialBatch`
    pub fn into_result(self) -> Result<usize> {
        if self.success() {
            Ok(self.total)
        } else {
            Err(RecognitionError::PartialBatch {
                failed: self.failed_count(),
                total: self.total,
            })
        }
    }
}

/// Snapshot of everything the history screen renders
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryView {
    pub records: Vec<HistoryRecord>,
    pub pagination: PageInfo,
    pub filters: FilterParams,
    pub stats: Option<HistoryStats>,
    pub loading: bool,
    pub error: Option<String>,
}
