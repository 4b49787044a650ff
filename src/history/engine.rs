//! Paginated, filtered history view with refresh policy and bulk delete

use super::models::*;
use super::refine::refine;
use super::stats::StatsAggregator;
use crate::backend::{HistoryWithImage, RecognitionBackend, RecordStatus};
use crate::config::HistoryConfig;
use crate::error::Result;
use crate::gate::RequestGate;
use crate::metrics::METRICS;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

const FETCH_KEY: &str = "history:list";

/// Which totals to recompute beyond what a filter change implies
#[derive(Debug, Clone, Copy, Default)]
struct RefreshPolicy {
    force_total: bool,
    force_stats: bool,
}

/// Backend query chosen for a filter set
#[derive(Debug, Clone, PartialEq, Eq)]
enum QueryPlan {
    /// Server pagination; no client-side work beyond mapping
    Paged { limit: u32, skip: u32 },
    ByStatus { status: RecordStatus, limit: u32 },
    ByModel { model: String, limit: u32 },
    /// Plain list of the whole capped population, refined locally
    Population { limit: u32 },
}

impl QueryPlan {
    fn for_request(pagination: &PaginationParams, filters: &FilterParams, cap: u32) -> Self {
        if let Some(status) = filters.status {
            Self::ByStatus { status, limit: cap }
        } else if let Some(model) = filters.model_name() {
            Self::ByModel { model: model.to_string(), limit: cap }
        } else if filters.is_unconstrained() {
            Self::Paged { limit: pagination.limit, skip: pagination.skip() }
        } else {
            Self::Population { limit: cap }
        }
    }

    fn is_server_paged(&self) -> bool {
        matches!(self, Self::Paged { .. })
    }
}

/// Page of records plus the total it was cut from, when known
struct LoadedPage {
    records: Vec<HistoryRecord>,
    total: Option<u64>,
}

#[derive(Debug)]
struct HistoryState {
    records: Vec<HistoryRecord>,
    pagination: PaginationParams,
    filters: FilterParams,
    total: u64,
    stats: Option<HistoryStats>,
    /// Filters of the last completed fetch; `None` until the first load
    last_filters: Option<FilterParams>,
    loading: bool,
    error: Option<String>,
}

impl HistoryState {
    /// Set `page`, clamped to `1..=max(total_pages, 1)`
    fn clamp_page(&mut self, page: u32) {
        let total_pages = PageInfo::new(self.pagination, self.total).total_pages.max(1);
        let clamped = u64::from(page.max(1)).min(total_pages);
        self.pagination.page = u32::try_from(clamped).unwrap_or(u32::MAX);
    }
}

/// History query engine
///
/// Owns the current page, pagination, filters and stats. All list fetches go
/// through one gate key, so a fetch issued while another is running is
/// dropped rather than queued.
pub struct HistoryQueryEngine {
    backend: Arc<dyn RecognitionBackend>,
    gate: RequestGate,
    stats: StatsAggregator,
    population_cap: u32,
    state: Mutex<HistoryState>,
}

impl HistoryQueryEngine {
    pub fn new(backend: Arc<dyn RecognitionBackend>, config: &HistoryConfig) -> Self {
        Self::with_gate(backend, config, RequestGate::new())
    }

    /// Build an engine sharing `gate` with other components
    pub fn with_gate(backend: Arc<dyn RecognitionBackend>, config: &HistoryConfig, gate: RequestGate) -> Self {
        let population_cap = config.population_cap.max(1);
        Self {
            stats: StatsAggregator::new(Arc::clone(&backend), gate.clone(), population_cap),
            backend,
            gate,
            population_cap,
            state: Mutex::new(HistoryState {
                records: Vec::new(),
                pagination: PaginationParams {
                    page: 1,
                    limit: config.default_page_limit.max(1),
                },
                filters: FilterParams::default(),
                total: 0,
                stats: None,
                last_filters: None,
                loading: false,
                error: None,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HistoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fetch one page
    ///
    /// The request becomes the engine's current pagination and filters. Totals and stats are refreshed on the first load, when `filters`
    /// differ from the previous request, or when `update_stats` is set.
    pub async fn fetch(&self, pagination: PaginationParams, filters: FilterParams, update_stats: bool) -> FetchOutcome {
        let policy = RefreshPolicy {
            force_total: update_stats,
            force_stats: update_stats,
        };
        self.fetch_with(pagination, filters, policy).await
    }

    async fn fetch_with(&self, mut pagination: PaginationParams, mut filters: FilterParams, policy: RefreshPolicy) -> FetchOutcome {
        let _permit = match self.gate.try_acquire(FETCH_KEY) {
            Some(permit) => permit,
            None => {
                debug!(page = pagination.page, "History fetch already in flight, skipping");
                METRICS.record_fetch("skipped");
                return FetchOutcome::Skipped;
            }
        };

        {
            let mut state = self.lock();
            state.pagination = pagination;
            state.filters = filters.clone();
        }

        // Setters may change the request while the permit is held; their own
        // fetch is skipped, so the newest request is re-issued here.
        loop {
            let filters_changed = {
                let mut state = self.lock();
                state.loading = true;
                state.error = None;
                state.last_filters.as_ref() != Some(&filters)
            };
            let refresh_total = filters_changed || policy.force_total;
            let refresh_stats = filters_changed || policy.force_stats;

            let loaded = self.load_page(&pagination, &filters, refresh_total).await;

            let stats = if refresh_stats && loaded.is_ok() {
                match self.stats.refresh().await {
                    Ok(stats) => Some(stats),
                    Err(e) => {
                        warn!("Failed to refresh history stats: {}", e);
                        None
                    }
                }
            } else {
                None
            };

            let mut state = self.lock();
            if stats.is_some() {
                state.stats = stats;
            }

            if state.pagination != pagination || state.filters != filters {
                debug!(page = state.pagination.page, "History request changed while loading, fetching again");
                pagination = state.pagination;
                filters = state.filters.clone();
                continue;
            }

            state.loading = false;

            return match loaded {
                Ok(page) => {
                    debug!(page = pagination.page, records = page.records.len(), "History page loaded");
                    state.records = page.records;
                    state.last_filters = Some(filters);
                    if let Some(total) = page.total {
                        state.total = total;
                    }
                    METRICS.record_fetch("completed");
                    FetchOutcome::Completed
                }
                Err(e) => {
                    warn!("Failed to fetch history: {}", e);
                    let message = e.user_message();
                    state.error = Some(format!("Failed to fetch history: {}", message));
                    METRICS.record_fetch("failed");
                    FetchOutcome::Failed(message)
                }
            };
        }
    }

    async fn load_page(&self, pagination: &PaginationParams, filters: &FilterParams, refresh_total: bool) -> Result<LoadedPage> {
        let plan = QueryPlan::for_request(pagination, filters, self.population_cap);
        debug!(?plan, "Querying history");

        let fetched: Vec<HistoryWithImage> = match &plan {
            QueryPlan::Paged { limit, skip } => self.backend.list_history(*limit, *skip).await?,
            QueryPlan::ByStatus { status, limit } => self.backend.list_history_by_status(*status, *limit).await?,
            QueryPlan::ByModel { model, limit } => self.backend.list_history_by_model(model, *limit).await?,
            QueryPlan::Population { limit } => self.backend.list_history(*limit, 0).await?,
        };

        let refined = refine(fetched.into_iter().map(HistoryRecord::from).collect(), filters);

        if plan.is_server_paged() {
            let total = if refresh_total {
                Some(self.backend.count_history().await?)
            } else {
                None
            };
            return Ok(LoadedPage { records: refined, total });
        }

        let total = refined.len() as u64;
        let records = refined
            .into_iter()
            .skip(pagination.skip() as usize)
            .take(pagination.limit as usize)
            .collect();

        Ok(LoadedPage {
            records,
            total: refresh_total.then_some(total),
        })
    }

    /// Re-run the current query
    pub async fn refresh(&self, update_stats: bool) -> FetchOutcome {
        let (pagination, filters) = self.current_request();
        self.fetch(pagination, filters, update_stats).await
    }

    /// Edit filters in place; the page goes back to 1
    pub async fn update_filters(&self, update: impl FnOnce(&mut FilterParams)) -> FetchOutcome {
        let (pagination, filters) = {
            let mut state = self.lock();
            update(&mut state.filters);
            state.pagination.page = 1;
            (state.pagination, state.filters.clone())
        };
        self.fetch(pagination, filters, false).await
    }

    /// Replace all filters; the page goes back to 1
    pub async fn set_filters(&self, filters: FilterParams) -> FetchOutcome {
        self.update_filters(|current| *current = filters).await
    }

    /// Move to `page`, clamped to `1..=max(total_pages, 1)`
    pub async fn set_page(&self, page: u32) -> FetchOutcome {
        let (pagination, filters) = {
            let mut state = self.lock();
            state.clamp_page(page);
            (state.pagination, state.filters.clone())
        };
        self.fetch(pagination, filters, false).await
    }

    /// Change the page size; the page goes back to 1
    pub async fn set_limit(&self, limit: u32) -> FetchOutcome {
        let (pagination, filters) = {
            let mut state = self.lock();
            state.pagination = PaginationParams {
                page: 1,
                limit: limit.max(1),
            };
            (state.pagination, state.filters.clone())
        };
        self.fetch(pagination, filters, false).await
    }

    /// Delete records one at a time
    ///
    /// A failure on one id does not stop the others. Deleted ids leave the
    /// current view immediately, then the view is refreshed with a fresh total
    /// (and fresh stats when `refresh_stats` is set).
    pub async fn delete_records(&self, ids: &[String], refresh_stats: bool) -> DeleteOutcome {
        if ids.is_empty() {
            return DeleteOutcome { total: 0, failed_ids: Vec::new() };
        }

        info!(count = ids.len(), "Deleting history records");

        let mut failed_ids = Vec::new();
        let mut deleted: HashSet<&str> = HashSet::new();

        for id in ids {
            match self.backend.delete_history(id).await {
                Ok(true) => {
                    METRICS.record_delete(true);
                    deleted.insert(id.as_str());
                }
                Ok(false) => {
                    warn!(id = %id, "Backend reported record was not deleted");
                    METRICS.record_delete(false);
                    failed_ids.push(id.clone());
                }
                Err(e) => {
                    warn!(id = %id, "Failed to delete record: {}", e);
                    METRICS.record_delete(false);
                    failed_ids.push(id.clone());
                }
            }
        }

        let delete_error = (!failed_ids.is_empty())
            .then(|| format!("Failed to delete {} of {} records", failed_ids.len(), ids.len()));

        let (pagination, filters) = {
            let mut state = self.lock();
            state.records.retain(|record| !deleted.contains(record.id.as_str()));
            state.total = state.total.saturating_sub(deleted.len() as u64);
            (state.pagination, state.filters.clone())
        };

        let policy = RefreshPolicy {
            force_total: true,
            force_stats: refresh_stats,
        };
        self.fetch_with(pagination, filters, policy).await;

        // The refreshed total may leave the current page past the end
        let clamped = {
            let mut state = self.lock();
            let page = state.pagination.page;
            state.clamp_page(page);
            (state.pagination.page != page).then(|| (state.pagination, state.filters.clone()))
        };
        if let Some((pagination, filters)) = clamped {
            self.fetch_with(pagination, filters, RefreshPolicy::default()).await;
        }

        if let Some(message) = delete_error {
            self.lock().error = Some(message);
        }

        let outcome = DeleteOutcome { total: ids.len(), failed_ids };
        if outcome.success() {
            info!(count = outcome.total, "History records deleted");
        } else {
            warn!(failed = outcome.failed_count(), total = outcome.total, "Bulk delete partially failed");
        }
        outcome
    }

    fn current_request(&self) -> (PaginationParams, FilterParams) {
        let state = self.lock();
        (state.pagination, state.filters.clone())
    }

    pub fn view(&self) -> HistoryView {
        let state = self.lock();
        HistoryView {
            records: state.records.clone(),
            pagination: PageInfo::new(state.pagination, state.total),
            filters: state.filters.clone(),
            stats: state.stats.clone(),
            loading: state.loading,
            error: state.error.clone(),
        }
    }

    pub fn records(&self) -> Vec<HistoryRecord> {
        self.lock().records.clone()
    }

    pub fn page_info(&self) -> PageInfo {
        let state = self.lock();
        PageInfo::new(state.pagination, state.total)
    }

    pub fn stats(&self) -> Option<HistoryStats> {
        self.lock().stats.clone()
    }

    pub fn filters(&self) -> FilterParams {
        self.lock().filters.clone()
    }
}
