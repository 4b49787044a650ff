//! Recognition history browsing
//!
//! [`HistoryQueryEngine`] pages through saved records, routes each request to
//! the narrowest backend query, refines the response locally and keeps
//! aggregate stats current.

pub mod engine;
pub mod models;
pub mod refine;
pub mod stats;

pub use engine::HistoryQueryEngine;
pub use models::{
    DeleteOutcome, FetchOutcome, FilterParams, HistoryRecord, HistoryStats, HistoryView, PageInfo,
    PaginationParams, SortBy,
};
pub use refine::refine;
pub use stats::StatsAggregator;
