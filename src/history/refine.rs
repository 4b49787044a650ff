//! Client-side filtering and sorting of history records
//!
//! Applied to whatever the backend returned, so results are correct even when
//! the server ignores a filter. Running `refine` twice gives the same output.

use super::models::{FilterParams, HistoryRecord, SortBy};
use chrono::NaiveDate;

/// Keep matching records, then apply the requested sort
pub fn refine(records: Vec<HistoryRecord>, filters: &FilterParams) -> Vec<HistoryRecord> {
    let mut refined: Vec<HistoryRecord> = records
        .into_iter()
        .filter(|record| matches_filters(record, filters))
        .collect();

    if let Some(sort_by) = filters.sort_by {
        sort_records(&mut refined, sort_by);
    }

    refined
}

pub fn matches_filters(record: &HistoryRecord, filters: &FilterParams) -> bool {
    if let Some(status) = filters.status {
        if record.status != status {
            return false;
        }
    }

    if let Some(model) = filters.model_name() {
        if record.model != model {
            return false;
        }
    }

    if let Some(term) = filters.search() {
        if !matches_search(record, term) {
            return false;
        }
    }

    within_dates(record, filters.start_date, filters.end_date)
}

/// Case-insensitive substring match on id, model and file name
fn matches_search(record: &HistoryRecord, term: &str) -> bool {
    let term = term.to_lowercase();
    let contains = |field: &str| field.to_lowercase().contains(&term);

    contains(&record.id)
        || contains(&record.model)
        || record.original_file_name.as_deref().map_or(false, contains)
}

fn within_dates(record: &HistoryRecord, start: Option<NaiveDate>, end: Option<NaiveDate>) -> bool {
    let day = record.timestamp.date_naive();
    start.map_or(true, |start| day >= start) && end.map_or(true, |end| day <= end)
}

/// Stable sort
///
/// Under `Confidence`, only records that carry a confidence are reordered;
/// records without one keep their positions.
pub fn sort_records(records: &mut [HistoryRecord], sort_by: SortBy) {
    match sort_by {
        SortBy::Newest => records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp)),
        SortBy::Oldest => records.sort_by(|a, b| a.timestamp.cmp(&b.timestamp)),
        SortBy::Confidence => sort_scored_in_place(records),
    }
}

fn sort_scored_in_place(records: &mut [HistoryRecord]) {
    let slots: Vec<usize> = records
        .iter()
        .enumerate()
        .filter(|(_, record)| record.confidence.is_some())
        .map(|(index, _)| index)
        .collect();

    let mut scored: Vec<(f64, HistoryRecord)> = slots
        .iter()
        .map(|&index| (records[index].confidence.unwrap_or_default(), records[index].clone()))
        .collect();
    scored.sort_by(|a, b| b.0.total_cmp(&a.0));

    for (slot, (_, record)) in slots.into_iter().zip(scored) {
        records[slot] = record;
    }
}
