//! Dashboard aggregates. Pure functions over the visible query records;
//! recomputed on every request.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;

use cqms_types::api::{DashboardResponse, HeadingCount, StatusShare, TrendPoint};
use cqms_types::models::{QueryRecord, QueryStatus};

const SECONDS_PER_DAY: i64 = 86_400;

pub fn summarize(records: &[QueryRecord]) -> DashboardResponse {
    DashboardResponse {
        resolution_trend: resolution_trend(records),
        heading_frequency: heading_frequency(records),
        status_distribution: status_distribution(records),
    }
}

/// Mean whole-day resolution time of Closed queries, grouped by close date.
///
/// A Closed row without a close timestamp counts as resolved the day it was
/// created, with a zero-day duration.
pub fn resolution_trend(records: &[QueryRecord]) -> Vec<TrendPoint> {
    let mut by_date: BTreeMap<NaiveDate, (i64, u32)> = BTreeMap::new();

    for record in records.iter().filter(|r| r.status == QueryStatus::Closed) {
        let (date, days) = match record.closed_at {
            Some(closed_at) => {
                let secs = (closed_at - record.created_at).num_seconds();
                (closed_at.date_naive(), secs.div_euclid(SECONDS_PER_DAY))
            }
            None => (record.created_at.date_naive(), 0),
        };
        let entry = by_date.entry(date).or_default();
        entry.0 += days;
        entry.1 += 1;
    }

    by_date
        .into_iter()
        .map(|(date, (total_days, count))| TrendPoint {
            date,
            mean_days: total_days as f64 / f64::from(count),
        })
        .collect()
}

/// Query count per exact heading, most frequent first.
pub fn heading_frequency(records: &[QueryRecord]) -> Vec<HeadingCount> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for record in records {
        *counts.entry(record.heading.as_str()).or_default() += 1;
    }

    let mut out: Vec<HeadingCount> = counts
        .into_iter()
        .map(|(heading, count)| HeadingCount {
            heading: heading.to_string(),
            count,
        })
        .collect();
    out.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.heading.cmp(&b.heading)));
    out
}

/// Count and share of each status present, shares rounded to one decimal.
pub fn status_distribution(records: &[QueryRecord]) -> Vec<StatusShare> {
    let mut counts: BTreeMap<QueryStatus, usize> = BTreeMap::new();
    for record in records {
        *counts.entry(record.status).or_default() += 1;
    }

    let total = records.len();
    let mut out: Vec<StatusShare> = counts
        .into_iter()
        .map(|(status, count)| StatusShare {
            status,
            count,
            percentage: share_in_tenths(count, total) as f64 / 10.0,
        })
        .collect();
    // Stable sort keeps Open before Closed on ties.
    out.sort_by(|a, b| b.count.cmp(&a.count));
    out
}

/// `count / total` as a percentage in tenths, rounded half to even.
///
/// Exact integer arithmetic, so complementary shares of a two-way split
/// always add up to 1000 tenths.
fn share_in_tenths(count: usize, total: usize) -> usize {
    let scaled = count * 1000;
    let (quotient, remainder) = (scaled / total, scaled % total);
    match (remainder * 2).cmp(&total) {
        Ordering::Less => quotient,
        Ordering::Greater => quotient + 1,
        Ordering::Equal => quotient + quotient % 2,
    }
}
