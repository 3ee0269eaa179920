//! Trip discovery across the (day, station) cross-product.

use std::collections::HashSet;
use std::time::Duration;

use chrono::DateTime;
use chrono_tz::Tz;
use tracing::warn;

use crate::exec::{run_ordered, with_retry};
use crate::progress::{Progress, Stage};
use crate::provider::{Line, ProviderClient, Station};

/// Per-request bounds for the discovery stage.
#[derive(Debug, Clone, Copy)]
pub struct DiscoveryOptions {
    pub concurrency: usize,
    pub attempts: u32,
    pub per_request_timeout: Duration,
}

impl Default for DiscoveryOptions {
    fn default() -> Self {
        Self {
            concurrency: 16,
            attempts: 3,
            per_request_timeout: Duration::from_secs(10),
        }
    }
}

/// Aggregated discovery output: both lists keep first-seen order and are
/// frozen once this struct is returned.
#[derive(Debug, Default)]
pub struct Discovery {
    pub trip_ids: Vec<String>,
    pub lines: Vec<Line>,
}

/// Queries stopovers for every (day, station) pair and merges the results
/// into deduplicated trip-id and line lists.
///
/// A query that exhausts its retries or times out contributes an empty
/// result; it never fails the batch.
pub async fn discover_trips<C: ProviderClient>(
    client: &C,
    days: &[DateTime<Tz>],
    stations: &[Station],
    options: DiscoveryOptions,
    progress: &dyn Progress,
) -> Discovery {
    let total = days.len() * stations.len();
    let units: Vec<_> = days
        .iter()
        .flat_map(|day| stations.iter().map(move |station| (*day, station)))
        .enumerate()
        .map(|(index, (day, station))| async move {
            progress.on_progress(Stage::Discovery, index + 1, total);
            let result = with_retry(options.attempts, options.per_request_timeout, || {
                client.stopovers(station, day)
            })
            .await;
            match result {
                Ok(stopovers) => stopovers
                    .into_iter()
                    .map(|s| (s.trip_id, s.line))
                    .collect(),
                Err(error) => {
                    warn!(
                        station_id = %station.id,
                        station_name = %station.name,
                        day = %day.format("%Y-%m-%d"),
                        error = %error,
                        "stopover query failed, continuing without it"
                    );
                    Vec::new()
                }
            }
        })
        .collect();

    let results = run_ordered(units, options.concurrency).await;
    merge(results)
}

fn merge(results: Vec<Vec<(String, Line)>>) -> Discovery {
    let mut seen_trips = HashSet::new();
    let mut seen_lines = HashSet::new();
    let mut discovery = Discovery::default();
    for (trip_id, line) in results.into_iter().flatten() {
        if seen_trips.insert(trip_id.clone()) {
            discovery.trip_ids.push(trip_id);
        }
        if seen_lines.insert(line.id.clone()) {
            discovery.lines.push(line);
        }
    }
    discovery
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(id: &str, name: &str) -> Line {
        Line {
            id: id.to_string(),
            name: name.to_string(),
        }
    }

    fn pair(trip_id: &str, line_id: &str) -> (String, Line) {
        (trip_id.to_string(), line(line_id, line_id))
    }

    #[test]
    fn test_merge_dedups_trip_ids() {
        let discovery = merge(vec![
            vec![pair("123", "IC"), pair("456", "IC")],
            vec![pair("123", "IC")],
        ]);
        assert_eq!(discovery.trip_ids, vec!["123", "456"]);
    }

    #[test]
    fn test_merge_dedups_lines_by_id_keeping_first_name() {
        let discovery = merge(vec![
            vec![("1".to_string(), line("IC", "Intercidades"))],
            vec![("2".to_string(), line("IC", "IC renamed"))],
        ]);
        assert_eq!(discovery.lines, vec![line("IC", "Intercidades")]);
    }

    #[test]
    fn test_merge_preserves_first_seen_order() {
        let discovery = merge(vec![
            vec![pair("b", "R2")],
            vec![pair("a", "R1"), pair("b", "R2")],
            vec![pair("c", "R1")],
        ]);
        assert_eq!(discovery.trip_ids, vec!["b", "a", "c"]);
        let line_ids: Vec<_> = discovery.lines.iter().map(|l| l.id.as_str()).collect();
        assert_eq!(line_ids, vec!["R2", "R1"]);
    }

    #[test]
    fn test_merge_tolerates_empty_contributions() {
        let discovery = merge(vec![Vec::new(), vec![pair("1", "U")], Vec::new()]);
        assert_eq!(discovery.trip_ids, vec!["1"]);
    }
}
