//! The fetch-aggregate-transform pipeline.
//!
//! One run: validate the date range, fetch the station list, discover trip
//! ids across the (day, station) cross-product, write the static tables,
//! then stream each trip's rows into the sinks as its detail fetch
//! completes.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use chrono_tz::Tz;
use futures::StreamExt;
use tracing::{info, warn};

use crate::calendar::day_sequence;
use crate::discovery::{DiscoveryOptions, discover_trips};
use crate::exec::completion_stream;
use crate::feed::{FeedWriter, Table, agency_row, feed_info_row, route_rows, stop_rows};
use crate::progress::{LogProgress, Progress, Stage};
use crate::provider::ProviderClient;
use crate::transform::{TripRows, trip_to_rows};

/// Counters reported after a completed run.
#[derive(Debug, Default, Clone, Copy)]
pub struct Summary {
    pub stations: usize,
    pub lines: usize,
    pub trips_total: usize,
    pub trips_skipped: usize,
    pub rows_written: usize,
}

/// Builds one GTFS feed from a provider client.
pub struct FeedBuilder<C> {
    client: C,
    timezone: Tz,
    options: DiscoveryOptions,
    progress: Box<dyn Progress>,
}

impl<C: ProviderClient> FeedBuilder<C> {
    pub fn new(client: C) -> Self {
        Self {
            client,
            timezone: chrono_tz::Europe::Lisbon,
            options: DiscoveryOptions::default(),
            progress: Box::new(LogProgress),
        }
    }

    pub fn timezone(mut self, timezone: Tz) -> Self {
        self.timezone = timezone;
        self
    }

    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.options.concurrency = concurrency;
        self
    }

    pub fn progress(mut self, progress: Box<dyn Progress>) -> Self {
        self.progress = progress;
        self
    }

    /// Runs the pipeline for the inclusive `start..end` range, writing into
    /// the tables already opened on `writer`.
    ///
    /// # Errors
    ///
    /// Fails before any network activity when `end` precedes `start`; fails
    /// when the station list cannot be fetched or when a sink write fails.
    /// Individual stopover or trip-detail failures only degrade the result.
    pub async fn build(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        writer: &mut FeedWriter,
    ) -> Result<Summary> {
        let days = day_sequence(start, end, self.timezone)?;

        let stations = self
            .client
            .stations()
            .await
            .context("failed to fetch station list")?;
        info!(stations = stations.len(), days = days.len(), "starting discovery");

        let discovery = discover_trips(
            &self.client,
            &days,
            &stations,
            self.options,
            self.progress.as_ref(),
        )
        .await;
        info!(
            trips = discovery.trip_ids.len(),
            lines = discovery.lines.len(),
            "discovery complete"
        );

        writer.write_row(Table::Agency, &agency_row())?;
        writer.close(Table::Agency)?;
        for row in stop_rows(&stations) {
            writer.write_row(Table::Stops, &row)?;
        }
        writer.close(Table::Stops)?;
        for row in route_rows(&discovery.lines) {
            writer.write_row(Table::Routes, &row)?;
        }
        writer.close(Table::Routes)?;
        writer.write_row(Table::FeedInfo, &feed_info_row(start, end))?;
        writer.close(Table::FeedInfo)?;

        let trips_skipped = self.stream_trip_rows(&discovery.trip_ids, writer).await?;

        for table in Table::STREAMED {
            writer.close(table)?;
        }

        Ok(Summary {
            stations: stations.len(),
            lines: discovery.lines.len(),
            trips_total: discovery.trip_ids.len(),
            trips_skipped,
            rows_written: writer.total_data_rows(),
        })
    }

    /// Fetches every trip's detail with bounded concurrency and writes its
    /// rows as soon as that trip completes. A failed fetch (or a trip with
    /// no usable stop events) is skipped; it contributes zero rows to every
    /// table. Returns the number of skipped trips.
    async fn stream_trip_rows(&self, trip_ids: &[String], writer: &mut FeedWriter) -> Result<usize> {
        let total = trip_ids.len();
        let timezone = self.timezone;
        let progress: &dyn Progress = self.progress.as_ref();
        let client = &self.client;

        let units: Vec<_> = trip_ids
            .iter()
            .enumerate()
            .map(|(index, trip_id)| async move {
                progress.on_progress(Stage::TripDetail, index + 1, total);
                match client.trip(trip_id).await {
                    Ok(trip) => {
                        let rows = trip_to_rows(&trip, timezone);
                        if rows.is_none() {
                            warn!(trip_id = %trip_id, "trip has no usable stop events, skipping");
                        }
                        rows
                    }
                    Err(error) => {
                        warn!(trip_id = %trip_id, error = %error, "trip detail fetch failed, skipping");
                        None
                    }
                }
            })
            .collect();

        let mut skipped = 0;
        let results = completion_stream(units, self.options.concurrency);
        futures::pin_mut!(results);
        while let Some(result) = results.next().await {
            match result {
                Some(rows) => self.write_trip(writer, rows)?,
                None => skipped += 1,
            }
        }
        Ok(skipped)
    }

    fn write_trip(&self, writer: &mut FeedWriter, rows: TripRows) -> Result<()> {
        writer.write_row(Table::Trips, &rows.trip)?;
        for stop_time in &rows.stop_times {
            writer.write_row(Table::StopTimes, stop_time)?;
        }
        writer.write_row(Table::CalendarDates, &rows.calendar_date)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::{MemorySink, MemorySinkHandle};
    use crate::progress::NullProgress;
    use crate::provider::{Station, Stopover, Trip};
    use anyhow::anyhow;
    use chrono::DateTime;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Provider that serves canned data and counts every call.
    #[derive(Default)]
    struct CountingClient {
        calls: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl ProviderClient for CountingClient {
        async fn stations(&self) -> Result<Vec<Station>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Vec::new())
        }

        async fn stopovers(&self, _: &Station, _: DateTime<Tz>) -> Result<Vec<Stopover>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Vec::new())
        }

        async fn trip(&self, _: &str) -> Result<Trip> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(anyhow!("not found"))
        }
    }

    fn open_all(writer: &mut FeedWriter) -> HashMap<Table, MemorySinkHandle> {
        let mut handles = HashMap::new();
        for table in Table::ALL {
            let (sink, handle) = MemorySink::new();
            writer.open(table, Box::new(sink)).unwrap();
            handles.insert(table, handle);
        }
        handles
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[tokio::test]
    async fn test_reversed_range_fails_before_any_fetch() {
        let builder = FeedBuilder::new(CountingClient::default())
            .progress(Box::new(NullProgress));
        let mut writer = FeedWriter::new();
        open_all(&mut writer);

        let result = builder
            .build(date(2020, 1, 3), date(2020, 1, 1), &mut writer)
            .await;
        assert!(result.is_err());
        assert_eq!(builder.client.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_empty_network_still_produces_static_tables() {
        let builder = FeedBuilder::new(CountingClient::default())
            .progress(Box::new(NullProgress));
        let mut writer = FeedWriter::new();
        let handles = open_all(&mut writer);

        let summary = builder
            .build(date(2020, 1, 1), date(2020, 1, 2), &mut writer)
            .await
            .unwrap();

        assert_eq!(summary.stations, 0);
        assert_eq!(summary.trips_total, 0);
        // agency and feed_info always carry one row
        assert_eq!(handles[&Table::Agency].rows().len(), 2);
        assert_eq!(handles[&Table::FeedInfo].rows().len(), 2);
        // streamed tables closed exactly once even with nothing to stream
        for table in Table::STREAMED {
            assert_eq!(handles[&table].close_count(), 1);
            assert_eq!(handles[&table].rows().len(), 1);
        }
    }
}
