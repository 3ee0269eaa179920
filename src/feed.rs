//! Feed tables, row sinks, and the static (non-streamed) rows.
//!
//! A [`FeedWriter`] maps each GTFS table to one [`RowSink`]. Static tables
//! are fully determined by station/line data and written in one pass; the
//! streamed tables (trips, stop_times, calendar_dates) get their header
//! first and rows incrementally as trip processing completes.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::{Result, bail};
use chrono::NaiveDate;

use crate::calendar::format_yyyymmdd;
use crate::provider::{Line, Station};

/// Fixed agency identity of the feed.
pub const AGENCY_ID: &str = "cp";

/// The seven tables composing the output feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Agency,
    Stops,
    Routes,
    Trips,
    StopTimes,
    CalendarDates,
    FeedInfo,
}

impl Table {
    pub const ALL: [Table; 7] = [
        Table::Agency,
        Table::Stops,
        Table::Routes,
        Table::Trips,
        Table::StopTimes,
        Table::CalendarDates,
        Table::FeedInfo,
    ];

    /// Tables fed incrementally by the trip-detail stage.
    pub const STREAMED: [Table; 3] = [Table::Trips, Table::StopTimes, Table::CalendarDates];

    pub fn name(&self) -> &'static str {
        match self {
            Table::Agency => "agency",
            Table::Stops => "stops",
            Table::Routes => "routes",
            Table::Trips => "trips",
            Table::StopTimes => "stop_times",
            Table::CalendarDates => "calendar_dates",
            Table::FeedInfo => "feed_info",
        }
    }

    pub fn file_name(&self) -> String {
        format!("{}.txt", self.name())
    }

    pub fn header(&self) -> &'static [&'static str] {
        match self {
            Table::Agency => &[
                "agency_id",
                "agency_name",
                "agency_url",
                "agency_timezone",
                "agency_lang",
                "agency_phone",
                "agency_fare_url",
                "agency_email",
            ],
            Table::Stops => &[
                "stop_id",
                "stop_code",
                "stop_name",
                "stop_desc",
                "stop_lat",
                "stop_lon",
                "zone_id",
                "stop_url",
                "location_type",
                "parent_station",
                "stop_timezone",
                "wheelchair_boarding",
            ],
            Table::Routes => &[
                "route_id",
                "agency_id",
                "route_short_name",
                "route_long_name",
                "route_desc",
                "route_type",
                "route_url",
                "route_color",
                "route_text_color",
            ],
            Table::Trips => &[
                "route_id",
                "service_id",
                "trip_id",
                "trip_headsign",
                "trip_short_name",
                "direction_id",
                "block_id",
                "shape_id",
                "wheelchair_accessible",
                "bikes_allowed",
            ],
            Table::StopTimes => &[
                "trip_id",
                "arrival_time",
                "departure_time",
                "stop_id",
                "stop_sequence",
                "stop_headsign",
                "pickup_type",
                "drop_off_type",
                "shape_dist_traveled",
                "timepoint",
            ],
            Table::CalendarDates => &["service_id", "date", "exception_type"],
            Table::FeedInfo => &[
                "feed_publisher_name",
                "feed_publisher_url",
                "feed_lang",
                "feed_start_date",
                "feed_end_date",
                "feed_version",
            ],
        }
    }
}

/// Consumer of one table's rows. Receives the header, then data rows, then
/// exactly one close. Write and close failures are fatal to the run.
pub trait RowSink: Send {
    fn write_row(&mut self, row: &[String]) -> Result<()>;
    fn close(&mut self) -> Result<()>;
}

/// Named mapping from table to sink, tracking open/closed state and row
/// counts. Closing a table twice, or writing after close, is an error.
#[derive(Default)]
pub struct FeedWriter {
    sinks: HashMap<Table, Box<dyn RowSink>>,
    data_rows: HashMap<Table, usize>,
}

impl FeedWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a sink for `table` and immediately writes the header row.
    pub fn open(&mut self, table: Table, mut sink: Box<dyn RowSink>) -> Result<()> {
        if self.sinks.contains_key(&table) {
            bail!("table {} is already open", table.name());
        }
        let header: Vec<String> = table.header().iter().map(|c| c.to_string()).collect();
        sink.write_row(&header)?;
        self.sinks.insert(table, sink);
        self.data_rows.insert(table, 0);
        Ok(())
    }

    pub fn write_row(&mut self, table: Table, row: &[String]) -> Result<()> {
        let Some(sink) = self.sinks.get_mut(&table) else {
            bail!("table {} is not open", table.name());
        };
        sink.write_row(row)?;
        *self.data_rows.entry(table).or_default() += 1;
        Ok(())
    }

    pub fn close(&mut self, table: Table) -> Result<()> {
        let Some(mut sink) = self.sinks.remove(&table) else {
            bail!("table {} is not open (double close?)", table.name());
        };
        sink.close()
    }

    /// Data rows written to `table` so far, excluding the header.
    pub fn data_rows(&self, table: Table) -> usize {
        self.data_rows.get(&table).copied().unwrap_or(0)
    }

    /// Total data rows written across all tables.
    pub fn total_data_rows(&self) -> usize {
        self.data_rows.values().sum()
    }
}

/// The fixed agency row for Comboios de Portugal.
pub fn agency_row() -> Vec<String> {
    [
        AGENCY_ID,
        "Comboios de Portugal",
        "https://www.cp.pt/",
        "Europe/Lisbon",
        "pt",
        "+351707210220",
        "https://www.cp.pt/passageiros/pt/comprar-bilhetes",
        "",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// One stops row per station, location_type 0.
pub fn stop_rows(stations: &[Station]) -> Vec<Vec<String>> {
    stations
        .iter()
        .map(|s| {
            vec![
                s.id.clone(),
                String::new(),
                s.name.clone(),
                String::new(),
                s.coordinate.latitude.to_string(),
                s.coordinate.longitude.to_string(),
                String::new(),
                String::new(),
                "0".to_string(),
                String::new(),
                s.timezone.clone().unwrap_or_default(),
                String::new(),
            ]
        })
        .collect()
}

/// One routes row per discovered line, route_type 2 (rail).
pub fn route_rows(lines: &[Line]) -> Vec<Vec<String>> {
    lines
        .iter()
        .map(|l| {
            vec![
                l.id.clone(),
                AGENCY_ID.to_string(),
                l.name.clone(),
                String::new(),
                String::new(),
                "2".to_string(),
                String::new(),
                String::new(),
                String::new(),
            ]
        })
        .collect()
}

/// The single feed_info row covering the requested date range.
pub fn feed_info_row(start: NaiveDate, end: NaiveDate) -> Vec<String> {
    vec![
        "gtfs.directory".to_string(),
        "https://gtfs.directory".to_string(),
        "pt".to_string(),
        format_yyyymmdd(start),
        format_yyyymmdd(end),
        String::new(),
    ]
}

#[derive(Default)]
struct MemoryInner {
    rows: Vec<Vec<String>>,
    closes: usize,
}

/// Handle for inspecting a [`MemorySink`] after the writer has consumed it.
#[derive(Clone, Default)]
pub struct MemorySinkHandle {
    inner: Arc<Mutex<MemoryInner>>,
}

impl MemorySinkHandle {
    /// All rows received so far, header included.
    pub fn rows(&self) -> Vec<Vec<String>> {
        self.inner.lock().unwrap().rows.clone()
    }

    pub fn close_count(&self) -> usize {
        self.inner.lock().unwrap().closes
    }
}

/// In-memory [`RowSink`] for headless runs and tests.
#[derive(Default)]
pub struct MemorySink {
    handle: MemorySinkHandle,
}

impl MemorySink {
    pub fn new() -> (Self, MemorySinkHandle) {
        let sink = Self::default();
        let handle = sink.handle.clone();
        (sink, handle)
    }
}

impl RowSink for MemorySink {
    fn write_row(&mut self, row: &[String]) -> Result<()> {
        let mut inner = self.handle.inner.lock().unwrap();
        if inner.closes > 0 {
            bail!("write after close");
        }
        inner.rows.push(row.to_vec());
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        let mut inner = self.handle.inner.lock().unwrap();
        if inner.closes > 0 {
            bail!("sink closed twice");
        }
        inner.closes += 1;
        Ok(())
    }
}
