//! Trait and domain types for the schedule data provider.

mod cp;

pub use cp::CpClient;

use anyhow::Result;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;

/// WGS84 position of a station.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

/// A station served by the operator. Fetched once per run, immutable after.
#[derive(Debug, Clone)]
pub struct Station {
    pub id: String,
    pub name: String,
    pub coordinate: Coordinate,
    /// Local timezone where it differs from the operator default.
    pub timezone: Option<String>,
}

/// A line (route) as reported alongside stopovers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    pub id: String,
    pub name: String,
}

/// One scheduled visit of a trip to a station. Only used to discover trip
/// ids; dropped right after discovery.
#[derive(Debug, Clone)]
pub struct Stopover {
    pub trip_id: String,
    pub line: Line,
    pub arrival: Option<DateTime<Utc>>,
    pub departure: Option<DateTime<Utc>>,
}

/// One stop event inside a trip's full detail.
#[derive(Debug, Clone)]
pub struct TripStopover {
    pub stop_id: String,
    pub arrival: Option<DateTime<Utc>>,
    pub departure: Option<DateTime<Utc>>,
}

/// Full ordered detail of a single trip. Created, transformed into feed
/// rows, then dropped.
#[derive(Debug, Clone)]
pub struct Trip {
    pub id: String,
    pub line: Line,
    pub stopovers: Vec<TripStopover>,
}

/// Abstraction over the operator's schedule API.
///
/// Callers treat `stopovers` failures as an empty list and `trip` failures
/// as a skipped trip; only `stations` failure is fatal to a run.
#[async_trait::async_trait]
pub trait ProviderClient: Send + Sync {
    /// Returns all stations of the network.
    async fn stations(&self) -> Result<Vec<Station>>;

    /// Returns all scheduled stopovers at `station` on the service day
    /// starting at `day` (a local-midnight instant).
    async fn stopovers(&self, station: &Station, day: DateTime<Tz>) -> Result<Vec<Stopover>>;

    /// Returns the full ordered stop detail of one trip.
    async fn trip(&self, trip_id: &str) -> Result<Trip>;
}
