//! reqwest-backed [`ProviderClient`] for the Comboios de Portugal API.

use std::time::Duration;

use anyhow::{Result, anyhow};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::Deserialize;

use super::{Coordinate, Line, ProviderClient, Station, Stopover, Trip, TripStopover};

const DEFAULT_BASE_URL: &str = "https://api.cp.pt/cp-api/siv";

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StationDto {
    code: String,
    designation: String,
    latitude: f64,
    longitude: f64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServiceDto {
    code: String,
    designation: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TimetableEntryDto {
    trip_id: String,
    service: ServiceDto,
    arrival: Option<String>,
    departure: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StationRefDto {
    code: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TripStopDto {
    station: StationRefDto,
    arrival: Option<String>,
    departure: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TripDto {
    trip_id: String,
    service: ServiceDto,
    stops: Vec<TripStopDto>,
}

fn parse_instant(raw: Option<&str>) -> Option<DateTime<Utc>> {
    raw.and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

/// HTTP client against the CP schedule API.
pub struct CpClient {
    base_url: String,
    client: reqwest::Client,
}

impl CpClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            base_url: base_url.into(),
            client,
        })
    }

    /// Builds a client from the environment, honoring `CP_API_BASE_URL`.
    pub fn from_env() -> Result<Self> {
        let base_url =
            std::env::var("CP_API_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        Self::new(base_url)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| anyhow!("failed to send request to {url}: {e}"))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("{url} returned status {status}: {body}"));
        }

        response
            .json()
            .await
            .map_err(|e| anyhow!("failed to parse response from {url}: {e}"))
    }
}

#[async_trait::async_trait]
impl ProviderClient for CpClient {
    async fn stations(&self) -> Result<Vec<Station>> {
        let url = format!("{}/stations", self.base_url);
        let stations: Vec<StationDto> = self.get_json(&url).await?;
        Ok(stations
            .into_iter()
            .map(|s| Station {
                id: s.code,
                name: s.designation,
                coordinate: Coordinate {
                    latitude: s.latitude,
                    longitude: s.longitude,
                },
                timezone: None,
            })
            .collect())
    }

    async fn stopovers(&self, station: &Station, day: DateTime<Tz>) -> Result<Vec<Stopover>> {
        let url = format!(
            "{}/stations/{}/timetable/{}",
            self.base_url,
            station.id,
            day.format("%Y-%m-%d")
        );
        let entries: Vec<TimetableEntryDto> = self.get_json(&url).await?;
        Ok(entries
            .into_iter()
            .map(|e| Stopover {
                trip_id: e.trip_id,
                line: Line {
                    id: e.service.code,
                    name: e.service.designation,
                },
                arrival: parse_instant(e.arrival.as_deref()),
                departure: parse_instant(e.departure.as_deref()),
            })
            .collect())
    }

    async fn trip(&self, trip_id: &str) -> Result<Trip> {
        let url = format!("{}/trips/{}", self.base_url, trip_id);
        let trip: TripDto = self.get_json(&url).await?;
        Ok(Trip {
            id: trip.trip_id,
            line: Line {
                id: trip.service.code,
                name: trip.service.designation,
            },
            stopovers: trip
                .stops
                .into_iter()
                .map(|s| TripStopover {
                    stop_id: s.station.code,
                    arrival: parse_instant(s.arrival.as_deref()),
                    departure: parse_instant(s.departure.as_deref()),
                })
                .collect(),
        })
    }
}
