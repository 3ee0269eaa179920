//! Conversion of one trip's detail into GTFS feed rows.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;

use crate::calendar::{format_clock, format_yyyymmdd, service_day};
use crate::provider::Trip;

/// The rows a single trip contributes to the streamed tables.
#[derive(Debug, Clone)]
pub struct TripRows {
    pub trip: Vec<String>,
    pub calendar_date: Vec<String>,
    pub stop_times: Vec<Vec<String>>,
}

fn clock_field(instant: Option<DateTime<Utc>>, reference_day: chrono::NaiveDate, tz: Tz) -> String {
    instant
        .map(|i| format_clock(i, reference_day, tz))
        .unwrap_or_default()
}

/// Converts a trip into its trips, calendar_dates, and stop_times rows.
///
/// The reference service day is the operator-timezone day of the first
/// stop's departure; all stop times of the trip are encoded against it, so
/// a sequence crossing midnight keeps increasing (`23:55:00`, `24:10:00`).
///
/// Returns `None` for a trip with no stops or no first departure; such a
/// trip contributes zero rows to every table.
pub fn trip_to_rows(trip: &Trip, tz: Tz) -> Option<TripRows> {
    let first_departure = trip.stopovers.first()?.departure?;
    let reference_day = service_day(first_departure, tz);

    let trip_row = vec![
        trip.line.id.clone(),       // route_id
        trip.id.clone(),            // service_id
        trip.id.clone(),            // trip_id
        String::new(),              // trip_headsign
        trip.id.clone(),            // trip_short_name
        String::new(),              // direction_id
        String::new(),              // block_id
        String::new(),              // shape_id
        String::new(),              // wheelchair_accessible
        String::new(),              // bikes_allowed
    ];

    let calendar_date = vec![
        trip.id.clone(),
        format_yyyymmdd(reference_day),
        "1".to_string(), // exception_type 1: service added
    ];

    let stop_times = trip
        .stopovers
        .iter()
        .enumerate()
        .map(|(sequence, stop)| {
            vec![
                trip.id.clone(),
                clock_field(stop.arrival, reference_day, tz),
                clock_field(stop.departure, reference_day, tz),
                stop.stop_id.clone(),
                sequence.to_string(),
                String::new(), // stop_headsign
                String::new(), // pickup_type
                String::new(), // drop_off_type
                String::new(), // shape_dist_traveled
                String::new(), // timepoint
            ]
        })
        .collect();

    Some(TripRows {
        trip: trip_row,
        calendar_date,
        stop_times,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{Line, TripStopover};
    use chrono::TimeZone;
    use chrono_tz::Europe::Lisbon;

    fn instant(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Lisbon
            .with_ymd_and_hms(y, m, d, h, min, 0)
            .unwrap()
            .with_timezone(&Utc)
    }

    fn stop(id: &str, arrival: DateTime<Utc>, departure: DateTime<Utc>) -> TripStopover {
        TripStopover {
            stop_id: id.to_string(),
            arrival: Some(arrival),
            departure: Some(departure),
        }
    }

    fn trip(id: &str, stops: Vec<TripStopover>) -> Trip {
        Trip {
            id: id.to_string(),
            line: Line {
                id: "IC".to_string(),
                name: "Intercidades".to_string(),
            },
            stopovers: stops,
        }
    }

    #[test]
    fn test_single_trip_rows() {
        let t = trip(
            "123",
            vec![
                stop("lis", instant(2020, 1, 1, 10, 0), instant(2020, 1, 1, 10, 5)),
                stop("por", instant(2020, 1, 1, 13, 0), instant(2020, 1, 1, 13, 2)),
            ],
        );
        let rows = trip_to_rows(&t, Lisbon).unwrap();

        assert_eq!(rows.trip[0], "IC");
        assert_eq!(rows.trip[1], "123");
        assert_eq!(rows.trip[2], "123");
        assert_eq!(rows.trip[4], "123");
        assert_eq!(rows.trip.len(), 10);

        assert_eq!(rows.calendar_date, vec!["123", "20200101", "1"]);

        assert_eq!(rows.stop_times.len(), 2);
        assert_eq!(
            rows.stop_times[0],
            vec!["123", "10:00:00", "10:05:00", "lis", "0", "", "", "", "", ""]
        );
        assert_eq!(rows.stop_times[1][4], "1");
    }

    #[test]
    fn test_overnight_trip_stays_monotonic() {
        let t = trip(
            "n1",
            vec![
                stop("a", instant(2020, 1, 1, 23, 0), instant(2020, 1, 1, 23, 10)),
                stop("b", instant(2020, 1, 2, 0, 10), instant(2020, 1, 2, 0, 15)),
                stop("c", instant(2020, 1, 3, 1, 10), instant(2020, 1, 3, 1, 12)),
            ],
        );
        let rows = trip_to_rows(&t, Lisbon).unwrap();
        assert_eq!(rows.stop_times[0][2], "23:10:00");
        assert_eq!(rows.stop_times[1][1], "24:10:00");
        assert_eq!(rows.stop_times[2][1], "49:10:00");
        // Service day anchored to the first departure, not the last stop
        assert_eq!(rows.calendar_date[1], "20200101");
    }

    #[test]
    fn test_trip_without_stops_yields_no_rows() {
        assert!(trip_to_rows(&trip("empty", Vec::new()), Lisbon).is_none());
    }

    #[test]
    fn test_trip_without_first_departure_yields_no_rows() {
        let t = trip(
            "x",
            vec![TripStopover {
                stop_id: "a".to_string(),
                arrival: Some(instant(2020, 1, 1, 9, 0)),
                departure: None,
            }],
        );
        assert!(trip_to_rows(&t, Lisbon).is_none());
    }

    #[test]
    fn test_missing_intermediate_times_become_empty_fields() {
        let t = trip(
            "y",
            vec![
                stop("a", instant(2020, 1, 1, 9, 0), instant(2020, 1, 1, 9, 5)),
                TripStopover {
                    stop_id: "b".to_string(),
                    arrival: None,
                    departure: Some(instant(2020, 1, 1, 11, 0)),
                },
            ],
        );
        let rows = trip_to_rows(&t, Lisbon).unwrap();
        assert_eq!(rows.stop_times[1][1], "");
        assert_eq!(rows.stop_times[1][2], "11:00:00");
    }
}
