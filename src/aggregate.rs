//! Merge forecast and observation results into rows, and regroup the
//! observation readings per station for the map.

use std::collections::BTreeMap;

use crate::models::{
    Availability, CombinedRow, Place, PlaceObservation, PrecipitationForecast, StationSummary,
};

/// Combine the results for one place. Unavailable markers pass through untouched.
#[must_use]
pub fn combine(
    place: &Place,
    forecast: Availability<PrecipitationForecast>,
    observation: Availability<PlaceObservation>,
) -> CombinedRow {
    CombinedRow {
        place: place.clone(),
        forecast,
        observation,
    }
}

/// Every station that reported for any place, sorted by station id.
///
/// A station shared by several places keeps the first value seen per date and
/// one distance per place.
#[must_use]
pub fn group_by_station(rows: &[CombinedRow]) -> Vec<StationSummary> {
    let mut stations: BTreeMap<String, StationSummary> = BTreeMap::new();

    for row in rows {
        let Some(observation) = row.observation.as_option() else {
            continue;
        };
        for day in &observation.days {
            for reading in &day.readings {
                let nearby = &reading.station;
                let summary = stations
                    .entry(nearby.station.id.clone())
                    .or_insert_with(|| StationSummary {
                        station: nearby.station.clone(),
                        values: BTreeMap::new(),
                        offsets: BTreeMap::new(),
                        distances: BTreeMap::new(),
                    });
                summary
                    .distances
                    .entry(row.place.name.clone())
                    .or_insert(nearby.distance_km);
                summary
                    .values
                    .entry(day.reference_date)
                    .or_insert(reading.value_mm);
                summary
                    .offsets
                    .entry(day.reference_date)
                    .or_insert_with(|| reading.time_offset.clone());
            }
        }
    }

    stations.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DailyObservation, NearbyStation, Station, StationReading};
    use chrono::NaiveDate;

    fn reading(id: &str, distance_km: f64, value_mm: f64) -> StationReading {
        StationReading {
            station: NearbyStation {
                station: Station {
                    id: id.to_string(),
                    name: format!("{id} NAME"),
                    latitude: 59.94,
                    longitude: 10.72,
                    masl: None,
                },
                distance_km,
            },
            time_offset: "PT6H".to_string(),
            value_mm,
        }
    }

    fn observed(day: u32, readings: Vec<StationReading>) -> Availability<PlaceObservation> {
        Availability::Available(PlaceObservation {
            days: vec![DailyObservation {
                reference_date: NaiveDate::from_ymd_opt(2019, 9, day).unwrap(),
                readings,
            }],
        })
    }

    #[test]
    fn test_combine_oslo_example() {
        let oslo = Place::new("Oslo", 59.9, 10.7);
        let forecast = PrecipitationForecast::from_hourly(6, vec![]);
        let forecast = PrecipitationForecast {
            amount_mm: 2.3,
            ..forecast
        };

        let row = combine(
            &oslo,
            Availability::Available(forecast),
            observed(3, vec![reading("SN18700", 4.5, 0.1)]),
        );

        assert_eq!(row.summary_line(), "Oslo | forecast=2.3mm | observed=0.1mm");
        assert_eq!(row.place, oslo);
    }

    #[test]
    fn test_combine_carries_unavailable() {
        let row = combine(
            &Place::new("Bergen", 60.39, 5.32),
            Availability::unavailable("timeout"),
            Availability::unavailable("missing credential"),
        );
        assert_eq!(
            row.summary_line(),
            "Bergen | forecast=unavailable | observed=unavailable"
        );
        assert!(row.is_empty());
    }

    #[test]
    fn test_group_by_station_merges_places() {
        let rows = vec![
            combine(
                &Place::new("Oslo", 59.9, 10.7),
                Availability::unavailable("x"),
                observed(3, vec![reading("SN2", 4.5, 0.1), reading("SN1", 9.0, 0.0)]),
            ),
            combine(
                &Place::new("Lysaker", 59.91, 10.64),
                Availability::unavailable("x"),
                observed(3, vec![reading("SN2", 3.0, 0.7)]),
            ),
            combine(
                &Place::new("Nowhere", 0.0, 0.0),
                Availability::unavailable("x"),
                Availability::unavailable("y"),
            ),
        ];

        let stations = group_by_station(&rows);

        assert_eq!(stations.len(), 2);
        assert_eq!(stations[0].station.id, "SN1");
        let shared = &stations[1];
        assert_eq!(shared.distances.len(), 2);
        assert_eq!(shared.distances["Lysaker"], 3.0);
        assert_eq!(shared.values.values().copied().collect::<Vec<_>>(), [0.1]);
    }
}
