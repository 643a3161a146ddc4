//! HTTP-level tests for the forecast and observation clients against mock servers

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use rainwatch::RainwatchError;
use rainwatch::config::{ForecastConfig, ObservationConfig};
use rainwatch::models::Place;
use rainwatch::weather::frost::PRECIPITATION_ELEMENT;
use rainwatch::weather::{ForecastSource, FrostClient, MetNorwayClient, ObservationSource};
use serde_json::json;
use wiremock::matchers::{basic_auth, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2019, 9, 4, 12, 0, 0).unwrap()
}

fn oslo() -> Place {
    Place::new("Oslo", 59.9, 10.7)
}

fn forecast_body() -> serde_json::Value {
    let step = |time: &str, amount: f64| {
        json!({
            "time": time,
            "data": {
                "instant": {"details": {"air_temperature": 11.0}},
                "next_1_hours": {
                    "summary": {"symbol_code": "rain"},
                    "details": {"precipitation_amount": amount}
                }
            }
        })
    };
    json!({
        "type": "Feature",
        "geometry": {"type": "Point", "coordinates": [10.7, 59.9, 20]},
        "properties": {
            "meta": {"updated_at": "2019-09-04T11:00:00Z"},
            "timeseries": [
                step("2019-09-04T11:00:00Z", 9.0),
                step("2019-09-04T12:00:00Z", 0.0),
                step("2019-09-04T13:00:00Z", 1.2),
                step("2019-09-04T14:00:00Z", 0.0),
                step("2019-09-04T15:00:00Z", 0.5)
            ]
        }
    })
}

fn forecast_client(server: &MockServer) -> MetNorwayClient {
    MetNorwayClient::new(&ForecastConfig {
        base_url: server.uri(),
        user_agent: "rainwatch-tests/1.0".to_string(),
        ..ForecastConfig::default()
    })
    .unwrap()
}

#[tokio::test]
async fn test_forecast_request_and_summary() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/compact"))
        .and(query_param("lat", "59.9000"))
        .and(query_param("lon", "10.7000"))
        .and(header("user-agent", "rainwatch-tests/1.0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(forecast_body()))
        .expect(1)
        .mount(&server)
        .await;

    let forecast = forecast_client(&server)
        .forecast(&oslo(), now())
        .await
        .unwrap();

    assert_eq!(forecast.hourly.len(), 4);
    assert!((forecast.amount_mm - 1.7).abs() < 1e-9);
    assert_eq!(
        forecast.rain_starts,
        Some(Utc.with_ymd_and_hms(2019, 9, 4, 13, 0, 0).unwrap())
    );
    assert_eq!(forecast.hours_with_rain(), 2);
}

#[tokio::test]
async fn test_forecast_server_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500).set_body_string("oops"))
        .mount(&server)
        .await;

    let err = forecast_client(&server)
        .forecast(&oslo(), now())
        .await
        .unwrap_err();
    assert!(matches!(err, RainwatchError::Api { status: Some(500), .. }));
}

#[tokio::test]
async fn test_forecast_throttled() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;

    let err = forecast_client(&server)
        .forecast(&oslo(), now())
        .await
        .unwrap_err();
    assert!(matches!(err, RainwatchError::RateLimit { .. }));
}

#[tokio::test]
async fn test_forecast_malformed_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>not json</html>"))
        .mount(&server)
        .await;

    let err = forecast_client(&server)
        .forecast(&oslo(), now())
        .await
        .unwrap_err();
    assert!(matches!(err, RainwatchError::Parse { .. }));
}

fn frost_client(server: &MockServer, client_id: Option<&str>) -> FrostClient {
    FrostClient::new(&ObservationConfig {
        base_url: server.uri(),
        client_id: client_id.map(str::to_string),
        ..ObservationConfig::default()
    })
    .unwrap()
}

fn sources_body() -> serde_json::Value {
    json!({
        "@type": "SourceResponse",
        "data": [
            {
                "@type": "SensorSystem",
                "id": "SN18950",
                "name": "OSLO - TRYVANNSHØGDA",
                "geometry": {"@type": "Point", "coordinates": [10.6693, 59.9847]},
                "masl": 514
            },
            {
                "@type": "SensorSystem",
                "id": "SN18700",
                "name": "OSLO - BLINDERN",
                "geometry": {"@type": "Point", "coordinates": [10.72, 59.9423]},
                "masl": 94
            }
        ]
    })
}

fn observation(source: &str, reference: &str, offset: &str, value: f64) -> serde_json::Value {
    json!({
        "sourceId": source,
        "referenceTime": reference,
        "observations": [{
            "elementId": PRECIPITATION_ELEMENT,
            "value": value,
            "unit": "mm",
            "timeOffset": offset,
            "timeResolution": "P1D"
        }]
    })
}

async fn mount_sources(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/sources/v0.jsonld"))
        .and(query_param("geometry", "nearest(POINT(10.7 59.9))"))
        .and(query_param("elements", PRECIPITATION_ELEMENT))
        .and(basic_auth("abc-123", ""))
        .respond_with(ResponseTemplate::new(200).set_body_json(sources_body()))
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_observations_closest_station_first() {
    let server = MockServer::start().await;
    mount_sources(&server).await;
    Mock::given(method("GET"))
        .and(path("/observations/v0.jsonld"))
        .and(query_param("referencetime", "2019-09-01/2019-09-04"))
        .and(basic_auth("abc-123", ""))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [
                observation("SN18950:0", "2019-09-03T00:00:00.000Z", "PT6H", 2.5),
                observation("SN18700:0", "2019-09-03T00:00:00.000Z", "PT18H", 0.3),
                observation("SN18700:0", "2019-09-03T00:00:00.000Z", "PT6H", 0.1),
                observation("SN18700:1", "2019-09-03T00:00:00.000Z", "PT6H", 7.0),
                observation("SN18950:0", "2019-09-02T00:00:00.000Z", "PT6H", 0.0)
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let observed = frost_client(&server, Some("abc-123"))
        .observe(&oslo(), now())
        .await
        .unwrap();

    assert_eq!(observed.days.len(), 3);
    let yesterday = &observed.days[0];
    assert_eq!(
        yesterday.reference_date,
        NaiveDate::from_ymd_opt(2019, 9, 3).unwrap()
    );
    let ids: Vec<&str> = yesterday
        .readings
        .iter()
        .map(|r| r.station.station.id.as_str())
        .collect();
    assert_eq!(ids, ["SN18700", "SN18950"]);
    assert_eq!(yesterday.readings[0].value_mm, 0.1);
    assert_eq!(yesterday.readings[0].time_offset, "PT6H");
    assert_eq!(observed.latest().as_option(), Some(&0.1));

    assert_eq!(observed.days[1].readings.len(), 1);
    assert!(observed.days[2].readings.is_empty());
}

#[tokio::test]
async fn test_observations_not_found_means_no_data() {
    let server = MockServer::start().await;
    mount_sources(&server).await;
    Mock::given(method("GET"))
        .and(path("/observations/v0.jsonld"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": {"code": 404, "message": "Not found", "reason": "No data found"}
        })))
        .mount(&server)
        .await;

    let observed = frost_client(&server, Some("abc-123"))
        .observe(&oslo(), now())
        .await
        .unwrap();

    assert!(observed.days.iter().all(|d| d.readings.is_empty()));
    assert!(!observed.latest().is_available());
}

#[tokio::test]
async fn test_observations_rejected_credential() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": {"code": 401, "message": "Unauthorized", "reason": "Invalid client id"}
        })))
        .mount(&server)
        .await;

    let err = frost_client(&server, Some("wrong"))
        .observe(&oslo(), now())
        .await
        .unwrap_err();
    assert!(matches!(err, RainwatchError::Authentication { .. }));
    assert!(err.to_string().contains("Invalid client id"));
}

#[tokio::test]
async fn test_missing_credential_makes_no_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let err = frost_client(&server, None)
        .observe(&oslo(), now())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        RainwatchError::MissingCredential { ref variable } if variable == "FROST_CLIENT_ID"
    ));
}

#[tokio::test]
async fn test_station_lookup_happens_once_per_place() {
    let server = MockServer::start().await;
    mount_sources(&server).await;
    Mock::given(method("GET"))
        .and(path("/observations/v0.jsonld"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [observation("SN18700:0", "2019-09-03T00:00:00.000Z", "PT6H", 0.1)]
        })))
        .expect(2)
        .mount(&server)
        .await;

    let client = frost_client(&server, Some("abc-123"));
    assert_eq!(client.warm_up(&[oslo()]).await, 1);

    for _ in 0..2 {
        let observed = client.observe(&oslo(), now()).await.unwrap();
        assert_eq!(observed.latest().as_option(), Some(&0.1));
    }
}

#[tokio::test]
async fn test_warm_up_without_credential_is_a_no_op() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    assert_eq!(frost_client(&server, None).warm_up(&[oslo()]).await, 0);
}
