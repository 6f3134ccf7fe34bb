mod common;

use common::fixture;
use nws_forecast::cache::{Cache, CacheKey, StoreError};
use nws_forecast::config::ApiConfig;
use nws_forecast::nws::{Client, FetchError, GridPoint, Location};
use nws_forecast::schema::Kind;
use nws_forecast::update::{self, LocationReport, UpdateError};
use std::collections::BTreeMap;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const UA: &str = "nws-forecast-tests/1.0";

fn api(server: &MockServer) -> ApiConfig {
    ApiConfig {
        root: server.uri(),
        user_agent: UA.to_string(),
        timeout_secs: 5,
    }
}

fn gsp(x: i64, y: i64) -> GridPoint {
    GridPoint {
        office: "GSP".to_string(),
        x,
        y,
    }
}

async fn mount(server: &MockServer, route: &str, response: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path(route))
        .and(header("User-Agent", UA))
        .respond_with(response)
        .mount(server)
        .await;
}

async fn serve_all_kinds(server: &MockServer, x: i64, y: i64) {
    for kind in Kind::ALL {
        let route = format!("/gridpoints/GSP/{},{}{}", x, y, kind.endpoint());
        mount(server, &route, ResponseTemplate::new(200).set_body_json(fixture(kind))).await;
    }
}

// The blocking client cannot run on the async test runtime itself.
async fn update_home(api: ApiConfig, cache: Cache) -> LocationReport {
    tokio::task::spawn_blocking(move || {
        let client = Client::new(&api).unwrap();
        update::update_location(&client, &cache, "home", &gsp(40, 68))
    })
    .await
    .unwrap()
}

#[tokio::test]
async fn update_caches_every_kind() {
    let server = MockServer::start().await;
    serve_all_kinds(&server, 40, 68).await;
    let dir = tempfile::tempdir().unwrap();
    let cache = Cache::new(dir.path());

    let report = update_home(api(&server), cache.clone()).await;

    assert!(report.is_complete(), "{:?}", report.failures);
    assert_eq!(report.stored, Kind::ALL.to_vec());
    for kind in Kind::ALL {
        let envelope = cache.load(&CacheKey::new("home", kind)).unwrap().unwrap();
        assert_eq!(envelope.kind(), kind);
    }
}

#[tokio::test]
async fn failed_fetch_keeps_the_previous_entry() {
    let server = MockServer::start().await;
    mount(
        &server,
        "/gridpoints/GSP/40,68/forecast",
        ResponseTemplate::new(200).set_body_json(fixture(Kind::TwelveHour)),
    )
    .await;
    mount(
        &server,
        "/gridpoints/GSP/40,68/forecast/hourly",
        ResponseTemplate::new(500),
    )
    .await;
    mount(
        &server,
        "/gridpoints/GSP/40,68",
        ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "type": "https://api.weather.gov/problems/UnexpectedProblem",
            "title": "Unexpected Problem",
            "status": 200
        })),
    )
    .await;

    let dir = tempfile::tempdir().unwrap();
    let cache = Cache::new(dir.path());
    let hourly = CacheKey::new("home", Kind::Hourly);
    cache.store(&hourly, &fixture(Kind::Hourly)).unwrap();

    let report = update_home(api(&server), cache.clone()).await;

    assert_eq!(report.stored, vec![Kind::TwelveHour]);
    assert_eq!(report.failures.len(), 2);
    assert!(matches!(
        report.failures[0],
        (Kind::Hourly, UpdateError::Fetch(FetchError::Status { status: 500, .. }))
    ));
    assert!(matches!(report.failures[1], (Kind::Gridpoint, UpdateError::Invalid(_))));

    assert!(cache.load(&hourly).unwrap().is_some());
    assert!(cache
        .load(&CacheKey::new("home", Kind::Gridpoint))
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn failed_store_is_reported_and_other_kinds_still_update() {
    let server = MockServer::start().await;
    serve_all_kinds(&server, 40, 68).await;
    let dir = tempfile::tempdir().unwrap();
    let cache = Cache::new(dir.path());
    // A directory where the hourly file belongs cannot be overwritten.
    std::fs::create_dir(cache.path_of(&CacheKey::new("home", Kind::Hourly))).unwrap();

    let report = update_home(api(&server), cache.clone()).await;

    assert_eq!(report.stored, vec![Kind::TwelveHour, Kind::Gridpoint]);
    assert_eq!(report.failures.len(), 1);
    assert!(matches!(
        report.failures[0],
        (Kind::Hourly, UpdateError::Store(StoreError::Write { .. }))
    ));
    assert!(cache
        .load(&CacheKey::new("home", Kind::Gridpoint))
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn update_all_continues_past_a_failing_location() {
    let server = MockServer::start().await;
    serve_all_kinds(&server, 56, 70).await;

    let dir = tempfile::tempdir().unwrap();
    let cache = Cache::new(dir.path());
    let api = api(&server);
    let locations = BTreeMap::from([
        ("home".to_string(), gsp(40, 68)),
        ("work".to_string(), gsp(56, 70)),
    ]);

    let reports = tokio::task::spawn_blocking(move || {
        let client = Client::new(&api).unwrap();
        update::update_all(&client, &cache, &locations)
    })
    .await
    .unwrap();

    assert_eq!(reports.len(), 2);
    assert_eq!(reports[0].location, "home");
    assert!(reports[0].stored.is_empty());
    assert_eq!(reports[0].failures.len(), 3);
    assert_eq!(reports[1].location, "work");
    assert!(reports[1].is_complete());
}

#[tokio::test]
async fn locate_resolves_a_coordinate_to_a_grid_point() {
    let server = MockServer::start().await;
    mount(
        &server,
        "/points/35.4887,-82.9881",
        ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "properties": {
                "gridId": "GSP",
                "gridX": 26,
                "gridY": 64,
                "relativeLocation": {
                    "properties": {"city": "Waynesville", "state": "NC"}
                }
            }
        })),
    )
    .await;

    let api = api(&server);
    let resolved = tokio::task::spawn_blocking(move || {
        let client = Client::new(&api).unwrap();
        client.get_grid(&Location::new(35.4887, -82.9881))
    })
    .await
    .unwrap()
    .unwrap();

    assert_eq!(resolved.point, gsp(26, 64));
    assert_eq!(resolved.place.as_deref(), Some("Waynesville, NC"));
}
