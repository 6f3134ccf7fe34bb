use crate::config::ApiConfig;
use crate::schema::Kind;
use reqwest::blocking;
use reqwest::header::{ACCEPT, USER_AGENT};
use serde_derive::{Deserialize, Serialize};
use serde_json::Value;
use std::f64::consts::PI;
use std::fmt;
use std::rc::Rc;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

mod geojson;

pub use geojson::forecast::{ForecastPeriod, GridpointForecast};
pub use geojson::gridpoint::{
    GridpointRaw, LayerValue, Layers, QuantitativeValueLayer, KNOWN_LAYERS,
};
pub use geojson::{GeoFeature, Geometry, QuantitativeValue, Timestamp};

pub(crate) use geojson::gridpoint::{has_layer_shape, is_known_layer};
pub(crate) use geojson::{coerce_float, coerce_int};

const R: f64 = 6371e3;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{url} returned status {status}")]
    Status { url: String, status: u16 },
    #[error("unexpected response document: {0}")]
    Decode(#[from] serde_json::Error),
}

#[derive(Debug)]
struct ClientState {
    ua: String,
    root: String,
    client: blocking::Client,
}

#[derive(Clone, Debug)]
pub struct Client {
    state: Rc<ClientState>,
}

impl Client {
    pub fn new(api: &ApiConfig) -> Result<Client, FetchError> {
        let client = blocking::Client::builder()
            .timeout(Duration::from_secs(api.timeout_secs))
            .build()?;
        Ok(Client {
            state: Rc::new(ClientState {
                ua: api.user_agent.clone(),
                root: api.root.trim_end_matches('/').to_string(),
                client,
            }),
        })
    }

    /// Resolves a coordinate to the forecast office grid square covering it.
    pub fn get_grid(&self, loc: &Location) -> Result<Resolved, FetchError> {
        let url = format!(
            "{}/points/{:.4},{:.4}",
            self.state.root,
            loc.lat(),
            loc.lng()
        );
        let res: geojson::points::Response = serde_json::from_value(self.get_json(url)?)?;
        Ok(Resolved {
            point: res.to_grid_point(),
            place: res.place(),
        })
    }

    pub fn grid(&self, point: &GridPoint) -> Grid {
        Grid {
            client: self.clone(),
            point: point.clone(),
        }
    }

    fn get_json(&self, url: String) -> Result<Value, FetchError> {
        debug!(%url, "requesting");
        let res = self
            .state
            .client
            .get(&url)
            .header(USER_AGENT, &self.state.ua)
            .header(ACCEPT, "application/geo+json")
            .send()?;
        let status = res.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url,
                status: status.as_u16(),
            });
        }
        Ok(res.json::<Value>()?)
    }
}

/// A forecast office and the x/y of one of its 2.5km grid squares.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridPoint {
    pub office: String,
    pub x: i64,
    pub y: i64,
}

impl fmt::Display for GridPoint {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}/{},{}", self.office, self.x, self.y)
    }
}

#[derive(Debug)]
pub struct Resolved {
    pub point: GridPoint,
    pub place: Option<String>,
}

#[derive(Debug)]
pub struct Grid {
    client: Client,
    point: GridPoint,
}

impl Grid {
    pub fn url(&self, kind: Kind) -> String {
        format!(
            "{}/gridpoints/{}/{},{}{}",
            self.client.state.root,
            self.point.office,
            self.point.x,
            self.point.y,
            kind.endpoint()
        )
    }

    /// Fetches the document for `kind` without interpreting it.
    pub fn fetch(&self, kind: Kind) -> Result<Value, FetchError> {
        self.client.get_json(self.url(kind))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Location {
    lat: f64,
    lng: f64,
}

impl Location {
    pub fn new(lat: f64, lng: f64) -> Location {
        Location { lat, lng }
    }

    pub fn lat(&self) -> f64 {
        self.lat
    }

    pub fn lng(&self) -> f64 {
        self.lng
    }

    pub fn to_dms(&self) -> String {
        let (lat_d, lat_m, lat_s) = to_dms(self.lat);
        let (lng_d, lng_m, lng_s) = to_dms(self.lng);
        format!(
            "{:02}°{:02}′{:02}″{} {:03}°{:02}′{:02}″{}",
            lat_d,
            lat_m,
            lat_s,
            if self.lat < 0.0 { 'S' } else { 'N' },
            lng_d,
            lng_m,
            lng_s,
            if self.lng < 0.0 { 'W' } else { 'E' }
        )
    }

    pub fn distance_between(a: &Location, b: &Location) -> Distance {
        let φ1 = a.lat() * PI / 180.0;
        let φ2 = b.lat() * PI / 180.0;

        let δφ = (b.lat() - a.lat()) * PI / 180.0;
        let δλ = (b.lng() - a.lng()) * PI / 180.0;

        let a = (δφ / 2.0).sin() * (δφ / 2.0).sin()
            + φ1.cos() * φ2.cos() * (δλ / 2.0).sin() * (δλ / 2.0).sin();
        let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

        Distance::from_meters(R * c)
    }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.to_dms())
    }
}

#[derive(Debug, Error)]
#[error("invalid location: {0}")]
pub struct ParseLocationError(String);

impl FromStr for Location {
    type Err = ParseLocationError;

    /// Accepts decimal degrees (`35.4887,-82.9881`) or DMS
    /// (`35°29′19″N 082°59′17″W`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ParseLocationError(s.to_string());

        if let Some((lat, lng)) = s.split_once(',') {
            let lat = lat.trim().parse::<f64>().map_err(|_| invalid())?;
            let lng = lng.trim().parse::<f64>().map_err(|_| invalid())?;
            if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lng) {
                return Err(invalid());
            }
            return Ok(Location { lat, lng });
        }

        let re = regex::Regex::new(
            r#"(\d+)°(\d+)[′'](\d+)[″"]([NSns]) (\d+)°(\d+)[′'](\d+)[″"]([EWew])"#,
        )
        .map_err(|e| ParseLocationError(e.to_string()))?;

        let caps = re.captures(s).ok_or_else(invalid)?;
        let part = |i: usize| caps[i].parse::<i32>().map_err(|_| invalid());

        let lat_v = part(1)? as f64 + part(2)? as f64 / 60.0 + part(3)? as f64 / 3600.0;
        let lat_v = match &caps[4] {
            "N" | "n" => lat_v,
            _ => -lat_v,
        };

        let lng_v = part(5)? as f64 + part(6)? as f64 / 60.0 + part(7)? as f64 / 3600.0;
        let lng_v = match &caps[8] {
            "E" | "e" => lng_v,
            _ => -lng_v,
        };

        Ok(Location {
            lat: lat_v,
            lng: lng_v,
        })
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Distance {
    m: f64,
}

impl Distance {
    pub fn from_meters(m: f64) -> Distance {
        Distance { m }
    }

    pub fn in_kilometers(&self) -> f64 {
        self.m / 1000.0
    }
}

impl std::fmt::Display for Distance {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{:.1} km", self.in_kilometers())
    }
}

fn to_dms(v: f64) -> (i32, i32, i32) {
    let v = v.abs();

    let mut d = v as i32;

    let v = v - d as f64;

    let mut m = (v * 60.0) as i32;

    let v = v - m as f64 / 60.0;

    let mut s = (v * 3600.0).round() as i32;

    if s == 60 {
        s = 0;
        m += 1;
    }

    if m == 60 {
        m = 0;
        d += 1;
    }

    (d, m, s)
}
