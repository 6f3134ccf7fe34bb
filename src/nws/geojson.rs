//! Wire shapes returned by api.weather.gov, kept in the same form in the cache.
//!
//! Members the API sends that are not modelled here are carried in `extra`
//! maps so that a decoded document serialises back without losing fields.

use super::{GridPoint, Location};
use chrono::{DateTime, FixedOffset};
use serde_derive::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use std::fmt;
use std::str::FromStr;

/// An ISO 8601 instant that serialises back to the text it was parsed from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timestamp {
    text: String,
    at: DateTime<FixedOffset>,
}

impl Timestamp {
    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn at(&self) -> DateTime<FixedOffset> {
        self.at
    }
}

impl FromStr for Timestamp {
    type Err = chrono::ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Timestamp {
            text: s.to_string(),
            at: s.parse()?,
        })
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl serde::Serialize for Timestamp {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.text)
    }
}

impl<'de> serde::Deserialize<'de> for Timestamp {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text: String = serde::Deserialize::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

/// A measurement with a unit code such as `wmoUnit:degC` or `wmoUnit:m`.
///
/// The value is kept as sent, so `0` stays `0` and `0.0` stays `0.0`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuantitativeValue {
    #[serde(default, deserialize_with = "lenient::number")]
    value: Value,
    #[serde(rename = "unitCode")]
    pub unit_code: String,
}

impl QuantitativeValue {
    /// `None` when the API reports `null`, e.g. an unknown precipitation chance.
    pub fn value(&self) -> Option<f64> {
        coerce_float(&self.value)
    }

    /// The unit code without its namespace, `wmoUnit:degC` becomes `degC`.
    pub fn unit(&self) -> &str {
        match self.unit_code.split_once(':') {
            Some((_, unit)) => unit,
            None => &self.unit_code,
        }
    }
}

impl fmt::Display for QuantitativeValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.value {
            Value::Null => write!(f, "-- {}", self.unit()),
            Value::String(v) => write!(f, "{} {}", v, self.unit()),
            v => write!(f, "{} {}", v, self.unit()),
        }
    }
}

/// The `geometry` member of a feature. Positions are `(lng, lat)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Geometry {
    #[serde(rename = "type")]
    pub geometry_type: String,
    pub coordinates: Vec<Vec<(Number, Number)>>,
}

impl Geometry {
    /// Average of the outer ring's vertices, ignoring the closing vertex.
    pub fn centroid(&self) -> Option<Location> {
        let ring = self.outer_ring();
        if ring.is_empty() {
            return None;
        }
        let n = ring.len() as f64;
        let (lng, lat) = ring
            .iter()
            .fold((0.0, 0.0), |(lng, lat), (x, y)| (lng + x, lat + y));
        Some(Location::new(lat / n, lng / n))
    }

    /// South-west and north-east corners of the outer ring's bounding box.
    pub fn extent(&self) -> Option<(Location, Location)> {
        let ring = self.outer_ring();
        let (first_lng, first_lat) = *ring.first()?;
        let (mut min_lng, mut min_lat, mut max_lng, mut max_lat) =
            (first_lng, first_lat, first_lng, first_lat);
        for &(lng, lat) in &ring {
            min_lng = min_lng.min(lng);
            max_lng = max_lng.max(lng);
            min_lat = min_lat.min(lat);
            max_lat = max_lat.max(lat);
        }
        Some((
            Location::new(min_lat, min_lng),
            Location::new(max_lat, max_lng),
        ))
    }

    fn outer_ring(&self) -> Vec<(f64, f64)> {
        let mut ring: Vec<(f64, f64)> = match self.coordinates.first() {
            Some(ring) => ring
                .iter()
                .filter_map(|(lng, lat)| Some((lng.as_f64()?, lat.as_f64()?)))
                .collect(),
            None => return Vec::new(),
        };
        if ring.len() > 1 && ring.first() == ring.last() {
            ring.pop();
        }
        ring
    }
}

/// A GeoJSON feature whose `properties` hold one of the forecast shapes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoFeature<T> {
    pub geometry: Geometry,
    pub properties: T,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Response of `/points/{lat},{lng}`.
pub mod points {
    use super::GridPoint;
    use serde_derive::Deserialize;

    #[derive(Debug, Deserialize)]
    pub struct Response {
        properties: Properties,
    }

    impl Response {
        pub fn to_grid_point(&self) -> GridPoint {
            GridPoint {
                office: self.properties.grid_id.clone(),
                x: self.properties.grid_x,
                y: self.properties.grid_y,
            }
        }

        pub fn place(&self) -> Option<String> {
            let place = &self.properties.relative_location.as_ref()?.properties;
            Some(format!("{}, {}", place.city, place.state))
        }
    }

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct Properties {
        grid_id: String,
        grid_x: i64,
        grid_y: i64,
        relative_location: Option<RelativeLocation>,
    }

    #[derive(Debug, Deserialize)]
    struct RelativeLocation {
        properties: Place,
    }

    #[derive(Debug, Deserialize)]
    struct Place {
        city: String,
        state: String,
    }
}

/// Shapes of `/forecast` and `/forecast/hourly`, which differ only in cadence.
pub mod forecast {
    use super::{lenient, QuantitativeValue, Timestamp};
    use serde_derive::{Deserialize, Serialize};
    use serde_json::{Map, Value};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ForecastPeriod {
        #[serde(deserialize_with = "lenient::int")]
        pub number: i64,
        pub name: String,
        pub start_time: Timestamp,
        pub end_time: Timestamp,
        pub is_daytime: bool,
        #[serde(default, deserialize_with = "lenient::opt_int")]
        pub temperature: Option<i64>,
        #[serde(default)]
        pub temperature_unit: Option<String>,
        #[serde(default)]
        pub temperature_trend: Option<String>,
        #[serde(default)]
        pub probability_of_precipitation: Option<QuantitativeValue>,
        #[serde(default)]
        pub wind_speed: Option<String>,
        #[serde(default)]
        pub wind_direction: Option<String>,
        #[serde(default)]
        pub icon: Option<String>,
        #[serde(default)]
        pub short_forecast: Option<String>,
        #[serde(default)]
        pub detailed_forecast: Option<String>,
        #[serde(flatten)]
        pub extra: Map<String, Value>,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct GridpointForecast {
        pub units: String,
        pub forecast_generator: String,
        pub generated_at: Timestamp,
        pub update_time: Timestamp,
        pub valid_times: String,
        pub elevation: QuantitativeValue,
        pub periods: Vec<ForecastPeriod>,
        #[serde(flatten)]
        pub extra: Map<String, Value>,
    }
}

/// Shape of the raw `/gridpoints/{office}/{x},{y}` document.
pub mod gridpoint {
    use super::{lenient, QuantitativeValue, Timestamp};
    use serde::ser::SerializeMap;
    use serde_derive::{Deserialize, Serialize};
    use serde_json::{Map, Value};
    use std::collections::BTreeMap;
    use std::fmt;

    /// Layer names the API is known to publish. When one of these is present
    /// and not `null` it must have the layer shape.
    pub const KNOWN_LAYERS: &[&str] = &[
        "temperature",
        "dewpoint",
        "maxTemperature",
        "minTemperature",
        "relativeHumidity",
        "apparentTemperature",
        "heatIndex",
        "windChill",
        "skyCover",
        "windDirection",
        "windSpeed",
        "windGust",
        "probabilityOfPrecipitation",
        "quantitativePrecipitation",
        "iceAccumulation",
        "snowfallAmount",
        "snowLevel",
        "ceilingHeight",
        "visibility",
        "transportWindSpeed",
        "transportWindDirection",
        "mixingHeight",
        "hainesIndex",
        "lightningActivityLevel",
        "twentyFootWindSpeed",
        "twentyFootWindDirection",
        "waveHeight",
        "wavePeriod",
        "waveDirection",
        "primarySwellHeight",
        "primarySwellDirection",
        "secondarySwellHeight",
        "secondarySwellDirection",
        "wavePeriod2",
        "windWaveHeight",
        "dispersionIndex",
        "pressure",
        "probabilityOfTropicalStormWinds",
        "probabilityOfHurricaneWinds",
        "potentialOf15mphWinds",
        "potentialOf25mphWinds",
        "potentialOf35mphWinds",
        "potentialOf45mphWinds",
        "potentialOf20mphWindGusts",
        "potentialOf30mphWindGusts",
        "potentialOf40mphWindGusts",
        "potentialOf50mphWindGusts",
        "potentialOf60mphWindGusts",
        "grasslandFireDangerIndex",
        "probabilityOfThunder",
        "davisStabilityIndex",
        "atmosphericDispersionIndex",
        "lowVisibilityOccurrenceRiskIndex",
        "stability",
        "redFlagThreatIndex",
    ];

    pub fn is_known_layer(name: &str) -> bool {
        KNOWN_LAYERS.contains(&name)
    }

    /// Whether a member looks like a layer: an object carrying `uom` and `values`.
    pub fn has_layer_shape(value: &Value) -> bool {
        value
            .as_object()
            .map_or(false, |o| o.contains_key("uom") && o.contains_key("values"))
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct GridpointRaw {
        pub update_time: Timestamp,
        pub valid_times: String,
        pub elevation: QuantitativeValue,
        pub forecast_office: String,
        pub grid_id: String,
        #[serde(deserialize_with = "lenient::int")]
        pub grid_x: i64,
        #[serde(deserialize_with = "lenient::int")]
        pub grid_y: i64,
        #[serde(flatten)]
        pub layers: Layers,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct QuantitativeValueLayer {
        #[serde(rename = "uom")]
        pub unit_of_measure: String,
        pub values: Vec<LayerValue>,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct LayerValue {
        /// ISO 8601 interval, e.g. `2024-01-01T00:00:00+00:00/PT1H`.
        pub valid_time: String,
        pub value: Value,
    }

    impl fmt::Display for LayerValue {
        fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
            write!(f, "{} --> {}", self.valid_time, self.value)
        }
    }

    /// Every member of the raw properties not covered by a named field.
    ///
    /// Known layers must decode. Any other member that decodes as a layer is
    /// typed too, and everything else (`weather`, `hazards`, `@id`, ...) is
    /// kept as-is.
    #[derive(Debug, Clone, Default, PartialEq)]
    pub struct Layers {
        typed: BTreeMap<String, QuantitativeValueLayer>,
        other: Map<String, Value>,
    }

    impl Layers {
        pub fn from_members(members: Map<String, Value>) -> Result<Layers, serde_json::Error> {
            let mut layers = Layers::default();
            for (name, value) in members {
                if is_known_layer(&name) && !value.is_null() {
                    if !has_layer_shape(&value) {
                        return Err(serde::de::Error::custom(format!(
                            "layer {} is missing uom or values",
                            name
                        )));
                    }
                    let layer = serde_json::from_value(value)?;
                    layers.typed.insert(name, layer);
                } else if has_layer_shape(&value) {
                    match <QuantitativeValueLayer as serde::Deserialize>::deserialize(&value) {
                        Ok(layer) => {
                            layers.typed.insert(name, layer);
                        }
                        Err(_) => {
                            layers.other.insert(name, value);
                        }
                    }
                } else {
                    layers.other.insert(name, value);
                }
            }
            Ok(layers)
        }

        pub fn get(&self, name: &str) -> Option<&QuantitativeValueLayer> {
            self.typed.get(name)
        }

        pub fn names(&self) -> impl Iterator<Item = &str> {
            self.typed.keys().map(String::as_str)
        }

        pub fn iter(&self) -> impl Iterator<Item = (&str, &QuantitativeValueLayer)> {
            self.typed.iter().map(|(k, v)| (k.as_str(), v))
        }

        /// Members that are not layers.
        pub fn other(&self) -> &Map<String, Value> {
            &self.other
        }
    }

    impl serde::Serialize for Layers {
        fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            let len = self.typed.len() + self.other.len();
            let mut map = serializer.serialize_map(Some(len))?;
            for (name, layer) in &self.typed {
                map.serialize_entry(name, layer)?;
            }
            for (name, value) in &self.other {
                map.serialize_entry(name, value)?;
            }
            map.end()
        }
    }

    impl<'de> serde::Deserialize<'de> for Layers {
        fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
            let members: Map<String, Value> = serde::Deserialize::deserialize(deserializer)?;
            Layers::from_members(members).map_err(serde::de::Error::custom)
        }
    }
}

/// Integer fields accept whole floats and numeric strings, floats accept
/// numeric strings, matching what the upstream API has been seen to send.
pub(crate) fn coerce_int(v: &Value) -> Option<i64> {
    match v {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && f.fract() == 0.0)
                .map(|f| f as i64)
        }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub(crate) fn coerce_float(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

mod lenient {
    use serde::de::{Deserializer, Error};
    use serde_json::Value;

    pub fn int<'de, D: Deserializer<'de>>(d: D) -> Result<i64, D::Error> {
        let v: Value = serde::Deserialize::deserialize(d)?;
        super::coerce_int(&v)
            .ok_or_else(|| Error::custom(format!("expected an integer, got {}", v)))
    }

    pub fn opt_int<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i64>, D::Error> {
        let v: Value = serde::Deserialize::deserialize(d)?;
        if v.is_null() {
            return Ok(None);
        }
        super::coerce_int(&v)
            .map(Some)
            .ok_or_else(|| Error::custom(format!("expected an integer, got {}", v)))
    }

    /// A number, a numeric string or `null`, returned untouched.
    pub fn number<'de, D: Deserializer<'de>>(d: D) -> Result<Value, D::Error> {
        let v: Value = serde::Deserialize::deserialize(d)?;
        if v.is_null() || super::coerce_float(&v).is_some() {
            Ok(v)
        } else {
            Err(Error::custom(format!("expected a number, got {}", v)))
        }
    }
}
