//! The three forecast shapes and the envelope that tags a document with its
//! shape.
//!
//! Documents are checked structurally before they are decoded, so a payload
//! that is wrong in several places reports every problem at once rather
//! than the first one serde trips over.

use crate::nws::{
    coerce_float, coerce_int, has_layer_shape, is_known_layer, GeoFeature, Geometry,
    GridpointForecast, GridpointRaw,
};
use chrono::{DateTime, Duration, FixedOffset};
use serde_derive::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::ops::Deref;
use std::str::FromStr;
use thiserror::Error;

/// Which forecast a document holds. Serialised as `"12h"`, `"hourly"` or
/// `"gridpoint"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Kind {
    #[serde(rename = "12h")]
    TwelveHour,
    #[serde(rename = "hourly")]
    Hourly,
    #[serde(rename = "gridpoint")]
    Gridpoint,
}

impl Kind {
    pub const ALL: [Kind; 3] = [Kind::TwelveHour, Kind::Hourly, Kind::Gridpoint];

    pub fn as_str(self) -> &'static str {
        match self {
            Kind::TwelveHour => "12h",
            Kind::Hourly => "hourly",
            Kind::Gridpoint => "gridpoint",
        }
    }

    /// The word used for this kind in cache file names.
    pub fn cache_tag(self) -> &'static str {
        match self {
            Kind::TwelveHour => "FORECAST",
            Kind::Hourly => "HOURLY",
            Kind::Gridpoint => "RAW",
        }
    }

    pub fn from_cache_tag(tag: &str) -> Option<Kind> {
        Kind::ALL.into_iter().find(|k| k.cache_tag() == tag)
    }

    /// Path appended to `/gridpoints/{office}/{x},{y}`.
    pub fn endpoint(self) -> &'static str {
        match self {
            Kind::TwelveHour => "/forecast",
            Kind::Hourly => "/forecast/hourly",
            Kind::Gridpoint => "",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("unknown forecast kind {0:?}, expected one of 12h, hourly, gridpoint")]
pub struct UnknownKind(String);

impl FromStr for Kind {
    type Err = UnknownKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Kind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| UnknownKind(s.to_string()))
    }
}

/// The concrete shape a document of a given kind must have.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaVariant {
    TwelveHourForecast,
    HourlyForecast,
    RawGridpoint,
}

impl SchemaVariant {
    pub fn kind(self) -> Kind {
        match self {
            SchemaVariant::TwelveHourForecast => Kind::TwelveHour,
            SchemaVariant::HourlyForecast => Kind::Hourly,
            SchemaVariant::RawGridpoint => Kind::Gridpoint,
        }
    }

    /// Members of `properties` that must be present and non-null.
    pub fn required_properties(self) -> &'static [&'static str] {
        match self {
            SchemaVariant::TwelveHourForecast | SchemaVariant::HourlyForecast => &[
                "units",
                "forecastGenerator",
                "generatedAt",
                "updateTime",
                "validTimes",
                "elevation",
                "periods",
            ],
            SchemaVariant::RawGridpoint => &[
                "updateTime",
                "validTimes",
                "elevation",
                "forecastOffice",
                "gridId",
                "gridX",
                "gridY",
            ],
        }
    }
}

pub fn discriminate(kind: Kind) -> SchemaVariant {
    match kind {
        Kind::TwelveHour => SchemaVariant::TwelveHourForecast,
        Kind::Hourly => SchemaVariant::HourlyForecast,
        Kind::Gridpoint => SchemaVariant::RawGridpoint,
    }
}

macro_rules! validated_feature {
    ($(#[$doc:meta])* $name:ident, $properties:ty) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Serialize)]
        #[serde(transparent)]
        pub struct $name(GeoFeature<$properties>);

        impl $name {
            pub fn feature(&self) -> &GeoFeature<$properties> {
                &self.0
            }

            pub fn into_feature(self) -> GeoFeature<$properties> {
                self.0
            }
        }

        impl Deref for $name {
            type Target = GeoFeature<$properties>;

            fn deref(&self) -> &Self::Target {
                &self.0
            }
        }
    };
}

validated_feature!(
    /// A feature that passed validation as a 12h forecast.
    TwelveHourFeature,
    GridpointForecast
);
validated_feature!(
    /// A feature that passed validation as an hourly forecast.
    HourlyFeature,
    GridpointForecast
);
validated_feature!(
    /// A feature that passed validation as raw gridpoint data.
    GridpointFeature,
    GridpointRaw
);

/// A validated forecast document tagged with its kind.
///
/// Serialises as `{"kind": ..., "data": ...}`. Deserialising runs the same
/// validation as [`validate`], so `data` always fits `kind`. The payload
/// types can only be built by validation, so a 12h feature cannot be
/// relabelled as hourly:
///
/// ```compile_fail
/// use nws_forecast::nws::{GeoFeature, GridpointForecast};
/// use nws_forecast::schema::{ForecastEnvelope, HourlyFeature};
///
/// fn relabel(feature: GeoFeature<GridpointForecast>) -> ForecastEnvelope {
///     ForecastEnvelope::Hourly(HourlyFeature(feature))
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "data")]
pub enum ForecastEnvelope {
    #[serde(rename = "12h")]
    TwelveHour(TwelveHourFeature),
    #[serde(rename = "hourly")]
    Hourly(HourlyFeature),
    #[serde(rename = "gridpoint")]
    Gridpoint(GridpointFeature),
}

impl ForecastEnvelope {
    pub fn kind(&self) -> Kind {
        match self {
            ForecastEnvelope::TwelveHour(_) => Kind::TwelveHour,
            ForecastEnvelope::Hourly(_) => Kind::Hourly,
            ForecastEnvelope::Gridpoint(_) => Kind::Gridpoint,
        }
    }

    pub fn geometry(&self) -> &Geometry {
        match self {
            ForecastEnvelope::TwelveHour(f) => &f.geometry,
            ForecastEnvelope::Hourly(f) => &f.geometry,
            ForecastEnvelope::Gridpoint(f) => &f.geometry,
        }
    }

    /// The forecast properties, for the 12h and hourly kinds.
    pub fn forecast(&self) -> Option<&GridpointForecast> {
        match self {
            ForecastEnvelope::TwelveHour(f) => Some(&f.properties),
            ForecastEnvelope::Hourly(f) => Some(&f.properties),
            ForecastEnvelope::Gridpoint(_) => None,
        }
    }

    pub fn gridpoint(&self) -> Option<&GridpointRaw> {
        match self {
            ForecastEnvelope::Gridpoint(f) => Some(&f.properties),
            _ => None,
        }
    }

    /// `data.properties` as JSON.
    pub fn properties_json(&self) -> Result<Value, serde_json::Error> {
        match self {
            ForecastEnvelope::TwelveHour(f) => serde_json::to_value(&f.properties),
            ForecastEnvelope::Hourly(f) => serde_json::to_value(&f.properties),
            ForecastEnvelope::Gridpoint(f) => serde_json::to_value(&f.properties),
        }
    }
}

impl<'de> serde::Deserialize<'de> for ForecastEnvelope {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct Tagged {
            kind: Kind,
            data: Value,
        }

        let tagged: Tagged = serde::Deserialize::deserialize(deserializer)?;
        validate(&tagged.data, tagged.kind).map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Problem {
    #[error("missing")]
    Missing,
    #[error("expected {0}")]
    WrongType(&'static str),
    #[error("must not be empty")]
    Empty,
    #[error("not an ISO 8601 timestamp: {0:?}")]
    BadTimestamp(String),
    #[error("ends before it starts")]
    EndsBeforeStart,
    #[error("period number {number} does not follow {previous}")]
    OutOfSequence { previous: i64, number: i64 },
    #[error("periods have the cadence of a {0} forecast")]
    Cadence(Kind),
    #[error("{0}")]
    Decode(String),
}

/// One failed check, located by a dotted path such as
/// `properties.periods[2].startTime`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub path: String,
    pub problem: Problem,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.problem)
    }
}

#[derive(Debug, Clone, Error)]
#[error("{kind} payload failed validation: {}", join(.violations))]
pub struct ValidationError {
    kind: Kind,
    violations: Vec<Violation>,
}

impl ValidationError {
    pub fn kind(&self) -> Kind {
        self.kind
    }

    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    /// Whether any violation sits at exactly `path`.
    pub fn has_violation_at(&self, path: &str) -> bool {
        self.violations.iter().any(|v| v.path == path)
    }
}

fn join(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Checks `raw` against the shape required by `kind` and decodes it.
pub fn validate(raw: &Value, kind: Kind) -> Result<ForecastEnvelope, ValidationError> {
    let variant = discriminate(kind);
    let mut checker = Checker::default();
    checker.feature(raw, variant);
    if !checker.violations.is_empty() {
        return Err(ValidationError {
            kind,
            violations: checker.violations,
        });
    }

    let decoded = match variant {
        SchemaVariant::TwelveHourForecast => serde::Deserialize::deserialize(raw)
            .map(|f| ForecastEnvelope::TwelveHour(TwelveHourFeature(f))),
        SchemaVariant::HourlyForecast => serde::Deserialize::deserialize(raw)
            .map(|f| ForecastEnvelope::Hourly(HourlyFeature(f))),
        SchemaVariant::RawGridpoint => serde::Deserialize::deserialize(raw)
            .map(|f| ForecastEnvelope::Gridpoint(GridpointFeature(f))),
    };
    decoded.map_err(|e: serde_json::Error| ValidationError {
        kind,
        violations: vec![Violation {
            path: "$".to_string(),
            problem: Problem::Decode(e.to_string()),
        }],
    })
}

/// Classifies a period list by how long its periods are: any period longer
/// than an hour means 12h, two or more periods of at most an hour mean
/// hourly. A single short period is ambiguous.
fn cadence(spans: &[Duration]) -> Option<Kind> {
    if spans.iter().any(|d| *d > Duration::hours(1)) {
        Some(Kind::TwelveHour)
    } else if spans.len() >= 2 {
        Some(Kind::Hourly)
    } else {
        None
    }
}

#[derive(Default)]
struct Checker {
    violations: Vec<Violation>,
}

impl Checker {
    fn push(&mut self, path: impl Into<String>, problem: Problem) {
        self.violations.push(Violation {
            path: path.into(),
            problem,
        });
    }

    fn feature(&mut self, raw: &Value, variant: SchemaVariant) {
        let Some(feature) = self.object(raw, "$") else {
            return;
        };

        if let Some(geometry) = self.required(feature, "", "geometry") {
            self.geometry(geometry, "geometry");
        }

        let Some(properties) = self.required(feature, "", "properties") else {
            return;
        };
        let Some(properties) = self.object(properties, "properties") else {
            return;
        };

        for name in variant.required_properties() {
            if properties.get(*name).map_or(true, Value::is_null) {
                self.push(format!("properties.{}", name), Problem::Missing);
            }
        }

        match variant {
            SchemaVariant::TwelveHourForecast | SchemaVariant::HourlyForecast => {
                self.forecast(properties, variant.kind())
            }
            SchemaVariant::RawGridpoint => self.gridpoint(properties),
        }
    }

    fn geometry(&mut self, value: &Value, path: &str) {
        let Some(geometry) = self.object(value, path) else {
            return;
        };
        self.string(geometry, path, "type");
        let Some(coordinates) = self.required(geometry, path, "coordinates") else {
            return;
        };
        let path = format!("{}.coordinates", path);
        let Some(rings) = self.array(coordinates, &path) else {
            return;
        };
        for (i, ring) in rings.iter().enumerate() {
            let ring_path = format!("{}[{}]", path, i);
            let Some(positions) = self.array(ring, &ring_path) else {
                continue;
            };
            for (j, position) in positions.iter().enumerate() {
                let ok = position.as_array().map_or(false, |p| {
                    p.len() == 2 && p.iter().all(|c| c.is_number())
                });
                if !ok {
                    self.push(format!("{}[{}]", ring_path, j), Problem::WrongType("[lng, lat]"));
                }
            }
        }
    }

    fn forecast(&mut self, properties: &Map<String, Value>, kind: Kind) {
        let path = "properties";
        self.string(properties, path, "units");
        self.string(properties, path, "forecastGenerator");
        self.timestamp(properties, path, "generatedAt");
        self.timestamp(properties, path, "updateTime");
        self.string(properties, path, "validTimes");
        self.quantity_member(properties, path, "elevation");

        let Some(periods) = properties.get("periods").filter(|v| !v.is_null()) else {
            return;
        };
        let Some(periods) = self.array(periods, "properties.periods") else {
            return;
        };

        let mut previous: Option<i64> = None;
        let mut spans = Vec::with_capacity(periods.len());
        for (i, period) in periods.iter().enumerate() {
            let path = format!("properties.periods[{}]", i);
            let Some(period) = self.object(period, &path) else {
                continue;
            };

            if let Some(number) = self.int(period, &path, "number") {
                if let Some(prev) = previous {
                    if number <= prev {
                        self.push(
                            format!("{}.number", path),
                            Problem::OutOfSequence {
                                previous: prev,
                                number,
                            },
                        );
                    }
                }
                previous = Some(number);
            }
            self.string(period, &path, "name");
            let start = self.timestamp(period, &path, "startTime");
            let end = self.timestamp(period, &path, "endTime");
            self.bool(period, &path, "isDaytime");
            if let (Some(start), Some(end)) = (start, end) {
                if end <= start {
                    self.push(format!("{}.endTime", path), Problem::EndsBeforeStart);
                } else {
                    spans.push(end - start);
                }
            }

            self.optional_int(period, &path, "temperature");
            for name in [
                "temperatureUnit",
                "temperatureTrend",
                "windSpeed",
                "windDirection",
                "icon",
                "shortForecast",
                "detailedForecast",
            ] {
                self.optional_string(period, &path, name);
            }
            if period
                .get("probabilityOfPrecipitation")
                .map_or(false, |v| !v.is_null())
            {
                self.quantity_member(period, &path, "probabilityOfPrecipitation");
            }
        }

        match cadence(&spans) {
            Some(found) if found != kind => {
                self.push("properties.periods", Problem::Cadence(found))
            }
            _ => {}
        }
    }

    fn gridpoint(&mut self, properties: &Map<String, Value>) {
        let path = "properties";
        self.timestamp(properties, path, "updateTime");
        self.string(properties, path, "validTimes");
        self.quantity_member(properties, path, "elevation");
        self.string(properties, path, "forecastOffice");
        self.string(properties, path, "gridId");
        self.int(properties, path, "gridX");
        self.int(properties, path, "gridY");

        // Unknown members pass through unchecked.
        for (name, value) in properties {
            if !is_known_layer(name) || value.is_null() {
                continue;
            }
            let layer_path = format!("properties.{}", name);
            if has_layer_shape(value) {
                self.layer(value, &layer_path);
            } else {
                self.push(layer_path, Problem::WrongType("a layer with uom and values"));
            }
        }
    }

    fn layer(&mut self, value: &Value, path: &str) {
        let Some(layer) = self.object(value, path) else {
            return;
        };
        if let Some(uom) = self.string(layer, path, "uom") {
            if uom.is_empty() {
                self.push(format!("{}.uom", path), Problem::Empty);
            }
        }
        let Some(values) = layer.get("values") else {
            return;
        };
        let values_path = format!("{}.values", path);
        let Some(values) = self.array(values, &values_path) else {
            return;
        };
        for (i, entry) in values.iter().enumerate() {
            let entry_path = format!("{}[{}]", values_path, i);
            let Some(entry) = self.object(entry, &entry_path) else {
                continue;
            };
            self.string(entry, &entry_path, "validTime");
            if !entry.contains_key("value") {
                self.push(format!("{}.value", entry_path), Problem::Missing);
            }
        }
    }

    fn quantity_member(&mut self, parent: &Map<String, Value>, path: &str, name: &str) {
        let Some(value) = parent.get(name).filter(|v| !v.is_null()) else {
            return;
        };
        let path = format!("{}.{}", path, name);
        let Some(quantity) = self.object(value, &path) else {
            return;
        };
        if let Some(unit) = self.string(quantity, &path, "unitCode") {
            if unit.is_empty() {
                self.push(format!("{}.unitCode", path), Problem::Empty);
            }
        }
        match quantity.get("value") {
            None => self.push(format!("{}.value", path), Problem::Missing),
            Some(Value::Null) => {}
            Some(v) if coerce_float(v).is_some() => {}
            Some(_) => self.push(format!("{}.value", path), Problem::WrongType("a number")),
        }
    }

    fn object<'a>(&mut self, value: &'a Value, path: &str) -> Option<&'a Map<String, Value>> {
        let object = value.as_object();
        if object.is_none() {
            self.push(path, Problem::WrongType("an object"));
        }
        object
    }

    fn array<'a>(&mut self, value: &'a Value, path: &str) -> Option<&'a Vec<Value>> {
        let array = value.as_array();
        if array.is_none() {
            self.push(path, Problem::WrongType("an array"));
        }
        array
    }

    /// Looks up a member that must be present. Missing members of
    /// `properties` are reported once, by [`Checker::feature`].
    fn required<'a>(
        &mut self,
        parent: &'a Map<String, Value>,
        path: &str,
        name: &str,
    ) -> Option<&'a Value> {
        match parent.get(name) {
            Some(v) if !v.is_null() => Some(v),
            _ => {
                if path != "properties" {
                    self.push(join_path(path, name), Problem::Missing);
                }
                None
            }
        }
    }

    fn string<'a>(
        &mut self,
        parent: &'a Map<String, Value>,
        path: &str,
        name: &str,
    ) -> Option<&'a str> {
        let value = self.required(parent, path, name)?;
        let s = value.as_str();
        if s.is_none() {
            self.push(join_path(path, name), Problem::WrongType("a string"));
        }
        s
    }

    fn int(&mut self, parent: &Map<String, Value>, path: &str, name: &str) -> Option<i64> {
        let value = self.required(parent, path, name)?;
        let n = coerce_int(value);
        if n.is_none() {
            self.push(join_path(path, name), Problem::WrongType("an integer"));
        }
        n
    }

    fn bool(&mut self, parent: &Map<String, Value>, path: &str, name: &str) {
        if let Some(value) = self.required(parent, path, name) {
            if !value.is_boolean() {
                self.push(join_path(path, name), Problem::WrongType("a boolean"));
            }
        }
    }

    fn timestamp(
        &mut self,
        parent: &Map<String, Value>,
        path: &str,
        name: &str,
    ) -> Option<DateTime<FixedOffset>> {
        let s = self.string(parent, path, name)?;
        match s.parse::<DateTime<FixedOffset>>() {
            Ok(t) => Some(t),
            Err(_) => {
                self.push(join_path(path, name), Problem::BadTimestamp(s.to_string()));
                None
            }
        }
    }

    fn optional_string(&mut self, parent: &Map<String, Value>, path: &str, name: &str) {
        match parent.get(name) {
            None | Some(Value::Null) | Some(Value::String(_)) => {}
            Some(_) => self.push(join_path(path, name), Problem::WrongType("a string")),
        }
    }

    fn optional_int(&mut self, parent: &Map<String, Value>, path: &str, name: &str) {
        match parent.get(name) {
            None | Some(Value::Null) => {}
            Some(v) if coerce_int(v).is_some() => {}
            Some(_) => self.push(join_path(path, name), Problem::WrongType("an integer")),
        }
    }
}

fn join_path(path: &str, name: &str) -> String {
    if path.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", path, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn period(number: i64, name: &str, start: &str, end: &str) -> Value {
        json!({
            "number": number,
            "name": name,
            "startTime": start,
            "endTime": end,
            "isDaytime": false,
            "temperature": 40,
            "temperatureUnit": "F",
            "shortForecast": "Clear"
        })
    }

    fn forecast(periods: Vec<Value>) -> Value {
        json!({
            "type": "Feature",
            "geometry": {"type": "Polygon", "coordinates": [[[1.0, 2.0]]]},
            "properties": {
                "units": "us",
                "forecastGenerator": "x",
                "generatedAt": "2024-01-01T00:00:00Z",
                "updateTime": "2024-01-01T00:00:00Z",
                "validTimes": "2024-01-01/P1D",
                "elevation": {"value": 100, "unitCode": "wmoUnit:m"},
                "periods": periods
            }
        })
    }

    fn hourly() -> Value {
        forecast(vec![
            period(1, "", "2024-01-01T01:00:00Z", "2024-01-01T02:00:00Z"),
            period(2, "", "2024-01-01T02:00:00Z", "2024-01-01T03:00:00Z"),
        ])
    }

    fn twelve_hour() -> Value {
        forecast(vec![
            period(1, "Tonight", "2024-01-01T18:00:00-05:00", "2024-01-02T06:00:00-05:00"),
            period(2, "Tuesday", "2024-01-02T06:00:00-05:00", "2024-01-02T18:00:00-05:00"),
        ])
    }

    fn raw() -> Value {
        json!({
            "geometry": {"type": "Polygon", "coordinates": [[[1.0, 2.0], [1.0, 3.0]]]},
            "properties": {
                "updateTime": "2024-01-01T00:00:00+00:00",
                "validTimes": "2024-01-01T00:00:00+00:00/P7D",
                "elevation": {"value": 640.08, "unitCode": "wmoUnit:m"},
                "forecastOffice": "https://api.weather.gov/offices/GSP",
                "gridId": "GSP",
                "gridX": 40,
                "gridY": 68,
                "temperature": {"uom": "wmoUnit:degC", "values": [
                    {"validTime": "2024-01-01T00:00:00+00:00/PT1H", "value": 3.3}
                ]},
                "weather": {"values": []}
            }
        })
    }

    #[test]
    fn kind_tags_round_trip_through_strings() {
        for kind in Kind::ALL {
            assert_eq!(kind.as_str().parse::<Kind>().unwrap(), kind);
            assert_eq!(Kind::from_cache_tag(kind.cache_tag()), Some(kind));
        }
        assert!("daily".parse::<Kind>().is_err());
        assert_eq!(Kind::from_cache_tag("FORCAST"), None);
    }

    #[test]
    fn discriminate_is_one_to_one() {
        for kind in Kind::ALL {
            assert_eq!(discriminate(kind).kind(), kind);
        }
    }

    #[test]
    fn hourly_document_validates_as_hourly() {
        let env = validate(&hourly(), Kind::Hourly).unwrap();
        assert_eq!(env.kind(), Kind::Hourly);
        let periods = &env.forecast().unwrap().periods;
        assert_eq!(periods.len(), 2);
        assert_eq!(periods[0].temperature, Some(40));
        assert_eq!(periods[0].detailed_forecast, None);
    }

    #[test]
    fn twelve_hour_document_is_not_hourly() {
        let err = validate(&twelve_hour(), Kind::Hourly).unwrap_err();
        assert_eq!(err.kind(), Kind::Hourly);
        assert_eq!(
            err.violations(),
            &[Violation {
                path: "properties.periods".to_string(),
                problem: Problem::Cadence(Kind::TwelveHour),
            }]
        );
    }

    #[test]
    fn hourly_document_is_not_twelve_hour() {
        let err = validate(&hourly(), Kind::TwelveHour).unwrap_err();
        assert!(err.has_violation_at("properties.periods"));
    }

    #[test]
    fn single_short_period_fits_either_forecast_kind() {
        let doc = forecast(vec![period(
            1,
            "This Afternoon",
            "2024-01-01T17:00:00Z",
            "2024-01-01T18:00:00Z",
        )]);
        assert!(validate(&doc, Kind::TwelveHour).is_ok());
        assert!(validate(&doc, Kind::Hourly).is_ok());
    }

    #[test]
    fn raw_document_is_not_a_forecast() {
        let err = validate(&raw(), Kind::TwelveHour).unwrap_err();
        assert!(err.has_violation_at("properties.periods"));
        assert!(err.has_violation_at("properties.units"));
        assert!(err.has_violation_at("properties.forecastGenerator"));
    }

    #[test]
    fn forecast_document_is_not_raw() {
        let err = validate(&hourly(), Kind::Gridpoint).unwrap_err();
        assert!(err.has_violation_at("properties.gridId"));
        assert!(err.has_violation_at("properties.gridX"));
        assert!(err.has_violation_at("properties.forecastOffice"));
    }

    #[test]
    fn every_violation_is_reported() {
        let mut doc = hourly();
        let p = &mut doc["properties"]["periods"][0];
        p.as_object_mut().unwrap().remove("name");
        p["isDaytime"] = json!("no");
        p["startTime"] = json!("yesterday");
        doc["properties"]["periods"][1]["number"] = json!(1);
        doc["properties"]["elevation"]["unitCode"] = json!("");

        let err = validate(&doc, Kind::Hourly).unwrap_err();
        let found: Vec<(String, Problem)> = err
            .violations()
            .iter()
            .map(|v| (v.path.clone(), v.problem.clone()))
            .collect();
        assert_eq!(
            found,
            vec![
                ("properties.elevation.unitCode".to_string(), Problem::Empty),
                ("properties.periods[0].name".to_string(), Problem::Missing),
                (
                    "properties.periods[0].startTime".to_string(),
                    Problem::BadTimestamp("yesterday".to_string())
                ),
                (
                    "properties.periods[0].isDaytime".to_string(),
                    Problem::WrongType("a boolean")
                ),
                (
                    "properties.periods[1].number".to_string(),
                    Problem::OutOfSequence { previous: 1, number: 1 }
                ),
            ]
        );
    }

    #[test]
    fn period_must_end_after_it_starts() {
        let doc = forecast(vec![period(1, "x", "2024-01-01T02:00:00Z", "2024-01-01T01:00:00Z")]);
        let err = validate(&doc, Kind::Hourly).unwrap_err();
        assert!(err.has_violation_at("properties.periods[0].endTime"));
    }

    #[test]
    fn numeric_fields_are_coerced() {
        let mut doc = hourly();
        doc["properties"]["periods"][0]["number"] = json!("1");
        doc["properties"]["periods"][0]["temperature"] = json!(40.0);
        let env = validate(&doc, Kind::Hourly).unwrap();
        assert_eq!(env.forecast().unwrap().periods[0].number, 1);
        assert_eq!(env.forecast().unwrap().periods[0].temperature, Some(40));
    }

    #[test]
    fn raw_layers_are_typed_and_unknown_members_kept() {
        let env = validate(&raw(), Kind::Gridpoint).unwrap();
        let gp = env.gridpoint().unwrap();
        assert_eq!(gp.grid_x, 40);
        assert_eq!(gp.layers.get("temperature").unwrap().unit_of_measure, "wmoUnit:degC");
        assert!(gp.layers.get("dewpoint").is_none());
        assert!(gp.layers.other().contains_key("weather"));
    }

    #[test]
    fn malformed_known_layer_is_a_violation() {
        let mut doc = raw();
        doc["properties"]["dewpoint"] = json!(12);
        doc["properties"]["temperature"]["values"][0] = json!({"value": 1});
        let err = validate(&doc, Kind::Gridpoint).unwrap_err();
        assert!(err.has_violation_at("properties.dewpoint"));
        assert!(err.has_violation_at("properties.temperature.values[0].validTime"));
    }

    #[test]
    fn malformed_unknown_layer_does_not_fail_validation() {
        let mut doc = raw();
        doc["properties"]["experimentalIndex"] = json!({
            "uom": "wmoUnit:percent",
            "values": [{"time": "2024-01-01T00:00:00+00:00/PT1H", "value": 3}]
        });
        doc["properties"]["futureLayer"] = json!({"uom": "wmoUnit:m", "values": []});

        let env = validate(&doc, Kind::Gridpoint).unwrap();
        let gp = env.gridpoint().unwrap();
        assert!(gp.layers.get("futureLayer").is_some());
        assert!(gp.layers.get("experimentalIndex").is_none());
        assert_eq!(
            gp.layers.other()["experimentalIndex"],
            doc["properties"]["experimentalIndex"]
        );
    }

    #[test]
    fn validated_payloads_only_unwrap_to_their_own_kind() {
        let env = validate(&twelve_hour(), Kind::TwelveHour).unwrap();
        let ForecastEnvelope::TwelveHour(feature) = env else {
            panic!("expected a 12h envelope");
        };
        assert_eq!(feature.properties.periods.len(), 2);

        // Going back in as hourly means validating again, which fails.
        let raw = serde_json::to_value(feature.into_feature()).unwrap();
        assert!(validate(&raw, Kind::Hourly).is_err());
    }

    #[test]
    fn envelope_deserialisation_validates_data_against_kind() {
        let good = json!({"kind": "hourly", "data": hourly()});
        let env: ForecastEnvelope = serde_json::from_value(good).unwrap();
        assert_eq!(env.kind(), Kind::Hourly);

        let mismatched = json!({"kind": "hourly", "data": twelve_hour()});
        assert!(serde_json::from_value::<ForecastEnvelope>(mismatched).is_err());

        let unknown = json!({"kind": "daily", "data": hourly()});
        assert!(serde_json::from_value::<ForecastEnvelope>(unknown).is_err());
    }

    #[test]
    fn envelope_serialises_with_kind_and_data() {
        let env = validate(&raw(), Kind::Gridpoint).unwrap();
        let out = serde_json::to_value(&env).unwrap();
        assert_eq!(out["kind"], json!("gridpoint"));
        assert_eq!(out["data"]["properties"]["gridId"], json!("GSP"));

        let back: ForecastEnvelope = serde_json::from_value(out).unwrap();
        assert_eq!(back, env);
    }

    #[test]
    fn non_object_payload_is_rejected() {
        let err = validate(&json!([1, 2, 3]), Kind::TwelveHour).unwrap_err();
        assert!(err.has_violation_at("$"));
    }
}
