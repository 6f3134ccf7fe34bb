#![allow(dead_code)]

use nws_forecast::schema::Kind;
use serde_json::Value;

pub fn fixture(kind: Kind) -> Value {
    let text = match kind {
        Kind::TwelveHour => include_str!("../fixtures/forecast_12h.json"),
        Kind::Hourly => include_str!("../fixtures/forecast_hourly.json"),
        Kind::Gridpoint => include_str!("../fixtures/gridpoint_raw.json"),
    };
    serde_json::from_str(text).unwrap()
}

/// Asserts that every object member in `input` also exists in `output`, and
/// that every leaf value comes back exactly as it went in.
pub fn assert_members_kept(input: &Value, output: &Value, path: &str) {
    match (input, output) {
        (Value::Object(i), Value::Object(o)) => {
            for (name, value) in i {
                let member = format!("{}.{}", path, name);
                let kept = o
                    .get(name)
                    .unwrap_or_else(|| panic!("{} was dropped", member));
                assert_members_kept(value, kept, &member);
            }
        }
        (Value::Array(i), Value::Array(o)) => {
            assert_eq!(i.len(), o.len(), "{} changed length", path);
            for (n, (a, b)) in i.iter().zip(o).enumerate() {
                assert_members_kept(a, b, &format!("{}[{}]", path, n));
            }
        }
        (i, o) => assert_eq!(i, o, "{} changed", path),
    }
}
