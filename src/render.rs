//! Plain-text views of cached forecasts.

use crate::nws::{ForecastPeriod, Geometry, GridpointRaw, Location, QuantitativeValueLayer};
use crate::schema::ForecastEnvelope;

const MISSING: &str = "--";

fn temperature(p: &ForecastPeriod) -> String {
    match p.temperature {
        Some(t) => format!("{}{}", t, p.temperature_unit.as_deref().unwrap_or("")),
        None => MISSING.to_string(),
    }
}

fn or_missing(s: &Option<String>) -> &str {
    s.as_deref().unwrap_or(MISSING)
}

/// `{start}: {temp}{unit} - {short}`
pub fn hourly_line(p: &ForecastPeriod) -> String {
    format!(
        "{}: {} - {}",
        p.start_time,
        temperature(p),
        or_missing(&p.short_forecast)
    )
}

/// `{name}: {temp}{unit} - {short}`
pub fn daily_line(p: &ForecastPeriod) -> String {
    format!(
        "{}: {} - {}",
        p.name,
        temperature(p),
        or_missing(&p.short_forecast)
    )
}

/// The multi-line block shown for a period in the scrolling text view.
pub fn detailed(p: &ForecastPeriod) -> String {
    let degrees = match p.temperature {
        Some(t) => format!("{}°{}", t, p.temperature_unit.as_deref().unwrap_or("")),
        None => MISSING.to_string(),
    };
    format!(
        "{}: {}\nTemperature: {}\nWind: {} {}\nShort Forecast: {}\n",
        p.name,
        or_missing(&p.detailed_forecast),
        degrees,
        or_missing(&p.wind_speed),
        or_missing(&p.wind_direction),
        or_missing(&p.short_forecast)
    )
}

/// One summary line per period, or the layer overview for raw data.
pub fn summary(envelope: &ForecastEnvelope) -> Vec<String> {
    match envelope {
        ForecastEnvelope::TwelveHour(f) => f.properties.periods.iter().map(daily_line).collect(),
        ForecastEnvelope::Hourly(f) => f.properties.periods.iter().map(hourly_line).collect(),
        ForecastEnvelope::Gridpoint(f) => gridpoint_overview(&f.properties),
    }
}

pub fn gridpoint_overview(gp: &GridpointRaw) -> Vec<String> {
    let mut lines = vec![
        format!("Grid: {} {},{}", gp.grid_id, gp.grid_x, gp.grid_y),
        format!("Updated: {}", gp.update_time),
        format!("Valid: {}", gp.valid_times),
        format!("Elevation: {}", gp.elevation),
    ];
    for (name, layer) in gp.layers.iter() {
        lines.push(format!(
            "{} ({}): {} values",
            name,
            unit_name(&layer.unit_of_measure),
            layer.values.len()
        ));
    }
    lines
}

/// `{validTime} --> {value}` for each value in the layer.
pub fn layer_lines(layer: &QuantitativeValueLayer) -> Vec<String> {
    layer.values.iter().map(|v| v.to_string()).collect()
}

fn unit_name(uom: &str) -> &str {
    uom.split_once(':').map_or(uom, |(_, unit)| unit)
}

/// Centre and size of a forecast area.
pub fn area(geometry: &Geometry) -> Option<String> {
    let centre = geometry.centroid()?;
    let (sw, ne) = geometry.extent()?;
    Some(format!(
        "{} area centred on {}, {} across",
        geometry.geometry_type,
        centre,
        Location::distance_between(&sw, &ne)
    ))
}
