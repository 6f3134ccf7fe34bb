use crate::cache::{Cache, CacheKey, StoreError};
use crate::nws::{Client, FetchError, GridPoint};
use crate::schema::{self, Kind, ValidationError};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum UpdateError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("upstream sent an unusable document: {0}")]
    Invalid(#[from] ValidationError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Outcome of refreshing one location.
#[derive(Debug)]
pub struct LocationReport {
    pub location: String,
    pub stored: Vec<Kind>,
    pub failures: Vec<(Kind, UpdateError)>,
}

impl LocationReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Fetches every kind of forecast for one location and caches the ones that
/// validate. An invalid document never replaces what is already cached.
pub fn update_location(
    client: &Client,
    cache: &Cache,
    location: &str,
    point: &GridPoint,
) -> LocationReport {
    let grid = client.grid(point);
    let mut report = LocationReport {
        location: location.to_string(),
        stored: Vec::new(),
        failures: Vec::new(),
    };

    for kind in Kind::ALL {
        let key = CacheKey::new(location, kind);
        let result = grid
            .fetch(kind)
            .map_err(UpdateError::from)
            .and_then(|raw| {
                schema::validate(&raw, kind)?;
                cache.store(&key, &raw)?;
                Ok(())
            });
        match result {
            Ok(()) => report.stored.push(kind),
            Err(e) => {
                warn!(%location, %kind, error = %e, "update failed");
                report.failures.push((kind, e));
            }
        }
    }

    report
}

pub fn update_all<'a, I>(client: &Client, cache: &Cache, locations: I) -> Vec<LocationReport>
where
    I: IntoIterator<Item = (&'a String, &'a GridPoint)>,
{
    let reports: Vec<LocationReport> = locations
        .into_iter()
        .map(|(name, point)| {
            info!(location = %name, grid = %point, "updating");
            update_location(client, cache, name, point)
        })
        .collect();

    let failed = reports.iter().filter(|r| !r.is_complete()).count();
    info!(locations = reports.len(), failed, "update finished");
    reports
}
