//! File-backed forecast store.
//!
//! Each entry is one pretty-printed JSON file named
//! `{location}_CACHED_{FORECAST|HOURLY|RAW}_DATA.json` under the cache root.
//! The kind is part of the key, so loading never has to guess which shape a
//! file should have.

use crate::schema::{self, ForecastEnvelope, Kind, ValidationError};
use serde_json::ser::PrettyFormatter;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    location: String,
    kind: Kind,
}

impl CacheKey {
    pub fn new(location: impl Into<String>, kind: Kind) -> CacheKey {
        CacheKey {
            location: location.into(),
            kind,
        }
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn kind(&self) -> Kind {
        self.kind
    }

    pub fn file_name(&self) -> String {
        format!("{}_CACHED_{}_DATA.json", self.location, self.kind.cache_tag())
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.file_name())
    }
}

impl FromStr for CacheKey {
    type Err = LoadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let unrecognized = || LoadError::UnrecognizedKey(s.to_string());
        let re = regex::Regex::new(r"^([^/\\]+)_CACHED_([A-Z]+)_DATA\.json$")
            .map_err(|_| unrecognized())?;
        let caps = re.captures(s).ok_or_else(unrecognized)?;
        let kind = Kind::from_cache_tag(&caps[2]).ok_or_else(unrecognized)?;
        Ok(CacheKey::new(&caps[1], kind))
    }
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("{0:?} is not a {{location}}_CACHED_{{FORECAST|HOURLY|RAW}}_DATA.json name")]
    UnrecognizedKey(String),
    #[error("could not read {key}: {source}")]
    Io { key: String, source: io::Error },
    #[error("{key} is not valid JSON: {source}")]
    MalformedPayload {
        key: String,
        source: serde_json::Error,
    },
    #[error("{key} does not match its schema: {source}")]
    SchemaViolation {
        key: String,
        source: ValidationError,
    },
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("could not serialise {key}: {source}")]
    Serialize {
        key: String,
        source: serde_json::Error,
    },
    #[error("could not write {key}: {source}")]
    Write { key: String, source: io::Error },
}

#[derive(Debug, Clone)]
pub struct Cache {
    root: PathBuf,
}

impl Cache {
    pub fn new(root: impl Into<PathBuf>) -> Cache {
        Cache { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_of(&self, key: &CacheKey) -> PathBuf {
        self.root.join(key.file_name())
    }

    /// Loads and validates the entry for `key`.
    ///
    /// A missing file is `Ok(None)`. Nothing is created on disk.
    pub fn load(&self, key: &CacheKey) -> Result<Option<ForecastEnvelope>, LoadError> {
        let name = key.file_name();
        let bytes = match fs::read(self.path_of(key)) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(key = %name, "no cached entry");
                return Ok(None);
            }
            Err(source) => return Err(LoadError::Io { key: name, source }),
        };

        let raw: serde_json::Value = match serde_json::from_slice(&bytes) {
            Ok(raw) => raw,
            Err(source) => return Err(LoadError::MalformedPayload { key: name, source }),
        };

        match schema::validate(&raw, key.kind()) {
            Ok(envelope) => Ok(Some(envelope)),
            Err(source) => Err(LoadError::SchemaViolation { key: name, source }),
        }
    }

    /// Like [`Cache::load`], for a key given as a file name.
    pub fn load_file(&self, file_name: &str) -> Result<Option<ForecastEnvelope>, LoadError> {
        self.load(&file_name.parse()?)
    }

    /// Writes `value` as the entry for `key`, replacing any previous entry.
    pub fn store<T: serde::Serialize + ?Sized>(
        &self,
        key: &CacheKey,
        value: &T,
    ) -> Result<(), StoreError> {
        let name = key.file_name();

        let mut buf = Vec::new();
        let mut ser =
            serde_json::Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(b"    "));
        if let Err(source) = value.serialize(&mut ser) {
            return Err(StoreError::Serialize { key: name, source });
        }

        let written =
            fs::create_dir_all(&self.root).and_then(|_| fs::write(self.path_of(key), &buf));
        if let Err(source) = written {
            return Err(StoreError::Write { key: name, source });
        }

        info!(key = %name, bytes = buf.len(), "stored forecast data");
        Ok(())
    }
}
