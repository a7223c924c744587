use std::fmt;

use chrono::{DateTime, Local, NaiveDateTime};
use serde::Serialize;
use thiserror::Error;

use crate::tabular::{Row, TabularError};

/// Formats the subsystem uses for `creation` under the `C` locale.
const CREATION_FORMATS: [&str; 2] = ["%a %b %e %H:%M:%S %Y", "%a %b %e %H:%M %Y"];

const LABEL_TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

const PLACEHOLDERS: [&str; 2] = ["-", "none"];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RecordError {
    #[error("malformed snapshot name `{0}`, expected <volume>@<label>")]
    MalformedName(String),

    #[error("invalid creation date `{0}`")]
    InvalidCreation(String),

    #[error(transparent)]
    Field(#[from] TabularError),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct SnapshotName {
    volume: String,
    label: String,
}

impl SnapshotName {
    pub fn new(volume: &str, label: &str) -> Self {
        SnapshotName {
            volume: volume.to_string(),
            label: label.to_string(),
        }
    }

    pub fn parse(name: &str) -> Result<Self, RecordError> {
        let malformed = || RecordError::MalformedName(name.to_string());

        let (volume, label) = name.split_once('@').ok_or_else(malformed)?;

        if volume.is_empty() || label.is_empty() || label.contains('@') {
            return Err(malformed());
        }

        Ok(SnapshotName::new(volume, label))
    }

    pub fn volume(&self) -> &str {
        &self.volume
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

impl fmt::Display for SnapshotName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.volume, self.label)
    }
}

/// Label prefix shared by every snapshot one caller label manages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupPrefix(String);

impl GroupPrefix {
    pub fn new(root_identifier: &str, label: &str) -> Self {
        GroupPrefix(format!("{}_{}", root_identifier, label))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Members carry `<prefix>_` so that `daily` never claims `daily2_...`.
    pub fn contains(&self, label: &str) -> bool {
        label
            .strip_prefix(self.0.as_str())
            .is_some_and(|rest| rest.starts_with('_'))
    }

    pub fn label_at(&self, now: NaiveDateTime) -> String {
        format!("{}_{}", self.0, now.format(LABEL_TIMESTAMP_FORMAT))
    }
}

impl fmt::Display for GroupPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SnapshotRecord {
    #[serde(serialize_with = "serialize_display")]
    name: SnapshotName,
    created: NaiveDateTime,
}

impl SnapshotRecord {
    pub fn new(name: SnapshotName, created: NaiveDateTime) -> Self {
        SnapshotRecord { name, created }
    }

    pub fn name(&self) -> &SnapshotName {
        &self.name
    }

    pub fn fully_qualified_name(&self) -> String {
        self.name.to_string()
    }

    pub fn volume(&self) -> &str {
        self.name.volume()
    }

    pub fn label(&self) -> &str {
        self.name.label()
    }

    pub fn created(&self) -> NaiveDateTime {
        self.created
    }

    pub fn in_group(&self, group: &GroupPrefix) -> bool {
        group.contains(self.label())
    }
}

fn serialize_display<S: serde::Serializer>(
    value: &SnapshotName,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_str(value)
}

/// Reads a `creation` value rendered under the `C` locale, or as epoch
/// seconds when the subsystem was asked for parsable output.
pub fn parse_creation(value: &str) -> Result<NaiveDateTime, RecordError> {
    let value = value.trim();

    if let Some(parsed) = CREATION_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
    {
        return Ok(parsed);
    }

    value
        .parse::<i64>()
        .ok()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .map(|utc| utc.with_timezone(&Local).naive_local())
        .ok_or_else(|| RecordError::InvalidCreation(value.to_string()))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PropertyValue {
    pub target: String,
    pub property: String,
    pub value: Option<String>,
    pub source: Option<String>,
}

impl TryFrom<Row> for PropertyValue {
    type Error = RecordError;

    fn try_from(mut row: Row) -> Result<Self, Self::Error> {
        row.normalize("value", &["-"]);
        row.normalize("source", &["-"]);

        Ok(PropertyValue {
            target: row.require("name")?.to_string(),
            property: row.require("property")?.to_string(),
            value: row.get("value").map(str::to_string),
            source: row.get("source").map(str::to_string),
        })
    }
}

/// A filesystem, volume or snapshot line of `zfs list`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatasetSummary {
    pub name: String,
    pub used: String,
    pub avail: Option<String>,
    pub refer: String,
    pub mountpoint: Option<String>,
}

impl TryFrom<Row> for DatasetSummary {
    type Error = RecordError;

    fn try_from(mut row: Row) -> Result<Self, Self::Error> {
        row.normalize("avail", &PLACEHOLDERS);
        row.normalize("mountpoint", &PLACEHOLDERS);

        Ok(DatasetSummary {
            name: row.require("name")?.to_string(),
            used: row.require("used")?.to_string(),
            avail: row.get("avail").map(str::to_string),
            refer: row.require("refer")?.to_string(),
            mountpoint: row.get("mountpoint").map(str::to_string),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PoolSummary {
    pub name: String,
    pub size: String,
    pub alloc: String,
    pub free: String,
    pub health: String,
    pub altroot: Option<String>,
}

impl TryFrom<Row> for PoolSummary {
    type Error = RecordError;

    fn try_from(mut row: Row) -> Result<Self, Self::Error> {
        row.normalize("altroot", &["-"]);

        Ok(PoolSummary {
            name: row.require("name")?.to_string(),
            size: row.require("size")?.to_string(),
            alloc: row.require("alloc")?.to_string(),
            free: row.require("free")?.to_string(),
            health: row.require("health")?.to_string(),
            altroot: row.get("altroot").map(str::to_string),
        })
    }
}
