use std::collections::HashMap;

use chrono::{Local, NaiveDateTime};
use itertools::Itertools;
use rand::{Rng, distr::Alphanumeric};
use tracing::{debug, info, warn};
use zsnap_library::{
    record::{
        DatasetSummary, PoolSummary, PropertyValue, SnapshotName, SnapshotRecord, parse_creation,
    },
    tabular::{PropertyRows, Row, RowReconciler, Strict, TabularParser},
};
use zsnap_runner::library::{Command, CommandOutput, CommandRunner, LocaleGuard, LocaleOverride};

use crate::library::{
    config::Config,
    constant::{FALLBACK_LABEL_FORMAT, FORCED_LOCALE, RANDOM_SUFFIX_LEN},
    error::{Result, ZsnapError},
};

const VOLUME_TYPES: [&str; 2] = ["filesystem", "volume"];
const SNAPSHOT_TYPES: [&str; 2] = ["snapshot", "snap"];

/// Source of the random part of generated snapshot labels.
pub trait SuffixSource {
    fn suffix(&self, len: usize) -> String;
}

impl<F: Fn(usize) -> String> SuffixSource for F {
    fn suffix(&self, len: usize) -> String {
        self(len)
    }
}

pub struct RandomSuffix;

impl SuffixSource for RandomSuffix {
    fn suffix(&self, len: usize) -> String {
        rand::rng()
            .sample_iter(&Alphanumeric)
            .take(len)
            .map(char::from)
            .collect()
    }
}

fn local_now() -> NaiveDateTime {
    Local::now().naive_local()
}

/// Pools, datasets and snapshots as reported by `zpool` and `zfs`.
pub struct Zfs<'a> {
    runner: &'a dyn CommandRunner,
    config: &'a Config,
    locale: LocaleOverride,
    parser: TabularParser,
    suffix: Box<dyn SuffixSource + 'a>,
    clock: fn() -> NaiveDateTime,
}

impl<'a> Zfs<'a> {
    pub fn new(runner: &'a dyn CommandRunner, config: &'a Config) -> Self {
        Zfs {
            runner,
            config,
            locale: LocaleOverride::new(),
            parser: TabularParser::default(),
            suffix: Box::new(RandomSuffix),
            clock: local_now,
        }
    }

    pub fn with_suffix_source(mut self, suffix: impl SuffixSource + 'a) -> Self {
        self.suffix = Box::new(suffix);
        self
    }

    pub fn with_clock(mut self, clock: fn() -> NaiveDateTime) -> Self {
        self.clock = clock;
        self
    }

    /// Forces `locale` on every command issued while the guard lives.
    pub fn scoped_locale(&self, locale: &str) -> LocaleGuard {
        self.locale.scoped(locale)
    }

    fn zfs(&self) -> Command {
        Command::new(&self.config.zfs_program)
    }

    fn zpool(&self) -> Command {
        Command::new(&self.config.zpool_program)
    }

    fn execute(&self, command: Command) -> Result<CommandOutput> {
        let command = self.locale.apply(command);
        debug!(%command, locale = ?self.locale.current(), "issuing");

        Ok(self.runner.run(&command)?)
    }

    fn query(&self, command: Command, reconciler: &dyn RowReconciler) -> Result<Vec<Row>> {
        let display = command.to_string();
        let output = self.execute(command)?;

        if !output.success() {
            return Err(ZsnapError::SubsystemUnavailable {
                command: display,
                exit_code: Some(output.code),
                message: output.stderr,
            });
        }

        self.parser
            .parse(&output.stdout, reconciler)
            .map_err(|source| ZsnapError::MalformedOutput {
                command: display,
                source,
            })
    }

    fn query_as<T>(&self, command: Command, reconciler: &dyn RowReconciler) -> Result<Vec<T>>
    where
        T: TryFrom<Row, Error = zsnap_library::record::RecordError>,
    {
        self.query(command, reconciler)?
            .into_iter()
            .map(|row| T::try_from(row).map_err(ZsnapError::from))
            .collect()
    }

    pub fn list_pools(&self) -> Result<Vec<PoolSummary>> {
        self.query_as(self.zpool().arg("list"), &Strict)
    }

    pub fn pool_names(&self) -> Result<Vec<String>> {
        Ok(self.list_pools()?.into_iter().map(|p| p.name).collect())
    }

    pub fn get_pool_property(&self, target: &str, names: &[&str]) -> Result<Vec<PropertyValue>> {
        if target.is_empty() || !self.pool_names()?.iter().any(|p| p == target) {
            return Err(ZsnapError::TargetNotFound(target.to_string()));
        }

        let command = self.zpool().arg("get").arg(&property_list(names)).arg(target);

        self.query_as(command, &PropertyRows)
    }

    pub fn list_volumes(&self) -> Result<Vec<DatasetSummary>> {
        self.query_as(self.zfs().args(["list", "-t", "filesystem,volume"]), &Strict)
    }

    pub fn volume_names(&self) -> Result<Vec<String>> {
        Ok(self.list_volumes()?.into_iter().map(|v| v.name).collect())
    }

    /// Snapshot lines of `zfs list`, optionally restricted to names containing `filter`.
    pub fn list_snapshot_summaries(&self, filter: Option<&str>) -> Result<Vec<DatasetSummary>> {
        let summaries: Vec<DatasetSummary> =
            self.query_as(self.zfs().args(["list", "-t", "snapshot"]), &Strict)?;

        Ok(summaries
            .into_iter()
            .filter(|s| filter.is_none_or(|f| s.name.contains(f)))
            .collect())
    }

    pub fn snapshot_names(&self) -> Result<Vec<String>> {
        Ok(self
            .list_snapshot_summaries(None)?
            .into_iter()
            .map(|s| s.name)
            .collect())
    }

    /// Snapshots with their creation time, in listing order.
    ///
    /// `volume_filter` is a substring match on the full snapshot name, so
    /// `tank/data` also matches `tank/data2@...`.
    pub fn list_snapshots(&self, volume_filter: Option<&str>) -> Result<Vec<SnapshotRecord>> {
        let names = self
            .list_snapshot_summaries(volume_filter)?
            .into_iter()
            .map(|s| s.name)
            .collect::<Vec<String>>();

        if names.is_empty() {
            return Ok(vec![]);
        }

        let _locale = self.scoped_locale(FORCED_LOCALE);

        let created = self
            .query_as::<PropertyValue>(self.creation_query().args(&names), &PropertyRows)?
            .into_iter()
            .filter(|p| p.property == "creation")
            .map(|p| {
                let value = p.value.unwrap_or_default();
                Ok::<_, ZsnapError>((p.target, parse_creation(&value)?))
            })
            .collect::<Result<HashMap<String, NaiveDateTime>>>()?;

        Ok(names
            .iter()
            .filter_map(|name| match SnapshotName::parse(name) {
                Ok(parsed) => match created.get(name) {
                    Some(at) => Some(SnapshotRecord::new(parsed, *at)),
                    None => {
                        warn!(snapshot = %name, "no creation time reported, skipping snapshot");
                        None
                    }
                },
                Err(error) => {
                    warn!(%error, "skipping snapshot");
                    None
                }
            })
            .collect())
    }

    pub fn get_property(&self, target: &str, names: &[&str]) -> Result<Vec<PropertyValue>> {
        if target.is_empty() {
            return Err(ZsnapError::TargetNotFound(target.to_string()));
        }

        let live = self
            .volume_names()?
            .into_iter()
            .chain(self.snapshot_names()?)
            .any(|name| name == target);

        if !live {
            return Err(ZsnapError::TargetNotFound(target.to_string()));
        }

        self.properties(target, names)
    }

    /// `-p` prints creation as epoch seconds; the default rendering drops the seconds.
    fn creation_query(&self) -> Command {
        self.zfs().args(["get", "-p", "creation"])
    }

    fn properties(&self, target: &str, names: &[&str]) -> Result<Vec<PropertyValue>> {
        let command = self.zfs().arg("get").arg(&property_list(names)).arg(target);

        self.query_as(command, &PropertyRows)
    }

    fn single_property(&self, target: &str, name: &str) -> Result<Option<String>> {
        let found = self
            .properties(target, &[name])?
            .into_iter()
            .filter(|p| p.target == target && p.property == name)
            .at_most_one()
            .map_err(|_| ZsnapError::TargetNotFound(format!("{} (ambiguous `{}`)", target, name)))?;

        Ok(found.and_then(|p| p.value))
    }

    fn ensure_volume(&self, volume: &str) -> Result<()> {
        if volume.is_empty() {
            return Err(ZsnapError::invalid_target(volume, "target device unknown"));
        }

        if !self.volume_names()?.iter().any(|v| v == volume) {
            return Err(ZsnapError::invalid_target(volume, "target device not found"));
        }

        match self.single_property(volume, "type")? {
            Some(kind) if VOLUME_TYPES.contains(&kind.as_str()) => Ok(()),
            kind => Err(ZsnapError::invalid_target(
                volume,
                &format!("illegal type {}", kind.unwrap_or_default()),
            )),
        }
    }

    fn ensure_snapshot(&self, name: &str) -> Result<SnapshotName> {
        let parsed = SnapshotName::parse(name)
            .map_err(|_| ZsnapError::invalid_target(name, "expected <volume>@<label>"))?;

        if !self.snapshot_names()?.iter().any(|s| s == name) {
            return Err(ZsnapError::TargetNotFound(name.to_string()));
        }

        match self.single_property(name, "type")? {
            Some(kind) if SNAPSHOT_TYPES.contains(&kind.as_str()) => Ok(parsed),
            kind => Err(ZsnapError::invalid_target(
                name,
                &format!("illegal type {}", kind.unwrap_or_default()),
            )),
        }
    }

    /// Snapshots `volume` and returns the new snapshot's full name.
    ///
    /// Without a label one is generated as `<timestamp>_<random>`.
    pub fn create_snapshot(&self, volume: &str, label: Option<&str>) -> Result<String> {
        self.ensure_volume(volume)?;

        let label = match label.filter(|l| !l.is_empty()) {
            Some(label) => label.to_string(),
            None => format!(
                "{}_{}",
                (self.clock)().format(FALLBACK_LABEL_FORMAT),
                self.suffix.suffix(RANDOM_SUFFIX_LEN)
            ),
        };

        let name = format!("{}@{}", volume, label);
        SnapshotName::parse(&name)
            .map_err(|_| ZsnapError::invalid_target(&name, "label must not contain `@`"))?;

        let output = self.execute(self.zfs().arg("snapshot").arg(&name))?;

        if !output.success() {
            return Err(ZsnapError::CreateFailed {
                target: name,
                exit_code: output.code,
                message: output.stderr,
            });
        }

        info!(snapshot = %name, "created");

        Ok(name)
    }

    pub fn destroy_snapshot(&self, name: &str) -> Result<()> {
        let snapshot = self.ensure_snapshot(name)?;

        let output = self.execute(self.zfs().arg("destroy").arg(&snapshot.to_string()))?;

        if !output.success() {
            return Err(ZsnapError::DestroyFailed {
                target: name.to_string(),
                exit_code: output.code,
                message: output.stderr,
            });
        }

        info!(snapshot = %snapshot, "destroyed");

        Ok(())
    }

    pub fn snapshot_creation_date(&self, name: &str) -> Result<NaiveDateTime> {
        self.ensure_snapshot(name)?;

        let _locale = self.scoped_locale(FORCED_LOCALE);
        let value = self
            .query_as::<PropertyValue>(self.creation_query().arg(name), &PropertyRows)?
            .into_iter()
            .find(|p| p.target == name && p.property == "creation")
            .and_then(|p| p.value)
            .unwrap_or_default();

        Ok(parse_creation(&value)?)
    }
}

fn property_list(names: &[&str]) -> String {
    match names.is_empty() {
        true => "all".to_string(),
        false => names.join(","),
    }
}
