#![allow(dead_code)]

use chrono::{Local, NaiveDate, NaiveDateTime, TimeZone};
use indoc::indoc;
use itertools::Itertools;
use zsnap::library::config::Config;
use zsnap_library::record::parse_creation;
use zsnap_runner::library::MockRunner;

pub const VOLUME: &str = "tank/data";
pub const CREATED: &str = "tank/data@zfsss_daily_20210105120000";

pub const POOLS: &str = indoc! {"
    NAME   SIZE  ALLOC   FREE  CKPOINT  EXPANDSZ   FRAG    CAP  DEDUP    HEALTH  ALTROOT
    tank  9.50G  1.20G  8.30G        -         -     0%    12%  1.00x    ONLINE  -
"};

pub const VOLUMES: &str = indoc! {"
    NAME         USED  AVAIL     REFER  MOUNTPOINT
    tank        1.20G  8.30G       96K  /tank
    tank/data    800M  8.30G      780M  /tank/data
    tank/data2   400M  8.30G      390M  /tank/data2
    tank/vol    1.03G  9.10G       56K  -
"};

/// `daily` members of tank/data at noon on Jan 2 to Jan 4 2021, plus neighbours
/// that must never be collected: another group and a volume sharing the prefix.
pub const EXISTING: [(&str, &str); 5] = [
    ("tank/data@zfsss_daily_20210102120000", "Sat Jan  2 12:00 2021"),
    ("tank/data@zfsss_daily_20210103120000", "Sun Jan  3 12:00 2021"),
    ("tank/data@zfsss_daily_20210104120000", "Mon Jan  4 12:00 2021"),
    ("tank/data@zfsss_weekly_20210101120000", "Fri Jan  1 12:00 2021"),
    ("tank/data2@zfsss_daily_20210101120000", "Fri Jan  1 12:00 2021"),
];

pub fn now() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2021, 1, 5)
        .unwrap()
        .and_hms_opt(12, 0, 0)
        .unwrap()
}

pub fn at(day: u32, hour: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2021, 1, day)
        .unwrap()
        .and_hms_opt(hour, 0, 0)
        .unwrap()
}

pub fn config() -> Config {
    Config::default()
}

pub fn snapshot_listing(snapshots: &[(&str, &str)]) -> String {
    let lines = snapshots
        .iter()
        .map(|(name, _)| format!("{}  56K  -  780M  -", name))
        .join("\n");

    format!("NAME  USED  AVAIL  REFER  MOUNTPOINT\n{}\n", lines)
}

/// Local wall-clock time as the epoch seconds `zfs get -p` prints.
pub fn epoch(at: NaiveDateTime) -> i64 {
    Local.from_local_datetime(&at).unwrap().timestamp()
}

/// `zfs get -p creation` output; fixture dates are written the readable way.
pub fn creation_listing(snapshots: &[(&str, &str)]) -> String {
    let lines = snapshots
        .iter()
        .map(|(name, created)| {
            let created = epoch(parse_creation(created).unwrap());
            format!("{}  creation  {}  -", name, created)
        })
        .join("\n");

    format!("NAME  PROPERTY  VALUE  SOURCE\n{}\n", lines)
}

pub fn type_listing(target: &str, kind: &str) -> String {
    format!("NAME  PROPERTY  VALUE  SOURCE\n{}  type  {}  -\n", target, kind)
}

/// A scripted `zfs`/`zpool` pair holding `tank` and the snapshots given.
pub struct FakeZfs {
    pub mock: MockRunner,
}

impl FakeZfs {
    pub fn new() -> Self {
        let mock = MockRunner::new();

        mock.expect("zpool")
            .with_exact_args(&["list"])
            .returns_stdout(POOLS)
            .finish();
        mock.expect("zfs")
            .with_exact_args(&["list", "-t", "filesystem,volume"])
            .returns_stdout(VOLUMES)
            .finish();

        for volume in ["tank", "tank/data", "tank/data2"] {
            mock.expect("zfs")
                .with_exact_args(&["get", "type", volume])
                .returns_stdout(&type_listing(volume, "filesystem"))
                .finish();
        }

        mock.expect("zfs")
            .with_exact_args(&["get", "type", "tank/vol"])
            .returns_stdout(&type_listing("tank/vol", "volume"))
            .finish();

        FakeZfs { mock }
    }

    /// Snapshots as listed by `zfs list -t snapshot` and `zfs get creation`.
    pub fn with_snapshots(self, snapshots: &[(&str, &str)]) -> Self {
        self.mock
            .expect("zfs")
            .with_exact_args(&["list", "-t", "snapshot"])
            .returns_stdout(&snapshot_listing(snapshots))
            .finish();

        let creation = creation_listing(snapshots);
        self.mock
            .expect("zfs")
            .with_args(|args| {
                args.len() > 3 && args[0] == "get" && args[1] == "-p" && args[2] == "creation"
            })
            .returns_stdout(&creation)
            .finish();

        for (name, _) in snapshots {
            self.mock
                .expect("zfs")
                .with_exact_args(&["get", "type", *name])
                .returns_stdout(&type_listing(name, "snapshot"))
                .finish();
        }

        self
    }

    pub fn accepting_snapshots(self) -> Self {
        self.mock
            .expect("zfs")
            .with_args(|args| args.first().is_some_and(|a| a == "snapshot"))
            .finish();
        self
    }

    pub fn rejecting_snapshots(self, code: i32, stderr: &str) -> Self {
        self.mock
            .expect("zfs")
            .with_args(|args| args.first().is_some_and(|a| a == "snapshot"))
            .returns_exit_code(code)
            .returns_stderr(stderr)
            .finish();
        self
    }

    pub fn rejecting_destroy_of(self, name: &str, code: i32, stderr: &str) -> Self {
        self.mock
            .expect("zfs")
            .with_exact_args(&["destroy", name])
            .returns_exit_code(code)
            .returns_stderr(stderr)
            .finish();
        self
    }

    pub fn accepting_destroys(self) -> Self {
        self.mock
            .expect("zfs")
            .with_args(|args| args.first().is_some_and(|a| a == "destroy"))
            .finish();
        self
    }

    /// Arguments of every `zfs destroy` issued, in order.
    pub fn destroyed(&self) -> Vec<String> {
        self.mock
            .calls()
            .into_iter()
            .filter(|c| c.program == "zfs" && c.args.first().is_some_and(|a| a == "destroy"))
            .filter_map(|c| c.args.get(1).cloned())
            .collect()
    }
}

/// The existing snapshots plus the one a run at [`now`] creates.
pub fn after_create() -> Vec<(&'static str, &'static str)> {
    let mut snapshots = EXISTING.to_vec();
    snapshots.push((CREATED, "Tue Jan  5 12:00 2021"));
    snapshots
}
