use std::{fmt, num::NonZeroUsize, str::FromStr};

use chrono::{NaiveDateTime, TimeDelta};
use serde::Serialize;
use zsnap_library::retention::RetentionPolicy;

use crate::library::{
    constant::{
        DEFAULT_ROOT_IDENTIFIER, DEFAULT_ZFS_PROGRAM, DEFAULT_ZPOOL_PROGRAM,
        EXIT_GENERATION_NOTHING, EXIT_LIFETIME_NOTHING, LIFETIME_REGEX,
    },
    error::ZsnapError,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub zfs_program: String,
    pub zpool_program: String,
    pub root_identifier: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            zfs_program: DEFAULT_ZFS_PROGRAM.to_string(),
            zpool_program: DEFAULT_ZPOOL_PROGRAM.to_string(),
            root_identifier: DEFAULT_ROOT_IDENTIFIER.to_string(),
        }
    }
}

/// Maximum age of a kept snapshot, written `<n>[s|m|h|d]`. No suffix means seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lifetime {
    seconds: i64,
}

impl Lifetime {
    pub fn seconds(&self) -> i64 {
        self.seconds
    }

    pub fn as_delta(&self) -> TimeDelta {
        TimeDelta::seconds(self.seconds)
    }
}

impl FromStr for Lifetime {
    type Err = ZsnapError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| {
            ZsnapError::Configuration(format!("lifetime `{}` {}", s, reason))
        };

        let captures = LIFETIME_REGEX
            .captures(s.trim())
            .ok_or_else(|| invalid("must be an integer with an optional s, m, h or d suffix"))?;

        let amount = captures[1]
            .parse::<i64>()
            .map_err(|_| invalid("is out of range"))?;

        let unit = match captures.get(2).map(|m| m.as_str()) {
            None | Some("s") => 1,
            Some("m") => 60,
            Some("h") => 60 * 60,
            _ => 24 * 60 * 60,
        };

        let seconds = amount
            .checked_mul(unit)
            .filter(|s| TimeDelta::try_seconds(*s).is_some())
            .ok_or_else(|| invalid("is out of range"))?;

        match seconds > 0 {
            true => Ok(Lifetime { seconds }),
            false => Err(invalid("must be greater than 0")),
        }
    }
}

impl fmt::Display for Lifetime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}s", self.seconds)
    }
}

/// The retention policy as requested on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicySpec {
    Generation(NonZeroUsize),
    Lifetime(#[serde(serialize_with = "serialize_lifetime")] Lifetime),
}

impl PolicySpec {
    pub fn resolve(&self, now: NaiveDateTime) -> RetentionPolicy {
        match self {
            PolicySpec::Generation(n) => RetentionPolicy::KeepNewest(*n),
            // A lifetime reaching past the calendar keeps everything.
            PolicySpec::Lifetime(lifetime) => RetentionPolicy::KeepNewerThan(
                now.checked_sub_signed(lifetime.as_delta())
                    .unwrap_or(NaiveDateTime::MIN),
            ),
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            PolicySpec::Generation(_) => "generation",
            PolicySpec::Lifetime(_) => "lifetime",
        }
    }

    pub fn nothing_to_collect_code(&self) -> u8 {
        match self {
            PolicySpec::Generation(_) => EXIT_GENERATION_NOTHING,
            PolicySpec::Lifetime(_) => EXIT_LIFETIME_NOTHING,
        }
    }
}

fn serialize_lifetime<S: serde::Serializer>(
    lifetime: &Lifetime,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_i64(lifetime.seconds)
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    #[test]
    fn lifetime_suffixes_scale_to_seconds() {
        let parse = |s: &str| s.parse::<Lifetime>().map(|l| l.seconds());

        assert_eq!(parse("90").unwrap(), 90);
        assert_eq!(parse("90s").unwrap(), 90);
        assert_eq!(parse("15m").unwrap(), 900);
        assert_eq!(parse("2h").unwrap(), 7_200);
        assert_eq!(parse("7d").unwrap(), 604_800);
    }

    #[test]
    fn lifetime_rejects_zero_and_unknown_suffixes() {
        for bad in ["0", "0d", "-5", "5w", "h", "", "1.5h", "99999999999999999999"] {
            assert!(
                matches!(bad.parse::<Lifetime>(), Err(ZsnapError::Configuration(_))),
                "{bad}"
            );
        }
    }

    #[test]
    fn policies_resolve_against_now() {
        let now = NaiveDate::from_ymd_opt(2021, 1, 5)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();

        let lifetime = PolicySpec::Lifetime("2h".parse().unwrap());
        assert_eq!(
            lifetime.resolve(now),
            RetentionPolicy::KeepNewerThan(now - TimeDelta::hours(2))
        );
        assert_eq!(lifetime.nothing_to_collect_code(), EXIT_LIFETIME_NOTHING);

        let generation = PolicySpec::Generation(NonZeroUsize::new(3).unwrap());
        assert_eq!(
            generation.resolve(now),
            RetentionPolicy::KeepNewest(NonZeroUsize::new(3).unwrap())
        );
        assert_eq!(generation.nothing_to_collect_code(), EXIT_GENERATION_NOTHING);
    }

    #[test]
    fn lifetime_older_than_the_calendar_keeps_everything() {
        let now = NaiveDate::from_ymd_opt(2021, 1, 5)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();

        let lifetime = PolicySpec::Lifetime("100000000d".parse().unwrap());

        assert_eq!(
            lifetime.resolve(now),
            RetentionPolicy::KeepNewerThan(NaiveDateTime::MIN)
        );
    }
}
