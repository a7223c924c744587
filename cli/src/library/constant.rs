use std::sync::LazyLock;

use regex::Regex;

pub static VERSION: LazyLock<String> = LazyLock::new(|| env!("CARGO_PKG_VERSION").to_string());

pub static LIFETIME_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d+)([smhd])?$").expect("Failed to compile lifetime regex")
});

pub const DEFAULT_ROOT_IDENTIFIER: &str = "zfsss";
pub const DEFAULT_ZFS_PROGRAM: &str = "zfs";
pub const DEFAULT_ZPOOL_PROGRAM: &str = "zpool";

/// Locale under which `creation` renders in a fixed, parseable form.
pub const FORCED_LOCALE: &str = "C";

pub const FALLBACK_LABEL_FORMAT: &str = "%Y%m%d%H%M%S";
pub const RANDOM_SUFFIX_LEN: usize = 5;

pub const EXIT_COLLECTED: u8 = 0;
pub const EXIT_INVALID: u8 = 1;
pub const EXIT_CREATE_FAILED: u8 = 2;
pub const EXIT_GENERATION_NOTHING: u8 = 3;
pub const EXIT_LIFETIME_NOTHING: u8 = 4;
