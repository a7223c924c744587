use std::num::NonZeroUsize;

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::record::{GroupPrefix, SnapshotRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "policy", content = "threshold")]
pub enum RetentionPolicy {
    /// Collect every snapshot created strictly before the border.
    KeepNewerThan(NaiveDateTime),
    /// Collect everything but the `n` newest snapshots.
    KeepNewest(NonZeroUsize),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RetentionPlan {
    kept: Vec<SnapshotRecord>,
    garbage: Vec<SnapshotRecord>,
}

impl RetentionPlan {
    pub fn kept(&self) -> &[SnapshotRecord] {
        &self.kept
    }

    pub fn garbage(&self) -> &[SnapshotRecord] {
        &self.garbage
    }

    pub fn kept_count(&self) -> usize {
        self.kept.len()
    }

    pub fn collected_count(&self) -> usize {
        self.garbage.len()
    }

    /// True when the policy found nothing to collect.
    pub fn is_empty(&self) -> bool {
        self.garbage.is_empty()
    }

    pub fn destruction_order(&self) -> Vec<String> {
        self.garbage
            .iter()
            .map(SnapshotRecord::fully_qualified_name)
            .collect()
    }

    /// Moves `name` out of the garbage set. Returns whether it was there.
    pub fn protect(&mut self, name: &str) -> bool {
        let Some(index) = self
            .garbage
            .iter()
            .position(|r| r.fully_qualified_name() == name)
        else {
            return false;
        };

        let record = self.garbage.remove(index);
        let at = self
            .kept
            .partition_point(|kept| kept.created() >= record.created());
        self.kept.insert(at, record);

        true
    }
}

/// Splits one group's snapshots into kept and garbage, newest first.
///
/// Records outside `group` are dropped before the policy runs. Equal creation
/// times keep the order they were listed in.
pub fn plan(
    group: &GroupPrefix,
    records: Vec<SnapshotRecord>,
    policy: RetentionPolicy,
) -> RetentionPlan {
    let mut records = records
        .into_iter()
        .filter(|r| r.in_group(group))
        .collect::<Vec<_>>();

    records.sort_by(|a, b| b.created().cmp(&a.created()));

    let (kept, garbage) = match policy {
        RetentionPolicy::KeepNewerThan(border) => {
            records.into_iter().partition(|r| r.created() >= border)
        }
        RetentionPolicy::KeepNewest(n) => {
            let garbage = records.split_off(n.get().min(records.len()));
            (records, garbage)
        }
    };

    RetentionPlan { kept, garbage }
}
