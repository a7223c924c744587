use std::num::NonZeroUsize;

use chrono::{Duration, NaiveDate, NaiveDateTime};
use zsnap_library::{
    record::{GroupPrefix, SnapshotName, SnapshotRecord},
    retention::{RetentionPolicy, plan},
};

fn t0() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2021, 1, 5)
        .unwrap()
        .and_hms_opt(12, 0, 0)
        .unwrap()
}

fn hours_ago(h: i64) -> NaiveDateTime {
    t0() - Duration::hours(h)
}

fn group() -> GroupPrefix {
    GroupPrefix::new("zfsss", "daily")
}

fn snapshot(label: &str, created: NaiveDateTime) -> SnapshotRecord {
    SnapshotRecord::new(SnapshotName::new("tank/data", label), created)
}

fn member(created: NaiveDateTime) -> SnapshotRecord {
    snapshot(&group().label_at(created), created)
}

fn keep_newest(n: usize) -> RetentionPolicy {
    RetentionPolicy::KeepNewest(NonZeroUsize::new(n).unwrap())
}

/// T0..T3, newest first, listed oldest first as `zfs list` does.
fn four_generations() -> Vec<SnapshotRecord> {
    (0..4).rev().map(|h| member(hours_ago(h))).collect()
}

fn names(records: &[SnapshotRecord]) -> Vec<String> {
    records
        .iter()
        .map(SnapshotRecord::fully_qualified_name)
        .collect()
}

#[test]
fn keep_newest_collects_all_but_the_n_newest() {
    let records = four_generations();

    let plan = plan(&group(), records.clone(), keep_newest(2));

    assert_eq!(names(plan.kept()), names(&[records[3].clone(), records[2].clone()]));
    assert_eq!(
        plan.destruction_order(),
        names(&[records[1].clone(), records[0].clone()])
    );
    assert_eq!(plan.kept_count(), 2);
    assert_eq!(plan.collected_count(), 2);
}

#[test]
fn keep_newer_than_uses_a_strict_border() {
    let records = four_generations();

    let plan = plan(
        &group(),
        records,
        RetentionPolicy::KeepNewerThan(hours_ago(1)),
    );

    let collected = plan.garbage().iter().map(|r| r.created()).collect::<Vec<_>>();
    assert_eq!(collected, vec![hours_ago(2), hours_ago(3)]);
    assert!(plan.kept().iter().any(|r| r.created() == hours_ago(1)));
}

#[test]
fn generation_boundary() {
    let exact = (0..3).map(|h| member(hours_ago(h))).collect::<Vec<_>>();
    assert!(plan(&group(), exact, keep_newest(3)).is_empty());

    let one_more = (0..4).map(|h| member(hours_ago(h))).collect::<Vec<_>>();
    let plan = plan(&group(), one_more, keep_newest(3));

    assert_eq!(plan.collected_count(), 1);
    assert_eq!(plan.garbage()[0].created(), hours_ago(3));
}

#[test]
fn age_policy_is_idempotent() {
    let policy = RetentionPolicy::KeepNewerThan(hours_ago(1));

    let first = plan(&group(), four_generations(), policy);
    assert!(!first.is_empty());

    let second = plan(&group(), first.kept().to_vec(), policy);
    assert!(second.is_empty());
    assert_eq!(second.kept(), first.kept());
}

#[test]
fn empty_group_has_nothing_to_collect() {
    assert!(plan(&group(), vec![], keep_newest(1)).is_empty());
    assert!(plan(&group(), vec![], RetentionPolicy::KeepNewerThan(t0())).is_empty());
}

#[test]
fn records_outside_the_group_are_never_collected() {
    let mut records = four_generations();
    records.push(snapshot("manual", hours_ago(48)));
    records.push(snapshot("zfsss_daily2_20200101000000", hours_ago(72)));
    records.push(snapshot("zfsss_weekly_20200101000000", hours_ago(96)));

    for policy in [keep_newest(1), RetentionPolicy::KeepNewerThan(t0())] {
        let plan = plan(&group(), records.clone(), policy);

        assert!(plan.garbage().iter().all(|r| r.in_group(&group())));
        assert!(plan.kept().iter().all(|r| r.in_group(&group())));
        assert_eq!(plan.kept_count() + plan.collected_count(), 4);
    }
}

#[test]
fn equal_timestamps_keep_listing_order() {
    let created = hours_ago(5);
    let records = vec![
        snapshot("zfsss_daily_a", created),
        snapshot("zfsss_daily_b", created),
        snapshot("zfsss_daily_c", created),
    ];

    let first = plan(&group(), records.clone(), keep_newest(1));
    let second = plan(&group(), records, keep_newest(1));

    assert_eq!(first.kept()[0].label(), "zfsss_daily_a");
    assert_eq!(
        first.destruction_order(),
        vec!["tank/data@zfsss_daily_b", "tank/data@zfsss_daily_c"]
    );
    assert_eq!(first, second);
}

#[test]
fn protect_moves_a_record_back_to_kept() {
    let records = four_generations();
    let oldest = records[0].fully_qualified_name();

    let mut plan = plan(&group(), records, keep_newest(1));

    assert!(plan.protect(&oldest));
    assert!(!plan.protect(&oldest));
    assert!(!plan.destruction_order().contains(&oldest));
    assert_eq!(plan.kept_count(), 2);
    assert_eq!(plan.kept().last().unwrap().fully_qualified_name(), oldest);
}
