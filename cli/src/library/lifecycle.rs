//! One run of create-then-collect for a single volume and label group.

use chrono::NaiveDateTime;
use indicatif::ProgressBar;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};
use zsnap_library::{
    record::{GroupPrefix, SnapshotRecord},
    retention::{self, RetentionPlan},
};

use crate::library::{
    config::PolicySpec,
    constant::{EXIT_COLLECTED, EXIT_CREATE_FAILED, EXIT_INVALID},
    error::ZsnapError,
    progress::{create_collection_bar, create_spinner},
    zfs::Zfs,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Idle,
    VolumeValidated,
    SnapshotCreated,
    PolicyApplied,
    Collected,
    NothingToCollect,
}

#[derive(Debug, Clone)]
pub struct Request {
    pub volume: String,
    pub label: String,
    pub policy: PolicySpec,
    pub now: NaiveDateTime,
    pub dry_run: bool,
}

#[derive(Debug, Clone)]
pub struct Outcome {
    /// `Collected`, `NothingToCollect`, or `PolicyApplied` for a dry run.
    pub stage: Stage,
    pub policy: PolicySpec,
    pub created: Option<String>,
    pub plan: RetentionPlan,
    pub collected: Vec<String>,
}

impl Outcome {
    pub fn exit_code(&self) -> u8 {
        match self.stage {
            Stage::NothingToCollect => self.policy.nothing_to_collect_code(),
            _ => EXIT_COLLECTED,
        }
    }
}

/// A run stopped by a failure. `stage` is the last stage reached.
#[derive(Debug, Error)]
#[error("{error}")]
pub struct Aborted {
    pub stage: Stage,
    #[source]
    pub error: ZsnapError,
    pub created: Option<String>,
    pub collected: Vec<String>,
    pub remaining: Vec<String>,
    creating: bool,
}

impl Aborted {
    fn at(stage: Stage, error: ZsnapError) -> Self {
        Aborted {
            stage,
            error,
            created: None,
            collected: vec![],
            remaining: vec![],
            creating: false,
        }
    }

    fn creating(error: ZsnapError) -> Self {
        Aborted {
            creating: true,
            ..Aborted::at(Stage::VolumeValidated, error)
        }
    }

    fn with_created(mut self, created: Option<String>) -> Self {
        self.created = created;
        self
    }

    pub fn exit_code(&self) -> u8 {
        match self.creating {
            true => EXIT_CREATE_FAILED,
            false => EXIT_INVALID,
        }
    }
}

pub struct Lifecycle<'a> {
    zfs: &'a Zfs<'a>,
    root_identifier: String,
    show_progress: bool,
}

impl<'a> Lifecycle<'a> {
    pub fn new(zfs: &'a Zfs<'a>, root_identifier: &str) -> Self {
        Lifecycle {
            zfs,
            root_identifier: root_identifier.to_string(),
            show_progress: false,
        }
    }

    pub fn show_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub fn run(&self, request: &Request) -> Result<Outcome, Aborted> {
        let group = GroupPrefix::new(&self.root_identifier, &request.label);

        info!(
            volume = %request.volume,
            group = %group,
            "zfs snapshot management by {}",
            request.policy.describe()
        );

        let volumes = self
            .zfs
            .volume_names()
            .map_err(|e| Aborted::at(Stage::Idle, e))?;

        if !volumes.contains(&request.volume) {
            return Err(Aborted::at(
                Stage::Idle,
                ZsnapError::VolumeNotFound(request.volume.clone()),
            ));
        }

        let label = group.label_at(request.now);

        let created = match request.dry_run {
            true => None,
            false => Some(
                self.zfs
                    .create_snapshot(&request.volume, Some(label.as_str()))
                    .map_err(Aborted::creating)?,
            ),
        };

        let stage = match created {
            Some(_) => Stage::SnapshotCreated,
            None => Stage::VolumeValidated,
        };

        let plan = self
            .plan(request, &group, created.as_deref())
            .map_err(|e| Aborted::at(stage, e).with_created(created.clone()))?;

        info!(
            kept = plan.kept_count(),
            garbage = plan.collected_count(),
            "retention policy applied"
        );

        let stage = match (plan.is_empty(), request.dry_run) {
            (true, _) => Stage::NothingToCollect,
            (false, true) => Stage::PolicyApplied,
            (false, false) => Stage::Collected,
        };

        let collected = match stage {
            Stage::Collected => self.collect(&plan, created.as_deref())?,
            _ => vec![],
        };

        if stage == Stage::NothingToCollect {
            info!("nothing to collect");
        }

        Ok(Outcome {
            stage,
            policy: request.policy,
            created,
            plan,
            collected,
        })
    }

    fn plan(
        &self,
        request: &Request,
        group: &GroupPrefix,
        created: Option<&str>,
    ) -> Result<RetentionPlan, ZsnapError> {
        let spinner = self.spinner("searching...".to_string());

        let records = self.zfs.list_snapshots(Some(&request.volume));
        spinner.finish_and_clear();

        // The listing filter is a substring match; only this volume's snapshots count.
        let records = records?
            .into_iter()
            .filter(|r| r.volume() == request.volume)
            .collect::<Vec<SnapshotRecord>>();

        let mut plan = retention::plan(group, records, request.policy.resolve(request.now));

        if let Some(name) = created {
            if plan.protect(name) {
                warn!(snapshot = name, "new snapshot fell under the policy, keeping it");
            }
        }

        Ok(plan)
    }

    fn collect(&self, plan: &RetentionPlan, created: Option<&str>) -> Result<Vec<String>, Aborted> {
        let order = plan.destruction_order();
        let bar = self.collection_bar(order.len() as u64);
        let mut collected = Vec::with_capacity(order.len());

        for (index, record) in plan.garbage().iter().enumerate() {
            let name = &order[index];

            info!(
                snapshot = %name,
                date = %record.created(),
                "snapshot garbage collection"
            );
            bar.set_message(name.clone());

            if let Err(error) = self.zfs.destroy_snapshot(name) {
                bar.abandon();

                return Err(Aborted {
                    stage: Stage::PolicyApplied,
                    error,
                    created: created.map(str::to_string),
                    collected,
                    remaining: order[index..].to_vec(),
                    creating: false,
                });
            }

            collected.push(name.clone());
            bar.inc(1);
        }

        bar.finish_and_clear();
        info!(collected = collected.len(), "complete");

        Ok(collected)
    }

    fn spinner(&self, message: String) -> ProgressBar {
        match self.show_progress {
            true => create_spinner(message).unwrap_or_else(|_| ProgressBar::hidden()),
            false => ProgressBar::hidden(),
        }
    }

    fn collection_bar(&self, total: u64) -> ProgressBar {
        match self.show_progress {
            true => create_collection_bar(total).unwrap_or_else(|_| ProgressBar::hidden()),
            false => ProgressBar::hidden(),
        }
    }
}
