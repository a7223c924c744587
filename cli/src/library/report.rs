use std::io::Write;

use console::style;
use serde::Serialize;
use zsnap_library::record::SnapshotRecord;

use crate::library::{
    config::PolicySpec,
    lifecycle::{Aborted, Outcome, Request, Stage},
    table::print_plan_table,
};

/// Everything a caller needs to know about one run, without re-running it.
#[derive(Debug, Serialize)]
pub struct RunReport {
    pub status: Status,
    pub exit_code: u8,
    pub stage: Stage,
    pub volume: String,
    pub label: String,
    pub policy: PolicySpec,
    pub dry_run: bool,
    pub created: Option<String>,
    pub kept: Vec<SnapshotRecord>,
    pub garbage: Vec<SnapshotRecord>,
    pub collected: Vec<String>,
    pub remaining: Vec<String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Collected,
    Planned,
    NothingToCollect,
    Aborted,
}

impl RunReport {
    pub fn new(request: &Request, result: &Result<Outcome, Aborted>) -> Self {
        let mut report = RunReport {
            status: Status::Aborted,
            exit_code: 0,
            stage: Stage::Idle,
            volume: request.volume.clone(),
            label: request.label.clone(),
            policy: request.policy,
            dry_run: request.dry_run,
            created: None,
            kept: vec![],
            garbage: vec![],
            collected: vec![],
            remaining: vec![],
            error: None,
        };

        match result {
            Ok(outcome) => {
                report.status = match outcome.stage {
                    Stage::NothingToCollect => Status::NothingToCollect,
                    Stage::Collected => Status::Collected,
                    _ => Status::Planned,
                };
                report.exit_code = outcome.exit_code();
                report.stage = outcome.stage;
                report.created = outcome.created.clone();
                report.kept = outcome.plan.kept().to_vec();
                report.garbage = outcome.plan.garbage().to_vec();
                report.collected = outcome.collected.clone();
            }
            Err(aborted) => {
                report.exit_code = aborted.exit_code();
                report.stage = aborted.stage;
                report.created = aborted.created.clone();
                report.collected = aborted.collected.clone();
                report.remaining = aborted.remaining.clone();
                report.error = Some(aborted.error.to_string());
            }
        }

        report
    }
}

pub fn print_json(out: &mut impl Write, report: &RunReport) -> anyhow::Result<()> {
    serde_json::to_writer_pretty(&mut *out, report)?;
    writeln!(out)?;

    Ok(())
}

pub fn print_human(
    out: &mut impl Write,
    err: &mut impl Write,
    result: &Result<Outcome, Aborted>,
) -> anyhow::Result<()> {
    match result {
        Ok(outcome) => {
            if let Some(created) = &outcome.created {
                writeln!(out, "{} {}", style("created").green().bold(), created)?;
            }

            if !outcome.plan.kept().is_empty() || !outcome.plan.is_empty() {
                print_plan_table(out, &outcome.plan, outcome.created.as_deref())?;
            }

            match outcome.stage {
                Stage::NothingToCollect => writeln!(out, "not found.")?,
                Stage::Collected => writeln!(
                    out,
                    "complete. {} snapshot(s) collected.",
                    outcome.collected.len()
                )?,
                _ => writeln!(
                    out,
                    "dry run. {} snapshot(s) would be collected.",
                    outcome.plan.collected_count()
                )?,
            }
        }
        Err(aborted) => {
            writeln!(err, "{} {}", style("error:").red().bold(), aborted.error)?;

            if let Some(created) = &aborted.created {
                writeln!(err, "  created:   {}", created)?;
            }

            for name in &aborted.collected {
                writeln!(err, "  collected: {}", name)?;
            }

            for name in &aborted.remaining {
                writeln!(err, "  remaining: {}", name)?;
            }
        }
    }

    Ok(())
}
