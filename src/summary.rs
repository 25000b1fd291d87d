//! Per-fork outcomes and the aggregate reports built from them.

use std::collections::BTreeMap;

use chrono::{SecondsFormat, Utc};
use serde::Serialize;

/// What happened to one fork during a run. Exactly one per fork.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SyncOutcome {
    UpToDate,
    /// Dry-run only: the fork is behind and would have been synced.
    WouldSync { behind_by: u64 },
    Synced { behind_by: u64 },
    Error { message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ForkReport {
    pub name: String,
    #[serde(flatten)]
    pub outcome: SyncOutcome,
}

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn record_error(errors: &mut BTreeMap<String, String>, report: &ForkReport, message: &str) {
    if let Some(previous) = errors.insert(report.name.clone(), message.to_string()) {
        tracing::warn!(
            "Two failing forks are named {}; replacing error '{}'",
            report.name,
            previous
        );
    }
}

/// Aggregate of a `sync` run.
///
/// `synced` also holds dry-run `WouldSync` forks. The three partitions are
/// disjoint; `errors` is sorted by name so JSON output is stable.
///
/// `errors` is keyed by repository name, so two failing forks that share a
/// name under different owners keep only the later message. The totals count
/// outcomes, not map entries, and still add up to the number of forks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub synced: Vec<String>,
    pub up_to_date: Vec<String>,
    pub errors: BTreeMap<String, String>,
    pub timestamp: String,
    pub dry_run: bool,
    pub total_synced: usize,
    pub total_up_to_date: usize,
    pub total_errors: usize,
    pub total_repos: usize,
}

impl RunSummary {
    pub fn new(dry_run: bool) -> Self {
        Self {
            dry_run,
            ..Self::default()
        }
    }

    /// Route one outcome into its partition, in arrival order.
    pub fn record(&mut self, report: &ForkReport) {
        match &report.outcome {
            SyncOutcome::UpToDate => self.up_to_date.push(report.name.clone()),
            SyncOutcome::WouldSync { .. } | SyncOutcome::Synced { .. } => {
                self.synced.push(report.name.clone())
            }
            SyncOutcome::Error { message } => {
                record_error(&mut self.errors, report, message);
                self.total_errors += 1;
            }
        }
        self.total_repos += 1;
    }

    /// Stamp the completion time and derive the partition counts.
    pub fn finalize(&mut self) {
        self.timestamp = now_rfc3339();
        self.total_synced = self.synced.len();
        self.total_up_to_date = self.up_to_date.len();
    }
}

/// Aggregate of a `ci-check` run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CheckReport {
    pub behind_repos: Vec<String>,
    pub up_to_date_repos: Vec<String>,
    pub errors: BTreeMap<String, String>,
    pub timestamp: String,
    pub total_behind: usize,
    pub total_up_to_date: usize,
    pub total_errors: usize,
    pub total_repos: usize,
    pub outdated_status: bool,
}

impl CheckReport {
    pub fn record(&mut self, report: &ForkReport) {
        match &report.outcome {
            SyncOutcome::UpToDate => self.up_to_date_repos.push(report.name.clone()),
            SyncOutcome::WouldSync { .. } | SyncOutcome::Synced { .. } => {
                self.behind_repos.push(report.name.clone())
            }
            SyncOutcome::Error { message } => {
                record_error(&mut self.errors, report, message);
                self.total_errors += 1;
            }
        }
        self.total_repos += 1;
    }

    pub fn finalize(&mut self) {
        self.timestamp = now_rfc3339();
        self.total_behind = self.behind_repos.len();
        self.total_up_to_date = self.up_to_date_repos.len();
        self.outdated_status = self.total_behind > 0;
    }
}
