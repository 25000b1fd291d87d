//! CLI text rendering for sync and check results.

use std::time::Duration;

use anyhow::{Context, Result};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;

use super::colors::theme;
use crate::summary::{CheckReport, ForkReport, RunSummary, SyncOutcome};

fn ok_marker() -> &'static str {
    if cfg!(target_os = "windows") { "+" } else { "✓" }
}

fn sync_marker() -> &'static str {
    if cfg!(target_os = "windows") { "~" } else { "↻" }
}

fn error_marker() -> &'static str {
    if cfg!(target_os = "windows") { "x" } else { "✗" }
}

fn dry_run_prefix() -> String {
    format!("{} ", theme::GOLD.paint("[DRY-RUN]"))
}

/// Spinner shown on stderr while forks are discovered.
pub fn discovery_spinner() -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"),
    );
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner.set_message("Fetching forked repositories...");
    spinner
}

fn format_outcome(report: &ForkReport, dry_run: bool) -> String {
    let prefix = if dry_run { dry_run_prefix() } else { String::new() };
    let name = report.name.bold();
    match &report.outcome {
        SyncOutcome::UpToDate => format!(
            "{}{} {} is up to date with upstream",
            prefix,
            theme::GREEN.paint(ok_marker()),
            name
        ),
        SyncOutcome::WouldSync { behind_by } => format!(
            "{}{} Would sync {} (behind by {} commits)",
            prefix,
            theme::BLUE.paint(sync_marker()),
            name,
            behind_by
        ),
        SyncOutcome::Synced { behind_by } => format!(
            "{}{} Successfully synced {} with upstream (was behind by {} commits)",
            prefix,
            theme::BLUE.paint(sync_marker()),
            name,
            behind_by
        ),
        SyncOutcome::Error { message } => format!(
            "{}{} Error checking {}: {}",
            prefix,
            theme::RED.paint(error_marker()),
            name,
            message
        ),
    }
}

fn format_check_line(report: &ForkReport) -> String {
    match &report.outcome {
        SyncOutcome::WouldSync { behind_by } | SyncOutcome::Synced { behind_by } => format!(
            "{} {} is behind upstream by {} commits",
            theme::YELLOW.paint(sync_marker()),
            report.name.bold(),
            behind_by
        ),
        _ => format_outcome(report, false),
    }
}

pub fn print_outcome(report: &ForkReport, dry_run: bool) {
    println!("{}", format_outcome(report, dry_run));
}

pub fn print_check_line(report: &ForkReport) {
    println!("{}", format_check_line(report));
}

fn format_run_summary(summary: &RunSummary) -> Vec<String> {
    let synced_label = if summary.dry_run {
        "Would sync repositories"
    } else {
        "Synced repositories"
    };
    let mut lines = vec![
        String::new(),
        "Summary:".bold().to_string(),
        format!(
            "{} {}: {}",
            theme::BLUE.paint(sync_marker()),
            synced_label,
            summary.total_synced
        ),
        format!(
            "{} Up-to-date repositories: {}",
            theme::GREEN.paint(ok_marker()),
            summary.total_up_to_date
        ),
        format!(
            "{} Errors encountered: {}",
            theme::RED.paint(error_marker()),
            summary.total_errors
        ),
    ];
    if summary.total_errors > 0 {
        lines.push(String::new());
        lines.push("See logs for details.".to_string());
    }
    lines
}

fn format_check_summary(check: &CheckReport, fail_on_outdated: bool) -> Vec<String> {
    let mut lines = vec![
        String::new(),
        "Summary:".bold().to_string(),
        format!(
            "{} Repositories behind upstream: {}",
            theme::YELLOW.paint(sync_marker()),
            check.total_behind
        ),
        format!(
            "{} Repositories up to date: {}",
            theme::GREEN.paint(ok_marker()),
            check.total_up_to_date
        ),
        format!(
            "{} Errors encountered: {}",
            theme::RED.paint(error_marker()),
            check.total_errors
        ),
        format!(
            "{} Total repositories checked: {}",
            theme::CYAN.paint("i"),
            check.total_repos
        ),
    ];
    if check.outdated_status {
        lines.push(String::new());
        lines.push(
            theme::YELLOW
                .paint("Some repositories are behind their upstream sources")
                .to_string(),
        );
        if fail_on_outdated {
            lines.push(
                theme::RED
                    .paint("Exiting with non-zero status code due to --fail-on-outdated")
                    .to_string(),
            );
        }
    }
    lines
}

pub fn print_run_summary(summary: &RunSummary) {
    for line in format_run_summary(summary) {
        println!("{}", line);
    }
}

pub fn print_check_summary(check: &CheckReport, fail_on_outdated: bool) {
    for line in format_check_summary(check, fail_on_outdated) {
        println!("{}", line);
    }
}

pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to generate JSON output")?;
    println!("{}", json);
    Ok(())
}
