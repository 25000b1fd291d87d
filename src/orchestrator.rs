//! Concurrent fan-out of the detect/sync pipeline over a batch of forks.
//!
//! One worker thread is spawned per fork. Each worker pushes exactly one
//! [`ForkReport`] onto a shared channel; a supervisor thread joins every
//! worker and then drops its sender, which closes the channel and lets the
//! aggregation loop finish.
//!
//! By default nothing bounds how many workers talk to the API at once. Setting
//! `max_concurrency` changes that (and with it the observable throughput), so
//! it is opt-in.

use std::{
    sync::atomic::{AtomicBool, Ordering},
    thread,
};

use crossbeam_channel::{Receiver, Sender};

use crate::{
    discovery::Repository,
    drift::check_behind,
    error::SyncError,
    executor::sync_with_upstream,
    github::ForkGateway,
    retry::{RetryPolicy, with_retries},
    summary::{CheckReport, ForkReport, RunSummary, SyncOutcome},
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SyncMode {
    #[default]
    Normal,
    /// Detect drift but never merge.
    DryRun,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct OrchestratorOptions {
    pub mode: SyncMode,
    pub retry: RetryPolicy,
    /// `None` runs every fork at once.
    pub max_concurrency: Option<usize>,
    /// After the first error, forks that have not yet reached their next
    /// remote step report `Cancelled` instead of continuing.
    pub abort_on_error: bool,
}

pub struct Orchestrator<'g, G: ?Sized> {
    gateway: &'g G,
    options: OrchestratorOptions,
}

/// Slot in a counting semaphore built on a bounded channel.
struct Permit<'a> {
    slots: &'a Receiver<()>,
}

impl<'a> Permit<'a> {
    fn acquire(slots: &'a (Sender<()>, Receiver<()>)) -> Option<Self> {
        slots.0.send(()).ok()?;
        Some(Self { slots: &slots.1 })
    }
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        let _ = self.slots.recv();
    }
}

impl<'g, G: ForkGateway + ?Sized> Orchestrator<'g, G> {
    pub fn new(gateway: &'g G, options: OrchestratorOptions) -> Self {
        Self { gateway, options }
    }

    /// Detect and (unless dry-run) sync every fork.
    ///
    /// `on_outcome` sees each report as it arrives, before aggregation.
    pub fn run(&self, forks: &[Repository], mut on_outcome: impl FnMut(&ForkReport)) -> RunSummary {
        let mut summary = RunSummary::new(self.options.mode == SyncMode::DryRun);
        self.fan_out(self.options.mode, forks, |report| {
            on_outcome(&report);
            summary.record(&report);
        });
        summary.finalize();
        summary
    }

    /// Drift detection only. The sync step is never reached, whatever mode
    /// the orchestrator was built with.
    pub fn check(&self, forks: &[Repository], mut on_outcome: impl FnMut(&ForkReport)) -> CheckReport {
        let mut check = CheckReport::default();
        self.fan_out(SyncMode::DryRun, forks, |report| {
            on_outcome(&report);
            check.record(&report);
        });
        check.finalize();
        check
    }

    fn fan_out(&self, mode: SyncMode, forks: &[Repository], mut sink: impl FnMut(ForkReport)) {
        if forks.is_empty() {
            return;
        }

        let (tx, rx) = crossbeam_channel::bounded::<ForkReport>(forks.len());
        let slots = self
            .options
            .max_concurrency
            .map(|cap| crossbeam_channel::bounded::<()>(cap.max(1)));
        let slots = slots.as_ref();
        let cancelled = AtomicBool::new(false);
        let cancelled = &cancelled;

        thread::scope(|scope| {
            let workers: Vec<_> = forks
                .iter()
                .map(|repo| {
                    let tx = tx.clone();
                    let handle = scope.spawn(move || {
                        let _permit = slots.and_then(Permit::acquire);
                        let outcome = self.process(mode, repo, cancelled);
                        let _ = tx.send(ForkReport {
                            name: repo.name.clone(),
                            outcome,
                        });
                    });
                    (repo.name.as_str(), handle)
                })
                .collect();

            scope.spawn(move || {
                for (name, handle) in workers {
                    if handle.join().is_err() {
                        tracing::error!("Worker for {} panicked", name);
                        let _ = tx.send(ForkReport {
                            name: name.to_string(),
                            outcome: SyncOutcome::Error {
                                message: SyncError::Panicked.to_string(),
                            },
                        });
                    }
                }
            });

            for report in rx.iter() {
                sink(report);
            }
        });
    }

    fn process(&self, mode: SyncMode, repo: &Repository, cancelled: &AtomicBool) -> SyncOutcome {
        match self.pipeline(mode, repo, cancelled) {
            Ok(outcome) => outcome,
            Err(error) => {
                if self.options.abort_on_error {
                    cancelled.store(true, Ordering::SeqCst);
                }
                SyncOutcome::Error {
                    message: error.to_string(),
                }
            }
        }
    }

    fn pipeline(
        &self,
        mode: SyncMode,
        repo: &Repository,
        cancelled: &AtomicBool,
    ) -> Result<SyncOutcome, SyncError> {
        ensure_running(cancelled)?;
        // A cancelled run stops retrying; any in-flight attempt is the last.
        let retryable = |_: &SyncError| !cancelled.load(Ordering::SeqCst);

        tracing::debug!("Checking repository: {}", repo.name);
        let drift = with_retries(
            self.options.retry,
            &format!("checking if {} is behind upstream", repo.name),
            retryable,
            || {
                ensure_running(cancelled)?;
                check_behind(self.gateway, repo)
            },
        )?;

        if !drift.is_behind {
            return Ok(SyncOutcome::UpToDate);
        }
        if mode == SyncMode::DryRun {
            return Ok(SyncOutcome::WouldSync {
                behind_by: drift.behind_by,
            });
        }
        ensure_running(cancelled)?;

        tracing::debug!("Syncing {} with upstream...", repo.name);
        with_retries(
            self.options.retry,
            &format!("syncing {} with upstream", repo.name),
            retryable,
            || {
                ensure_running(cancelled)?;
                sync_with_upstream(self.gateway, repo)
            },
        )?;

        Ok(SyncOutcome::Synced {
            behind_by: drift.behind_by,
        })
    }
}

fn ensure_running(cancelled: &AtomicBool) -> Result<(), SyncError> {
    if cancelled.load(Ordering::SeqCst) {
        Err(SyncError::Cancelled)
    } else {
        Ok(())
    }
}
