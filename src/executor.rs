//! Sync executor: merge upstream changes into a fork that is behind.

use chrono::{DateTime, SecondsFormat, Utc};

use crate::{
    discovery::Repository,
    drift::with_branch_fallback,
    error::SyncError,
    github::ForkGateway,
};

/// Before/after snapshot of a sync, for the audit log.
///
/// The snapshot is the default-branch name, not a commit SHA: the repository
/// endpoint used here does not expose one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditRecord {
    pub repository: String,
    pub branch: String,
    pub timestamp: DateTime<Utc>,
    pub before: String,
    /// `None` when the post-sync lookup failed.
    pub after: Option<String>,
}

/// Merge upstream into the fork, trying `main` then `master`.
///
/// Only the merge decides the outcome. The trailing repository lookup is
/// best-effort: if it fails the sync still counts as successful.
pub fn sync_with_upstream<G: ForkGateway + ?Sized>(
    gateway: &G,
    repo: &Repository,
) -> Result<AuditRecord, SyncError> {
    let before = gateway
        .get_repository(&repo.owner, &repo.name)
        .map_err(SyncError::RepositoryInfo)?
        .default_branch;

    let mut merged_branch = String::new();
    let response = with_branch_fallback(repo, |branch| {
        merged_branch = branch.to_string();
        gateway.merge_upstream(&repo.owner, &repo.name, branch)
    })
    .map_err(SyncError::Merge)?;

    tracing::debug!(
        "{}: {} ({})",
        repo.full_name,
        response.message.as_deref().unwrap_or("merged upstream"),
        response.merge_type.as_deref().unwrap_or("unknown merge type")
    );

    let after = match gateway.get_repository(&repo.owner, &repo.name) {
        Ok(detail) => Some(detail.default_branch),
        Err(error) => {
            tracing::warn!(
                "Failed to get updated repository info for {}: {}",
                repo.full_name,
                error
            );
            None
        }
    };

    let record = AuditRecord {
        repository: repo.full_name.clone(),
        branch: merged_branch,
        timestamp: Utc::now(),
        before,
        after,
    };
    tracing::info!(
        target: "audit",
        repository = %record.repository,
        branch = %record.branch,
        before = %record.before,
        after = record.after.as_deref().unwrap_or("unavailable"),
        timestamp = %record.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
        "Synced {}",
        record.repository
    );
    Ok(record)
}
