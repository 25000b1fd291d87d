use thiserror::Error;

use crate::github::GitHubError;

/// Per-fork failures of the sync pipeline.
///
/// The `Display` text is what ends up in the run summary's error map.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    #[error("failed to compare commits: {0}")]
    Compare(#[source] GitHubError),
    #[error("failed to sync repository: {0}")]
    Merge(#[source] GitHubError),
    #[error("failed to get repository info: {0}")]
    RepositoryInfo(#[source] GitHubError),
    #[error("cancelled after another repository failed")]
    Cancelled,
    #[error("worker panicked while processing repository")]
    Panicked,
}
