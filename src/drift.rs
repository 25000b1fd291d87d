//! Drift detection: is a fork behind its upstream, and by how much?

use crate::{
    discovery::Repository,
    error::SyncError,
    github::{Comparison, ForkGateway, GitHubError},
};

/// Branch names tried, in order, for both compare and merge-upstream.
///
/// This is a guess at the default branch rather than a lookup of it.
pub const BRANCH_CANDIDATES: [&str; 2] = ["main", "master"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriftResult {
    pub is_behind: bool,
    pub behind_by: u64,
}

impl From<Comparison> for DriftResult {
    fn from(comparison: Comparison) -> Self {
        // ahead_by is not surfaced; a diverged fork is not behind.
        Self {
            is_behind: comparison.behind_by > 0,
            behind_by: comparison.behind_by,
        }
    }
}

/// Run `attempt` for each candidate branch until one succeeds.
///
/// Returns the last failure when every candidate fails.
pub(crate) fn with_branch_fallback<T>(
    repo: &Repository,
    mut attempt: impl FnMut(&str) -> Result<T, GitHubError>,
) -> Result<T, GitHubError> {
    let mut last_error = None;
    for branch in BRANCH_CANDIDATES {
        match attempt(branch) {
            Ok(value) => return Ok(value),
            Err(error) => {
                tracing::debug!("{}: branch '{}' failed: {}", repo.full_name, branch, error);
                last_error = Some(error);
            }
        }
    }
    Err(last_error.unwrap_or(GitHubError::NotFound {
        message: "no branch candidates".to_string(),
    }))
}

/// Compare the fork against `parent_owner:<branch>`, trying `main` then `master`.
pub fn check_behind<G: ForkGateway + ?Sized>(
    gateway: &G,
    repo: &Repository,
) -> Result<DriftResult, SyncError> {
    let comparison = with_branch_fallback(repo, |branch| {
        let base = format!("{}:{}", repo.parent_owner, branch);
        gateway.compare_refs(&repo.owner, &repo.name, &base, branch)
    })
    .map_err(SyncError::Compare)?;

    tracing::debug!(
        "{} is {} ahead and {} behind {}/{}",
        repo.full_name,
        comparison.ahead_by,
        comparison.behind_by,
        repo.parent_owner,
        repo.parent_name
    );
    Ok(DriftResult::from(comparison))
}
