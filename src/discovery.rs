//! Fork discovery: find the repositories that are forks with a known parent.

use crate::github::{ForkGateway, GitHubError};

/// A fork and the upstream repository it was created from.
///
/// Only constructed for forks whose parent linkage resolved, so the parent
/// fields are always populated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Repository {
    pub owner: String,
    pub name: String,
    pub full_name: String,
    pub parent_owner: String,
    pub parent_name: String,
}

/// List every fork visible to the authenticated identity.
///
/// Fails only when the listing itself fails. A fork whose detail lookup
/// errors, or which has no parent metadata, is logged and skipped.
pub fn discover_forks<G: ForkGateway + ?Sized>(gateway: &G) -> Result<Vec<Repository>, GitHubError> {
    let repos = gateway.list_repositories()?;

    let mut forks = Vec::new();
    for (index, repo) in repos.iter().filter(|repo| repo.fork).enumerate() {
        tracing::debug!("Processing fork #{}: {}", index + 1, repo.full_name);

        let detail = match gateway.get_repository(&repo.owner.login, &repo.name) {
            Ok(detail) => detail,
            Err(error) => {
                tracing::warn!("Error getting details for {}: {}", repo.full_name, error);
                continue;
            }
        };

        if !detail.fork {
            tracing::warn!("{} is no longer a fork", detail.full_name);
            continue;
        }
        let Some(parent) = detail.parent else {
            tracing::warn!("Fork {} has no parent information", detail.full_name);
            continue;
        };

        tracing::debug!("Added fork: {} (parent: {})", detail.full_name, parent.full_name);
        forks.push(Repository {
            owner: detail.owner.login,
            name: detail.name,
            full_name: detail.full_name,
            parent_owner: parent.owner.login,
            parent_name: parent.name,
        });
    }

    tracing::info!("Identified {} forks with parent information", forks.len());
    Ok(forks)
}
