//! In-memory `ForkGateway` used by the engine tests.

use std::{
    collections::{HashMap, HashSet},
    sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    thread,
    time::Duration,
};

use crate::github::{
    Comparison,
    ForkGateway,
    GitHubError,
    MergeUpstreamResponse,
    Owner,
    ParentRepo,
    RepoDetail,
    RepoSummary,
};

const OWNER: &str = "me";
const PARENT_OWNER: &str = "upstream";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    List,
    Detail(String),
    Compare {
        name: String,
        base: String,
        head: String,
    },
    Merge {
        name: String,
        branch: String,
    },
}

#[derive(Debug, Clone)]
pub struct FakeFork {
    name: String,
    has_parent: bool,
    detail_fails: bool,
    behind_by: u64,
    master_only: bool,
    compare_error: Option<GitHubError>,
    transient_compare_failures: usize,
    merge_error: Option<GitHubError>,
    info_fails_after_merge: bool,
}

impl FakeFork {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            has_parent: true,
            detail_fails: false,
            behind_by: 0,
            master_only: false,
            compare_error: None,
            transient_compare_failures: 0,
            merge_error: None,
            info_fails_after_merge: false,
        }
    }

    pub fn behind_by(mut self, commits: u64) -> Self {
        self.behind_by = commits;
        self
    }

    pub fn without_parent(mut self) -> Self {
        self.has_parent = false;
        self
    }

    pub fn failing_detail(mut self) -> Self {
        self.detail_fails = true;
        self
    }

    /// Only a `master` branch exists; anything addressed to `main` is a 404.
    pub fn master_only(mut self) -> Self {
        self.master_only = true;
        self
    }

    pub fn failing_compare(mut self, error: GitHubError) -> Self {
        self.compare_error = Some(error);
        self
    }

    pub fn flaky_compare(mut self, failures: usize) -> Self {
        self.transient_compare_failures = failures;
        self
    }

    pub fn failing_merge(mut self, error: GitHubError) -> Self {
        self.merge_error = Some(error);
        self
    }

    pub fn failing_info_after_merge(mut self) -> Self {
        self.info_fails_after_merge = true;
        self
    }

    fn default_branch(&self) -> &'static str {
        if self.master_only { "master" } else { "main" }
    }
}

#[derive(Default)]
struct FakeState {
    calls: Vec<Call>,
    compare_failures_left: HashMap<String, usize>,
    merged: HashSet<String>,
}

#[derive(Default)]
pub struct FakeGateway {
    forks: Vec<FakeFork>,
    plain: Vec<String>,
    listing_fails: bool,
    latency: Duration,
    state: Mutex<FakeState>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fork(mut self, fork: FakeFork) -> Self {
        self.state
            .get_mut()
            .unwrap()
            .compare_failures_left
            .insert(fork.name.clone(), fork.transient_compare_failures);
        self.forks.push(fork);
        self
    }

    pub fn with_plain_repo(mut self, name: &str) -> Self {
        self.plain.push(name.to_string());
        self
    }

    pub fn failing_listing(mut self) -> Self {
        self.listing_fails = true;
        self
    }

    /// Every compare call sleeps this long, to make overlap observable.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn merge_calls(&self, name: &str) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, Call::Merge { name: n, .. } if n == name))
            .count()
    }

    pub fn total_merge_calls(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, Call::Merge { .. }))
            .count()
    }

    pub fn compare_calls(&self, name: &str) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, Call::Compare { name: n, .. } if n == name))
            .count()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn record(&self, call: Call) {
        self.state.lock().unwrap().calls.push(call);
    }

    fn fork(&self, name: &str) -> Result<&FakeFork, GitHubError> {
        self.forks
            .iter()
            .find(|fork| fork.name == name)
            .ok_or_else(|| GitHubError::NotFound {
                message: "Not Found".to_string(),
            })
    }

    fn is_merged(&self, name: &str) -> bool {
        self.state.lock().unwrap().merged.contains(name)
    }
}

fn not_found() -> GitHubError {
    GitHubError::NotFound {
        message: "Not Found".to_string(),
    }
}

impl ForkGateway for FakeGateway {
    fn list_repositories(&self) -> Result<Vec<RepoSummary>, GitHubError> {
        self.record(Call::List);
        if self.listing_fails {
            return Err(GitHubError::Network("connection refused".to_string()));
        }
        let forks = self.forks.iter().map(|fork| (fork.name.as_str(), true));
        let plain = self.plain.iter().map(|name| (name.as_str(), false));
        Ok(forks
            .chain(plain)
            .map(|(name, fork)| RepoSummary {
                name: name.to_string(),
                full_name: format!("{OWNER}/{name}"),
                owner: Owner {
                    login: OWNER.to_string(),
                },
                fork,
            })
            .collect())
    }

    fn get_repository(&self, _owner: &str, name: &str) -> Result<RepoDetail, GitHubError> {
        self.record(Call::Detail(name.to_string()));
        let fork = self.fork(name)?;
        if fork.detail_fails || (fork.info_fails_after_merge && self.is_merged(name)) {
            return Err(GitHubError::Network("connection reset by peer".to_string()));
        }
        Ok(RepoDetail {
            name: fork.name.clone(),
            full_name: format!("{OWNER}/{}", fork.name),
            owner: Owner {
                login: OWNER.to_string(),
            },
            fork: true,
            parent: fork.has_parent.then(|| ParentRepo {
                name: fork.name.clone(),
                full_name: format!("{PARENT_OWNER}/{}", fork.name),
                owner: Owner {
                    login: PARENT_OWNER.to_string(),
                },
            }),
            default_branch: fork.default_branch().to_string(),
        })
    }

    fn compare_refs(
        &self,
        _owner: &str,
        name: &str,
        base: &str,
        head: &str,
    ) -> Result<Comparison, GitHubError> {
        self.record(Call::Compare {
            name: name.to_string(),
            base: base.to_string(),
            head: head.to_string(),
        });

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.latency.is_zero() {
            thread::sleep(self.latency);
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let fork = self.fork(name)?;
        if let Some(error) = &fork.compare_error {
            return Err(error.clone());
        }
        {
            let mut state = self.state.lock().unwrap();
            let left = state.compare_failures_left.entry(name.to_string()).or_default();
            if *left > 0 {
                *left -= 1;
                return Err(GitHubError::Network("connection reset by peer".to_string()));
            }
        }
        if fork.master_only && head == "main" {
            return Err(not_found());
        }
        let behind_by = if self.is_merged(name) { 0 } else { fork.behind_by };
        Ok(Comparison {
            ahead_by: 0,
            behind_by,
        })
    }

    fn merge_upstream(
        &self,
        _owner: &str,
        name: &str,
        branch: &str,
    ) -> Result<MergeUpstreamResponse, GitHubError> {
        self.record(Call::Merge {
            name: name.to_string(),
            branch: branch.to_string(),
        });
        let fork = self.fork(name)?;
        if let Some(error) = &fork.merge_error {
            return Err(error.clone());
        }
        if fork.master_only && branch == "main" {
            return Err(not_found());
        }
        self.state.lock().unwrap().merged.insert(name.to_string());
        Ok(MergeUpstreamResponse {
            message: Some(format!(
                "Successfully fetched and fast-forwarded from upstream {PARENT_OWNER}:{branch}."
            )),
            merge_type: Some("fast-forward".to_string()),
        })
    }
}
