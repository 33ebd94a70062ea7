//! Sync Engine - Orchestrates starred repository mirroring
//!
//! This module walks each requested account's starred listing page by page
//! and makes the output directory reflect every descriptor: a missing
//! `<owner>/<name>.git` gets a mirror clone, an existing one is left alone,
//! and a wiki mirror is attempted for every repository that has one.

use crate::config::Config;
use crate::discovery::{EnumerationState, PageSize, RepositoryDescriptor, StarLister, StarredPages};
use crate::git::{GitMirror, Mirror, MirrorOutcome};
use crate::github::GitHubClient;
use crate::retry::RetryConfig;
use anyhow::{Context, Result};
use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Exit status when every account and main mirror succeeded
pub const EXIT_OK: i32 = 0;
/// Exit status when an account aborted or a main mirror failed
pub const EXIT_PARTIAL_FAILURE: i32 = 1;

/// Settings the engine needs for one run
#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub output_dir: PathBuf,
    pub per_page: PageSize,
    pub wiki_host: String,
    pub max_parallel: usize,
    pub retry: RetryConfig,
    pub dry_run: bool,
}

impl SyncOptions {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            per_page: PageSize::default(),
            wiki_host: "git@github.com:".to_string(),
            max_parallel: 1,
            retry: RetryConfig::fail_fast(),
            dry_run: false,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self {
            output_dir: config.output_path(),
            per_page: config.page_size(),
            wiki_host: config.mirror.wiki_host.clone(),
            max_parallel: config.mirror.max_parallel,
            retry: config.retry_config(),
            dry_run: false,
        }
    }

    pub fn with_per_page(mut self, per_page: PageSize) -> Self {
        self.per_page = per_page;
        self
    }

    pub fn with_max_parallel(mut self, max_parallel: usize) -> Self {
        self.max_parallel = max_parallel;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }
}

/// What happened to a repository's main mirror
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncResult {
    /// Mirror clone completed
    Cloned { path: PathBuf },
    /// `<name>.git` already existed, nothing was fetched
    AlreadyMirrored { path: PathBuf },
    /// Dry run: a clone would have been attempted
    WouldClone { path: PathBuf },
    /// Clone failed or the descriptor could not be mirrored
    Failed { path: Option<PathBuf>, error: String },
}

impl SyncResult {
    pub fn is_failure(&self) -> bool {
        matches!(self, SyncResult::Failed { .. })
    }
}

/// Outcome of mirror sync for one enumerated repository
#[derive(Debug, Clone)]
pub struct RepoSyncReport {
    /// 1-based position across the whole run
    pub index: usize,
    pub account: String,
    pub full_name: String,
    pub result: SyncResult,
    /// `None` when no wiki mirror was attempted
    pub wiki: Option<MirrorOutcome>,
}

/// Enumeration result for one account
#[derive(Debug, Clone)]
pub struct AccountSummary {
    pub account: String,
    pub pages_requested: u32,
    pub repositories: usize,
    pub state: EnumerationState,
    pub error: Option<String>,
}

impl AccountSummary {
    pub fn aborted(&self) -> bool {
        self.state == EnumerationState::Aborted
    }
}

/// Everything one account contributed to the run
#[derive(Debug, Clone)]
pub struct AccountPass {
    pub summary: AccountSummary,
    pub reports: Vec<RepoSyncReport>,
    /// Index the next account starts numbering from
    pub next_index: usize,
}

/// Results from a complete sync operation
#[derive(Debug, Clone)]
pub struct SyncSummary {
    pub total_repositories: usize,
    pub cloned: usize,
    pub already_mirrored: usize,
    pub would_clone: usize,
    pub failed: usize,
    pub wikis_mirrored: usize,
    pub aborted_accounts: usize,
    pub duration: Duration,
    pub accounts: Vec<AccountSummary>,
    pub reports: Vec<RepoSyncReport>,
}

impl SyncSummary {
    pub fn has_failures(&self) -> bool {
        self.failed > 0 || self.aborted_accounts > 0
    }

    /// Process exit status reflecting aggregate failures; wikis never count
    pub fn exit_code(&self) -> i32 {
        if self.has_failures() {
            EXIT_PARTIAL_FAILURE
        } else {
            EXIT_OK
        }
    }

    pub fn failures(&self) -> impl Iterator<Item = &RepoSyncReport> {
        self.reports.iter().filter(|report| report.result.is_failure())
    }
}

/// The main sync engine: enumerator feeding mirror sync, account by account
pub struct SyncEngine<L, M> {
    lister: L,
    mirror: M,
    options: SyncOptions,
}

impl<L: StarLister, M: Mirror> SyncEngine<L, M> {
    pub fn new(lister: L, mirror: M, options: SyncOptions) -> Self {
        Self {
            lister,
            mirror,
            options,
        }
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.options.dry_run = dry_run;
        self
    }

    /// Mirror the starred repositories of every account, in order
    pub async fn run(&self, accounts: &[String]) -> SyncSummary {
        let start_time = Instant::now();

        info!(
            "Mirroring starred repositories of {} account(s) into {}",
            accounts.len(),
            self.options.output_dir.display()
        );

        let mut next_index = 1;
        let mut summaries = Vec::with_capacity(accounts.len());
        let mut reports = Vec::new();

        for account in accounts {
            let pass = self.sync_account(account, next_index).await;
            next_index = pass.next_index;
            summaries.push(pass.summary);
            reports.extend(pass.reports);
        }

        let summary = Self::compile_summary(summaries, reports, start_time.elapsed());

        info!(
            "Sync completed in {:.2}s: {} cloned, {} already mirrored, {} failed, {} aborted account(s)",
            summary.duration.as_secs_f64(),
            summary.cloned,
            summary.already_mirrored,
            summary.failed,
            summary.aborted_accounts
        );

        summary
    }

    /// Walk one account's starred pages and mirror each repository
    ///
    /// Progress lines are numbered from `first_index`; the returned pass
    /// carries the index the next account should continue from.
    pub async fn sync_account(&self, account: &str, first_index: usize) -> AccountPass {
        let mut pages = StarredPages::new(&self.lister, account, self.options.per_page)
            .with_retry(self.options.retry.clone());

        let mut index = first_index;
        let mut reports = Vec::new();

        while let Some(page) = pages.next_page().await {
            for (offset, repo) in page.iter().enumerate() {
                println!("repo {:3}: {}", index + offset, repo.full_name);
            }

            let outcomes = self.mirror_page(&page).await;

            for (repo, (result, wiki)) in page.into_iter().zip(outcomes) {
                reports.push(RepoSyncReport {
                    index,
                    account: account.to_string(),
                    full_name: repo.full_name,
                    result,
                    wiki,
                });
                index += 1;
            }
        }

        let summary = AccountSummary {
            account: account.to_string(),
            pages_requested: pages.pages_requested(),
            repositories: pages.seen(),
            state: pages.state(),
            error: pages.error().map(|e| e.to_string()),
        };

        if summary.aborted() {
            warn!(
                "{}: enumeration aborted after {} page(s), {} repositories processed",
                account, summary.pages_requested, summary.repositories
            );
        } else {
            debug!(
                "{}: {} repositories in {} page(s)",
                account, summary.repositories, summary.pages_requested
            );
        }

        AccountPass {
            summary,
            reports,
            next_index: index,
        }
    }

    /// Mirror one page, returning outcomes in page order
    ///
    /// With `max_parallel > 1` the page runs in waves: a `full_name` repeated
    /// within the page lands in a later wave, so no two clones ever target
    /// the same directory and repeats see the mirror their first occurrence
    /// produced.
    async fn mirror_page(
        &self,
        page: &[RepositoryDescriptor],
    ) -> Vec<(SyncResult, Option<MirrorOutcome>)> {
        let parallel = self.options.max_parallel.max(1);

        if parallel == 1 {
            let mut outcomes = Vec::with_capacity(page.len());
            for repo in page {
                outcomes.push(self.sync_repository(repo).await);
            }
            return outcomes;
        }

        let mut outcomes: Vec<Option<(SyncResult, Option<MirrorOutcome>)>> = vec![None; page.len()];

        for wave in waves(page) {
            let results: Vec<_> = stream::iter(wave)
                .map(|position| async move { (position, self.sync_repository(&page[position]).await) })
                .buffered(parallel)
                .collect()
                .await;

            for (position, outcome) in results {
                outcomes[position] = Some(outcome);
            }
        }

        outcomes.into_iter().flatten().collect()
    }

    /// Make the output directory reflect one descriptor
    ///
    /// The main mirror is cloned only when `<name>.git` is absent. The wiki
    /// mirror is attempted whenever `has_wiki` is set, whether or not its
    /// directory exists, and its failure is not an error.
    pub async fn sync_repository(
        &self,
        repo: &RepositoryDescriptor,
    ) -> (SyncResult, Option<MirrorOutcome>) {
        if let Err(reason) = repo.validate() {
            error!("Skipping repository: {}", reason);
            return (
                SyncResult::Failed {
                    path: None,
                    error: reason,
                },
                None,
            );
        }

        let root = &self.options.output_dir;
        let path = repo.mirror_path(root);

        let result = if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            debug!("Already mirrored: {}", path.display());
            SyncResult::AlreadyMirrored { path }
        } else if self.options.dry_run {
            SyncResult::WouldClone { path }
        } else {
            match repo.mirror_source() {
                None => {
                    error!("{}: no clone URL in listing", repo.full_name);
                    SyncResult::Failed {
                        path: Some(path),
                        error: "No valid clone URL found".to_string(),
                    }
                }
                Some(source) => match self.mirror.mirror(source, &path).await {
                    MirrorOutcome::Success => {
                        info!("Mirrored {} -> {}", repo.full_name, path.display());
                        SyncResult::Cloned { path }
                    }
                    MirrorOutcome::Failed { error } => {
                        error!("{}: {}", repo.full_name, error);
                        SyncResult::Failed {
                            path: Some(path),
                            error,
                        }
                    }
                },
            }
        };

        let wiki = if repo.has_wiki && !self.options.dry_run {
            let source = repo.wiki_source(&self.options.wiki_host);
            let outcome = self.mirror.mirror(&source, &repo.wiki_path(root)).await;
            if let MirrorOutcome::Failed { error } = &outcome {
                debug!("{}: wiki not mirrored: {}", repo.full_name, error);
            }
            Some(outcome)
        } else {
            None
        };

        (result, wiki)
    }

    /// Compile sync summary from account passes
    fn compile_summary(
        accounts: Vec<AccountSummary>,
        reports: Vec<RepoSyncReport>,
        duration: Duration,
    ) -> SyncSummary {
        let mut cloned = 0;
        let mut already_mirrored = 0;
        let mut would_clone = 0;
        let mut failed = 0;

        for report in &reports {
            match report.result {
                SyncResult::Cloned { .. } => cloned += 1,
                SyncResult::AlreadyMirrored { .. } => already_mirrored += 1,
                SyncResult::WouldClone { .. } => would_clone += 1,
                SyncResult::Failed { .. } => failed += 1,
            }
        }

        let wikis_mirrored = reports
            .iter()
            .filter(|report| matches!(report.wiki, Some(MirrorOutcome::Success)))
            .count();

        SyncSummary {
            total_repositories: reports.len(),
            cloned,
            already_mirrored,
            would_clone,
            failed,
            wikis_mirrored,
            aborted_accounts: accounts.iter().filter(|a| a.aborted()).count(),
            duration,
            accounts,
            reports,
        }
    }
}

/// Split page positions so each wave holds at most one occurrence of a name
fn waves(page: &[RepositoryDescriptor]) -> Vec<Vec<usize>> {
    let mut occurrences: HashMap<&str, usize> = HashMap::new();
    let mut waves: Vec<Vec<usize>> = Vec::new();

    for (position, repo) in page.iter().enumerate() {
        let wave = occurrences.entry(repo.full_name.as_str()).or_insert(0);
        if waves.len() <= *wave {
            waves.push(Vec::new());
        }
        waves[*wave].push(position);
        *wave += 1;
    }

    waves
}

/// Helper to create a GitHub-backed sync engine from configuration
pub fn create_sync_engine(config: &Config) -> Result<SyncEngine<GitHubClient, GitMirror>> {
    let lister = GitHubClient::new(config).context("Failed to create GitHub client")?;
    let mirror = GitMirror::from_config(config);
    Ok(SyncEngine::new(lister, mirror, SyncOptions::from_config(config)))
}
