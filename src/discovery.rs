//! Starred repository enumeration
//!
//! This module turns a paginated starred listing into a lazy sequence of
//! pages. The listing itself sits behind the [`StarLister`] trait so the page
//! walk can run against GitHub, a mock server, or an in-memory fake.

use async_trait::async_trait;
use backon::Retryable;
use serde::{Deserialize, Deserializer, Serialize};
use std::path::{Component, Path, PathBuf};
use tracing::{debug, error, info, warn};

use crate::error::ListError;
use crate::retry::RetryConfig;

/// One starred repository as returned by the listing endpoint
///
/// Every field may be omitted or `null`; missing values decode to empty
/// strings and `false`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct RepositoryDescriptor {
    /// `<owner>/<name>`
    #[serde(default, deserialize_with = "null_as_default")]
    pub full_name: String,

    /// HTTPS clone endpoint
    #[serde(default, deserialize_with = "null_as_default")]
    pub clone_url: String,

    /// SSH clone endpoint, preferred for mirroring
    #[serde(default, deserialize_with = "null_as_default")]
    pub ssh_url: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub has_wiki: bool,

    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl RepositoryDescriptor {
    pub fn new(full_name: impl Into<String>) -> Self {
        Self {
            full_name: full_name.into(),
            ..Default::default()
        }
    }

    /// Check that `full_name` is a safe relative path below the output root
    pub fn validate(&self) -> Result<(), String> {
        if self.full_name.is_empty() {
            return Err("repository has no full_name".to_string());
        }
        if self.full_name.contains('\\') {
            return Err(format!("invalid repository name: {}", self.full_name));
        }
        if self.full_name.split('/').any(|segment| segment.is_empty()) {
            return Err(format!("invalid repository name: {}", self.full_name));
        }

        let all_normal = Path::new(&self.full_name)
            .components()
            .all(|component| matches!(component, Component::Normal(_)));
        if !all_normal {
            return Err(format!("invalid repository name: {}", self.full_name));
        }

        Ok(())
    }

    /// `<root>/<owner>/<name>.git`
    pub fn mirror_path(&self, root: &Path) -> PathBuf {
        root.join(format!("{}.git", self.full_name))
    }

    /// `<root>/<owner>/<name>.wiki.git`
    pub fn wiki_path(&self, root: &Path) -> PathBuf {
        root.join(format!("{}.wiki.git", self.full_name))
    }

    /// Remote to mirror from: the SSH endpoint, or the HTTPS one when SSH is absent
    pub fn mirror_source(&self) -> Option<&str> {
        [self.ssh_url.as_str(), self.clone_url.as_str()]
            .into_iter()
            .find(|url| !url.is_empty())
    }

    pub fn wiki_source(&self, wiki_host: &str) -> String {
        format!("{}{}.wiki.git", wiki_host, self.full_name)
    }
}

/// Number of repositories requested per listing page, always within 1..=100
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct PageSize(u32);

impl PageSize {
    pub const MIN: u32 = 1;
    pub const MAX: u32 = 100;

    pub fn new(value: i64) -> Self {
        Self(value.clamp(i64::from(Self::MIN), i64::from(Self::MAX)) as u32)
    }

    /// Parse command-line text; anything that is not an integer means the maximum
    pub fn parse_lenient(text: &str) -> Self {
        match text.trim().parse::<i64>() {
            Ok(value) => Self::new(value),
            Err(_) => Self::default(),
        }
    }

    pub fn get(self) -> u32 {
        self.0
    }

    fn as_usize(self) -> usize {
        self.0 as usize
    }
}

impl Default for PageSize {
    fn default() -> Self {
        Self(Self::MAX)
    }
}

impl std::fmt::Display for PageSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Source of starred repository pages
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StarLister: Send + Sync {
    /// Fetch one page (1-based) of the account's starred repositories
    async fn list_starred(
        &self,
        account: &str,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<RepositoryDescriptor>, ListError>;
}

/// Where an account's enumeration stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumerationState {
    /// More pages may follow
    Pending,
    /// A short or empty page ended the listing
    Done,
    /// A page request failed; no further pages are requested
    Aborted,
}

/// Lazy page-by-page walk over one account's starred repositories
///
/// Each call to [`StarredPages::next_page`] issues at most one listing
/// request (plus retries). A page holding fewer entries than the page size
/// ends the walk. When the account has an exact multiple of the page size,
/// one trailing request returns an empty page and ends it.
pub struct StarredPages<'a, L: StarLister + ?Sized> {
    lister: &'a L,
    account: String,
    per_page: PageSize,
    retry: RetryConfig,
    page: u32,
    seen: usize,
    state: EnumerationState,
    error: Option<ListError>,
}

impl<'a, L: StarLister + ?Sized> StarredPages<'a, L> {
    pub fn new(lister: &'a L, account: impl Into<String>, per_page: PageSize) -> Self {
        Self {
            lister,
            account: account.into(),
            per_page,
            retry: RetryConfig::fail_fast(),
            page: 0,
            seen: 0,
            state: EnumerationState::Pending,
            error: None,
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn state(&self) -> EnumerationState {
        self.state
    }

    /// Listing requests issued so far, not counting retries
    pub fn pages_requested(&self) -> u32 {
        self.page
    }

    /// Repositories returned so far for this account
    pub fn seen(&self) -> usize {
        self.seen
    }

    /// The error that aborted the walk, if any
    pub fn error(&self) -> Option<&ListError> {
        self.error.as_ref()
    }

    pub fn into_error(self) -> Option<ListError> {
        self.error
    }

    /// Fetch the next non-empty page, or `None` once the walk is over
    pub async fn next_page(&mut self) -> Option<Vec<RepositoryDescriptor>> {
        if self.state != EnumerationState::Pending {
            return None;
        }

        self.page += 1;
        let page = self.page;
        info!("{}: current page: {}", self.account, page);

        match self.fetch(page).await {
            Ok(repos) => {
                self.seen += repos.len();
                if repos.len() < self.per_page.as_usize() {
                    debug!(
                        "{}: page {} returned {} of {}, listing complete ({} total)",
                        self.account,
                        page,
                        repos.len(),
                        self.per_page,
                        self.seen
                    );
                    self.state = EnumerationState::Done;
                }

                if repos.is_empty() {
                    None
                } else {
                    Some(repos)
                }
            }
            Err(e) => {
                error!("{}", describe_failure(&self.account, &e));
                self.state = EnumerationState::Aborted;
                self.error = Some(e);
                None
            }
        }
    }

    async fn fetch(&self, page: u32) -> Result<Vec<RepositoryDescriptor>, ListError> {
        let lister = self.lister;
        let account = self.account.as_str();
        let per_page = self.per_page.get();

        let request = || async move { lister.list_starred(account, page, per_page).await };

        request
            .retry(self.retry.clone().into_backoff())
            .when(|e: &ListError| e.is_retryable())
            .notify(|e: &ListError, delay| {
                warn!("{}: retrying page {} in {:?}: {}", account, page, delay, e);
            })
            .await
    }

    /// Drain every remaining page into one list
    pub async fn collect_all(&mut self) -> Vec<RepositoryDescriptor> {
        let mut all = Vec::new();
        while let Some(page) = self.next_page().await {
            all.extend(page);
        }
        all
    }
}

/// Log line for an aborted listing, with the raw response body when there is one
fn describe_failure(account: &str, error: &ListError) -> String {
    match error.body().map(str::trim) {
        Some(body) if !body.is_empty() => {
            format!("Can't list starred repos of {}: {}\n{}", account, error, body)
        }
        _ => format!("Can't list starred repos of {}: {}", account, error),
    }
}
