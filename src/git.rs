use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command as AsyncCommand;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::config::Config;

/// Result of a single mirror-clone invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MirrorOutcome {
    Success,
    Failed { error: String },
}

impl MirrorOutcome {
    pub fn failed(error: impl Into<String>) -> Self {
        MirrorOutcome::Failed {
            error: error.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, MirrorOutcome::Success)
    }
}

/// Capability that produces a bare mirror of `source` at `destination`
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Mirror: Send + Sync {
    async fn mirror(&self, source: &str, destination: &Path) -> MirrorOutcome;
}

/// Mirror implementation backed by `git clone --mirror`
#[derive(Debug, Clone)]
pub struct GitMirror {
    git_binary: PathBuf,
    timeout: Option<Duration>,
}

impl GitMirror {
    pub fn new(git_binary: impl Into<PathBuf>) -> Self {
        Self {
            git_binary: git_binary.into(),
            timeout: None,
        }
    }

    /// Create a git mirror from the mirror section of the configuration
    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.mirror.git_binary).with_timeout(config.clone_timeout())
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Clone into a `.partial` sibling and move it into place on success
    ///
    /// A clone that fails or times out never leaves `destination` behind, so
    /// the next run sees it as missing and tries again. An existing
    /// destination is handed straight to git, which refuses to clone into it.
    async fn clone_mirror(&self, source: &str, destination: &Path) -> MirrorOutcome {
        if let Some(parent) = destination.parent() {
            if let Err(e) = tokio::fs::create_dir_all(parent).await {
                return MirrorOutcome::failed(format!(
                    "Failed to create parent directory {}: {}",
                    parent.display(),
                    e
                ));
            }
        }

        if tokio::fs::try_exists(destination).await.unwrap_or(false) {
            return self.run_clone(source, destination).await;
        }

        let Some(staging) = staging_path(destination) else {
            return MirrorOutcome::failed(format!(
                "Invalid mirror destination {}",
                destination.display()
            ));
        };
        remove_partial(&staging).await;

        let outcome = self.run_clone(source, &staging).await;
        if !outcome.is_success() {
            remove_partial(&staging).await;
            return outcome;
        }

        match tokio::fs::rename(&staging, destination).await {
            Ok(()) => MirrorOutcome::Success,
            Err(e) => {
                remove_partial(&staging).await;
                MirrorOutcome::failed(format!(
                    "Failed to move mirror into {}: {}",
                    destination.display(),
                    e
                ))
            }
        }
    }

    async fn run_clone(&self, source: &str, destination: &Path) -> MirrorOutcome {
        let mut command = AsyncCommand::new(&self.git_binary);
        command
            .args(["clone", "--mirror", source])
            .arg(destination)
            .kill_on_drop(true);
        let output = command.output();

        let output = match self.timeout {
            Some(limit) => match timeout(limit, output).await {
                Ok(result) => result,
                Err(_) => {
                    return MirrorOutcome::failed(format!(
                        "git clone timed out after {}s",
                        limit.as_secs()
                    ))
                }
            },
            None => output.await,
        };

        match output {
            Ok(output) if output.status.success() => MirrorOutcome::Success,
            Ok(output) => {
                let stderr = String::from_utf8_lossy(&output.stderr);
                MirrorOutcome::failed(format!("git clone failed: {}", stderr.trim()))
            }
            Err(e) => MirrorOutcome::failed(format!(
                "Failed to execute {}: {}",
                self.git_binary.display(),
                e
            )),
        }
    }
}

/// `<name>.git` -> `<name>.git.partial`
fn staging_path(destination: &Path) -> Option<PathBuf> {
    let mut name = destination.file_name()?.to_os_string();
    name.push(".partial");
    Some(destination.with_file_name(name))
}

async fn remove_partial(path: &Path) {
    match tokio::fs::remove_dir_all(path).await {
        Ok(()) => debug!("Removed partial clone {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove partial clone {}: {}", path.display(), e),
    }
}

impl Default for GitMirror {
    fn default() -> Self {
        Self::new("git")
    }
}

#[async_trait]
impl Mirror for GitMirror {
    async fn mirror(&self, source: &str, destination: &Path) -> MirrorOutcome {
        debug!("git clone --mirror {} {}", source, destination.display());
        self.clone_mirror(source, destination).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::process::Command;
    use tempfile::TempDir;

    fn init_bare_repo(path: &Path) {
        let status = Command::new("git")
            .args(["init", "--bare", "--quiet"])
            .arg(path)
            .status()
            .expect("git init");
        assert!(status.success());
    }

    /// Stand-in git that creates its destination, then runs `body`
    #[cfg(unix)]
    fn fake_git(dir: &Path, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let script = dir.join("fake-git");
        std::fs::write(&script, format!("#!/bin/sh\nmkdir -p \"$4\"\n{}\n", body)).unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        script
    }

    #[test]
    fn test_staging_path_is_sibling() {
        assert_eq!(
            staging_path(Path::new("/srv/repos/octocat/Hello-World.git")),
            Some(PathBuf::from("/srv/repos/octocat/Hello-World.git.partial"))
        );
    }

    #[test]
    fn test_from_config_reads_binary_and_timeout() {
        let mut config = Config::default();
        config.mirror.git_binary = "/opt/git/bin/git".to_string();
        config.mirror.timeout = 30;

        let mirror = GitMirror::from_config(&config);
        assert_eq!(mirror.git_binary, PathBuf::from("/opt/git/bin/git"));
        assert_eq!(mirror.timeout, Some(Duration::from_secs(30)));
    }

    #[tokio::test]
    async fn test_mirror_clone_creates_bare_repository() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("upstream.git");
        init_bare_repo(&source);

        let destination = temp.path().join("out").join("octocat").join("upstream.git");
        let outcome = GitMirror::default()
            .mirror(source.to_str().unwrap(), &destination)
            .await;

        assert_eq!(outcome, MirrorOutcome::Success);
        assert!(destination.join("HEAD").exists());
        assert!(!destination.join(".git").exists());
    }

    #[tokio::test]
    async fn test_missing_source_is_failure() {
        let temp = TempDir::new().unwrap();
        let destination = temp.path().join("octocat").join("missing.git");

        let outcome = GitMirror::default()
            .mirror("/nonexistent/source/repo.git", &destination)
            .await;

        assert_matches!(outcome, MirrorOutcome::Failed { ref error } if error.contains("git clone failed"));
        assert!(!outcome.is_success());
    }

    #[tokio::test]
    async fn test_missing_binary_is_failure() {
        let temp = TempDir::new().unwrap();
        let outcome = GitMirror::new("/nonexistent/bin/git")
            .mirror("git@github.com:octocat/Hello-World.git", &temp.path().join("x.git"))
            .await;

        assert_matches!(outcome, MirrorOutcome::Failed { ref error } if error.contains("Failed to execute"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_timed_out_clone_leaves_no_destination() {
        let temp = TempDir::new().unwrap();
        let git = fake_git(temp.path(), "sleep 5");
        let destination = temp.path().join("repos").join("octocat").join("slow.git");

        let mirror = GitMirror::new(git).with_timeout(Some(Duration::from_secs(1)));

        for _ in 0..2 {
            let outcome = mirror
                .mirror("git@github.com:octocat/slow.git", &destination)
                .await;
            assert_matches!(outcome, MirrorOutcome::Failed { ref error } if error.contains("timed out"));
            assert!(!destination.exists());
            assert!(!staging_path(&destination).unwrap().exists());
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failed_clone_leaves_no_destination() {
        let temp = TempDir::new().unwrap();
        let git = fake_git(temp.path(), "echo 'fatal: early EOF' >&2; exit 128");
        let destination = temp.path().join("octocat").join("broken.git");

        let outcome = GitMirror::new(git)
            .mirror("git@github.com:octocat/broken.git", &destination)
            .await;

        assert_matches!(outcome, MirrorOutcome::Failed { ref error } if error.contains("early EOF"));
        assert!(!destination.exists());
        assert!(!staging_path(&destination).unwrap().exists());
    }

    #[tokio::test]
    async fn test_existing_destination_is_not_replaced() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("upstream.git");
        init_bare_repo(&source);

        let destination = temp.path().join("octocat").join("upstream.git");
        std::fs::create_dir_all(&destination).unwrap();
        std::fs::write(destination.join("marker"), "kept").unwrap();

        let outcome = GitMirror::default()
            .mirror(source.to_str().unwrap(), &destination)
            .await;

        assert!(!outcome.is_success());
        assert!(destination.join("marker").exists());
    }
}
