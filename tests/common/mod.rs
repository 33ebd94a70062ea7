//! Common test utilities and helpers for starmirror tests
#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{json, Value};
use starmirror::{Mirror, MirrorOutcome};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Temporary workspace holding an output directory and a config file
pub struct TestEnvironment {
    pub temp_dir: TempDir,
    pub output_dir: PathBuf,
}

impl TestEnvironment {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let output_dir = temp_dir.path().join("repos");

        Self {
            temp_dir,
            output_dir,
        }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn create_test_config(&self, content: &str) -> PathBuf {
        let config_path = self.temp_dir.path().join("config.yml");
        std::fs::write(&config_path, content).expect("Failed to write test config");
        config_path
    }

    /// Config pointing the listing client at `api_base_url`
    pub fn create_config_for(&self, api_base_url: &str, wiki_host: &str) -> PathBuf {
        let content = format!(
            r#"
output_directory: "{}"
listing:
  api_base_url: "{}"
  request_timeout: 5
mirror:
  wiki_host: "{}"
"#,
            self.output_dir.display(),
            api_base_url,
            wiki_host
        );
        self.create_test_config(&content)
    }
}

/// Mirror fake that records every call and creates the destination on success
#[derive(Clone, Default)]
pub struct RecordingMirror {
    calls: Arc<Mutex<Vec<(String, PathBuf)>>>,
    failing_sources: Vec<String>,
}

impl RecordingMirror {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_for(sources: &[&str]) -> Self {
        Self {
            calls: Arc::default(),
            failing_sources: sources.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn calls(&self) -> Vec<(String, PathBuf)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn destinations(&self) -> Vec<PathBuf> {
        self.calls().into_iter().map(|(_, dest)| dest).collect()
    }
}

#[async_trait]
impl Mirror for RecordingMirror {
    async fn mirror(&self, source: &str, destination: &Path) -> MirrorOutcome {
        self.calls
            .lock()
            .unwrap()
            .push((source.to_string(), destination.to_path_buf()));

        if self.failing_sources.iter().any(|s| s == source) {
            return MirrorOutcome::failed("fatal: repository not found");
        }

        std::fs::create_dir_all(destination).expect("create mirror dir");
        MirrorOutcome::Success
    }
}

/// One starred repository entry as the listing endpoint returns it
pub fn starred(full_name: &str, has_wiki: bool) -> Value {
    json!({
        "full_name": full_name,
        "ssh_url": format!("git@github.com:{}.git", full_name),
        "clone_url": format!("https://github.com/{}.git", full_name),
        "has_wiki": has_wiki,
        "description": null,
    })
}

/// Mount one page of an account's starred listing, expected exactly once
pub async fn mount_starred_page(
    server: &MockServer,
    account: &str,
    page: u32,
    per_page: u32,
    entries: Vec<Value>,
) {
    Mock::given(method("GET"))
        .and(path(format!("/users/{}/starred", account)))
        .and(query_param("page", page.to_string()))
        .and(query_param("per_page", per_page.to_string()))
        .respond_with(ResponseTemplate::new(200).set_body_json(Value::Array(entries)))
        .expect(1)
        .mount(server)
        .await;
}

/// Mount a raw response for every page of an account's listing
pub async fn mount_raw_listing(server: &MockServer, account: &str, status: u16, body: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/users/{}/starred", account)))
        .respond_with(ResponseTemplate::new(status).set_body_string(body))
        .expect(1)
        .mount(server)
        .await;
}

pub fn init_bare_repo(path: &Path) {
    let status = Command::new("git")
        .args(["init", "--bare", "--quiet"])
        .arg(path)
        .status()
        .expect("Failed to run git init");
    assert!(status.success(), "git init failed for {}", path.display());
}

/// Assertion helper for CLI output
pub fn assert_contains_all(text: &str, expected: &[&str]) {
    for item in expected {
        assert!(
            text.contains(item),
            "Expected text to contain '{}', but it didn't. Text: {}",
            item,
            text
        );
    }
}
