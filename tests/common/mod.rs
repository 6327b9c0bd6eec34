//! Shared test utilities for integration tests.
//!
//! Not all functions are used by every test file, but they're shared across tests.
#![allow(dead_code)]

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use git2::{Oid, Repository, Signature};
use gitscribe::CompletionError;
use gitscribe::llm::{CompletionRequest, CompletionService};

/// A test git repository builder for integration tests.
pub struct TestRepo {
    pub dir: tempfile::TempDir,
    pub repo: Repository,
}

impl TestRepo {
    /// Create a new empty git repository with a committer identity.
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp directory");
        let repo = Repository::init(dir.path()).expect("Failed to init git repo");
        {
            let mut config = repo.config().expect("Failed to open repo config");
            config
                .set_str("user.name", "Test User")
                .expect("Failed to set user.name");
            config
                .set_str("user.email", "test@example.com")
                .expect("Failed to set user.email");
        }
        Self { dir, repo }
    }

    /// Write a file relative to the repo root, creating parent directories.
    pub fn write(&self, name: &str, content: &str) {
        let full = self.dir.path().join(name);
        if let Some(parent) = full.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create parent dirs");
        }
        std::fs::write(full, content).expect("Failed to write test file");
    }

    /// Write and stage a file.
    pub fn stage(&self, name: &str, content: &str) {
        self.write(name, content);
        let mut index = self.repo.index().expect("Failed to get index");
        index.add_path(Path::new(name)).expect("Failed to add file");
        index.write().expect("Failed to write index");
    }

    /// Commit whatever is in the index. Returns the commit OID.
    pub fn commit_index(&self, message: &str) -> Oid {
        let sig =
            Signature::now("Test User", "test@example.com").expect("Failed to create signature");
        let mut index = self.repo.index().expect("Failed to get index");
        let tree_id = index.write_tree().expect("Failed to write tree");
        let tree = self.repo.find_tree(tree_id).expect("Failed to find tree");
        let parent = self.repo.head().ok().and_then(|h| h.peel_to_commit().ok());
        let parents: Vec<_> = parent.iter().collect();
        self.repo
            .commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)
            .expect("Failed to create commit")
    }

    /// Message of the commit HEAD points at.
    pub fn head_message(&self) -> String {
        self.repo
            .head()
            .expect("No HEAD")
            .peel_to_commit()
            .expect("HEAD is not a commit")
            .message()
            .unwrap_or_default()
            .to_string()
    }
}

type Responder = dyn Fn(&CompletionRequest) -> Result<Vec<String>, CompletionError> + Send + Sync;

/// A [`CompletionService`] that answers from a closure and records every call.
pub struct ScriptedService {
    multi_choice: bool,
    respond: Box<Responder>,
    calls: Arc<Mutex<Vec<CompletionRequest>>>,
}

impl ScriptedService {
    pub fn new<F>(respond: F) -> Self
    where
        F: Fn(&CompletionRequest) -> Result<Vec<String>, CompletionError> + Send + Sync + 'static,
    {
        Self {
            multi_choice: true,
            respond: Box::new(respond),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Always answer with the same text.
    pub fn constant(text: &str) -> Self {
        let text = text.to_string();
        Self::new(move |_| Ok(vec![text.clone()]))
    }

    pub fn single_choice(mut self) -> Self {
        self.multi_choice = false;
        self
    }

    /// Handle to the recorded calls, usable after the service is moved into an `Arc`.
    pub fn calls(&self) -> Arc<Mutex<Vec<CompletionRequest>>> {
        Arc::clone(&self.calls)
    }
}

#[async_trait]
impl CompletionService for ScriptedService {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn supports_multiple_choices(&self) -> bool {
        self.multi_choice
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<Vec<String>, CompletionError> {
        self.calls.lock().expect("calls lock").push(request.clone());
        (self.respond)(request)
    }
}
