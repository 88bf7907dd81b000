//! TestTree builder for watched directory fixtures

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::time::Duration;

use prov_index::{CoordinatorState, IndexCoordinator, IndexReader, IndexerConfig, StatusHandle};
use tempfile::TempDir;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Document used in acceptance testing
pub const ACCEPTANCE_DOC: &str = r#"{
  "entity": {
    "self": {
      "creative:encodingFormat": "text/plain",
      "prov:label": "testfile1.txt",
      "prov:type": "File",
      "provtool:datahash": "66a045b452102c59d840ec097d59d9467e13a3f34f6494e539ffd32c1bb35f18"
    }
  },
  "agent": {
    "7a6196ebb0a1ea5c28573de1c351b2b00940e732dd17893f2702d1c2d53510a9": {
      "person:familyName": "Dressel",
      "person:givenName": "Frank",
      "prov:label": "Frank Dressel",
      "prov:type": "prov:Person"
    }
  },
  "activity": {
    "a8f8b9077198f9d5fe45ccd63193c0341b5b5b7b7fad179a3d0715f5be646d67": {
      "prov:endTime": "2021-07-23T14:43:00+00:00",
      "prov:label": "Creation of test file",
      "prov:location": "sp-000093u",
      "prov:startTime": "2021-07-23T14:43:00+00:00",
      "provtool:means": "-"
    }
  }
}"#;

/// A minimal document whose entity carries `label`
pub fn provenance_doc(label: &str) -> String {
    format!(
        r#"{{
  "entity": {{ "self": {{ "prov:label": "{label}", "prov:type": "File", "provtool:datahash": "hash-{label}" }} }},
  "agent": {{ "agent-id": {{ "person:familyName": "Doe", "person:givenName": "Jane", "prov:label": "Jane Doe", "prov:type": "prov:Person" }} }},
  "activity": {{ "activity-id": {{ "prov:startTime": "2021-07-23T14:43:00+00:00", "prov:endTime": "2021-07-23T14:44:00+00:00", "prov:label": "Creation of {label}", "prov:location": "lab", "provtool:means": "-" }} }}
}}"#
    )
}

/// Builder for temporary watched trees
pub struct TestTree {
    dir: TempDir,
    root: PathBuf,
}

impl TestTree {
    /// Create a new empty tree
    pub fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        // Notification backends report canonical paths
        let root = dir
            .path()
            .canonicalize()
            .expect("Failed to canonicalize temp dir");
        Self { dir, root }
    }

    /// Get the path to the tree root
    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Absolute path of a file in the tree
    pub fn join(&self, relative_path: &str) -> PathBuf {
        self.root.join(relative_path)
    }

    /// Add a file with the given content
    pub fn add_file(&self, relative_path: &str, content: &str) -> &Self {
        let full_path = self.root.join(relative_path);
        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent dirs");
        }
        fs::write(&full_path, content).expect("Failed to write file");
        self
    }

    /// Add a provenance document for an entity labelled `label`
    pub fn add_doc(&self, relative_path: &str, label: &str) -> &Self {
        self.add_file(relative_path, &provenance_doc(label))
    }

    /// Configuration watching this tree with a short coalescing window
    pub fn config(&self) -> IndexerConfig {
        let mut config = IndexerConfig::for_root(&self.root);
        config.debounce_ms = 20;
        config
    }

    /// Start a coordinator on this tree and wait until it is watching
    pub async fn start_indexer(&self) -> RunningIndexer {
        let coordinator =
            IndexCoordinator::from_config(&self.config()).expect("Failed to build coordinator");
        let reader = coordinator.reader();
        let mut status = coordinator.status();
        let shutdown = CancellationToken::new();
        let task = coordinator.spawn(shutdown.clone());

        let reached = status
            .wait_for(|s| s.state == CoordinatorState::Watching)
            .await;
        assert!(reached.is_some(), "Coordinator never reached Watching");

        RunningIndexer {
            reader,
            status,
            shutdown,
            task,
        }
    }

    /// Run the prov-index binary with this tree as root
    pub fn run_cli(&self, args: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_prov-index"))
            .env_remove("PROV_INDEX_CONFIG")
            .env("PROV_INDEX_ROOT", &self.root)
            .args(args)
            .output()
            .expect("Failed to run CLI")
    }

    /// Run CLI and expect success, return stdout
    pub fn run_cli_success(&self, args: &[&str]) -> String {
        let output = self.run_cli(args);
        assert!(
            output.status.success(),
            "CLI command {:?} failed: {}",
            args,
            String::from_utf8_lossy(&output.stderr)
        );
        String::from_utf8_lossy(&output.stdout).to_string()
    }
}

/// A coordinator running on a test tree
pub struct RunningIndexer {
    pub reader: IndexReader,
    pub status: StatusHandle,
    pub shutdown: CancellationToken,
    pub task: JoinHandle<prov_index::Result<()>>,
}

impl RunningIndexer {
    /// Poll the index until `condition` holds, failing after ten seconds
    pub async fn wait_until(&self, mut condition: impl FnMut(&IndexReader) -> bool) {
        let reached = tokio::time::timeout(Duration::from_secs(10), async {
            while !condition(&self.reader) {
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await;
        assert!(
            reached.is_ok(),
            "Index never reached expected state; paths: {:?}",
            self.reader.paths()
        );
    }

    /// Cancel the coordinator and wait for a clean stop
    pub async fn stop(self) {
        self.shutdown.cancel();
        self.task
            .await
            .expect("Index task panicked")
            .expect("Index task failed");
        assert_eq!(self.status.state(), CoordinatorState::Stopped);
    }
}
