//! Test-only helpers for seeding item working directories.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::io::artifacts::ArtifactLayout;
use crate::manager::CheckpointManager;

/// One item's working directory inside a fixture's runs directory.
#[derive(Debug, Clone)]
pub struct ItemDir {
    path: PathBuf,
    layout: ArtifactLayout,
}

impl ItemDir {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write a markdown note under the research directory.
    pub fn research(&self, name: &str) -> PathBuf {
        self.write(&self.layout.research_dir, name, "# Research notes\n")
    }

    pub fn test_file(&self, name: &str) -> PathBuf {
        self.write(&self.layout.tests_dir, name, "def test_ok():\n    assert True\n")
    }

    pub fn result(&self, name: &str) -> PathBuf {
        self.write(&self.layout.results_dir, name, "{\"passed\": 1, \"failed\": 0}\n")
    }

    /// Write a final report of exactly `bytes` bytes.
    pub fn report(&self, bytes: usize) -> PathBuf {
        let path = self.path.join(&self.layout.report_file);
        fs::write(&path, "r".repeat(bytes)).expect("write report");
        path
    }

    /// Write arbitrary sidecar content, bypassing serialization.
    pub fn raw_sidecar(&self, contents: &str) -> PathBuf {
        let path = self.sidecar_path();
        fs::write(&path, contents).expect("write sidecar");
        path
    }

    pub fn sidecar_path(&self) -> PathBuf {
        self.path.join(&self.layout.checkpoint_file)
    }

    fn write(&self, subdir: &str, name: &str, contents: &str) -> PathBuf {
        let dir = self.path.join(subdir);
        fs::create_dir_all(&dir).expect("create evidence dir");
        let path = dir.join(name);
        fs::write(&path, contents).expect("write evidence file");
        path
    }
}

/// A temporary runs directory holding one item's (initially empty) working
/// directory.
pub struct WorkDirFixture {
    temp: TempDir,
    item_id: String,
    item: ItemDir,
}

impl WorkDirFixture {
    pub fn new(item_id: &str) -> Self {
        let temp = tempfile::tempdir().expect("tempdir");
        let layout = ArtifactLayout::default();
        let item = make_item_dir(&temp.path().join("runs"), item_id, &layout);
        Self {
            temp,
            item_id: item_id.to_string(),
            item,
        }
    }

    pub fn root(&self) -> &Path {
        self.temp.path()
    }

    pub fn runs_dir(&self) -> PathBuf {
        self.temp.path().join("runs")
    }

    pub fn item_id(&self) -> &str {
        &self.item_id
    }

    pub fn work_dir(&self) -> &Path {
        self.item.path()
    }

    pub fn manager(&self) -> CheckpointManager {
        CheckpointManager::with_layout(self.runs_dir(), self.item.layout.clone())
    }

    /// Another item's working directory under the same runs directory.
    pub fn sibling(&self, item_id: &str) -> ItemDir {
        make_item_dir(&self.runs_dir(), item_id, &self.item.layout)
    }

    pub fn research(&self, name: &str) -> PathBuf {
        self.item.research(name)
    }

    pub fn test_file(&self, name: &str) -> PathBuf {
        self.item.test_file(name)
    }

    pub fn result(&self, name: &str) -> PathBuf {
        self.item.result(name)
    }

    pub fn report(&self, bytes: usize) -> PathBuf {
        self.item.report(bytes)
    }

    pub fn raw_sidecar(&self, contents: &str) -> PathBuf {
        self.item.raw_sidecar(contents)
    }

    pub fn sidecar_path(&self) -> PathBuf {
        self.item.sidecar_path()
    }
}

fn make_item_dir(runs_dir: &Path, item_id: &str, layout: &ArtifactLayout) -> ItemDir {
    let path = runs_dir.join(item_id);
    fs::create_dir_all(&path).expect("create work dir");
    ItemDir {
        path,
        layout: layout.clone(),
    }
}
