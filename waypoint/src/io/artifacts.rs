//! Evidence gathering over an item's working directory.
//!
//! Absence is never an error: a missing working directory or evidence
//! subdirectory reads as "no evidence". Any other filesystem failure
//! propagates.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::sync::LazyLock;

use anyhow::{Context, Result, anyhow};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::checkpoint::Checkpoint;
use crate::core::phase::{Evidence, Phase};

static TEST_FILE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(test_.+|.+_test|.+\.test)\.(py|js|jsx|mjs|cjs|ts|tsx|rs|go|rb|java|kt|swift|php|cs|ex|exs)$",
    )
    .expect("test file pattern")
});

/// Artifact key for notes found under the research directory.
pub const RESEARCH_KEY: &str = "research";
/// Artifact key for files found under the tests directory.
pub const TESTS_KEY: &str = "tests";
/// Artifact key for result files; they are produced by the execution phase.
pub const EXECUTION_KEY: &str = "execution";

/// Names of the evidence locations inside a working directory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ArtifactLayout {
    pub research_dir: String,
    pub tests_dir: String,
    pub results_dir: String,
    /// Final report, relative to the working directory.
    pub report_file: String,
    /// Reports smaller than this do not count as complete.
    pub min_report_bytes: u64,
    /// Hidden sidecar holding the serialized checkpoint.
    pub checkpoint_file: String,
}

impl Default for ArtifactLayout {
    fn default() -> Self {
        Self {
            research_dir: "research".to_string(),
            tests_dir: "tests".to_string(),
            results_dir: "results".to_string(),
            report_file: "FINAL_REPORT.md".to_string(),
            min_report_bytes: 100,
            checkpoint_file: ".checkpoint.json".to_string(),
        }
    }
}

impl ArtifactLayout {
    pub fn validate(&self) -> Result<()> {
        for (key, value) in [
            ("layout.research_dir", &self.research_dir),
            ("layout.tests_dir", &self.tests_dir),
            ("layout.results_dir", &self.results_dir),
            ("layout.report_file", &self.report_file),
            ("layout.checkpoint_file", &self.checkpoint_file),
        ] {
            if value.trim().is_empty() {
                return Err(anyhow!("{key} must be non-empty"));
            }
            if value.contains(['/', '\\']) || value == "." || value == ".." {
                return Err(anyhow!("{key} must be a plain name (got '{value}')"));
            }
        }
        if self.min_report_bytes == 0 {
            return Err(anyhow!("layout.min_report_bytes must be > 0"));
        }
        Ok(())
    }
}

pub fn is_research_note(name: &str) -> bool {
    name.ends_with(".md")
}

pub fn is_test_file(name: &str) -> bool {
    TEST_FILE_RE.is_match(name)
}

pub fn is_result_file(name: &str) -> bool {
    name.ends_with("results.json")
}

/// Most advanced phase supported by the evidence in `dir`.
pub fn from_artifacts(dir: &Path, layout: &ArtifactLayout) -> Result<Phase> {
    let evidence = gather_evidence(dir, layout)?;
    let phase = Phase::from_evidence(&evidence);
    debug!(dir = %dir.display(), ?evidence, %phase, "derived phase from artifacts");
    Ok(phase)
}

/// Whether `phase`'s own completion evidence is present, ignoring all other
/// phases.
pub fn detect_phase_completion(dir: &Path, phase: Phase, layout: &ArtifactLayout) -> Result<bool> {
    match phase {
        Phase::Init | Phase::Complete => Ok(false),
        Phase::Research => has_matching_file(&dir.join(&layout.research_dir), is_research_note),
        Phase::Tests => has_matching_file(&dir.join(&layout.tests_dir), is_test_file),
        Phase::Execution => has_matching_file(&dir.join(&layout.results_dir), is_result_file),
        Phase::Report => report_ready(dir, layout),
    }
}

pub fn gather_evidence(dir: &Path, layout: &ArtifactLayout) -> Result<Evidence> {
    Ok(Evidence {
        research: has_matching_file(&dir.join(&layout.research_dir), is_research_note)?,
        tests: has_matching_file(&dir.join(&layout.tests_dir), is_test_file)?,
        results: has_matching_file(&dir.join(&layout.results_dir), is_result_file)?,
        report: report_ready(dir, layout)?,
    })
}

/// Record every evidence file in `dir` that `checkpoint` does not already
/// list. Never removes entries. Returns how many were added.
pub fn scan_artifacts(dir: &Path, layout: &ArtifactLayout, checkpoint: &mut Checkpoint) -> Result<usize> {
    let sources: [(&str, &str, fn(&str) -> bool); 3] = [
        (RESEARCH_KEY, layout.research_dir.as_str(), is_research_note),
        (TESTS_KEY, layout.tests_dir.as_str(), is_test_file),
        (EXECUTION_KEY, layout.results_dir.as_str(), is_result_file),
    ];

    let mut added = 0;
    for (key, subdir, matches) in sources {
        for name in file_names(&dir.join(subdir))? {
            if matches(&name) && checkpoint.add_artifact(key, format!("{subdir}/{name}")) {
                added += 1;
            }
        }
    }
    debug!(dir = %dir.display(), item_id = checkpoint.item_id(), added, "scanned artifacts");
    Ok(added)
}

fn report_ready(dir: &Path, layout: &ArtifactLayout) -> Result<bool> {
    let path = dir.join(&layout.report_file);
    match fs::metadata(&path) {
        Ok(meta) => Ok(meta.is_file() && meta.len() >= layout.min_report_bytes),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
        Err(err) => Err(err).with_context(|| format!("stat {}", path.display())),
    }
}

fn has_matching_file(dir: &Path, matches: fn(&str) -> bool) -> Result<bool> {
    Ok(file_names(dir)?.iter().any(|name| matches(name)))
}

/// Names of the regular files directly inside `dir`, sorted. Empty if `dir`
/// does not exist.
fn file_names(dir: &Path) -> Result<Vec<String>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(err).with_context(|| format!("read directory {}", dir.display())),
    };

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.with_context(|| format!("read directory {}", dir.display()))?;
        let path = entry.path();
        // Follows symlinks; a dangling link is no evidence.
        let is_file = match fs::metadata(&path) {
            Ok(meta) => meta.is_file(),
            Err(err) if err.kind() == ErrorKind::NotFound => false,
            Err(err) => return Err(err).with_context(|| format!("stat {}", path.display())),
        };
        if !is_file {
            continue;
        }
        // Non-UTF-8 names cannot match any evidence pattern.
        if let Ok(name) = entry.file_name().into_string() {
            names.push(name);
        }
    }
    names.sort();
    Ok(names)
}
