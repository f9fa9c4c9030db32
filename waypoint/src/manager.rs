//! Checkpoint lifecycle against a tree of per-item working directories.
//!
//! The working directory is the source of truth; the sidecar is a cache over
//! it. Every load re-scans the directory and lifts the record forward to the
//! phase its artifacts support. Loads never write.

use std::cmp::Reverse;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use tracing::{debug, info, warn};

use crate::core::checkpoint::Checkpoint;
use crate::core::outcome::ItemStatus;
use crate::core::phase::{Phase, resume_instructions};
use crate::io::artifacts::{self, ArtifactLayout};
use crate::io::config::WaypointConfig;
use crate::io::sidecar::{self, SidecarRead};

/// How [`CheckpointManager::load_with_outcome`] arrived at its record.
#[derive(Debug)]
pub enum LoadOutcome {
    /// No sidecar existed; the record was created and reconciled.
    Fresh(Checkpoint),
    /// The sidecar decoded and was reconciled.
    Loaded(Checkpoint),
    /// The sidecar existed but was unusable and was replaced by a fresh record.
    Recovered {
        checkpoint: Checkpoint,
        reason: String,
    },
}

impl LoadOutcome {
    pub fn checkpoint(&self) -> &Checkpoint {
        match self {
            LoadOutcome::Fresh(checkpoint)
            | LoadOutcome::Loaded(checkpoint)
            | LoadOutcome::Recovered { checkpoint, .. } => checkpoint,
        }
    }

    pub fn into_checkpoint(self) -> Checkpoint {
        match self {
            LoadOutcome::Fresh(checkpoint)
            | LoadOutcome::Loaded(checkpoint)
            | LoadOutcome::Recovered { checkpoint, .. } => checkpoint,
        }
    }

    pub fn is_recovered(&self) -> bool {
        matches!(self, LoadOutcome::Recovered { .. })
    }
}

/// A resumable item found under the runs directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingItem {
    pub item_id: String,
    pub phase: Phase,
    pub working_dir: PathBuf,
}

#[derive(Debug, Clone)]
pub struct CheckpointManager {
    runs_dir: PathBuf,
    layout: ArtifactLayout,
}

impl CheckpointManager {
    pub fn new(runs_dir: impl Into<PathBuf>) -> Self {
        Self::with_layout(runs_dir, ArtifactLayout::default())
    }

    pub fn with_layout(runs_dir: impl Into<PathBuf>, layout: ArtifactLayout) -> Self {
        Self {
            runs_dir: runs_dir.into(),
            layout,
        }
    }

    pub fn from_config(cfg: &WaypointConfig) -> Self {
        Self::with_layout(cfg.runs_dir.clone(), cfg.layout.clone())
    }

    pub fn runs_dir(&self) -> &Path {
        &self.runs_dir
    }

    pub fn layout(&self) -> &ArtifactLayout {
        &self.layout
    }

    /// Conventional working directory for `item_id`.
    pub fn run_dir(&self, item_id: &str) -> PathBuf {
        self.runs_dir.join(item_id)
    }

    pub fn get_checkpoint_path(&self, working_dir: &Path) -> PathBuf {
        working_dir.join(&self.layout.checkpoint_file)
    }

    /// Load the record for `item_id`, reconciled against `working_dir`.
    ///
    /// A missing, undecodable or foreign sidecar never fails the load; the
    /// variant says which case applied. Filesystem errors other than "not
    /// found" are returned as errors.
    pub fn load_with_outcome(&self, working_dir: &Path, item_id: &str) -> Result<LoadOutcome> {
        require_item_id(item_id)?;
        let path = self.get_checkpoint_path(working_dir);

        let mut outcome = match sidecar::read_sidecar(&path)? {
            SidecarRead::Missing => LoadOutcome::Fresh(Checkpoint::new(item_id, Phase::Init)),
            SidecarRead::Parsed(checkpoint) if checkpoint.item_id() == item_id => {
                LoadOutcome::Loaded(checkpoint)
            }
            SidecarRead::Parsed(checkpoint) => {
                let reason = format!("sidecar belongs to item '{}'", checkpoint.item_id());
                warn!(path = %path.display(), item_id, %reason, "ignoring foreign checkpoint; starting fresh");
                LoadOutcome::Recovered {
                    checkpoint: Checkpoint::new(item_id, Phase::Init),
                    reason,
                }
            }
            SidecarRead::Corrupted(err) => {
                let reason = err.to_string();
                warn!(path = %path.display(), item_id, %reason, "corrupted checkpoint; starting fresh");
                LoadOutcome::Recovered {
                    checkpoint: Checkpoint::new(item_id, Phase::Init),
                    reason,
                }
            }
        };

        match &mut outcome {
            LoadOutcome::Fresh(checkpoint)
            | LoadOutcome::Loaded(checkpoint)
            | LoadOutcome::Recovered { checkpoint, .. } => self.reconcile(working_dir, checkpoint)?,
        }
        Ok(outcome)
    }

    pub fn load(&self, working_dir: &Path, item_id: &str) -> Result<Checkpoint> {
        Ok(self.load_with_outcome(working_dir, item_id)?.into_checkpoint())
    }

    /// Persist `checkpoint`, creating `working_dir` if needed. Last writer wins.
    pub fn save(&self, working_dir: &Path, checkpoint: &Checkpoint) -> Result<()> {
        sidecar::write_sidecar(&self.get_checkpoint_path(working_dir), checkpoint)
    }

    /// Remove the sidecar. Returns whether one existed.
    pub fn delete(&self, working_dir: &Path) -> Result<bool> {
        sidecar::remove_sidecar(&self.get_checkpoint_path(working_dir))
    }

    /// True iff the reconciled record sits strictly between `Init` and
    /// `Complete`.
    pub fn can_resume(&self, working_dir: &Path, item_id: &str) -> Result<bool> {
        Ok(self.load(working_dir, item_id)?.phase().is_resumable())
    }

    pub fn get_resume_instructions(&self, checkpoint: &Checkpoint) -> &'static str {
        resume_instructions(checkpoint.phase())
    }

    /// Append artifacts found in `working_dir` that `checkpoint` lacks.
    pub fn scan_artifacts(&self, working_dir: &Path, checkpoint: &mut Checkpoint) -> Result<usize> {
        artifacts::scan_artifacts(working_dir, &self.layout, checkpoint)
    }

    /// Decide the final status of a processing run for `item_id`.
    ///
    /// A validated run is `Completed` without consulting the checkpoint, and
    /// its sidecar is deleted. Otherwise the checkpoint decides between
    /// `Paused` and `Failed` and the sidecar is left for the next run.
    pub fn settle_item(&self, working_dir: &Path, item_id: &str, validated: bool) -> Result<ItemStatus> {
        require_item_id(item_id)?;
        let status = if validated {
            ItemStatus::Completed
        } else {
            ItemStatus::settle(false, self.can_resume(working_dir, item_id)?)
        };
        if status.is_terminal() {
            self.delete(working_dir)?;
        }
        info!(item_id, %status, "settled item");
        Ok(status)
    }

    /// Resumable items under the runs directory, most advanced first, then by
    /// id. Each subdirectory name is taken as an item id.
    pub fn resumable_items(&self) -> Result<Vec<PendingItem>> {
        let entries = match fs::read_dir(&self.runs_dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => {
                return Err(err).with_context(|| format!("read directory {}", self.runs_dir.display()));
            }
        };

        let mut pending = Vec::new();
        for entry in entries {
            let entry = entry.with_context(|| format!("read directory {}", self.runs_dir.display()))?;
            let file_type = entry
                .file_type()
                .with_context(|| format!("stat {}", entry.path().display()))?;
            if !file_type.is_dir() {
                continue;
            }
            let Ok(item_id) = entry.file_name().into_string() else {
                continue;
            };
            if item_id.starts_with('.') || item_id.trim().is_empty() {
                continue;
            }
            let working_dir = entry.path();
            let phase = self.load(&working_dir, &item_id)?.phase();
            if phase.is_resumable() {
                pending.push(PendingItem {
                    item_id,
                    phase,
                    working_dir,
                });
            }
        }

        pending.sort_by(|a, b| (Reverse(a.phase), &a.item_id).cmp(&(Reverse(b.phase), &b.item_id)));
        debug!(runs_dir = %self.runs_dir.display(), count = pending.len(), "prioritizing resumable items");
        Ok(pending)
    }

    fn reconcile(&self, working_dir: &Path, checkpoint: &mut Checkpoint) -> Result<()> {
        self.scan_artifacts(working_dir, checkpoint)?;
        let derived = artifacts::from_artifacts(working_dir, &self.layout)?;
        let before = checkpoint.phase();
        if checkpoint.adopt_phase(derived) {
            debug!(item_id = checkpoint.item_id(), from = %before, to = %derived, "adopted phase from artifacts");
        }
        Ok(())
    }
}

fn require_item_id(item_id: &str) -> Result<()> {
    if item_id.trim().is_empty() {
        bail!("item_id must be non-empty");
    }
    Ok(())
}
