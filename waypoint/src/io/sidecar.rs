//! Checkpoint sidecar persistence (`<working dir>/.checkpoint.json`).

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::debug;

use crate::core::checkpoint::{Checkpoint, DecodeError};

/// What was found at a sidecar path.
#[derive(Debug)]
pub enum SidecarRead {
    Missing,
    Parsed(Checkpoint),
    /// The file exists but does not decode to a checkpoint.
    Corrupted(DecodeError),
}

/// Read and decode the sidecar at `path`.
///
/// Undecodable content is returned as [`SidecarRead::Corrupted`] rather than
/// an error; only filesystem failures are errors.
pub fn read_sidecar(path: &Path) -> Result<SidecarRead> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            debug!(path = %path.display(), "no checkpoint sidecar");
            return Ok(SidecarRead::Missing);
        }
        Err(err) => return Err(err).with_context(|| format!("read {}", path.display())),
    };

    match Checkpoint::from_slice(&bytes) {
        Ok(checkpoint) => {
            debug!(path = %path.display(), item_id = checkpoint.item_id(), phase = %checkpoint.phase(), "read checkpoint sidecar");
            Ok(SidecarRead::Parsed(checkpoint))
        }
        Err(err) => Ok(SidecarRead::Corrupted(err)),
    }
}

/// Strictly decode the sidecar at `path`, failing on missing or invalid
/// content.
pub fn decode_sidecar(path: &Path) -> Result<Checkpoint> {
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    Checkpoint::from_json(&contents).with_context(|| format!("decode {}", path.display()))
}

/// Atomically write the sidecar (temp file + rename), creating parent
/// directories as needed.
pub fn write_sidecar(path: &Path, checkpoint: &Checkpoint) -> Result<()> {
    debug!(path = %path.display(), item_id = checkpoint.item_id(), phase = %checkpoint.phase(), "writing checkpoint sidecar");
    let mut buf = serde_json::to_string_pretty(checkpoint).context("serialize checkpoint")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

/// Remove the sidecar. Returns whether a file was removed.
pub fn remove_sidecar(path: &Path) -> Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => {
            debug!(path = %path.display(), "removed checkpoint sidecar");
            Ok(true)
        }
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
        Err(err) => Err(err).with_context(|| format!("remove {}", path.display())),
    }
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("checkpoint path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp checkpoint {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace checkpoint {}", path.display()))?;
    Ok(())
}
