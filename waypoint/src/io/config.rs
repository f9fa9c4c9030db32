//! Waypoint configuration stored in `waypoint.toml`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::io::artifacts::ArtifactLayout;

/// Default config file name, resolved against the current directory.
pub const CONFIG_FILE: &str = "waypoint.toml";

/// Waypoint configuration (TOML).
///
/// Intended to be edited by humans. Missing fields fall back to the working
/// directory conventions in [`ArtifactLayout::default`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct WaypointConfig {
    /// Parent of all per-item working directories (`<runs_dir>/<item_id>`).
    pub runs_dir: PathBuf,

    pub layout: ArtifactLayout,
}

impl Default for WaypointConfig {
    fn default() -> Self {
        Self {
            runs_dir: PathBuf::from("runs"),
            layout: ArtifactLayout::default(),
        }
    }
}

impl WaypointConfig {
    pub fn validate(&self) -> Result<()> {
        if self.runs_dir.as_os_str().is_empty() {
            return Err(anyhow!("runs_dir must be non-empty"));
        }
        self.layout.validate()
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `WaypointConfig::default()`.
pub fn load_config(path: &Path) -> Result<WaypointConfig> {
    if !path.exists() {
        let cfg = WaypointConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: WaypointConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("invalid config {}", path.display()))?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &WaypointConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    // A bare file name has an empty parent; that means the current directory.
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}
