//! In-memory checkpoint record for one work item.
//!
//! The on-disk form is a flat JSON object (see [`Checkpoint::to_value`]).
//! Errors are kept as `(timestamp, message)` pairs and only rendered as
//! `"[<timestamp>] <message>"` strings at the serialization boundary.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use thiserror::Error;

use crate::core::phase::{Phase, UnknownPhase};

/// Failure to turn a serialized record back into a [`Checkpoint`].
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed checkpoint record: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("checkpoint record is missing required field '{0}'")]
    MissingField(&'static str),
    #[error(transparent)]
    UnknownPhase(#[from] UnknownPhase),
    #[error("checkpoint item_id must not be empty")]
    EmptyItemId,
    #[error("checkpoint attempt must be a positive integer (got {0})")]
    InvalidAttempt(u32),
    #[error("invalid {field} timestamp '{value}': {source}")]
    InvalidTimestamp {
        field: &'static str,
        value: String,
        #[source]
        source: chrono::ParseError,
    },
}

/// One entry of a checkpoint's error log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorEntry {
    /// Timestamp text exactly as recorded. `None` for entries read from disk
    /// without a recognizable `[timestamp]` prefix.
    recorded_at: Option<String>,
    message: String,
}

impl ErrorEntry {
    fn now(message: String) -> Self {
        Self {
            recorded_at: Some(format_timestamp(now())),
            message,
        }
    }

    /// Split a serialized `"[<rfc3339>] <message>"` line.
    pub fn parse(line: &str) -> Self {
        if let Some((stamp, message)) = line
            .strip_prefix('[')
            .and_then(|rest| rest.split_once("] "))
        {
            if DateTime::parse_from_rfc3339(stamp).is_ok() {
                return Self {
                    recorded_at: Some(stamp.to_string()),
                    message: message.to_string(),
                };
            }
        }
        Self {
            recorded_at: None,
            message: line.to_string(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn recorded_at(&self) -> Option<DateTime<Utc>> {
        let stamp = self.recorded_at.as_deref()?;
        DateTime::parse_from_rfc3339(stamp)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }
}

impl fmt::Display for ErrorEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.recorded_at {
            Some(stamp) => write!(f, "[{stamp}] {}", self.message),
            None => f.write_str(&self.message),
        }
    }
}

/// Progress record for a single work item.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "RawRecord")]
pub struct Checkpoint {
    item_id: String,
    phase: Phase,
    attempt: u32,
    started_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    elapsed_ms: u64,
    artifacts: BTreeMap<String, Vec<String>>,
    errors: Vec<ErrorEntry>,
    metadata: BTreeMap<String, Value>,
}

impl Checkpoint {
    /// New record at `phase` with attempt 1, no history, and both timestamps
    /// set to now.
    pub fn new(item_id: impl Into<String>, phase: Phase) -> Self {
        let now = now();
        Self {
            item_id: item_id.into(),
            phase,
            attempt: 1,
            started_at: now,
            updated_at: now,
            elapsed_ms: 0,
            artifacts: BTreeMap::new(),
            errors: Vec::new(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_attempt(mut self, attempt: u32) -> Self {
        self.attempt = attempt.max(1);
        self.touch();
        self
    }

    pub fn with_elapsed_ms(mut self, elapsed_ms: u64) -> Self {
        self.elapsed_ms = elapsed_ms;
        self.touch();
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self.touch();
        self
    }

    pub fn item_id(&self) -> &str {
        &self.item_id
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed_ms
    }

    pub fn artifacts(&self) -> &BTreeMap<String, Vec<String>> {
        &self.artifacts
    }

    /// Recorded artifacts for one phase name, empty if none.
    pub fn artifacts_for(&self, phase_name: &str) -> &[String] {
        self.artifacts
            .get(phase_name)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn errors(&self) -> &[ErrorEntry] {
        &self.errors
    }

    pub fn metadata(&self) -> &BTreeMap<String, Value> {
        &self.metadata
    }

    /// Phases already behind this record.
    pub fn completed_phases(&self) -> &'static [Phase] {
        self.phase.predecessors()
    }

    /// Move to the next phase. Returns false (and leaves the record untouched)
    /// when already terminal.
    pub fn advance_phase(&mut self) -> bool {
        let Some(next) = self.phase.next() else {
            return false;
        };
        self.phase = next;
        self.touch();
        true
    }

    /// Adopt a derived phase if it is ahead of the current one.
    pub fn adopt_phase(&mut self, phase: Phase) -> bool {
        if phase <= self.phase {
            return false;
        }
        self.phase = phase;
        self.touch();
        true
    }

    /// Record `path` under `phase_name`. Returns false if it was already there.
    pub fn add_artifact(&mut self, phase_name: &str, path: impl Into<String>) -> bool {
        let path = path.into();
        let paths = self.artifacts.entry(phase_name.to_string()).or_default();
        if paths.contains(&path) {
            return false;
        }
        paths.push(path);
        self.touch();
        true
    }

    pub fn add_error(&mut self, message: impl Into<String>) {
        self.errors.push(ErrorEntry::now(message.into()));
        self.touch();
    }

    /// Count a restart of this item's processing. Returns the new attempt.
    pub fn begin_attempt(&mut self) -> u32 {
        self.attempt = self.attempt.saturating_add(1);
        self.touch();
        self.attempt
    }

    pub fn add_elapsed(&mut self, elapsed: Duration) {
        let ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        self.elapsed_ms = self.elapsed_ms.saturating_add(ms);
        self.touch();
    }

    /// Insert or replace a metadata value, returning the previous one.
    pub fn set_metadata(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        let previous = self.metadata.insert(key.into(), value);
        self.touch();
        previous
    }

    pub fn to_value(&self) -> serde_json::Result<Value> {
        serde_json::to_value(self)
    }

    pub fn from_value(value: Value) -> Result<Self, DecodeError> {
        let raw: RawRecord = serde_json::from_value(value)?;
        Self::try_from(raw)
    }

    pub fn from_json(contents: &str) -> Result<Self, DecodeError> {
        let raw: RawRecord = serde_json::from_str(contents)?;
        Self::try_from(raw)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, DecodeError> {
        let raw: RawRecord = serde_json::from_slice(bytes)?;
        Self::try_from(raw)
    }

    // `updated_at` never moves backward, even if the wall clock does.
    fn touch(&mut self) {
        let now = now();
        if now > self.updated_at {
            self.updated_at = now;
        }
    }
}

impl Serialize for Checkpoint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        RecordOut {
            item_id: &self.item_id,
            phase: self.phase,
            attempt: self.attempt,
            started_at: format_timestamp(self.started_at),
            updated_at: format_timestamp(self.updated_at),
            elapsed_ms: self.elapsed_ms,
            artifacts: &self.artifacts,
            errors: self.errors.iter().map(ToString::to_string).collect(),
            metadata: &self.metadata,
        }
        .serialize(serializer)
    }
}

#[derive(Serialize)]
struct RecordOut<'a> {
    item_id: &'a str,
    phase: Phase,
    attempt: u32,
    started_at: String,
    updated_at: String,
    elapsed_ms: u64,
    artifacts: &'a BTreeMap<String, Vec<String>>,
    errors: Vec<String>,
    metadata: &'a BTreeMap<String, Value>,
}

/// Lenient wire form. Field presence and phase validity are checked in the
/// `TryFrom` conversion so they surface as typed [`DecodeError`]s. Unknown
/// fields are ignored.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawRecord {
    item_id: Option<String>,
    phase: Option<String>,
    attempt: Option<u32>,
    started_at: Option<String>,
    updated_at: Option<String>,
    elapsed_ms: u64,
    artifacts: BTreeMap<String, Vec<String>>,
    errors: Vec<String>,
    metadata: BTreeMap<String, Value>,
}

impl TryFrom<RawRecord> for Checkpoint {
    type Error = DecodeError;

    fn try_from(raw: RawRecord) -> Result<Self, Self::Error> {
        let item_id = raw.item_id.ok_or(DecodeError::MissingField("item_id"))?;
        if item_id.trim().is_empty() {
            return Err(DecodeError::EmptyItemId);
        }
        let phase: Phase = raw.phase.ok_or(DecodeError::MissingField("phase"))?.parse()?;
        let attempt = raw.attempt.unwrap_or(1);
        if attempt == 0 {
            return Err(DecodeError::InvalidAttempt(attempt));
        }

        let now = now();
        let started_at = parse_timestamp("started_at", raw.started_at)?.unwrap_or(now);
        let updated_at = parse_timestamp("updated_at", raw.updated_at)?.unwrap_or(now);

        Ok(Self {
            item_id,
            phase,
            attempt,
            started_at,
            updated_at,
            elapsed_ms: raw.elapsed_ms,
            artifacts: raw.artifacts,
            errors: raw.errors.iter().map(String::as_str).map(ErrorEntry::parse).collect(),
            metadata: raw.metadata,
        })
    }
}

// Serialized timestamps carry microseconds; keeping the in-memory value at the
// same precision makes a save/load cycle lossless.
fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, false)
}

fn parse_timestamp(
    field: &'static str,
    value: Option<String>,
) -> Result<Option<DateTime<Utc>>, DecodeError> {
    let Some(value) = value else {
        return Ok(None);
    };
    match DateTime::parse_from_rfc3339(&value) {
        Ok(parsed) => Ok(Some(parsed.with_timezone(&Utc))),
        Err(source) => Err(DecodeError::InvalidTimestamp {
            field,
            value,
            source,
        }),
    }
}
