//! Phase ordering and evidence-based phase derivation.
//!
//! The phase sequence is fixed. Derivation from [`Evidence`] is a priority
//! walk from the most advanced evidence to the least, so stale artifacts from
//! an earlier phase never mask a later one.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One stage of a work item's progression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Init,
    Research,
    Tests,
    Execution,
    Report,
    Complete,
}

/// Returned when a phase name is not one of the canonical lowercase names.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown phase '{0}' (expected one of: init, research, tests, execution, report, complete)")]
pub struct UnknownPhase(pub String);

impl Phase {
    /// Every phase in progression order.
    pub const ALL: [Phase; 6] = [
        Phase::Init,
        Phase::Research,
        Phase::Tests,
        Phase::Execution,
        Phase::Report,
        Phase::Complete,
    ];

    /// Position of this phase within [`Phase::ALL`].
    pub fn index(self) -> usize {
        match self {
            Phase::Init => 0,
            Phase::Research => 1,
            Phase::Tests => 2,
            Phase::Execution => 3,
            Phase::Report => 4,
            Phase::Complete => 5,
        }
    }

    /// The phase immediately after `self`, or `None` for [`Phase::Complete`].
    pub fn next(self) -> Option<Phase> {
        Self::ALL.get(self.index() + 1).copied()
    }

    pub fn is_terminal(self) -> bool {
        self.next().is_none()
    }

    /// Canonical lowercase name used on disk and on the command line.
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Init => "init",
            Phase::Research => "research",
            Phase::Tests => "tests",
            Phase::Execution => "execution",
            Phase::Report => "report",
            Phase::Complete => "complete",
        }
    }

    /// Phases strictly before `self`.
    pub fn predecessors(self) -> &'static [Phase] {
        &Self::ALL[..self.index()]
    }

    /// Derive the most advanced phase supported by `evidence`.
    ///
    /// Priority: report, then results, then tests, then research. The first
    /// match wins regardless of what earlier-phase evidence is present.
    pub fn from_evidence(evidence: &Evidence) -> Phase {
        if evidence.report {
            Phase::Complete
        } else if evidence.results {
            Phase::Report
        } else if evidence.tests {
            Phase::Execution
        } else if evidence.research {
            Phase::Tests
        } else {
            Phase::Init
        }
    }

    /// True if this phase is strictly between `Init` and `Complete`.
    pub fn is_resumable(self) -> bool {
        self > Phase::Init && self < Phase::Complete
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Phase {
    type Err = UnknownPhase;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|phase| phase.as_str() == s)
            .ok_or_else(|| UnknownPhase(s.to_string()))
    }
}

/// `next_phase(p)` as a free function.
pub fn next_phase(phase: Phase) -> Option<Phase> {
    phase.next()
}

/// Which completion artifacts are present in a working directory.
///
/// Gathered by `io::artifacts`; kept as plain flags so derivation stays pure.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Evidence {
    /// `research/` holds at least one markdown note.
    pub research: bool,
    /// `tests/` holds at least one recognized test file.
    pub tests: bool,
    /// `results/` holds at least one `*results.json` file.
    pub results: bool,
    /// The final report exists and meets the minimum size.
    pub report: bool,
}

/// Guidance on which phases can be skipped when resuming at `phase`.
///
/// Must track [`Phase::from_evidence`]: each text names exactly the work whose
/// evidence places an item at that phase.
pub fn resume_instructions(phase: Phase) -> &'static str {
    match phase {
        Phase::Tests => {
            "Research phase complete (research notes found). SKIP research phase and start with test creation."
        }
        Phase::Execution => {
            "Tests created (test files found). SKIP research and test creation phases and start with test execution."
        }
        Phase::Report => {
            "Tests executed (results found). SKIP all phases except report generation."
        }
        Phase::Init | Phase::Research | Phase::Complete => "",
    }
}
