//! Semantic invariants of a checkpoint record not enforced by decoding.

use std::collections::HashSet;

use crate::core::checkpoint::Checkpoint;

/// Check record invariants that a hand-edited or foreign sidecar may break:
/// - `updated_at` not earlier than `started_at`
/// - No duplicate paths within a phase's artifact list
/// - No empty artifact paths
pub fn validate_invariants(checkpoint: &Checkpoint) -> Vec<String> {
    let mut errors = Vec::new();

    if checkpoint.updated_at() < checkpoint.started_at() {
        errors.push(format!(
            "{}: updated_at {} is earlier than started_at {}",
            checkpoint.item_id(),
            checkpoint.updated_at(),
            checkpoint.started_at()
        ));
    }

    for (phase_name, paths) in checkpoint.artifacts() {
        let mut seen = HashSet::new();
        for path in paths {
            if path.trim().is_empty() {
                errors.push(format!(
                    "{}: empty artifact path under '{}'",
                    checkpoint.item_id(),
                    phase_name
                ));
            } else if !seen.insert(path.as_str()) {
                errors.push(format!(
                    "{}: duplicate artifact '{}' under '{}'",
                    checkpoint.item_id(),
                    path,
                    phase_name
                ));
            }
        }
    }

    errors
}
