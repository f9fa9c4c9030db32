//! Stable exit codes for waypoint CLI commands.

/// Command succeeded, or `waypoint check` found a resumable item.
pub const OK: i32 = 0;
/// Command failed due to invalid config, item id, sidecar content, or other errors.
pub const INVALID: i32 = 1;
/// `waypoint check` found no progress to resume (item still at `init`).
pub const NOTHING_TO_RESUME: i32 = 2;
/// `waypoint check` found the item already complete.
pub const COMPLETE: i32 = 3;
