//! Final status of an item after a processing run.

use std::fmt;

/// How a processing run for one item ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemStatus {
    /// Output validated; nothing left to do.
    Completed,
    /// Not validated, but the checkpoint shows resumable progress.
    Paused,
    /// Not validated and nothing worth resuming.
    Failed,
}

impl ItemStatus {
    pub fn settle(validated: bool, resumable: bool) -> Self {
        match (validated, resumable) {
            (true, _) => ItemStatus::Completed,
            (false, true) => ItemStatus::Paused,
            (false, false) => ItemStatus::Failed,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ItemStatus::Completed => "✅ Completed",
            ItemStatus::Paused => "⏸️ Paused",
            ItemStatus::Failed => "❌ Failed",
        }
    }

    /// Whether the item's checkpoint has served its purpose.
    pub fn is_terminal(self) -> bool {
        matches!(self, ItemStatus::Completed)
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
