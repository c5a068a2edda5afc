//! The engine recovery state machine.
//!
//! Recovery proceeds through three states. While the snapshot is being
//! loaded the engine has no keys to maintain, so replace degrades to
//! bookkeeping; once the snapshot is in, the primary key is built from
//! the accumulated tuples; once the logs are replayed, the secondary
//! keys follow. Transitions are driven by the host through
//! [`end_recover_snapshot`] and [`end_recovery`] on the engine.
//!
//! [`end_recover_snapshot`]: crate::MemEngine::end_recover_snapshot
//! [`end_recovery`]: crate::MemEngine::end_recovery

/// Recovery progress of an engine instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryState {
    /// Loading the snapshot; spaces have no keys yet.
    Initial,
    /// Snapshot loaded; replaying logs.
    SnapshotLoaded,
    /// Logs replayed. Terminal.
    XlogsReplayed,
}

/// What recovering a space means in each state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoverStep {
    /// Start accumulating tuples for the future primary key.
    BeginBuildPrimaryKey,
    /// Build the primary key from the accumulated tuples.
    BuildPrimaryKey,
    /// Build every secondary key from the primary.
    BuildAllKeys,
}

/// How a space replace behaves in each state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplaceMode {
    /// No keys to maintain: record the tuple and nothing else.
    Bookkeeping,
    /// Maintain every index.
    Apply,
}

impl RecoveryState {
    /// The recover action dispatched in this state.
    #[must_use]
    pub const fn recover_step(self) -> RecoverStep {
        match self {
            Self::Initial => RecoverStep::BeginBuildPrimaryKey,
            Self::SnapshotLoaded => RecoverStep::BuildPrimaryKey,
            Self::XlogsReplayed => RecoverStep::BuildAllKeys,
        }
    }

    /// The replace behavior dispatched in this state.
    #[must_use]
    pub const fn replace_mode(self) -> ReplaceMode {
        match self {
            Self::Initial => ReplaceMode::Bookkeeping,
            Self::SnapshotLoaded | Self::XlogsReplayed => ReplaceMode::Apply,
        }
    }

    /// Whether recovery has finished.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::XlogsReplayed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatch_is_total() {
        assert_eq!(
            RecoveryState::Initial.recover_step(),
            RecoverStep::BeginBuildPrimaryKey
        );
        assert_eq!(
            RecoveryState::SnapshotLoaded.recover_step(),
            RecoverStep::BuildPrimaryKey
        );
        assert_eq!(
            RecoveryState::XlogsReplayed.recover_step(),
            RecoverStep::BuildAllKeys
        );

        assert_eq!(
            RecoveryState::Initial.replace_mode(),
            ReplaceMode::Bookkeeping
        );
        assert_eq!(
            RecoveryState::SnapshotLoaded.replace_mode(),
            ReplaceMode::Apply
        );
        assert_eq!(
            RecoveryState::XlogsReplayed.replace_mode(),
            ReplaceMode::Apply
        );
    }

    #[test]
    fn terminal_state() {
        assert!(!RecoveryState::Initial.is_terminal());
        assert!(!RecoveryState::SnapshotLoaded.is_terminal());
        assert!(RecoveryState::XlogsReplayed.is_terminal());
    }
}
