//! The in-memory engine façade.
//!
//! One engine instance owns the format registry and the recovery state,
//! exposes the index factory, and undoes transactions by replaying
//! their statements in reverse. Nothing here suspends: every operation
//! runs to completion on the one cooperative thread, which is what the
//! [`NO_YIELD`] flag promises to the host.
//!
//! [`NO_YIELD`]: EngineFlags::NO_YIELD

use tracing::{debug, error, info};

use tbox_error::Result;
use tbox_format::FormatRegistry;
use tbox_types::{KeyDef, TupleRef};

use crate::index::{self, SpaceIndex};
use crate::recovery::{RecoverStep, RecoveryState};
use crate::space::{DupMode, Space};
use crate::txn::Txn;

bitflags::bitflags! {
    /// Engine capabilities advertised to the host.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct EngineFlags: u32 {
        /// Statements group into transactions with rollback.
        const TRANSACTIONAL = 1;
        /// No operation suspends or yields to other cooperative work.
        const NO_YIELD = 2;
        /// Spaces may be declared temporary.
        const CAN_BE_TEMPORARY = 4;
    }
}

/// The in-memory engine.
#[derive(Debug)]
pub struct MemEngine {
    flags: EngineFlags,
    recovery: RecoveryState,
    formats: FormatRegistry,
}

impl MemEngine {
    /// Open a new engine instance: empty format catalog, recovery at
    /// its initial state.
    #[must_use]
    pub fn open() -> Self {
        info!("in-memory engine opened");
        Self {
            flags: EngineFlags::TRANSACTIONAL
                | EngineFlags::NO_YIELD
                | EngineFlags::CAN_BE_TEMPORARY,
            recovery: RecoveryState::Initial,
            formats: FormatRegistry::new(),
        }
    }

    /// Advertised capability flags.
    #[must_use]
    pub fn flags(&self) -> EngineFlags {
        self.flags
    }

    /// Current recovery state.
    #[must_use]
    pub fn recovery_state(&self) -> RecoveryState {
        self.recovery
    }

    /// The engine-owned format catalog.
    #[must_use]
    pub fn formats(&self) -> &FormatRegistry {
        &self.formats
    }

    /// The engine-owned format catalog, mutably.
    pub fn formats_mut(&mut self) -> &mut FormatRegistry {
        &mut self.formats
    }

    /// Validate a key definition without constructing anything.
    pub fn check_key_def(&self, key_def: &KeyDef) -> Result<()> {
        index::check_key_def(key_def)
    }

    /// Validate and construct an index of the requested variant.
    pub fn create_index(&self, key_def: &KeyDef) -> Result<SpaceIndex> {
        index::create_index(key_def)
    }

    /// Drop an index, releasing its tuple references.
    pub fn drop_index(&self, index: SpaceIndex) {
        index::drop_index(index);
    }

    /// Replace `old` with `new` in `space`, honoring the recovery
    /// state's replace behavior.
    pub fn replace(
        &self,
        space: &mut Space,
        old: Option<&TupleRef>,
        new: Option<&TupleRef>,
        dup: DupMode,
    ) -> Result<Option<TupleRef>> {
        space.replace(self.recovery.replace_mode(), old, new, dup)
    }

    /// Apply the state-dispatched recover step to a space.
    pub fn recover_space(&self, space: &mut Space) {
        match self.recovery.recover_step() {
            RecoverStep::BeginBuildPrimaryKey => {
                // Nothing to build yet; the space keeps accumulating.
            }
            RecoverStep::BuildPrimaryKey => space.build_primary_key(),
            RecoverStep::BuildAllKeys => space.build_all_keys(),
        }
    }

    /// Undo a transaction by replaying its statements in reverse.
    ///
    /// Later mutations are undone before earlier ones, so intermediate
    /// unique-key invariants hold throughout.
    ///
    /// # Panics
    ///
    /// A failed undo leaves the in-memory state inconsistent; the
    /// process halts.
    pub fn rollback(&self, txn: &Txn) {
        for stmt in txn.stmts().iter().rev() {
            if stmt.old_tuple.is_none() && stmt.new_tuple.is_none() {
                continue;
            }
            let result = stmt.space.borrow_mut().replace(
                self.recovery.replace_mode(),
                stmt.new_tuple.as_ref(),
                stmt.old_tuple.as_ref(),
                DupMode::Insert,
            );
            if let Err(err) = result {
                error!(%err, "rollback failed; in-memory state is inconsistent");
                panic!("fatal: transaction rollback failed: {err}");
            }
        }
        debug!(stmts = txn.len(), "transaction rolled back");
    }

    /// Start of snapshot recovery. Snapshotting itself is performed by
    /// the surrounding host, so there is nothing to prepare here.
    pub fn begin_recover_snapshot(&mut self, lsn: i64) {
        debug!(lsn, "snapshot recovery begins");
    }

    /// The snapshot is fully loaded: recovering a space now builds its
    /// primary key.
    pub fn end_recover_snapshot(&mut self) {
        debug_assert_eq!(self.recovery, RecoveryState::Initial);
        self.recovery = RecoveryState::SnapshotLoaded;
        info!("snapshot loaded");
    }

    /// All logs are replayed: recovering a space now builds its
    /// secondary keys. Terminal.
    pub fn end_recovery(&mut self) {
        self.recovery = RecoveryState::XlogsReplayed;
        info!("recovery finished");
    }

    /// Checkpointing is handled by the host; success unconditionally.
    pub fn begin_checkpoint(&mut self, lsn: i64) -> Result<()> {
        debug!(lsn, "begin checkpoint (host-managed)");
        Ok(())
    }

    /// Checkpointing is handled by the host; success unconditionally.
    pub fn wait_checkpoint(&mut self, lsn: i64) -> Result<()> {
        debug!(lsn, "wait checkpoint (host-managed)");
        Ok(())
    }

    /// Checkpointing is handled by the host; nothing to delete.
    pub fn delete_checkpoint(&mut self, lsn: i64) {
        debug!(lsn, "delete checkpoint (host-managed)");
    }

    /// Tear the engine down, destroying every registered format.
    pub fn close(mut self) {
        self.formats.clear();
        info!("in-memory engine closed");
    }
}

impl Default for MemEngine {
    fn default() -> Self {
        Self::open()
    }
}
