//! The TupleBox in-memory engine façade.
//!
//! Spaces hold tuples validated by their registered format; indexes of
//! four variants give access to them; the engine carries the recovery
//! state machine and undoes transactions by replaying statements in
//! reverse. Everything runs on one cooperative thread and nothing in
//! this crate suspends.

pub mod engine;
pub mod index;
pub mod recovery;
pub mod space;
pub mod txn;

pub use engine::{EngineFlags, MemEngine};
pub use index::{
    BitsetIndex, HashIndex, RtreeIndex, SpaceIndex, TreeIndex, check_key_def, create_index,
    decode_index_kind, drop_index,
};
pub use recovery::{RecoverStep, RecoveryState, ReplaceMode};
pub use space::{DupMode, Space};
pub use txn::{SpaceHandle, Txn, TxnStmt};
