//! Transactions as the engine sees them: an ordered statement list.
//!
//! The transaction manager lives above this crate; the engine only ever
//! receives a finished statement list to undo. Each statement records
//! the space it touched and the tuples before and after.

use std::cell::RefCell;
use std::rc::Rc;

use tbox_types::TupleRef;

use crate::space::Space;

/// Shared handle to a space. The engine runs on one cooperative thread;
/// statements and callers share spaces through `Rc<RefCell<_>>`.
pub type SpaceHandle = Rc<RefCell<Space>>;

/// One executed statement.
#[derive(Debug)]
pub struct TxnStmt {
    /// The space the statement touched.
    pub space: SpaceHandle,
    /// Tuple displaced by the statement, absent for inserts.
    pub old_tuple: Option<TupleRef>,
    /// Tuple installed by the statement, absent for deletes.
    pub new_tuple: Option<TupleRef>,
}

/// An ordered sequence of executed statements.
#[derive(Debug, Default)]
pub struct Txn {
    stmts: Vec<TxnStmt>,
}

impl Txn {
    /// An empty transaction.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a statement at the end of the transaction.
    pub fn push_stmt(
        &mut self,
        space: SpaceHandle,
        old_tuple: Option<TupleRef>,
        new_tuple: Option<TupleRef>,
    ) {
        self.stmts.push(TxnStmt {
            space,
            old_tuple,
            new_tuple,
        });
    }

    /// The statements, in execution order.
    #[must_use]
    pub fn stmts(&self) -> &[TxnStmt] {
        &self.stmts
    }

    /// Number of statements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stmts.len()
    }

    /// Whether the transaction holds no statements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stmts.is_empty()
    }
}
