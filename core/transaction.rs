use std::ops::Deref;

use tracing::warn;

use crate::connection::Connection;
use crate::Result;

/// Options for how a Transaction should behave when it is dropped.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
#[non_exhaustive]
pub enum DropBehavior {
    /// Roll back the changes. This is the default.
    #[default]
    Rollback,

    /// Commit the changes.
    Commit,

    /// Leave the transaction active in the connection history.
    Ignore,

    /// Panic. Used to enforce intentional behavior during development.
    Panic,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TransactionState {
    Active,
    Committed,
    RolledBack,
}

/// History entry kept by the connection for every transaction it began.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransactionRecord {
    pub id: u64,
    pub state: TransactionState,
}

/// A simulated transaction.
///
/// Nothing is buffered: commands enlisted in the transaction execute and
/// record immediately, and the transaction only tracks its final state so
/// tests can assert on it. Transactions roll back by default when dropped.
#[derive(Debug)]
pub struct Transaction {
    conn: Connection,
    id: u64,
    drop_behavior: DropBehavior,
}

impl Transaction {
    pub(crate) fn new(conn: Connection, id: u64, drop_behavior: DropBehavior) -> Self {
        Self {
            conn,
            id,
            drop_behavior,
        }
    }

    /// Identifier recorded on every invocation enlisted in this transaction.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn state(&self) -> TransactionState {
        self.conn
            .transaction_state(self.id)
            .unwrap_or(TransactionState::RolledBack)
    }

    pub fn is_active(&self) -> bool {
        self.state() == TransactionState::Active
    }

    #[must_use]
    pub fn drop_behavior(&self) -> DropBehavior {
        self.drop_behavior
    }

    pub fn set_drop_behavior(&mut self, drop_behavior: DropBehavior) {
        self.drop_behavior = drop_behavior;
    }

    /// Consumes and commits the transaction.
    pub fn commit(self) -> Result<()> {
        self.conn
            .finish_transaction(self.id, TransactionState::Committed)
    }

    /// Consumes and rolls back the transaction.
    pub fn rollback(self) -> Result<()> {
        self.conn
            .finish_transaction(self.id, TransactionState::RolledBack)
    }
}

impl Deref for Transaction {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        &self.conn
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        if !self.is_active() {
            return;
        }
        let state = match self.drop_behavior {
            DropBehavior::Rollback => TransactionState::RolledBack,
            DropBehavior::Commit => TransactionState::Committed,
            DropBehavior::Ignore => return,
            DropBehavior::Panic => {
                if std::thread::panicking() {
                    return;
                }
                panic!("Transaction dropped unexpectedly.");
            }
        };
        if let Err(err) = self.conn.finish_transaction(self.id, state) {
            warn!(id = self.id, %err, "failed to finish dropped transaction");
        }
    }
}
