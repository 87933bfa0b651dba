use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt::{self, Debug};
use std::rc::Rc;
use std::time::Duration;

use tracing::{debug, trace};

use crate::command::{Command, CommandKind, Invocation, Responder};
use crate::params::IntoParams;
use crate::reader::DataReader;
use crate::result_set::ResultSet;
use crate::shape::Shape;
use crate::transaction::{DropBehavior, Transaction, TransactionRecord, TransactionState};
use crate::value::Value;
use crate::verify::Ledger;
use crate::{Error, Result};

/// What happens when a command is created and no responder is queued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExhaustedPolicy {
    /// Fail with [`Error::QueueExhausted`].
    #[default]
    Error,
    /// Hand out a command that answers with an empty response.
    EmptyResponse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Closed,
    Open,
}

/// Configuration for a simulated connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionOpts {
    pub pipelined: bool,
    pub on_exhausted: ExhaustedPolicy,
    pub default_timeout: Duration,
    /// Refuse to execute while the connection is closed.
    pub require_open: bool,
}

impl Default for ConnectionOpts {
    fn default() -> Self {
        Self {
            pipelined: false,
            on_exhausted: ExhaustedPolicy::Error,
            default_timeout: Duration::from_secs(30),
            require_open: false,
        }
    }
}

/// A builder for [`Connection`].
#[derive(Debug, Clone, Default)]
pub struct Builder {
    opts: ConnectionOpts,
    connection_string: String,
}

impl Builder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Emulate a server that returns several result sets from one round
    /// trip: readers advance through queued responders.
    pub fn pipelined(mut self, pipelined: bool) -> Self {
        self.opts.pipelined = pipelined;
        self
    }

    pub fn on_exhausted(mut self, policy: ExhaustedPolicy) -> Self {
        self.opts.on_exhausted = policy;
        self
    }

    pub fn default_timeout(mut self, timeout: Duration) -> Self {
        self.opts.default_timeout = timeout;
        self
    }

    pub fn require_open(mut self, require_open: bool) -> Self {
        self.opts.require_open = require_open;
        self
    }

    pub fn connection_string(mut self, connection_string: impl Into<String>) -> Self {
        self.connection_string = connection_string.into();
        self
    }

    pub fn build(self) -> Connection {
        debug!(opts = ?self.opts, "creating simulated connection");
        Connection {
            inner: Rc::new(ConnectionInner {
                opts: Cell::new(self.opts),
                connection_string: self.connection_string,
                state: Cell::new(ConnectionState::Closed),
                pending: RefCell::new(VecDeque::new()),
                ledger: RefCell::new(Vec::new()),
                transactions: RefCell::new(Vec::new()),
            }),
        }
    }
}

struct ConnectionInner {
    opts: Cell<ConnectionOpts>,
    connection_string: String,
    state: Cell<ConnectionState>,
    pending: RefCell<VecDeque<Responder>>,
    ledger: RefCell<Vec<Rc<Invocation>>>,
    transactions: RefCell<Vec<TransactionRecord>>,
}

/// A simulated database connection.
///
/// Holds the FIFO queue of configured responders and the append-only ledger
/// of every execution. Clones share the same queue and ledger. Not `Send`:
/// one connection belongs to one test.
#[derive(Clone)]
pub struct Connection {
    inner: Rc<ConnectionInner>,
}

impl Default for Connection {
    fn default() -> Self {
        Builder::new().build()
    }
}

impl Connection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn opts(&self) -> ConnectionOpts {
        self.inner.opts.get()
    }

    pub fn connection_string(&self) -> &str {
        &self.inner.connection_string
    }

    pub fn is_pipelined(&self) -> bool {
        self.inner.opts.get().pipelined
    }

    pub fn set_pipelined(&self, pipelined: bool) {
        let mut opts = self.inner.opts.get();
        opts.pipelined = pipelined;
        self.inner.opts.set(opts);
        debug!(pipelined, "pipelined mode changed");
    }

    pub fn open(&self) {
        self.inner.state.set(ConnectionState::Open);
    }

    pub fn close(&self) {
        self.inner.state.set(ConnectionState::Closed);
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.state.get()
    }

    pub(crate) fn same_connection(&self, other: &Connection) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn check_usable(&self) -> Result<()> {
        if self.opts().require_open && self.state() != ConnectionState::Open {
            return Err(Error::Misuse(
                "connection must be opened before executing commands".to_string(),
            ));
        }
        Ok(())
    }

    /// Queue a responder for a future command.
    pub fn queue(&self, responder: Responder) -> &Self {
        let mut pending = self.inner.pending.borrow_mut();
        pending.push_back(responder);
        trace!(pending = pending.len(), "queued responder");
        self
    }

    pub fn setup_for_scalar(&self, value: impl Into<Value>) -> &Self {
        self.queue(Responder::scalar(value))
    }

    pub fn setup_for_non_query(&self, rows_affected: u64) -> &Self {
        self.queue(Responder::rows_affected(rows_affected))
    }

    pub fn setup_for_query(&self, result_set: ResultSet) -> &Self {
        self.queue(Responder::query(result_set))
    }

    /// Queue rows built from every scalar property of `objects`.
    pub fn setup_for_objects<T: Shape>(&self, objects: &[T]) -> Result<&Self> {
        Ok(self.queue(Responder::objects(objects)?))
    }

    pub fn setup_for_error(&self, message: impl Into<String>) -> &Self {
        self.queue(Responder::failure(message))
    }

    pub fn pending_count(&self) -> usize {
        self.inner.pending.borrow().len()
    }

    /// Pop the head of the queue, or `None` once it is empty.
    pub(crate) fn next_responder(&self) -> Option<Responder> {
        let mut pending = self.inner.pending.borrow_mut();
        let responder = pending.pop_front();
        trace!(
            found = responder.is_some(),
            pending = pending.len(),
            "dequeued responder"
        );
        responder
    }

    /// Pop the head of the queue, applying the exhausted policy when it is
    /// empty.
    pub(crate) fn take_responder(&self, context: &str) -> Result<Responder> {
        match self.next_responder() {
            Some(responder) => Ok(responder),
            None => match self.opts().on_exhausted {
                ExhaustedPolicy::Error => Err(Error::QueueExhausted(context.to_string())),
                ExhaustedPolicy::EmptyResponse => Ok(Responder::empty()),
            },
        }
    }

    /// Pipelined commands draw at execution time instead.
    fn draw_responder(&self, context: &str) -> Result<Option<Responder>> {
        if self.is_pipelined() {
            return Ok(None);
        }
        self.take_responder(context).map(Some)
    }

    /// A fresh command answering with the next queued responder.
    pub fn create_command(&self) -> Result<Command> {
        let responder = self.draw_responder("a new command")?;
        Ok(Command::new(
            self.clone(),
            responder,
            self.opts().default_timeout,
        ))
    }

    pub fn prepare(&self, sql: &str) -> Result<Command> {
        let responder = self.draw_responder(sql)?;
        let mut command = Command::new(self.clone(), responder, self.opts().default_timeout);
        command.set_text(sql);
        Ok(command)
    }

    pub fn prepare_procedure(&self, name: &str) -> Result<Command> {
        let mut command = self.prepare(name)?;
        command.set_kind(CommandKind::StoredProcedure);
        Ok(command)
    }

    /// Execute a statement and return the number of affected rows.
    pub fn execute(&self, sql: &str, params: impl IntoParams) -> Result<u64> {
        let mut command = self.prepare(sql)?;
        command.bind(params)?;
        command.execute_non_query()
    }

    pub fn query(&self, sql: &str, params: impl IntoParams) -> Result<DataReader> {
        let mut command = self.prepare(sql)?;
        command.bind(params)?;
        command.execute_reader()
    }

    pub fn query_scalar(&self, sql: &str, params: impl IntoParams) -> Result<Value> {
        let mut command = self.prepare(sql)?;
        command.bind(params)?;
        command.execute_scalar()
    }

    pub(crate) fn append_invocation(
        &self,
        build: impl FnOnce(usize) -> Invocation,
    ) -> Rc<Invocation> {
        let mut ledger = self.inner.ledger.borrow_mut();
        let invocation = Rc::new(build(ledger.len()));
        ledger.push(invocation.clone());
        invocation
    }

    /// Every execution on this connection, oldest first.
    pub fn invocations(&self) -> Vec<Rc<Invocation>> {
        self.inner.ledger.borrow().clone()
    }

    pub fn last_invocation(&self) -> Option<Rc<Invocation>> {
        self.inner.ledger.borrow().last().cloned()
    }

    /// Assertion view over the ledger and transaction history.
    pub fn ledger(&self) -> Ledger {
        Ledger::new(self.invocations(), self.transactions())
    }

    pub fn begin_transaction(&self) -> Result<Transaction> {
        self.begin_transaction_with(DropBehavior::default())
    }

    pub fn begin_transaction_with(&self, drop_behavior: DropBehavior) -> Result<Transaction> {
        self.check_usable()?;
        let mut transactions = self.inner.transactions.borrow_mut();
        let id = transactions.len() as u64 + 1;
        transactions.push(TransactionRecord {
            id,
            state: TransactionState::Active,
        });
        debug!(id, "began transaction");
        Ok(Transaction::new(self.clone(), id, drop_behavior))
    }

    pub(crate) fn transaction_state(&self, id: u64) -> Option<TransactionState> {
        self.inner
            .transactions
            .borrow()
            .iter()
            .find(|t| t.id == id)
            .map(|t| t.state)
    }

    pub(crate) fn finish_transaction(&self, id: u64, state: TransactionState) -> Result<()> {
        let mut transactions = self.inner.transactions.borrow_mut();
        let record = transactions
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| Error::Misuse(format!("unknown transaction {id}")))?;
        if record.state != TransactionState::Active {
            return Err(Error::Misuse(format!(
                "transaction {id} already {:?}",
                record.state
            )));
        }
        record.state = state;
        debug!(id, ?state, "finished transaction");
        Ok(())
    }

    pub fn transactions(&self) -> Vec<TransactionRecord> {
        self.inner.transactions.borrow().clone()
    }
}

impl Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("opts", &self.opts())
            .field("state", &self.state())
            .field("pending", &self.pending_count())
            .field("invocations", &self.inner.ledger.borrow().len())
            .finish()
    }
}
