use std::cell::Cell;
use std::fmt::{self, Debug};
use std::rc::Rc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, instrument, warn, Level};

use crate::connection::Connection;
use crate::parameters::Parameters;
use crate::params::IntoParams;
use crate::reader::DataReader;
use crate::result_set::ResultSet;
use crate::shape::Shape;
use crate::transaction::Transaction;
use crate::value::Value;
use crate::verify::Ledger;
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CommandKind {
    #[default]
    Text,
    StoredProcedure,
}

/// The execution entry point that produced an invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecuteMethod {
    Scalar,
    NonQuery,
    Reader,
}

/// What a responder answers with.
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    Scalar(Value),
    RowsAffected(u64),
    ResultSets(Vec<ResultSet>),
    /// Simulated server error, returned after the invocation is recorded.
    Failure(String),
    Empty,
}

/// A preconfigured answer for one future command.
#[derive(Debug, Clone, PartialEq)]
pub struct Responder {
    response: Response,
    label: Option<String>,
}

impl Responder {
    pub fn new(response: Response) -> Self {
        Self {
            response,
            label: None,
        }
    }

    pub fn scalar(value: impl Into<Value>) -> Self {
        Self::new(Response::Scalar(value.into()))
    }

    pub fn rows_affected(count: u64) -> Self {
        Self::new(Response::RowsAffected(count))
    }

    pub fn query(result_set: ResultSet) -> Self {
        Self::new(Response::ResultSets(vec![result_set]))
    }

    /// Several result sets read one after the other with `next_result`.
    pub fn queries(result_sets: Vec<ResultSet>) -> Self {
        Self::new(Response::ResultSets(result_sets))
    }

    /// Rows built from every scalar property of each object.
    pub fn objects<T: Shape>(objects: &[T]) -> Result<Self> {
        Ok(Self::query(ResultSet::from_shapes(objects)?))
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self::new(Response::Failure(message.into()))
    }

    pub fn empty() -> Self {
        Self::new(Response::Empty)
    }

    /// Describe the statement this responder is meant for. A command whose
    /// text differs from the label logs a warning when it is answered, and
    /// simulated failures name the label.
    pub fn labeled(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn response(&self) -> &Response {
        &self.response
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// The label, when it does not describe `text`. Case and whitespace are
    /// ignored.
    pub(crate) fn mismatched_label(&self, text: &str) -> Option<&str> {
        let normalize = |s: &str| s.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase();
        self.label
            .as_deref()
            .filter(|label| normalize(label) != normalize(text))
    }

    fn database_error(&self, message: &str) -> Error {
        match &self.label {
            Some(label) => Error::Database(format!("{message} (responder for `{label}`)")),
            None => Error::Database(message.to_string()),
        }
    }

    pub(crate) fn scalar_value(&self) -> Result<Value> {
        match &self.response {
            Response::Scalar(value) => Ok(value.clone()),
            Response::ResultSets(sets) => Ok(sets
                .first()
                .map(ResultSet::first_cell)
                .unwrap_or(Value::Null)),
            Response::RowsAffected(_) | Response::Empty => Ok(Value::Null),
            Response::Failure(message) => Err(self.database_error(message)),
        }
    }

    pub(crate) fn affected(&self) -> Result<u64> {
        match &self.response {
            Response::RowsAffected(count) => Ok(*count),
            Response::Failure(message) => Err(self.database_error(message)),
            _ => Ok(0),
        }
    }

    pub(crate) fn result_sets(&self) -> Result<Vec<ResultSet>> {
        match &self.response {
            Response::Scalar(value) => Ok(vec![ResultSet::scalar(value.clone())]),
            Response::ResultSets(sets) => Ok(sets.clone()),
            Response::RowsAffected(_) | Response::Empty => Ok(Vec::new()),
            Response::Failure(message) => Err(self.database_error(message)),
        }
    }

    pub(crate) fn records_affected(&self) -> Option<u64> {
        match &self.response {
            Response::RowsAffected(count) => Some(*count),
            _ => None,
        }
    }
}

/// Record of one execution: the text and a point-in-time parameter
/// snapshot. Only the cancellation timestamp may change after recording.
pub struct Invocation {
    sequence: usize,
    text: String,
    kind: CommandKind,
    method: ExecuteMethod,
    timeout: Duration,
    parameters: Parameters,
    transaction: Option<u64>,
    executed_at: DateTime<Utc>,
    cancelled_at: Cell<Option<DateTime<Utc>>>,
}

impl Invocation {
    /// Position in the connection ledger, starting at 0.
    pub fn sequence(&self) -> usize {
        self.sequence
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn kind(&self) -> CommandKind {
        self.kind
    }

    pub fn method(&self) -> ExecuteMethod {
        self.method
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn parameters(&self) -> &Parameters {
        &self.parameters
    }

    /// Value of the single parameter called `name`.
    pub fn parameter(&self, name: &str) -> Result<&Value> {
        self.parameters.get(name).map(|p| &p.value)
    }

    pub fn transaction(&self) -> Option<u64> {
        self.transaction
    }

    pub fn executed_at(&self) -> DateTime<Utc> {
        self.executed_at
    }

    pub fn cancelled_at(&self) -> Option<DateTime<Utc>> {
        self.cancelled_at.get()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled_at.get().is_some()
    }

    fn cancel(&self) {
        if self.cancelled_at.get().is_none() {
            self.cancelled_at.set(Some(Utc::now()));
        }
    }
}

impl Debug for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Invocation")
            .field("sequence", &self.sequence)
            .field("text", &self.text)
            .field("kind", &self.kind)
            .field("method", &self.method)
            .field("parameters", &self.parameters)
            .field("transaction", &self.transaction)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// A command handed to the code under test.
///
/// Outside pipelined mode the command draws its responder from the
/// connection queue when it is created, so the Nth created command answers
/// with the Nth queued responder. A command created in pipelined mode draws
/// at each scalar or non-query execution instead. Every execution is
/// appended to this command's ledger and to the connection's ledger.
pub struct Command {
    conn: Connection,
    text: String,
    kind: CommandKind,
    timeout: Duration,
    parameters: Parameters,
    transaction: Option<u64>,
    responder: Option<Responder>,
    invocations: Vec<Rc<Invocation>>,
}

impl Command {
    pub(crate) fn new(conn: Connection, responder: Option<Responder>, timeout: Duration) -> Self {
        Self {
            conn,
            text: String::new(),
            kind: CommandKind::Text,
            timeout,
            parameters: Parameters::new(),
            transaction: None,
            responder,
            invocations: Vec::new(),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }

    pub fn kind(&self) -> CommandKind {
        self.kind
    }

    pub fn set_kind(&mut self, kind: CommandKind) {
        self.kind = kind;
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    pub fn parameters(&self) -> &Parameters {
        &self.parameters
    }

    pub fn parameters_mut(&mut self) -> &mut Parameters {
        &mut self.parameters
    }

    /// Append bind arguments to the parameter collection.
    /// Positional arguments are numbered after the positional parameters
    /// already bound, so a second bind continues at the next `?N`.
    pub fn bind(&mut self, params: impl IntoParams) -> Result<()> {
        let bound = self.parameters.iter().filter(|p| p.is_positional()).count();
        let converted = params.into_params()?.into_parameters_after(bound)?;
        self.parameters.add_range(converted.iter().cloned())
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn responder(&self) -> Option<&Responder> {
        self.responder.as_ref()
    }

    /// Enlist the command in a transaction of the same connection.
    pub fn set_transaction(&mut self, transaction: Option<&Transaction>) -> Result<()> {
        match transaction {
            None => self.transaction = None,
            Some(tx) => {
                if !tx.connection().same_connection(&self.conn) {
                    return Err(Error::Misuse(
                        "transaction belongs to a different connection".to_string(),
                    ));
                }
                if !tx.is_active() {
                    return Err(Error::Misuse(format!(
                        "transaction {} is no longer active",
                        tx.id()
                    )));
                }
                self.transaction = Some(tx.id());
            }
        }
        Ok(())
    }

    pub fn transaction(&self) -> Option<u64> {
        self.transaction
    }

    #[instrument(skip_all, level = Level::DEBUG, fields(text = %self.text))]
    pub fn execute_scalar(&mut self) -> Result<Value> {
        self.conn.check_usable()?;
        let responder = self.answering_responder()?;
        self.record(ExecuteMethod::Scalar);
        responder.scalar_value()
    }

    #[instrument(skip_all, level = Level::DEBUG, fields(text = %self.text))]
    pub fn execute_non_query(&mut self) -> Result<u64> {
        self.conn.check_usable()?;
        let responder = self.answering_responder()?;
        self.record(ExecuteMethod::NonQuery);
        responder.affected()
    }

    /// Execute and return a cursor. In pipelined mode the cursor is bound to
    /// the connection and starts before the first result.
    #[instrument(skip_all, level = Level::DEBUG, fields(text = %self.text))]
    pub fn execute_reader(&mut self) -> Result<DataReader> {
        self.conn.check_usable()?;
        if self.conn.is_pipelined() {
            self.record(ExecuteMethod::Reader);
            return Ok(DataReader::bound(self.conn.clone()));
        }
        let responder = self.answering_responder()?;
        self.record(ExecuteMethod::Reader);
        Ok(DataReader::unbound(
            responder.result_sets()?,
            responder.records_affected(),
        ))
    }

    /// Timestamp the most recent execution of this command as cancelled.
    /// Execution has already completed, so nothing else changes.
    pub fn cancel(&self) {
        if let Some(last) = self.invocations.last() {
            debug!(sequence = last.sequence(), "cancelling invocation");
            last.cancel();
        }
    }

    /// Executions of this command, oldest first.
    pub fn invocations(&self) -> &[Rc<Invocation>] {
        &self.invocations
    }

    /// Assertion view over this command's own executions.
    pub fn ledger(&self) -> Ledger {
        Ledger::new(self.invocations.clone(), Vec::new())
    }

    /// The responder drawn at creation, or the next queued one for a
    /// command created in pipelined mode.
    fn answering_responder(&self) -> Result<Responder> {
        let responder = match &self.responder {
            Some(responder) => responder.clone(),
            None => self.conn.take_responder(&self.text)?,
        };
        if let Some(label) = responder.mismatched_label(&self.text) {
            warn!(label, text = %self.text, "responder answered a different statement");
        }
        Ok(responder)
    }

    fn record(&mut self, method: ExecuteMethod) -> Rc<Invocation> {
        let invocation = self.conn.append_invocation(|sequence| Invocation {
            sequence,
            text: self.text.clone(),
            kind: self.kind,
            method,
            timeout: self.timeout,
            parameters: self.parameters.snapshot(),
            transaction: self.transaction,
            executed_at: Utc::now(),
            cancelled_at: Cell::new(None),
        });
        self.invocations.push(invocation.clone());
        debug!(
            sequence = invocation.sequence(),
            ?method,
            parameters = invocation.parameters().len(),
            "recorded invocation"
        );
        invocation
    }
}

impl Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("text", &self.text)
            .field("kind", &self.kind)
            .field("parameters", &self.parameters.len())
            .field("executions", &self.invocations.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Builder;

    #[test]
    fn test_responder_scalar_mapping() {
        let rs = ResultSet::from_values("n", [3, 4]);
        assert_eq!(Responder::query(rs).scalar_value().unwrap(), Value::Integer(3));
        assert_eq!(Responder::rows_affected(2).scalar_value().unwrap(), Value::Null);
        assert_eq!(Responder::empty().scalar_value().unwrap(), Value::Null);
        assert!(matches!(
            Responder::failure("deadlock").scalar_value(),
            Err(Error::Database(ref m)) if m == "deadlock"
        ));
    }

    #[test]
    fn test_responder_result_sets_mapping() {
        let sets = Responder::scalar("ok").result_sets().unwrap();
        assert_eq!(sets.len(), 1);
        assert_eq!(sets[0].first_cell(), Value::from("ok"));
        assert!(Responder::rows_affected(1).result_sets().unwrap().is_empty());
        assert_eq!(Responder::rows_affected(4).affected().unwrap(), 4);
        assert_eq!(Responder::scalar(1).affected().unwrap(), 0);
        assert_eq!(Responder::scalar(1).labeled("count").label(), Some("count"));
    }

    #[test]
    fn test_responder_label() {
        let labeled = Responder::scalar(1).labeled("SELECT COUNT(*) FROM Widgets");
        assert_eq!(labeled.mismatched_label("select count(*)\n  FROM Widgets"), None);
        assert_eq!(
            labeled.mismatched_label("SELECT COUNT(*) FROM Gadgets"),
            Some("SELECT COUNT(*) FROM Widgets")
        );
        assert_eq!(Responder::scalar(1).mismatched_label("SELECT 1"), None);

        let failing = Responder::failure("deadlock").labeled("UPDATE Widgets");
        assert!(matches!(
            failing.affected(),
            Err(Error::Database(ref m)) if m == "deadlock (responder for `UPDATE Widgets`)"
        ));
    }

    #[test]
    fn test_second_positional_bind_continues_numbering() {
        let conn = Builder::new().build();
        conn.setup_for_non_query(1);
        let mut cmd = conn.prepare("UPDATE Widgets SET Name = ? WHERE Id = ?").unwrap();
        cmd.bind(crate::params!["foo"]).unwrap();
        cmd.bind(crate::params![7]).unwrap();
        assert_eq!(cmd.parameters().len(), 2);
        assert_eq!(cmd.parameters().get("?1").unwrap().value, Value::from("foo"));
        assert_eq!(cmd.parameters().get("?2").unwrap().value, Value::Integer(7));
    }

    #[test]
    fn test_execution_records_in_both_ledgers() {
        let conn = Builder::new().build();
        conn.setup_for_non_query(1);
        let mut cmd = conn.prepare("DELETE FROM Widgets WHERE Id = @Id").unwrap();
        cmd.parameters_mut().add_value("@Id", 4);
        assert_eq!(cmd.execute_non_query().unwrap(), 1);

        assert_eq!(cmd.invocations().len(), 1);
        let recorded = conn.invocations();
        assert_eq!(recorded.len(), 1);
        assert!(Rc::ptr_eq(&recorded[0], &cmd.invocations()[0]));
        assert_eq!(recorded[0].method(), ExecuteMethod::NonQuery);
        assert_eq!(recorded[0].parameter("Id").unwrap(), &Value::Integer(4));
    }

    #[test]
    fn test_failure_is_recorded_before_error() {
        let conn = Builder::new().build();
        conn.setup_for_error("unique constraint violated");
        let mut cmd = conn.prepare("INSERT INTO Widgets (Id) VALUES (1)").unwrap();
        let err = cmd.execute_non_query().unwrap_err();
        assert!(matches!(err, Error::Database(_)));
        assert_eq!(conn.invocations().len(), 1);
    }

    #[test]
    fn test_cancel_marks_latest_invocation() {
        let conn = Builder::new().build();
        conn.setup_for_scalar(1);
        let mut cmd = conn.prepare("SELECT COUNT(*) FROM Widgets").unwrap();
        cmd.cancel();
        cmd.execute_scalar().unwrap();
        cmd.execute_scalar().unwrap();
        cmd.cancel();
        let invocations = cmd.invocations();
        assert!(!invocations[0].is_cancelled());
        assert!(invocations[1].is_cancelled());
        assert!(conn.invocations()[1].cancelled_at().is_some());
    }
}
