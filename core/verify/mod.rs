//! Assertions over the invocation ledger.
//!
//! A [`Ledger`] is a read-only view of what a connection (or a single
//! command) executed. Every assertion returns `Ok` or an
//! [`Error::Assertion`](crate::Error::Assertion) that lists the executed
//! statements, so a failing test can be diagnosed from its output alone.

mod pattern;
mod template;

use std::rc::Rc;

use tracing::debug;

pub use pattern::{Pick, StatementPattern, Verb};

use crate::command::Invocation;
use crate::error::AssertionFailure;
use crate::transaction::{TransactionRecord, TransactionState};
use crate::{Error, Result};

pub struct Ledger {
    invocations: Vec<Rc<Invocation>>,
    transactions: Vec<TransactionRecord>,
}

impl Ledger {
    pub(crate) fn new(
        invocations: Vec<Rc<Invocation>>,
        transactions: Vec<TransactionRecord>,
    ) -> Self {
        Self {
            invocations,
            transactions,
        }
    }

    pub fn invocations(&self) -> &[Rc<Invocation>] {
        &self.invocations
    }

    pub fn len(&self) -> usize {
        self.invocations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.invocations.is_empty()
    }

    /// Command texts in execution order.
    pub fn texts(&self) -> Vec<String> {
        self.invocations.iter().map(|i| i.text().to_string()).collect()
    }

    /// Some invocation satisfies `predicate`. Returns the first one.
    pub fn should_have_executed<F>(&self, predicate: F) -> Result<Rc<Invocation>>
    where
        F: Fn(&Invocation) -> bool,
    {
        self.invocations
            .iter()
            .find(|i| predicate(i))
            .cloned()
            .ok_or_else(|| {
                self.failure(
                    "a statement matching the predicate",
                    "no executed statement matched",
                    None,
                )
            })
    }

    /// Exactly `times` invocations satisfy `predicate`.
    pub fn should_have_executed_times<F>(&self, predicate: F, times: usize) -> Result<()>
    where
        F: Fn(&Invocation) -> bool,
    {
        let count = self.invocations.iter().filter(|i| predicate(i)).count();
        if count == times {
            return Ok(());
        }
        Err(self.failure(
            format!("{times} statement(s) matching the predicate"),
            format!("{count} matched"),
            None,
        ))
    }

    pub fn should_not_have_executed<F>(&self, predicate: F) -> Result<()>
    where
        F: Fn(&Invocation) -> bool,
    {
        match self.invocations.iter().find(|i| predicate(i)) {
            None => Ok(()),
            Some(found) => Err(self.failure(
                "no statement matching the predicate",
                format!("statement [{}] matched", found.sequence()),
                Some(found.text().to_string()),
            )),
        }
    }

    /// Two-phase match: find the first (or last) statement with the verb and
    /// table of `pattern`, then check each expected column and filter of
    /// that statement independently.
    pub fn should_have(&self, pattern: &StatementPattern) -> Result<Rc<Invocation>> {
        let compiled = pattern.compile()?;
        let mut candidates = self
            .invocations
            .iter()
            .filter(|i| compiled.matches_statement(i));
        let located = match pattern.pick() {
            Pick::First => candidates.next(),
            Pick::Last => candidates.last(),
        };
        let Some(located) = located else {
            let closest = self
                .invocations
                .iter()
                .rev()
                .find(|i| compiled.has_verb(i))
                .or_else(|| self.invocations.last())
                .map(|i| i.text().to_string());
            return Err(self.pattern_failure(
                pattern,
                format!(
                    "no {} statement against `{}` was executed",
                    pattern.verb(),
                    pattern.table()
                ),
                closest,
            ));
        };
        debug!(sequence = located.sequence(), %pattern, "located statement");
        compiled
            .check(located)
            .map_err(|reason| self.pattern_failure(pattern, reason, Some(located.text().to_string())))?;
        Ok(located.clone())
    }

    /// Number of invocations that satisfy every part of `pattern`.
    /// Candidates that fail a column check are not counted.
    pub fn count_matching(&self, pattern: &StatementPattern) -> Result<usize> {
        let compiled = pattern.compile()?;
        Ok(self
            .invocations
            .iter()
            .filter(|i| compiled.is_full_match(i))
            .count())
    }

    pub fn should_have_executed_n_times(&self, pattern: &StatementPattern, times: usize) -> Result<()> {
        let count = self.count_matching(pattern)?;
        if count == times {
            return Ok(());
        }
        Err(self.pattern_failure(
            pattern,
            format!("{count} statement(s) matched instead of {times}"),
            None,
        ))
    }

    pub fn should_have_selected<S: AsRef<str>>(&self, table: &str, columns: &[S]) -> Result<Rc<Invocation>> {
        self.should_have(&StatementPattern::select(table).columns(columns))
    }

    pub fn should_have_inserted<S: AsRef<str>>(&self, table: &str, columns: &[S]) -> Result<Rc<Invocation>> {
        self.should_have(&StatementPattern::insert(table).columns(columns))
    }

    pub fn should_have_updated<S: AsRef<str>>(&self, table: &str, columns: &[S]) -> Result<Rc<Invocation>> {
        self.should_have(&StatementPattern::update(table).columns(columns))
    }

    pub fn should_have_deleted(&self, table: &str) -> Result<Rc<Invocation>> {
        self.should_have(&StatementPattern::delete(table))
    }

    pub fn should_have_executed_procedure(&self, name: &str) -> Result<Rc<Invocation>> {
        self.should_have(&StatementPattern::procedure(name))
    }

    pub fn transactions(&self) -> &[TransactionRecord] {
        &self.transactions
    }

    /// At least one transaction was committed.
    pub fn should_have_committed(&self) -> Result<()> {
        self.should_have_transaction(TransactionState::Committed)
    }

    /// At least one transaction was rolled back, explicitly or on drop.
    pub fn should_have_rolled_back(&self) -> Result<()> {
        self.should_have_transaction(TransactionState::RolledBack)
    }

    fn should_have_transaction(&self, state: TransactionState) -> Result<()> {
        if self.transactions.iter().any(|t| t.state == state) {
            return Ok(());
        }
        let history = self
            .transactions
            .iter()
            .map(|t| format!("{}: {:?}", t.id, t.state))
            .collect::<Vec<_>>();
        let reason = if history.is_empty() {
            "no transaction was started".to_string()
        } else {
            format!("transactions ended as [{}]", history.join(", "))
        };
        Err(self.failure(format!("a transaction in state {state:?}"), reason, None))
    }

    fn pattern_failure(
        &self,
        pattern: &StatementPattern,
        reason: impl Into<String>,
        closest: Option<String>,
    ) -> Error {
        AssertionFailure::new(pattern.to_string(), reason)
            .with_closest(closest)
            .with_executed(self.texts())
            .with_message(pattern.failure_message())
            .into()
    }

    fn failure(
        &self,
        expected: impl Into<String>,
        reason: impl Into<String>,
        closest: Option<String>,
    ) -> Error {
        AssertionFailure::new(expected, reason)
            .with_closest(closest)
            .with_executed(self.texts())
            .into()
    }
}
