use std::fmt::{self, Display};

use regex::{Captures, Regex};

use super::template;
use crate::command::{CommandKind, Invocation};
use crate::shape::{Property, Shape};
use crate::value::Value;
use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Select,
    Insert,
    Update,
    Delete,
    Procedure,
}

impl Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = match self {
            Verb::Select => "Select",
            Verb::Insert => "Insert",
            Verb::Update => "Update",
            Verb::Delete => "Delete",
            Verb::Procedure => "Execute",
        };
        write!(f, "{verb}")
    }
}

/// Which statement phase one picks when several match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Pick {
    #[default]
    First,
    Last,
}

#[derive(Debug, Clone, PartialEq)]
struct Expectation {
    column: String,
    value: Option<Value>,
}

/// The expected shape of an executed statement.
///
/// ```
/// use mockdb_core::StatementPattern;
///
/// let pattern = StatementPattern::update("Widgets")
///     .column_value("Name", "foo")
///     .where_eq("Id");
/// assert_eq!(
///     pattern.to_string(),
///     "Update of `Widgets` setting Name = \"foo\" where Id"
/// );
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct StatementPattern {
    verb: Verb,
    table: String,
    columns: Vec<Expectation>,
    filters: Vec<Expectation>,
    pick: Pick,
    message: Option<String>,
}

impl StatementPattern {
    fn new(verb: Verb, table: &str) -> Self {
        Self {
            verb,
            table: table.to_string(),
            columns: Vec::new(),
            filters: Vec::new(),
            pick: Pick::First,
            message: None,
        }
    }

    pub fn select(table: &str) -> Self {
        Self::new(Verb::Select, table)
    }

    pub fn insert(table: &str) -> Self {
        Self::new(Verb::Insert, table)
    }

    pub fn update(table: &str) -> Self {
        Self::new(Verb::Update, table)
    }

    pub fn delete(table: &str) -> Self {
        Self::new(Verb::Delete, table)
    }

    /// A stored procedure call. Columns name the procedure's parameters.
    pub fn procedure(name: &str) -> Self {
        Self::new(Verb::Procedure, name)
    }

    pub fn verb(&self) -> Verb {
        self.verb
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Expect `name` in the clause the verb writes or reads: the select
    /// list, the insert column list, the `SET` clause, the `WHERE` clause of
    /// a delete, or the parameters of a procedure.
    pub fn column(mut self, name: &str) -> Self {
        self.columns.push(Expectation {
            column: name.to_string(),
            value: None,
        });
        self
    }

    /// Like [`StatementPattern::column`], and the value bound to the
    /// column must equal `value`.
    pub fn column_value(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.columns.push(Expectation {
            column: name.to_string(),
            value: Some(value.into()),
        });
        self
    }

    pub fn columns<S: AsRef<str>>(self, names: &[S]) -> Self {
        names
            .iter()
            .fold(self, |pattern, name| pattern.column(name.as_ref()))
    }

    /// Expect every scalar property of `source` as a column bound to the
    /// property's value.
    pub fn values_from<T: Shape>(self, source: &T) -> Self {
        T::describe()
            .iter()
            .filter(|d| d.is_scalar())
            .fold(self, |pattern, descriptor| {
                match source.property(descriptor.name) {
                    Some(Property::Value(value)) => pattern.column_value(descriptor.name, value),
                    _ => pattern.column(descriptor.name),
                }
            })
    }

    /// Expect an equality predicate on `name` in the `WHERE` clause.
    pub fn where_eq(mut self, name: &str) -> Self {
        self.filters.push(Expectation {
            column: name.to_string(),
            value: None,
        });
        self
    }

    pub fn where_value(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.filters.push(Expectation {
            column: name.to_string(),
            value: Some(value.into()),
        });
        self
    }

    /// Check the earliest statement against the table. This is the default.
    pub fn first(mut self) -> Self {
        self.pick = Pick::First;
        self
    }

    /// Check the most recent statement against the table.
    pub fn last(mut self) -> Self {
        self.pick = Pick::Last;
        self
    }

    pub fn pick(&self) -> Pick {
        self.pick
    }

    /// Prefix assertion failures with `message`.
    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub(crate) fn failure_message(&self) -> Option<String> {
        self.message.clone()
    }

    pub(crate) fn compile(&self) -> Result<CompiledPattern<'_>> {
        let source = match self.verb {
            Verb::Select => template::select(&self.table),
            Verb::Insert => template::insert(&self.table),
            Verb::Update => template::update(&self.table),
            Verb::Delete => template::delete(&self.table),
            Verb::Procedure => template::procedure(&self.table),
        };
        let verb = match self.verb {
            Verb::Procedure => template::verb("EXEC"),
            verb => template::verb(&verb.to_string()),
        };
        Ok(CompiledPattern {
            pattern: self,
            statement: template::compile(&source)?,
            verb: template::compile(&verb)?,
        })
    }
}

impl Display for StatementPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let preposition = match self.verb {
            Verb::Select => "from",
            Verb::Insert => "into",
            Verb::Update | Verb::Delete | Verb::Procedure => "of",
        };
        write!(f, "{} {preposition} `{}`", self.verb, self.table)?;
        let list = |expectations: &[Expectation]| {
            expectations
                .iter()
                .map(|e| match &e.value {
                    Some(value) => format!("{} = {value}", e.column),
                    None => e.column.clone(),
                })
                .collect::<Vec<_>>()
                .join(", ")
        };
        if !self.columns.is_empty() {
            let label = match self.verb {
                Verb::Update => "setting",
                Verb::Delete => "where",
                Verb::Procedure => "with parameters",
                Verb::Select | Verb::Insert => "with columns",
            };
            write!(f, " {label} {}", list(&self.columns))?;
        }
        if !self.filters.is_empty() {
            write!(f, " where {}", list(&self.filters))?;
        }
        Ok(())
    }
}

/// A pattern with its statement templates compiled.
pub(crate) struct CompiledPattern<'a> {
    pattern: &'a StatementPattern,
    statement: Regex,
    verb: Regex,
}

impl CompiledPattern<'_> {
    /// Phase one: does the text have the verb and table of the pattern.
    pub(crate) fn matches_statement(&self, invocation: &Invocation) -> bool {
        match self.statement.captures(invocation.text()) {
            None => false,
            Some(caps) if self.pattern.verb == Verb::Procedure => {
                caps.name("exec").is_some() || invocation.kind() == CommandKind::StoredProcedure
            }
            Some(_) => true,
        }
    }

    pub(crate) fn has_verb(&self, invocation: &Invocation) -> bool {
        self.verb.is_match(invocation.text())
    }

    /// Phase two: check every column and filter of the pattern against a
    /// statement that passed phase one. Returns why the statement was
    /// rejected.
    pub(crate) fn check(&self, invocation: &Invocation) -> std::result::Result<(), String> {
        let text = invocation.text();
        let Some(caps) = self.statement.captures(text) else {
            return Err(format!(
                "the statement is not {} `{}`",
                article(self.pattern.verb),
                self.pattern.table
            ));
        };
        for expectation in &self.pattern.columns {
            match self.pattern.verb {
                Verb::Select => check_selected(&caps, expectation)?,
                Verb::Insert => check_inserted(invocation, &caps, expectation)?,
                Verb::Update => check_clause(invocation, &caps, "set", expectation, true)?,
                Verb::Delete => check_clause(invocation, &caps, "where", expectation, false)?,
                Verb::Procedure => check_parameter(invocation, expectation)?,
            }
        }
        for expectation in &self.pattern.filters {
            match self.pattern.verb {
                Verb::Insert => {
                    return Err("an insert statement has no WHERE clause".to_string());
                }
                Verb::Procedure => check_parameter(invocation, expectation)?,
                _ => check_clause(invocation, &caps, "where", expectation, false)?,
            }
        }
        Ok(())
    }

    pub(crate) fn is_full_match(&self, invocation: &Invocation) -> bool {
        self.matches_statement(invocation) && self.check(invocation).is_ok()
    }
}

fn article(verb: Verb) -> String {
    match verb {
        Verb::Insert => "an Insert into".to_string(),
        Verb::Select => "a Select from".to_string(),
        Verb::Procedure => "a call of".to_string(),
        verb => format!("a {verb} of"),
    }
}

fn check_selected(caps: &Captures<'_>, expectation: &Expectation) -> std::result::Result<(), String> {
    let list = caps.name("list").map_or("", |m| m.as_str());
    if expectation.value.is_some() {
        return Err(format!(
            "a select list cannot bind a value to column `{}`",
            expectation.column
        ));
    }
    let star = template::compile(r"(?:^|[\s,.])\*(?:\s|,|$)").map_err(|err| err.to_string())?;
    let column = template::compile(&template::ident(&expectation.column)).map_err(|err| err.to_string())?;
    if star.is_match(list) || column.is_match(list) {
        Ok(())
    } else {
        Err(format!(
            "column `{}` is missing from the select list `{}`",
            expectation.column,
            list.trim()
        ))
    }
}

fn check_inserted(
    invocation: &Invocation,
    caps: &Captures<'_>,
    expectation: &Expectation,
) -> std::result::Result<(), String> {
    let Some(columns) = caps.name("columns") else {
        return Err("the insert statement has no column list".to_string());
    };
    let position = template::split_list(columns.as_str())
        .iter()
        .position(|(_, c)| {
            template::unquote(c).eq_ignore_ascii_case(template::unquote(&expectation.column))
        });
    let Some(position) = position else {
        return Err(format!(
            "column `{}` is missing from the column list ({})",
            expectation.column,
            columns.as_str().trim()
        ));
    };
    let Some(values) = caps.name("values") else {
        return match expectation.value {
            Some(_) => Err("the insert statement has no VALUES list".to_string()),
            None => Ok(()),
        };
    };
    // Only the first row of a multi-row VALUES is checked.
    let Some((row_offset, row)) = template::leading_group(values.as_str()) else {
        return Err("the VALUES list is not closed".to_string());
    };
    let Some((offset, operand)) = template::split_list(row).get(position).copied() else {
        return Err(format!(
            "the VALUES list has no entry for column `{}`",
            expectation.column
        ));
    };
    check_operand(invocation, values.start() + row_offset + offset, operand, expectation)
}

fn check_clause(
    invocation: &Invocation,
    caps: &Captures<'_>,
    clause: &str,
    expectation: &Expectation,
    assignment: bool,
) -> std::result::Result<(), String> {
    let label = if assignment { "SET" } else { "WHERE" };
    let Some(body) = caps.name(clause) else {
        return Err(format!(
            "the statement has no {label} clause for column `{}`",
            expectation.column
        ));
    };
    let source = if assignment {
        template::assignment(&expectation.column)
    } else {
        template::equality(&expectation.column)
    };
    let re = template::compile(&source).map_err(|err| err.to_string())?;
    let Some(found) = re.captures(body.as_str()) else {
        return Err(format!(
            "column `{}` is missing from the {label} clause `{}`",
            expectation.column,
            body.as_str().trim()
        ));
    };
    if found.name("null").is_some() {
        return match &expectation.value {
            None | Some(Value::Null) => Ok(()),
            Some(value) => Err(format!(
                "column `{}` is compared with NULL, expected {value}",
                expectation.column
            )),
        };
    }
    match found.name("rhs") {
        Some(rhs) => check_operand(
            invocation,
            body.start() + rhs.start(),
            rhs.as_str(),
            expectation,
        ),
        None => Ok(()),
    }
}

fn check_parameter(invocation: &Invocation, expectation: &Expectation) -> std::result::Result<(), String> {
    let actual = invocation
        .parameter(&expectation.column)
        .map_err(|err| format!("{err} on the procedure call"))?;
    compare(&expectation.column, &expectation.value, actual)
}

/// Resolve the operand bound to a column and compare it with the expected
/// value. A named or positional marker must be bound in the invocation's
/// parameter snapshot.
fn check_operand(
    invocation: &Invocation,
    offset: usize,
    operand: &str,
    expectation: &Expectation,
) -> std::result::Result<(), String> {
    let marker = template::compile(&format!("^{}$", template::PARAM_TOKEN)).map_err(|err| err.to_string())?;
    if !marker.is_match(operand) {
        return match &expectation.value {
            None => Ok(()),
            Some(value) if operand.eq_ignore_ascii_case(&value.to_sql_literal()) => Ok(()),
            Some(value) => Err(format!(
                "column `{}` is set to {operand}, expected {}",
                expectation.column,
                value.to_sql_literal()
            )),
        };
    }
    let actual = if operand == "?" {
        let ordinal = marker_ordinal(invocation.text(), offset);
        invocation
            .parameters()
            .get_at(ordinal)
            .map(|p| &p.value)
            .map_err(|_| {
                format!(
                    "no positional parameter {} is bound for column `{}`",
                    ordinal + 1,
                    expectation.column
                )
            })?
    } else {
        invocation.parameter(operand).map_err(|_| {
            format!(
                "parameter `{operand}` for column `{}` is not bound",
                expectation.column
            )
        })?
    };
    compare(&expectation.column, &expectation.value, actual)
}

fn compare(column: &str, expected: &Option<Value>, actual: &Value) -> std::result::Result<(), String> {
    match expected {
        Some(expected) if expected != actual => Err(format!(
            "parameter for column `{column}` is {actual}, expected {expected}"
        )),
        _ => Ok(()),
    }
}

/// Index of the bare `?` marker starting at `offset` among all bare markers.
fn marker_ordinal(text: &str, offset: usize) -> usize {
    let mut in_string = false;
    let mut ordinal = 0;
    let bytes = text.as_bytes();
    for (i, &byte) in bytes.iter().enumerate().take(offset) {
        match byte {
            b'\'' => in_string = !in_string,
            b'?' if !in_string && !bytes.get(i + 1).is_some_and(u8::is_ascii_digit) => ordinal += 1,
            _ => {}
        }
    }
    ordinal
}
