//! Regex templates for recognizing the shape of SQL statements.
//!
//! These are deliberately heuristic: a template recognizes a verb, a table
//! and the clause a column appears in, nothing more. All templates are
//! compiled case-insensitively and tolerate any whitespace between tokens.

use regex::{Regex, RegexBuilder};

use crate::{Error, Result};

/// Any identifier, bare or quoted.
const ANY_IDENT: &str = r#"(?:\[[^\]]+\]|"[^"]+"|`[^`]+`|\w+)"#;

/// A bind parameter marker: `@name`, `:name`, `$name`, `?` or `?N`.
pub(crate) const PARAM_TOKEN: &str = r"(?:[@:$]\w+|\?\d*)";

/// Right-hand side of an assignment or comparison.
const OPERAND: &str = r"(?P<rhs>[@:$]\w+|\?\d*|'(?:[^']|'')*'|[^\s,()]+)";

/// Start of a statement, at the beginning of the text or after a `;`.
const STATEMENT_START: &str = r"(?:^|;)\s*";

/// Text up to the end of the current statement. String literals may
/// contain `;`.
const BODY: &str = r"(?:[^;']|'(?:[^']|'')*')*";

/// Shortest [`BODY`] that lets the rest of the template match.
const BODY_LAZY: &str = r"(?:[^;']|'(?:[^']|'')*')*?";

pub(crate) fn compile(source: &str) -> Result<Regex> {
    RegexBuilder::new(source)
        .case_insensitive(true)
        .dot_matches_new_line(true)
        .build()
        .map_err(|err| Error::Misuse(format!("invalid statement template: {err}")))
}

/// One identifier, optionally quoted with brackets, double quotes or
/// backticks. A bare identifier must not be part of a longer word or a
/// parameter marker.
pub(crate) fn ident(name: &str) -> String {
    let name = regex::escape(unquote(name));
    format!(r#"(?:\[{name}\]|"{name}"|`{name}`|(?:^|[^\w@:$]){name}\b)"#)
}

/// A table name. An unqualified name accepts any schema qualifier; a
/// qualified name (`dbo.Widgets`) requires that schema.
pub(crate) fn table(name: &str) -> String {
    match name.rsplit_once('.') {
        Some((schema, table)) => format!(r"{}\s*\.\s*{}", quoted(schema), quoted(table)),
        None => format!(r"(?:{ANY_IDENT}\s*\.\s*)?{}", quoted(name)),
    }
}

/// Like [`ident`] but for positions that always follow whitespace, so the
/// leading boundary is implied.
fn quoted(name: &str) -> String {
    let name = regex::escape(unquote(name));
    format!(r#"(?:\[{name}\]|"{name}"|`{name}`|{name}\b)"#)
}

/// `column = <operand>`, capturing the operand as `rhs`.
pub(crate) fn assignment(column: &str) -> String {
    format!(r"{}\s*=\s*{OPERAND}", ident(column))
}

/// `column = <operand>` or `column IS NULL` in a predicate.
pub(crate) fn equality(column: &str) -> String {
    format!(
        r"{}\s*(?:=\s*{OPERAND}|IS\s+(?P<null>NULL)\b)",
        ident(column)
    )
}

pub(crate) fn select(table_name: &str) -> String {
    format!(
        r"{STATEMENT_START}SELECT\b(?P<list>{BODY_LAZY})\bFROM\b(?:{BODY_LAZY}(?:\bJOIN\b|,))?\s*{}(?:[\s,)](?:{BODY_LAZY}\bWHERE\b(?P<where>{BODY}))?|;|$)",
        table(table_name)
    )
}

pub(crate) fn insert(table_name: &str) -> String {
    format!(
        r"{STATEMENT_START}INSERT\s+(?:INTO\s+)?{}\s*(?:\((?P<columns>[^)]*)\))?\s*(?:VALUES\s*(?P<values>\({BODY}))?",
        table(table_name)
    )
}

pub(crate) fn update(table_name: &str) -> String {
    format!(
        r"{STATEMENT_START}UPDATE\s+{}\s+SET\b(?P<set>{BODY_LAZY})(?:\bWHERE\b(?P<where>{BODY}))?(?:;|$)",
        table(table_name)
    )
}

pub(crate) fn delete(table_name: &str) -> String {
    format!(
        r"{STATEMENT_START}DELETE\s+(?:FROM\s+)?{}(?:\s(?:{BODY_LAZY}\bWHERE\b(?P<where>{BODY}))?|;|$)",
        table(table_name)
    )
}

/// A stored procedure call. Text commands need an `EXEC` prefix, which the
/// caller checks through the `exec` group.
pub(crate) fn procedure(name: &str) -> String {
    format!(
        r"^\s*(?P<exec>EXEC(?:UTE)?\s+)?{}(?:\s|;|$)",
        table(name)
    )
}

/// Bare verb, used to pick the closest statement when nothing matched.
pub(crate) fn verb(verb: &str) -> String {
    format!(r"{STATEMENT_START}{}\b", regex::escape(verb))
}

/// Strip one level of identifier quoting.
pub(crate) fn unquote(name: &str) -> &str {
    let name = name.trim();
    for (open, close) in [('[', ']'), ('"', '"'), ('`', '`')] {
        if let Some(inner) = name
            .strip_prefix(open)
            .and_then(|rest| rest.strip_suffix(close))
        {
            return inner;
        }
    }
    name
}

/// Contents of the parenthesized group that opens `text`, with their byte
/// offset. Stops at the matching `)`, so a second row or statement after
/// the group is not included. `None` when the group is not closed.
pub(crate) fn leading_group(text: &str) -> Option<(usize, &str)> {
    if !text.starts_with('(') {
        return None;
    }
    let mut depth = 0usize;
    let mut in_string = false;
    for (i, c) in text.char_indices() {
        match c {
            '\'' => in_string = !in_string,
            '(' if !in_string => depth += 1,
            ')' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some((1, &text[1..i]));
                }
            }
            _ => {}
        }
    }
    None
}

/// Split a comma separated list at top level, ignoring commas inside
/// parentheses and string literals. Each item is trimmed and paired with
/// its byte offset in `list`.
pub(crate) fn split_list(list: &str) -> Vec<(usize, &str)> {
    let mut items = Vec::new();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut start = 0;
    for (i, c) in list.char_indices() {
        match c {
            '\'' => in_string = !in_string,
            '(' if !in_string => depth += 1,
            ')' if !in_string => depth = depth.saturating_sub(1),
            ',' if !in_string && depth == 0 => {
                items.push(trimmed(list, start, i));
                start = i + 1;
            }
            _ => {}
        }
    }
    let last = trimmed(list, start, list.len());
    if !last.1.is_empty() || !items.is_empty() {
        items.push(last);
    }
    items
}

fn trimmed(list: &str, start: usize, end: usize) -> (usize, &str) {
    let raw = &list[start..end];
    let leading = raw.len() - raw.trim_start().len();
    (start + leading, raw.trim())
}
