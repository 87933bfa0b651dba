use std::fmt;

#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    #[error("no queued responder left for `{0}`; queue one more responder in the test setup")]
    QueueExhausted(String),
    #[error("cannot deduce result set metadata: no column names and no rows were supplied")]
    UndeducibleMetadata,
    #[error("unknown property `{path}` on shape `{shape}`")]
    UnknownProperty { shape: String, path: String },
    #[error("row {row} has {actual} cells but the result set declares {expected} columns")]
    RowWidthMismatch {
        row: usize,
        expected: usize,
        actual: usize,
    },
    #[error("{names} column names supplied for rows of width {width}")]
    ColumnCountMismatch { names: usize, width: usize },
    #[error("invalid parameter batch: {0}")]
    InvalidParameterBatch(String),
    #[error("parameter `{0}` not found")]
    ParameterNotFound(String),
    #[error("parameter name `{0}` matches more than one parameter")]
    AmbiguousParameter(String),
    #[error("parameter index {index} out of bounds (collection has {len} parameters)")]
    ParameterIndexOutOfBounds { index: usize, len: usize },
    #[error("column `{0}` not found")]
    ColumnNotFound(String),
    #[error("Conversion failure: `{0}`")]
    ConversionFailure(String),
    #[error("{0}")]
    Misuse(String),
    #[error("{0}")]
    Database(String),
    #[error(transparent)]
    Assertion(Box<AssertionFailure>),
}

impl Error {
    /// True for failures raised by the verification engine.
    pub fn is_assertion(&self) -> bool {
        matches!(self, Error::Assertion(_))
    }
}

impl From<AssertionFailure> for Error {
    fn from(value: AssertionFailure) -> Self {
        Error::Assertion(Box::new(value))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// A failed ledger assertion.
///
/// Carries enough context to diagnose the failure from the message alone:
/// what was expected, why the closest candidate was rejected and what the
/// connection actually executed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssertionFailure {
    pub expected: String,
    pub reason: String,
    pub closest: Option<String>,
    pub executed: Vec<String>,
    pub message: Option<String>,
}

impl AssertionFailure {
    pub fn new(expected: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            expected: expected.into(),
            reason: reason.into(),
            closest: None,
            executed: Vec::new(),
            message: None,
        }
    }

    pub fn with_closest(mut self, closest: Option<String>) -> Self {
        self.closest = closest;
        self
    }

    pub fn with_executed(mut self, executed: Vec<String>) -> Self {
        self.executed = executed;
        self
    }

    pub fn with_message(mut self, message: Option<String>) -> Self {
        self.message = message;
        self
    }
}

impl fmt::Display for AssertionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(message) = &self.message {
            write!(f, "{message}: ")?;
        }
        write!(f, "expected {}, but {}", self.expected, self.reason)?;
        if let Some(closest) = &self.closest {
            write!(f, "\n  closest statement: {closest}")?;
        }
        if self.executed.is_empty() {
            write!(f, "\n  no statements were executed")?;
        } else {
            write!(f, "\n  executed statements:")?;
            for (i, text) in self.executed.iter().enumerate() {
                write!(f, "\n    [{i}] {text}")?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for AssertionFailure {}
