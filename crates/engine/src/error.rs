use thiserror::Error;

use crate::path::FieldPath;

/// Malformed path text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    #[error("empty path")]
    Empty,
    #[error("path '{0}' has an empty segment")]
    EmptySegment(String),
    #[error("bad index segment '{0}'")]
    BadIndex(String),
}

/// Reason a rule's compute step produced no value.
///
/// Never escapes the engine: the rule falls back to its default value.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ComputeError {
    /// Regression inputs were degenerate (too few points, zero variance).
    #[error("degenerate regression input")]
    Degenerate,
    /// A required input was missing or not numeric.
    #[error("missing input at {0}")]
    MissingInput(FieldPath),
}

/// Errors raised while building or checking a rule set.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuleSetError {
    /// Two rules write the same target path.
    #[error("duplicate rule target: {0}")]
    DuplicateTarget(FieldPath),
    /// A grid section does not have one column per survey.
    #[error("section '{section}' row {row:?}: expected {expected} survey column(s), found {found}")]
    ShapeMismatch {
        section: &'static str,
        row: Option<usize>,
        expected: usize,
        found: usize,
    },
    /// A row section does not have one row per factor.
    #[error("section '{section}': expected {expected} row(s), found {found}")]
    RowCountMismatch {
        section: &'static str,
        expected: usize,
        found: usize,
    },
}

/// Errors raised by structural worksheet operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorksheetError {
    /// Template rows cannot be removed.
    #[error("row {0} comes from the template and cannot be removed")]
    LockedRow(usize),
    #[error("row {index} out of range (rows: {len})")]
    RowOutOfRange { index: usize, len: usize },
    #[error("survey {index} out of range (surveys: {len})")]
    SurveyOutOfRange { index: usize, len: usize },
    #[error("survey '{0}' is already part of the worksheet")]
    DuplicateSurvey(String),
}
