//! Defines the error types for the type system module.
use super::value_type::ValueType;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValueTypeError {
    #[error("Unknown value type '{0}'")]
    UnknownValueType(String),
    #[error("Expected a {expected} value, found {found}")]
    Mismatch { expected: ValueType, found: String },
    #[error("String of length {len} exceeds max_length {max}")]
    TooLong { max: usize, len: usize },
    #[error("Invalid date '{0}', expected YYYY-MM-DD")]
    InvalidDate(String),
    #[error(transparent)]
    PossibleValues(#[from] PossibleValuesError),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PossibleValuesError {
    #[error("An enumeration needs at least one variant")]
    Empty,
    #[error("Variant '{0}' is declared more than once")]
    DuplicateVariant(String),
    #[error("Variant keys cannot be empty")]
    EmptyKey,
    #[error("'{0}' is not one of the possible values")]
    NotAMember(String),
    #[error("Variant index {0} is out of range")]
    OutOfRange(usize),
    #[error("Cannot read possible values: {0}")]
    Malformed(String),
}
