//! Defines the error types for the validation module.
use crate::type_system::{PossibleValuesError, ValueTypeError};
use thiserror::Error;

/// A declaration that cannot become a variable.
///
/// Each variant names the variable it concerns, so a batch of errors can be
/// reported to the declaration authors as-is.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DefinitionError {
    #[error("Variable '{variable}': missing attribute '{attribute}'")]
    MissingAttribute { variable: String, attribute: &'static str },
    #[error("Variable '{variable}': {source}")]
    InvalidValueType { variable: String, source: ValueTypeError },
    #[error("Variable '{variable}': invalid possible_values: {source}")]
    InvalidPossibleValues { variable: String, source: PossibleValuesError },
    #[error("Variable '{variable}': invalid default_value: {reason}")]
    InvalidDefaultValue { variable: String, reason: String },
    #[error("Variable '{variable}': invalid attribute '{attribute}': {reason}")]
    InvalidAttribute { variable: String, attribute: String, reason: String },
    #[error("Variable '{variable}': unknown entity '{entity}'")]
    UnknownEntity { variable: String, entity: String },
    #[error("Variable '{variable}': entity '{entity}' has no role '{role}'")]
    UnknownRole { variable: String, entity: String, role: String },
    #[error("Variable '{variable}': unknown {attribute} strategy '{strategy}'")]
    UnknownStrategy { variable: String, attribute: &'static str, strategy: String },
    #[error("Variable '{variable}': unexpected attributes {}", .attributes.join(", "))]
    UnexpectedAttributes { variable: String, attributes: Vec<String> },
    #[error("Variable '{variable}': invalid formula '{attribute}': {reason}")]
    InvalidFormula { variable: String, attribute: String, reason: String },
    #[error("Variable '{0}' is already defined")]
    DuplicateVariable(String),
}

impl DefinitionError {
    pub fn variable(&self) -> &str {
        match self {
            DefinitionError::MissingAttribute { variable, .. }
            | DefinitionError::InvalidValueType { variable, .. }
            | DefinitionError::InvalidPossibleValues { variable, .. }
            | DefinitionError::InvalidDefaultValue { variable, .. }
            | DefinitionError::InvalidAttribute { variable, .. }
            | DefinitionError::UnknownEntity { variable, .. }
            | DefinitionError::UnknownRole { variable, .. }
            | DefinitionError::UnknownStrategy { variable, .. }
            | DefinitionError::UnexpectedAttributes { variable, .. }
            | DefinitionError::InvalidFormula { variable, .. } => variable,
            DefinitionError::DuplicateVariable(variable) => variable,
        }
    }
}
