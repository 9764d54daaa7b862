//! Batch validation of a set of declarations.
use super::compiler::{duplicate_names, Compiler};
use super::declaration::Declaration;
use super::error::DefinitionError;
use crate::store::{EntityRegistry, Variable};

/// Compiles a whole batch of declarations, collecting every failure.
///
/// Like a linter, it does not stop at the first broken declaration: each one
/// is compiled on its own and all errors are returned together, along with
/// any name declared more than once.
pub struct Validator<'a> {
    compiler: Compiler<'a>,
}

impl<'a> Validator<'a> {
    pub fn new(entities: &'a EntityRegistry) -> Self {
        Self { compiler: Compiler::new(entities) }
    }

    /// # Returns
    /// - `Ok(variables)` in declaration order when every declaration compiles.
    /// - `Err(errors)` with one entry per failing declaration, then one per duplicated name.
    pub fn validate(&self, declarations: &[Declaration]) -> Result<Vec<Variable>, Vec<DefinitionError>> {
        let mut variables = Vec::with_capacity(declarations.len());
        let mut errors = Vec::new();

        for declaration in declarations {
            match self.compiler.compile(declaration) {
                Ok(variable) => variables.push(variable),
                Err(err) => errors.push(err),
            }
        }
        errors.extend(duplicate_names(declarations).into_iter().map(DefinitionError::DuplicateVariable));

        if errors.is_empty() {
            Ok(variables)
        } else {
            tracing::warn!(count = errors.len(), "rejected variable declarations");
            Err(errors)
        }
    }
}
