//! Static checking of variable declarations.
//!
//! Declarations arrive as loose attribute bags. The `Compiler` turns one into
//! a `Variable` or reports the first rule it breaks, and the `Validator` does
//! the same for a whole batch while collecting every error.
pub mod compiler;
pub mod declaration;
pub mod error;
pub(crate) mod rules;
pub mod validator;

pub use compiler::Compiler;
pub use declaration::{Attribute, Declaration, FORMULA_PREFIX};
pub use error::DefinitionError;
pub use validator::Validator;
