//! The value type registry and the enum (possible values) validator.
//!
//! Every variable holds values of one `ValueType` from a closed catalog, so
//! that any compiled variable can be serialized to the same downstream format.
pub use self::error::{PossibleValuesError, ValueTypeError};
pub use self::possible_values::{PossibleValues, Variant};
pub use self::value_type::{describe, describe_named, Value, ValueType, ValueTypeDescriptor};

// --- MODULE DECLARATIONS ---
mod error;
pub mod possible_values;
pub mod value_type;
