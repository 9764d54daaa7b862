//! Human and machine readable renderings of the model and of computations.
pub mod description;
pub mod trace;

pub use description::VariableDescription;
pub use trace::format_log;
