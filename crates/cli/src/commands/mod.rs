//! Command implementations.

mod run;
mod validate;

pub use run::run;
pub use validate::run_validate;
