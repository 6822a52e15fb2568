//! CLI command implementations

pub mod check;
pub mod cleanse;
pub mod validate;
