//! Constraint matching: a single rule against a record, and a query's rule set
//! against a batch of records.

pub mod constraint;
pub mod filter;

pub use constraint::{evaluate, normalize};
pub use filter::filter;
