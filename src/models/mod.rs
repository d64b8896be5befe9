pub mod query;
pub mod record;

pub use query::{Constraint, Query, Relation};
pub use record::{Record, DEFAULT_LANGUAGE};
