use crate::engine::constraint::evaluate;
use crate::models::{Constraint, Record};
use crate::utils::error::Result;

/// Keep the records that satisfy at least one constraint, in input order.
///
/// An empty constraint list keeps nothing.
pub fn filter(records: Vec<Record>, constraints: &[Constraint]) -> Result<Vec<Record>> {
    let mut kept = Vec::with_capacity(records.len());

    for record in records {
        if passes_any(&record, constraints)? {
            kept.push(record);
        }
    }

    Ok(kept)
}

fn passes_any(record: &Record, constraints: &[Constraint]) -> Result<bool> {
    for constraint in constraints {
        if evaluate(record, constraint)? {
            return Ok(true);
        }
    }
    Ok(false)
}
