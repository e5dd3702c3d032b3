//! Output criteria: rules deciding whether a step attempt passed

mod criterion;
mod evaluator;

pub use criterion::Criterion;
pub use evaluator::{evaluate, CriteriaOutcome};
