//! Query parsing and evaluation.

pub mod evaluator;
pub mod parser;

pub use evaluator::evaluate;
pub use parser::{CompareOp, QueryNode, parse_query};
