//! Attribute filters and their compilation into vector-engine predicates
//!
//! An [`AttributeFilter`] is the typed record of optional constraints a search
//! may carry. [`build_predicate`] turns it into the engine's native boolean
//! filter, or `None` when nothing is constrained.

mod attributes;
mod predicate;

pub use attributes::AttributeFilter;
pub use predicate::{build_predicate, fields, Condition, Match, Predicate, RangeBounds};
