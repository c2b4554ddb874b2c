//! Compilation of attribute filters into the vector engine's filter language

use super::AttributeFilter;
use serde::Serialize;

/// Payload keys the predicate conditions refer to
pub mod fields {
    pub const TITLE: &str = "title";
    pub const DESCRIPTION: &str = "description_summary";
    pub const PRICE: &str = "price";
    pub const RATING: &str = "rating";
    pub const RATING_COUNT: &str = "rating_count";
    pub const AUTHORS: &str = "authors";
    pub const CATEGORIES: &str = "categories";
}

/// Conjunction of field conditions, serialized as `{"must": [...]}`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Predicate {
    pub must: Vec<Condition>,
}

/// A single condition on one payload field
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Condition {
    Match {
        key: &'static str,
        #[serde(rename = "match")]
        matcher: Match,
    },
    Range {
        key: &'static str,
        range: RangeBounds,
    },
}

impl Condition {
    pub fn key(&self) -> &'static str {
        match self {
            Condition::Match { key, .. } | Condition::Range { key, .. } => key,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Match {
    /// Full-text / phrase match
    Text { text: String },
    /// Value equals any of the listed values
    Any { any: Vec<String> },
}

/// Inclusive bounds; only the supplied ones are emitted
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RangeBounds {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gte: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lte: Option<f64>,
}

impl RangeBounds {
    fn new(gte: Option<f64>, lte: Option<f64>) -> Option<Self> {
        if gte.is_none() && lte.is_none() {
            None
        } else {
            Some(Self { gte, lte })
        }
    }

    pub fn contains(&self, value: f64) -> bool {
        self.gte.map_or(true, |min| value >= min) && self.lte.map_or(true, |max| value <= max)
    }
}

/// Build the engine-native predicate for a filter.
///
/// Returns `None` when the filter constrains nothing, which callers must treat
/// as "search the whole collection". Contradictory ranges (min > max) are
/// passed through as-is and simply match nothing.
pub fn build_predicate(filter: &AttributeFilter) -> Option<Predicate> {
    let mut must = Vec::new();

    if let Some(title) = &filter.title {
        must.push(text(fields::TITLE, title));
    }
    if let Some(description) = &filter.description {
        must.push(text(fields::DESCRIPTION, description));
    }

    let ranges = [
        (fields::PRICE, filter.price_min, filter.price_max),
        (fields::RATING, filter.rating_min, filter.rating_max),
        (
            fields::RATING_COUNT,
            filter.rating_count_min.map(|v| v as f64),
            filter.rating_count_max.map(|v| v as f64),
        ),
    ];
    for (key, min, max) in ranges {
        if let Some(range) = RangeBounds::new(min, max) {
            must.push(Condition::Range { key, range });
        }
    }

    // Each author is its own condition: the book must mention all of them
    for author in &filter.authors {
        must.push(text(fields::AUTHORS, author));
    }

    if !filter.categories.is_empty() {
        must.push(Condition::Match {
            key: fields::CATEGORIES,
            matcher: Match::Any {
                any: filter.categories.clone(),
            },
        });
    }

    if must.is_empty() {
        None
    } else {
        Some(Predicate { must })
    }
}

fn text(key: &'static str, value: &str) -> Condition {
    Condition::Match {
        key,
        matcher: Match::Text {
            text: value.to_string(),
        },
    }
}
