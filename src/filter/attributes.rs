//! Typed attribute constraints extracted from (or supplied with) a query

use serde::{Deserialize, Deserializer, Serialize};

/// Optional constraints over book attributes.
///
/// Every field is tagged-presence: `None` / empty means "no constraint", never
/// "match zero". Absent fields are skipped on serialization so cached values
/// and the `used_filter` echo only carry asserted constraints.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttributeFilter {
    /// Partial match on the title
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Partial match on the description summary
    #[serde(
        default,
        rename = "description_summary",
        alias = "description",
        skip_serializing_if = "Option::is_none"
    )]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_min: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_max: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating_min: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating_max: Option<f64>,

    #[serde(
        default,
        deserialize_with = "whole_count",
        skip_serializing_if = "Option::is_none"
    )]
    pub rating_count_min: Option<u64>,

    #[serde(
        default,
        deserialize_with = "whole_count",
        skip_serializing_if = "Option::is_none"
    )]
    pub rating_count_max: Option<u64>,

    /// Every listed author must match (AND)
    #[serde(
        default,
        deserialize_with = "one_or_many",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub authors: Vec<String>,

    /// Any listed category may match (OR within the field)
    #[serde(
        default,
        deserialize_with = "one_or_many",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub categories: Vec<String>,
}

impl AttributeFilter {
    /// True when no field constrains anything
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.price_min.is_none()
            && self.price_max.is_none()
            && self.rating_min.is_none()
            && self.rating_max.is_none()
            && self.rating_count_min.is_none()
            && self.rating_count_max.is_none()
            && self.authors.is_empty()
            && self.categories.is_empty()
    }

    /// Drop blank strings, blank list entries and non-finite numbers so that
    /// only real assertions remain
    pub fn pruned(mut self) -> Self {
        self.title = non_blank(self.title);
        self.description = non_blank(self.description);
        self.price_min = self.price_min.filter(|v| v.is_finite());
        self.price_max = self.price_max.filter(|v| v.is_finite());
        self.rating_min = self.rating_min.filter(|v| v.is_finite());
        self.rating_max = self.rating_max.filter(|v| v.is_finite());
        self.authors = prune_list(self.authors);
        self.categories = prune_list(self.categories);
        self
    }

    /// Overwrite fields with every value `other` asserts.
    ///
    /// Fields `other` leaves absent keep their current value.
    pub fn merge_from(&mut self, other: &AttributeFilter) {
        if other.title.is_some() {
            self.title = other.title.clone();
        }
        if other.description.is_some() {
            self.description = other.description.clone();
        }
        if other.price_min.is_some() {
            self.price_min = other.price_min;
        }
        if other.price_max.is_some() {
            self.price_max = other.price_max;
        }
        if other.rating_min.is_some() {
            self.rating_min = other.rating_min;
        }
        if other.rating_max.is_some() {
            self.rating_max = other.rating_max;
        }
        if other.rating_count_min.is_some() {
            self.rating_count_min = other.rating_count_min;
        }
        if other.rating_count_max.is_some() {
            self.rating_count_max = other.rating_count_max;
        }
        if !other.authors.is_empty() {
            self.authors = other.authors.clone();
        }
        if !other.categories.is_empty() {
            self.categories = other.categories.clone();
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn prune_list(values: Vec<String>) -> Vec<String> {
    values
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Accept `null`, a single string, or a list of strings
fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match Option::<OneOrMany>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(OneOrMany::One(s)) => vec![s],
        Some(OneOrMany::Many(v)) => v,
    })
}

/// Accept `null` or any non-negative integral number, including `1000.0`.
/// Fractional or negative counts are dropped as unasserted.
fn whole_count<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Count {
        Whole(u64),
        Signed(i64),
        Float(f64),
    }

    Ok(match Option::<Count>::deserialize(deserializer)? {
        None | Some(Count::Signed(_)) => None,
        Some(Count::Whole(n)) => Some(n),
        Some(Count::Float(f)) => {
            let whole = f.is_finite() && f >= 0.0 && f.fract() == 0.0 && f <= u64::MAX as f64;
            whole.then_some(f as u64)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_empty() {
        assert!(AttributeFilter::default().is_empty());
        assert_eq!(serde_json::to_string(&AttributeFilter::default()).unwrap(), "{}");
    }

    #[test]
    fn test_null_and_scalar_lists() {
        let filter: AttributeFilter = serde_json::from_str(
            r#"{"authors": "J.K. Rowling", "categories": null, "price_max": 10.0, "rating_min": null}"#,
        )
        .unwrap();

        assert_eq!(filter.authors, vec!["J.K. Rowling"]);
        assert!(filter.categories.is_empty());
        assert_eq!(filter.price_max, Some(10.0));
        assert_eq!(filter.rating_min, None);
    }

    #[test]
    fn test_integral_float_counts() {
        let filter: AttributeFilter = serde_json::from_str(
            r#"{"rating_count_min": 1000.0, "rating_count_max": 2.5}"#,
        )
        .unwrap();
        assert_eq!(filter.rating_count_min, Some(1000));
        assert_eq!(filter.rating_count_max, None);

        let negative: AttributeFilter =
            serde_json::from_str(r#"{"rating_count_min": -5, "rating_count_max": null}"#).unwrap();
        assert!(negative.is_empty());
    }

    #[test]
    fn test_description_wire_name() {
        let filter = AttributeFilter {
            description: Some("dragons".to_string()),
            ..Default::default()
        };
        let json = serde_json::to_value(&filter).unwrap();
        assert_eq!(json["description_summary"], "dragons");

        let back: AttributeFilter = serde_json::from_value(json).unwrap();
        assert_eq!(back, filter);
    }

    #[test]
    fn test_pruned_drops_blanks() {
        let filter = AttributeFilter {
            title: Some("   ".to_string()),
            authors: vec!["".to_string(), " Tolkien ".to_string()],
            price_min: Some(f64::NAN),
            ..Default::default()
        }
        .pruned();

        assert_eq!(filter.title, None);
        assert_eq!(filter.price_min, None);
        assert_eq!(filter.authors, vec!["Tolkien"]);
    }

    #[test]
    fn test_merge_only_overwrites_asserted_fields() {
        let mut base = AttributeFilter {
            title: Some("Hobbit".to_string()),
            price_max: Some(20.0),
            categories: vec!["Fantasy".to_string()],
            ..Default::default()
        };
        let extracted = AttributeFilter {
            price_max: Some(10.0),
            authors: vec!["J.R.R. Tolkien".to_string()],
            ..Default::default()
        };

        base.merge_from(&extracted);

        assert_eq!(base.title.as_deref(), Some("Hobbit"));
        assert_eq!(base.price_max, Some(10.0));
        assert_eq!(base.authors, vec!["J.R.R. Tolkien"]);
        assert_eq!(base.categories, vec!["Fantasy"]);
    }
}
