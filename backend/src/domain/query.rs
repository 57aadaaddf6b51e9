//! Collection Queries
//!
//! Which collection a subscription watches and how its snapshots are sorted.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::document::{CollectionPath, Document};

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

/// What to sort on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortKey {
    /// A top-level field value
    Field(String),
    /// The server-assigned creation time
    CreatedAt,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBy {
    pub key: SortKey,
    pub direction: Direction,
}

/// A subscription target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    pub collection: CollectionPath,
    pub order_by: Option<OrderBy>,
}

impl Query {
    /// Whole collection, in store order (creation order)
    pub fn collection(collection: impl Into<CollectionPath>) -> Self {
        Self {
            collection: collection.into(),
            order_by: None,
        }
    }

    pub fn order_by_field(mut self, field: &str, direction: Direction) -> Self {
        self.order_by = Some(OrderBy {
            key: SortKey::Field(field.to_string()),
            direction,
        });
        self
    }

    /// Newest records first
    pub fn newest_first(mut self) -> Self {
        self.order_by = Some(OrderBy {
            key: SortKey::CreatedAt,
            direction: Direction::Desc,
        });
        self
    }

    /// Sort a snapshot in place.
    ///
    /// Records missing the ordered field sort after all others regardless
    /// of direction; ties break by creation time, then id.
    pub fn sort(&self, docs: &mut [Document]) {
        let Some(order) = &self.order_by else {
            return;
        };
        docs.sort_by(|a, b| {
            let primary = match &order.key {
                SortKey::CreatedAt => {
                    directed(a.created_at.cmp(&b.created_at), order.direction)
                }
                SortKey::Field(field) => match (a.get(field), b.get(field)) {
                    (Some(x), Some(y)) => directed(compare_values(x, y), order.direction),
                    (Some(_), None) => Ordering::Less,
                    (None, Some(_)) => Ordering::Greater,
                    (None, None) => Ordering::Equal,
                },
            };
            primary
                .then_with(|| a.created_at.cmp(&b.created_at))
                .then_with(|| a.id.cmp(&b.id))
        });
    }
}

fn directed(ordering: Ordering, direction: Direction) -> Ordering {
    match direction {
        Direction::Asc => ordering,
        Direction::Desc => ordering.reverse(),
    }
}

/// Total order over JSON values: null < bool < number < string < other
fn compare_values(a: &Value, b: &Value) -> Ordering {
    fn rank(value: &Value) -> u8 {
        match value {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Number(_) => 2,
            Value::String(_) => 3,
            Value::Array(_) => 4,
            Value::Object(_) => 5,
        }
    }

    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => {
            let x = x.as_f64().unwrap_or(0.0);
            let y = y.as_f64().unwrap_or(0.0);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::document::fields;
    use chrono::{Duration, Utc};
    use serde_json::json;

    fn doc(id: &str, value: Value, age_secs: i64) -> Document {
        let mut d = Document::new(id, fields(value));
        d.created_at = Utc::now() - Duration::seconds(age_secs);
        d
    }

    fn ids(docs: &[Document]) -> Vec<&str> {
        docs.iter().map(|d| d.id.as_str()).collect()
    }

    #[test]
    fn test_sort_by_numeric_field() {
        let mut docs = vec![
            doc("c", json!({"order": 2}), 0),
            doc("a", json!({"order": 0}), 0),
            doc("x", json!({}), 0),
            doc("b", json!({"order": 1}), 0),
        ];
        Query::collection("payouts")
            .order_by_field("order", Direction::Asc)
            .sort(&mut docs);
        assert_eq!(ids(&docs), vec!["a", "b", "c", "x"]);
    }

    #[test]
    fn test_newest_first() {
        let mut docs = vec![doc("old", json!({}), 30), doc("new", json!({}), 1)];
        Query::collection("clients").newest_first().sort(&mut docs);
        assert_eq!(ids(&docs), vec!["new", "old"]);
    }

    #[test]
    fn test_unordered_query_keeps_store_order() {
        let mut docs = vec![doc("b", json!({}), 0), doc("a", json!({}), 10)];
        Query::collection("projects").sort(&mut docs);
        assert_eq!(ids(&docs), vec!["b", "a"]);
    }
}
