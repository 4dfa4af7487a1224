//! Query construction for the backend's resource list endpoints.
//!
//! List requests encode `fields`, `filters`, and `or_filters` as
//! JSON-stringified arrays in the query string, while paging and ordering
//! parameters stay plain. [`ListQuery`] assembles the pairs; the HTTP
//! layer percent-encodes them.

use serde_json::{json, Value};

/// A single filter tuple. The backend accepts both the four-element form
/// (`[doctype, field, op, value]`) and the three-element form scoped to
/// the listed doctype.
pub(crate) fn filter(doctype: &str, field: &str, op: &str, value: impl Into<Value>) -> Value {
    json!([doctype, field, op, value.into()])
}

pub(crate) fn filter3(field: &str, op: &str, value: impl Into<Value>) -> Value {
    json!([field, op, value.into()])
}

/// Builder for `GET /api/resource/<Doctype>` query parameters.
#[derive(Debug, Default, Clone)]
pub(crate) struct ListQuery {
    fields: Vec<String>,
    filters: Vec<Value>,
    or_filters: Vec<Value>,
    page_length: Option<u32>,
    limit_start: Option<u32>,
    order_by: Option<String>,
}

impl ListQuery {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn fields(mut self, fields: &[&str]) -> Self {
        self.fields = fields.iter().map(|f| f.to_string()).collect();
        self
    }

    pub(crate) fn filter(mut self, f: Value) -> Self {
        self.filters.push(f);
        self
    }

    pub(crate) fn or_filter(mut self, f: Value) -> Self {
        self.or_filters.push(f);
        self
    }

    pub(crate) fn page_length(mut self, n: u32) -> Self {
        self.page_length = Some(n);
        self
    }

    pub(crate) fn limit_start(mut self, n: u32) -> Self {
        self.limit_start = Some(n);
        self
    }

    pub(crate) fn order_by(mut self, expr: &str) -> Self {
        self.order_by = Some(expr.to_string());
        self
    }

    /// Query pairs ready for the HTTP layer. Empty collections are
    /// omitted entirely rather than sent as `[]`.
    pub(crate) fn to_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        if !self.fields.is_empty() {
            pairs.push(("fields".to_string(), json_string(&self.fields)));
        }
        if !self.filters.is_empty() {
            pairs.push(("filters".to_string(), json_string(&self.filters)));
        }
        if !self.or_filters.is_empty() {
            pairs.push(("or_filters".to_string(), json_string(&self.or_filters)));
        }
        if let Some(n) = self.page_length {
            pairs.push(("page_length".to_string(), n.to_string()));
        }
        if let Some(n) = self.limit_start {
            pairs.push(("limit_start".to_string(), n.to_string()));
        }
        if let Some(ref expr) = self.order_by {
            pairs.push(("order_by".to_string(), expr.clone()));
        }
        pairs
    }
}

fn json_string<T: serde::Serialize>(value: &T) -> String {
    // Vec<String> / Vec<Value> serialization cannot fail.
    serde_json::to_string(value).unwrap_or_else(|_| "[]".to_string())
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fields_and_filters_are_json_encoded() {
        let pairs = ListQuery::new()
            .fields(&["name", "customer_name"])
            .filter(filter("Customer", "customer_name", "like", "%acme%"))
            .page_length(20)
            .limit_start(0)
            .to_pairs();

        assert_eq!(
            pairs,
            vec![
                (
                    "fields".to_string(),
                    r#"["name","customer_name"]"#.to_string()
                ),
                (
                    "filters".to_string(),
                    r#"[["Customer","customer_name","like","%acme%"]]"#.to_string()
                ),
                ("page_length".to_string(), "20".to_string()),
                ("limit_start".to_string(), "0".to_string()),
            ]
        );
    }

    #[test]
    fn empty_collections_are_omitted() {
        let pairs = ListQuery::new().page_length(1).to_pairs();
        assert_eq!(pairs, vec![("page_length".to_string(), "1".to_string())]);
    }

    #[test]
    fn or_filters_and_order_by() {
        let pairs = ListQuery::new()
            .or_filter(filter("Item", "item_name", "like", "%tea%"))
            .or_filter(filter("Item", "item_code", "like", "%tea%"))
            .order_by("creation desc")
            .to_pairs();

        assert_eq!(pairs[0].0, "or_filters");
        assert!(pairs[0].1.contains(r#"["Item","item_name","like","%tea%"]"#));
        assert!(pairs[0].1.contains(r#"["Item","item_code","like","%tea%"]"#));
        assert_eq!(
            pairs[1],
            ("order_by".to_string(), "creation desc".to_string())
        );
    }

    #[test]
    fn three_element_filters_keep_their_shape() {
        let pairs = ListQuery::new()
            .filter(filter3("warehouse", "=", "Stores - C"))
            .to_pairs();
        assert_eq!(
            pairs[0].1,
            r#"[["warehouse","=","Stores - C"]]"#.to_string()
        );
    }

    #[test]
    fn numeric_and_list_filter_values() {
        let codes = serde_json::json!(["ITM-001", "ITM-002"]);
        let pairs = ListQuery::new()
            .filter(filter("Item Price", "selling", "=", 1))
            .filter(filter("Item Price", "item_code", "in", codes))
            .to_pairs();
        assert_eq!(
            pairs[0].1,
            r#"[["Item Price","selling","=",1],["Item Price","item_code","in",["ITM-001","ITM-002"]]]"#
        );
    }
}
