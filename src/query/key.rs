use std::fmt;

use serde::Serialize;

/// Cache key: resource name followed by the parameters that shaped the read.
///
/// Keys are compared segment by segment, so `["warehouses"]` is a prefix of
/// `["warehouses", "detail", "7"]` and invalidating it hits both.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueryKey(Vec<String>);

impl QueryKey {
    pub fn new(resource: impl Into<String>) -> Self {
        Self(vec![resource.into()])
    }

    /// Append a plain segment.
    pub fn with(mut self, segment: impl fmt::Display) -> Self {
        self.0.push(segment.to_string());
        self
    }

    /// Append a structured parameter (filters, paging) as canonical JSON.
    pub fn with_param<T: Serialize + ?Sized>(mut self, param: &T) -> Self {
        let encoded = serde_json::to_string(param).unwrap_or_else(|_| "null".to_string());
        self.0.push(encoded);
        self
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn starts_with(&self, prefix: &QueryKey) -> bool {
        self.0.starts_with(&prefix.0)
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.0.join(", "))
    }
}

impl<S: Into<String>> FromIterator<S> for QueryKey {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn prefix_matching_is_per_segment() {
        let all = QueryKey::new("warehouses");
        let detail = QueryKey::new("warehouses").with("detail").with(7);
        let other = QueryKey::new("warehouses-archive");
        assert!(detail.starts_with(&all));
        assert!(!other.starts_with(&all));
        assert!(!all.starts_with(&detail));
    }

    #[test]
    fn params_distinguish_keys() {
        let a = QueryKey::new("customers").with_param(&json!({"page": 1}));
        let b = QueryKey::new("customers").with_param(&json!({"page": 2}));
        assert_ne!(a, b);
        assert_eq!(a.to_string(), r#"[customers, {"page":1}]"#);
    }

    #[test]
    fn collects_from_segments() {
        let key: QueryKey = ["part-locations", "detail", "3"].into_iter().collect();
        assert_eq!(key, QueryKey::new("part-locations").with("detail").with(3));
    }
}
