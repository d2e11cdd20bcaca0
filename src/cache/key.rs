/// Deterministic cache keys
///
/// A key is the logical operation name plus its normalized arguments:
/// values are trimmed and lower-cased, arguments are kept sorted by name and
/// list arguments are de-duplicated and sorted. Two logically identical
/// requests therefore always render the same key.
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey {
    operation: String,
    args: BTreeMap<String, String>,
    rendered: String,
}

impl CacheKey {
    pub fn new(operation: &str) -> Self {
        let operation = normalize(operation);
        Self {
            rendered: operation.clone(),
            operation,
            args: BTreeMap::new(),
        }
    }

    /// Add a scalar argument
    pub fn arg(mut self, name: &str, value: impl fmt::Display) -> Self {
        self.args.insert(normalize(name), normalize(&value.to_string()));
        self.render();
        self
    }

    /// Add a comma separated list argument
    pub fn list_arg(mut self, name: &str, values: &str) -> Self {
        let items = normalize_list(values);
        self.args.insert(normalize(name), items.join(","));
        self.render();
        self
    }

    pub fn get_arg(&self, name: &str) -> Option<&str> {
        self.args.get(name).map(String::as_str)
    }

    pub fn as_str(&self) -> &str {
        &self.rendered
    }

    fn render(&mut self) {
        if self.args.is_empty() {
            self.rendered = self.operation.clone();
            return;
        }
        let query: Vec<String> = self
            .args
            .iter()
            .map(|(name, value)| format!("{}={}", name, value))
            .collect();
        self.rendered = format!("{}?{}", self.operation, query.join("&"));
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.rendered)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.rendered
    }
}

fn normalize(value: &str) -> String {
    value.trim().to_lowercase()
}

/// Split on commas, trim, lower-case, drop blanks, sort and de-duplicate
pub fn normalize_list(values: &str) -> Vec<String> {
    let mut items: Vec<String> = values
        .split(',')
        .map(normalize)
        .filter(|s| !s.is_empty())
        .collect();
    items.sort();
    items.dedup();
    items
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_argument_order_is_irrelevant() {
        let a = CacheKey::new("coins_list").arg("page", 1).arg("per_page", 50);
        let b = CacheKey::new("coins_list").arg("per_page", 50).arg("page", 1);
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "coins_list?page=1&per_page=50");
    }

    #[test]
    fn test_identifiers_lower_cased() {
        let a = CacheKey::new("coin_basic").arg("id", " Bitcoin ");
        let b = CacheKey::new("coin_basic").arg("id", "bitcoin");
        assert_eq!(a.as_str(), b.as_str());
        assert_eq!(a.get_arg("id"), Some("bitcoin"));
    }

    #[test]
    fn test_list_arguments_sanitized() {
        let key = CacheKey::new("compare").list_arg("ids", "Ethereum, bitcoin,,bitcoin ");
        assert_eq!(key.as_str(), "compare?ids=bitcoin,ethereum");
    }

    #[test]
    fn test_bare_operation() {
        assert_eq!(CacheKey::new("Trending").to_string(), "trending");
    }
}
