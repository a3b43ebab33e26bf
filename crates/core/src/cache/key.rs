use std::fmt;

/// Composite identifier of a cached resource: a resource type followed by
/// its parameters, e.g. `purchases/todo`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceKey(Vec<String>);

impl ResourceKey {
    /// Key consisting of just the resource type.
    pub fn new(resource: impl Into<String>) -> Self {
        Self(vec![resource.into()])
    }

    /// Append a parameter segment.
    pub fn with(mut self, segment: impl Into<String>) -> Self {
        self.0.push(segment.into());
        self
    }

    /// Append a segment only when a value is present; absent values become `*`.
    pub fn with_opt(self, segment: Option<impl Into<String>>) -> Self {
        match segment {
            Some(segment) => self.with(segment),
            None => self.with("*"),
        }
    }

    /// Resource type followed by parameters.
    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// True when `prefix` is a leading run of this key's segments.
    pub fn starts_with(&self, prefix: &ResourceKey) -> bool {
        self.0.starts_with(&prefix.0)
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("/"))
    }
}

impl From<&str> for ResourceKey {
    fn from(resource: &str) -> Self {
        Self::new(resource)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_matching_is_segment_wise() {
        let todo = ResourceKey::new("purchases").with("todo");
        assert!(todo.starts_with(&ResourceKey::new("purchases")));
        assert!(todo.starts_with(&todo));
        assert!(!todo.starts_with(&ResourceKey::new("purch")));
        assert!(!ResourceKey::new("purchases").starts_with(&todo));
        assert_eq!(todo.to_string(), "purchases/todo");
    }

    #[test]
    fn optional_segments_are_distinct() {
        let all = ResourceKey::new("stock").with_opt(None::<String>);
        let one = ResourceKey::new("stock").with_opt(Some("s1"));
        assert_ne!(all, one);
        assert_eq!(all.segments(), ["stock", "*"]);
    }
}
