//! Data scopes visible to template tags.

use serde_json::Value;

/// Chain of data values, innermost first.
///
/// Sections push the current item as a new innermost scope; identifier
/// lookup walks outward until an object containing the key is found.
#[derive(Clone, Copy, Debug)]
pub struct Scope<'a> {
    value: &'a Value,
    parent: Option<&'a Scope<'a>>,
}

impl<'a> Scope<'a> {
    /// Outermost scope over the render data.
    pub fn root(value: &'a Value) -> Self {
        Self {
            value,
            parent: None,
        }
    }

    /// Scope with `value` nested inside `self`.
    pub fn child<'b>(&'b self, value: &'b Value) -> Scope<'b> {
        Scope {
            value,
            parent: Some(self),
        }
    }

    /// Innermost value.
    pub fn value(&self) -> &'a Value {
        self.value
    }

    /// Find `key` in the innermost object that has it.
    pub fn lookup(&self, key: &str) -> Option<&'a Value> {
        let mut scope = Some(self);
        while let Some(current) = scope {
            if let Some(found) = current.value.as_object().and_then(|map| map.get(key)) {
                return Some(found);
            }
            scope = current.parent;
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_lookup_walks_outward() {
        let data = json!({"title": "Report", "items": [{"name": "a"}]});
        let item = json!({"name": "a"});
        let root = Scope::root(&data);
        let inner = root.child(&item);

        assert_eq!(inner.lookup("name"), Some(&json!("a")));
        assert_eq!(inner.lookup("title"), Some(&json!("Report")));
        assert_eq!(inner.lookup("missing"), None);
    }

    #[test]
    fn test_inner_scope_shadows_outer() {
        let data = json!({"name": "outer"});
        let item = json!({"name": "inner"});
        let root = Scope::root(&data);
        let inner = root.child(&item);

        assert_eq!(inner.lookup("name"), Some(&json!("inner")));
        assert_eq!(root.lookup("name"), Some(&json!("outer")));
    }

    #[test]
    fn test_non_object_scope_is_skipped() {
        let data = json!({"unit": "kg"});
        let item = json!(42);
        let root = Scope::root(&data);
        let inner = root.child(&item);

        assert_eq!(inner.value(), &json!(42));
        assert_eq!(inner.lookup("unit"), Some(&json!("kg")));
    }
}
