//! Resource Owner
//!
//! Identity record returned by the resource owner endpoint.

use serde_json::{Map, Value};

/// Resource owner details.
///
/// Everything except the identifier is kept as raw JSON.
#[derive(Clone, Debug, PartialEq)]
pub struct ResourceOwner {
    data: Map<String, Value>,
}

impl ResourceOwner {
    /// Create from the endpoint's JSON object. The internal `user_id` field is dropped.
    pub fn from_map(mut data: Map<String, Value>) -> Self {
        data.remove("user_id");
        Self { data }
    }

    /// Resource owner identifier.
    pub fn id(&self) -> Option<String> {
        match self.data.get("id")? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// Look up a raw field.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// All fields.
    pub fn to_map(&self) -> &Map<String, Value> {
        &self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn owner(value: Value) -> ResourceOwner {
        match value {
            Value::Object(map) => ResourceOwner::from_map(map),
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_user_id_is_dropped() {
        let owner = owner(json!({"id": "u1", "user_id": 7, "email": "a@b.c"}));
        assert_eq!(owner.id().as_deref(), Some("u1"));
        assert!(owner.get("user_id").is_none());
        assert_eq!(owner.get("email"), Some(&json!("a@b.c")));
    }

    #[test]
    fn test_numeric_id() {
        assert_eq!(owner(json!({"id": 42})).id().as_deref(), Some("42"));
        assert_eq!(owner(json!({"name": "x"})).id(), None);
    }
}
