use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use xreg_core_types::attrs::{HIDDEN_PREFIX, TAGS, TAGS_PREFIX};

use crate::errors::{RegistryError, Result};

/// Ordered property bag for one entity
///
/// Keys are dotted attribute names. Two conventions are enforced here rather
/// than by callers:
/// - names starting with `#` are hidden bookkeeping and never rendered or
///   accepted from clients
/// - `tags.<key>` entries hold free-form user tags; they are flattened on
///   the way in and re-assembled into a `tags` object on the way out
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Props {
    data: BTreeMap<String, Value>,
}

impl Props {
    pub fn new() -> Self {
        Self {
            data: BTreeMap::new(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// Set a value; `null` is stored as absence
    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        let key = key.into();
        if value.is_null() {
            self.data.remove(&key);
        } else {
            self.data.insert(key, value);
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.data.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.data.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.data.iter()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(Value::as_str)
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.data.get(key).and_then(Value::as_i64)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.data.get(key).and_then(Value::as_bool)
    }

    /// Entries visible to clients (no `#` bookkeeping, no flattened tags)
    pub fn visible(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.data
            .iter()
            .filter(|(k, _)| !is_hidden(k) && !k.starts_with(TAGS_PREFIX))
    }

    /// Re-assembled `tags` object, or `None` when there are no tags
    pub fn tags(&self) -> Option<Map<String, Value>> {
        let tags: Map<String, Value> = self
            .data
            .range(TAGS_PREFIX.to_string()..)
            .take_while(|(k, _)| k.starts_with(TAGS_PREFIX))
            .map(|(k, v)| (k[TAGS_PREFIX.len()..].to_string(), v.clone()))
            .collect();
        if tags.is_empty() {
            None
        } else {
            Some(tags)
        }
    }

    /// Replace every tag with the entries of `tags`
    ///
    /// # Errors
    ///
    /// Returns `InvalidData` when a tag value is not a string or a tag key is
    /// empty.
    pub fn replace_tags(&mut self, tags: &Map<String, Value>) -> Result<()> {
        for (k, v) in tags {
            if k.is_empty() {
                return Err(RegistryError::invalid_data("Tag names must not be empty"));
            }
            if !v.is_string() {
                return Err(RegistryError::invalid_data(format!(
                    "Attribute \"{}.{}\" must be a string",
                    TAGS, k
                )));
            }
        }
        self.clear_tags();
        for (k, v) in tags {
            self.data.insert(format!("{}{}", TAGS_PREFIX, k), v.clone());
        }
        Ok(())
    }

    pub fn clear_tags(&mut self) {
        self.data.retain(|k, _| !k.starts_with(TAGS_PREFIX));
    }

    /// Remove every client-visible entry except the listed keys
    pub fn retain_visible(&mut self, keep: &[&str]) {
        self.data
            .retain(|k, _| is_hidden(k) || keep.contains(&k.as_str()));
    }
}

impl From<BTreeMap<String, Value>> for Props {
    fn from(data: BTreeMap<String, Value>) -> Self {
        Self { data }
    }
}

impl From<Props> for BTreeMap<String, Value> {
    fn from(props: Props) -> Self {
        props.data
    }
}

/// True for `#`-prefixed bookkeeping keys
pub fn is_hidden(key: &str) -> bool {
    key.starts_with(HIDDEN_PREFIX)
}

/// Legal client attribute names: `[a-z_][a-z0-9_]{0,62}`
///
/// Rejecting everything else at the boundary is what keeps `#` keys and
/// dotted tag keys out of reach of client writes.
pub fn is_valid_attr_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_lowercase() || c == '_' => {}
        _ => return false,
    }
    name.len() <= 63 && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_set_null_removes() {
        let mut props = Props::new();
        props.set("name", json!("x"));
        props.set("name", Value::Null);
        assert!(props.is_empty());
    }

    #[test]
    fn test_visible_hides_bookkeeping_and_tags() {
        let mut props = Props::new();
        props.set("name", json!("n"));
        props.set("#nextversionid", json!(3));
        props.set("tags.stage", json!("dev"));

        let keys: Vec<_> = props.visible().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["name"]);
    }

    #[test]
    fn test_tags_round_trip_through_flattening() {
        let mut props = Props::new();
        let tags = json!({"stage": "dev", "team": "a"});
        props.replace_tags(tags.as_object().unwrap()).unwrap();

        assert_eq!(props.get_str("tags.stage"), Some("dev"));
        assert_eq!(Value::Object(props.tags().unwrap()), tags);
    }

    #[test]
    fn test_replace_tags_rejects_non_string() {
        let mut props = Props::new();
        let err = props
            .replace_tags(json!({"n": 1}).as_object().unwrap())
            .unwrap_err();
        assert!(matches!(err, RegistryError::InvalidData { .. }));
    }

    #[test]
    fn test_attr_name_rules() {
        assert!(is_valid_attr_name("name"));
        assert!(is_valid_attr_name("_x1"));
        assert!(!is_valid_attr_name("#epoch"));
        assert!(!is_valid_attr_name("Name"));
        assert!(!is_valid_attr_name("1abc"));
        assert!(!is_valid_attr_name(""));
    }
}
