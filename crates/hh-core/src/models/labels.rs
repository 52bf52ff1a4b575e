use serde_yaml::Value;

/// A service's label collection, normalized to `key=value` strings with set
/// semantics. Compose allows labels as either a sequence of strings or a
/// mapping; both normalize to the same form so merging and the exposure
/// check are plain string equality. First-seen order is preserved so output
/// stays deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelSet {
    labels: Vec<String>,
}

impl LabelSet {
    /// Normalize a raw `labels` value. `None` (no labels key) is an empty set.
    pub fn from_value(value: Option<&Value>) -> std::result::Result<Self, &'static str> {
        let mut set = LabelSet::default();
        match value {
            None => {}
            Some(Value::Sequence(entries)) => {
                for entry in entries {
                    let label = entry.as_str().ok_or("label entries must be strings")?;
                    set.insert(label);
                }
            }
            Some(Value::Mapping(entries)) => {
                for (key, value) in entries {
                    let key = key.as_str().ok_or("label keys must be strings")?;
                    let value = scalar_to_string(value)
                        .ok_or("label values must be scalars (string, bool, or number)")?;
                    set.insert(&format!("{key}={value}"));
                }
            }
            Some(_) => return Err("labels must be a sequence or a mapping"),
        }
        Ok(set)
    }

    /// Insert a label, keeping set semantics. Returns true if it was new.
    pub fn insert(&mut self, label: &str) -> bool {
        if self.labels.iter().any(|existing| existing == label) {
            return false;
        }
        self.labels.push(label.to_string());
        true
    }

    pub fn merge<'a>(&mut self, labels: impl IntoIterator<Item = &'a str>) {
        for label in labels {
            self.insert(label);
        }
    }

    pub fn contains(&self, label: &str) -> bool {
        self.labels.iter().any(|existing| existing == label)
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Emit as a YAML sequence of strings (the canonical on-disk form).
    pub fn to_value(&self) -> Value {
        Value::Sequence(self.labels.iter().map(|l| Value::from(l.as_str())).collect())
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.labels.iter().map(String::as_str)
    }
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_sequence() {
        let yaml = "- traefik.enable=true\n- foo=bar\n";
        let value: Value = serde_yaml::from_str(yaml).unwrap();
        let set = LabelSet::from_value(Some(&value)).unwrap();
        assert!(set.contains("traefik.enable=true"));
        assert!(set.contains("foo=bar"));
    }

    #[test]
    fn normalize_mapping_with_scalar_values() {
        let yaml = "traefik.enable: true\nreplicas: 3\nname: web\n";
        let value: Value = serde_yaml::from_str(yaml).unwrap();
        let set = LabelSet::from_value(Some(&value)).unwrap();
        assert!(set.contains("traefik.enable=true"));
        assert!(set.contains("replicas=3"));
        assert!(set.contains("name=web"));
    }

    #[test]
    fn missing_labels_is_empty() {
        let set = LabelSet::from_value(None).unwrap();
        assert!(set.is_empty());
    }

    #[test]
    fn merge_deduplicates_preserving_order() {
        let mut set = LabelSet::default();
        set.insert("a=1");
        set.insert("b=2");
        set.merge(["b=2", "c=3", "a=1"]);
        let labels: Vec<&str> = set.iter().collect();
        assert_eq!(labels, vec!["a=1", "b=2", "c=3"]);
    }

    #[test]
    fn reject_non_string_sequence_entry() {
        let yaml = "- 42\n";
        let value: Value = serde_yaml::from_str(yaml).unwrap();
        assert!(LabelSet::from_value(Some(&value)).is_err());
    }

    #[test]
    fn reject_nested_label_value() {
        let yaml = "key:\n  nested: true\n";
        let value: Value = serde_yaml::from_str(yaml).unwrap();
        assert!(LabelSet::from_value(Some(&value)).is_err());
    }
}
