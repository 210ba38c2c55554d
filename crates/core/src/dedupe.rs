use crate::hierarchy::{HierarchyNode, NodeValue};
use serde_json::{Map, Value};

impl HierarchyNode {
    pub fn without_duplicate_titles(self) -> Self {
        suppress_node(self, None)
    }
}

fn suppress_node(node: HierarchyNode, parent_key: Option<&str>) -> HierarchyNode {
    node.into_entries()
        .into_iter()
        .map(|(key, value)| {
            let value = match value {
                NodeValue::Subtree(child) => {
                    NodeValue::Subtree(suppress_node(child, Some(key.as_str())))
                }
                text => text,
            };
            (key, value)
        })
        .filter(|(key, _)| parent_key != Some(key.as_str()))
        .collect()
}

pub fn remove_duplicate_titles(value: &Value) -> Value {
    suppress_value(value, None)
}

fn suppress_value(value: &Value, parent_key: Option<&str>) -> Value {
    match value {
        Value::Object(entries) => {
            let mut cleaned = Map::new();
            for (key, child) in entries {
                let child = suppress_value(child, Some(key.as_str()));
                if parent_key != Some(key.as_str()) {
                    cleaned.insert(key.clone(), child);
                }
            }
            Value::Object(cleaned)
        }
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| suppress_value(item, parent_key))
                .collect(),
        ),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn self_keys_are_removed_at_every_depth() {
        let input = json!({
            "A": {
                "A": "A",
                "text": "x",
                "B": {"B": "B", "A": "A", "text": "y"}
            }
        });

        assert_eq!(
            remove_duplicate_titles(&input),
            json!({
                "A": {
                    "text": "x",
                    "B": {"A": "A", "text": "y"}
                }
            })
        );
    }

    #[test]
    fn root_keys_are_never_removed() {
        let input = json!({"A": "A", "text": "x"});
        assert_eq!(remove_duplicate_titles(&input), input);
    }

    #[test]
    fn arrays_inherit_the_parent_key() {
        let input = json!({
            "A": [{"A": "A", "text": "x"}, "plain", {"text": "y"}]
        });

        assert_eq!(
            remove_duplicate_titles(&input),
            json!({"A": [{"text": "x"}, "plain", {"text": "y"}]})
        );
    }

    #[test]
    fn nested_subtree_with_parent_name_is_removed() {
        let input = json!({"A": {"A": {"text": "inner"}, "text": "outer"}});
        assert_eq!(
            remove_duplicate_titles(&input),
            json!({"A": {"text": "outer"}})
        );
    }

    #[test]
    fn suppression_is_idempotent() {
        let input = json!({
            "Doc": {
                "Doc": "Doc",
                "Section": {"Section": {"Section": "Section", "text": "deep"}, "Doc": "Doc"},
                "list": [{"list": "list"}]
            }
        });

        let once = remove_duplicate_titles(&input);
        let twice = remove_duplicate_titles(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn typed_and_json_suppression_agree() {
        let mut inner = HierarchyNode::new();
        inner.insert("B", NodeValue::Text("B".to_string()));
        inner.insert("text", NodeValue::Text("x".to_string()));
        let mut root = HierarchyNode::new();
        root.insert("B", NodeValue::Subtree(inner));

        let expected = remove_duplicate_titles(&root.to_json());
        let typed = root.without_duplicate_titles();

        assert_eq!(typed.to_json(), expected);
        assert_eq!(typed.to_json(), json!({"B": {"text": "x"}}));
    }
}
