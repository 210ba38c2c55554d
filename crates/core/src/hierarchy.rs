use crate::error::BuildError;
use crate::models::{BlockTag, LayoutBlock};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const TEXT_KEY: &str = "text";
pub const DOCUMENT_TITLE_KEY: &str = "document_title";
const SENTENCE_JOINER: &str = ". ";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NodeValue {
    Text(String),
    Subtree(HierarchyNode),
}

impl NodeValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Subtree(_) => None,
        }
    }

    pub fn as_subtree(&self) -> Option<&HierarchyNode> {
        match self {
            Self::Subtree(node) => Some(node),
            Self::Text(_) => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HierarchyNode {
    entries: IndexMap<String, NodeValue>,
}

impl HierarchyNode {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&NodeValue> {
        self.entries.get(key)
    }

    pub fn text(&self) -> Option<&str> {
        self.get(TEXT_KEY).and_then(NodeValue::as_text)
    }

    pub fn child(&self, key: &str) -> Option<&HierarchyNode> {
        self.get(key).and_then(NodeValue::as_subtree)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: NodeValue) -> Option<NodeValue> {
        self.entries.insert(key.into(), value)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &NodeValue)> {
        self.entries.iter()
    }

    pub fn into_entries(self) -> IndexMap<String, NodeValue> {
        self.entries
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.entries
                .iter()
                .map(|(key, value)| {
                    let value = match value {
                        NodeValue::Text(text) => serde_json::Value::String(text.clone()),
                        NodeValue::Subtree(node) => node.to_json(),
                    };
                    (key.clone(), value)
                })
                .collect(),
        )
    }

    // A title marker is promoted to an empty subtree; other text conflicts.
    fn child_mut(
        &mut self,
        key: &str,
        block_index: usize,
    ) -> Result<&mut HierarchyNode, BuildError> {
        let conflict = || BuildError::ShapeConflict {
            key: key.to_string(),
            block_index,
        };

        let slot = self
            .entries
            .entry(key.to_string())
            .or_insert_with(|| NodeValue::Subtree(HierarchyNode::default()));

        if matches!(&*slot, NodeValue::Text(text) if text.as_str() != key) {
            return Err(conflict());
        }
        if let NodeValue::Text(_) = slot {
            *slot = NodeValue::Subtree(HierarchyNode::default());
        }

        match slot {
            NodeValue::Subtree(node) => Ok(node),
            NodeValue::Text(_) => Err(conflict()),
        }
    }

    fn append_text(&mut self, sentences: &[String], block_index: usize) -> Result<(), BuildError> {
        let joined = sentences.join(SENTENCE_JOINER);
        match self.entries.get_mut(TEXT_KEY) {
            Some(NodeValue::Text(text)) => {
                text.push_str(SENTENCE_JOINER);
                text.push_str(&joined);
                Ok(())
            }
            Some(NodeValue::Subtree(_)) => Err(BuildError::ShapeConflict {
                key: TEXT_KEY.to_string(),
                block_index,
            }),
            None => {
                self.entries
                    .insert(TEXT_KEY.to_string(), NodeValue::Text(joined));
                Ok(())
            }
        }
    }

    fn stamp(&mut self, key: &str, value: &str) {
        if !matches!(self.entries.get(key), Some(NodeValue::Subtree(_))) {
            self.entries
                .insert(key.to_string(), NodeValue::Text(value.to_string()));
        }
    }
}

impl FromIterator<(String, NodeValue)> for HierarchyNode {
    fn from_iter<T: IntoIterator<Item = (String, NodeValue)>>(iter: T) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderStack {
    levels: BTreeMap<u32, String>,
}

impl HeaderStack {
    // Deeper levels are kept when a shallower header arrives.
    pub fn set(&mut self, level: u32, text: &str) {
        self.levels.insert(level, text.to_string());
    }

    pub fn get(&self, level: u32) -> Option<&str> {
        self.levels.get(&level).map(String::as_str)
    }
}

pub fn build_hierarchy(blocks: &[LayoutBlock]) -> Result<HierarchyNode, BuildError> {
    let mut headers = HeaderStack::default();
    let mut root = HierarchyNode::default();

    for (block_index, block) in blocks.iter().enumerate() {
        match block.tag {
            BlockTag::Header => headers.set(block.level, block.heading()),
            BlockTag::Para if !block.sentences.is_empty() => {
                let mut node = &mut root;
                for level in 0..=block.level {
                    let key = headers
                        .get(level)
                        .ok_or(BuildError::MissingHeader { level, block_index })?;
                    node = node.child_mut(key, block_index)?;
                }
                node.append_text(&block.sentences, block_index)?;
            }
            _ => {}
        }
    }

    Ok(root)
}

pub fn build_titled_hierarchy(blocks: &[LayoutBlock]) -> Result<HierarchyNode, BuildError> {
    let mut headers = HeaderStack::default();
    let mut root = HierarchyNode::default();
    let mut main_title: Option<String> = None;

    for (block_index, block) in blocks.iter().enumerate() {
        match block.tag {
            BlockTag::Header => {
                if block.level == 0 && main_title.is_none() {
                    main_title = Some(block.heading().to_string());
                }
                headers.set(block.level, block.heading());
            }
            BlockTag::Para if !block.sentences.is_empty() => {
                let mut node = &mut root;
                for level in 0..=block.level {
                    if let Some(key) = headers.get(level) {
                        node = node.child_mut(key, block_index)?;
                    }
                }

                node.append_text(&block.sentences, block_index)?;
                if let Some(title) = &main_title {
                    node.stamp(DOCUMENT_TITLE_KEY, title);
                }
                for level in 0..=block.level {
                    if let Some(header) = headers.get(level) {
                        if !node.contains_key(header) {
                            node.insert(header, NodeValue::Text(header.to_string()));
                        }
                    }
                }
            }
            _ => {}
        }
    }

    Ok(root.without_duplicate_titles())
}

pub fn get_hierarchical_representation(
    blocks: &[LayoutBlock],
    include_titles: bool,
) -> Result<serde_json::Value, BuildError> {
    let tree = if include_titles {
        build_titled_hierarchy(blocks)?
    } else {
        build_hierarchy(blocks)?
    };
    Ok(tree.to_json())
}
