use crate::error::IngestError;
use crate::hierarchy::{HierarchyNode, NodeValue};
use crate::models::{SourceDocument, SummarizeOptions};
use crate::sections::SectionMap;
use crate::traits::Summarizer;
use futures::future::try_join_all;
use serde_json::{Map, Value};

pub type DynSummarizer = dyn Summarizer + Send + Sync;

pub fn hierarchy_documents(tree: &HierarchyNode, source: &str) -> Vec<SourceDocument> {
    tree.iter()
        .map(|(key, value)| {
            let mut entry = Map::new();
            entry.insert(key.clone(), node_value_json(value));
            SourceDocument::new(Value::Object(entry).to_string(), source)
        })
        .collect()
}

pub fn section_documents(sections: &SectionMap) -> Vec<SourceDocument> {
    sections
        .values()
        .map(|section| {
            let mut document =
                SourceDocument::new(section.page_content.clone(), &section.metadata.source);
            document.metadata.insert(
                "section_number".to_string(),
                Value::from(section.metadata.section_number),
            );
            document.metadata.insert(
                "section_title".to_string(),
                Value::String(section.metadata.section_title.clone()),
            );
            document
        })
        .collect()
}

struct Leaf {
    key: String,
    parent_key: String,
    text: String,
}

enum Introduction {
    Entry(Map<String, Value>),
    Summary(String),
}

pub fn reorganize_hierarchy(tree: &HierarchyNode) -> Vec<Map<String, Value>> {
    let Some((intro_key, intro)) = introduction(tree) else {
        return Vec::new();
    };

    let records = leaves(tree, &intro_key)
        .into_iter()
        .map(|leaf| record(leaf.parent_key, Value::String(leaf.text)))
        .collect();
    attach_introduction(records, &intro_key, Introduction::Entry(intro))
}

pub async fn summarize_reorganized(
    tree: &HierarchyNode,
    options: SummarizeOptions,
    summarizer: Option<&DynSummarizer>,
) -> Result<Vec<Map<String, Value>>, IngestError> {
    if !options.requested() {
        return Ok(reorganize_hierarchy(tree));
    }
    let Some(summarizer) = summarizer else {
        return Err(IngestError::InvalidArgument(
            "a language model is required to summarize the text".to_string(),
        ));
    };
    if !options.rewrites_text() {
        return Ok(reorganize_hierarchy(tree));
    }

    let Some((intro_key, intro)) = introduction(tree) else {
        return Ok(Vec::new());
    };
    let intro_summary = summarizer
        .summarize(&Value::Object(intro).to_string())
        .await?;

    let leaves = leaves(tree, &intro_key);
    let summaries = try_join_all(leaves.iter().map(|leaf| summarizer.summarize(&leaf.text))).await?;
    let records = leaves
        .into_iter()
        .zip(summaries)
        .map(|(leaf, summary)| record(leaf.key, Value::String(summary)))
        .collect();

    Ok(attach_introduction(
        records,
        &intro_key,
        Introduction::Summary(intro_summary),
    ))
}

pub fn reorganized_documents(records: Vec<Map<String, Value>>, source: &str) -> Vec<SourceDocument> {
    records
        .into_iter()
        .map(|record| SourceDocument::new(Value::Object(record).to_string(), source))
        .collect()
}

fn introduction(tree: &HierarchyNode) -> Option<(String, Map<String, Value>)> {
    let (key, value) = tree.iter().next()?;
    let mut entry = Map::new();
    match value {
        NodeValue::Subtree(node) => {
            if let Some((child_key, child)) = node.iter().next() {
                entry.insert(child_key.clone(), node_value_json(child));
            }
        }
        NodeValue::Text(text) => {
            entry.insert(key.clone(), Value::String(text.clone()));
        }
    }
    Some((key.clone(), entry))
}

fn attach_introduction(
    records: Vec<Map<String, Value>>,
    intro_key: &str,
    introduction: Introduction,
) -> Vec<Map<String, Value>> {
    records
        .into_iter()
        .map(|mut record| match &introduction {
            Introduction::Entry(entry) => {
                if entry.keys().any(|key| record.contains_key(key)) {
                    self::record(intro_key.to_string(), Value::Object(entry.clone()))
                } else {
                    record
                }
            }
            Introduction::Summary(summary) => {
                record.insert(intro_key.to_string(), Value::String(summary.clone()));
                record
            }
        })
        .collect()
}

fn record(key: String, value: Value) -> Map<String, Value> {
    let mut record = Map::new();
    record.insert(key, value);
    record
}

fn leaves(tree: &HierarchyNode, root_key: &str) -> Vec<Leaf> {
    let mut leaves = Vec::new();
    collect_leaves(tree, root_key, &mut leaves);
    leaves
}

fn collect_leaves(node: &HierarchyNode, parent_key: &str, leaves: &mut Vec<Leaf>) {
    for (key, value) in node.iter() {
        match value {
            NodeValue::Subtree(child) => collect_leaves(child, key, leaves),
            NodeValue::Text(text) => leaves.push(Leaf {
                key: key.clone(),
                parent_key: parent_key.to_string(),
                text: text.clone(),
            }),
        }
    }
}

fn node_value_json(value: &NodeValue) -> Value {
    match value {
        NodeValue::Text(text) => Value::String(text.clone()),
        NodeValue::Subtree(node) => node.to_json(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GraphError;
    use crate::hierarchy::build_hierarchy;
    use crate::models::LayoutBlock;
    use crate::sections::build_flat_sections;
    use async_trait::async_trait;
    use serde_json::json;

    struct UppercaseSummarizer;

    #[async_trait]
    impl Summarizer for UppercaseSummarizer {
        async fn summarize(&self, text: &str) -> Result<String, GraphError> {
            Ok(text.to_uppercase())
        }
    }

    fn menu() -> HierarchyNode {
        build_hierarchy(&[
            LayoutBlock::header(0, "Menu"),
            LayoutBlock::para(0, ["Welcome"]),
            LayoutBlock::header(1, "Starters"),
            LayoutBlock::para(1, ["Soup"]),
            LayoutBlock::header(0, "Desserts"),
            LayoutBlock::para(0, ["Cake"]),
        ])
        .unwrap()
    }

    fn as_values(records: Vec<Map<String, Value>>) -> Vec<Value> {
        records.into_iter().map(Value::Object).collect()
    }

    #[test]
    fn top_level_entries_become_documents() {
        let documents = hierarchy_documents(&menu(), "menu.pdf");

        assert_eq!(documents.len(), 2);
        assert_eq!(documents[0].source(), "menu.pdf");
        assert_eq!(documents[0].kind, "Document");
        let content: Value = serde_json::from_str(&documents[0].page_content).unwrap();
        assert_eq!(
            content,
            json!({"Menu": {"text": "Welcome", "Starters": {"text": "Soup"}}})
        );
    }

    #[test]
    fn sections_keep_their_metadata() {
        let sections = build_flat_sections(
            &[LayoutBlock::header(0, "A"), LayoutBlock::para(0, ["x"])],
            "a.pdf",
        );

        let documents = section_documents(&sections);
        assert_eq!(documents.len(), 1);
        assert_eq!(documents[0].page_content, "A\n\nx");
        assert_eq!(documents[0].metadata["section_number"], json!(0));
        assert_eq!(documents[0].metadata["section_title"], json!("A"));
        assert_eq!(documents[0].source(), "a.pdf");
    }

    #[test]
    fn plain_reorganize_leaves_records_alone() {
        let tree = build_hierarchy(&[
            LayoutBlock::header(0, "Menu"),
            LayoutBlock::para(0, ["Welcome"]),
            LayoutBlock::header(0, "Desserts"),
            LayoutBlock::para(0, ["Cake"]),
        ])
        .unwrap();

        assert_eq!(
            as_values(reorganize_hierarchy(&tree)),
            vec![json!({"Menu": "Welcome"}), json!({"Desserts": "Cake"})]
        );
        assert_eq!(as_values(reorganize_hierarchy(&menu())).len(), 3);
    }

    #[test]
    fn records_sharing_the_introduction_key_are_replaced() {
        let tree = build_hierarchy(&[
            LayoutBlock::header(0, "Menu"),
            LayoutBlock::header(1, "Starters"),
            LayoutBlock::para(1, ["Soup"]),
            LayoutBlock::header(1, "Mains"),
            LayoutBlock::para(1, ["Stew"]),
        ])
        .unwrap();

        assert_eq!(
            as_values(reorganize_hierarchy(&tree)),
            vec![
                json!({"Menu": {"Starters": {"text": "Soup"}}}),
                json!({"Mains": "Stew"}),
            ]
        );
    }

    #[test]
    fn empty_tree_reorganizes_to_nothing() {
        assert!(reorganize_hierarchy(&HierarchyNode::new()).is_empty());
        assert!(reorganized_documents(Vec::new(), "").is_empty());
    }

    #[tokio::test]
    async fn summarized_records_carry_the_introduction() {
        let options = SummarizeOptions {
            info: true,
            ..SummarizeOptions::default()
        };
        let records =
            summarize_reorganized(&menu(), options, Some(&UppercaseSummarizer)).await.unwrap();

        assert_eq!(
            as_values(records),
            vec![
                json!({"text": "WELCOME", "Menu": r#"{"TEXT":"WELCOME"}"#}),
                json!({"text": "SOUP", "Menu": r#"{"TEXT":"WELCOME"}"#}),
                json!({"text": "CAKE", "Menu": r#"{"TEXT":"WELCOME"}"#}),
            ]
        );
    }

    #[tokio::test]
    async fn summarizing_without_a_model_is_rejected() {
        let options = SummarizeOptions {
            paragraphs: true,
            ..SummarizeOptions::default()
        };
        assert!(matches!(
            summarize_reorganized(&menu(), options, None).await,
            Err(IngestError::InvalidArgument(_))
        ));

        let plain = summarize_reorganized(&menu(), options, Some(&UppercaseSummarizer))
            .await
            .unwrap();
        assert_eq!(plain, reorganize_hierarchy(&menu()));

        let unrequested = summarize_reorganized(&menu(), SummarizeOptions::default(), None)
            .await
            .unwrap();
        assert_eq!(unrequested.len(), 3);
    }
}
