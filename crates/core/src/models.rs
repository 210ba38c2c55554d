use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum BlockTag {
    Header,
    Para,
    ListItem,
    Table,
    Other(String),
}

impl BlockTag {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Header => "header",
            Self::Para => "para",
            Self::ListItem => "list_item",
            Self::Table => "table",
            Self::Other(name) => name,
        }
    }
}

impl From<&str> for BlockTag {
    fn from(value: &str) -> Self {
        match value {
            "header" => Self::Header,
            "para" => Self::Para,
            "list_item" => Self::ListItem,
            "table" => Self::Table,
            other => Self::Other(other.to_string()),
        }
    }
}

impl From<String> for BlockTag {
    fn from(value: String) -> Self {
        Self::from(value.as_str())
    }
}

impl From<BlockTag> for String {
    fn from(value: BlockTag) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for BlockTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutBlock {
    pub tag: BlockTag,
    pub level: u32,
    #[serde(default)]
    pub sentences: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_rows: Option<Vec<Vec<String>>>,
}

impl LayoutBlock {
    pub fn new(tag: BlockTag, level: u32, sentences: Vec<String>) -> Self {
        Self {
            tag,
            level,
            sentences,
            table_rows: None,
        }
    }

    pub fn header(level: u32, text: impl Into<String>) -> Self {
        Self::new(BlockTag::Header, level, vec![text.into()])
    }

    pub fn para<S: Into<String>>(level: u32, sentences: impl IntoIterator<Item = S>) -> Self {
        Self::new(
            BlockTag::Para,
            level,
            sentences.into_iter().map(Into::into).collect(),
        )
    }

    pub fn list_item(level: u32, text: impl Into<String>) -> Self {
        Self::new(BlockTag::ListItem, level, vec![text.into()])
    }

    pub fn table(level: u32, sentences: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self {
            tag: BlockTag::Table,
            level,
            sentences,
            table_rows: Some(rows),
        }
    }

    // Later sentences of a header are discarded.
    pub fn heading(&self) -> &str {
        self.sentences.first().map(String::as_str).unwrap_or_default()
    }

    pub fn text(&self) -> String {
        self.sentences.join(" ")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceDocument {
    pub id: Option<String>,
    pub metadata: Map<String, Value>,
    pub page_content: String,
    #[serde(rename = "type")]
    pub kind: String,
}

impl SourceDocument {
    pub fn new(page_content: impl Into<String>, source: &str) -> Self {
        let mut metadata = Map::new();
        metadata.insert("source".to_string(), Value::String(source.to_string()));
        Self {
            id: None,
            metadata,
            page_content: page_content.into(),
            kind: "Document".to_string(),
        }
    }

    pub fn source(&self) -> &str {
        self.metadata
            .get("source")
            .and_then(Value::as_str)
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SummarizeOptions {
    pub all: bool,
    pub info: bool,
    pub paragraphs: bool,
}

impl SummarizeOptions {
    pub fn requested(&self) -> bool {
        self.all || self.info || self.paragraphs
    }

    // Only `all` and `info` rewrite text; `paragraphs` just demands a model.
    pub fn rewrites_text(&self) -> bool {
        self.all || self.info
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BuildMode {
    #[default]
    Flat,
    Hierarchy {
        include_titles: bool,
    },
    Reorganized {
        include_titles: bool,
        summarize: SummarizeOptions,
    },
}

impl BuildMode {
    pub fn summarize(&self) -> SummarizeOptions {
        match self {
            Self::Reorganized { summarize, .. } => *summarize,
            Self::Flat | Self::Hierarchy { .. } => SummarizeOptions::default(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PipelineOptions {
    pub mode: BuildMode,
    pub sanitize: bool,
    pub create_database: bool,
}
