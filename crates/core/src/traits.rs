use crate::graph::GraphDocument;
use crate::models::{LayoutBlock, SourceDocument};
use crate::{GraphError, IngestError};
use async_trait::async_trait;
use std::path::Path;

#[async_trait]
pub trait LayoutParser {
    async fn parse_layout(&self, path: &Path) -> Result<Vec<LayoutBlock>, IngestError>;
}

#[async_trait]
pub trait EntityExtractor {
    async fn extract_graph(&self, document: &SourceDocument) -> Result<GraphDocument, GraphError>;
}

#[async_trait]
pub trait GraphWriter {
    async fn ensure_database(&self) -> Result<(), GraphError>;

    async fn write_graph(&self, document: &GraphDocument) -> Result<(), GraphError>;
}

#[async_trait]
pub trait Summarizer {
    async fn summarize(&self, text: &str) -> Result<String, GraphError>;
}
