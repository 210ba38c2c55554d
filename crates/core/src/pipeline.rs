use crate::documents::{
    hierarchy_documents, reorganized_documents, section_documents, summarize_reorganized,
    DynSummarizer,
};
use crate::error::{BuildError, IngestError};
use crate::hierarchy::{build_hierarchy, build_titled_hierarchy, HierarchyNode};
use crate::loader::{discover_pdf_files, ensure_pdf};
use crate::models::{BuildMode, LayoutBlock, PipelineOptions, SourceDocument};
use crate::sanitize::sanitize_pdf;
use crate::sections::build_flat_sections;
use crate::traits::{EntityExtractor, GraphWriter, LayoutParser};
use futures::future::try_join_all;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedPdf {
    pub path: PathBuf,
    pub documents: usize,
    pub nodes: usize,
    pub relationships: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedPdf {
    pub path: PathBuf,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestionReport {
    pub loaded: Vec<LoadedPdf>,
    pub skipped_files: Vec<SkippedPdf>,
}

impl IngestionReport {
    pub fn node_count(&self) -> usize {
        self.loaded.iter().map(|pdf| pdf.nodes).sum()
    }

    pub fn relationship_count(&self) -> usize {
        self.loaded.iter().map(|pdf| pdf.relationships).sum()
    }
}

pub async fn build_documents(
    blocks: &[LayoutBlock],
    source: &str,
    mode: BuildMode,
    summarizer: Option<&DynSummarizer>,
) -> Result<Vec<SourceDocument>, IngestError> {
    match mode {
        BuildMode::Flat => Ok(section_documents(&build_flat_sections(blocks, source))),
        BuildMode::Hierarchy { include_titles } => {
            let tree = tree_for(blocks, include_titles)?;
            Ok(hierarchy_documents(&tree, source))
        }
        BuildMode::Reorganized {
            include_titles,
            summarize,
        } => {
            let tree = tree_for(blocks, include_titles)?;
            let records = summarize_reorganized(&tree, summarize, summarizer).await?;
            Ok(reorganized_documents(records, source))
        }
    }
}

fn tree_for(blocks: &[LayoutBlock], include_titles: bool) -> Result<HierarchyNode, BuildError> {
    if include_titles {
        build_titled_hierarchy(blocks)
    } else {
        build_hierarchy(blocks)
    }
}

pub struct GraphPipeline<P, E, G>
where
    P: LayoutParser,
    E: EntityExtractor,
    G: GraphWriter,
{
    parser: P,
    extractor: E,
    writer: G,
    summarizer: Option<Box<DynSummarizer>>,
    options: PipelineOptions,
}

impl<P, E, G> GraphPipeline<P, E, G>
where
    P: LayoutParser + Send + Sync,
    E: EntityExtractor + Send + Sync,
    G: GraphWriter + Send + Sync,
{
    pub fn new(parser: P, extractor: E, writer: G, options: PipelineOptions) -> Self {
        Self {
            parser,
            extractor,
            writer,
            summarizer: None,
            options,
        }
    }

    pub fn with_summarizer(mut self, summarizer: Box<DynSummarizer>) -> Self {
        self.summarizer = Some(summarizer);
        self
    }

    pub async fn ingest_folder(&self, folder: &Path) -> Result<IngestionReport, IngestError> {
        let files = discover_pdf_files(folder);
        if files.is_empty() {
            return Err(IngestError::InvalidArgument(format!(
                "no pdf files found in {}",
                folder.display()
            )));
        }
        self.ingest_files(&files).await
    }

    pub async fn ingest_files(&self, files: &[PathBuf]) -> Result<IngestionReport, IngestError> {
        if files.is_empty() {
            return Err(IngestError::InvalidArgument(
                "no pdf files to ingest".to_string(),
            ));
        }

        if self.options.mode.summarize().requested() && self.summarizer.is_none() {
            return Err(IngestError::InvalidArgument(
                "a language model is required to summarize the text".to_string(),
            ));
        }

        if self.options.create_database {
            self.writer.ensure_database().await?;
        }

        let mut report = IngestionReport::default();
        for path in files {
            match self.ingest_file(path).await {
                Ok(loaded) => {
                    info!(
                        path = %path.display(),
                        documents = loaded.documents,
                        nodes = loaded.nodes,
                        relationships = loaded.relationships,
                        "loaded pdf"
                    );
                    report.loaded.push(loaded);
                }
                Err(error) => {
                    warn!(path = %path.display(), reason = %error, "skipped pdf");
                    report.skipped_files.push(SkippedPdf {
                        path: path.clone(),
                        reason: error.to_string(),
                    });
                }
            }
        }

        Ok(report)
    }

    pub async fn ingest_file(&self, path: &Path) -> Result<LoadedPdf, IngestError> {
        ensure_pdf(path)?;

        let parse_path = if self.options.sanitize {
            let original = path.to_path_buf();
            tokio::task::spawn_blocking(move || sanitize_pdf(&original))
                .await
                .map_err(|error| IngestError::Pdf(error.to_string()))??
        } else {
            path.to_path_buf()
        };

        let blocks = self.parser.parse_layout(&parse_path).await?;
        let source = path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        let documents = build_documents(
            &blocks,
            &source,
            self.options.mode,
            self.summarizer.as_deref(),
        )
        .await?;
        debug!(
            path = %path.display(),
            blocks = blocks.len(),
            documents = documents.len(),
            "built documents"
        );

        let graphs = try_join_all(
            documents
                .iter()
                .map(|document| self.extractor.extract_graph(document)),
        )
        .await?;

        let mut loaded = LoadedPdf {
            path: path.to_path_buf(),
            documents: documents.len(),
            nodes: 0,
            relationships: 0,
        };
        for graph in graphs.iter().filter(|graph| !graph.is_empty()) {
            self.writer.write_graph(graph).await?;
            loaded.nodes += graph.nodes.len();
            loaded.relationships += graph.relationships.len();
        }

        Ok(loaded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GraphError;
    use crate::graph::{GraphDocument, GraphNode};
    use crate::models::SummarizeOptions;
    use crate::traits::Summarizer;
    use async_trait::async_trait;
    use std::fs;
    use std::sync::Mutex;
    use tempfile::tempdir;

    struct FakeParser {
        blocks: Vec<LayoutBlock>,
    }

    #[async_trait]
    impl LayoutParser for FakeParser {
        async fn parse_layout(&self, path: &Path) -> Result<Vec<LayoutBlock>, IngestError> {
            let name = path
                .file_name()
                .and_then(|name| name.to_str())
                .unwrap_or_default();
            if name.contains("broken") {
                return Err(IngestError::LayoutService("service returned 500".to_string()));
            }
            Ok(self.blocks.clone())
        }
    }

    struct FakeExtractor;

    #[async_trait]
    impl EntityExtractor for FakeExtractor {
        async fn extract_graph(
            &self,
            document: &SourceDocument,
        ) -> Result<GraphDocument, GraphError> {
            if document.page_content.contains("nothing") {
                return Ok(GraphDocument::default());
            }
            Ok(GraphDocument {
                nodes: vec![GraphNode::new(document.page_content.clone(), "Section")],
                relationships: Vec::new(),
                source: document.source().to_string(),
            })
        }
    }

    #[derive(Default)]
    struct RecordingWriter {
        ensured: Mutex<usize>,
        written: Mutex<Vec<GraphDocument>>,
    }

    #[async_trait]
    impl GraphWriter for RecordingWriter {
        async fn ensure_database(&self) -> Result<(), GraphError> {
            *self.ensured.lock().unwrap() += 1;
            Ok(())
        }

        async fn write_graph(&self, document: &GraphDocument) -> Result<(), GraphError> {
            self.written.lock().unwrap().push(document.clone());
            Ok(())
        }
    }

    fn menu_blocks() -> Vec<LayoutBlock> {
        vec![
            LayoutBlock::header(0, "Starters"),
            LayoutBlock::para(0, ["Soup"]),
            LayoutBlock::header(0, "Desserts"),
            LayoutBlock::para(0, ["Cake"]),
        ]
    }

    fn pipeline(options: PipelineOptions) -> GraphPipeline<FakeParser, FakeExtractor, RecordingWriter> {
        GraphPipeline::new(
            FakeParser {
                blocks: menu_blocks(),
            },
            FakeExtractor,
            RecordingWriter::default(),
            options,
        )
    }

    struct PrefixSummarizer;

    #[async_trait]
    impl Summarizer for PrefixSummarizer {
        async fn summarize(&self, text: &str) -> Result<String, GraphError> {
            Ok(format!("summary: {text}"))
        }
    }

    #[tokio::test]
    async fn flat_mode_builds_one_document_per_section() {
        let documents = build_documents(&menu_blocks(), "menu.pdf", BuildMode::Flat, None)
            .await
            .unwrap();
        assert_eq!(documents.len(), 2);
        assert_eq!(documents[0].page_content, "Starters\n\nSoup");
        assert_eq!(documents[1].source(), "menu.pdf");
    }

    #[tokio::test]
    async fn hierarchy_modes_build_json_documents() {
        let documents = build_documents(
            &menu_blocks(),
            "menu.pdf",
            BuildMode::Hierarchy {
                include_titles: false,
            },
            None,
        )
        .await
        .unwrap();
        assert_eq!(documents.len(), 2);
        assert_eq!(documents[0].page_content, r#"{"Starters":{"text":"Soup"}}"#);

        let reorganized = build_documents(
            &menu_blocks(),
            "menu.pdf",
            BuildMode::Reorganized {
                include_titles: false,
                summarize: SummarizeOptions::default(),
            },
            None,
        )
        .await
        .unwrap();
        assert_eq!(reorganized.len(), 2);
        assert_eq!(reorganized[1].page_content, r#"{"Desserts":"Cake"}"#);
    }

    #[tokio::test]
    async fn summarized_reorganize_uses_the_summarizer() {
        let documents = build_documents(
            &menu_blocks(),
            "menu.pdf",
            BuildMode::Reorganized {
                include_titles: false,
                summarize: SummarizeOptions {
                    all: true,
                    ..SummarizeOptions::default()
                },
            },
            Some(&PrefixSummarizer),
        )
        .await
        .unwrap();

        assert_eq!(documents.len(), 2);
        assert_eq!(
            documents[1].page_content,
            r#"{"text":"summary: Cake","Starters":"summary: {\"text\":\"Soup\"}"}"#
        );
    }

    #[tokio::test]
    async fn strict_hierarchy_errors_surface_from_build() {
        let blocks = vec![LayoutBlock::para(1, ["orphan"])];
        let result = build_documents(
            &blocks,
            "x.pdf",
            BuildMode::Hierarchy {
                include_titles: false,
            },
            None,
        )
        .await;
        assert!(matches!(
            result,
            Err(IngestError::Build(BuildError::MissingHeader { .. }))
        ));
    }

    #[tokio::test]
    async fn summarizing_requires_a_model() {
        let options = PipelineOptions {
            mode: BuildMode::Reorganized {
                include_titles: false,
                summarize: SummarizeOptions {
                    info: true,
                    ..SummarizeOptions::default()
                },
            },
            ..PipelineOptions::default()
        };

        let without_model = pipeline(options.clone());
        assert!(matches!(
            without_model.ingest_files(&[PathBuf::from("menu.pdf")]).await,
            Err(IngestError::InvalidArgument(_))
        ));

        let with_model = pipeline(options).with_summarizer(Box::new(PrefixSummarizer));
        let report = with_model
            .ingest_files(&[PathBuf::from("menu.pdf")])
            .await
            .expect("ingestion should succeed");
        assert_eq!(report.loaded.len(), 1);
        let written = with_model.writer.written.lock().unwrap();
        assert!(written[0].nodes[0].id.starts_with(r#"{"text":"summary: Soup""#));
    }

    #[tokio::test]
    async fn files_are_extracted_and_written() {
        let pipeline = pipeline(PipelineOptions {
            create_database: true,
            ..PipelineOptions::default()
        });

        let report = pipeline
            .ingest_files(&[PathBuf::from("/data/menus/menu.pdf")])
            .await
            .expect("ingestion should succeed");

        assert_eq!(report.loaded.len(), 1);
        assert!(report.skipped_files.is_empty());
        assert_eq!(report.loaded[0].documents, 2);
        assert_eq!(report.node_count(), 2);
        assert_eq!(*pipeline.writer.ensured.lock().unwrap(), 1);

        let written = pipeline.writer.written.lock().unwrap();
        assert_eq!(written.len(), 2);
        assert_eq!(written[0].nodes[0].id, "Starters\n\nSoup");
        assert_eq!(written[1].source, "menu.pdf");
    }

    #[tokio::test]
    async fn failing_files_are_skipped_and_reported() {
        let pipeline = pipeline(PipelineOptions::default());

        let report = pipeline
            .ingest_files(&[
                PathBuf::from("broken.pdf"),
                PathBuf::from("notes.txt"),
                PathBuf::from("menu.pdf"),
            ])
            .await
            .expect("ingestion should succeed");

        assert_eq!(report.loaded.len(), 1);
        assert_eq!(report.skipped_files.len(), 2);
        assert_eq!(report.skipped_files[0].path, PathBuf::from("broken.pdf"));
        assert!(report.skipped_files[1].reason.contains("not a PDF"));
        assert_eq!(*pipeline.writer.ensured.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn empty_graphs_are_not_written() {
        let pipeline = GraphPipeline::new(
            FakeParser {
                blocks: vec![LayoutBlock::para(0, ["nothing to see"])],
            },
            FakeExtractor,
            RecordingWriter::default(),
            PipelineOptions::default(),
        );

        let loaded = pipeline.ingest_file(Path::new("quiet.pdf")).await.unwrap();
        assert_eq!(loaded.documents, 1);
        assert_eq!(loaded.nodes, 0);
        assert!(pipeline.writer.written.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn unreadable_pdf_is_skipped_when_sanitizing() -> Result<(), Box<dyn std::error::Error>>
    {
        let dir = tempdir()?;
        let path = dir.path().join("scan.pdf");
        fs::write(&path, b"%PDF-1.4\n%broken")?;

        let pipeline = pipeline(PipelineOptions {
            sanitize: true,
            ..PipelineOptions::default()
        });
        let report = pipeline.ingest_folder(dir.path()).await?;

        assert!(report.loaded.is_empty());
        assert_eq!(report.skipped_files.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn nothing_to_ingest_is_an_error() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let pipeline = pipeline(PipelineOptions::default());

        assert!(matches!(
            pipeline.ingest_folder(dir.path()).await,
            Err(IngestError::InvalidArgument(_))
        ));
        assert!(pipeline.ingest_files(&[]).await.is_err());
        Ok(())
    }
}
