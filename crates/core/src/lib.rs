pub mod dedupe;
pub mod documents;
pub mod error;
pub mod extractor;
pub mod graph;
pub mod hierarchy;
pub mod layout;
pub mod loader;
pub mod models;
pub mod pipeline;
pub mod sanitize;
pub mod sections;
pub mod stores;
pub mod traits;

pub use dedupe::remove_duplicate_titles;
pub use documents::{
    hierarchy_documents, reorganize_hierarchy, reorganized_documents, section_documents,
    summarize_reorganized, DynSummarizer,
};
pub use error::{BlockError, BuildError, GraphError, IngestError};
pub use extractor::{build_summary_prompt, parse_graph_reply, ChatEndpointConfig, ChatExtractor};
pub use graph::{
    AllowedRelationship, GraphDocument, GraphNode, GraphRelationship, GraphSchema, PropertyFilter,
};
pub use hierarchy::{
    build_hierarchy, build_titled_hierarchy, get_hierarchical_representation, HeaderStack,
    HierarchyNode, NodeValue,
};
pub use layout::{blocks_from_response, normalize_block, normalize_blocks};
pub use loader::{
    discover_pdf_files, ensure_pdf, LoaderOptions, Provider, SherpaClient, DEFAULT_LAYOUT_API_URL,
};
pub use models::{
    BlockTag, BuildMode, LayoutBlock, PipelineOptions, SourceDocument, SummarizeOptions,
};
pub use pipeline::{build_documents, GraphPipeline, IngestionReport, LoadedPdf, SkippedPdf};
pub use sanitize::{sanitize_key, sanitize_pdf, strip_invalid_utf8};
pub use sections::{build_flat_sections, Section, SectionFold, SectionMap, SectionMetadata};
pub use stores::Neo4jStore;
pub use traits::{EntityExtractor, GraphWriter, LayoutParser, Summarizer};
