use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BlockError {
    #[error("layout record is not an object")]
    NotAnObject,

    #[error("layout record has no tag")]
    MissingTag,

    #[error("layout record has no level")]
    MissingLevel,

    #[error("invalid level {0}: expected a non-negative integer")]
    InvalidLevel(String),

    #[error("invalid {field}: {details}")]
    InvalidField { field: &'static str, details: String },

    #[error("header block has no text")]
    EmptyHeader,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BuildError {
    #[error("block {block_index}: no header seen for level {level}")]
    MissingHeader { level: u32, block_index: usize },

    #[error("block {block_index}: key {key:?} already holds text and cannot be descended into")]
    ShapeConflict { key: String, block_index: usize },
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("pdf error: {0}")]
    Pdf(String),

    #[error("unsupported file type: {0} is not a PDF file")]
    UnsupportedFileType(String),

    #[error("unsupported provider: {0}")]
    UnsupportedProvider(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("layout service failed: {0}")]
    LayoutService(String),

    #[error("invalid layout block at index {index}: {source}")]
    Block {
        index: usize,
        #[source]
        source: BlockError,
    },

    #[error("hierarchy build failed: {0}")]
    Build(#[from] BuildError),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("graph store failed: {0}")]
    Graph(#[from] GraphError),
}

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("invalid response from {backend}: {details}")]
    BackendResponse { backend: String, details: String },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("regex error: {0}")]
    RegexError(#[from] regex::Error),

    #[error("extraction reply could not be used: {0}")]
    Extraction(String),

    #[error("invalid identifier for cypher: {0}")]
    InvalidIdentifier(String),
}
