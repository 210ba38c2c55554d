use crate::error::IngestError;
use crate::layout::blocks_from_response;
use crate::models::LayoutBlock;
use crate::traits::LayoutParser;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::debug;
use url::Url;
use walkdir::WalkDir;

pub const DEFAULT_LAYOUT_API_URL: &str =
    "http://localhost:5010/api/parseDocument?renderFormat=all";

// Only the llmsherpa block format is understood; other names are rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    LlmSherpa,
}

impl FromStr for Provider {
    type Err = IngestError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "llmsherpa" => Ok(Self::LlmSherpa),
            other => Err(IngestError::UnsupportedProvider(other.to_string())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoaderOptions {
    pub api_url: String,
    pub apply_ocr: bool,
    pub new_indent_parser: bool,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_LAYOUT_API_URL.to_string(),
            apply_ocr: false,
            new_indent_parser: false,
        }
    }
}

pub fn ensure_pdf(path: &Path) -> Result<(), IngestError> {
    let is_pdf = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));

    if is_pdf {
        Ok(())
    } else {
        Err(IngestError::UnsupportedFileType(path.display().to_string()))
    }
}

pub fn discover_pdf_files(folder: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for entry in WalkDir::new(folder)
        .into_iter()
        .filter_map(|item| item.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }

        if ensure_pdf(entry.path()).is_ok() {
            files.push(entry.path().to_path_buf());
        }
    }

    files.sort_unstable();
    files
}

pub struct SherpaClient {
    client: Client,
    options: LoaderOptions,
}

impl SherpaClient {
    pub fn new(options: LoaderOptions) -> Self {
        Self {
            client: Client::new(),
            options,
        }
    }

    pub fn request_url(&self) -> Result<Url, IngestError> {
        let mut url = Url::parse(&self.options.api_url)?;
        if self.options.apply_ocr {
            url.query_pairs_mut().append_pair("applyOcr", "yes");
        }
        if self.options.new_indent_parser {
            url.query_pairs_mut().append_pair("useNewIndentParser", "true");
        }
        Ok(url)
    }
}

#[async_trait]
impl LayoutParser for SherpaClient {
    async fn parse_layout(&self, path: &Path) -> Result<Vec<LayoutBlock>, IngestError> {
        ensure_pdf(path)?;

        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| "document.pdf".to_string());
        let bytes = tokio::fs::read(path).await?;
        let part = Part::bytes(bytes)
            .file_name(file_name)
            .mime_str("application/pdf")?;
        let form = Form::new().part("file", part);

        let url = self.request_url()?;
        let response = self
            .client
            .post(url.clone())
            .multipart(form)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(IngestError::LayoutService(format!(
                "layout request to {url} returned {}",
                response.status()
            )));
        }

        let payload: Value = response.json().await?;
        let blocks = blocks_from_response(&payload)?;
        debug!(
            path = %path.display(),
            block_count = blocks.len(),
            "parsed layout"
        );
        Ok(blocks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{self, File};
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn discover_pdf_files_is_recursive() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let base = dir.path();
        let nested = base.join("nested");
        fs::create_dir(&nested)?;

        File::create(base.join("a.pdf")).and_then(|mut file| file.write_all(b"%PDF-1.4\n%fake"))?;
        File::create(nested.join("b.PDF"))
            .and_then(|mut file| file.write_all(b"%PDF-1.4\n%fake"))?;
        fs::write(base.join("notes.txt"), b"skip me")?;

        let files = discover_pdf_files(base);
        assert_eq!(files.len(), 2);
        Ok(())
    }

    #[test]
    fn non_pdf_files_are_rejected() {
        assert!(ensure_pdf(Path::new("menu.pdf")).is_ok());
        assert!(matches!(
            ensure_pdf(Path::new("menu.docx")),
            Err(IngestError::UnsupportedFileType(_))
        ));
        assert!(ensure_pdf(Path::new("menu")).is_err());
    }

    #[test]
    fn unknown_provider_is_rejected() {
        assert_eq!("LLMSherpa".parse::<Provider>().ok(), Some(Provider::LlmSherpa));
        assert!(matches!(
            "langchain".parse::<Provider>(),
            Err(IngestError::UnsupportedProvider(name)) if name == "langchain"
        ));
    }

    #[test]
    fn request_url_carries_parser_flags() -> Result<(), IngestError> {
        let plain = SherpaClient::new(LoaderOptions::default()).request_url()?;
        assert_eq!(plain.as_str(), DEFAULT_LAYOUT_API_URL);

        let flagged = SherpaClient::new(LoaderOptions {
            apply_ocr: true,
            new_indent_parser: true,
            ..LoaderOptions::default()
        })
        .request_url()?;
        assert_eq!(
            flagged.query(),
            Some("renderFormat=all&applyOcr=yes&useNewIndentParser=true")
        );
        Ok(())
    }

    #[tokio::test]
    async fn parsing_rejects_non_pdf_before_any_request() {
        let client = SherpaClient::new(LoaderOptions::default());
        let result = client.parse_layout(Path::new("/tmp/menu.txt")).await;
        assert!(matches!(result, Err(IngestError::UnsupportedFileType(_))));
    }
}
