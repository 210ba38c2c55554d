use crate::error::GraphError;
use crate::graph::{AllowedRelationship, GraphDocument, GraphSchema};
use crate::models::SourceDocument;
use crate::traits::{EntityExtractor, Summarizer};
use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const DEFAULT_CHAT_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";
pub const DEFAULT_CHAT_MODEL: &str = "gpt-4o";
const FENCED_JSON_PATTERN: &str = r"(?s)```(?:json)?\s*(.*?)\s*```";

#[derive(Debug, Clone, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Clone, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Clone)]
pub struct ChatEndpointConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub model: String,
}

impl Default for ChatEndpointConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_CHAT_ENDPOINT.to_string(),
            api_key: None,
            model: DEFAULT_CHAT_MODEL.to_string(),
        }
    }
}

#[derive(Clone)]
pub struct ChatExtractor {
    client: Client,
    config: ChatEndpointConfig,
    schema: GraphSchema,
    additional_prompt: Option<String>,
}

impl ChatExtractor {
    pub fn new(config: ChatEndpointConfig, schema: GraphSchema) -> Self {
        Self {
            client: Client::new(),
            config,
            schema,
            additional_prompt: None,
        }
    }

    pub fn with_additional_prompt(mut self, prompt: impl Into<String>) -> Self {
        let prompt = prompt.into();
        self.additional_prompt = (!prompt.trim().is_empty()).then_some(prompt);
        self
    }

    pub fn system_prompt(&self) -> String {
        build_system_prompt(&self.schema, self.additional_prompt.as_deref())
    }

    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        response_format: Option<ResponseFormat>,
    ) -> Result<String, GraphError> {
        let payload = ChatRequest {
            model: &self.config.model,
            temperature: 0.0,
            messages,
            response_format,
        };

        let mut request = self
            .client
            .post(&self.config.endpoint)
            .header("content-type", "application/json")
            .json(&payload);

        if let Some(api_key) = &self.config.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request.send().await?;

        if !response.status().is_success() {
            return Err(GraphError::BackendResponse {
                backend: "llm".to_string(),
                details: format!("{} returned {}", self.config.endpoint, response.status()),
            });
        }

        let reply: ChatResponse = response.json().await?;
        reply
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| GraphError::Extraction("reply has no choices".to_string()))
    }
}

#[async_trait]
impl EntityExtractor for ChatExtractor {
    async fn extract_graph(&self, document: &SourceDocument) -> Result<GraphDocument, GraphError> {
        let messages = vec![
            ChatMessage {
                role: "system".to_string(),
                content: self.system_prompt(),
            },
            ChatMessage {
                role: "user".to_string(),
                content: format!(
                    "Extract entities and relationships from this document:\n<document>\n{}\n</document>",
                    document.page_content
                ),
            },
        ];
        let content = self
            .complete(
                messages,
                Some(ResponseFormat {
                    kind: "json_object",
                }),
            )
            .await?;

        let mut graph = parse_graph_reply(&content)?;
        graph.source = document.source().to_string();
        let graph = self.schema.apply(graph);

        debug!(
            source = %graph.source,
            nodes = graph.nodes.len(),
            relationships = graph.relationships.len(),
            "extracted graph"
        );
        Ok(graph)
    }
}

#[async_trait]
impl Summarizer for ChatExtractor {
    async fn summarize(&self, text: &str) -> Result<String, GraphError> {
        let messages = vec![ChatMessage {
            role: "user".to_string(),
            content: build_summary_prompt(text, self.additional_prompt.as_deref()),
        }];
        let summary = self.complete(messages, None).await?;
        debug!(input_chars = text.len(), summary_chars = summary.len(), "summarized text");
        Ok(summary.trim().to_string())
    }
}

pub fn build_summary_prompt(text: &str, additional_prompt: Option<&str>) -> String {
    format!(
        "You are a top-tier algorithm able to summarize the text. Be clear and concise when \
         summarizing the text. Extract all the relevant information as they will be used to \
         construct a graph DB.Here is the text to summarize:<document>{text}</document>{}",
        additional_prompt.unwrap_or_default()
    )
}

pub fn build_system_prompt(schema: &GraphSchema, additional_prompt: Option<&str>) -> String {
    let mut prompt = String::from(
        "You are a top tier algorithm designed for extracting information in structured formats \
         to build a knowledge graph. Extract entities (nodes) and the relationships between them \
         from the given document. Do not add any information that is not explicitly mentioned.\n",
    );

    if !schema.allowed_nodes.is_empty() {
        prompt.push_str(&format!(
            "Allowed node types: {}.\n",
            schema.allowed_nodes.join(", ")
        ));
    }
    if !schema.allowed_relationships.is_empty() {
        let relationships = schema
            .allowed_relationships
            .iter()
            .map(|allowed| match allowed {
                AllowedRelationship::Type(kind) => kind.clone(),
                AllowedRelationship::Triple(source, kind, target) => {
                    format!("({source})-[{kind}]->({target})")
                }
            })
            .collect::<Vec<_>>();
        prompt.push_str(&format!(
            "Allowed relationship types: {}.\n",
            relationships.join(", ")
        ));
    }
    if !schema.node_properties.names().is_empty() {
        prompt.push_str(&format!(
            "Allowed node properties: {}.\n",
            schema.node_properties.names().join(", ")
        ));
    }
    if !schema.relationship_properties.names().is_empty() {
        prompt.push_str(&format!(
            "Allowed relationship properties: {}.\n",
            schema.relationship_properties.names().join(", ")
        ));
    }

    prompt.push_str(
        "Answer only with a JSON object of the form \
         {\"nodes\": [{\"id\": \"...\", \"type\": \"...\", \"properties\": {}}], \
         \"relationships\": [{\"source\": {\"id\": \"...\", \"type\": \"...\"}, \
         \"target\": {\"id\": \"...\", \"type\": \"...\"}, \"type\": \"...\", \"properties\": {}}]}. \
         Use human-readable names as node ids.\n",
    );

    if let Some(extra) = additional_prompt {
        prompt.push_str(extra);
        prompt.push('\n');
    }

    prompt
}

pub fn parse_graph_reply(content: &str) -> Result<GraphDocument, GraphError> {
    let fence = Regex::new(FENCED_JSON_PATTERN)?;
    let trimmed = content.trim();
    let body = fence
        .captures(trimmed)
        .and_then(|capture| capture.get(1))
        .map(|body| body.as_str())
        .unwrap_or(trimmed);

    if body.is_empty() {
        return Err(GraphError::Extraction("reply is empty".to_string()));
    }

    serde_json::from_str(body).map_err(|error| GraphError::Extraction(error.to_string()))
}
