use crate::error::GraphError;
use crate::graph::GraphDocument;
use crate::traits::GraphWriter;
use async_trait::async_trait;
use indexmap::IndexMap;
use reqwest::Client;
use serde_json::{json, Map, Value};
use tracing::{debug, info};

const SYSTEM_DATABASE: &str = "system";

pub struct Neo4jStore {
    endpoint: String,
    database: String,
    username: String,
    password: String,
    client: Client,
}

impl Neo4jStore {
    pub fn new(
        endpoint: impl Into<String>,
        database: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            database: database.into(),
            username: username.into(),
            password: password.into(),
            client: Client::new(),
        }
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    fn tx_url(&self, database: &str) -> String {
        format!(
            "{}/db/{}/tx/commit",
            self.endpoint.trim_end_matches('/'),
            database
        )
    }

    async fn run(&self, database: &str, statements: Vec<Value>) -> Result<Value, GraphError> {
        let response = self
            .client
            .post(self.tx_url(database))
            .basic_auth(&self.username, Some(&self.password))
            .json(&json!({ "statements": statements }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(GraphError::BackendResponse {
                backend: "neo4j".to_string(),
                details: response.status().to_string(),
            });
        }

        let body: Value = response.json().await?;
        if let Some(details) = response_errors(&body) {
            return Err(GraphError::BackendResponse {
                backend: "neo4j".to_string(),
                details,
            });
        }
        Ok(body)
    }
}

#[async_trait]
impl GraphWriter for Neo4jStore {
    async fn ensure_database(&self) -> Result<(), GraphError> {
        let name = database_name(&self.database)?;

        let body = self
            .run(
                SYSTEM_DATABASE,
                vec![json!({ "statement": "SHOW DATABASES YIELD name RETURN name" })],
            )
            .await?;

        let exists = extract_rows(&body)
            .into_iter()
            .filter_map(|row| row.get(0).and_then(Value::as_str))
            .any(|existing| existing.eq_ignore_ascii_case(name));
        if exists {
            debug!(database = name, "database already exists");
            return Ok(());
        }

        self.run(
            SYSTEM_DATABASE,
            vec![json!({
                "statement": format!("CREATE DATABASE `{name}` IF NOT EXISTS WAIT")
            })],
        )
        .await?;
        info!(database = name, "created database");
        Ok(())
    }

    async fn write_graph(&self, document: &GraphDocument) -> Result<(), GraphError> {
        if document.is_empty() {
            return Ok(());
        }

        let statements = graph_statements(document)?;
        let statement_count = statements.len();
        self.run(&self.database, statements).await?;

        debug!(
            source = %document.source,
            statements = statement_count,
            nodes = document.nodes.len(),
            relationships = document.relationships.len(),
            "wrote graph"
        );
        Ok(())
    }
}

pub fn graph_statements(document: &GraphDocument) -> Result<Vec<Value>, GraphError> {
    let mut nodes_by_label: IndexMap<String, Vec<Value>> = IndexMap::new();
    for node in &document.nodes {
        nodes_by_label
            .entry(cypher_identifier(&node.kind)?)
            .or_default()
            .push(json!({
                "id": node.id,
                "properties": storable_properties(&node.properties),
            }));
    }

    let mut relationships_by_shape: IndexMap<(String, String, String), Vec<Value>> =
        IndexMap::new();
    for relationship in &document.relationships {
        let shape = (
            cypher_identifier(&relationship.source.kind)?,
            cypher_identifier(&relationship.kind)?,
            cypher_identifier(&relationship.target.kind)?,
        );
        relationships_by_shape.entry(shape).or_default().push(json!({
            "source": relationship.source.id,
            "target": relationship.target.id,
            "properties": storable_properties(&relationship.properties),
        }));
    }

    let mut statements = Vec::new();
    for (label, rows) in &nodes_by_label {
        statements.push(json!({
            "statement": format!(
                "UNWIND $rows AS row MERGE (n:{label} {{id: row.id}}) SET n += row.properties"
            ),
            "parameters": { "rows": rows },
        }));
    }

    for ((source, kind, target), rows) in &relationships_by_shape {
        statements.push(json!({
            "statement": format!(
                "UNWIND $rows AS row \
                 MERGE (s:{source} {{id: row.source}}) \
                 MERGE (t:{target} {{id: row.target}}) \
                 MERGE (s)-[r:{kind}]->(t) \
                 SET r += row.properties"
            ),
            "parameters": { "rows": rows },
        }));
    }

    if !document.source.is_empty() {
        for (label, rows) in &nodes_by_label {
            let ids = rows
                .iter()
                .filter_map(|row| row.get("id").cloned())
                .collect::<Vec<_>>();
            statements.push(json!({
                "statement": format!(
                    "MERGE (d:Document {{source: $source}}) \
                     WITH d UNWIND $ids AS id \
                     MATCH (n:{label} {{id: id}}) \
                     MERGE (d)-[:MENTIONS]->(n)"
                ),
                "parameters": { "source": document.source, "ids": ids },
            }));
        }
    }

    Ok(statements)
}

pub fn cypher_identifier(name: &str) -> Result<String, GraphError> {
    let valid = !name.is_empty() && name.chars().all(|c| c.is_alphanumeric() || c == '_');
    if valid {
        Ok(format!("`{name}`"))
    } else {
        Err(GraphError::InvalidIdentifier(name.to_string()))
    }
}

fn database_name(name: &str) -> Result<&str, GraphError> {
    let valid = name.chars().next().is_some_and(|c| c.is_ascii_alphabetic())
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-');
    if valid {
        Ok(name)
    } else {
        Err(GraphError::InvalidIdentifier(name.to_string()))
    }
}

// Nested values are stored as JSON text.
fn storable_properties(properties: &Map<String, Value>) -> Map<String, Value> {
    properties
        .iter()
        .filter(|(_, value)| !value.is_null())
        .map(|(key, value)| {
            let stored = match value {
                Value::Object(_) => Value::String(value.to_string()),
                Value::Array(items) if items.iter().any(|item| item.is_object() || item.is_array()) => {
                    Value::String(value.to_string())
                }
                _ => value.clone(),
            };
            (key.clone(), stored)
        })
        .collect()
}

fn response_errors(payload: &Value) -> Option<String> {
    let errors = payload.get("errors").and_then(Value::as_array)?;
    if errors.is_empty() {
        return None;
    }
    let details = errors
        .iter()
        .map(|error| {
            let code = error.get("code").and_then(Value::as_str).unwrap_or("unknown");
            let message = error.get("message").and_then(Value::as_str).unwrap_or_default();
            format!("{code}: {message}")
        })
        .collect::<Vec<_>>()
        .join("; ");
    Some(details)
}

fn extract_rows(payload: &Value) -> Vec<&Value> {
    let data = payload.pointer("/results").and_then(Value::as_array);
    match data {
        Some(results) => results
            .iter()
            .filter_map(|result| result.pointer("/data").and_then(Value::as_array))
            .flat_map(|result_rows| result_rows.iter().filter_map(row_values))
            .collect(),
        None => payload
            .pointer("/data")
            .and_then(Value::as_array)
            .map(|rows| rows.iter().filter_map(row_values).collect())
            .unwrap_or_default(),
    }
}

fn row_values(entry: &Value) -> Option<&Value> {
    entry
        .pointer("/row")
        .or(Some(entry))
        .filter(|candidate| candidate.is_array())
}
