use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub properties: Map<String, Value>,
}

impl GraphNode {
    pub fn new(id: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            properties: Map::new(),
        }
    }

    fn identity(&self) -> (String, String) {
        (self.id.clone(), self.kind.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphRelationship {
    pub source: GraphNode,
    pub target: GraphNode,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub properties: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphDocument {
    #[serde(default)]
    pub nodes: Vec<GraphNode>,
    #[serde(default)]
    pub relationships: Vec<GraphRelationship>,
    #[serde(default)]
    pub source: String,
}

impl GraphDocument {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.relationships.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AllowedRelationship {
    Type(String),
    Triple(String, String, String),
}

impl AllowedRelationship {
    pub fn kind(&self) -> &str {
        match self {
            Self::Type(kind) | Self::Triple(_, kind, _) => kind,
        }
    }

    fn permits(&self, relationship: &GraphRelationship) -> bool {
        match self {
            Self::Type(kind) => kind.eq_ignore_ascii_case(&relationship.kind),
            Self::Triple(source, kind, target) => {
                kind.eq_ignore_ascii_case(&relationship.kind)
                    && source.eq_ignore_ascii_case(&relationship.source.kind)
                    && target.eq_ignore_ascii_case(&relationship.target.kind)
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum PropertyFilter {
    #[default]
    Drop,
    Keep,
    Only(Vec<String>),
}

impl PropertyFilter {
    pub fn names(&self) -> &[String] {
        match self {
            Self::Only(names) => names,
            Self::Drop | Self::Keep => &[],
        }
    }

    fn apply(&self, properties: &mut Map<String, Value>) {
        match self {
            Self::Drop => properties.clear(),
            Self::Keep => {}
            Self::Only(names) => properties.retain(|key, _| names.iter().any(|name| name == key)),
        }
    }
}

// Empty allow-lists allow everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GraphSchema {
    pub allowed_nodes: Vec<String>,
    pub allowed_relationships: Vec<AllowedRelationship>,
    pub node_properties: PropertyFilter,
    pub relationship_properties: PropertyFilter,
}

impl GraphSchema {
    fn allows_node(&self, kind: &str) -> bool {
        self.allowed_nodes.is_empty()
            || self
                .allowed_nodes
                .iter()
                .any(|allowed| allowed.eq_ignore_ascii_case(kind))
    }

    fn allows_relationship(&self, relationship: &GraphRelationship) -> bool {
        if !self.allows_node(&relationship.source.kind)
            || !self.allows_node(&relationship.target.kind)
        {
            return false;
        }
        self.allowed_relationships.is_empty()
            || self
                .allowed_relationships
                .iter()
                .any(|allowed| allowed.permits(relationship))
    }

    pub fn apply(&self, mut document: GraphDocument) -> GraphDocument {
        for node in &mut document.nodes {
            canonicalize_node(node);
        }
        for relationship in &mut document.relationships {
            canonicalize_node(&mut relationship.source);
            canonicalize_node(&mut relationship.target);
            relationship.kind = relationship_type(&relationship.kind);
        }

        let mut seen = HashSet::new();
        let mut nodes = Vec::new();
        for mut node in document.nodes {
            if node.id.is_empty()
                || !self.allows_node(&node.kind)
                || !seen.insert(node.identity())
            {
                continue;
            }
            self.node_properties.apply(&mut node.properties);
            nodes.push(node);
        }

        let mut relationships = Vec::new();
        for mut relationship in document.relationships {
            if relationship.source.id.is_empty()
                || relationship.target.id.is_empty()
                || !self.allows_relationship(&relationship)
            {
                continue;
            }
            relationship.source.properties.clear();
            relationship.target.properties.clear();
            self.relationship_properties.apply(&mut relationship.properties);

            for endpoint in [&relationship.source, &relationship.target] {
                if seen.insert(endpoint.identity()) {
                    nodes.push(GraphNode::new(endpoint.id.clone(), endpoint.kind.clone()));
                }
            }
            if !relationships.contains(&relationship) {
                relationships.push(relationship);
            }
        }

        GraphDocument {
            nodes,
            relationships,
            source: document.source,
        }
    }
}

fn canonicalize_node(node: &mut GraphNode) {
    node.id = node.id.trim().to_string();
    node.kind = node_type(&node.kind);
}

pub fn node_type(raw: &str) -> String {
    raw.split(|c: char| c.is_whitespace() || c == '_' || c == '-')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect()
}

pub fn relationship_type(raw: &str) -> String {
    raw.split(|c: char| c.is_whitespace() || c == '-' || c == '_')
        .filter(|part| !part.is_empty())
        .map(str::to_uppercase)
        .collect::<Vec<_>>()
        .join("_")
}
