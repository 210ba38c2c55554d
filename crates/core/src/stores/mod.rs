pub mod neo4j;

pub use neo4j::{cypher_identifier, graph_statements, Neo4jStore};
