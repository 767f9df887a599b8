//! Raw data sources and the provider that loads them.
//!
//! The catalog arrives as one JSON document with three sections: the
//! datapedia, the conceptual model and the physical schema. Every key inside
//! a section is optional and defaults to empty.

use crate::error::SourceDataError;
use async_trait::async_trait;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Which raw source a record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Datapedia,
    Conceptual,
    Schema,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Datapedia => write!(f, "datapedia"),
            SourceKind::Conceptual => write!(f, "conceptual"),
            SourceKind::Schema => write!(f, "schema"),
        }
    }
}

/// The full catalog document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceData {
    #[serde(default)]
    pub datapedia: Datapedia,
    #[serde(default)]
    pub conceptual_model: ConceptualModel,
    #[serde(default)]
    pub schema: Schema,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Datapedia {
    #[serde(default)]
    pub entities: IndexMap<String, DatapediaEntity>,
    #[serde(default)]
    pub relationships: Vec<RelationshipRecord>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatapediaEntity {
    #[serde(default)]
    pub attributes: Vec<String>,
    #[serde(default, alias = "description")]
    pub definition: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConceptualModel {
    #[serde(default, alias = "business_concepts")]
    pub entities: IndexMap<String, ConceptualEntity>,
    #[serde(default)]
    pub relationships: Vec<RelationshipRecord>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConceptualEntity {
    #[serde(default)]
    pub attributes: Vec<String>,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    #[serde(default)]
    pub tables: IndexMap<String, Table>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Table {
    #[serde(default)]
    pub columns: Vec<Column>,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Column {
    #[serde(default)]
    pub name: String,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub data_type: Option<String>,
    #[serde(default)]
    pub primary_key: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub foreign_key: Option<ForeignKey>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ForeignKey {
    pub table: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
}

/// An explicit relationship as written in the datapedia or conceptual model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "RelationshipDocument")]
pub struct RelationshipRecord {
    pub source_entity: String,
    pub target_entity: String,
    #[serde(rename = "type")]
    pub relation_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cardinality: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Relationship keys as they appear on the wire. Exported catalogs may carry
/// both `source` (the origin tag) and `source_entity`; the explicit
/// `*_entity` and `type` keys win over their short forms.
#[derive(Deserialize)]
struct RelationshipDocument {
    #[serde(default)]
    source_entity: Option<String>,
    #[serde(default)]
    source: Option<String>,
    #[serde(default)]
    target_entity: Option<String>,
    #[serde(default)]
    target: Option<String>,
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    relation_type: Option<String>,
    #[serde(default)]
    cardinality: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

impl From<RelationshipDocument> for RelationshipRecord {
    fn from(doc: RelationshipDocument) -> Self {
        Self {
            source_entity: doc.source_entity.or(doc.source).unwrap_or_default(),
            target_entity: doc.target_entity.or(doc.target).unwrap_or_default(),
            relation_type: doc.kind.or(doc.relation_type).unwrap_or_default(),
            cardinality: doc.cardinality,
            description: doc.description,
        }
    }
}

/// An entity after aggregation, tagged with the source that won.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedEntity {
    pub source: SourceKind,
    pub attributes: Vec<String>,
    pub description: String,
}

/// A relationship after extraction. Endpoints are not checked here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRelationship {
    pub origin: SourceKind,
    pub source_entity: String,
    pub target_entity: String,
    pub relation_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cardinality: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Output of the aggregate stage. Read-only input to every later stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceAnalysis {
    pub raw_data: SourceData,
    /// Model-written narrative of the raw sources; empty when disabled.
    pub analysis: String,
    pub entities: IndexMap<String, AggregatedEntity>,
    pub relationships: Vec<RawRelationship>,
}

/// Provider of the raw catalog document.
#[async_trait]
pub trait DataSource: Send + Sync {
    async fn get_data(&self) -> Result<SourceData, SourceDataError>;
}

/// Reads the catalog from a JSON file on every call.
#[derive(Debug, Clone)]
pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl DataSource for JsonFileSource {
    async fn get_data(&self) -> Result<SourceData, SourceDataError> {
        debug!("Reading data source from {}", self.path.display());

        let content = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|source| SourceDataError::Io {
                path: self.path.clone(),
                source,
            })?;

        Ok(serde_json::from_str(&content)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_missing_sections_default_to_empty() {
        let data: SourceData = serde_json::from_str(r#"{"datapedia": {}}"#).unwrap();
        assert!(data.datapedia.entities.is_empty());
        assert!(data.conceptual_model.relationships.is_empty());
        assert!(data.schema.tables.is_empty());
    }

    #[test]
    fn test_aliases() {
        let data: SourceData = serde_json::from_str(
            r#"{
                "datapedia": {"entities": {"Customer": {"description": "A bank customer"}}},
                "conceptual_model": {"business_concepts": {"Policy": {"attributes": ["number"]}}}
            }"#,
        )
        .unwrap();

        assert_eq!(data.datapedia.entities["Customer"].definition, "A bank customer");
        assert_eq!(
            data.conceptual_model.entities["Policy"].attributes,
            vec!["number"]
        );
    }

    #[test]
    fn test_relationship_record_fields() {
        let record: RelationshipRecord = serde_json::from_str(
            r#"{"source": "Customer", "target": "Account", "type": "owns", "cardinality": "1:N"}"#,
        )
        .unwrap();

        assert_eq!(record.source_entity, "Customer");
        assert_eq!(record.target_entity, "Account");
        assert_eq!(record.relation_type, "owns");
        assert_eq!(record.cardinality.as_deref(), Some("1:N"));
        assert!(record.description.is_none());
    }

    #[test]
    fn test_relationship_record_with_origin_tag() {
        let data: SourceData = serde_json::from_str(
            r#"{"datapedia": {"relationships": [
                {"source": "datapedia", "source_entity": "Customer", "target_entity": "Account",
                 "type": "owns", "relation_type": "ownership", "cardinality": "1:N"}
            ]}}"#,
        )
        .unwrap();

        let record = &data.datapedia.relationships[0];
        assert_eq!(record.source_entity, "Customer");
        assert_eq!(record.target_entity, "Account");
        assert_eq!(record.relation_type, "owns");
    }

    #[test]
    fn test_relationship_record_relation_type_key() {
        let record: RelationshipRecord =
            serde_json::from_str(r#"{"source_entity": "A", "target": "B", "relation_type": "refs"}"#)
                .unwrap();
        assert_eq!(record.target_entity, "B");
        assert_eq!(record.relation_type, "refs");
    }

    #[test]
    fn test_source_kind_display() {
        assert_eq!(SourceKind::Datapedia.to_string(), "datapedia");
        assert_eq!(SourceKind::Conceptual.to_string(), "conceptual");
        assert_eq!(SourceKind::Schema.to_string(), "schema");
    }

    #[tokio::test]
    async fn test_json_file_source_reads_document() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"schema": {{"tables": {{"accounts": {{"columns": [{{"name": "id"}}]}}}}}}}}"#
        )
        .unwrap();

        let source = JsonFileSource::new(file.path());
        let data = source.get_data().await.unwrap();
        assert_eq!(data.schema.tables["accounts"].columns[0].name, "id");
    }

    #[tokio::test]
    async fn test_json_file_source_missing_file() {
        let source = JsonFileSource::new("/nonexistent/catalog.json");
        let err = source.get_data().await.unwrap_err();
        assert!(matches!(err, SourceDataError::Io { .. }));
    }

    #[tokio::test]
    async fn test_json_file_source_malformed_document() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();

        let err = JsonFileSource::new(file.path()).get_data().await.unwrap_err();
        assert!(matches!(err, SourceDataError::Decode(_)));
    }

    #[test]
    fn test_entities_keep_document_order() {
        let data: SourceData = serde_json::from_str(
            r#"{
                "datapedia": {"entities": {"Zone": {}, "Account": {}, "Money": {}}},
                "schema": {"tables": {"users": {}, "accounts": {}}}
            }"#,
        )
        .unwrap();

        let names: Vec<&str> = data.datapedia.entities.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["Zone", "Account", "Money"]);
        let tables: Vec<&str> = data.schema.tables.keys().map(String::as_str).collect();
        assert_eq!(tables, vec!["users", "accounts"]);
    }

    #[tokio::test]
    async fn test_fixture_catalog_parses() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures/bank_catalog.json");
        let data = JsonFileSource::new(path).get_data().await.unwrap();
        assert!(data.datapedia.entities.contains_key("Customer"));
        assert!(data.schema.tables.contains_key("accounts"));
    }
}
