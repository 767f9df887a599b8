//! Source aggregation and suggestion filtering.
//!
//! This module unifies entities and relationships from the three raw
//! sources, and provides the confidence filters applied when presenting
//! suggestions.

use crate::models::{EntitySuggestion, RelationSuggestion};
use crate::sources::{AggregatedEntity, RawRelationship, SourceAnalysis, SourceData, SourceKind};
use std::cmp::Ordering;
use indexmap::IndexMap;
use std::collections::BTreeMap;
use tracing::debug;

/// Cardinality assigned to relationships derived from foreign keys.
const FOREIGN_KEY_CARDINALITY: &str = "N:1";

/// Merge entities from all sources into one map keyed by name.
///
/// Sources are visited in the order datapedia, conceptual, schema. The first
/// source to define a name keeps it; later definitions are dropped whole.
/// Names keep the order in which they were first seen.
pub fn aggregate_entities(data: &SourceData) -> IndexMap<String, AggregatedEntity> {
    let mut entities: IndexMap<String, AggregatedEntity> = IndexMap::new();

    for (name, entity) in &data.datapedia.entities {
        entities
            .entry(name.clone())
            .or_insert_with(|| AggregatedEntity {
                source: SourceKind::Datapedia,
                attributes: entity.attributes.clone(),
                description: entity.definition.clone(),
            });
    }

    for (name, entity) in &data.conceptual_model.entities {
        entities
            .entry(name.clone())
            .or_insert_with(|| AggregatedEntity {
                source: SourceKind::Conceptual,
                attributes: entity.attributes.clone(),
                description: entity.description.clone(),
            });
    }

    for (name, table) in &data.schema.tables {
        entities
            .entry(name.clone())
            .or_insert_with(|| AggregatedEntity {
                source: SourceKind::Schema,
                attributes: table.columns.iter().map(|c| c.name.clone()).collect(),
                description: table.description.clone(),
            });
    }

    entities
}

/// Collect relationships from all sources.
///
/// Explicit datapedia relationships come first, then conceptual ones, then
/// one `foreign_key` relationship per schema column carrying a reference,
/// pointing from the table to the referenced table.
pub fn extract_relationships(data: &SourceData) -> Vec<RawRelationship> {
    let explicit = [
        (SourceKind::Datapedia, &data.datapedia.relationships),
        (SourceKind::Conceptual, &data.conceptual_model.relationships),
    ];

    let mut relationships: Vec<RawRelationship> = explicit
        .into_iter()
        .flat_map(|(origin, records)| {
            records.iter().map(move |r| RawRelationship {
                origin,
                source_entity: r.source_entity.clone(),
                target_entity: r.target_entity.clone(),
                relation_type: r.relation_type.clone(),
                cardinality: r.cardinality.clone(),
                description: r.description.clone(),
            })
        })
        .collect();

    for (table_name, table) in &data.schema.tables {
        for column in &table.columns {
            if let Some(fk) = &column.foreign_key {
                relationships.push(RawRelationship {
                    origin: SourceKind::Schema,
                    source_entity: table_name.clone(),
                    target_entity: fk.table.clone(),
                    relation_type: "foreign_key".to_string(),
                    cardinality: Some(FOREIGN_KEY_CARDINALITY.to_string()),
                    description: None,
                });
            }
        }
    }

    relationships
}

/// Run the pure aggregation over a catalog. The narrative is left empty.
pub fn aggregate(data: SourceData) -> SourceAnalysis {
    let entities = aggregate_entities(&data);
    let relationships = extract_relationships(&data);

    debug!(
        "Aggregated {} entities and {} relationships",
        entities.len(),
        relationships.len()
    );

    SourceAnalysis {
        raw_data: data,
        analysis: String::new(),
        entities,
        relationships,
    }
}

/// Turn aggregated catalog entities into full-confidence suggestions.
pub fn catalog_suggestions(analysis: &SourceAnalysis) -> Vec<EntitySuggestion> {
    analysis
        .entities
        .iter()
        .map(|(name, entity)| EntitySuggestion {
            name: name.clone(),
            attributes: entity.attributes.clone(),
            source: entity.source.to_string(),
            confidence: 1.0,
            description: if entity.description.is_empty() {
                format!("{} entity from {}", name, entity.source)
            } else {
                entity.description.clone()
            },
        })
        .collect()
}

fn by_confidence_desc(a: f64, b: f64) -> Ordering {
    b.partial_cmp(&a).unwrap_or(Ordering::Equal)
}

/// Entities at or above the threshold, highest confidence first.
pub fn filter_entities(entities: &[EntitySuggestion], threshold: f64) -> Vec<EntitySuggestion> {
    let mut kept: Vec<EntitySuggestion> = entities
        .iter()
        .filter(|e| e.confidence >= threshold)
        .cloned()
        .collect();

    kept.sort_by(|a, b| by_confidence_desc(a.confidence, b.confidence));
    kept
}

/// Relations at or above the threshold, highest confidence first.
pub fn filter_relations(
    relations: &[RelationSuggestion],
    threshold: f64,
) -> Vec<RelationSuggestion> {
    let mut kept: Vec<RelationSuggestion> = relations
        .iter()
        .filter(|r| r.confidence >= threshold)
        .cloned()
        .collect();

    kept.sort_by(|a, b| by_confidence_desc(a.confidence, b.confidence));
    kept
}

/// Count aggregated entities per winning source.
pub fn source_distribution(analysis: &SourceAnalysis) -> BTreeMap<SourceKind, usize> {
    let mut dist: BTreeMap<SourceKind, usize> = BTreeMap::new();

    for entity in analysis.entities.values() {
        *dist.entry(entity.source).or_default() += 1;
    }

    dist
}
