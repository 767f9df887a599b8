//! Data models for entity and relationship suggestions.
//!
//! This module contains the suggestion types produced by the pipeline,
//! their field invariants, and the batch operations over them: validation,
//! cross-source merging and relation inversion.

use crate::agent::frameworks::FrameworkAnalysis;
use crate::sources::SourceAnalysis;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;

/// Clamp a confidence score into `[0, 1]`. NaN counts as no confidence.
pub fn clamp_confidence(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

fn confidence_in_range(value: f64) -> bool {
    (0.0..=1.0).contains(&value)
}

/// A candidate entity for the target logical data model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySuggestion {
    /// Entity name, unique within a suggestion list.
    pub name: String,
    /// Attribute names in the order they were proposed.
    pub attributes: Vec<String>,
    /// Framework or source the suggestion came from. Comma-joined after a merge.
    pub source: String,
    /// Confidence score in `[0, 1]`.
    pub confidence: f64,
    /// Free-text description.
    pub description: String,
}

impl EntitySuggestion {
    /// Check the field invariants: non-empty name, source and description,
    /// confidence within `[0, 1]`.
    pub fn validate(&self) -> bool {
        !self.name.is_empty()
            && !self.source.is_empty()
            && !self.description.is_empty()
            && confidence_in_range(self.confidence)
    }
}

/// A candidate relationship between two suggested entities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationSuggestion {
    pub source_entity: String,
    pub target_entity: String,
    pub relation_type: String,
    /// Usually one of `1:1`, `1:N`, `N:1`, `M:N`.
    pub cardinality: String,
    pub confidence: f64,
    pub description: String,
}

impl RelationSuggestion {
    /// Check the field invariants of a single relation. Whether the endpoints
    /// exist is a batch property checked by [`validate_suggestions`].
    pub fn validate(&self) -> bool {
        !self.source_entity.is_empty()
            && !self.target_entity.is_empty()
            && !self.relation_type.is_empty()
            && !self.cardinality.is_empty()
            && !self.description.is_empty()
            && confidence_in_range(self.confidence)
    }

    /// The same relationship read from the other end.
    ///
    /// Swaps the endpoints, inverts the cardinality and prefixes the type and
    /// description. Applying this twice restores the endpoints and cardinality
    /// but not the type, which becomes `inverse_inverse_<type>`.
    pub fn inverse(&self) -> RelationSuggestion {
        RelationSuggestion {
            source_entity: self.target_entity.clone(),
            target_entity: self.source_entity.clone(),
            relation_type: format!("inverse_{}", self.relation_type),
            cardinality: invert_cardinality(&self.cardinality),
            confidence: self.confidence,
            description: format!("Inverse of: {}", self.description),
        }
    }
}

/// Map a cardinality to the one seen from the opposite end.
/// Unrecognized values are returned unchanged.
pub fn invert_cardinality(cardinality: &str) -> String {
    match cardinality {
        "1:1" => "1:1",
        "1:N" => "N:1",
        "N:1" => "1:N",
        "M:N" => "M:N",
        other => other,
    }
    .to_string()
}

/// A single reason a suggestion batch is invalid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Violation {
    /// An entity failed its own field checks.
    InvalidEntity { name: String },
    /// A relation failed its own field checks.
    InvalidRelation { source: String, target: String },
    /// A relation endpoint names no entity in the batch.
    DanglingEndpoint { relation: String, missing: String },
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::InvalidEntity { name } => write!(f, "invalid entity '{}'", name),
            Violation::InvalidRelation { source, target } => {
                write!(f, "invalid relation {} -> {}", source, target)
            }
            Violation::DanglingEndpoint { relation, missing } => {
                write!(f, "relation {} references unknown entity '{}'", relation, missing)
            }
        }
    }
}

/// Collect every violation in a suggestion batch.
pub fn find_violations(
    entities: &[EntitySuggestion],
    relations: &[RelationSuggestion],
) -> Vec<Violation> {
    let mut violations = Vec::new();

    for entity in entities.iter().filter(|e| !e.validate()) {
        violations.push(Violation::InvalidEntity {
            name: entity.name.clone(),
        });
    }

    let names: HashSet<&str> = entities.iter().map(|e| e.name.as_str()).collect();

    for relation in relations {
        if !relation.validate() {
            violations.push(Violation::InvalidRelation {
                source: relation.source_entity.clone(),
                target: relation.target_entity.clone(),
            });
        }

        for endpoint in [&relation.source_entity, &relation.target_entity] {
            if !names.contains(endpoint.as_str()) {
                violations.push(Violation::DanglingEndpoint {
                    relation: format!("{} -> {}", relation.source_entity, relation.target_entity),
                    missing: endpoint.clone(),
                });
            }
        }
    }

    violations
}

/// Validate a batch as a whole. A single violation invalidates it.
pub fn validate_suggestions(
    entities: &[EntitySuggestion],
    relations: &[RelationSuggestion],
) -> bool {
    find_violations(entities, relations).is_empty()
}

/// Merge two entity suggestion lists keyed by name.
///
/// Entities found in only one list pass through unchanged. Entities found in
/// both get the union of their attributes, the sources joined as
/// `"{a}, {b}"`, the higher confidence, and both descriptions separated by a
/// newline. Output keeps first-seen order.
pub fn merge_suggestions(
    first: Vec<EntitySuggestion>,
    second: Vec<EntitySuggestion>,
) -> Vec<EntitySuggestion> {
    let mut merged: Vec<EntitySuggestion> = Vec::with_capacity(first.len() + second.len());
    let mut index: HashMap<String, usize> = HashMap::new();

    // Within the first list a repeated name replaces the earlier entry.
    for suggestion in first {
        match index.get(&suggestion.name) {
            Some(&pos) => merged[pos] = suggestion,
            None => {
                index.insert(suggestion.name.clone(), merged.len());
                merged.push(suggestion);
            }
        }
    }

    for suggestion in second {
        match index.get(&suggestion.name) {
            Some(&pos) => {
                let combined = merge_pair(&merged[pos], suggestion);
                merged[pos] = combined;
            }
            None => {
                index.insert(suggestion.name.clone(), merged.len());
                merged.push(suggestion);
            }
        }
    }

    merged
}

fn merge_pair(existing: &EntitySuggestion, incoming: EntitySuggestion) -> EntitySuggestion {
    let mut seen: HashSet<String> = HashSet::new();
    let attributes = existing
        .attributes
        .iter()
        .cloned()
        .chain(incoming.attributes)
        .filter(|attr| seen.insert(attr.clone()))
        .collect();

    EntitySuggestion {
        name: incoming.name,
        attributes,
        source: format!("{}, {}", existing.source, incoming.source),
        confidence: existing.confidence.max(incoming.confidence),
        description: format!("{}\n{}", existing.description, incoming.description),
    }
}

/// Result of batch validation, carried in the output bundle.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub violations: Vec<Violation>,
}

impl ValidationReport {
    pub fn check(entities: &[EntitySuggestion], relations: &[RelationSuggestion]) -> Self {
        let violations = find_violations(entities, relations);
        Self {
            valid: violations.is_empty(),
            violations,
        }
    }
}

/// Intermediate analyses that fed the suggestion stages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceAnalyses {
    /// Aggregated catalog data.
    pub datapedia: SourceAnalysis,
    /// Banking reference architecture mapping.
    pub framework_a: FrameworkAnalysis,
    /// Insurance data standard mapping.
    pub framework_b: FrameworkAnalysis,
}

/// Everything the orchestrator hands back to its caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuggestionBundle {
    pub entity_suggestions: Vec<EntitySuggestion>,
    pub relation_suggestions: Vec<RelationSuggestion>,
    pub source_analyses: SourceAnalyses,
    pub validation: ValidationReport,
}

/// Metadata about a pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    /// Catalog document that was analyzed.
    pub data_file: String,
    pub generated_at: DateTime<Utc>,
    pub model_used: String,
    pub duration_seconds: f64,
}

/// A finished run, ready to render.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub metadata: ReportMetadata,
    #[serde(flatten)]
    pub bundle: SuggestionBundle,
}
