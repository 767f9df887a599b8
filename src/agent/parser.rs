//! Line-oriented parser for model responses.
//!
//! Model output is treated as untrusted text. A marker line (`Entity:` or
//! `Relation:`) opens a record; the field lines that follow fill it in until
//! the next marker or the end of input. Unknown lines are skipped and bad
//! confidence values become `0.0`. Every entity record is emitted, even one
//! without a name; batch validation reports those. Relations without both
//! endpoints are dropped with a log entry. Parsing never fails.

use crate::models::{clamp_confidence, EntitySuggestion, RelationSuggestion};
use std::fmt;
use tracing::{debug, warn};

const ENTITY_MARKER: &str = "Entity:";
const RELATION_MARKER: &str = "Relation:";

/// Something in the model output that had to be repaired or dropped.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseAnomaly {
    /// `Entity:` marker with nothing after it.
    UnnamedEntity { line: usize },
    /// Relation record missing an endpoint.
    IncompleteRelation {
        line: usize,
        source: String,
        target: String,
    },
    /// `Confidence:` value that is not a number.
    BadConfidence { line: usize, value: String },
}

impl fmt::Display for ParseAnomaly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseAnomaly::UnnamedEntity { line } => {
                write!(f, "line {}: entity marker without a name", line)
            }
            ParseAnomaly::IncompleteRelation {
                line,
                source,
                target,
            } => write!(
                f,
                "line {}: relation missing an endpoint (source='{}', target='{}')",
                line, source, target
            ),
            ParseAnomaly::BadConfidence { line, value } => {
                write!(f, "line {}: unparseable confidence '{}'", line, value)
            }
        }
    }
}

/// Value after `prefix` if the line starts with it.
fn field<'a>(line: &'a str, prefix: &str) -> Option<&'a str> {
    line.strip_prefix(prefix).map(str::trim)
}

fn parse_confidence(value: &str, line: usize) -> f64 {
    match value.parse::<f64>() {
        Ok(v) => clamp_confidence(v),
        Err(_) => {
            debug!(
                "{}",
                ParseAnomaly::BadConfidence {
                    line,
                    value: value.to_string(),
                }
            );
            0.0
        }
    }
}

/// Split an attribute list on commas, dropping empty tokens.
fn split_attributes(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|attr| !attr.is_empty())
        .map(String::from)
        .collect()
}

/// Non-empty trimmed lines with their 1-based line numbers.
fn content_lines(text: &str) -> impl Iterator<Item = (usize, &str)> {
    text.lines()
        .enumerate()
        .map(|(idx, line)| (idx + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty())
}

#[derive(Debug, Default)]
struct EntityDraft {
    line: usize,
    name: String,
    attributes: Vec<String>,
    description: String,
    source: String,
    confidence: f64,
}

impl EntityDraft {
    fn finish(self) -> Result<EntitySuggestion, ParseAnomaly> {
        if self.name.is_empty() {
            debug!("{}", ParseAnomaly::UnnamedEntity { line: self.line });
        }

        Ok(EntitySuggestion {
            name: self.name,
            attributes: self.attributes,
            source: self.source,
            confidence: self.confidence,
            description: self.description,
        })
    }
}

#[derive(Debug, Default)]
struct RelationDraft {
    line: usize,
    source_entity: String,
    target_entity: String,
    relation_type: String,
    cardinality: String,
    confidence: f64,
    description: String,
}

impl RelationDraft {
    fn finish(self) -> Result<RelationSuggestion, ParseAnomaly> {
        if self.source_entity.is_empty() || self.target_entity.is_empty() {
            return Err(ParseAnomaly::IncompleteRelation {
                line: self.line,
                source: self.source_entity,
                target: self.target_entity,
            });
        }

        Ok(RelationSuggestion {
            source_entity: self.source_entity,
            target_entity: self.target_entity,
            relation_type: self.relation_type,
            cardinality: self.cardinality,
            confidence: self.confidence,
            description: self.description,
        })
    }
}

/// Move a finished draft into `out`, logging it if it has to be dropped.
fn flush<D, T>(draft: Option<D>, finish: fn(D) -> Result<T, ParseAnomaly>, out: &mut Vec<T>) {
    if let Some(draft) = draft {
        match finish(draft) {
            Ok(record) => out.push(record),
            Err(anomaly) => warn!("Dropping record: {}", anomaly),
        }
    }
}

/// Parse `Entity:` records from model output.
pub fn parse_entity_suggestions(text: &str) -> Vec<EntitySuggestion> {
    let mut entities = Vec::new();
    let mut current: Option<EntityDraft> = None;

    for (line_no, line) in content_lines(text) {
        if let Some(name) = field(line, ENTITY_MARKER) {
            flush(current.take(), EntityDraft::finish, &mut entities);
            current = Some(EntityDraft {
                line: line_no,
                name: name.to_string(),
                ..EntityDraft::default()
            });
            continue;
        }

        let Some(draft) = current.as_mut() else {
            continue;
        };

        if let Some(value) = field(line, "Attributes:") {
            draft.attributes = split_attributes(value);
        } else if let Some(value) = field(line, "Description:") {
            draft.description = value.to_string();
        } else if let Some(value) = field(line, "Source:") {
            draft.source = value.to_string();
        } else if let Some(value) = field(line, "Confidence:") {
            draft.confidence = parse_confidence(value, line_no);
        }
    }

    flush(current, EntityDraft::finish, &mut entities);

    debug!("Parsed {} entity suggestions", entities.len());
    entities
}

/// Parse `Relation:` records from model output. Records without both a
/// source and a target entity are dropped.
pub fn parse_relation_suggestions(text: &str) -> Vec<RelationSuggestion> {
    let mut relations = Vec::new();
    let mut current: Option<RelationDraft> = None;

    for (line_no, line) in content_lines(text) {
        if field(line, RELATION_MARKER).is_some() {
            flush(current.take(), RelationDraft::finish, &mut relations);
            current = Some(RelationDraft {
                line: line_no,
                ..RelationDraft::default()
            });
            continue;
        }

        let Some(draft) = current.as_mut() else {
            continue;
        };

        if let Some(value) = field(line, "Source:") {
            draft.source_entity = value.to_string();
        } else if let Some(value) = field(line, "Target:") {
            draft.target_entity = value.to_string();
        } else if let Some(value) = field(line, "Type:") {
            draft.relation_type = value.to_string();
        } else if let Some(value) = field(line, "Cardinality:") {
            draft.cardinality = value.to_string();
        } else if let Some(value) = field(line, "Confidence:") {
            draft.confidence = parse_confidence(value, line_no);
        } else if let Some(value) = field(line, "Description:") {
            draft.description = value.to_string();
        }
    }

    flush(current, RelationDraft::finish, &mut relations);

    debug!("Parsed {} relation suggestions", relations.len());
    relations
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_entity() {
        let text = "Entity: Customer\nAttributes: id, name,\nDescription: A customer\nSource: datapedia\nConfidence: 0.9";
        let entities = parse_entity_suggestions(text);

        assert_eq!(
            entities,
            vec![EntitySuggestion {
                name: "Customer".to_string(),
                attributes: vec!["id".to_string(), "name".to_string()],
                source: "datapedia".to_string(),
                confidence: 0.9,
                description: "A customer".to_string(),
            }]
        );
    }

    #[test]
    fn test_no_markers_yields_nothing() {
        assert!(parse_entity_suggestions("").is_empty());
        assert!(parse_entity_suggestions("Here are some thoughts.\nSource: x").is_empty());
        assert!(parse_relation_suggestions("Nothing to see").is_empty());
    }

    #[test]
    fn test_confidence_is_clamped() {
        let text = "Entity: A\nConfidence: 5\nEntity: B\nConfidence: -2\nEntity: C\nConfidence: abc";
        let entities = parse_entity_suggestions(text);

        let confidences: Vec<f64> = entities.iter().map(|e| e.confidence).collect();
        assert_eq!(confidences, vec![1.0, 0.0, 0.0]);
        assert!(confidences.iter().all(|c| (0.0..=1.0).contains(c)));
    }

    #[test]
    fn test_multiple_entities_with_prose() {
        let text = r#"
Sure! Here are the entities I found:

Entity: Customer
  Description:   Holder of accounts
  Attributes: id , name
  This customer appears in BIAN Party Reference Data.
  Confidence: 0.8

Entity: Account
Attributes: id, balance
Source: schema

Let me know if you need more.
"#;
        let entities = parse_entity_suggestions(text);

        assert_eq!(entities.len(), 2);
        assert_eq!(entities[0].name, "Customer");
        assert_eq!(entities[0].description, "Holder of accounts");
        assert_eq!(entities[0].attributes, vec!["id", "name"]);
        assert_eq!(entities[0].source, "");
        assert_eq!(entities[1].name, "Account");
        assert_eq!(entities[1].source, "schema");
        assert_eq!(entities[1].confidence, 0.0);
    }

    #[test]
    fn test_unnamed_entity_is_kept_for_validation() {
        let text = "Entity: Customer\nConfidence: 0.5\nEntity:\nAttributes: x\nEntity: Account";
        let entities = parse_entity_suggestions(text);

        let names: Vec<&str> = entities.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Customer", "", "Account"]);
        assert_eq!(entities[1].attributes, vec!["x"]);
    }

    #[test]
    fn test_unnamed_entity_fails_batch_validation() {
        let entities = parse_entity_suggestions("Entity:\nDescription: d\nSource: s\nConfidence: 0.5");

        assert_eq!(entities.len(), 1);
        assert_eq!(entities[0].description, "d");
        assert!(!crate::models::validate_suggestions(&entities, &[]));
    }

    #[test]
    fn test_later_field_overrides_earlier() {
        let text = "Entity: A\nAttributes: x\nAttributes: y, z";
        let entities = parse_entity_suggestions(text);
        assert_eq!(entities[0].attributes, vec!["y", "z"]);
    }

    #[test]
    fn test_relations() {
        let text = r#"
Relation: ownership
Source: Customer
Target: Account
Type: owns
Cardinality: 1:N
Confidence: 0.85
Description: A customer owns many accounts

Relation: coverage
Source: Policy
Target: Customer
Cardinality: N:1
Confidence: 1.7
"#;
        let relations = parse_relation_suggestions(text);

        assert_eq!(relations.len(), 2);
        assert_eq!(
            relations[0],
            RelationSuggestion {
                source_entity: "Customer".to_string(),
                target_entity: "Account".to_string(),
                relation_type: "owns".to_string(),
                cardinality: "1:N".to_string(),
                confidence: 0.85,
                description: "A customer owns many accounts".to_string(),
            }
        );
        assert_eq!(relations[1].relation_type, "");
        assert_eq!(relations[1].confidence, 1.0);
        assert_eq!(relations[1].description, "");
    }

    #[test]
    fn test_relation_type_only_from_type_line() {
        let relations = parse_relation_suggestions("Relation: ownership\nSource: A\nTarget: B");

        assert_eq!(relations.len(), 1);
        assert_eq!(relations[0].relation_type, "");
        assert!(!relations[0].validate());
    }

    #[test]
    fn test_incomplete_relations_are_dropped() {
        let text = "Relation: a\nSource: Customer\nRelation: b\nTarget: Account\nRelation: c\nSource: X\nTarget: Y";
        let relations = parse_relation_suggestions(text);

        assert_eq!(relations.len(), 1);
        assert_eq!(relations[0].source_entity, "X");
        assert_eq!(relations[0].target_entity, "Y");
    }

    #[test]
    fn test_other_grammar_marker_does_not_close_record() {
        let text = "Entity: Customer\nSource: datapedia\nRelation: r\nSource: catalog";

        let entities = parse_entity_suggestions(text);
        assert_eq!(entities.len(), 1);
        assert_eq!(entities[0].source, "catalog");

        let relations = parse_relation_suggestions(text);
        assert!(relations.is_empty());
    }

    #[test]
    fn test_anomaly_display() {
        let anomaly = ParseAnomaly::BadConfidence {
            line: 3,
            value: "high".to_string(),
        };
        assert_eq!(anomaly.to_string(), "line 3: unparseable confidence 'high'");
    }
}
