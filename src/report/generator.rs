//! Markdown report generation.
//!
//! This module renders a finished run as a Markdown report. Confidence
//! filtering and inverse relations only affect what is shown; the bundle
//! itself is never altered.

use crate::agent::frameworks::FrameworkAnalysis;
use crate::analysis::{filter_entities, filter_relations, source_distribution};
use crate::config::ReportConfig;
use crate::models::{
    EntitySuggestion, RelationSuggestion, Report, ReportMetadata, SuggestionBundle,
    ValidationReport,
};
use crate::sources::SourceAnalysis;
use anyhow::Result;

/// What the Markdown report shows.
#[derive(Debug, Clone)]
pub struct RenderOptions {
    pub min_confidence: f64,
    pub include_inverse: bool,
    pub include_source_analyses: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            min_confidence: 0.0,
            include_inverse: false,
            include_source_analyses: true,
        }
    }
}

impl From<&ReportConfig> for RenderOptions {
    fn from(config: &ReportConfig) -> Self {
        Self {
            min_confidence: config.min_confidence,
            include_inverse: config.include_inverse,
            include_source_analyses: config.include_source_analyses,
        }
    }
}

/// Generate a complete Markdown report.
pub fn generate_markdown_report(report: &Report, options: &RenderOptions) -> String {
    let bundle = &report.bundle;
    let entities = filter_entities(&bundle.entity_suggestions, options.min_confidence);
    let relations = filter_relations(&bundle.relation_suggestions, options.min_confidence);

    let mut output = String::new();

    output.push_str("# ModelMapper Report\n\n");
    output.push_str(&generate_metadata_section(&report.metadata, bundle));
    output.push_str(&generate_table_of_contents(options));
    output.push_str(&generate_summary_section(bundle, &entities, &relations, options));
    output.push_str(&generate_entities_section(&entities));
    output.push_str(&generate_relations_section(&relations, options.include_inverse));
    output.push_str(&generate_validation_section(&bundle.validation));

    if options.include_source_analyses {
        output.push_str(&generate_source_analyses_section(bundle));
    }

    output.push_str(&generate_footer());

    output
}

/// Generate the metadata section.
fn generate_metadata_section(metadata: &ReportMetadata, bundle: &SuggestionBundle) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!("- **Data File:** `{}`\n", metadata.data_file));
    section.push_str(&format!(
        "- **Generated:** {}\n",
        metadata.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!("- **Model Used:** `{}`\n", metadata.model_used));
    section.push_str(&format!(
        "- **Entity Suggestions:** {}\n",
        bundle.entity_suggestions.len()
    ));
    section.push_str(&format!(
        "- **Relation Suggestions:** {}\n",
        bundle.relation_suggestions.len()
    ));
    section.push_str(&format!(
        "- **Validation:** {}\n",
        if bundle.validation.valid {
            "passed"
        } else {
            "failed"
        }
    ));
    section.push_str(&format!(
        "- **Duration:** {:.1}s\n",
        metadata.duration_seconds
    ));
    section.push('\n');

    section
}

/// Generate the table of contents.
fn generate_table_of_contents(options: &RenderOptions) -> String {
    let mut toc = String::new();

    toc.push_str("## Table of Contents\n\n");
    toc.push_str("- [Metadata](#metadata)\n");
    toc.push_str("- [Summary](#summary)\n");
    toc.push_str("- [Entity Suggestions](#entity-suggestions)\n");
    toc.push_str("- [Relation Suggestions](#relation-suggestions)\n");
    toc.push_str("- [Validation](#validation)\n");
    if options.include_source_analyses {
        toc.push_str("- [Source Analyses](#source-analyses)\n");
    }
    toc.push('\n');

    toc
}

/// Generate the summary section.
fn generate_summary_section(
    bundle: &SuggestionBundle,
    entities: &[EntitySuggestion],
    relations: &[RelationSuggestion],
    options: &RenderOptions,
) -> String {
    let mut section = String::new();

    section.push_str("## Summary\n\n");

    section.push_str("| | Shown | Total |\n");
    section.push_str("|:---|:---:|:---:|\n");
    section.push_str(&format!(
        "| Entities | {} | {} |\n",
        entities.len(),
        bundle.entity_suggestions.len()
    ));
    section.push_str(&format!(
        "| Relations | {} | {} |\n\n",
        relations.len(),
        bundle.relation_suggestions.len()
    ));

    if options.min_confidence > 0.0 {
        section.push_str(&format!(
            "*Showing suggestions with confidence of at least {:.2}.*\n\n",
            options.min_confidence
        ));
    }

    let catalog = &bundle.source_analyses.datapedia;
    let distribution = source_distribution(catalog);
    if !distribution.is_empty() {
        section.push_str("### Catalog Entities by Source\n\n");
        section.push_str("| Source | Entities |\n");
        section.push_str("|:---|:---:|\n");
        for (source, count) in &distribution {
            section.push_str(&format!("| {} | {} |\n", source, count));
        }
        section.push_str(&format!(
            "\n*{} relationships found in the catalog.*\n\n",
            catalog.relationships.len()
        ));
    }

    section
}

/// Generate the entity suggestions section.
fn generate_entities_section(entities: &[EntitySuggestion]) -> String {
    let mut section = String::new();

    section.push_str("## Entity Suggestions\n\n");

    if entities.is_empty() {
        section.push_str("No entity suggestions to show.\n\n");
        return section;
    }

    for entity in entities {
        section.push_str(&generate_entity_block(entity));
    }

    section
}

/// Generate a single entity block.
fn generate_entity_block(entity: &EntitySuggestion) -> String {
    let mut block = String::new();

    block.push_str(&format!("### {}\n\n", entity.name));
    block.push_str(&format!(
        "*Source: {} | Confidence: {:.2}*\n\n",
        if entity.source.is_empty() {
            "unknown"
        } else {
            entity.source.as_str()
        },
        entity.confidence
    ));

    if !entity.description.is_empty() {
        block.push_str(&format!("{}\n\n", entity.description));
    }

    if !entity.attributes.is_empty() {
        let attributes: Vec<String> = entity
            .attributes
            .iter()
            .map(|a| format!("`{}`", a))
            .collect();
        block.push_str(&format!("**Attributes:** {}\n\n", attributes.join(", ")));
    }

    block
}

/// Generate the relation suggestions section.
fn generate_relations_section(relations: &[RelationSuggestion], include_inverse: bool) -> String {
    let mut section = String::new();

    section.push_str("## Relation Suggestions\n\n");

    if relations.is_empty() {
        section.push_str("No relation suggestions to show.\n\n");
        return section;
    }

    section.push_str("| Source | Type | Target | Cardinality | Confidence | Description |\n");
    section.push_str("|:---|:---|:---|:---:|:---:|:---|\n");

    for relation in relations {
        section.push_str(&relation_row(relation));
        if include_inverse {
            section.push_str(&relation_row(&relation.inverse()));
        }
    }
    section.push('\n');

    section
}

fn relation_row(relation: &RelationSuggestion) -> String {
    format!(
        "| {} | {} | {} | {} | {:.2} | {} |\n",
        relation.source_entity,
        relation.relation_type,
        relation.target_entity,
        relation.cardinality,
        relation.confidence,
        relation.description.replace('|', "\\|").replace('\n', " ")
    )
}

/// Generate the validation section.
fn generate_validation_section(validation: &ValidationReport) -> String {
    let mut section = String::new();

    section.push_str("## Validation\n\n");

    if validation.valid {
        section.push_str("All suggestions passed batch validation.\n\n");
        return section;
    }

    section.push_str(&format!(
        "Batch validation found {} violations:\n\n",
        validation.violations.len()
    ));
    for violation in &validation.violations {
        section.push_str(&format!("- {}\n", violation));
    }
    section.push('\n');

    section
}

/// Generate the source analyses section.
fn generate_source_analyses_section(bundle: &SuggestionBundle) -> String {
    let analyses = &bundle.source_analyses;
    let mut section = String::new();

    section.push_str("## Source Analyses\n\n");
    section.push_str(&generate_narrative_block(&analyses.datapedia));
    section.push_str(&generate_framework_block(&analyses.framework_a));
    section.push_str(&generate_framework_block(&analyses.framework_b));

    section
}

fn generate_narrative_block(catalog: &SourceAnalysis) -> String {
    if catalog.analysis.trim().is_empty() {
        return String::new();
    }

    format!("### Source Narrative\n\n{}\n\n", catalog.analysis.trim())
}

/// Generate the block for one framework analysis.
fn generate_framework_block(analysis: &FrameworkAnalysis) -> String {
    let mut block = String::new();

    block.push_str(&format!("### {} Analysis\n\n", analysis.framework));

    if !analysis.service_domains.is_empty() {
        block.push_str("| Service Domain | Entities | Operations | Confidence |\n");
        block.push_str("|:---|:---|:---|:---:|\n");
        for domain in &analysis.service_domains {
            block.push_str(&format!(
                "| {} | {} | {} | {:.2} |\n",
                domain.name,
                domain.entities.join(", "),
                domain.operations.join(", "),
                domain.confidence
            ));
        }
        block.push('\n');
    }

    if analysis.sections.is_empty() {
        // Unstructured answer; show it as-is.
        if !analysis.raw_analysis.trim().is_empty() {
            block.push_str(&format!("{}\n\n", analysis.raw_analysis.trim()));
        }
        return block;
    }

    for section in &analysis.sections {
        block.push_str(&format!("#### {}\n\n", section.title));
        if !section.body.trim().is_empty() {
            block.push_str(&format!("{}\n\n", section.body.trim_end()));
        }
    }

    block
}

/// Generate the report footer.
fn generate_footer() -> String {
    let mut footer = String::new();

    footer.push_str("---\n\n");
    footer.push_str("*Report generated by ModelMapper*\n");

    footer
}

/// Generate a JSON report of the full, unfiltered run.
pub fn generate_json_report(report: &Report) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}
