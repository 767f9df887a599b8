//! Prompt templates for each model-backed stage.
//!
//! Templates use `{name}` placeholders filled by [`render`]. The entity and
//! relation templates spell out the line format that
//! [`crate::agent::parser`] reads back.

/// Fill `{key}` placeholders in `template` in a single left-to-right pass.
/// Substituted values are never scanned again, and unknown placeholders are
/// left as they are.
pub fn render(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];

        let Some(close) = after.find('}') else {
            out.push_str(&rest[open..]);
            return out;
        };

        let key = &after[..close];
        match values.iter().find(|(k, _)| *k == key) {
            Some((_, value)) => out.push_str(value),
            None => out.push_str(&rest[open..open + close + 2]),
        }
        rest = &after[close + 1..];
    }

    out.push_str(rest);
    out
}

/// Narrative analysis of the raw catalog sources.
pub const SOURCE_ANALYSIS_PROMPT: &str = r#"Analyze the following data sources and provide a comprehensive analysis:

Datapedia: {datapedia}
Conceptual Model: {conceptual}
Schema: {schema}

Provide analysis of:
1. Entity relationships
2. Data consistency
3. Business rules
4. Technical constraints

Format your response with clear sections for each aspect."#;

/// Mapping onto BIAN service domains.
pub const BANKING_PROMPT: &str = r#"Map this data model to BIAN service domains:

Data Model: {data}

Provide detailed mapping for:
1. Service Domains:
   List each relevant BIAN service domain on its own line, followed by
   indented lines of the form:
   - Entity: [mapped entity]
   - Operation: [service operation]
   - Confidence: [score between 0 and 1]

2. Business Capabilities:
   - Core banking capabilities
   - Supporting capabilities
   - Integration points

3. Business Areas:
   - Functional areas
   - Process areas
   - Cross-cutting concerns

4. Implementation Guidelines:
   - Service domain integration
   - Data consistency rules
   - Operation patterns

Format each section clearly and provide confidence levels for mappings."#;

/// Mapping onto the ACORD insurance data standard.
pub const INSURANCE_PROMPT: &str = r#"Analyze this data model against ACORD standards:

Data Model: {data}

Provide comprehensive analysis for:
1. ACORD Standard Mappings:
   - Data standards alignment
   - Industry standard patterns
   - Required transformations

2. Insurance Domain Concepts:
   - Core insurance entities
   - Business processes
   - Industry relationships

3. Compliance Analysis:
   - Standard compliance levels
   - Required validations
   - Integration requirements

4. Implementation Recommendations:
   - Data transformations
   - Integration patterns
   - Best practices

Format each section clearly and provide confidence levels."#;

/// Entity suggestions across all analyses.
pub const ENTITY_PROMPT: &str = r#"Analyze these integrated data sources and suggest comprehensive entities:

Datapedia Analysis: {datapedia}
BIAN Analysis: {banking}
ACORD Analysis: {insurance}

For each entity, provide in this exact format:
Entity: [entity name]
Description: [detailed description integrating all sources]
Attributes: [comma-separated list of all attributes]
Source: [primary source framework]
Confidence: [score between 0 and 1]

Consider:
- Merge similar entities from different sources
- Include all relevant attributes
- Maintain data consistency
- Follow industry standards
- Consider both banking and insurance domains"#;

/// Relation suggestions between the suggested entities.
pub const RELATION_PROMPT: &str = r#"Analyze and suggest relationships between the entities:

Available Entities: {entities}

Source Data:
Datapedia: {datapedia}
BIAN Framework: {banking}
ACORD Standards: {insurance}

For each relationship, provide in this exact format:
Relation: [relationship name]
Source: [source entity]
Target: [target entity]
Type: [relationship type]
Cardinality: [1:1, 1:N, N:1 or M:N]
Confidence: [score between 0 and 1]
Description: [detailed description]

Only use entity names from the list of available entities.

Consider:
- Business rules from all sources
- Industry standard patterns
- Data integrity requirements
- Cross-domain relationships"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_fills_placeholders() {
        let out = render("A={a}, B={b}, A again={a}", &[("a", "1"), ("b", "2")]);
        assert_eq!(out, "A=1, B=2, A again=1");
    }

    #[test]
    fn test_render_leaves_unknown_placeholders() {
        assert_eq!(render("{x} {y}", &[("x", "1")]), "1 {y}");
    }

    #[test]
    fn test_render_does_not_expand_inside_values() {
        let out = render(
            "D: {datapedia}\nB: {banking}",
            &[("datapedia", "text mentions {banking}"), ("banking", "BANK")],
        );
        assert_eq!(out, "D: text mentions {banking}\nB: BANK");
    }

    #[test]
    fn test_render_unclosed_brace() {
        assert_eq!(render("a {x} {oops", &[("x", "1")]), "a 1 {oops");
    }

    #[test]
    fn test_templates_document_line_format() {
        for marker in ["Entity:", "Attributes:", "Description:", "Source:", "Confidence:"] {
            assert!(ENTITY_PROMPT.contains(marker));
        }
        for marker in ["Relation:", "Source:", "Target:", "Type:", "Cardinality:"] {
            assert!(RELATION_PROMPT.contains(marker));
        }
    }
}
