//! Framework-mapping stages.
//!
//! Each stage asks the model to map the aggregated catalog onto an industry
//! framework and keeps the answer as numbered sections. The banking stage
//! also pulls structured service domains out of its first section.

use crate::agent::llm::LanguageModel;
use crate::agent::prompts::{self, BANKING_PROMPT, INSURANCE_PROMPT};
use crate::error::ModelInvocationError;
use crate::models::clamp_confidence;
use crate::sources::SourceAnalysis;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// The industry frameworks the pipeline maps against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Framework {
    /// BIAN banking reference architecture.
    Banking,
    /// ACORD insurance data standard.
    Insurance,
}

impl fmt::Display for Framework {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Framework::Banking => write!(f, "BIAN"),
            Framework::Insurance => write!(f, "ACORD"),
        }
    }
}

impl Framework {
    fn template(&self) -> &'static str {
        match self {
            Framework::Banking => BANKING_PROMPT,
            Framework::Insurance => INSURANCE_PROMPT,
        }
    }
}

/// A numbered section of a framework response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisSection {
    pub title: String,
    pub body: String,
}

/// A BIAN service domain with the entities and operations mapped to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceDomain {
    pub name: String,
    pub entities: Vec<String>,
    pub operations: Vec<String>,
    pub confidence: f64,
}

/// Result of one framework-mapping stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameworkAnalysis {
    pub framework: Framework,
    pub sections: Vec<AnalysisSection>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub service_domains: Vec<ServiceDomain>,
    pub raw_analysis: String,
}

impl FrameworkAnalysis {
    /// Build the structured view of a raw response.
    pub fn from_response(framework: Framework, raw_analysis: String) -> Self {
        let sections = split_sections(&raw_analysis);
        let service_domains = match framework {
            Framework::Banking => sections
                .iter()
                .find(|s| s.title.to_lowercase().contains("service domains"))
                .map(|s| extract_service_domains(&s.body))
                .unwrap_or_default(),
            Framework::Insurance => Vec::new(),
        };

        Self {
            framework,
            sections,
            service_domains,
            raw_analysis,
        }
    }

    /// Look up a section by case-insensitive title fragment.
    pub fn section(&self, fragment: &str) -> Option<&AnalysisSection> {
        let fragment = fragment.to_lowercase();
        self.sections
            .iter()
            .find(|s| s.title.to_lowercase().contains(&fragment))
    }
}

/// Title of a numbered heading such as `1. Service Domains:` or
/// `## 2. **Compliance Analysis**`. Indented lines are never headings.
fn heading_title(line: &str) -> Option<String> {
    if line.starts_with(char::is_whitespace) {
        return None;
    }

    let stripped = line.trim_start_matches(|c: char| c == '#' || c == '*' || c.is_whitespace());
    let (number, rest) = stripped.split_once('.')?;
    if number.is_empty() || !number.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }

    let title = rest
        .trim()
        .trim_matches('*')
        .trim()
        .trim_end_matches(':')
        .trim_matches('*')
        .trim();

    (!title.is_empty()).then(|| title.to_string())
}

/// Split a response into its numbered sections. Text before the first
/// heading is discarded.
pub fn split_sections(text: &str) -> Vec<AnalysisSection> {
    let mut sections: Vec<AnalysisSection> = Vec::new();
    let mut body: Vec<&str> = Vec::new();
    let mut title: Option<String> = None;

    for line in text.lines() {
        if let Some(next) = heading_title(line) {
            if let Some(done) = title.take() {
                sections.push(AnalysisSection {
                    title: done,
                    body: body.join("\n").trim_end().to_string(),
                });
            }
            body.clear();
            title = Some(next);
        } else if title.is_some() {
            body.push(line);
        }
    }

    if let Some(done) = title {
        sections.push(AnalysisSection {
            title: done,
            body: body.join("\n").trim_end().to_string(),
        });
    }

    sections
}

/// `**Name**:` -> `Name`.
fn strip_emphasis(text: &str) -> String {
    text.trim()
        .trim_matches('*')
        .trim()
        .trim_end_matches(':')
        .trim_matches('*')
        .trim()
        .to_string()
}

/// Read service domains from the body of a "Service Domains" section.
///
/// An unindented, unbulleted line names a domain; markdown emphasis around
/// the name is stripped. Indented lines, or lines opening with `- ` or `* `,
/// attach `Entity:`, `Operation:` and `Confidence:` values to it.
pub fn extract_service_domains(body: &str) -> Vec<ServiceDomain> {
    let mut domains: Vec<ServiceDomain> = Vec::new();

    for line in body.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let is_item = line.starts_with(char::is_whitespace)
            || trimmed.starts_with("- ")
            || trimmed.starts_with("* ");

        if !is_item {
            domains.push(ServiceDomain {
                name: strip_emphasis(trimmed),
                entities: Vec::new(),
                operations: Vec::new(),
                confidence: 0.0,
            });
            continue;
        }

        let Some(domain) = domains.last_mut() else {
            continue;
        };

        let item = trimmed.trim_start_matches(['-', '*']).trim();
        if let Some((_, value)) = item.split_once("Entity:") {
            domain.entities.push(strip_emphasis(value));
        } else if let Some((_, value)) = item.split_once("Operation:") {
            domain.operations.push(strip_emphasis(value));
        } else if let Some((_, value)) = item.split_once("Confidence:") {
            domain.confidence = strip_emphasis(value)
                .parse::<f64>()
                .map(clamp_confidence)
                .unwrap_or(0.0);
        }
    }

    domains
}

/// Runs one framework mapping against the shared model.
pub struct FrameworkMapper {
    framework: Framework,
    model: Arc<dyn LanguageModel>,
}

impl FrameworkMapper {
    pub fn new(framework: Framework, model: Arc<dyn LanguageModel>) -> Self {
        Self { framework, model }
    }

    pub fn framework(&self) -> Framework {
        self.framework
    }

    /// Prompt for this framework over the aggregated catalog.
    pub fn build_prompt(&self, source: &SourceAnalysis) -> String {
        let payload = json!({
            "entities": source.entities,
            "relationships": source.relationships,
            "analysis": source.analysis,
        });
        let data = serde_json::to_string_pretty(&payload).unwrap_or_default();

        prompts::render(self.framework.template(), &[("data", data.as_str())])
    }

    /// Ask the model for the mapping and structure its answer.
    pub async fn map(
        &self,
        source: &SourceAnalysis,
    ) -> Result<FrameworkAnalysis, ModelInvocationError> {
        info!("Mapping catalog onto {}", self.framework);

        let prompt = self.build_prompt(source);
        let response = self.model.complete(&prompt).await?;
        let analysis = FrameworkAnalysis::from_response(self.framework, response);

        debug!(
            "{} analysis: {} sections, {} service domains",
            self.framework,
            analysis.sections.len(),
            analysis.service_domains.len()
        );

        Ok(analysis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::aggregate;
    use crate::sources::{DatapediaEntity, SourceData};
    use async_trait::async_trait;
    use std::sync::Mutex;

    const BANKING_RESPONSE: &str = r#"Here is the mapping.

1. Service Domains:
Customer Offer
   - Entity: Customer
   - Operation: Initiate
   - Confidence: 0.9
Current Account
   - Entity: Account
   - Operation: Execute
   - Operation: Retrieve
   - Confidence: high

2. Business Capabilities:
   - Core: deposits
"#;

    struct RecordingModel {
        response: String,
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl LanguageModel for RecordingModel {
        async fn complete(&self, prompt: &str) -> Result<String, ModelInvocationError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            Ok(self.response.clone())
        }

        fn model_name(&self) -> &str {
            "recording"
        }
    }

    #[test]
    fn test_heading_title() {
        assert_eq!(heading_title("1. Service Domains:"), Some("Service Domains".to_string()));
        assert_eq!(
            heading_title("## 2. **Compliance Analysis**"),
            Some("Compliance Analysis".to_string())
        );
        assert_eq!(heading_title("   1. Nested item"), None);
        assert_eq!(heading_title("3.14 is pi"), None);
        assert_eq!(heading_title("Version 1. Something"), None);
    }

    #[test]
    fn test_split_sections() {
        let sections = split_sections(BANKING_RESPONSE);

        let titles: Vec<&str> = sections.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, vec!["Service Domains", "Business Capabilities"]);
        assert!(sections[0].body.contains("Customer Offer"));
        assert_eq!(sections[1].body, "   - Core: deposits");
    }

    #[test]
    fn test_extract_service_domains() {
        let analysis =
            FrameworkAnalysis::from_response(Framework::Banking, BANKING_RESPONSE.to_string());

        assert_eq!(analysis.service_domains.len(), 2);
        let offer = &analysis.service_domains[0];
        assert_eq!(offer.name, "Customer Offer");
        assert_eq!(offer.entities, vec!["Customer"]);
        assert_eq!(offer.operations, vec!["Initiate"]);
        assert_eq!(offer.confidence, 0.9);

        let account = &analysis.service_domains[1];
        assert_eq!(account.operations, vec!["Execute", "Retrieve"]);
        assert_eq!(account.confidence, 0.0);
    }

    #[test]
    fn test_bold_domain_names() {
        let body = "**Customer Offer**\n  - Entity: Customer\n  - Confidence: 0.9\n**Current Account**:\n* **Entity:** Account\n*Notes*";
        let domains = extract_service_domains(body);

        let names: Vec<&str> = domains.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["Customer Offer", "Current Account", "Notes"]);
        assert_eq!(domains[0].entities, vec!["Customer"]);
        assert_eq!(domains[0].confidence, 0.9);
        assert_eq!(domains[1].entities, vec!["Account"]);
    }

    #[test]
    fn test_insurance_has_no_service_domains() {
        let analysis =
            FrameworkAnalysis::from_response(Framework::Insurance, BANKING_RESPONSE.to_string());
        assert!(analysis.service_domains.is_empty());
        assert!(analysis.section("capabilities").is_some());
    }

    #[test]
    fn test_unstructured_response_keeps_raw_text() {
        let analysis =
            FrameworkAnalysis::from_response(Framework::Banking, "No idea.".to_string());
        assert!(analysis.sections.is_empty());
        assert_eq!(analysis.raw_analysis, "No idea.");
    }

    #[tokio::test]
    async fn test_mapper_sends_catalog_in_prompt() {
        let mut data = SourceData::default();
        data.datapedia.entities.insert(
            "Customer".to_string(),
            DatapediaEntity {
                attributes: vec!["id".to_string()],
                definition: "A customer".to_string(),
            },
        );
        let source = aggregate(data);

        let model = Arc::new(RecordingModel {
            response: BANKING_RESPONSE.to_string(),
            prompts: Mutex::new(Vec::new()),
        });
        let mapper = FrameworkMapper::new(Framework::Banking, model.clone());

        let analysis = mapper.map(&source).await.unwrap();
        assert_eq!(analysis.framework, Framework::Banking);

        let prompts = model.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("BIAN service domains"));
        assert!(prompts[0].contains("\"Customer\""));
        assert!(!prompts[0].contains("{data}"));
    }
}
