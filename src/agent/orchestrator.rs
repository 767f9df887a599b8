//! Pipeline orchestration.
//!
//! Runs the stages in order:
//!
//! ```text
//! INIT -> AGGREGATE -> FRAMEWORK_MAP -> SUGGEST_ENTITIES -> SUGGEST_RELATIONS -> DONE
//! ```
//!
//! Any collaborator failure moves the pipeline to `FAILED` and is returned
//! as a [`PipelineError`] naming the stage. The two framework mappings run
//! concurrently and are joined; if either fails the other is dropped.

use crate::agent::frameworks::{Framework, FrameworkAnalysis, FrameworkMapper};
use crate::agent::llm::{LanguageModel, TimeoutGuard};
use crate::agent::parser::{parse_entity_suggestions, parse_relation_suggestions};
use crate::agent::prompts::{self, ENTITY_PROMPT, RELATION_PROMPT, SOURCE_ANALYSIS_PROMPT};
use crate::analysis::{aggregate, catalog_suggestions};
use crate::error::PipelineError;
use crate::models::{
    merge_suggestions, EntitySuggestion, RelationSuggestion, SourceAnalyses, SuggestionBundle,
    ValidationReport,
};
use crate::sources::{DataSource, SourceAnalysis};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Pipeline state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Stage {
    Init,
    Aggregate,
    FrameworkMap,
    SuggestEntities,
    SuggestRelations,
    Done,
    Failed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Init => "INIT",
            Stage::Aggregate => "AGGREGATE",
            Stage::FrameworkMap => "FRAMEWORK_MAP",
            Stage::SuggestEntities => "SUGGEST_ENTITIES",
            Stage::SuggestRelations => "SUGGEST_RELATIONS",
            Stage::Done => "DONE",
            Stage::Failed => "FAILED",
        };
        write!(f, "{}", name)
    }
}

/// Behaviour switches for a pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Ask the model for a narrative of the raw sources during AGGREGATE.
    pub source_narrative: bool,
    /// Merge aggregated catalog entities into the parsed entity suggestions.
    pub merge_catalog_entities: bool,
    /// Upper bound on each model call.
    pub call_timeout: Duration,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            source_narrative: true,
            merge_catalog_entities: false,
            call_timeout: Duration::from_secs(300),
        }
    }
}

/// Callback invoked on every stage transition.
pub type StageObserver = Arc<dyn Fn(Stage) + Send + Sync>;

/// Serialize a stage input for inclusion in a prompt.
fn to_payload<T: Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_default()
}

/// Drives one run of the mapping pipeline.
pub struct Orchestrator {
    source: Arc<dyn DataSource>,
    model: Arc<dyn LanguageModel>,
    options: PipelineOptions,
    stage: Stage,
    observer: Option<StageObserver>,
}

impl Orchestrator {
    /// Every model call made by this orchestrator is bounded by
    /// `options.call_timeout`.
    pub fn new(
        source: Arc<dyn DataSource>,
        model: Arc<dyn LanguageModel>,
        options: PipelineOptions,
    ) -> Self {
        let model: Arc<dyn LanguageModel> =
            Arc::new(TimeoutGuard::new(model, options.call_timeout));

        Self {
            source,
            model,
            options,
            stage: Stage::Init,
            observer: None,
        }
    }

    pub fn with_observer(mut self, observer: StageObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Current state.
    pub fn stage(&self) -> Stage {
        self.stage
    }

    fn enter(&mut self, stage: Stage) {
        info!("Pipeline stage: {} -> {}", self.stage, stage);
        self.stage = stage;
        if let Some(observer) = &self.observer {
            observer(stage);
        }
    }

    /// Run every stage and return the suggestion bundle.
    pub async fn run(&mut self) -> Result<SuggestionBundle, PipelineError> {
        match self.execute().await {
            Ok(bundle) => {
                self.enter(Stage::Done);
                Ok(bundle)
            }
            Err(e) => {
                error!("Pipeline failed: {}", e);
                self.enter(Stage::Failed);
                Err(e)
            }
        }
    }

    async fn execute(&mut self) -> Result<SuggestionBundle, PipelineError> {
        self.enter(Stage::Aggregate);
        let source = self.aggregate_sources().await?;

        self.enter(Stage::FrameworkMap);
        let (banking, insurance) = self.map_frameworks(&source).await?;

        self.enter(Stage::SuggestEntities);
        let entities = self.suggest_entities(&source, &banking, &insurance).await?;

        self.enter(Stage::SuggestRelations);
        let relations = self
            .suggest_relations(&entities, &source, &banking, &insurance)
            .await?;

        let validation = ValidationReport::check(&entities, &relations);
        if validation.valid {
            info!(
                "Generated {} entities and {} relations",
                entities.len(),
                relations.len()
            );
        } else {
            warn!(
                "Suggestion batch failed validation with {} violations",
                validation.violations.len()
            );
        }

        Ok(SuggestionBundle {
            entity_suggestions: entities,
            relation_suggestions: relations,
            source_analyses: SourceAnalyses {
                datapedia: source,
                framework_a: banking,
                framework_b: insurance,
            },
            validation,
        })
    }

    async fn aggregate_sources(&self) -> Result<SourceAnalysis, PipelineError> {
        let data = self
            .source
            .get_data()
            .await
            .map_err(|e| PipelineError::source_data(Stage::Aggregate, e))?;

        let mut analysis = aggregate(data);
        info!(
            "Aggregated {} entities, {} relationships",
            analysis.entities.len(),
            analysis.relationships.len()
        );

        if self.options.source_narrative {
            let raw = &analysis.raw_data;
            let datapedia = to_payload(&raw.datapedia);
            let conceptual = to_payload(&raw.conceptual_model);
            let schema = to_payload(&raw.schema);
            let prompt = prompts::render(
                SOURCE_ANALYSIS_PROMPT,
                &[
                    ("datapedia", datapedia.as_str()),
                    ("conceptual", conceptual.as_str()),
                    ("schema", schema.as_str()),
                ],
            );
            analysis.analysis = self
                .model
                .complete(&prompt)
                .await
                .map_err(|e| PipelineError::model(Stage::Aggregate, e))?;
        }

        Ok(analysis)
    }

    async fn map_frameworks(
        &self,
        source: &SourceAnalysis,
    ) -> Result<(FrameworkAnalysis, FrameworkAnalysis), PipelineError> {
        let banking = FrameworkMapper::new(Framework::Banking, self.model.clone());
        let insurance = FrameworkMapper::new(Framework::Insurance, self.model.clone());

        futures::future::try_join(banking.map(source), insurance.map(source))
            .await
            .map_err(|e| PipelineError::model(Stage::FrameworkMap, e))
    }

    async fn suggest_entities(
        &self,
        source: &SourceAnalysis,
        banking: &FrameworkAnalysis,
        insurance: &FrameworkAnalysis,
    ) -> Result<Vec<EntitySuggestion>, PipelineError> {
        let datapedia = to_payload(source);
        let banking = to_payload(banking);
        let insurance = to_payload(insurance);
        let prompt = prompts::render(
            ENTITY_PROMPT,
            &[
                ("datapedia", datapedia.as_str()),
                ("banking", banking.as_str()),
                ("insurance", insurance.as_str()),
            ],
        );

        let response = self
            .model
            .complete(&prompt)
            .await
            .map_err(|e| PipelineError::model(Stage::SuggestEntities, e))?;

        let parsed = parse_entity_suggestions(&response);
        info!("Parsed {} entity suggestions", parsed.len());

        if self.options.merge_catalog_entities {
            return Ok(merge_suggestions(catalog_suggestions(source), parsed));
        }
        Ok(parsed)
    }

    async fn suggest_relations(
        &self,
        entities: &[EntitySuggestion],
        source: &SourceAnalysis,
        banking: &FrameworkAnalysis,
        insurance: &FrameworkAnalysis,
    ) -> Result<Vec<RelationSuggestion>, PipelineError> {
        let entities = to_payload(&entities);
        let datapedia = to_payload(source);
        let banking = to_payload(banking);
        let insurance = to_payload(insurance);
        let prompt = prompts::render(
            RELATION_PROMPT,
            &[
                ("entities", entities.as_str()),
                ("datapedia", datapedia.as_str()),
                ("banking", banking.as_str()),
                ("insurance", insurance.as_str()),
            ],
        );

        let response = self
            .model
            .complete(&prompt)
            .await
            .map_err(|e| PipelineError::model(Stage::SuggestRelations, e))?;

        let parsed = parse_relation_suggestions(&response);
        info!("Parsed {} relation suggestions", parsed.len());
        Ok(parsed)
    }
}
