//! Model-backed pipeline stages.
//!
//! This module holds the language-model client, the prompt templates, the
//! response parser, the framework mappers and the orchestrator that runs
//! them in order.

pub mod frameworks;
pub mod llm;
pub mod orchestrator;
pub mod parser;
pub mod prompts;

pub use llm::{LanguageModel, OllamaClient, OllamaConfig};
pub use orchestrator::{Orchestrator, PipelineOptions, Stage};
