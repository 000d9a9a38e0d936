use etl_core::Stage;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use tokio::fs;
use tracing::{debug, warn};

use crate::error::{OrchestratorError, Result};

/// One `[sections.<stage>]` table of a prompts file.
#[derive(Debug, Clone, Deserialize)]
pub struct PromptSection {
    pub system_prompt: String,
    #[serde(default)]
    pub instructions: Vec<String>,
    #[serde(default)]
    pub output_format: Option<String>,
}

impl PromptSection {
    pub fn render(&self) -> String {
        let mut prompt = self.system_prompt.clone();

        if !self.instructions.is_empty() {
            prompt.push_str("\n\nInstructions:\n");
            for instruction in &self.instructions {
                prompt.push_str(&format!("- {}\n", instruction));
            }
        }

        if let Some(ref format) = self.output_format {
            prompt.push_str(&format!("\n\nOutput format:\n{}", format));
        }

        prompt
    }
}

#[derive(Debug, Deserialize)]
struct PromptFile {
    #[serde(default)]
    sections: BTreeMap<String, PromptSection>,
}

/// System prompts for every stage.
#[derive(Debug, Clone)]
pub struct PromptLibrary {
    prompts: HashMap<Stage, String>,
}

impl Default for PromptLibrary {
    fn default() -> Self {
        Self::builtin()
    }
}

impl PromptLibrary {
    pub fn builtin() -> Self {
        let prompts = Stage::ALL
            .into_iter()
            .map(|stage| (stage, StagePrompts::default_for(stage).to_string()))
            .collect();
        Self { prompts }
    }

    /// Parse a prompts file. Stages without a section keep the built-in prompt.
    pub fn from_toml(content: &str) -> Result<Self> {
        let file: PromptFile = toml::from_str(content)
            .map_err(|e| OrchestratorError::Config(format!("invalid prompts file: {}", e)))?;

        let mut library = Self::builtin();
        for (key, section) in file.sections {
            match Stage::parse(&key) {
                Some(stage) => {
                    library.prompts.insert(stage, section.render());
                }
                None => warn!(section = %key, "Ignoring prompt section for unknown stage"),
            }
        }
        Ok(library)
    }

    /// Load prompts from `path`, or the built-in set when no usable file exists.
    pub async fn load(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::builtin();
        };

        if !path.exists() {
            debug!(path = %path.display(), "Prompts file does not exist, using built-in prompts");
            return Self::builtin();
        }

        match fs::read_to_string(path).await {
            Ok(content) => match Self::from_toml(&content) {
                Ok(library) => {
                    debug!(path = %path.display(), "Prompts loaded");
                    library
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Failed to parse prompts, using built-in prompts");
                    Self::builtin()
                }
            },
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to read prompts file, using built-in prompts");
                Self::builtin()
            }
        }
    }

    pub fn system_prompt(&self, stage: Stage) -> &str {
        self.prompts
            .get(&stage)
            .map(String::as_str)
            .unwrap_or_else(|| StagePrompts::default_for(stage))
    }
}

pub struct StagePrompts;

impl StagePrompts {
    pub fn default_for(stage: Stage) -> &'static str {
        match stage {
            Stage::InputAnalysis => Self::INPUT_ANALYSIS,
            Stage::DdlGeneration => Self::DDL_GENERATION,
            Stage::PipelineGeneration => Self::PIPELINE_GENERATION,
            Stage::ReportGeneration => Self::REPORT_GENERATION,
        }
    }

    const INPUT_ANALYSIS: &'static str = r#"You are a data analysis expert. Your task:
1. Analyze the source metadata and the data sample
2. Determine the type and structure of the data
3. Recommend the most suitable storage

Respond with a single JSON object with the keys "source_metadata", "data_profile",
"storage_recommendation", "storage_reasoning" and "storage_alternatives"."#;

    const DDL_GENERATION: &'static str = r#"You are a database expert. Your task:
1. Generate DDL scripts that create the tables for the recommended storage
2. Add recommendations on indexes and partitioning
3. Optimize the structure for the chosen storage

Put every script in its own ```sql block. Put index and partitioning
recommendations in a ```json block."#;

    const PIPELINE_GENERATION: &'static str = r#"You are an ETL pipeline expert. Your task:
1. Generate an Airflow DAG that loads the data into the new tables
2. Add the required transformations
3. Configure the schedule and parameters

Put the DAG in a ```python block and its parameters in a ```json block with a
"transformations" list."#;

    const REPORT_GENERATION: &'static str = r###"You are a technical writer. Your task:
1. Write a detailed report of the work done
2. Justify the decisions made
3. Give optimization recommendations

Respond in Markdown, one "## " section per topic."###;
}
