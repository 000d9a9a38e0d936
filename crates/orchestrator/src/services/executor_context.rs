use std::path::PathBuf;

use crate::config::AgentsConfig;
use crate::files::DiagnosticFiles;
use crate::llm::ModelManager;
use crate::prompts::PromptLibrary;

#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Total invocation attempts per stage
    pub retry_count: u32,
    /// Prior messages included in a stage's context
    pub context_window: usize,
    pub verbose: bool,
    pub save_intermediate: bool,
    pub logs_dir: PathBuf,
    pub temp_dir: PathBuf,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self::from_agents(&AgentsConfig::default())
    }
}

impl ExecutorConfig {
    pub fn from_agents(agents: &AgentsConfig) -> Self {
        Self {
            retry_count: agents.retry_count,
            context_window: agents.context_window,
            verbose: agents.verbose,
            save_intermediate: agents.save_intermediate,
            logs_dir: agents.logs_dir.clone(),
            temp_dir: agents.temp_dir.clone(),
        }
    }

    pub fn with_retry_count(mut self, retry_count: u32) -> Self {
        self.retry_count = retry_count;
        self
    }

    pub fn with_context_window(mut self, messages: usize) -> Self {
        self.context_window = messages;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_save_intermediate(mut self, save: bool) -> Self {
        self.save_intermediate = save;
        self
    }

    pub fn with_dirs(mut self, logs_dir: impl Into<PathBuf>, temp_dir: impl Into<PathBuf>) -> Self {
        self.logs_dir = logs_dir.into();
        self.temp_dir = temp_dir.into();
        self
    }

    /// Attempts actually made; at least one.
    pub fn attempts(&self) -> u32 {
        self.retry_count.max(1)
    }
}

/// Everything a stage run needs besides the state itself.
pub struct ExecutorContext {
    pub config: ExecutorConfig,
    pub models: ModelManager,
    pub prompts: PromptLibrary,
    pub diagnostics: DiagnosticFiles,
}

impl ExecutorContext {
    pub fn new(config: ExecutorConfig, models: ModelManager) -> Self {
        let diagnostics = DiagnosticFiles::new(&config.logs_dir, &config.temp_dir)
            .with_verbose(config.verbose)
            .with_save_intermediate(config.save_intermediate);
        Self {
            config,
            models,
            prompts: PromptLibrary::builtin(),
            diagnostics,
        }
    }

    pub fn with_prompts(mut self, prompts: PromptLibrary) -> Self {
        self.prompts = prompts;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builders() {
        let config = ExecutorConfig::default()
            .with_retry_count(5)
            .with_context_window(2)
            .with_verbose(true)
            .with_save_intermediate(false)
            .with_dirs("/var/log/etl", "/var/tmp/etl");

        assert_eq!(config.retry_count, 5);
        assert_eq!(config.context_window, 2);
        assert!(config.verbose);
        assert!(!config.save_intermediate);
        assert_eq!(config.temp_dir, PathBuf::from("/var/tmp/etl"));
    }

    #[test]
    fn test_zero_retry_count_still_attempts_once() {
        assert_eq!(ExecutorConfig::default().with_retry_count(0).attempts(), 1);
        assert_eq!(ExecutorConfig::default().attempts(), 3);
    }
}
