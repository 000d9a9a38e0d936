//! Diagnostic files written while stages run.
//!
//! - `<logs_dir>/<stage>_inputs.log` and `<stage>_responses.log` when verbose
//! - `<temp_dir>/<stage>_<YYYYmmdd_HHMMSS>.json` state snapshots
//!
//! These files are never read back. Write failures are logged and swallowed.

use chrono::Utc;
use etl_core::{ChatMessage, PipelineState, Stage};
use std::path::{Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::error::Result;

#[derive(Debug, Clone)]
pub struct DiagnosticFiles {
    verbose: bool,
    save_intermediate: bool,
    logs_dir: PathBuf,
    temp_dir: PathBuf,
}

impl DiagnosticFiles {
    pub fn new(logs_dir: impl Into<PathBuf>, temp_dir: impl Into<PathBuf>) -> Self {
        Self {
            verbose: false,
            save_intermediate: false,
            logs_dir: logs_dir.into(),
            temp_dir: temp_dir.into(),
        }
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_save_intermediate(mut self, save: bool) -> Self {
        self.save_intermediate = save;
        self
    }

    pub fn inputs_log_path(&self, stage: Stage) -> PathBuf {
        self.logs_dir.join(format!("{}_inputs.log", stage))
    }

    pub fn responses_log_path(&self, stage: Stage) -> PathBuf {
        self.logs_dir.join(format!("{}_responses.log", stage))
    }

    pub async fn log_inputs(&self, stage: Stage, messages: &[ChatMessage]) {
        if !self.verbose {
            return;
        }

        let mut entry = entry_header();
        for message in messages {
            entry.push_str(&format!("{}: {}\n", message.role.as_str(), message.content));
        }

        let path = self.inputs_log_path(stage);
        if let Err(e) = append(&path, &entry).await {
            warn!(path = %path.display(), error = %e, "Failed to write stage input log");
        }
    }

    pub async fn log_response(&self, stage: Stage, content: &str) {
        if !self.verbose {
            return;
        }

        let entry = format!("{}{}\n", entry_header(), content);
        let path = self.responses_log_path(stage);
        if let Err(e) = append(&path, &entry).await {
            warn!(path = %path.display(), error = %e, "Failed to write stage response log");
        }
    }

    /// Write a snapshot of the state after `stage`. Returns the file written.
    pub async fn save_snapshot(&self, stage: Stage, state: &PipelineState) -> Option<PathBuf> {
        if !self.save_intermediate {
            return None;
        }

        let path = self.temp_dir.join(format!(
            "{}_{}.json",
            stage,
            Utc::now().format("%Y%m%d_%H%M%S")
        ));

        match write_snapshot(&path, state).await {
            Ok(()) => {
                debug!(path = %path.display(), "Intermediate state saved");
                Some(path)
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to save intermediate state");
                None
            }
        }
    }
}

fn entry_header() -> String {
    format!("\n--- {} ---\n", Utc::now().to_rfc3339())
}

async fn append(path: &Path, entry: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    file.write_all(entry.as_bytes()).await?;
    file.flush().await?;
    Ok(())
}

async fn write_snapshot(path: &Path, state: &PipelineState) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    let content = state.to_snapshot()?;
    fs::write(path, content).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use etl_core::AnalysisRequest;
    use tempfile::TempDir;

    fn files(temp: &TempDir) -> DiagnosticFiles {
        DiagnosticFiles::new(temp.path().join("logs"), temp.path().join("tmp"))
    }

    #[tokio::test]
    async fn test_verbose_logs_append_entries() {
        let temp = TempDir::new().unwrap();
        let files = files(&temp).with_verbose(true);

        let messages = vec![ChatMessage::system("sys"), ChatMessage::user("ctx")];
        files.log_inputs(Stage::InputAnalysis, &messages).await;
        files.log_inputs(Stage::InputAnalysis, &messages).await;
        files.log_response(Stage::InputAnalysis, "answer").await;

        let inputs = tokio::fs::read_to_string(files.inputs_log_path(Stage::InputAnalysis))
            .await
            .unwrap();
        assert_eq!(inputs.matches("\n--- ").count(), 2);
        assert!(inputs.contains("system: sys\nuser: ctx\n"));

        let responses = tokio::fs::read_to_string(files.responses_log_path(Stage::InputAnalysis))
            .await
            .unwrap();
        assert!(responses.ends_with("---\nanswer\n"));
    }

    #[tokio::test]
    async fn test_quiet_mode_writes_nothing() {
        let temp = TempDir::new().unwrap();
        let files = files(&temp);

        files.log_response(Stage::DdlGeneration, "answer").await;
        let state = PipelineState::new_state(&AnalysisRequest::new("csv"));
        assert!(files.save_snapshot(Stage::DdlGeneration, &state).await.is_none());
        assert!(!temp.path().join("logs").exists());
    }

    #[tokio::test]
    async fn test_snapshot_is_named_after_stage() {
        let temp = TempDir::new().unwrap();
        let files = files(&temp).with_save_intermediate(true);
        let state = PipelineState::new_state(&AnalysisRequest::new("csv"));

        let path = files
            .save_snapshot(Stage::PipelineGeneration, &state)
            .await
            .unwrap();

        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("pipeline_generation_"));
        assert!(name.ends_with(".json"));

        let content = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(PipelineState::from_session(&content).unwrap(), state);
    }

    #[tokio::test]
    async fn test_unwritable_directory_is_not_fatal() {
        let temp = TempDir::new().unwrap();
        let blocker = temp.path().join("blocker");
        tokio::fs::write(&blocker, "file, not a dir").await.unwrap();

        let files = DiagnosticFiles::new(blocker.join("logs"), blocker.join("tmp"))
            .with_verbose(true)
            .with_save_intermediate(true);
        let state = PipelineState::new_state(&AnalysisRequest::new("csv"));

        files.log_response(Stage::ReportGeneration, "text").await;
        assert!(files.save_snapshot(Stage::ReportGeneration, &state).await.is_none());
    }
}
