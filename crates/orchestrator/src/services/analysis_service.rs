//! Caller-facing entry points: batch analysis, interactive steps and
//! session management.
//!
//! Every failure leaves this module as an [`AnalysisFailure`] carrying a
//! ready-to-send [`ErrorResponse`]; nothing below it is exposed to callers.

use etl_core::{AnalysisRequest, InteractiveRequest, PipelineState, SessionId};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::GeneralConfig;
use crate::error::{OrchestratorError, Result};
use crate::llm::ModelManager;
use crate::prompts::PromptLibrary;
use crate::response::{
    format_batch, format_interactive, BatchResponse, ErrorResponse, InteractiveResponse,
};
use crate::runner::PipelineRunner;
use crate::services::{ExecutorConfig, ExecutorContext};
use crate::session_store::SessionStore;

const BATCH_FAILED: &str = "An error occurred while analyzing the data source";
const STEP_FAILED: &str = "An error occurred during interactive analysis";
const SESSION_FAILED: &str = "An error occurred while accessing the session";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    NotFound,
    InvalidInput,
    Systemic,
}

#[derive(Debug, Error)]
#[error("{}: {}", .body.message, .body.error)]
pub struct AnalysisFailure {
    pub kind: FailureKind,
    pub body: ErrorResponse,
}

impl AnalysisFailure {
    fn from_error(
        err: OrchestratorError,
        message: &str,
        execution_id: Option<Uuid>,
        session_id: Option<String>,
    ) -> Self {
        let kind = match err {
            OrchestratorError::SessionNotFound(_) => FailureKind::NotFound,
            OrchestratorError::InvalidSessionId(_) | OrchestratorError::InvalidRequest(_) => {
                FailureKind::InvalidInput
            }
            _ => FailureKind::Systemic,
        };

        if kind == FailureKind::Systemic {
            error!(kind = err.kind(), error = %err, ?execution_id, ?session_id, "{}", message);
        } else {
            warn!(kind = err.kind(), error = %err, "Request rejected");
        }

        Self {
            kind,
            body: ErrorResponse::new(err.to_string(), message)
                .with_execution_id(execution_id)
                .with_session_id(session_id),
        }
    }
}

pub type ServiceResult<T> = std::result::Result<T, AnalysisFailure>;

pub struct AnalysisService {
    runner: PipelineRunner,
    store: SessionStore,
    timeout: Duration,
    await_feedback: bool,
}

impl AnalysisService {
    pub fn new(ctx: Arc<ExecutorContext>, store: SessionStore) -> Self {
        Self {
            runner: PipelineRunner::new(ctx),
            store,
            timeout: Duration::from_secs(600),
            await_feedback: true,
        }
    }

    /// Build the full service stack from configuration.
    pub async fn from_config(config: &GeneralConfig) -> Self {
        let prompts = PromptLibrary::load(config.agents.prompts_file.as_deref()).await;
        let models = ModelManager::from_config(&config.llm.ollama);
        Self::assemble(config, models, prompts)
    }

    /// Like [`from_config`](Self::from_config) with an explicit model manager
    /// and the built-in prompts.
    pub fn with_models(config: &GeneralConfig, models: ModelManager) -> Self {
        Self::assemble(config, models, PromptLibrary::builtin())
    }

    fn assemble(config: &GeneralConfig, models: ModelManager, prompts: PromptLibrary) -> Self {
        let ctx = ExecutorContext::new(ExecutorConfig::from_agents(&config.agents), models)
            .with_prompts(prompts);
        Self::new(Arc::new(ctx), SessionStore::new(&config.sessions.dir))
            .with_timeout(config.server.request_timeout())
            .with_await_feedback(config.agents.await_feedback)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_await_feedback(mut self, await_feedback: bool) -> Self {
        self.await_feedback = await_feedback;
        self
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Run every stage for `request` and report the combined result.
    pub async fn analyze(&self, request: AnalysisRequest) -> ServiceResult<BatchResponse> {
        request
            .validate()
            .map_err(|e| AnalysisFailure::from_error(e.into(), BATCH_FAILED, None, None))?;

        info!(source_type = %request.source_type, "Starting data source analysis");
        let state = PipelineState::new_state(&request);
        let execution_id = state.execution_id;

        let state = self
            .with_deadline(self.runner.run_to_completion(state))
            .await
            .map_err(|e| AnalysisFailure::from_error(e, BATCH_FAILED, execution_id, None))?;

        info!(execution_id = ?execution_id, errors = state.errors.len(), "Analysis finished");
        Ok(format_batch(&state))
    }

    /// Run the next stage of a session, starting a new session when the
    /// request carries no `session_id`.
    pub async fn analyze_interactive(
        &self,
        request: InteractiveRequest,
    ) -> ServiceResult<InteractiveResponse> {
        let raw_session_id = request.session_id.clone();
        let mut state = self
            .open_session(&request)
            .await
            .map_err(|e| AnalysisFailure::from_error(e, STEP_FAILED, None, raw_session_id.clone()))?;

        let execution_id = state.execution_id;
        let session_id = state.session_id.unwrap_or_default();
        state.merge_feedback(request.user_feedback, request.user_confirmations);

        let mut state = self
            .with_deadline(self.runner.run_next_stage(state))
            .await
            .map_err(|e| {
                AnalysisFailure::from_error(e, STEP_FAILED, execution_id, Some(session_id.to_string()))
            })?;

        state.waiting_for_feedback = self.await_feedback && !state.is_finished();

        self.store.save(&session_id, &state).await.map_err(|e| {
            AnalysisFailure::from_error(e, STEP_FAILED, execution_id, Some(session_id.to_string()))
        })?;

        info!(
            session_id = %session_id,
            current_stage = ?state.current_agent,
            "Interactive step finished"
        );
        Ok(format_interactive(&state))
    }

    /// Current projection of a stored session without running anything.
    pub async fn session_snapshot(&self, raw_id: &str) -> ServiceResult<InteractiveResponse> {
        let state = self
            .load_session(raw_id)
            .await
            .map_err(|e| AnalysisFailure::from_error(e, SESSION_FAILED, None, Some(raw_id.to_string())))?;
        Ok(format_interactive(&state))
    }

    pub async fn delete_session(&self, raw_id: &str) -> ServiceResult<()> {
        self.remove_session(raw_id)
            .await
            .map_err(|e| AnalysisFailure::from_error(e, SESSION_FAILED, None, Some(raw_id.to_string())))
    }

    async fn open_session(&self, request: &InteractiveRequest) -> Result<PipelineState> {
        if let Some(ref raw_id) = request.session_id {
            return self.load_session(raw_id).await;
        }

        let analysis = request.analysis_request()?;
        let mut state = PipelineState::new_state(&analysis);
        let id = SessionId::new();
        state.interactive_mode = true;
        state.session_id = Some(id);
        info!(session_id = %id, source_type = %analysis.source_type, "New interactive session");
        Ok(state)
    }

    async fn load_session(&self, raw_id: &str) -> Result<PipelineState> {
        let id = SessionId::parse(raw_id)?;
        let mut state = self.store.load(&id).await?;
        if state.session_id.is_none() {
            state.session_id = Some(id);
        }
        Ok(state)
    }

    async fn remove_session(&self, raw_id: &str) -> Result<()> {
        let id = SessionId::parse(raw_id)?;
        self.store.delete(&id).await
    }

    async fn with_deadline<T>(&self, work: impl Future<Output = T>) -> Result<T> {
        tokio::time::timeout(self.timeout, work)
            .await
            .map_err(|_| OrchestratorError::Timeout {
                duration_ms: self.timeout.as_millis() as u64,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LlmResult;
    use crate::llm::{FallbackProvider, LlmClient, LlmResponse, StaticProvider};
    use crate::response::{BatchStatus, InteractiveStatus};
    use async_trait::async_trait;
    use etl_core::{ChatMessage, Stage};
    use serde_json::json;
    use tempfile::TempDir;

    struct SlowClient;

    #[async_trait]
    impl LlmClient for SlowClient {
        async fn invoke(&self, _messages: &[ChatMessage]) -> LlmResult<LlmResponse> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(LlmResponse::new("too late", "slow"))
        }

        fn model_name(&self) -> &str {
            "slow"
        }
    }

    struct NullMetadataClient;

    #[async_trait]
    impl LlmClient for NullMetadataClient {
        async fn invoke(&self, _messages: &[ChatMessage]) -> LlmResult<LlmResponse> {
            Ok(LlmResponse::new(
                r#"{"metadata": null, "data_sample": null, "storage_recommendation": "PostgreSQL"}"#,
                "nulls",
            ))
        }

        fn model_name(&self) -> &str {
            "nulls"
        }
    }

    fn config(temp: &TempDir) -> GeneralConfig {
        let mut config = GeneralConfig::default();
        config.sessions.dir = temp.path().join("sessions");
        config.agents.save_intermediate = false;
        config
    }

    fn service(temp: &TempDir, provider: FallbackProvider) -> AnalysisService {
        AnalysisService::with_models(&config(temp), ModelManager::new(Arc::new(provider)))
    }

    fn csv_request() -> AnalysisRequest {
        AnalysisRequest::new("csv").with_field("file_path", json!("/data/orders.csv"))
    }

    #[tokio::test]
    async fn test_batch_with_fallback_succeeds() {
        let temp = TempDir::new().unwrap();
        let service = service(&temp, FallbackProvider::new());

        let response = service.analyze(csv_request()).await.unwrap();

        assert_eq!(response.status, BatchStatus::Success);
        assert!(response.execution_id.is_some());
        assert_eq!(response.execution_stats.stages_completed, 4);
        assert!(!response.ddl_scripts.is_empty());
        assert!(!response.pipeline_code.is_empty());
        assert!(!response.report.is_empty());
        assert_eq!(
            response.analysis_result.storage_recommendation.as_deref(),
            Some("PostgreSQL")
        );
    }

    #[tokio::test]
    async fn test_batch_with_failing_stage_completes_with_errors() {
        let temp = TempDir::new().unwrap();
        let service = service(
            &temp,
            FallbackProvider::new().failing_on(Stage::PipelineGeneration),
        );

        let response = service.analyze(csv_request()).await.unwrap();

        assert_eq!(response.status, BatchStatus::CompletedWithErrors);
        assert_eq!(response.errors.len(), 1);
        assert_eq!(response.errors[0].agent, Stage::PipelineGeneration);
        assert!(response.pipeline_code.is_empty());
        assert_eq!(response.execution_stats.stages_completed, 2);
    }

    #[tokio::test]
    async fn test_batch_rejects_invalid_request() {
        let temp = TempDir::new().unwrap();
        let service = service(&temp, FallbackProvider::new());

        let failure = service.analyze(AnalysisRequest::new("")).await.unwrap_err();
        assert_eq!(failure.kind, FailureKind::InvalidInput);
        assert_eq!(failure.body.status, "error");
    }

    #[tokio::test]
    async fn test_batch_timeout_reports_execution_id() {
        let temp = TempDir::new().unwrap();
        let models = ModelManager::new(Arc::new(StaticProvider::new(Arc::new(SlowClient))));
        let service = AnalysisService::with_models(&config(&temp), models)
            .with_timeout(Duration::from_millis(50));

        let failure = service.analyze(csv_request()).await.unwrap_err();

        assert_eq!(failure.kind, FailureKind::Systemic);
        assert!(failure.body.execution_id.is_some());
        assert!(failure.body.error.contains("timed out"));
    }

    #[tokio::test]
    async fn test_interactive_steps_through_a_session() {
        let temp = TempDir::new().unwrap();
        let service = service(&temp, FallbackProvider::new());

        let first = service
            .analyze_interactive(InteractiveRequest::new_session(&csv_request()))
            .await
            .unwrap();
        assert_eq!(first.current_stage, "input_analysis");
        assert_eq!(first.completed_stages, vec![Stage::InputAnalysis]);
        assert_eq!(first.status, InteractiveStatus::WaitingForFeedback);
        let session_id = first.session_id.clone().unwrap();

        let second = service
            .analyze_interactive(
                InteractiveRequest::resume(session_id.clone())
                    .with_feedback(json!({"storage": "keep PostgreSQL"})),
            )
            .await
            .unwrap();
        assert_eq!(second.current_stage, "ddl_generation");
        assert_eq!(
            second.completed_stages,
            vec![Stage::InputAnalysis, Stage::DdlGeneration]
        );
        assert_eq!(second.session_id.as_deref(), Some(session_id.as_str()));

        let id = SessionId::parse(&session_id).unwrap();
        let stored = service.store().load(&id).await.unwrap();
        assert_eq!(stored.user_feedback, Some(json!({"storage": "keep PostgreSQL"})));
        assert!(stored.interactive_mode);
        assert!(stored.waiting_for_feedback);
    }

    #[tokio::test]
    async fn test_interactive_run_to_the_end_is_stable() {
        let temp = TempDir::new().unwrap();
        let service = service(&temp, FallbackProvider::new());

        let first = service
            .analyze_interactive(InteractiveRequest::new_session(&csv_request()))
            .await
            .unwrap();
        let session_id = first.session_id.unwrap();

        let mut last = None;
        for _ in 0..3 {
            last = Some(
                service
                    .analyze_interactive(InteractiveRequest::resume(session_id.clone()))
                    .await
                    .unwrap(),
            );
        }
        let done = last.unwrap();
        assert_eq!(done.status, InteractiveStatus::Completed);
        assert_eq!(done.current_stage, "report_generation");
        assert_eq!(done.data["full_results"]["status"], "success");

        let again = service
            .analyze_interactive(InteractiveRequest::resume(session_id.clone()))
            .await
            .unwrap();
        assert_eq!(again, done);
    }

    #[tokio::test]
    async fn test_interactive_unknown_session_is_not_found() {
        let temp = TempDir::new().unwrap();
        let service = service(&temp, FallbackProvider::new());

        let failure = service
            .analyze_interactive(InteractiveRequest::resume(SessionId::new().to_string()))
            .await
            .unwrap_err();
        assert_eq!(failure.kind, FailureKind::NotFound);
        assert!(failure.body.session_id.is_some());
    }

    #[tokio::test]
    async fn test_interactive_rejects_malformed_session_id() {
        let temp = TempDir::new().unwrap();
        let service = service(&temp, FallbackProvider::new());

        let failure = service
            .analyze_interactive(InteractiveRequest::resume("../../etc/passwd"))
            .await
            .unwrap_err();
        assert_eq!(failure.kind, FailureKind::InvalidInput);
    }

    #[tokio::test]
    async fn test_interactive_new_session_requires_source_type() {
        let temp = TempDir::new().unwrap();
        let service = service(&temp, FallbackProvider::new());

        let failure = service
            .analyze_interactive(InteractiveRequest::default())
            .await
            .unwrap_err();
        assert_eq!(failure.kind, FailureKind::InvalidInput);
    }

    #[tokio::test]
    async fn test_null_answer_projects_the_same_after_reload() {
        let temp = TempDir::new().unwrap();
        let models = ModelManager::new(Arc::new(StaticProvider::new(Arc::new(NullMetadataClient))));
        let service = AnalysisService::with_models(&config(&temp), models);

        let first = service
            .analyze_interactive(InteractiveRequest::new_session(&csv_request()))
            .await
            .unwrap();
        assert_eq!(first.data["metadata"], json!({}));
        assert_eq!(first.data["storage_recommendation"], "PostgreSQL");

        let snapshot = service
            .session_snapshot(first.session_id.as_deref().unwrap())
            .await
            .unwrap();
        assert_eq!(snapshot, first);
    }

    #[tokio::test]
    async fn test_snapshot_and_delete() {
        let temp = TempDir::new().unwrap();
        let service = service(&temp, FallbackProvider::new()).with_await_feedback(false);

        let first = service
            .analyze_interactive(InteractiveRequest::new_session(&csv_request()))
            .await
            .unwrap();
        assert_eq!(first.status, InteractiveStatus::Processing);
        let session_id = first.session_id.clone().unwrap();

        let snapshot = service.session_snapshot(&session_id).await.unwrap();
        assert_eq!(snapshot, first);

        service.delete_session(&session_id).await.unwrap();
        let failure = service.session_snapshot(&session_id).await.unwrap_err();
        assert_eq!(failure.kind, FailureKind::NotFound);

        let failure = service.delete_session(&session_id).await.unwrap_err();
        assert_eq!(failure.kind, FailureKind::NotFound);
    }
}
