//! Stage execution: context building, invocation with retry, and response
//! application.

use etl_core::{ChatMessage, PipelineState, Stage};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

use crate::error::{LlmError, OrchestratorError};
use crate::llm::{LlmClient, LlmResponse};
use crate::services::ExecutorContext;

use super::phase::{StageOutcome, StagePhase};

/// Runs single stages against a state record.
///
/// `execute` never fails: an invocation that fails on every attempt is
/// recorded in `state.errors` and the state is otherwise left as it was.
pub struct StageExecutor {
    ctx: Arc<ExecutorContext>,
}

impl StageExecutor {
    pub fn new(ctx: Arc<ExecutorContext>) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &ExecutorContext {
        &self.ctx
    }

    pub async fn execute(&self, phase: &dyn StagePhase, state: &mut PipelineState) -> StageOutcome {
        let stage = phase.stage();
        let started = Instant::now();
        info!(stage = %stage, "Executing stage");

        let messages = self.build_messages(stage, state);
        debug!(
            stage = %stage,
            message_count = messages.len(),
            prompt_chars = messages.iter().map(|m| m.content.len()).sum::<usize>(),
            "Stage messages built"
        );
        self.ctx.diagnostics.log_inputs(stage, &messages).await;

        let client = match self.ctx.models.client_for(stage, phase.use_tools()).await {
            Ok(client) => client,
            Err(e) => {
                let reason = format!("no model available: {}", e);
                return self.record_failure(state, stage, 0, reason);
            }
        };

        let (result, attempts) = self.invoke_with_retry(stage, client.as_ref(), &messages).await;
        let response = match result {
            Ok(response) => response,
            Err(e) => return self.record_failure(state, stage, attempts, e.to_string()),
        };

        self.ctx.diagnostics.log_response(stage, &response.content).await;

        state.messages.push(ChatMessage::assistant(response.content.clone()));
        let recorded = state.mark_completed(stage);
        if !recorded {
            warn!(stage = %stage, "Stage ran on incomplete upstream data");
            state.record_warning(
                stage,
                format!(
                    "{} ran although an earlier stage did not complete; it was not marked completed",
                    stage
                ),
            );
        }

        let outcome = phase.apply_response(state, &response.content);
        for warning in outcome.warnings {
            warn!(stage = %stage, warning = %warning, "Stage response incomplete");
            state.record_warning(stage, warning);
        }

        self.ctx.diagnostics.save_snapshot(stage, state).await;

        info!(
            stage = %stage,
            model = %response.model,
            attempts,
            duration_ms = started.elapsed().as_millis() as u64,
            "Stage completed"
        );

        StageOutcome {
            stage,
            success: true,
            attempts,
            recorded,
            error: None,
        }
    }

    /// Messages for one invocation: system prompt, state context, recent history.
    pub fn build_messages(&self, stage: Stage, state: &PipelineState) -> Vec<ChatMessage> {
        let mut messages = vec![ChatMessage::system(self.ctx.prompts.system_prompt(stage))];

        if let Some(context) = build_context(state) {
            messages.push(ChatMessage::user(context));
        }

        messages.extend_from_slice(state.recent_messages(self.ctx.config.context_window));
        messages
    }

    /// Invoke the client until it succeeds or the attempt budget is spent.
    async fn invoke_with_retry(
        &self,
        stage: Stage,
        client: &dyn LlmClient,
        messages: &[ChatMessage],
    ) -> (Result<LlmResponse, LlmError>, u32) {
        let max_attempts = self.ctx.config.attempts();
        let mut attempt = 0;

        loop {
            attempt += 1;
            match client.invoke(messages).await {
                Ok(response) => return (Ok(response), attempt),
                Err(e) if attempt < max_attempts => {
                    warn!(
                        stage = %stage,
                        model = %client.model_name(),
                        error = %e,
                        "Model invocation failed (attempt {}/{})",
                        attempt,
                        max_attempts
                    );
                }
                Err(e) => return (Err(e), attempt),
            }
        }
    }

    fn record_failure(
        &self,
        state: &mut PipelineState,
        stage: Stage,
        attempts: u32,
        reason: String,
    ) -> StageOutcome {
        let err = OrchestratorError::stage_failed(stage, reason);
        error!(stage = %stage, attempts, error = %err, "Stage failed");
        state.record_error(stage, err.to_string());
        StageOutcome::failed(stage, attempts, err.to_string())
    }
}

/// Labeled blocks of the state values a stage needs, in fixed order.
/// `None` when there is nothing to say.
fn build_context(state: &PipelineState) -> Option<String> {
    let mut parts = Vec::new();

    if let Some(config) = state.source_config.as_ref().filter(|v| !is_blank(v)) {
        parts.push(format!("Source configuration: {}", config));
    }
    if let Some(metadata) = state.source_metadata.as_ref().filter(|v| !is_blank(v)) {
        parts.push(format!("Metadata: {}", metadata));
    }
    if let Some(sample) = state.data_sample.as_ref() {
        let text = sample.to_text();
        if !text.is_empty() {
            parts.push(format!("Data sample: {}", text));
        }
    }
    if let Some(storage) = state.storage_recommendation.as_deref().filter(|s| !s.is_empty()) {
        parts.push(format!("Recommended storage: {}", storage));
    }
    if let Some(scripts) = state.ddl_scripts.as_ref().filter(|s| !s.is_empty()) {
        let listing = scripts
            .iter()
            .map(|s| format!("-- {}\n{}", s.name, s.sql))
            .collect::<Vec<_>>()
            .join("\n\n");
        parts.push(format!("DDL scripts:\n{}", listing));
    }
    if let Some(feedback) = state.user_feedback.as_ref().filter(|v| !is_blank(v)) {
        parts.push(format!("User feedback: {}", feedback));
    }

    if parts.is_empty() {
        None
    } else {
        Some(parts.join("\n\n"))
    }
}

fn is_blank(value: &serde_json::Value) -> bool {
    use serde_json::Value;
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        _ => false,
    }
}
