//! The state record threaded through every pipeline stage.
//!
//! [`PipelineState`] is plain data. Every field serializes to JSON-compatible
//! values so a run can be parked in a session file and resumed by another
//! process. The one exception is [`StateValue::Opaque`], which holds an
//! in-memory object with no plain-data form; see its docs for how it is
//! persisted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::domain::message::ChatMessage;
use crate::domain::request::AnalysisRequest;
use crate::domain::session_id::SessionId;
use crate::domain::stage::{Stage, STAGE_TABLE};

/// Anything that can be shown as text but has no plain-data representation.
pub trait OpaqueValue: fmt::Debug + fmt::Display + Send + Sync {}

impl<T: fmt::Debug + fmt::Display + Send + Sync> OpaqueValue for T {}

/// A loosely typed state value.
///
/// `Plain` values round-trip through persistence unchanged. `Opaque` values
/// are written as their `Display` text and come back as a `Plain` string:
/// the conversion is lossy and one-way. [`PipelineState::coerced_fields`]
/// reports which fields would be affected before a save.
#[derive(Debug, Clone)]
pub enum StateValue {
    Plain(Value),
    Opaque(Arc<dyn OpaqueValue>),
}

impl StateValue {
    pub fn opaque<T: OpaqueValue + 'static>(value: T) -> Self {
        Self::Opaque(Arc::new(value))
    }

    pub fn is_opaque(&self) -> bool {
        matches!(self, Self::Opaque(_))
    }

    pub fn as_plain(&self) -> Option<&Value> {
        match self {
            Self::Plain(value) => Some(value),
            Self::Opaque(_) => None,
        }
    }

    /// Text used when the value is placed in a prompt.
    pub fn to_text(&self) -> String {
        match self {
            Self::Plain(Value::String(s)) => s.clone(),
            Self::Plain(value) => value.to_string(),
            Self::Opaque(value) => value.to_string(),
        }
    }
}

impl From<Value> for StateValue {
    fn from(value: Value) -> Self {
        Self::Plain(value)
    }
}

impl PartialEq for StateValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Plain(a), Self::Plain(b)) => a == b,
            (Self::Opaque(a), Self::Opaque(b)) => a.to_string() == b.to_string(),
            _ => false,
        }
    }
}

impl Serialize for StateValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Plain(value) => value.serialize(serializer),
            Self::Opaque(value) => serializer.serialize_str(&value.to_string()),
        }
    }
}

impl<'de> Deserialize<'de> for StateValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(Self::Plain)
    }
}

/// A stage failure recorded in the state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct StageError {
    pub agent: Stage,
    pub error: String,
    pub timestamp: DateTime<Utc>,
}

/// A non-fatal problem noticed while a stage ran.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct StageWarning {
    pub agent: Stage,
    pub warning: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct DdlScript {
    pub name: String,
    pub sql: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ExecutionStats {
    pub stages_completed: usize,
    pub stages_total: usize,
    pub error_count: usize,
    pub warning_count: usize,
    pub message_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineState {
    #[serde(default)]
    pub messages: Vec<ChatMessage>,

    // Input
    #[serde(default, deserialize_with = "explicit", skip_serializing_if = "Option::is_none")]
    pub source_config: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_type: Option<String>,
    #[serde(default, deserialize_with = "explicit", skip_serializing_if = "Option::is_none")]
    pub connection_params: Option<Value>,

    // Input analysis
    #[serde(default, deserialize_with = "explicit", skip_serializing_if = "Option::is_none")]
    pub source_metadata: Option<Value>,
    #[serde(default, deserialize_with = "explicit", skip_serializing_if = "Option::is_none")]
    pub data_sample: Option<StateValue>,
    #[serde(default, deserialize_with = "explicit", skip_serializing_if = "Option::is_none")]
    pub data_profile: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_recommendation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_reasoning: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_alternatives: Option<Vec<Value>>,

    // DDL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ddl_scripts: Option<Vec<DdlScript>>,
    #[serde(default, deserialize_with = "explicit", skip_serializing_if = "Option::is_none")]
    pub ddl_recommendations: Option<Value>,

    // Pipeline
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pipeline_code: Option<String>,
    #[serde(default, deserialize_with = "explicit", skip_serializing_if = "Option::is_none")]
    pub pipeline_config: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transformations: Option<Vec<String>>,

    // Report
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report_sections: Option<BTreeMap<String, String>>,

    // Flow control
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_agent: Option<Stage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_agent: Option<Stage>,
    #[serde(default)]
    pub completed_agents: Vec<Stage>,

    // Feedback
    #[serde(default, deserialize_with = "explicit", skip_serializing_if = "Option::is_none")]
    pub user_feedback: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_confirmations: Option<BTreeMap<String, bool>>,

    #[serde(default)]
    pub errors: Vec<StageError>,
    #[serde(default)]
    pub warnings: Vec<StageWarning>,

    // Execution metadata
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_stats: Option<ExecutionStats>,

    // Interactive mode
    #[serde(default)]
    pub interactive_mode: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
    #[serde(default)]
    pub waiting_for_feedback: bool,
}

/// Deserialize a present value, `null` included, as `Some`. Together with
/// `#[serde(default)]` this keeps `Some(Value::Null)` and `None` apart across
/// a snapshot round trip.
fn explicit<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

impl PipelineState {
    /// Fresh state for a new run, with only the caller-supplied inputs and
    /// the execution identity filled in.
    pub fn new_state(request: &AnalysisRequest) -> Self {
        Self {
            source_config: Some(request.to_source_config()),
            source_type: Some(request.source_type.clone()),
            connection_params: Some(
                request
                    .connection_params
                    .clone()
                    .unwrap_or_else(|| Value::Object(Default::default())),
            ),
            execution_id: Some(Uuid::new_v4()),
            start_time: Some(Utc::now()),
            ..Default::default()
        }
    }

    /// Restore a state from a persisted session snapshot.
    pub fn from_session(snapshot: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(snapshot)
    }

    /// Serialize to the persisted snapshot format (pretty JSON).
    pub fn to_snapshot(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Names of fields whose values will be written as text, not as data.
    pub fn coerced_fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.data_sample.as_ref().is_some_and(StateValue::is_opaque) {
            fields.push("data_sample");
        }
        fields
    }

    pub fn record_error(&mut self, stage: Stage, error: impl Into<String>) {
        self.errors.push(StageError {
            agent: stage,
            error: error.into(),
            timestamp: Utc::now(),
        });
    }

    pub fn record_warning(&mut self, stage: Stage, warning: impl Into<String>) {
        self.warnings.push(StageWarning {
            agent: stage,
            warning: warning.into(),
            timestamp: Utc::now(),
        });
    }

    pub fn errors_for(&self, stage: Stage) -> impl Iterator<Item = &StageError> {
        self.errors.iter().filter(move |e| e.agent == stage)
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Record a successful run of `stage` in the flow-control fields.
    ///
    /// `completed_agents` must stay a prefix of the stage table, so a stage
    /// is only appended when every earlier stage is already there. Returns
    /// `false` when the stage could not be recorded for that reason.
    pub fn mark_completed(&mut self, stage: Stage) -> bool {
        if self.completed_agents.contains(&stage) {
            if self.completed_agents.last() == Some(&stage) {
                self.current_agent = Some(stage);
                self.next_agent = stage.next();
            }
            return true;
        }

        if self.completed_agents.len() != stage.index() {
            return false;
        }

        self.completed_agents.push(stage);
        self.current_agent = Some(stage);
        self.next_agent = stage.next();
        true
    }

    pub fn is_completed(&self, stage: Stage) -> bool {
        self.completed_agents.contains(&stage)
    }

    /// True once the last stage has completed.
    pub fn is_finished(&self) -> bool {
        self.is_completed(Stage::last())
    }

    /// The last `n` messages of the history.
    pub fn recent_messages(&self, n: usize) -> &[ChatMessage] {
        let start = self.messages.len().saturating_sub(n);
        &self.messages[start..]
    }

    /// Merge caller feedback before resuming a session.
    pub fn merge_feedback(
        &mut self,
        feedback: Option<Value>,
        confirmations: Option<BTreeMap<String, bool>>,
    ) {
        if let Some(feedback) = feedback.filter(|f| !f.is_null()) {
            self.user_feedback = Some(feedback);
            self.waiting_for_feedback = false;
        }
        if let Some(confirmations) = confirmations {
            self.user_confirmations
                .get_or_insert_with(BTreeMap::new)
                .extend(confirmations);
        }
    }

    pub fn stats(&self) -> ExecutionStats {
        let duration_ms = match (self.start_time, self.end_time) {
            (Some(start), Some(end)) => Some((end - start).num_milliseconds()),
            _ => None,
        };
        ExecutionStats {
            stages_completed: self.completed_agents.len(),
            stages_total: STAGE_TABLE.len(),
            error_count: self.errors.len(),
            warning_count: self.warnings.len(),
            message_count: self.messages.len(),
            duration_ms,
        }
    }

    /// Stamp the end of a run and compute its statistics.
    pub fn finalize(&mut self) {
        if self.start_time.is_none() {
            self.start_time = Some(Utc::now());
        }
        self.end_time = Some(Utc::now());
        self.execution_stats = Some(self.stats());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct SampleFrame {
        rows: usize,
    }

    impl fmt::Debug for SampleFrame {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "SampleFrame({})", self.rows)
        }
    }

    impl fmt::Display for SampleFrame {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "<frame with {} rows>", self.rows)
        }
    }

    fn csv_state() -> PipelineState {
        PipelineState::new_state(
            &AnalysisRequest::new("csv").with_field("file_path", json!("/data/orders.csv")),
        )
    }

    #[test]
    fn test_new_state_sets_inputs_and_identity() {
        let state = csv_state();
        assert_eq!(state.source_type.as_deref(), Some("csv"));
        assert_eq!(state.source_config.as_ref().unwrap()["file_path"], "/data/orders.csv");
        assert_eq!(state.connection_params, Some(json!({})));
        assert!(state.execution_id.is_some());
        assert!(state.start_time.is_some());
        assert!(state.completed_agents.is_empty());
        assert!(state.current_agent.is_none());
    }

    #[test]
    fn test_mark_completed_in_order() {
        let mut state = csv_state();
        assert!(state.mark_completed(Stage::InputAnalysis));
        assert!(state.mark_completed(Stage::DdlGeneration));

        assert_eq!(
            state.completed_agents,
            vec![Stage::InputAnalysis, Stage::DdlGeneration]
        );
        assert_eq!(state.current_agent, Some(Stage::DdlGeneration));
        assert_eq!(state.next_agent, Some(Stage::PipelineGeneration));
    }

    #[test]
    fn test_mark_completed_refuses_gaps() {
        let mut state = csv_state();
        assert!(state.mark_completed(Stage::InputAnalysis));
        assert!(!state.mark_completed(Stage::PipelineGeneration));

        assert_eq!(state.completed_agents, vec![Stage::InputAnalysis]);
        assert_eq!(state.current_agent, Some(Stage::InputAnalysis));
    }

    #[test]
    fn test_mark_completed_is_idempotent() {
        let mut state = csv_state();
        state.mark_completed(Stage::InputAnalysis);
        state.mark_completed(Stage::InputAnalysis);
        assert_eq!(state.completed_agents, vec![Stage::InputAnalysis]);
    }

    #[test]
    fn test_last_stage_clears_next_agent() {
        let mut state = csv_state();
        for stage in Stage::ALL {
            assert!(state.mark_completed(stage));
        }
        assert!(state.is_finished());
        assert_eq!(state.next_agent, None);
    }

    #[test]
    fn test_recent_messages_window() {
        let mut state = csv_state();
        for i in 0..8 {
            state.messages.push(ChatMessage::assistant(format!("m{}", i)));
        }
        let recent = state.recent_messages(5);
        assert_eq!(recent.len(), 5);
        assert_eq!(recent[0].content, "m3");
        assert_eq!(state.recent_messages(20).len(), 8);
    }

    #[test]
    fn test_snapshot_round_trip() {
        let mut state = csv_state();
        state.data_sample = Some(StateValue::Plain(json!([{"id": 1}, {"id": 2}])));
        state.storage_recommendation = Some("PostgreSQL".to_string());
        state.ddl_scripts = Some(vec![DdlScript {
            name: "orders".to_string(),
            sql: "CREATE TABLE orders (id INT);".to_string(),
        }]);
        state.mark_completed(Stage::InputAnalysis);
        state.record_error(Stage::DdlGeneration, "model unavailable");
        state.session_id = Some(SessionId::new());

        let snapshot = state.to_snapshot().unwrap();
        let restored = PipelineState::from_session(&snapshot).unwrap();
        assert_eq!(restored, state);
    }

    #[test]
    fn test_snapshot_keeps_explicit_nulls() {
        let mut state = csv_state();
        state.source_metadata = Some(Value::Null);
        state.data_sample = Some(StateValue::Plain(Value::Null));
        state.ddl_recommendations = Some(Value::Null);

        let snapshot = state.to_snapshot().unwrap();
        let restored = PipelineState::from_session(&snapshot).unwrap();

        assert_eq!(restored.source_metadata, Some(Value::Null));
        assert_eq!(restored.data_sample, Some(StateValue::Plain(Value::Null)));
        assert!(restored.data_profile.is_none());
        assert_eq!(restored, state);
    }

    #[test]
    fn test_opaque_value_is_coerced_to_text() {
        let mut state = csv_state();
        state.data_sample = Some(StateValue::opaque(SampleFrame { rows: 42 }));
        assert_eq!(state.coerced_fields(), vec!["data_sample"]);

        let snapshot = state.to_snapshot().unwrap();
        let restored = PipelineState::from_session(&snapshot).unwrap();

        assert_eq!(
            restored.data_sample,
            Some(StateValue::Plain(json!("<frame with 42 rows>")))
        );
        assert!(restored.coerced_fields().is_empty());
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        let result = PipelineState::from_session(r#"{"messages": [], "surprise": 1}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_none_fields_are_not_persisted() {
        let snapshot = serde_json::to_value(csv_state()).unwrap();
        assert!(snapshot.get("report").is_none());
        assert!(snapshot.get("completed_agents").is_some());
    }

    #[test]
    fn test_merge_feedback_clears_waiting_flag() {
        let mut state = csv_state();
        state.waiting_for_feedback = true;
        state.merge_feedback(
            Some(json!({"storage": "ClickHouse"})),
            Some(BTreeMap::from([("ddl".to_string(), true)])),
        );

        assert!(!state.waiting_for_feedback);
        assert_eq!(state.user_feedback, Some(json!({"storage": "ClickHouse"})));
        assert_eq!(state.user_confirmations.unwrap()["ddl"], true);
    }

    #[test]
    fn test_null_feedback_is_ignored() {
        let mut state = csv_state();
        state.waiting_for_feedback = true;
        state.merge_feedback(Some(Value::Null), None);

        assert!(state.user_feedback.is_none());
        assert!(state.waiting_for_feedback);
    }

    #[test]
    fn test_errors_accumulate() {
        let mut state = csv_state();
        state.record_error(Stage::InputAnalysis, "first");
        state.record_error(Stage::InputAnalysis, "second");
        assert_eq!(state.errors_for(Stage::InputAnalysis).count(), 2);
        assert_eq!(state.errors[0].error, "first");
    }

    #[test]
    fn test_finalize_sets_stats() {
        let mut state = csv_state();
        state.mark_completed(Stage::InputAnalysis);
        state.record_warning(Stage::InputAnalysis, "no json");
        state.finalize();

        let stats = state.execution_stats.clone().unwrap();
        assert_eq!(stats.stages_completed, 1);
        assert_eq!(stats.stages_total, 4);
        assert_eq!(stats.warning_count, 1);
        assert!(stats.duration_ms.unwrap() >= 0);
        assert!(state.end_time.is_some());
    }
}
