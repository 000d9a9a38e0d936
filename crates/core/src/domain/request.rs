use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use utoipa::ToSchema;

use crate::error::CoreError;

/// Description of a data source submitted for analysis.
///
/// Only `source_type` is interpreted; every other key is carried through
/// verbatim and the whole object becomes the run's `source_config`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AnalysisRequest {
    /// Kind of source, e.g. "csv", "postgres", "json"
    pub source_type: String,
    /// Connection settings for database-like sources
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub connection_params: Option<Value>,
    /// Any further source description (file name, sample, schema hints, ...)
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl AnalysisRequest {
    pub fn new(source_type: impl Into<String>) -> Self {
        Self {
            source_type: source_type.into(),
            ..Default::default()
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if self.source_type.trim().is_empty() {
            return Err(CoreError::Validation(
                "source_type must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// The request as a plain JSON object, used as `source_config`.
    pub fn to_source_config(&self) -> Value {
        let mut config: Map<String, Value> = self
            .extra
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        config.insert(
            "source_type".to_string(),
            Value::String(self.source_type.clone()),
        );
        if let Some(ref params) = self.connection_params {
            config.insert("connection_params".to_string(), params.clone());
        }
        Value::Object(config)
    }
}

/// Body of an interactive step.
///
/// Without `session_id` a new session is started and the remaining keys must
/// form a valid [`AnalysisRequest`]. With `session_id` the stored session is
/// resumed and only the feedback fields are used.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct InteractiveRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub user_feedback: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_confirmations: Option<BTreeMap<String, bool>>,
    #[serde(flatten)]
    pub source: BTreeMap<String, Value>,
}

impl InteractiveRequest {
    pub fn new_session(request: &AnalysisRequest) -> Self {
        let source = match request.to_source_config() {
            Value::Object(map) => map.into_iter().collect(),
            _ => BTreeMap::new(),
        };
        Self {
            source,
            ..Default::default()
        }
    }

    pub fn resume(session_id: impl Into<String>) -> Self {
        Self {
            session_id: Some(session_id.into()),
            ..Default::default()
        }
    }

    pub fn with_feedback(mut self, feedback: Value) -> Self {
        self.user_feedback = Some(feedback);
        self
    }

    /// Interpret the source keys as a new analysis request.
    pub fn analysis_request(&self) -> Result<AnalysisRequest, CoreError> {
        let source: Map<String, Value> = self
            .source
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        let request: AnalysisRequest = serde_json::from_value(Value::Object(source))
            .map_err(|e| CoreError::Validation(format!("invalid analysis request: {}", e)))?;
        request.validate()?;
        Ok(request)
    }
}
