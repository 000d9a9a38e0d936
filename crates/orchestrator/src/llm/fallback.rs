use async_trait::async_trait;
use etl_core::{ChatMessage, Stage};

use super::client::{LlmClient, LlmResponse};
use crate::error::{LlmError, LlmResult};

pub const FALLBACK_MODEL: &str = "fallback";

/// Deterministic stand-in for a real model.
///
/// Every answer is a fixed document for the client's stage, shaped so the
/// stage's response handling fills all of its output fields.
#[derive(Debug, Clone)]
pub struct FallbackClient {
    stage: Stage,
    failing: bool,
}

impl FallbackClient {
    pub fn new(stage: Stage) -> Self {
        Self {
            stage,
            failing: false,
        }
    }

    /// A client whose every invocation fails.
    pub fn failing(stage: Stage) -> Self {
        Self {
            stage,
            failing: true,
        }
    }

    pub fn canned_response(stage: Stage) -> &'static str {
        match stage {
            Stage::InputAnalysis => INPUT_ANALYSIS_RESPONSE,
            Stage::DdlGeneration => DDL_GENERATION_RESPONSE,
            Stage::PipelineGeneration => PIPELINE_GENERATION_RESPONSE,
            Stage::ReportGeneration => REPORT_GENERATION_RESPONSE,
        }
    }
}

#[async_trait]
impl LlmClient for FallbackClient {
    async fn invoke(&self, _messages: &[ChatMessage]) -> LlmResult<LlmResponse> {
        if self.failing {
            return Err(LlmError::Unavailable(format!(
                "fallback model configured to fail {}",
                self.stage
            )));
        }
        Ok(LlmResponse::new(
            Self::canned_response(self.stage),
            FALLBACK_MODEL,
        ))
    }

    fn model_name(&self) -> &str {
        FALLBACK_MODEL
    }
}

const INPUT_ANALYSIS_RESPONSE: &str = r#"```json
{
  "source_metadata": {"format": "tabular", "columns": ["id", "created_at", "amount", "customer"]},
  "data_sample": [
    {"id": 1, "created_at": "2024-01-01T10:00:00Z", "amount": 120.5, "customer": "acme"},
    {"id": 2, "created_at": "2024-01-01T11:30:00Z", "amount": 80.0, "customer": "globex"}
  ],
  "data_profile": {"row_estimate": 10000, "null_ratio": 0.01, "temporal_column": "created_at"},
  "storage_recommendation": "PostgreSQL",
  "storage_reasoning": "Structured rows with a stable schema and moderate volume suit a relational store.",
  "storage_alternatives": ["ClickHouse", "HDFS"]
}
```"#;

const DDL_GENERATION_RESPONSE: &str = r#"Proposed schema:

```sql
CREATE TABLE IF NOT EXISTS staging_records (
    id BIGINT PRIMARY KEY,
    created_at TIMESTAMP NOT NULL,
    amount NUMERIC(12, 2),
    customer TEXT
);
```

```sql
CREATE INDEX idx_staging_records_created_at ON staging_records (created_at);
```

```json
{"indexes": ["created_at"], "partitioning": "monthly by created_at"}
```"#;

const PIPELINE_GENERATION_RESPONSE: &str = r#"```python
from datetime import datetime

from airflow import DAG
from airflow.operators.python import PythonOperator


def extract_load():
    pass


with DAG("etl_staging_records", start_date=datetime(2024, 1, 1), schedule="@daily", catchup=False) as dag:
    PythonOperator(task_id="extract_load", python_callable=extract_load)
```

```json
{"dag_id": "etl_staging_records", "schedule": "@daily", "transformations": ["deduplicate", "cast_types", "normalize_timestamps"]}
```"#;

const REPORT_GENERATION_RESPONSE: &str = r#"# ETL analysis report

## Summary
The source was analyzed and loaded into a relational staging table.

## Storage
PostgreSQL was chosen for its transactional guarantees and moderate data volume.

## Recommendations
Partition by month once the table grows past a few million rows."#;
