use etl_core::{DdlScript, PipelineState, Stage};
use tracing::debug;

use crate::core::{PhaseOutcome, StagePhase};
use crate::parsing::{blocks_with_lang, create_table_name, first_json_block};

/// DDL generation: every ```sql block is one script.
pub struct DdlGenerationPhase;

impl StagePhase for DdlGenerationPhase {
    fn stage(&self) -> Stage {
        Stage::DdlGeneration
    }

    fn apply_response(&self, state: &mut PipelineState, response: &str) -> PhaseOutcome {
        let mut outcome = PhaseOutcome::ok();

        let mut scripts: Vec<DdlScript> = blocks_with_lang(response, "sql")
            .into_iter()
            .enumerate()
            .map(|(i, sql)| script(i, sql))
            .collect();

        if scripts.is_empty() && response.to_uppercase().contains("CREATE") {
            scripts.push(script(0, response.trim().to_string()));
        }

        if let Some(recommendations) = first_json_block(response) {
            state.ddl_recommendations = Some(recommendations);
        }

        debug!(scripts = scripts.len(), "DDL scripts extracted");
        if scripts.is_empty() {
            outcome.warn("DDL generation response contained no SQL scripts");
        } else {
            state.ddl_scripts = Some(scripts);
        }
        outcome
    }
}

fn script(index: usize, sql: String) -> DdlScript {
    let name = create_table_name(&sql).unwrap_or_else(|| format!("script_{}", index + 1));
    DdlScript { name, sql }
}

#[cfg(test)]
mod tests {
    use super::*;
    use etl_core::AnalysisRequest;
    use serde_json::json;

    fn state() -> PipelineState {
        PipelineState::new_state(&AnalysisRequest::new("postgres"))
    }

    #[test]
    fn test_each_sql_block_is_a_script() {
        let mut state = state();
        let response = "```sql\nCREATE TABLE orders (id INT);\n```\n```sql\nCREATE INDEX idx ON orders (id);\n```\n```json\n{\"partitioning\": \"none\"}\n```";

        let outcome = DdlGenerationPhase.apply_response(&mut state, response);

        assert!(outcome.warnings.is_empty());
        let scripts = state.ddl_scripts.unwrap();
        assert_eq!(scripts.len(), 2);
        assert_eq!(scripts[0].name, "orders");
        assert_eq!(scripts[1].name, "script_2");
        assert_eq!(scripts[1].sql, "CREATE INDEX idx ON orders (id);");
        assert_eq!(state.ddl_recommendations, Some(json!({"partitioning": "none"})));
    }

    #[test]
    fn test_unfenced_create_is_one_script() {
        let mut state = state();
        DdlGenerationPhase.apply_response(&mut state, "create table events (id int);");

        let scripts = state.ddl_scripts.unwrap();
        assert_eq!(scripts.len(), 1);
        assert_eq!(scripts[0].name, "events");
    }

    #[test]
    fn test_no_sql_warns_and_keeps_previous_scripts() {
        let mut state = state();
        state.ddl_scripts = Some(vec![DdlScript {
            name: "kept".to_string(),
            sql: "CREATE TABLE kept (id INT);".to_string(),
        }]);

        let outcome = DdlGenerationPhase.apply_response(&mut state, "I cannot help with that.");

        assert_eq!(outcome.warnings.len(), 1);
        assert_eq!(state.ddl_scripts.unwrap()[0].name, "kept");
    }
}
