use crate::commands::{
    application_failure, correlation_id, open_pool, prepare, routing_engine, CommandResult,
};
use leadflow_core::domain::lead::LeadId;

pub fn run(lead_id: &str) -> CommandResult {
    let (config, runtime) = match prepare("assign") {
        Ok(prepared) => prepared,
        Err(failure) => return failure,
    };

    let result = runtime.block_on(async {
        let pool = open_pool(&config).await?;
        let engine = routing_engine(pool.clone(), &config);

        let outcome = engine
            .distribution
            .auto_assign(&LeadId(lead_id.to_string()), &correlation_id("assign"))
            .await
            .map(|decision| {
                format!(
                    "lead `{lead_id}` assigned to {} by rule `{}` ({}, {})",
                    decision.assignee,
                    decision.rule_name,
                    decision.method,
                    decision.stage.as_str()
                )
            })
            .map_err(application_failure);

        pool.close().await;
        outcome
    });

    CommandResult::from_outcome("assign", result)
}
