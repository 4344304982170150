use crate::commands::{
    application_failure, correlation_id, open_pool, prepare, routing_engine, CommandResult,
    Failure,
};
use leadflow_core::domain::lead::LeadId;
use leadflow_engine::{BulkCalculateRequest, BulkScoreReport};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Target {
    Lead(String),
    All,
}

pub fn run(target: Target) -> CommandResult {
    let (config, runtime) = match prepare("score") {
        Ok(prepared) => prepared,
        Err(failure) => return failure,
    };

    let result = runtime.block_on(async {
        let pool = open_pool(&config).await?;
        let engine = routing_engine(pool.clone(), &config);
        let correlation_id = correlation_id("score");

        let outcome: Result<String, Failure> = match target {
            Target::Lead(lead_id) => engine
                .scoring
                .calculate_score(&LeadId(lead_id), &correlation_id)
                .await
                .map(|score| {
                    format!(
                        "lead `{}` scored {} ({})",
                        score.lead_id, score.total_score, score.temperature
                    )
                })
                .map_err(application_failure),
            Target::All => engine
                .scoring
                .bulk_calculate(BulkCalculateRequest::default(), &correlation_id)
                .await
                .map(|report| bulk_summary(&report))
                .map_err(application_failure),
        };

        pool.close().await;
        outcome
    });

    CommandResult::from_outcome("score", result)
}

fn bulk_summary(report: &BulkScoreReport) -> String {
    let mut lines = vec![format!(
        "scored {} leads: {} succeeded, {} failed",
        report.processed, report.succeeded, report.failed
    )];
    for item in &report.results {
        let line = match (item.total_score, item.temperature, &item.error) {
            (Some(total), Some(temperature), _) => {
                format!("  - {}: {total} ({temperature})", item.lead_id)
            }
            (_, _, Some(error)) => format!("  - {}: failed ({error})", item.lead_id),
            _ => format!("  - {}: failed", item.lead_id),
        };
        lines.push(line);
    }
    lines.join("\n")
}
