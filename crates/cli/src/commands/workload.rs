use crate::commands::{application_failure, open_pool, prepare, routing_engine, CommandResult};
use leadflow_engine::DistributionStats;

pub fn run() -> CommandResult {
    let (config, runtime) = match prepare("workload") {
        Ok(prepared) => prepared,
        Err(failure) => return failure,
    };

    let result = runtime.block_on(async {
        let pool = open_pool(&config).await?;
        let engine = routing_engine(pool.clone(), &config);
        let outcome = engine.distribution.get_stats().await.map(|stats| render(&stats));
        pool.close().await;
        outcome.map_err(application_failure)
    });

    CommandResult::from_outcome("workload", result)
}

fn render(stats: &DistributionStats) -> String {
    let mut lines = vec![format!(
        "{} leads, {} assigned, {} unassigned, {} active rule(s)",
        stats.total_leads, stats.assigned_leads, stats.unassigned_leads, stats.active_rules
    )];
    lines.extend(stats.workload.iter().map(|entry| {
        format!("  - {}: {}/{} open", entry.assignee_id, entry.open_count, entry.capacity)
    }));
    lines.join("\n")
}
