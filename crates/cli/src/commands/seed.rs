use crate::commands::{open_pool, prepare, CommandResult, Failure};
use leadflow_db::{DemoSeedDataset, LeadSeedInfo, VerificationResult};

pub fn run() -> CommandResult {
    let (config, runtime) = match prepare("seed") {
        Ok(prepared) => prepared,
        Err(failure) => return failure,
    };

    let result = runtime.block_on(async {
        let pool = open_pool(&config).await?;

        let seed_result = DemoSeedDataset::load(&pool)
            .await
            .map_err(|error| ("seed_execution", error.to_string(), 5u8))?;

        let verification = DemoSeedDataset::verify(&pool)
            .await
            .map_err(|error| ("seed_verification", error.to_string(), 6u8))?;

        let run_result: Result<String, Failure> = if verification.all_present {
            Ok(summary(
                seed_result.scoring_rules_seeded,
                seed_result.distribution_rules_seeded,
                &seed_result.leads_seeded,
            ))
        } else {
            Err(("seed_verification", verification_message(&verification), 6u8))
        };

        pool.close().await;
        run_result
    });

    CommandResult::from_outcome("seed", result)
}

fn summary(scoring_rules: usize, distribution_rules: usize, leads: &[LeadSeedInfo]) -> String {
    let lead_lines: Vec<String> = leads
        .iter()
        .map(|lead| {
            format!("  - {}: expected score {} ({})", lead.lead_id, lead.expected_score, lead.description)
        })
        .collect();
    format!(
        "demo dataset loaded: {scoring_rules} scoring rules, {distribution_rules} distribution rule(s), {} leads:\n{}",
        leads.len(),
        lead_lines.join("\n")
    )
}

fn verification_message(verification: &VerificationResult) -> String {
    let failed_checks = verification
        .checks
        .iter()
        .filter_map(|(check, passed)| (!passed).then_some(*check))
        .collect::<Vec<_>>();
    if failed_checks.is_empty() {
        "Some seed data failed to load".to_string()
    } else {
        format!("Seed verification failed for checks: {}", failed_checks.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use leadflow_db::{LeadSeedInfo, VerificationResult};

    use super::{summary, verification_message};

    #[test]
    fn verification_error_message_targets_failed_checks() {
        let verification = VerificationResult {
            all_present: false,
            checks: vec![
                ("default-scoring-rules", true),
                ("round-robin-rule", false),
                ("lead-demo-002", false),
            ],
        };

        assert_eq!(
            verification_message(&verification),
            "Seed verification failed for checks: round-robin-rule, lead-demo-002"
        );
    }

    #[test]
    fn verification_error_message_falls_back_to_generic_when_no_labels() {
        let verification = VerificationResult { all_present: false, checks: Vec::new() };
        assert_eq!(verification_message(&verification), "Some seed data failed to load");
    }

    #[test]
    fn summary_lists_each_seeded_lead() {
        let leads = [LeadSeedInfo {
            lead_id: "lead-demo-003",
            expected_score: 0,
            description: "bare lead",
        }];

        let message = summary(13, 1, &leads);
        assert!(message.starts_with("demo dataset loaded: 13 scoring rules, 1 distribution rule(s), 1 leads:"));
        assert!(message.contains("  - lead-demo-003: expected score 0 (bare lead)"));
    }
}
