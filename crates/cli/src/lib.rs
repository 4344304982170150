pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "leadflow",
    about = "Leadflow operator CLI",
    long_about = "Apply migrations, load demo data, and run scoring and routing against the configured lead store.",
    after_help = "Examples:\n  leadflow migrate\n  leadflow seed\n  leadflow score --all\n  leadflow assign lead-demo-001\n  leadflow workload"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Load the deterministic demo rules and leads (idempotent)")]
    Seed,
    #[command(about = "Calculate the score of one lead, or of every lead with --all")]
    Score {
        #[arg(required_unless_present = "all", conflicts_with = "all")]
        lead_id: Option<String>,
        #[arg(long, help = "Score every lead in the store")]
        all: bool,
    },
    #[command(
        about = "Route one lead through the active distribution rules",
        long_about = "Route one lead through the active distribution rules.\n\nThe round-robin position lives in process memory and is not persisted, so every invocation starts at the first member of a round-robin pool. Run the server for rotating round-robin assignment."
    )]
    Assign { lead_id: String },
    #[command(about = "Report open-lead counts per assignee")]
    Workload,
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Seed => commands::seed::run(),
        Command::Score { lead_id, all } => {
            let target = match (lead_id, all) {
                (Some(lead_id), false) => commands::score::Target::Lead(lead_id),
                _ => commands::score::Target::All,
            };
            commands::score::run(target)
        }
        Command::Assign { lead_id } => commands::assign::run(&lead_id),
        Command::Workload => commands::workload::run(),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}

#[cfg(test)]
mod tests {
    use clap::{CommandFactory, Parser};

    use super::{Cli, Command};

    #[test]
    fn score_accepts_a_lead_id() {
        let cli = Cli::try_parse_from(["leadflow", "score", "lead-1"]).expect("parse");
        assert!(matches!(
            cli.command,
            Command::Score { lead_id: Some(ref id), all: false } if id == "lead-1"
        ));
    }

    #[test]
    fn score_requires_a_lead_id_or_all() {
        assert!(Cli::try_parse_from(["leadflow", "score"]).is_err());
        assert!(Cli::try_parse_from(["leadflow", "score", "lead-1", "--all"]).is_err());

        let cli = Cli::try_parse_from(["leadflow", "score", "--all"]).expect("parse");
        assert!(matches!(cli.command, Command::Score { lead_id: None, all: true }));
    }

    #[test]
    fn assign_help_notes_round_robin_restarts_per_process() {
        let cli = Cli::command();
        let assign = cli.find_subcommand("assign").expect("assign subcommand");
        let long_about = assign.get_long_about().expect("long about").to_string();
        assert!(long_about.contains("every invocation starts at the first member"), "{long_about}");
    }
}
