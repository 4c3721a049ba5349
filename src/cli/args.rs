//! CLI argument definitions and parsing structures

use camino::Utf8PathBuf;
use clap::{Parser, Subcommand};

/// brdforge - BRD-to-engineering artifact pipeline
#[derive(Parser)]
#[command(name = "brdforge")]
#[command(about = "Turn a BRD into engineering artifacts through a checkpointed generation pipeline")]
#[command(long_about = r#"
brdforge parses a business requirements document and feeds it through five
ordered generation stages - engineering plan, schedule estimate, solution
architecture, PoC plan, tech stack recommendation. Every stage output is
schema-validated and retried within a bounded budget; progress is
checkpointed after each stage so an interrupted run resumes where it
stopped, and a run lock serializes concurrent invocations on one store.

EXAMPLES:
  # Run the full pipeline on a BRD file
  brdforge run --input brd.md --profile data/org_team_profile.json

  # Resume an interrupted run by id
  brdforge run --input brd.md --run-id ticket-triage-v1

  # Inspect a run's checkpoint
  brdforge status ticket-triage-v1

  # Remove a finished run's checkpoint and a leftover lock
  brdforge clean --run-id ticket-triage-v1 --lock

CONFIGURATION:
  Precedence: CLI flags > config file (--config) > environment > defaults
  Environment: OPENAI_API_KEY, OPENAI_MODEL, SYSTEM_PROMPT,
               BRDFORGE_RUNTIME_DIR, BRDFORGE_PROMPTS_DIR

STAGES:
  engineering_plan -> schedule_estimate -> solution_architecture
  -> poc_plan -> tech_stack_recommendations
"#)]
#[command(version)]
pub struct Cli {
    /// Path to a TOML configuration file
    #[arg(long, global = true)]
    pub config: Option<Utf8PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Execute the pipeline on a BRD document
    Run {
        /// Path to the BRD text/markdown file
        #[arg(long)]
        input: Utf8PathBuf,

        /// Output JSON path for the aggregated artifacts
        #[arg(long, default_value = "output.json")]
        output: Utf8PathBuf,

        /// Path to the org/team profile JSON
        #[arg(long, default_value = "data/org_team_profile.json")]
        profile: Utf8PathBuf,

        /// Run identifier (resumes a matching checkpoint; generated when
        /// omitted)
        #[arg(long)]
        run_id: Option<String>,

        /// Per-stage attempt budget
        #[arg(long)]
        max_attempts: Option<u32>,

        /// Delay between retry attempts, in seconds
        #[arg(long)]
        retry_delay: Option<f64>,

        /// Skip run-lock acquisition (single-caller setups only)
        #[arg(long)]
        no_lock: bool,

        /// Ignore any existing checkpoint and start from scratch
        #[arg(long)]
        no_resume: bool,
    },

    /// Print a run's checkpoint summary as canonical JSON
    Status {
        /// Run identifier
        run_id: String,
    },

    /// Remove a run's checkpoint and/or a leftover lock marker
    Clean {
        /// Run identifier whose checkpoint should be removed
        #[arg(long)]
        run_id: Option<String>,

        /// Also remove the store's lock marker
        #[arg(long)]
        lock: bool,

        /// Remove even when the lock's holder process is still alive
        #[arg(long)]
        force: bool,
    },
}
