//! CLI entry point and command dispatch

use clap::Parser;

use super::args::{Cli, Commands};
use super::{commands, exit_codes};

/// Parse arguments, dispatch, and map failures to exit codes.
///
/// All user-facing output happens here or below; the caller only maps
/// the returned code to `process::exit`.
pub fn run() -> Result<(), i32> {
    let cli = Cli::parse();

    if let Err(e) = brdforge_utils::logging::init_tracing(cli.verbose) {
        eprintln!("Warning: failed to initialize logging: {e}");
    }

    let config = match brdforge_config::Config::discover(cli.config.as_ref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            return Err(exit_codes::GENERAL);
        }
    };

    match cli.command {
        Commands::Run {
            input,
            output,
            profile,
            run_id,
            max_attempts,
            retry_delay,
            no_lock,
            no_resume,
        } => commands::run_pipeline(
            &config,
            &commands::RunArgs {
                input,
                output,
                profile,
                run_id,
                max_attempts,
                retry_delay,
                no_lock,
                no_resume,
            },
        ),
        Commands::Status {
            run_id,
        } => commands::status(&config, &run_id),
        Commands::Clean {
            run_id,
            lock,
            force,
        } => commands::clean(&config, run_id.as_deref(), lock, force),
    }
}
