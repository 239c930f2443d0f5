//! pushcheck - verifies push request branches and detects pickme conflicts.

use clap::Parser;

mod commands;
mod logging;
mod output;

use commands::{Cli, Commands};

fn main() {
    let cli = Cli::parse();

    output::set_quiet(cli.quiet);
    logging::init(cli.verbose);

    let result = match cli.command {
        Commands::Run { files } => commands::run::run(&cli.config, &files),
        Commands::Verify { files, id } => commands::verify::run(&cli.config, &files, id),
        Commands::Conflicts { files, id, push } => {
            commands::conflicts::run(&cli.config, &files, id, push)
        }
        Commands::Completions { shell } => commands::completions::run(shell),
    };

    if let Err(e) = result {
        output::error(&format!("{e:#}"));
        std::process::exit(1);
    }
}
