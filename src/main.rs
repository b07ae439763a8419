use clap::Parser;
use safe_counts::cli::{self, Cli, Commands};
use safe_counts::logging::{init_logging, LogConfig};
use safe_counts::Result;

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_config = LogConfig::from_verbosity(cli.verbose).with_format(cli.log_format);
    init_logging(&log_config)?;

    match &cli.command {
        Commands::Publish(args) => cli::run_publish(args)?,
        Commands::Redact(args) => cli::run_redact(args)?,
    }

    Ok(())
}
