use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use strategy_settlement::cli::Cli;
use strategy_settlement::config::{EngineConfig, LoggingConfig};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // An unreadable config falls back to default logging; the command itself
    // loads the config again and reports the error.
    let logging = EngineConfig::load_from(&cli.config_dir)
        .map(|config| config.logging)
        .unwrap_or_default();
    init_logging(&logging, cli.json_logs);

    cli.command.run(&cli.config_dir)
}

fn init_logging(logging: &LoggingConfig, json_flag: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(logging.filter_directives()));

    // Logs go to stderr so replay output on stdout stays machine-readable
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    if logging.json_enabled(json_flag) {
        builder.json().init();
    } else {
        builder.init();
    }
}
