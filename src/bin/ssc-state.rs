//! ssc-state CLI binary

use anyhow::Context;
use clap::Parser;
use ssc_state::concurrency::CancelToken;
use ssc_state::config::ConfigLoader;
use ssc_state::logging::init_logging;
use ssc_state::tooling::cli::{Cli, CliContext};
use std::process;

fn run(cli: &Cli) -> anyhow::Result<String> {
    let mut config = ConfigLoader::load(cli.config.as_deref()).context("Failed to load configuration")?;
    cli.apply_logging_overrides(&mut config);
    init_logging(Some(&config.logging), cli.log_file.clone()).context("Failed to initialize logging")?;

    let cancel = CancelToken::new();
    let handler_token = cancel.clone();
    ctrlc::set_handler(move || {
        eprintln!("Interrupted, finishing current request...");
        handler_token.cancel();
    })
    .context("Failed to install Ctrl-C handler")?;

    let context = CliContext::new(cli, &config, cancel)?;
    Ok(context.execute(&cli.command)?)
}

fn main() {
    let cli = Cli::parse();
    match run(&cli) {
        Ok(output) => println!("{}", output),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            process::exit(1);
        }
    }
}
