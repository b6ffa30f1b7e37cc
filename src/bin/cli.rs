// src/bin/cli.rs
use clap::Parser;
use emr_scrape::{cli, log};

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let args = cli::Cli::parse();
    let opts = args.app_options();
    let log_file = args.global.log_file.then(|| opts.store.log_file());
    log::init(&args.global.log_level, log_file.as_deref());

    cli::run(args).await
}
