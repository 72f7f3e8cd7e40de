mod cache;
mod cli;
mod config;
mod content;
mod dom;
mod hooks;
mod logger;
mod manifest;
mod render;
mod service;
mod utils;

use clap::Parser;

use cli::{Cli, Command};
use config::BlogConfig;
use service::BlogService;

fn main() {
    let cli = Cli::parse();
    logger::set_verbose(cli.verbose);
    match cli.color {
        clap::ColorChoice::Always => owo_colors::set_override(true),
        clap::ColorChoice::Never => owo_colors::set_override(false),
        clap::ColorChoice::Auto => {}
    }

    if let Err(e) = run(&cli) {
        log!("error"; "{e:#}");
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let config = BlogConfig::load(cli)?;
    let service = BlogService::new(config);

    match cli.command {
        Command::Build => {
            let stats = service.run_all();
            service.dispose();
            if stats.failed > 0 {
                anyhow::bail!("{} file(s) failed to transform", stats.failed);
            }
        }
        Command::Watch => service::watch(&service)?,
    }
    Ok(())
}
