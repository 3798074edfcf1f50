pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use configurator_core::config::{AppConfig, LoadOptions};

use crate::commands::configure::ConfigureArgs;

#[derive(Debug, Parser)]
#[command(
    name = "configurator",
    about = "Product configurator operator CLI",
    long_about = "Validate catalogs, run guided configurations, and inspect effective settings.",
    after_help = "Examples:\n  configurator validate catalogs/demo.toml\n  configurator configure catalogs/demo.toml --variant press-200 --select frame=frame-welded --select motor=motor-5kw --quantity 2\n  configurator smoke"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Inspect effective configuration values with source attribution")]
    Config,
    #[command(about = "Load a catalog, run integrity checks, and report its size")]
    Validate {
        #[arg(help = "Catalog file (.toml or .json); defaults to catalog.path from config")]
        catalog: Option<PathBuf>,
    },
    #[command(about = "Apply selections to a variant and print the snapshot or quote line")]
    Configure {
        #[arg(help = "Catalog file (.toml or .json); defaults to catalog.path from config")]
        catalog: Option<PathBuf>,
        #[arg(long, help = "Variant to configure")]
        variant: String,
        #[arg(long, default_value_t = 1, help = "Line quantity")]
        quantity: u32,
        #[arg(
            long = "select",
            value_name = "GROUP=OPTION",
            help = "Option to select, applied in order; repeatable"
        )]
        selections: Vec<String>,
        #[arg(long, help = "Emit the quote line draft instead of the snapshot")]
        quote: bool,
    },
    #[command(about = "Run the built-in demo catalog through the reference pricing scenario")]
    Smoke,
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    if let Ok(config) = AppConfig::load(LoadOptions::default()) {
        init_logging(&config);
    }

    let result = match cli.command {
        Command::Config => commands::config::run(),
        Command::Validate { catalog } => commands::validate::run(catalog),
        Command::Configure { catalog, variant, quantity, selections, quote } => {
            commands::configure::run(ConfigureArgs {
                catalog,
                variant,
                quantity,
                selections,
                quote,
            })
        }
        Command::Smoke => commands::smoke::run(),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}

/// Logs go to stderr so stdout stays a single machine-readable payload.
fn init_logging(config: &AppConfig) {
    use configurator_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);
    let builder = tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(log_level)
        .with_writer(std::io::stderr);

    match config.logging.format {
        Compact => builder.compact().init(),
        Pretty => builder.pretty().init(),
        Json => builder.json().init(),
    }
}
