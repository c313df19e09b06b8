pub mod commands;

use std::process::ExitCode;

use cierre_core::config::{AppConfig, LoadOptions};
use cierre_core::FlowKind;
use clap::{Parser, Subcommand, ValueEnum};
use rust_decimal::Decimal;

#[derive(Debug, Parser)]
#[command(
    name = "cierre",
    about = "Quote closing operator CLI",
    long_about = "Inspect configuration, compute price breakdowns, and simulate complete \
                  closing flows against an in-memory studio.",
    after_help = "Examples:\n  cierre breakdown --base 10000 --discount-pct 10 --advance-pct 30\n  cierre simulate --flow staff\n  cierre config"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Compute a price breakdown from a base price and commercial condition")]
    Breakdown {
        #[arg(long, help = "Base price of the quote")]
        base: Decimal,
        #[arg(long, default_value = "0", help = "Condition discount percentage")]
        discount_pct: Decimal,
        #[arg(long, help = "Advance as a percentage of the payable price")]
        advance_pct: Option<Decimal>,
        #[arg(long, help = "Advance as a fixed amount, clamped to the payable price")]
        advance_fixed: Option<Decimal>,
        #[arg(long, help = "Negotiated price overriding the discounted price")]
        negotiated: Option<Decimal>,
        #[arg(long, default_value = "0", help = "Total of courtesy items to subtract")]
        courtesy: Decimal,
    },
    #[command(about = "Run a scripted closing end to end against an in-memory studio")]
    Simulate {
        #[arg(long, value_enum, default_value_t = FlowArg::Staff)]
        flow: FlowArg,
    },
    #[command(about = "Inspect effective configuration values with source attribution")]
    Config,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum FlowArg {
    Staff,
    Digital,
}

impl From<FlowArg> for FlowKind {
    fn from(value: FlowArg) -> Self {
        match value {
            FlowArg::Staff => FlowKind::StaffAssisted,
            FlowArg::Digital => FlowKind::Digital,
        }
    }
}

fn init_logging(config: &AppConfig) {
    use cierre_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            let result = commands::CommandResult::failure(
                "cierre",
                "config_validation",
                error.to_string(),
                2,
            );
            println!("{}", result.output);
            return ExitCode::from(result.exit_code);
        }
    };
    init_logging(&config);

    let result = match cli.command {
        Command::Breakdown {
            base,
            discount_pct,
            advance_pct,
            advance_fixed,
            negotiated,
            courtesy,
        } => commands::breakdown::run(commands::breakdown::BreakdownInput {
            base,
            discount_pct,
            advance_pct,
            advance_fixed,
            negotiated,
            courtesy,
        }),
        Command::Simulate { flow } => commands::simulate::run(flow.into(), &config.reconcile),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
