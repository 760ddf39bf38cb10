use clap::Parser;
use fluxqc::cli::{args::Args, args::Commands, commands};
use std::process;

fn main() {
    let args = Args::parse();

    // If no subcommand was provided, show help and available commands
    let Some(command) = &args.command else {
        show_help_and_commands();
        process::exit(0);
    };

    let log_level = match command {
        Commands::Screen(screen) => screen.log_level(),
        Commands::Penalty(penalty) => penalty.log_level(),
    };
    commands::setup_logging(log_level);

    match commands::run(args) {
        Ok(()) => {
            process::exit(0);
        }
        Err(error) => {
            eprintln!("Error: {error:#}");
            process::exit(1);
        }
    }
}

/// Show help information and available commands when no subcommand is provided
fn show_help_and_commands() {
    println!("fluxqc - Flux Time Series Quality Control");
    println!("=========================================");
    println!();
    println!("Screen half-hourly micrometeorological and eddy-covariance time series,");
    println!("aggregate quality flags, and quantify the NEP penalty of critical days.");
    println!();
    println!("USAGE:");
    println!("    fluxqc <COMMAND> [OPTIONS]");
    println!();
    println!("COMMANDS:");
    println!("    screen      Screen one variable and write the cleaned series with its QCF");
    println!("    penalty     Compute the per-year NEP penalty from critical heat/drought days");
    println!("    help        Show this help message or help for specific commands");
    println!();
    println!("EXAMPLES:");
    println!("    # Screen an air temperature record:");
    println!("    fluxqc screen --input ta.csv --column TA_T1_2_1 --measurement TA --units degC \\");
    println!("                  --site-lat 46.815 --site-lon 9.856 --utc-offset 1");
    println!();
    println!("    # Compute the NEP penalty with a reproducible seed:");
    println!("    fluxqc penalty --input fluxes.csv --critical 2.0 --near-critical 1.5 --seed 42");
    println!();
    println!("For detailed help on any command, use:");
    println!("    fluxqc <COMMAND> --help");
}
