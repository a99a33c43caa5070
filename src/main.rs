//! Qute Analysis CLI
//!
//! Usage:
//!   qute-analysis [OPTIONS] [ROOT]
//!
//! Options:
//!   -c, --config <FILE>  Configuration file (TOML format)
//!   --json               Print the analysis as JSON
//!   --lint               Run lint checks; exit with status 2 on warnings
//!   --strict             Report expressions that use undeclared data
//!   -v, --verbose        Increase log verbosity (repeatable)
//!   -h, --help           Print help

use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use qute_analysis::analysis::{lint, report};
use qute_analysis::{analyze, load_config, AnalysisError};

#[derive(Parser)]
#[command(name = "qute-analysis")]
#[command(about = "Build-time analysis of Qute templates")]
struct Cli {
    /// Template root directory (overrides the configuration)
    root: Option<PathBuf>,

    /// Configuration file (TOML format)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print the analysis as JSON
    #[arg(long)]
    json: bool,

    /// Run lint checks on the analysis
    #[arg(long)]
    lint: bool,

    /// Report expressions that do not resolve to a declared parameter
    #[arg(long, requires = "lint")]
    strict: bool,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_logging(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("qute_analysis=debug"),
        _ => EnvFilter::new("qute_analysis=trace"),
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    // Load configuration
    let mut config = match load_config(cli.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };
    if let Some(root) = cli.root {
        config.root = root;
    }
    if cli.strict {
        config.strict = true;
    }

    let analysis = match analyze(&config) {
        Ok(analysis) => analysis,
        Err(AnalysisError::Parse(failures)) => {
            for failure in &failures {
                eprint!("{}", failure.format());
            }
            eprintln!("Error: {} template(s) failed to parse", failures.len());
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    if cli.json {
        match report::to_json(&analysis) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("Error writing JSON: {}", e);
                std::process::exit(1);
            }
        }
    } else {
        print!("{}", report::to_text(&analysis));
    }

    if cli.lint {
        let warnings = lint::check(&analysis, &config);
        for warning in &warnings {
            eprintln!("warning: {}", warning);
        }
        if !warnings.is_empty() {
            eprintln!("{} lint warning(s)", warnings.len());
            std::process::exit(2);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strict_requires_lint() {
        assert!(Cli::try_parse_from(["qute-analysis", "--strict"]).is_err());

        let cli = Cli::try_parse_from(["qute-analysis", "--lint", "--strict", "templates"])
            .expect("Should parse");
        assert!(cli.lint && cli.strict);
        assert_eq!(cli.root, Some(PathBuf::from("templates")));
    }

    #[test]
    fn test_verbosity_counts() {
        let cli = Cli::try_parse_from(["qute-analysis", "-vv"]).expect("Should parse");
        assert_eq!(cli.verbose, 2);
    }
}
