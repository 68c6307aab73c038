//! Binary entry point for the umbra console client.
#![forbid(unsafe_code)]

use std::fs::File;
use std::io::{self, BufRead, BufReader, IsTerminal};
use std::path::PathBuf;
use std::process;

use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

use umbra::client::{BoltConfig, BoltConnector};
use umbra::import::{self, parser::ParserOptions, ImportOptions};
use umbra::runtime::ShutdownFlag;
use umbra::Result;

#[derive(Parser, Debug)]
#[command(
    name = "umbra",
    version,
    about = "Console client and bulk importer for Bolt-speaking graph databases"
)]
struct Cli {
    #[arg(
        long,
        default_value = "127.0.0.1",
        help = "Server address; may be a DNS resolvable hostname"
    )]
    host: String,

    #[arg(long, default_value_t = 7687, help = "Server port")]
    port: u16,

    #[arg(long, default_value = "", help = "Database username")]
    username: String,

    #[arg(long, default_value = "", help = "Database password")]
    password: String,

    #[arg(long, help = "Use SSL when connecting to the server")]
    use_ssl: bool,

    #[arg(
        long,
        value_enum,
        default_value_t = ImportMode::Serial,
        help = "How statements are executed: `serial` preserves input order on one \
                session, `batched-parallel` batches and parallelizes execution, \
                `parser` only tokenizes and classifies without touching the database"
    )]
    import_mode: ImportMode,

    #[arg(
        long,
        default_value_t = 1000,
        help = "Statements per batch; batched-parallel mode only"
    )]
    batch_size: usize,

    #[arg(
        long,
        default_value_t = 32,
        help = "Worker threads executing batches in parallel; batched-parallel mode only"
    )]
    workers: usize,

    #[arg(
        long,
        default_value_t = 20,
        help = "Batches buffered per import window; bounds memory use together with --batch-size"
    )]
    max_batches: usize,

    #[arg(
        long,
        help = "Give up on a batch after this many failed attempts instead of retrying forever"
    )]
    max_attempts: Option<u64>,

    #[arg(
        long,
        value_name = "FILE",
        help = "Read statements from a file instead of stdin"
    )]
    file: Option<PathBuf>,

    #[arg(
        long,
        value_enum,
        default_value_t = OutputFormat::Text,
        help = "Output format for the final summary"
    )]
    format: OutputFormat,

    #[arg(long, help = "Log every statement classification; parser mode only")]
    print_parser_stats: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ImportMode {
    Serial,
    BatchedParallel,
    Parser,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum OutputFormat {
    Text,
    Json,
}

fn open_input(cli: &Cli) -> Result<Box<dyn BufRead>> {
    match &cli.file {
        Some(path) => Ok(Box::new(BufReader::new(File::open(path)?))),
        None => Ok(Box::new(BufReader::new(io::stdin()))),
    }
}

fn bolt_config(cli: &Cli) -> BoltConfig {
    BoltConfig {
        host: cli.host.clone(),
        port: cli.port,
        username: cli.username.clone(),
        password: cli.password.clone(),
        use_ssl: cli.use_ssl,
    }
}

/// Prints the end-of-run report: always as JSON when requested, otherwise
/// only when a human is watching.
fn emit(cli: &Cli, text: String, json: serde_json::Result<String>) -> Result<()> {
    match cli.format {
        OutputFormat::Json => {
            let json = json.map_err(|err| umbra::UmbraError::Config(err.to_string()))?;
            println!("{json}");
        }
        OutputFormat::Text => {
            if io::stdout().is_terminal() {
                println!("{text}");
            }
        }
    }
    Ok(())
}

fn run(cli: &Cli) -> Result<()> {
    let input = open_input(cli)?;
    let shutdown = ShutdownFlag::new();

    match cli.import_mode {
        ImportMode::Parser => {
            let options = ParserOptions {
                log_each: cli.print_parser_stats,
            };
            let report = import::parser::run(input, &options)?;
            emit(cli, report.render_text(), report.to_json())
        }
        ImportMode::Serial => {
            let connector = BoltConnector::new(bolt_config(cli));
            let summary = import::serial::run(&connector, input, &shutdown)?;
            emit(cli, summary.render_text(), summary.to_json())
        }
        ImportMode::BatchedParallel => {
            let options = ImportOptions {
                batch_size: cli.batch_size,
                workers: cli.workers,
                max_batches: cli.max_batches,
                max_attempts: cli.max_attempts,
            };
            let connector = BoltConnector::new(bolt_config(cli));
            let summary = import::batched::run(&connector, input, &options, &shutdown)?;
            emit(cli, summary.render_text(), summary.to_json())
        }
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    if cli.file.is_none() && io::stdin().is_terminal() {
        eprintln!(
            "umbra: interactive input is not supported; pipe statements on stdin or pass --file"
        );
        process::exit(1);
    }

    if let Err(err) = run(&cli) {
        eprintln!("{err}");
        process::exit(1);
    }
}
