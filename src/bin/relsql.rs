//! relsql: compile relational trees to PostgreSQL SQL
//!
//! # Usage
//!
//! ```bash
//! # Compile a JSON request and print the SQL
//! relsql compile request.json
//!
//! # Read from stdin, show bound parameters and result columns
//! cat request.json | relsql compile - --params
//!
//! # Print the effective configuration
//! relsql --server-version 9.4 config
//! ```

use std::io::Read;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::*;
use relsql::prelude::*;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "relsql")]
#[command(version)]
#[command(about = "Compile relational expression trees to PostgreSQL SQL", long_about = None)]
#[command(after_help = "EXAMPLES:
    relsql compile delete_posts.json
    relsql compile - --params --format json < request.json
    relsql --server-version 9.4 config")]
struct Cli {
    /// Options file (defaults to relsql.toml, then the user config dir)
    #[arg(short, long, global = true, env = "RELSQL_CONFIG")]
    config: Option<PathBuf>,

    /// Target server version, e.g. 9.4 or 16
    #[arg(long, global = true)]
    server_version: Option<ServerVersion>,

    /// Emit constants as bound parameters
    #[arg(long, global = true)]
    parameterize: bool,

    /// Verbose output (repeat for more)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a JSON request file, or `-` for stdin
    Compile {
        input: String,

        /// Also list parameters and result columns
        #[arg(short, long)]
        params: bool,

        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },
    /// Show the effective compiler options as TOML
    Config,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(&cli) {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "relsql=debug",
        _ => "relsql=trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: &Cli) -> Result<()> {
    let options = load_options(cli)?;
    match &cli.command {
        Commands::Compile { input, params, format } => compile(input, *params, *format, &options),
        Commands::Config => {
            print!("{}", options.to_toml()?);
            Ok(())
        }
    }
}

fn load_options(cli: &Cli) -> Result<CompilerOptions> {
    let mut options = match &cli.config {
        Some(path) => CompilerOptions::load(path).with_context(|| format!("loading {}", path.display()))?,
        None => CompilerOptions::discover()?,
    };
    if let Some(version) = cli.server_version {
        options.server_version = version;
    }
    if cli.parameterize {
        options.parameterize_constants = true;
    }
    Ok(options)
}

fn compile(input: &str, params: bool, format: OutputFormat, options: &CompilerOptions) -> Result<()> {
    let text = if input == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf).context("reading stdin")?;
        buf
    } else {
        std::fs::read_to_string(input).with_context(|| format!("reading {}", input))?
    };
    let request: CompileRequest = serde_json::from_str(&text).context("parsing request")?;
    let cmd = request.compile(options)?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&cmd)?),
        OutputFormat::Text => {
            println!("{}", cmd.sql);
            if params {
                print_metadata(&cmd);
            }
        }
    }
    Ok(())
}

fn print_metadata(cmd: &CompiledCommand) {
    if !cmd.parameters.is_empty() {
        println!();
        println!("{}", "Parameters:".cyan());
        for p in &cmd.parameters {
            match &p.value {
                Some(value) => println!("  @{} {} = {}", p.name.yellow(), p.db_type.dimmed(), format!("{:?}", value).white()),
                None => println!("  @{} {}", p.name.yellow(), p.db_type.dimmed()),
            }
        }
    }

    println!();
    println!("{}", "Columns:".cyan());
    for c in &cmd.columns {
        let mut hints = Vec::new();
        if c.unknown_result_type {
            hints.push("unknown".to_string());
        }
        if let Some(ty) = c.override_type {
            hints.push(format!("as {}", ty));
        }
        println!("  {} {} {}", c.name.white(), c.kind.to_string().dimmed(), hints.join(", ").dimmed());
    }
}
