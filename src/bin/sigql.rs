//! sigql: signal pattern translator
//!
//! # Usage
//!
//! ```bash
//! # Translate a pattern into both SQL forms
//! sigql "^ NOT( 'a' )* ( 'a' ~> 'b' )* NOT( 'a' )* $"
//!
//! # Show tokens, symbols and recognized shapes
//! sigql explain "( 'a' ~> 'b' )*"
//!
//! # Generate benchmark files from a CSV of signal queries
//! sigql generate --input signal_queries.csv --output data/queries
//! ```

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use colored::*;
use sigql::batch::{self, output};
use sigql::catalog::Catalog;
use sigql::prelude::*;

#[derive(Parser)]
#[command(name = "sigql")]
#[command(version)]
#[command(about = "Translate signal patterns to MATCH_RECOGNIZE and regex SQL", long_about = None)]
#[command(after_help = "EXAMPLES:
    sigql \"( 'a' ~> 'b' )*\"
    sigql translate \"^ NOT( 'a' ) ANY* $\" --table postgresql.public.model0_p2p_10
    sigql generate --input signal_queries.csv --output data/queries
    sigql inspect data/queries/model0/model0_p2p_10.sql")]
struct Cli {
    /// The pattern to translate
    pattern: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text", global = true)]
    format: OutputFormat,

    /// Fail on unrecognized input instead of skipping it
    #[arg(long, global = true)]
    strict: bool,

    /// Configuration file
    #[arg(short, long, env = "SIGQL_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Translate a pattern into both SQL statements
    Translate {
        /// The pattern to translate
        pattern: String,

        /// Query number written to the header
        #[arg(short, long, default_value_t = 0)]
        number: usize,

        /// Event table
        #[arg(short, long, default_value = "traces")]
        table: String,
    },
    /// Show how a pattern is tokenized and recognized
    Explain {
        /// The pattern to explain
        pattern: String,
    },
    /// Generate query files from a CSV of signal queries
    Generate {
        /// CSV with model_id and signal_query columns
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Output directory
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// List the statements of a generated query file
    Inspect {
        /// The .sql file to read
        file: PathBuf,
    },
    /// Show the recognized shape catalog
    Shapes,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(&cli) {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "sigql=debug" } else { "sigql=warn" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let mut config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;
    if cli.strict {
        config.leniency = Leniency::Strict;
    }
    let translator = Translator::from_config(&config);

    match &cli.command {
        Some(Commands::Translate {
            pattern,
            number,
            table,
        }) => translate(&translator, &config, pattern, *number, table, cli.format),
        Some(Commands::Explain { pattern }) => explain(&translator, &config, pattern, cli.format),
        Some(Commands::Generate { input, output }) => {
            if let Some(input) = input {
                config.batch.input = input.clone();
            }
            if let Some(output) = output {
                config.batch.output_dir = output.clone();
            }
            generate(&translator, &config, cli.format)
        }
        Some(Commands::Inspect { file }) => inspect(file, cli.format),
        Some(Commands::Shapes) => {
            show_shapes(cli.format);
            Ok(())
        }
        None => match &cli.pattern {
            Some(pattern) => translate(&translator, &config, pattern, 0, "traces", cli.format),
            None => {
                println!("{}", "sigql: signal patterns to SQL".cyan().bold());
                println!();
                println!("Usage: sigql <PATTERN> [OPTIONS]");
                println!();
                println!("Try: sigql --help");
                Ok(())
            }
        },
    }
}

fn translate(
    translator: &Translator,
    config: &Config,
    pattern: &str,
    number: usize,
    table: &str,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let translation = translator
        .translate(pattern)
        .with_context(|| format!("Failed to translate '{}'", pattern))?;
    let pair = translation.queries(number, table, &config.columns);

    match format {
        OutputFormat::Json => {
            let value = serde_json::json!({
                "pattern": pattern,
                "match_recognize": pair.match_recognize.to_sql(),
                "regex": pair.regex.to_sql(),
                "diagnostics": translation.diagnostics,
            });
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        OutputFormat::Text => {
            for diagnostic in &translation.diagnostics {
                eprintln!("{} skipped {}", "⚠".yellow(), diagnostic);
            }
            println!("{}", pair.match_recognize.to_sql());
            println!();
            println!("{}", pair.regex.to_sql());
        }
    }
    Ok(())
}

fn explain(
    translator: &Translator,
    config: &Config,
    pattern: &str,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let translation = translator
        .translate(pattern)
        .with_context(|| format!("Failed to translate '{}'", pattern))?;

    if let OutputFormat::Json = format {
        println!("{}", serde_json::to_string_pretty(&translation)?);
        return Ok(());
    }

    println!("{}", "Pattern Explanation".cyan().bold());
    println!();
    println!("{} {}", "Pattern:".dimmed(), pattern.yellow());
    println!();

    println!("{}", "Tokens:".green().bold());
    for token in &translation.tokens {
        println!(
            "  {:>4}  {}  {}",
            token.position.to_string().dimmed(),
            token.kind.symbol().to_string().cyan(),
            token.kind.to_string().white()
        );
    }

    println!();
    println!("{}", "Native Pattern:".green().bold());
    println!("  {} {}", "PATTERN".dimmed(), translation.native.pattern_clause().white());
    println!(
        "  {} {}",
        "DEFINE".dimmed(),
        translation.native.define_clause(&config.columns.activity).white()
    );

    println!();
    println!("{}", "Shapes:".green().bold());
    for window in Catalog::standard().segment(&translation.tokens) {
        let shape = window
            .shape
            .map(|s| s.name().cyan())
            .unwrap_or_else(|| "unrecognized".red());
        println!("  {:36} {}", shape, window.text(&translation.tokens).white());
    }

    println!();
    println!("{}", "Fragments:".green().bold());
    for fragment in translation.chain.fragments() {
        println!(
            "  {} {} {}",
            fragment.name.cyan(),
            "←".dimmed(),
            fragment.depends_on.join(", ").white()
        );
    }

    if translation.is_partial() {
        println!();
        println!("{}", "Skipped:".yellow().bold());
        for diagnostic in &translation.diagnostics {
            println!("  {}", diagnostic);
        }
    }
    Ok(())
}

fn generate(translator: &Translator, config: &Config, format: OutputFormat) -> anyhow::Result<()> {
    let report = batch::generate(config, translator).with_context(|| {
        format!(
            "Failed to generate queries from {}",
            config.batch.input.display()
        )
    })?;

    match format {
        OutputFormat::Json => {
            let value = serde_json::json!({
                "models": report.models,
                "translated": report.translated,
                "files": report.files,
                "failures": report.failures.iter().map(|e| e.to_string()).collect::<Vec<_>>(),
            });
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        OutputFormat::Text => {
            println!(
                "{} {} models, {} queries, {} files written to {}",
                "✓".green(),
                report.models.to_string().cyan(),
                report.translated.to_string().cyan(),
                report.files.len().to_string().cyan(),
                config.batch.output_dir.display()
            );
            if !report.failures.is_empty() {
                println!();
                println!("{}", "Failed queries:".red().bold());
                for failure in &report.failures {
                    println!("  {}", failure);
                }
            }
        }
    }
    Ok(())
}

fn inspect(file: &Path, format: OutputFormat) -> anyhow::Result<()> {
    let text = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let entries = output::parse_statements(&text);

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&entries)?),
        OutputFormat::Text => {
            println!(
                "{:8} {:18} {}",
                "Query".white().bold(),
                "Type".white().bold(),
                "Lines".white().bold()
            );
            println!("{}", "─".repeat(40).dimmed());
            for entry in &entries {
                println!(
                    "{:8} {:18} {}",
                    entry.number.to_string().cyan(),
                    entry.query_type.to_string().yellow(),
                    entry.sql.lines().count()
                );
            }
            println!();
            println!("{} statement(s)", entries.len().to_string().cyan());
        }
    }
    Ok(())
}

fn show_shapes(format: OutputFormat) {
    let catalog = Catalog::standard();

    if let OutputFormat::Json = format {
        let shapes: Vec<_> = catalog
            .rules()
            .iter()
            .map(|rule| {
                serde_json::json!({
                    "shape": rule.shape,
                    "matcher": rule.matcher.as_str(),
                    "example": rule.shape.example(),
                    "closing": rule.shape.is_closing(),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&shapes).unwrap_or_default());
        return;
    }

    println!("{}", "Shape Catalog (first match wins)".cyan().bold());
    println!();
    println!(
        "{:4} {:36} {}",
        "#".white().bold(),
        "Shape".white().bold(),
        "Example".white().bold()
    );
    println!("{}", "─".repeat(90).dimmed());

    for (i, rule) in catalog.rules().iter().enumerate() {
        let name = if rule.shape.is_closing() {
            rule.shape.name().yellow()
        } else {
            rule.shape.name().cyan()
        };
        println!(
            "{:4} {:36} {}",
            (i + 1).to_string().dimmed(),
            name,
            rule.shape.example().white()
        );
    }
}
