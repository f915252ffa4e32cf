//! mongoqs — The populate compiler CLI
//!
//! Compiles a `populate` query parameter value into the nested descriptor
//! array a document database expects.
//!
//! # Usage
//!
//! ```bash
//! # Print descriptors as JSON
//! mongoqs "createdBy:friends.name,createdBy.email,likedBy"
//!
//! # Print the merged tree
//! mongoqs "createdBy:friends.name,likedBy" --format tree
//!
//! # Show how each expression is tokenized
//! mongoqs explain "attachments:link,attachments:video"
//! ```

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use colored::*;
use mongoqs::prelude::*;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "mongoqs")]
#[command(version)]
#[command(about = "Compile populate query parameters into document database descriptors", long_about = None)]
#[command(after_help = "EXAMPLES:
    mongoqs 'createdBy.name,createdBy.email,likedBy'
    mongoqs 'posts:attachments:link,posts:attachments:video' --format tree
    mongoqs explain 'createdBy:friends.name'")]
struct Cli {
    /// The populate value to compile
    value: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Path to a TOML options file
    #[arg(short, long, env = "MONGOQS_CONFIG")]
    config: Option<String>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    Json,
    Tree,
}

#[derive(Subcommand)]
enum Commands {
    /// Tokenize each expression and show the merged tree
    Explain {
        /// The populate value to explain
        value: String,
    },
    /// Show the populate grammar reference
    Grammar,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match &cli.command {
        Some(Commands::Explain { value }) => explain_value(value, &cli),
        Some(Commands::Grammar) => {
            show_grammar();
            Ok(())
        }
        None => match &cli.value {
            Some(value) => compile_value(value, &cli),
            None => {
                println!("{}", "mongoqs — populate compiler".cyan().bold());
                println!();
                println!("Usage: mongoqs <VALUE> [OPTIONS]");
                println!();
                println!("Try: mongoqs --help");
                Ok(())
            }
        },
    };

    if let Err(e) = result {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("mongoqs=debug")
    } else {
        EnvFilter::from_default_env()
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_options(cli: &Cli) -> anyhow::Result<ParserOptions> {
    match &cli.config {
        Some(path) => ParserOptions::load(path)
            .with_context(|| format!("Failed to load options from {}", path)),
        None => ParserOptions::discover().context("Failed to discover options"),
    }
}

fn compile_value(value: &str, cli: &Cli) -> anyhow::Result<()> {
    if cli.verbose {
        println!("{} {}", "Input:".dimmed(), value.yellow());
    }

    let parser = QueryParser::new(load_options(cli)?);
    let forest = parser.compile_populate(value)?;

    match cli.format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&forest.to_populate())?);
        }
        OutputFormat::Tree => print_tree(&forest),
    }
    Ok(())
}

fn explain_value(value: &str, cli: &Cli) -> anyhow::Result<()> {
    println!("{}", "Populate Explanation".cyan().bold());
    println!();
    println!("{} {}", "Value:".dimmed(), value.yellow());
    println!();

    let exprs = mongoqs::parser::split_expressions(value)?;
    println!("{}", "Expressions:".green().bold());
    for expr in &exprs {
        println!("  {}", expr.source().white());
        for segment in expr.segments() {
            match segment {
                Segment::Relation(name) => {
                    println!("    {} {}", "relation".dimmed(), name.cyan());
                }
                Segment::Leaf { relation, field } => {
                    println!(
                        "    {} {} {} {}",
                        "relation".dimmed(),
                        relation.cyan(),
                        "select".dimmed(),
                        field.yellow()
                    );
                }
            }
        }
    }

    let parser = QueryParser::new(load_options(cli)?);
    let forest = parser.compile_populate(value)?;

    println!();
    println!("{}", "Merged Tree:".green().bold());
    print_tree(&forest);
    println!();
    println!("{} {}", "Canonical:".dimmed(), forest.to_string().white());
    Ok(())
}

fn print_tree(forest: &PopulateForest) {
    if forest.is_empty() {
        println!("{}", "(nothing to populate)".dimmed());
        return;
    }
    for node in forest.nodes() {
        print_node(node, 1);
    }
}

fn print_node(node: &PopulateNode, depth: usize) {
    let indent = "  ".repeat(depth);
    match node.select_string() {
        Some(select) => println!("{}• {} [{}]", indent, node.path().cyan(), select.yellow()),
        None => println!("{}• {}", indent, node.path().cyan()),
    }
    for child in node.children() {
        print_node(child, depth + 1);
    }
}

fn show_grammar() {
    println!("{}", "Populate Grammar Reference".cyan().bold());
    println!();

    let symbols = [
        (",", "Separate expressions", "createdBy,likedBy"),
        (":", "Descend into a nested relation", "createdBy:friends"),
        (".", "Select a field (last segment only)", "createdBy.name"),
    ];

    println!(
        "{:8} {:36} {}",
        "Symbol".white().bold(),
        "Meaning".white().bold(),
        "Example".white().bold()
    );
    println!("{}", "─".repeat(70).dimmed());

    for (symbol, meaning, example) in symbols {
        println!(
            "{:8} {:36} {}",
            symbol.cyan().bold(),
            meaning.white(),
            example.dimmed()
        );
    }
}
