//! Command line expansion tool
//!
//! Expands MSBuild-style expressions against properties and items
//! supplied on the command line, evaluates include specs into items,
//! or validates expression syntax.

use std::io::{self, Read};
use std::process;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};

use msbuild_expand::model::escaping;
use msbuild_expand::parser::split_list;
use msbuild_expand::{ElementLocation, ExpanderOptions, ExpansionConfig, ExpansionEngine, Item};

#[derive(Parser)]
#[command(name = "msbuild-expand")]
#[command(about = "Expand MSBuild-style $(), @() and %() expressions")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Expand an expression to text
    Expand {
        /// Expression to expand (reads from stdin if not provided)
        expression: Option<String>,
        /// Property definition NAME=VALUE (repeatable, escaped domain)
        #[arg(short, long = "property", value_name = "NAME=VALUE")]
        properties: Vec<String>,
        /// Item definition TYPE=INCLUDE (repeatable; INCLUDE may be a
        /// semicolon list)
        #[arg(short, long = "item", value_name = "TYPE=INCLUDE")]
        items: Vec<String>,
        /// Directory anchoring relative paths
        #[arg(short = 'C', long, default_value = ".")]
        current_dir: String,
        /// Keep percent escapes in the output
        #[arg(long)]
        escaped: bool,
        /// Print one top-level semicolon segment per line
        #[arg(long)]
        list: bool,
        /// Elide long values and item lists
        #[arg(long)]
        truncate: bool,
        /// Report unknown function types as missing instead of disallowed
        #[arg(long)]
        all_functions: bool,
    },
    /// Evaluate an include spec into items, walking wildcards
    Items {
        /// Item type for the produced items
        item_type: String,
        /// Include text, e.g. "src/**/*.cs;extra.cs"
        include: String,
        /// Property definition NAME=VALUE (repeatable)
        #[arg(short, long = "property", value_name = "NAME=VALUE")]
        properties: Vec<String>,
        /// Directory anchoring relative paths
        #[arg(short = 'C', long, default_value = ".")]
        current_dir: String,
    },
    /// Validate an expression by expanding it against empty data
    Check {
        /// Expression to check
        expression: String,
        /// Suppress the success message
        #[arg(short, long)]
        quiet: bool,
    },
}

fn main() {
    human_panic::setup_panic!();
    env_logger::init();

    let cli = Cli::parse();
    let outcome = match cli.command {
        Commands::Expand {
            expression,
            properties,
            items,
            current_dir,
            escaped,
            list,
            truncate,
            all_functions,
        } => handle_expand(
            expression,
            &properties,
            &items,
            &current_dir,
            escaped,
            list,
            truncate,
            all_functions,
        ),
        Commands::Items {
            item_type,
            include,
            properties,
            current_dir,
        } => handle_items(&item_type, &include, &properties, &current_dir),
        Commands::Check { expression, quiet } => handle_check(&expression, quiet),
    };

    if let Err(e) = outcome {
        eprintln!("error: {e:#}");
        process::exit(1);
    }
}

#[allow(clippy::too_many_arguments)]
fn handle_expand(
    expression: Option<String>,
    properties: &[String],
    items: &[String],
    current_dir: &str,
    escaped: bool,
    list: bool,
    truncate: bool,
    all_functions: bool,
) -> Result<()> {
    let expression = match expression {
        Some(text) => text,
        None => {
            let mut buffer = String::new();
            io::stdin()
                .read_to_string(&mut buffer)
                .context("reading expression from stdin")?;
            buffer.trim_end_matches(['\r', '\n']).to_string()
        }
    };

    let engine = build_engine(properties, items, current_dir, all_functions)?;
    let location = ElementLocation::new("<arg>", 1, 1);
    let options = if truncate {
        ExpanderOptions::ALL | ExpanderOptions::TRUNCATE
    } else {
        ExpanderOptions::ALL
    };

    if list {
        let expander = engine.expander();
        let values = if escaped {
            expander.expand_into_string_list_leave_escaped(&expression, options, &location)?
        } else {
            expander.expand_into_string_list_and_unescape(&expression, options, &location)?
        };
        for value in values {
            println!("{value}");
        }
        return Ok(());
    }

    let out = engine.expand_escaped(&expression, options, &location)?;
    print_value(&out, escaped);
    Ok(())
}

fn handle_items(
    item_type: &str,
    include: &str,
    properties: &[String],
    current_dir: &str,
) -> Result<()> {
    let engine = build_engine(properties, &[], current_dir, false)?;
    let location = ElementLocation::new("<arg>", 1, 1);

    for item in engine.items_from_include(item_type, include, &location)? {
        match item.recursive_dir() {
            Some(dir) if !dir.is_empty() => {
                println!("{}\tRecursiveDir={dir}", item.include_escaped());
            }
            _ => println!("{}", item.include_escaped()),
        }
    }
    Ok(())
}

fn handle_check(expression: &str, quiet: bool) -> Result<()> {
    let engine = ExpansionEngine::new();
    engine.expand(expression, &ElementLocation::new("<check>", 1, 1))?;
    if !quiet {
        eprintln!("OK: {expression}");
    }
    Ok(())
}

fn build_engine(
    properties: &[String],
    items: &[String],
    current_dir: &str,
    all_functions: bool,
) -> Result<ExpansionEngine> {
    let mut config = ExpansionConfig::rooted_at(current_dir);
    config.enable_all_functions = all_functions;
    let mut engine = ExpansionEngine::new().with_config(config);

    for def in properties {
        let (name, value) = split_definition(def)?;
        engine.data_mut().set_property(name, value);
    }
    for def in items {
        let (item_type, include) = split_definition(def)?;
        for value in split_list(include) {
            engine.data_mut().add_item(Item::new(item_type, value));
        }
    }
    Ok(engine)
}

fn split_definition(def: &str) -> Result<(&str, &str)> {
    match def.split_once('=') {
        Some((name, value)) if !name.is_empty() => Ok((name, value)),
        _ => bail!("definition '{def}' is not in NAME=VALUE form"),
    }
}

fn print_value(value: &str, escaped: bool) {
    if escaped {
        println!("{value}");
    } else {
        println!("{}", escaping::unescape(value));
    }
}
