//! Schema Form CLI
//!
//! Builds a form model from a JSON Schema file and prints what a renderer
//! would see.

use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use schema_forms::{
    load_schema, Action, DefaultValueCollector, FormConfig, LocalDereferencer, ModelController, OutlineRenderer,
};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

type Controller = ModelController<OutlineRenderer, DefaultValueCollector>;

#[derive(Parser)]
#[command(name = "schema-form")]
#[command(about = "Build interactive form models from JSON Schemas")]
struct Cli {
    /// Configuration file (defaults to forms.toml lookup)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the branch sets and the field outline
    Inspect {
        /// Schema file (JSON)
        schema: PathBuf,
        /// Select an alternative: [POINTER#]PATH=INDEX, e.g. /oneOf=1
        #[arg(short, long = "select", value_name = "SELECTION", value_parser = parse_selection)]
        select: Vec<Selection>,
    },

    /// Print the materialized constraints of the root field
    Materialize {
        /// Schema file (JSON)
        schema: PathBuf,
        /// Select an alternative: [POINTER#]PATH=INDEX, e.g. /oneOf=1
        #[arg(short, long = "select", value_name = "SELECTION", value_parser = parse_selection)]
        select: Vec<Selection>,
    },

    /// Print the value assembled from defaults and constants
    Skeleton {
        /// Schema file (JSON)
        schema: PathBuf,
        /// Select an alternative: [POINTER#]PATH=INDEX, e.g. /oneOf=1
        #[arg(short, long = "select", value_name = "SELECTION", value_parser = parse_selection)]
        select: Vec<Selection>,
    },
}

/// A branch selection given on the command line
#[derive(Debug, Clone)]
struct Selection {
    /// Instance pointer of the field owning the branch set, root when empty
    pointer: String,
    path: String,
    index: usize,
}

fn parse_selection(s: &str) -> Result<Selection, String> {
    let (target, index) = s
        .rsplit_once('=')
        .ok_or_else(|| format!("expected [POINTER#]PATH=INDEX, got \"{}\"", s))?;
    let index = index
        .parse::<usize>()
        .map_err(|e| format!("invalid index \"{}\": {}", index, e))?;
    let (pointer, path) = target.split_once('#').unwrap_or(("", target));

    Ok(Selection {
        pointer: pointer.to_string(),
        path: path.to_string(),
        index,
    })
}

fn main() {
    let cli = Cli::parse();

    let config = match FormConfig::load_from(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(cli.command, &config) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(command: Commands, config: &FormConfig) -> anyhow::Result<()> {
    match command {
        Commands::Inspect { schema, select } => {
            let controller = build(&schema, &select, config)?;
            let root = controller.root();

            println!("🔍 {} ({})", schema.display(), controller.fingerprint());
            println!();

            let selectors = root.selectors(controller.options());
            if selectors.is_empty() {
                println!("No branch sets at the root");
            } else {
                println!("Branch sets:");
                for selector in selectors {
                    println!(
                        "  {} ({}): {} [selected {}]",
                        selector.path,
                        selector.combinator.keyword(),
                        selector.options.join(", "),
                        selector.selected
                    );
                }
            }
            println!();
            print!("{}", controller.renderer().outline());

            if !controller.diagnostics().is_empty() {
                eprintln!();
                eprint!("{}", controller.diagnostics());
            }
        }

        Commands::Materialize { schema, select } => {
            let controller = build(&schema, &select, config)?;
            let constraints = Value::Object(controller.root().constraints().clone());
            println!("{}", serde_json::to_string_pretty(&constraints)?);
        }

        Commands::Skeleton { schema, select } => {
            let mut controller = build(&schema, &select, config)?;
            let value = controller.value();
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
    }

    Ok(())
}

fn build(path: &Path, selections: &[Selection], config: &FormConfig) -> anyhow::Result<Controller> {
    let schema = load_schema(path).with_context(|| format!("loading schema {}", path.display()))?;
    let mut controller = ModelController::new(
        &schema,
        &LocalDereferencer::from_config(&config.references),
        config.options.clone(),
        OutlineRenderer::new(config.options.clone()),
        DefaultValueCollector::new(),
    )?;

    for selection in selections {
        let instance = controller
            .find_by_pointer(&selection.pointer)
            .ok_or_else(|| anyhow!("no field at \"{}\"", selection.pointer))?
            .id();
        controller.dispatch(Action::SelectBranch {
            instance,
            path: selection.path.clone(),
            index: selection.index,
        })?;
    }

    Ok(controller)
}
