//! # Tally CLI Application
//!
//! Runs the bundled financial calculators from the terminal.
//!
//! ```text
//! calc_cli list --category finance
//! calc_cli show loan-to-value
//! calc_cli run loan-to-value --set loanAmount=400000 --set propertyValue=500000
//! calc_cli check loan-to-value loanAmount 600000 --set propertyValue=500000
//! calc_cli --json example escrow-analysis --index 1
//! calc_cli settings --write calc-settings.json
//! ```
//!
//! Exit status: 0 on success, 1 on errors (unknown calculator, unreadable
//! files), 2 when the input does not validate.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use calc_core::calculator::{CalculatorDefinition, Evaluation};
use calc_core::file_io::{load_raw_inputs, load_settings, save_settings};
use calc_core::report::format_for_field;
use calc_core::schema::{Category, Choice, FieldSchema};
use calc_core::{standard_registry, RawInputs, Registry};
use clap::{ArgAction, Args, Parser, Subcommand};
use tracing::{debug, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Exit status for input that fails validation
const EXIT_INVALID: u8 = 2;

/// Tally - financial calculators
#[derive(Parser, Debug)]
#[command(name = "calc_cli")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Settings file (JSON); built-in defaults apply when omitted
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    /// Print JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    /// More log output (-v debug, -vv trace); RUST_LOG overrides
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List calculators
    #[command(alias = "ls")]
    List {
        /// Only calculators in this category (e.g. finance)
        #[arg(long)]
        category: Option<String>,
    },

    /// Show a calculator's fields, formulas and examples
    Show {
        /// Calculator id
        id: String,
    },

    /// Validate, compute and report
    Run {
        /// Calculator id
        id: String,

        #[command(flatten)]
        inputs: InputArgs,
    },

    /// Check a single field value against the other inputs
    Check {
        /// Calculator id
        id: String,

        /// Field id
        field: String,

        /// Candidate value
        value: String,

        #[command(flatten)]
        inputs: InputArgs,
    },

    /// Run one of a calculator's built-in examples
    Example {
        /// Calculator id
        id: String,

        /// Example number, starting at 0
        #[arg(long, default_value_t = 0)]
        index: usize,
    },

    /// Print the effective settings, optionally saving them to a file
    Settings {
        /// Write the settings to this file (JSON)
        #[arg(long, value_name = "FILE")]
        write: Option<PathBuf>,
    },
}

#[derive(Args, Debug)]
struct InputArgs {
    /// JSON file holding an object of field values
    #[arg(long)]
    input: Option<PathBuf>,

    /// Set one field; repeatable and applied after --input
    #[arg(long = "set", value_name = "ID=VALUE", value_parser = parse_assignment)]
    set: Vec<(String, String)>,
}

impl InputArgs {
    fn raw_inputs(&self) -> Result<RawInputs> {
        let base = match &self.input {
            Some(path) => load_raw_inputs(path).with_context(|| format!("reading inputs from {}", path.display()))?,
            None => RawInputs::new(),
        };
        let overrides = self
            .set
            .iter()
            .fold(RawInputs::new(), |raw, (id, value)| raw.with(id.clone(), value.clone()));
        Ok(base.merged(&overrides))
    }
}

fn parse_assignment(arg: &str) -> Result<(String, String), String> {
    match arg.split_once('=') {
        Some((id, value)) if !id.trim().is_empty() => Ok((id.trim().to_string(), value.to_string())),
        _ => Err(format!("expected ID=VALUE, got '{}'", arg)),
    }
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match dispatch(&cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {:#}", err);
            ExitCode::FAILURE
        }
    }
}

fn dispatch(cli: &Cli) -> Result<ExitCode> {
    let settings = load_settings(cli.settings.as_deref()).context("loading settings")?;
    let registry = standard_registry(&settings).context("building calculator registry")?;
    debug!(command = ?cli.command, calculators = registry.len(), "dispatching");

    match &cli.command {
        Commands::List { category } => list(&registry, category.as_deref(), cli.json),
        Commands::Show { id } => show(registry.get(id)?, cli.json),
        Commands::Run { id, inputs } => {
            let calculator = registry.get(id)?;
            let raw = inputs.raw_inputs()?;
            print_evaluation(&calculator.evaluate(&raw)?, cli.json)
        }
        Commands::Check { id, field, value, inputs } => {
            let calculator = registry.get(id)?;
            let context = inputs.raw_inputs()?;
            let check = calculator.quick_validate(field, &serde_json::Value::String(value.clone()), &context);
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&check)?);
            } else if let Some(error) = &check.error {
                println!("{}: {}", field, error);
            } else {
                println!("{}: ok", field);
            }
            if !cli.json {
                if let Some(warning) = &check.warning {
                    eprintln!("Warning: {}", warning);
                }
            }
            Ok(if check.is_valid {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(EXIT_INVALID)
            })
        }
        Commands::Example { id, index } => {
            let calculator = registry.get(id)?;
            let Some(example) = calculator.examples().get(*index) else {
                bail!(
                    "calculator '{}' has {} example(s); index {} is out of range",
                    id,
                    calculator.examples().len(),
                    index
                );
            };
            if !cli.json {
                println!("Example: {}\n", example.name);
            }
            print_evaluation(&calculator.evaluate(&example.inputs)?, cli.json)
        }
        Commands::Settings { write } => {
            if let Some(path) = write {
                save_settings(&settings, path).with_context(|| format!("writing settings to {}", path.display()))?;
                info!(path = %path.display(), "saved settings");
                println!("Settings written to {}", path.display());
            } else {
                println!("{}", serde_json::to_string_pretty(&settings)?);
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn list(registry: &Registry, category: Option<&str>, json: bool) -> Result<ExitCode> {
    let category = match category {
        Some(value) => match Category::parse(value) {
            Some(c) => Some(c),
            None => {
                let known: Vec<&str> = Category::ALL.iter().map(|c| c.value()).collect();
                bail!("unknown category '{}' (expected one of: {})", value, known.join(", "));
            }
        },
        None => None,
    };

    if json {
        let metas: Vec<_> = registry.list(category).map(|c| c.meta()).collect();
        println!("{}", serde_json::to_string_pretty(&metas)?);
        return Ok(ExitCode::SUCCESS);
    }

    for calculator in registry.list(category) {
        let meta = calculator.meta();
        println!(
            "{:<30} {}  [{}/{}]",
            meta.id,
            meta.name,
            meta.category.value(),
            meta.subcategory
        );
    }
    Ok(ExitCode::SUCCESS)
}

fn describe_field(field: &FieldSchema) -> String {
    let mut parts = vec![format!("{:?}", field.kind).to_lowercase()];
    if let Some(unit) = field.unit {
        parts.push(format!("{:?}", unit).to_lowercase());
    }
    match &field.default {
        Some(default) => parts.push(format!("default {}", default)),
        None if field.required => parts.push("required".to_string()),
        None => parts.push("optional".to_string()),
    }
    match (field.min, field.max) {
        (Some(min), Some(max)) => parts.push(format!(
            "{} to {}",
            format_for_field(field, min),
            format_for_field(field, max)
        )),
        (Some(min), None) => parts.push(format!("at least {}", format_for_field(field, min))),
        (None, Some(max)) => parts.push(format!("at most {}", format_for_field(field, max))),
        (None, None) => {}
    }
    if !field.options.is_empty() {
        let values: Vec<&str> = field.options.iter().map(|o| o.value.as_str()).collect();
        parts.push(format!("one of: {}", values.join(", ")));
    }
    parts.join(", ")
}

fn show(calculator: &CalculatorDefinition, json: bool) -> Result<ExitCode> {
    if json {
        let doc = serde_json::json!({
            "meta": calculator.meta(),
            "inputs": calculator.inputs(),
            "outputs": calculator.outputs(),
            "formulas": calculator.formulas(),
            "examples": calculator.examples(),
        });
        println!("{}", serde_json::to_string_pretty(&doc)?);
        return Ok(ExitCode::SUCCESS);
    }

    let meta = calculator.meta();
    println!("{} ({})", meta.name, meta.id);
    println!("{}", meta.description);
    println!("Category: {} / {}", meta.category.label(), meta.subcategory);

    println!("\nInputs:");
    for field in calculator.inputs() {
        println!("  {:<28} {} ({})", field.id, field.label, describe_field(field));
    }

    println!("\nOutputs:");
    for field in calculator.outputs() {
        println!("  {:<28} {}", field.id, field.label);
    }

    if !calculator.formulas().is_empty() {
        println!("\nFormulas:");
        for formula in calculator.formulas() {
            println!("  {}: {}", formula.name, formula.expression);
        }
    }

    println!("\nExamples:");
    for (index, example) in calculator.examples().iter().enumerate() {
        println!("  [{}] {}", index, example.name);
    }
    Ok(ExitCode::SUCCESS)
}

fn print_evaluation(evaluation: &Evaluation, json: bool) -> Result<ExitCode> {
    if json {
        println!("{}", serde_json::to_string_pretty(evaluation)?);
    }

    match evaluation {
        Evaluation::Invalid { validation } => {
            if !json {
                eprintln!("Invalid input:");
                for error in &validation.errors {
                    eprintln!("  - {}", error);
                }
            }
            Ok(ExitCode::from(EXIT_INVALID))
        }
        Evaluation::Completed { report, warnings, .. } => {
            if !json {
                print!("{}", report);
                for warning in warnings {
                    eprintln!("Warning: {}", warning);
                }
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}
