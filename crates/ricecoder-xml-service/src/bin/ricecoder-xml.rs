use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use ricecoder_xml::{GenerationContext, Goal, Template};
use ricecoder_xml_service::*;
use serde::Serialize;
use serde_json::Value;

#[derive(Parser)]
#[command(name = "ricecoder-xml")]
#[command(about = "Generate, validate, analyze and optimize XML prompts for RiceCoder")]
struct Cli {
    /// Engine configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a prompt from a template
    Generate {
        /// Template file (YAML or JSON)
        #[arg(short, long)]
        template: PathBuf,

        /// Variables file (YAML or JSON object)
        #[arg(long)]
        vars: Option<PathBuf>,

        /// Variable as name=value, repeatable
        #[arg(long = "var", value_name = "NAME=VALUE")]
        var: Vec<String>,

        /// Force the AI formatting pass on
        #[arg(long)]
        optimize_for_ai: bool,
    },
    /// Validate a document against a template
    Validate {
        /// Template file (YAML or JSON)
        #[arg(short, long)]
        template: PathBuf,

        /// Document to validate
        #[arg(short, long)]
        document: PathBuf,

        /// Only report errors
        #[arg(long)]
        lenient: bool,
    },
    /// Score a batch of documents
    Analyze {
        /// Template file (YAML or JSON)
        #[arg(short, long)]
        template: PathBuf,

        /// Documents to analyze
        #[arg(required = true)]
        samples: Vec<PathBuf>,
    },
    /// Iteratively optimize a document
    Optimize {
        /// Template file (YAML or JSON)
        #[arg(short, long)]
        template: PathBuf,

        /// Document to optimize
        #[arg(short, long)]
        document: PathBuf,

        /// Goal as metric=target, repeatable
        #[arg(short, long = "goal", value_name = "METRIC=TARGET", default_value = "effectiveness=0.9")]
        goals: Vec<String>,

        /// Iteration budget
        #[arg(short, long)]
        max_iterations: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let manager = match cli.config {
        Some(path) => ConfigManager::with_path(path),
        None => ConfigManager::new(),
    };
    let config = manager.load().context("failed to load configuration")?;
    let service = XmlPromptService::new(Arc::new(InMemoryRegistry::new()), config);

    match cli.command {
        Commands::Generate {
            template,
            vars,
            var,
            optimize_for_ai,
        } => {
            let template_id = register(&service, &template).await?;
            let mut variables = match vars {
                Some(path) => load_variables(&path)?,
                None => HashMap::new(),
            };
            for pair in var {
                let (name, value) = split_pair(&pair)?;
                variables.insert(name.to_string(), Value::String(value.to_string()));
            }
            let context = optimize_for_ai.then(|| GenerationContext::new().with_optimize_for_ai(true));

            let response = service
                .generate_prompt(GenerateRequest {
                    template_id,
                    variables,
                    context,
                })
                .await?;
            print_json(&response)?;
        }
        Commands::Validate {
            template,
            document,
            lenient,
        } => {
            let template_id = register(&service, &template).await?;
            let response = service
                .validate_structure(ValidateRequest {
                    template_id,
                    document: read(&document)?,
                    strict: lenient.then_some(false),
                })
                .await?;
            print_json(&response)?;
        }
        Commands::Analyze { template, samples } => {
            let template_id = register(&service, &template).await?;
            let samples = samples.iter().map(|p| read(p)).collect::<anyhow::Result<Vec<_>>>()?;
            let response = service
                .analyze_effectiveness(AnalyzeRequest {
                    template_id,
                    samples,
                })
                .await?;
            print_json(&response)?;
        }
        Commands::Optimize {
            template,
            document,
            goals,
            max_iterations,
        } => {
            let template_id = register(&service, &template).await?;
            let goals = goals
                .iter()
                .map(|g| parse_goal(g))
                .collect::<anyhow::Result<Vec<_>>>()?;
            let response = service
                .optimize_performance(OptimizeRequest {
                    template_id,
                    document: read(&document)?,
                    goals,
                    max_iterations,
                })
                .await?;
            print_json(&response)?;
        }
    }

    Ok(())
}

async fn register(service: &XmlPromptService, path: &Path) -> anyhow::Result<String> {
    let source = read(path)?;
    let template = if is_yaml(path) {
        Template::from_yaml(&source)
    } else {
        Template::from_json(&source)
    }
    .with_context(|| format!("invalid template {}", path.display()))?;
    Ok(service.register_template(template).await?)
}

fn load_variables(path: &Path) -> anyhow::Result<HashMap<String, Value>> {
    let source = read(path)?;
    let variables = if is_yaml(path) {
        serde_yaml::from_str(&source)?
    } else {
        serde_json::from_str(&source)?
    };
    Ok(variables)
}

fn read(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    )
}

fn split_pair(pair: &str) -> anyhow::Result<(&str, &str)> {
    match pair.split_once('=') {
        Some((name, value)) if !name.trim().is_empty() => Ok((name.trim(), value)),
        _ => bail!("expected NAME=VALUE, got '{}'", pair),
    }
}

fn parse_goal(goal: &str) -> anyhow::Result<Goal> {
    let (metric, target) = split_pair(goal)?;
    let target: f64 = target
        .trim()
        .parse()
        .with_context(|| format!("invalid target in goal '{}'", goal))?;
    Ok(Goal::new(metric, target))
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
