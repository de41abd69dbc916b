use std::collections::HashMap;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use piecework_engine::{ActionRunner, ActionStep};
use piecework_http::{HttpClientConfig, ReqwestClient};
use piecework_property::PropertyType;
use piecework_variables::{CoercedValue, Coercer, CoercionConfig};

/// Piecework - the step input and trigger core of a piece-based workflow engine
#[derive(Parser)]
#[command(name = "piecework")]
#[command(version, about, long_about = None)]
struct Cli {
  /// Path to the data directory (default: ~/.piecework)
  #[arg(long, global = true)]
  data_dir: Option<PathBuf>,

  #[command(subcommand)]
  command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
  /// Resolve a step's inputs against a payload read from stdin and print
  /// the property bags
  Inputs {
    /// Path to the step definition (JSON)
    step_file: PathBuf,

    /// Name of the upstream step the payload came from
    #[arg(long, default_value = "trigger")]
    upstream: String,

    /// Treat the payload as the output of several upstream steps, keyed by
    /// step name
    #[arg(long, conflicts_with = "upstream")]
    join: bool,
  },

  /// Coerce a data URI or URL into a file and print its metadata
  File {
    /// A `data:` URI or an http(s) URL
    value: String,
  },
}

/// Optional `config.json` in the data directory.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CliConfig {
  coercion: CoercionConfig,
  http: HttpClientConfig,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .with_writer(io::stderr)
    .init();

  let cli = Cli::parse();

  let data_dir = match cli.data_dir {
    Some(dir) => dir,
    None => dirs::home_dir()
      .context("could not determine home directory")?
      .join(".piecework"),
  };

  let rt = tokio::runtime::Runtime::new()?;
  match cli.command {
    Some(Commands::Inputs {
      step_file,
      upstream,
      join,
    }) => rt.block_on(resolve_step_inputs(&data_dir, step_file, upstream, join)),
    Some(Commands::File { value }) => rt.block_on(coerce_file(&data_dir, value)),
    None => {
      println!("piecework - use --help to see available commands");
      Ok(())
    }
  }
}

async fn load_config(data_dir: &Path) -> Result<CliConfig> {
  let path = data_dir.join("config.json");
  match tokio::fs::read_to_string(&path).await {
    Ok(content) => serde_json::from_str(&content)
      .with_context(|| format!("failed to parse config file: {}", path.display())),
    Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(CliConfig::default()),
    Err(e) => Err(e).with_context(|| format!("failed to read config file: {}", path.display())),
  }
}

fn coercer(config: CliConfig) -> Coercer {
  Coercer::new(Arc::new(ReqwestClient::new(config.http)), config.coercion)
}

async fn resolve_step_inputs(
  data_dir: &Path,
  step_file: PathBuf,
  upstream: String,
  join: bool,
) -> Result<()> {
  let content = tokio::fs::read_to_string(&step_file)
    .await
    .with_context(|| format!("failed to read step file: {}", step_file.display()))?;

  let step: ActionStep = serde_json::from_str(&content)
    .with_context(|| format!("failed to parse step file: {}", step_file.display()))?;

  eprintln!("Loaded step: {}", step.name);

  let payload = read_payload_from_stdin()?;
  let upstream_output: HashMap<String, serde_json::Value> = match payload {
    serde_json::Value::Object(steps) if join => steps.into_iter().collect(),
    _ if join => anyhow::bail!("a join payload must be an object keyed by step name"),
    payload => HashMap::from([(upstream, payload)]),
  };

  let runner = ActionRunner::new(coercer(load_config(data_dir).await?));
  let bags = runner
    .prepare(&step, &upstream_output, &CancellationToken::new())
    .await
    .context("failed to resolve step inputs")?;

  eprintln!("Resolved {} property bag(s)", bags.len());
  println!("{}", serde_json::to_string_pretty(&bags)?);

  Ok(())
}

async fn coerce_file(data_dir: &Path, value: String) -> Result<()> {
  let coercer = coercer(load_config(data_dir).await?);
  let coerced = coercer
    .coerce(
      PropertyType::File,
      &serde_json::Value::String(value),
      &CancellationToken::new(),
    )
    .await;

  let file = match coerced {
    Some(CoercedValue::File(file)) => file,
    _ => anyhow::bail!("value is not a usable data URI or file URL"),
  };

  let metadata = serde_json::json!({
    "filename": file.filename,
    "extension": file.extension,
    "size": file.len(),
  });
  println!("{}", serde_json::to_string_pretty(&metadata)?);

  Ok(())
}

fn read_payload_from_stdin() -> Result<serde_json::Value> {
  use std::io::IsTerminal;

  if io::stdin().is_terminal() {
    return Ok(serde_json::json!({}));
  }

  let mut input = String::new();
  io::stdin()
    .read_to_string(&mut input)
    .context("failed to read payload from stdin")?;

  if input.trim().is_empty() {
    Ok(serde_json::json!({}))
  } else {
    serde_json::from_str(&input).context("failed to parse payload JSON from stdin")
  }
}
