mod settings;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use settings::Settings;
use sim_core::{Engine, FileExporter, ModelRegistry, SimulationRequest};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sim_cli")]
#[command(about = "Run parameterised ODE and Monte Carlo simulations", long_about = None)]
struct Cli {
    /// YAML file with engine settings
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Directory for exported artifacts (overrides config and STORAGE_PATH)
    #[arg(long, global = true)]
    storage: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one simulation request
    Run {
        /// Request JSON file, or `-` for stdin
        request: String,
        /// Pretty-print the result
        #[arg(long)]
        pretty: bool,
    },
    /// List registered models
    Models,
    /// Print a health report
    Health,
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let mut settings = Settings::load(cli.config.as_deref())?;
    if let Some(storage) = cli.storage {
        settings.storage_path = storage;
    }
    init_tracing(&settings.log_level);

    let engine = Engine::new(ModelRegistry::with_builtin_models(), settings.engine);
    tracing::debug!(models = engine.registry().len(), "engine ready");

    match cli.command {
        Commands::Run { request, pretty } => cmd_run(&engine, &settings, &request, pretty),
        Commands::Models => cmd_models(&engine),
        Commands::Health => {
            print_json(&engine.health(Some(settings.storage_path.as_path())), true)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn read_request(source: &str) -> Result<SimulationRequest> {
    let text = if source == "-" {
        let mut buf = String::new();
        io::stdin()
            .read_to_string(&mut buf)
            .context("reading request from stdin")?;
        buf
    } else {
        std::fs::read_to_string(Path::new(source))
            .with_context(|| format!("reading request {source}"))?
    };
    serde_json::from_str(&text).with_context(|| format!("decoding request {source}"))
}

fn cmd_run(engine: &Engine, settings: &Settings, source: &str, pretty: bool) -> Result<ExitCode> {
    let request = read_request(source)?;
    let exporter = FileExporter::new(&settings.storage_path);
    let result = engine.simulate(&request, Some(&exporter));
    print_json(&result, pretty)?;
    Ok(if result.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn cmd_models(engine: &Engine) -> Result<ExitCode> {
    let mut out = io::stdout().lock();
    for key in engine.registry().keys() {
        let model = engine.registry().lookup(&key.domain, &key.model_type)?;
        let params: Vec<String> = model
            .parameters()
            .iter()
            .map(|p| format!("{}={}", p.name, p.default))
            .collect();
        writeln!(
            out,
            "{key}\tstates: {}\tparameters: {}",
            model.state_names().join(", "),
            params.join(", ")
        )?;
    }
    Ok(ExitCode::SUCCESS)
}

fn print_json<T: Serialize>(value: &T, pretty: bool) -> Result<()> {
    let text = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    let mut out = io::stdout().lock();
    writeln!(out, "{text}")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn run_accepts_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["sim_cli", "run", "req.json", "--pretty", "--storage", "/tmp/out"])
            .expect("parse");
        assert_eq!(cli.storage, Some(PathBuf::from("/tmp/out")));
        match cli.command {
            Commands::Run { request, pretty } => {
                assert_eq!(request, "req.json");
                assert!(pretty);
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn request_file_is_decoded() {
        let path = std::env::temp_dir().join("sim_cli_request_test.json");
        std::fs::write(
            &path,
            r#"{"model_type": "Logistic", "initial_conditions": {"P": 10}, "time_span": {"start": 0, "end": 20, "steps": 21}}"#,
        )
        .unwrap();
        let request = read_request(path.to_str().unwrap()).expect("request");
        assert_eq!(request.model_type, "Logistic");
        assert_eq!(request.time_span.steps, 21);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn missing_request_file_names_the_path() {
        let err = read_request("/definitely/not/here.json").unwrap_err();
        assert!(format!("{err:#}").contains("/definitely/not/here.json"));
    }
}
