//! `Stowage` CLI: extract, inject and validate compose template placeholders.
//!
//! Machine-readable output (JSON, injected documents) goes to stdout; logs and
//! status lines go to stderr so the CLI composes with shell pipelines:
//!
//! ```text
//! stowage extract docker-compose.tpl.yml
//! stowage inject docker-compose.tpl.yml --internal internal.json \
//!     --prompt DB_USER=admin --service wiki > docker-compose.yml
//! stowage validate docker-compose.yml
//! ```

#![allow(clippy::print_stdout, clippy::print_stderr)]

mod config;
mod input;

use std::collections::HashMap;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing::info;

use stowage_core::Injector;

use crate::config::{CliConfig, LogFormat};

// ── ANSI color helpers ───────────────────────────────────────────────

const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const RED: &str = "\x1b[31m";
const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";

// ── CLI structure ────────────────────────────────────────────────────

/// Stowage: placeholder injection for compose templates.
#[derive(Parser)]
#[command(
    name = "stowage",
    version,
    about = "Stowage CLI: extract, inject and validate {{…}} placeholders in compose templates",
    long_about = None,
    after_help = "Environment variables:\n  \
         STOWAGE_LOG_LEVEL      Log filter (default: warn)\n  \
         STOWAGE_LOG_FORMAT     text or json (default: text)\n  \
         STOWAGE_INTERNAL_FILE  Default internal configuration JSON\n  \
         STOWAGE_SERVICE        Default service name for {{INTERNAL:SERVICE}}"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the injection points of a template as JSON.
    Extract {
        /// Template file (`-` for stdin).
        template: PathBuf,
        /// Previously supplied prompt values (`.json` or `KEY=VALUE` file).
        #[arg(long)]
        prompts: Option<PathBuf>,
    },
    /// Resolve placeholders and print the injected document.
    Inject(InjectArgs),
    /// Fail if any placeholder is left in a document.
    Validate {
        /// Document to check (`-` for stdin).
        template: PathBuf,
        /// Print the validation result as JSON.
        #[arg(long)]
        json: bool,
    },
}

#[derive(clap::Args)]
struct InjectArgs {
    /// Template file (`-` for stdin).
    template: PathBuf,
    /// Internal configuration JSON document.
    #[arg(long)]
    internal: Option<PathBuf>,
    /// Prompt value, repeatable.
    #[arg(long = "prompt", value_name = "KEY=VALUE")]
    prompt: Vec<String>,
    /// Prompt values file (`.json` or `KEY=VALUE`). `--prompt` wins on conflict.
    #[arg(long)]
    prompts: Option<PathBuf>,
    /// Service name substituted for `{{INTERNAL:SERVICE}}`.
    #[arg(long)]
    service: Option<String>,
    /// Domain substituted for `{{INTERNAL:HOST_DOMAIN}}`.
    #[arg(long)]
    domain: Option<String>,
    /// Write the result here instead of stdout.
    #[arg(long, short)]
    output: Option<PathBuf>,
    /// Emit the document even if placeholders remain.
    #[arg(long)]
    allow_partial: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = CliConfig::from_env();
    init_logging(&config);

    match run(&config, cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{RED}{BOLD}✗ Error:{RESET} {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(config: &CliConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match config.log_format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.with_target(false).init(),
    }
}

fn run(config: &CliConfig, cmd: Commands) -> Result<()> {
    match cmd {
        Commands::Extract { template, prompts } => cmd_extract(&template, prompts.as_deref()),
        Commands::Inject(args) => cmd_inject(config, args),
        Commands::Validate { template, json } => cmd_validate(&template, json),
    }
}

// ── Commands ─────────────────────────────────────────────────────────

fn cmd_extract(template: &Path, prompts: Option<&Path>) -> Result<()> {
    let document = input::read_template(template)?;
    let known = match prompts {
        Some(path) => input::read_prompts(path)?,
        None => HashMap::new(),
    };

    let preparation = Injector::new().prepare(&document, &known);
    info!(
        points = preparation.injection.len(),
        missing_prompts = preparation.missing_prompts().len(),
        "template extracted"
    );

    let json = serde_json::to_string_pretty(&preparation).context("failed to format JSON")?;
    println!("{json}");
    Ok(())
}

fn cmd_inject(config: &CliConfig, args: InjectArgs) -> Result<()> {
    let document = input::read_template(&args.template)?;

    let internal_path = args.internal.or_else(|| config.internal_file.clone());
    let internal = input::read_internal(internal_path.as_deref())?;

    let mut prompts = match &args.prompts {
        Some(path) => input::read_prompts(path)?,
        None => HashMap::new(),
    };
    prompts.extend(input::parse_prompt_pairs(&args.prompt)?);

    let mut injector = Injector::new();
    if let Some(service) = args.service.or_else(|| config.service.clone()) {
        injector = injector.with_service(service);
    }
    if let Some(domain) = args.domain {
        injector = injector.with_override("HOST_DOMAIN", domain);
    }

    let injected = injector
        .inject(&document, &internal, &prompts)
        .context("injection failed")?;

    let validation = injector.validate(&injected);
    if !validation.resolved {
        if !args.allow_partial {
            bail!("injection points still present: {}", validation.remaining);
        }
        eprintln!(
            "{YELLOW}{BOLD}⚠{RESET} {YELLOW}partial injection, first remaining: {}{RESET}",
            validation.remaining
        );
    }

    match args.output {
        Some(path) => std::fs::write(&path, &injected)
            .with_context(|| format!("failed to write {}", path.display()))?,
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout
                .write_all(injected.as_bytes())
                .context("failed to write to stdout")?;
        }
    }
    info!(resolved = validation.resolved, "template injected");
    Ok(())
}

fn cmd_validate(template: &Path, json: bool) -> Result<()> {
    let document = input::read_template(template)?;
    let validation = Injector::new().validate(&document);

    if json {
        let out = serde_json::to_string_pretty(&validation).context("failed to format JSON")?;
        println!("{out}");
    }
    if !validation.resolved {
        bail!("injection points still present: {}", validation.remaining);
    }
    if !json {
        eprintln!("{GREEN}{BOLD}✓{RESET} all injection points resolved");
    }
    Ok(())
}
