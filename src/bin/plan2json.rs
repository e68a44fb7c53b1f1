//! CLI binary for edgequake-plan2json.
//!
//! A thin shim over the library crate: one subcommand per pipeline step,
//! each mapping flags to a config struct and printing the result. Every run
//! ends with exit status 0; failures are reported as a single printed line.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use edgequake_plan2json::config::{
    DEFAULT_JSON_PATH, DEFAULT_MARKDOWN_PATH, DEFAULT_PDF_PATH,
};
use edgequake_plan2json::{
    backend_from_keys, extract_to_file, key_presence, list_models, parser_from_keys,
    render_model_list, structure_file, ApiKeys, ExtractConfig, GeminiModelSource, ListConfig,
    ListFormat, ModelFilter, ParseProgressCallback, PlanError, ProgressCallback, Provider,
    ResultType, StructureConfig,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

fn spinner(prefix: &str, message: &str) -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed:.dim}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_strings(TICKS);
    bar.set_style(style);
    bar.set_prefix(prefix.to_string());
    bar.set_message(message.to_string());
    bar.enable_steady_tick(Duration::from_millis(80));
    bar
}

// ── Parse-job progress via indicatif ─────────────────────────────────────────

/// Spinner that follows a LlamaParse job from upload to result.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            bar: spinner("Extracting", "Preparing upload…"),
        })
    }

    fn clear(&self) {
        if !self.bar.is_finished() {
            self.bar.finish_and_clear();
        }
    }
}

impl ParseProgressCallback for CliProgressCallback {
    fn on_upload_start(&self, file_name: &str, bytes: u64) {
        self.bar
            .set_message(format!("Uploading {file_name} ({} KB)…", bytes / 1024));
    }

    fn on_job_submitted(&self, job_id: &str) {
        self.bar.println(format!(
            "  {} Started parsing the file under job_id {}",
            green("✓"),
            dim(job_id)
        ));
        self.bar.set_message("Waiting for the parser…");
    }

    fn on_poll(&self, _job_id: &str, status: &str, elapsed_secs: u64) {
        self.bar
            .set_message(format!("{} {}", status.to_lowercase(), dim(&format!("{elapsed_secs}s"))));
    }

    fn on_job_complete(&self, _job_id: &str, chars: usize) {
        self.bar.finish_and_clear();
        eprintln!("{} Parsed {} chars", green("✔"), bold(&chars.to_string()));
    }

    fn on_job_error(&self, _job_id: &str, _error: &str) {
        self.bar.finish_and_clear();
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Which Gemini models can this key use for structuring?
  plan2json models

  # Step 1: PDF → extracted_text.md
  plan2json extract PLN23_116_R1_Plans.pdf

  # Step 2: extracted_text.md → final_data.json (Gemini, native JSON mode)
  plan2json structure

  # Step 2 with an OpenRouter free-tier model instead
  plan2json structure --provider openrouter --model qwen/qwen3-8b:free

ENVIRONMENT VARIABLES (read from .env, then the process environment):
  GOOGLE_API_KEY          Gemini key (models, structure --provider gemini)
  LLAMA_CLOUD_API_KEY     LlamaParse key (extract)
  OPENROUTER_API_KEY      OpenRouter key (structure --provider openrouter)
  PLAN2JSON_PROVIDER      Default structuring provider
  PLAN2JSON_MODEL         Default structuring model
  RUST_LOG                Log filter override

FILES:
  extracted_text.md       Written by `extract`, read by `structure`
  final_data.json         Written by `structure` (4-space indent)
"#;

/// Extract project info and the drawing index from PDF construction plans.
#[derive(Parser, Debug)]
#[command(
    name = "plan2json",
    version,
    about = "Extract project info and the drawing index from PDF construction plans",
    long_about = "Three independent steps connected by files: list usable Gemini models, \
extract a PDF to Markdown with LlamaParse, and structure that Markdown into JSON with \
Gemini or an OpenRouter free-tier model.",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Dotenv file to load before reading API keys.
    #[arg(long, global = true, env = "PLAN2JSON_ENV_FILE", default_value = ".env")]
    env_file: PathBuf,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "PLAN2JSON_VERBOSE")]
    verbose: bool,

    /// Suppress all output except results and errors.
    #[arg(short, long, global = true, env = "PLAN2JSON_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List models available to GOOGLE_API_KEY.
    Models(ModelsArgs),
    /// Extract a PDF to Markdown with LlamaParse.
    Extract(ExtractArgs),
    /// Turn the extracted Markdown into structured JSON.
    Structure(StructureArgs),
}

#[derive(Args, Debug)]
struct ModelsArgs {
    /// Print every model, not only those supporting generateContent.
    #[arg(long)]
    all: bool,

    /// Show display names and token limits.
    #[arg(long, conflicts_with = "json")]
    long: bool,

    /// Print descriptors as JSON.
    #[arg(long)]
    json: bool,

    /// Gemini API base URL.
    #[arg(long, env = "GEMINI_BASE_URL")]
    base_url: Option<String>,

    /// Per-request timeout in seconds.
    #[arg(long, default_value_t = 60)]
    api_timeout: u64,
}

#[derive(Args, Debug)]
struct ExtractArgs {
    /// Local PDF path or HTTP/HTTPS URL.
    #[arg(env = "PLAN2JSON_PDF", default_value = DEFAULT_PDF_PATH)]
    input: String,

    /// Markdown output file.
    #[arg(short, long, default_value = DEFAULT_MARKDOWN_PATH)]
    output: PathBuf,

    /// Parser output format.
    #[arg(long, value_enum, default_value = "markdown")]
    result_type: ResultTypeArg,

    /// Document language hint.
    #[arg(long, default_value = "en")]
    language: String,

    /// Delay between job-status polls in milliseconds.
    #[arg(long, default_value_t = 1000)]
    poll_interval_ms: u64,

    /// Give up on the parse job after this many seconds.
    #[arg(long, default_value_t = 2000)]
    max_wait: u64,

    /// Characters of extracted text to preview.
    #[arg(long, default_value_t = 500)]
    preview: usize,

    /// LlamaParse API base URL.
    #[arg(long, env = "LLAMA_CLOUD_BASE_URL")]
    base_url: Option<String>,

    /// Per-request timeout in seconds.
    #[arg(long, default_value_t = 60)]
    api_timeout: u64,

    /// HTTP download timeout in seconds for URL inputs.
    #[arg(long, default_value_t = 120)]
    download_timeout: u64,

    /// Disable the progress spinner.
    #[arg(long, env = "PLAN2JSON_NO_PROGRESS")]
    no_progress: bool,
}

#[derive(Args, Debug)]
struct StructureArgs {
    /// Markdown input file.
    #[arg(short, long, default_value = DEFAULT_MARKDOWN_PATH)]
    input: PathBuf,

    /// JSON output file.
    #[arg(short, long, default_value = DEFAULT_JSON_PATH)]
    output: PathBuf,

    /// Structuring backend.
    #[arg(long, env = "PLAN2JSON_PROVIDER", value_enum, default_value = "gemini")]
    provider: ProviderArg,

    /// Model ID (default depends on provider).
    #[arg(long, env = "PLAN2JSON_MODEL")]
    model: Option<String>,

    /// OpenRouter fallback models, comma-separated.
    #[arg(long, value_delimiter = ',')]
    fallback_models: Option<Vec<String>>,

    /// Sampling temperature (0.0–2.0).
    #[arg(long)]
    temperature: Option<f32>,

    /// Number of drawing entries to preview.
    #[arg(long, default_value_t = 2)]
    preview: usize,

    /// Provider API base URL (default: GEMINI_BASE_URL or OPENROUTER_BASE_URL).
    #[arg(long)]
    base_url: Option<String>,

    /// Per-request timeout in seconds.
    #[arg(long, default_value_t = 120)]
    api_timeout: u64,

    /// Print the full run report as JSON instead of the preview.
    #[arg(long)]
    json: bool,

    /// Disable the progress spinner.
    #[arg(long, env = "PLAN2JSON_NO_PROGRESS")]
    no_progress: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum ProviderArg {
    Gemini,
    Openrouter,
}

impl From<ProviderArg> for Provider {
    fn from(v: ProviderArg) -> Self {
        match v {
            ProviderArg::Gemini => Provider::Gemini,
            ProviderArg::Openrouter => Provider::OpenRouter,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum ResultTypeArg {
    Markdown,
    Text,
}

impl From<ResultTypeArg> for ResultType {
    fn from(v: ResultTypeArg) -> Self {
        match v {
            ResultTypeArg::Markdown => ResultType::Markdown,
            ResultTypeArg::Text => ResultType::Text,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Load .env before logging so RUST_LOG may come from it.
    let env_result = dotenvy::from_path(&cli.env_file);

    // ── Logging setup ────────────────────────────────────────────────────
    // Spinners provide the feedback that matters; keep library INFO logs
    // out of their way unless --verbose.
    let spinner_active = !cli.quiet && !no_progress(&cli.command);
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else if spinner_active {
        "warn"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    match env_result {
        Ok(()) => tracing::debug!("Loaded {}", cli.env_file.display()),
        Err(e) if e.not_found() => tracing::debug!("No {} file", cli.env_file.display()),
        Err(e) => tracing::warn!("Ignoring {}: {}", cli.env_file.display(), e),
    }

    let keys = ApiKeys::from_env();

    // ── Single failure boundary ──────────────────────────────────────────
    let step = Step::of(&cli.command);
    if let Err(err) = run(cli.command, &keys, cli.quiet).await {
        report_failure(step, &err);
    }
    ExitCode::SUCCESS
}

/// Which subcommand failed; decides how the failure line is prefixed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Step {
    Models,
    Extract,
    Structure,
}

impl Step {
    fn of(command: &Command) -> Self {
        match command {
            Command::Models(_) => Step::Models,
            Command::Extract(_) => Step::Extract,
            Command::Structure(_) => Step::Structure,
        }
    }
}

fn no_progress(command: &Command) -> bool {
    match command {
        Command::Models(_) => true,
        Command::Extract(a) => a.no_progress,
        Command::Structure(a) => a.no_progress || a.json,
    }
}

fn report_failure(step: Step, err: &anyhow::Error) {
    let (prefix, message) = failure_line(step, err);
    if prefix == "ERROR:" {
        eprintln!("\n{} {message}", red(prefix));
    } else {
        eprintln!("{} {message}", red(prefix));
    }
}

/// Prefix and message for a failed run.
///
/// The model lister and every precondition use `Error:`; remote and
/// response failures of extract and structure use `ERROR:`. A [`PlanError`]
/// already names its cause, so it is printed on its own rather than as an
/// error chain.
fn failure_line(step: Step, err: &anyhow::Error) -> (&'static str, String) {
    let plan = err.downcast_ref::<PlanError>();
    let message = match plan {
        Some(e) => e.to_string(),
        None => format!("{err:#}"),
    };
    let precondition = plan.is_some_and(PlanError::is_precondition);
    let prefix = if step == Step::Models || precondition {
        "Error:"
    } else {
        "ERROR:"
    };
    (prefix, message)
}

async fn run(command: Command, keys: &ApiKeys, quiet: bool) -> Result<()> {
    match command {
        Command::Models(args) => run_models(args, keys, quiet).await,
        Command::Extract(args) => run_extract(args, keys, quiet).await,
        Command::Structure(args) => run_structure(args, keys, quiet).await,
    }
}

async fn run_models(args: ModelsArgs, keys: &ApiKeys, quiet: bool) -> Result<()> {
    let filter = if args.all {
        ModelFilter::All
    } else {
        ModelFilter::ContentGeneration
    };
    let mut builder = ListConfig::builder()
        .filter(filter)
        .api_timeout_secs(args.api_timeout);
    if let Some(url) = args.base_url {
        builder = builder.base_url(url);
    }
    let config = builder.build().context("invalid models options")?;

    let source = GeminiModelSource::from_keys(keys, &config)?;
    if !quiet && !args.json {
        eprintln!("Fetching available models...");
    }

    let models = list_models(&source, &config).await?;
    let format = if args.json {
        ListFormat::Json
    } else if args.long {
        ListFormat::Long
    } else {
        ListFormat::Names
    };
    let rendered = render_model_list(&models, format);
    if format == ListFormat::Json {
        println!("{rendered}");
    } else {
        print!("{rendered}");
    }
    Ok(())
}

async fn run_extract(args: ExtractArgs, keys: &ApiKeys, quiet: bool) -> Result<()> {
    let mut builder = ExtractConfig::builder()
        .input(args.input)
        .output_path(args.output)
        .result_type(args.result_type.into())
        .language(args.language)
        .poll_interval_ms(args.poll_interval_ms)
        .max_wait_secs(args.max_wait)
        .preview_chars(args.preview)
        .api_timeout_secs(args.api_timeout)
        .download_timeout_secs(args.download_timeout);
    if let Some(url) = args.base_url {
        builder = builder.base_url(url);
    }
    let config = builder.build().context("invalid extract options")?;

    if !quiet {
        for (var, present) in key_presence(keys) {
            eprintln!("{var} present: {}", if present { "Yes" } else { "No" });
        }
    }

    let mut parser = parser_from_keys(keys, &config)?;
    let progress = (!quiet && !args.no_progress).then(CliProgressCallback::new);
    if let Some(ref cb) = progress {
        parser = parser.with_progress(Arc::clone(cb) as ProgressCallback);
    }

    if !quiet {
        eprintln!("\nProcessing {}... this might take a minute...", bold(&config.input));
    }
    let result = extract_to_file(&parser, &config).await;
    if let Some(cb) = progress {
        cb.clear();
    }
    let report = result?;

    println!(
        "\n{} Content saved to {}",
        green("SUCCESS!"),
        report.output_path.display()
    );
    if !quiet {
        println!("{}", "-".repeat(20));
        println!("PREVIEW OF EXTRACTED TEXT:");
        println!("{}", report.preview);
        eprintln!(
            "{}",
            dim(&format!(
                "job {}  ·  {} chars  ·  {}ms",
                report.job_id, report.chars, report.duration_ms
            ))
        );
    }
    Ok(())
}

async fn run_structure(args: StructureArgs, keys: &ApiKeys, quiet: bool) -> Result<()> {
    let mut builder = StructureConfig::builder()
        .input_path(args.input)
        .output_path(args.output)
        .provider(args.provider.into())
        .preview_items(args.preview)
        .api_timeout_secs(args.api_timeout);
    if let Some(model) = args.model {
        builder = builder.model(model);
    }
    if let Some(models) = args.fallback_models {
        builder = builder.fallback_models(models);
    }
    if let Some(t) = args.temperature {
        builder = builder.temperature(t);
    }
    let provider: Provider = args.provider.into();
    let env_base_url = match provider {
        Provider::Gemini => "GEMINI_BASE_URL",
        Provider::OpenRouter => "OPENROUTER_BASE_URL",
    };
    if let Some(url) = args
        .base_url
        .or_else(|| std::env::var(env_base_url).ok().filter(|u| !u.is_empty()))
    {
        builder = builder.base_url(url);
    }
    let config = builder.build().context("invalid structure options")?;

    let backend = backend_from_keys(keys, &config)?;

    let show_spinner = !quiet && !args.no_progress && !args.json;
    if !quiet && !args.json {
        eprintln!("Sending data to {} ({})...", backend.name(), backend.model());
    }
    let bar = show_spinner.then(|| spinner("Structuring", "Waiting for the model…"));
    let result = structure_file(backend.as_ref(), &config).await;
    if let Some(bar) = bar {
        bar.finish_and_clear();
    }
    let report = result?;

    if args.json {
        let json = serde_json::to_string_pretty(&report).context("serialising run report")?;
        println!("{json}");
        return Ok(());
    }

    println!(
        "\n{} Data extracted to '{}'",
        green("SUCCESS!"),
        report.output_path.display()
    );
    if !quiet {
        println!("{}", "-".repeat(30));
        println!("PREVIEW:");
        println!("{}", report.preview);
        let tokens = match (report.input_tokens, report.output_tokens) {
            (Some(i), Some(o)) => format!("  ·  {i} tokens in / {o} tokens out"),
            _ => String::new(),
        };
        eprintln!(
            "{}",
            dim(&format!("{}  ·  {}ms{}", report.model, report.duration_ms, tokens))
        );
    }
    Ok(())
}
