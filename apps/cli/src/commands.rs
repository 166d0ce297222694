//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use answerflow_core::{AnswerAccumulator, SourceRegistry};
use answerflow_shared::{
    Answer, AnswerFlowError, AppConfig, PipelineConfig, ReferenceStyle, config_file_path,
    init_config, load_config, load_config_from,
};
use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// Normalize recorded answer streams.
#[derive(Parser)]
#[command(
    name = "answerflow",
    version,
    about = "Replay recorded answer-backend streams through the normalization pipeline.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file to use instead of ~/.answerflow/answerflow.toml.
    #[arg(long, global = true, env = "ANSWERFLOW_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Output format for replay results.
#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

/// Inline reference style override.
#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub(crate) enum StyleArg {
    Footnote,
    Bracket,
}

impl From<StyleArg> for ReferenceStyle {
    fn from(arg: StyleArg) -> Self {
        match arg {
            StyleArg::Footnote => ReferenceStyle::Footnote,
            StyleArg::Bracket => ReferenceStyle::Bracket,
        }
    }
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Feed a recorded response through the pipeline and print the answer.
    Replay {
        /// Recorded stream (NDJSON, SSE or mixed text), or a JSON payload
        /// with --final.
        file: PathBuf,

        /// Characters per chunk; small values exercise split records.
        /// 0 feeds the whole file at once.
        #[arg(long, default_value = "64")]
        chunk_size: usize,

        /// Treat the file as one complete, non-streamed JSON response.
        #[arg(long = "final")]
        final_payload: bool,

        /// Output format.
        #[arg(long, default_value = "text")]
        format: OutputFormat,

        /// Override the configured inline reference style.
        #[arg(long)]
        reference_style: Option<StyleArg>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "answerflow=info",
        1 => "answerflow=debug",
        _ => "answerflow=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config;
    match cli.command {
        Command::Replay {
            file,
            chunk_size,
            final_payload,
            format,
            reference_style,
        } => {
            let config = resolve_config(config_path.as_deref())?;
            let mut pipeline = PipelineConfig::from(&config);
            if let Some(style) = reference_style {
                pipeline.reference_style = style.into();
            }
            let options = ReplayOptions {
                chunk_size,
                final_payload,
                format,
            };
            cmd_replay(&file, pipeline, options).await
        }
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show(config_path.as_deref()).await,
        },
    }
}

fn resolve_config(path: Option<&Path>) -> Result<AppConfig> {
    let config = match path {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };
    Ok(config)
}

// ---------------------------------------------------------------------------
// replay
// ---------------------------------------------------------------------------

struct ReplayOptions {
    chunk_size: usize,
    final_payload: bool,
    format: OutputFormat,
}

async fn cmd_replay(file: &Path, pipeline: PipelineConfig, options: ReplayOptions) -> Result<()> {
    let raw = tokio::fs::read_to_string(file)
        .await
        .wrap_err_with(|| format!("cannot read replay file '{}'", file.display()))?;

    info!(
        file = %file.display(),
        bytes = raw.len(),
        chunk_size = options.chunk_size,
        final_payload = options.final_payload,
        "replaying response"
    );

    let mut accumulator = AnswerAccumulator::new(pipeline);
    let updates = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&updates);
    accumulator.subscribe(move |_: &Answer| {
        counter.fetch_add(1, Ordering::Relaxed);
    });

    if options.final_payload {
        let payload = parse_final_payload(file, &raw)?;
        accumulator.apply_final(&payload);
    } else {
        let chunks = split_chunks(&raw, options.chunk_size);
        let progress = replay_progress(chunks.len() as u64);
        for chunk in &chunks {
            accumulator.push_chunk(chunk);
            progress.inc(1);
        }
        progress.finish_and_clear();
        accumulator.finalize();
    }

    let awaiting = sources_without_excerpts(accumulator.registry());
    let answer = accumulator.current_answer();
    let unknown = accumulator.unknown_records().count();

    info!(
        updates = updates.load(Ordering::Relaxed),
        citations = answer.citations.len(),
        sources = answer.sources.len(),
        unknown,
        state = accumulator.state().as_str(),
        "replay finished"
    );

    match options.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&answer)?),
        OutputFormat::Text => print_answer(&answer, &awaiting, unknown),
    }
    Ok(())
}

fn parse_final_payload(file: &Path, raw: &str) -> answerflow_shared::Result<serde_json::Value> {
    serde_json::from_str(raw).map_err(|e| {
        AnswerFlowError::parse(format!("{} is not a JSON document: {e}", file.display()))
    })
}

/// Ids of sources nothing has supplied text for yet.
fn sources_without_excerpts(registry: &SourceRegistry) -> Vec<String> {
    registry
        .iter()
        .filter(|s| s.excerpts.is_empty())
        .map(|s| s.id.clone())
        .collect()
}

/// Split on character boundaries; `0` means one chunk.
fn split_chunks(text: &str, size: usize) -> Vec<String> {
    if size == 0 || text.is_empty() {
        return vec![text.to_string()];
    }
    let chars: Vec<char> = text.chars().collect();
    chars.chunks(size).map(|c| c.iter().collect()).collect()
}

fn replay_progress(total: u64) -> ProgressBar {
    let bar = ProgressBar::new(total);
    if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} [{bar:30}] {pos}/{len} chunks")
    {
        bar.set_style(style.progress_chars("=> "));
    }
    bar
}

fn print_answer(answer: &Answer, awaiting: &[String], unknown: usize) {
    println!();
    println!("{}", answer.content);
    println!();

    if !answer.thought_process.is_empty() {
        println!("  Thought process:");
        for line in answer.thought_process.lines() {
            println!("    {line}");
        }
        println!();
    }

    if !answer.citations.is_empty() {
        println!("  Citations:");
        for citation in &answer.citations {
            let status = if citation.is_resolved() { "" } else { " (unresolved)" };
            let page = citation
                .page
                .map(|p| format!(" p.{p}"))
                .unwrap_or_default();
            println!("    [{}] {}{page}{status}", citation.index, citation.file_name);
        }
        println!();
    }

    if !answer.sources.is_empty() {
        println!("  Sources:");
        for source in &answer.sources {
            let score = source
                .score
                .map(|s| format!(" score={s:.2}"))
                .unwrap_or_default();
            println!(
                "    {} ({}){score}, {} excerpt(s)",
                source.display_name(),
                source.id,
                source.excerpts.len()
            );
        }
        println!();
    }

    if !answer.supporting_content.is_empty() {
        println!("  Supporting content: {} item(s)", answer.supporting_content.len());
    }

    if !answer.followup_questions.is_empty() {
        println!("  Follow-up questions:");
        for question in &answer.followup_questions {
            println!("    - {question}");
        }
    }

    if !awaiting.is_empty() {
        println!("  Sources awaiting details: {}", awaiting.join(", "));
    }
    if unknown > 0 {
        println!("  Unclassified records: {unknown}");
    }
    println!();
}

// ---------------------------------------------------------------------------
// config
// ---------------------------------------------------------------------------

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show(path: Option<&Path>) -> Result<()> {
    let config = resolve_config(path)?;
    let source = match path {
        Some(p) => p.to_path_buf(),
        None => config_file_path()?,
    };
    println!("# {}", source.display());
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}
