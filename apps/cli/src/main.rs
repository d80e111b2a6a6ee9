use std::{
    path::PathBuf,
    sync::Arc,
    time::{Duration, Instant},
};

use anyhow::Result;
use beonyeok_core::{
    LlmClient, Pipeline, PipelineConfig, PipelineEvent, Provider, StoreKind, StoreOptions,
    YtDlpTranscriptSource, extract_video_id, format_report_readable, logging::init_tracing,
    open_store, store::default_output_dir,
};
use clap::{Parser, ValueEnum};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::mpsc;

fn format_duration(d: Duration) -> String {
    let secs = d.as_secs_f64();
    if secs < 60.0 {
        format!("{:.1}s", secs)
    } else {
        let total = secs.round() as u64;
        format!("{}m {}s", total / 60, total % 60)
    }
}

/// CLI wrapper for Provider enum (needed for clap ValueEnum)
#[derive(Clone, Default, ValueEnum)]
enum CliProvider {
    #[default]
    Anthropic,
    Grok,
    Openai,
    Gemini,
}

impl From<CliProvider> for Provider {
    fn from(cli: CliProvider) -> Self {
        match cli {
            CliProvider::Anthropic => Provider::Anthropic,
            CliProvider::Grok => Provider::Grok,
            CliProvider::Openai => Provider::Openai,
            CliProvider::Gemini => Provider::Gemini,
        }
    }
}

#[derive(Clone, Default, ValueEnum)]
enum CliStore {
    #[default]
    Json,
    Postgres,
    Memory,
}

impl From<CliStore> for StoreKind {
    fn from(cli: CliStore) -> Self {
        match cli {
            CliStore::Json => StoreKind::Json,
            CliStore::Postgres => StoreKind::Postgres,
            CliStore::Memory => StoreKind::Memory,
        }
    }
}

#[derive(Parser)]
#[command(name = "beonyeok")]
#[command(about = "Translate YouTube transcripts into Korean and archive structured summaries")]
struct Cli {
    /// Video URL or 11-character video id
    url: String,

    /// AI provider for translation and summaries
    #[arg(short, long, env = "BEONYEOK_PROVIDER", default_value = "anthropic")]
    provider: CliProvider,

    /// Override the provider's default model
    #[arg(short, long, env = "BEONYEOK_MODEL")]
    model: Option<String>,

    /// Force re-processing even if the video is already archived
    #[arg(short, long)]
    force: bool,

    /// Where records are archived
    #[arg(short, long, env = "BEONYEOK_STORE", default_value = "json")]
    store: CliStore,

    /// Directory for the json store
    #[arg(long, env = "BEONYEOK_OUTPUT_DIR")]
    output_dir: Option<PathBuf>,

    /// PostgreSQL connection string for the postgres store
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// yt-dlp executable used to fetch subtitles
    #[arg(long = "yt-dlp", env = "BEONYEOK_YT_DLP", default_value = "yt-dlp")]
    yt_dlp: PathBuf,
}

fn create_spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
            .template("{spinner:.cyan} {msg}")
            .unwrap(),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

fn elapsed(since: Instant) -> String {
    style(format!("[{}]", format_duration(since.elapsed())))
        .dim()
        .to_string()
}

/// Drive spinners from pipeline events until the run drops its sender.
async fn render_progress(mut events: mpsc::UnboundedReceiver<PipelineEvent>, provider: Provider) {
    let mut spinner: Option<ProgressBar> = None;
    let mut step_start = Instant::now();
    let check = style("✓").green().bold();

    while let Some(event) = events.recv().await {
        match event {
            PipelineEvent::Cached { video_id } => {
                println!(
                    "{} Archived {} {}",
                    check,
                    style(video_id).yellow(),
                    style("(cached)").dim()
                );
            }
            PipelineEvent::Started { .. } => {
                step_start = Instant::now();
                spinner = Some(create_spinner("Extracting transcript..."));
            }
            PipelineEvent::TranscriptExtracted {
                language,
                duration_minutes,
                ..
            } => {
                if let Some(pb) = spinner.take() {
                    pb.finish_with_message(format!(
                        "{} Transcript: {:.1} min, {} {}",
                        check,
                        duration_minutes,
                        style(language).yellow(),
                        elapsed(step_start)
                    ));
                }
                step_start = Instant::now();
                spinner = Some(create_spinner(&format!(
                    "Translating to Korean with {}...",
                    provider.name()
                )));
            }
            PipelineEvent::Translated { chars, .. } => {
                if let Some(pb) = spinner.take() {
                    pb.finish_with_message(format!(
                        "{} Translated: {} chars {}",
                        check,
                        chars,
                        elapsed(step_start)
                    ));
                }
                step_start = Instant::now();
                spinner = Some(create_spinner("Summarizing..."));
            }
            PipelineEvent::Summarized { difficulty, .. } => {
                if let Some(pb) = spinner.take() {
                    pb.finish_with_message(format!(
                        "{} Summarized ({}) {}",
                        check,
                        difficulty.label_ko(),
                        elapsed(step_start)
                    ));
                }
                step_start = Instant::now();
                spinner = Some(create_spinner("Archiving..."));
            }
            PipelineEvent::Completed { .. } => {
                if let Some(pb) = spinner.take() {
                    pb.finish_with_message(format!("{} Archived {}", check, elapsed(step_start)));
                }
            }
            PipelineEvent::Failed { stage, message, .. } => {
                let line = format!(
                    "{} {} failed: {}",
                    style("✗").red().bold(),
                    stage,
                    message
                );
                match spinner.take() {
                    Some(pb) => pb.finish_with_message(line),
                    None => println!("{}", line),
                }
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    init_tracing("warn");

    let cli = Cli::parse();
    let provider: Provider = cli.provider.into();

    // Validate API key early
    if let Err(e) = provider.validate_api_key() {
        eprintln!("{} {}", style("Error:").red().bold(), e);
        std::process::exit(1);
    }

    let video_id = match extract_video_id(&cli.url) {
        Ok(id) => id,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            std::process::exit(1);
        }
    };

    let config = PipelineConfig {
        provider,
        model: cli.model,
        ..PipelineConfig::default()
    };

    let store_kind: StoreKind = cli.store.into();
    let output_dir = cli.output_dir.unwrap_or_else(default_output_dir);
    let store = open_store(StoreOptions {
        kind: store_kind,
        database_url: cli.database_url,
        output_dir: Some(output_dir.clone()),
        timeout: config.store_timeout,
    })
    .await?;

    let transcripts = Arc::new(
        YtDlpTranscriptSource::new(
            config.transcript_languages.clone(),
            config.transcript_timeout,
        )
        .with_binary(cli.yt_dlp),
    );
    let generator = Arc::new(LlmClient::from_config(&config)?);
    let pipeline = Pipeline::new(transcripts, generator, store, &config);

    println!(
        "\n{}  {}\n",
        style("beonyeok").cyan().bold(),
        style("YouTube → 한국어").dim()
    );
    println!(
        "{} Video {} ({}, {})",
        style("✓").green().bold(),
        style(&video_id).yellow(),
        provider.name(),
        config.model()
    );
    println!("{}", style("─".repeat(60)).dim());

    let total_start = Instant::now();
    let (tx, rx) = mpsc::unbounded_channel();
    let (result, ()) = tokio::join!(
        pipeline.run_observed(&video_id, cli.force, Some(tx)),
        render_progress(rx, provider)
    );

    let record = match result {
        Ok(record) => record,
        Err(e) => {
            eprintln!("\n{} {}", style("Error:").red().bold(), e);
            std::process::exit(1);
        }
    };

    println!(
        "\n{} {}\n",
        style("Total time:").dim(),
        style(format_duration(total_start.elapsed())).cyan().bold()
    );

    if store_kind == StoreKind::Json {
        println!(
            "{} {}\n",
            style("Saved:").dim(),
            style(output_dir.join(format!("{}.html", record.video_id)).display()).cyan()
        );
    }
    println!("{}", style("─".repeat(60)).dim());

    // Human-readable output
    println!("{}", format_report_readable(&record));

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_short_and_long_durations() {
        assert_eq!(format_duration(Duration::from_millis(4200)), "4.2s");
        assert_eq!(format_duration(Duration::from_secs(125)), "2m 5s");
        assert_eq!(format_duration(Duration::from_millis(119_700)), "2m 0s");
    }

    #[test]
    fn parses_store_and_provider_flags() {
        let cli = Cli::parse_from([
            "beonyeok",
            "https://youtu.be/dQw4w9WgXcQ",
            "--provider",
            "grok",
            "--store",
            "memory",
            "--force",
        ]);
        assert!(matches!(cli.provider, CliProvider::Grok));
        assert_eq!(StoreKind::from(cli.store), StoreKind::Memory);
        assert!(cli.force);
        assert_eq!(cli.yt_dlp, PathBuf::from("yt-dlp"));

        let cli = Cli::parse_from(["beonyeok", "dQw4w9WgXcQ", "--yt-dlp", "/opt/bin/yt-dlp"]);
        assert_eq!(cli.yt_dlp, PathBuf::from("/opt/bin/yt-dlp"));
    }
}
