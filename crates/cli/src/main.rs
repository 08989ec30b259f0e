use anyhow::Result;
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use pdf_transl_core::config::PipelineConfig;
use pdf_transl_core::extractor::pdfium::PdfiumExtractor;
use pdf_transl_core::provider;
use pdf_transl_core::{Pipeline, PipelineOutcome};
use pdf_transl_storage::{LocalStorage, StorageBackend};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Translate a PDF's text in place, preserving layout, tables, and images.
#[derive(Parser)]
#[command(name = "pdf-transl", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Translate one PDF into a structured, translated document
    Translate(TranslateArgs),
}

#[derive(Parser)]
struct TranslateArgs {
    /// Path to the PDF to translate
    input_pdf: PathBuf,

    /// Directory the translated document, assets, trace, and quarantine are written under
    #[arg(long, default_value = "./output")]
    output_dir: PathBuf,

    /// Overrides the config file's target_language for this run
    #[arg(long)]
    target_language: Option<String>,

    /// Path to a pipeline config TOML file (see PDF_TRANSL_CONFIG env var as an alternative)
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();
    let exit_code = match cli.command {
        Commands::Translate(args) => run_translate(args).await,
    };

    std::process::exit(exit_code);
}

async fn run_translate(args: TranslateArgs) -> i32 {
    let mut config = match PipelineConfig::load_or_default(args.config.as_deref(), &args.input_pdf) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("configuration error: {e}");
            return 1;
        }
    };

    if let Some(lang) = args.target_language {
        config.translation.target_language = lang;
    }

    if !args.input_pdf.exists() {
        eprintln!("configuration error: input PDF not found: {}", args.input_pdf.display());
        return 1;
    }

    let endpoint = match provider::create_endpoint(&config.translation.provider, &config.translation.model_identifier)
    {
        Ok(e) => Arc::from(e),
        Err(e) => {
            eprintln!("configuration error: {e}");
            return e.exit_code();
        }
    };

    let output_root = args.output_dir.clone();
    if let Err(e) = tokio::fs::create_dir_all(&output_root).await {
        eprintln!("configuration error: creating output directory: {e}");
        return 1;
    }
    let storage_factory: pdf_transl_core::StorageFactory = Arc::new(move || {
        Box::new(LocalStorage::new(output_root.clone(), "file://".to_string())) as Box<dyn StorageBackend>
    });

    let pipeline = Pipeline::new(
        config,
        Arc::new(PdfiumExtractor::new()),
        Arc::new(PdfiumExtractor::new()),
        endpoint,
        storage_factory,
    );

    let bar = translate_progress_bar();
    bar.set_message(args.input_pdf.display().to_string());

    let result = pipeline.translate(&args.input_pdf, CancellationToken::new()).await;
    bar.finish_and_clear();

    match result {
        Ok(outcome) => report_success(&outcome),
        Err(e) => {
            eprintln!("translation failed: {e}");
            e.exit_code()
        }
    }
}

fn translate_progress_bar() -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    bar.set_style(ProgressStyle::with_template("{spinner:.green} translating {msg}").unwrap());
    bar.enable_steady_tick(std::time::Duration::from_millis(120));
    bar
}

fn report_success(outcome: &PipelineOutcome) -> i32 {
    println!("Translated {}", outcome.document_id);
    println!("  output:      {}", outcome.output_path);
    println!("  trace:       {}", outcome.trace_path);
    println!(
        "  blocks:      {} translated, {} cache hits, {} API calls",
        outcome.translated_blocks, outcome.cache_hits, outcome.api_calls
    );

    if outcome.quarantined > 0 {
        println!(
            "  quarantined: {} block(s) marked [TRANSLATION_FAILED], originals substituted",
            outcome.quarantined
        );
        4
    } else {
        0
    }
}
