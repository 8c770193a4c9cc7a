//! scriba: local clinical scribe
//!
//! Turns a finished consultation recording into a transcript and a
//! structured SOAP note, entirely on-device, and keeps a browsable note
//! history.

mod pipeline;

use anyhow::{bail, Context, Result};
use chrono::{Local, TimeZone};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use pipeline::{ConsultationPipeline, PipelineConfig, PipelineEvent, PipelineState};
use scriba_core::{
    format_bytes, get_default_models, get_model_registry, missing_models, Config, DownloadManager,
    ModelStatus,
};
use scriba_notes::NoteStore;

#[derive(Parser)]
#[command(name = "scriba")]
#[command(about = "Local clinical scribe - consultation audio to structured SOAP notes")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Process a finished consultation recording into a note
    Consult {
        /// Path to the recording (m4a/mp3/flac/ogg/wav)
        audio: PathBuf,

        /// Skip LLM note formatting and keep the raw transcript
        #[arg(long)]
        raw_only: bool,
    },

    /// List past consultation notes, newest first
    History {
        /// Limit the number of notes shown
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Print one note in full
    Show {
        /// Note id (see `scriba history`)
        id: i64,
    },

    /// Replace the cleaned note text of a past consultation
    Edit {
        /// Note id (see `scriba history`)
        id: i64,

        /// File with the replacement text (reads stdin when omitted)
        #[arg(long)]
        file: Option<PathBuf>,
    },

    /// Download required AI models
    DownloadModels {
        /// Only show what would be downloaded, don't actually download
        #[arg(long)]
        dry_run: bool,

        /// Download all available models (not just defaults)
        #[arg(long)]
        all: bool,

        /// Specific model ID to download
        #[arg(long)]
        model: Option<String>,
    },

    /// List available and downloaded models
    ListModels,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Consult { audio, raw_only }) => {
            consult(audio, raw_only).await?;
        }
        Some(Commands::History { limit }) => {
            history(limit)?;
        }
        Some(Commands::Show { id }) => {
            show(id)?;
        }
        Some(Commands::Edit { id, file }) => {
            edit(id, file)?;
        }
        Some(Commands::DownloadModels {
            dry_run,
            all,
            model,
        }) => {
            download_models(dry_run, all, model).await?;
        }
        Some(Commands::ListModels) => {
            list_models().await?;
        }
        None => {
            println!("scriba - local clinical scribe");
            println!("Run with --help for usage");
        }
    }

    Ok(())
}

async fn consult(audio: PathBuf, raw_only: bool) -> Result<()> {
    let mut config = Config::load();
    if raw_only {
        config.models.llm = "none".to_string();
    }

    let missing = missing_models(&config);
    if !missing.is_empty() {
        eprintln!("Missing model files:");
        for path in &missing {
            eprintln!("  {:?}", path);
        }
        bail!("run `scriba download-models` first");
    }

    let (tx, mut rx) = tokio::sync::mpsc::channel(32);
    let printer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match event {
                PipelineEvent::StateChanged(PipelineState::Transcribing) => {
                    println!("Transcribing...");
                }
                PipelineEvent::StateChanged(PipelineState::Formatting) => {
                    println!("Refining...");
                }
                PipelineEvent::StateChanged(PipelineState::Saving) => {
                    println!("Saving...");
                }
                PipelineEvent::Transcript { text, is_partial } if is_partial => {
                    println!("\n--- raw transcript ---\n{}\n", text);
                }
                PipelineEvent::Error(e) => {
                    eprintln!("error: {}", e);
                }
                _ => {}
            }
        }
    });

    let pipeline = ConsultationPipeline::new(PipelineConfig::from_app_config(&config), tx);
    let outcome = tokio::task::spawn_blocking(move || pipeline.run_blocking(&audio))
        .await
        .context("pipeline worker panicked")?
        .map_err(|e| anyhow::anyhow!(e))?;

    let _ = printer.await;

    println!("\n--- note {} ---\n{}", outcome.note_id, outcome.cleaned_note);
    println!("\nAudio archived at {:?}", outcome.archived_audio);
    Ok(())
}

fn history(limit: Option<usize>) -> Result<()> {
    let config = Config::load();
    let store = NoteStore::open(&config.notes.database)?;
    let notes = store.list()?;

    if notes.is_empty() {
        println!("No consultations recorded yet.");
        return Ok(());
    }

    let shown = limit.unwrap_or(notes.len());
    for note in notes.iter().take(shown) {
        let when = Local
            .timestamp_millis_opt(note.created_at_ms)
            .single()
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| note.created_at_ms.to_string());
        let first_line = note.cleaned_note.lines().next().unwrap_or("").trim();
        println!("{:>4}  {}  {}", note.id, when, first_line);
    }

    if shown < notes.len() {
        println!("... and {} more", notes.len() - shown);
    }
    Ok(())
}

fn show(id: i64) -> Result<()> {
    let config = Config::load();
    let store = NoteStore::open(&config.notes.database)?;
    let Some(note) = store.get(id)? else {
        bail!("no note with id {}", id);
    };

    let when = Local
        .timestamp_millis_opt(note.created_at_ms)
        .single()
        .map(|t| t.to_rfc2822())
        .unwrap_or_else(|| note.created_at_ms.to_string());

    println!("Note {} ({})", note.id, when);
    println!("Audio: {}", note.audio_path);
    println!("\n--- raw transcript ---\n{}", note.raw_transcript);
    println!("\n--- note ---\n{}", note.cleaned_note);
    Ok(())
}

fn edit(id: i64, file: Option<PathBuf>) -> Result<()> {
    let text = match file {
        Some(path) => std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read {:?}", path))?,
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };

    let config = Config::load();
    let store = NoteStore::open(&config.notes.database)?;
    if !store.update_cleaned_note(id, text.trim_end())? {
        bail!("no note with id {}", id);
    }
    println!("Updated note {}", id);
    Ok(())
}

async fn download_models(dry_run: bool, all: bool, specific_model: Option<String>) -> Result<()> {
    let registry = get_model_registry();
    let defaults = get_default_models();
    let config = Config::load();
    let manager = DownloadManager::new(config.models.model_dir.clone());

    // Determine which models to download
    let models_to_check: Vec<_> = if let Some(ref model_id) = specific_model {
        registry.iter().filter(|m| m.id == *model_id).collect()
    } else if all {
        registry.iter().collect()
    } else {
        registry
            .iter()
            .filter(|m| defaults.contains(&m.id.as_str()))
            .collect()
    };

    if models_to_check.is_empty() {
        if let Some(ref model_id) = specific_model {
            println!("Unknown model: {}", model_id);
            println!("Available models:");
            for m in &registry {
                println!("  - {} ({})", m.id, m.name);
            }
        }
        return Ok(());
    }

    // Check status and collect models that need downloading
    let mut to_download = Vec::new();
    let mut already_downloaded = Vec::new();

    for model in models_to_check {
        match manager.check_status(model).await {
            ModelStatus::Ready { path } => {
                already_downloaded.push((model, path));
            }
            _ => {
                to_download.push(model);
            }
        }
    }

    if !already_downloaded.is_empty() {
        println!("Already downloaded:");
        for (model, path) in &already_downloaded {
            println!("  {} - {:?}", model.name, path);
        }
    }

    if to_download.is_empty() {
        println!("\nAll requested models are already downloaded.");
        return Ok(());
    }

    let total_size: u64 = to_download.iter().map(|m| m.size_bytes).sum();
    println!("\nModels to download ({}):", format_bytes(total_size));
    for model in &to_download {
        println!(
            "  {} ({}) - {}",
            model.id,
            model.name,
            format_bytes(model.size_bytes)
        );
    }

    if dry_run {
        println!("\n[Dry run - no downloads performed]");
        return Ok(());
    }

    println!("\nDownloading to {:?}...\n", config.models.model_dir);

    for model in to_download {
        let pb = ProgressBar::new(model.size_bytes);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{msg}\n{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})")?
                .progress_chars("#>-"),
        );
        pb.set_message(format!("Downloading {}", model.name));

        let pb_clone = Arc::new(pb);
        let pb_callback = pb_clone.clone();

        let progress_callback: Box<dyn Fn(u64, u64) + Send + Sync> =
            Box::new(move |downloaded, _total| {
                pb_callback.set_position(downloaded);
            });

        match manager.download(model, Some(progress_callback)).await {
            Ok(path) => {
                pb_clone.finish_with_message(format!("{} downloaded to {:?}", model.name, path));
            }
            Err(e) => {
                pb_clone.abandon_with_message(format!("Failed to download {}: {}", model.name, e));
                return Err(e.into());
            }
        }
    }

    println!("\nAll models downloaded successfully!");
    Ok(())
}

async fn list_models() -> Result<()> {
    let registry = get_model_registry();
    let defaults = get_default_models();
    let config = Config::load();
    let manager = DownloadManager::new(config.models.model_dir.clone());

    println!("Available models:\n");

    for model in &registry {
        let status = manager.check_status(model).await;
        let is_default = defaults.contains(&model.id.as_str());

        let status_str = match status {
            ModelStatus::Ready { .. } => "[downloaded]".to_string(),
            ModelStatus::NotDownloaded => "[not downloaded]".to_string(),
            ModelStatus::Failed { error } => format!("[failed: {}]", error),
            ModelStatus::Downloading { progress } => {
                format!("[downloading: {:.0}%]", progress * 100.0)
            }
        };

        let default_marker = if is_default { " (default)" } else { "" };

        println!(
            "  {} - {}{}\n    Type: {}, Size: {}\n    Status: {}\n",
            model.id,
            model.name,
            default_marker,
            model.model_type,
            format_bytes(model.size_bytes),
            status_str
        );
    }

    let downloaded = manager.list_downloaded().await?;
    if !downloaded.is_empty() {
        println!("Downloaded model files:");
        for path in downloaded {
            println!("  {:?}", path);
        }
    }

    Ok(())
}
