use anyhow::{Context, Result};
use artifact_stream::cli::Args;
use artifact_stream::logging::setup_logging;
use artifact_stream::recording::{Recording, StreamRecorder};
use artifact_stream::session::{CoordinatorError, SessionState, StreamCoordinator};
use artifact_stream::settings::EngineSettings;
use artifact_stream::ui::{NullObserver, StreamObserver, TerminalObserver};
use clap::Parser;
use futures::StreamExt;
use std::io::Read;
use std::sync::Arc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    setup_logging(args.verbose);

    let mut settings = match &args.settings {
        Some(path) => EngineSettings::from_path(path)?,
        None => EngineSettings::load(),
    };
    if args.fast {
        settings.playback.fast = true;
    }

    let mut recording = load_source(&args)?;
    if let Some(prompt) = &args.prompt {
        recording.prompt = prompt.clone();
    }
    info!(
        "Streaming {} chunks for prompt {:?}",
        recording.chunks.len(),
        recording.prompt
    );

    // Keep stdout for the JSON document when requested
    let observer: Arc<dyn StreamObserver> = if args.json {
        Arc::new(NullObserver)
    } else {
        Arc::new(TerminalObserver::new())
    };

    let playback = settings.playback;
    let mut coordinator = StreamCoordinator::new(settings, observer);
    let handle = coordinator.start_session(&recording.prompt)?;

    let cancel = handle.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted, cancelling session");
            cancel.cancel();
        }
    });

    let recorder = args.record.as_ref().map(|_| StreamRecorder::new(&recording.prompt));
    let events = recording
        .into_events(Some(handle.cancel_token()), playback)
        .inspect({
            let recorder = recorder.clone();
            move |event| {
                if let Some(recorder) = &recorder {
                    recorder.record(event);
                }
            }
        });

    let result = coordinator.drive(events).await;

    if let (Some(recorder), Some(path)) = (&recorder, &args.record) {
        if coordinator.state() == SessionState::Cancelled {
            recorder.record_cancelled();
        }
        recorder
            .save(path)
            .with_context(|| format!("Failed to save recording to {}", path.display()))?;
        info!("Recording saved to {}", path.display());
    }

    if args.json {
        print_json(&coordinator)?;
    } else {
        print_summary(&coordinator);
    }

    match result {
        Ok(state) => {
            info!("Session ended: {:?}", state);
            Ok(())
        }
        Err(CoordinatorError::Transport(message)) => {
            warn!("Stream failed: {}", message);
            anyhow::bail!("stream failed: {message}")
        }
        Err(e) => Err(e.into()),
    }
}

/// Recording to feed: a playback file, a plain text file, or stdin
fn load_source(args: &Args) -> Result<Recording> {
    let prompt = args.prompt.as_deref().unwrap_or("");
    let chunk_size = args.chunk_size as usize;
    if !args.has_source() {
        info!("No --playback or --input given, reading from stdin");
    }

    if let Some(path) = &args.playback {
        return Recording::load(path)
            .with_context(|| format!("Failed to load recording {}", path.display()));
    }

    let text = match &args.input {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read input {}", path.display()))?,
        None => {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .context("Failed to read input from stdin")?;
            text
        }
    };
    Ok(Recording::from_text(prompt, &text, chunk_size))
}

fn print_summary(coordinator: &StreamCoordinator) {
    let store = coordinator.store();
    if !store.is_empty() {
        println!("\nProject tree:");
        print!("{}", coordinator.tree());
    }

    let graph = coordinator.graph();
    println!(
        "\nFlow graph: {} nodes, {} edges",
        graph.node_count(),
        graph.edges().len()
    );
    for node in graph.nodes() {
        println!(
            "  {:<16} {:<9} {:<9} {}",
            node.id,
            format!("{:?}", node.kind),
            format!("{:?}", node.status),
            node.label
        );
    }

    if let Some(usage) = coordinator.session().and_then(|s| s.usage()) {
        println!(
            "\nTokens: {} in, {} out",
            usage.input_tokens, usage.output_tokens
        );
    }
}

fn print_json(coordinator: &StreamCoordinator) -> Result<()> {
    let session = coordinator.session();
    let graph = coordinator.graph();
    let document = serde_json::json!({
        "state": coordinator.state(),
        "error": session.and_then(|s| s.error()),
        "usage": session.and_then(|s| s.usage()),
        "artifacts": coordinator.store().iter().collect::<Vec<_>>(),
        "tree": coordinator.tree(),
        "graph": {
            "nodes": graph.nodes(),
            "edges": graph.edges(),
        },
    });
    println!("{}", serde_json::to_string_pretty(&document)?);
    Ok(())
}
