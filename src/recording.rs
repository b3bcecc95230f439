//! Recorded streams for replay, debugging and demos.
//!
//! A recording stores the chunks of one session with their arrival times and
//! how the session ended. Playback turns it back into a stream of events,
//! optionally reproducing the original timing.

use crate::settings::PlaybackSettings;
use crate::types::{ChunkMetadata, StreamEvent};
use anyhow::{Context, Result};
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Single recorded chunk with timing info
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct RecordedChunk {
    pub text: String,
    #[serde(default, skip_serializing_if = "ChunkMetadata::is_empty")]
    pub metadata: ChunkMetadata,
    /// Milliseconds since recording start
    pub timestamp_ms: u64,
}

/// How the recorded session ended
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RecordedOutcome {
    Complete,
    Failed { message: String },
    Cancelled,
}

/// Recording of one streaming session
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Recording {
    /// The request that started the session
    pub prompt: String,
    /// Timestamp of when the recording was started
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub chunks: Vec<RecordedChunk>,
    #[serde(default)]
    pub outcome: Option<RecordedOutcome>,
}

impl Recording {
    /// Build an untimed recording by splitting `text` into chunks of
    /// `chunk_size` characters
    pub fn from_text(prompt: &str, text: &str, chunk_size: usize) -> Self {
        let chars: Vec<char> = text.chars().collect();
        let chunks = chars
            .chunks(chunk_size.max(1))
            .map(|chunk| RecordedChunk {
                text: chunk.iter().collect(),
                metadata: ChunkMetadata::default(),
                timestamp_ms: 0,
            })
            .collect();

        Self {
            prompt: prompt.to_string(),
            timestamp: chrono::Utc::now(),
            chunks,
            outcome: Some(RecordedOutcome::Complete),
        }
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents =
            std::fs::read_to_string(path.as_ref()).context("Failed to read recording file")?;
        serde_json::from_str(&contents).context("Failed to parse recording file")
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("Failed to serialize recording")?;
        std::fs::write(path.as_ref(), json).context("Failed to write recording file")?;
        Ok(())
    }

    /// Replay the recording as stream events.
    ///
    /// Unless `playback.fast` is set, the gaps between chunks are reproduced,
    /// each capped at `playback.max_delay_ms`. A recorded cancellation fires
    /// `cancel` at the point where it happened.
    pub fn into_events(
        self,
        cancel: Option<CancellationToken>,
        playback: PlaybackSettings,
    ) -> impl Stream<Item = StreamEvent> {
        let state = (self.chunks.into_iter(), 0u64, Some(self.outcome));

        futures::stream::unfold(state, move |(mut chunks, last_ms, outcome)| {
            let cancel = cancel.clone();
            async move {
                if let Some(chunk) = chunks.next() {
                    if !playback.fast && chunk.timestamp_ms > last_ms {
                        let delay = (chunk.timestamp_ms - last_ms).min(playback.max_delay_ms);
                        tokio::time::sleep(Duration::from_millis(delay)).await;
                    }
                    let timestamp_ms = chunk.timestamp_ms.max(last_ms);
                    let event = StreamEvent::Chunk {
                        text: chunk.text,
                        metadata: chunk.metadata,
                    };
                    return Some((event, (chunks, timestamp_ms, outcome)));
                }

                match outcome? {
                    None | Some(RecordedOutcome::Complete) => {
                        Some((StreamEvent::Complete, (chunks, last_ms, None)))
                    }
                    Some(RecordedOutcome::Failed { message }) => {
                        Some((StreamEvent::Failed(message), (chunks, last_ms, None)))
                    }
                    Some(RecordedOutcome::Cancelled) => {
                        if let Some(cancel) = cancel {
                            cancel.cancel();
                            // The consumer observes the token, not the end of the stream
                            futures::future::pending::<()>().await;
                        }
                        None
                    }
                }
            }
        })
    }
}

/// Records stream events as they are fed to a session
#[derive(Clone)]
pub struct StreamRecorder {
    start_time: Instant,
    recording: Arc<Mutex<Recording>>,
}

impl StreamRecorder {
    pub fn new(prompt: &str) -> Self {
        Self {
            start_time: Instant::now(),
            recording: Arc::new(Mutex::new(Recording {
                prompt: prompt.to_string(),
                timestamp: chrono::Utc::now(),
                chunks: Vec::new(),
                outcome: None,
            })),
        }
    }

    /// Record an event with the time elapsed since the recorder was created
    pub fn record(&self, event: &StreamEvent) {
        let Ok(mut recording) = self.recording.lock() else {
            return;
        };
        match event {
            StreamEvent::Chunk { text, metadata } => {
                let timestamp_ms = self.start_time.elapsed().as_millis() as u64;
                recording.chunks.push(RecordedChunk {
                    text: text.clone(),
                    metadata: metadata.clone(),
                    timestamp_ms,
                });
            }
            StreamEvent::Complete => recording.outcome = Some(RecordedOutcome::Complete),
            StreamEvent::Failed(message) => {
                recording.outcome = Some(RecordedOutcome::Failed {
                    message: message.clone(),
                })
            }
        }
    }

    pub fn record_cancelled(&self) {
        if let Ok(mut recording) = self.recording.lock() {
            recording.outcome = Some(RecordedOutcome::Cancelled);
        }
    }

    /// Current state of the recording
    pub fn recording(&self) -> Recording {
        match self.recording.lock() {
            Ok(recording) => recording.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.recording().save(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    fn fast() -> PlaybackSettings {
        PlaybackSettings {
            fast: true,
            max_delay_ms: 0,
        }
    }

    #[test]
    fn test_from_text_splits_on_characters() {
        let recording = Recording::from_text("p", "héllo", 2);
        let texts: Vec<&str> = recording.chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["hé", "ll", "o"]);
        assert_eq!(recording.outcome, Some(RecordedOutcome::Complete));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");

        let mut recording = Recording::from_text("make a page", "<file path=\"a.html\">x</file>", 8);
        recording.outcome = Some(RecordedOutcome::Failed {
            message: "connection reset".to_string(),
        });
        recording.save(&path).unwrap();

        let loaded = Recording::load(&path).unwrap();
        assert_eq!(loaded.prompt, "make a page");
        assert_eq!(loaded.chunks, recording.chunks);
        assert_eq!(loaded.outcome, recording.outcome);
    }

    #[test]
    fn test_load_reports_bad_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{").unwrap();

        let err = Recording::load(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse recording file"));
    }

    #[tokio::test]
    async fn test_playback_emits_chunks_then_outcome() {
        let mut recording = Recording::from_text("p", "abcd", 2);
        recording.outcome = Some(RecordedOutcome::Failed {
            message: "timeout".to_string(),
        });

        let events: Vec<StreamEvent> = recording.into_events(None, fast()).collect().await;
        assert_eq!(
            events,
            vec![
                StreamEvent::text("ab"),
                StreamEvent::text("cd"),
                StreamEvent::Failed("timeout".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_missing_outcome_plays_as_complete() {
        let mut recording = Recording::from_text("p", "x", 1);
        recording.outcome = None;

        let events: Vec<StreamEvent> = recording.into_events(None, fast()).collect().await;
        assert_eq!(events, vec![StreamEvent::text("x"), StreamEvent::Complete]);
    }

    #[tokio::test]
    async fn test_recorded_cancellation_fires_token() {
        let mut recording = Recording::from_text("p", "ab", 1);
        recording.outcome = Some(RecordedOutcome::Cancelled);
        let token = CancellationToken::new();

        let mut events = Box::pin(recording.into_events(Some(token.clone()), fast()));
        assert_eq!(events.next().await, Some(StreamEvent::text("a")));
        assert_eq!(events.next().await, Some(StreamEvent::text("b")));

        tokio::select! {
            _ = token.cancelled() => {}
            _ = events.next() => panic!("stream should stay pending after cancelling"),
        }
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn test_playback_reproduces_capped_timing() {
        let recording = Recording {
            prompt: "p".to_string(),
            timestamp: chrono::Utc::now(),
            chunks: vec![
                RecordedChunk {
                    text: "a".to_string(),
                    metadata: ChunkMetadata::default(),
                    timestamp_ms: 20,
                },
                RecordedChunk {
                    text: "b".to_string(),
                    metadata: ChunkMetadata::default(),
                    timestamp_ms: 60_000,
                },
            ],
            outcome: None,
        };
        let playback = PlaybackSettings {
            fast: false,
            max_delay_ms: 50,
        };

        let start = Instant::now();
        let events: Vec<StreamEvent> = recording.into_events(None, playback).collect().await;
        let elapsed = start.elapsed();

        assert_eq!(events.len(), 3);
        assert!(elapsed >= Duration::from_millis(70), "{elapsed:?}");
        // The one-minute gap is capped
        assert!(elapsed < Duration::from_secs(5), "{elapsed:?}");
    }

    #[test]
    fn test_recorder_captures_events() {
        let recorder = StreamRecorder::new("prompt");
        recorder.record(&StreamEvent::text("hello"));
        recorder.record(&StreamEvent::Complete);

        let recording = recorder.recording();
        assert_eq!(recording.prompt, "prompt");
        assert_eq!(recording.chunks.len(), 1);
        assert_eq!(recording.chunks[0].text, "hello");
        assert_eq!(recording.outcome, Some(RecordedOutcome::Complete));

        recorder.record_cancelled();
        assert_eq!(recorder.recording().outcome, Some(RecordedOutcome::Cancelled));
    }
}
