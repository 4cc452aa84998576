//! Timeline merger: one globally ordered event sequence for a corpus.
//!
//! One blocking reader task runs per source file and feeds a bounded
//! channel; a single consumer drains it. Delivery order carries no meaning: the
//! collected events are sorted afterwards by timestamp, then file name, then
//! line number, and each event receives its position as its index.

use crate::config::IngestConfig;
use crate::event::Event;
use crate::reader::{EventReader, ParseError, source_name};
use arbor_core::Timestamp;
use std::io;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;

/// Corpus-level ingestion failure
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// Corpus directory could not be listed
    #[error("Cannot list {path}: {source}")]
    Directory {
        /// Directory path
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: io::Error,
    },

    /// One or more source files failed to parse
    #[error("{} source file(s) failed: {}", .0.len(), summarize(.0))]
    Sources(Vec<ParseError>),

    /// A reader task panicked or was cancelled
    #[error("Reader task failed: {0}")]
    Worker(String),
}

fn summarize(failures: &[ParseError]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Globally sorted, indexed events of a corpus
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Timeline {
    events: Vec<Event>,
}

impl Timeline {
    /// Sort events and assign their indices
    #[must_use]
    pub fn from_events(mut events: Vec<Event>) -> Self {
        events.sort_by(|a, b| {
            a.timestamp
                .cmp(&b.timestamp)
                .then_with(|| a.origin.cmp(&b.origin))
        });
        for (index, event) in events.iter_mut().enumerate() {
            event.index = Some(index);
        }
        Self { events }
    }

    /// Number of events
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether the corpus produced no events
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Event at a timeline index
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Event> {
        self.events.get(index)
    }

    /// All events in timeline order
    #[must_use]
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Iterate in timeline order
    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.events.iter()
    }

    /// Timestamp of the first event
    #[must_use]
    pub fn start_time(&self) -> Option<Timestamp> {
        self.events.first().map(|e| e.timestamp)
    }

    /// Timestamp of the last event
    #[must_use]
    pub fn end_time(&self) -> Option<Timestamp> {
        self.events.last().map(|e| e.timestamp)
    }

    /// Span between first and last event, zero when empty
    #[must_use]
    pub fn duration_millis(&self) -> i64 {
        match (self.start_time(), self.end_time()) {
            (Some(start), Some(end)) => end.millis_since(&start),
            _ => 0,
        }
    }

    /// Milliseconds between the first event and the event at `index`
    #[must_use]
    pub fn offset_millis(&self, index: usize) -> Option<i64> {
        let start = self.start_time()?;
        self.get(index).map(|e| e.timestamp.millis_since(&start))
    }

    /// Greatest index whose event lies at most `offset` ms after the start.
    ///
    /// `None` when the offset precedes every event.
    #[must_use]
    pub fn index_at_offset(&self, offset: i64) -> Option<usize> {
        let start = self.start_time()?;
        let count = self
            .events
            .partition_point(|e| e.timestamp.millis_since(&start) <= offset);
        count.checked_sub(1)
    }

    /// Events of structural kinds, in timeline order
    #[must_use]
    pub fn structural(&self) -> Vec<&Event> {
        self.events.iter().filter(|e| e.is_structural()).collect()
    }

    /// Position in [`Self::structural`] of the last entry at or before `index`
    #[must_use]
    pub fn nearest_structural(&self, index: usize) -> Option<usize> {
        let structural = self.structural();
        let count = structural.partition_point(|e| e.index.is_some_and(|i| i <= index));
        count.checked_sub(1)
    }
}

/// Read every source file under `dir` and merge the results.
///
/// # Errors
///
/// Returns error if the directory cannot be listed or any source fails;
/// all per-file failures are reported together.
pub async fn build_timeline(
    dir: impl AsRef<Path>,
    config: &IngestConfig,
) -> Result<Timeline, IngestError> {
    let dir = dir.as_ref();
    let directory_error = |source| IngestError::Directory {
        path: dir.to_path_buf(),
        source,
    };

    let mut entries = tokio::fs::read_dir(dir).await.map_err(directory_error)?;
    let mut paths = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(directory_error)? {
        paths.push(entry.path());
    }
    paths.sort();
    tracing::info!(dir = %dir.display(), entries = paths.len(), "Reading log files");

    let (tx, mut rx) = mpsc::channel(config.channel_capacity.max(1));
    let mut readers = Vec::with_capacity(paths.len());
    for path in paths {
        let tx = tx.clone();
        let config = config.clone();
        readers.push(tokio::task::spawn_blocking(move || {
            read_source(&path, &config, &tx)
        }));
    }
    drop(tx);

    // Closes once every reader has dropped its sender.
    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }

    let mut failures = Vec::new();
    for reader in readers {
        match reader.await {
            Ok(Ok(_)) => {}
            Ok(Err(err)) => {
                tracing::error!(file = %err.file(), error = %err, "Failed to read log file");
                failures.push(err);
            }
            Err(err) => return Err(IngestError::Worker(err.to_string())),
        }
    }
    if !failures.is_empty() {
        failures.sort_by(|a, b| a.file().cmp(b.file()));
        return Err(IngestError::Sources(failures));
    }

    let timeline = Timeline::from_events(events);
    tracing::info!(events = timeline.len(), "Done reading logs");
    Ok(timeline)
}

fn read_source(
    path: &Path,
    config: &IngestConfig,
    tx: &mpsc::Sender<Event>,
) -> Result<usize, ParseError> {
    let mut reader = EventReader::open(path, config)?;
    let mut count = 0;
    for event in reader.by_ref() {
        if tx.blocking_send(event?).is_err() {
            break;
        }
        count += 1;
    }

    tracing::debug!(
        file = %source_name(path),
        events = count,
        node = ?reader.state().node(),
        "Read log file"
    );
    Ok(count)
}
